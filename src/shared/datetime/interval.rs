use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar interval used by trend dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum AggInterval {
    #[default]
    Day,
    Week,
    Biweekly,
    Month,
    Quarter,
    Year,
    /// Weekday of the timestamp, pooled across weeks.
    DayOfWeek,
}

impl AggInterval {
    pub const ALL: [AggInterval; 7] = [
        AggInterval::Day,
        AggInterval::Week,
        AggInterval::Biweekly,
        AggInterval::Month,
        AggInterval::Quarter,
        AggInterval::Year,
        AggInterval::DayOfWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggInterval::Day => "day",
            AggInterval::Week => "week",
            AggInterval::Biweekly => "biweekly",
            AggInterval::Month => "month",
            AggInterval::Quarter => "quarter",
            AggInterval::Year => "year",
            AggInterval::DayOfWeek => "day_of_week",
        }
    }

    /// Whether buckets repeat instead of following the calendar forward.
    pub fn is_cyclic(&self) -> bool {
        matches!(self, AggInterval::DayOfWeek)
    }

    /// Lenient parse: missing or unrecognised names bucket by day.
    pub fn from_name(name: Option<&str>) -> Self {
        name.and_then(|n| n.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for AggInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        AggInterval::ALL
            .into_iter()
            .find(|iv| iv.as_str() == lowered)
            .ok_or_else(|| format!("unknown interval '{s}'"))
    }
}

impl From<String> for AggInterval {
    fn from(value: String) -> Self {
        AggInterval::from_name(Some(&value))
    }
}

impl fmt::Display for AggInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
