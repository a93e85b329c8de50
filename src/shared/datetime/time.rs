use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `[time]` section: the calendar trend buckets are cut in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// IANA name such as `Europe/Paris`; UTC when unset.
    pub timezone: Option<String>,
}

impl TimeConfig {
    pub fn with_timezone(tz: &str) -> Self {
        Self {
            timezone: Some(tz.to_string()),
        }
    }

    /// None means UTC, including for names chrono-tz does not know.
    pub fn zone(&self) -> Option<Tz> {
        let name = self.timezone.as_deref()?;
        match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                warn!(target: "lens_db::config", timezone = name, "Unknown timezone, bucketing in UTC");
                None
            }
        }
    }
}

pub fn now_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}
