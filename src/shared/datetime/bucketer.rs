use super::interval::AggInterval;
use super::time::TimeConfig;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// Calendar-aware trend bucketing.
///
/// Bucket keys are the epoch seconds of the interval start in the configured
/// timezone. Weeks start on Monday and follow ISO numbering; a biweekly bucket
/// starts on the Monday of the odd ISO week at or before the timestamp.
#[derive(Debug, Clone, Default)]
pub struct CalendarBucketer {
    timezone: Option<Tz>,
}

impl CalendarBucketer {
    pub fn new(config: &TimeConfig) -> Self {
        Self {
            timezone: config.zone(),
        }
    }

    pub fn utc() -> Self {
        Self::default()
    }

    /// Start of the interval containing `ts`, in epoch seconds.
    pub fn start_of(&self, ts: i64, interval: AggInterval) -> Option<i64> {
        let utc = DateTime::<Utc>::from_timestamp(ts, 0)?;
        match self.timezone {
            Some(tz) => Self::start_in(utc.with_timezone(&tz), interval),
            None => Self::start_in(utc, interval),
        }
    }

    /// Human readable label of the interval containing `ts`.
    pub fn label_of(&self, ts: i64, interval: AggInterval) -> Option<String> {
        let date = self.local_date(ts)?;
        truncate_date(date, interval).map(|start| label(start, interval))
    }

    /// Sort position of the bucket containing `ts`: the bucket start, or the
    /// ISO weekday number (Monday = 1) for `day_of_week`.
    pub fn order_of(&self, ts: i64, interval: AggInterval) -> Option<i64> {
        if interval.is_cyclic() {
            let date = self.local_date(ts)?;
            return Some(i64::from(date.weekday().number_from_monday()));
        }
        self.start_of(ts, interval)
    }

    fn local_date(&self, ts: i64) -> Option<NaiveDate> {
        let utc = DateTime::<Utc>::from_timestamp(ts, 0)?;
        Some(match self.timezone {
            Some(tz) => utc.with_timezone(&tz).date_naive(),
            None => utc.date_naive(),
        })
    }

    fn start_in<T: TimeZone>(dt: DateTime<T>, interval: AggInterval) -> Option<i64> {
        let start = truncate_date(dt.date_naive(), interval)?;
        let tz = dt.timezone();
        // Zones that skip midnight on a DST switch start the day at 01:00.
        start
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(tz.clone()).earliest())
            .or_else(|| {
                start
                    .and_hms_opt(1, 0, 0)
                    .and_then(|naive| naive.and_local_timezone(tz).earliest())
            })
            .map(|d| d.timestamp())
    }
}

fn truncate_date(date: NaiveDate, interval: AggInterval) -> Option<NaiveDate> {
    match interval {
        AggInterval::Day | AggInterval::DayOfWeek => Some(date),
        AggInterval::Week => Some(monday_of(date)),
        AggInterval::Biweekly => {
            let monday = monday_of(date);
            if monday.iso_week().week() % 2 == 0 {
                Some(monday - Duration::days(7))
            } else {
                Some(monday)
            }
        }
        AggInterval::Month => date.with_day(1),
        AggInterval::Quarter => {
            let first_month = ((date.month() - 1) / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), first_month, 1)
        }
        AggInterval::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    }
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn label(start: NaiveDate, interval: AggInterval) -> String {
    match interval {
        AggInterval::Day => format!("{}-{}-{}", start.day(), start.month(), start.year()),
        AggInterval::Week => {
            let week = start.iso_week();
            format!("{}-{}", week.week(), week.year())
        }
        AggInterval::Biweekly => {
            let week = start.iso_week();
            format!("biweekly-{}-{}", week.week() / 2 + 1, week.year())
        }
        AggInterval::Month => format!("{}-{}", start.month(), start.year()),
        AggInterval::Quarter => format!("Q{}-{}", (start.month() - 1) / 3 + 1, start.year()),
        AggInterval::Year => start.year().to_string(),
        AggInterval::DayOfWeek => weekday_name(start.weekday()).to_string(),
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
