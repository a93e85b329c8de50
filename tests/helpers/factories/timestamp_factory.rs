use chrono::{Datelike, TimeZone, Utc, Weekday};

/// Factory for creating test timestamps with known dates
pub struct TimestampFactory;

impl TimestampFactory {
    /// Epoch seconds of a specific UTC date/time
    pub fn utc_datetime(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .unwrap()
            .timestamp()
    }

    /// Epoch seconds of midnight UTC
    pub fn utc_date(year: i32, month: u32, day: u32) -> i64 {
        Self::utc_datetime(year, month, day, 0, 0, 0)
    }

    /// Noon of a date that must fall on `weekday`
    pub fn utc_weekday(year: i32, month: u32, day: u32, weekday: Weekday) -> i64 {
        let dt = Utc
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .unwrap();
        assert_eq!(dt.weekday(), weekday);
        dt.timestamp()
    }

    pub fn plus_days(base_ts: i64, days: i64) -> i64 {
        base_ts + days * 86_400
    }

    pub fn plus_hours(base_ts: i64, hours: i64) -> i64 {
        base_ts + hours * 3_600
    }

    pub fn plus_minutes(base_ts: i64, minutes: i64) -> i64 {
        base_ts + minutes * 60
    }
}
