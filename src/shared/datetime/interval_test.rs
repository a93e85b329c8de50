use super::interval::AggInterval;

#[test]
fn parses_known_interval_names_case_insensitively() {
    assert_eq!("week".parse::<AggInterval>(), Ok(AggInterval::Week));
    assert_eq!("BiWeekly".parse::<AggInterval>(), Ok(AggInterval::Biweekly));
    assert_eq!(" quarter ".parse::<AggInterval>(), Ok(AggInterval::Quarter));
    assert!("fortnight".parse::<AggInterval>().is_err());
}

#[test]
fn missing_or_invalid_interval_defaults_to_day() {
    assert_eq!(AggInterval::from_name(None), AggInterval::Day);
    assert_eq!(AggInterval::from_name(Some("decade")), AggInterval::Day);
    assert_eq!(AggInterval::from_name(Some("month")), AggInterval::Month);
}

#[test]
fn deserializes_leniently_and_serializes_lowercase() {
    let parsed: AggInterval = serde_json::from_str("\"WEEK\"").unwrap();
    assert_eq!(parsed, AggInterval::Week);

    let fallback: AggInterval = serde_json::from_str("\"hourly\"").unwrap();
    assert_eq!(fallback, AggInterval::Day);

    assert_eq!(
        serde_json::to_string(&AggInterval::Biweekly).unwrap(),
        "\"biweekly\""
    );
}

#[test]
fn day_of_week_round_trips_by_name() {
    assert_eq!(
        "day_of_week".parse::<AggInterval>(),
        Ok(AggInterval::DayOfWeek)
    );
    assert!(AggInterval::DayOfWeek.is_cyclic());
    assert!(!AggInterval::Week.is_cyclic());
    assert_eq!(
        serde_json::to_string(&AggInterval::DayOfWeek).unwrap(),
        "\"day_of_week\""
    );
}
