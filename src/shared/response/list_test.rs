use super::list::DbListResponse;

#[test]
fn count_tracks_returned_records() {
    let response = DbListResponse::of(vec!["a", "b"], 10);

    assert_eq!(response.count, 2);
    assert_eq!(response.total_count, 10);
}

#[test]
fn total_count_never_drops_below_page_size() {
    let response = DbListResponse::of(vec![1, 2, 3], 1);

    assert_eq!(response.count, 3);
    assert_eq!(response.total_count, 3);
}

#[test]
fn empty_envelope_is_well_formed() {
    let response: DbListResponse<u8> = DbListResponse::empty();

    assert!(response.records.is_empty());
    assert_eq!(response.count, 0);
    assert_eq!(response.total_count, 0);
}

#[test]
fn serializes_with_snake_case_keys() {
    let json = serde_json::to_value(DbListResponse::of(vec![7], 4)).unwrap();

    assert_eq!(json["records"], serde_json::json!([7]));
    assert_eq!(json["count"], 1);
    assert_eq!(json["total_count"], 4);
}
