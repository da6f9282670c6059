use super::*;

// =============================================================
// validate
// =============================================================

#[test]
fn validate_trims_padded_values() {
    let params = validate("  Ann \t", "\nlobby  ").expect("padded input is valid");
    assert_eq!(params, JoinParams { name: "Ann".to_owned(), room: "lobby".to_owned() });
}

#[test]
fn validate_rejects_whitespace_only_name() {
    let err = validate("   ", "lobby").expect_err("blank name");
    assert!(err.name_missing);
    assert!(!err.room_missing);
}

#[test]
fn validate_rejects_empty_room() {
    let err = validate("Ann", "").expect_err("empty room");
    assert!(!err.name_missing);
    assert!(err.room_missing);
}

#[test]
fn validate_reports_both_missing() {
    let err = validate("", " ").expect_err("both blank");
    assert_eq!(err, InvalidParams { name_missing: true, room_missing: true });
}

#[test]
fn validate_keeps_inner_whitespace() {
    let params = validate(" Ann Lee ", "room 1").expect("valid");
    assert_eq!(params.name, "Ann Lee");
    assert_eq!(params.room, "room 1");
}

#[test]
fn invalid_params_message_matches_entry_screen() {
    let err = validate("", "").expect_err("invalid");
    assert_eq!(err.to_string(), "Name and Room are required");
}

// =============================================================
// query string
// =============================================================

#[test]
fn from_query_decodes_percent_and_plus() {
    let params = from_query("?name=Ann%20Lee&room=the+lobby").expect("valid query");
    assert_eq!(params.name, "Ann Lee");
    assert_eq!(params.room, "the lobby");
}

#[test]
fn from_query_accepts_missing_question_mark_and_trims() {
    let params = from_query("room=%20lobby%20&name=Ann").expect("valid query");
    assert_eq!(params, JoinParams { name: "Ann".to_owned(), room: "lobby".to_owned() });
}

#[test]
fn from_query_missing_room_is_invalid() {
    let err = from_query("?name=Ann").expect_err("room missing");
    assert!(err.room_missing);
}

#[test]
fn from_query_empty_is_invalid() {
    assert!(from_query("").is_err());
    assert!(from_query("?").is_err());
}

#[test]
fn from_query_first_occurrence_wins() {
    let params = from_query("?name=Ann&name=Bob&room=lobby").expect("valid");
    assert_eq!(params.name, "Ann");
}

#[test]
fn to_query_output_is_accepted_by_from_query() {
    let params = JoinParams { name: "Zoë & co".to_owned(), room: "a/b?c".to_owned() };
    let query = to_query(&params);
    assert!(query.starts_with('?'));
    assert!(!query.contains(' '));
    assert_eq!(from_query(&query).expect("valid"), params);
}
