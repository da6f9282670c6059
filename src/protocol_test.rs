use super::*;
use packets::encode_socket;
use serde_json::json;

fn ann() -> JoinParams {
    JoinParams { name: "Ann".to_owned(), room: "lobby".to_owned() }
}

// =============================================================
// Outbound encoding
// =============================================================

#[test]
fn join_encodes_name_and_room_with_ack() {
    let packet = Outbound::Join(ann()).to_packet(Some(0)).unwrap();
    assert_eq!(encode_socket(&packet), r#"20["join",{"name":"Ann","room":"lobby"}]"#);
}

#[test]
fn send_message_encodes_bare_string() {
    let packet = Outbound::SendMessage("hello there".to_owned()).to_packet(Some(4)).unwrap();
    assert_eq!(encode_socket(&packet), r#"24["sendMessage","hello there"]"#);
}

#[test]
fn typing_events_carry_identity_without_ack() {
    let typing = Outbound::Typing(ann()).to_packet(None).unwrap();
    let stop = Outbound::StopTyping(ann()).to_packet(None).unwrap();
    assert_eq!(encode_socket(&typing), r#"2["typing",{"name":"Ann","room":"lobby"}]"#);
    assert_eq!(encode_socket(&stop), r#"2["stopTyping",{"name":"Ann","room":"lobby"}]"#);
}

#[test]
fn only_join_and_send_expect_ack() {
    assert!(Outbound::Join(ann()).expects_ack());
    assert!(Outbound::SendMessage("x".to_owned()).expects_ack());
    assert!(!Outbound::Typing(ann()).expects_ack());
    assert!(!Outbound::StopTyping(ann()).expects_ack());
}

// =============================================================
// Inbound payloads
// =============================================================

#[test]
fn message_decodes_minimal_payload() {
    let msg: Message = serde_json::from_value(json!({"user": "Bob", "text": "hi"})).unwrap();
    assert_eq!(msg.user, "Bob");
    assert_eq!(msg.text, "hi");
    assert!(msg.id.is_none());
    assert!(msg.time.is_none());
    assert!(msg.user_id.is_none());
}

#[test]
fn message_decodes_numeric_and_string_times() {
    let numeric: Message = serde_json::from_value(json!({"user": "Bob", "text": "hi", "time": 1_700_000_000_000_i64})).unwrap();
    assert_eq!(numeric.time, Some(MessageTime::Millis(1_700_000_000_000)));

    let text: Message =
        serde_json::from_value(json!({"user": "Bob", "text": "hi", "time": "2024-03-01T15:07:00Z", "userId": "s1"}))
            .unwrap();
    assert_eq!(text.time, Some(MessageTime::Text("2024-03-01T15:07:00Z".to_owned())));
    assert_eq!(text.user_id.as_deref(), Some("s1"));
}

#[test]
fn message_ignores_unknown_fields() {
    let msg: Message = serde_json::from_value(json!({"user": "admin", "text": "Ann joined", "color": "red"})).unwrap();
    assert_eq!(msg.user, "admin");
}

#[test]
fn room_data_accepts_users_or_participants() {
    let users: RoomData =
        serde_json::from_value(json!({"room": "lobby", "users": [{"id": "a", "name": "Ann", "room": "lobby"}]}))
            .unwrap();
    let participants: RoomData =
        serde_json::from_value(json!({"room": "lobby", "participants": [{"id": "a", "name": "Ann", "room": "lobby"}]}))
            .unwrap();
    assert_eq!(users, participants);
    assert_eq!(users.users[0].name, "Ann");
}

#[test]
fn room_data_without_users_is_empty_roster() {
    let data: RoomData = serde_json::from_value(json!({"room": "lobby"})).unwrap();
    assert!(data.users.is_empty());
}

#[test]
fn room_data_without_room_has_no_room() {
    let data: RoomData = serde_json::from_value(json!({"users": []})).unwrap();
    assert_eq!(data.room, None);
}

// =============================================================
// Message time
// =============================================================

#[test]
fn clock_label_formats_epoch_millis_in_utc() {
    // 2023-11-14T22:13:20Z
    let time = MessageTime::Millis(1_700_000_000_000);
    assert_eq!(time.clock_label().as_deref(), Some("10:13 PM"));
}

#[test]
fn clock_label_formats_rfc3339_morning() {
    let time = MessageTime::Text("2024-03-01T09:05:00Z".to_owned());
    assert_eq!(time.clock_label().as_deref(), Some("9:05 AM"));
}

#[test]
fn clock_label_is_none_for_garbage() {
    assert_eq!(MessageTime::Text("yesterday".to_owned()).clock_label(), None);
}

// =============================================================
// Ack errors
// =============================================================

#[test]
fn ack_without_args_is_success() {
    assert_eq!(ack_error(&[]), None);
    assert_eq!(ack_error(&[Value::Null]), None);
    assert_eq!(ack_error(&[json!(false)]), None);
    assert_eq!(ack_error(&[json!("")]), None);
    assert_eq!(ack_error(&[json!({})]), None);
}

#[test]
fn ack_with_string_is_error_text() {
    assert_eq!(ack_error(&[json!("Username is taken.")]).as_deref(), Some("Username is taken."));
}

#[test]
fn ack_with_error_object_uses_error_field() {
    assert_eq!(ack_error(&[json!({"error": "Room is full"})]).as_deref(), Some("Room is full"));
    assert_eq!(ack_error(&[json!({"message": "Banned"})]).as_deref(), Some("Banned"));
    assert_eq!(ack_error(&[json!({"error": null})]), None);
}

#[test]
fn ack_with_other_value_renders_json() {
    assert_eq!(ack_error(&[json!(42)]).as_deref(), Some("42"));
    assert_eq!(ack_error(&[json!({"code": 7})]).as_deref(), Some(r#"{"code":7}"#));
}
