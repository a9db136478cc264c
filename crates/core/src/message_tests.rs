// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn message() -> Message {
    Message::new(
        "11111111-2222-3333-4444-555555555555",
        ts(1_700_000_000),
        Role::Researcher,
        Role::Reviewer,
        MessageType::Finding,
        "initial findings",
        "three candidate codecs identified",
    )
}

#[test]
fn priority_orders_critical_above_low() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
}

#[test]
fn recipient_serializes_as_bare_string() {
    assert_eq!(
        serde_json::to_string(&Recipient::Broadcast).unwrap(),
        "\"broadcast\""
    );
    assert_eq!(
        serde_json::to_string(&Recipient::Role(Role::Developer)).unwrap(),
        "\"developer\""
    );
    let parsed: Recipient = serde_json::from_str("\"broadcast\"").unwrap();
    assert_eq!(parsed, Recipient::Broadcast);
}

#[test]
fn wire_format_field_names_match_the_queue_files() {
    let value = serde_json::to_value(message().require_response()).unwrap();
    assert_eq!(value["type"], "finding");
    assert_eq!(value["requiresResponse"], true);
    assert_eq!(value["from"], "researcher");
    assert_eq!(value["to"], "reviewer");
    // Optional fields absent rather than null
    assert!(value.get("threadId").is_none());
    assert!(value.get("deadline").is_none());
}

#[test]
fn round_trips_through_json() {
    let original = message()
        .with_priority(Priority::High)
        .with_thread("thread-9")
        .with_metadata("verdict", json!("APPROVED"))
        .with_attachment("outputs/report.md");
    let text = serde_json::to_string_pretty(&original).unwrap();
    let back: Message = serde_json::from_str(&text).unwrap();
    assert_eq!(back, original);
    assert_eq!(back.verdict(), Some("APPROVED"));
}

#[test]
fn from_value_accepts_valid_record() {
    let value = serde_json::to_value(message()).unwrap();
    let parsed = Message::from_value(&value).unwrap();
    assert_eq!(parsed.content.subject, "initial findings");
}

#[test]
fn from_value_rejects_missing_required_fields() {
    let mut value = serde_json::to_value(message()).unwrap();
    value.as_object_mut().unwrap().remove("requiresResponse");
    assert!(Message::from_value(&value).is_err());

    let mut value = serde_json::to_value(message()).unwrap();
    value["content"] = json!({ "subject": "s" });
    assert!(Message::from_value(&value).is_err());
}

#[test]
fn from_value_rejects_empty_id_and_bad_enums() {
    let mut value = serde_json::to_value(message()).unwrap();
    value["id"] = json!("  ");
    assert!(matches!(
        Message::from_value(&value),
        Err(InvalidMessage::EmptyId)
    ));

    let mut value = serde_json::to_value(message()).unwrap();
    value["type"] = json!("gossip");
    assert!(Message::from_value(&value).is_err());

    let mut value = serde_json::to_value(message()).unwrap();
    value["priority"] = json!("urgent");
    assert!(Message::from_value(&value).is_err());

    assert!(Message::from_value(&json!("not an object")).is_err());
}

#[test]
fn from_value_ignores_unvalidated_optionals() {
    let mut value = serde_json::to_value(message()).unwrap();
    value["threadId"] = json!("t-1");
    let parsed = Message::from_value(&value).unwrap();
    assert_eq!(parsed.thread_id.as_deref(), Some("t-1"));
}

#[test]
fn emit_key_breaks_timestamp_ties_by_id() {
    let a = Message::new(
        "aaa",
        ts(100),
        Role::Researcher,
        Role::Reviewer,
        MessageType::Status,
        "a",
        "",
    );
    let b = Message::new(
        "bbb",
        ts(100),
        Role::Researcher,
        Role::Reviewer,
        MessageType::Status,
        "b",
        "",
    );
    assert!(a.emit_key() < b.emit_key());
}
