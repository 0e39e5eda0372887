use serde_json::json;
use study_coach_chat::storage::ChatDatabase;
use study_coach_chat::{
    ClientTimestamp, MessageId, PersistedMessage, RawTimestamp, Role,
    db_messages_to_client_format, try_db_messages_to_client_format,
};

#[test]
fn json_feed_with_mixed_ids_and_timestamps() {
    let feed = json!([
        {"id": 7, "role": "user", "content": "hi", "timestamp": 1000},
        {"id": "a", "role": "assistant", "content": "  hello  ", "timestamp": "2024-01-01T00:00:00Z"},
        {"id": 8, "role": "user", "content": "?", "timestamp": "not-a-date"}
    ]);
    let records: Vec<PersistedMessage> = serde_json::from_value(feed).unwrap();
    assert_eq!(records[0].id, MessageId::Int(7));
    assert_eq!(records[1].timestamp, RawTimestamp::Text("2024-01-01T00:00:00Z".into()));

    let messages = db_messages_to_client_format(&records);
    let out = serde_json::to_value(&messages).unwrap();
    assert_eq!(
        out,
        json!([
            {"id": "7", "role": "user", "content": "hi", "timestamp": "1970-01-01T00:00:01.000Z"},
            {"id": "a", "role": "assistant", "content": "  hello  ", "timestamp": "2024-01-01T00:00:00.000Z"},
            {"id": "8", "role": "user", "content": "?", "timestamp": null}
        ])
    );
}

#[test]
fn json_feed_with_float_numbers_is_converted_not_rejected() {
    let feed = json!([
        {"id": 1, "role": "user", "content": "x", "timestamp": 1704067200000.0},
        {"id": 1.5, "role": "user", "content": "y", "timestamp": 1.7e12},
        {"id": 18446744073709551615u64, "role": "user", "content": "z", "timestamp": 1e300}
    ]);
    let records: Vec<PersistedMessage> = serde_json::from_value(feed).unwrap();

    let messages = db_messages_to_client_format(&records);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].id, "1");
    assert_eq!(messages[0].timestamp.timestamp_millis(), Some(1_704_067_200_000));
    assert_eq!(messages[1].id, "1.5");
    assert_eq!(messages[1].timestamp.timestamp_millis(), Some(1_700_000_000_000));
    assert_eq!(messages[2].id, "18446744073709552000");
    assert_eq!(messages[2].timestamp, ClientTimestamp::Invalid);

    assert!(try_db_messages_to_client_format(&records).is_err());
}

#[test]
fn record_missing_a_field_is_rejected() {
    let feed = json!([{"id": 1, "role": "user", "timestamp": 5}]);
    let err = serde_json::from_value::<Vec<PersistedMessage>>(feed).unwrap_err();
    assert!(err.to_string().contains("content"));
}

#[test]
fn client_messages_read_back_from_json() {
    let messages: Vec<study_coach_chat::ChatMessage> = serde_json::from_value(json!([
        {"id": "1", "role": "user", "content": "x", "timestamp": "2024-01-01T00:00:00.000Z"},
        {"id": "2", "role": "assistant", "content": "y", "timestamp": null}
    ]))
    .unwrap();
    assert!(messages[0].timestamp.is_valid());
    assert_eq!(messages[1].timestamp, ClientTimestamp::Invalid);
}

#[test]
fn store_to_client_pipeline() {
    let db = ChatDatabase::in_memory().unwrap();
    db.create_session(&study_coach_chat::storage::models::NewSession {
        session_id: "study_session_1".to_string(),
        user_id: Some("987655".to_string()),
        ..Default::default()
    })
    .unwrap();
    db.save_message("study_session_1", Role::Assistant, "Hello! How can I help?", None)
        .unwrap();
    db.save_message("study_session_1", Role::User, "Binary search trees", None)
        .unwrap();

    let records = db.get_messages("study_session_1").unwrap();
    let messages = try_db_messages_to_client_format(&records).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "assistant");
    assert_eq!(messages[1].content, "Binary search trees");
    assert!(messages.iter().all(|message| message.id.parse::<i64>().is_ok()));
    assert!(messages[0].timestamp.as_datetime() <= messages[1].timestamp.as_datetime());
}
