use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::ChatMessage;
use crate::common::timestamp::MAX_EPOCH_MILLIS;

/// Identifier of a stored message. Rows keyed by an integer sequence and rows
/// keyed by a uuid both show up here; any other JSON number lands in `Number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Int(i64),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Int(value) => write!(f, "{value}"),
            MessageId::Number(value) => match value.as_i64() {
                Some(value) => write!(f, "{value}"),
                None => f.write_str(&js_number_string(value.as_f64().unwrap_or(f64::NAN))),
            },
            MessageId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        MessageId::Int(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId::Text(value.to_string())
    }
}

impl FromSql for MessageId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(id) => Ok(MessageId::Int(id)),
            ValueRef::Real(id) => serde_json::Number::from_f64(id)
                .map(MessageId::Number)
                .ok_or(FromSqlError::InvalidType),
            ValueRef::Text(_) => String::column_result(value).map(MessageId::Text),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Formats a number the way `Number.prototype.toString` does.
fn js_number_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}Infinity");
    }
    if value == 0.0 {
        return "0".to_string();
    }

    if (1e-6..1e21).contains(&value.abs()) {
        return format!("{value}");
    }
    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// Timestamp exactly as the data layer handed it over: epoch milliseconds or
/// some textual date form.
///
/// Numeric epochs are cut to whole milliseconds toward zero. A number that is
/// not finite or lies beyond ±[`MAX_EPOCH_MILLIS`] is kept as
/// `Unrepresentable`, which always reads as an invalid instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawTimestamp {
    EpochMillis(i64),
    Text(String),
    Unrepresentable(String),
}

impl RawTimestamp {
    pub fn from_epoch_f64(millis: f64) -> Self {
        if !millis.is_finite() || millis.abs() > MAX_EPOCH_MILLIS as f64 {
            return RawTimestamp::Unrepresentable(js_number_string(millis));
        }
        RawTimestamp::EpochMillis(millis.trunc() as i64)
    }

    fn from_epoch_u64(millis: u64) -> Self {
        match i64::try_from(millis) {
            Ok(millis) => RawTimestamp::EpochMillis(millis),
            Err(_) => RawTimestamp::Unrepresentable(millis.to_string()),
        }
    }
}

impl fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTimestamp::EpochMillis(millis) => write!(f, "{millis}"),
            RawTimestamp::Text(text) => write!(f, "{text:?}"),
            RawTimestamp::Unrepresentable(number) => f.write_str(number),
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        RawTimestamp::EpochMillis(instant.timestamp_millis())
    }
}

impl Serialize for RawTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawTimestamp::EpochMillis(millis) => serializer.serialize_i64(*millis),
            RawTimestamp::Text(text) | RawTimestamp::Unrepresentable(text) => {
                serializer.serialize_str(text)
            }
        }
    }
}

struct RawTimestampVisitor;

impl Visitor<'_> for RawTimestampVisitor {
    type Value = RawTimestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("epoch milliseconds or a date string")
    }

    fn visit_i64<E: de::Error>(self, millis: i64) -> Result<Self::Value, E> {
        Ok(RawTimestamp::EpochMillis(millis))
    }

    fn visit_u64<E: de::Error>(self, millis: u64) -> Result<Self::Value, E> {
        Ok(RawTimestamp::from_epoch_u64(millis))
    }

    fn visit_f64<E: de::Error>(self, millis: f64) -> Result<Self::Value, E> {
        Ok(RawTimestamp::from_epoch_f64(millis))
    }

    fn visit_str<E: de::Error>(self, text: &str) -> Result<Self::Value, E> {
        Ok(RawTimestamp::Text(text.to_string()))
    }

    fn visit_string<E: de::Error>(self, text: String) -> Result<Self::Value, E> {
        Ok(RawTimestamp::Text(text))
    }
}

impl<'de> Deserialize<'de> for RawTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawTimestampVisitor)
    }
}

impl FromSql for RawTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(millis) => Ok(RawTimestamp::EpochMillis(millis)),
            ValueRef::Real(millis) => Ok(RawTimestamp::from_epoch_f64(millis)),
            ValueRef::Text(_) => String::column_result(value).map(RawTimestamp::Text),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for RawTimestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            RawTimestamp::EpochMillis(millis) => millis.to_sql(),
            RawTimestamp::Text(text) | RawTimestamp::Unrepresentable(text) => text.to_sql(),
        }
    }
}

/// Tin nhắn như được lưu ở tầng dữ liệu, trước khi chuẩn hoá.
///
/// Every field is required; a JSON record missing one of them fails to
/// deserialize instead of producing a half-filled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub id: MessageId,
    pub role: String,
    pub content: String,
    pub timestamp: RawTimestamp,
}

impl PersistedMessage {
    pub fn new(
        id: impl Into<MessageId>,
        role: impl Into<String>,
        content: impl Into<String>,
        timestamp: RawTimestamp,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            content: content.into(),
            timestamp,
        }
    }

    pub fn to_client(&self) -> ChatMessage {
        ChatMessage::from(self)
    }
}

/// Chat session row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub course_id: Option<String>,
    pub deadline_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_deleted: bool,
}

/// Fields for a session that does not exist yet
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub course_id: Option<String>,
    pub deadline_id: Option<String>,
}

/// Partial update; `updated_at` falls back to now.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub title: Option<String>,
    pub is_deleted: Option<bool>,
    pub updated_at: Option<i64>,
}

/// Transcript to merge into a session. Messages already stored are skipped by
/// position, so `messages` must be the full transcript in order.
#[derive(Debug, Clone, Default)]
pub struct SessionBatch {
    pub session_id: String,
    pub user_id: Option<String>,
    pub course_id: Option<String>,
    pub deadline_id: Option<String>,
    pub study_mode: bool,
    pub title: Option<String>,
    pub messages: Vec<ChatMessage>,
}
