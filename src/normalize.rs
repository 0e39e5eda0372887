//! Conversion of stored message records into the shape the chat UI renders.

use crate::common::{ChatMessage, ClientTimestamp};
use crate::storage::models::{MessageId, PersistedMessage, RawTimestamp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("message #{index} (id {id}) has an unparseable timestamp {value}")]
    InvalidTimestamp {
        index: usize,
        id: MessageId,
        value: RawTimestamp,
    },
}

/// Converts database messages to the frontend `ChatMessage` format.
///
/// One output per input, same order. Ids become text, role and content are
/// copied as-is, and a timestamp that cannot be read becomes
/// [`ClientTimestamp::Invalid`] rather than an error.
pub fn db_messages_to_client_format(db_messages: &[PersistedMessage]) -> Vec<ChatMessage> {
    db_messages.iter().map(ChatMessage::from).collect()
}

/// Same conversion, but the first unreadable timestamp aborts it.
pub fn try_db_messages_to_client_format(
    db_messages: &[PersistedMessage],
) -> Result<Vec<ChatMessage>, NormalizeError> {
    db_messages
        .iter()
        .enumerate()
        .map(|(index, db_msg)| {
            let message = db_msg.to_client();
            if message.timestamp == ClientTimestamp::Invalid {
                return Err(NormalizeError::InvalidTimestamp {
                    index,
                    id: db_msg.id.clone(),
                    value: db_msg.timestamp.clone(),
                });
            }
            Ok(message)
        })
        .collect()
}
