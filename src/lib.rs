pub mod common;
pub mod config;
pub mod normalize;
pub mod page;
pub mod routing;
pub mod session;
pub mod storage;

pub use common::{ChatMessage, ClientTimestamp, Role};
pub use normalize::{NormalizeError, db_messages_to_client_format, try_db_messages_to_client_format};
pub use routing::{PreparationRoute, RouteError};
pub use storage::{MessageId, PersistedMessage, RawTimestamp};
