pub mod timestamp;
pub mod types;

pub use timestamp::ClientTimestamp;
pub use types::{ChatMessage, Role, UnknownRole};
