pub mod custom;
pub mod tracker;

pub use custom::{CustomSession, CustomSessionStore};
pub use tracker::{SessionDraft, SessionInfo, SessionTracker};
