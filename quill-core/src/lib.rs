pub mod loader;
pub mod models;

pub use loader::{BatchFetch, BatchLoader, Keyed};
pub use models::{Post, PostId, PostStatus, User, UserId, ValidationError};
