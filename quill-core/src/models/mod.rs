//! Domain models shared by the server and its loaders.
//!
//! Ids are newtypes so a `UserId` can never be passed where a `PostId`
//! is expected.

pub mod post;
pub mod user;
pub mod validation;

pub use post::{NewPost, Post, PostChanges, PostId, PostStatus};
pub use user::{NewUser, User, UserChanges, UserId};
pub use validation::ValidationError;
