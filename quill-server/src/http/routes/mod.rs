//! Route handlers, one module per resource

pub mod health;
pub mod posts;
pub mod users;

use serde::Deserialize;

/// `?limit=` on list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}
