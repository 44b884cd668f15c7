pub mod health;
pub mod query;

pub use health::{health_handler, ready_handler};
pub use query::query_handler;
