pub mod health;
pub mod hybrid_search;

pub use health::{health_handler, ready_handler};
pub use hybrid_search::{build_handler, hybrid_search_handler};
