pub mod client;

pub use client::{extract_vector_dims, rest_base_url, MilvusClient};
