//! Reusable test utilities:
//! - An in-memory cloud provider implementing the operations boundary
//! - Builders for instances, policies and seeded snapshots

// Allow unused code in test fixtures - they are utilities shared across test files
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_cloud;
pub mod test_data;

pub use mock_cloud::MockCloud;
pub use test_data::*;
