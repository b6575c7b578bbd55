//! # Provisioner Testing Utils
//!
//! Shared testing utilities for the provisioning worker workspace.
//!
//! ## Features
//!
//! - **Mock Job Queue**: in-memory `JobQueue` that records every update and log entry
//! - **Mock Provider**: scripted `ProvisionProvider` with per-job failure injection
//! - **Test Data Builders**: `ProvisionJobBuilder` with sensible defaults
//! - **Helpers**: fixed timestamps, a valid configuration map, async wait helpers
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! provisioner-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use provisioner_testing_utils::{MockJobQueue, ProvisionJobBuilder};
//!
//! let queue = MockJobQueue::new();
//! queue.push_batch(vec![ProvisionJobBuilder::new().with_id("job-1").build()]);
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
