//! challenger-backend — Collaborator implementations.
//!
//! Implements the catalog, history, and grading traits from
//! `challenger-core` against a REST backend, plus an in-process mock grader
//! for tests and offline practice.

pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use config::{create_backend, load_config, BackendConfig, ChallengerConfig};
pub use error::BackendError;
pub use http::HttpBackend;
pub use mock::{MockGrader, RecordingSink};
