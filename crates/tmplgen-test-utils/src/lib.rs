//! Shared test utilities for the tmplgen workspace.
//!
//! This crate provides test doubles and fixtures shared by the crate test
//! suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`mock`]: scripted in-memory [`tmplgen_client::ArtifactService`]
//! - [`backend`]: stateful fake generation backend served over HTTP
//! - [`project`]: [`TestProject`] temporary directory with manifest helpers

pub mod backend;
pub mod mock;
pub mod project;

pub use backend::FakeBackend;
pub use mock::{Call, MockArtifactService};
pub use project::TestProject;
