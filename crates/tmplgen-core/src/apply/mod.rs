//! Multi-resource driver used by the CLI
//!
//! - **plan**: preview actions without side effects
//! - **apply**: create, update, and remove resources to match the manifest
//! - **refresh**: re-read tracked resources
//! - **destroy**: delete tracked resources
//! - **import**: adopt an existing artifact

mod engine;
mod factory;
mod report;

pub use engine::{ApplyEngine, DEFAULT_MAX_PARALLEL};
pub use factory::{HttpServiceFactory, ServiceFactory};
pub use report::{ApplyReport, Plan, ResourceChange};
