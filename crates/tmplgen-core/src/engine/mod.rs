//! Reconciliation engine
//!
//! - **decision**: the pure update decision ([`decide_update`])
//! - **reconciler**: orchestration of backend calls for each lifecycle path
//!
//! Backend calls within one operation are strictly ordered:
//!
//! ```text
//! update:  delete(old target)? -> template status -> generate? -> template status
//! create:  generate -> template status
//! read:    status -> template status
//! ```
//!
//! Only the relocation delete and template status calls are advisory; their
//! failures become warnings. Cancellation is always fatal.

mod decision;
mod reconciler;

pub use decision::{Action, RegenerateReason, TemplateObservation, decide_update};
pub use reconciler::{Applied, ReadOutcome, Reconciler};
