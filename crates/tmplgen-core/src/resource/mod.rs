//! Resource model: declared inputs and persisted state

mod input;
mod state;

pub use input::{Connection, DeclaredInput, TemplateSource};
pub use state::{ObservedOutput, ResourceState};
