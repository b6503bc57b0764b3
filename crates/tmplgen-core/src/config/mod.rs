//! Manifest loading and resolution
//!
//! Configuration is loaded and merged from these sources (later override
//! earlier):
//!
//! 1. **Project manifest** - `tmplgen.toml`
//! 2. **Local overrides** - `tmplgen.local.toml` (git-ignored)
//!
//! # Example
//!
//! ```ignore
//! use tmplgen_core::config::ConfigResolver;
//!
//! let config = ConfigResolver::new("tmplgen.toml").resolve()?;
//! for (name, input) in &config.resources {
//!     println!("{name} -> {}", input.target);
//! }
//! ```

mod manifest;
mod resolver;

pub use manifest::{BackendSection, Manifest, ResourceSpec, context_to_json};
pub use resolver::{ConfigResolver, LOCAL_MANIFEST_FILE, MANIFEST_FILE, ResolvedConfig};
