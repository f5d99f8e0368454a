//! # Module abstractions.
//!
//! - [`Module`] - trait for long-lived units with optional start/stop/health
//! - [`Capabilities`] - which of those a module actually exposes
//! - [`Health`] - verdict returned by a health probe
//! - [`ModuleFn`] - closure-backed module implementation
//! - [`ModuleRef`] - shared reference to a module (`Arc<dyn Module>`)

mod module;
mod module_fn;

pub use module::{Capabilities, Health, Module, ModuleRef};
pub use module_fn::ModuleFn;
