//! Configuration files and their discovery

mod catalint_config;
mod loader;

pub use catalint_config::{CatalintConfig, RuleSeverity};
pub use loader::ConfigLoader;
