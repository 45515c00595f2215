//! Catalint Rules
//!
//! Rule file loading, pattern compilation, filters, exception evaluation
//! and the message evaluator that plugs into the core catalog runner.

pub mod compiler;
pub mod definition;
pub mod evaluator;
pub mod exceptions;
pub mod filters;
pub mod hint;
pub mod loader;
pub mod pattern;
pub mod repository;
pub mod rule;
pub mod rule_set;
pub mod syntax;

// Re-export commonly used types
pub use compiler::RuleCompiler;
pub use definition::{
    FilterDefinition, FilterTargets, RuleDefinition, RuleOrigin, TestDefinition,
    TriggerDefinition, ValidDefinition,
};
pub use evaluator::MessageEvaluator;
pub use exceptions::{MatchContext, TestKind, ValidEntry, ValidTest, is_suppressed};
pub use filters::FilterSet;
pub use loader::{RuleLoader, rule_files_in};
pub use pattern::{CompiledPattern, PatternCache, PatternError, PatternMatch};
pub use repository::RuleRepository;
pub use rule::{CompiledTrigger, Rule, RuleSummary};
pub use rule_set::{RuleSet, RuleSetOptions};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
