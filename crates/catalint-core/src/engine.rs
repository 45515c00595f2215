//! The seam between the runner and whatever evaluates rules

use crate::diagnostics::Diagnostic;
use crate::message::MessagePair;
use crate::result::Result;

/// Evaluates a fixed set of rules against one message at a time.
///
/// Implementations are shared across worker threads and must not mutate
/// state during evaluation.
pub trait RuleEngine: Send + Sync {
    /// Diagnostics for `message`, in rule order
    fn evaluate(&self, message: &MessagePair) -> Result<Vec<Diagnostic>>;

    /// Number of rules that take part in evaluation
    fn rule_count(&self) -> usize;
}
