//! Execution resource limits.
//!
//! The evaluator is a tree-walker, so script recursion consumes host stack.
//! The call-depth limit turns runaway recursion into a structured runtime
//! error before the host stack is exhausted. Execution is otherwise
//! unbounded; a host wanting timeouts or step limits imposes them externally,
//! for example through a counting native function.

/// Default maximum script call depth.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Limits applied by an [`Evaluator`](crate::Evaluator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum nesting of script function calls; `None` disables the check.
    pub max_call_depth: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
        }
    }
}

impl ResourceLimits {
    /// Disables every limit.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { max_call_depth: None }
    }

    #[must_use]
    pub fn with_max_call_depth(depth: usize) -> Self {
        Self {
            max_call_depth: Some(depth),
        }
    }

    /// True when `depth` is still within bounds.
    pub(crate) fn allows_depth(&self, depth: usize) -> bool {
        match self.max_call_depth {
            Some(limit) => depth < limit,
            None => true,
        }
    }
}
