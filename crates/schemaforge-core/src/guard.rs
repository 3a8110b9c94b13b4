//! Recursion guard for self-referential embedded structures.

/// Outcome of a depth check.
///
/// `LimitReached` is not an error: the caller substitutes an empty
/// placeholder schema and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthCheck {
    /// Depth is within the limit; expand.
    Within,
    /// Depth is past the limit; emit the empty placeholder.
    LimitReached,
}

/// Bounds how deep embedded structures are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursionGuard {
    limit: usize,
}

impl RecursionGuard {
    /// Create a guard that expands depths `0..=limit`.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Deepest depth still expanded.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check a depth against the limit.
    pub fn check(&self, depth: usize) -> DepthCheck {
        if depth <= self.limit {
            DepthCheck::Within
        } else {
            DepthCheck::LimitReached
        }
    }

    /// Shorthand for `check(depth) == DepthCheck::Within`.
    pub fn allows(&self, depth: usize) -> bool {
        self.check(depth) == DepthCheck::Within
    }
}

impl Default for RecursionGuard {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_DEPTH)
    }
}
