use std::time::Duration;

/// Limits applied to every runtime an [`Evaluator`](crate::Evaluator) creates.
///
/// All limits default to unset, which matches an unbounded pool with no
/// execution budget.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use jsfilter::EvaluatorConfig;
///
/// let config = EvaluatorConfig::new()
///     .execution_budget(Duration::from_millis(50))
///     .max_idle_per_key(16);
/// assert_eq!(config.max_idle(), Some(16));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct EvaluatorConfig {
    /// Heap limit per runtime, in bytes.
    pub memory_limit: Option<usize>,
    /// Stack limit per runtime, in bytes.
    pub max_stack_size: Option<usize>,
    /// Wall-clock budget for one expression or one helper script.
    #[cfg_attr(feature = "serde", serde(rename = "execution_budget_ms", with = "millis"))]
    pub execution_budget: Option<Duration>,
    /// Idle runtimes kept per key; extra released runtimes are dropped.
    pub max_idle_per_key: Option<usize>,
}

impl EvaluatorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    #[must_use]
    pub fn max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = Some(bytes);
        self
    }

    /// Abort any expression or helper script running longer than `budget`.
    ///
    /// A runtime that hits the budget is dropped instead of being pooled again.
    #[must_use]
    pub fn execution_budget(mut self, budget: Duration) -> Self {
        self.execution_budget = Some(budget);
        self
    }

    #[must_use]
    pub fn max_idle_per_key(mut self, max: usize) -> Self {
        self.max_idle_per_key = Some(max);
        self
    }

    #[must_use]
    pub fn max_idle(&self) -> Option<usize> {
        self.max_idle_per_key
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
