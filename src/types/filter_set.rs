use std::fmt;
use std::sync::Arc;

use super::assets::AssetProvider;
use super::parameters::Parameters;
use crate::parse::{validate_expressions, SyntaxError};
use crate::{Evaluator, FilterError};

/// What a [`FilterSet`] does with events whose expressions all match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FilterAction {
    /// Admit only events that match.
    Allow,
    /// Admit only events that do not match.
    Deny,
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAction::Allow => write!(f, "allow"),
            FilterAction::Deny => write!(f, "deny"),
        }
    }
}

/// A named list of expressions that must all be true for an event to match.
///
/// Expressions are syntax-checked once, when the set is built.
///
/// # Example
///
/// ```
/// use jsfilter::{Evaluator, FilterAction, FilterSet, Parameters};
///
/// let filter = FilterSet::new(
///     "only_failures",
///     FilterAction::Allow,
///     ["status !== 0", "occurrences >= 3"],
/// )
/// .unwrap();
///
/// let evaluator = Evaluator::default();
/// let event = Parameters::new().set("status", 2_i64).set("occurrences", 5_i64);
/// assert!(filter.admits(&evaluator, &event).unwrap());
/// ```
#[derive(Clone)]
pub struct FilterSet {
    name: String,
    action: FilterAction,
    expressions: Vec<String>,
    assets: Option<Arc<dyn AssetProvider>>,
}

impl FilterSet {
    /// Build a filter set, validating every expression.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError`] naming the index of the first invalid expression.
    pub fn new<I, S>(name: impl Into<String>, action: FilterAction, expressions: I) -> Result<Self, SyntaxError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let expressions: Vec<String> = expressions.into_iter().map(Into::into).collect();
        validate_expressions(&expressions)?;
        Ok(Self {
            name: name.into(),
            action,
            expressions,
            assets: None,
        })
    }

    /// Load `assets` into the runtimes this set's expressions run in.
    #[must_use]
    pub fn with_assets(mut self, assets: Arc<dyn AssetProvider>) -> Self {
        self.assets = Some(assets);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn action(&self) -> FilterAction {
        self.action
    }

    #[must_use]
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    /// Returns `true` if every expression is true, stopping at the first false one.
    ///
    /// An empty set matches everything.
    ///
    /// # Errors
    ///
    /// Returns the first [`FilterError`] raised by an expression.
    pub fn matches(&self, evaluator: &Evaluator, parameters: &Parameters) -> Result<bool, FilterError> {
        let assets = self.assets.as_deref();
        for expression in &self.expressions {
            if !evaluator.evaluate(expression, parameters, assets)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Apply the set's action: allow sets admit matches, deny sets reject them.
    ///
    /// # Errors
    ///
    /// Returns the first [`FilterError`] raised by an expression.
    pub fn admits(&self, evaluator: &Evaluator, parameters: &Parameters) -> Result<bool, FilterError> {
        let matched = self.matches(evaluator, parameters)?;
        Ok(match self.action {
            FilterAction::Allow => matched,
            FilterAction::Deny => !matched,
        })
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("expressions", &self.expressions)
            .field("assets", &self.assets.as_ref().map(|a| a.key().to_owned()))
            .finish()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilterSet({}, {}, {} expressions)",
            self.name,
            self.action,
            self.expressions.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticAssets;

    #[test]
    fn rejects_invalid_expression_with_index() {
        let err = FilterSet::new("f", FilterAction::Allow, ["a+1", "a+*1", "b-1"]).unwrap_err();
        assert_eq!(err.index(), Some(1));
    }

    #[test]
    fn allow_admits_matches() {
        let evaluator = Evaluator::default();
        let filter = FilterSet::new("f", FilterAction::Allow, ["x > 1", "y === 'on'"]).unwrap();
        let hit = Parameters::new().set("x", 2_i64).set("y", "on");
        let miss = Parameters::new().set("x", 2_i64).set("y", "off");
        assert!(filter.admits(&evaluator, &hit).unwrap());
        assert!(!filter.admits(&evaluator, &miss).unwrap());
    }

    #[test]
    fn deny_rejects_matches() {
        let evaluator = Evaluator::default();
        let filter = FilterSet::new("f", FilterAction::Deny, ["silenced"]).unwrap();
        assert!(!filter
            .admits(&evaluator, &Parameters::new().set("silenced", true))
            .unwrap());
        assert!(filter
            .admits(&evaluator, &Parameters::new().set("silenced", false))
            .unwrap());
    }

    #[test]
    fn short_circuits_on_first_false() {
        let evaluator = Evaluator::default();
        // The second expression would throw if it ran.
        let filter = FilterSet::new("f", FilterAction::Allow, ["false", "missing.property"]).unwrap();
        assert!(!filter.matches(&evaluator, &Parameters::new()).unwrap());
    }

    #[test]
    fn empty_set_matches() {
        let evaluator = Evaluator::default();
        let filter = FilterSet::new("f", FilterAction::Allow, Vec::<String>::new()).unwrap();
        assert!(filter.matches(&evaluator, &Parameters::new()).unwrap());
    }

    #[test]
    fn uses_attached_assets() {
        let evaluator = Evaluator::default();
        let assets = StaticAssets::new("fs-helpers").script("h.js", "function isHot(t) { return t > 30; }");
        let filter = FilterSet::new("f", FilterAction::Allow, ["isHot(temp)"])
            .unwrap()
            .with_assets(Arc::new(assets));
        assert!(filter.matches(&evaluator, &Parameters::new().set("temp", 35_i64)).unwrap());
        assert!(evaluator.pool_stats("fs-helpers").unwrap().loaded);
    }

    #[test]
    fn display() {
        let filter = FilterSet::new("f", FilterAction::Deny, ["a", "b"]).unwrap();
        assert_eq!(filter.to_string(), "FilterSet(f, deny, 2 expressions)");
        assert_eq!(filter.expressions().len(), 2);
        assert_eq!(filter.name(), "f");
        assert_eq!(filter.action(), FilterAction::Deny);
    }
}
