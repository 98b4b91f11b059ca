//! Boolean filter expressions evaluated in pooled JavaScript runtimes.
//!
//! Building a runtime and loading shared helper scripts is expensive compared
//! to evaluating a one-line filter, so runtimes are cached per asset key and
//! reused. Parameters are bound for a single evaluation and unbound again
//! before the runtime goes back to the pool.
//!
//! ```
//! use jsfilter::Parameters;
//!
//! let params = Parameters::new().set("severity", 2_i64).set("threshold", 2_i64);
//! assert!(jsfilter::evaluate("severity == threshold", &params, None).unwrap());
//! ```

mod error;
mod evaluate;
mod parse;
mod pool;
mod runtime;
mod types;

pub use error::FilterError;
pub use evaluate::Evaluator;
pub use parse::{validate_expression, validate_expressions, SyntaxError};
pub use pool::{Lease, PoolStats, RuntimePool};
pub use types::{
    AssetError, AssetProvider, EvaluatorConfig, FilterAction, FilterSet, Parameters, Scripts,
    StaticAssets, Value, MAX_SAFE_INTEGER,
};

/// Evaluate `expression` with the process-wide [`Evaluator`].
///
/// # Errors
///
/// See [`Evaluator::evaluate`].
pub fn evaluate(
    expression: &str,
    parameters: &Parameters,
    assets: Option<&dyn AssetProvider>,
) -> Result<bool, FilterError> {
    Evaluator::global().evaluate(expression, parameters, assets)
}
