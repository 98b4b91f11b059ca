mod error;
mod grammar;

use rquickjs::{CatchResultExt, Context, Runtime};

use crate::runtime::{compile_only, scoped_source};

pub use error::SyntaxError;
pub(crate) use grammar::is_bindable_name;

/// Parse every expression without executing it, failing on the first one that
/// does not parse.
///
/// Expressions are compiled in a throwaway runtime that never runs any code, so
/// this is safe to call on untrusted configuration and does not touch the
/// runtime pool. Each expression is compiled exactly as evaluation would run
/// it, so the two always agree on what is valid syntax.
///
/// # Errors
///
/// Returns [`SyntaxError`] carrying the zero-based index of the first invalid
/// expression and the parser's diagnostic.
///
/// # Example
///
/// ```
/// let err = jsfilter::validate_expressions(["a+1", "a+*1", "b-1"]).unwrap_err();
/// assert_eq!(err.index(), Some(1));
/// ```
pub fn validate_expressions<I, S>(expressions: I) -> Result<(), SyntaxError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let runtime = Runtime::new().map_err(|e| SyntaxError::new(None, e.to_string()))?;
    let context = Context::full(&runtime).map_err(|e| SyntaxError::new(None, e.to_string()))?;
    context.with(|ctx| {
        for (index, expression) in expressions.into_iter().enumerate() {
            compile_only(&ctx, &scoped_source(expression.as_ref()))
                .catch(&ctx)
                .map_err(|e| SyntaxError::new(Some(index), e.to_string()))?;
        }
        Ok(())
    })
}

/// Parse a single expression without executing it.
///
/// # Errors
///
/// Returns [`SyntaxError`] with `index` of `Some(0)`.
pub fn validate_expression(expression: &str) -> Result<(), SyntaxError> {
    validate_expressions([expression])
}
