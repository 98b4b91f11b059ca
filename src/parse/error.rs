use std::fmt;

/// An expression failed to parse.
///
/// When produced while validating a batch, `index` is the zero-based position
/// of the offending expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    index: Option<usize>,
    diagnostic: String,
}

impl SyntaxError {
    pub(crate) fn new(index: Option<usize>, diagnostic: impl Into<String>) -> Self {
        Self {
            index,
            diagnostic: diagnostic.into(),
        }
    }

    /// Position of the expression within the validated batch.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The parser's diagnostic message.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "syntax error in expression {index}: {}", self.diagnostic),
            None => write!(f, "syntax error: {}", self.diagnostic),
        }
    }
}

impl std::error::Error for SyntaxError {}
