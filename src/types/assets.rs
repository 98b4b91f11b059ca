use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use thiserror::Error;

/// Script readers keyed by script name. Scripts run in ascending name order.
///
/// Dropping the map closes every reader.
pub type Scripts = BTreeMap<String, Box<dyn Read + Send>>;

/// Supplies the shared helper scripts loaded into every runtime for a key.
///
/// Two providers returning the same [`key`](AssetProvider::key) are assumed to
/// supply the same scripts; runtimes are pooled per key.
pub trait AssetProvider: Send + Sync {
    /// Identifies the script set. The empty string is reserved for "no assets"
    /// and is refused when it comes from a provider.
    fn key(&self) -> &str;

    /// Open every script for this key.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the scripts cannot be supplied.
    fn scripts(&self) -> Result<Scripts, AssetError>;
}

/// The asset provider failed to supply scripts.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AssetError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AssetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// In-memory asset provider.
///
/// ```
/// use jsfilter::{AssetProvider, StaticAssets};
///
/// let assets = StaticAssets::new("helpers-v1")
///     .script("math.js", "function double(x) { return x * 2; }");
/// assert_eq!(assets.key(), "helpers-v1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticAssets {
    key: String,
    scripts: BTreeMap<String, String>,
}

impl StaticAssets {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scripts: BTreeMap::new(),
        }
    }

    /// Add a named script. A later script with the same name replaces the earlier one.
    #[must_use]
    pub fn script(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.scripts.insert(name.into(), source.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl AssetProvider for StaticAssets {
    fn key(&self) -> &str {
        &self.key
    }

    fn scripts(&self) -> Result<Scripts, AssetError> {
        Ok(self
            .scripts
            .iter()
            .map(|(name, source)| {
                let reader: Box<dyn Read + Send> = Box::new(Cursor::new(source.clone().into_bytes()));
                (name.clone(), reader)
            })
            .collect())
    }
}
