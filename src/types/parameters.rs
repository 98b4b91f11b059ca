use std::collections::HashMap;

use super::Value;

/// Named values bound into a runtime for the duration of one evaluation.
///
/// Supports dot-separated paths like `"event.check.status"`, which bind a
/// single top-level `event` object with nested properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    data: HashMap<String, Value>,
}

impl Parameters {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dot-separated path. Creates intermediate maps as needed.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value.into());
        self
    }

    /// Insert a value at a dot-separated path (mutable reference version).
    pub fn insert(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        Self::insert_recursive(&mut self.data, &segments, value);
    }

    /// Look up a value by dot-separated path.
    ///
    /// Unlike leaf-only lookups, an intermediate path returns the nested map.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.data.get(first)?, |current, segment| match current {
            Value::Map(nested) => nested.get(segment),
            _ => None,
        })
    }

    /// Top-level names, i.e. the names bound into the runtime.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Top-level `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn insert_recursive(map: &mut HashMap<String, Value>, segments: &[&str], value: Value) {
        match segments {
            [] => {}
            [last] => {
                map.insert((*last).to_owned(), value);
            }
            [first, rest @ ..] => {
                let entry = map
                    .entry((*first).to_owned())
                    .or_insert_with(|| Value::Map(HashMap::new()));
                if let Value::Map(nested) = entry {
                    Self::insert_recursive(nested, rest, value);
                } else {
                    let mut nested = HashMap::new();
                    Self::insert_recursive(&mut nested, rest, value);
                    *entry = Value::Map(nested);
                }
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    /// Collects top-level names verbatim; keys are not split on dots.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
