// ============================================================================
// PARAMETERS — ordered name → value map handed to every operation
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered mapping from parameter name to numeric value.
///
/// All operation inputs travel through this map as doubles; integers (counts,
/// radii, thresholds) are truncated by the consuming operation. Missing keys
/// fall back to a caller-supplied default, which is also how persisted
/// pipelines tolerate parameter sets from older saves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, f64>);

impl Parameters {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Value for `name`, or `default` when the key is absent.
    pub fn get(&self, name: &str, default: f64) -> f64 {
        self.0.get(name).copied().unwrap_or(default)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) -> &mut Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
