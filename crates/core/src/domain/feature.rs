use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a priceable bot feature, e.g. `basic_bot`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub String);

impl FeatureId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form used in quotes: `payment_integration` -> `Payment Integration`.
    pub fn display_name(&self) -> String {
        self.0
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Splits a comma-separated feature list, trimming each token and skipping empty ones.
pub fn parse_feature_list(input: &str) -> Vec<FeatureId> {
    input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(FeatureId::from)
        .collect()
}
