//! Typed wrappers for Gherkin step parameters.

use std::str::FromStr;

/// A quoted string value from a feature file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedString(String);

impl FromStr for QuotedString {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim_matches('"').to_owned()))
    }
}

impl QuotedString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the value on whitespace into an argument vector.
    pub fn argv(&self) -> Vec<String> {
        self.0.split_whitespace().map(str::to_owned).collect()
    }
}
