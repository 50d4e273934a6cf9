// config lets you read a separate config file
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{FactError, Result};

pub const DEFAULT_NESTED_SEPARATOR: &str = "__";

/// Settings that shape how named constructor keys are read.
///
/// Loaded from an optional file (format inferred from its extension) and
/// overridden by `FACTUM_*` environment variables, e.g.
/// `FACTUM_NESTED_SEPARATOR=.`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Splits a compound key into its base field and nested path.
    pub nested_separator: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nested_separator: DEFAULT_NESTED_SEPARATOR.to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("FACTUM"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
    pub fn validate(&self) -> Result<()> {
        if self.nested_separator.is_empty() {
            return Err(FactError::Config(
                "nested_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
