//! Pool configuration - size class declarations and alignment slack
//!
//! Loaded from TOML:
//!
//! ```toml
//! [alignment]
//! slack = 256
//!
//! [[classes]]
//! capacity = 1000
//! size = 4096
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::align::{DEFAULT_SLACK, MIN_SLACK};
use crate::error::{PoolError, Result};

/// Environment variable naming a TOML file for [`PoolConfig::from_env`]
pub const CONFIG_ENV: &str = "BYTEPOOL_CONFIG";

/// Classes in the default pool
const DEFAULT_CLASS_COUNT: usize = 7;
const DEFAULT_CLASS_STEP: usize = 4096;
const DEFAULT_CLASS_CAPACITY: usize = 1000;

/// One size class declaration: keep up to `capacity` idle buffers of `size`
/// bytes (before alignment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub capacity: usize,
    pub size: usize,
}

impl ClassSpec {
    #[inline]
    pub const fn new(capacity: usize, size: usize) -> Self {
        Self { capacity, size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    #[serde(default = "default_slack")]
    pub slack: usize,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            slack: DEFAULT_SLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub alignment: AlignmentConfig,

    #[serde(default = "default_classes")]
    pub classes: Vec<ClassSpec>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            alignment: AlignmentConfig::default(),
            classes: default_classes(),
        }
    }
}

impl PoolConfig {
    pub fn new(classes: Vec<ClassSpec>) -> Self {
        Self {
            alignment: AlignmentConfig::default(),
            classes,
        }
    }

    pub fn with_slack(mut self, slack: usize) -> Self {
        self.alignment.slack = slack;
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Load from the file named by `BYTEPOOL_CONFIG`, or the default pool layout
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PoolError::Config {
            message: e.to_string(),
        })
    }

    /// Reject zero sizes and capacities, and a slack that would let the
    /// default policy shrink a request
    pub fn validate(&self) -> Result<()> {
        if self.alignment.slack < MIN_SLACK {
            return Err(PoolError::Config {
                message: format!(
                    "alignment slack {} is below the minimum of {}",
                    self.alignment.slack, MIN_SLACK
                ),
            });
        }
        validate_classes(&self.classes)
    }
}

pub(crate) fn validate_classes(classes: &[ClassSpec]) -> Result<()> {
    for (index, spec) in classes.iter().enumerate() {
        if spec.capacity == 0 || spec.size == 0 {
            return Err(PoolError::InvalidClass {
                index,
                capacity: spec.capacity,
                size: spec.size,
            });
        }
    }
    Ok(())
}

fn default_slack() -> usize {
    DEFAULT_SLACK
}

fn default_classes() -> Vec<ClassSpec> {
    (1..=DEFAULT_CLASS_COUNT)
        .map(|i| ClassSpec::new(DEFAULT_CLASS_CAPACITY, DEFAULT_CLASS_STEP * i))
        .collect()
}
