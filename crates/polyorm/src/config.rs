//! Session configuration loaded from code or JSON.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use serde::{Deserialize, Serialize};

const DEFAULT_BATCH_SIZE: usize = 500;

/// Session configuration.
///
/// The dialect has no default: it must be named in code or in the
/// deserialized document.
///
/// ```ignore
/// use polyorm::{Dialect, OrmConfig};
///
/// let config = OrmConfig::new(Dialect::MySql).batch_size(200);
/// let config = OrmConfig::from_json(r#"{ "dialect": "postgres", "batch_size": 100 }"#)?;
/// # Ok::<(), polyorm::OrmError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrmConfig {
    pub dialect: Dialect,
    /// Maximum objects per INSERT statement in `Session::create`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fail multi-chunk creates when the driver has no transactions.
    #[serde(default)]
    pub require_transactions: bool,
    /// Log UPDATE/DELETE statements that have no WHERE clause.
    #[serde(default = "default_true")]
    pub warn_unscoped_mutations: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

impl OrmConfig {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            batch_size: DEFAULT_BATCH_SIZE,
            require_transactions: false,
            warn_unscoped_mutations: true,
        }
    }

    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> OrmResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OrmError::invalid_config(format!("invalid ORM config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn require_transactions(mut self, required: bool) -> Self {
        self.require_transactions = required;
        self
    }

    pub fn warn_unscoped_mutations(mut self, enabled: bool) -> Self {
        self.warn_unscoped_mutations = enabled;
        self
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.batch_size == 0 {
            return Err(OrmError::invalid_config("batch_size must be greater than zero"));
        }
        Ok(())
    }
}
