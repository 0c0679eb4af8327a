//! Valuation run configuration
//!
//! ```json
//! {
//!   "engine": "commutation",
//!   "tables_dir": "data",
//!   "tables": ["DAV1994T", "DAV2008T"],
//!   "include_builtin": true
//! }
//! ```
//!
//! Every field is optional; missing fields take the values of
//! [`ValuationConfig::default`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};
use crate::mortality::loader::{load_table, DEFAULT_TABLES_PATH};
use crate::mortality::{MortalityTables, TableId};
use crate::present_value::{build_provider, EngineKind, PresentValueProvider};

fn default_tables_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TABLES_PATH)
}

fn default_include_builtin() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Present-value formulation
    #[serde(default)]
    pub engine: EngineKind,

    /// Directory holding `<TABLE>.csv` files
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,

    /// Tables to load from `tables_dir`
    #[serde(default)]
    pub tables: Vec<TableId>,

    /// Register the compiled-in IAM 2012 tables
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            tables_dir: default_tables_dir(),
            tables: Vec::new(),
            include_builtin: true,
        }
    }
}

impl ValuationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ValuationError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ValuationError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the table registry this configuration describes
    ///
    /// A CSV table replaces a built-in table with the same identifier.
    pub fn load_tables(&self) -> Result<MortalityTables> {
        let mut tables = if self.include_builtin {
            MortalityTables::builtin()
        } else {
            MortalityTables::new()
        };

        for &id in &self.tables {
            tables.insert(load_table(&self.tables_dir, id)?);
        }

        info!(
            "Registered {} mortality table(s): {}",
            tables.len(),
            tables.ids().map(|id| id.name()).collect::<Vec<_>>().join(", ")
        );
        Ok(tables)
    }

    /// Load the tables and build the configured engine over them
    pub fn provider(&self) -> Result<Box<dyn PresentValueProvider>> {
        let tables = Arc::new(self.load_tables()?);
        Ok(build_provider(self.engine, tables))
    }
}
