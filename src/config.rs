use crate::catalog::types::Engine;
use crate::diff::DiffScope;
use crate::error::MergeError;
use serde::{Deserialize, Serialize};

/// Runtime configuration for a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Dialect used for type synonyms, default-value and view comparisons.
    pub engine: Engine,
    pub diff_scope: DiffScope,
    /// Rebuild column catalogs against the merged schema after provenance
    /// is applied.
    pub align_column_catalogs: bool,
    /// Upper bound on named objects in any single input snapshot.
    pub max_schema_objects: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Unspecified,
            diff_scope: DiffScope::Full,
            align_column_catalogs: true,
            max_schema_objects: 1_000_000,
        }
    }
}

impl MergeConfig {
    pub fn mysql() -> Self {
        Self::default().with_engine(Engine::Mysql)
    }

    pub fn tidb() -> Self {
        Self::default().with_engine(Engine::Tidb)
    }

    pub fn postgres() -> Self {
        Self::default().with_engine(Engine::Postgres)
    }

    /// Tables, columns and foreign keys only; indexes, partitions and
    /// routines are neither diffed nor merged.
    pub fn tables_only() -> Self {
        Self {
            diff_scope: DiffScope::TablesOnly,
            ..Self::default()
        }
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.max_schema_objects == 0 {
            return Err(MergeError::InvalidConfig {
                message: "max_schema_objects must be > 0".into(),
            });
        }
        Ok(())
    }
}
