use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database engine the snapshots were taken from. Only affects the
/// equivalence rules used while merging (column type synonyms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Engine {
    #[default]
    Unspecified,
    Mysql,
    Tidb,
    Postgres,
    Oracle,
    Mssql,
    Sqlite,
    Snowflake,
    Clickhouse,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Unspecified => "UNSPECIFIED",
            Engine::Mysql => "MYSQL",
            Engine::Tidb => "TIDB",
            Engine::Postgres => "POSTGRES",
            Engine::Oracle => "ORACLE",
            Engine::Mssql => "MSSQL",
            Engine::Sqlite => "SQLITE",
            Engine::Snowflake => "SNOWFLAKE",
            Engine::Clickhouse => "CLICKHOUSE",
        }
    }

    /// Engines speaking the MySQL type dialect.
    pub fn is_mysql_family(self) -> bool {
        matches!(self, Engine::Mysql | Engine::Tidb)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "UNSPECIFIED" => Ok(Engine::Unspecified),
            "MYSQL" => Ok(Engine::Mysql),
            "TIDB" => Ok(Engine::Tidb),
            "POSTGRES" | "POSTGRESQL" => Ok(Engine::Postgres),
            "ORACLE" => Ok(Engine::Oracle),
            "MSSQL" => Ok(Engine::Mssql),
            "SQLITE" => Ok(Engine::Sqlite),
            "SNOWFLAKE" => Ok(Engine::Snowflake),
            "CLICKHOUSE" => Ok(Engine::Clickhouse),
            other => Err(format!("unknown engine: {other}")),
        }
    }
}

/// Column default: no default at all, an explicit `DEFAULT NULL`, or an
/// expression kept verbatim as the engine reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    #[default]
    None,
    Null,
    Expression(String),
}

impl DefaultValue {
    pub fn expression(expr: impl Into<String>) -> Self {
        DefaultValue::Expression(expr.into())
    }

    pub fn as_expression(&self) -> Option<&str> {
        match self {
            DefaultValue::Expression(expr) => Some(expr),
            _ => None,
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::None => f.write_str("<none>"),
            DefaultValue::Null => f.write_str("NULL"),
            DefaultValue::Expression(expr) => f.write_str(expr),
        }
    }
}
