use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Database,
    Schema,
    Table,
    Column,
    Index,
    ForeignKey,
    Partition,
    View,
    Function,
    Procedure,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Database => write!(f, "database"),
            ResourceType::Schema => write!(f, "schema"),
            ResourceType::Table => write!(f, "table"),
            ResourceType::Column => write!(f, "column"),
            ResourceType::Index => write!(f, "index"),
            ResourceType::ForeignKey => write!(f, "foreign key"),
            ResourceType::Partition => write!(f, "partition"),
            ResourceType::View => write!(f, "view"),
            ResourceType::Function => write!(f, "function"),
            ResourceType::Procedure => write!(f, "procedure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeErrorCode {
    Io,
    Encode,
    Decode,
    Validation,
    InvalidConfig,
    Precondition,
    SchemaNotFound,
    TableNotFound,
    ColumnNotFound,
    IndexNotFound,
    ForeignKeyNotFound,
    PartitionNotFound,
    ViewNotFound,
    FunctionNotFound,
    ProcedureNotFound,
    Conflict,
}

impl MergeErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeErrorCode::Io => "io",
            MergeErrorCode::Encode => "encode",
            MergeErrorCode::Decode => "decode",
            MergeErrorCode::Validation => "validation",
            MergeErrorCode::InvalidConfig => "invalid_config",
            MergeErrorCode::Precondition => "precondition",
            MergeErrorCode::SchemaNotFound => "schema_not_found",
            MergeErrorCode::TableNotFound => "table_not_found",
            MergeErrorCode::ColumnNotFound => "column_not_found",
            MergeErrorCode::IndexNotFound => "index_not_found",
            MergeErrorCode::ForeignKeyNotFound => "foreign_key_not_found",
            MergeErrorCode::PartitionNotFound => "partition_not_found",
            MergeErrorCode::ViewNotFound => "view_not_found",
            MergeErrorCode::FunctionNotFound => "function_not_found",
            MergeErrorCode::ProcedureNotFound => "procedure_not_found",
            MergeErrorCode::Conflict => "conflict",
        }
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("{resource_type} '{resource_id}' not found")]
    NotFound {
        resource_type: ResourceType,
        resource_id: String,
    },
    #[error("merge conflict: {0}")]
    Conflict(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MergeError>,
    },
}

impl MergeError {
    pub fn not_found(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        MergeError::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    /// Innermost error of a breadcrumb chain.
    pub fn root(&self) -> &MergeError {
        let mut current = self;
        while let MergeError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), MergeError::Conflict(_))
    }

    pub fn code(&self) -> MergeErrorCode {
        match self {
            MergeError::Io(_) => MergeErrorCode::Io,
            MergeError::Encode(_) => MergeErrorCode::Encode,
            MergeError::Decode(_) => MergeErrorCode::Decode,
            MergeError::Validation(_) => MergeErrorCode::Validation,
            MergeError::InvalidConfig { .. } => MergeErrorCode::InvalidConfig,
            MergeError::Precondition(_) => MergeErrorCode::Precondition,
            MergeError::NotFound { resource_type, .. } => match resource_type {
                ResourceType::Database | ResourceType::Schema => MergeErrorCode::SchemaNotFound,
                ResourceType::Table => MergeErrorCode::TableNotFound,
                ResourceType::Column => MergeErrorCode::ColumnNotFound,
                ResourceType::Index => MergeErrorCode::IndexNotFound,
                ResourceType::ForeignKey => MergeErrorCode::ForeignKeyNotFound,
                ResourceType::Partition => MergeErrorCode::PartitionNotFound,
                ResourceType::View => MergeErrorCode::ViewNotFound,
                ResourceType::Function => MergeErrorCode::FunctionNotFound,
                ResourceType::Procedure => MergeErrorCode::ProcedureNotFound,
            },
            MergeError::Conflict(_) => MergeErrorCode::Conflict,
            MergeError::Context { source, .. } => source.code(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }
}

/// Breadcrumb helpers: every layer wraps errors with the object it was
/// processing so a nested failure reads as one chain.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, MergeError>;

    fn with_context<F, S>(self, f: F) -> Result<T, MergeError>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T, MergeError> {
    fn context(self, context: impl Into<String>) -> Result<T, MergeError> {
        self.map_err(|source| MergeError::Context {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T, MergeError>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| MergeError::Context {
            context: f().into(),
            source: Box::new(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MergeError, MergeErrorCode, ResourceType, ResultExt};

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(MergeErrorCode::TableNotFound.as_str(), "table_not_found");
        assert_eq!(
            MergeErrorCode::ForeignKeyNotFound.as_str(),
            "foreign_key_not_found"
        );
        assert_eq!(MergeErrorCode::Conflict.as_str(), "conflict");
    }

    #[test]
    fn error_code_str_matches_variant_mapping() {
        let err = MergeError::not_found(ResourceType::Table, "public.users");
        assert_eq!(err.code(), MergeErrorCode::TableNotFound);
        assert_eq!(err.code_str(), "table_not_found");
        assert_eq!(err.to_string(), "table 'public.users' not found");
    }

    #[test]
    fn context_chain_reads_outer_to_inner() {
        let result: Result<(), MergeError> =
            Err(MergeError::not_found(ResourceType::Column, "email"));
        let err = result
            .context("failed to apply diff to table \"users\"")
            .with_context(|| format!("failed to apply diff to schema {:?}", "public"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to apply diff to schema \"public\": failed to apply diff to table \"users\": column 'email' not found"
        );
        assert_eq!(err.code(), MergeErrorCode::ColumnNotFound);
        assert!(!err.is_conflict());
    }

    #[test]
    fn conflict_displays_merge_prefix() {
        let err =
            MergeError::Conflict("conflict column type, one is int, the other is text".into());
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "merge conflict: conflict column type, one is int, the other is text"
        );
    }
}
