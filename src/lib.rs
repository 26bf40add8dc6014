pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod merge;
pub mod offline;

pub use crate::catalog::config::DatabaseConfig;
pub use crate::catalog::schema::DatabaseSchema;
pub use crate::catalog::types::{DefaultValue, Engine};
pub use crate::config::MergeConfig;
pub use crate::diff::{ChangeEntry, DiffAction, DiffScope, DiffTree, diff_metadata};
pub use crate::error::{MergeError, MergeErrorCode, ResourceType};
pub use crate::merge::conflict::Conflict;
pub use crate::merge::{MergedDatabase, try_merge, try_merge_into};
