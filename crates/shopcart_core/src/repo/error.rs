//! Repository error taxonomy.

use crate::db::DbError;
use crate::repo::entity::EntityId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse classification callers use to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller bug; fails before the store is touched.
    Precondition,
    /// The store rejected or could not serve the operation.
    Store,
    /// The unit of work was already disposed.
    Lifecycle,
}

/// Error for repository and unit-of-work operations.
///
/// "No match" is never an error here: reads return an empty `Vec` or `None`.
#[derive(Debug)]
pub enum RepoError {
    /// Invalid argument or staging sequence.
    Precondition(String),
    /// Entity is neither tracked by this unit of work nor staged for insert.
    Detached { table: &'static str, id: EntityId },
    /// Inclusion list names a relation the entity does not have.
    UnknownRelation {
        name: String,
        expected: Vec<&'static str>,
    },
    /// Connection schema is not at the migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    Db(DbError),
    /// A staged update/delete matched no row at commit time.
    Conflict { table: &'static str, id: EntityId },
    /// Persisted row cannot be converted into its entity type.
    InvalidData(String),
    Disposed,
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) | Self::Detached { .. } | Self::UnknownRelation { .. } => {
                ErrorKind::Precondition
            }
            Self::UninitializedConnection { .. }
            | Self::Db(_)
            | Self::Conflict { .. }
            | Self::InvalidData(_) => ErrorKind::Store,
            Self::Disposed => ErrorKind::Lifecycle,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Precondition(message) => write!(f, "precondition violated: {message}"),
            Self::Detached { table, id } => write!(
                f,
                "entity {table}#{id} is not tracked by this unit of work; fetch it first"
            ),
            Self::UnknownRelation { name, expected } => write!(
                f,
                "unknown relation `{name}`; expected one of [{}]",
                expected.join(", ")
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "unit of work requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict { table, id } => write!(
                f,
                "concurrency conflict: {table}#{id} no longer exists in the store"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Disposed => write!(f, "unit of work has been disposed"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::FromSqlConversionFailure(index, _, source) => {
                Self::InvalidData(format!("column {index}: {source}"))
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}
