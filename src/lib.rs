/*!
 *! # doculite
 *! Embedded, single-file document database: paged storage, a write-ahead log,
 *! snapshot-isolated transactions, a skip-list secondary index and an
 *! HNSW-style vector index, all persisted inside the same page grid.
 */

#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

use crate::bson::Value;
use crate::engine::{BasePage, PageType};
use std::fmt::Display;

#[macro_use]
pub mod bson;
pub mod engine;
pub mod expression;
mod utils;

#[cfg(feature = "tokio-fs")]
mod tokio_fs;

pub type Result<T> = std::result::Result<T, Error>;

/// Abstract error category, mirroring the engine's error taxonomy. Callers should
/// match on this instead of the message text.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("invalid data file state")]
    InvalidDataFileState,
    #[error("lock timeout")]
    LockTimeout,
    #[error("invalid transaction state")]
    InvalidTransactionState,
    #[error("index already exists")]
    IndexAlreadyExists,
    #[error("index not found")]
    IndexNotFound,
    #[error("duplicate key")]
    DuplicateKey,
    #[error("invalid expression")]
    InvalidExpression,
    #[error("invalid document")]
    InvalidDocument,
    #[error("file io error")]
    FileIo,
    #[error("checkpoint required")]
    CheckpointRequired,
    #[error("vector dimension mismatch")]
    VectorDimensionMismatch,
    #[error("other error")]
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn invalid_database() -> Error {
        Error::kinded(ErrorKind::InvalidDataFileState, "Invalid database file")
    }

    pub(crate) fn invalid_page() -> Error {
        Error::kinded(ErrorKind::InvalidDataFileState, "Invalid database file")
    }

    pub(crate) fn datetime_overflow() -> Self {
        Self::err("DateTime overflow")
    }

    pub(crate) fn encrypted_no_password() -> Self {
        Self::err("Encrypted database without password")
    }

    pub(crate) fn collation_not_match() -> Error {
        Error::err("Collation not match")
    }

    pub(crate) fn invalid_page_type(expected: PageType, page: BasePage) -> Error {
        Error::kinded(
            ErrorKind::InvalidDataFileState,
            format!(
                "Invalid page type: expected {:?}, got {:?}",
                expected,
                page.page_type()
            ),
        )
    }

    pub(crate) fn collection_index_limit_reached() -> Error {
        Error::err("Collection index limit reached")
    }

    pub(crate) fn name_length_header_space(name: &str) -> Error {
        Error::err(format!(
            "Name length exceeds available header space: {}",
            name
        ))
    }

    pub(crate) fn invalid_collection_name(name: &str) -> Error {
        Error::kinded(
            ErrorKind::InvalidExpression,
            format!("Invalid collection name: {}", name),
        )
    }

    pub(crate) fn no_free_space_page(page_id: u32, available: usize, need: usize) -> Error {
        Error::err(format!(
            "No free space in page: {} (available: {}, need: {})",
            page_id, available, need
        ))
    }

    pub(crate) fn invalid_bson() -> Error {
        Error::kinded(ErrorKind::InvalidDocument, "Invalid BSON")
    }

    pub(crate) fn size_limit_reached() -> Self {
        Self::err("Size limit reached")
    }

    pub(crate) fn transaction_limit() -> Error {
        Error::kinded(
            ErrorKind::InvalidTransactionState,
            "Maximum number of transactions reached",
        )
    }

    pub(crate) fn invalid_index_key(message: &str) -> Error {
        Error::kinded(
            ErrorKind::InvalidExpression,
            format!("Invalid index key: {}", message),
        )
    }

    pub(crate) fn index_duplicate_key(index: &str, key: Value) -> Error {
        Error::kinded(
            ErrorKind::DuplicateKey,
            format!("Duplicate key in index {index}: {key:?}"),
        )
    }

    pub(crate) fn already_exists_collection_name(name: &str) -> Error {
        Error::err(format!("Already exists collection name: {}", name))
    }

    pub(crate) fn document_size_exceed_limit() -> Self {
        Error::kinded(ErrorKind::InvalidDocument, "DocumentSize exceed limit")
    }

    pub(crate) fn index_already_exists(name: &str) -> Error {
        Error::kinded(
            ErrorKind::IndexAlreadyExists,
            format!("Index already exists: {}", name),
        )
    }

    pub(crate) fn index_not_found(name: &str) -> Error {
        Error::kinded(ErrorKind::IndexNotFound, format!("Index not found: {}", name))
    }

    pub(crate) fn lock_timeout(what: &str) -> Error {
        Error::kinded(ErrorKind::LockTimeout, format!("Lock timeout: {}", what))
    }

    pub(crate) fn invalid_transaction_state(what: &str) -> Error {
        Error::kinded(ErrorKind::InvalidTransactionState, what.to_string())
    }

    pub(crate) fn checkpoint_required() -> Error {
        Error::kinded(
            ErrorKind::CheckpointRequired,
            "Log overflow; synchronous checkpoint required",
        )
    }

    pub(crate) fn vector_dimension_mismatch(expected: usize, got: usize) -> Error {
        Error::kinded(
            ErrorKind::VectorDimensionMismatch,
            format!("Vector dimension mismatch: expected {expected}, got {got}"),
        )
    }

    pub(crate) fn invalid_data_type(field: &str, value: &Value) -> Error {
        Error::kinded(
            ErrorKind::InvalidDocument,
            format!("Invalid data type for field {field}: {value:?}"),
        )
    }

    pub(crate) fn drop_id_index() -> Error {
        Error::kinded(ErrorKind::InvalidExpression, "_id index can't be dropped")
    }

    pub(crate) fn bad_auto_id(
        auto_id: impl std::fmt::Debug,
        collection: &str,
        last_id: Value,
    ) -> Error {
        Error::kinded(
            ErrorKind::InvalidDocument,
            format!(
                "Last _id value {last_id:?} in collection {collection} is not compatible with auto id mode {auto_id:?}"
            ),
        )
    }
}

impl Error {
    pub fn err(message: impl Display) -> Self {
        Error {
            kind: ErrorKind::Other,
            message: message.to_string(),
        }
    }

    pub(crate) fn kinded(kind: ErrorKind, message: impl Display) -> Self {
        Error {
            kind,
            message: message.to_string(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::FileIo,
            message: err.to_string(),
        }
    }
}

impl From<bson::ParseError> for Error {
    fn from(err: bson::ParseError) -> Self {
        Error::kinded(ErrorKind::InvalidDocument, err)
    }
}

impl From<expression::ParseError> for Error {
    fn from(err: expression::ParseError) -> Self {
        Error::kinded(ErrorKind::InvalidExpression, err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::err(err)
    }
}
