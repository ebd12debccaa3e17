//! Storage Errors
//!
//! Two kinds: `SchemaError` is fatal and only produced by `initialize`;
//! `StorageError` is per-operation and never retried inside the core.

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// SchemaError
// =============================================================================

/// The schema script could not be parsed or applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Script had nothing but whitespace and comments
    #[error("schema script contains no statements")]
    Empty,

    /// A statement could not be parsed
    #[error("schema statement {statement}: {message}")]
    Parse {
        /// 1-based statement index
        statement: usize,
        /// What went wrong
        message: String,
    },

    /// A required relation is missing
    #[error("schema does not define table `{0}`")]
    MissingTable(String),

    /// A required relation lacks a column
    #[error("table `{table}` does not declare column `{column}`")]
    MissingColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },

    /// The substrate rejected a statement
    #[error("failed to apply schema: {0}")]
    Apply(String),
}

impl SchemaError {
    /// Parse error at the given (1-based) statement.
    pub fn parse(statement: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            statement,
            message: message.into(),
        }
    }
}

// =============================================================================
// StorageError
// =============================================================================

/// An insert or lookup could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Backend connection could not be established
    #[error("connection error: {0}")]
    Connection(String),

    /// Insert failed
    #[error("write error: {0}")]
    Write(String),

    /// Lookup failed
    #[error("read error: {0}")]
    Read(String),

    /// Row mapping or invariant failure
    #[error("internal error: {0}")]
    Internal(String),

    /// Fault produced by the DST wrapper
    #[error("injected fault on {operation}")]
    FaultInjected {
        /// Operation that was failed
        operation: &'static str,
    },
}

impl StorageError {
    /// Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Write error.
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    /// Read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for faults produced by the DST wrapper.
    #[must_use]
    pub fn is_injected(&self) -> bool {
        matches!(self, Self::FaultInjected { .. })
    }
}
