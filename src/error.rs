//! Error types for store access, traversal, and the tool surface.

use crate::store::HiveRoot;
use thiserror::Error;

/// Failure codes reported by store operations.
///
/// The vocabulary mirrors what a registry-style backend returns: a small set
/// of expected conditions plus a catch-all for everything else. The walker
/// keys its skip-or-abort policy off these variants, so they compare by
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The named node or value does not exist.
    #[error("not found")]
    NotFound,

    /// The caller may not open or read this node.
    #[error("access denied")]
    AccessDenied,

    /// The value exists but is not string-typed.
    #[error("unsupported value type (kind {0})")]
    UnsupportedType(u32),

    /// The value payload is larger than the provisioned fetch buffer.
    #[error("value needs {needed} bytes but only {limit} were provisioned")]
    InsufficientBuffer { needed: usize, limit: usize },

    /// Any other backend failure, carried as text.
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Wrap a backend error that has no dedicated code.
    pub(crate) fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Other(err.to_string())
    }
}

/// Fatal traversal failures.
///
/// Each variant abandons the enclosing hive walk. Benign conditions never
/// surface here: not-found or access-denied child opens and non-string
/// values are skipped inside the walker instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("enumerating child {ordinal} of '{key}': {source}")]
    ChildEnumeration {
        key: String,
        ordinal: u32,
        source: StoreError,
    },

    #[error("opening child '{child}' of '{key}': {source}")]
    ChildOpen {
        key: String,
        child: String,
        source: StoreError,
    },

    #[error("enumerating value {ordinal} of '{key}': {source}")]
    ValueEnumeration {
        key: String,
        ordinal: u32,
        source: StoreError,
    },

    #[error("reading value '{value}' of '{key}': {source}")]
    ValueFetch {
        key: String,
        value: String,
        source: StoreError,
    },

    #[error("writing value '{value}' of '{key}': {source}")]
    ValueWrite {
        key: String,
        value: String,
        source: StoreError,
    },
}

impl WalkError {
    pub(crate) fn child_enumeration(key: &str, ordinal: u32, source: StoreError) -> Self {
        WalkError::ChildEnumeration {
            key: key.to_string(),
            ordinal,
            source,
        }
    }

    pub(crate) fn child_open(key: &str, child: &str, source: StoreError) -> Self {
        WalkError::ChildOpen {
            key: key.to_string(),
            child: child.to_string(),
            source,
        }
    }

    pub(crate) fn value_enumeration(key: &str, ordinal: u32, source: StoreError) -> Self {
        WalkError::ValueEnumeration {
            key: key.to_string(),
            ordinal,
            source,
        }
    }

    pub(crate) fn value_fetch(key: &str, value: &str, source: StoreError) -> Self {
        WalkError::ValueFetch {
            key: key.to_string(),
            value: value.to_string(),
            source,
        }
    }

    pub(crate) fn value_write(key: &str, value: &str, source: StoreError) -> Self {
        WalkError::ValueWrite {
            key: key.to_string(),
            value: value.to_string(),
            source,
        }
    }

    /// The store code that caused the failure.
    pub fn store_error(&self) -> &StoreError {
        match self {
            WalkError::ChildEnumeration { source, .. }
            | WalkError::ChildOpen { source, .. }
            | WalkError::ValueEnumeration { source, .. }
            | WalkError::ValueFetch { source, .. }
            | WalkError::ValueWrite { source, .. } => source,
        }
    }
}

/// A hive root failed to open. Fatal for the whole run: the sweep stops
/// without visiting the remaining hives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot open root of {hive}: {source}")]
pub struct RootOpenError {
    pub hive: HiveRoot,
    pub source: StoreError,
}

/// Top-level failures surfaced by the CLI layer.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error at {path}: {message}")]
    Store { path: String, message: String },

    #[error("failed to render report: {0}")]
    Report(String),

    #[error(transparent)]
    RootOpen(#[from] RootOpenError),
}
