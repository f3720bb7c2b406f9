//! Error types and error codes for Taro
//!
//! This module defines:
//! - `TaroError`: Application-specific error enum
//! - `ErrorCode`: Structured error codes for API responses
//!
//! Read misses are not errors: lookups return `Option` and `NotFound`
//! never appears in this taxonomy.

use serde::{Deserialize, Serialize};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum TaroError {
    /// Malformed key, content, or pagination, rejected before the store is touched
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown or mismatched target namespace
    #[error("namespace '{0}' not exist")]
    NamespaceNotExist(String),

    #[error("namespace '{0}' already exist")]
    NamespaceAlreadyExist(String),

    /// Unparseable import bundle or manifest
    #[error("format error: {0}")]
    Format(String),

    /// Persistence layer failure, surfaced verbatim and never retried here
    #[error("store error: {0}")]
    Store(String),

    /// Bulk import aborted because a target key already exists
    #[error("import conflict on '{0}'")]
    ImportConflict(String),
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

// General success and error codes
pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

// Tenant and parameter validation errors
pub const TENANT_PARAM_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20001,
    message: "'tenant' parameter error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

pub const CONFIG_LISTENER_IS_NULL: ErrorCode<'static> = ErrorCode {
    code: 20006,
    message: "config listener is null",
};

pub const INVALID_DATA_ID: ErrorCode<'static> = ErrorCode {
    code: 20008,
    message: "invalid dataId",
};

pub const OVER_MAX_SIZE: ErrorCode<'static> = ErrorCode {
    code: 5034,
    message: "config content size is over limit",
};

pub const ILLEGAL_NAMESPACE: ErrorCode<'static> = ErrorCode {
    code: 22000,
    message: "illegal namespace",
};

pub const NAMESPACE_NOT_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22001,
    message: "namespace not exist",
};

pub const NAMESPACE_ALREADY_EXIST: ErrorCode<'static> = ErrorCode {
    code: 22002,
    message: "namespace already exist",
};

pub const METADATA_ILLEGAL: ErrorCode<'static> = ErrorCode {
    code: 100002,
    message: "Imported metadata is invalid",
};

pub const PARSING_DATA_FAILED: ErrorCode<'static> = ErrorCode {
    code: 100004,
    message: "Failed to parse data",
};

pub const DATA_EMPTY: ErrorCode<'static> = ErrorCode {
    code: 100005,
    message: "Imported file data is empty",
};

pub const NO_SELECTED_CONFIG: ErrorCode<'static> = ErrorCode {
    code: 100006,
    message: "No configuration selected",
};

// Import/Export error codes
pub const IMPORT_FILE_EMPTY: ErrorCode<'static> = ErrorCode {
    code: 100010,
    message: "Import file is empty",
};

pub const IMPORT_FILE_INVALID: ErrorCode<'static> = ErrorCode {
    code: 100011,
    message: "Import file format is invalid",
};

pub const IMPORT_CONFLICT_ABORT: ErrorCode<'static> = ErrorCode {
    code: 100012,
    message: "Import aborted due to conflict",
};

pub const EXPORT_NO_DATA: ErrorCode<'static> = ErrorCode {
    code: 100013,
    message: "No configurations found to export",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taro_error_display() {
        let err = TaroError::Validation("dataId is empty".to_string());
        assert_eq!(format!("{}", err), "validation error: dataId is empty");

        let err = TaroError::NamespaceNotExist("dev".to_string());
        assert_eq!(format!("{}", err), "namespace 'dev' not exist");

        let err = TaroError::Format("not a zip archive".to_string());
        assert_eq!(format!("{}", err), "format error: not a zip archive");

        let err = TaroError::ImportConflict("DEFAULT_GROUP/app.yaml".to_string());
        assert_eq!(format!("{}", err), "import conflict on 'DEFAULT_GROUP/app.yaml'");
    }

    #[test]
    fn test_error_code_constants() {
        assert_eq!(SUCCESS.code, 0);
        assert_eq!(SUCCESS.message, "success");
        assert_eq!(PARAMETER_MISSING.code, 10000);
        assert_eq!(NAMESPACE_NOT_EXIST.code, 22001);
        assert_eq!(IMPORT_CONFLICT_ABORT.code, 100012);
        assert_eq!(EXPORT_NO_DATA.code, 100013);
    }

    #[test]
    fn test_error_downcast_through_anyhow() {
        let err: anyhow::Error = TaroError::NamespaceNotExist("dev".to_string()).into();
        let taro_err = err.downcast_ref::<TaroError>();
        assert!(matches!(taro_err, Some(TaroError::NamespaceNotExist(ns)) if ns == "dev"));
    }
}
