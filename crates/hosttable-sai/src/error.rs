//! Hardware status codes and the error type returned by every hardware call.

use std::fmt;
use thiserror::Error;

/// Status codes the forwarding ASIC driver reports for L3 table writes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Failure = -1,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -13,
    ObjectInUse = -17,
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::InsufficientResources => "SAI_STATUS_INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
        };
        write!(f, "{}", s)
    }
}

/// Error type for hardware operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// Driver status with no more specific mapping.
    #[error("hardware write failed: {status}")]
    Status { status: SaiStatus },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("{item} not found")]
    NotFound { item: String },

    #[error("{item} already exists")]
    AlreadyExists { item: String },

    #[error("{table} table full")]
    TableFull { table: String },

    /// Still referenced by a host entry or ECMP group.
    #[error("{object} in use")]
    ObjectInUse { object: String },
}

impl SaiError {
    /// Maps a bare driver status, as injected by fault tests, onto a variant.
    pub fn from_status(status: SaiStatus) -> Self {
        match status {
            SaiStatus::InvalidParameter => SaiError::invalid_parameter(format!("driver returned {}", status)),
            SaiStatus::ItemNotFound => SaiError::not_found("object"),
            SaiStatus::ItemAlreadyExists => SaiError::already_exists("object"),
            SaiStatus::TableFull => SaiError::table_full("hardware"),
            SaiStatus::ObjectInUse => SaiError::object_in_use("object"),
            SaiStatus::Failure | SaiStatus::InsufficientResources => SaiError::Status { status },
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn not_found(item: impl Into<String>) -> Self {
        SaiError::NotFound { item: item.into() }
    }

    pub fn already_exists(item: impl Into<String>) -> Self {
        SaiError::AlreadyExists { item: item.into() }
    }

    pub fn table_full(table: impl Into<String>) -> Self {
        SaiError::TableFull {
            table: table.into(),
        }
    }

    pub fn object_in_use(object: impl Into<String>) -> Self {
        SaiError::ObjectInUse {
            object: object.into(),
        }
    }

    /// The driver status reported alongside the failing key.
    pub fn status(&self) -> SaiStatus {
        match self {
            SaiError::Status { status } => *status,
            SaiError::InvalidParameter { .. } => SaiStatus::InvalidParameter,
            SaiError::NotFound { .. } => SaiStatus::ItemNotFound,
            SaiError::AlreadyExists { .. } => SaiStatus::ItemAlreadyExists,
            SaiError::TableFull { .. } => SaiStatus::TableFull,
            SaiError::ObjectInUse { .. } => SaiStatus::ObjectInUse,
        }
    }
}

/// Result type for hardware operations.
pub type SaiResult<T> = Result<T, SaiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_status_is_preserved() {
        for status in [
            SaiStatus::Failure,
            SaiStatus::InsufficientResources,
            SaiStatus::InvalidParameter,
            SaiStatus::ItemNotFound,
            SaiStatus::ItemAlreadyExists,
            SaiStatus::TableFull,
            SaiStatus::ObjectInUse,
        ] {
            assert_eq!(SaiError::from_status(status).status(), status);
        }
    }

    #[test]
    fn test_error_messages_name_the_object() {
        assert_eq!(SaiError::not_found("egress 100001").to_string(), "egress 100001 not found");
        assert_eq!(
            SaiError::from_status(SaiStatus::InsufficientResources).to_string(),
            "hardware write failed: SAI_STATUS_INSUFFICIENT_RESOURCES"
        );
    }
}
