use thiserror::Error;

// ----------------------------------------------------------------------------
// Error codes
// ----------------------------------------------------------------------------
//
// Stable, machine-readable identifiers. Clients match on these —
// never on the human-readable message string.

/// Stable error code constants.
///
/// Codes never change; messages may be reworded.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const ALREADY_OCCUPIED: &str = "ALREADY_OCCUPIED";
    pub const ZONE_OCCUPIED: &str = "ZONE_OCCUPIED";
    pub const OCCUPANCY_MISMATCH: &str = "OCCUPANCY_MISMATCH";
    pub const NOT_IN_ZONE: &str = "NOT_IN_ZONE";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

// ----------------------------------------------------------------------------
// ServiceError
// ----------------------------------------------------------------------------

/// Unified service error type used across all crates.
///
/// Every variant is recoverable by the caller: a failed call aborts its
/// transaction cleanly and leaves no partial write behind. The occupancy
/// variants carry structured fields so callers can see exactly which
/// zone or unit the request collided with.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Referenced unit or zone record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / record already exists.
    #[error("{0}")]
    Conflict(String),

    /// The unit already occupies a zone and cannot enter another.
    #[error("unit '{unit}' is already in zone {zone}")]
    AlreadyOccupied { unit: String, zone: u32 },

    /// The zone's cached occupant is a different unit.
    #[error("zone {zone} is occupied by unit '{occupant}'")]
    ZoneOccupied { zone: u32, occupant: String },

    /// Completion requested while the zone cache names a different unit.
    #[error("zone {zone} cache names '{cached}', expected '{expected}'")]
    OccupancyMismatch {
        zone: u32,
        expected: String,
        cached: String,
    },

    /// Completion requested for a zone the unit is not currently in.
    #[error("unit '{unit}' is not in zone {requested} (currently {})",
        .actual.map_or_else(|| "in no zone".to_string(), |z| z.to_string()))]
    NotInZone {
        unit: String,
        requested: u32,
        actual: Option<u32>,
    },

    /// Input data is invalid.
    #[error("{0}")]
    Validation(String),

    /// Storage backend failure.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::AlreadyOccupied { .. } => error_code::ALREADY_OCCUPIED,
            ServiceError::ZoneOccupied { .. } => error_code::ZONE_OCCUPIED,
            ServiceError::OccupancyMismatch { .. } => error_code::OCCUPANCY_MISMATCH,
            ServiceError::NotInZone { .. } => error_code::NOT_IN_ZONE,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }
}
