pub mod query;
pub mod stats;
pub mod sweep;
pub mod transition;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use doc::{DocStore, DocTxn};
use linetrack_core::{ServiceError, new_id};

use crate::config::TrackingConfig;
use crate::model::{MOVEMENTS, Movement, MovementKind};
use crate::resolver::NameResolver;

pub use query::{ActivityEvent, JourneyStage, MovementFilters, UnitFilters};
pub use stats::{ActorDayStat, DailyStatistics, ZoneDayStat};
pub use sweep::SweepReport;
pub use transition::CreateUnitInput;

/// Tracking service — holds the document store and collaborators and
/// provides the engine's whole API surface.
pub struct TrackingService {
    pub(crate) docs: Box<dyn DocStore>,
    pub(crate) resolver: Box<dyn NameResolver>,
    pub(crate) config: TrackingConfig,
}

impl TrackingService {
    pub fn new(
        docs: Box<dyn DocStore>,
        resolver: Box<dyn NameResolver>,
        config: TrackingConfig,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        Ok(Self {
            docs,
            resolver,
            config,
        })
    }

    // ------------------------------------------------------------------------
    // Generic document helpers
    // ------------------------------------------------------------------------

    /// Read and deserialize a document. Returns None if absent.
    pub(crate) fn read_doc<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, ServiceError> {
        match self.docs.get(collection, id)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| ServiceError::Internal(e.to_string())),
            None => Ok(None),
        }
    }

    /// Serialize and write a document outside any transaction.
    pub(crate) fn write_doc<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        record: &T,
    ) -> Result<(), ServiceError> {
        let raw =
            serde_json::to_vec(record).map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.docs.set(collection, id, &raw)?;
        Ok(())
    }

    /// Scan and deserialize a whole collection.
    pub(crate) fn scan_docs<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<T>, ServiceError> {
        let mut items = Vec::new();
        for (_, raw) in self.docs.scan(collection)? {
            let item =
                serde_json::from_slice(&raw).map_err(|e| ServiceError::Internal(e.to_string()))?;
            items.push(item);
        }
        Ok(items)
    }

    /// Append an immutable movement log entry. Called after the owning
    /// transaction committed; the log is append-only and never read back
    /// inside a transition.
    pub(crate) fn append_movement(
        &self,
        unit: &str,
        at: DateTime<Utc>,
        actor: &str,
        kind: MovementKind,
        note: Option<String>,
    ) -> Result<Movement, ServiceError> {
        let movement = Movement {
            id: new_id(),
            unit: unit.to_string(),
            at,
            actor: actor.to_string(),
            kind,
            note,
        };
        self.write_doc(MOVEMENTS, &movement.id, &movement)?;
        Ok(movement)
    }
}

// ----------------------------------------------------------------------------
// Transaction-scoped helpers
// ----------------------------------------------------------------------------

/// Read and deserialize a document through an open transaction.
pub(crate) fn txn_read<T: DeserializeOwned>(
    txn: &dyn DocTxn,
    collection: &str,
    id: &str,
) -> Result<Option<T>, ServiceError> {
    match txn.get(collection, id)? {
        Some(raw) => serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| ServiceError::Internal(e.to_string())),
        None => Ok(None),
    }
}

/// Serialize and stage a document write inside an open transaction.
pub(crate) fn txn_write<T: Serialize>(
    txn: &mut dyn DocTxn,
    collection: &str,
    id: &str,
    record: &T,
) -> Result<(), ServiceError> {
    let raw = serde_json::to_vec(record).map_err(|e| ServiceError::Internal(e.to_string()))?;
    txn.set(collection, id, &raw)?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Input validation
// ----------------------------------------------------------------------------

/// Case-normalize a unit serial: trimmed, uppercased, non-empty.
pub(crate) fn normalize_unit_id(raw: &str) -> Result<String, ServiceError> {
    let id = raw.trim().to_uppercase();
    if id.is_empty() {
        return Err(ServiceError::Validation("unit id must not be empty".into()));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ServiceError::Validation(format!(
            "unit id '{}' contains invalid characters",
            id
        )));
    }
    Ok(id)
}

pub(crate) fn validate_zone(zone: u32) -> Result<(), ServiceError> {
    if zone == 0 {
        return Err(ServiceError::Validation("zone id must be positive".into()));
    }
    Ok(())
}

pub(crate) fn validate_actor(actor: &str) -> Result<(), ServiceError> {
    if actor.trim().is_empty() {
        return Err(ServiceError::Validation("actor must not be empty".into()));
    }
    Ok(())
}

/// Document key for a zone record.
pub(crate) fn zone_key(zone: u32) -> String {
    zone.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unit_id_uppercases_and_trims() {
        assert_eq!(normalize_unit_id("  wau-12345 ").unwrap(), "WAU-12345");
    }

    #[test]
    fn normalize_unit_id_rejects_garbage() {
        assert!(normalize_unit_id("").is_err());
        assert!(normalize_unit_id("   ").is_err());
        assert!(normalize_unit_id("bad id").is_err());
        assert!(normalize_unit_id("x/1").is_err());
    }

    #[test]
    fn zone_zero_is_invalid() {
        assert!(validate_zone(0).is_err());
        assert!(validate_zone(1).is_ok());
    }

    #[test]
    fn actor_must_be_non_empty() {
        assert!(validate_actor("").is_err());
        assert!(validate_actor("alice").is_ok());
    }
}
