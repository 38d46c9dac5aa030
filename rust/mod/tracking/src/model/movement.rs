use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a movement did, with only the fields that kind carries.
///
/// A tagged variant rather than one flat record with nullable from/to/
/// duration columns: each kind states exactly which zones it touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MovementKind {
    /// Unit entered a zone from outside any zone.
    ScanIn { to_zone: u32 },

    /// Unit finished a stage and left the zone.
    Complete { zone: u32, minutes: i64 },

    /// Unit moved directly from one zone to another.
    Transfer {
        from_zone: u32,
        to_zone: u32,
        minutes: i64,
    },

    /// Audit annotation while the unit stays put.
    Hold { zone: u32 },

    /// Administrative removal, by an operator or the consistency sweep.
    ForceRemove {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_zone: Option<u32>,
    },
}

impl MovementKind {
    /// Zone the unit left, if any.
    pub fn from_zone(&self) -> Option<u32> {
        match self {
            MovementKind::ScanIn { .. } => None,
            MovementKind::Complete { zone, .. } => Some(*zone),
            MovementKind::Transfer { from_zone, .. } => Some(*from_zone),
            MovementKind::Hold { zone } => Some(*zone),
            MovementKind::ForceRemove { from_zone } => *from_zone,
        }
    }

    /// Zone the unit entered, if any.
    pub fn to_zone(&self) -> Option<u32> {
        match self {
            MovementKind::ScanIn { to_zone } => Some(*to_zone),
            MovementKind::Transfer { to_zone, .. } => Some(*to_zone),
            MovementKind::Complete { .. }
            | MovementKind::Hold { .. }
            | MovementKind::ForceRemove { .. } => None,
        }
    }

    /// Minutes spent in the zone just left, where the kind records it.
    pub fn minutes(&self) -> Option<i64> {
        match self {
            MovementKind::Complete { minutes, .. }
            | MovementKind::Transfer { minutes, .. } => Some(*minutes),
            _ => None,
        }
    }

    /// The wire name of the kind tag.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MovementKind::ScanIn { .. } => "scan_in",
            MovementKind::Complete { .. } => "complete",
            MovementKind::Transfer { .. } => "transfer",
            MovementKind::Hold { .. } => "hold",
            MovementKind::ForceRemove { .. } => "force_remove",
        }
    }

    /// Whether this movement touches the given zone on either side.
    pub fn touches(&self, zone: u32) -> bool {
        self.from_zone() == Some(zone) || self.to_zone() == Some(zone)
    }
}

/// Movement Log entry — append-only, immutable once written. PK =
/// generated id. The durable audit trail, independent of the mutable
/// ledger and cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: String,
    pub unit: String,
    pub at: DateTime<Utc>,
    pub actor: String,

    #[serde(flatten)]
    pub kind: MovementKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
