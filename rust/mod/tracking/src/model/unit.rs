use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    InProduction,
    Completed,
}

impl Default for UnitStatus {
    fn default() -> Self {
        Self::InProduction
    }
}

/// One occupancy interval of a unit in a zone.
///
/// Created open when the unit enters; closed (exit fields filled) when it
/// leaves. Entries are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageEntry {
    pub zone: u32,
    pub entered_at: DateTime<Utc>,
    pub entered_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_by: Option<String>,

    /// Whole minutes between entry and exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StageEntry {
    /// An entry is open while the unit is still in the zone.
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

/// Unit — one physical item tracked through production. PK = serial
/// (case-normalized). Identity fields are immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Case-normalized serial — primary key.
    pub id: String,

    /// Model / type of the unit.
    pub model: String,

    pub color: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default)]
    pub status: UnitStatus,

    /// Zone currently occupied; None while the unit is between zones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_zone: Option<u32>,

    /// Ordered, append-only occupancy history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stage_history: Vec<StageEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Sum of closed stage durations, stamped at final completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_minutes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_at: Option<DateTime<Utc>>,
}

impl Unit {
    /// The open stage entry, if the unit is currently in a zone.
    pub fn open_stage(&self) -> Option<&StageEntry> {
        self.stage_history.iter().find(|e| e.is_open())
    }

    pub fn open_stage_mut(&mut self) -> Option<&mut StageEntry> {
        self.stage_history.iter_mut().find(|e| e.is_open())
    }

    /// Ledger invariant: at most one open entry, and `current_zone`
    /// matches it (both absent, or both naming the same zone).
    pub fn invariant_holds(&self) -> bool {
        let open: Vec<&StageEntry> =
            self.stage_history.iter().filter(|e| e.is_open()).collect();
        match (open.as_slice(), self.current_zone) {
            ([], None) => true,
            ([entry], Some(zone)) => entry.zone == zone,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linetrack_core::now_utc;

    fn entry(zone: u32, open: bool) -> StageEntry {
        let now = now_utc();
        StageEntry {
            zone,
            entered_at: now,
            entered_by: "alice".into(),
            exited_at: if open { None } else { Some(now) },
            exited_by: if open { None } else { Some("alice".into()) },
            minutes: if open { None } else { Some(0) },
            note: None,
        }
    }

    fn unit(current_zone: Option<u32>, history: Vec<StageEntry>) -> Unit {
        Unit {
            id: "WAU12345".into(),
            model: "A4".into(),
            color: "red".into(),
            series: None,
            status: UnitStatus::InProduction,
            current_zone,
            stage_history: history,
            completed_at: None,
            total_minutes: None,
            create_at: Some(now_utc()),
            update_at: None,
        }
    }

    #[test]
    fn unit_json_roundtrip() {
        let u = unit(Some(5), vec![entry(3, false), entry(5, true)]);
        let json = serde_json::to_string(&u).unwrap();
        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(u, back);
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&UnitStatus::InProduction).unwrap();
        assert_eq!(json, "\"IN_PRODUCTION\"");
    }

    #[test]
    fn open_stage_finds_the_open_entry() {
        let u = unit(Some(5), vec![entry(3, false), entry(5, true)]);
        assert_eq!(u.open_stage().unwrap().zone, 5);

        let u = unit(None, vec![entry(3, false)]);
        assert!(u.open_stage().is_none());
    }

    #[test]
    fn invariant_both_absent() {
        assert!(unit(None, vec![entry(3, false)]).invariant_holds());
        assert!(unit(None, vec![]).invariant_holds());
    }

    #[test]
    fn invariant_open_entry_matches_current_zone() {
        assert!(unit(Some(5), vec![entry(5, true)]).invariant_holds());
        // Open entry in a different zone than currentZone.
        assert!(!unit(Some(7), vec![entry(5, true)]).invariant_holds());
        // Open entry but no currentZone.
        assert!(!unit(None, vec![entry(5, true)]).invariant_holds());
        // currentZone but no open entry.
        assert!(!unit(Some(5), vec![entry(5, false)]).invariant_holds());
    }

    #[test]
    fn invariant_rejects_two_open_entries() {
        assert!(!unit(Some(5), vec![entry(5, true), entry(5, true)]).invariant_holds());
    }
}
