use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Denormalized summary of a zone's current occupant.
///
/// Display attributes are copied from the unit at scan-in so the dashboard
/// read never has to touch the ledger. Elapsed time is derived at read
/// time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OccupantSummary {
    pub unit: String,
    pub model: String,
    pub color: String,
    pub entered_at: DateTime<Utc>,
}

/// The operator currently checked in at a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub worker: String,
    pub checked_in_at: DateTime<Utc>,
}

/// Zone Cache record — one per zone, created lazily on first occupancy.
///
/// Pure cache: everything here must be reconcilable from the unit ledger
/// and the movement log. The ledger wins on any divergence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub zone: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_occupant: Option<OccupantSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<WorkerSummary>,

    #[serde(default)]
    pub units_processed_today: u32,

    /// Day the counter belongs to; the counter resets on rollover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counted_on: Option<NaiveDate>,

    /// Rolling mean of the most recent closed stage durations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_minutes: Option<f64>,

    pub last_updated: DateTime<Utc>,
}

impl ZoneRecord {
    /// A fresh, empty record for a zone seen for the first time.
    pub fn empty(zone: u32, now: DateTime<Utc>) -> Self {
        Self {
            zone,
            current_occupant: None,
            current_worker: None,
            units_processed_today: 0,
            counted_on: None,
            average_minutes: None,
            last_updated: now,
        }
    }

    /// Bump the daily counter, resetting it first if the day changed.
    pub fn count_processed(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.counted_on != Some(today) {
            self.units_processed_today = 0;
            self.counted_on = Some(today);
        }
        self.units_processed_today += 1;
    }

    /// The counter value valid for `now` (0 if it belongs to a past day).
    pub fn processed_today(&self, now: DateTime<Utc>) -> u32 {
        if self.counted_on == Some(now.date_naive()) {
            self.units_processed_today
        } else {
            0
        }
    }

    /// Read view with elapsed times stamped against `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> ZoneSnapshot {
        ZoneSnapshot {
            zone: self.zone,
            current_occupant: self.current_occupant.clone(),
            occupant_minutes: self
                .current_occupant
                .as_ref()
                .map(|o| (now - o.entered_at).num_minutes().max(0)),
            current_worker: self.current_worker.clone(),
            worker_minutes: self
                .current_worker
                .as_ref()
                .map(|w| (now - w.checked_in_at).num_minutes().max(0)),
            units_processed_today: self.processed_today(now),
            average_minutes: self.average_minutes,
            last_updated: self.last_updated,
        }
    }
}

/// Dashboard view of a zone with derived elapsed times.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSnapshot {
    pub zone: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_occupant: Option<OccupantSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupant_minutes: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<WorkerSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_minutes: Option<i64>,

    pub units_processed_today: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_minutes: Option<f64>,

    pub last_updated: DateTime<Utc>,
}
