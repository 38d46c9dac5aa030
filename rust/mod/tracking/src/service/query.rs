use chrono::{DateTime, Utc};
use serde::Serialize;

use linetrack_core::{ListParams, ListResult, ServiceError, now_utc};

use crate::model::{
    MOVEMENTS, Movement, MovementKind, UNITS, Unit, UnitStatus, ZONES, ZoneRecord, ZoneSnapshot,
};

use super::{TrackingService, normalize_unit_id, zone_key};

#[derive(Debug, Default, Clone)]
pub struct UnitFilters {
    pub status: Option<UnitStatus>,
    pub zone: Option<u32>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone)]
pub struct MovementFilters {
    pub unit: Option<String>,
    pub zone: Option<u32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// One stage of a unit's journey, with the duration computed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyStage {
    pub zone: u32,
    pub entered_at: DateTime<Utc>,
    pub entered_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exited_by: Option<String>,
    /// Closed duration, or time in the zone so far for the open stage.
    pub minutes: i64,
    pub in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A movement annotated for the zone activity feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    #[serde(flatten)]
    pub movement: Movement,
    /// Resolved display name; falls back to the raw actor id.
    pub actor_name: String,
    /// Gap since the zone was last freed, for `scan_in` events. Absent
    /// when the gap exceeded the off-shift ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_minutes: Option<i64>,
}

fn in_window(
    at: DateTime<Utc>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    from.is_none_or(|f| at >= f) && to.is_none_or(|t| at <= t)
}

impl TrackingService {
    // ------------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------------

    pub fn get_unit(&self, unit_id: &str) -> Result<Unit, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        self.read_doc(UNITS, &unit_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))
    }

    /// List units, newest first. Filtering happens in memory; the store
    /// only offers a collection scan.
    pub fn list_units(
        &self,
        params: &ListParams,
        filters: &UnitFilters,
    ) -> Result<ListResult<Unit>, ServiceError> {
        let model = filters.model.as_deref();
        let color = filters.color.as_deref();

        let mut units: Vec<Unit> = self
            .scan_docs::<Unit>(UNITS)?
            .into_iter()
            .filter(|u| filters.status.is_none_or(|s| u.status == s))
            .filter(|u| filters.zone.is_none_or(|z| u.current_zone == Some(z)))
            .filter(|u| model.is_none_or(|m| u.model == m))
            .filter(|u| color.is_none_or(|c| u.color == c))
            .filter(|u| {
                u.create_at
                    .is_some_and(|at| in_window(at, filters.created_from, filters.created_to))
                    || (u.create_at.is_none()
                        && filters.created_from.is_none()
                        && filters.created_to.is_none())
            })
            .collect();

        units.sort_by_key(|u| std::cmp::Reverse(u.create_at));
        let total = units.len();
        let items = units
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .collect();
        Ok(ListResult { items, total })
    }

    /// A unit's stage entries in chronological order with computed
    /// per-stage durations.
    pub fn unit_journey(&self, unit_id: &str) -> Result<Vec<JourneyStage>, ServiceError> {
        let unit = self.get_unit(unit_id)?;
        let now = now_utc();
        Ok(unit
            .stage_history
            .iter()
            .map(|entry| JourneyStage {
                zone: entry.zone,
                entered_at: entry.entered_at,
                entered_by: entry.entered_by.clone(),
                exited_at: entry.exited_at,
                exited_by: entry.exited_by.clone(),
                minutes: entry
                    .minutes
                    .unwrap_or_else(|| (now - entry.entered_at).num_minutes().max(0)),
                in_progress: entry.is_open(),
                note: entry.note.clone(),
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Movements
    // ------------------------------------------------------------------------

    /// List movement log entries, newest first, capped.
    pub fn list_movements(
        &self,
        params: &ListParams,
        filters: &MovementFilters,
    ) -> Result<ListResult<Movement>, ServiceError> {
        let unit = match filters.unit.as_deref() {
            Some(raw) => Some(normalize_unit_id(raw)?),
            None => None,
        };

        let mut movements: Vec<Movement> = self
            .scan_docs::<Movement>(MOVEMENTS)?
            .into_iter()
            .filter(|m| unit.as_deref().is_none_or(|u| m.unit == u))
            .filter(|m| filters.zone.is_none_or(|z| m.kind.touches(z)))
            .filter(|m| in_window(m.at, filters.from, filters.to))
            .collect();

        movements.sort_by_key(|m| std::cmp::Reverse(m.at));
        let total = movements.len();
        let items = movements
            .into_iter()
            .skip(params.offset)
            .take(params.limit)
            .collect();
        Ok(ListResult { items, total })
    }

    /// Activity feed for one zone in a date window, chronological, with
    /// resolved actor names and derived idle time.
    ///
    /// Idle time of a `scan_in` is the gap since the most recent prior
    /// `complete` in the same zone. Gaps above the configured ceiling are
    /// off-shift breaks and reported as absent.
    pub fn zone_activity(
        &self,
        zone: u32,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ActivityEvent>, ServiceError> {
        let mut touching: Vec<Movement> = self
            .scan_docs::<Movement>(MOVEMENTS)?
            .into_iter()
            .filter(|m| m.kind.touches(zone))
            .collect();
        touching.sort_by_key(|m| m.at);

        // The freeing event may predate the window, so idle time is
        // derived over the full zone history before windowing.
        let mut last_freed: Option<DateTime<Utc>> = None;
        let mut events = Vec::new();
        for movement in touching {
            let idle_minutes = match movement.kind {
                MovementKind::ScanIn { .. } => last_freed
                    .map(|freed| (movement.at - freed).num_minutes())
                    .filter(|gap| *gap >= 0 && *gap <= self.config.idle_gap_ceiling_minutes),
                _ => None,
            };
            if let MovementKind::Complete { .. } = movement.kind {
                last_freed = Some(movement.at);
            }

            if in_window(movement.at, from, to) {
                events.push(ActivityEvent {
                    actor_name: self.resolver.display_name(&movement.actor),
                    idle_minutes,
                    movement,
                });
            }
        }
        Ok(events)
    }

    // ------------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------------

    /// Snapshot of one zone with derived elapsed times. Zones never
    /// occupied have no record yet and read as empty.
    pub fn get_zone_snapshot(&self, zone: u32) -> Result<ZoneSnapshot, ServiceError> {
        let now = now_utc();
        let record: ZoneRecord = self
            .read_doc(ZONES, &zone_key(zone))?
            .unwrap_or_else(|| ZoneRecord::empty(zone, now));
        Ok(record.snapshot(now))
    }

    /// Snapshots of every zone that has a cache record, ordered by zone.
    pub fn list_zone_snapshots(&self) -> Result<Vec<ZoneSnapshot>, ServiceError> {
        let now = now_utc();
        let mut records: Vec<ZoneRecord> = self.scan_docs(ZONES)?;
        records.sort_by_key(|r| r.zone);
        Ok(records.into_iter().map(|r| r.snapshot(now)).collect())
    }
}
