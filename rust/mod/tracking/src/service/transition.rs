use chrono::{DateTime, Utc};
use tracing::info;

use linetrack_core::{ServiceError, now_utc};

use crate::model::{
    MOVEMENTS, Movement, MovementKind, OccupantSummary, StageEntry, UNITS, Unit, UnitStatus,
    WorkerSummary, ZONES, ZoneRecord,
};

use super::{
    TrackingService, normalize_unit_id, txn_read, txn_write, validate_actor, validate_zone,
    zone_key,
};

pub struct CreateUnitInput {
    pub id: String,
    pub model: String,
    pub color: String,
    pub series: Option<String>,
}

fn non_empty(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
}

impl TrackingService {
    // ------------------------------------------------------------------------
    // Unit creation
    // ------------------------------------------------------------------------

    /// Register a new unit. Serial is case-normalized; identity fields
    /// are immutable afterwards.
    pub fn create_unit(&self, input: CreateUnitInput) -> Result<Unit, ServiceError> {
        let id = normalize_unit_id(&input.id)?;
        if input.model.trim().is_empty() {
            return Err(ServiceError::Validation("model must not be empty".into()));
        }
        let now = now_utc();
        let record = Unit {
            id: id.clone(),
            model: input.model,
            color: input.color,
            series: input.series,
            status: UnitStatus::InProduction,
            current_zone: None,
            stage_history: Vec::new(),
            completed_at: None,
            total_minutes: None,
            create_at: Some(now),
            update_at: Some(now),
        };

        self.docs.transact(&mut |txn| {
            if txn.get(UNITS, &id)?.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "unit '{}' already exists",
                    id
                )));
            }
            txn_write(txn, UNITS, &id, &record)
        })?;

        info!(unit = %id, "unit created");
        Ok(record)
    }

    // ------------------------------------------------------------------------
    // Scan-in
    // ------------------------------------------------------------------------

    /// Move a unit into a zone. One atomic transaction validates both the
    /// ledger side (unit not already in a zone) and the cache side (zone
    /// not holding a different unit), then writes both records together.
    pub fn scan_in(&self, unit_id: &str, zone: u32, actor: &str) -> Result<Unit, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        validate_zone(zone)?;
        validate_actor(actor)?;
        let now = now_utc();
        let mut updated: Option<Unit> = None;

        self.docs.transact(&mut |txn| {
            let mut unit: Unit = txn_read(txn, UNITS, &unit_id)?
                .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;

            if unit.status == UnitStatus::Completed {
                return Err(ServiceError::Validation(format!(
                    "unit '{}' is already completed",
                    unit_id
                )));
            }
            if let Some(held) = unit.current_zone {
                return Err(ServiceError::AlreadyOccupied {
                    unit: unit_id.clone(),
                    zone: held,
                });
            }

            // Zone cache record is created lazily on first occupancy.
            let mut record: ZoneRecord = txn_read(txn, ZONES, &zone_key(zone))?
                .unwrap_or_else(|| ZoneRecord::empty(zone, now));
            if let Some(occupant) = record.current_occupant.as_ref()
                && occupant.unit != unit_id
            {
                return Err(ServiceError::ZoneOccupied {
                    zone,
                    occupant: occupant.unit.clone(),
                });
            }

            unit.stage_history.push(StageEntry {
                zone,
                entered_at: now,
                entered_by: actor.to_string(),
                exited_at: None,
                exited_by: None,
                minutes: None,
                note: None,
            });
            unit.current_zone = Some(zone);
            unit.update_at = Some(now);

            record.current_occupant = Some(OccupantSummary {
                unit: unit_id.clone(),
                model: unit.model.clone(),
                color: unit.color.clone(),
                entered_at: now,
            });
            record.last_updated = now;

            txn_write(txn, UNITS, &unit_id, &unit)?;
            txn_write(txn, ZONES, &zone_key(zone), &record)?;
            updated = Some(unit);
            Ok(())
        })?;

        self.append_movement(&unit_id, now, actor, MovementKind::ScanIn { to_zone: zone }, None)?;
        info!(unit = %unit_id, zone, actor = %actor, "scan-in");
        updated.ok_or_else(|| ServiceError::Internal("transaction produced no unit".into()))
    }

    // ------------------------------------------------------------------------
    // Stage completion
    // ------------------------------------------------------------------------

    /// Close the unit's open stage in `zone` and release the zone.
    pub fn complete_stage(
        &self,
        unit_id: &str,
        zone: u32,
        actor: &str,
        note: Option<&str>,
    ) -> Result<Unit, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        validate_zone(zone)?;
        validate_actor(actor)?;
        let now = now_utc();
        let note = non_empty(note);

        // Rolling-average inputs come from the movement log, which cannot
        // yet contain this completion (its entry is appended post-commit).
        let window = self.config.rolling_window;
        let recent = self.recent_closed_minutes(zone, window.saturating_sub(1))?;

        let mut updated: Option<Unit> = None;
        let mut closed_minutes = 0i64;

        self.docs.transact(&mut |txn| {
            let mut unit: Unit = txn_read(txn, UNITS, &unit_id)?
                .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;

            match unit.current_zone {
                Some(z) if z == zone => {}
                actual => {
                    return Err(ServiceError::NotInZone {
                        unit: unit_id.clone(),
                        requested: zone,
                        actual,
                    });
                }
            }

            let cached: Option<ZoneRecord> = txn_read(txn, ZONES, &zone_key(zone))?;
            if let Some(record) = cached.as_ref()
                && let Some(occupant) = record.current_occupant.as_ref()
                && occupant.unit != unit_id
            {
                return Err(ServiceError::OccupancyMismatch {
                    zone,
                    expected: unit_id.clone(),
                    cached: occupant.unit.clone(),
                });
            }

            let entry = unit.open_stage_mut().ok_or_else(|| {
                ServiceError::Internal(format!(
                    "unit '{}' has a current zone but no open stage",
                    unit_id
                ))
            })?;
            let minutes = (now - entry.entered_at).num_minutes().max(0);
            entry.exited_at = Some(now);
            entry.exited_by = Some(actor.to_string());
            entry.minutes = Some(minutes);
            entry.note = note.clone();

            unit.current_zone = None;
            unit.update_at = Some(now);

            let mut record = cached.unwrap_or_else(|| ZoneRecord::empty(zone, now));
            record.count_processed(now);
            let mut samples = vec![minutes];
            samples.extend(recent.iter().copied());
            record.average_minutes =
                Some(samples.iter().sum::<i64>() as f64 / samples.len() as f64);
            record.current_occupant = None;
            record.last_updated = now;

            txn_write(txn, UNITS, &unit_id, &unit)?;
            txn_write(txn, ZONES, &zone_key(zone), &record)?;
            closed_minutes = minutes;
            updated = Some(unit);
            Ok(())
        })?;

        self.append_movement(
            &unit_id,
            now,
            actor,
            MovementKind::Complete { zone, minutes: closed_minutes },
            note,
        )?;
        info!(unit = %unit_id, zone, minutes = closed_minutes, "stage completed");
        updated.ok_or_else(|| ServiceError::Internal("transaction produced no unit".into()))
    }

    /// Finish a unit's whole route. Requires every stage to be closed
    /// already; an open stage has to go through `complete_stage` first.
    pub fn complete_production(&self, unit_id: &str, actor: &str) -> Result<Unit, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        validate_actor(actor)?;
        let now = now_utc();
        let mut updated: Option<Unit> = None;

        self.docs.transact(&mut |txn| {
            let mut unit: Unit = txn_read(txn, UNITS, &unit_id)?
                .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;

            if unit.status == UnitStatus::Completed {
                return Err(ServiceError::Validation(format!(
                    "unit '{}' is already completed",
                    unit_id
                )));
            }
            if let Some(zone) = unit.current_zone {
                return Err(ServiceError::Validation(format!(
                    "unit '{}' still has an open stage in zone {}; complete it first",
                    unit_id, zone
                )));
            }

            unit.total_minutes = Some(
                unit.stage_history
                    .iter()
                    .filter_map(|e| e.minutes)
                    .sum::<i64>(),
            );
            unit.status = UnitStatus::Completed;
            unit.completed_at = Some(now);
            unit.update_at = Some(now);

            txn_write(txn, UNITS, &unit_id, &unit)?;
            updated = Some(unit);
            Ok(())
        })?;

        info!(unit = %unit_id, actor = %actor, "production completed");
        updated.ok_or_else(|| ServiceError::Internal("transaction produced no unit".into()))
    }

    // ------------------------------------------------------------------------
    // Transfer / hold
    // ------------------------------------------------------------------------

    /// Move a unit directly from its current zone into another, closing
    /// and opening the stage entries in one transaction.
    pub fn transfer(
        &self,
        unit_id: &str,
        to_zone: u32,
        actor: &str,
        note: Option<&str>,
    ) -> Result<Unit, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        validate_zone(to_zone)?;
        validate_actor(actor)?;
        let now = now_utc();
        let note = non_empty(note);

        // Rolling-average inputs must be read outside the transaction, so
        // the source zone comes from a pre-read. If the unit moves between
        // the pre-read and the transaction, the average update is skipped
        // for that call; the cache is derived data and catches up.
        let pre: Unit = self
            .read_doc(UNITS, &unit_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;
        let samples_zone = pre.current_zone;
        let recent = match samples_zone {
            Some(z) => self.recent_closed_minutes(z, self.config.rolling_window.saturating_sub(1))?,
            None => Vec::new(),
        };

        let mut updated: Option<Unit> = None;
        let mut moved: Option<(u32, i64)> = None;

        self.docs.transact(&mut |txn| {
            let mut unit: Unit = txn_read(txn, UNITS, &unit_id)?
                .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;

            let from_zone = unit.current_zone.ok_or_else(|| ServiceError::Validation(
                format!("unit '{}' is not in any zone", unit_id),
            ))?;
            if from_zone == to_zone {
                return Err(ServiceError::Validation(format!(
                    "unit '{}' is already in zone {}",
                    unit_id, to_zone
                )));
            }

            let mut target: ZoneRecord = txn_read(txn, ZONES, &zone_key(to_zone))?
                .unwrap_or_else(|| ZoneRecord::empty(to_zone, now));
            if let Some(occupant) = target.current_occupant.as_ref()
                && occupant.unit != unit_id
            {
                return Err(ServiceError::ZoneOccupied {
                    zone: to_zone,
                    occupant: occupant.unit.clone(),
                });
            }

            let entry = unit.open_stage_mut().ok_or_else(|| {
                ServiceError::Internal(format!(
                    "unit '{}' has a current zone but no open stage",
                    unit_id
                ))
            })?;
            let minutes = (now - entry.entered_at).num_minutes().max(0);
            entry.exited_at = Some(now);
            entry.exited_by = Some(actor.to_string());
            entry.minutes = Some(minutes);
            entry.note = note.clone();

            unit.stage_history.push(StageEntry {
                zone: to_zone,
                entered_at: now,
                entered_by: actor.to_string(),
                exited_at: None,
                exited_by: None,
                minutes: None,
                note: None,
            });
            unit.current_zone = Some(to_zone);
            unit.update_at = Some(now);

            // Source zone: throughput counts the closed stage; occupant
            // clears only if the cache actually named this unit.
            let mut source: ZoneRecord = txn_read(txn, ZONES, &zone_key(from_zone))?
                .unwrap_or_else(|| ZoneRecord::empty(from_zone, now));
            source.count_processed(now);
            if samples_zone == Some(from_zone) {
                let mut samples = vec![minutes];
                samples.extend(recent.iter().copied());
                source.average_minutes =
                    Some(samples.iter().sum::<i64>() as f64 / samples.len() as f64);
            }
            if source
                .current_occupant
                .as_ref()
                .is_some_and(|o| o.unit == unit_id)
            {
                source.current_occupant = None;
            }
            source.last_updated = now;

            target.current_occupant = Some(OccupantSummary {
                unit: unit_id.clone(),
                model: unit.model.clone(),
                color: unit.color.clone(),
                entered_at: now,
            });
            target.last_updated = now;

            txn_write(txn, UNITS, &unit_id, &unit)?;
            txn_write(txn, ZONES, &zone_key(from_zone), &source)?;
            txn_write(txn, ZONES, &zone_key(to_zone), &target)?;
            moved = Some((from_zone, minutes));
            updated = Some(unit);
            Ok(())
        })?;

        let (from_zone, minutes) =
            moved.ok_or_else(|| ServiceError::Internal("transaction produced no move".into()))?;
        self.append_movement(
            &unit_id,
            now,
            actor,
            MovementKind::Transfer { from_zone, to_zone, minutes },
            note,
        )?;
        info!(unit = %unit_id, from_zone, to_zone, "transfer");
        updated.ok_or_else(|| ServiceError::Internal("transaction produced no unit".into()))
    }

    /// Record a hold annotation against the unit's current zone. Audit
    /// only; ledger and cache are untouched.
    pub fn hold(&self, unit_id: &str, actor: &str, note: &str) -> Result<Movement, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        validate_actor(actor)?;
        let note = non_empty(Some(note))
            .ok_or_else(|| ServiceError::Validation("hold requires a note".into()))?;

        let unit: Unit = self
            .read_doc(UNITS, &unit_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;
        let zone = unit.current_zone.ok_or_else(|| {
            ServiceError::Validation(format!("unit '{}' is not in any zone", unit_id))
        })?;

        let movement = self.append_movement(
            &unit_id,
            now_utc(),
            actor,
            MovementKind::Hold { zone },
            Some(note),
        )?;
        info!(unit = %unit_id, zone, "hold recorded");
        Ok(movement)
    }

    // ------------------------------------------------------------------------
    // Worker check-in
    // ------------------------------------------------------------------------

    /// Check an operator in at a zone, replacing any previous worker.
    pub fn check_in_worker(&self, zone: u32, actor: &str) -> Result<(), ServiceError> {
        validate_zone(zone)?;
        validate_actor(actor)?;
        let now = now_utc();

        self.docs.transact(&mut |txn| {
            let mut record: ZoneRecord = txn_read(txn, ZONES, &zone_key(zone))?
                .unwrap_or_else(|| ZoneRecord::empty(zone, now));
            record.current_worker = Some(WorkerSummary {
                worker: actor.to_string(),
                checked_in_at: now,
            });
            record.last_updated = now;
            txn_write(txn, ZONES, &zone_key(zone), &record)
        })?;
        info!(zone, worker = %actor, "worker checked in");
        Ok(())
    }

    /// Check the current operator out of a zone.
    pub fn check_out_worker(&self, zone: u32) -> Result<(), ServiceError> {
        validate_zone(zone)?;
        let now = now_utc();

        self.docs.transact(&mut |txn| {
            let mut record: ZoneRecord = txn_read(txn, ZONES, &zone_key(zone))?
                .ok_or_else(|| ServiceError::NotFound(format!("zone {} has no record", zone)))?;
            record.current_worker = None;
            record.last_updated = now;
            txn_write(txn, ZONES, &zone_key(zone), &record)
        })?;
        info!(zone, "worker checked out");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------------

    /// The most recent `count` closed stage durations for a zone, newest
    /// first, pulled from the movement log.
    pub(crate) fn recent_closed_minutes(
        &self,
        zone: u32,
        count: usize,
    ) -> Result<Vec<i64>, ServiceError> {
        let mut closed: Vec<(DateTime<Utc>, i64)> = self
            .scan_docs::<Movement>(MOVEMENTS)?
            .into_iter()
            .filter(|m| m.kind.from_zone() == Some(zone))
            .filter_map(|m| m.kind.minutes().map(|mins| (m.at, mins)))
            .collect();
        closed.sort_by_key(|(at, _)| std::cmp::Reverse(*at));
        Ok(closed.into_iter().take(count).map(|(_, m)| m).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingConfig;
    use crate::resolver::IdentityResolver;
    use doc::MemoryStore;

    fn svc() -> TrackingService {
        TrackingService::new(
            Box::new(MemoryStore::new()),
            Box::new(IdentityResolver),
            TrackingConfig::default(),
        )
        .unwrap()
    }

    fn create(svc: &TrackingService, id: &str) -> Unit {
        svc.create_unit(CreateUnitInput {
            id: id.into(),
            model: "A4".into(),
            color: "red".into(),
            series: None,
        })
        .unwrap()
    }

    fn movements(svc: &TrackingService) -> Vec<Movement> {
        let mut all: Vec<Movement> = svc.scan_docs(MOVEMENTS).unwrap();
        all.sort_by_key(|m| m.at);
        all
    }

    // ========================================================================
    // Creation
    // ========================================================================

    #[test]
    fn create_unit_normalizes_serial() {
        let svc = svc();
        let unit = create(&svc, " x1 ");
        assert_eq!(unit.id, "X1");
        assert_eq!(unit.status, UnitStatus::InProduction);
        assert!(unit.current_zone.is_none());
        assert!(unit.stage_history.is_empty());
    }

    #[test]
    fn create_unit_rejects_duplicates() {
        let svc = svc();
        create(&svc, "X1");
        let err = svc
            .create_unit(CreateUnitInput {
                id: "x1".into(),
                model: "A4".into(),
                color: "blue".into(),
                series: None,
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    // ========================================================================
    // Scan-in / complete round trip
    // ========================================================================

    #[test]
    fn scan_in_then_complete_round_trip() {
        let svc = svc();
        create(&svc, "X1");

        let unit = svc.scan_in("X1", 5, "alice").unwrap();
        assert_eq!(unit.current_zone, Some(5));
        assert!(unit.invariant_holds());

        let unit = svc.complete_stage("X1", 5, "alice", None).unwrap();
        assert_eq!(unit.current_zone, None);
        assert!(unit.invariant_holds());
        assert_eq!(unit.stage_history.len(), 1);
        let entry = &unit.stage_history[0];
        assert!(!entry.is_open());
        assert!(entry.minutes.unwrap() >= 0);

        let log = movements(&svc);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind.kind_name(), "scan_in");
        assert_eq!(log[1].kind.kind_name(), "complete");
    }

    #[test]
    fn scan_in_unknown_unit_is_not_found() {
        let svc = svc();
        let err = svc.scan_in("X9", 5, "alice").unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn scan_in_twice_fails_already_occupied() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 5, "alice").unwrap();

        // Same zone, different actor.
        let err = svc.scan_in("X1", 5, "bob").unwrap_err();
        match err {
            ServiceError::AlreadyOccupied { ref unit, zone } => {
                assert_eq!(unit, "X1");
                assert_eq!(zone, 5);
            }
            other => panic!("unexpected: {:?}", other),
        }

        // Different zone: still stuck in zone 5.
        let err = svc.scan_in("X1", 7, "bob").unwrap_err();
        match err {
            ServiceError::AlreadyOccupied { zone, .. } => assert_eq!(zone, 5),
            other => panic!("unexpected: {:?}", other),
        }

        // Only the first scan-in reached the log.
        assert_eq!(movements(&svc).len(), 1);
    }

    #[test]
    fn scan_in_occupied_zone_names_the_occupant() {
        let svc = svc();
        create(&svc, "X1");
        create(&svc, "X2");
        svc.scan_in("X1", 5, "alice").unwrap();

        let err = svc.scan_in("X2", 5, "bob").unwrap_err();
        match err {
            ServiceError::ZoneOccupied { zone, ref occupant } => {
                assert_eq!(zone, 5);
                assert_eq!(occupant, "X1");
            }
            other => panic!("unexpected: {:?}", other),
        }

        // X2 untouched.
        let x2: Unit = svc.read_doc(UNITS, "X2").unwrap().unwrap();
        assert!(x2.current_zone.is_none());
        assert!(x2.stage_history.is_empty());
    }

    #[test]
    fn scan_in_completed_unit_is_rejected() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 5, "alice").unwrap();
        svc.complete_stage("X1", 5, "alice", None).unwrap();
        svc.complete_production("X1", "alice").unwrap();

        let err = svc.scan_in("X1", 6, "alice").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    // ========================================================================
    // Stage completion preconditions
    // ========================================================================

    #[test]
    fn complete_wrong_zone_reports_actual_location() {
        let svc = svc();
        create(&svc, "X4");
        svc.scan_in("X4", 6, "carol").unwrap();

        let before: Unit = svc.read_doc(UNITS, "X4").unwrap().unwrap();
        let err = svc.complete_stage("X4", 3, "carol", None).unwrap_err();
        match err {
            ServiceError::NotInZone { ref unit, requested, actual } => {
                assert_eq!(unit, "X4");
                assert_eq!(requested, 3);
                assert_eq!(actual, Some(6));
            }
            other => panic!("unexpected: {:?}", other),
        }

        // No writes happened.
        let after: Unit = svc.read_doc(UNITS, "X4").unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(movements(&svc).len(), 1);
    }

    #[test]
    fn complete_while_not_in_any_zone() {
        let svc = svc();
        create(&svc, "X1");
        let err = svc.complete_stage("X1", 3, "alice", None).unwrap_err();
        match err {
            ServiceError::NotInZone { actual, .. } => assert_eq!(actual, None),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn complete_with_diverged_cache_is_occupancy_mismatch() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 5, "alice").unwrap();

        // Inject divergence: the cache suddenly names another unit.
        let mut record: ZoneRecord = svc.read_doc(ZONES, "5").unwrap().unwrap();
        record.current_occupant.as_mut().unwrap().unit = "X9".into();
        svc.write_doc(ZONES, "5", &record).unwrap();

        let err = svc.complete_stage("X1", 5, "alice", None).unwrap_err();
        assert_eq!(err.error_code(), "OCCUPANCY_MISMATCH");
    }

    #[test]
    fn complete_stage_records_note_and_updates_cache() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 5, "alice").unwrap();
        let unit = svc.complete_stage("X1", 5, "alice", Some("paint blemish")).unwrap();
        assert_eq!(unit.stage_history[0].note.as_deref(), Some("paint blemish"));

        let record: ZoneRecord = svc.read_doc(ZONES, "5").unwrap().unwrap();
        assert!(record.current_occupant.is_none());
        assert_eq!(record.units_processed_today, 1);
        assert!(record.average_minutes.is_some());
    }

    // ========================================================================
    // Production completion
    // ========================================================================

    #[test]
    fn complete_production_sums_closed_durations() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 1, "alice").unwrap();
        svc.complete_stage("X1", 1, "alice", None).unwrap();
        svc.scan_in("X1", 2, "bob").unwrap();
        svc.complete_stage("X1", 2, "bob", None).unwrap();

        let unit = svc.complete_production("X1", "alice").unwrap();
        assert_eq!(unit.status, UnitStatus::Completed);
        assert!(unit.completed_at.is_some());
        let expected: i64 = unit.stage_history.iter().filter_map(|e| e.minutes).sum();
        assert_eq!(unit.total_minutes, Some(expected));
    }

    #[test]
    fn complete_production_requires_closed_stages() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 5, "alice").unwrap();

        let err = svc.complete_production("X1", "alice").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert!(err.to_string().contains("zone 5"));
    }

    #[test]
    fn complete_production_twice_is_rejected() {
        let svc = svc();
        create(&svc, "X1");
        svc.complete_production("X1", "alice").unwrap();
        let err = svc.complete_production("X1", "alice").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    // ========================================================================
    // Transfer / hold
    // ========================================================================

    #[test]
    fn transfer_moves_between_zones_atomically() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 3, "alice").unwrap();

        let unit = svc.transfer("X1", 4, "alice", None).unwrap();
        assert_eq!(unit.current_zone, Some(4));
        assert!(unit.invariant_holds());
        assert_eq!(unit.stage_history.len(), 2);
        assert!(!unit.stage_history[0].is_open());
        assert!(unit.stage_history[1].is_open());

        let source: ZoneRecord = svc.read_doc(ZONES, "3").unwrap().unwrap();
        assert!(source.current_occupant.is_none());
        let target: ZoneRecord = svc.read_doc(ZONES, "4").unwrap().unwrap();
        assert_eq!(target.current_occupant.as_ref().unwrap().unit, "X1");

        let log = movements(&svc);
        assert_eq!(log.last().unwrap().kind.kind_name(), "transfer");
    }

    #[test]
    fn transfer_into_occupied_zone_fails() {
        let svc = svc();
        create(&svc, "X1");
        create(&svc, "X2");
        svc.scan_in("X1", 3, "alice").unwrap();
        svc.scan_in("X2", 4, "bob").unwrap();

        let err = svc.transfer("X1", 4, "alice", None).unwrap_err();
        assert_eq!(err.error_code(), "ZONE_OCCUPIED");

        // X1 still in zone 3.
        let x1: Unit = svc.read_doc(UNITS, "X1").unwrap().unwrap();
        assert_eq!(x1.current_zone, Some(3));
    }

    #[test]
    fn hold_appends_audit_entry_without_state_change() {
        let svc = svc();
        create(&svc, "X1");
        svc.scan_in("X1", 5, "alice").unwrap();

        let movement = svc.hold("X1", "bob", "waiting on parts").unwrap();
        assert_eq!(movement.kind, MovementKind::Hold { zone: 5 });
        assert_eq!(movement.note.as_deref(), Some("waiting on parts"));

        let unit: Unit = svc.read_doc(UNITS, "X1").unwrap().unwrap();
        assert_eq!(unit.current_zone, Some(5));
        assert!(unit.open_stage().is_some());
    }

    #[test]
    fn hold_requires_note_and_occupancy() {
        let svc = svc();
        create(&svc, "X1");
        assert!(svc.hold("X1", "bob", "reason").is_err()); // not in a zone
        svc.scan_in("X1", 5, "alice").unwrap();
        assert!(svc.hold("X1", "bob", "  ").is_err()); // empty note
    }

    // ========================================================================
    // Worker check-in
    // ========================================================================

    #[test]
    fn worker_check_in_and_out() {
        let svc = svc();
        svc.check_in_worker(5, "alice").unwrap();
        let record: ZoneRecord = svc.read_doc(ZONES, "5").unwrap().unwrap();
        assert_eq!(record.current_worker.as_ref().unwrap().worker, "alice");

        svc.check_out_worker(5).unwrap();
        let record: ZoneRecord = svc.read_doc(ZONES, "5").unwrap().unwrap();
        assert!(record.current_worker.is_none());
    }

    #[test]
    fn check_out_unknown_zone_is_not_found() {
        let svc = svc();
        let err = svc.check_out_worker(99).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
