use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use linetrack_core::{ServiceError, now_utc};

use crate::model::{MovementKind, UNITS, Unit, UnitStatus, ZONES, ZoneRecord};

use super::{TrackingService, normalize_unit_id, txn_read, txn_write, validate_actor, zone_key};

/// Actor recorded on movements written by the consistency sweep.
pub(crate) const SWEEP_ACTOR: &str = "consistency-sweep";

/// Outcome of one sweep run.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Number of records corrected.
    pub fixed: usize,
    /// Human-readable diagnostics, one per fix. Informational, not an
    /// error channel.
    pub notes: Vec<String>,
}

impl TrackingService {
    // ------------------------------------------------------------------------
    // Force removal
    // ------------------------------------------------------------------------

    /// Administrative escape hatch: clear a unit out of whatever zone it
    /// claims, unconditionally. Fails only if the unit does not exist.
    pub fn force_remove(
        &self,
        unit_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<Unit, ServiceError> {
        let unit_id = normalize_unit_id(unit_id)?;
        validate_actor(actor)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::Validation("force-remove requires a reason".into()));
        }

        let now = now_utc();
        let mut updated: Option<Unit> = None;
        let mut from_zone: Option<u32> = None;

        self.docs.transact(&mut |txn| {
            let mut unit: Unit = txn_read(txn, UNITS, &unit_id)?
                .ok_or_else(|| ServiceError::NotFound(format!("unit '{}' not found", unit_id)))?;

            from_zone = unit.current_zone;
            if let Some(entry) = unit.open_stage_mut() {
                entry.exited_at = Some(now);
                entry.exited_by = Some(actor.to_string());
                entry.minutes = Some((now - entry.entered_at).num_minutes().max(0));
                entry.note = Some(reason.to_string());
            }
            unit.current_zone = None;
            unit.update_at = Some(now);
            txn_write(txn, UNITS, &unit_id, &unit)?;

            // Clear the cached occupant only if it actually names this
            // unit; another unit's claim on the zone is left alone.
            if let Some(zone) = from_zone
                && let Some(mut record) = txn_read::<ZoneRecord>(txn, ZONES, &zone_key(zone))?
                && record
                    .current_occupant
                    .as_ref()
                    .is_some_and(|o| o.unit == unit_id)
            {
                record.current_occupant = None;
                record.last_updated = now;
                txn_write(txn, ZONES, &zone_key(zone), &record)?;
            }

            updated = Some(unit);
            Ok(())
        })?;

        self.append_movement(
            &unit_id,
            now,
            actor,
            MovementKind::ForceRemove { from_zone },
            Some(reason.to_string()),
        )?;
        warn!(unit = %unit_id, ?from_zone, reason, "force-removed");
        updated.ok_or_else(|| ServiceError::Internal("transaction produced no unit".into()))
    }

    // ------------------------------------------------------------------------
    // Consistency sweep
    // ------------------------------------------------------------------------

    /// Detect and heal divergence between the unit ledger and the zone
    /// cache. Idempotent; safe to run repeatedly and concurrently with
    /// live traffic — every fix is its own atomic transaction that
    /// re-validates before writing. The ledger always wins.
    pub fn run_consistency_sweep(&self) -> Result<SweepReport, ServiceError> {
        let mut report = SweepReport::default();
        self.sweep_duplicate_occupants(&mut report)?;
        self.sweep_cache_divergence(&mut report)?;

        if report.fixed > 0 {
            warn!(fixed = report.fixed, "consistency sweep repaired divergence");
        } else {
            info!("consistency sweep found nothing to fix");
        }
        Ok(report)
    }

    /// Pass 1: zones claimed by more than one in-production unit. The
    /// earliest claimant (by entry time) keeps the zone; the rest are
    /// force-removed.
    fn sweep_duplicate_occupants(&self, report: &mut SweepReport) -> Result<(), ServiceError> {
        let units: Vec<Unit> = self.scan_docs(UNITS)?;

        let mut claimants: HashMap<u32, Vec<&Unit>> = HashMap::new();
        for unit in units
            .iter()
            .filter(|u| u.status == UnitStatus::InProduction)
        {
            if let Some(zone) = unit.current_zone {
                claimants.entry(zone).or_default().push(unit);
            }
        }

        for (zone, mut group) in claimants {
            if group.len() < 2 {
                continue;
            }
            // Units with a broken history (no open entry) sort last and
            // therefore never win the zone.
            group.sort_by_key(|u| {
                u.open_stage()
                    .map(|e| e.entered_at)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
            let keeper = group[0].id.clone();

            for loser in &group[1..] {
                if self.fix_duplicate(zone, &loser.id, &keeper, report)? {
                    report.fixed += 1;
                }
            }
        }
        Ok(())
    }

    /// Force-remove one duplicate claimant, re-validating inside the
    /// transaction. Returns false if the conflict resolved itself since
    /// the scan.
    fn fix_duplicate(
        &self,
        zone: u32,
        loser: &str,
        keeper: &str,
        report: &mut SweepReport,
    ) -> Result<bool, ServiceError> {
        let now = now_utc();
        let note = format!(
            "duplicate occupancy of zone {}: kept '{}', removed '{}'",
            zone, keeper, loser
        );
        let mut fixed = false;

        self.docs.transact(&mut |txn| {
            let Some(mut unit) = txn_read::<Unit>(txn, UNITS, loser)? else {
                return Ok(());
            };
            if unit.current_zone != Some(zone) {
                return Ok(());
            }

            if let Some(entry) = unit.open_stage_mut() {
                entry.exited_at = Some(now);
                entry.exited_by = Some(SWEEP_ACTOR.to_string());
                entry.minutes = Some((now - entry.entered_at).num_minutes().max(0));
                entry.note = Some(note.clone());
            }
            unit.current_zone = None;
            unit.update_at = Some(now);
            txn_write(txn, UNITS, loser, &unit)?;

            if let Some(mut record) = txn_read::<ZoneRecord>(txn, ZONES, &zone_key(zone))?
                && record
                    .current_occupant
                    .as_ref()
                    .is_some_and(|o| o.unit == *loser)
            {
                record.current_occupant = None;
                record.last_updated = now;
                txn_write(txn, ZONES, &zone_key(zone), &record)?;
            }

            fixed = true;
            Ok(())
        })?;

        if fixed {
            self.append_movement(
                loser,
                now,
                SWEEP_ACTOR,
                MovementKind::ForceRemove { from_zone: Some(zone) },
                Some(note.clone()),
            )?;
            warn!(zone, unit = %loser, "sweep removed duplicate occupant");
            report.notes.push(note);
        }
        Ok(fixed)
    }

    /// Pass 2: zone cache records naming an occupant the ledger does not
    /// place there ("ghosts"). The cache side is cleared.
    fn sweep_cache_divergence(&self, report: &mut SweepReport) -> Result<(), ServiceError> {
        let records: Vec<ZoneRecord> = self.scan_docs(ZONES)?;

        for stale in records {
            let Some(occupant) = stale.current_occupant.as_ref() else {
                continue;
            };
            let zone = stale.zone;
            let claimed = occupant.unit.clone();
            let now = now_utc();
            let mut note: Option<String> = None;

            self.docs.transact(&mut |txn| {
                let Some(mut record) = txn_read::<ZoneRecord>(txn, ZONES, &zone_key(zone))? else {
                    return Ok(());
                };
                if !record
                    .current_occupant
                    .as_ref()
                    .is_some_and(|o| o.unit == claimed)
                {
                    return Ok(());
                }

                // The ledger is authoritative: the cache only keeps its
                // occupant if the unit really is in this zone.
                let ledger: Option<Unit> = txn_read(txn, UNITS, &claimed)?;
                let actually_here =
                    ledger.as_ref().is_some_and(|u| u.current_zone == Some(zone));
                if actually_here {
                    return Ok(());
                }

                record.current_occupant = None;
                record.last_updated = now;
                txn_write(txn, ZONES, &zone_key(zone), &record)?;

                note = Some(match ledger {
                    Some(u) => format!(
                        "zone {} cached ghost occupant '{}' (ledger places it {})",
                        zone,
                        claimed,
                        u.current_zone
                            .map(|z| format!("in zone {}", z))
                            .unwrap_or_else(|| "in no zone".into()),
                    ),
                    None => format!(
                        "zone {} cached unknown unit '{}'",
                        zone, claimed
                    ),
                });
                Ok(())
            })?;

            if let Some(note) = note {
                warn!(zone, unit = %claimed, "sweep cleared ghost occupant");
                report.notes.push(note);
                report.fixed += 1;
            }
        }
        Ok(())
    }
}
