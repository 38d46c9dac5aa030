use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use linetrack_core::{ServiceError, now_utc};

use crate::model::{MOVEMENTS, Movement, UNITS, Unit, UnitStatus};

use super::TrackingService;

/// Per-zone throughput for one day.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDayStat {
    pub zone: u32,
    /// Stages closed in this zone today.
    pub completed: u32,
    pub average_minutes: f64,
}

/// Per-actor activity for one day.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActorDayStat {
    pub actor: String,
    pub display_name: String,
    /// Sum of closed stage durations credited to this actor today.
    pub total_minutes: i64,
    /// Distinct units the actor touched today, any movement kind.
    pub units_worked: u32,
}

/// Aggregate statistics for one calendar day, derived by scanning the
/// collections in memory. Volumes are bounded to daily/zone granularity,
/// so no pre-aggregated rollups exist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatistics {
    pub date: NaiveDate,
    pub units_started: u32,
    pub units_completed: u32,
    pub units_in_progress: u32,
    /// Mean total production time over units completed today.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_total_minutes: Option<f64>,
    pub zones: Vec<ZoneDayStat>,
    pub actors: Vec<ActorDayStat>,
}

impl TrackingService {
    /// Statistics for today (UTC).
    pub fn daily_statistics(&self) -> Result<DailyStatistics, ServiceError> {
        let today = now_utc().date_naive();

        let units: Vec<Unit> = self.scan_docs(UNITS)?;
        let units_started = units
            .iter()
            .filter(|u| u.create_at.is_some_and(|at| at.date_naive() == today))
            .count() as u32;
        let completed_today: Vec<&Unit> = units
            .iter()
            .filter(|u| u.completed_at.is_some_and(|at| at.date_naive() == today))
            .collect();
        let units_in_progress = units
            .iter()
            .filter(|u| u.status == UnitStatus::InProduction)
            .count() as u32;

        let totals: Vec<i64> = completed_today
            .iter()
            .filter_map(|u| u.total_minutes)
            .collect();
        let average_total_minutes = if totals.is_empty() {
            None
        } else {
            Some(totals.iter().sum::<i64>() as f64 / totals.len() as f64)
        };

        let todays: Vec<Movement> = self
            .scan_docs::<Movement>(MOVEMENTS)?
            .into_iter()
            .filter(|m| m.at.date_naive() == today)
            .collect();

        // Zone throughput: every closed stage credits the zone it left.
        let mut zone_minutes: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
        for movement in &todays {
            if let (Some(zone), Some(minutes)) =
                (movement.kind.from_zone(), movement.kind.minutes())
            {
                zone_minutes.entry(zone).or_default().push(minutes);
            }
        }
        let zones = zone_minutes
            .into_iter()
            .map(|(zone, minutes)| ZoneDayStat {
                zone,
                completed: minutes.len() as u32,
                average_minutes: minutes.iter().sum::<i64>() as f64 / minutes.len() as f64,
            })
            .collect();

        // Actor activity: time from closed durations, breadth from any
        // movement the actor appears on.
        let mut actor_minutes: BTreeMap<String, i64> = BTreeMap::new();
        let mut actor_units: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
        for movement in &todays {
            actor_units
                .entry(movement.actor.clone())
                .or_default()
                .insert(movement.unit.as_str());
            if let Some(minutes) = movement.kind.minutes() {
                *actor_minutes.entry(movement.actor.clone()).or_default() += minutes;
            }
        }
        let actors = actor_units
            .into_iter()
            .map(|(actor, worked)| ActorDayStat {
                display_name: self.resolver.display_name(&actor),
                total_minutes: actor_minutes.get(&actor).copied().unwrap_or(0),
                units_worked: worked.len() as u32,
                actor,
            })
            .collect();

        Ok(DailyStatistics {
            date: today,
            units_started,
            units_completed: completed_today.len() as u32,
            units_in_progress,
            average_total_minutes,
            zones,
            actors,
        })
    }
}
