pub mod movement;
pub mod unit;
pub mod zone;

pub use movement::{Movement, MovementKind};
pub use unit::{StageEntry, Unit, UnitStatus};
pub use zone::{OccupantSummary, WorkerSummary, ZoneRecord, ZoneSnapshot};

/// Document collections used by the engine.
pub const UNITS: &str = "units";
pub const ZONES: &str = "zones";
pub const MOVEMENTS: &str = "movements";
