use linetrack_core::ServiceError;

/// Tuning knobs for the tracking engine.
///
/// The defaults match the numbers the floor has been running with; neither
/// is load-bearing business logic, so both stay configurable.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Gap above which a zone's idle time is treated as an off-shift
    /// break and reported as absent instead of a huge outlier.
    pub idle_gap_ceiling_minutes: i64,

    /// How many of the most recent closed stage durations feed a zone's
    /// rolling average.
    pub rolling_window: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            idle_gap_ceiling_minutes: 180,
            rolling_window: 10,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.idle_gap_ceiling_minutes <= 0 {
            return Err(ServiceError::Validation(
                "idle gap ceiling must be positive".into(),
            ));
        }
        if self.rolling_window == 0 {
            return Err(ServiceError::Validation(
                "rolling average window must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TrackingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_values() {
        let mut cfg = TrackingConfig::default();
        cfg.idle_gap_ceiling_minutes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrackingConfig::default();
        cfg.rolling_window = 0;
        assert!(cfg.validate().is_err());
    }
}
