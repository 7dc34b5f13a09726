//! Volume-to-trigger quantization.
//!
//! A trigger dispenses a fixed calibrated volume; desired volumes are
//! converted to whole trigger counts, and large counts are split into
//! burst-sized chunks the hardware can fire in one go.

use aquadose_core::error::{DoseError, Result};

/// Quantize a volume (mL) into whole triggers.
///
/// `ceil(volume_ml * 1000 * calibration_factor / pump_ul_per_trigger)`,
/// floored at `min_triggers`.
pub fn triggers_for(
    volume_ml: f64,
    pump_ul_per_trigger: f64,
    calibration_factor: f64,
    min_triggers: u32,
) -> Result<u32> {
    if !volume_ml.is_finite() || volume_ml <= 0.0 {
        return Err(DoseError::InvalidVolume(format!(
            "volume must be positive, got {volume_ml} mL"
        )));
    }
    if !pump_ul_per_trigger.is_finite() || pump_ul_per_trigger <= 0.0 {
        return Err(DoseError::InvalidVolume(format!(
            "per-trigger volume must be positive, got {pump_ul_per_trigger} µL"
        )));
    }
    if !calibration_factor.is_finite() || calibration_factor <= 0.0 {
        return Err(DoseError::InvalidVolume(format!(
            "calibration factor must be positive, got {calibration_factor}"
        )));
    }
    let raw = (volume_ml * 1000.0 * calibration_factor / pump_ul_per_trigger).ceil() as u32;
    Ok(raw.max(min_triggers.max(1)))
}

/// Split a trigger count into one burst plus what is left over, so a
/// large request spans multiple attempts instead of one oversized burst.
pub fn cap_to_cycle(triggers: u32, max_triggers_per_cycle: u32) -> (u32, u32) {
    let cap = max_triggers_per_cycle.max(1);
    let burst = triggers.min(cap);
    (burst, triggers - burst)
}

/// Nominal volume dispensed by `triggers` actuations, in mL.
pub fn volume_for_triggers(triggers: u32, pump_ul_per_trigger: f64) -> f64 {
    triggers as f64 * pump_ul_per_trigger / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_ml_at_fifty_ul() {
        assert_eq!(triggers_for(2.0, 50.0, 1.0, 1).unwrap(), 40);
    }

    #[test]
    fn test_ceil_sweep_matches_integer_math() {
        // Quarter-mL volumes and these pump sizes are exact in binary
        // floating point, so expected counts come from integer math.
        for pump_ul in [40u32, 50, 64, 125] {
            for quarters in 1u32..=64 {
                let volume_ml = quarters as f64 * 0.25;
                let total_ul = quarters * 250;
                let expected = total_ul.div_ceil(pump_ul);
                let got = triggers_for(volume_ml, pump_ul as f64, 1.0, 1).unwrap();
                assert_eq!(got, expected, "{volume_ml} mL at {pump_ul} µL/trigger");
            }
        }
    }

    #[test]
    fn test_calibration_scales_count() {
        // 2.0 mL at 50 µL with a 1.5x calibration needs 60 triggers.
        assert_eq!(triggers_for(2.0, 50.0, 1.5, 1).unwrap(), 60);
    }

    #[test]
    fn test_minimum_floor() {
        assert_eq!(triggers_for(0.001, 50.0, 1.0, 1).unwrap(), 1);
        assert_eq!(triggers_for(0.001, 50.0, 1.0, 3).unwrap(), 3);
        // A zero configured minimum still yields at least one trigger.
        assert_eq!(triggers_for(0.001, 50.0, 1.0, 0).unwrap(), 1);
    }

    #[test]
    fn test_rejects_nonpositive_inputs() {
        assert!(matches!(
            triggers_for(0.0, 50.0, 1.0, 1),
            Err(DoseError::InvalidVolume(_))
        ));
        assert!(matches!(
            triggers_for(-1.0, 50.0, 1.0, 1),
            Err(DoseError::InvalidVolume(_))
        ));
        assert!(matches!(
            triggers_for(1.0, 0.0, 1.0, 1),
            Err(DoseError::InvalidVolume(_))
        ));
        assert!(matches!(
            triggers_for(1.0, 50.0, 0.0, 1),
            Err(DoseError::InvalidVolume(_))
        ));
        assert!(triggers_for(f64::NAN, 50.0, 1.0, 1).is_err());
    }

    #[test]
    fn test_cap_to_cycle_splits() {
        assert_eq!(cap_to_cycle(40, 5), (5, 35));
        assert_eq!(cap_to_cycle(3, 5), (3, 0));
        assert_eq!(cap_to_cycle(5, 5), (5, 0));
        // Degenerate cap of zero still fires one trigger per attempt.
        assert_eq!(cap_to_cycle(7, 0), (1, 6));
    }

    #[test]
    fn test_volume_for_triggers() {
        assert!((volume_for_triggers(5, 50.0) - 0.25).abs() < 1e-12);
        assert!((volume_for_triggers(40, 50.0) - 2.0).abs() < 1e-12);
        assert_eq!(volume_for_triggers(0, 50.0), 0.0);
    }
}
