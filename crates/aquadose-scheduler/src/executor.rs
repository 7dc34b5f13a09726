//! Single-attempt delivery execution.
//!
//! Each attempt re-reads delivered-so-far from the store, quantizes the
//! remaining volume, caps it to one burst, and drives the hardware.
//! Completion is decided strictly by comparing updated delivered volume
//! against the subject's schedule target, never by any property of the
//! instant that was just executed.

use std::sync::Arc;

use aquadose_core::config::PumpConfig;

use crate::deliveries::{AttemptRecord, CycleTracker, DeliveryInstant};
use crate::hardware::Dispenser;
use crate::persistence::DoseDb;
use crate::quantize;

const VOLUME_EPSILON_ML: f64 = 1e-9;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Subject reached its target volume.
    Completed { dispensed_ml: f64 },
    /// Burst fired but volume remains outstanding.
    Partial { dispensed_ml: f64, remaining_ml: f64 },
    /// Hardware dispense failed.
    Failed { error: String },
    /// Progress could not be read; aborted before touching hardware.
    Deferred { error: String },
}

/// Drives one instant at a time through the hardware collaborator.
pub struct Executor {
    hardware: Arc<dyn Dispenser>,
    pump: PumpConfig,
}

impl Executor {
    pub fn new(hardware: Arc<dyn Dispenser>, pump: PumpConfig) -> Self {
        Self { hardware, pump }
    }

    /// Execute one attempt for `instant` against the subject's overall
    /// target. Appends an attempt row for success and failure alike and
    /// credits only the volume that actually left the pump.
    pub async fn execute(
        &self,
        instant: &DeliveryInstant,
        subject_target_ml: f64,
        db: &DoseDb,
        tracker: &mut CycleTracker,
    ) -> Outcome {
        // Progress comes from a short scoped store read. A failed read
        // must not be mistaken for zero delivered volume.
        let delivered = match db.sum_delivered(&instant.schedule_id, &instant.subject_id) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "⚠️ progress read failed for {}/{}: {e}",
                    instant.schedule_id,
                    instant.subject_id
                );
                return Outcome::Deferred { error: e.to_string() };
            }
        };

        let remaining = subject_target_ml - delivered;
        if remaining <= VOLUME_EPSILON_ML {
            tracing::debug!(
                "subject {} already at target ({delivered:.3} mL), skipping hardware",
                instant.subject_id
            );
            return Outcome::Completed { dispensed_ml: 0.0 };
        }

        let triggers = match quantize::triggers_for(
            remaining,
            self.pump.ul_per_trigger,
            self.pump.calibration_factor,
            self.pump.min_triggers,
        ) {
            Ok(t) => t,
            Err(e) => return Outcome::Failed { error: e.to_string() },
        };
        let (burst, _) = quantize::cap_to_cycle(triggers, self.pump.max_triggers_per_cycle);

        match self
            .hardware
            .dispense(instant.channel_id, burst, instant.trigger_spacing_secs)
            .await
        {
            Ok(()) => {
                // Credit what actually left the pump, not the request.
                let dispensed = quantize::volume_for_triggers(burst, self.pump.ul_per_trigger);
                let record = AttemptRecord::completed(instant, remaining, dispensed, burst);
                if let Err(e) = db.append_attempt(&record) {
                    tracing::warn!("⚠️ attempt record write failed: {e}");
                }
                tracker.record(
                    &instant.schedule_id,
                    &instant.subject_id,
                    dispensed,
                    instant.cycle_index,
                );
                tracing::info!(
                    "💧 dispensed {dispensed:.3} mL to {} on channel {} ({burst} triggers)",
                    instant.subject_id,
                    instant.channel_id
                );

                let updated = delivered + dispensed;
                if updated + VOLUME_EPSILON_ML >= subject_target_ml {
                    Outcome::Completed { dispensed_ml: dispensed }
                } else {
                    Outcome::Partial {
                        dispensed_ml: dispensed,
                        remaining_ml: subject_target_ml - updated,
                    }
                }
            }
            Err(e) => {
                let record = AttemptRecord::failed(instant, remaining, burst, &e.to_string());
                if let Err(we) = db.append_attempt(&record) {
                    tracing::warn!("⚠️ attempt record write failed: {we}");
                }
                tracing::warn!(
                    "⚠️ dispense failed for {} on channel {}: {e}",
                    instant.subject_id,
                    instant.channel_id
                );
                Outcome::Failed { error: e.to_string() }
            }
        }
    }
}
