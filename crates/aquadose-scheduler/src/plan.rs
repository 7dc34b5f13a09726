//! Delivery timing planner.
//!
//! Turns a window and a set of subject targets into concrete spaced
//! `DeliveryInstant`s: per-subject cycle counts, one shared cycle
//! interval so subjects stay aligned, an inter-subject stagger so no two
//! bursts overlap on shared hardware, and last-cycle compression so the
//! final burst never runs past the window end.

use chrono::{DateTime, Duration, Utc};

use aquadose_core::config::PumpConfig;
use aquadose_core::error::{DoseError, Result};

use crate::deliveries::{DeliveryInstant, DeliveryMode};
use crate::quantize;

/// One subject's dosing target within a planning window.
#[derive(Debug, Clone)]
pub struct PlanSubject {
    pub subject_id: String,
    pub channel_id: u8,
    pub target_volume_ml: f64,
}

fn secs(s: f64) -> Duration {
    Duration::milliseconds((s * 1000.0).round() as i64)
}

/// Plan staggered delivery instants for every subject across the window.
///
/// Fails with `WindowTooShort` rather than silently shrinking the cycle
/// spacing floor.
pub fn plan(
    schedule_id: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    subjects: &[PlanSubject],
    min_cycles: Option<u32>,
    pump: &PumpConfig,
    next_id: &mut dyn FnMut() -> u64,
) -> Result<Vec<DeliveryInstant>> {
    if subjects.is_empty() {
        return Err(DoseError::Config("no subjects to plan".into()));
    }
    let window_secs = (window_end - window_start).num_milliseconds() as f64 / 1000.0;
    if window_secs <= 0.0 {
        return Err(DoseError::Config(
            "window end must be after window start".into(),
        ));
    }
    if window_secs < pump.min_cycle_spacing_secs {
        return Err(DoseError::WindowTooShort(format!(
            "{window_secs:.0}s window cannot honor the {:.0}s cycle spacing floor",
            pump.min_cycle_spacing_secs
        )));
    }

    let cap = pump.max_triggers_per_cycle.max(1);

    // Per-subject totals and cycle counts; no cycle may exceed the burst cap.
    let mut totals: Vec<(u32, u32)> = Vec::with_capacity(subjects.len());
    let mut max_cycles = 1u32;
    for subject in subjects {
        let triggers = quantize::triggers_for(
            subject.target_volume_ml,
            pump.ul_per_trigger,
            pump.calibration_factor,
            pump.min_triggers,
        )?;
        let mut cycles = triggers.div_ceil(cap);
        if let Some(n) = min_cycles {
            cycles = cycles.max(n.max(1));
        }
        max_cycles = max_cycles.max(cycles);
        totals.push((triggers, cycles));
    }

    // One interval for every subject in the window keeps cycles aligned.
    let cycle_interval = (window_secs / max_cycles as f64).max(pump.min_cycle_spacing_secs);
    // Stagger guarantees no two subjects' bursts overlap on shared hardware.
    let stagger = (cycle_interval / subjects.len() as f64)
        .max(pump.trigger_interval_secs * cap as f64);

    let mut out = Vec::new();
    for (i, (subject, (total, cycles))) in subjects.iter().zip(&totals).enumerate() {
        let offset = i as f64 * stagger;
        let last_start = offset + (cycles - 1) as f64 * cycle_interval;
        if last_start >= window_secs {
            return Err(DoseError::WindowTooShort(format!(
                "subject '{}' needs {} cycles spaced {:.0}s apart; the last would start {:.0}s into a {:.0}s window",
                subject.subject_id, cycles, cycle_interval, last_start, window_secs
            )));
        }

        let mut remaining = *total;
        for k in 0..*cycles {
            // Even split; stays at or below the burst cap because the
            // cycle count was derived from it.
            let burst = remaining.div_ceil(cycles - k);
            remaining -= burst;

            let start_offset = offset + k as f64 * cycle_interval;
            let mut spacing = pump.trigger_interval_secs;
            if k + 1 == *cycles && burst > 0 {
                // Last cycle only: compress triggers evenly if the ideal
                // spacing would overflow the window.
                let room = window_secs - start_offset;
                if burst as f64 * spacing > room {
                    spacing = (room / burst as f64).max(0.0);
                }
            }

            out.push(DeliveryInstant {
                instant_id: next_id(),
                schedule_id: schedule_id.to_string(),
                subject_id: subject.subject_id.clone(),
                channel_id: subject.channel_id,
                delivery_time: window_start + secs(start_offset),
                target_volume_ml: quantize::volume_for_triggers(burst, pump.ul_per_trigger),
                trigger_count: burst,
                cycle_index: k,
                total_cycles: *cycles,
                mode: DeliveryMode::Staggered,
                trigger_spacing_secs: spacing,
                is_recovery: false,
            });
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pump(cap: u32, spacing: f64, trigger_interval: f64) -> PumpConfig {
        PumpConfig {
            ul_per_trigger: 50.0,
            calibration_factor: 1.0,
            min_triggers: 1,
            max_triggers_per_cycle: cap,
            trigger_interval_secs: trigger_interval,
            min_cycle_spacing_secs: spacing,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn subject(id: &str, channel: u8, volume: f64) -> PlanSubject {
        PlanSubject {
            subject_id: id.into(),
            channel_id: channel,
            target_volume_ml: volume,
        }
    }

    fn id_counter() -> impl FnMut() -> u64 {
        let mut n = 0u64;
        move || {
            n += 1;
            n
        }
    }

    #[test]
    fn test_forty_triggers_make_eight_cycles_of_250ul() {
        // 2.0 mL at 50 µL/trigger with a burst cap of 5: 8 cycles of 250 µL.
        let start = t0();
        let end = start + Duration::hours(2);
        let mut ids = id_counter();
        let instants = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 2.0)],
            None,
            &pump(5, 300.0, 0.5),
            &mut ids,
        )
        .unwrap();

        assert_eq!(instants.len(), 8);
        for instant in &instants {
            assert_eq!(instant.trigger_count, 5);
            assert!((instant.target_volume_ml - 0.25).abs() < 1e-9);
            assert_eq!(instant.total_cycles, 8);
        }
        // Cycles spaced by at least the spacing floor.
        for pair in instants.windows(2) {
            let gap = (pair[1].delivery_time - pair[0].delivery_time).num_seconds();
            assert!(gap >= 300, "cycle gap {gap}s below the spacing floor");
        }
    }

    #[test]
    fn test_single_subject_still_gets_discrete_cycles() {
        let start = t0();
        let end = start + Duration::hours(1);
        let mut ids = id_counter();
        let instants = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 1.0)],
            None,
            &pump(5, 60.0, 0.5),
            &mut ids,
        )
        .unwrap();
        // 20 triggers, cap 5: four discrete instants, not one with 20 triggers.
        assert_eq!(instants.len(), 4);
        assert!(instants.iter().all(|i| i.trigger_count == 5));
    }

    #[test]
    fn test_window_shorter_than_spacing_floor_is_refused() {
        // 10-minute window against a 30-minute spacing floor.
        let start = t0();
        let end = start + Duration::minutes(10);
        let mut ids = id_counter();
        let err = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 2.0)],
            None,
            &pump(5, 1800.0, 0.5),
            &mut ids,
        )
        .unwrap_err();
        assert!(matches!(err, DoseError::WindowTooShort(_)));
    }

    #[test]
    fn test_cycles_that_cannot_fit_are_refused() {
        // 8 cycles at a 600s floor need 4200s of window; 1200s is not enough.
        let start = t0();
        let end = start + Duration::seconds(1200);
        let mut ids = id_counter();
        let err = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 2.0)],
            None,
            &pump(5, 600.0, 0.5),
            &mut ids,
        )
        .unwrap_err();
        assert!(matches!(err, DoseError::WindowTooShort(_)));
    }

    #[test]
    fn test_subjects_staggered_and_cycles_aligned() {
        let start = t0();
        let end = start + Duration::hours(2);
        let mut ids = id_counter();
        let instants = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 1.0), subject("s2", 1, 1.0)],
            None,
            &pump(10, 300.0, 0.5),
            &mut ids,
        )
        .unwrap();

        // 20 triggers, cap 10: 2 cycles each; interval = max(7200/2, 300) = 3600.
        let s1: Vec<_> = instants.iter().filter(|i| i.subject_id == "s1").collect();
        let s2: Vec<_> = instants.iter().filter(|i| i.subject_id == "s2").collect();
        assert_eq!(s1.len(), 2);
        assert_eq!(s2.len(), 2);

        // Both subjects share the cycle interval.
        let interval1 = (s1[1].delivery_time - s1[0].delivery_time).num_seconds();
        let interval2 = (s2[1].delivery_time - s2[0].delivery_time).num_seconds();
        assert_eq!(interval1, 3600);
        assert_eq!(interval1, interval2);

        // Second subject offset by the stagger, at least one full burst long.
        let stagger = (s2[0].delivery_time - s1[0].delivery_time).num_seconds();
        assert!(stagger as f64 >= 0.5 * 10.0);
        assert_eq!(stagger, 1800);
    }

    #[test]
    fn test_last_cycle_compression_never_overflows_window() {
        // Window 100s, floor 30s, cap 10, 2s between triggers: 40 triggers
        // make 4 cycles at 30s intervals, so the last burst starts at 90s
        // with 10s of room but needs 20s. Spacing compresses to 1s.
        let start = t0();
        let end = start + Duration::seconds(100);
        let mut ids = id_counter();
        let instants = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 2.0)],
            None,
            &pump(10, 30.0, 2.0),
            &mut ids,
        )
        .unwrap();
        assert_eq!(instants.len(), 4);

        let last = instants.last().unwrap();
        assert!((last.trigger_spacing_secs - 1.0).abs() < 1e-9);
        for earlier in &instants[..3] {
            assert!((earlier.trigger_spacing_secs - 2.0).abs() < 1e-9);
        }
        // Burst fits exactly within the window.
        let burst_end = last.delivery_time
            + Duration::milliseconds(
                (last.trigger_count as f64 * last.trigger_spacing_secs * 1000.0) as i64,
            );
        assert!(burst_end <= end);
    }

    #[test]
    fn test_requested_cycle_count_raises_cycles() {
        let start = t0();
        let end = start + Duration::hours(2);
        let mut ids = id_counter();
        let instants = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 0.5)],
            Some(4),
            &pump(20, 300.0, 0.5),
            &mut ids,
        )
        .unwrap();
        // 10 triggers fit one burst, but four cycles were requested.
        assert_eq!(instants.len(), 4);
        let total: u32 = instants.iter().map(|i| i.trigger_count).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_instant_ids_unique_and_monotonic() {
        let start = t0();
        let end = start + Duration::hours(1);
        let mut ids = id_counter();
        let instants = plan(
            "sch",
            start,
            end,
            &[subject("s1", 0, 1.0), subject("s2", 1, 1.0)],
            None,
            &pump(5, 60.0, 0.5),
            &mut ids,
        )
        .unwrap();
        let mut seen: Vec<u64> = instants.iter().map(|i| i.instant_id).collect();
        let count = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), count);
    }
}
