//! Delivery data model — instants, schedules, and progress accounting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquadose_core::error::{DoseError, Result};

/// How a schedule's volume is laid out across its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One dose per subject, delivered at the start of the window.
    Instant,
    /// Volume split into spaced cycles across the window.
    Staggered,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Instant => "instant",
            DeliveryMode::Staggered => "staggered",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "instant" => DeliveryMode::Instant,
            _ => DeliveryMode::Staggered,
        }
    }
}

/// One scheduled, atomic dispense obligation for one subject/channel.
///
/// Never mutated in place while queued: a requeue removes the instant
/// and reinserts a copy with a new delivery time (and, for retries with
/// a different remaining volume, a recomputed trigger count) and
/// `is_recovery` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInstant {
    pub instant_id: u64,
    pub schedule_id: String,
    pub subject_id: String,
    /// Hardware actuator pair driving this subject's line.
    pub channel_id: u8,
    pub delivery_time: DateTime<Utc>,
    /// Volume this instant was planned to dispense, in mL.
    pub target_volume_ml: f64,
    /// Quantized trigger count for `target_volume_ml` at creation time.
    pub trigger_count: u32,
    /// Ordinal within a multi-cycle plan (0 if none).
    pub cycle_index: u32,
    pub total_cycles: u32,
    pub mode: DeliveryMode,
    /// Seconds between trigger actuations within this burst.
    pub trigger_spacing_secs: f64,
    /// Set when requeued after failure or contention.
    pub is_recovery: bool,
}

impl DeliveryInstant {
    /// Whether this is the final planned cycle for its subject.
    pub fn is_last_cycle(&self) -> bool {
        self.cycle_index + 1 >= self.total_cycles
    }
}

/// One subject's place in a schedule: its line and, optionally, its own
/// target volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectAssignment {
    pub subject_id: String,
    pub channel_id: u8,
    /// Per-subject target in mL; falls back to the schedule-wide volume.
    pub target_volume_ml: Option<f64>,
}

/// An obligation set for one or more subjects over a delivery window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub schedule_id: String,
    pub name: String,
    pub delivery_mode: DeliveryMode,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub subjects: Vec<SubjectAssignment>,
    /// Schedule-wide target volume per subject, in mL.
    pub target_volume_ml: f64,
    /// Minimum number of delivery cycles per window (staggered only).
    pub cycles_per_window: Option<u32>,
}

impl ScheduleSpec {
    pub fn new(
        name: &str,
        delivery_mode: DeliveryMode,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        target_volume_ml: f64,
    ) -> Self {
        Self {
            schedule_id: schedule_id(),
            name: name.to_string(),
            delivery_mode,
            window_start,
            window_end,
            subjects: Vec::new(),
            target_volume_ml,
            cycles_per_window: None,
        }
    }

    /// Add a subject on the given channel.
    pub fn with_subject(mut self, subject_id: &str, channel_id: u8) -> Self {
        self.subjects.push(SubjectAssignment {
            subject_id: subject_id.to_string(),
            channel_id,
            target_volume_ml: None,
        });
        self
    }

    /// Resolved target volume for a subject.
    pub fn subject_target_ml(&self, subject: &SubjectAssignment) -> f64 {
        subject.target_volume_ml.unwrap_or(self.target_volume_ml)
    }

    /// Resolved target volume by subject id.
    pub fn target_for(&self, subject_id: &str) -> Option<f64> {
        self.subjects
            .iter()
            .find(|s| s.subject_id == subject_id)
            .map(|s| self.subject_target_ml(s))
    }

    /// Reject malformed schedules before they can enter `running`.
    pub fn validate(&self) -> Result<()> {
        if self.window_end <= self.window_start {
            return Err(DoseError::Config(format!(
                "schedule '{}': window end must be after window start",
                self.name
            )));
        }
        if self.subjects.is_empty() {
            return Err(DoseError::Config(format!(
                "schedule '{}': no subjects assigned",
                self.name
            )));
        }
        let mut seen_subjects = std::collections::HashSet::new();
        let mut seen_channels = std::collections::HashSet::new();
        for subject in &self.subjects {
            if !seen_subjects.insert(subject.subject_id.as_str()) {
                return Err(DoseError::Config(format!(
                    "schedule '{}': subject '{}' assigned twice",
                    self.name, subject.subject_id
                )));
            }
            if !seen_channels.insert(subject.channel_id) {
                return Err(DoseError::Config(format!(
                    "schedule '{}': channel {} assigned to more than one subject",
                    self.name, subject.channel_id
                )));
            }
            let target = self.subject_target_ml(subject);
            if !target.is_finite() || target <= 0.0 {
                return Err(DoseError::InvalidVolume(format!(
                    "schedule '{}': subject '{}' target volume must be positive, got {target}",
                    self.name, subject.subject_id
                )));
            }
        }
        Ok(())
    }
}

/// Schedule lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Running => "running",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => ScheduleStatus::Running,
            "paused" => ScheduleStatus::Paused,
            "completed" => ScheduleStatus::Completed,
            "failed" => ScheduleStatus::Failed,
            _ => ScheduleStatus::Pending,
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a schedule reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every subject reached its target volume.
    AllDelivered,
    /// The window elapsed before every target was reached.
    WindowElapsed,
    /// A subject exceeded the consecutive hardware failure cap.
    HardwareFailure,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::AllDelivered => "all_delivered",
            CompletionReason::WindowElapsed => "window_elapsed",
            CompletionReason::HardwareFailure => "hardware_failure",
        }
    }

    /// Human-readable label for status notifications.
    pub fn label(&self) -> &'static str {
        match self {
            CompletionReason::AllDelivered => "all volumes delivered",
            CompletionReason::WindowElapsed => "window ended",
            CompletionReason::HardwareFailure => "hardware failure",
        }
    }
}

/// Per (schedule, subject) delivery counters.
///
/// `delivered_ml` never regresses: it is only incremented by confirmed
/// successful attempts and never reset mid-schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleProgress {
    pub delivered_ml: f64,
    pub cycles_completed: u32,
    pub current_cycle_index: u32,
}

/// In-memory progress map, keyed by (schedule_id, subject_id).
///
/// Seeded from the store when a schedule is loaded, updated on every
/// successful attempt, read by the lifecycle sweep, discarded when the
/// schedule completes.
#[derive(Debug, Default)]
pub struct CycleTracker {
    progress: HashMap<(String, String), CycleProgress>,
}

impl CycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize a subject's counters from already-persisted volume.
    pub fn seed(&mut self, schedule_id: &str, subject_id: &str, delivered_ml: f64) {
        let entry = self
            .progress
            .entry((schedule_id.to_string(), subject_id.to_string()))
            .or_default();
        entry.delivered_ml = entry.delivered_ml.max(delivered_ml);
    }

    pub fn delivered_ml(&self, schedule_id: &str, subject_id: &str) -> f64 {
        self.progress
            .get(&(schedule_id.to_string(), subject_id.to_string()))
            .map(|p| p.delivered_ml)
            .unwrap_or(0.0)
    }

    /// Credit a confirmed successful attempt.
    pub fn record(&mut self, schedule_id: &str, subject_id: &str, volume_ml: f64, cycle_index: u32) {
        let entry = self
            .progress
            .entry((schedule_id.to_string(), subject_id.to_string()))
            .or_default();
        entry.delivered_ml += volume_ml.max(0.0);
        entry.cycles_completed += 1;
        entry.current_cycle_index = entry.current_cycle_index.max(cycle_index);
    }

    pub fn remove_schedule(&mut self, schedule_id: &str) {
        self.progress.retain(|(s, _), _| s != schedule_id);
    }

    /// Per-subject delivered volumes, for persistence snapshots.
    pub fn snapshot(&self, schedule_id: &str) -> HashMap<String, f64> {
        self.progress
            .iter()
            .filter(|((s, _), _)| s == schedule_id)
            .map(|((_, subj), p)| (subj.clone(), p.delivered_ml))
            .collect()
    }
}

/// Whether an attempt dispensed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Completed,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Completed => "completed",
            AttemptStatus::Failed => "failed",
        }
    }
}

/// Append-only audit row for one delivery attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub schedule_id: String,
    pub subject_id: String,
    pub channel_id: u8,
    /// Outstanding volume this attempt was working toward, in mL.
    pub requested_ml: f64,
    /// Volume actually dispensed (0 for failed attempts), in mL.
    pub dispensed_ml: f64,
    pub trigger_count: u32,
    pub status: AttemptStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn completed(
        instant: &DeliveryInstant,
        requested_ml: f64,
        dispensed_ml: f64,
        trigger_count: u32,
    ) -> Self {
        Self {
            schedule_id: instant.schedule_id.clone(),
            subject_id: instant.subject_id.clone(),
            channel_id: instant.channel_id,
            requested_ml,
            dispensed_ml,
            trigger_count,
            status: AttemptStatus::Completed,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(
        instant: &DeliveryInstant,
        requested_ml: f64,
        trigger_count: u32,
        error: &str,
    ) -> Self {
        Self {
            schedule_id: instant.schedule_id.clone(),
            subject_id: instant.subject_id.clone(),
            channel_id: instant.channel_id,
            requested_ml,
            dispensed_ml: 0.0,
            trigger_count,
            status: AttemptStatus::Failed,
            error: Some(error.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Timestamp-hex schedule id, unique enough for a single deployment.
pub fn schedule_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("dose-{:x}-{:x}", t.as_secs(), t.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        (start, start + chrono::Duration::hours(2))
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let (start, end) = window();
        let spec = ScheduleSpec::new("morning", DeliveryMode::Staggered, start, end, 2.0)
            .with_subject("s1", 0)
            .with_subject("s2", 1);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let (start, end) = window();
        let spec =
            ScheduleSpec::new("bad", DeliveryMode::Instant, end, start, 2.0).with_subject("s1", 0);
        assert!(matches!(spec.validate(), Err(DoseError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_subject_and_channel() {
        let (start, end) = window();
        let dup_subject = ScheduleSpec::new("dup", DeliveryMode::Instant, start, end, 2.0)
            .with_subject("s1", 0)
            .with_subject("s1", 1);
        assert!(dup_subject.validate().is_err());

        let dup_channel = ScheduleSpec::new("dup", DeliveryMode::Instant, start, end, 2.0)
            .with_subject("s1", 0)
            .with_subject("s2", 0);
        assert!(dup_channel.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nonpositive_volume() {
        let (start, end) = window();
        let spec =
            ScheduleSpec::new("bad", DeliveryMode::Instant, start, end, 0.0).with_subject("s1", 0);
        assert!(matches!(spec.validate(), Err(DoseError::InvalidVolume(_))));
    }

    #[test]
    fn test_subject_override_wins_over_schedule_volume() {
        let (start, end) = window();
        let mut spec =
            ScheduleSpec::new("mixed", DeliveryMode::Instant, start, end, 2.0).with_subject("s1", 0);
        spec.subjects[0].target_volume_ml = Some(0.5);
        assert_eq!(spec.target_for("s1"), Some(0.5));
    }

    #[test]
    fn test_tracker_monotone_and_snapshot() {
        let mut tracker = CycleTracker::new();
        tracker.seed("sch", "s1", 0.5);
        tracker.record("sch", "s1", 0.25, 1);
        tracker.record("sch", "s1", 0.25, 2);
        assert!((tracker.delivered_ml("sch", "s1") - 1.0).abs() < 1e-9);

        let snap = tracker.snapshot("sch");
        assert_eq!(snap.len(), 1);
        assert!((snap["s1"] - 1.0).abs() < 1e-9);

        tracker.remove_schedule("sch");
        assert_eq!(tracker.delivered_ml("sch", "s1"), 0.0);
    }

    #[test]
    fn test_last_cycle_detection() {
        let (start, _) = window();
        let mut instant = DeliveryInstant {
            instant_id: 1,
            schedule_id: "sch".into(),
            subject_id: "s1".into(),
            channel_id: 0,
            delivery_time: start,
            target_volume_ml: 0.25,
            trigger_count: 5,
            cycle_index: 0,
            total_cycles: 3,
            mode: DeliveryMode::Staggered,
            trigger_spacing_secs: 0.5,
            is_recovery: false,
        };
        assert!(!instant.is_last_cycle());
        instant.cycle_index = 2;
        assert!(instant.is_last_cycle());
    }
}
