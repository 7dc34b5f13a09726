//! Dose engine — schedule lifecycle controller and scheduler tick loop.
//!
//! One owned struct holds the queue, progress tracker, schedule map, and
//! in-flight guard, driven by an explicit `tick(now)` so ordering stays
//! deterministic and tests never need wall-clock waits. A background
//! tokio interval loop calls `tick` in production.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use aquadose_core::config::AquadoseConfig;
use aquadose_core::error::{DoseError, Result};

use crate::deliveries::{
    CompletionReason, CycleTracker, DeliveryInstant, DeliveryMode, ScheduleSpec, ScheduleStatus,
};
use crate::executor::{Executor, Outcome};
use crate::hardware::Dispenser;
use crate::notify::{self, NotifyPriority, NotifyRouter, NotifyTarget};
use crate::persistence::DoseDb;
use crate::plan::{self, PlanSubject};
use crate::queue::DeliveryQueue;
use crate::quantize;

const VOLUME_EPSILON_ML: f64 = 1e-9;

struct ScheduleEntry {
    spec: ScheduleSpec,
    status: ScheduleStatus,
}

/// Per-subject delivery progress for status surfaces.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubjectStats {
    pub subject_id: String,
    pub delivered_ml: f64,
    pub target_ml: f64,
}

/// Snapshot of one loaded schedule.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScheduleStats {
    pub schedule_id: String,
    pub name: String,
    pub status: ScheduleStatus,
    pub window_end: DateTime<Utc>,
    pub subjects: Vec<SubjectStats>,
}

/// The dose engine — owns every loaded schedule and its pending instants.
pub struct DoseEngine {
    config: AquadoseConfig,
    db: DoseDb,
    executor: Executor,
    queue: DeliveryQueue,
    schedules: HashMap<String, ScheduleEntry>,
    tracker: CycleTracker,
    /// Subjects with an attempt mid-execution. Scoped per subject: two
    /// different subjects may run back-to-back in one tick.
    in_flight: HashSet<String>,
    /// Consecutive hardware failures per (schedule, subject).
    failures: HashMap<(String, String), u32>,
    pub router: NotifyRouter,
    notify_target: Option<NotifyTarget>,
    next_instant_id: u64,
}

impl DoseEngine {
    pub fn new(config: AquadoseConfig, db: DoseDb, hardware: Arc<dyn Dispenser>) -> Self {
        let executor = Executor::new(hardware, config.pump.clone());
        Self {
            config,
            db,
            executor,
            queue: DeliveryQueue::new(),
            schedules: HashMap::new(),
            tracker: CycleTracker::new(),
            in_flight: HashSet::new(),
            failures: HashMap::new(),
            router: NotifyRouter::new(),
            notify_target: None,
            next_instant_id: 0,
        }
    }

    /// Route status notifications to a target (webhook or log).
    pub fn set_notify_target(&mut self, target: NotifyTarget) {
        self.notify_target = Some(target);
    }

    pub fn db(&self) -> &DoseDb {
        &self.db
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Delivery time of the next pending instant.
    pub fn peek_next_delivery(&self) -> Option<DateTime<Utc>> {
        self.queue.peek_next_time()
    }

    /// Consecutive failure count for one subject (0 once it succeeds).
    pub fn consecutive_failures(&self, schedule_id: &str, subject_id: &str) -> u32 {
        self.failures
            .get(&(schedule_id.to_string(), subject_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn next_id(&mut self) -> u64 {
        self.next_instant_id += 1;
        self.next_instant_id
    }

    // ─── Lifecycle API ──────────────────────────────────────

    /// Validate, plan, and load a schedule into the queue.
    ///
    /// A duplicate start for an already-running schedule is a reported
    /// no-op (`Ok(false)`), never a double-load.
    pub fn start_schedule(&mut self, spec: ScheduleSpec, now: DateTime<Utc>) -> Result<bool> {
        spec.validate()?;
        if let Some(entry) = self.schedules.get(&spec.schedule_id) {
            match entry.status {
                ScheduleStatus::Running => {
                    tracing::warn!("⚠️ schedule '{}' already running; start ignored", spec.name);
                    return Ok(false);
                }
                ScheduleStatus::Paused => {
                    return Err(DoseError::Config(format!(
                        "schedule '{}' is paused; resume it instead",
                        spec.name
                    )));
                }
                _ => {}
            }
        }
        if now >= spec.window_end {
            return Err(DoseError::Config(format!(
                "schedule '{}': window already elapsed",
                spec.name
            )));
        }

        let planned = self.load_and_plan(&spec, now)?;
        self.db.save_schedule(&spec, ScheduleStatus::Running)?;
        let name = spec.name.clone();
        let schedule_id = spec.schedule_id.clone();
        self.schedules.insert(
            schedule_id,
            ScheduleEntry {
                spec,
                status: ScheduleStatus::Running,
            },
        );
        tracing::info!("📅 schedule '{name}' started: {planned} instants queued");
        self.notify(
            "schedule started",
            format!("'{name}' loaded with {planned} delivery instants"),
            NotifyPriority::Normal,
        );
        Ok(true)
    }

    /// Start a schedule previously created in the store.
    pub fn start_schedule_by_id(&mut self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some((spec, _)) = self.db.load_schedule(schedule_id)? else {
            return Err(DoseError::Config(format!(
                "unknown schedule '{schedule_id}'"
            )));
        };
        self.start_schedule(spec, now)
    }

    /// Stop dispatching a schedule's instants. They stay queued; the pop
    /// path treats them as cancelled while the schedule is not running.
    pub fn pause_schedule(&mut self, schedule_id: &str) -> Result<bool> {
        let name = match self.schedules.get_mut(schedule_id) {
            None => {
                return Err(DoseError::Config(format!(
                    "unknown schedule '{schedule_id}'"
                )));
            }
            Some(entry) => {
                if entry.status != ScheduleStatus::Running {
                    tracing::warn!("⚠️ schedule '{}' is not running; pause ignored", entry.spec.name);
                    return Ok(false);
                }
                entry.status = ScheduleStatus::Paused;
                entry.spec.name.clone()
            }
        };
        let snapshot = self.tracker.snapshot(schedule_id);
        if let Err(e) =
            self.db
                .update_schedule_status(schedule_id, ScheduleStatus::Paused, &snapshot, None)
        {
            tracing::warn!("⚠️ failed to persist pause: {e}");
        }
        tracing::info!("⏸️ schedule '{name}' paused");
        self.notify("schedule paused", format!("'{name}' paused"), NotifyPriority::Normal);
        Ok(true)
    }

    /// Resume a paused schedule. Obligations whose instants were
    /// cancelled while paused are requeued as recovery instants; past
    /// the window end nothing is revived and the expiry sweep completes
    /// the schedule.
    pub fn resume_schedule(&mut self, schedule_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let spec = match self.schedules.get_mut(schedule_id) {
            None => {
                return Err(DoseError::Config(format!(
                    "unknown schedule '{schedule_id}'"
                )));
            }
            Some(entry) => {
                if entry.status != ScheduleStatus::Paused {
                    tracing::warn!("⚠️ schedule '{}' is not paused; resume ignored", entry.spec.name);
                    return Ok(false);
                }
                entry.status = ScheduleStatus::Running;
                entry.spec.clone()
            }
        };

        let mut revived = 0;
        if now <= spec.window_end {
            for subject in &spec.subjects {
                let target = spec.subject_target_ml(subject);
                let remaining =
                    target - self.tracker.delivered_ml(schedule_id, &subject.subject_id);
                if remaining <= VOLUME_EPSILON_ML
                    || self.queue.contains_subject(schedule_id, &subject.subject_id)
                {
                    continue;
                }
                let triggers = match quantize::triggers_for(
                    remaining,
                    self.config.pump.ul_per_trigger,
                    self.config.pump.calibration_factor,
                    self.config.pump.min_triggers,
                ) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ cannot requantize remainder for {}: {e}",
                            subject.subject_id
                        );
                        continue;
                    }
                };
                let instant = DeliveryInstant {
                    instant_id: self.next_id(),
                    schedule_id: schedule_id.to_string(),
                    subject_id: subject.subject_id.clone(),
                    channel_id: subject.channel_id,
                    delivery_time: now,
                    target_volume_ml: remaining,
                    trigger_count: triggers,
                    cycle_index: 0,
                    total_cycles: 1,
                    mode: spec.delivery_mode,
                    trigger_spacing_secs: self.config.pump.trigger_interval_secs,
                    is_recovery: true,
                };
                let in_flight = self.in_flight.len() as u32;
                self.queue.push(instant, in_flight);
                revived += 1;
            }
        }

        let snapshot = self.tracker.snapshot(schedule_id);
        if let Err(e) =
            self.db
                .update_schedule_status(schedule_id, ScheduleStatus::Running, &snapshot, None)
        {
            tracing::warn!("⚠️ failed to persist resume: {e}");
        }
        tracing::info!("▶️ schedule '{}' resumed ({revived} obligations revived)", spec.name);
        self.notify(
            "schedule resumed",
            format!("'{}' resumed", spec.name),
            NotifyPriority::Normal,
        );
        Ok(true)
    }

    /// Pause every running schedule. Returns how many were paused.
    pub fn stop_all(&mut self) -> usize {
        let running: Vec<String> = self
            .schedules
            .iter()
            .filter(|(_, entry)| entry.status == ScheduleStatus::Running)
            .map(|(id, _)| id.clone())
            .collect();
        let count = running.len();
        for schedule_id in running {
            if let Err(e) = self.pause_schedule(&schedule_id) {
                tracing::warn!("⚠️ stop_all: {e}");
            }
        }
        if count > 0 {
            tracing::info!("🛑 stopped {count} running schedules");
        }
        count
    }

    /// Re-adopt schedules persisted as running (daemon restart).
    pub fn adopt_persisted(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let mut adopted = 0;
        for spec in self.db.load_schedules_by_status(ScheduleStatus::Running)? {
            if self.schedules.contains_key(&spec.schedule_id) {
                continue;
            }
            match self.load_and_plan(&spec, now) {
                Ok(planned) => {
                    tracing::info!("📦 re-adopted schedule '{}' with {planned} instants", spec.name);
                }
                Err(DoseError::WindowTooShort(msg)) => {
                    // Too little window left to replan; the expiry sweep
                    // will close it out.
                    tracing::warn!("⚠️ re-adopted '{}' without replanning: {msg}", spec.name);
                }
                Err(e) => return Err(e),
            }
            self.schedules.insert(
                spec.schedule_id.clone(),
                ScheduleEntry {
                    spec,
                    status: ScheduleStatus::Running,
                },
            );
            adopted += 1;
        }
        Ok(adopted)
    }

    /// Snapshot of every loaded schedule.
    pub fn schedule_stats(&self) -> Vec<ScheduleStats> {
        self.schedules
            .values()
            .map(|entry| ScheduleStats {
                schedule_id: entry.spec.schedule_id.clone(),
                name: entry.spec.name.clone(),
                status: entry.status,
                window_end: entry.spec.window_end,
                subjects: entry
                    .spec
                    .subjects
                    .iter()
                    .map(|subject| SubjectStats {
                        subject_id: subject.subject_id.clone(),
                        delivered_ml: self
                            .tracker
                            .delivered_ml(&entry.spec.schedule_id, &subject.subject_id),
                        target_ml: entry.spec.subject_target_ml(subject),
                    })
                    .collect(),
            })
            .collect()
    }

    // ─── Tick ──────────────────────────────────────

    /// Pop and execute every due instant, then run the lifecycle sweep.
    /// Returns how many delivery attempts were executed.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let mut executed = 0;
        while let Some(instant) = self.queue.pop_due(now) {
            // Status is checked at pop time: a pause landing after
            // enqueue must still cancel dispatch.
            let (status, subject_target) = match self.schedules.get(&instant.schedule_id) {
                Some(entry) => (
                    entry.status,
                    entry
                        .spec
                        .target_for(&instant.subject_id)
                        .unwrap_or(entry.spec.target_volume_ml),
                ),
                None => {
                    tracing::debug!(
                        "🗑️ dropping instant {} for unknown schedule {}",
                        instant.instant_id,
                        instant.schedule_id
                    );
                    continue;
                }
            };
            if status != ScheduleStatus::Running {
                tracing::debug!(
                    "🗑️ instant {} cancelled: schedule {} is {status}",
                    instant.instant_id,
                    instant.schedule_id
                );
                continue;
            }

            // Per-subject in-flight guard: defer, never drop or run
            // concurrently.
            if self.in_flight.contains(&instant.subject_id) {
                let delay = Duration::seconds(self.config.scheduler.contention_delay_secs as i64);
                let mut deferred = instant;
                deferred.delivery_time = now + delay;
                deferred.is_recovery = true;
                tracing::debug!(
                    "⏳ subject {} busy; instant {} deferred",
                    deferred.subject_id,
                    deferred.instant_id
                );
                let in_flight = self.in_flight.len() as u32;
                self.queue.push(deferred, in_flight);
                continue;
            }

            self.in_flight.insert(instant.subject_id.clone());
            let outcome = self
                .executor
                .execute(&instant, subject_target, &self.db, &mut self.tracker)
                .await;
            self.in_flight.remove(&instant.subject_id);
            executed += 1;

            self.handle_outcome(&instant, subject_target, outcome, now);
        }

        self.sweep(now);
        executed
    }

    fn handle_outcome(
        &mut self,
        instant: &DeliveryInstant,
        subject_target_ml: f64,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) {
        let key = (instant.schedule_id.clone(), instant.subject_id.clone());
        match outcome {
            Outcome::Completed { dispensed_ml } => {
                self.failures.remove(&key);
                if dispensed_ml > 0.0 {
                    self.notify(
                        "delivery complete",
                        format!(
                            "subject {} reached its target ({dispensed_ml:.3} mL this burst)",
                            instant.subject_id
                        ),
                        NotifyPriority::Normal,
                    );
                }
            }
            Outcome::Partial { dispensed_ml, remaining_ml } => {
                self.failures.remove(&key);
                self.notify(
                    "cycle complete",
                    format!(
                        "subject {}: cycle {}/{} delivered {dispensed_ml:.3} mL, {remaining_ml:.3} mL to go",
                        instant.subject_id,
                        instant.cycle_index + 1,
                        instant.total_cycles
                    ),
                    NotifyPriority::Low,
                );
                if instant.is_last_cycle() {
                    // No later cycle queued for this subject, so the
                    // remainder rides a recovery instant. Earlier cycles'
                    // shortfalls are absorbed by the cycles still queued.
                    let spacing = Duration::milliseconds(
                        (self.config.pump.min_cycle_spacing_secs * 1000.0) as i64,
                    );
                    self.requeue_remaining(instant, now + spacing, remaining_ml);
                }
            }
            Outcome::Failed { error } => {
                let count = {
                    let count = self.failures.entry(key).or_insert(0);
                    *count += 1;
                    *count
                };
                let max = self.config.scheduler.max_consecutive_failures.max(1);
                if count >= max {
                    self.notify(
                        "schedule failed",
                        format!(
                            "subject {} failed {count} consecutive dispenses: {error}",
                            instant.subject_id
                        ),
                        NotifyPriority::Urgent,
                    );
                    self.fail_schedule(&instant.schedule_id, &error);
                } else {
                    let backoff =
                        Duration::seconds(self.config.scheduler.retry_backoff_secs as i64);
                    let remaining = subject_target_ml
                        - self
                            .tracker
                            .delivered_ml(&instant.schedule_id, &instant.subject_id);
                    if remaining > VOLUME_EPSILON_ML {
                        self.requeue_remaining(instant, now + backoff, remaining);
                    }
                    self.notify(
                        "delivery retry",
                        format!(
                            "attempt {count}/{max} failed for subject {}: {error}; retrying in {}s",
                            instant.subject_id, self.config.scheduler.retry_backoff_secs
                        ),
                        NotifyPriority::High,
                    );
                }
            }
            Outcome::Deferred { .. } => {
                // Progress unreadable; try again after the backoff
                // without counting a hardware failure.
                let backoff = Duration::seconds(self.config.scheduler.retry_backoff_secs as i64);
                let mut deferred = instant.clone();
                deferred.delivery_time = now + backoff;
                deferred.is_recovery = true;
                let in_flight = self.in_flight.len() as u32;
                self.queue.push(deferred, in_flight);
            }
        }
    }

    /// Requeue a remaining-volume obligation as a recovery instant with
    /// a freshly quantized trigger count.
    fn requeue_remaining(&mut self, base: &DeliveryInstant, at: DateTime<Utc>, remaining_ml: f64) {
        let triggers = match quantize::triggers_for(
            remaining_ml,
            self.config.pump.ul_per_trigger,
            self.config.pump.calibration_factor,
            self.config.pump.min_triggers,
        ) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("⚠️ cannot requantize remainder for {}: {e}", base.subject_id);
                return;
            }
        };
        let mut instant = base.clone();
        instant.delivery_time = at;
        instant.target_volume_ml = remaining_ml;
        instant.trigger_count = triggers;
        instant.is_recovery = true;
        let in_flight = self.in_flight.len() as u32;
        self.queue.push(instant, in_flight);
    }

    /// Lifecycle sweep: complete schedules whose subjects all reached
    /// their targets, and force-complete any schedule whose window has
    /// elapsed. Window expiry is an explicit terminal path, never a
    /// silent drop.
    fn sweep(&mut self, now: DateTime<Utc>) {
        let mut to_complete: Vec<(String, CompletionReason)> = Vec::new();
        for (schedule_id, entry) in &self.schedules {
            match entry.status {
                ScheduleStatus::Running => {
                    let all_done = entry.spec.subjects.iter().all(|subject| {
                        self.tracker.delivered_ml(schedule_id, &subject.subject_id)
                            + VOLUME_EPSILON_ML
                            >= entry.spec.subject_target_ml(subject)
                    });
                    if all_done {
                        to_complete.push((schedule_id.clone(), CompletionReason::AllDelivered));
                    } else if now > entry.spec.window_end {
                        to_complete.push((schedule_id.clone(), CompletionReason::WindowElapsed));
                    }
                }
                ScheduleStatus::Paused if now > entry.spec.window_end => {
                    to_complete.push((schedule_id.clone(), CompletionReason::WindowElapsed));
                }
                _ => {}
            }
        }
        for (schedule_id, reason) in to_complete {
            self.complete_schedule(&schedule_id, reason);
        }
    }

    fn complete_schedule(&mut self, schedule_id: &str, reason: CompletionReason) {
        let Some(entry) = self.schedules.remove(schedule_id) else {
            return;
        };
        let snapshot = self.tracker.snapshot(schedule_id);
        if let Err(e) = self.db.update_schedule_status(
            schedule_id,
            ScheduleStatus::Completed,
            &snapshot,
            Some(reason),
        ) {
            tracing::warn!("⚠️ failed to persist completion: {e}");
        }
        self.queue.purge_schedule(schedule_id);
        self.tracker.remove_schedule(schedule_id);
        self.failures.retain(|(s, _), _| s != schedule_id);

        let total: f64 = snapshot.values().sum();
        tracing::info!(
            "🏁 schedule '{}' completed ({}): {total:.3} mL delivered",
            entry.spec.name,
            reason.label()
        );
        self.notify(
            "schedule completed",
            format!("'{}' completed: {}", entry.spec.name, reason.label()),
            NotifyPriority::Normal,
        );
    }

    fn fail_schedule(&mut self, schedule_id: &str, error: &str) {
        let Some(entry) = self.schedules.remove(schedule_id) else {
            return;
        };
        let snapshot = self.tracker.snapshot(schedule_id);
        if let Err(e) = self.db.update_schedule_status(
            schedule_id,
            ScheduleStatus::Failed,
            &snapshot,
            Some(CompletionReason::HardwareFailure),
        ) {
            tracing::warn!("⚠️ failed to persist failure: {e}");
        }
        self.queue.purge_schedule(schedule_id);
        self.tracker.remove_schedule(schedule_id);
        self.failures.retain(|(s, _), _| s != schedule_id);
        tracing::error!("🚨 schedule '{}' failed: {error}", entry.spec.name);
    }

    // ─── Planning ──────────────────────────────────────

    /// Seed progress from the store and queue instants for every subject
    /// still short of its target.
    fn load_and_plan(&mut self, spec: &ScheduleSpec, now: DateTime<Utc>) -> Result<usize> {
        for subject in &spec.subjects {
            let delivered = self
                .db
                .sum_delivered(&spec.schedule_id, &subject.subject_id)?;
            self.tracker
                .seed(&spec.schedule_id, &subject.subject_id, delivered);
        }

        let start = if now > spec.window_start { now } else { spec.window_start };
        if start >= spec.window_end {
            return Ok(0);
        }

        let mut outstanding = Vec::new();
        for subject in &spec.subjects {
            let target = spec.subject_target_ml(subject);
            let delivered = self
                .tracker
                .delivered_ml(&spec.schedule_id, &subject.subject_id);
            if target - delivered > VOLUME_EPSILON_ML {
                outstanding.push(PlanSubject {
                    subject_id: subject.subject_id.clone(),
                    channel_id: subject.channel_id,
                    target_volume_ml: target - delivered,
                });
            }
        }
        if outstanding.is_empty() {
            return Ok(0);
        }

        let pump = self.config.pump.clone();
        let mut counter = self.next_instant_id;
        let mut next_id = || {
            counter += 1;
            counter
        };

        let instants = match spec.delivery_mode {
            DeliveryMode::Staggered => plan::plan(
                &spec.schedule_id,
                start,
                spec.window_end,
                &outstanding,
                spec.cycles_per_window,
                &pump,
                &mut next_id,
            )?,
            DeliveryMode::Instant => {
                // One instant per subject, staggered by a full burst so
                // bursts cannot overlap on shared hardware.
                let stagger = pump.trigger_interval_secs * pump.max_triggers_per_cycle.max(1) as f64;
                let mut out = Vec::with_capacity(outstanding.len());
                for (i, subject) in outstanding.iter().enumerate() {
                    let triggers = quantize::triggers_for(
                        subject.target_volume_ml,
                        pump.ul_per_trigger,
                        pump.calibration_factor,
                        pump.min_triggers,
                    )?;
                    out.push(DeliveryInstant {
                        instant_id: next_id(),
                        schedule_id: spec.schedule_id.clone(),
                        subject_id: subject.subject_id.clone(),
                        channel_id: subject.channel_id,
                        delivery_time: start
                            + Duration::milliseconds((i as f64 * stagger * 1000.0).round() as i64),
                        target_volume_ml: subject.target_volume_ml,
                        trigger_count: triggers,
                        cycle_index: 0,
                        total_cycles: 1,
                        mode: DeliveryMode::Instant,
                        trigger_spacing_secs: pump.trigger_interval_secs,
                        is_recovery: false,
                    });
                }
                out
            }
        };
        self.next_instant_id = counter;

        let planned = instants.len();
        let in_flight = self.in_flight.len() as u32;
        for instant in instants {
            self.queue.push(instant, in_flight);
        }
        Ok(planned)
    }

    fn notify(&mut self, title: &str, body: String, priority: NotifyPriority) {
        let notification = NotifyRouter::create(title, &body, "engine", priority);
        self.router.record(notification.clone());
        if let Some(target) = self.notify_target.clone() {
            // Fire-and-forget: a slow or failing sink never blocks the tick.
            tokio::spawn(async move {
                if let Err(e) = notify::dispatch(&notification, &target).await {
                    tracing::warn!("⚠️ notification dispatch failed: {e}");
                }
            });
        }
    }
}

/// Drive the engine tick on a fixed interval as a background tokio task.
pub async fn spawn_engine(engine: Arc<Mutex<DoseEngine>>, tick_interval_secs: u64) {
    tracing::info!("⏰ dose engine started (tick every {tick_interval_secs}s)");
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(tick_interval_secs.max(1)));
    loop {
        interval.tick().await;
        let executed = {
            let mut eng = engine.lock().await;
            eng.tick(Utc::now()).await
        };
        if executed > 0 {
            tracing::debug!("tick executed {executed} deliveries");
        }
    }
}
