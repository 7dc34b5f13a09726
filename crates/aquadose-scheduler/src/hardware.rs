//! Hardware dispenser seam.
//!
//! The relay driver that physically opens and closes a channel lives
//! outside this crate; the engine only ever sees this trait.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use aquadose_core::error::{DoseError, Result};

/// A relay-driven pump pair addressed by channel id.
#[async_trait]
pub trait Dispenser: Send + Sync {
    /// Fire `trigger_count` discrete actuations on `channel_id`, spaced
    /// `stagger_secs` between on/off transitions. Safe to call
    /// repeatedly.
    async fn dispense(&self, channel_id: u8, trigger_count: u32, stagger_secs: f64) -> Result<()>;
}

/// Logs each burst instead of driving relays. What the daemon runs with
/// when no real driver is wired in.
pub struct DryRunDispenser;

#[async_trait]
impl Dispenser for DryRunDispenser {
    async fn dispense(&self, channel_id: u8, trigger_count: u32, stagger_secs: f64) -> Result<()> {
        tracing::info!(
            "💧 [dry-run] channel {channel_id}: {trigger_count} triggers, {stagger_secs:.2}s apart"
        );
        Ok(())
    }
}

/// Scriptable dispenser for tests: pops one outcome per call (missing
/// entries succeed) and records every call it receives.
#[derive(Default)]
pub struct MockDispenser {
    script: Mutex<VecDeque<bool>>,
    calls: Mutex<Vec<(u8, u32, f64)>>,
}

impl MockDispenser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(outcomes: &[bool]) -> Self {
        Self {
            script: Mutex::new(outcomes.iter().copied().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(channel_id, trigger_count, stagger_secs)` call so far.
    pub fn calls(&self) -> Vec<(u8, u32, f64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Dispenser for MockDispenser {
    async fn dispense(&self, channel_id: u8, trigger_count: u32, stagger_secs: f64) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((channel_id, trigger_count, stagger_secs));
        let ok = self.script.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(())
        } else {
            Err(DoseError::Hardware("simulated dispense failure".into()))
        }
    }
}
