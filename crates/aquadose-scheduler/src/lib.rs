//! # Aquadose Scheduler
//!
//! Delivery scheduling engine: priority-ordered delivery queue,
//! staggered timing planner, volume quantization, and the
//! completion/retry state machine — coordinated by a single tick-driven
//! engine.
//!
//! ## Architecture
//! ```text
//! DoseEngine (tokio interval tick)
//!   ├── plan: window + subject targets → spaced DeliveryInstants
//!   ├── DeliveryQueue: min-heap, recovery instants preempt fresh ones
//!   ├── Executor: quantize remainder → cap burst → Dispenser hardware
//!   │     └── outcome → progress + audit row + retry/backoff
//!   └── lifecycle sweep → completed (all delivered | window elapsed)
//!                           └── NotifyRouter → webhook / log
//! ```

pub mod deliveries;
pub mod engine;
pub mod executor;
pub mod hardware;
pub mod notify;
pub mod persistence;
pub mod plan;
pub mod quantize;
pub mod queue;

pub use deliveries::{
    AttemptRecord, AttemptStatus, CompletionReason, CycleProgress, CycleTracker, DeliveryInstant,
    DeliveryMode, ScheduleSpec, ScheduleStatus, SubjectAssignment,
};
pub use engine::{DoseEngine, ScheduleStats, SubjectStats, spawn_engine};
pub use executor::{Executor, Outcome};
pub use hardware::{Dispenser, DryRunDispenser, MockDispenser};
pub use notify::{Notification, NotifyPriority, NotifyRouter, NotifyTarget};
pub use persistence::DoseDb;
pub use plan::PlanSubject;
pub use queue::DeliveryQueue;
