//! The AIcity core: configuration, the [`City`] aggregate, the decision
//! facade, the meeting matcher, and the day-tick scheduler.
//!
//! The scheduler owns the one-day tick and is the sole writer of the day
//! counter. Per-agent turns are sequential by design: they share the
//! ledger and the event log, and sequential execution gives a well-defined
//! total order on transactions per day.

pub mod city;
pub mod config;
pub mod facade;
pub mod meetings;
pub mod reasoning;
pub mod scheduler;

pub use city::City;
pub use config::{CityConfig, ConfigError};
pub use meetings::{IntentPredicate, keyword_intent};
pub use reasoning::{
    GraduationRequest, JusticeAdapter, NarrativeRequest, OfflineReasoner, ReasoningService,
    ScriptedReasoner,
};
pub use scheduler::{
    CancelFlag, CheckpointError, CheckpointSink, CollectingObserver, DayDelta, DaySummary,
    MemoryCheckpoint, ObserverSink, TickError, run_day,
};
