pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::calendar_sync::{CalendarSettings, CalendarSyncEngine, PlannedDateSync};
pub use application::calendar_target::{DedicatedCalendar, TargetCalendar};
pub use application::scheduling::{ActivityScheduler, CalendarView, PlannedDateOutcome};
pub use application::status_reconciler::{
    ImportSurfaceState, IntentSink, StatusReconciler, SurfaceProbe, WatchHandle, WatchSettings,
    WatchSlot,
};
pub use domain::models::{Activity, ExplicitDate, ProcessingStatus, WatchIntent};
pub use infrastructure::config::EngineConfig;
pub use infrastructure::error::InfraError;
pub use infrastructure::logging::init_tracing;
