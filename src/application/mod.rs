pub mod bootstrap;
pub mod calendar_sync;
pub mod calendar_target;
pub mod scheduling;
pub mod status_reconciler;
pub mod transition;
