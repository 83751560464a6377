pub mod calendar_provider;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_link_repository;
pub mod event_mapper;
pub mod google_calendar_client;
pub mod logging;
pub mod record_store;
pub mod storage;
