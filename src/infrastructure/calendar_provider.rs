use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Remote,
    Subscribed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSource {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSummary {
    pub id: String,
    pub title: String,
    pub allows_modifications: bool,
    pub source: CalendarSource,
    pub owner_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendar {
    pub title: String,
    pub color: Option<String>,
    pub source: CalendarSource,
    pub owner_account: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub time_zone: Option<String>,
    pub activity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: String,
    pub calendar_id: String,
    pub details: EventDetails,
}

/// The device (or account) calendar store. Event ids are stable handles
/// issued by the provider.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus, InfraError>;

    async fn request_permission(&self) -> Result<PermissionStatus, InfraError>;

    async fn list_calendars(&self) -> Result<Vec<CalendarSummary>, InfraError>;

    async fn list_sources(&self) -> Result<Vec<CalendarSource>, InfraError>;

    async fn default_source(&self) -> Result<Option<CalendarSource>, InfraError>;

    async fn create_calendar(&self, calendar: &NewCalendar) -> Result<String, InfraError>;

    async fn get_event(&self, event_id: &str) -> Result<Option<StoredEvent>, InfraError>;

    async fn create_event(
        &self,
        calendar_id: &str,
        details: &EventDetails,
    ) -> Result<String, InfraError>;

    async fn update_event(&self, event_id: &str, details: &EventDetails) -> Result<(), InfraError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug)]
struct InMemoryCalendarState {
    permission: PermissionStatus,
    grant_on_request: bool,
    calendars: Vec<CalendarSummary>,
    sources: Vec<CalendarSource>,
    default_source: Option<CalendarSource>,
    events: HashMap<String, StoredEvent>,
    next_id: u64,
}

/// Calendar store kept in process memory.
#[derive(Debug)]
pub struct InMemoryCalendarProvider {
    state: Mutex<InMemoryCalendarState>,
    permission_requests: AtomicUsize,
    created_calendars: AtomicUsize,
}

impl Default for InMemoryCalendarProvider {
    fn default() -> Self {
        Self::with_permission(PermissionStatus::Granted, true)
    }
}

impl InMemoryCalendarProvider {
    pub fn with_permission(permission: PermissionStatus, grant_on_request: bool) -> Self {
        Self {
            state: Mutex::new(InMemoryCalendarState {
                permission,
                grant_on_request,
                calendars: Vec::new(),
                sources: Vec::new(),
                default_source: None,
                events: HashMap::new(),
                next_id: 1,
            }),
            permission_requests: AtomicUsize::new(0),
            created_calendars: AtomicUsize::new(0),
        }
    }

    pub fn add_calendar(&self, calendar: CalendarSummary) -> Result<(), InfraError> {
        self.lock()?.calendars.push(calendar);
        Ok(())
    }

    pub fn add_source(&self, source: CalendarSource) -> Result<(), InfraError> {
        self.lock()?.sources.push(source);
        Ok(())
    }

    pub fn set_default_source(&self, source: Option<CalendarSource>) -> Result<(), InfraError> {
        self.lock()?.default_source = source;
        Ok(())
    }

    pub fn insert_event(&self, event: StoredEvent) -> Result<(), InfraError> {
        self.lock()?.events.insert(event.id.clone(), event);
        Ok(())
    }

    pub fn event(&self, event_id: &str) -> Result<Option<StoredEvent>, InfraError> {
        Ok(self.lock()?.events.get(event_id).cloned())
    }

    pub fn event_count(&self) -> Result<usize, InfraError> {
        Ok(self.lock()?.events.len())
    }

    pub fn calendars(&self) -> Result<Vec<CalendarSummary>, InfraError> {
        Ok(self.lock()?.calendars.clone())
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn created_calendars(&self) -> usize {
        self.created_calendars.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryCalendarState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::lock_poisoned("in-memory calendar", error))
    }

    fn next_id(state: &mut InMemoryCalendarState, prefix: &str) -> String {
        let id = format!("{prefix}-{}", state.next_id);
        state.next_id = state.next_id.saturating_add(1);
        id
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendarProvider {
    async fn permission_status(&self) -> Result<PermissionStatus, InfraError> {
        Ok(self.lock()?.permission)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock()?;
        if state.permission != PermissionStatus::Granted {
            state.permission = if state.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        Ok(state.permission)
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarSummary>, InfraError> {
        Ok(self.lock()?.calendars.clone())
    }

    async fn list_sources(&self) -> Result<Vec<CalendarSource>, InfraError> {
        Ok(self.lock()?.sources.clone())
    }

    async fn default_source(&self) -> Result<Option<CalendarSource>, InfraError> {
        Ok(self.lock()?.default_source.clone())
    }

    async fn create_calendar(&self, calendar: &NewCalendar) -> Result<String, InfraError> {
        if calendar.title.trim().is_empty() {
            return Err(InfraError::InvalidInput(
                "calendar title must not be empty".to_string(),
            ));
        }
        self.created_calendars.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock()?;
        let id = Self::next_id(&mut state, "cal");
        state.calendars.push(CalendarSummary {
            id: id.clone(),
            title: calendar.title.clone(),
            allows_modifications: true,
            source: calendar.source.clone(),
            owner_account: calendar.owner_account.clone(),
        });
        Ok(id)
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<StoredEvent>, InfraError> {
        Ok(self.lock()?.events.get(event_id).cloned())
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        details: &EventDetails,
    ) -> Result<String, InfraError> {
        let mut state = self.lock()?;
        let writable = state
            .calendars
            .iter()
            .any(|calendar| calendar.id == calendar_id && calendar.allows_modifications);
        if !writable {
            return Err(InfraError::NotFound(format!(
                "writable calendar not found: {calendar_id}"
            )));
        }
        let id = Self::next_id(&mut state, "evt");
        state.events.insert(
            id.clone(),
            StoredEvent {
                id: id.clone(),
                calendar_id: calendar_id.to_string(),
                details: details.clone(),
            },
        );
        Ok(id)
    }

    async fn update_event(&self, event_id: &str, details: &EventDetails) -> Result<(), InfraError> {
        let mut state = self.lock()?;
        let Some(event) = state.events.get_mut(event_id) else {
            return Err(InfraError::NotFound(format!("event not found: {event_id}")));
        };
        event.details = details.clone();
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        match self.lock()?.events.remove(event_id) {
            Some(_) => Ok(()),
            None => Err(InfraError::NotFound(format!("event not found: {event_id}"))),
        }
    }
}
