use crate::application::calendar_target::{DedicatedCalendar, resolve_target_calendar};
use crate::domain::dates::{resolve_official, resolve_planned};
use crate::domain::models::{Activity, CalendarEventLink, CalendarEventLinkKey, ExplicitDate};
use crate::infrastructure::calendar_provider::{CalendarProvider, EventDetails, PermissionStatus};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_link_repository::CalendarEventLinkRepository;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const UNTITLED_EVENT: &str = "Activity";

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSettings {
    pub time_zone: Tz,
    pub calendar_name: String,
    pub calendar_color: Option<String>,
    pub default_event_duration: Duration,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for CalendarSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            time_zone: config.timezone,
            calendar_name: config.calendar_name.clone(),
            calendar_color: config.calendar_color.clone(),
            default_event_duration: config.default_event_duration,
        }
    }
}

/// Result of reconciling an activity's planned date with its calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedDateSync {
    Created(String),
    Updated(String),
    Removed(String),
    Unchanged,
    Failed,
}

/// Keeps native calendar events in step with activities. Public operations
/// never return provider errors; they log and report through their return
/// value instead.
pub struct CalendarSyncEngine<P, L>
where
    P: CalendarProvider,
    L: CalendarEventLinkRepository,
{
    provider: Arc<P>,
    links: Arc<L>,
    settings: CalendarSettings,
    permission: OnceCell<bool>,
    now_provider: NowProvider,
}

impl<P, L> CalendarSyncEngine<P, L>
where
    P: CalendarProvider,
    L: CalendarEventLinkRepository,
{
    pub fn new(provider: Arc<P>, links: Arc<L>) -> Self {
        Self {
            provider,
            links,
            settings: CalendarSettings::default(),
            permission: OnceCell::new(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_settings(mut self, settings: CalendarSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn settings(&self) -> &CalendarSettings {
        &self.settings
    }

    /// Queries, then requests, calendar access. A definite answer is kept for
    /// the engine's lifetime; provider errors are not, so the next call asks again.
    pub async fn has_permission(&self) -> bool {
        let result = self
            .permission
            .get_or_try_init(|| self.acquire_permission())
            .await;
        match result {
            Ok(granted) => *granted,
            Err(error) => {
                warn!(error = %error, "calendar permission check failed");
                false
            }
        }
    }

    async fn acquire_permission(&self) -> Result<bool, InfraError> {
        if self.provider.permission_status().await? == PermissionStatus::Granted {
            return Ok(true);
        }
        let requested = self.provider.request_permission().await?;
        if requested != PermissionStatus::Granted {
            info!("calendar permission was not granted");
        }
        Ok(requested == PermissionStatus::Granted)
    }

    pub async fn resolve_target_calendar(&self) -> Result<String, InfraError> {
        if !self.has_permission().await {
            return Err(InfraError::PermissionDenied(
                "calendar access was not granted".to_string(),
            ));
        }
        let dedicated = DedicatedCalendar {
            title: self.settings.calendar_name.clone(),
            color: self.settings.calendar_color.clone(),
            time_zone: Some(self.settings.time_zone.name().to_string()),
        };
        let target = resolve_target_calendar(self.provider.as_ref(), &dedicated).await?;
        Ok(target.id().to_string())
    }

    pub async fn create_event_for_activity(
        &self,
        user_id: &str,
        activity: &Activity,
        explicit_date: Option<&ExplicitDate>,
    ) -> Option<String> {
        match self.try_create_event(user_id, activity, explicit_date).await {
            Ok(event_id) => event_id,
            Err(error) => {
                warn!(activity_id = %activity.id, error = %error, "calendar event was not created");
                None
            }
        }
    }

    pub async fn update_event_for_activity(
        &self,
        event_id: &str,
        activity: &Activity,
        planned_at: Option<DateTime<Utc>>,
        explicit_date: Option<&ExplicitDate>,
    ) -> bool {
        if !self.has_permission().await {
            info!(event_id, "calendar permission denied; event not updated");
            return false;
        }

        let start = planned_at
            .or_else(|| explicit_date.map(|date| date.start))
            .or_else(|| resolve_official(activity, self.settings.time_zone).map(|date| date.at))
            .unwrap_or_else(|| (self.now_provider)());
        let explicit_end = explicit_date
            .and_then(|date| date.end)
            .filter(|end| *end > start);
        let end = match explicit_end {
            Some(end) => end,
            None => start + self.existing_duration(event_id).await,
        };

        let details = self.event_details(activity, start, end);
        match self.provider.update_event(event_id, &details).await {
            Ok(()) => {
                info!(event_id, activity_id = %activity.id, start = %start, "calendar event updated");
                true
            }
            Err(error) => {
                warn!(event_id, activity_id = %activity.id, error = %error, "calendar event update failed");
                false
            }
        }
    }

    /// Best effort. An event that is already gone counts as deleted.
    pub async fn delete_event(&self, event_id: &str) -> bool {
        if !self.has_permission().await {
            info!(event_id, "calendar permission denied; event not deleted");
            return false;
        }
        match self.provider.delete_event(event_id).await {
            Ok(()) => {
                info!(event_id, "calendar event deleted");
                true
            }
            Err(error) if error.is_not_found() => {
                debug!(event_id, "calendar event already removed");
                true
            }
            Err(error) => {
                warn!(event_id, error = %error, "calendar event delete failed");
                false
            }
        }
    }

    /// Brings the event linked to `(user_id, activity.id)` in line with the
    /// activity's current planned date.
    pub async fn sync_planned_date(&self, user_id: &str, activity: &Activity) -> PlannedDateSync {
        let key = CalendarEventLinkKey::new(user_id, activity.id.clone(), None);
        let link = match self.links.get(&key) {
            Ok(link) => link,
            Err(error) => {
                warn!(activity_id = %activity.id, error = %error, "calendar link lookup failed");
                return PlannedDateSync::Failed;
            }
        };
        let planned = resolve_planned(activity, self.settings.time_zone);

        match (planned, link) {
            (Some(planned), Some(link)) => {
                let updated = self
                    .update_event_for_activity(
                        &link.calendar_event_id,
                        activity,
                        Some(planned.at),
                        None,
                    )
                    .await;
                if !updated {
                    // The linked event may have been removed outside the app.
                    return self.create_for_planned(user_id, activity, planned.at).await;
                }
                let refreshed = CalendarEventLink {
                    planned_at: planned.at,
                    ..link
                };
                if let Err(error) = self.links.upsert(&refreshed) {
                    warn!(activity_id = %activity.id, error = %error, "calendar link refresh failed");
                }
                PlannedDateSync::Updated(refreshed.calendar_event_id)
            }
            (Some(planned), None) => self.create_for_planned(user_id, activity, planned.at).await,
            (None, Some(link)) => {
                if !self.delete_event(&link.calendar_event_id).await {
                    return PlannedDateSync::Failed;
                }
                if let Err(error) = self.links.remove(&key) {
                    warn!(activity_id = %activity.id, error = %error, "calendar link removal failed");
                    return PlannedDateSync::Failed;
                }
                PlannedDateSync::Removed(link.calendar_event_id)
            }
            (None, None) => PlannedDateSync::Unchanged,
        }
    }

    async fn create_for_planned(
        &self,
        user_id: &str,
        activity: &Activity,
        planned_at: DateTime<Utc>,
    ) -> PlannedDateSync {
        let explicit = ExplicitDate::starting_at(planned_at);
        match self
            .create_event_for_activity(user_id, activity, Some(&explicit))
            .await
        {
            Some(event_id) => PlannedDateSync::Created(event_id),
            None => PlannedDateSync::Failed,
        }
    }

    async fn try_create_event(
        &self,
        user_id: &str,
        activity: &Activity,
        explicit_date: Option<&ExplicitDate>,
    ) -> Result<Option<String>, InfraError> {
        if let Some(explicit_date) = explicit_date {
            explicit_date.validate().map_err(InfraError::InvalidInput)?;
        }

        let tz = self.settings.time_zone;
        let Some(start) = explicit_date
            .map(|date| date.start)
            .or_else(|| resolve_official(activity, tz).map(|date| date.at))
            .or_else(|| resolve_planned(activity, tz).map(|date| date.at))
        else {
            debug!(activity_id = %activity.id, "no usable date; calendar event skipped");
            return Ok(None);
        };

        if !self.has_permission().await {
            info!(activity_id = %activity.id, "calendar permission denied; event not created");
            return Ok(None);
        }

        let end = explicit_date
            .and_then(|date| date.end)
            .unwrap_or(start + self.settings.default_event_duration);
        let details = self.event_details(activity, start, end);
        let key = CalendarEventLinkKey::new(
            user_id,
            activity.id.clone(),
            explicit_date.and_then(|date| date.id.as_deref()),
        );

        let event_id = match self.reusable_event(&key).await? {
            Some(event_id) => {
                self.provider.update_event(&event_id, &details).await?;
                event_id
            }
            None => {
                let calendar_id = self.resolve_target_calendar().await?;
                self.provider.create_event(&calendar_id, &details).await?
            }
        };

        self.links.upsert(&CalendarEventLink {
            user_id: key.user_id,
            activity_id: key.activity_id,
            activity_date_id: key.activity_date_id,
            calendar_event_id: event_id.clone(),
            planned_at: start,
            is_favorite: true,
        })?;
        info!(activity_id = %activity.id, event_id = %event_id, start = %start, "calendar event linked");
        Ok(Some(event_id))
    }

    /// The event already linked to `key`, if the provider still has it.
    async fn reusable_event(&self, key: &CalendarEventLinkKey) -> Result<Option<String>, InfraError> {
        let Some(link) = self.links.get(key)? else {
            return Ok(None);
        };
        let existing = self.provider.get_event(&link.calendar_event_id).await?;
        Ok(existing.map(|event| event.id))
    }

    async fn existing_duration(&self, event_id: &str) -> Duration {
        match self.provider.get_event(event_id).await {
            Ok(Some(event)) if event.details.end > event.details.start => {
                event.details.end - event.details.start
            }
            Ok(_) => self.settings.default_event_duration,
            Err(error) => {
                debug!(event_id, error = %error, "existing event unreadable; using default duration");
                self.settings.default_event_duration
            }
        }
    }

    fn event_details(&self, activity: &Activity, start: DateTime<Utc>, end: DateTime<Utc>) -> EventDetails {
        let title = activity.title.trim();
        let notes = [activity.category.as_deref(), activity.source_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        EventDetails {
            title: if title.is_empty() {
                UNTITLED_EVENT.to_string()
            } else {
                title.to_string()
            },
            start,
            end,
            location: activity
                .location
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            notes: (!notes.is_empty()).then_some(notes),
            url: activity.source_url.clone(),
            time_zone: Some(self.settings.time_zone.name().to_string()),
            activity_id: Some(activity.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::calendar_provider::{
        CalendarSource, CalendarSummary, InMemoryCalendarProvider, NewCalendar, SourceKind,
        StoredEvent,
    };
    use crate::infrastructure::event_link_repository::InMemoryCalendarEventLinkRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn writable_provider(permission: PermissionStatus, grant: bool) -> Arc<InMemoryCalendarProvider> {
        let provider = InMemoryCalendarProvider::with_permission(permission, grant);
        provider
            .add_calendar(CalendarSummary {
                id: "cal-google".to_string(),
                title: "me@gmail.com".to_string(),
                allows_modifications: true,
                source: CalendarSource {
                    id: "google".to_string(),
                    name: "Google".to_string(),
                    kind: SourceKind::Remote,
                },
                owner_account: Some("me@gmail.com".to_string()),
            })
            .expect("add calendar");
        Arc::new(provider)
    }

    fn build_engine<P: CalendarProvider>(
        provider: Arc<P>,
    ) -> (
        CalendarSyncEngine<P, InMemoryCalendarEventLinkRepository>,
        Arc<InMemoryCalendarEventLinkRepository>,
    ) {
        let links = Arc::new(InMemoryCalendarEventLinkRepository::default());
        let engine = CalendarSyncEngine::new(provider, Arc::clone(&links))
            .with_now_provider(Arc::new(|| fixed_time("2026-01-01T00:00:00Z")));
        (engine, links)
    }

    fn activity(official: Option<&str>, planned: Option<&str>) -> Activity {
        let mut activity = Activity::new("act-1", "Pottery class");
        activity.official_date = official.map(ToOwned::to_owned);
        activity.planned_date = planned.map(ToOwned::to_owned);
        activity.location = Some("Studio 4".to_string());
        activity.category = Some("workshop".to_string());
        activity.source_url = Some("https://example.com/p/1".to_string());
        activity
    }

    #[tokio::test]
    async fn create_uses_official_date_with_default_duration() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, links) = build_engine(Arc::clone(&provider));

        let event_id = engine
            .create_event_for_activity("user-1", &activity(Some("2026-03-14T10:00:00Z"), None), None)
            .await
            .expect("event created");

        let stored = provider.event(&event_id).expect("read").expect("event exists");
        assert_eq!(stored.calendar_id, "cal-google");
        assert_eq!(stored.details.start, fixed_time("2026-03-14T10:00:00Z"));
        assert_eq!(stored.details.end, fixed_time("2026-03-14T11:00:00Z"));
        assert_eq!(stored.details.notes.as_deref(), Some("workshop\nhttps://example.com/p/1"));
        assert_eq!(stored.details.activity_id.as_deref(), Some("act-1"));

        let link = links
            .get(&CalendarEventLinkKey::new("user-1", "act-1", None))
            .expect("get")
            .expect("link exists");
        assert_eq!(link.calendar_event_id, event_id);
        assert!(link.is_favorite);
        assert_eq!(link.planned_at, fixed_time("2026-03-14T10:00:00Z"));
    }

    #[tokio::test]
    async fn explicit_date_overrides_activity_dates() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, links) = build_engine(Arc::clone(&provider));
        let explicit = ExplicitDate {
            id: Some("slot-2".to_string()),
            start: fixed_time("2026-04-01T18:00:00Z"),
            end: Some(fixed_time("2026-04-01T21:00:00Z")),
        };

        let event_id = engine
            .create_event_for_activity(
                "user-1",
                &activity(Some("2026-03-14T10:00:00Z"), None),
                Some(&explicit),
            )
            .await
            .expect("event created");

        let stored = provider.event(&event_id).expect("read").expect("event exists");
        assert_eq!(stored.details.start, explicit.start);
        assert_eq!(stored.details.end, fixed_time("2026-04-01T21:00:00Z"));
        assert!(
            links
                .get(&CalendarEventLinkKey::new("user-1", "act-1", Some("slot-2")))
                .expect("get")
                .is_some()
        );
    }

    #[tokio::test]
    async fn repeated_create_keeps_one_link_and_one_event() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, links) = build_engine(Arc::clone(&provider));
        let record = activity(Some("2026-03-14T10:00:00Z"), None);

        let first = engine.create_event_for_activity("user-1", &record, None).await;
        let second = engine.create_event_for_activity("user-1", &record, None).await;

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(links.len().expect("len"), 1);
        assert_eq!(provider.event_count().expect("count"), 1);
    }

    #[tokio::test]
    async fn create_without_any_date_is_a_no_op() {
        let provider = writable_provider(PermissionStatus::Undetermined, true);
        let (engine, links) = build_engine(Arc::clone(&provider));

        let result = engine
            .create_event_for_activity("user-1", &activity(Some("sometime soon"), None), None)
            .await;

        assert_eq!(result, None);
        assert_eq!(provider.permission_requests(), 0);
        assert!(links.is_empty().expect("is_empty"));
    }

    #[tokio::test]
    async fn planned_date_is_used_when_official_is_missing() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, _links) = build_engine(Arc::clone(&provider));

        let event_id = engine
            .create_event_for_activity("user-1", &activity(None, Some("2026-05-02T09:00:00Z")), None)
            .await
            .expect("event created");
        let stored = provider.event(&event_id).expect("read").expect("event exists");
        assert_eq!(stored.details.start, fixed_time("2026-05-02T09:00:00Z"));
    }

    #[tokio::test]
    async fn denied_permission_is_requested_once_and_remembered() {
        let provider = writable_provider(PermissionStatus::Undetermined, false);
        let (engine, links) = build_engine(Arc::clone(&provider));
        let record = activity(Some("2026-03-14T10:00:00Z"), None);

        assert_eq!(engine.create_event_for_activity("user-1", &record, None).await, None);
        assert_eq!(engine.create_event_for_activity("user-1", &record, None).await, None);
        assert!(!engine.delete_event("evt-1").await);

        assert_eq!(provider.permission_requests(), 1);
        assert!(links.is_empty().expect("is_empty"));
        assert!(matches!(
            engine.resolve_target_calendar().await,
            Err(InfraError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn update_preserves_existing_duration() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, _links) = build_engine(Arc::clone(&provider));
        let start = fixed_time("2026-03-14T10:00:00Z");
        provider
            .insert_event(StoredEvent {
                id: "evt-9".to_string(),
                calendar_id: "cal-google".to_string(),
                details: EventDetails {
                    title: "Old title".to_string(),
                    start,
                    end: start + Duration::hours(2),
                    location: None,
                    notes: None,
                    url: None,
                    time_zone: None,
                    activity_id: Some("act-1".to_string()),
                },
            })
            .expect("insert event");

        let moved = fixed_time("2026-03-20T15:30:00Z");
        let updated = engine
            .update_event_for_activity("evt-9", &activity(None, None), Some(moved), None)
            .await;

        assert!(updated);
        let stored = provider.event("evt-9").expect("read").expect("event exists");
        assert_eq!(stored.details.start, moved);
        assert_eq!(stored.details.end, moved + Duration::hours(2));
        assert_eq!(stored.details.title, "Pottery class");
        assert_eq!(stored.details.location.as_deref(), Some("Studio 4"));
    }

    #[tokio::test]
    async fn update_of_missing_event_reports_failure() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, _links) = build_engine(provider);
        assert!(
            !engine
                .update_event_for_activity("gone", &activity(None, None), None, None)
                .await
        );
    }

    #[tokio::test]
    async fn update_falls_back_to_default_duration_and_now() {
        let provider = Arc::new(UnreadableEventsProvider::new());
        let (engine, _links) = build_engine(Arc::clone(&provider));

        assert!(
            engine
                .update_event_for_activity("evt-1", &activity(None, None), None, None)
                .await
        );
        let written = provider.last_update().expect("update written");
        assert_eq!(written.start, fixed_time("2026-01-01T00:00:00Z"));
        assert_eq!(written.end, fixed_time("2026-01-01T01:00:00Z"));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_swallows_errors() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, _links) = build_engine(Arc::clone(&provider));
        let event_id = engine
            .create_event_for_activity("user-1", &activity(Some("2026-03-14T10:00:00Z"), None), None)
            .await
            .expect("event created");

        assert!(engine.delete_event(&event_id).await);
        assert!(engine.delete_event(&event_id).await);
        assert_eq!(provider.event_count().expect("count"), 0);

        let failing = Arc::new(UnreadableEventsProvider::new());
        failing.fail_deletes.store(true, Ordering::SeqCst);
        let (engine, _links) = build_engine(failing);
        assert!(!engine.delete_event("evt-1").await);
    }

    #[tokio::test]
    async fn planned_date_sync_creates_moves_and_removes_event() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, links) = build_engine(Arc::clone(&provider));
        let key = CalendarEventLinkKey::new("user-1", "act-1", None);

        let mut record = activity(None, None);
        assert_eq!(
            engine.sync_planned_date("user-1", &record).await,
            PlannedDateSync::Unchanged
        );

        record.planned_date = Some("2026-06-01T10:00:00Z".to_string());
        let PlannedDateSync::Created(event_id) = engine.sync_planned_date("user-1", &record).await
        else {
            panic!("expected a created event");
        };

        record.planned_date = Some("2026-06-03T12:00:00Z".to_string());
        assert_eq!(
            engine.sync_planned_date("user-1", &record).await,
            PlannedDateSync::Updated(event_id.clone())
        );
        let stored = provider.event(&event_id).expect("read").expect("event exists");
        assert_eq!(stored.details.start, fixed_time("2026-06-03T12:00:00Z"));
        assert_eq!(stored.details.end, fixed_time("2026-06-03T13:00:00Z"));
        assert_eq!(
            links.get(&key).expect("get").expect("link").planned_at,
            fixed_time("2026-06-03T12:00:00Z")
        );

        record.planned_date = None;
        assert_eq!(
            engine.sync_planned_date("user-1", &record).await,
            PlannedDateSync::Removed(event_id)
        );
        assert!(links.get(&key).expect("get").is_none());
        assert_eq!(provider.event_count().expect("count"), 0);
    }

    #[tokio::test]
    async fn planned_date_sync_recreates_externally_deleted_event() {
        let provider = writable_provider(PermissionStatus::Granted, true);
        let (engine, links) = build_engine(Arc::clone(&provider));
        let mut record = activity(None, Some("2026-06-01T10:00:00Z"));
        let PlannedDateSync::Created(first) = engine.sync_planned_date("user-1", &record).await
        else {
            panic!("expected a created event");
        };
        provider.delete_event(&first).await.expect("external delete");

        record.planned_date = Some("2026-06-02T10:00:00Z".to_string());
        let PlannedDateSync::Created(second) = engine.sync_planned_date("user-1", &record).await
        else {
            panic!("expected a recreated event");
        };
        assert_ne!(first, second);
        assert_eq!(links.len().expect("len"), 1);
    }

    /// Provider whose events cannot be read back. Updates are recorded.
    struct UnreadableEventsProvider {
        updates: std::sync::Mutex<Vec<EventDetails>>,
        fail_deletes: AtomicBool,
    }

    impl UnreadableEventsProvider {
        fn new() -> Self {
            Self {
                updates: std::sync::Mutex::new(Vec::new()),
                fail_deletes: AtomicBool::new(false),
            }
        }

        fn last_update(&self) -> Option<EventDetails> {
            self.updates.lock().expect("updates mutex poisoned").last().cloned()
        }
    }

    #[async_trait]
    impl CalendarProvider for UnreadableEventsProvider {
        async fn permission_status(&self) -> Result<PermissionStatus, InfraError> {
            Ok(PermissionStatus::Granted)
        }

        async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
            Ok(PermissionStatus::Granted)
        }

        async fn list_calendars(&self) -> Result<Vec<CalendarSummary>, InfraError> {
            Ok(Vec::new())
        }

        async fn list_sources(&self) -> Result<Vec<CalendarSource>, InfraError> {
            Ok(Vec::new())
        }

        async fn default_source(&self) -> Result<Option<CalendarSource>, InfraError> {
            Ok(None)
        }

        async fn create_calendar(&self, _calendar: &NewCalendar) -> Result<String, InfraError> {
            Err(InfraError::Provider("not used in calendar_sync tests".to_string()))
        }

        async fn get_event(&self, _event_id: &str) -> Result<Option<StoredEvent>, InfraError> {
            Err(InfraError::Provider("network error while reading event".to_string()))
        }

        async fn create_event(
            &self,
            _calendar_id: &str,
            _details: &EventDetails,
        ) -> Result<String, InfraError> {
            Err(InfraError::Provider("not used in calendar_sync tests".to_string()))
        }

        async fn update_event(&self, _event_id: &str, details: &EventDetails) -> Result<(), InfraError> {
            self.updates
                .lock()
                .expect("updates mutex poisoned")
                .push(details.clone());
            Ok(())
        }

        async fn delete_event(&self, _event_id: &str) -> Result<(), InfraError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(InfraError::Provider("network error while deleting event".to_string()));
            }
            Ok(())
        }
    }
}
