use crate::infrastructure::calendar_provider::{
    CalendarProvider, CalendarSource, CalendarSummary, NewCalendar, SourceKind,
};
use crate::infrastructure::error::InfraError;
use tracing::info;

const GOOGLE_ACCOUNT_MARKERS: [&str; 3] = ["google", "gmail.com", "googlemail.com"];

/// Shape of the calendar created when no writable calendar exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedicatedCalendar {
    pub title: String,
    pub color: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCalendar {
    Existing(String),
    Created(String),
}

impl TargetCalendar {
    pub fn id(&self) -> &str {
        match self {
            Self::Existing(id) | Self::Created(id) => id,
        }
    }
}

/// Case-insensitive match of the source name or owning account against
/// known Google account markers.
pub fn is_google_calendar(calendar: &CalendarSummary) -> bool {
    let candidates = [
        Some(calendar.source.name.as_str()),
        calendar.owner_account.as_deref(),
    ];
    candidates.into_iter().flatten().any(|value| {
        let lowered = value.to_ascii_lowercase();
        GOOGLE_ACCOUNT_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    })
}

/// Writable Google calendar first, then any writable calendar.
pub fn select_target_calendar(calendars: &[CalendarSummary]) -> Option<&CalendarSummary> {
    let mut writable = calendars
        .iter()
        .filter(|calendar| calendar.allows_modifications);
    let first = writable.clone().next();
    writable.find(|calendar| is_google_calendar(calendar)).or(first)
}

/// Local source first, then the first listed source. The provider's default
/// source is consulted by the caller only when this returns `None`.
pub fn select_calendar_source(sources: &[CalendarSource]) -> Option<&CalendarSource> {
    sources
        .iter()
        .find(|source| source.kind == SourceKind::Local)
        .or_else(|| sources.first())
}

pub async fn resolve_target_calendar<P>(
    provider: &P,
    dedicated: &DedicatedCalendar,
) -> Result<TargetCalendar, InfraError>
where
    P: CalendarProvider + ?Sized,
{
    let calendars = provider.list_calendars().await?;
    if let Some(calendar) = select_target_calendar(&calendars) {
        return Ok(TargetCalendar::Existing(calendar.id.clone()));
    }

    let sources = provider.list_sources().await?;
    let source = match select_calendar_source(&sources) {
        Some(source) => source.clone(),
        None => provider
            .default_source()
            .await?
            .ok_or(InfraError::NoCalendarSource)?,
    };

    let created = provider
        .create_calendar(&NewCalendar {
            title: dedicated.title.clone(),
            color: dedicated.color.clone(),
            owner_account: (source.kind == SourceKind::Local).then(|| source.name.clone()),
            source,
            time_zone: dedicated.time_zone.clone(),
        })
        .await?;
    info!(calendar_id = %created, title = %dedicated.title, "created dedicated calendar");
    Ok(TargetCalendar::Created(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::calendar_provider::{InMemoryCalendarProvider, PermissionStatus};

    fn source(id: &str, name: &str, kind: SourceKind) -> CalendarSource {
        CalendarSource {
            id: id.to_string(),
            name: name.to_string(),
            kind,
        }
    }

    fn calendar(id: &str, writable: bool, source_name: &str, owner: Option<&str>) -> CalendarSummary {
        CalendarSummary {
            id: id.to_string(),
            title: id.to_string(),
            allows_modifications: writable,
            source: source("src", source_name, SourceKind::Remote),
            owner_account: owner.map(ToOwned::to_owned),
        }
    }

    fn dedicated() -> DedicatedCalendar {
        DedicatedCalendar {
            title: "Activities".to_string(),
            color: Some("#2563EB".to_string()),
            time_zone: Some("UTC".to_string()),
        }
    }

    #[test]
    fn google_heuristic_checks_source_and_owner() {
        assert!(is_google_calendar(&calendar("a", true, "Google", None)));
        assert!(is_google_calendar(&calendar("b", true, "iCloud", Some("Me@GMAIL.com"))));
        assert!(is_google_calendar(&calendar("c", true, "Exchange", Some("x@googlemail.com"))));
        assert!(!is_google_calendar(&calendar("d", true, "iCloud", Some("me@icloud.com"))));
    }

    #[test]
    fn writable_google_calendar_wins_over_earlier_writable() {
        let calendars = vec![
            calendar("read-only-google", false, "Google", None),
            calendar("icloud", true, "iCloud", None),
            calendar("google", true, "Google", None),
        ];
        assert_eq!(
            select_target_calendar(&calendars).map(|calendar| calendar.id.as_str()),
            Some("google")
        );
    }

    #[test]
    fn first_writable_is_used_without_google_match() {
        let calendars = vec![
            calendar("holidays", false, "Subscribed", None),
            calendar("work", true, "Exchange", None),
            calendar("home", true, "iCloud", None),
        ];
        assert_eq!(
            select_target_calendar(&calendars).map(|calendar| calendar.id.as_str()),
            Some("work")
        );
        assert!(select_target_calendar(&calendars[..1]).is_none());
    }

    #[test]
    fn local_source_is_preferred() {
        let sources = vec![
            source("remote", "iCloud", SourceKind::Remote),
            source("local", "On My Device", SourceKind::Local),
        ];
        assert_eq!(
            select_calendar_source(&sources).map(|source| source.id.as_str()),
            Some("local")
        );
        assert_eq!(
            select_calendar_source(&sources[..1]).map(|source| source.id.as_str()),
            Some("remote")
        );
        assert!(select_calendar_source(&[]).is_none());
    }

    #[tokio::test]
    async fn existing_writable_calendar_is_reused() {
        let provider = InMemoryCalendarProvider::default();
        provider
            .add_calendar(calendar("personal", true, "iCloud", None))
            .expect("add calendar");

        let target = resolve_target_calendar(&provider, &dedicated())
            .await
            .expect("resolve");
        assert_eq!(target, TargetCalendar::Existing("personal".to_string()));
        assert_eq!(provider.created_calendars(), 0);
    }

    #[tokio::test]
    async fn creates_calendar_under_default_source_as_last_resort() {
        let provider = InMemoryCalendarProvider::default();
        provider
            .set_default_source(Some(source("default", "Default", SourceKind::Other)))
            .expect("set default");

        let target = resolve_target_calendar(&provider, &dedicated())
            .await
            .expect("resolve");
        assert!(matches!(target, TargetCalendar::Created(_)));

        let calendars = provider.calendars().expect("calendars");
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].title, "Activities");
        assert_eq!(calendars[0].source.id, "default");
        assert_eq!(calendars[0].id, target.id());
    }

    #[tokio::test]
    async fn missing_source_is_reported() {
        let provider = InMemoryCalendarProvider::with_permission(PermissionStatus::Granted, true);
        let result = resolve_target_calendar(&provider, &dedicated()).await;
        assert!(matches!(result, Err(InfraError::NoCalendarSource)));
        assert_eq!(provider.created_calendars(), 0);
    }
}
