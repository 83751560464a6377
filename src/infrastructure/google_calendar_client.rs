use crate::infrastructure::calendar_provider::{
    CalendarProvider, CalendarSource, CalendarSummary, EventDetails, NewCalendar,
    PermissionStatus, SourceKind, StoredEvent,
};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{
    GoogleCalendarEvent, decode_event_details, encode_event_details,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::warn;
use url::Url;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const GOOGLE_SOURCE_ID: &str = "google";
const GOOGLE_SOURCE_NAME: &str = "Google";
const TOKEN_LEEWAY_SECONDS: i64 = 60;

impl GoogleCalendarProvider<KeyringCredentialStore> {
    /// Provider reading the user's token from the OS keychain.
    pub fn for_user(user_id: &str) -> Result<Self, InfraError> {
        Ok(Self::new(KeyringCredentialStore::for_user(user_id)?))
    }
}

/// `CalendarProvider` backed by the Google Calendar v3 REST API. Event ids
/// it hands out are `<calendarId>/<eventId>`.
#[derive(Debug, Clone)]
pub struct GoogleCalendarProvider<S> {
    client: Client,
    credentials: S,
}

impl<S> GoogleCalendarProvider<S>
where
    S: CredentialStore,
{
    pub fn new(credentials: S) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    pub fn credentials(&self) -> &S {
        &self.credentials
    }

    fn access_token(&self) -> Result<String, InfraError> {
        match self.credentials.load_token()? {
            Some(token) if token.is_valid_at(Utc::now(), TOKEN_LEEWAY_SECONDS) => {
                Ok(token.access_token)
            }
            Some(_) => Err(InfraError::PermissionDenied(
                "stored google access token has expired".to_string(),
            )),
            None => Err(InfraError::PermissionDenied(
                "no google access token stored".to_string(),
            )),
        }
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<String, InfraError> {
        let access_token = self.access_token()?;
        let response = request
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Provider(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Provider(format!("failed reading response while {action}: {error}")))?;

        if !status.is_success() {
            return Err(http_error(status, action, &body));
        }
        Ok(body)
    }

    async fn apply_calendar_color(&self, calendar_id: &str, color: &str) -> Result<(), InfraError> {
        let mut endpoint = calendar_list_entry_endpoint(calendar_id)?;
        endpoint
            .query_pairs_mut()
            .append_pair("colorRgbFormat", "true");
        let request = self
            .client
            .patch(endpoint)
            .json(&serde_json::json!({ "backgroundColor": color }));
        self.execute(request, "setting calendar color").await?;
        Ok(())
    }
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarListItem>>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListItem {
    id: String,
    summary: Option<String>,
    #[serde(rename = "accessRole")]
    access_role: Option<String>,
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, serde::Serialize)]
struct CreateCalendarRequest<'a> {
    summary: &'a str,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<&'a str>,
}

#[derive(Debug, serde::Deserialize)]
struct CalendarResourceResponse {
    id: Option<String>,
}

#[async_trait]
impl<S> CalendarProvider for GoogleCalendarProvider<S>
where
    S: CredentialStore,
{
    async fn permission_status(&self) -> Result<PermissionStatus, InfraError> {
        Ok(match self.credentials.load_token()? {
            Some(token) if token.is_valid_at(Utc::now(), TOKEN_LEEWAY_SECONDS) => {
                PermissionStatus::Granted
            }
            Some(_) => PermissionStatus::Denied,
            None => PermissionStatus::Undetermined,
        })
    }

    // Authorization happens outside this crate; a request can only re-check
    // the stored token.
    async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
        self.permission_status().await
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarSummary>, InfraError> {
        let endpoint = api_url(&["users", "me", "calendarList"])?;
        let request = self.client.get(endpoint).query(&[("maxResults", 250)]);
        let body = self.execute(request, "listing calendars").await?;

        let parsed: CalendarListResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Provider(format!("invalid calendar list payload: {error}; body={body}"))
        })?;

        Ok(parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(calendar_summary_from_item)
            .collect())
    }

    async fn list_sources(&self) -> Result<Vec<CalendarSource>, InfraError> {
        Ok(vec![google_source()])
    }

    async fn default_source(&self) -> Result<Option<CalendarSource>, InfraError> {
        Ok(Some(google_source()))
    }

    async fn create_calendar(&self, calendar: &NewCalendar) -> Result<String, InfraError> {
        let summary = calendar.title.trim();
        if summary.is_empty() {
            return Err(InfraError::InvalidInput(
                "calendar title must not be empty".to_string(),
            ));
        }
        let request = CreateCalendarRequest {
            summary,
            time_zone: calendar
                .time_zone
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty()),
        };

        let endpoint = api_url(&["calendars"])?;
        let body = self
            .execute(self.client.post(endpoint).json(&request), "creating calendar")
            .await?;
        let parsed: CalendarResourceResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Provider(format!("invalid calendar create payload: {error}; body={body}"))
        })?;
        let id = parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::Provider("calendar create response did not include id".to_string())
            })?;

        if let Some(color) = calendar.color.as_deref() {
            if let Err(error) = self.apply_calendar_color(&id, color).await {
                warn!(calendar_id = %id, error = %error, "calendar created without color");
            }
        }
        Ok(id)
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<StoredEvent>, InfraError> {
        let (calendar_id, remote_id) = split_event_id(event_id)?;
        let endpoint = event_endpoint(calendar_id, remote_id)?;
        let body = match self.execute(self.client.get(endpoint), "reading event").await {
            Ok(body) => body,
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };

        let event: GoogleCalendarEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Provider(format!("invalid event payload: {error}; body={body}"))
        })?;
        if event.status.as_deref() == Some("cancelled") {
            return Ok(None);
        }
        Ok(Some(StoredEvent {
            id: event_id.to_string(),
            calendar_id: calendar_id.to_string(),
            details: decode_event_details(&event)?,
        }))
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        details: &EventDetails,
    ) -> Result<String, InfraError> {
        ensure_non_empty(calendar_id, "calendar id")?;
        let endpoint = events_endpoint(calendar_id)?;
        let request = self
            .client
            .post(endpoint)
            .json(&encode_event_details(details));
        let body = self.execute(request, "creating event").await?;

        let parsed: GoogleCalendarEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Provider(format!("invalid event create payload: {error}; body={body}"))
        })?;
        let remote_id = parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                InfraError::Provider("event create response did not include id".to_string())
            })?;
        Ok(qualify_event_id(calendar_id, &remote_id))
    }

    async fn update_event(&self, event_id: &str, details: &EventDetails) -> Result<(), InfraError> {
        let (calendar_id, remote_id) = split_event_id(event_id)?;
        let endpoint = event_endpoint(calendar_id, remote_id)?;
        let request = self
            .client
            .put(endpoint)
            .json(&encode_event_details(details));
        self.execute(request, "updating event").await?;
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        let (calendar_id, remote_id) = split_event_id(event_id)?;
        let endpoint = event_endpoint(calendar_id, remote_id)?;
        self.execute(self.client.delete(endpoint), "deleting event")
            .await?;
        Ok(())
    }
}

fn google_source() -> CalendarSource {
    CalendarSource {
        id: GOOGLE_SOURCE_ID.to_string(),
        name: GOOGLE_SOURCE_NAME.to_string(),
        kind: SourceKind::Remote,
    }
}

fn calendar_summary_from_item(item: CalendarListItem) -> Option<CalendarSummary> {
    let id = item.id.trim();
    if id.is_empty() {
        return None;
    }
    let title = item
        .summary
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| id.to_string());
    let allows_modifications = matches!(item.access_role.as_deref(), Some("owner" | "writer"));
    Some(CalendarSummary {
        id: id.to_string(),
        title,
        allows_modifications,
        source: google_source(),
        // The primary calendar id is the account's address.
        owner_account: item.primary.then(|| id.to_string()),
    })
}

pub fn qualify_event_id(calendar_id: &str, event_id: &str) -> String {
    format!("{calendar_id}/{event_id}")
}

pub fn split_event_id(qualified: &str) -> Result<(&str, &str), InfraError> {
    qualified
        .rsplit_once('/')
        .map(|(calendar_id, event_id)| (calendar_id.trim(), event_id.trim()))
        .filter(|(calendar_id, event_id)| !calendar_id.is_empty() && !event_id.is_empty())
        .ok_or_else(|| InfraError::InvalidInput(format!("malformed event id: {qualified}")))
}

fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
    if value.trim().is_empty() {
        return Err(InfraError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn http_error(status: StatusCode, action: &str, body: &str) -> InfraError {
    let message = if body.trim().is_empty() {
        format!("google calendar api error while {action}: http {}", status.as_u16())
    } else {
        format!(
            "google calendar api error while {action}: http {}; body={body}",
            status.as_u16()
        )
    };
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => InfraError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InfraError::PermissionDenied(message),
        _ => InfraError::Provider(message),
    }
}

fn api_url(segments: &[&str]) -> Result<Url, InfraError> {
    let mut url = Url::parse(CALENDAR_API_BASE)
        .map_err(|error| InfraError::Provider(format!("invalid calendar api base url: {error}")))?;
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            InfraError::Provider("calendar api base URL cannot be a base".to_string())
        })?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

fn calendar_list_entry_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
    api_url(&["users", "me", "calendarList", calendar_id])
}

fn events_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
    api_url(&["calendars", calendar_id, "events"])
}

fn event_endpoint(calendar_id: &str, event_id: &str) -> Result<Url, InfraError> {
    api_url(&["calendars", calendar_id, "events", event_id])
}
