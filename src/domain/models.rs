use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Processing,
    #[default]
    Complete,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub id: String,
    #[serde(default)]
    pub processing_status: Option<ProcessingStatus>,
    #[serde(default)]
    pub processing_error: Option<String>,
    #[serde(default)]
    pub official_date: Option<String>,
    #[serde(default)]
    pub planned_date: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl Activity {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            processing_status: None,
            processing_error: None,
            official_date: None,
            planned_date: None,
            title: title.into(),
            category: None,
            location: None,
            source_url: None,
        }
    }

    /// Missing status means the record predates background processing.
    pub fn status(&self) -> ProcessingStatus {
        self.processing_status.unwrap_or_default()
    }

    pub fn is_processing(&self) -> bool {
        self.status() == ProcessingStatus::Processing
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "activity.id")?;
        if self.processing_error.is_some() && self.status() != ProcessingStatus::Failed {
            return Err("activity.processing_error is only allowed when failed".to_string());
        }
        Ok(())
    }
}

/// A concrete date slot chosen by the caller, overriding the activity's own dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplicitDate {
    pub id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl ExplicitDate {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            id: None,
            start,
            end: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(id) = self.id.as_deref() {
            validate_non_empty(id, "explicit_date.id")?;
        }
        if let Some(end) = self.end {
            if end <= self.start {
                return Err("explicit_date.end must be after explicit_date.start".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CalendarEventLinkKey {
    pub user_id: String,
    pub activity_id: String,
    pub activity_date_id: Option<String>,
}

impl CalendarEventLinkKey {
    pub fn new(
        user_id: impl Into<String>,
        activity_id: impl Into<String>,
        activity_date_id: Option<&str>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            activity_id: activity_id.into(),
            activity_date_id: activity_date_id
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.user_id, "link.user_id")?;
        validate_non_empty(&self.activity_id, "link.activity_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEventLink {
    pub user_id: String,
    pub activity_id: String,
    pub activity_date_id: Option<String>,
    pub calendar_event_id: String,
    pub planned_at: DateTime<Utc>,
    pub is_favorite: bool,
}

impl CalendarEventLink {
    pub fn key(&self) -> CalendarEventLinkKey {
        CalendarEventLinkKey::new(
            self.user_id.clone(),
            self.activity_id.clone(),
            self.activity_date_id.as_deref(),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        self.key().validate()?;
        validate_non_empty(&self.calendar_event_id, "link.calendar_event_id")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationAction {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub action: Option<NotificationAction>,
}

/// Side effects requested by a watch. The UI layer decides how to carry them out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchIntent {
    UpdateCachedRecord { activity: Activity },
    Notify { notification: Notification },
    Navigate { route: String },
    ClearWatchedActivity { activity_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredAccessToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl StoredAccessToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
