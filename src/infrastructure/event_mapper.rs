use crate::infrastructure::calendar_provider::EventDetails;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

const KEY_ACTIVITY_ID: &str = "activity_id";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// All-day events carry only a date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventExtendedProperties {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub private: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CalendarEventSource {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CalendarEventSource>,
    pub start: CalendarEventDateTime,
    pub end: CalendarEventDateTime,
    #[serde(rename = "extendedProperties", skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<CalendarEventExtendedProperties>,
}

pub fn encode_event_details(details: &EventDetails) -> GoogleCalendarEvent {
    let mut private = HashMap::new();
    if let Some(activity_id) = non_empty(details.activity_id.as_deref()) {
        private.insert(KEY_ACTIVITY_ID.to_string(), activity_id.to_string());
    }
    let time_zone = non_empty(details.time_zone.as_deref()).map(ToOwned::to_owned);

    GoogleCalendarEvent {
        id: None,
        summary: Some(details.title.clone()),
        description: non_empty(details.notes.as_deref()).map(ToOwned::to_owned),
        location: non_empty(details.location.as_deref()).map(ToOwned::to_owned),
        status: Some("confirmed".to_string()),
        source: non_empty(details.url.as_deref()).map(|url| CalendarEventSource {
            url: url.to_string(),
            title: details.title.clone(),
        }),
        start: CalendarEventDateTime {
            date_time: Some(details.start.to_rfc3339()),
            date: None,
            time_zone: time_zone.clone(),
        },
        end: CalendarEventDateTime {
            date_time: Some(details.end.to_rfc3339()),
            date: None,
            time_zone,
        },
        extended_properties: (!private.is_empty())
            .then_some(CalendarEventExtendedProperties { private }),
    }
}

pub fn decode_event_details(event: &GoogleCalendarEvent) -> Result<EventDetails, InfraError> {
    let start = parse_event_time(&event.start, "start")?;
    let end = parse_event_time(&event.end, "end")?;
    if end <= start {
        return Err(InfraError::Provider(
            "invalid calendar event: end is not after start".to_string(),
        ));
    }

    let activity_id = event
        .extended_properties
        .as_ref()
        .and_then(|properties| properties.private.get(KEY_ACTIVITY_ID))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    Ok(EventDetails {
        title: event.summary.clone().unwrap_or_default(),
        start,
        end,
        location: event.location.clone(),
        notes: event.description.clone(),
        url: event.source.as_ref().map(|source| source.url.clone()),
        time_zone: event.start.time_zone.clone(),
        activity_id,
    })
}

fn parse_event_time(value: &CalendarEventDateTime, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    if let Some(date_time) = value.date_time.as_deref() {
        return DateTime::parse_from_rfc3339(date_time)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|error| {
                InfraError::Provider(format!(
                    "invalid calendar event {field_name}.dateTime '{date_time}': {error}"
                ))
            });
    }
    if let Some(date) = value.date.as_deref() {
        return NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| {
                InfraError::Provider(format!("invalid calendar event {field_name}.date '{date}'"))
            });
    }
    Err(InfraError::Provider(format!(
        "calendar event {field_name} has neither dateTime nor date"
    )))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_details() -> EventDetails {
        let start = DateTime::parse_from_rfc3339("2026-03-14T10:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        EventDetails {
            title: "Night market".to_string(),
            start,
            end: start + chrono::Duration::hours(2),
            location: Some("Riverside".to_string()),
            notes: Some("food".to_string()),
            url: Some("https://example.com/post/7".to_string()),
            time_zone: Some("Asia/Seoul".to_string()),
            activity_id: Some("act-7".to_string()),
        }
    }

    #[test]
    fn encoded_event_carries_activity_id_privately() {
        let encoded = encode_event_details(&sample_details());
        let private = &encoded
            .extended_properties
            .as_ref()
            .expect("extended properties")
            .private;
        assert_eq!(private.get(KEY_ACTIVITY_ID).map(String::as_str), Some("act-7"));
        assert_eq!(encoded.start.time_zone.as_deref(), Some("Asia/Seoul"));

        let json = serde_json::to_value(&encoded).expect("serialize");
        assert_eq!(json["start"]["dateTime"], "2026-03-14T10:00:00+00:00");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn decode_restores_details_written_by_encode() {
        let details = sample_details();
        let decoded = decode_event_details(&encode_event_details(&details)).expect("decode");
        assert_eq!(decoded, details);
    }

    #[test]
    fn decode_accepts_all_day_events_from_other_clients() {
        let event: GoogleCalendarEvent = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "summary": "Holiday",
            "start": { "date": "2026-03-14" },
            "end": { "date": "2026-03-15" }
        }))
        .expect("deserialize");

        let decoded = decode_event_details(&event).expect("decode");
        assert_eq!(decoded.end - decoded.start, chrono::Duration::days(1));
        assert_eq!(decoded.activity_id, None);
    }

    #[test]
    fn decode_rejects_inverted_range() {
        let mut event = encode_event_details(&sample_details());
        event.end = event.start.clone();
        assert!(matches!(
            decode_event_details(&event),
            Err(InfraError::Provider(_))
        ));
    }
}
