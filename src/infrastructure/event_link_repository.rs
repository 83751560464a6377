use crate::domain::models::{CalendarEventLink, CalendarEventLinkKey};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistence for activity-to-calendar-event links. At most one link per
/// key; `upsert` overwrites.
pub trait CalendarEventLinkRepository: Send + Sync {
    fn get(&self, key: &CalendarEventLinkKey) -> Result<Option<CalendarEventLink>, InfraError>;
    fn upsert(&self, link: &CalendarEventLink) -> Result<(), InfraError>;
    fn remove(&self, key: &CalendarEventLinkKey) -> Result<bool, InfraError>;
    fn list_for_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<Vec<CalendarEventLink>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteCalendarEventLinkRepository {
    db_path: PathBuf,
}

impl SqliteCalendarEventLinkRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn row_to_link(
        (user_id, activity_id, activity_date_id, calendar_event_id, planned_at_raw, is_favorite): (
            String,
            String,
            String,
            String,
            String,
            bool,
        ),
    ) -> Result<CalendarEventLink, InfraError> {
        let planned_at = DateTime::parse_from_rfc3339(&planned_at_raw).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid calendar_event_links.planned_at '{planned_at_raw}': {error}"
            ))
        })?;
        Ok(CalendarEventLink {
            user_id,
            activity_id,
            activity_date_id: (!activity_date_id.is_empty()).then_some(activity_date_id),
            calendar_event_id,
            planned_at: planned_at.with_timezone(&Utc),
            is_favorite,
        })
    }
}

// SQLite treats NULLs as distinct in a primary key, so "no date" is stored as ''.
fn date_id_column(activity_date_id: Option<&str>) -> &str {
    activity_date_id.unwrap_or("")
}

impl CalendarEventLinkRepository for SqliteCalendarEventLinkRepository {
    fn get(&self, key: &CalendarEventLinkKey) -> Result<Option<CalendarEventLink>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "SELECT user_id, activity_id, activity_date_id, calendar_event_id, planned_at, is_favorite
                 FROM calendar_event_links
                 WHERE user_id = ?1 AND activity_id = ?2 AND activity_date_id = ?3",
                params![
                    key.user_id,
                    key.activity_id,
                    date_id_column(key.activity_date_id.as_deref())
                ],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(Self::row_to_link).transpose()
    }

    fn upsert(&self, link: &CalendarEventLink) -> Result<(), InfraError> {
        link.validate().map_err(InfraError::InvalidInput)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO calendar_event_links
               (user_id, activity_id, activity_date_id, calendar_event_id, planned_at, is_favorite, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, activity_id, activity_date_id) DO UPDATE SET
               calendar_event_id = excluded.calendar_event_id,
               planned_at = excluded.planned_at,
               is_favorite = excluded.is_favorite,
               updated_at = excluded.updated_at",
            params![
                link.user_id,
                link.activity_id,
                date_id_column(link.activity_date_id.as_deref()),
                link.calendar_event_id,
                link.planned_at.to_rfc3339(),
                link.is_favorite,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn remove(&self, key: &CalendarEventLinkKey) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute(
            "DELETE FROM calendar_event_links
             WHERE user_id = ?1 AND activity_id = ?2 AND activity_date_id = ?3",
            params![
                key.user_id,
                key.activity_id,
                date_id_column(key.activity_date_id.as_deref())
            ],
        )?;
        Ok(removed > 0)
    }

    fn list_for_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<Vec<CalendarEventLink>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT user_id, activity_id, activity_date_id, calendar_event_id, planned_at, is_favorite
             FROM calendar_event_links
             WHERE user_id = ?1 AND activity_id = ?2
             ORDER BY planned_at ASC",
        )?;
        let rows = statement.query_map(params![user_id, activity_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;

        let mut links = Vec::new();
        for row in rows {
            links.push(Self::row_to_link(row?)?);
        }
        Ok(links)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCalendarEventLinkRepository {
    links: Mutex<HashMap<CalendarEventLinkKey, CalendarEventLink>>,
}

impl InMemoryCalendarEventLinkRepository {
    pub fn len(&self) -> Result<usize, InfraError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, InfraError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<CalendarEventLinkKey, CalendarEventLink>>, InfraError>
    {
        self.links
            .lock()
            .map_err(|error| InfraError::lock_poisoned("calendar event links", error))
    }
}

impl CalendarEventLinkRepository for InMemoryCalendarEventLinkRepository {
    fn get(&self, key: &CalendarEventLinkKey) -> Result<Option<CalendarEventLink>, InfraError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn upsert(&self, link: &CalendarEventLink) -> Result<(), InfraError> {
        link.validate().map_err(InfraError::InvalidInput)?;
        self.lock()?.insert(link.key(), link.clone());
        Ok(())
    }

    fn remove(&self, key: &CalendarEventLinkKey) -> Result<bool, InfraError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    fn list_for_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<Vec<CalendarEventLink>, InfraError> {
        let mut links = self
            .lock()?
            .values()
            .filter(|link| link.user_id == user_id && link.activity_id == activity_id)
            .cloned()
            .collect::<Vec<_>>();
        links.sort_by(|left, right| left.planned_at.cmp(&right.planned_at));
        Ok(links)
    }
}
