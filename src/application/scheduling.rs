use crate::application::calendar_sync::{CalendarSyncEngine, PlannedDateSync};
use crate::domain::dates::parse_date_value;
use crate::domain::day_groups::{CalendarDay, DayGroup, build_day_groups, build_month_days};
use crate::domain::models::Activity;
use crate::infrastructure::calendar_provider::CalendarProvider;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_link_repository::CalendarEventLinkRepository;
use crate::infrastructure::record_store::ActivityRecordStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedDateOutcome {
    ActivityMissing,
    Saved {
        activity: Activity,
        calendar: PlannedDateSync,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarView {
    pub groups: Vec<DayGroup>,
    pub month_days: Vec<CalendarDay>,
}

pub struct ActivityScheduler<S, P, L>
where
    S: ActivityRecordStore,
    P: CalendarProvider,
    L: CalendarEventLinkRepository,
{
    records: Arc<S>,
    calendar: Arc<CalendarSyncEngine<P, L>>,
}

impl<S, P, L> ActivityScheduler<S, P, L>
where
    S: ActivityRecordStore,
    P: CalendarProvider,
    L: CalendarEventLinkRepository,
{
    pub fn new(records: Arc<S>, calendar: Arc<CalendarSyncEngine<P, L>>) -> Self {
        Self { records, calendar }
    }

    /// Writes the planned date back to the record, then mirrors it into the
    /// calendar. A blank value clears the date. Calendar problems never fail
    /// the call; they surface as [`PlannedDateSync::Failed`].
    pub async fn set_planned_date(
        &self,
        user_id: &str,
        activity_id: &str,
        planned_date: Option<String>,
    ) -> Result<PlannedDateOutcome, InfraError> {
        let tz = self.calendar.settings().time_zone;
        let planned_date = planned_date
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if let Some(raw) = planned_date.as_deref() {
            if parse_date_value(raw, tz).is_none() {
                return Err(InfraError::InvalidInput(format!(
                    "unrecognized planned date '{raw}'"
                )));
            }
        }

        let Some(mut activity) = self.records.fetch_by_id(activity_id).await? else {
            return Ok(PlannedDateOutcome::ActivityMissing);
        };
        activity.planned_date = planned_date;
        self.records.save(&activity).await?;

        let calendar = self.calendar.sync_planned_date(user_id, &activity).await;
        info!(
            activity_id,
            planned = activity.planned_date.is_some(),
            calendar = ?calendar,
            "planned date saved"
        );
        Ok(PlannedDateOutcome::Saved { activity, calendar })
    }

    pub fn calendar_view(&self, activities: &[Activity], month_anchor: NaiveDate) -> CalendarView {
        let groups = build_day_groups(activities, self.calendar.settings().time_zone);
        let month_days = build_month_days(month_anchor, &groups);
        CalendarView { groups, month_days }
    }
}
