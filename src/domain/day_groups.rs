use crate::domain::dates::{ResolvedDate, day_key, resolve_official, resolve_planned};
use crate::domain::models::Activity;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Planned,
    Official,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayEntry {
    pub activity: Activity,
    pub date_value: DateTime<Utc>,
    pub all_day: bool,
    pub source: DateSource,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayGroup {
    pub day_key: String,
    pub date: NaiveDate,
    pub entries: Vec<DayEntry>,
    pub has_planned: bool,
    pub has_official: bool,
}

impl DayGroup {
    fn new(date: NaiveDate) -> Self {
        Self {
            day_key: day_key(date),
            date,
            entries: Vec::new(),
            has_planned: false,
            has_official: false,
        }
    }

    fn push(&mut self, activity: &Activity, resolved: ResolvedDate, source: DateSource) {
        let duplicate = self
            .entries
            .iter()
            .any(|entry| entry.source == source && entry.activity.id == activity.id);
        if duplicate {
            return;
        }
        match source {
            DateSource::Planned => self.has_planned = true,
            DateSource::Official => self.has_official = true,
        }
        self.entries.push(DayEntry {
            activity: activity.clone(),
            date_value: resolved.at,
            all_day: resolved.all_day,
            source,
        });
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub day_key: String,
    pub day_of_month: u32,
    pub has_planned: bool,
    pub has_official: bool,
}

/// Buckets activities by local day. A planned date and an official date on
/// the same day collapse into the planned entry; the day still reports
/// `has_official`.
pub fn build_day_groups(activities: &[Activity], tz: Tz) -> Vec<DayGroup> {
    let mut groups: BTreeMap<NaiveDate, DayGroup> = BTreeMap::new();

    for activity in activities {
        let planned = resolve_planned(activity, tz);
        let official = resolve_official(activity, tz);

        if let Some(planned) = planned {
            let date = planned.local_date(tz);
            let group = groups.entry(date).or_insert_with(|| DayGroup::new(date));
            group.push(activity, planned, DateSource::Planned);
        }

        let Some(official) = official else {
            continue;
        };
        let date = official.local_date(tz);
        let group = groups.entry(date).or_insert_with(|| DayGroup::new(date));
        if planned.is_some_and(|planned| planned.local_date(tz) == date) {
            group.has_official = true;
        } else {
            group.push(activity, official, DateSource::Official);
        }
    }

    groups
        .into_values()
        .map(|mut group| {
            group.entries.sort_by(|left, right| {
                left.date_value
                    .cmp(&right.date_value)
                    .then_with(|| left.activity.id.cmp(&right.activity.id))
                    .then_with(|| left.source.cmp(&right.source))
            });
            group
        })
        .collect()
}

/// One cell per day of the anchor's month, flagged from the day groups.
pub fn build_month_days(month_anchor: NaiveDate, day_groups: &[DayGroup]) -> Vec<CalendarDay> {
    let flags: HashMap<NaiveDate, (bool, bool)> = day_groups
        .iter()
        .map(|group| (group.date, (group.has_planned, group.has_official)))
        .collect();

    let Some(first) = month_anchor.with_day(1) else {
        return Vec::new();
    };
    let last_day = last_day_of_month(first);

    (1..=last_day)
        .filter_map(|day| first.with_day(day))
        .map(|date| {
            let (has_planned, has_official) = flags.get(&date).copied().unwrap_or_default();
            CalendarDay {
                date,
                day_key: day_key(date),
                day_of_month: date.day(),
                has_planned,
                has_official,
            }
        })
        .collect()
}

fn last_day_of_month(first: NaiveDate) -> u32 {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn activity(id: &str, planned: Option<&str>, official: Option<&str>) -> Activity {
        let mut activity = Activity::new(id, format!("Activity {id}"));
        activity.planned_date = planned.map(ToOwned::to_owned);
        activity.official_date = official.map(ToOwned::to_owned);
        activity
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn coinciding_dates_emit_only_planned_entry() {
        let groups = build_day_groups(
            &[activity(
                "a1",
                Some("2026-03-14T18:00:00Z"),
                Some("2026-03-14T09:00:00Z"),
            )],
            Tz::UTC,
        );

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.day_key, "2026-03-14");
        assert_eq!(group.entries.len(), 1);
        assert_eq!(group.entries[0].source, DateSource::Planned);
        assert!(group.has_planned);
        assert!(group.has_official);
    }

    #[test]
    fn distinct_days_emit_one_entry_per_day() {
        let groups = build_day_groups(
            &[activity(
                "a1",
                Some("2026-03-20T18:00:00Z"),
                Some("2026-03-14T09:00:00Z"),
            )],
            Tz::UTC,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].day_key, "2026-03-14");
        assert_eq!(groups[0].entries[0].source, DateSource::Official);
        assert!(groups[0].has_official);
        assert!(!groups[0].has_planned);
        assert_eq!(groups[1].day_key, "2026-03-20");
        assert_eq!(groups[1].entries[0].source, DateSource::Planned);
        assert!(!groups[1].has_official);
    }

    #[test]
    fn undated_and_unparsable_activities_are_absent() {
        let groups = build_day_groups(
            &[
                activity("no-dates", None, None),
                activity("bad-official", None, Some("someday")),
                activity("good", None, Some("2026-03-14")),
            ],
            Tz::UTC,
        );

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries.len(), 1);
        assert_eq!(groups[0].entries[0].activity.id, "good");
        assert!(groups[0].entries[0].all_day);
    }

    #[test]
    fn unparsable_planned_falls_back_to_official_entry() {
        let groups = build_day_groups(
            &[activity("a1", Some("tbd"), Some("2026-03-14T09:00:00Z"))],
            Tz::UTC,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries[0].source, DateSource::Official);
        assert!(!groups[0].has_planned);
    }

    #[test]
    fn groups_and_entries_are_sorted_ascending() {
        let groups = build_day_groups(
            &[
                activity("late", Some("2026-03-14T21:00:00Z"), None),
                activity("next-day", Some("2026-03-15T08:00:00Z"), None),
                activity("early", None, Some("2026-03-14T07:00:00Z")),
                activity("earlier-month", Some("2026-02-01T12:00:00Z"), None),
            ],
            Tz::UTC,
        );

        let keys: Vec<_> = groups.iter().map(|group| group.day_key.as_str()).collect();
        assert_eq!(keys, vec!["2026-02-01", "2026-03-14", "2026-03-15"]);
        let ids: Vec<_> = groups[1]
            .entries
            .iter()
            .map(|entry| entry.activity.id.as_str())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn duplicate_records_do_not_duplicate_entries() {
        let record = activity("a1", Some("2026-03-14T18:00:00Z"), None);
        let groups = build_day_groups(&[record.clone(), record], Tz::UTC);
        assert_eq!(groups[0].entries.len(), 1);
    }

    #[test]
    fn day_boundaries_follow_configured_timezone() {
        let seoul = chrono_tz::Asia::Seoul;
        let groups = build_day_groups(
            &[activity(
                "a1",
                Some("2026-03-13T23:30:00Z"),
                Some("2026-03-14T10:00:00+09:00"),
            )],
            seoul,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].day_key, "2026-03-14");
        assert!(groups[0].has_official);
    }

    #[test]
    fn date_on_skipped_midnight_is_still_grouped() {
        let beirut = chrono_tz::Asia::Beirut;
        let groups = build_day_groups(
            &[activity("a1", Some("2026-03-29"), Some("2026-03-29T10:00:00"))],
            beirut,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].day_key, "2026-03-29");
        assert_eq!(groups[0].entries.len(), 1);
        assert!(groups[0].entries[0].all_day);
        assert!(groups[0].has_planned && groups[0].has_official);

        let days = build_month_days(date("2026-03-01"), &groups);
        assert!(days[28].has_planned);
    }

    #[test]
    fn month_days_flag_only_matching_day() {
        let groups = build_day_groups(
            &[activity("a1", Some("2026-04-15T10:00:00Z"), None)],
            Tz::UTC,
        );
        let days = build_month_days(date("2026-04-03"), &groups);

        assert_eq!(days.len(), 30);
        for (index, day) in days.iter().enumerate() {
            assert_eq!(day.day_of_month, index as u32 + 1);
            assert_eq!(day.has_planned, index == 14);
            assert!(!day.has_official);
        }
        assert_eq!(days[14].day_key, "2026-04-15");
    }

    #[test]
    fn month_days_handle_leap_february_and_december() {
        assert_eq!(build_month_days(date("2028-02-10"), &[]).len(), 29);
        assert_eq!(build_month_days(date("2026-02-10"), &[]).len(), 28);
        let december = build_month_days(date("2026-12-31"), &[]);
        assert_eq!(december.len(), 31);
        assert_eq!(december[30].day_key, "2026-12-31");
    }

    fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
        // 2024-01-01 .. 2027-01-01
        (1_704_067_200i64..1_798_761_600i64).prop_map(|seconds| {
            DateTime::from_timestamp(seconds, 0).unwrap_or_default()
        })
    }

    // Property: same-day planned and official dates produce exactly one entry
    proptest! {
        #[test]
        fn same_day_dates_produce_single_entry(
            base in timestamp_strategy(),
            offset_minutes in 0i64..(24 * 60)
        ) {
            let day_start = base.date_naive().and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or(base);
            let official = day_start + chrono::Duration::minutes(offset_minutes);
            let record = activity("a1", Some(&base.to_rfc3339()), Some(&official.to_rfc3339()));

            let groups = build_day_groups(&[record], Tz::UTC);

            prop_assert_eq!(groups.len(), 1);
            prop_assert_eq!(groups[0].entries.len(), 1);
            prop_assert_eq!(groups[0].entries[0].source, DateSource::Planned);
            prop_assert!(groups[0].has_official);
        }
    }

    // Property: planned and official dates on different days produce two entries
    proptest! {
        #[test]
        fn different_day_dates_produce_two_entries(
            base in timestamp_strategy(),
            day_offset in 1i64..400
        ) {
            let official = base + chrono::Duration::days(day_offset);
            let record = activity("a1", Some(&base.to_rfc3339()), Some(&official.to_rfc3339()));

            let groups = build_day_groups(&[record], Tz::UTC);
            let total: usize = groups.iter().map(|group| group.entries.len()).sum();

            prop_assert_eq!(groups.len(), 2);
            prop_assert_eq!(total, 2);
            prop_assert!(groups[0].date < groups[1].date);
        }
    }
}
