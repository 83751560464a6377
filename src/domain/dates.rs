use crate::domain::models::Activity;
use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use std::fmt;

pub const ALL_DAY_LABEL: &str = "All day";
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const OFFSET_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
// Some zones have skipped a whole calendar day.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// A raw date field resolved to an instant. `all_day` is set when the source
/// carried no time component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub at: DateTime<Utc>,
    pub all_day: bool,
}

impl ResolvedDate {
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        self.at.with_timezone(&tz).date_naive()
    }

    pub fn day_key(&self, tz: Tz) -> String {
        day_key(self.local_date(tz))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLabel {
    pub date: String,
    pub time: Option<String>,
}

impl DateLabel {
    pub fn is_all_day(&self) -> bool {
        self.time.is_none()
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time.as_deref() {
            Some(time) => write!(f, "{} · {}", self.date, time),
            None => write!(f, "{} · {}", self.date, ALL_DAY_LABEL),
        }
    }
}

/// Parses the date shapes the record store hands out. Anything else is `None`.
pub fn parse_date_value(raw: &str, tz: Tz) -> Option<ResolvedDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(ResolvedDate {
            at: parsed.with_timezone(&Utc),
            all_day: false,
        });
    }

    for format in OFFSET_DATE_TIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(ResolvedDate {
                at: parsed.with_timezone(&Utc),
                all_day: false,
            });
        }
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return localize(naive, tz).map(|at| ResolvedDate { at, all_day: false });
        }
    }

    let date = NaiveDate::parse_from_str(value, DAY_KEY_FORMAT).ok()?;
    localize(date.and_time(NaiveTime::MIN), tz).map(|at| ResolvedDate { at, all_day: true })
}

/// Local times skipped by a forward clock change resolve to the first
/// instant after the gap.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(value) | LocalResult::Ambiguous(value, _) => value,
        LocalResult::None => {
            let minute = naive.with_second(0)?.with_nanosecond(0)?;
            (1..=MAX_GAP_MINUTES)
                .filter_map(|step| minute.checked_add_signed(Duration::minutes(step)))
                .find_map(|shifted| tz.from_local_datetime(&shifted).earliest())?
        }
    };
    Some(local.with_timezone(&Utc))
}

pub fn official_date(activity: &Activity) -> Option<&str> {
    non_blank(activity.official_date.as_deref())
}

pub fn planned_date(activity: &Activity) -> Option<&str> {
    non_blank(activity.planned_date.as_deref())
}

pub fn resolve_official(activity: &Activity, tz: Tz) -> Option<ResolvedDate> {
    official_date(activity).and_then(|raw| parse_date_value(raw, tz))
}

pub fn resolve_planned(activity: &Activity, tz: Tz) -> Option<ResolvedDate> {
    planned_date(activity).and_then(|raw| parse_date_value(raw, tz))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// True when both values parse and land on the same local calendar day.
pub fn is_same_day(left: &str, right: &str, tz: Tz) -> bool {
    match (parse_date_value(left, tz), parse_date_value(right, tz)) {
        (Some(left), Some(right)) => left.local_date(tz) == right.local_date(tz),
        _ => false,
    }
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

pub fn display_label(raw: &str, tz: Tz) -> Option<DateLabel> {
    let resolved = parse_date_value(raw, tz)?;
    let local = resolved.at.with_timezone(&tz);
    Some(DateLabel {
        date: local.format("%a, %b %-d, %Y").to_string(),
        time: (!resolved.all_day).then(|| local.format("%-I:%M %p").to_string()),
    })
}
