//! Lead records and calendar-day keying.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Activity tag carried by photovoltaic leads.
pub const ACTIVITY_PV: &str = "PV";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Offset-carrying layouts PostgREST emits besides strict RFC 3339
/// (`2024-01-01 10:00:00+00`, `2024-01-01T10:00:00.123+0200`).
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A single captured contact, as stored in the hosted leads table.
///
/// Deserialization accepts the table's native column names (`compte`,
/// `activité`, `date_collecte`, ...) as well as the English field names, so
/// rows exported straight from the backend and hand-written fixtures both
/// load. `collected_at` stays a raw string: a malformed value must not make
/// the whole payload fail, it only drops the lead from date-keyed views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(alias = "compte")]
    pub account: String,
    #[serde(alias = "activité", alias = "activite", default)]
    pub activity: String,
    #[serde(alias = "nom", default)]
    pub name: Option<String>,
    #[serde(alias = "code_postal", default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(alias = "tel", default)]
    pub phone: Option<String>,
    #[serde(alias = "date_collecte", default)]
    pub collected_at: String,
    #[serde(alias = "PARIS_Heure", default)]
    pub paris_time: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(alias = "formulaire_id", default)]
    pub form_id: Option<String>,
    /// Opaque upstream payload. Never inspected.
    #[serde(alias = "données_brutes", alias = "donnees_brutes", default)]
    pub raw_payload: Option<serde_json::Value>,
}

impl Lead {
    /// Minimal lead with only the fields the aggregations read.
    pub fn new(
        account: impl Into<String>,
        activity: impl Into<String>,
        collected_at: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            activity: activity.into(),
            name: None,
            postal_code: None,
            email: None,
            phone: None,
            collected_at: collected_at.into(),
            paris_time: None,
            source: None,
            form_id: None,
            raw_payload: None,
        }
    }

    /// Calendar day of `collected_at`, taken from the record's own local
    /// date component (no conversion to the host timezone).
    pub fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.collected_at)
    }

    /// Collection moment in UTC, for ordering leads in time. `None` when
    /// `collected_at` cannot be parsed.
    pub fn collected_instant(&self) -> Option<NaiveDateTime> {
        parse_instant(&self.collected_at)
    }

    /// `YYYY-MM-DD` key of [`Lead::day`].
    pub fn day_key(&self) -> Option<String> {
        self.day().map(format_day)
    }

    pub fn is_pv(&self) -> bool {
        self.activity == ACTIVITY_PV
    }
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// A parsed collection timestamp: the wall-clock time as written, and the
/// same moment in UTC when the value carried an offset.
struct Timestamp {
    local: NaiveDateTime,
    utc: NaiveDateTime,
}

impl Timestamp {
    fn with_offset(dt: DateTime<FixedOffset>) -> Self {
        Self {
            local: dt.naive_local(),
            utc: dt.naive_utc(),
        }
    }

    fn naive(dt: NaiveDateTime) -> Self {
        Self { local: dt, utc: dt }
    }
}

/// Accepts RFC 3339, Postgres `timestamptz` text, naive date-times and bare
/// dates. Returns `None` for anything else.
fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Timestamp::with_offset(dt));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(Timestamp::with_offset(dt));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Timestamp::naive(dt));
        }
    }

    NaiveDate::parse_from_str(raw, DAY_FORMAT)
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(Timestamp::naive)
}

/// Parse a collection timestamp down to its calendar day, as written in
/// the record.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|ts| ts.local.date())
}

/// Parse a collection timestamp to a comparable instant. Values with an
/// offset are normalized to UTC; naive values are taken as UTC.
pub fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    parse_timestamp(raw).map(|ts| ts.utc)
}

/// Day key for aggregation; malformed timestamps are reported and skipped.
pub(crate) fn day_key_or_warn(lead: &Lead) -> Option<String> {
    let key = lead.day_key();
    if key.is_none() {
        tracing::warn!(
            account = %lead.account,
            collected_at = %lead.collected_at,
            "Skipping lead with invalid collection date"
        );
    }
    key
}
