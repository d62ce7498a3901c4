//! Date values as the database sees them.
//!
//! A wire date is either a bare calendar date (`2024-01-05`) or a timestamp.
//! Both are held as offset-aware points; a point whose hour and minute are
//! zero is treated as "date only" when written back out.

use crate::error::{NotesError, Result};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    TimeZone, Timelike, Utc,
};
use serde_json::{Map, Value, json};

/// An offset-aware point in time.
pub type DatePoint = DateTime<FixedOffset>;

/// A date property value: required begin, optional end and time zone label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub begin: DatePoint,
    pub end: Option<DatePoint>,
    /// IANA label such as `Europe/Moscow`. Only emitted for timed ranges.
    pub time_zone: Option<String>,
}

/// Absolute distance between "now" and a reference point of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateDelta {
    pub magnitude: std::time::Duration,
    /// `true` when the reference point lies strictly after "now".
    pub is_future: bool,
    /// The point the delta was measured against.
    pub reference: DatePoint,
}

impl DateRange {
    pub fn new(begin: DatePoint) -> Self {
        Self {
            begin,
            end: None,
            time_zone: None,
        }
    }

    pub fn with_end(mut self, end: DatePoint) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }

    /// Returns `true` when neither bound carries a clock component.
    pub fn is_whole_day(&self) -> bool {
        is_midnight(&self.begin) && self.end.as_ref().is_none_or(is_midnight)
    }

    /// The time zone label that will actually be written.
    pub fn emitted_time_zone(&self) -> Option<String> {
        collapse_timezone(&self.begin, self.end.as_ref(), self.time_zone.as_deref())
    }

    /// Serialize to the `date` object of the wire schema.
    pub fn to_wire(&self) -> Value {
        let zone = self.emitted_time_zone();
        let with_zone = zone.is_some();
        let mut data = Map::new();
        data.insert("start".into(), json!(wire_point(&self.begin, with_zone)));
        if let Some(end) = &self.end {
            data.insert("end".into(), json!(wire_point(end, with_zone)));
        }
        if let Some(zone) = zone {
            data.insert("time_zone".into(), json!(zone));
        }
        Value::Object(data)
    }

    /// Parse the `date` object of a wire row.
    ///
    /// Values without an explicit offset are placed in `default_offset`.
    pub fn from_wire(value: &Value, default_offset: FixedOffset) -> Result<Self> {
        let start = value
            .get("start")
            .and_then(Value::as_str)
            .ok_or_else(|| NotesError::parse("date value has no start"))?;
        let begin = parse_iso(start, default_offset)?;
        let end = match value.get("end") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(parse_iso(text, default_offset)?),
            Some(other) => {
                return Err(NotesError::parse(format!("date end is not a string: {other}")));
            }
        };
        let time_zone = value
            .get("time_zone")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(Self {
            begin,
            end,
            time_zone,
        })
    }
}

fn is_midnight(point: &DatePoint) -> bool {
    point.hour() == 0 && point.minute() == 0
}

fn wire_point(point: &DatePoint, with_zone: bool) -> String {
    // With a zone label the service wants local wall time without an offset.
    if with_zone {
        point.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        stringify(point)
    }
}

/// Bare `YYYY-MM-DD` for zero-clock points, RFC 3339 otherwise.
pub fn stringify(point: &DatePoint) -> String {
    if is_midnight(point) {
        point.format("%Y-%m-%d").to_string()
    } else {
        point.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }
}

/// Parse a bare date, an RFC 3339 timestamp or a naive timestamp.
pub fn parse_iso(text: &str, default_offset: FixedOffset) -> Result<DatePoint> {
    let text = text.trim();
    if let Ok(point) = DateTime::parse_from_rfc3339(text) {
        return Ok(point);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return localize(naive, default_offset);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M") {
        return localize(naive, default_offset);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return localize(date.and_time(NaiveTime::MIN), default_offset);
    }
    Err(NotesError::parse(format!("unrecognized date value `{text}`")))
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Result<DatePoint> {
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| NotesError::parse(format!("ambiguous local time {naive}")))
}

/// Whole-day ranges never carry a time zone, whatever is configured.
pub fn collapse_timezone(
    begin: &DatePoint,
    end: Option<&DatePoint>,
    configured: Option<&str>,
) -> Option<String> {
    if is_midnight(begin) && end.is_none_or(is_midnight) {
        return None;
    }
    configured.map(str::to_owned)
}

/// Distance between `now` and the range's end (if preferred and present) or
/// begin. Both sides are compared in UTC.
pub fn difference(range: &DateRange, prefer_end: bool, now: &DatePoint) -> DateDelta {
    let reference = match (prefer_end, range.end) {
        (true, Some(end)) => end,
        _ => range.begin,
    };
    let reference_utc = reference.with_timezone(&Utc);
    let now_utc = now.with_timezone(&Utc);
    let signed = reference_utc - now_utc;
    let absolute = if signed < Duration::zero() {
        -signed
    } else {
        signed
    };
    DateDelta {
        magnitude: absolute.to_std().unwrap_or_default(),
        is_future: reference_utc > now_utc,
        reference,
    }
}

/// Short stamp shown next to a note title.
///
/// "Today" is judged in the point's own offset.
pub fn format_stamp(point: &DatePoint, now: &DatePoint) -> String {
    let today = now.with_timezone(point.offset()).date_naive();
    let is_today = point.date_naive() == today;
    match (is_today, is_midnight(point)) {
        (false, true) => point.format("%d.%m").to_string(),
        (false, false) => point.format("%d.%m %H:%M").to_string(),
        (true, false) => point.format("%H:%M").to_string(),
        (true, true) => String::new(),
    }
}

/// Local start (00:00:00) and end (23:59:59) of the day containing `now`.
pub fn day_bounds(now: &DatePoint) -> (DatePoint, DatePoint) {
    let offset = *now.offset();
    let start_naive = now.date_naive().and_time(NaiveTime::MIN);
    let start = offset
        .from_local_datetime(&start_naive)
        .single()
        .unwrap_or(*now);
    (start, start + Duration::seconds(86_399))
}

/// Current time in the given offset.
pub fn now_in(offset: FixedOffset) -> DatePoint {
    Utc::now().with_timezone(&offset)
}

/// Parse a `+03:00` / `-05:30` / `Z` style offset.
pub fn parse_offset(text: &str) -> Result<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| NotesError::Config("invalid utc offset".into()));
    }
    let (sign, rest) = match text.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(NotesError::Config(format!("invalid utc offset `{text}`"))),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours
        .parse()
        .map_err(|_| NotesError::Config(format!("invalid utc offset `{text}`")))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| NotesError::Config(format!("invalid utc offset `{text}`")))?;
    if hours > 14 || minutes > 59 {
        return Err(NotesError::Config(format!("utc offset out of range `{text}`")));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| NotesError::Config(format!("utc offset out of range `{text}`")))
}
