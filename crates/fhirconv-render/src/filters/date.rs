//! The `date` filter.
//!
//! Templates written for the conversion rules use .NET-style date formats
//! (`yyyy-MM-ddTHH:mm:ss%K`). This filter translates them to strftime,
//! resolves the input to a point in time, formats it with chrono and then
//! substitutes the tokens strftime has no directive for.
//!
//! | Token | Meaning | Produced by |
//! |-------|---------|-------------|
//! | `yyyy` `MM` `dd` | year, month, day | `%Y` `%m` `%d` |
//! | `HH` `mm` `ss` | hour, minute, second | `%H` `%M` `%S` |
//! | `ffffff` / `fff` | microseconds / milliseconds | second pass |
//! | `%K`, `zzz` | offset as `+05:00`, `Z` or nothing | second pass |
//! | `zz` | offset as `+05`, `Z` or nothing | second pass |
//!
//! The filter never fails: input it cannot make sense of is returned as is.

use std::borrow::Cow;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike};
use minijinja::value::ValueKind;
use minijinja::Value;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use fhirconv_hl7::{format_utc_offset, parse_hl7_dtm, OffsetStyle};

use super::args::{is_blank, str_arg};

static FORMAT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("y+|M+|d+|H+|m+|s+|%K").expect("format token pattern is valid"));

static FORMATTED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new("f+|z+").expect("formatted token pattern is valid"));

const FORMAT_TABLE: &[(&str, &str)] = &[
    ("yyyy", "%Y"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("%K", "zzz"),
];

const ISO_AWARE: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y%m%dT%H%M%S%.f%z",
];

const ISO_NAIVE: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y%m%dT%H%M%S%.f",
];

const LENIENT_DATETIME: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
];

const LENIENT_DATE: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

/// Translates a .NET-style date format into strftime.
///
/// Runs of `y`, `M`, `d`, `H`, `m`, `s` and the `%K` specifier are looked up
/// as a whole; runs without an entry (`yy`, `M`) are kept verbatim.
///
/// ```rust
/// use fhirconv_render::filters::date::translate_format;
///
/// assert_eq!(translate_format("yyyy-MM-ddTHH:mm:ss"), "%Y-%m-%dT%H:%M:%S");
/// assert_eq!(translate_format("yy/M"), "yy/M");
/// ```
pub fn translate_format(format: &str) -> Cow<'_, str> {
    FORMAT_TOKEN.replace_all(format, |caps: &Captures| {
        let token = &caps[0];
        FORMAT_TABLE
            .iter()
            .find(|(from, _)| *from == token)
            .map_or(token, |(_, to)| *to)
            .to_string()
    })
}

/// A point in time with an optional UTC offset.
///
/// Times parsed without an offset stay naive: offset tokens render as empty
/// and offset directives (`%z`) cannot be formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub local: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl ResolvedDate {
    fn naive(local: NaiveDateTime) -> Self {
        Self {
            local,
            offset: None,
        }
    }

    fn aware<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            local: dt.naive_local(),
            offset: Some(dt.offset().fix()),
        }
    }

    /// Formats with a strftime string, returning `None` when chrono cannot
    /// render it (unknown directive, or an offset directive on a naive time).
    pub fn strftime(&self, format: &str) -> Option<String> {
        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return None;
        }

        let mut out = String::new();
        let written = match self.offset {
            Some(offset) => {
                let dt = offset.from_local_datetime(&self.local).single()?;
                write!(out, "{}", dt.format_with_items(items.iter()))
            }
            None => write!(out, "{}", self.local.format_with_items(items.iter())),
        };
        written.ok().map(|_| out)
    }

    /// Replaces `f` and `z` runs in already formatted output.
    pub fn substitute_tokens(&self, formatted: &str) -> String {
        let micros = (self.local.nanosecond() % 1_000_000_000) / 1_000;
        FORMATTED_TOKEN
            .replace_all(formatted, |caps: &Captures| match &caps[0] {
                "ffffff" => format!("{:06}", micros),
                "fff" => format!("{:03}", micros / 1_000),
                "zzz" => format_utc_offset(self.offset, OffsetStyle::Extended),
                "zz" => format_utc_offset(self.offset, OffsetStyle::Hours),
                other => other.to_string(),
            })
            .into_owned()
    }
}

/// Resolves a template value to a point in time.
///
/// Strings go through [`parse_date_str`]; integers and floats are Unix
/// timestamps in seconds, resolved to naive local time.
pub fn resolve_date(input: &Value) -> Option<ResolvedDate> {
    if let Some(text) = input.as_str() {
        return parse_date_str(text);
    }
    if input.kind() != ValueKind::Number {
        return None;
    }
    let utc = match i64::try_from(input.clone()) {
        Ok(secs) => DateTime::from_timestamp(secs, 0)?,
        Err(_) => {
            let secs = f64::try_from(input.clone()).ok()?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            DateTime::from_timestamp(whole as i64, nanos)?
        }
    };
    Some(ResolvedDate::naive(utc.with_timezone(&Local).naive_local()))
}

/// Parses textual date input.
///
/// Tries, in order: `now`/`today` (current local time, naive), strict ISO-8601, then
/// a table of common layouts including RFC 2822 and HL7 compact timestamps.
pub fn parse_date_str(text: &str) -> Option<ResolvedDate> {
    let text = text.trim();
    match text {
        "now" | "today" => Some(ResolvedDate::naive(Local::now().naive_local())),
        _ => parse_iso8601(text).or_else(|| parse_lenient(text)),
    }
}

fn parse_iso8601(text: &str) -> Option<ResolvedDate> {
    let zulu;
    let text = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        Some(stem) => {
            zulu = format!("{}+00:00", stem);
            zulu.as_str()
        }
        None => text,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(ResolvedDate::aware(&dt));
    }
    ISO_AWARE
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
        .map(|dt| ResolvedDate::aware(&dt))
        .or_else(|| {
            ISO_NAIVE
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(ResolvedDate::naive)
        })
}

fn parse_lenient(text: &str) -> Option<ResolvedDate> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(ResolvedDate::aware(&dt));
    }
    if let Some(dt) = LENIENT_DATETIME
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(ResolvedDate::naive(dt));
    }
    if let Some(midnight) = LENIENT_DATE
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Some(ResolvedDate::naive(midnight));
    }
    parse_hl7_dtm(text).ok().map(|dtm| ResolvedDate {
        local: dtm.dt,
        offset: dtm.offset,
    })
}

/// Formats `input` with a .NET-style `format`.
///
/// Blank input, a blank format, unparseable input and formats chrono cannot
/// render all return the input unchanged.
pub fn format_date(input: &Value, format: &Value) -> Value {
    if is_blank(input) {
        return input.clone();
    }
    let format = str_arg(format, "");
    if format.is_empty() {
        return input.clone();
    }

    let Some(resolved) = resolve_date(input) else {
        debug!(input = %input, "date input not recognized, passing through");
        return input.clone();
    };
    let translated = translate_format(&format);
    match resolved.strftime(&translated) {
        Some(formatted) => Value::from(resolved.substitute_tokens(&formatted)),
        None => {
            debug!(format = %format, "date format not renderable, passing through");
            input.clone()
        }
    }
}

/// Filter entry point: `{{ value | date("yyyy-MM-dd") }}`.
pub fn date(value: Value, format: Option<Value>) -> Value {
    format_date(&value, &format.unwrap_or(Value::UNDEFINED))
}
