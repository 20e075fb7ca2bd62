//! HL7 v2 `DTM` parsing and FHIR `dateTime` rendering.
//!
//! An HL7 `DTM` is a compact timestamp whose length carries its precision:
//!
//! ```text
//! YYYY[MM[DD[HH[MM[SS[.S[S[S[S]]]]]]]]][+/-ZZZZ]
//! ```
//!
//! FHIR renders the same instant in ISO-8601 extended form, keeping only the
//! components the source actually had. Time-bearing values always carry
//! minutes and seconds, and a zero offset is written as `Z`.
//!
//! | HL7 | FHIR |
//! |-----|------|
//! | `2024` | `2024` |
//! | `202402` | `2024-02` |
//! | `20240210` | `2024-02-10` |
//! | `2024021006+0400` | `2024-02-10T06:00:00+04:00` |
//! | `20240210063557.920+0000` | `2024-02-10T06:35:57.920Z` |

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Hl7Error, Result};

static DTM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4})(?:([0-9]{2})(?:([0-9]{2})(?:([0-9]{2})(?:([0-9]{2})(?:([0-9]{2})(?:\.([0-9]+))?)?)?)?)?)?(?:([+-])([0-9]{2})([0-9]{2}))?$",
    )
    .expect("dtm pattern is valid")
});

/// Precision of an HL7 v2 `DTM`, ordered from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hl7DtmPrecision {
    Year,
    Month,
    Day,
    Hour,
    Min,
    Sec,
    Millis,
}

impl Hl7DtmPrecision {
    /// Infers the precision of a `DTM` from its shape.
    ///
    /// Any trailing offset is ignored. Returns `None` when the body holds
    /// anything but ASCII digits and `.`, or when the digit count does not
    /// correspond to a complete component.
    pub fn from_dtm(dtm: &str) -> Option<Self> {
        let dtm = dtm.trim();
        let body = match dtm.get(4..).and_then(|rest| rest.find(|c: char| c == '+' || c == '-')) {
            Some(pos) => &dtm[..pos + 4],
            None => dtm,
        };
        if !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return None;
        }
        if body.contains('.') {
            return Some(Self::Millis);
        }
        match body.len() {
            4 => Some(Self::Year),
            6 => Some(Self::Month),
            8 => Some(Self::Day),
            10 => Some(Self::Hour),
            12 => Some(Self::Min),
            14 => Some(Self::Sec),
            _ => None,
        }
    }

    /// The FHIR precision used when rendering a value of this precision.
    pub fn fhir_precision(self) -> FhirDtmPrecision {
        match self {
            Self::Year => FhirDtmPrecision::Year,
            Self::Month => FhirDtmPrecision::Month,
            Self::Day => FhirDtmPrecision::Day,
            Self::Hour => FhirDtmPrecision::Hour,
            Self::Min => FhirDtmPrecision::Min,
            Self::Sec => FhirDtmPrecision::Sec,
            Self::Millis => FhirDtmPrecision::Millis,
        }
    }
}

/// Precision of a rendered FHIR `dateTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FhirDtmPrecision {
    Year,
    Month,
    Day,
    Hour,
    Min,
    Sec,
    Millis,
}

/// How a UTC offset is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetStyle {
    /// `+05:30`
    Extended,
    /// `+05`
    Hours,
}

/// Formats an optional UTC offset.
///
/// A missing offset (local time) renders as `""` and a zero offset as `"Z"`.
pub fn format_utc_offset(offset: Option<FixedOffset>, style: OffsetStyle) -> String {
    let Some(offset) = offset else {
        return String::new();
    };
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "Z".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    match style {
        OffsetStyle::Extended => format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60),
        OffsetStyle::Hours => format!("{}{:02}", sign, minutes / 60),
    }
}

/// A parsed HL7 `DTM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hl7Dtm {
    /// Wall-clock time as written in the source.
    pub dt: NaiveDateTime,
    /// Offset from UTC, if the source carried one.
    pub offset: Option<FixedOffset>,
    /// Precision of the source value.
    pub precision: Hl7DtmPrecision,
}

impl Hl7Dtm {
    /// Renders the value as a FHIR `dateTime`, never finer than `precision`.
    pub fn to_fhir(&self, precision: Option<Hl7DtmPrecision>) -> String {
        let precision = precision.map_or(self.precision, |p| p.min(self.precision));
        format_fhir_dtm(&self.dt, self.offset, precision.fhir_precision())
    }
}

/// Parses an HL7 v2 `DTM`.
///
/// Surrounding whitespace is ignored. Fractional seconds of any length are
/// accepted and right-padded (or truncated) to microseconds.
///
/// # Errors
///
/// Returns [`Hl7Error::InvalidDtm`] for empty input, partial components
/// (`"20041"`), a dangling `.`, or out-of-range calendar values.
pub fn parse_hl7_dtm(dtm: &str) -> Result<Hl7Dtm> {
    let trimmed = dtm.trim();
    let invalid = || Hl7Error::InvalidDtm(dtm.to_string());
    let caps = DTM_PATTERN.captures(trimmed).ok_or_else(invalid)?;

    let num = |idx: usize, default: u32| -> u32 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(default)
    };
    let year = caps[1].parse::<i32>().map_err(|_| invalid())?;
    let micros = caps.get(7).map_or(0, |m| fraction_to_micros(m.as_str()));

    let dt = NaiveDate::from_ymd_opt(year, num(2, 1), num(3, 1))
        .and_then(|d| d.and_hms_micro_opt(num(4, 0), num(5, 0), num(6, 0), micros))
        .ok_or_else(invalid)?;

    let offset = match caps.get(8) {
        Some(sign) => {
            let seconds = (num(9, 0) * 3600 + num(10, 0) * 60) as i32;
            let seconds = if sign.as_str() == "-" { -seconds } else { seconds };
            Some(FixedOffset::east_opt(seconds).ok_or_else(invalid)?)
        }
        None => None,
    };

    let precision = Hl7DtmPrecision::from_dtm(trimmed).ok_or_else(invalid)?;

    Ok(Hl7Dtm {
        dt,
        offset,
        precision,
    })
}

fn fraction_to_micros(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(6).collect();
    while padded.len() < 6 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

/// Converts an HL7 `DTM` to a FHIR `dateTime`.
///
/// When `precision` is given, the output is limited to it; a source coarser
/// than the requested precision keeps its own precision.
///
/// ```rust
/// use fhirconv_hl7::{hl7_to_fhir_dtm, Hl7DtmPrecision};
///
/// assert_eq!(hl7_to_fhir_dtm("202402", None).unwrap(), "2024-02");
/// assert_eq!(
///     hl7_to_fhir_dtm("20240210063557.920-0100", Some(Hl7DtmPrecision::Day)).unwrap(),
///     "2024-02-10"
/// );
/// ```
pub fn hl7_to_fhir_dtm(dtm: &str, precision: Option<Hl7DtmPrecision>) -> Result<String> {
    Ok(parse_hl7_dtm(dtm)?.to_fhir(precision))
}

/// Renders a chrono timestamp as a FHIR `dateTime` at the given precision.
pub fn to_fhir_dtm<Tz: TimeZone>(dt: &DateTime<Tz>, precision: FhirDtmPrecision) -> String {
    format_fhir_dtm(&dt.naive_local(), Some(dt.offset().fix()), precision)
}

fn format_fhir_dtm(
    dt: &NaiveDateTime,
    offset: Option<FixedOffset>,
    precision: FhirDtmPrecision,
) -> String {
    match precision {
        FhirDtmPrecision::Year => dt.format("%Y").to_string(),
        FhirDtmPrecision::Month => dt.format("%Y-%m").to_string(),
        FhirDtmPrecision::Day => dt.format("%Y-%m-%d").to_string(),
        _ => {
            let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
            if precision == FhirDtmPrecision::Millis {
                let millis = (dt.nanosecond() % 1_000_000_000) / 1_000_000;
                let _ = write!(out, ".{:03}", millis);
            }
            out.push_str(&format_utc_offset(offset, OffsetStyle::Extended));
            out
        }
    }
}
