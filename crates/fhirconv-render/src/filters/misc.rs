//! Value helpers used throughout the conversion templates.
//!
//! Each filter maps blank input to its neutral value (`""` or `[]`) before
//! doing any work.

use std::io::Write;

use base64::engine::general_purpose;
use base64::Engine;
use chrono::Utc;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use minijinja::{Error, ErrorKind, Value};
use regex::Regex;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use uuid::Uuid;

use fhirconv_hl7::{hl7_to_fhir_dtm, to_fhir_dtm, FhirDtmPrecision, Hl7DtmPrecision};

use super::args::{is_blank, opt_str_arg, str_arg, to_list_or_empty};

fn invalid(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Serializes a value as compact JSON.
pub fn to_json_string(value: Value) -> Result<String, Error> {
    if is_blank(&value) {
        return Ok(String::new());
    }
    serde_json::to_string(&value).map_err(|err| {
        Error::new(ErrorKind::BadSerialization, "value is not serializable").with_source(err)
    })
}

/// Wraps a scalar in a list; lists pass through and blank gives `[]`.
pub fn to_array(value: Value) -> Value {
    Value::from(to_list_or_empty(&value))
}

/// All non-overlapping matches of `pattern` in `data`.
///
/// Mirrors the usual find-all shape: whole matches without groups, the first
/// group with exactly one, and a list of groups otherwise.
pub fn match_all(data: Value, pattern: Option<Value>) -> Result<Value, Error> {
    if is_blank(&data) {
        return Ok(Value::from(Vec::<Value>::new()));
    }
    let pattern = opt_str_arg(pattern.as_ref(), "");
    let re = Regex::new(&pattern).map_err(invalid)?;
    let text = data.to_string();

    let group = |caps: &regex::Captures<'_>, idx: usize| {
        Value::from(caps.get(idx).map_or("", |m| m.as_str()))
    };
    let matches: Vec<Value> = re
        .captures_iter(&text)
        .map(|caps| match re.captures_len() {
            1 => group(&caps, 0),
            2 => group(&caps, 1),
            n => Value::from((1..n).map(|idx| group(&caps, idx)).collect::<Vec<_>>()),
        })
        .collect();
    Ok(Value::from(matches))
}

/// zlib-compresses the UTF-8 text and base64-encodes the result.
pub fn gzip(data: Value) -> Result<String, Error> {
    if is_blank(&data) {
        return Ok(String::new());
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(str_arg(&data, "").as_bytes())
        .map_err(invalid)?;
    let compressed = encoder.finish().map_err(invalid)?;
    Ok(general_purpose::STANDARD.encode(compressed))
}

pub fn sha1_hash(data: Value) -> String {
    if is_blank(&data) {
        return String::new();
    }
    hex(&Sha1::digest(str_arg(&data, "").as_bytes()))
}

/// Converts an HL7 `DTM` to a FHIR date (day precision at most).
pub fn add_hyphens_date(dtm: Value) -> Result<String, Error> {
    if is_blank(&dtm) {
        return Ok(String::new());
    }
    hl7_to_fhir_dtm(&str_arg(&dtm, ""), Some(Hl7DtmPrecision::Day)).map_err(invalid)
}

/// Converts an HL7 `DTM` to a FHIR `dateTime` at the source's precision.
pub fn format_as_date_time(dtm: Value) -> Result<String, Error> {
    if is_blank(&dtm) {
        return Ok(String::new());
    }
    hl7_to_fhir_dtm(&str_arg(&dtm, ""), None).map_err(invalid)
}

/// Current UTC time as a FHIR `dateTime` with milliseconds. The input is
/// ignored.
pub fn now(_value: Value) -> String {
    to_fhir_dtm(&Utc::now(), FhirDtmPrecision::Millis)
}

/// Deterministic UUID derived from the first 16 bytes of SHA-256(data).
pub fn generate_uuid(data: Value) -> String {
    if is_blank(&data) {
        return String::new();
    }
    let digest = Sha256::digest(str_arg(&data, "").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}
