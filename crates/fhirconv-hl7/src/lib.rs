//! # fhirconv-hl7 - Document-side helpers for C-CDA to FHIR conversion
//!
//! This crate holds the pieces of the conversion pipeline that operate on the
//! documents themselves rather than on templates:
//!
//! - [`ccda`]: locating C-CDA sections by template identifier
//! - [`dtm`]: HL7 v2 `DTM` parsing and FHIR `dateTime` rendering
//! - [`fhir`]: post-processing of rendered FHIR JSON (empty value removal,
//!   bundle entry merging)
//!
//! Documents are plain [`serde_json::Value`] trees with insertion order
//! preserved, the same shape the XML loader produces.
//!
//! ## Quick Start
//!
//! ```rust
//! use fhirconv_hl7::{get_ccda_section, get_template_id_key};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "ClinicalDocument": {
//!         "component": {
//!             "structuredBody": {
//!                 "component": [
//!                     {"section": {"templateId": {"root": "2.16.840.1.113883.10.20.22.2.6.1"}, "title": "Allergies"}}
//!                 ]
//!             }
//!         }
//!     }
//! });
//!
//! let section = get_ccda_section(&doc, &["2.16.840.1.113883.10.20.22.2.6.1"]).unwrap();
//! assert_eq!(section["title"], "Allergies");
//! assert_eq!(get_template_id_key("2.16.840.1"), "2_16_840_1");
//! ```

pub mod ccda;
pub mod dtm;
mod error;
pub mod fhir;
pub mod value;

pub use ccda::{
    get_ccda_component3, get_ccda_section, get_component3_section_template_ids,
    get_template_id_key, is_template_id, matches_any_template_id,
};
pub use dtm::{
    format_utc_offset, hl7_to_fhir_dtm, parse_hl7_dtm, to_fhir_dtm, FhirDtmPrecision, Hl7Dtm,
    Hl7DtmPrecision, OffsetStyle,
};
pub use error::{Hl7Error, Result};
pub use fhir::{get_fhir_entry_key, parse_fhir, strip_trailing_commas};
