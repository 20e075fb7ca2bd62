//! # fhirconv-render - Template Filters for C-CDA to FHIR Conversion
//!
//! `fhirconv-render` turns clinical documents into FHIR resources by rendering
//! MiniJinja templates. The document is bound as `msg`, a code mapping as
//! `code_mapping`, and templates emit FHIR JSON text using the filters in
//! [`filters`].
//!
//! ## Quick Start
//!
//! ```rust
//! use fhirconv_render::Converter;
//! use serde_json::json;
//!
//! let mut converter = Converter::new().with_code_mapping(json!({
//!     "gender": {"F": {"code": "female"}, "__default__": {"code": "unknown"}}
//! }));
//! converter.add_template(
//!     "patient",
//!     r#"{"resourceType": "Patient",
//!         "gender": "{{ msg.sex | get_property('gender') }}",
//!         "birthDate": "{{ msg.dob | add_hyphens_date }}"}"#,
//! ).unwrap();
//!
//! let fhir = converter
//!     .render_to_fhir("patient", &json!({"sex": "F", "dob": "19840521"}))
//!     .unwrap();
//! assert_eq!(fhir["gender"], "female");
//! assert_eq!(fhir["birthDate"], "1984-05-21");
//! ```
//!
//! ## Filters
//!
//! | Filter | Purpose |
//! |--------|---------|
//! | `date` | Format a date with a .NET-style format string |
//! | `get_property` | Resolve a code through the code mapping |
//! | `get_ccda_section_by_template_id` | First section tagged with any identifier |
//! | `get_first_ccda_sections_by_template_id` | One section per identifier, keyed |
//! | `batch_render` | Render a sub-template per element, comma separated |
//!
//! plus the helpers in [`filters::misc`].
//!
//! ## Modules
//!
//! - [`filters`]: the filters and [`FilterRegistry`]
//! - [`context`]: the [`RenderScope`] seam context-aware filters use
//! - [`template`]: [`FilterEngine`] and template directory loading
//! - [`config`]: YAML configuration for [`Converter`]

pub mod config;
pub mod context;
mod convert;
mod error;
pub mod filters;
pub mod template;

pub use config::{load_code_mapping, ConverterConfig};
pub use context::{RenderBuffer, RenderScope, ScopedBuffer, StateScope};
pub use convert::Converter;
pub use error::RenderError;
pub use filters::{all_filters, register_filters, FilterRegistry};
pub use template::{FilterEngine, TemplateEngine};

// Re-export minijinja types that appear in the public API
pub use minijinja::{Environment, Error, State, Value};
