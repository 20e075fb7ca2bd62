//! C-CDA section lookup by template identifier.
//!
//! The sections of a C-CDA document live under
//! `ClinicalDocument/component/structuredBody/component/section`, and each
//! section is tagged with one or more `templateId` elements whose `root`
//! attribute names the section type.
//!
//! ```text
//! ClinicalDocument
//! └── component
//!     └── structuredBody
//!         └── component[]          ("component3")
//!             └── section
//!                 ├── templateId[] {"root": "2.16.840.1.113883.10.20.22.2.6.1"}
//!                 └── ...
//! ```

use serde_json::Value;

use crate::value::as_list;

/// Returns the `component` entries of the structured body, in document order.
pub fn get_ccda_component3(msg: &Value) -> Vec<&Value> {
    msg.pointer("/ClinicalDocument/component/structuredBody/component")
        .map(as_list)
        .unwrap_or_default()
}

/// Returns the `templateId` entries of a component's section.
pub fn get_component3_section_template_ids(component: &Value) -> Vec<&Value> {
    component
        .pointer("/section/templateId")
        .map(as_list)
        .unwrap_or_default()
}

/// Checks whether a `templateId` entry carries the given identifier.
///
/// Mappings are compared on their `root` attribute; bare strings are compared
/// directly. Surrounding whitespace is ignored in both cases.
pub fn is_template_id(template_id: &Value, id: &str) -> bool {
    let root = match template_id {
        Value::Object(map) => map.get("root").and_then(Value::as_str),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    };
    root.is_some_and(|root| !root.trim().is_empty() && root.trim() == id)
}

/// Checks whether any of a section's `templateId` entries carries one of the
/// search identifiers.
pub fn matches_any_template_id<S: AsRef<str>>(
    template_ids: &[&Value],
    search_template_ids: &[S],
) -> bool {
    template_ids.iter().any(|tid| {
        search_template_ids
            .iter()
            .any(|id| is_template_id(tid, id.as_ref()))
    })
}

/// Finds the first section tagged with any of the given identifiers.
///
/// Components are visited in document order; the first component whose
/// section matches any identifier wins, regardless of the identifier's
/// position in `search_template_ids`.
pub fn get_ccda_section<'a, S: AsRef<str>>(
    msg: &'a Value,
    search_template_ids: &[S],
) -> Option<&'a Value> {
    get_ccda_component3(msg).into_iter().find_map(|component| {
        let template_ids = get_component3_section_template_ids(component);
        if matches_any_template_id(&template_ids, search_template_ids) {
            component.get("section")
        } else {
            None
        }
    })
}

/// Derives the mapping key for a template identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, which keeps the key
/// usable as a template attribute name.
pub fn get_template_id_key(template_id: &str) -> String {
    template_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
