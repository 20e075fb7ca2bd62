//! C-CDA section filters.
//!
//! Thin template-facing wrappers over [`fhirconv_hl7::ccda`]. The document is
//! walked as a template value; only the `templateId` entries of each section
//! are converted for matching, and hits are returned as the document's own
//! values.

use std::collections::BTreeMap;

use minijinja::value::Rest;
use minijinja::{Error, ErrorKind, Value};

use fhirconv_hl7::value::as_list;
use fhirconv_hl7::{get_template_id_key, matches_any_template_id};

use super::args::{expect_mapping, flatten, is_blank, str_arg, to_list_or_empty};

fn empty_map() -> Value {
    Value::from(BTreeMap::<String, Value>::new())
}

fn attr(value: &Value, name: &str) -> Value {
    value.get_attr(name).unwrap_or_default()
}

fn has_content(section: &Value) -> bool {
    !is_blank(section) && section.len() != Some(0)
}

/// A structured-body section with its `templateId` entries in JSON form.
struct IndexedSection {
    section: Value,
    template_ids: serde_json::Value,
}

impl IndexedSection {
    fn matches<S: AsRef<str>>(&self, search_template_ids: &[S]) -> bool {
        matches_any_template_id(&as_list(&self.template_ids), search_template_ids)
    }
}

/// Indexes the sections under `ClinicalDocument.component.structuredBody`,
/// in document order.
fn index_sections(msg: &Value) -> Result<Vec<IndexedSection>, Error> {
    let components = attr(
        &attr(&attr(&attr(msg, "ClinicalDocument"), "component"), "structuredBody"),
        "component",
    );
    to_list_or_empty(&components)
        .iter()
        .map(|component| {
            let section = attr(component, "section");
            let template_ids =
                serde_json::to_value(attr(&section, "templateId")).map_err(|err| {
                    Error::new(ErrorKind::BadSerialization, "templateId is not serializable")
                        .with_source(err)
                })?;
            Ok(IndexedSection {
                section,
                template_ids,
            })
        })
        .collect()
}

fn find_section<S: AsRef<str>>(
    sections: &[IndexedSection],
    search_template_ids: &[S],
) -> Option<Value> {
    sections
        .iter()
        .find(|indexed| indexed.matches(search_template_ids))
        .map(|indexed| indexed.section.clone())
        .filter(has_content)
}

/// Returns the first section tagged with any of the identifiers, or `{}`.
///
/// Identifier arguments may be nested lists; they are flattened and searched
/// together, so the first section in document order wins.
pub fn get_ccda_section_by_template_id(
    msg: &Value,
    template_id: &Value,
    template_ids: &[Value],
) -> Result<Value, Error> {
    if is_blank(msg) {
        return Ok(empty_map());
    }
    expect_mapping(msg)?;

    let mut args = Vec::with_capacity(template_ids.len() + 1);
    args.push(template_id.clone());
    args.extend_from_slice(template_ids);
    let search: Vec<String> = flatten(&args).iter().map(|id| str_arg(id, "")).collect();

    let sections = index_sections(msg)?;
    Ok(find_section(&sections, search.as_slice()).unwrap_or_else(empty_map))
}

/// Looks up each `|`-separated identifier on its own and returns the hits
/// keyed by [`get_template_id_key`].
///
/// ```text
/// "2.16.840.1.113883.10.20.22.2.6.1|2.16.840.1.113883.10.20.22.2.1.1"
///   -> {"2_16_840_1_113883_10_20_22_2_6_1": {...}, ...}
/// ```
pub fn get_first_ccda_sections_by_template_id(
    msg: &Value,
    template_ids: &Value,
) -> Result<Value, Error> {
    if is_blank(msg) {
        return Ok(empty_map());
    }
    expect_mapping(msg)?;

    let sections = index_sections(msg)?;
    let found: BTreeMap<String, Value> = str_arg(template_ids, "")
        .split('|')
        .filter_map(|id| find_section(&sections, &[id]).map(|hit| (get_template_id_key(id), hit)))
        .collect();
    Ok(Value::from(found))
}

/// Filter entry point: `{{ msg | get_ccda_section_by_template_id("a", "b") }}`.
pub fn section_by_template_id_filter(
    msg: Value,
    template_id: Value,
    template_ids: Rest<Value>,
) -> Result<Value, Error> {
    get_ccda_section_by_template_id(&msg, &template_id, &template_ids)
}

/// Filter entry point: `{{ msg | get_first_ccda_sections_by_template_id("a|b") }}`.
pub fn first_sections_by_template_id_filter(
    msg: Value,
    template_ids: Value,
) -> Result<Value, Error> {
    get_first_ccda_sections_by_template_id(&msg, &template_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MEDS: &str = "2.16.840.1.113883.10.20.22.2.1.1";
    const RESULTS: &str = "2.16.840.1.113883.10.20.22.2.3.1";
    const PLAN: &str = "2.16.840.1.113883.10.20.22.2.10";

    fn msg() -> Value {
        Value::from_serialize(json!({
            "ClinicalDocument": {
                "component": {"structuredBody": {"component": [
                    {"section": {"templateId": {"root": MEDS}, "title": "Medications"}},
                    {"section": {"templateId": [{"root": "x"}, {"root": RESULTS}], "title": "Results"}},
                    {"section": ""},
                ]}}
            }
        }))
    }

    fn title(section: &Value) -> String {
        section.get_attr("title").unwrap().to_string()
    }

    fn len(value: &Value) -> usize {
        value.len().unwrap()
    }

    #[test]
    fn section_first_match_in_document_order() {
        let found = get_ccda_section_by_template_id(
            &msg(),
            &Value::from(RESULTS),
            &[Value::from(MEDS)],
        )
        .unwrap();
        assert_eq!(title(&found), "Medications");
    }

    #[test]
    fn section_nested_identifier_lists() {
        let ids = Value::from(vec![Value::from("nope"), Value::from(vec![Value::from(RESULTS)])]);
        let found = get_ccda_section_by_template_id(&msg(), &ids, &[]).unwrap();
        assert_eq!(title(&found), "Results");
    }

    #[test]
    fn section_miss_is_empty_map() {
        let found = get_ccda_section_by_template_id(&msg(), &Value::from(PLAN), &[]).unwrap();
        assert_eq!(found.kind(), minijinja::value::ValueKind::Map);
        assert_eq!(len(&found), 0);
    }

    #[test]
    fn section_blank_document_is_empty_map() {
        let found =
            get_ccda_section_by_template_id(&Value::UNDEFINED, &Value::from(MEDS), &[]).unwrap();
        assert_eq!(len(&found), 0);
    }

    #[test]
    fn section_rejects_non_mapping() {
        let err = get_ccda_section_by_template_id(&Value::from("doc"), &Value::from(MEDS), &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        let list = Value::from(vec![Value::from(1)]);
        assert!(get_first_ccda_sections_by_template_id(&list, &Value::from(MEDS)).is_err());
    }

    #[test]
    fn first_sections_keyed_by_identifier() {
        let ids = Value::from(format!("{}|{}|{}", MEDS, PLAN, RESULTS));
        let found = get_first_ccda_sections_by_template_id(&msg(), &ids).unwrap();
        assert_eq!(len(&found), 2);
        assert_eq!(
            title(&found.get_attr("2_16_840_1_113883_10_20_22_2_1_1").unwrap()),
            "Medications"
        );
        assert_eq!(
            title(&found.get_attr("2_16_840_1_113883_10_20_22_2_3_1").unwrap()),
            "Results"
        );
        assert!(found
            .get_attr("2_16_840_1_113883_10_20_22_2_10")
            .unwrap()
            .is_undefined());
    }

    #[test]
    fn first_sections_no_hits() {
        let found = get_first_ccda_sections_by_template_id(&msg(), &Value::from(PLAN)).unwrap();
        assert_eq!(len(&found), 0);
        let found = get_first_ccda_sections_by_template_id(&msg(), &Value::from("")).unwrap();
        assert_eq!(len(&found), 0);
    }

    #[test]
    fn hits_are_document_values() {
        let doc = msg();
        let components = attr(
            &attr(&attr(&attr(&doc, "ClinicalDocument"), "component"), "structuredBody"),
            "component",
        );
        let results = attr(&components.get_item_by_index(1).unwrap(), "section");

        let found = get_ccda_section_by_template_id(&doc, &Value::from(RESULTS), &[]).unwrap();
        assert_eq!(found, results);
        assert_eq!(found.get_attr("templateId").unwrap().len(), Some(2));
    }

    #[test]
    fn repeated_lookups_agree_and_leave_document_intact() {
        let doc = msg();
        let ids = Value::from(format!("{}|{}", MEDS, RESULTS));

        let first = get_ccda_section_by_template_id(&doc, &Value::from(RESULTS), &[]).unwrap();
        let again = get_ccda_section_by_template_id(&doc, &Value::from(RESULTS), &[]).unwrap();
        assert_eq!(first, again);

        let first = get_first_ccda_sections_by_template_id(&doc, &ids).unwrap();
        let again = get_first_ccda_sections_by_template_id(&doc, &ids).unwrap();
        assert_eq!(first, again);

        assert_eq!(doc, msg());
    }
}
