//! Property-based tests for the conversion filters using proptest.

use fhirconv_render::filters::date::{format_date, translate_format};
use fhirconv_render::{FilterEngine, TemplateEngine, Value};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test helpers
// ============================================================================

fn batch_engine() -> FilterEngine {
    let mut engine = FilterEngine::new();
    engine
        .add_template("outer", "{{ items | batch_render('inner', 'item') }}")
        .unwrap();
    engine
        .add_template("inner", "{% if item %}{{ item }}{% endif %}")
        .unwrap();
    engine
}

fn token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("yyyy".to_string()),
        Just("MM".to_string()),
        Just("dd".to_string()),
        Just("HH".to_string()),
        Just("mm".to_string()),
        Just("ss".to_string()),
        Just("%K".to_string()),
        Just("fff".to_string()),
        Just("zz".to_string()),
    ]
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Batch output never starts with a separator or contains two in a row.
    #[test]
    fn batch_separators_are_well_formed(
        items in prop::collection::vec(prop_oneof!["[a-z]{1,6}", Just(String::new())], 0..20),
    ) {
        let engine = batch_engine();
        let out = engine.render_named("outer", &json!({"items": items})).unwrap();

        let expected: Vec<&str> = items.iter().map(String::as_str).filter(|s| !s.is_empty()).collect();
        prop_assert!(!out.starts_with(','));
        prop_assert!(!out.contains(",,"));
        if expected.is_empty() {
            prop_assert_eq!(out, "");
        } else {
            prop_assert_eq!(out, format!("{},", expected.join(",")));
        }
    }

    /// Translation only rewrites whole runs; text without format letters is
    /// untouched.
    #[test]
    fn translation_keeps_other_characters(text in "[0-9 :/.,T-]{0,20}") {
        prop_assert_eq!(translate_format(&text), text.as_str());
    }

    /// Formatting never fails, whatever the input.
    #[test]
    fn date_never_fails(input in ".{0,30}", format in ".{0,20}") {
        let out = format_date(&Value::from(input.as_str()), &Value::from(format.as_str()));
        prop_assert!(out.as_str().is_some());
    }

    /// Composed formats over a valid timestamp produce no leftover tokens.
    #[test]
    fn composed_formats_render(
        tokens in prop::collection::vec(token_strategy(), 1..8),
        sep in "[-/:T. ]",
    ) {
        let format = tokens.join(&sep);
        let out = format_date(
            &Value::from("2014-10-01T10:30:26.123+05:30"),
            &Value::from(format.as_str()),
        )
        .to_string();
        for token in ["yyyy", "MM", "dd", "HH", "%K", "fff"] {
            prop_assert!(!out.contains(token), "{} left in {}", token, out);
        }
    }

    /// Integer timestamps resolve to naive local time, so offsets render empty.
    #[test]
    fn integer_timestamps_format(secs in 0i64..4_102_444_800) {
        let out = format_date(&Value::from(secs), &Value::from("yyyy-MM-ddTHH:mm:ss%K")).to_string();
        prop_assert_eq!(out.len(), "1970-01-01T00:00:00".len());
        prop_assert_eq!(&out[10..11], "T");
    }
}
