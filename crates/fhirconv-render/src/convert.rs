//! Document-to-FHIR conversion.
//!
//! A [`Converter`] renders a named template with the document bound as `msg`
//! and the code mapping bound as `code_mapping`, then parses the output into
//! FHIR JSON. Extra template globals (flags such as `render_narrative`) are
//! bound alongside them and stay visible inside batch-rendered fragments.

use serde_json::{Map, Value};
use tracing::debug;

use fhirconv_hl7::parse_fhir;

use crate::config::ConverterConfig;
use crate::context::{CODE_MAPPING_VAR, DOCUMENT_VAR};
use crate::error::RenderError;
use crate::template::{FilterEngine, TemplateEngine};

pub struct Converter {
    engine: Box<dyn TemplateEngine>,
    code_mapping: Value,
    globals: Map<String, Value>,
}

impl Converter {
    /// Creates a converter with inline templates only and no code mapping.
    pub fn new() -> Self {
        Self::with_engine(Box::new(FilterEngine::new()))
    }

    pub fn with_engine(engine: Box<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            code_mapping: Value::Object(Default::default()),
            globals: Map::new(),
        }
    }

    /// Builds a converter from configuration, loading the code mapping.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, RenderError> {
        let engine = FilterEngine::builder()
            .template_dirs(config.template_dirs.iter().cloned())
            .replace_filters(config.replace_filters)
            .build();
        Ok(Self::with_engine(Box::new(engine))
            .with_code_mapping(config.load_code_mapping()?)
            .with_globals(config.template_globals.clone()))
    }

    pub fn with_code_mapping(mut self, code_mapping: Value) -> Self {
        self.code_mapping = code_mapping;
        self
    }

    pub fn code_mapping(&self) -> &Value {
        &self.code_mapping
    }

    /// Adds template globals. `msg` and `code_mapping` cannot be overridden.
    pub fn with_globals(mut self, globals: Map<String, Value>) -> Self {
        self.globals.extend(globals);
        self
    }

    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    pub fn globals(&self) -> &Map<String, Value> {
        &self.globals
    }

    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.engine.add_template(name, source)
    }

    /// Renders `template` against `document`, returning the raw output.
    pub fn render_fhir_string(&self, template: &str, document: &Value) -> Result<String, RenderError> {
        debug!(template, "rendering document");
        let mut ctx = self.globals.clone();
        ctx.insert(DOCUMENT_VAR.to_string(), document.clone());
        ctx.insert(CODE_MAPPING_VAR.to_string(), self.code_mapping.clone());
        let rendered = self.engine.render_named(template, &Value::Object(ctx))?;
        debug!(template, bytes = rendered.len(), "rendered document");
        Ok(rendered)
    }

    /// Renders `template` against `document` and parses the result as FHIR.
    ///
    /// # Errors
    ///
    /// Besides render failures, returns [`RenderError::SerializationError`]
    /// when the output is not valid JSON.
    pub fn render_to_fhir(&self, template: &str, document: &Value) -> Result<Value, RenderError> {
        let rendered = self.render_fhir_string(template, document)?;
        Ok(parse_fhir(&rendered)?)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binds_document_and_code_mapping() {
        let mut converter = Converter::new()
            .with_code_mapping(json!({"gender": {"F": {"code": "female"}}}));
        converter
            .add_template(
                "patient",
                r#"{"resourceType": "Patient", "id": "{{ msg.id }}", "gender": "{{ msg.sex | get_property('gender') }}"}"#,
            )
            .unwrap();

        let fhir = converter
            .render_to_fhir("patient", &json!({"id": "p1", "sex": "F"}))
            .unwrap();
        assert_eq!(fhir, json!({"resourceType": "Patient", "id": "p1", "gender": "female"}));
    }

    #[test]
    fn empty_values_are_removed() {
        let mut converter = Converter::new();
        converter
            .add_template("t", r#"{"a": "{{ msg.missing }}", "b": [{{ msg.items | batch_render('i', 'x') }}]}"#)
            .unwrap();
        converter.add_template("i", "{{ x }}").unwrap();
        assert_eq!(converter.render_to_fhir("t", &json!({})).unwrap(), json!({}));
    }

    #[test]
    fn invalid_output_is_serialization_error() {
        let mut converter = Converter::new();
        converter.add_template("t", "not json").unwrap();
        let err = converter.render_to_fhir("t", &json!({})).unwrap_err();
        assert!(matches!(err, RenderError::SerializationError(_)));
        assert!(err.to_string().contains("failed to render FHIR"));
    }

    #[test]
    fn globals_reach_batch_fragments() {
        let mut converter = Converter::new().with_global("render_narrative", true);
        converter
            .add_template("t", r#"{"entry": [{{ msg.items | batch_render('i', 'x') }}]}"#)
            .unwrap();
        converter
            .add_template("i", r#"{"v": "{{ x }}"{% if render_narrative %}, "text": "n"{% endif %}}"#)
            .unwrap();

        let fhir = converter.render_to_fhir("t", &json!({"items": ["a"]})).unwrap();
        assert_eq!(fhir, json!({"entry": [{"v": "a", "text": "n"}]}));
    }

    #[test]
    fn globals_do_not_shadow_document() {
        let mut converter = Converter::new().with_globals(
            json!({"msg": "shadow", "flag": "on"}).as_object().unwrap().clone(),
        );
        converter.add_template("t", r#"{"a": "{{ msg.a }}", "f": "{{ flag }}"}"#).unwrap();
        assert_eq!(
            converter.render_to_fhir("t", &json!({"a": "doc"})).unwrap(),
            json!({"a": "doc", "f": "on"})
        );
    }

    #[test]
    fn missing_template() {
        let converter = Converter::new();
        assert!(matches!(
            converter.render_fhir_string("nope", &json!({})),
            Err(RenderError::TemplateNotFound(_))
        ));
    }
}
