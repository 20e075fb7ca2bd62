//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait the [`Converter`] renders
//! through. The default implementation is [`FilterEngine`], a MiniJinja
//! environment with the conversion filters installed, HTML auto-escaping
//! turned off (templates produce JSON, not markup) and chainable undefined
//! values, so a path into a missing part of the document renders empty.
//!
//! [`Converter`]: crate::Converter

use std::path::PathBuf;

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};

use crate::error::RenderError;
use crate::filters::{all_filters, FilterRegistry, NamedFilter};

use super::loader::DirLoader;

/// A template engine that can render templates with data.
pub trait TemplateEngine: Send + Sync {
    /// Renders a template string with the given data.
    fn render_template(&self, template: &str, data: &serde_json::Value) -> Result<String, RenderError>;

    /// Adds a named template to the engine.
    fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError>;

    /// Renders a named template, either added inline or found by the loader.
    fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError>;

    /// Checks if a template with the given name exists.
    fn has_template(&self, name: &str) -> bool;
}

/// MiniJinja engine with the conversion filters registered.
///
/// # Example
///
/// ```rust
/// use fhirconv_render::template::{FilterEngine, TemplateEngine};
/// use serde_json::json;
///
/// let engine = FilterEngine::new();
/// let output = engine
///     .render_template("{{ stamp | format_as_date_time }}", &json!({"stamp": "20240210063557"}))
///     .unwrap();
/// assert_eq!(output, "2024-02-10T06:35:57");
/// ```
pub struct FilterEngine {
    env: Environment<'static>,
    filters: FilterRegistry,
}

impl FilterEngine {
    /// Creates an engine with the conversion filters and no template loader.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> FilterEngineBuilder {
        FilterEngineBuilder::default()
    }

    /// Names of the filters installed through the registry.
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Returns a reference to the underlying MiniJinja environment.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Returns a mutable reference to the underlying MiniJinja environment.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for FilterEngine {
    fn render_template(&self, template: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        let value = Value::from_serialize(data);
        Ok(self.env.render_str(template, value)?)
    }

    fn add_template(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())?;
        Ok(())
    }

    fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        let tmpl = self.env.get_template(name)?;
        let value = Value::from_serialize(data);
        Ok(tmpl.render(value)?)
    }

    fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }
}

/// Builder for [`FilterEngine`].
///
/// Extra filters are installed before the conversion filters, so with
/// `replace_filters(false)` (the default) an extra filter keeps its name even
/// when it collides with a built-in one.
#[derive(Default)]
pub struct FilterEngineBuilder {
    template_dirs: Vec<PathBuf>,
    extra_filters: Vec<NamedFilter>,
    replace_filters: bool,
}

impl FilterEngineBuilder {
    /// Adds a directory to search for templates. Earlier directories win.
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dirs.push(dir.into());
        self
    }

    pub fn template_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.template_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Registers an additional filter.
    pub fn filter(mut self, name: &'static str, filter: Value) -> Self {
        self.extra_filters.push((name, filter));
        self
    }

    /// Whether the conversion filters overwrite same-named extra filters.
    pub fn replace_filters(mut self, replace: bool) -> Self {
        self.replace_filters = replace;
        self
    }

    pub fn build(self) -> FilterEngine {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        if !self.template_dirs.is_empty() {
            let loader = DirLoader::new(self.template_dirs);
            env.set_loader(move |name| loader.load(name));
        }

        let mut filters = FilterRegistry::new();
        filters.register(&mut env, self.extra_filters, false);
        filters.register(&mut env, all_filters(), self.replace_filters);

        FilterEngine { env, filters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn renders_inline_template() {
        let engine = FilterEngine::new();
        let output = engine
            .render_template("{{ name | sha1_hash }}", &json!({"name": "abc"}))
            .unwrap();
        assert_eq!(output, "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn no_html_escaping() {
        let mut engine = FilterEngine::new();
        engine.add_template("t.html", "{{ v }}").unwrap();
        let output = engine.render_named("t.html", &json!({"v": "<a & \"b\">"})).unwrap();
        assert_eq!(output, "<a & \"b\">");
    }

    #[test]
    fn named_templates_and_errors() {
        let mut engine = FilterEngine::new();
        engine.add_template("greeting", "Hello, {{ name }}!").unwrap();
        assert!(engine.has_template("greeting"));
        assert!(!engine.has_template("missing"));
        assert_eq!(
            engine.render_named("greeting", &json!({"name": "FHIR"})).unwrap(),
            "Hello, FHIR!"
        );
        assert!(matches!(
            engine.render_named("missing", &json!({})),
            Err(RenderError::TemplateNotFound(_))
        ));
        assert!(matches!(
            engine.add_template("bad", "{{ unclosed"),
            Err(RenderError::TemplateError(_))
        ));
    }

    #[test]
    fn missing_paths_render_empty() {
        let engine = FilterEngine::new();
        let output = engine
            .render_template("[{{ msg.a.b.c }}]", &json!({"msg": {}}))
            .unwrap();
        assert_eq!(output, "[]");
    }

    #[test]
    fn loads_from_template_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ccd.j2"), "{% include 'header' %}-{{ x }}").unwrap();
        fs::write(tmp.path().join("header.j2"), "H").unwrap();

        let engine = FilterEngine::builder().template_dir(tmp.path()).build();
        assert!(engine.has_template("ccd"));
        assert_eq!(engine.render_named("ccd", &json!({"x": 1})).unwrap(), "H-1");
    }

    #[test]
    fn extra_filters_win_unless_replaced() {
        let custom = || Value::from_function(|_: minijinja::Value| "custom".to_string());

        let kept = FilterEngine::builder().filter("now", custom()).build();
        assert_eq!(kept.render_template("{{ '' | now }}", &json!({})).unwrap(), "custom");

        let replaced = FilterEngine::builder()
            .filter("now", custom())
            .replace_filters(true)
            .build();
        let stamp = replaced.render_template("{{ '' | now }}", &json!({})).unwrap();
        assert!(stamp.ends_with('Z'));
        assert!(replaced.filters().contains("now"));
    }
}
