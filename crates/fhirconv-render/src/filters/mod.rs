//! Template filters for C-CDA to FHIR conversion.
//!
//! | Filter | Module |
//! |--------|--------|
//! | `date` | [`date`] |
//! | `get_property` | [`code`] |
//! | `get_ccda_section_by_template_id`, `get_first_ccda_sections_by_template_id` | [`section`] |
//! | `batch_render` | [`batch`] |
//! | `to_json_string`, `to_array`, `match`, `gzip`, `sha1_hash`, `add_hyphens_date`, `format_as_date_time`, `now`, `generate_uuid` | [`misc`] |
//!
//! [`all_filters`] returns them all as named callables, and
//! [`FilterRegistry`] installs them into a [`minijinja::Environment`]:
//!
//! ```rust
//! use fhirconv_render::filters::{all_filters, FilterRegistry};
//! use minijinja::Environment;
//!
//! let mut env = Environment::new();
//! let mut registry = FilterRegistry::new();
//! registry.register(&mut env, all_filters(), false);
//!
//! let tmpl = env.template_from_str("{{ '20240210' | add_hyphens_date }}").unwrap();
//! assert_eq!(tmpl.render(()).unwrap(), "2024-02-10");
//! ```

use std::collections::BTreeSet;

use minijinja::value::Rest;
use minijinja::{Environment, State, Value};
use tracing::debug;

pub mod args;
pub mod batch;
pub mod code;
pub mod date;
pub mod misc;
pub mod section;

pub use batch::batch_render;
pub use code::get_property;
pub use date::format_date;
pub use section::{get_ccda_section_by_template_id, get_first_ccda_sections_by_template_id};

/// A filter name paired with its callable.
pub type NamedFilter = (&'static str, Value);

/// Every conversion filter, keyed by the name templates use.
pub fn all_filters() -> Vec<NamedFilter> {
    vec![
        ("date", Value::from_function(date::date)),
        ("get_property", Value::from_function(code::get_property_filter)),
        (
            "get_ccda_section_by_template_id",
            Value::from_function(section::section_by_template_id_filter),
        ),
        (
            "get_first_ccda_sections_by_template_id",
            Value::from_function(section::first_sections_by_template_id_filter),
        ),
        ("batch_render", Value::from_function(batch::batch_render_filter)),
        ("to_json_string", Value::from_function(misc::to_json_string)),
        ("to_array", Value::from_function(misc::to_array)),
        ("match", Value::from_function(misc::match_all)),
        ("gzip", Value::from_function(misc::gzip)),
        ("sha1_hash", Value::from_function(misc::sha1_hash)),
        ("add_hyphens_date", Value::from_function(misc::add_hyphens_date)),
        ("format_as_date_time", Value::from_function(misc::format_as_date_time)),
        ("now", Value::from_function(misc::now)),
        ("generate_uuid", Value::from_function(misc::generate_uuid)),
    ]
}

/// Tracks which filters have been installed into an environment.
///
/// MiniJinja offers no way to ask an environment whether a filter exists, so
/// the registry keeps the names it has installed. Registering a name that is
/// already present is skipped unless `replace` is set.
#[derive(Debug, Default, Clone)]
pub struct FilterRegistry {
    names: BTreeSet<String>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Installed filter names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Installs `filters` into `env`.
    ///
    /// Names the registry already holds are left untouched unless `replace`
    /// is true, in which case they are overwritten.
    pub fn register<I, N>(&mut self, env: &mut Environment<'static>, filters: I, replace: bool)
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        for (name, func) in filters {
            let name = name.into();
            if !replace && self.names.contains(&name) {
                debug!(filter = %name, "filter already registered, skipping");
                continue;
            }
            env.add_filter(name.clone(), move |state: &State, args: Rest<Value>| {
                func.call(state, &args)
            });
            self.names.insert(name);
        }
    }
}

/// Installs every conversion filter into a fresh registry for `env`.
pub fn register_filters(env: &mut Environment<'static>, replace: bool) -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    registry.register(env, all_filters(), replace);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(env: &Environment<'_>, source: &str) -> String {
        env.render_str(source, ()).unwrap()
    }

    #[test]
    fn all_filters_are_unique() {
        let filters = all_filters();
        let names: BTreeSet<_> = filters.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), filters.len());
        assert!(names.contains("batch_render"));
        assert!(names.contains("get_property"));
    }

    #[test]
    fn register_installs_filters() {
        let mut env = Environment::new();
        let registry = register_filters(&mut env, false);
        assert!(registry.contains("date"));
        assert_eq!(registry.names().count(), all_filters().len());
        assert_eq!(render(&env, "{{ 'abc' | sha1_hash }}"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn existing_names_are_kept() {
        let mut env = Environment::new();
        let mut registry = FilterRegistry::new();
        registry.register(&mut env, [("shout", Value::from_function(|s: String| s.to_uppercase()))], false);
        registry.register(&mut env, [("shout", Value::from_function(|s: String| format!("{}!", s)))], false);
        assert_eq!(render(&env, "{{ 'hi' | shout }}"), "HI");
    }

    #[test]
    fn replace_overwrites() {
        let mut env = Environment::new();
        let mut registry = FilterRegistry::new();
        registry.register(&mut env, [("shout", Value::from_function(|s: String| s.to_uppercase()))], false);
        registry.register(&mut env, [("shout", Value::from_function(|s: String| format!("{}!", s)))], true);
        assert_eq!(render(&env, "{{ 'hi' | shout }}"), "hi!");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["shout"]);
    }

    #[test]
    fn optional_arguments_pass_through() {
        let mut env = Environment::new();
        register_filters(&mut env, false);
        assert_eq!(render(&env, "{{ '2024-02-10' | date('dd/MM/yyyy') }}"), "10/02/2024");
        assert_eq!(render(&env, "{{ '2024-02-10' | date }}"), "2024-02-10");
    }
}
