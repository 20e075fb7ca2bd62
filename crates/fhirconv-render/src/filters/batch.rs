//! The `batch_render` filter.
//!
//! Renders one sub-template per element of a list and joins the fragments
//! into the body of a JSON array:
//!
//! ```text
//! "entry": [ {{ sections | batch_render("Section/Result", "section") }} ]
//! ```
//!
//! A `,` is appended after each fragment that does not already end in one,
//! so empty fragments never produce doubled separators. The output keeps the
//! comma after the last fragment; `fhirconv_hl7::parse_fhir` accepts it.

use minijinja::{Error, State, Value};
use tracing::trace;

use crate::context::{RenderScope, ScopedBuffer, StateScope};

use super::args::{is_blank, str_arg, to_list_or_empty};

/// Renders `template_name` once per element of `batch`, with the element
/// bound as `arg_name`.
///
/// # Errors
///
/// Fails when the template cannot be found or any fragment fails to render.
pub fn batch_render<S: RenderScope + ?Sized>(
    scope: &S,
    batch: &Value,
    template_name: &Value,
    arg_name: &Value,
) -> Result<String, Error> {
    if is_blank(batch) {
        return Ok(String::new());
    }
    let template_name = str_arg(template_name, "");
    let template = scope.get_template(&template_name)?;
    let arg_name = str_arg(arg_name, "");

    let mut buffer = ScopedBuffer::acquire(scope);
    for (idx, item) in to_list_or_empty(batch).into_iter().enumerate() {
        trace!(template = %template_name, idx, "rendering batch fragment");
        scope.render_partial(&template, &arg_name, item, &mut buffer)?;
        if buffer.last_significant().is_some_and(|c| c != ',') {
            buffer.write(",");
        }
    }
    Ok(buffer.as_str().to_string())
}

/// Filter entry point: `{{ items | batch_render("Template", "item") }}`.
pub fn batch_render_filter(
    state: &State,
    batch: Value,
    template_name: Value,
    arg_name: Value,
) -> Result<String, Error> {
    batch_render(&StateScope::new(state), &batch, &template_name, &arg_name)
}
