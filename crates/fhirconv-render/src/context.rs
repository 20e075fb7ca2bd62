//! Render-context access for context-aware filters.
//!
//! Most filters are plain value transformations, but two of them need the
//! ambient state of the render that invoked them:
//!
//! - `get_property` reads the code mapping bound under [`CODE_MAPPING_VAR`]
//! - `batch_render` looks up a sub-template and renders it once per element
//!   into a shared output buffer
//!
//! Rather than reaching into the engine directly, those filters are written
//! against the [`RenderScope`] trait. [`StateScope`] implements it over the
//! live [`minijinja::State`]; tests can implement it over plain maps.
//!
//! # Example
//!
//! ```rust,ignore
//! use fhirconv_render::context::{RenderScope, StateScope};
//!
//! fn lookup_mapping(state: &minijinja::State) -> Option<minijinja::Value> {
//!     StateScope::new(state).resolve("code_mapping")
//! }
//! ```

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use minijinja::{Error, State, Template, Value};

/// Variable holding the source document in the root render context.
pub const DOCUMENT_VAR: &str = "msg";

/// Variable holding the code mapping in the root render context.
pub const CODE_MAPPING_VAR: &str = "code_mapping";

/// Append-only output sink used while rendering fragments.
///
/// Content is never rewritten; callers may only append and inspect what has
/// been written so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderBuffer {
    content: String,
}

impl RenderBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text to the buffer.
    pub fn write(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// The last non-whitespace character written, if any.
    pub fn last_significant(&self) -> Option<char> {
        self.content.trim_end().chars().next_back()
    }

    /// Everything written so far.
    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consumes the buffer, returning its content.
    pub fn into_string(self) -> String {
        self.content
    }
}

/// Ambient render state available to context-aware filters.
///
/// Implementations must not expose mutation of already-rendered output, and
/// resolved values are read-only snapshots.
pub trait RenderScope {
    /// Handle to a resolved sub-template.
    type Template;

    /// Resolves a variable by name. Returns `None` when it is not bound.
    fn resolve(&self, name: &str) -> Option<Value>;

    /// Looks up a sub-template by name.
    fn get_template(&self, name: &str) -> Result<Self::Template, Error>;

    /// Renders `template` with `arg_name` bound to `value` on top of the
    /// current scope, appending the output to `buffer`.
    fn render_partial(
        &self,
        template: &Self::Template,
        arg_name: &str,
        value: Value,
        buffer: &mut RenderBuffer,
    ) -> Result<(), Error>;

    /// Hands out an output buffer for the duration of a batch.
    fn acquire_buffer(&self) -> RenderBuffer {
        RenderBuffer::new()
    }

    /// Returns a buffer obtained from [`acquire_buffer`](Self::acquire_buffer).
    fn release_buffer(&self, _buffer: RenderBuffer) {}
}

/// A buffer checked out from a [`RenderScope`].
///
/// The buffer goes back to the scope when the guard is dropped, so every
/// exit path (including `?` on a failed fragment) releases it.
pub struct ScopedBuffer<'s, S: RenderScope + ?Sized> {
    scope: &'s S,
    buffer: Option<RenderBuffer>,
}

impl<'s, S: RenderScope + ?Sized> ScopedBuffer<'s, S> {
    /// Acquires a buffer from `scope`.
    pub fn acquire(scope: &'s S) -> Self {
        Self {
            buffer: Some(scope.acquire_buffer()),
            scope,
        }
    }
}

impl<S: RenderScope + ?Sized> Deref for ScopedBuffer<'_, S> {
    type Target = RenderBuffer;

    fn deref(&self) -> &RenderBuffer {
        self.buffer.as_ref().expect("buffer is present until drop")
    }
}

impl<S: RenderScope + ?Sized> DerefMut for ScopedBuffer<'_, S> {
    fn deref_mut(&mut self) -> &mut RenderBuffer {
        self.buffer.as_mut().expect("buffer is present until drop")
    }
}

impl<S: RenderScope + ?Sized> Drop for ScopedBuffer<'_, S> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.scope.release_buffer(buffer);
        }
    }
}

/// [`RenderScope`] over a live MiniJinja render state.
///
/// Sub-templates see every variable visible at the call site (root context,
/// `{% set %}` locals, loop variables) with the per-element binding on top.
pub struct StateScope<'s, 't, 'env> {
    state: &'s State<'t, 'env>,
}

impl<'s, 't, 'env> StateScope<'s, 't, 'env> {
    pub fn new(state: &'s State<'t, 'env>) -> Self {
        Self { state }
    }
}

impl<'env> RenderScope for StateScope<'_, '_, 'env> {
    type Template = Template<'env, 'env>;

    fn resolve(&self, name: &str) -> Option<Value> {
        self.state
            .lookup(name)
            .filter(|value| !value.is_undefined())
    }

    fn get_template(&self, name: &str) -> Result<Self::Template, Error> {
        self.state.get_template(name)
    }

    fn render_partial(
        &self,
        template: &Self::Template,
        arg_name: &str,
        value: Value,
        buffer: &mut RenderBuffer,
    ) -> Result<(), Error> {
        let mut ctx: BTreeMap<String, Value> = self
            .state
            .known_variables()
            .into_iter()
            .filter_map(|name| {
                let bound = self.resolve(&name)?;
                Some((name.to_string(), bound))
            })
            .collect();
        ctx.insert(arg_name.to_string(), value);
        buffer.write(&template.render(&ctx)?);
        Ok(())
    }
}
