//! Template engine and loading.
//!
//! [`FilterEngine`] is a MiniJinja environment with every conversion filter
//! installed. Templates are either added inline or resolved from template
//! directories by [`DirLoader`], which tries the bare name and then each of
//! [`TEMPLATE_EXTENSIONS`] in order:
//!
//! ```rust,ignore
//! let engine = FilterEngine::builder()
//!     .template_dir("./templates/ccda")
//!     .build();
//! let text = engine.render_named("CCD", &json!({"msg": doc, "code_mapping": {}}))?;
//! ```

mod engine;
mod loader;

pub use engine::{FilterEngine, FilterEngineBuilder, TemplateEngine};
pub use loader::{DirLoader, TEMPLATE_EXTENSIONS};
