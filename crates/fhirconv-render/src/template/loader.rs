//! Template lookup across template directories.
//!
//! Conversion templates reference each other by extension-less names
//! (`"Section/Result"`), so the loader tries each directory in order and,
//! within a directory, the exact name followed by the known extensions.
//! The first existing file wins.

use std::path::{Component, Path, PathBuf};

use minijinja::{Error, ErrorKind};
use tracing::trace;

/// Recognized template file extensions, in priority order.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".j2", ".jinja", ".jinja2", ".json", ".txt"];

/// Resolves template names against an ordered list of directories.
#[derive(Debug, Clone, Default)]
pub struct DirLoader {
    dirs: Vec<PathBuf>,
}

impl DirLoader {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Finds the file backing `name`, if any.
    ///
    /// Names that would escape a template directory (absolute paths, `..`)
    /// never resolve.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        self.dirs.iter().find_map(|dir| {
            std::iter::once(dir.join(relative))
                .chain(
                    TEMPLATE_EXTENSIONS
                        .iter()
                        .map(|ext| dir.join(format!("{}{}", name, ext))),
                )
                .find(|candidate| candidate.is_file())
        })
    }

    /// Loader callback for [`minijinja::Environment::set_loader`].
    pub fn load(&self, name: &str) -> Result<Option<String>, Error> {
        let Some(path) = self.resolve(name) else {
            return Ok(None);
        };
        trace!(template = name, path = %path.display(), "loading template");
        std::fs::read_to_string(&path).map(Some).map_err(|err| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {}", path.display()),
            )
            .with_source(err)
        })
    }
}
