//! The resolved provider handle and its construction errors.

use std::path::{Path, PathBuf};

use crate::metadata::ProviderDef;

/// Errors raised while turning a matched definition into a provider, or by a
/// host factory constructing its typed instance.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("script file was not found: {path}")]
    MissingScriptFile { path: PathBuf },
    #[error("provider construction failed: {message}")]
    Construction { message: String },
}

impl PluginError {
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction {
            message: message.into(),
        }
    }
}

/// A resolved script-backed provider: the matched definition bound to its
/// source archive and expanded payload directory.
///
/// This is what the loader memoizes per identity and what the host's
/// [`PluggableService`](crate::PluggableService) factory consumes. It
/// locates a verified script file; running it is the host's business.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptPluginProvider {
    def: ProviderDef,
    archive_path: PathBuf,
    contents_dir: PathBuf,
}

impl ScriptPluginProvider {
    pub(crate) fn new(def: ProviderDef, archive_path: PathBuf, contents_dir: PathBuf) -> Self {
        Self {
            def,
            archive_path,
            contents_dir,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.def.service
    }

    #[must_use]
    pub fn definition(&self) -> &ProviderDef {
        &self.def
    }

    /// The archive this provider was loaded from.
    #[must_use]
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// The expanded payload directory backing this provider.
    #[must_use]
    pub fn contents_dir(&self) -> &Path {
        &self.contents_dir
    }

    /// Location of the provider's script inside the expanded payload.
    #[must_use]
    pub fn script_file_path(&self) -> PathBuf {
        self.contents_dir.join(&self.def.script_file)
    }

    #[must_use]
    pub fn script_interpreter(&self) -> Option<&str> {
        self.def.script_interpreter.as_deref()
    }
}
