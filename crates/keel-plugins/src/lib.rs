//! Script-backed provider plugins for keel's pluggable services.
//!
//! A plugin is a self-contained zip archive whose top-level directory name
//! matches the file name minus its final extension. The directory holds a
//! `plugin.yaml` descriptor and a `contents/` payload with the script files
//! the descriptor references. [`ScriptProviderLoader`] turns such an archive
//! into resolved [`ScriptPluginProvider`] handles: the descriptor is parsed
//! lazily, the payload is expanded into a per-archive cache directory at most
//! once per loader, and resolved providers are memoized by identity.
//!
//! The loader never runs a script. Its job ends at handing a verified
//! script-file location to the host's [`PluggableService`] factory.

mod config;
mod loader;
mod metadata;
mod provider;
mod scriptfile;
mod service;
mod validation;

pub use config::{CacheConfig, MissingHomeDir};
pub use loader::{
    matches_provider, Expireable, LoaderError, LoaderErrorKind, ScriptProviderLoader,
};
pub use metadata::{
    read_plugin_meta, PluginMeta, ProviderDef, PLUGIN_DESCRIPTOR_NAME, SCRIPT_PLUGIN_TYPE,
    SCRIPT_PLUGIN_VERSION,
};
pub use provider::{PluginError, ScriptPluginProvider};
pub use service::PluggableService;
pub use validation::validate_plugin_meta;

pub use keel_core::ProviderIdent;
