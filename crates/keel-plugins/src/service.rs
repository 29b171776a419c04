//! The host-side service seam.

use crate::provider::{PluginError, ScriptPluginProvider};

/// A host service capability that can be extended by script-backed
/// providers.
///
/// The loader hands a verified [`ScriptPluginProvider`] handle to the
/// service, which builds whatever typed instance the host actually runs.
pub trait PluggableService {
    /// The typed provider instance this service constructs.
    type Instance;

    fn name(&self) -> &str;

    /// Whether this service accepts script-backed providers at all. A
    /// service that answers `false` makes the loader skip it silently.
    fn is_script_pluggable(&self) -> bool;

    /// Build a typed instance from a resolved provider handle.
    fn create_script_provider_instance(
        &self,
        provider: &ScriptPluginProvider,
    ) -> Result<Self::Instance, PluginError>;
}
