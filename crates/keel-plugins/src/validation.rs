//! Install-time descriptor auditing.

use std::path::Path;

use crate::metadata::{PluginMeta, ProviderDef, SCRIPT_PLUGIN_TYPE, SCRIPT_PLUGIN_VERSION};

/// Audit a parsed descriptor against the schema rules.
///
/// Every failing rule logs its own warning and evaluation continues; the
/// return value aggregates them. The loader itself never calls this — it
/// exists for install/registration-time checks by the host.
#[must_use]
pub fn validate_plugin_meta(meta: &PluginMeta, archive_path: &Path) -> bool {
    let mut valid = true;
    if meta.name.is_none() {
        tracing::warn!(
            archive = %archive_path.display(),
            "name not found in plugin metadata"
        );
        valid = false;
    }
    if meta.version.is_none() {
        tracing::warn!(
            archive = %archive_path.display(),
            "version not found in plugin metadata"
        );
        valid = false;
    }
    match meta.plugin_version.as_deref() {
        None => {
            tracing::warn!(
                archive = %archive_path.display(),
                "rundeckPluginVersion not found in plugin metadata"
            );
            valid = false;
        }
        Some(version) if version != SCRIPT_PLUGIN_VERSION => {
            tracing::warn!(
                archive = %archive_path.display(),
                "rundeckPluginVersion {version} is not supported"
            );
            valid = false;
        }
        Some(_) => {}
    }
    for def in &meta.providers {
        if !validate_provider_def(def, archive_path) {
            valid = false;
        }
    }
    valid
}

/// Audit one provider definition. A bad plugin-type fails the definition
/// outright; for script definitions each empty required field is its own
/// failure.
fn validate_provider_def(def: &ProviderDef, archive_path: &Path) -> bool {
    if def.plugin_type.is_empty() {
        tracing::warn!(
            archive = %archive_path.display(),
            provider = %def.name,
            "provider definition is missing plugin-type"
        );
        return false;
    }
    if def.plugin_type != SCRIPT_PLUGIN_TYPE {
        tracing::warn!(
            archive = %archive_path.display(),
            provider = %def.name,
            "provider definition has invalid plugin-type: {}",
            def.plugin_type
        );
        return false;
    }

    let mut valid = true;
    if def.name.is_empty() {
        tracing::warn!(archive = %archive_path.display(), "script provider is missing name");
        valid = false;
    }
    if def.service.is_empty() {
        tracing::warn!(
            archive = %archive_path.display(),
            provider = %def.name,
            "script provider is missing service"
        );
        valid = false;
    }
    if def.script_file.is_empty() {
        tracing::warn!(
            archive = %archive_path.display(),
            provider = %def.name,
            "script provider is missing script-file"
        );
        valid = false;
    }
    valid
}
