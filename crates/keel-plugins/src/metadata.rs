//! The plugin descriptor model and the archive metadata scan.

use anyhow::Context;
use keel_archive::Archive;
use serde::Deserialize;

/// Descriptor entry name, relative to the archive's top-level directory.
pub const PLUGIN_DESCRIPTOR_NAME: &str = "plugin.yaml";

/// The one descriptor compatibility version this loader supports.
pub const SCRIPT_PLUGIN_VERSION: &str = "1.0";

/// The one provider definition kind this loader supports.
pub const SCRIPT_PLUGIN_TYPE: &str = "script";

/// Parsed `plugin.yaml` content.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PluginMeta {
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
    /// Descriptor compatibility version (wire key `rundeckPluginVersion`).
    #[serde(default, rename = "rundeckPluginVersion", deserialize_with = "scalar_string")]
    pub plugin_version: Option<String>,
    /// Provider definitions in declaration order.
    #[serde(default)]
    pub providers: Vec<ProviderDef>,
}

/// Descriptors write bare scalars like `version: 1.0`, which YAML types as a
/// number. Fields that are logically strings accept any scalar and keep its
/// literal form.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a scalar, got {other:?}"))),
    }
}

/// One descriptor entry naming a script-backed implementation for a service.
///
/// Definition fields treat a missing key and an empty string the same, so
/// they deserialize to `String` with empty defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProviderDef {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "plugin-type")]
    pub plugin_type: String,
    /// Script location, relative to the expanded `contents/` payload.
    #[serde(default, rename = "script-file")]
    pub script_file: String,
    #[serde(default, rename = "script-interpreter")]
    pub script_interpreter: Option<String>,
}

/// Scan `archive` for its plugin descriptor.
///
/// Success requires a non-directory `<basename>/plugin.yaml` entry and a
/// `<basename>/contents` payload marker. The `<basename>/` root marker is
/// advisory only: it is warned about when missing but never gates the
/// result. When the descriptor or payload is missing the scan returns
/// `Ok(None)` with one warning per unmet condition; I/O failures and
/// malformed YAML surface as errors.
pub fn read_plugin_meta(archive: &Archive) -> anyhow::Result<Option<PluginMeta>> {
    let basename = archive.basename();
    let root_prefix = format!("{basename}/");
    let contents_prefix = format!("{basename}/contents/");
    let contents_dir = format!("{basename}/contents");
    let descriptor = format!("{basename}/{PLUGIN_DESCRIPTOR_NAME}");

    let mut root_found = false;
    let mut payload_found = false;
    let mut descriptor_found = false;
    for entry in archive.entries()? {
        if !root_found && entry.name.starts_with(&root_prefix) {
            root_found = true;
        }
        if !payload_found
            && (entry.name.starts_with(&contents_prefix)
                || (entry.is_dir && entry.name == contents_dir))
        {
            payload_found = true;
        }
        if !descriptor_found && !entry.is_dir && entry.name == descriptor {
            descriptor_found = true;
        }
        if payload_found && descriptor_found {
            break;
        }
    }

    if !root_found {
        tracing::warn!(
            archive = %archive.path().display(),
            "plugin not loaded: found no {root_prefix} dir within archive"
        );
    }
    if !descriptor_found {
        tracing::warn!(
            archive = %archive.path().display(),
            "plugin not loaded: found no {descriptor} within archive"
        );
    }
    if !payload_found {
        tracing::warn!(
            archive = %archive.path().display(),
            "plugin not loaded: found no {contents_dir} dir within archive"
        );
    }
    if !(descriptor_found && payload_found) {
        return Ok(None);
    }

    let Some(bytes) = archive.read(&descriptor)? else {
        tracing::warn!(
            archive = %archive.path().display(),
            "plugin not loaded: {descriptor} vanished during scan"
        );
        return Ok(None);
    };
    let meta = serde_yaml::from_slice(&bytes).with_context(|| {
        format!("failed to parse {} in {}", descriptor, archive.path().display())
    })?;
    Ok(Some(meta))
}
