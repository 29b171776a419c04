//! The script provider loader: one archive, lazily materialized providers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keel_archive::Archive;
use keel_core::ProviderIdent;

use crate::metadata::{read_plugin_meta, PluginMeta, ProviderDef};
use crate::provider::{PluginError, ScriptPluginProvider};
use crate::scriptfile;
use crate::service::PluggableService;

/// Cache items the host's loader pool can expire.
pub trait Expireable {
    /// Best-effort removal of on-disk state. Returns `false` when cleanup
    /// failed; never panics.
    fn expire(&self) -> bool;
}

/// Error raised when resolving a provider from a plugin archive fails.
///
/// Always carries the requesting service and provider name so hosts can
/// report exactly which resolution failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to load provider {provider} for service {service}")]
pub struct LoaderError {
    service: String,
    provider: String,
    #[source]
    source: LoaderErrorKind,
}

impl LoaderError {
    fn new(ident: &ProviderIdent, source: LoaderErrorKind) -> Self {
        Self {
            service: ident.service().to_string(),
            provider: ident.provider_name().to_string(),
            source,
        }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn kind(&self) -> &LoaderErrorKind {
        &self.source
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderErrorKind {
    #[error("unable to read plugin metadata from {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("no plugin metadata found in {path}")]
    MissingMetadata { path: PathBuf },
    #[error("failed to expand plugin archive {path}: {source}")]
    Expand {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// True iff the definition declares a provider for `ident`: service and
/// provider name must both compare equal, case-sensitively.
#[must_use]
pub fn matches_provider(ident: &ProviderIdent, def: &ProviderDef) -> bool {
    def.service == ident.service() && def.name == ident.provider_name()
}

/// Lazily-populated loader state. One mutex guards all of it: the parsed
/// descriptor, the expanded payload directory, and resolved providers.
#[derive(Debug, Default)]
struct LoaderState {
    metadata: Option<PluginMeta>,
    expanded_dir: Option<PathBuf>,
    resolved: HashMap<ProviderIdent, Arc<ScriptPluginProvider>>,
}

/// Loads script-backed provider instances for pluggable services from one
/// plugin archive, expanding its payload under a shared cache root.
///
/// The descriptor is read on first need and kept in memory once present;
/// the payload expands at most once per instance; resolved providers are
/// memoized by identity. All public entry points serialize on the instance.
///
/// Within one cache root, archive basenames are assumed unique. The loader
/// does not enforce this; colliding basenames silently share an expansion
/// directory.
#[derive(Debug)]
pub struct ScriptProviderLoader {
    archive: Archive,
    cache_root: PathBuf,
    state: Mutex<LoaderState>,
}

impl ScriptProviderLoader {
    #[must_use]
    pub fn new(archive_path: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            archive: Archive::new(archive_path),
            cache_root: cache_root.into(),
            state: Mutex::new(LoaderState::default()),
        }
    }

    #[must_use]
    pub fn archive_path(&self) -> &Path {
        self.archive.path()
    }

    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Expansion directory dedicated to this archive under the cache root.
    #[must_use]
    pub fn archive_cache_dir(&self) -> PathBuf {
        self.cache_root.join(self.archive.basename())
    }

    /// Load a provider instance for `service` by name.
    ///
    /// Returns `Ok(None)` when the service does not accept script-backed
    /// providers or when this archive declares no matching provider; neither
    /// is an error. The first successful resolution per identity expands the
    /// payload (if it isn't already) and is memoized; the host factory runs
    /// on every call.
    pub fn load<S: PluggableService>(
        &self,
        service: &S,
        provider_name: &str,
    ) -> Result<Option<S::Instance>, LoaderError> {
        if !service.is_script_pluggable() {
            return Ok(None);
        }
        let ident = ProviderIdent::new(service.name(), provider_name);
        let mut state = self.lock_state();

        if !state.resolved.contains_key(&ident) {
            self.ensure_metadata(&mut state)
                .map_err(|source| LoaderError::new(&ident, source))?;
            let Some(meta) = state.metadata.as_ref() else {
                return Err(LoaderError::new(
                    &ident,
                    LoaderErrorKind::MissingMetadata {
                        path: self.archive.path().to_path_buf(),
                    },
                ));
            };
            // First declaration wins; a later definition for the same
            // identity is never reached.
            let matched = meta
                .providers
                .iter()
                .find(|def| matches_provider(&ident, def))
                .cloned();
            if let Some(def) = matched {
                let expanded = self
                    .ensure_expanded(&mut state)
                    .map_err(|source| LoaderError::new(&ident, source))?;
                let provider = self
                    .build_provider(def, expanded)
                    .map_err(|source| LoaderError::new(&ident, source.into()))?;
                state.resolved.insert(ident.clone(), Arc::new(provider));
            }
        }

        let Some(provider) = state.resolved.get(&ident).cloned() else {
            return Ok(None);
        };
        service
            .create_script_provider_instance(&provider)
            .map(Some)
            .map_err(|source| LoaderError::new(&ident, source.into()))
    }

    /// Whether this archive declares a provider for `ident`.
    ///
    /// Never fails: metadata read errors are logged and reported as `false`.
    pub fn is_loader_for(&self, ident: &ProviderIdent) -> bool {
        let mut state = self.lock_state();
        if let Err(err) = self.ensure_metadata(&mut state) {
            tracing::warn!(
                archive = %self.archive.path().display(),
                error = %err,
                "unable to read plugin metadata"
            );
            return false;
        }
        match &state.metadata {
            Some(meta) => meta.providers.iter().any(|def| matches_provider(ident, def)),
            None => false,
        }
    }

    /// Remove the expanded payload from disk.
    ///
    /// Runs under the same lock as [`load`](Self::load) and resets the
    /// expanded-dir marker and the resolved-provider cache, so a later load
    /// re-expands and re-verifies its script file. Idempotent; returns
    /// `false` only when an existing directory could not be removed.
    pub fn expire(&self) -> bool {
        let mut state = self.lock_state();
        let removed = match state.expanded_dir.take() {
            Some(dir) if dir.exists() => {
                tracing::debug!(dir = %dir.display(), "removing expanded plugin payload");
                match fs::remove_dir_all(&dir) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(
                            dir = %dir.display(),
                            error = %err,
                            "unable to remove expanded plugin payload"
                        );
                        false
                    }
                }
            }
            _ => true,
        };
        state.resolved.clear();
        removed
    }

    /// Read the descriptor if it hasn't been read yet. A present descriptor
    /// is cached for the loader's life; an absent one is not, so a later
    /// call rescans the archive.
    fn ensure_metadata(&self, state: &mut LoaderState) -> Result<(), LoaderErrorKind> {
        if state.metadata.is_some() {
            return Ok(());
        }
        state.metadata =
            read_plugin_meta(&self.archive).map_err(|source| LoaderErrorKind::Metadata {
                path: self.archive.path().to_path_buf(),
                source,
            })?;
        Ok(())
    }

    /// Expand the payload once per instance; later calls reuse the
    /// remembered directory, whichever identity triggered the expansion.
    fn ensure_expanded(&self, state: &mut LoaderState) -> Result<PathBuf, LoaderErrorKind> {
        if let Some(dir) = &state.expanded_dir {
            tracing::debug!(dir = %dir.display(), "plugin payload already expanded");
            return Ok(dir.clone());
        }
        let dir = self
            .expand_payload()
            .map_err(|source| LoaderErrorKind::Expand {
                path: self.archive.path().to_path_buf(),
                source,
            })?;
        tracing::debug!(dir = %dir.display(), "expanded plugin payload");
        state.expanded_dir = Some(dir.clone());
        Ok(dir)
    }

    fn expand_payload(&self) -> anyhow::Result<PathBuf> {
        if !self.cache_root.exists() {
            if let Err(err) = fs::create_dir_all(&self.cache_root) {
                tracing::warn!(
                    dir = %self.cache_root.display(),
                    error = %err,
                    "unable to create plugin cache root"
                );
            }
        }
        let dir = self.archive_cache_dir();
        if !dir.exists() {
            if let Err(err) = fs::create_dir(&dir) {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %err,
                    "unable to create cache dir for plugin archive"
                );
            }
        }
        let prefix = format!("{}/contents", self.archive.basename());
        let strip = format!("{prefix}/");
        self.archive.extract_entries(&dir, &prefix, &strip)?;
        Ok(dir)
    }

    /// Bind a matched definition to the expanded payload, marking the script
    /// executable when no interpreter is declared and verifying it exists.
    fn build_provider(
        &self,
        def: ProviderDef,
        expanded_dir: PathBuf,
    ) -> Result<ScriptPluginProvider, PluginError> {
        let script = expanded_dir.join(&def.script_file);
        if def.script_interpreter.is_none() {
            // No interpreter declared: the script runs directly and needs
            // the executable bit.
            if let Err(err) = scriptfile::set_executable(&script) {
                tracing::warn!(
                    script = %script.display(),
                    error = %err,
                    "unable to set executable bit for script file"
                );
            }
        }
        if !script.is_file() {
            let path = std::path::absolute(&script).unwrap_or(script);
            return Err(PluginError::MissingScriptFile { path });
        }
        Ok(ScriptPluginProvider::new(
            def,
            self.archive.path().to_path_buf(),
            expanded_dir,
        ))
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        // A poisoned lock only means a panic mid-call; the cached paths and
        // maps are still usable as-is.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_snapshot(
        &self,
    ) -> (
        Option<PluginMeta>,
        Option<PathBuf>,
        HashMap<ProviderIdent, ScriptPluginProvider>,
    ) {
        let state = self.lock_state();
        (
            state.metadata.clone(),
            state.expanded_dir.clone(),
            state
                .resolved
                .iter()
                .map(|(ident, provider)| (ident.clone(), (**provider).clone()))
                .collect(),
        )
    }
}

impl Expireable for ScriptProviderLoader {
    fn expire(&self) -> bool {
        ScriptProviderLoader::expire(self)
    }
}

/// Value equality for host-side pool deduplication: archive path, cache
/// root, and the lazily-populated state all compare by value.
impl PartialEq for ScriptProviderLoader {
    fn eq(&self, other: &Self) -> bool {
        if self.archive.path() != other.archive.path() || self.cache_root != other.cache_root {
            return false;
        }
        // Snapshot each side separately; never hold both locks at once.
        let (meta_a, dir_a, resolved_a) = self.state_snapshot();
        let (meta_b, dir_b, resolved_b) = other.state_snapshot();
        meta_a == meta_b && dir_a == dir_b && resolved_a == resolved_b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, Option<&str>)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                Some(content) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(content.as_bytes()).unwrap();
                }
                None => {
                    writer.add_directory(*name, options).unwrap();
                }
            }
        }
        writer.finish().unwrap();
    }

    const DESCRIPTOR: &str = "\
name: foo
version: 1.0
rundeckPluginVersion: 1.0
providers:
  - service: NodeExecutor
    name: foo
    plugin-type: script
    script-file: foo.sh
";

    /// Write `foo-plugin.zip` with the standard descriptor and payload.
    fn write_foo_plugin(dir: &Path) -> PathBuf {
        let zip_path = dir.join("foo-plugin.zip");
        write_zip(
            &zip_path,
            &[
                ("foo-plugin/plugin.yaml", Some(DESCRIPTOR)),
                ("foo-plugin/contents/foo.sh", Some("#!/bin/sh\necho foo\n")),
            ],
        );
        zip_path
    }

    struct StubService {
        name: &'static str,
        script_pluggable: bool,
        factory_calls: Cell<usize>,
    }

    impl StubService {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                script_pluggable: true,
                factory_calls: Cell::new(0),
            }
        }
    }

    impl PluggableService for StubService {
        type Instance = ScriptPluginProvider;

        fn name(&self) -> &str {
            self.name
        }

        fn is_script_pluggable(&self) -> bool {
            self.script_pluggable
        }

        fn create_script_provider_instance(
            &self,
            provider: &ScriptPluginProvider,
        ) -> Result<Self::Instance, PluginError> {
            self.factory_calls.set(self.factory_calls.get() + 1);
            Ok(provider.clone())
        }
    }

    struct FailingService;

    impl PluggableService for FailingService {
        type Instance = ();

        fn name(&self) -> &str {
            "NodeExecutor"
        }

        fn is_script_pluggable(&self) -> bool {
            true
        }

        fn create_script_provider_instance(
            &self,
            _provider: &ScriptPluginProvider,
        ) -> Result<Self::Instance, PluginError> {
            Err(PluginError::construction("factory rejected the provider"))
        }
    }

    #[test]
    fn loads_a_provider_and_expands_the_payload() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let cache_root = temp.path().join("cache");

        let loader = ScriptProviderLoader::new(&zip_path, &cache_root);
        let service = StubService::new("NodeExecutor");

        let instance = loader.load(&service, "foo").unwrap().unwrap();
        assert_eq!(instance.name(), "foo");
        assert_eq!(instance.service(), "NodeExecutor");
        assert_eq!(instance.archive_path(), zip_path);
        assert_eq!(instance.contents_dir(), cache_root.join("foo-plugin"));
        assert_eq!(
            instance.script_file_path(),
            cache_root.join("foo-plugin").join("foo.sh")
        );
        assert!(instance.script_file_path().is_file());
    }

    #[cfg(unix)]
    #[test]
    fn marks_the_script_executable_when_no_interpreter_is_declared() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let instance = loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap()
            .unwrap();
        let mode = fs::metadata(instance.script_file_path())
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[cfg(unix)]
    #[test]
    fn leaves_permissions_alone_when_an_interpreter_is_declared() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("py-plugin.zip");
        let descriptor = "\
name: py
version: 1.0
rundeckPluginVersion: 1.0
providers:
  - service: NodeExecutor
    name: py
    plugin-type: script
    script-file: run.py
    script-interpreter: python
";
        write_zip(
            &zip_path,
            &[
                ("py-plugin/plugin.yaml", Some(descriptor)),
                ("py-plugin/contents/run.py", Some("print()\n")),
            ],
        );
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let instance = loader
            .load(&StubService::new("NodeExecutor"), "py")
            .unwrap()
            .unwrap();
        assert_eq!(instance.script_interpreter(), Some("python"));
        let mode = fs::metadata(instance.script_file_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0);
    }

    #[test]
    fn non_script_pluggable_services_are_skipped_without_error() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let mut service = StubService::new("NodeExecutor");
        service.script_pluggable = false;

        assert!(loader.load(&service, "foo").unwrap().is_none());
        assert_eq!(service.factory_calls.get(), 0);
        // Nothing was expanded either.
        assert!(!temp.path().join("cache").exists());
    }

    #[test]
    fn unknown_provider_names_resolve_to_none() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let outcome = loader.load(&StubService::new("NodeExecutor"), "bar").unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn repeated_loads_reuse_the_cached_handle_and_expansion() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));
        let service = StubService::new("NodeExecutor");

        let first = loader.load(&service, "foo").unwrap().unwrap();

        // With metadata, expansion, and the handle all memoized, the archive
        // itself is never needed again.
        fs::remove_file(&zip_path).unwrap();

        let second = loader.load(&service, "foo").unwrap().unwrap();
        assert_eq!(first, second);
        // The factory still runs once per call.
        assert_eq!(service.factory_calls.get(), 2);
    }

    #[test]
    fn a_second_identity_reuses_metadata_and_expansion() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("multi-plugin.zip");
        let descriptor = "\
name: multi
version: 1.0
rundeckPluginVersion: 1.0
providers:
  - service: NodeExecutor
    name: exec
    plugin-type: script
    script-file: exec.sh
  - service: FileCopier
    name: copy
    plugin-type: script
    script-file: copy.sh
";
        write_zip(
            &zip_path,
            &[
                ("multi-plugin/plugin.yaml", Some(descriptor)),
                ("multi-plugin/contents/exec.sh", Some("#!/bin/sh\n")),
                ("multi-plugin/contents/copy.sh", Some("#!/bin/sh\n")),
            ],
        );
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        loader
            .load(&StubService::new("NodeExecutor"), "exec")
            .unwrap()
            .unwrap();
        fs::remove_file(&zip_path).unwrap();

        // Resolving a different identity from the same archive needs no
        // archive I/O: metadata and the expansion are per-loader, not
        // per-identity.
        let copier = loader
            .load(&StubService::new("FileCopier"), "copy")
            .unwrap()
            .unwrap();
        assert_eq!(copier.name(), "copy");
        assert!(copier.script_file_path().is_file());
    }

    #[test]
    fn the_first_matching_definition_wins() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("dup-plugin.zip");
        let descriptor = "\
name: dup
version: 1.0
rundeckPluginVersion: 1.0
providers:
  - service: NodeExecutor
    name: foo
    plugin-type: script
    script-file: first.sh
  - service: NodeExecutor
    name: foo
    plugin-type: script
    script-file: second.sh
";
        write_zip(
            &zip_path,
            &[
                ("dup-plugin/plugin.yaml", Some(descriptor)),
                ("dup-plugin/contents/first.sh", Some("#!/bin/sh\n")),
                ("dup-plugin/contents/second.sh", Some("#!/bin/sh\n")),
            ],
        );
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let instance = loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap()
            .unwrap();
        assert_eq!(instance.definition().script_file, "first.sh");
    }

    #[test]
    fn missing_metadata_is_a_loader_error() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("foo-plugin.zip");
        // Descriptor present but no payload directory: metadata is absent.
        write_zip(&zip_path, &[("foo-plugin/plugin.yaml", Some(DESCRIPTOR))]);
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let err = loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap_err();
        assert_eq!(err.service(), "NodeExecutor");
        assert_eq!(err.provider(), "foo");
        assert!(matches!(err.kind(), LoaderErrorKind::MissingMetadata { .. }));
    }

    #[test]
    fn unreadable_archives_surface_the_cause() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("broken-plugin.zip");
        fs::write(&zip_path, "not a zip archive").unwrap();
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let err = loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap_err();
        assert!(matches!(err.kind(), LoaderErrorKind::Metadata { .. }));
    }

    #[test]
    fn a_missing_script_file_fails_with_its_absolute_path() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("foo-plugin.zip");
        let descriptor = "\
name: foo
version: 1.0
rundeckPluginVersion: 1.0
providers:
  - service: NodeExecutor
    name: foo
    plugin-type: script
    script-file: not-there.sh
";
        write_zip(
            &zip_path,
            &[
                ("foo-plugin/plugin.yaml", Some(descriptor)),
                ("foo-plugin/contents/other.sh", Some("#!/bin/sh\n")),
            ],
        );
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let err = loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap_err();
        match err.kind() {
            LoaderErrorKind::Plugin(PluginError::MissingScriptFile { path }) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("not-there.sh"));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn factory_failures_are_wrapped_with_the_identity() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let err = loader.load(&FailingService, "foo").unwrap_err();
        assert_eq!(err.service(), "NodeExecutor");
        assert_eq!(err.provider(), "foo");
        assert!(matches!(
            err.kind(),
            LoaderErrorKind::Plugin(PluginError::Construction { .. })
        ));
    }

    #[test]
    fn is_loader_for_matches_declared_identities() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        assert!(loader.is_loader_for(&ProviderIdent::new("NodeExecutor", "foo")));
        assert!(!loader.is_loader_for(&ProviderIdent::new("NodeExecutor", "bar")));
        assert!(!loader.is_loader_for(&ProviderIdent::new("FileCopier", "foo")));
    }

    #[test]
    fn is_loader_for_reports_false_on_unreadable_archives() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("broken-plugin.zip");
        fs::write(&zip_path, "not a zip archive").unwrap();
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        assert!(!loader.is_loader_for(&ProviderIdent::new("NodeExecutor", "foo")));
    }

    #[test]
    fn metadata_absence_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("foo-plugin.zip");
        write_zip(&zip_path, &[("foo-plugin/plugin.yaml", Some(DESCRIPTOR))]);
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        let ident = ProviderIdent::new("NodeExecutor", "foo");
        assert!(!loader.is_loader_for(&ident));

        // Replace the broken package in place; the loader rescans because
        // absence was never memoized.
        write_foo_plugin(temp.path());
        assert!(loader.is_loader_for(&ident));
    }

    #[test]
    fn expire_removes_the_expanded_directory_and_resets_state() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let cache_root = temp.path().join("cache");
        let loader = ScriptProviderLoader::new(&zip_path, &cache_root);
        let service = StubService::new("NodeExecutor");

        loader.load(&service, "foo").unwrap().unwrap();
        let expanded = cache_root.join("foo-plugin");
        assert!(expanded.join("foo.sh").is_file());

        assert!(loader.expire());
        assert!(!expanded.exists());

        // A later load re-expands and re-verifies instead of handing back a
        // handle into the deleted directory.
        let reloaded = loader.load(&service, "foo").unwrap().unwrap();
        assert!(reloaded.script_file_path().is_file());
    }

    #[test]
    fn expire_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));

        // Nothing expanded yet: still a successful no-op.
        assert!(loader.expire());

        loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap()
            .unwrap();
        assert!(loader.expire());
        assert!(loader.expire());
    }

    #[test]
    fn expire_is_reachable_through_the_expireable_seam() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let loader = ScriptProviderLoader::new(&zip_path, temp.path().join("cache"));
        loader
            .load(&StubService::new("NodeExecutor"), "foo")
            .unwrap()
            .unwrap();

        let expireable: &dyn Expireable = &loader;
        assert!(expireable.expire());
        assert!(!temp.path().join("cache").join("foo-plugin").exists());
    }

    #[test]
    fn loader_equality_tracks_resolution_state() {
        let temp = TempDir::new().unwrap();
        let zip_path = write_foo_plugin(temp.path());
        let cache_root = temp.path().join("cache");

        let a = ScriptProviderLoader::new(&zip_path, &cache_root);
        let b = ScriptProviderLoader::new(&zip_path, &cache_root);
        assert_eq!(a, b);

        a.load(&StubService::new("NodeExecutor"), "foo").unwrap();
        assert_ne!(a, b);

        b.load(&StubService::new("NodeExecutor"), "foo").unwrap();
        assert_eq!(a, b);

        let other_root = ScriptProviderLoader::new(&zip_path, temp.path().join("elsewhere"));
        assert_ne!(a, other_root);
    }

    #[test]
    fn matches_provider_compares_both_fields() {
        let def = ProviderDef {
            service: "NodeExecutor".into(),
            name: "foo".into(),
            plugin_type: "script".into(),
            script_file: "foo.sh".into(),
            script_interpreter: None,
        };

        assert!(matches_provider(&ProviderIdent::new("NodeExecutor", "foo"), &def));
        assert!(!matches_provider(&ProviderIdent::new("NodeExecutor", "bar"), &def));
        assert!(!matches_provider(&ProviderIdent::new("FileCopier", "foo"), &def));
        // Case matters.
        assert!(!matches_provider(&ProviderIdent::new("nodeexecutor", "foo"), &def));
    }
}
