//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Lu.
//! The Lu project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Folder Catalog
//!
//! Scans a directory in two phases.
//!
//! ## Prescan (metadata only, concurrent)
//!
//! Every file matching the search patterns is inspected on a blocking task
//! against a host snapshot taken when the scan starts. For each candidate a
//! [`LuMetadataContext`] is scoped to, in order:
//!
//! 1. the host's base modules
//! 2. the candidate itself
//! 3. host modules visible under the sharing policy
//! 4. module files of shared directories inferred from host module
//!    locations (not under `Never`)
//! 5. module files of the additional search paths
//! 6. the candidate's sibling files
//!
//! File names are unique across that scope; the first occurrence wins.
//! Manifests are read once per scan through a shared [`LuManifestCache`].
//! Unreadable candidates are skipped and recorded as diagnostics.
//!
//! ## Real load (serialized)
//!
//! Matching candidates are loaded one by one through single-module
//! catalogs. The first load error aborts the scan and unloads what was
//! loaded so far. Later plugins repeating a (name, version) pair are dropped.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use glob::Pattern;

use crate::catalog::module_catalog::{LuModuleCatalog, LuModuleCatalogOptions};
use crate::catalog::plugin::{LuPlugin, LuPluginNaming};
use crate::catalog::{LuCatalog, LuCatalogState, LuCatalogStatus};
use crate::errors::{LuError, Result};
use crate::matching::context::{LuManifestCache, LuMetadataContext};
use crate::matching::criteria::LuCriteria;
use crate::matching::finder::LuTypeFinder;
use crate::module::activator::LuModuleActivator;
use crate::module::archive::{is_module_file, MODULE_FILE_EXTENSION};
use crate::module::host::{LuHostContext, LuHostSnapshot};
use crate::module::loader::{LuDependencyHint, LuHostSharing, LuLoaderPolicy};
use crate::version::LuVersion;

/// Folder scan configuration.
#[derive(Clone, Debug)]
pub struct LuFolderOptions {
    /// File name globs, `*.lum` by default.
    pub search_patterns: Vec<String>,
    pub include_subfolders: bool,
    pub host_sharing: LuHostSharing,
    pub additional_search_paths: Vec<PathBuf>,
    pub dependency_hints: Vec<LuDependencyHint>,
    pub criteria: Vec<LuCriteria>,
    pub naming: LuPluginNaming,
    pub activator: Option<Arc<dyn LuModuleActivator>>,
}

impl Default for LuFolderOptions {
    fn default() -> Self {
        LuFolderOptions {
            search_patterns: vec![format!("*.{}", MODULE_FILE_EXTENSION)],
            include_subfolders: false,
            host_sharing: LuHostSharing::default(),
            additional_search_paths: Vec::new(),
            dependency_hints: Vec::new(),
            criteria: Vec::new(),
            naming: LuPluginNaming::default(),
            activator: None,
        }
    }
}

impl LuFolderOptions {
    /// Replace the search patterns.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursive(mut self, include_subfolders: bool) -> Self {
        self.include_subfolders = include_subfolders;
        self
    }

    pub fn with_sharing(mut self, sharing: LuHostSharing) -> Self {
        self.host_sharing = sharing;
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_search_paths.push(path.into());
        self
    }

    pub fn with_hint(mut self, hint: LuDependencyHint) -> Self {
        self.dependency_hints.push(hint);
        self
    }

    pub fn with_criteria(mut self, criteria: LuCriteria) -> Self {
        self.criteria.push(criteria);
        self
    }

    pub fn with_naming(mut self, naming: LuPluginNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_activator(mut self, activator: Arc<dyn LuModuleActivator>) -> Self {
        self.activator = Some(activator);
        self
    }

    fn loader_policy(&self) -> LuLoaderPolicy {
        LuLoaderPolicy {
            dependency_resolution: self.host_sharing.clone(),
            additional_search_paths: self.additional_search_paths.clone(),
            dependency_hints: self.dependency_hints.clone(),
        }
    }

    fn module_options(&self) -> LuModuleCatalogOptions {
        LuModuleCatalogOptions {
            criteria: self.criteria.clone(),
            naming: self.naming.clone(),
            loader: self.loader_policy(),
            activator: self.activator.clone(),
        }
    }
}

/// A file skipped during the prescan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LuFolderDiagnostic {
    pub path: PathBuf,
    pub error: LuError,
}

#[derive(Debug)]
pub struct LuFolderCatalog {
    directory: PathBuf,
    options: LuFolderOptions,
    patterns: Vec<Pattern>,
    host: Arc<LuHostContext>,
    status: LuCatalogStatus,
    children: Vec<LuModuleCatalog>,
    diagnostics: Vec<LuFolderDiagnostic>,
}

impl LuFolderCatalog {
    /// Fails with a configuration error on blank or malformed patterns.
    pub fn new(
        directory: impl Into<PathBuf>,
        options: LuFolderOptions,
        host: Arc<LuHostContext>,
    ) -> Result<Self> {
        let directory = directory.into();
        if options.search_patterns.is_empty() {
            return Err(LuError::configuration("folder catalog needs at least one search pattern"));
        }
        let mut patterns = Vec::with_capacity(options.search_patterns.len());
        for raw in &options.search_patterns {
            if raw.trim().is_empty() {
                return Err(LuError::configuration("search pattern cannot be blank"));
            }
            let pattern = Pattern::new(raw).map_err(|e| {
                LuError::configuration(format!("invalid search pattern '{}': {}", raw, e))
            })?;
            patterns.push(pattern);
        }

        Ok(LuFolderCatalog {
            status: LuCatalogStatus::new(directory.display().to_string()),
            directory,
            options,
            patterns,
            host,
            children: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.status = LuCatalogStatus::new(name);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn options(&self) -> &LuFolderOptions {
        &self.options
    }

    pub fn state(&self) -> &LuCatalogState {
        self.status.state()
    }

    /// Files skipped by the last scan.
    pub fn diagnostics(&self) -> &[LuFolderDiagnostic] {
        &self.diagnostics
    }

    /// Paths of the modules loaded by the last scan, in load order.
    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.children
            .iter()
            .filter_map(|c| c.source_path().map(Path::to_path_buf))
            .collect()
    }

    /// Drop the plugins and unload every module of the folder.
    ///
    /// Modules that are still in use stay loaded. The folder then keeps
    /// only their plugins, exactly as they were handed out, and returns the
    /// first [`LuError::ModuleInUse`].
    pub fn unload(&mut self) -> Result<()> {
        let initialized = self.status.is_initialized();
        let released: Vec<_> = self.status.reset().into_iter().map(LuPlugin::release).collect();
        let mut first_error = None;
        for child in &mut self.children {
            if let Err(e) = child.unload() {
                first_error.get_or_insert(e);
            }
        }
        self.children.retain(|child| child.is_initialized());

        let Some(e) = first_error else {
            log::info!(
                "catalog.folder.unload: folder unloaded - catalog={}",
                self.status.name()
            );
            return Ok(());
        };
        if initialized {
            let plugins = released.into_iter().filter_map(|p| p.reattach()).collect();
            self.status.restore(plugins);
        }
        Err(e)
    }

    async fn scan(&self) -> Result<(Vec<LuModuleCatalog>, Vec<LuFolderDiagnostic>)> {
        let snapshot = Arc::new(self.host.snapshot());
        let scope = {
            let directory = self.directory.clone();
            let patterns = self.patterns.clone();
            let recursive = self.options.include_subfolders;
            let sharing = self.options.host_sharing.clone();
            let additional = self.options.additional_search_paths.clone();
            let snapshot = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || {
                LuScanScope::plan(&directory, &patterns, recursive, sharing, &additional, snapshot)
            })
            .await
            .map_err(|e| LuError::internal(format!("folder enumeration task failed: {}", e)))??
        };
        let scope = Arc::new(scope);

        log::info!(
            "catalog.folder.scan: folder enumerated - catalog={}, directory={}, candidates={}",
            self.status.name(),
            self.directory.display(),
            scope.candidates.len()
        );

        let cache = Arc::new(LuManifestCache::new());
        let criteria = Arc::new(self.options.criteria.clone());
        let tasks = scope.candidates.iter().cloned().map(|candidate| {
            let scope = Arc::clone(&scope);
            let cache = Arc::clone(&cache);
            let criteria = Arc::clone(&criteria);
            tokio::task::spawn_blocking(move || {
                let outcome = scope.prescan(&candidate, &cache, &criteria);
                (candidate, outcome)
            })
        });

        let mut matched = Vec::new();
        let mut diagnostics = Vec::new();
        for joined in join_all(tasks).await {
            let (candidate, outcome) = joined
                .map_err(|e| LuError::internal(format!("prescan task failed: {}", e)))?;
            match outcome {
                Ok(true) => matched.push(candidate),
                Ok(false) => log::debug!(
                    "catalog.folder.no_match: candidate has no matching type - catalog={}, path={}",
                    self.status.name(),
                    candidate.display()
                ),
                Err(error) => {
                    log::warn!(
                        "catalog.folder.skip: candidate skipped - catalog={}, path={}, error={}",
                        self.status.name(),
                        candidate.display(),
                        error
                    );
                    diagnostics.push(LuFolderDiagnostic {
                        path: candidate,
                        error,
                    });
                }
            }
        }

        let mut children: Vec<LuModuleCatalog> = Vec::with_capacity(matched.len());
        for path in matched {
            let mut child = LuModuleCatalog::from_path(
                path.clone(),
                self.options.module_options(),
                Arc::clone(&self.host),
            )
            .with_name(self.status.name());

            if let Err(e) = child.initialize().await {
                log::error!(
                    "catalog.folder.load_failed: aborting scan, unloading loaded modules - catalog={}, path={}, loaded={}",
                    self.status.name(),
                    path.display(),
                    children.len()
                );
                for loaded in &mut children {
                    if let Err(unload_error) = loaded.unload() {
                        log::warn!(
                            "catalog.folder.unload_failed: module left loaded - catalog={}, error={}",
                            self.status.name(),
                            unload_error
                        );
                    }
                }
                return Err(e);
            }
            children.push(child);
        }

        Ok((children, diagnostics))
    }
}

/// Concatenate child plugins, dropping repeated (name, version) pairs.
fn aggregate(catalog: &str, children: &[LuModuleCatalog]) -> Vec<LuPlugin> {
    let mut plugins: Vec<LuPlugin> = Vec::new();
    for child in children {
        let Ok(child_plugins) = child.get_plugins() else {
            continue;
        };
        for plugin in child_plugins {
            if plugins.iter().any(|p| p.is(plugin.name(), &plugin.version())) {
                log::warn!(
                    "catalog.folder.duplicate: duplicate plugin dropped - catalog={}, name={}, version={}, module={}",
                    catalog,
                    plugin.name(),
                    plugin.version(),
                    plugin.type_info().module
                );
                continue;
            }
            plugins.push(plugin);
        }
    }
    plugins
}

#[async_trait]
impl LuCatalog for LuFolderCatalog {
    fn name(&self) -> &str {
        self.status.name()
    }

    async fn initialize(&mut self) -> Result<()> {
        if !self.status.begin()? {
            return Ok(());
        }
        match self.scan().await {
            Ok((children, diagnostics)) => {
                let plugins = aggregate(self.status.name(), &children);
                self.children = children;
                self.diagnostics = diagnostics;
                self.status.commit(plugins);
                Ok(())
            }
            Err(e) => Err(self.status.fail(e)),
        }
    }

    fn is_initialized(&self) -> bool {
        self.status.is_initialized()
    }

    fn get_plugins(&self) -> Result<Vec<LuPlugin>> {
        Ok(self.status.plugins()?.to_vec())
    }

    fn get(&self, name: &str, version: &LuVersion) -> Result<Option<LuPlugin>> {
        self.status.get(name, version)
    }
}

/// Everything a prescan needs, computed once per scan.
struct LuScanScope {
    candidates: Vec<PathBuf>,
    sharing: LuHostSharing,
    snapshot: Arc<LuHostSnapshot>,
    shared_files: Vec<PathBuf>,
    additional_files: Vec<PathBuf>,
    siblings: HashMap<PathBuf, Vec<PathBuf>>,
}

impl LuScanScope {
    fn plan(
        directory: &Path,
        patterns: &[Pattern],
        recursive: bool,
        sharing: LuHostSharing,
        additional: &[PathBuf],
        snapshot: Arc<LuHostSnapshot>,
    ) -> Result<Self> {
        if !directory.is_dir() {
            return Err(LuError::Io(format!(
                "folder '{}' does not exist",
                directory.display()
            )));
        }

        let candidates = first_by_file_name(enumerate(directory, patterns, recursive)?);

        let shared_files = if sharing == LuHostSharing::Never {
            Vec::new()
        } else {
            snapshot
                .shared_directories()
                .iter()
                .flat_map(|dir| module_files(dir, patterns))
                .collect()
        };
        let additional_files = additional
            .iter()
            .flat_map(|dir| module_files(dir, patterns))
            .collect();

        let mut siblings = HashMap::new();
        for candidate in &candidates {
            if let Some(dir) = candidate.parent() {
                siblings
                    .entry(dir.to_path_buf())
                    .or_insert_with(|| module_files(dir, patterns));
            }
        }

        Ok(LuScanScope {
            candidates,
            sharing,
            snapshot,
            shared_files,
            additional_files,
            siblings,
        })
    }

    /// Resolution scope of one candidate. Host modules come before the
    /// module's own files unless the policy prefers the module, which is
    /// the order the loader resolves dependencies in.
    fn context_for(&self, candidate: &Path, cache: &Arc<LuManifestCache>) -> LuMetadataContext {
        let mut ctx = LuMetadataContext::new(Arc::clone(cache));
        for module in &self.snapshot.base_modules {
            ctx.add_module(module);
        }
        ctx.add_file(candidate);

        let siblings = candidate
            .parent()
            .and_then(|dir| self.siblings.get(dir))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        if self.sharing.host_fallback() {
            for file in siblings.iter().chain(&self.additional_files).chain(&self.shared_files) {
                ctx.add_file(file);
            }
            self.add_host_modules(&mut ctx);
        } else {
            self.add_host_modules(&mut ctx);
            for file in self.shared_files.iter().chain(&self.additional_files).chain(siblings) {
                ctx.add_file(file);
            }
        }
        ctx
    }

    fn add_host_modules(&self, ctx: &mut LuMetadataContext) {
        for module in &self.snapshot.modules {
            if self.sharing.exposes(module.name()) {
                ctx.add_module(module);
            }
        }
    }

    /// `Ok(true)` when the candidate should be loaded.
    fn prescan(
        &self,
        candidate: &Path,
        cache: &Arc<LuManifestCache>,
        criteria: &[LuCriteria],
    ) -> Result<bool> {
        let manifest = cache
            .get(candidate)
            .map_err(|e| LuError::discovery(candidate.display().to_string(), e.to_string()))?;
        if criteria.is_empty() {
            return Ok(true);
        }

        let ctx = self.context_for(candidate, cache);
        if !ctx.discarded().is_empty() {
            log::debug!(
                "catalog.folder.scope: duplicate file names ignored - candidate={}, discarded={}",
                candidate.display(),
                ctx.discarded().len()
            );
        }
        let types: Vec<_> = manifest.type_infos().into_iter().map(Arc::new).collect();
        Ok(!LuTypeFinder::find(criteria, &types, &ctx).is_empty())
    }
}

fn matches_patterns(path: &Path, patterns: &[Pattern]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| patterns.iter().any(|p| p.matches(name)))
}

/// Files below `directory` whose name matches one of the patterns,
/// deduplicated and sorted.
fn enumerate(directory: &Path, patterns: &[Pattern], recursive: bool) -> Result<Vec<PathBuf>> {
    let root = Pattern::escape(&directory.to_string_lossy());
    let mut found = BTreeSet::new();
    for pattern in patterns {
        let full = if recursive {
            format!("{}/**/{}", root, pattern.as_str())
        } else {
            format!("{}/{}", root, pattern.as_str())
        };
        let entries = glob::glob(&full)
            .map_err(|e| LuError::configuration(format!("invalid search pattern '{}': {}", full, e)))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    found.insert(path);
                }
                Ok(_) => {}
                Err(e) => log::warn!(
                    "catalog.folder.enumerate: unreadable entry skipped - path={}, error={}",
                    e.path().display(),
                    e
                ),
            }
        }
    }
    Ok(found.into_iter().collect())
}

/// Keep the first path for every file name, compared case-insensitively.
/// Later paths with a name already seen never contribute plugins.
fn first_by_file_name(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(paths.len());
    for path in paths {
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if seen.insert(key) {
            kept.push(path);
        } else {
            log::debug!(
                "catalog.folder.shadowed: file name already discovered, path ignored - path={}",
                path.display()
            );
        }
    }
    kept
}

/// Module files directly inside `dir`, sorted. Unreadable directories are
/// treated as empty.
fn module_files(dir: &Path, patterns: &[Pattern]) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && (is_module_file(p) || matches_patterns(p, patterns)))
        .collect();
    files.sort();
    files
}
