//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Lu.
//! The Lu project belongs to the Dunimd project team.
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

//! # Module Loader
//!
//! One loader per module. A loader holds its own isolated symbol table and
//! resolves every dependency the module declares according to an explicit
//! host sharing policy:
//!
//! 1. `Always`, or `Selected` listing the dependency: reuse the host's
//!    already loaded copy when there is one.
//! 2. Otherwise, or when the host has no copy: load a private copy from the
//!    module's own layout (dependency hints, manifest path, the module's
//!    directory, additional search paths).
//! 3. `PreferModule`: the module's own layout first, the host as fallback.
//!
//! Native dependencies are located the same way but never taken from the
//! host. A load either completes for the whole dependency graph or leaves
//! the loader untouched.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{LuError, Result};
use crate::module::activator::{default_activator, LuModuleActivator};
use crate::module::archive::{read_archive, LuDependencyManifest, MODULE_FILE_EXTENSION};
use crate::module::host::LuHostContext;
use crate::module::types::{LuModule, LuModuleOrigin, LuModuleState, LuNativeDependency};

/// How dependencies are shared with the host application.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuHostSharing {
    /// Never reuse host modules.
    #[default]
    Never,
    /// Reuse any module the host already loaded.
    Always,
    /// Reuse only the listed host modules.
    Selected(BTreeSet<String>),
    /// Use the module's own copy, fall back to the host.
    PreferModule,
}

impl LuHostSharing {
    pub fn selected<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LuHostSharing::Selected(names.into_iter().map(Into::into).collect())
    }

    /// Whether the host copy is consulted before the module's own layout.
    pub fn host_first(&self, name: &str) -> bool {
        match self {
            LuHostSharing::Always => true,
            LuHostSharing::Selected(names) => names.contains(name),
            _ => false,
        }
    }

    /// Whether the host copy is consulted after the module's own layout.
    pub fn host_fallback(&self) -> bool {
        matches!(self, LuHostSharing::PreferModule)
    }

    /// Whether a host module is visible at all under this policy.
    pub fn exposes(&self, name: &str) -> bool {
        match self {
            LuHostSharing::Never => false,
            LuHostSharing::Always | LuHostSharing::PreferModule => true,
            LuHostSharing::Selected(names) => names.contains(name),
        }
    }
}

/// Explicit location for a dependency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuDependencyHint {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub native: bool,
}

/// Policy for one module load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuLoaderPolicy {
    #[serde(default)]
    pub dependency_resolution: LuHostSharing,
    #[serde(default)]
    pub additional_search_paths: Vec<PathBuf>,
    #[serde(default)]
    pub dependency_hints: Vec<LuDependencyHint>,
}

impl LuLoaderPolicy {
    pub fn with_sharing(mut self, sharing: LuHostSharing) -> Self {
        self.dependency_resolution = sharing;
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
}

/// Loads one module and its private dependencies.
#[derive(Debug)]
pub struct LuModuleLoader {
    policy: LuLoaderPolicy,
    host: Arc<LuHostContext>,
    activator: Arc<dyn LuModuleActivator>,
    /// Isolated symbol table, keyed by module name.
    isolated: HashMap<String, Arc<LuModule>>,
    root: Option<Arc<LuModule>>,
}

impl LuModuleLoader {
    pub fn new(policy: LuLoaderPolicy, host: Arc<LuHostContext>) -> Self {
        LuModuleLoader {
            policy,
            host,
            activator: default_activator(),
            isolated: HashMap::new(),
            root: None,
        }
    }

    pub fn with_activator(mut self, activator: Arc<dyn LuModuleActivator>) -> Self {
        self.activator = activator;
        self
    }

    pub fn policy(&self) -> &LuLoaderPolicy {
        &self.policy
    }

    /// The module loaded by this loader.
    pub fn module(&self) -> Option<&Arc<LuModule>> {
        self.root.as_ref()
    }

    /// Private modules owned by this loader, including the root module.
    pub fn isolated_modules(&self) -> Vec<Arc<LuModule>> {
        self.isolated.values().cloned().collect()
    }

    /// Load the module at `path` with its dependency graph.
    pub fn load(&mut self, path: &Path) -> Result<Arc<LuModule>> {
        if let Some(root) = &self.root {
            return Err(LuError::configuration(format!(
                "loader already holds module '{}'; use one loader per module",
                root.name()
            )));
        }

        let mut session = LoadSession {
            policy: &self.policy,
            host: &self.host,
            activator: self.activator.as_ref(),
            staging: self.isolated.clone(),
            in_progress: Vec::new(),
        };

        let module = match session.load_file(path, None) {
            Ok(module) => module,
            Err(e) => {
                log::error!(
                    "module.load.failed: module load aborted, no module committed - path={}, error={}",
                    path.display(),
                    e
                );
                return Err(e);
            }
        };

        self.isolated = session.staging;
        self.root = Some(Arc::clone(&module));
        log::info!(
            "module.load: module loaded - module={}, path={}, types={}, dependencies={}, isolated={}",
            module.name(),
            path.display(),
            module.types().len(),
            module.dependencies().len(),
            self.isolated.len()
        );
        Ok(module)
    }

    /// Best-effort unload of the private modules.
    ///
    /// Fails with [`LuError::ModuleInUse`] while type handles of any private
    /// module are still referenced, e.g. by retained plugins. Dropping those
    /// handles first is the caller's responsibility.
    pub fn unload(&mut self) -> Result<()> {
        let Some(root) = self.root.clone() else {
            return Ok(());
        };

        let modules = self.isolated_modules();
        for module in &modules {
            module.set_state(LuModuleState::Unloading);
        }

        let outstanding: usize = modules.iter().map(|m| m.outstanding_type_handles()).sum();
        if outstanding > 0 {
            for module in &modules {
                module.set_state(LuModuleState::Loaded);
            }
            log::error!(
                "module.unload.in_use: module still referenced, unload refused - module={}, outstanding={}",
                root.name(),
                outstanding
            );
            return Err(LuError::ModuleInUse {
                module: root.name().to_string(),
                outstanding,
            });
        }

        for module in &modules {
            module.set_state(LuModuleState::Unloaded);
        }
        self.isolated.clear();
        self.root = None;
        log::info!(
            "module.unload: module unloaded - module={}, private_modules={}",
            root.name(),
            modules.len()
        );
        Ok(())
    }
}

/// Working state of one `load` call. Only committed on success.
struct LoadSession<'a> {
    policy: &'a LuLoaderPolicy,
    host: &'a LuHostContext,
    activator: &'a dyn LuModuleActivator,
    staging: HashMap<String, Arc<LuModule>>,
    in_progress: Vec<String>,
}

impl<'a> LoadSession<'a> {
    fn load_file(&mut self, path: &Path, requested_by: Option<&str>) -> Result<Arc<LuModule>> {
        let archive = read_archive(path)?;
        let name = archive.manifest.name.clone();

        if self.in_progress.contains(&name) {
            return Err(LuError::unresolved(
                requested_by.unwrap_or(&name),
                name.clone(),
                format!("dependency cycle through {}", self.in_progress.join(" -> ")),
            ));
        }
        if requested_by.is_some() {
            if let Some(existing) = self.staging.get(&name) {
                return Ok(Arc::clone(existing));
            }
        }

        self.in_progress.push(name.clone());
        let module_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut dependencies = Vec::new();
        let mut natives = Vec::new();
        for dependency in &archive.manifest.dependencies {
            if dependency.native {
                natives.push(self.resolve_native(&name, dependency, &module_dir)?);
            } else {
                dependencies.push(self.resolve_managed(&name, dependency, &module_dir)?);
            }
        }
        self.in_progress.pop();

        let mut builder = LuModule::builder(name.clone())
            .origin(LuModuleOrigin::Isolated)
            .state(LuModuleState::Loading)
            .path(path)
            .digest(archive.digest.clone());
        if let Some(v) = &archive.manifest.file_version {
            builder = builder.file_version(v.clone());
        }
        if let Some(v) = &archive.manifest.product_version {
            builder = builder.product_version(v.clone());
        }
        if let Some(d) = &archive.manifest.description {
            builder = builder.description(d.clone());
        }
        for ty in archive.manifest.type_infos() {
            builder = builder.with_type(ty);
        }
        for dependency in dependencies {
            builder = builder.with_dependency(dependency);
        }
        for native in natives {
            builder = builder.with_native_dependency(native);
        }
        let module = builder.build();

        if let Err(e) = self.activator.activate(&module, archive.payload.as_ref()) {
            module.set_state(LuModuleState::Unloaded);
            return Err(e);
        }
        module.set_state(LuModuleState::Loaded);

        let module = Arc::new(module);
        self.staging.insert(name, Arc::clone(&module));
        Ok(module)
    }

    fn resolve_managed(
        &mut self,
        module: &str,
        dependency: &LuDependencyManifest,
        module_dir: &Path,
    ) -> Result<Arc<LuModule>> {
        let sharing = &self.policy.dependency_resolution;

        if sharing.host_first(&dependency.name) {
            if let Some(shared) = self.host.find_module(&dependency.name) {
                log::debug!(
                    "module.resolve.host: dependency shared with host - module={}, dependency={}",
                    module,
                    dependency.name
                );
                return Ok(shared);
            }
            log::debug!(
                "module.resolve.host_miss: dependency not loaded by host, using module layout - module={}, dependency={}",
                module,
                dependency.name
            );
        }

        if let Some(existing) = self.staging.get(&dependency.name) {
            return Ok(Arc::clone(existing));
        }

        if let Some(path) = self.locate_managed(dependency, module_dir) {
            log::debug!(
                "module.resolve.private: loading private dependency copy - module={}, dependency={}, path={}",
                module,
                dependency.name,
                path.display()
            );
            return self.load_file(&path, Some(module));
        }

        if sharing.host_fallback() {
            if let Some(shared) = self.host.find_module(&dependency.name) {
                log::debug!(
                    "module.resolve.host_fallback: dependency taken from host - module={}, dependency={}",
                    module,
                    dependency.name
                );
                return Ok(shared);
            }
        }

        Err(LuError::unresolved(
            module,
            dependency.name.clone(),
            "not found in host modules or module search paths",
        ))
    }

    fn search_dirs(&self, module_dir: &Path) -> Vec<PathBuf> {
        let mut dirs = vec![module_dir.to_path_buf()];
        dirs.extend(self.policy.additional_search_paths.iter().cloned());
        dirs
    }

    fn hinted(&self, name: &str, native: bool) -> Option<PathBuf> {
        self.policy
            .dependency_hints
            .iter()
            .find(|h| h.name == name && h.native == native && h.path.is_file())
            .map(|h| h.path.clone())
    }

    fn locate_managed(&self, dependency: &LuDependencyManifest, module_dir: &Path) -> Option<PathBuf> {
        if let Some(path) = self.hinted(&dependency.name, false) {
            return Some(path);
        }
        if let Some(relative) = &dependency.path {
            let path = module_dir.join(relative);
            if path.is_file() {
                return Some(path);
            }
        }
        let file_name = format!("{}.{}", dependency.name, MODULE_FILE_EXTENSION);
        self.search_dirs(module_dir)
            .into_iter()
            .map(|dir| dir.join(&file_name))
            .find(|p| p.is_file())
    }

    fn resolve_native(
        &self,
        module: &str,
        dependency: &LuDependencyManifest,
        module_dir: &Path,
    ) -> Result<LuNativeDependency> {
        let found = self.hinted(&dependency.name, true).or_else(|| {
            if let Some(relative) = &dependency.path {
                let path = module_dir.join(relative);
                if path.is_file() {
                    return Some(path);
                }
            }
            let platform_name = libloading::library_filename(&dependency.name);
            self.search_dirs(module_dir).into_iter().find_map(|dir| {
                [dir.join(&platform_name), dir.join(&dependency.name)]
                    .into_iter()
                    .find(|p| p.is_file())
            })
        });

        match found {
            Some(path) => {
                log::debug!(
                    "module.resolve.native: native dependency located - module={}, dependency={}, path={}",
                    module,
                    dependency.name,
                    path.display()
                );
                Ok(LuNativeDependency {
                    name: dependency.name.clone(),
                    path,
                })
            }
            None => Err(LuError::unresolved(
                module,
                dependency.name.clone(),
                "native library not found in module search paths",
            )),
        }
    }
}
