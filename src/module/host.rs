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

//! # Host Context
//!
//! The host context describes what the embedding application has already
//! loaded. It is passed down explicitly to every catalog and loader; there
//! is no process-wide default.
//!
//! - **Base modules** describe the runtime itself and are part of every
//!   metadata-only scope.
//! - **Host modules** are the already loaded, shareable set that module
//!   loaders may reuse depending on their sharing policy.
//! - **Runtime and output directories** are excluded when folder catalogs
//!   infer shared directories from host module locations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::module::types::{LuModule, LuModuleOrigin};

#[derive(Debug, Default)]
pub struct LuHostContext {
    base_modules: Vec<Arc<LuModule>>,
    modules: RwLock<Vec<Arc<LuModule>>>,
    runtime_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl LuHostContext {
    pub fn new() -> Self {
        LuHostContext::default()
    }

    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_base_module(mut self, module: LuModule) -> Self {
        self.base_modules.push(Arc::new(module));
        self
    }

    /// Record a module as loaded by the host and shareable with plugins.
    pub fn register_module(&self, module: LuModule) -> Arc<LuModule> {
        let module = match module.origin() {
            LuModuleOrigin::Host => module,
            _ => rebuild_as_host(module),
        };
        let module = Arc::new(module);
        log::debug!(
            "host.module.register: host module registered - module={}, types={}",
            module.name(),
            module.types().len()
        );
        self.modules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&module));
        module
    }

    /// First host module with the given name.
    pub fn find_module(&self, name: &str) -> Option<Arc<LuModule>> {
        self.modules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    pub fn modules(&self) -> Vec<Arc<LuModule>> {
        self.modules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn base_modules(&self) -> &[Arc<LuModule>] {
        &self.base_modules
    }

    /// Consistent view of the host for one scan.
    pub fn snapshot(&self) -> LuHostSnapshot {
        LuHostSnapshot {
            base_modules: self.base_modules.clone(),
            modules: self.modules(),
            runtime_dir: self.runtime_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

fn rebuild_as_host(module: LuModule) -> LuModule {
    let mut builder = LuModule::builder(module.name()).origin(LuModuleOrigin::Host);
    if let Some(v) = module.file_version() {
        builder = builder.file_version(v);
    }
    if let Some(v) = module.product_version() {
        builder = builder.product_version(v);
    }
    if let Some(d) = module.description() {
        builder = builder.description(d);
    }
    if let Some(p) = module.path() {
        builder = builder.path(p);
    }
    if let Some(d) = module.digest() {
        builder = builder.digest(d);
    }
    for ty in module.types() {
        builder = builder.with_type(ty.as_ref().clone());
    }
    for dep in module.dependencies() {
        builder = builder.with_dependency(Arc::clone(dep));
    }
    for native in module.native_dependencies() {
        builder = builder.with_native_dependency(native.clone());
    }
    builder.build()
}

/// Immutable copy of the host state taken at the start of a scan.
#[derive(Clone, Debug, Default)]
pub struct LuHostSnapshot {
    pub base_modules: Vec<Arc<LuModule>>,
    pub modules: Vec<Arc<LuModule>>,
    pub runtime_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl LuHostSnapshot {
    /// Directories holding host module files, excluding the runtime
    /// directory and the host output directory.
    pub fn shared_directories(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut dirs = Vec::new();
        for module in &self.modules {
            let Some(dir) = module.path().and_then(Path::parent) else {
                continue;
            };
            if self.is_excluded(dir) {
                continue;
            }
            if seen.insert(dir.to_path_buf()) {
                dirs.push(dir.to_path_buf());
            }
        }
        dirs
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        [&self.runtime_dir, &self.output_dir]
            .into_iter()
            .flatten()
            .any(|excluded| same_dir(excluded, dir))
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
