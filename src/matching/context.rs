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

//! # Type Resolution Contexts
//!
//! The matching engine resolves type references through a context instead
//! of following pointers, so that the same criteria can be evaluated
//! against a metadata-only view of module files and against loaded modules.
//!
//! - [`LuMetadataContext`] reads manifests only. Types it hands out are
//!   detached copies and can never be executed.
//! - [`LuLoadedContext`] covers a loaded module and its transitive
//!   dependencies.
//!
//! Both resolve in scope order: the first module declaring a matching type
//! wins.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::errors::Result;
use crate::module::archive::{read_manifest, LuModuleManifest, MODULE_FILE_EXTENSION};
use crate::module::types::{LuModule, LuTypeInfo, LuTypeRef};

/// Resolves type references to type descriptions.
pub trait LuTypeResolutionContext: Send + Sync {
    fn resolve(&self, reference: &LuTypeRef) -> Option<Arc<LuTypeInfo>>;
}

/// Manifests read during one scan, shared by concurrent prescan tasks.
/// Failed reads are cached too.
#[derive(Debug, Default)]
pub struct LuManifestCache {
    entries: Mutex<HashMap<PathBuf, Result<Arc<LuModuleManifest>>>>,
}

impl LuManifestCache {
    pub fn new() -> Self {
        LuManifestCache::default()
    }

    pub fn get(&self, path: &Path) -> Result<Arc<LuModuleManifest>> {
        if let Some(entry) = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
        {
            return entry.clone();
        }

        // Read outside the lock; a concurrent reader of the same path
        // produces an identical entry.
        let entry = read_manifest(path).map(Arc::new);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_path_buf())
            .or_insert(entry)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
enum ScopeEntry {
    /// Already loaded module, seen through detached copies.
    Module(Vec<Arc<LuTypeInfo>>),
    /// Module file, read lazily on first resolution.
    File {
        path: PathBuf,
        types: OnceLock<Vec<Arc<LuTypeInfo>>>,
    },
}

/// Metadata-only resolution scope.
#[derive(Debug)]
pub struct LuMetadataContext {
    cache: Arc<LuManifestCache>,
    entries: Vec<ScopeEntry>,
    seen: HashSet<String>,
    discarded: Vec<PathBuf>,
}

impl LuMetadataContext {
    pub fn new(cache: Arc<LuManifestCache>) -> Self {
        LuMetadataContext {
            cache,
            entries: Vec::new(),
            seen: HashSet::new(),
            discarded: Vec::new(),
        }
    }

    /// Add an already loaded module. Returns false when a module with the
    /// same file name is already in scope.
    pub fn add_module(&mut self, module: &LuModule) -> bool {
        let key = module
            .path()
            .and_then(file_key)
            .unwrap_or_else(|| format!("{}.{}", module.name(), MODULE_FILE_EXTENSION).to_lowercase());
        if !self.seen.insert(key) {
            if let Some(path) = module.path() {
                self.discarded.push(path.to_path_buf());
            }
            return false;
        }
        let types = module
            .types()
            .iter()
            .map(|t| Arc::new(t.detached_copy()))
            .collect();
        self.entries.push(ScopeEntry::Module(types));
        true
    }

    /// Add a module file. Returns false when a file with the same name is
    /// already in scope; the later path is discarded.
    pub fn add_file(&mut self, path: &Path) -> bool {
        let Some(key) = file_key(path) else {
            return false;
        };
        if !self.seen.insert(key) {
            self.discarded.push(path.to_path_buf());
            return false;
        }
        self.entries.push(ScopeEntry::File {
            path: path.to_path_buf(),
            types: OnceLock::new(),
        });
        true
    }

    /// Paths dropped because an earlier entry had the same file name.
    pub fn discarded(&self) -> &[PathBuf] {
        &self.discarded
    }

    /// Module files in scope, in scope order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|e| match e {
            ScopeEntry::File { path, .. } => Some(path.as_path()),
            ScopeEntry::Module(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_types<'a>(&self, entry: &'a ScopeEntry) -> &'a [Arc<LuTypeInfo>] {
        match entry {
            ScopeEntry::Module(types) => types,
            ScopeEntry::File { path, types } => types.get_or_init(|| match self.cache.get(path) {
                Ok(manifest) => manifest.type_infos().into_iter().map(Arc::new).collect(),
                Err(e) => {
                    log::debug!(
                        "matching.scope.unreadable: module file ignored for resolution - path={}, error={}",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            }),
        }
    }
}

impl LuTypeResolutionContext for LuMetadataContext {
    fn resolve(&self, reference: &LuTypeRef) -> Option<Arc<LuTypeInfo>> {
        self.entries.iter().find_map(|entry| {
            self.entry_types(entry)
                .iter()
                .find(|t| reference.refers_to(t))
                .cloned()
        })
    }
}

fn file_key(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_lowercase)
}

/// Resolution scope of a loaded module: the module followed by its
/// transitive dependencies, breadth first.
#[derive(Debug)]
pub struct LuLoadedContext {
    modules: Vec<Arc<LuModule>>,
}

impl LuLoadedContext {
    pub fn new(root: &Arc<LuModule>) -> Self {
        let mut modules: Vec<Arc<LuModule>> = Vec::new();
        let mut queue = vec![Arc::clone(root)];
        while !queue.is_empty() {
            let module = queue.remove(0);
            if modules.iter().any(|m| m.name() == module.name()) {
                continue;
            }
            queue.extend(module.dependencies().iter().cloned());
            modules.push(module);
        }
        LuLoadedContext { modules }
    }

    pub fn modules(&self) -> &[Arc<LuModule>] {
        &self.modules
    }
}

impl LuTypeResolutionContext for LuLoadedContext {
    fn resolve(&self, reference: &LuTypeRef) -> Option<Arc<LuTypeInfo>> {
        self.modules.iter().find_map(|m| {
            m.types()
                .iter()
                .find(|t| reference.refers_to(t))
                .cloned()
        })
    }
}
