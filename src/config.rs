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

//! # Lu Configuration Module
//!
//! Declarative description of a plugin setup, loaded from YAML or JSON and
//! turned into a [`LuCompositeCatalog`] whose children follow the order of
//! the `catalogs` list.
//!
//! ```yaml
//! name: plugins
//! catalogs:
//!   - kind: folder
//!     path: plugins
//!     include_subfolders: true
//!     host_sharing:
//!       selected: [Contoso.Contracts]
//!     criteria:
//!       - implements: Contoso.Contracts.IExporter
//!         is_abstract: false
//!         tags: [exporter]
//!   - kind: module
//!     path: extra/Reports.lum
//! ```
//!
//! Relative paths in a file loaded with [`LuConfig::from_path`] are resolved
//! against the file's directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::composite::LuCompositeCatalog;
use crate::catalog::folder::{LuFolderCatalog, LuFolderOptions};
use crate::catalog::module_catalog::{LuModuleCatalog, LuModuleCatalogOptions};
use crate::errors::{LuError, Result};
use crate::matching::criteria::LuCriteria;
use crate::module::archive::MODULE_FILE_EXTENSION;
use crate::module::host::LuHostContext;
use crate::module::loader::{LuDependencyHint, LuHostSharing, LuLoaderPolicy};
use crate::module::types::LuTypeRef;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LuConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub catalogs: Vec<LuCatalogSpec>,
}

impl Default for LuConfig {
    fn default() -> Self {
        LuConfig {
            name: default_name(),
            catalogs: Vec::new(),
        }
    }
}

fn default_name() -> String {
    "lu".to_string()
}

fn default_patterns() -> Vec<String> {
    vec![format!("*.{}", MODULE_FILE_EXTENSION)]
}

/// One catalog entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LuCatalogSpec {
    Folder {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        path: PathBuf,
        #[serde(default = "default_patterns")]
        search_patterns: Vec<String>,
        #[serde(default)]
        include_subfolders: bool,
        #[serde(default)]
        host_sharing: LuHostSharing,
        #[serde(default)]
        additional_search_paths: Vec<PathBuf>,
        #[serde(default)]
        dependency_hints: Vec<LuDependencyHint>,
        #[serde(default)]
        criteria: Vec<LuCriteriaSpec>,
    },
    Module {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        path: PathBuf,
        #[serde(default)]
        criteria: Vec<LuCriteriaSpec>,
        #[serde(default)]
        loader: LuLoaderPolicy,
    },
}

/// Serializable criteria. Type references are written `Full.Name` or
/// `Full.Name, Module`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuCriteriaSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignable_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_abstract: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_interface: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_attribute: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn parse_type_ref(value: &str) -> LuTypeRef {
    match value.split_once(',') {
        Some((name, module)) => LuTypeRef::in_module(name.trim(), module.trim()),
        None => LuTypeRef::new(value.trim()),
    }
}

impl LuCriteriaSpec {
    pub fn into_runtime(self) -> Result<LuCriteria> {
        let mut builder = LuCriteria::builder();
        if let Some(v) = &self.inherits {
            builder = builder.inherits(parse_type_ref(v));
        }
        if let Some(v) = &self.implements {
            builder = builder.implements(parse_type_ref(v));
        }
        if let Some(v) = &self.assignable_to {
            builder = builder.assignable_to(parse_type_ref(v));
        }
        if let Some(v) = self.is_abstract {
            builder = builder.is_abstract(v);
        }
        if let Some(v) = self.is_interface {
            builder = builder.is_interface(v);
        }
        if let Some(v) = self.name {
            builder = builder.named(v);
        }
        if let Some(v) = self.has_attribute {
            builder = builder.has_attribute(v);
        }
        for tag in self.tags {
            builder = builder.tag(tag);
        }
        builder.build()
    }
}

fn criteria_from_specs(specs: Vec<LuCriteriaSpec>) -> Result<Vec<LuCriteria>> {
    specs.into_iter().map(LuCriteriaSpec::into_runtime).collect()
}

impl LuConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a `.json` file as JSON and anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let mut config = if is_json {
            LuConfig::from_json_str(&text)?
        } else {
            LuConfig::from_yaml_str(&text)?
        };
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        log::debug!(
            "config.load: configuration loaded - path={}, catalogs={}",
            path.display(),
            config.catalogs.len()
        );
        Ok(config)
    }

    /// Make every relative path absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for spec in &mut self.catalogs {
            match spec {
                LuCatalogSpec::Folder {
                    path,
                    additional_search_paths,
                    dependency_hints,
                    ..
                } => {
                    rebase(path);
                    additional_search_paths.iter_mut().for_each(rebase);
                    dependency_hints.iter_mut().for_each(|h| rebase(&mut h.path));
                }
                LuCatalogSpec::Module { path, loader, .. } => {
                    rebase(path);
                    loader.additional_search_paths.iter_mut().for_each(rebase);
                    loader
                        .dependency_hints
                        .iter_mut()
                        .for_each(|h| rebase(&mut h.path));
                }
            }
        }
    }

    /// Build the catalogs. All validation happens here, before any scan.
    pub fn into_catalog(self, host: Arc<LuHostContext>) -> Result<LuCompositeCatalog> {
        let mut composite = LuCompositeCatalog::new(self.name);
        for spec in self.catalogs {
            match spec {
                LuCatalogSpec::Folder {
                    name,
                    path,
                    search_patterns,
                    include_subfolders,
                    host_sharing,
                    additional_search_paths,
                    dependency_hints,
                    criteria,
                } => {
                    let options = LuFolderOptions {
                        search_patterns,
                        include_subfolders,
                        host_sharing,
                        additional_search_paths,
                        dependency_hints,
                        criteria: criteria_from_specs(criteria)?,
                        ..LuFolderOptions::default()
                    };
                    let mut catalog = LuFolderCatalog::new(path, options, Arc::clone(&host))?;
                    if let Some(name) = name {
                        catalog = catalog.with_name(name);
                    }
                    composite.add_catalog(catalog)?;
                }
                LuCatalogSpec::Module {
                    name,
                    path,
                    criteria,
                    loader,
                } => {
                    if path.as_os_str().is_empty() {
                        return Err(LuError::configuration("module catalog path cannot be empty"));
                    }
                    let options = LuModuleCatalogOptions {
                        criteria: criteria_from_specs(criteria)?,
                        loader,
                        ..LuModuleCatalogOptions::default()
                    };
                    let mut catalog = LuModuleCatalog::from_path(path, options, Arc::clone(&host));
                    if let Some(name) = name {
                        catalog = catalog.with_name(name);
                    }
                    composite.add_catalog(catalog)?;
                }
            }
        }
        Ok(composite)
    }
}
