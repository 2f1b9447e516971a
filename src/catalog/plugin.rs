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

//! # Plugins and Naming
//!
//! A [`LuPlugin`] is the immutable record a catalog mints for every matched
//! type. How a plugin is named and versioned is decided by a
//! [`LuPluginNaming`] strategy; the default strategy reads the
//! `Lu.PluginName` / `Lu.Description` attributes and the module's version
//! metadata.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::errors::{LuError, Result};
use crate::matching::finder::LuTypeMatch;
use crate::module::types::{
    LuModule, LuModuleState, LuTypeInfo, DESCRIPTION_ATTRIBUTE, PLUGIN_NAME_ATTRIBUTE,
};
use crate::version::LuVersion;

/// A discovered plugin.
///
/// Holding a plugin keeps its type description alive, which prevents the
/// owning module from being unloaded. The module itself is only referenced
/// weakly.
#[derive(Clone)]
pub struct LuPlugin {
    name: String,
    version: LuVersion,
    description: Option<String>,
    product_version: Option<String>,
    tags: BTreeSet<String>,
    module: Weak<LuModule>,
    type_info: Arc<LuTypeInfo>,
    catalog: String,
}

impl LuPlugin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> LuVersion {
        self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// First tag, or the empty string when untagged.
    pub fn tag(&self) -> &str {
        self.tags.iter().next().map(String::as_str).unwrap_or("")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Owning module, if it is still loaded.
    pub fn module(&self) -> Option<Arc<LuModule>> {
        self.module.upgrade()
    }

    pub fn type_info(&self) -> &Arc<LuTypeInfo> {
        &self.type_info
    }

    /// Name of the catalog that produced this plugin.
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Whether this plugin has the given identity key.
    pub fn is(&self, name: &str, version: &LuVersion) -> bool {
        self.name == name && self.version == *version
    }

    /// Call the plugin's type. Only generated types carry a callable body.
    pub fn invoke(&self, input: &Value) -> Result<Value> {
        let invoker = self.type_info.invoker.as_ref().ok_or_else(|| LuError::Invocation {
            plugin: self.name.clone(),
            message: format!("type '{}' is not invocable", self.type_info.full_name),
        })?;
        invoker(input).map_err(|e| match e {
            LuError::Invocation { .. } => e,
            other => LuError::Invocation {
                plugin: self.name.clone(),
                message: other.to_string(),
            },
        })
    }
}

impl fmt::Debug for LuPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuPlugin")
            .field("name", &self.name)
            .field("version", &self.version.to_string())
            .field("tags", &self.tags)
            .field("type", &self.type_info.full_name)
            .field("module", &self.type_info.module)
            .field("catalog", &self.catalog)
            .finish()
    }
}

/// A plugin whose type handle has been given back to its module.
///
/// Keeps the minted identity so the plugin can be re-published unchanged
/// when its module refuses to unload.
#[derive(Debug)]
pub(crate) struct LuReleasedPlugin {
    name: String,
    version: LuVersion,
    description: Option<String>,
    product_version: Option<String>,
    tags: BTreeSet<String>,
    module: Weak<LuModule>,
    type_name: String,
    catalog: String,
}

impl LuPlugin {
    pub(crate) fn release(self) -> LuReleasedPlugin {
        LuReleasedPlugin {
            name: self.name,
            version: self.version,
            description: self.description,
            product_version: self.product_version,
            tags: self.tags,
            module: self.module,
            type_name: self.type_info.full_name.clone(),
            catalog: self.catalog,
        }
    }
}

impl LuReleasedPlugin {
    /// The plugin again, or `None` once its module has been unloaded.
    pub(crate) fn reattach(self) -> Option<LuPlugin> {
        let module = self.module.upgrade()?;
        if module.state() == LuModuleState::Unloaded {
            return None;
        }
        let type_info = Arc::clone(module.type_named(&self.type_name)?);
        Some(LuPlugin {
            name: self.name,
            version: self.version,
            description: self.description,
            product_version: self.product_version,
            tags: self.tags,
            module: self.module,
            type_info,
            catalog: self.catalog,
        })
    }
}

type LuNameFn = Arc<dyn Fn(&LuModule, &LuTypeInfo) -> String + Send + Sync>;
type LuVersionFn = Arc<dyn Fn(&LuModule, &LuTypeInfo) -> LuVersion + Send + Sync>;
type LuTextFn = Arc<dyn Fn(&LuModule, &LuTypeInfo) -> Option<String> + Send + Sync>;

/// Naming strategy. Every function is called once per matched type while a
/// catalog initializes.
#[derive(Clone)]
pub struct LuPluginNaming {
    name: LuNameFn,
    version: LuVersionFn,
    description: LuTextFn,
    product_version: LuTextFn,
}

impl Default for LuPluginNaming {
    fn default() -> Self {
        LuPluginNaming {
            name: Arc::new(default_name),
            version: Arc::new(default_version),
            description: Arc::new(default_description),
            product_version: Arc::new(|module: &LuModule, _: &LuTypeInfo| {
                module.product_version().map(str::to_string)
            }),
        }
    }
}

impl LuPluginNaming {
    pub fn with_name<F>(mut self, f: F) -> Self
    where
        F: Fn(&LuModule, &LuTypeInfo) -> String + Send + Sync + 'static,
    {
        self.name = Arc::new(f);
        self
    }

    pub fn with_version<F>(mut self, f: F) -> Self
    where
        F: Fn(&LuModule, &LuTypeInfo) -> LuVersion + Send + Sync + 'static,
    {
        self.version = Arc::new(f);
        self
    }

    pub fn with_description<F>(mut self, f: F) -> Self
    where
        F: Fn(&LuModule, &LuTypeInfo) -> Option<String> + Send + Sync + 'static,
    {
        self.description = Arc::new(f);
        self
    }

    pub fn with_product_version<F>(mut self, f: F) -> Self
    where
        F: Fn(&LuModule, &LuTypeInfo) -> Option<String> + Send + Sync + 'static,
    {
        self.product_version = Arc::new(f);
        self
    }

    /// Build the plugin record for a matched type of `module`.
    pub fn mint(&self, module: &Arc<LuModule>, matched: LuTypeMatch, catalog: &str) -> LuPlugin {
        let ty = matched.type_info.as_ref();
        LuPlugin {
            name: (self.name)(module, ty),
            version: (self.version)(module, ty),
            description: (self.description)(module, ty),
            product_version: (self.product_version)(module, ty),
            tags: matched.tags,
            module: Arc::downgrade(module),
            type_info: matched.type_info,
            catalog: catalog.to_string(),
        }
    }
}

impl fmt::Debug for LuPluginNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuPluginNaming").finish_non_exhaustive()
    }
}

fn default_name(_: &LuModule, ty: &LuTypeInfo) -> String {
    ty.attribute(PLUGIN_NAME_ATTRIBUTE)
        .and_then(|a| a.value.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ty.full_name.clone())
}

fn default_version(module: &LuModule, _: &LuTypeInfo) -> LuVersion {
    module
        .file_version()
        .and_then(|v| LuVersion::parse(v).ok())
        .filter(|v| !v.is_zero())
        .unwrap_or(LuVersion::FALLBACK)
}

fn default_description(module: &LuModule, ty: &LuTypeInfo) -> Option<String> {
    ty.attribute(DESCRIPTION_ATTRIBUTE)
        .and_then(|a| a.value.clone())
        .or_else(|| module.description().map(str::to_string))
}

/// Reject the first (name, version) pair that occurs twice.
pub(crate) fn ensure_unique(catalog: &str, plugins: &[LuPlugin]) -> Result<()> {
    for (i, plugin) in plugins.iter().enumerate() {
        if plugins[..i].iter().any(|p| p.is(&plugin.name, &plugin.version)) {
            return Err(LuError::DuplicatePlugin {
                catalog: catalog.to_string(),
                name: plugin.name.clone(),
                version: plugin.version.to_string(),
            });
        }
    }
    Ok(())
}
