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

//! # Module and Type Descriptions
//!
//! A module owns a list of type descriptions. Type identity is the pair
//! (fully-qualified name, declaring module name). Two descriptions of the
//! same type coming from different loading contexts are distinct values and
//! are only ever compared through that identity, never by pointer.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;

/// Attribute whose value overrides the default plugin name.
pub const PLUGIN_NAME_ATTRIBUTE: &str = "Lu.PluginName";

/// Attribute whose value provides the default plugin description.
pub const DESCRIPTION_ATTRIBUTE: &str = "Lu.Description";

/// Callable body attached to generated types.
pub type LuInvoker = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Reference to a type by name, optionally qualified by its declaring module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LuTypeRef {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl LuTypeRef {
    pub fn new(full_name: impl Into<String>) -> Self {
        LuTypeRef {
            full_name: full_name.into(),
            module: None,
        }
    }

    pub fn in_module(full_name: impl Into<String>, module: impl Into<String>) -> Self {
        LuTypeRef {
            full_name: full_name.into(),
            module: Some(module.into()),
        }
    }

    /// Whether this reference names the given type. An unqualified
    /// reference matches any declaring module.
    pub fn refers_to(&self, ty: &LuTypeInfo) -> bool {
        self.full_name == ty.full_name
            && self.module.as_deref().map_or(true, |m| m == ty.module)
    }
}

impl From<&str> for LuTypeRef {
    fn from(value: &str) -> Self {
        LuTypeRef::new(value)
    }
}

impl From<String> for LuTypeRef {
    fn from(value: String) -> Self {
        LuTypeRef::new(value)
    }
}

impl fmt::Display for LuTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}, {}", self.full_name, module),
            None => write!(f, "{}", self.full_name),
        }
    }
}

/// Marker attached to a type. Comparison is by `type_name` only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuAttribute {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Description of one type declared by a module.
#[derive(Clone)]
pub struct LuTypeInfo {
    pub full_name: String,
    /// Name of the declaring module. Set by the module builder.
    pub module: String,
    pub is_abstract: bool,
    pub is_interface: bool,
    /// Only public types are visible to catalogs.
    pub is_public: bool,
    pub base: Option<LuTypeRef>,
    pub interfaces: Vec<LuTypeRef>,
    pub attributes: Vec<LuAttribute>,
    pub invoker: Option<LuInvoker>,
}

impl LuTypeInfo {
    /// Public, concrete class.
    pub fn class(full_name: impl Into<String>) -> Self {
        LuTypeInfo {
            full_name: full_name.into(),
            module: String::new(),
            is_abstract: false,
            is_interface: false,
            is_public: true,
            base: None,
            interfaces: Vec::new(),
            attributes: Vec::new(),
            invoker: None,
        }
    }

    pub fn interface(full_name: impl Into<String>) -> Self {
        LuTypeInfo {
            is_abstract: true,
            is_interface: true,
            ..LuTypeInfo::class(full_name)
        }
    }

    pub fn abstract_class(full_name: impl Into<String>) -> Self {
        LuTypeInfo {
            is_abstract: true,
            ..LuTypeInfo::class(full_name)
        }
    }

    pub fn extends(mut self, base: impl Into<LuTypeRef>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<LuTypeRef>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_attribute(mut self, type_name: impl Into<String>, value: Option<&str>) -> Self {
        self.attributes.push(LuAttribute {
            type_name: type_name.into(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn with_invoker(mut self, invoker: LuInvoker) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn internal(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Simple name: the part after the last `.`.
    pub fn name(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.full_name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.full_name.rsplit_once('.').map(|(ns, _)| ns)
    }

    pub fn attribute(&self, type_name: &str) -> Option<&LuAttribute> {
        self.attributes.iter().find(|a| a.type_name == type_name)
    }

    pub fn reference(&self) -> LuTypeRef {
        LuTypeRef::in_module(self.full_name.clone(), self.module.clone())
    }

    /// Identity comparison across loading contexts.
    pub fn is_same_type(&self, other: &LuTypeInfo) -> bool {
        self.full_name == other.full_name && self.module == other.module
    }

    /// Copy of this description without executable parts, for metadata-only
    /// views of already loaded modules.
    pub fn detached_copy(&self) -> LuTypeInfo {
        LuTypeInfo {
            invoker: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for LuTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuTypeInfo")
            .field("full_name", &self.full_name)
            .field("module", &self.module)
            .field("is_abstract", &self.is_abstract)
            .field("is_interface", &self.is_interface)
            .field("is_public", &self.is_public)
            .field("base", &self.base)
            .field("interfaces", &self.interfaces)
            .field("attributes", &self.attributes)
            .field("invocable", &self.invoker.is_some())
            .finish()
    }
}

/// Module lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LuModuleState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// Where a module came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LuModuleOrigin {
    /// Loaded by the host application and shareable with plugins.
    Host,
    /// Private copy loaded by a module loader.
    Isolated,
    /// Built in memory by a generator.
    Generated,
}

/// Native library required by a module. Never shared with the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LuNativeDependency {
    pub name: String,
    pub path: PathBuf,
}

impl LuNativeDependency {
    /// Open the library.
    ///
    /// # Safety
    ///
    /// Loading a native library runs its initialization routines; the caller
    /// vouches for the library at `path`.
    pub unsafe fn open(&self) -> Result<libloading::Library> {
        libloading::Library::new(&self.path).map_err(|e| {
            crate::errors::LuError::activation(
                self.name.clone(),
                format!("failed to open native library '{}': {}", self.path.display(), e),
            )
        })
    }
}

/// A module: the unit of loading. Exclusively owns its type descriptions.
#[derive(Debug)]
pub struct LuModule {
    name: String,
    file_version: Option<String>,
    product_version: Option<String>,
    description: Option<String>,
    path: Option<PathBuf>,
    digest: Option<String>,
    origin: LuModuleOrigin,
    types: Vec<Arc<LuTypeInfo>>,
    dependencies: Vec<Arc<LuModule>>,
    native_dependencies: Vec<LuNativeDependency>,
    state: RwLock<LuModuleState>,
}

impl LuModule {
    pub fn builder(name: impl Into<String>) -> LuModuleBuilder {
        LuModuleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_version(&self) -> Option<&str> {
        self.file_version.as_deref()
    }

    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// BLAKE3 digest of the archive the module was loaded from.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn origin(&self) -> LuModuleOrigin {
        self.origin
    }

    pub fn types(&self) -> &[Arc<LuTypeInfo>] {
        &self.types
    }

    pub fn exported_types(&self) -> impl Iterator<Item = &Arc<LuTypeInfo>> {
        self.types.iter().filter(|t| t.is_public)
    }

    pub fn type_named(&self, full_name: &str) -> Option<&Arc<LuTypeInfo>> {
        self.types.iter().find(|t| t.full_name == full_name)
    }

    /// Resolved managed dependencies, host-shared or isolated.
    pub fn dependencies(&self) -> &[Arc<LuModule>] {
        &self.dependencies
    }

    pub fn dependency(&self, name: &str) -> Option<&Arc<LuModule>> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    pub fn native_dependencies(&self) -> &[LuNativeDependency] {
        &self.native_dependencies
    }

    pub fn state(&self) -> LuModuleState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: LuModuleState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Number of type handles held outside of this module.
    pub fn outstanding_type_handles(&self) -> usize {
        self.types
            .iter()
            .map(|t| Arc::strong_count(t).saturating_sub(1))
            .sum()
    }
}

/// Builder for in-memory modules (host modules, generated modules, tests).
#[derive(Debug)]
pub struct LuModuleBuilder {
    name: String,
    file_version: Option<String>,
    product_version: Option<String>,
    description: Option<String>,
    path: Option<PathBuf>,
    digest: Option<String>,
    origin: LuModuleOrigin,
    types: Vec<LuTypeInfo>,
    dependencies: Vec<Arc<LuModule>>,
    native_dependencies: Vec<LuNativeDependency>,
    state: LuModuleState,
}

impl LuModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        LuModuleBuilder {
            name: name.into(),
            file_version: None,
            product_version: None,
            description: None,
            path: None,
            digest: None,
            origin: LuModuleOrigin::Generated,
            types: Vec::new(),
            dependencies: Vec::new(),
            native_dependencies: Vec::new(),
            state: LuModuleState::Loaded,
        }
    }

    pub fn file_version(mut self, version: impl Into<String>) -> Self {
        self.file_version = Some(version.into());
        self
    }

    pub fn product_version(mut self, version: impl Into<String>) -> Self {
        self.product_version = Some(version.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    pub fn origin(mut self, origin: LuModuleOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn state(mut self, state: LuModuleState) -> Self {
        self.state = state;
        self
    }

    pub fn with_type(mut self, ty: LuTypeInfo) -> Self {
        self.types.push(ty);
        self
    }

    pub fn with_dependency(mut self, module: Arc<LuModule>) -> Self {
        self.dependencies.push(module);
        self
    }

    pub fn with_native_dependency(mut self, dependency: LuNativeDependency) -> Self {
        self.native_dependencies.push(dependency);
        self
    }

    pub fn build(self) -> LuModule {
        let name = self.name;
        let types = self
            .types
            .into_iter()
            .map(|mut ty| {
                ty.module = name.clone();
                Arc::new(ty)
            })
            .collect();

        LuModule {
            name,
            file_version: self.file_version,
            product_version: self.product_version,
            description: self.description,
            path: self.path,
            digest: self.digest,
            origin: self.origin,
            types,
            dependencies: self.dependencies,
            native_dependencies: self.native_dependencies,
            state: RwLock::new(self.state),
        }
    }
}
