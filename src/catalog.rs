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

//! # Catalog Module
//!
//! A catalog is a source of plugins. Every catalog follows the same
//! lifecycle:
//!
//! ```text
//! Uninitialized -> Initializing -> Initialized
//!                       |
//!                       +-------> Failed (terminal)
//! ```
//!
//! - `initialize` is a no-op once `Initialized`; a `Failed` catalog returns
//!   its stored error on every later call.
//! - Reads before `Initialized` fail with [`LuError::NotInitialized`].
//! - An initialization whose future was dropped leaves the catalog in
//!   `Initializing` with no plugins visible; it may be initialized again.
//!
//! ## Catalog Kinds
//!
//! - [`LuModuleCatalog`]: one module file or one already built module.
//! - [`LuTypeCatalog`]: one externally supplied type.
//! - [`LuGeneratedCatalog`]: a module produced by a [`LuModuleGenerator`].
//! - [`LuFolderCatalog`]: a directory scanned in two phases.
//! - [`LuCompositeCatalog`]: ordered aggregation of other catalogs.

use async_trait::async_trait;

use crate::errors::{LuError, Result};
use crate::version::LuVersion;

pub mod plugin;
pub mod module_catalog;
pub mod type_catalog;
pub mod generated;
pub mod folder;
pub mod composite;

pub use plugin::{LuPlugin, LuPluginNaming};
pub use module_catalog::{LuModuleCatalog, LuModuleCatalogOptions, LuModuleSource};
pub use type_catalog::LuTypeCatalog;
pub use generated::{LuDelegateGenerator, LuGeneratedCatalog, LuModuleGenerator};
pub use folder::{LuFolderCatalog, LuFolderDiagnostic, LuFolderOptions};
pub use composite::LuCompositeCatalog;

/// Common contract of every plugin source.
#[async_trait]
pub trait LuCatalog: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn get_plugins(&self) -> Result<Vec<LuPlugin>>;

    /// Plugin with the given name and version. `Ok(None)` when absent.
    fn get(&self, name: &str, version: &LuVersion) -> Result<Option<LuPlugin>>;

    fn get_by_tag(&self, tag: &str) -> Result<Vec<LuPlugin>> {
        Ok(self
            .get_plugins()?
            .into_iter()
            .filter(|p| p.has_tag(tag))
            .collect())
    }

    /// Highest version of the named plugin. The first one wins on ties.
    fn get_latest(&self, name: &str) -> Result<Option<LuPlugin>> {
        let mut latest: Option<LuPlugin> = None;
        for plugin in self.get_plugins()?.into_iter().filter(|p| p.name() == name) {
            if latest.as_ref().map_or(true, |l| plugin.version() > l.version()) {
                latest = Some(plugin);
            }
        }
        Ok(latest)
    }
}

/// Lifecycle state of a catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LuCatalogState {
    #[default]
    Uninitialized,
    Initializing,
    Initialized,
    Failed(LuError),
}

/// Lifecycle bookkeeping shared by catalog implementations.
#[derive(Clone, Debug)]
pub(crate) struct LuCatalogStatus {
    name: String,
    state: LuCatalogState,
    plugins: Vec<LuPlugin>,
}

impl LuCatalogStatus {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        LuCatalogStatus {
            name: name.into(),
            state: LuCatalogState::Uninitialized,
            plugins: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> &LuCatalogState {
        &self.state
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.state == LuCatalogState::Initialized
    }

    /// Enter `Initializing`. `Ok(false)` means there is nothing to do.
    pub(crate) fn begin(&mut self) -> Result<bool> {
        match &self.state {
            LuCatalogState::Initialized => Ok(false),
            LuCatalogState::Failed(e) => Err(e.clone()),
            LuCatalogState::Uninitialized | LuCatalogState::Initializing => {
                if self.state == LuCatalogState::Initializing {
                    log::debug!(
                        "catalog.init.resume: previous initialization was abandoned, starting over - catalog={}",
                        self.name
                    );
                }
                self.state = LuCatalogState::Initializing;
                Ok(true)
            }
        }
    }

    /// Publish the plugins and enter `Initialized`.
    pub(crate) fn commit(&mut self, plugins: Vec<LuPlugin>) {
        log::info!(
            "catalog.init: catalog initialized - catalog={}, plugins={}",
            self.name,
            plugins.len()
        );
        self.plugins = plugins;
        self.state = LuCatalogState::Initialized;
    }

    /// Enter `Failed` and hand the error back to the caller.
    pub(crate) fn fail(&mut self, error: LuError) -> LuError {
        log::error!(
            "catalog.init.failed: catalog initialization failed - catalog={}, error={}",
            self.name,
            error
        );
        self.plugins.clear();
        self.state = LuCatalogState::Failed(error.clone());
        error
    }

    /// Back to `Uninitialized`, handing the published plugins back.
    pub(crate) fn reset(&mut self) -> Vec<LuPlugin> {
        self.state = LuCatalogState::Uninitialized;
        std::mem::take(&mut self.plugins)
    }

    /// Re-publish plugins taken by [`reset`](Self::reset) after an unload
    /// was refused.
    pub(crate) fn restore(&mut self, plugins: Vec<LuPlugin>) {
        log::debug!(
            "catalog.unload.restored: unload refused, plugins restored - catalog={}, plugins={}",
            self.name,
            plugins.len()
        );
        self.plugins = plugins;
        self.state = LuCatalogState::Initialized;
    }

    pub(crate) fn plugins(&self) -> Result<&[LuPlugin]> {
        if !self.is_initialized() {
            return Err(LuError::NotInitialized {
                catalog: self.name.clone(),
            });
        }
        Ok(&self.plugins)
    }

    pub(crate) fn get(&self, name: &str, version: &LuVersion) -> Result<Option<LuPlugin>> {
        Ok(self
            .plugins()?
            .iter()
            .find(|p| p.is(name, version))
            .cloned())
    }
}
