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

//! # Single-Module Catalog
//!
//! Wraps one module. A module file is loaded through its own
//! [`LuModuleLoader`] on a blocking task; an already built module (host or
//! generated) is used as is. Exported types are matched against the
//! catalog's criteria and turned into plugins by the naming policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::plugin::{ensure_unique, LuPlugin, LuPluginNaming};
use crate::catalog::{LuCatalog, LuCatalogState, LuCatalogStatus};
use crate::errors::{LuError, Result};
use crate::matching::context::LuLoadedContext;
use crate::matching::criteria::LuCriteria;
use crate::matching::finder::LuTypeFinder;
use crate::module::activator::LuModuleActivator;
use crate::module::host::LuHostContext;
use crate::module::loader::{LuLoaderPolicy, LuModuleLoader};
use crate::module::types::LuModule;
use crate::version::LuVersion;

#[derive(Clone, Debug)]
pub enum LuModuleSource {
    /// Module archive, loaded into an isolated context.
    Path(PathBuf),
    /// Module already loaded by the host or built in memory.
    Module(Arc<LuModule>),
}

#[derive(Clone, Debug, Default)]
pub struct LuModuleCatalogOptions {
    pub criteria: Vec<LuCriteria>,
    pub naming: LuPluginNaming,
    pub loader: LuLoaderPolicy,
    /// Overrides the default activator for real loads.
    pub activator: Option<Arc<dyn LuModuleActivator>>,
}

impl LuModuleCatalogOptions {
    pub fn with_criteria(mut self, criteria: LuCriteria) -> Self {
        self.criteria.push(criteria);
        self
    }

    pub fn with_naming(mut self, naming: LuPluginNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_loader(mut self, loader: LuLoaderPolicy) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_activator(mut self, activator: Arc<dyn LuModuleActivator>) -> Self {
        self.activator = Some(activator);
        self
    }
}

#[derive(Debug)]
pub struct LuModuleCatalog {
    source: LuModuleSource,
    options: LuModuleCatalogOptions,
    host: Arc<LuHostContext>,
    status: LuCatalogStatus,
    loader: Option<LuModuleLoader>,
    module: Option<Arc<LuModule>>,
}

impl LuModuleCatalog {
    pub fn from_path(
        path: impl Into<PathBuf>,
        options: LuModuleCatalogOptions,
        host: Arc<LuHostContext>,
    ) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();
        LuModuleCatalog {
            source: LuModuleSource::Path(path),
            options,
            host,
            status: LuCatalogStatus::new(name),
            loader: None,
            module: None,
        }
    }

    pub fn from_module(
        module: Arc<LuModule>,
        options: LuModuleCatalogOptions,
        host: Arc<LuHostContext>,
    ) -> Self {
        let name = module.name().to_string();
        LuModuleCatalog {
            source: LuModuleSource::Module(module),
            options,
            host,
            status: LuCatalogStatus::new(name),
            loader: None,
            module: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.status = LuCatalogStatus::new(name);
        self
    }

    pub fn source(&self) -> &LuModuleSource {
        &self.source
    }

    pub fn source_path(&self) -> Option<&Path> {
        match &self.source {
            LuModuleSource::Path(p) => Some(p),
            LuModuleSource::Module(_) => None,
        }
    }

    pub fn state(&self) -> &LuCatalogState {
        self.status.state()
    }

    /// The catalog's module once initialized.
    pub fn module(&self) -> Option<&Arc<LuModule>> {
        self.module.as_ref()
    }

    fn collect_plugins(&self, module: &Arc<LuModule>) -> Result<Vec<LuPlugin>> {
        let matches = {
            let ctx = LuLoadedContext::new(module);
            LuTypeFinder::find(&self.options.criteria, module.types(), &ctx)
        };
        let plugins: Vec<LuPlugin> = matches
            .into_iter()
            .map(|m| self.options.naming.mint(module, m, self.status.name()))
            .collect();
        ensure_unique(self.status.name(), &plugins)?;
        Ok(plugins)
    }

    async fn load(&self, path: &Path) -> Result<(LuModuleLoader, Arc<LuModule>)> {
        let path = path.to_path_buf();
        let policy = self.options.loader.clone();
        let host = Arc::clone(&self.host);
        let activator = self.options.activator.clone();

        tokio::task::spawn_blocking(move || -> Result<(LuModuleLoader, Arc<LuModule>)> {
            let mut loader = LuModuleLoader::new(policy, host);
            if let Some(activator) = activator {
                loader = loader.with_activator(activator);
            }
            let module = loader.load(&path)?;
            Ok((loader, module))
        })
        .await
        .map_err(|e| LuError::internal(format!("module load task failed: {}", e)))?
    }

    /// Drop the plugins and unload the module, returning the catalog to
    /// `Uninitialized`.
    ///
    /// Fails with [`LuError::ModuleInUse`] while plugins handed out by this
    /// catalog are still held; the catalog then stays initialized.
    pub fn unload(&mut self) -> Result<()> {
        let initialized = self.status.is_initialized();
        let released: Vec<_> = self.status.reset().into_iter().map(LuPlugin::release).collect();
        if let Some(loader) = self.loader.as_mut() {
            if let Err(e) = loader.unload() {
                if initialized {
                    let plugins = released.into_iter().filter_map(|p| p.reattach()).collect();
                    self.status.restore(plugins);
                }
                return Err(e);
            }
        }
        self.loader = None;
        self.module = None;
        log::info!("catalog.unload: catalog unloaded - catalog={}", self.status.name());
        Ok(())
    }
}

#[async_trait]
impl LuCatalog for LuModuleCatalog {
    fn name(&self) -> &str {
        self.status.name()
    }

    async fn initialize(&mut self) -> Result<()> {
        if !self.status.begin()? {
            return Ok(());
        }

        let (loader, module) = match &self.source {
            LuModuleSource::Module(module) => (None, Arc::clone(module)),
            LuModuleSource::Path(path) => {
                let path = path.clone();
                match self.load(&path).await {
                    Ok((loader, module)) => (Some(loader), module),
                    Err(e) => return Err(self.status.fail(e)),
                }
            }
        };

        let plugins = match self.collect_plugins(&module) {
            Ok(plugins) => plugins,
            Err(e) => {
                if let Some(mut loader) = loader {
                    if let Err(unload_error) = loader.unload() {
                        log::warn!(
                            "catalog.unload_failed: module left loaded - catalog={}, error={}",
                            self.status.name(),
                            unload_error
                        );
                    }
                }
                return Err(self.status.fail(e));
            }
        };

        self.loader = loader;
        self.module = Some(module);
        self.status.commit(plugins);
        Ok(())
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
