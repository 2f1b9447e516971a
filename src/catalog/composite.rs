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

//! # Composite Catalog
//!
//! Ordered aggregation of catalogs. Children initialize one after another in
//! registration order and the first failure fails the composite. Plugins
//! are concatenated in child order; duplicates across children are kept and
//! [`LuCatalog::get`] returns the first child's match.

use async_trait::async_trait;

use crate::catalog::plugin::LuPlugin;
use crate::catalog::{LuCatalog, LuCatalogState, LuCatalogStatus};
use crate::errors::{LuError, Result};
use crate::version::LuVersion;

pub struct LuCompositeCatalog {
    status: LuCatalogStatus,
    children: Vec<Box<dyn LuCatalog>>,
}

impl LuCompositeCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        LuCompositeCatalog {
            status: LuCatalogStatus::new(name),
            children: Vec::new(),
        }
    }

    /// Register a child. Rejected once initialization has started.
    pub fn add_catalog(&mut self, catalog: impl LuCatalog + 'static) -> Result<()> {
        self.add_boxed(Box::new(catalog))
    }

    pub fn add_boxed(&mut self, catalog: Box<dyn LuCatalog>) -> Result<()> {
        if *self.status.state() != LuCatalogState::Uninitialized {
            return Err(LuError::AlreadyInitialized {
                catalog: self.status.name().to_string(),
            });
        }
        log::debug!(
            "catalog.composite.add: child registered - catalog={}, child={}, position={}",
            self.status.name(),
            catalog.name(),
            self.children.len()
        );
        self.children.push(catalog);
        Ok(())
    }

    pub fn with_catalog(mut self, catalog: impl LuCatalog + 'static) -> Result<Self> {
        self.add_catalog(catalog)?;
        Ok(self)
    }

    pub fn state(&self) -> &LuCatalogState {
        self.status.state()
    }

    pub fn children(&self) -> impl Iterator<Item = &dyn LuCatalog> {
        self.children.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl std::fmt::Debug for LuCompositeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuCompositeCatalog")
            .field("name", &self.status.name())
            .field("state", self.status.state())
            .field(
                "children",
                &self.children.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[async_trait]
impl LuCatalog for LuCompositeCatalog {
    fn name(&self) -> &str {
        self.status.name()
    }

    async fn initialize(&mut self) -> Result<()> {
        if !self.status.begin()? {
            return Ok(());
        }

        for child in &mut self.children {
            if let Err(e) = child.initialize().await {
                log::error!(
                    "catalog.composite.child_failed: child initialization failed - catalog={}, child={}",
                    self.status.name(),
                    child.name()
                );
                return Err(self.status.fail(e));
            }
        }

        let mut plugins = Vec::new();
        for child in &self.children {
            match child.get_plugins() {
                Ok(child_plugins) => plugins.extend(child_plugins),
                Err(e) => return Err(self.status.fail(e)),
            }
        }
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
        self.status.plugins()?;
        for child in &self.children {
            if let Some(plugin) = child.get(name, version)? {
                return Ok(Some(plugin));
            }
        }
        Ok(None)
    }
}
