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

//! # Type Catalog
//!
//! Catalog over a single, externally supplied type. The type always yields
//! exactly one plugin; criteria only decide which tags it carries.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::plugin::{LuPlugin, LuPluginNaming};
use crate::catalog::{LuCatalog, LuCatalogState, LuCatalogStatus};
use crate::errors::{LuError, Result};
use crate::matching::context::LuLoadedContext;
use crate::matching::criteria::LuCriteria;
use crate::matching::finder::{LuTypeFinder, LuTypeMatch};
use crate::module::types::{LuModule, LuModuleOrigin, LuTypeInfo};
use crate::version::LuVersion;

#[derive(Debug)]
pub struct LuTypeCatalog {
    module: Arc<LuModule>,
    type_name: String,
    criteria: Vec<LuCriteria>,
    naming: LuPluginNaming,
    status: LuCatalogStatus,
}

impl LuTypeCatalog {
    /// Catalog over the type `type_name` declared by `module`.
    pub fn new(module: Arc<LuModule>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        LuTypeCatalog {
            module,
            status: LuCatalogStatus::new(type_name.clone()),
            type_name,
            criteria: Vec::new(),
            naming: LuPluginNaming::default(),
        }
    }

    /// Catalog over a standalone type, wrapped in a generated module.
    pub fn from_type(ty: LuTypeInfo) -> Self {
        let module_name = if ty.module.is_empty() {
            ty.full_name.clone()
        } else {
            ty.module.clone()
        };
        let type_name = ty.full_name.clone();
        let module = LuModule::builder(module_name)
            .origin(LuModuleOrigin::Generated)
            .with_type(ty)
            .build();
        LuTypeCatalog::new(Arc::new(module), type_name)
    }

    pub fn with_criteria(mut self, criteria: LuCriteria) -> Self {
        self.criteria.push(criteria);
        self
    }

    pub fn with_naming(mut self, naming: LuPluginNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn state(&self) -> &LuCatalogState {
        self.status.state()
    }

    fn build_plugin(&self) -> Result<LuPlugin> {
        let ty = self.module.type_named(&self.type_name).cloned().ok_or_else(|| {
            LuError::configuration(format!(
                "module '{}' does not declare type '{}'",
                self.module.name(),
                self.type_name
            ))
        })?;

        let mut tags = BTreeSet::new();
        {
            let ctx = LuLoadedContext::new(&self.module);
            for criteria in self
                .criteria
                .iter()
                .filter(|c| LuTypeFinder::is_match(c, &ty, &ctx))
            {
                tags.extend(criteria.tags().iter().cloned());
            }
        }

        Ok(self.naming.mint(
            &self.module,
            LuTypeMatch {
                type_info: ty,
                tags,
            },
            self.status.name(),
        ))
    }
}

#[async_trait]
impl LuCatalog for LuTypeCatalog {
    fn name(&self) -> &str {
        self.status.name()
    }

    async fn initialize(&mut self) -> Result<()> {
        if !self.status.begin()? {
            return Ok(());
        }
        match self.build_plugin() {
            Ok(plugin) => {
                self.status.commit(vec![plugin]);
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
