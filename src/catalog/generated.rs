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

//! # Generated-Module Catalogs
//!
//! A [`LuModuleGenerator`] produces a module in memory, for instance from a
//! Rust closure. The generated module is fed through a single-module
//! catalog and honors the same contract as a module loaded from disk.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::module_catalog::{LuModuleCatalog, LuModuleCatalogOptions};
use crate::catalog::plugin::LuPlugin;
use crate::catalog::{LuCatalog, LuCatalogState, LuCatalogStatus};
use crate::errors::Result;
use crate::module::host::LuHostContext;
use crate::module::types::{LuModule, LuModuleOrigin, LuTypeInfo, PLUGIN_NAME_ATTRIBUTE};
use crate::version::LuVersion;

/// Produces a module in memory.
#[async_trait]
pub trait LuModuleGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, host: &LuHostContext) -> Result<LuModule>;
}

/// Generator turning one closure into a one-type module whose plugin can be
/// called with [`LuPlugin::invoke`].
pub struct LuDelegateGenerator {
    name: String,
    version: Option<LuVersion>,
    description: Option<String>,
    body: Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>,
}

impl LuDelegateGenerator {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        LuDelegateGenerator {
            name: name.into(),
            version: None,
            description: None,
            body: Arc::new(body),
        }
    }

    pub fn with_version(mut self, version: LuVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn type_name(&self) -> String {
        let sanitized: String = self
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        format!("Lu.Generated.{}", sanitized)
    }
}

impl fmt::Debug for LuDelegateGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuDelegateGenerator")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LuModuleGenerator for LuDelegateGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, _host: &LuHostContext) -> Result<LuModule> {
        let type_name = self.type_name();
        let mut builder = LuModule::builder(type_name.clone())
            .origin(LuModuleOrigin::Generated)
            .with_type(
                LuTypeInfo::class(type_name)
                    .with_attribute(PLUGIN_NAME_ATTRIBUTE, Some(self.name.as_str()))
                    .with_invoker(Arc::clone(&self.body)),
            );
        if let Some(version) = self.version {
            builder = builder.file_version(version.to_string());
        }
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        Ok(builder.build())
    }
}

/// Catalog over a generated module.
pub struct LuGeneratedCatalog {
    generator: Box<dyn LuModuleGenerator>,
    options: LuModuleCatalogOptions,
    host: Arc<LuHostContext>,
    status: LuCatalogStatus,
    inner: Option<LuModuleCatalog>,
}

impl LuGeneratedCatalog {
    pub fn new(
        generator: impl LuModuleGenerator + 'static,
        options: LuModuleCatalogOptions,
        host: Arc<LuHostContext>,
    ) -> Self {
        let name = generator.name().to_string();
        LuGeneratedCatalog {
            generator: Box::new(generator),
            options,
            host,
            status: LuCatalogStatus::new(name),
            inner: None,
        }
    }

    /// Catalog exposing one closure as a plugin named `name`.
    pub fn delegate<F>(name: impl Into<String>, body: F, host: Arc<LuHostContext>) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        LuGeneratedCatalog::new(
            LuDelegateGenerator::new(name, body),
            LuModuleCatalogOptions::default(),
            host,
        )
    }

    pub fn state(&self) -> &LuCatalogState {
        self.status.state()
    }

    async fn build(&self) -> Result<(LuModuleCatalog, Vec<LuPlugin>)> {
        let module = self.generator.generate(&self.host).await?;
        log::debug!(
            "catalog.generate: module generated - catalog={}, module={}, types={}",
            self.status.name(),
            module.name(),
            module.types().len()
        );
        let mut inner = LuModuleCatalog::from_module(
            Arc::new(module),
            self.options.clone(),
            Arc::clone(&self.host),
        )
        .with_name(self.status.name());
        inner.initialize().await?;
        let plugins = inner.get_plugins()?;
        Ok((inner, plugins))
    }
}

impl fmt::Debug for LuGeneratedCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuGeneratedCatalog")
            .field("name", &self.status.name())
            .field("state", self.status.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LuCatalog for LuGeneratedCatalog {
    fn name(&self) -> &str {
        self.status.name()
    }

    async fn initialize(&mut self) -> Result<()> {
        if !self.status.begin()? {
            return Ok(());
        }
        match self.build().await {
            Ok((inner, plugins)) => {
                self.inner = Some(inner);
                self.status.commit(plugins);
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
