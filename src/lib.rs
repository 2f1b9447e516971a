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

//! # Lu Core Library
//!
//! Lu discovers plugins in executable modules and loads them into isolated
//! contexts. Modules are inspected through their metadata first; only
//! modules that declare a matching type are actually loaded.
//!
//! ## Module Overview
//!
//! - **errors**: `LuError` and the crate-wide `Result` alias
//! - **version**: four-part plugin versions
//! - **module**: module descriptions, module archives, the host context,
//!   activators and the isolated module loader
//! - **matching**: capability criteria, resolution contexts and the type
//!   matching engine
//! - **catalog**: the catalog contract and its module, type, generated,
//!   folder and composite implementations
//! - **config**: YAML/JSON configuration producing a composite catalog
//!
//! ## Feature Flags
//!
//! - `wasm`: executes WebAssembly payloads during real loads (wasmtime)
//! - `full`: enables all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use lux::{LuCatalog, LuCompositeCatalog, LuCriteria, LuFolderCatalog, LuFolderOptions, LuHostContext};
//!
//! # async fn run() -> lux::Result<()> {
//! let host = Arc::new(LuHostContext::new());
//! let options = LuFolderOptions::default()
//!     .recursive(true)
//!     .with_criteria(LuCriteria::builder().implements("Contoso.IExporter").tag("exporter").build()?);
//!
//! let mut catalog = LuCompositeCatalog::new("plugins")
//!     .with_catalog(LuFolderCatalog::new("plugins", options, Arc::clone(&host))?)?;
//! catalog.initialize().await?;
//!
//! for plugin in catalog.get_by_tag("exporter")? {
//!     println!("{} {}", plugin.name(), plugin.version());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, LuError>`. Lookups that find nothing
//! return `Ok(None)`; reading a catalog before it is initialized is an
//! error.

pub mod errors;
pub mod version;
pub mod module;
pub mod matching;
pub mod catalog;
pub mod config;

pub use errors::{LuError, Result};
pub use version::LuVersion;

pub use module::{
    LuHostContext, LuHostSharing, LuLoaderPolicy, LuDependencyHint, LuModule, LuModuleActivator,
    LuModuleArchiveWriter, LuModuleLoader, LuModuleManifest, LuModuleOrigin, LuModuleState,
    LuNoopActivator, LuPayloadKind, LuTypeInfo, LuTypeRef,
};
#[cfg(feature = "wasm")]
pub use module::LuWasmActivator;
pub use matching::{
    LuCriteria, LuCriteriaBuilder, LuLoadedContext, LuMetadataContext, LuTypeFinder, LuTypeMatch,
    LuTypeResolutionContext,
};
pub use catalog::{
    LuCatalog, LuCatalogState, LuCompositeCatalog, LuDelegateGenerator, LuFolderCatalog,
    LuFolderDiagnostic, LuFolderOptions, LuGeneratedCatalog, LuModuleCatalog,
    LuModuleCatalogOptions, LuModuleGenerator, LuModuleSource, LuPlugin, LuPluginNaming,
    LuTypeCatalog,
};
pub use config::{LuCatalogSpec, LuConfig, LuCriteriaSpec};
