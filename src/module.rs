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

//! # Module Layer
//!
//! Module descriptions, module archives, the host context and the isolated
//! module loader.

pub mod types;
pub mod archive;
pub mod host;
pub mod activator;
pub mod loader;

pub use types::{
    LuAttribute, LuInvoker, LuModule, LuModuleBuilder, LuModuleOrigin, LuModuleState,
    LuNativeDependency, LuTypeInfo, LuTypeRef, DESCRIPTION_ATTRIBUTE, PLUGIN_NAME_ATTRIBUTE,
};
pub use archive::{
    is_module_file, read_archive, read_manifest, LuDependencyManifest, LuModuleArchive,
    LuModuleArchiveWriter, LuModuleManifest, LuModulePayload, LuPayloadKind, LuTypeManifest,
    MANIFEST_ENTRY, MODULE_FILE_EXTENSION,
};
pub use host::{LuHostContext, LuHostSnapshot};
pub use activator::{default_activator, LuModuleActivator, LuNoopActivator};
#[cfg(feature = "wasm")]
pub use activator::LuWasmActivator;
pub use loader::{LuDependencyHint, LuHostSharing, LuLoaderPolicy, LuModuleLoader};
