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

//! # Lu Error Module
//!
//! This module defines the error type shared by every catalog, loader and
//! matching component of Lu.
//!
//! ## Error Categories
//!
//! - **Discovery**: a candidate file could not be read as a module during a
//!   metadata-only prescan. Folder catalogs skip such files.
//! - **Load**: a real module load failed (`ModuleNotFound`,
//!   `DependencyUnresolved`, `UnsupportedBinaryFormat`, `Activation`,
//!   `DuplicatePlugin`). Loads fail atomically.
//! - **Configuration**: invalid criteria, options or configuration files.
//!   Raised at construction time, never on first use.
//! - **Lifecycle**: catalogs or modules used in the wrong state
//!   (`NotInitialized`, `AlreadyInitialized`, `ModuleInUse`).
//! - **Infrastructure**: IO, serialization and archive failures.
//!
//! A lookup that finds nothing is not an error; lookups return `Ok(None)`.
//!
//! ## Usage
//!
//! ```rust
//! use lux::errors::{Result, LuError};
//!
//! fn require_glob(glob: &str) -> Result<()> {
//!     if glob.trim().is_empty() {
//!         return Err(LuError::configuration("name glob cannot be blank"));
//!     }
//!     Ok(())
//! }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;

/// Convenience result type used throughout Lu.
pub type Result<T> = std::result::Result<T, LuError>;

/// Canonical error enumeration for Lu.
///
/// Errors are `Clone` so that a failed catalog can keep its failure and
/// resurface it on every later initialization attempt.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LuError {
    /// Errors originating from the filesystem.
    #[error("io error: {0}")]
    Io(String),

    /// Wrapper for serialization issues (manifests, configuration files).
    #[error("serialization error: {0}")]
    Serde(String),

    /// Errors originating from module archive operations.
    #[error("zip error: {0}")]
    Zip(String),

    /// A candidate file could not be inspected during a metadata-only scan.
    #[error("discovery error for '{path}': {message}")]
    Discovery { path: String, message: String },

    /// The module file to load does not exist.
    #[error("module not found: {path}")]
    ModuleNotFound { path: String },

    /// A declared dependency could not be satisfied from the host or from
    /// the module's own layout.
    #[error("dependency '{dependency}' of module '{module}' could not be resolved: {message}")]
    DependencyUnresolved {
        module: String,
        dependency: String,
        message: String,
    },

    /// The file is not a module archive, or its manifest is unreadable.
    #[error("unsupported binary format for '{path}': {message}")]
    UnsupportedBinaryFormat { path: String, message: String },

    /// Running a module's initializers failed.
    #[error("activation of module '{module}' failed: {message}")]
    Activation { module: String, message: String },

    /// Two plugins with the same name and version inside one catalog.
    #[error("catalog '{catalog}' already contains plugin '{name}' version {version}")]
    DuplicatePlugin {
        catalog: String,
        name: String,
        version: String,
    },

    /// Invalid criteria, options or configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A catalog was read before it finished initializing.
    #[error("catalog '{catalog}' is not initialized")]
    NotInitialized { catalog: String },

    /// A catalog was modified after initialization started.
    #[error("catalog '{catalog}' is already initialized")]
    AlreadyInitialized { catalog: String },

    /// A module cannot be unloaded because handles to its types are still
    /// held by the caller.
    #[error("module '{module}' is still in use: {outstanding} outstanding type handle(s)")]
    ModuleInUse { module: String, outstanding: usize },

    /// A plugin was invoked but its type carries no invoker.
    #[error("plugin '{plugin}' cannot be invoked: {message}")]
    Invocation { plugin: String, message: String },

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for LuError {
    fn from(err: io::Error) -> Self {
        LuError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LuError {
    fn from(err: serde_json::Error) -> Self {
        LuError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for LuError {
    fn from(err: serde_yaml::Error) -> Self {
        LuError::Serde(err.to_string())
    }
}

impl From<ZipError> for LuError {
    fn from(err: ZipError) -> Self {
        LuError::Zip(err.to_string())
    }
}

impl LuError {
    /// Helper to construct configuration errors.
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        LuError::Configuration {
            message: message.into(),
        }
    }

    /// Helper to construct discovery errors.
    pub fn discovery(path: impl Into<String>, message: impl Into<String>) -> Self {
        LuError::Discovery {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Helper to construct unsupported format errors.
    pub fn unsupported_format(path: impl Into<String>, message: impl Into<String>) -> Self {
        LuError::UnsupportedBinaryFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Helper to construct unresolved dependency errors.
    pub fn unresolved(
        module: impl Into<String>,
        dependency: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LuError::DependencyUnresolved {
            module: module.into(),
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// Helper to construct activation errors.
    pub fn activation(module: impl Into<String>, message: impl Into<String>) -> Self {
        LuError::Activation {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        LuError::Internal(message.into())
    }

    /// Whether this error belongs to the load category, i.e. a real module
    /// load failed and the owning catalog must not expose partial results.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            LuError::ModuleNotFound { .. }
                | LuError::DependencyUnresolved { .. }
                | LuError::UnsupportedBinaryFormat { .. }
                | LuError::Activation { .. }
                | LuError::DuplicatePlugin { .. }
        )
    }
}
