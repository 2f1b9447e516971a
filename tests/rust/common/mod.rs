//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Lu.
//! The Lu project belongs to the Dunimd Team.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use lux::errors::{LuError, Result};
use lux::module::{
    LuModule, LuModuleActivator, LuModuleArchiveWriter, LuModuleManifest, LuModulePayload,
    LuTypeInfo,
};

pub const CONTRACTS: &str = "Contoso.Contracts";
pub const IOPERATOR: &str = "Contoso.Contracts.IOperator";

pub fn write_module(dir: &Path, file_name: &str, manifest: LuModuleManifest) -> PathBuf {
    let path = dir.join(file_name);
    LuModuleArchiveWriter::new(manifest).write_to(&path).unwrap();
    path
}

/// Shared contract module declaring `IOperator`.
pub fn contracts_manifest() -> LuModuleManifest {
    LuModuleManifest::new(CONTRACTS)
        .file_version("1.0.0.0")
        .with_type(LuTypeInfo::interface(IOPERATOR))
}

/// Same contracts as an in-memory host module.
pub fn contracts_module() -> LuModule {
    LuModule::builder(CONTRACTS)
        .file_version("1.0.0.0")
        .with_type(LuTypeInfo::interface(IOPERATOR))
        .build()
}

/// Module exporting one operator implementing `IOperator`.
pub fn operator_manifest(module: &str, type_name: &str) -> LuModuleManifest {
    LuModuleManifest::new(module)
        .file_version("2.0.0.0")
        .with_dependency(CONTRACTS)
        .with_type(LuTypeInfo::class(type_name).implements(IOPERATOR))
}

/// Module exporting one type unrelated to `IOperator`.
pub fn plain_manifest(module: &str, type_name: &str) -> LuModuleManifest {
    LuModuleManifest::new(module)
        .file_version("1.5")
        .with_type(LuTypeInfo::class(type_name))
}

/// Activator recording which modules were activated, optionally failing
/// for one module name.
#[derive(Debug, Default)]
pub struct RecordingActivator {
    pub count: AtomicUsize,
    pub activated: Mutex<Vec<String>>,
    pub fail_on: Option<String>,
}

impl RecordingActivator {
    pub fn failing_on(name: &str) -> Self {
        RecordingActivator {
            fail_on: Some(name.to_string()),
            ..RecordingActivator::default()
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().unwrap().clone()
    }
}

impl LuModuleActivator for RecordingActivator {
    fn activate(&self, module: &LuModule, _payload: Option<&LuModulePayload>) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_deref() == Some(module.name()) {
            return Err(LuError::activation(module.name(), "initializer failed"));
        }
        self.activated.lock().unwrap().push(module.name().to_string());
        Ok(())
    }
}
