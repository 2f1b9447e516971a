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

//! # Module Archive Module
//!
//! A module file is a ZIP archive with a JSON manifest entry (`module.json`)
//! and an optional WebAssembly payload (`module.wasm` or `module.wat`).
//!
//! Two read paths exist:
//!
//! - [`read_manifest`] opens the archive and reads the manifest entry only.
//!   This is the metadata-only view used by prescans; the payload is never
//!   read.
//! - [`read_archive`] reads the whole file, computes its BLAKE3 digest and
//!   extracts the payload for a real load.

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::errors::{LuError, Result};
use crate::module::types::{LuAttribute, LuTypeInfo, LuTypeRef};

/// Default file extension of module archives.
pub const MODULE_FILE_EXTENSION: &str = "lum";

/// Archive entry holding the manifest.
pub const MANIFEST_ENTRY: &str = "module.json";

const WASM_ENTRY: &str = "module.wasm";
const WAT_ENTRY: &str = "module.wat";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuDependencyManifest {
    pub name: String,
    #[serde(default)]
    pub native: bool,
    /// File location relative to the module's directory, overriding the
    /// default `<name>.lum` lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuTypeManifest {
    pub full_name: String,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default = "default_public")]
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<LuTypeRef>,
    #[serde(default)]
    pub interfaces: Vec<LuTypeRef>,
    #[serde(default)]
    pub attributes: Vec<LuAttribute>,
}

fn default_public() -> bool {
    true
}

impl LuTypeManifest {
    pub fn from_type(ty: &LuTypeInfo) -> Self {
        LuTypeManifest {
            full_name: ty.full_name.clone(),
            is_abstract: ty.is_abstract,
            is_interface: ty.is_interface,
            public: ty.is_public,
            base: ty.base.clone(),
            interfaces: ty.interfaces.clone(),
            attributes: ty.attributes.clone(),
        }
    }

    fn into_runtime(self, module: &str) -> LuTypeInfo {
        LuTypeInfo {
            full_name: self.full_name,
            module: module.to_string(),
            is_abstract: self.is_abstract || self.is_interface,
            is_interface: self.is_interface,
            is_public: self.public,
            base: self.base,
            interfaces: self.interfaces,
            attributes: self.attributes,
            invoker: None,
        }
    }
}

/// The manifest stored in every module archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuModuleManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<LuDependencyManifest>,
    #[serde(default)]
    pub types: Vec<LuTypeManifest>,
}

impl LuModuleManifest {
    pub fn new(name: impl Into<String>) -> Self {
        LuModuleManifest {
            name: name.into(),
            file_version: None,
            product_version: None,
            description: None,
            dependencies: Vec::new(),
            types: Vec::new(),
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

    pub fn with_type(mut self, ty: LuTypeInfo) -> Self {
        self.types.push(LuTypeManifest::from_type(&ty));
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(LuDependencyManifest {
            name: name.into(),
            native: false,
            path: None,
        });
        self
    }

    pub fn with_native_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(LuDependencyManifest {
            name: name.into(),
            native: true,
            path: None,
        });
        self
    }

    /// Type descriptions declared by this manifest, attributed to the module.
    pub fn type_infos(&self) -> Vec<LuTypeInfo> {
        self.types
            .iter()
            .cloned()
            .map(|t| t.into_runtime(&self.name))
            .collect()
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LuError::unsupported_format(
                path.display().to_string(),
                "manifest declares a blank module name",
            ));
        }
        if let Some(ty) = self.types.iter().find(|t| t.full_name.trim().is_empty()) {
            return Err(LuError::unsupported_format(
                path.display().to_string(),
                format!("manifest declares a blank type name ({:?})", ty),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LuPayloadKind {
    /// Binary WebAssembly.
    Wasm,
    /// WebAssembly text format.
    Wat,
}

/// Executable part of a module archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LuModulePayload {
    pub kind: LuPayloadKind,
    pub bytes: Vec<u8>,
}

/// Fully read module archive.
#[derive(Clone, Debug)]
pub struct LuModuleArchive {
    pub path: PathBuf,
    pub manifest: LuModuleManifest,
    pub payload: Option<LuModulePayload>,
    pub digest: String,
}

/// Whether the path carries the default module file extension.
pub fn is_module_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(MODULE_FILE_EXTENSION))
        .unwrap_or(false)
}

fn open_archive<R: Read + Seek>(reader: R, path: &Path) -> Result<ZipArchive<R>> {
    ZipArchive::new(reader).map_err(|e| {
        LuError::unsupported_format(
            path.display().to_string(),
            format!("not a module archive: {}", e),
        )
    })
}

fn manifest_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
) -> Result<LuModuleManifest> {
    let display = path.display().to_string();
    let mut entry = archive.by_name(MANIFEST_ENTRY).map_err(|_| {
        LuError::unsupported_format(display.clone(), format!("missing {}", MANIFEST_ENTRY))
    })?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| LuError::unsupported_format(display.clone(), e.to_string()))?;
    let manifest: LuModuleManifest = serde_json::from_str(&text)
        .map_err(|e| LuError::unsupported_format(display, format!("invalid manifest: {}", e)))?;
    manifest.validate(path)?;
    Ok(manifest)
}

fn payload_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Option<LuModulePayload>> {
    for (entry_name, kind) in [(WASM_ENTRY, LuPayloadKind::Wasm), (WAT_ENTRY, LuPayloadKind::Wat)] {
        if let Ok(mut entry) = archive.by_name(entry_name) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(Some(LuModulePayload { kind, bytes }));
        }
    }
    Ok(None)
}

/// Metadata-only read: open the archive and parse the manifest entry.
pub fn read_manifest(path: &Path) -> Result<LuModuleManifest> {
    if !path.is_file() {
        return Err(LuError::ModuleNotFound {
            path: path.display().to_string(),
        });
    }
    let file = File::open(path)?;
    let mut archive = open_archive(file, path)?;
    manifest_from_archive(&mut archive, path)
}

/// Full read used by real loads.
pub fn read_archive(path: &Path) -> Result<LuModuleArchive> {
    if !path.is_file() {
        return Err(LuError::ModuleNotFound {
            path: path.display().to_string(),
        });
    }
    let bytes = fs::read(path)?;
    let digest = blake3::hash(&bytes).to_hex().to_string();
    let mut archive = open_archive(Cursor::new(bytes.as_slice()), path)?;
    let manifest = manifest_from_archive(&mut archive, path)?;
    let payload = payload_from_archive(&mut archive)?;

    Ok(LuModuleArchive {
        path: path.to_path_buf(),
        manifest,
        payload,
        digest,
    })
}

/// Writes module archives.
#[derive(Clone, Debug)]
pub struct LuModuleArchiveWriter {
    manifest: LuModuleManifest,
    payload: Option<LuModulePayload>,
}

impl LuModuleArchiveWriter {
    pub fn new(manifest: LuModuleManifest) -> Self {
        LuModuleArchiveWriter {
            manifest,
            payload: None,
        }
    }

    pub fn with_payload(mut self, kind: LuPayloadKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(LuModulePayload {
            kind,
            bytes: bytes.into(),
        });
        self
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        self.manifest.validate(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(serde_json::to_string_pretty(&self.manifest)?.as_bytes())?;

        if let Some(payload) = &self.payload {
            let entry = match payload.kind {
                LuPayloadKind::Wasm => WASM_ENTRY,
                LuPayloadKind::Wat => WAT_ENTRY,
            };
            zip.start_file(entry, options)?;
            zip.write_all(&payload.bytes)?;
        }

        zip.finish()?;
        log::debug!(
            "module.archive.write: module archive written - module={}, path={}, types={}",
            self.manifest.name,
            path.display(),
            self.manifest.types.len()
        );
        Ok(())
    }
}
