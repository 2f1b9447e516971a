//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Lu.
//! The Lu project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::path::Path;
use std::sync::Arc;

use lux::catalog::{
    LuCatalog, LuCatalogState, LuCompositeCatalog, LuFolderCatalog, LuFolderOptions,
    LuGeneratedCatalog, LuModuleCatalog, LuModuleCatalogOptions,
};
use lux::errors::LuError;
use lux::matching::LuCriteria;
use lux::module::{LuHostContext, LuHostSharing, LuModule, LuTypeInfo};
use lux::version::LuVersion;

use common::{contracts_module, operator_manifest, plain_manifest, write_module, IOPERATOR};

fn host_with_contracts() -> Arc<LuHostContext> {
    let host = LuHostContext::new();
    host.register_module(contracts_module());
    Arc::new(host)
}

fn folder(dir: &Path, name: &str, criteria: LuCriteria, host: &Arc<LuHostContext>) -> LuFolderCatalog {
    let options = LuFolderOptions::default()
        .with_sharing(LuHostSharing::Always)
        .with_criteria(criteria);
    LuFolderCatalog::new(dir, options, Arc::clone(host))
        .unwrap()
        .with_name(name)
}

fn module_catalog(name: &str, types: &[&str]) -> LuModuleCatalog {
    let mut builder = LuModule::builder(name);
    for ty in types {
        builder = builder.with_type(LuTypeInfo::class(*ty));
    }
    LuModuleCatalog::from_module(
        Arc::new(builder.build()),
        LuModuleCatalogOptions::default(),
        Arc::new(LuHostContext::new()),
    )
}

#[tokio::test]
async fn test_two_folders_with_different_tags() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    write_module(dir.path(), "Multipliers.lum", operator_manifest("Multipliers", "Multipliers.Mul"));
    write_module(dir.path(), "Strings.lum", plain_manifest("Strings", "Strings.Upper"));
    let host = host_with_contracts();

    let math = LuCriteria::builder().implements(IOPERATOR).tag("Math").build().unwrap();
    let all = LuCriteria::builder().is_abstract(false).tag("All").build().unwrap();

    let mut composite = LuCompositeCatalog::new("plugins")
        .with_catalog(folder(dir.path(), "math", math, &host))
        .unwrap()
        .with_catalog(folder(dir.path(), "all", all, &host))
        .unwrap();
    composite.initialize().await.unwrap();

    let math_plugins = composite.get_by_tag("Math").unwrap();
    assert_eq!(math_plugins.len(), 2);
    assert!(math_plugins.iter().all(|p| p.catalog() == "math"));

    // Duplicates across children are preserved.
    let plugins = composite.get_plugins().unwrap();
    assert_eq!(plugins.len(), 5);
    let adders: Vec<_> = plugins.iter().filter(|p| p.name() == "Adders.Add").collect();
    assert_eq!(adders.len(), 2);
    assert_eq!(adders[0].catalog(), "math");
    assert_eq!(adders[1].catalog(), "all");

    let first = composite
        .get("Adders.Add", &LuVersion::new(2, 0, 0, 0))
        .unwrap()
        .unwrap();
    assert_eq!(first.catalog(), "math");
}

#[tokio::test]
async fn test_concatenation_follows_registration_order() {
    let mut composite = LuCompositeCatalog::new("ordered");
    composite.add_catalog(module_catalog("Second", &["Second.B1", "Second.B2"])).unwrap();
    composite.add_catalog(module_catalog("First", &["First.A1"])).unwrap();
    composite.initialize().await.unwrap();

    let names: Vec<_> = composite
        .get_plugins()
        .unwrap()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, vec!["Second.B1", "Second.B2", "First.A1"]);
    assert!(composite
        .get("First.A1", &LuVersion::FALLBACK)
        .unwrap()
        .is_some());
    assert!(composite.get("Third.C1", &LuVersion::FALLBACK).unwrap().is_none());
}

#[tokio::test]
async fn test_first_child_wins_lookup() {
    let mut composite = LuCompositeCatalog::new("shadowing")
        .with_catalog(module_catalog("Early", &["Shared.Type"]).with_name("early"))
        .unwrap()
        .with_catalog(module_catalog("Late", &["Shared.Type"]).with_name("late"))
        .unwrap();
    composite.initialize().await.unwrap();

    let found = composite.get("Shared.Type", &LuVersion::FALLBACK).unwrap().unwrap();
    assert_eq!(found.catalog(), "early");
    assert_eq!(found.type_info().module, "Early");
}

#[tokio::test]
async fn test_add_after_initialize_is_rejected() {
    let mut composite = LuCompositeCatalog::new("closed");
    composite.add_catalog(module_catalog("One", &["One.A"])).unwrap();
    composite.initialize().await.unwrap();

    let err = composite.add_catalog(module_catalog("Two", &["Two.A"])).unwrap_err();
    assert!(matches!(err, LuError::AlreadyInitialized { .. }));
    assert_eq!(composite.len(), 1);
}

#[tokio::test]
async fn test_child_failure_fails_composite() {
    let dir = tempfile::tempdir().unwrap();
    let mut composite = LuCompositeCatalog::new("broken")
        .with_catalog(module_catalog("Fine", &["Fine.A"]))
        .unwrap()
        .with_catalog(LuModuleCatalog::from_path(
            dir.path().join("Missing.lum"),
            LuModuleCatalogOptions::default(),
            Arc::new(LuHostContext::new()),
        ))
        .unwrap();

    let err = composite.initialize().await.unwrap_err();
    assert!(matches!(err, LuError::ModuleNotFound { .. }));
    assert!(matches!(composite.state(), LuCatalogState::Failed(_)));
    assert!(matches!(composite.get_plugins(), Err(LuError::NotInitialized { .. })));
    assert!(matches!(
        composite.get("Fine.A", &LuVersion::FALLBACK),
        Err(LuError::NotInitialized { .. })
    ));
    assert_eq!(composite.initialize().await.unwrap_err(), err);
}

#[tokio::test]
async fn test_mixed_children_and_empty_composite() {
    let mut empty = LuCompositeCatalog::new("empty");
    assert!(matches!(empty.get_plugins(), Err(LuError::NotInitialized { .. })));
    empty.initialize().await.unwrap();
    assert!(empty.get_plugins().unwrap().is_empty());

    let host = Arc::new(LuHostContext::new());
    let mut mixed = LuCompositeCatalog::new("mixed")
        .with_catalog(module_catalog("Static", &["Static.A"]))
        .unwrap()
        .with_catalog(LuGeneratedCatalog::delegate("echo", |v| Ok(v.clone()), host))
        .unwrap();
    mixed.initialize().await.unwrap();
    let echo = mixed.get_latest("echo").unwrap().unwrap();
    assert_eq!(echo.invoke(&serde_json::json!({"k": 1})).unwrap()["k"], 1);
    assert_eq!(mixed.children().count(), 2);
}
