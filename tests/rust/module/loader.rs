//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Lu.
//! The Lu project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::fs;
use std::sync::Arc;

use lux::errors::LuError;
use lux::module::{
    LuDependencyHint, LuDependencyManifest, LuHostContext, LuHostSharing, LuLoaderPolicy,
    LuModuleLoader, LuModuleManifest, LuModuleOrigin, LuModuleState, LuTypeInfo,
};

use common::{
    contracts_manifest, contracts_module, operator_manifest, write_module, RecordingActivator,
    CONTRACTS,
};

fn host_with_contracts() -> Arc<LuHostContext> {
    let host = LuHostContext::new();
    host.register_module(contracts_module());
    Arc::new(host)
}

fn loader(sharing: LuHostSharing, host: &Arc<LuHostContext>) -> LuModuleLoader {
    LuModuleLoader::new(LuLoaderPolicy::default().with_sharing(sharing), Arc::clone(host))
}

#[test]
fn test_always_shares_host_dependency_between_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = host_with_contracts();

    let mut first = loader(LuHostSharing::Always, &host);
    let mut second = loader(LuHostSharing::Always, &host);
    let a = first.load(&path).unwrap();
    let b = second.load(&path).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    let dep_a = a.dependency(CONTRACTS).unwrap();
    let dep_b = b.dependency(CONTRACTS).unwrap();
    assert!(Arc::ptr_eq(dep_a, dep_b));
    assert!(Arc::ptr_eq(&dep_a.types()[0], &dep_b.types()[0]));
    assert_eq!(dep_a.origin(), LuModuleOrigin::Host);
}

#[test]
fn test_never_loads_private_copies() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Contoso.Contracts.lum", contracts_manifest());
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = host_with_contracts();

    let a = loader(LuHostSharing::Never, &host).load(&path).unwrap();
    let b = loader(LuHostSharing::Never, &host).load(&path).unwrap();
    let dep_a = a.dependency(CONTRACTS).unwrap();
    let dep_b = b.dependency(CONTRACTS).unwrap();

    assert_eq!(dep_a.origin(), LuModuleOrigin::Isolated);
    assert!(!Arc::ptr_eq(dep_a, dep_b));
    assert!(dep_a.types()[0].is_same_type(&dep_b.types()[0]));
}

#[test]
fn test_never_without_private_copy_is_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = host_with_contracts();

    let err = loader(LuHostSharing::Never, &host).load(&path).unwrap_err();
    match err {
        LuError::DependencyUnresolved { module, dependency, .. } => {
            assert_eq!(module, "Adders");
            assert_eq!(dependency, CONTRACTS);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_selected_shares_only_listed_names() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Contoso.Contracts.lum", contracts_manifest());
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = host_with_contracts();

    let listed = loader(LuHostSharing::selected([CONTRACTS]), &host).load(&path).unwrap();
    assert_eq!(listed.dependency(CONTRACTS).unwrap().origin(), LuModuleOrigin::Host);

    let unlisted = loader(LuHostSharing::selected(["Other"]), &host).load(&path).unwrap();
    assert_eq!(unlisted.dependency(CONTRACTS).unwrap().origin(), LuModuleOrigin::Isolated);
}

#[test]
fn test_prefer_module_falls_back_to_host() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = host_with_contracts();

    let fallback = loader(LuHostSharing::PreferModule, &host).load(&path).unwrap();
    assert_eq!(fallback.dependency(CONTRACTS).unwrap().origin(), LuModuleOrigin::Host);

    write_module(dir.path(), "Contoso.Contracts.lum", contracts_manifest());
    let own = loader(LuHostSharing::PreferModule, &host).load(&path).unwrap();
    assert_eq!(own.dependency(CONTRACTS).unwrap().origin(), LuModuleOrigin::Isolated);
}

#[test]
fn test_always_falls_back_to_module_layout() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Contoso.Contracts.lum", contracts_manifest());
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = Arc::new(LuHostContext::new());

    let module = loader(LuHostSharing::Always, &host).load(&path).unwrap();
    assert_eq!(module.dependency(CONTRACTS).unwrap().origin(), LuModuleOrigin::Isolated);
}

#[test]
fn test_search_paths_hints_and_manifest_paths() {
    let dir = tempfile::tempdir().unwrap();
    let libs = dir.path().join("libs");
    let hinted = dir.path().join("hinted");
    let contracts_in_libs = write_module(&libs, "Contoso.Contracts.lum", contracts_manifest());
    let contracts_hinted = write_module(&hinted, "contracts-v1.lum", contracts_manifest());
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = Arc::new(LuHostContext::new());

    let policy = LuLoaderPolicy::default().with_search_path(&libs);
    let module = LuModuleLoader::new(policy, Arc::clone(&host)).load(&path).unwrap();
    assert_eq!(module.dependency(CONTRACTS).unwrap().path(), Some(contracts_in_libs.as_path()));

    let policy = LuLoaderPolicy::default()
        .with_search_path(&libs)
        .with_hint(LuDependencyHint {
            name: CONTRACTS.to_string(),
            path: contracts_hinted.clone(),
            native: false,
        });
    let module = LuModuleLoader::new(policy, Arc::clone(&host)).load(&path).unwrap();
    assert_eq!(module.dependency(CONTRACTS).unwrap().path(), Some(contracts_hinted.as_path()));

    let mut manifest = LuModuleManifest::new("Relative").with_type(LuTypeInfo::class("Relative.Op"));
    manifest.dependencies.push(LuDependencyManifest {
        name: CONTRACTS.to_string(),
        native: false,
        path: Some("libs/Contoso.Contracts.lum".to_string()),
    });
    let relative = write_module(dir.path(), "Relative.lum", manifest);
    let module = LuModuleLoader::new(LuLoaderPolicy::default(), host).load(&relative).unwrap();
    assert_eq!(module.dependency(CONTRACTS).unwrap().path(), Some(contracts_in_libs.as_path()));
}

#[test]
fn test_diamond_dependencies_load_once() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "D.lum", LuModuleManifest::new("D").with_type(LuTypeInfo::class("D.Core")));
    write_module(dir.path(), "B.lum", LuModuleManifest::new("B").with_dependency("D"));
    write_module(dir.path(), "C.lum", LuModuleManifest::new("C").with_dependency("D"));
    let root = write_module(
        dir.path(),
        "A.lum",
        LuModuleManifest::new("A").with_dependency("B").with_dependency("C"),
    );
    let activator = Arc::new(RecordingActivator::default());
    let mut loader = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::new(LuHostContext::new()))
        .with_activator(activator.clone());

    let a = loader.load(&root).unwrap();
    let d_via_b = a.dependency("B").unwrap().dependency("D").unwrap();
    let d_via_c = a.dependency("C").unwrap().dependency("D").unwrap();
    assert!(Arc::ptr_eq(d_via_b, d_via_c));
    assert_eq!(loader.isolated_modules().len(), 4);
    assert_eq!(activator.activated(), vec!["D", "B", "C", "A"]);
}

#[test]
fn test_cycle_is_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "B.lum", LuModuleManifest::new("B").with_dependency("A"));
    let root = write_module(dir.path(), "A.lum", LuModuleManifest::new("A").with_dependency("B"));
    let err = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::new(LuHostContext::new()))
        .load(&root)
        .unwrap_err();
    assert!(matches!(err, LuError::DependencyUnresolved { .. }));
}

#[test]
fn test_missing_and_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(LuHostContext::new());

    let missing = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::clone(&host))
        .load(&dir.path().join("Nope.lum"))
        .unwrap_err();
    assert!(matches!(missing, LuError::ModuleNotFound { .. }));

    let corrupt = dir.path().join("Broken.lum");
    fs::write(&corrupt, b"definitely not a zip archive").unwrap();
    let err = LuModuleLoader::new(LuLoaderPolicy::default(), host)
        .load(&corrupt)
        .unwrap_err();
    assert!(matches!(err, LuError::UnsupportedBinaryFormat { .. }));
    assert!(err.is_load_error());
}

#[test]
fn test_failed_activation_leaves_loader_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "B.lum", LuModuleManifest::new("B"));
    let root = write_module(dir.path(), "A.lum", LuModuleManifest::new("A").with_dependency("B"));
    let activator = Arc::new(RecordingActivator::failing_on("A"));
    let mut loader = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::new(LuHostContext::new()))
        .with_activator(activator.clone());

    let err = loader.load(&root).unwrap_err();
    assert!(matches!(err, LuError::Activation { .. }));
    assert!(loader.module().is_none());
    assert!(loader.isolated_modules().is_empty());
    assert_eq!(activator.activated(), vec!["B"]);
}

#[test]
fn test_native_dependencies_resolve_from_module_directory() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join(libloading::library_filename("fastmath"));
    fs::write(&lib, b"").unwrap();
    let root = write_module(
        dir.path(),
        "Numeric.lum",
        LuModuleManifest::new("Numeric").with_native_dependency("fastmath"),
    );
    let host = Arc::new(LuHostContext::new());

    let module = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::clone(&host))
        .load(&root)
        .unwrap();
    assert_eq!(module.native_dependencies().len(), 1);
    assert_eq!(module.native_dependencies()[0].path, lib);
    // An empty file is not a loadable library.
    let opened = unsafe { module.native_dependencies()[0].open() };
    assert!(matches!(opened, Err(LuError::Activation { .. })));

    let missing = write_module(
        dir.path(),
        "Missing.lum",
        LuModuleManifest::new("Missing").with_native_dependency("nowhere"),
    );
    let err = LuModuleLoader::new(LuLoaderPolicy::default(), host)
        .load(&missing)
        .unwrap_err();
    assert!(matches!(err, LuError::DependencyUnresolved { .. }));
}

#[test]
fn test_loaded_module_metadata() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Contoso.Contracts.lum", contracts_manifest());
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let mut loader = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::new(LuHostContext::new()));

    let module = loader.load(&path).unwrap();
    assert_eq!(module.state(), LuModuleState::Loaded);
    assert_eq!(module.origin(), LuModuleOrigin::Isolated);
    assert_eq!(module.file_version(), Some("2.0.0.0"));
    assert_eq!(module.digest().map(str::len), Some(64));
    assert_eq!(module.types()[0].module, "Adders");

    let again = loader.load(&path).unwrap_err();
    assert!(matches!(again, LuError::Configuration { .. }));
}

#[test]
fn test_unload_refuses_while_types_are_held() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "Adders.lum", operator_manifest("Adders", "Adders.Add"));
    let host = host_with_contracts();
    let mut loader = loader(LuHostSharing::Always, &host);

    let module = loader.load(&path).unwrap();
    let held = Arc::clone(&module.types()[0]);
    let err = loader.unload().unwrap_err();
    assert_eq!(
        err,
        LuError::ModuleInUse {
            module: "Adders".to_string(),
            outstanding: 1
        }
    );
    assert_eq!(module.state(), LuModuleState::Loaded);

    drop(held);
    loader.unload().unwrap();
    assert_eq!(module.state(), LuModuleState::Unloaded);
    assert!(loader.module().is_none());
    let shared = host.find_module(CONTRACTS).unwrap();
    assert_eq!(shared.state(), LuModuleState::Loaded);
}

#[cfg(feature = "wasm")]
#[test]
fn test_wasm_payload_runs_during_real_load_only() {
    use lux::module::{read_manifest, LuModuleArchiveWriter, LuPayloadKind};

    let dir = tempfile::tempdir().unwrap();
    let trapping = dir.path().join("Trap.lum");
    LuModuleArchiveWriter::new(LuModuleManifest::new("Trap").with_type(LuTypeInfo::class("Trap.T")))
        .with_payload(
            LuPayloadKind::Wat,
            "(module (func $start unreachable) (start $start))",
        )
        .write_to(&trapping)
        .unwrap();

    // Metadata-only reads never execute the payload.
    assert_eq!(read_manifest(&trapping).unwrap().name, "Trap");

    let err = LuModuleLoader::new(LuLoaderPolicy::default(), Arc::new(LuHostContext::new()))
        .load(&trapping)
        .unwrap_err();
    assert!(matches!(err, LuError::Activation { .. }));

    let fine = dir.path().join("Fine.lum");
    LuModuleArchiveWriter::new(LuModuleManifest::new("Fine"))
        .with_payload(LuPayloadKind::Wat, "(module (func (export \"_initialize\")))")
        .write_to(&fine)
        .unwrap();
    LuModuleLoader::new(LuLoaderPolicy::default(), Arc::new(LuHostContext::new()))
        .load(&fine)
        .unwrap();
}
