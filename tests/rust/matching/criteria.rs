//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Lu.
//! The Lu project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use lux::errors::LuError;
use lux::matching::{
    LuCriteria, LuLoadedContext, LuManifestCache, LuMetadataContext, LuTypeFinder,
};
use lux::module::{LuModule, LuTypeInfo, LuTypeRef, PLUGIN_NAME_ATTRIBUTE};

use common::{contracts_manifest, operator_manifest, write_module, IOPERATOR};

fn shapes() -> Arc<LuModule> {
    Arc::new(
        LuModule::builder("Shapes")
            .with_type(LuTypeInfo::interface("Shapes.IShape"))
            .with_type(LuTypeInfo::interface("Shapes.IRound").implements("Shapes.IShape"))
            .with_type(LuTypeInfo::abstract_class("Shapes.ShapeBase").implements("Shapes.IShape"))
            .with_type(
                LuTypeInfo::class("Shapes.Circle")
                    .extends("Shapes.ShapeBase")
                    .implements("Shapes.IRound")
                    .with_attribute(PLUGIN_NAME_ATTRIBUTE, Some("circle")),
            )
            .with_type(LuTypeInfo::class("Shapes.Square").extends("Shapes.ShapeBase"))
            .with_type(LuTypeInfo::class("Shapes.Helper"))
            .build(),
    )
}

fn ty<'a>(module: &'a LuModule, name: &str) -> &'a LuTypeInfo {
    module.type_named(name).unwrap()
}

#[test]
fn test_abstract_and_interface_flags() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let concrete = LuCriteria::builder().is_abstract(false).build().unwrap();
    let interfaces = LuCriteria::builder().is_interface(true).build().unwrap();

    assert!(LuTypeFinder::is_match(&concrete, ty(&m, "Shapes.Circle"), &ctx));
    assert!(!LuTypeFinder::is_match(&concrete, ty(&m, "Shapes.ShapeBase"), &ctx));
    assert!(!LuTypeFinder::is_match(&concrete, ty(&m, "Shapes.IShape"), &ctx));
    assert!(LuTypeFinder::is_match(&interfaces, ty(&m, "Shapes.IRound"), &ctx));
    assert!(!LuTypeFinder::is_match(&interfaces, ty(&m, "Shapes.ShapeBase"), &ctx));
}

#[test]
fn test_name_glob_and_fallback() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let glob = LuCriteria::builder().named("Shapes.*e").build().unwrap();
    assert!(LuTypeFinder::is_match(&glob, ty(&m, "Shapes.Circle"), &ctx));
    assert!(LuTypeFinder::is_match(&glob, ty(&m, "Shapes.Square"), &ctx));
    assert!(!LuTypeFinder::is_match(&glob, ty(&m, "Shapes.Helper"), &ctx));

    // Regex matching is case-sensitive, the plain name fallback is not.
    let simple = LuCriteria::builder().named("circle").build().unwrap();
    assert!(LuTypeFinder::is_match(&simple, ty(&m, "Shapes.Circle"), &ctx));
    let wrong_case_glob = LuCriteria::builder().named("shapes.c*").build().unwrap();
    assert!(!LuTypeFinder::is_match(&wrong_case_glob, ty(&m, "Shapes.Circle"), &ctx));
}

#[test]
fn test_inherits_implements_and_assignable() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let inherits = LuCriteria::builder().inherits("Shapes.ShapeBase").build().unwrap();
    let implements = LuCriteria::builder().implements("Shapes.IShape").build().unwrap();
    let round = LuCriteria::builder().assignable_to("Shapes.IRound").build().unwrap();

    assert!(LuTypeFinder::is_match(&inherits, ty(&m, "Shapes.Square"), &ctx));
    assert!(!LuTypeFinder::is_match(&inherits, ty(&m, "Shapes.Helper"), &ctx));
    // Base chain and interface closure are both walked.
    assert!(LuTypeFinder::is_match(&implements, ty(&m, "Shapes.Circle"), &ctx));
    assert!(LuTypeFinder::is_match(&implements, ty(&m, "Shapes.IRound"), &ctx));
    assert!(LuTypeFinder::is_match(&round, ty(&m, "Shapes.Circle"), &ctx));
    assert!(!LuTypeFinder::is_match(&round, ty(&m, "Shapes.Square"), &ctx));
}

#[test]
fn test_qualified_reference_compares_declaring_module() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let other = LuCriteria::builder()
        .implements(LuTypeRef::in_module("Shapes.IShape", "OtherShapes"))
        .build()
        .unwrap();
    let same = LuCriteria::builder()
        .implements(LuTypeRef::in_module("Shapes.IShape", "Shapes"))
        .build()
        .unwrap();
    assert!(!LuTypeFinder::is_match(&other, ty(&m, "Shapes.Circle"), &ctx));
    assert!(LuTypeFinder::is_match(&same, ty(&m, "Shapes.Circle"), &ctx));
}

#[test]
fn test_attribute_by_name() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let criteria = LuCriteria::builder().has_attribute(PLUGIN_NAME_ATTRIBUTE).build().unwrap();
    assert!(LuTypeFinder::is_match(&criteria, ty(&m, "Shapes.Circle"), &ctx));
    assert!(!LuTypeFinder::is_match(&criteria, ty(&m, "Shapes.Square"), &ctx));
}

#[test]
fn test_predicate_decides_alone() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let criteria = LuCriteria::builder()
        .is_interface(true)
        .matching(|_, t| t.full_name.ends_with("Helper"))
        .build()
        .unwrap();
    assert!(LuTypeFinder::is_match(&criteria, ty(&m, "Shapes.Helper"), &ctx));
    assert!(!LuTypeFinder::is_match(&criteria, ty(&m, "Shapes.IShape"), &ctx));
}

#[test]
fn test_find_unions_tags_in_declaration_order() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let all = vec![
        LuCriteria::builder().inherits("Shapes.ShapeBase").is_abstract(false).tag("Shape").build().unwrap(),
        LuCriteria::builder().implements("Shapes.IRound").is_interface(false).tag("Round").build().unwrap(),
    ];
    let found = LuTypeFinder::find(&all, m.types(), &ctx);
    let names: Vec<_> = found.iter().map(|f| f.type_info.full_name.clone()).collect();
    assert_eq!(names, vec!["Shapes.Circle", "Shapes.Square"]);
    assert_eq!(found[0].tags.iter().cloned().collect::<Vec<_>>(), vec!["Round", "Shape"]);
    assert_eq!(found[1].tags.iter().cloned().collect::<Vec<_>>(), vec!["Shape"]);
}

#[test]
fn test_zero_criteria_matches_every_exported_type() {
    let m = Arc::new(
        LuModule::builder("Mixed")
            .with_type(LuTypeInfo::class("Mixed.Public"))
            .with_type(LuTypeInfo::class("Mixed.Internal").internal())
            .build(),
    );
    let ctx = LuLoadedContext::new(&m);
    let found = LuTypeFinder::find(&[], m.types(), &ctx);
    assert_eq!(found.len(), 1);
    assert!(found[0].tags.is_empty());
}

#[test]
fn test_builder_validation_errors() {
    let cases = [
        LuCriteria::builder().named("").build(),
        LuCriteria::builder().inherits(" ").build(),
        LuCriteria::builder().assignable_to(LuTypeRef::in_module("A.B", "")).build(),
        LuCriteria::builder().has_attribute("").build(),
        LuCriteria::builder().tag("").build(),
    ];
    for case in cases {
        assert!(matches!(case, Err(LuError::Configuration { .. })));
    }
}

#[test]
fn test_metadata_context_resolves_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let contracts = write_module(dir.path(), "Contoso.Contracts.lum", contracts_manifest());
    let candidate = write_module(
        dir.path(),
        "Adders.lum",
        operator_manifest("Adders", "Adders.AddOperator"),
    );

    let cache = Arc::new(LuManifestCache::new());
    let mut ctx = LuMetadataContext::new(Arc::clone(&cache));
    ctx.add_file(&candidate);
    ctx.add_file(&contracts);

    let manifest = cache.get(&candidate).unwrap();
    let types: Vec<_> = manifest.type_infos().into_iter().map(Arc::new).collect();
    let criteria = LuCriteria::builder().implements(IOPERATOR).build().unwrap();
    assert!(LuTypeFinder::is_match(&criteria, &types[0], &ctx));

    // Without the contracts file the interface cannot be resolved.
    let mut narrow = LuMetadataContext::new(cache);
    narrow.add_file(&candidate);
    assert!(!LuTypeFinder::is_match(&criteria, &types[0], &narrow));
}

#[test]
fn test_find_evaluates_each_type_once_per_criteria() {
    let m = shapes();
    let ctx = LuLoadedContext::new(&m);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let criteria = LuCriteria::builder()
        .matching(move |_, t| {
            counter.fetch_add(1, Ordering::SeqCst);
            t.is_abstract
        })
        .build()
        .unwrap();
    let first = LuTypeFinder::find(std::slice::from_ref(&criteria), m.types(), &ctx);
    let second = LuTypeFinder::find(std::slice::from_ref(&criteria), m.types(), &ctx);
    assert_eq!(first.len(), second.len());
    assert_eq!(calls.load(Ordering::SeqCst), 2 * m.types().len());
}

proptest! {
    #[test]
    fn prop_is_match_is_deterministic(
        glob in "[A-Za-z*?.]{1,12}",
        is_abstract in proptest::option::of(any::<bool>()),
        index in 0usize..6,
    ) {
        let m = shapes();
        let ctx = LuLoadedContext::new(&m);
        let mut builder = LuCriteria::builder().named(glob);
        if let Some(flag) = is_abstract {
            builder = builder.is_abstract(flag);
        }
        if let Ok(criteria) = builder.build() {
            let t = &m.types()[index];
            let first = LuTypeFinder::is_match(&criteria, t, &ctx);
            let second = LuTypeFinder::is_match(&criteria, t, &ctx);
            prop_assert_eq!(first, second);
        }
    }
}
