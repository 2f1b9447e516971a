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

//! # Type Matching Engine
//!
//! Evaluates [`LuCriteria`] against type descriptions. Checks run in a
//! fixed order and stop at the first failure:
//!
//! 1. custom predicate (decides alone when present)
//! 2. abstract / interface flags
//! 3. name glob, with a case-insensitive simple/full name fallback
//! 4. `inherits`, `implements`, `assignable_to` through the context
//! 5. attribute presence by name
//!
//! Matching is pure: the same criteria, type and context always give the
//! same answer.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use crate::matching::context::LuTypeResolutionContext;
use crate::matching::criteria::LuCriteria;
use crate::module::types::{LuTypeInfo, LuTypeRef};

/// An exported type that satisfied at least one criteria.
#[derive(Clone, Debug)]
pub struct LuTypeMatch {
    pub type_info: Arc<LuTypeInfo>,
    /// Union of the tags of every satisfied criteria.
    pub tags: BTreeSet<String>,
}

pub struct LuTypeFinder;

impl LuTypeFinder {
    pub fn is_match(
        criteria: &LuCriteria,
        ty: &LuTypeInfo,
        ctx: &dyn LuTypeResolutionContext,
    ) -> bool {
        if let Some(predicate) = criteria.predicate() {
            return predicate(ctx, ty);
        }

        if criteria.is_abstract().is_some_and(|v| v != ty.is_abstract) {
            return false;
        }
        if criteria.is_interface().is_some_and(|v| v != ty.is_interface) {
            return false;
        }

        if let Some(glob) = criteria.name_glob() {
            let by_pattern = criteria
                .name_regex()
                .is_some_and(|re| re.is_match(&ty.full_name));
            let by_name =
                glob.eq_ignore_ascii_case(ty.name()) || glob.eq_ignore_ascii_case(&ty.full_name);
            if !by_pattern && !by_name {
                return false;
            }
        }

        for reference in criteria.type_references() {
            let Some(target) = ctx.resolve(reference) else {
                return false;
            };
            if !Self::is_assignable_to(ty, &target, ctx) {
                return false;
            }
        }

        if let Some(attribute) = criteria.has_attribute() {
            if ty.attribute(attribute).is_none() {
                return false;
            }
        }

        true
    }

    /// Whether `ty` is `target` or derives from / implements it, walking
    /// base types and interfaces through the context. Unresolvable links
    /// end that branch of the walk.
    pub fn is_assignable_to(
        ty: &LuTypeInfo,
        target: &LuTypeInfo,
        ctx: &dyn LuTypeResolutionContext,
    ) -> bool {
        if ty.is_same_type(target) {
            return true;
        }

        let mut visited: HashSet<(String, String)> = HashSet::new();
        visited.insert((ty.full_name.clone(), ty.module.clone()));
        let mut pending: VecDeque<LuTypeRef> = parents(ty).collect();

        while let Some(reference) = pending.pop_front() {
            if reference.refers_to(target) {
                return true;
            }
            let Some(resolved) = ctx.resolve(&reference) else {
                continue;
            };
            if resolved.is_same_type(target) {
                return true;
            }
            if visited.insert((resolved.full_name.clone(), resolved.module.clone())) {
                pending.extend(parents(&resolved));
            }
        }
        false
    }

    /// Exported types matching at least one criteria, in declaration order.
    /// With no criteria every exported type matches, untagged.
    pub fn find<'a, I>(
        criteria: &[LuCriteria],
        types: I,
        ctx: &dyn LuTypeResolutionContext,
    ) -> Vec<LuTypeMatch>
    where
        I: IntoIterator<Item = &'a Arc<LuTypeInfo>>,
    {
        types
            .into_iter()
            .filter(|t| t.is_public)
            .filter_map(|t| {
                if criteria.is_empty() {
                    return Some(LuTypeMatch {
                        type_info: Arc::clone(t),
                        tags: BTreeSet::new(),
                    });
                }
                let mut matched = false;
                let mut tags = BTreeSet::new();
                for c in criteria.iter().filter(|c| Self::is_match(c, t, ctx)) {
                    matched = true;
                    tags.extend(c.tags().iter().cloned());
                }
                matched.then(|| LuTypeMatch {
                    type_info: Arc::clone(t),
                    tags,
                })
            })
            .collect()
    }
}

fn parents(ty: &LuTypeInfo) -> impl Iterator<Item = LuTypeRef> + '_ {
    ty.base.iter().chain(ty.interfaces.iter()).cloned()
}
