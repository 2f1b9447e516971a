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

//! # Capability Criteria
//!
//! Declarative description of the types a catalog is looking for. Criteria
//! are plain data: everything is validated and the name glob is compiled
//! when [`LuCriteriaBuilder::build`] runs, so a malformed criteria never
//! reaches a scan.
//!
//! ```rust
//! use lux::matching::LuCriteria;
//!
//! let exporters = LuCriteria::builder()
//!     .implements("Contoso.IExporter")
//!     .is_abstract(false)
//!     .tag("exporter")
//!     .build()
//!     .unwrap();
//! assert!(exporters.tags().contains("exporter"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::errors::{LuError, Result};
use crate::matching::context::LuTypeResolutionContext;
use crate::module::types::{LuTypeInfo, LuTypeRef};

/// Custom predicate. When present it alone decides the match.
pub type LuTypePredicate =
    Arc<dyn Fn(&dyn LuTypeResolutionContext, &LuTypeInfo) -> bool + Send + Sync>;

/// One set of capability constraints plus the tags it contributes.
#[derive(Clone)]
pub struct LuCriteria {
    inherits: Option<LuTypeRef>,
    implements: Option<LuTypeRef>,
    assignable_to: Option<LuTypeRef>,
    is_abstract: Option<bool>,
    is_interface: Option<bool>,
    name_glob: Option<String>,
    name_regex: Option<Regex>,
    has_attribute: Option<String>,
    predicate: Option<LuTypePredicate>,
    tags: BTreeSet<String>,
}

impl LuCriteria {
    pub fn builder() -> LuCriteriaBuilder {
        LuCriteriaBuilder::default()
    }

    pub fn inherits(&self) -> Option<&LuTypeRef> {
        self.inherits.as_ref()
    }

    pub fn implements(&self) -> Option<&LuTypeRef> {
        self.implements.as_ref()
    }

    pub fn assignable_to(&self) -> Option<&LuTypeRef> {
        self.assignable_to.as_ref()
    }

    pub fn is_abstract(&self) -> Option<bool> {
        self.is_abstract
    }

    pub fn is_interface(&self) -> Option<bool> {
        self.is_interface
    }

    pub fn name_glob(&self) -> Option<&str> {
        self.name_glob.as_deref()
    }

    pub(crate) fn name_regex(&self) -> Option<&Regex> {
        self.name_regex.as_ref()
    }

    pub fn has_attribute(&self) -> Option<&str> {
        self.has_attribute.as_deref()
    }

    pub(crate) fn predicate(&self) -> Option<&LuTypePredicate> {
        self.predicate.as_ref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Type references that must resolve for this criteria to match.
    pub fn type_references(&self) -> impl Iterator<Item = &LuTypeRef> {
        [&self.inherits, &self.implements, &self.assignable_to]
            .into_iter()
            .flatten()
    }
}

impl fmt::Debug for LuCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuCriteria")
            .field("inherits", &self.inherits)
            .field("implements", &self.implements)
            .field("assignable_to", &self.assignable_to)
            .field("is_abstract", &self.is_abstract)
            .field("is_interface", &self.is_interface)
            .field("name_glob", &self.name_glob)
            .field("has_attribute", &self.has_attribute)
            .field("predicate", &self.predicate.is_some())
            .field("tags", &self.tags)
            .finish()
    }
}

/// Fluent accumulation of criteria constraints.
#[derive(Clone, Default)]
pub struct LuCriteriaBuilder {
    inherits: Option<LuTypeRef>,
    implements: Option<LuTypeRef>,
    assignable_to: Option<LuTypeRef>,
    is_abstract: Option<bool>,
    is_interface: Option<bool>,
    name_glob: Option<String>,
    has_attribute: Option<String>,
    predicate: Option<LuTypePredicate>,
    tags: Vec<String>,
}

impl LuCriteriaBuilder {
    pub fn inherits(mut self, base: impl Into<LuTypeRef>) -> Self {
        self.inherits = Some(base.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<LuTypeRef>) -> Self {
        self.implements = Some(interface.into());
        self
    }

    pub fn assignable_to(mut self, target: impl Into<LuTypeRef>) -> Self {
        self.assignable_to = Some(target.into());
        self
    }

    pub fn is_abstract(mut self, value: bool) -> Self {
        self.is_abstract = Some(value);
        self
    }

    pub fn is_interface(mut self, value: bool) -> Self {
        self.is_interface = Some(value);
        self
    }

    /// Glob over the full type name; `*` and `?` are the only wildcards.
    pub fn named(mut self, glob: impl Into<String>) -> Self {
        self.name_glob = Some(glob.into());
        self
    }

    pub fn has_attribute(mut self, type_name: impl Into<String>) -> Self {
        self.has_attribute = Some(type_name.into());
        self
    }

    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn LuTypeResolutionContext, &LuTypeInfo) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn build(self) -> Result<LuCriteria> {
        for (label, reference) in [
            ("inherits", &self.inherits),
            ("implements", &self.implements),
            ("assignable_to", &self.assignable_to),
        ] {
            if let Some(reference) = reference {
                if reference.full_name.trim().is_empty() {
                    return Err(LuError::configuration(format!(
                        "criteria '{}' type name cannot be blank",
                        label
                    )));
                }
                if reference.module.as_deref().is_some_and(|m| m.trim().is_empty()) {
                    return Err(LuError::configuration(format!(
                        "criteria '{}' module name cannot be blank",
                        label
                    )));
                }
            }
        }

        if self
            .has_attribute
            .as_deref()
            .is_some_and(|a| a.trim().is_empty())
        {
            return Err(LuError::configuration("criteria attribute name cannot be blank"));
        }

        let name_regex = match self.name_glob.as_deref() {
            Some(glob) => Some(glob_to_regex(glob)?),
            None => None,
        };

        let mut tags = BTreeSet::new();
        for tag in self.tags {
            if tag.trim().is_empty() {
                return Err(LuError::configuration("criteria tag cannot be blank"));
            }
            tags.insert(tag);
        }

        Ok(LuCriteria {
            inherits: self.inherits,
            implements: self.implements,
            assignable_to: self.assignable_to,
            is_abstract: self.is_abstract,
            is_interface: self.is_interface,
            name_glob: self.name_glob,
            name_regex,
            has_attribute: self.has_attribute,
            predicate: self.predicate,
            tags,
        })
    }
}

/// Compile a name glob into an anchored, case-sensitive regex.
pub fn glob_to_regex(glob: &str) -> Result<Regex> {
    if glob.trim().is_empty() {
        return Err(LuError::configuration("criteria name glob cannot be blank"));
    }
    let pattern = regex::escape(glob)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{}$", pattern))
        .map_err(|e| LuError::configuration(format!("invalid name glob '{}': {}", glob, e)))
}
