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

//! # Matching Module
//!
//! Capability criteria, resolution contexts and the type matching engine.

pub mod criteria;
pub mod context;
pub mod finder;

pub use criteria::{glob_to_regex, LuCriteria, LuCriteriaBuilder, LuTypePredicate};
pub use context::{LuLoadedContext, LuManifestCache, LuMetadataContext, LuTypeResolutionContext};
pub use finder::{LuTypeFinder, LuTypeMatch};
