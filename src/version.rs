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

//! # Lu Version Module
//!
//! Module file versions use four numeric components,
//! `major.minor.build.revision`. Parsing accepts two to four components and
//! fills the missing ones with zero; rendering always prints all four, so
//! the fallback plugin version renders as `1.0.0.0`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{LuError, Result};

/// Four-part version attached to every plugin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LuVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl LuVersion {
    /// Version used whenever a module declares no usable file version.
    pub const FALLBACK: LuVersion = LuVersion::new(1, 0, 0, 0);

    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        LuVersion {
            major,
            minor,
            build,
            revision,
        }
    }

    pub fn parse(version_str: &str) -> Result<Self> {
        let trimmed = version_str.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(LuError::configuration(format!(
                "invalid version '{}', expected major.minor[.build[.revision]]",
                version_str
            )));
        }

        let mut components = [0u32; 4];
        for (index, part) in parts.iter().enumerate() {
            components[index] = part.parse::<u32>().map_err(|_| {
                LuError::configuration(format!(
                    "invalid version component '{}' in '{}'",
                    part, version_str
                ))
            })?;
        }

        Ok(LuVersion::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }

    /// `0.0.0.0` is treated as "no version" by the default naming policy.
    pub fn is_zero(&self) -> bool {
        *self == LuVersion::default()
    }
}

impl fmt::Display for LuVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for LuVersion {
    type Err = LuError;

    fn from_str(s: &str) -> Result<Self> {
        LuVersion::parse(s)
    }
}

impl TryFrom<String> for LuVersion {
    type Error = LuError;

    fn try_from(value: String) -> Result<Self> {
        LuVersion::parse(&value)
    }
}

impl From<LuVersion> for String {
    fn from(version: LuVersion) -> Self {
        version.to_string()
    }
}
