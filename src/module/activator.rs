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

//! # Module Activation
//!
//! Activation runs a module's initializers during a real load. It is the
//! only place where module code executes; metadata-only prescans never
//! reach it.

use std::sync::Arc;

use crate::errors::Result;
use crate::module::archive::LuModulePayload;
use crate::module::types::LuModule;

/// Runs the initializers of a freshly loaded module.
pub trait LuModuleActivator: Send + Sync + std::fmt::Debug {
    fn activate(&self, module: &LuModule, payload: Option<&LuModulePayload>) -> Result<()>;
}

/// Activator that executes nothing. Payloads are accepted and ignored.
#[derive(Debug, Default)]
pub struct LuNoopActivator;

impl LuModuleActivator for LuNoopActivator {
    fn activate(&self, module: &LuModule, payload: Option<&LuModulePayload>) -> Result<()> {
        if payload.is_some() {
            log::debug!(
                "module.activate.skipped: payload present but no executing activator configured - module={}",
                module.name()
            );
        }
        Ok(())
    }
}

/// Activator used when none is configured explicitly.
pub fn default_activator() -> Arc<dyn LuModuleActivator> {
    #[cfg(feature = "wasm")]
    {
        Arc::new(wasm::LuWasmActivator::new())
    }
    #[cfg(not(feature = "wasm"))]
    {
        Arc::new(LuNoopActivator)
    }
}

#[cfg(feature = "wasm")]
pub use wasm::LuWasmActivator;

#[cfg(feature = "wasm")]
mod wasm {
    use wasmtime::{Engine, Linker, Module, Store};

    use super::LuModuleActivator;
    use crate::errors::{LuError, Result};
    use crate::module::archive::LuModulePayload;
    use crate::module::types::LuModule;

    /// Export called after instantiation when present, in addition to the
    /// module's start function.
    const INITIALIZE_EXPORT: &str = "_initialize";

    /// Instantiates WebAssembly payloads, which runs their start function
    /// and `_initialize` export. Payloads may not import anything.
    #[derive(Default)]
    pub struct LuWasmActivator {
        engine: Engine,
    }

    impl std::fmt::Debug for LuWasmActivator {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("LuWasmActivator").finish()
        }
    }

    impl LuWasmActivator {
        pub fn new() -> Self {
            LuWasmActivator {
                engine: Engine::default(),
            }
        }
    }

    impl LuModuleActivator for LuWasmActivator {
        fn activate(&self, module: &LuModule, payload: Option<&LuModulePayload>) -> Result<()> {
            let Some(payload) = payload else {
                return Ok(());
            };

            // `Module::new` accepts both binary and text encodings.
            let compiled = Module::new(&self.engine, &payload.bytes)
                .map_err(|e| LuError::activation(module.name(), e.to_string()))?;
            let mut store = Store::new(&self.engine, ());
            let linker: Linker<()> = Linker::new(&self.engine);
            let instance = linker
                .instantiate(&mut store, &compiled)
                .map_err(|e| LuError::activation(module.name(), e.to_string()))?;

            if let Ok(init) = instance.get_typed_func::<(), ()>(&mut store, INITIALIZE_EXPORT) {
                init.call(&mut store, ())
                    .map_err(|e| LuError::activation(module.name(), e.to_string()))?;
            }

            log::info!(
                "module.activate.wasm: module initializers executed - module={}, payload_bytes={}",
                module.name(),
                payload.bytes.len()
            );
            Ok(())
        }
    }
}
