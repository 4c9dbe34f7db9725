// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration value types shared by the round relayer crates.

pub mod gas_price;
pub mod mnemonic;
pub mod rpc_url;
pub mod ton_address;

/// Resolves `$VAR` indirection used by secret-ish configuration values.
///
/// A value starting with `$` is replaced by the content of the named
/// environment variable, anything else is returned as is.
pub(crate) fn resolve_env_value(value: &str) -> Result<String, String> {
    match value.strip_prefix('$') {
        Some(var) => {
            tracing::trace!("Reading {} from env", var);
            std::env::var(var).map_err(|e| {
                format!("error while loading this env {var}: {e}")
            })
        }
        None => Ok(value.to_string()),
    }
}
