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

use std::fmt;

use ethers::types::U256;
use ethers::utils::{format_units, parse_units};
use serde::Deserialize;

/// A gas price in wei, configured in gwei (`"40"`, `"2.5"`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct GasPrice(U256);

impl GasPrice {
    /// Wraps an amount of wei.
    pub const fn from_wei(wei: U256) -> Self {
        Self(wei)
    }

    /// Parses an amount of gwei.
    pub fn from_gwei(gwei: &str) -> round_relayer_utils::Result<Self> {
        let wei = parse_units(gwei.trim(), "gwei")?;
        Ok(Self(wei.into()))
    }

    /// The price in wei.
    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match format_units(self.0, "gwei") {
            Ok(gwei) => write!(f, "{gwei} gwei"),
            Err(_) => write!(f, "{} wei", self.0),
        }
    }
}

impl fmt::Debug for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GasPrice({self})")
    }
}

impl<'de> Deserialize<'de> for GasPrice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct GweiVisitor;
        impl<'de> serde::de::Visitor<'de> for GweiVisitor {
            type Value = GasPrice;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a gas price in gwei")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                GasPrice::from_gwei(value).map_err(serde::de::Error::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&value.to_string())
            }
        }

        deserializer.deserialize_any(GweiVisitor)
    }
}
