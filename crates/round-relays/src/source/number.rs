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


//! Serde helpers for integers returned by the source ledger gateway.
//!
//! Getter outputs carry integers as JSON numbers, decimal strings or `0x`
//! prefixed hex strings depending on their ABI width.

use ethers::types::U256;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Number(u64),
    Text(String),
}

impl Repr {
    fn into_u256(self) -> Result<U256, String> {
        match self {
            Repr::Number(n) => Ok(U256::from(n)),
            Repr::Text(s) => parse_u256(&s),
        }
    }
}

/// Parses a decimal or `0x` prefixed hex integer.
pub fn parse_u256(value: &str) -> Result<U256, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(value).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| format!("invalid integer `{value}`: {e}"))
}

fn narrow<T>(value: U256, max: u64) -> Result<T, String>
where
    T: TryFrom<u64>,
{
    if value > U256::from(max) {
        return Err(format!("{value} is out of range"));
    }
    T::try_from(value.as_u64()).map_err(|_| format!("{value} is out of range"))
}

pub(crate) fn deserialize_u32<'de, D>(
    deserializer: D,
) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Repr::deserialize(deserializer)?
        .into_u256()
        .map_err(D::Error::custom)?;
    narrow(value, u64::from(u32::MAX)).map_err(D::Error::custom)
}

pub(crate) fn deserialize_u64<'de, D>(
    deserializer: D,
) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Repr::deserialize(deserializer)?
        .into_u256()
        .map_err(D::Error::custom)?;
    narrow(value, u64::MAX).map_err(D::Error::custom)
}

pub(crate) fn deserialize_u256<'de, D>(
    deserializer: D,
) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    Repr::deserialize(deserializer)?
        .into_u256()
        .map_err(D::Error::custom)
}

pub(crate) fn deserialize_u256_vec<'de, D>(
    deserializer: D,
) -> Result<Vec<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Repr>::deserialize(deserializer)?
        .into_iter()
        .map(Repr::into_u256)
        .collect::<Result<_, _>>()
        .map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "deserialize_u32")]
        small: u32,
        #[serde(deserialize_with = "deserialize_u64")]
        lt: u64,
        #[serde(deserialize_with = "deserialize_u256_vec")]
        keys: Vec<U256>,
    }

    #[test]
    fn accepts_numbers_decimal_and_hex_strings() {
        let sample: Sample = serde_json::from_value(serde_json::json!({
            "small": "0x10",
            "lt": "18446744073709551615",
            "keys": [7, "8", "0xff"],
        }))
        .unwrap();
        assert_eq!(sample.small, 16);
        assert_eq!(sample.lt, u64::MAX);
        assert_eq!(
            sample.keys,
            vec![U256::from(7), U256::from(8), U256::from(255)]
        );
    }

    #[test]
    fn rejects_values_wider_than_the_field() {
        let result = serde_json::from_value::<Sample>(serde_json::json!({
            "small": "4294967296",
            "lt": 1,
            "keys": [],
        }));
        assert!(result.is_err());
    }
}
