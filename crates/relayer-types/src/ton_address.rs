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
use std::str::FromStr;

use ethers::types::U256;
use round_relayer_utils::Error;
use serde::{Deserialize, Serialize};

/// A raw source ledger address: a signed workchain id and a 256-bit account
/// id, written as `<wid>:<64 hex chars>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TonAddress {
    workchain: i8,
    account: [u8; 32],
}

impl TonAddress {
    /// Creates an address from its parts.
    pub const fn new(workchain: i8, account: [u8; 32]) -> Self {
        Self { workchain, account }
    }

    /// The workchain (shard) identifier, `-1` for the masterchain.
    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    /// The account id bytes, big endian.
    pub fn account(&self) -> &[u8; 32] {
        &self.account
    }

    /// The account id as an unsigned 256-bit integer.
    pub fn account_u256(&self) -> U256 {
        U256::from_big_endian(&self.account)
    }
}

impl FromStr for TonAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidTonAddress(s.to_string());
        let (wid, body) = s.trim().split_once(':').ok_or_else(invalid)?;
        let workchain = wid.parse::<i8>().map_err(|_| invalid())?;
        let body = body.strip_prefix("0x").unwrap_or(body);
        // some gateways drop the leading zeros of the account id.
        if body.is_empty() || body.len() > 64 {
            return Err(invalid());
        }
        let padded = format!("{body:0>64}");
        let mut account = [0u8; 32];
        hex::decode_to_slice(padded, &mut account).map_err(|_| invalid())?;
        Ok(Self { workchain, account })
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, hex::encode(self.account))
    }
}

impl fmt::Debug for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TonAddress({self})")
    }
}

impl Serialize for TonAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TonAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct TonAddressVisitor;
        impl<'de> serde::de::Visitor<'de> for TonAddressVisitor {
            type Value = TonAddress;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a raw address in the `<wid>:<hex>` form")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(TonAddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIGURATION: &str =
        "0:3c6e8b1d0a7ab2e7a0b1e4c9b1c8d0a8f7e6d5c4b3a291807f6e5d4c3b2a1908";

    #[test]
    fn parses_and_prints_back() {
        let address: TonAddress = CONFIGURATION.parse().unwrap();
        assert_eq!(address.workchain(), 0);
        assert_eq!(address.account()[0], 0x3c);
        assert_eq!(address.to_string(), CONFIGURATION);
    }

    #[test]
    fn parses_masterchain_and_short_bodies() {
        let address: TonAddress = "-1:ff".parse().unwrap();
        assert_eq!(address.workchain(), -1);
        assert_eq!(address.account_u256(), U256::from(0xff));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "0", "0:", "x:00", "0:zz", "300:00"] {
            assert!(bad.parse::<TonAddress>().is_err(), "{bad} should fail");
        }
        let too_long = format!("0:{}", "1".repeat(65));
        assert!(too_long.parse::<TonAddress>().is_err());
    }

    #[test]
    fn deserializes_from_json_string() {
        let json = format!("\"{CONFIGURATION}\"");
        let address: TonAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(address.to_string(), CONFIGURATION);
    }
}
