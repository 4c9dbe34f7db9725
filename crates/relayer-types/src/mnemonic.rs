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

use bip39::{Language, Mnemonic as BipMnemonic};
use serde::Deserialize;

/// The submitter signing credential: a BIP-39 english seed phrase.
///
/// Validated at load time so a typo is a startup failure and not a
/// failure right before signing.
#[derive(Clone)]
pub struct Mnemonic(BipMnemonic);

impl Mnemonic {
    /// The seed phrase, space separated.
    pub fn phrase(&self) -> &str {
        self.0.phrase()
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Mnemonic").finish()
    }
}

impl std::str::FromStr for Mnemonic {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.starts_with("0x") {
            return Err(String::from(
                "got a hex string but expected a 12/24 word list",
            ));
        }
        let phrase = crate::resolve_env_value(value)?;
        BipMnemonic::from_phrase(phrase.trim(), Language::English)
            .map(Self)
            .map_err(|_| String::from("Cannot get the mnemonic from string"))
    }
}

impl<'de> Deserialize<'de> for Mnemonic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MnemonicVisitor;
        impl<'de> serde::de::Visitor<'de> for MnemonicVisitor {
            type Value = Mnemonic;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str("12 or 24 word mnemonic seed phrase")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(MnemonicVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn parses_a_valid_phrase() {
        let mnemonic: Mnemonic = PHRASE.parse().unwrap();
        assert_eq!(mnemonic.phrase(), PHRASE);
    }

    #[test]
    fn debug_does_not_leak_the_phrase() {
        let mnemonic: Mnemonic = PHRASE.parse().unwrap();
        assert!(!format!("{mnemonic:?}").contains("junk"));
    }

    #[test]
    fn rejects_hex_keys_and_bad_words() {
        assert!("0xdeadbeef".parse::<Mnemonic>().is_err());
        assert!("not a seed phrase".parse::<Mnemonic>().is_err());
    }
}
