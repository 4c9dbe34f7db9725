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


#![warn(missing_docs)]
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of a relay run: the configuration and
//! the clients built from it.
use std::sync::Arc;

use ethers::prelude::*;
use ethers::signers::coins_bip39::English;
use round_relayer_config::RoundRelayerConfig;

mod source_retry_policy;

pub use source_retry_policy::SourceRetryPolicy;

/// RelayerContext contains the configuration of one relay run.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: RoundRelayerConfig,
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    pub fn new(config: RoundRelayerConfig) -> Self {
        Self { config }
    }

    /// The configuration of this run.
    pub fn config(&self) -> &RoundRelayerConfig {
        &self.config
    }

    /// Returns an HTTP client with the configured request timeout.
    ///
    /// Used for the source ledger gateway and, wrapped by [`Http`], for the
    /// destination ledger.
    pub fn http_client(&self) -> round_relayer_utils::Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout())
            .build()?;
        Ok(client)
    }

    /// Returns a new `EthereumProvider` for the destination ledger.
    pub fn evm_provider(&self) -> round_relayer_utils::Result<Provider<Http>> {
        let http = Http::new_with_client(
            url::Url::clone(&self.config.evm_rpc),
            self.http_client()?,
        );
        Ok(Provider::new(http))
    }

    /// Derives the submitter wallet from the configured seed phrase.
    ///
    /// The first account of the default derivation path is used.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - The chain id the wallet signs transactions for.
    pub fn evm_wallet(
        &self,
        chain_id: u64,
    ) -> round_relayer_utils::Result<LocalWallet> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(self.config.evm_seed.phrase())
            .build()?
            .with_chain_id(chain_id);
        Ok(wallet)
    }

    /// Sets up the signing client used for every destination ledger read
    /// and for the submission.
    ///
    /// The chain id is read from the node, so a misconfigured endpoint fails
    /// here and not at signing time.
    pub async fn evm_signer_client(
        &self,
    ) -> round_relayer_utils::Result<Arc<round_relayer_utils::EvmSignerClient>>
    {
        let provider = self.evm_provider()?;
        let chain_id = provider.get_chainid().await?;
        tracing::debug!(
            %chain_id,
            endpoint = %self.config.evm_rpc,
            "Connected to destination ledger"
        );
        let wallet = self.evm_wallet(chain_id.as_u64())?;
        Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
    }

    /// Classifies source ledger read failures for the page retry loop.
    pub fn source_retry_policy(&self) -> SourceRetryPolicy {
        SourceRetryPolicy::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Config;

    fn context() -> RelayerContext {
        let builder = [
            ("evm_rpc", "http://localhost:8545"),
            ("evm_bridge", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            (
                "evm_seed",
                "test test test test test test test test test test test junk",
            ),
            ("ton_rpc", "http://localhost:8080/rpc"),
            (
                "round_relays_configuration",
                "0:3c6e8b1d0a7ab2e7a0b1e4c9b1c8d0a8f7e6d5c4b3a291807f6e5d4c3b2a1908",
            ),
            (
                "cell_encoder",
                "-1:a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90",
            ),
            ("target_gas_price", "40"),
        ]
        .iter()
        .fold(Config::builder(), |builder, (k, v)| {
            builder.set_override(*k, *v).unwrap()
        });
        let config =
            round_relayer_config::utils::parse_from_builder(builder).unwrap();
        RelayerContext::new(config)
    }

    #[test]
    fn wallet_is_derived_from_the_seed_phrase() {
        let wallet = context().evm_wallet(31337).unwrap();
        // first account of the well known development mnemonic.
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            .parse()
            .unwrap();
        assert_eq!(wallet.address(), expected);
        assert_eq!(wallet.chain_id(), 31337);
    }

    #[test]
    fn provider_points_at_the_configured_endpoint() {
        let provider = context().evm_provider().unwrap();
        assert_eq!(provider.url().as_str(), "http://localhost:8545/");
    }
}
