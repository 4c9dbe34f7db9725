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


//! The destination ledger boundary: the bridge contract and the submitter
//! account.

use std::sync::Arc;

use ethers::prelude::*;
use round_relayer_context::RelayerContext;
use round_relayer_utils::{Error, EvmSignerClient};

abigen!(
    Bridge,
    r#"[
        function lastRound() external view returns (uint32)
        function recoverSignature(bytes payload, bytes signature) external view returns (address)
        function setRoundRelays(bytes payload, bytes[] signatures) external
    ]"#,
);

/// Transaction counts of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionCounts {
    /// Count including transactions still in the mempool.
    pub pending: U256,
    /// Count at the latest block.
    pub confirmed: U256,
}

/// Read and write access to the destination ledger.
#[async_trait::async_trait]
pub trait DestinationLedger: Send + Sync {
    /// The highest round the bridge accepted.
    async fn last_round(&self) -> round_relayer_utils::Result<u32>;

    /// Recovers the signer of `signature` over `payload` with the bridge's
    /// own recovery routine.
    async fn recover_signer(
        &self,
        payload: &Bytes,
        signature: &Bytes,
    ) -> round_relayer_utils::Result<Address>;

    /// Current network gas price.
    async fn gas_price(&self) -> round_relayer_utils::Result<U256>;

    /// Balance of `account` at the latest block.
    async fn balance(
        &self,
        account: Address,
    ) -> round_relayer_utils::Result<U256>;

    /// Pending and confirmed transaction counts of `account`.
    async fn transaction_counts(
        &self,
        account: Address,
    ) -> round_relayer_utils::Result<TransactionCounts>;

    /// The account signing the submission.
    fn submitter(&self) -> Address;

    /// Simulates the submission from the submitter account without
    /// broadcasting it.
    async fn dry_run_round(
        &self,
        payload: &Bytes,
        signatures: &[Bytes],
        gas_price: U256,
    ) -> round_relayer_utils::Result<()>;

    /// Signs and broadcasts the submission. Returns as soon as the node
    /// accepted the transaction.
    async fn submit_round(
        &self,
        payload: &Bytes,
        signatures: &[Bytes],
        gas_price: U256,
    ) -> round_relayer_utils::Result<H256>;
}

/// The bridge contract, reached through the submitter's signing client.
pub struct EvmBridge {
    client: Arc<EvmSignerClient>,
    contract: Bridge<EvmSignerClient>,
}

impl EvmBridge {
    /// Creates the bridge at `address`.
    pub fn new(client: Arc<EvmSignerClient>, address: Address) -> Self {
        let contract = Bridge::new(address, client.clone());
        Self { client, contract }
    }

    /// Connects to the configured bridge.
    pub async fn from_context(
        ctx: &RelayerContext,
    ) -> round_relayer_utils::Result<Self> {
        let client = ctx.evm_signer_client().await?;
        Ok(Self::new(client, ctx.config.evm_bridge))
    }

    fn set_round_relays_call(
        &self,
        payload: &Bytes,
        signatures: &[Bytes],
        gas_price: U256,
    ) -> ContractCall<EvmSignerClient, ()> {
        self.contract
            .set_round_relays(payload.clone(), signatures.to_vec())
            .legacy()
            .gas_price(gas_price)
    }
}

#[async_trait::async_trait]
impl DestinationLedger for EvmBridge {
    async fn last_round(&self) -> round_relayer_utils::Result<u32> {
        let round = self.contract.last_round().call().await?;
        Ok(round)
    }

    async fn recover_signer(
        &self,
        payload: &Bytes,
        signature: &Bytes,
    ) -> round_relayer_utils::Result<Address> {
        let signer = self
            .contract
            .recover_signature(payload.clone(), signature.clone())
            .call()
            .await?;
        Ok(signer)
    }

    async fn gas_price(&self) -> round_relayer_utils::Result<U256> {
        let gas_price = self.client.inner().get_gas_price().await?;
        Ok(gas_price)
    }

    async fn balance(
        &self,
        account: Address,
    ) -> round_relayer_utils::Result<U256> {
        let balance = self.client.inner().get_balance(account, None).await?;
        Ok(balance)
    }

    async fn transaction_counts(
        &self,
        account: Address,
    ) -> round_relayer_utils::Result<TransactionCounts> {
        let provider = self.client.inner();
        let pending = provider
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await?;
        let confirmed = provider
            .get_transaction_count(account, Some(BlockNumber::Latest.into()))
            .await?;
        Ok(TransactionCounts { pending, confirmed })
    }

    fn submitter(&self) -> Address {
        self.client.address()
    }

    async fn dry_run_round(
        &self,
        payload: &Bytes,
        signatures: &[Bytes],
        gas_price: U256,
    ) -> round_relayer_utils::Result<()> {
        self.set_round_relays_call(payload, signatures, gas_price)
            .call()
            .await
            .map_err(|e| Error::DryRunFailed(e.to_string()))
    }

    async fn submit_round(
        &self,
        payload: &Bytes,
        signatures: &[Bytes],
        gas_price: U256,
    ) -> round_relayer_utils::Result<H256> {
        let call = self.set_round_relays_call(payload, signatures, gas_price);
        let pending = call.send().await?;
        Ok(pending.tx_hash())
    }
}
