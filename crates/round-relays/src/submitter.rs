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


use std::sync::Arc;

use ethers::types::{H256, U256};
use ethers::utils::{format_ether, format_units};
use round_relayer_types::gas_price::GasPrice;
use round_relayer_utils::clickable_link::ClickableLink;
use round_relayer_utils::probe;

use crate::collector::Attestation;
use crate::destination::DestinationLedger;
use crate::encoder::RoundPayload;

/// The gas price a submission is sent with: the network price, capped at
/// `ceiling`.
pub fn effective_gas_price(network: U256, ceiling: U256) -> U256 {
    network.min(ceiling)
}

/// Sends the round transaction.
pub struct Submitter<D> {
    destination: Arc<D>,
    target_gas_price: GasPrice,
    dry_run: bool,
    explorer: Option<url::Url>,
}

impl<D> Submitter<D>
where
    D: DestinationLedger,
{
    /// Creates a submitter paying at most `target_gas_price`.
    ///
    /// With `dry_run` set, every submission is simulated first.
    pub fn new(
        destination: Arc<D>,
        target_gas_price: GasPrice,
        dry_run: bool,
        explorer: Option<url::Url>,
    ) -> Self {
        Self {
            destination,
            target_gas_price,
            dry_run,
            explorer,
        }
    }

    /// Signs and broadcasts `payload` with the signatures of
    /// `attestations`, in their order.
    ///
    /// Exactly one transaction is sent, and it is never resent: a failure
    /// here fails the run.
    pub async fn submit(
        &self,
        payload: &RoundPayload,
        attestations: &[Attestation],
    ) -> round_relayer_utils::Result<H256> {
        let submitter = self.destination.submitter();
        let balance = self.destination.balance(submitter).await?;
        tracing::info!(
            %submitter,
            balance = %format_ether(balance),
            "Submitting round",
        );
        let network_gas_price = self.destination.gas_price().await?;
        let gas_price =
            effective_gas_price(network_gas_price, self.target_gas_price.wei());
        tracing::info!(
            network = %format_units(network_gas_price, "gwei")?,
            target = %self.target_gas_price,
            using = %format_units(gas_price, "gwei")?,
            "Gas price",
        );
        let signatures: Vec<_> =
            attestations.iter().map(|a| a.signature.clone()).collect();
        if self.dry_run {
            self.destination
                .dry_run_round(payload.as_bytes(), &signatures, gas_price)
                .await?;
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Submission,
                dry_run = "passed",
            );
        }
        let tx_hash = self
            .destination
            .submit_round(payload.as_bytes(), &signatures, gas_price)
            .await?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Submission,
            pending = true,
            %tx_hash,
            %gas_price,
        );
        match self.explorer.as_ref() {
            Some(explorer) => {
                let link = ClickableLink::for_transaction(explorer, tx_hash);
                tracing::info!("Tx {} is submitted and pending!", link);
            }
            None => {
                tracing::info!("Tx {:#x} is submitted and pending!", tx_hash);
            }
        }
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::{Address, Bytes};
    use round_relayer_utils::Error;

    use super::*;
    use crate::mocked::MockDestinationLedger;

    fn gwei(n: u64) -> U256 {
        U256::from(n) * U256::exp10(9)
    }

    fn attestations() -> Vec<Attestation> {
        [0xaa, 0xbb]
            .into_iter()
            .map(|b| Attestation {
                signature: Bytes::from(vec![b; 65]),
                signer: Address::repeat_byte(b),
            })
            .collect()
    }

    #[test]
    fn gas_price_never_exceeds_the_target() {
        assert_eq!(effective_gas_price(gwei(50), gwei(40)), gwei(40));
        assert_eq!(effective_gas_price(gwei(12), gwei(40)), gwei(12));
        assert_eq!(effective_gas_price(gwei(40), gwei(40)), gwei(40));
    }

    #[tokio::test]
    async fn sends_one_transaction_at_the_capped_price() {
        let destination = Arc::new(
            MockDestinationLedger::builder().gas_price(gwei(90)).build(),
        );
        let submitter = Submitter::new(
            destination.clone(),
            GasPrice::from_wei(gwei(40)),
            true,
            None,
        );
        let payload = RoundPayload(Bytes::from(vec![1, 2, 3]));
        submitter.submit(&payload, &attestations()).await.unwrap();
        let submissions = destination.submissions().await;
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].gas_price, gwei(40));
        assert_eq!(submissions[0].payload, *payload.as_bytes());
        assert_eq!(
            submissions[0].signatures,
            [Bytes::from(vec![0xaa; 65]), Bytes::from(vec![0xbb; 65])]
        );
    }

    #[tokio::test]
    async fn reverting_dry_run_broadcasts_nothing() {
        let destination =
            Arc::new(MockDestinationLedger::builder().reverts(true).build());
        let submitter = Submitter::new(
            destination.clone(),
            GasPrice::from_wei(gwei(40)),
            true,
            None,
        );
        let payload = RoundPayload(Bytes::from(vec![1]));
        let result = submitter.submit(&payload, &attestations()).await;
        assert!(matches!(result, Err(Error::DryRunFailed(_))));
        assert!(destination.submissions().await.is_empty());
    }
}
