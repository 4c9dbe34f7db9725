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

use ethers::types::{Address, Bytes};
use futures::{StreamExt, TryStreamExt};
use round_relayer_types::ton_address::TonAddress;
use round_relayer_utils::{probe, Error};
use tokio::sync::Semaphore;

use crate::destination::DestinationLedger;
use crate::encoder::{PayloadEncoder, RoundPayload};
use crate::source::{
    RoundRelaysEventData, SourceEvent, SourceLedger, SourceLedgerExt,
};

/// One relay's signature over a round payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    /// The raw signature, as stored by the event contract.
    pub signature: Bytes,
    /// The destination ledger address that produced it.
    pub signer: Address,
}

/// A round event with everything needed to submit it.
#[derive(Debug, Clone)]
pub struct AttestedRound {
    /// The event the round was announced by.
    pub event: SourceEvent,
    /// The round the event contract was deployed for.
    pub round_number: u32,
    /// The decoded event data.
    pub event_data: RoundRelaysEventData,
    /// The canonical payload.
    pub payload: RoundPayload,
    /// Attestations, ascending by signer, one per signer.
    pub attestations: Vec<Attestation>,
}

impl AttestedRound {
    /// The signatures in submission order.
    pub fn signatures(&self) -> Vec<Bytes> {
        self.attestations
            .iter()
            .map(|a| a.signature.clone())
            .collect()
    }
}

/// Sorts attestations ascending by signer and keeps the first signature of
/// every signer.
///
/// The bridge walks the signatures expecting strictly increasing signers.
pub fn canonicalize(mut attestations: Vec<Attestation>) -> Vec<Attestation> {
    attestations.sort_by_key(|a| a.signer);
    attestations.dedup_by_key(|a| a.signer);
    attestations
}

/// Gathers the vote data and the attestations of round events.
///
/// Both the events collected at once and the signature recoveries sent to
/// the destination ledger at once are bounded by the same concurrency.
pub struct AttestationCollector<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    cell_encoder: TonAddress,
    encoder: PayloadEncoder,
    concurrency: usize,
    /// Shared by every event being collected.
    recoveries: Semaphore,
}

impl<S, D> AttestationCollector<S, D>
where
    S: SourceLedger,
    D: DestinationLedger,
{
    /// Creates a collector that works on up to `concurrency` events at a
    /// time.
    pub fn new(
        source: Arc<S>,
        destination: Arc<D>,
        cell_encoder: TonAddress,
        encoder: PayloadEncoder,
        concurrency: usize,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            source,
            destination,
            cell_encoder,
            encoder,
            concurrency,
            recoveries: Semaphore::new(concurrency),
        }
    }

    /// Reads the current vote data and signatures of `event` and recovers
    /// their signers.
    ///
    /// Fails if any signature cannot be recovered.
    #[tracing::instrument(
        skip_all,
        fields(event_contract = %event.event_contract),
    )]
    pub async fn collect(
        &self,
        event: &SourceEvent,
    ) -> round_relayer_utils::Result<AttestedRound> {
        let details = self.source.event_details(&event.event_contract).await?;
        let round_number = self
            .source
            .event_round_number(&event.event_contract)
            .await?;
        let event_data = self
            .source
            .decode_round_event_data(
                &self.cell_encoder,
                &details.vote_data.event_data,
            )
            .await?;
        let payload = self.encoder.encode(
            event,
            round_number,
            &details.vote_data,
            &event_data,
        );
        let recovered: Vec<_> =
            futures::stream::iter(details.signatures.into_iter().enumerate())
                .map(|(index, signature)| {
                    self.recover(&payload, index, signature)
                })
                .buffered(self.concurrency)
                .try_collect()
                .await?;
        let signatures = recovered.len();
        let attestations = canonicalize(recovered);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Attestation,
            event_contract = %event.event_contract,
            round = round_number,
            signatures,
            signers = attestations.len(),
        );
        Ok(AttestedRound {
            event: event.clone(),
            round_number,
            event_data,
            payload,
            attestations,
        })
    }

    /// Collects every event, keeping the input order.
    ///
    /// Stops at the first failure.
    pub async fn collect_all(
        &self,
        events: &[SourceEvent],
    ) -> round_relayer_utils::Result<Vec<AttestedRound>> {
        futures::stream::iter(events)
            .map(|event| self.collect(event))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn recover(
        &self,
        payload: &RoundPayload,
        index: usize,
        signature: Bytes,
    ) -> round_relayer_utils::Result<Attestation> {
        let _permit = self
            .recoveries
            .acquire()
            .await
            .map_err(|_| Error::Generic("signature recovery pool is closed"))?;
        let signer = self
            .destination
            .recover_signer(payload.as_bytes(), &signature)
            .await
            .map_err(|e| Error::SignatureRecovery {
                index,
                reason: e.to_string(),
            })?;
        if signer.is_zero() {
            return Err(Error::SignatureRecovery {
                index,
                reason: "recovered the zero address".to_string(),
            });
        }
        Ok(Attestation { signature, signer })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::mocked::{
        round_event_getters, MockDestinationLedger, MockSourceLedger,
    };

    fn address(byte: u8) -> Address {
        Address::from_low_u64_be(byte.into())
    }

    fn signature(byte: u8) -> Bytes {
        Bytes::from(vec![byte; 65])
    }

    fn event() -> SourceEvent {
        SourceEvent {
            message_id: "01".into(),
            created_at: 100,
            event_contract: TonAddress::new(0, [0xee; 32]),
        }
    }

    fn source(signatures: &[Bytes]) -> MockSourceLedger {
        let getters = round_event_getters(
            &event().event_contract,
            &TonAddress::new(0, [0xce; 32]),
            5,
            signatures,
        );
        MockSourceLedger::builder().getters(getters).build()
    }

    fn collector(
        signatures: &[Bytes],
        signers: HashMap<Bytes, Address>,
    ) -> AttestationCollector<MockSourceLedger, MockDestinationLedger> {
        collector_with(signatures, signers, 4)
    }

    fn collector_with(
        signatures: &[Bytes],
        signers: HashMap<Bytes, Address>,
        concurrency: usize,
    ) -> AttestationCollector<MockSourceLedger, MockDestinationLedger> {
        AttestationCollector::new(
            Arc::new(source(signatures)),
            Arc::new(MockDestinationLedger::builder().signers(signers).build()),
            TonAddress::new(0, [0xce; 32]),
            PayloadEncoder::new(
                TonAddress::new(0, [0x11; 32]),
                Address::repeat_byte(0x77),
            ),
            concurrency,
        )
    }

    #[test]
    fn canonical_order_is_ascending_by_signer() {
        let recovered = [0xbb, 0xaa, 0xcc]
            .into_iter()
            .map(|b| Attestation {
                signature: signature(b),
                signer: address(b),
            })
            .collect();
        let signers: Vec<_> =
            canonicalize(recovered).into_iter().map(|a| a.signer).collect();
        assert_eq!(signers, [address(0xaa), address(0xbb), address(0xcc)]);
    }

    #[test]
    fn ordering_compares_whole_addresses() {
        // the high byte decides, not the low one.
        let mut bytes = [0u8; 20];
        bytes[0] = 0x01;
        let high = Address::from(bytes);
        let low = Address::from_low_u64_be(0xff);
        let ordered = canonicalize(vec![
            Attestation {
                signature: signature(1),
                signer: high,
            },
            Attestation {
                signature: signature(2),
                signer: low,
            },
        ]);
        assert_eq!(ordered[0].signer, low);
        assert_eq!(ordered[1].signer, high);
    }

    #[test]
    fn duplicate_signers_are_kept_once() {
        let ordered = canonicalize(vec![
            Attestation {
                signature: signature(1),
                signer: address(0xaa),
            },
            Attestation {
                signature: signature(2),
                signer: address(0xaa),
            },
        ]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].signature, signature(1));
    }

    #[tokio::test]
    async fn collects_and_sorts_attestations() {
        let signatures = [signature(2), signature(1), signature(3)];
        let signers = HashMap::from([
            (signature(1), address(0xbb)),
            (signature(2), address(0xcc)),
            (signature(3), address(0xaa)),
        ]);
        let round = collector(&signatures, signers)
            .collect(&event())
            .await
            .unwrap();
        assert_eq!(round.round_number, 5);
        assert_eq!(round.event_data.round_num, 6);
        assert_eq!(round.event_data.eth_keys.len(), 1);
        assert_eq!(
            round.signatures(),
            [signature(3), signature(1), signature(2)]
        );
    }

    #[tokio::test]
    async fn any_unrecoverable_signature_aborts() {
        let signatures = [signature(1), signature(9)];
        let signers = HashMap::from([(signature(1), address(0xbb))]);
        let result = collector(&signatures, signers).collect(&event()).await;
        assert!(matches!(
            result,
            Err(Error::SignatureRecovery { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn zero_address_is_not_a_signer() {
        let signatures = [signature(1)];
        let signers = HashMap::from([(signature(1), Address::zero())]);
        let result = collector(&signatures, signers).collect(&event()).await;
        assert!(matches!(
            result,
            Err(Error::SignatureRecovery { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn collect_all_keeps_event_order() {
        let signatures = [signature(1)];
        let signers = HashMap::from([(signature(1), address(0xbb))]);
        let collector = collector(&signatures, signers);
        let events = vec![event(), event()];
        let rounds = collector.collect_all(&events).await.unwrap();
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].payload, rounds[1].payload);
    }

    #[tokio::test]
    async fn recoveries_share_one_bound_across_events() {
        let signatures: Vec<_> = (1..=6).map(signature).collect();
        let signers = signatures
            .iter()
            .cloned()
            .zip((0xa1..=0xa6).map(address))
            .collect();
        let collector = collector_with(&signatures, signers, 2);
        let events = vec![event(), event(), event()];
        let rounds = collector.collect_all(&events).await.unwrap();
        assert_eq!(rounds.len(), 3);
        assert!(rounds.iter().all(|r| r.attestations.len() == 6));
        let in_flight = collector.destination.max_recoveries_in_flight();
        assert!(in_flight <= 2, "{in_flight} recoveries ran at once");
    }
}
