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


//! In-memory ledgers, used to run the pipeline without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ethers::types::{Address, Bytes, H256, U256};
use round_relayer_types::ton_address::TonAddress;
use round_relayer_utils::Error;
use tokio::sync::Mutex;
use typed_builder::TypedBuilder;

use crate::destination::{DestinationLedger, TransactionCounts};
use crate::source::{
    ContractAbi, DecodedEvent, RawMessage, SourceLedger, Watermark,
    NEW_EVENT_CONTRACT,
};

/// Builds a `NewEventContract` message as the configuration would emit it.
///
/// The mocked source ledger stores the decoded event as the message body.
pub fn new_event_contract_message(
    id: &str,
    created_at: u32,
    configuration: &TonAddress,
    event_contract: &TonAddress,
) -> RawMessage {
    let decoded = DecodedEvent {
        name: NEW_EVENT_CONTRACT.to_string(),
        value: serde_json::json!({
            "eventContract": event_contract.to_string(),
        }),
    };
    RawMessage {
        id: id.to_string(),
        src: configuration.to_string(),
        created_at,
        body: serde_json::to_string(&decoded).unwrap_or_default(),
    }
}

/// A get-method call and its output.
#[derive(Debug, Clone, PartialEq)]
pub struct MockGetter {
    /// The called contract.
    pub address: TonAddress,
    /// The get-method name.
    pub method: String,
    /// The expected input.
    pub input: serde_json::Value,
    /// What the call returns.
    pub output: serde_json::Value,
}

impl MockGetter {
    /// A get-method called without input.
    pub fn new(
        address: TonAddress,
        method: &str,
        output: serde_json::Value,
    ) -> Self {
        Self::with_input(address, method, serde_json::json!({}), output)
    }

    /// A get-method called with `input`.
    pub fn with_input(
        address: TonAddress,
        method: &str,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        Self {
            address,
            method: method.to_string(),
            input,
            output,
        }
    }
}

/// The getters a round event contract created in `round_number` answers,
/// and the cell encoder output for its event data.
///
/// Every signature is hex encoded the way the gateway returns `bytes`.
pub fn round_event_getters(
    event_contract: &TonAddress,
    cell_encoder: &TonAddress,
    round_number: u32,
    signatures: &[Bytes],
) -> Vec<MockGetter> {
    let event_data = format!("cell:{event_contract}");
    let signatures: Vec<_> = signatures
        .iter()
        .map(|s| format!("0x{}", hex::encode(s)))
        .collect();
    vec![
        MockGetter::new(
            *event_contract,
            "getDetails",
            serde_json::json!({
                "_eventInitData": {
                    "voteData": {
                        "eventTransactionLt":
                            (u64::from(round_number) + 1) * 1_000_000,
                        "eventTimestamp": 1_650_000_000 + round_number,
                        "eventData": event_data,
                    },
                },
                "_signatures": signatures,
            }),
        ),
        MockGetter::new(
            *event_contract,
            "round_number",
            serde_json::json!({ "round_number": round_number.to_string() }),
        ),
        MockGetter::with_input(
            *cell_encoder,
            "decodeTonStakingEventData",
            serde_json::json!({ "data": event_data }),
            serde_json::json!({
                "round_num": (round_number + 1).to_string(),
                "eth_keys": ["0x1111111111111111111111111111111111111111"],
                "round_end": (1_660_000_000 + round_number).to_string(),
            }),
        ),
    ]
}

/// The configuration getter returning the destination `proxy`.
pub fn configuration_getter(
    configuration: &TonAddress,
    proxy: Address,
) -> MockGetter {
    MockGetter::new(
        *configuration,
        "getDetails",
        serde_json::json!({
            "_basicConfiguration": {},
            "_networkConfiguration": { "proxy": format!("{proxy:#x}") },
        }),
    )
}

/// A source ledger holding a fixed message log and fixed getter outputs.
#[derive(TypedBuilder)]
pub struct MockSourceLedger {
    /// The message log, in any order.
    #[builder(default)]
    messages: Vec<RawMessage>,
    /// Known get-method calls.
    #[builder(default)]
    getters: Vec<MockGetter>,
    /// How many of the first page reads fail with a rate limit error.
    #[builder(default, setter(transform = |n: usize| AtomicUsize::new(n)))]
    failing_queries: AtomicUsize,
    #[builder(default, setter(skip))]
    queries: AtomicUsize,
}

impl MockSourceLedger {
    /// How many page reads were made, failed ones included.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SourceLedger for MockSourceLedger {
    async fn query_messages(
        &self,
        source: &TonAddress,
        after: &Watermark,
        limit: u32,
    ) -> round_relayer_utils::Result<Vec<RawMessage>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_queries.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_queries.store(failing - 1, Ordering::SeqCst);
            return Err(Error::SourceRpc {
                code: 429,
                message: "Too Many Requests".to_string(),
            });
        }
        let source = source.to_string();
        let mut page: Vec<_> = self
            .messages
            .iter()
            .filter(|m| m.src == source && Watermark::of(m) > *after)
            .cloned()
            .collect();
        page.sort_by_key(Watermark::of);
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn decode_event_message(
        &self,
        _abi: ContractAbi,
        message: &RawMessage,
    ) -> round_relayer_utils::Result<Option<DecodedEvent>> {
        Ok(serde_json::from_str(&message.body).ok())
    }

    async fn run_getter(
        &self,
        abi: ContractAbi,
        address: &TonAddress,
        method: &str,
        input: serde_json::Value,
    ) -> round_relayer_utils::Result<serde_json::Value> {
        self.getters
            .iter()
            .find(|g| {
                g.address == *address && g.method == method && g.input == input
            })
            .map(|g| g.output.clone())
            .ok_or_else(|| Error::SourceRpc {
                code: -32602,
                message: format!("{abi}.{method} is not available on {address}"),
            })
    }
}

/// A round transaction accepted by [`MockDestinationLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    /// The submitted payload.
    pub payload: Bytes,
    /// The submitted signatures, in submission order.
    pub signatures: Vec<Bytes>,
    /// The gas price the transaction was sent with.
    pub gas_price: U256,
}

/// A destination ledger with a fixed state that records submissions.
#[derive(TypedBuilder)]
pub struct MockDestinationLedger {
    /// The highest round the bridge accepted.
    #[builder(default)]
    last_round: u32,
    /// Which address each known signature recovers to.
    #[builder(default)]
    signers: HashMap<Bytes, Address>,
    #[builder(default = U256::from(30_000_000_000u64))]
    gas_price: U256,
    #[builder(default = ethers::utils::WEI_IN_ETHER)]
    balance: U256,
    #[builder(default)]
    counts: TransactionCounts,
    #[builder(default = Address::repeat_byte(0x42))]
    submitter: Address,
    /// Makes the simulated submission revert.
    #[builder(default)]
    reverts: bool,
    #[builder(default, setter(skip))]
    submissions: Mutex<Vec<RecordedSubmission>>,
    #[builder(default, setter(skip))]
    count_reads: AtomicUsize,
    #[builder(default, setter(skip))]
    recoveries_in_flight: AtomicUsize,
    #[builder(default, setter(skip))]
    max_recoveries_in_flight: AtomicUsize,
}

impl MockDestinationLedger {
    /// Every transaction broadcast so far.
    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().await.clone()
    }

    /// How many times the submitter's transaction counts were read.
    pub fn count_reads(&self) -> usize {
        self.count_reads.load(Ordering::SeqCst)
    }

    /// The most signature recoveries that ran at the same time.
    pub fn max_recoveries_in_flight(&self) -> usize {
        self.max_recoveries_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DestinationLedger for MockDestinationLedger {
    async fn last_round(&self) -> round_relayer_utils::Result<u32> {
        Ok(self.last_round)
    }

    async fn recover_signer(
        &self,
        _payload: &Bytes,
        signature: &Bytes,
    ) -> round_relayer_utils::Result<Address> {
        let in_flight =
            self.recoveries_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_recoveries_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        // give other recoveries the chance to overlap with this one.
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.recoveries_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.signers
            .get(signature)
            .copied()
            .ok_or(Error::Generic("execution reverted: invalid signature"))
    }

    async fn gas_price(&self) -> round_relayer_utils::Result<U256> {
        Ok(self.gas_price)
    }

    async fn balance(
        &self,
        _account: Address,
    ) -> round_relayer_utils::Result<U256> {
        Ok(self.balance)
    }

    async fn transaction_counts(
        &self,
        _account: Address,
    ) -> round_relayer_utils::Result<TransactionCounts> {
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.counts)
    }

    fn submitter(&self) -> Address {
        self.submitter
    }

    async fn dry_run_round(
        &self,
        _payload: &Bytes,
        _signatures: &[Bytes],
        _gas_price: U256,
    ) -> round_relayer_utils::Result<()> {
        if self.reverts {
            return Err(Error::DryRunFailed(
                "execution reverted: Round: wrong round".to_string(),
            ));
        }
        Ok(())
    }

    async fn submit_round(
        &self,
        payload: &Bytes,
        signatures: &[Bytes],
        gas_price: U256,
    ) -> round_relayer_utils::Result<H256> {
        let mut submissions = self.submissions.lock().await;
        submissions.push(RecordedSubmission {
            payload: payload.clone(),
            signatures: signatures.to_vec(),
            gas_price,
        });
        Ok(H256::from_low_u64_be(submissions.len() as u64))
    }
}
