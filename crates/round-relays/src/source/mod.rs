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


//! The source ledger boundary.
//!
//! The relayer reads three things from the source ledger: the outbound
//! message log of the round relays configuration, the decoded body of those
//! messages and the output of contract get-methods run against the current
//! account state. [`SourceLedger`] is that surface, [`SourceLedgerExt`] adds
//! the typed reads the pipeline needs on top of it.

use std::{cmp, fmt};

use derive_more::Display;
use ethers::types::{Address, Bytes, U256};
use round_relayer_types::ton_address::TonAddress;
use round_relayer_utils::Error;
use serde::{Deserialize, Serialize};

pub(crate) mod number;
mod ton_rpc;

pub use ton_rpc::TonRpcClient;

/// Message type of external outbound messages, the ones carrying events.
pub const EVENT_MESSAGE_TYPE: u8 = 2;
/// Event emitted by the configuration when a round event contract is
/// deployed.
pub const NEW_EVENT_CONTRACT: &str = "NewEventContract";

/// Contract ABIs known to the source ledger gateway.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContractAbi {
    /// The event configuration the round events are deployed by.
    #[display(fmt = "TonEventConfiguration")]
    TonEventConfiguration,
    /// One round event, holding the vote data and the relay signatures.
    #[display(fmt = "StakingTonEvent")]
    StakingTonEvent,
    /// Helper contract decoding event data cells.
    #[display(fmt = "CellEncoderStandalone")]
    CellEncoderStandalone,
}

/// A position in the message log of one account.
///
/// Messages are ordered by `(created_at, id)`. Creation time alone is not
/// unique, several events can be emitted within the same second, so the
/// message id breaks the tie. A watermark without a message id sits after
/// every message created in its second.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Watermark {
    created_at: u32,
    message_id: Option<String>,
}

impl Watermark {
    /// Creates a watermark right after message `message_id`.
    pub fn new(created_at: u32, message_id: impl Into<String>) -> Self {
        Self {
            created_at,
            message_id: Some(message_id.into()),
        }
    }

    /// A watermark after every message created up to and including
    /// `created_at`.
    pub fn starting_after(created_at: u32) -> Self {
        Self {
            created_at,
            message_id: None,
        }
    }

    /// The watermark right after `message`.
    pub fn of(message: &RawMessage) -> Self {
        Self::new(message.created_at, message.id.clone())
    }

    /// Creation time (unix seconds) of the last seen message.
    pub fn created_at(&self) -> u32 {
        self.created_at
    }

    /// Id of the last seen message, `None` when the whole second was seen.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }
}

impl Ord for Watermark {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        let by_id = match (&self.message_id, &other.message_id) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => cmp::Ordering::Less,
            (None, Some(_)) => cmp::Ordering::Greater,
            (None, None) => cmp::Ordering::Equal,
        };
        self.created_at.cmp(&other.created_at).then(by_id)
    }
}

impl PartialOrd for Watermark {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message_id {
            Some(id) => write!(f, "{}/{}", self.created_at, id),
            None => write!(f, "{}", self.created_at),
        }
    }
}

/// A message as stored in the source ledger message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Message id (hash), hex.
    pub id: String,
    /// Sender address.
    pub src: String,
    /// Creation time, unix seconds.
    #[serde(deserialize_with = "number::deserialize_u32")]
    pub created_at: u32,
    /// Serialized message body (BOC, base64).
    pub body: String,
}

/// A message body decoded with a contract ABI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event name.
    pub name: String,
    /// Event parameters, keyed by name.
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A round event contract deployed by the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    /// Id of the message announcing the deployment.
    pub message_id: String,
    /// When the deployment was announced, unix seconds.
    pub created_at: u32,
    /// The deployed event contract.
    pub event_contract: TonAddress,
}

impl SourceEvent {
    /// Reads a [`SourceEvent`] from a decoded `NewEventContract` message.
    pub fn from_decoded(
        message: &RawMessage,
        decoded: &DecodedEvent,
    ) -> round_relayer_utils::Result<Self> {
        let event_contract = decoded
            .value
            .get("eventContract")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                Error::MalformedEvent(format!(
                    "message {} has no eventContract",
                    message.id
                ))
            })?
            .parse()?;
        Ok(Self {
            message_id: message.id.clone(),
            created_at: message.created_at,
            event_contract,
        })
    }
}

/// The vote data relays confirmed for an event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventVoteData {
    /// Logical time of the transaction that emitted the event.
    #[serde(deserialize_with = "number::deserialize_u64")]
    pub event_transaction_lt: u64,
    /// Time of the transaction that emitted the event.
    #[serde(deserialize_with = "number::deserialize_u32")]
    pub event_timestamp: u32,
    /// The event data cell (BOC, base64).
    pub event_data: String,
}

/// Details of a round event contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    /// What was voted for.
    pub vote_data: EventVoteData,
    /// Signatures of the relays that confirmed the event, in vote order.
    pub signatures: Vec<Bytes>,
}

/// The decoded event data of a round event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoundRelaysEventData {
    /// The round being announced.
    #[serde(deserialize_with = "number::deserialize_u32")]
    pub round_num: u32,
    /// Destination ledger keys of the round relays (`uint160`).
    #[serde(deserialize_with = "number::deserialize_u256_vec")]
    pub eth_keys: Vec<U256>,
    /// When the round ends, unix seconds.
    #[serde(deserialize_with = "number::deserialize_u32")]
    pub round_end: u32,
}

/// Read access to the source ledger.
#[async_trait::async_trait]
pub trait SourceLedger: Send + Sync {
    /// Returns up to `limit` event messages sent by `source` strictly after
    /// `after`, ordered by `(created_at, id)`.
    async fn query_messages(
        &self,
        source: &TonAddress,
        after: &Watermark,
        limit: u32,
    ) -> round_relayer_utils::Result<Vec<RawMessage>>;

    /// Decodes an outbound message body with `abi`.
    ///
    /// Returns `Ok(None)` when the body is not an event of that ABI.
    async fn decode_event_message(
        &self,
        abi: ContractAbi,
        message: &RawMessage,
    ) -> round_relayer_utils::Result<Option<DecodedEvent>>;

    /// Runs a get-method of the contract at `address` and returns its
    /// output, keyed by output name.
    async fn run_getter(
        &self,
        abi: ContractAbi,
        address: &TonAddress,
        method: &str,
        input: serde_json::Value,
    ) -> round_relayer_utils::Result<serde_json::Value>;
}

#[derive(Deserialize)]
struct EventDetailsOutput {
    #[serde(rename = "_eventInitData")]
    event_init_data: EventInitData,
    #[serde(rename = "_signatures")]
    signatures: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventInitData {
    vote_data: EventVoteData,
}

#[derive(Deserialize)]
struct RoundNumberOutput {
    #[serde(deserialize_with = "number::deserialize_u32")]
    round_number: u32,
}

#[derive(Deserialize)]
struct ConfigurationDetailsOutput {
    #[serde(rename = "_networkConfiguration")]
    network_configuration: NetworkConfiguration,
}

#[derive(Deserialize)]
struct NetworkConfiguration {
    #[serde(deserialize_with = "number::deserialize_u256")]
    proxy: U256,
}

fn parse_output<T>(
    method: &str,
    output: serde_json::Value,
) -> round_relayer_utils::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(output)
        .map_err(|e| Error::MalformedEvent(format!("{method} output: {e}")))
}

fn parse_signature(
    index: usize,
    signature: &str,
) -> round_relayer_utils::Result<Bytes> {
    let hex_str = signature.strip_prefix("0x").unwrap_or(signature);
    hex::decode(hex_str).map(Bytes::from).map_err(|e| {
        Error::MalformedEvent(format!("signature #{index} is not hex: {e}"))
    })
}

/// Converts a `uint160` getter output into a destination ledger address.
pub fn uint160_to_address(value: U256) -> round_relayer_utils::Result<Address> {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    if word[..12].iter().any(|b| *b != 0) {
        return Err(Error::MalformedEvent(format!(
            "{value:#x} does not fit in 160 bits"
        )));
    }
    Ok(Address::from_slice(&word[12..]))
}

/// Typed reads on top of [`SourceLedger`].
///
/// **Note**: this trait is automatically implemented for every
/// [`SourceLedger`].
#[async_trait::async_trait]
pub trait SourceLedgerExt: SourceLedger {
    /// Vote data and signatures of a round event contract.
    async fn event_details(
        &self,
        event_contract: &TonAddress,
    ) -> round_relayer_utils::Result<EventDetails> {
        const METHOD: &str = "getDetails";
        let output = self
            .run_getter(
                ContractAbi::StakingTonEvent,
                event_contract,
                METHOD,
                serde_json::json!({}),
            )
            .await?;
        let details: EventDetailsOutput = parse_output(METHOD, output)?;
        let signatures = details
            .signatures
            .iter()
            .enumerate()
            .map(|(index, sig)| parse_signature(index, sig))
            .collect::<round_relayer_utils::Result<_>>()?;
        Ok(EventDetails {
            vote_data: details.event_init_data.vote_data,
            signatures,
        })
    }

    /// The round a round event contract was deployed for.
    async fn event_round_number(
        &self,
        event_contract: &TonAddress,
    ) -> round_relayer_utils::Result<u32> {
        const METHOD: &str = "round_number";
        let output = self
            .run_getter(
                ContractAbi::StakingTonEvent,
                event_contract,
                METHOD,
                serde_json::json!({}),
            )
            .await?;
        let output: RoundNumberOutput = parse_output(METHOD, output)?;
        Ok(output.round_number)
    }

    /// Decodes a round event data cell with the cell encoder contract.
    async fn decode_round_event_data(
        &self,
        cell_encoder: &TonAddress,
        event_data: &str,
    ) -> round_relayer_utils::Result<RoundRelaysEventData> {
        const METHOD: &str = "decodeTonStakingEventData";
        let output = self
            .run_getter(
                ContractAbi::CellEncoderStandalone,
                cell_encoder,
                METHOD,
                serde_json::json!({ "data": event_data }),
            )
            .await?;
        let data: RoundRelaysEventData = parse_output(METHOD, output)?;
        for key in &data.eth_keys {
            uint160_to_address(*key)?;
        }
        Ok(data)
    }

    /// The destination ledger proxy the configuration relays events to.
    async fn destination_proxy(
        &self,
        configuration: &TonAddress,
    ) -> round_relayer_utils::Result<Address> {
        const METHOD: &str = "getDetails";
        let output = self
            .run_getter(
                ContractAbi::TonEventConfiguration,
                configuration,
                METHOD,
                serde_json::json!({}),
            )
            .await?;
        let details: ConfigurationDetailsOutput =
            parse_output(METHOD, output)?;
        uint160_to_address(details.network_configuration.proxy)
    }
}

impl<T> SourceLedgerExt for T where T: SourceLedger + ?Sized {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocked::{MockGetter, MockSourceLedger};

    #[test]
    fn watermark_orders_by_time_then_id() {
        let a = Watermark::new(10, "aa");
        let b = Watermark::new(10, "bb");
        let c = Watermark::new(11, "00");
        assert!(Watermark::starting_after(9) < a);
        assert!(a < b);
        assert!(b < Watermark::starting_after(10));
        assert!(Watermark::starting_after(10) < c);
        assert!(b < c);
        assert_eq!(b.to_string(), "10/bb");
        assert_eq!(Watermark::starting_after(10).to_string(), "10");
    }

    #[test]
    fn event_contract_is_read_from_decoded_message() {
        let message = RawMessage {
            id: "01".into(),
            src: "0:00".into(),
            created_at: 7,
            body: String::new(),
        };
        let decoded = DecodedEvent {
            name: NEW_EVENT_CONTRACT.into(),
            value: serde_json::json!({ "eventContract": "-1:ff" }),
        };
        let event = SourceEvent::from_decoded(&message, &decoded).unwrap();
        assert_eq!(event.event_contract.workchain(), -1);
        assert_eq!(event.created_at, 7);

        let missing = DecodedEvent {
            value: serde_json::json!({}),
            ..decoded
        };
        assert!(matches!(
            SourceEvent::from_decoded(&message, &missing),
            Err(Error::MalformedEvent(_))
        ));
    }

    #[test]
    fn proxy_must_fit_in_160_bits() {
        let proxy = uint160_to_address(U256::from(0xabcdu64)).unwrap();
        assert_eq!(proxy, Address::from_low_u64_be(0xabcd));
        assert!(uint160_to_address(U256::MAX).is_err());
    }

    #[tokio::test]
    async fn relay_keys_must_fit_in_160_bits() {
        let cell_encoder = TonAddress::new(0, [0xce; 32]);
        let getter = |key: &str| {
            MockGetter::with_input(
                cell_encoder,
                "decodeTonStakingEventData",
                serde_json::json!({ "data": "cell" }),
                serde_json::json!({
                    "round_num": "6",
                    "eth_keys": [
                        "0x1111111111111111111111111111111111111111",
                        key,
                    ],
                    "round_end": "1660000005",
                }),
            )
        };
        let source = MockSourceLedger::builder()
            .getters(vec![getter(
                "0x2222222222222222222222222222222222222222",
            )])
            .build();
        let data = source
            .decode_round_event_data(&cell_encoder, "cell")
            .await
            .unwrap();
        assert_eq!(data.eth_keys.len(), 2);

        let too_wide = format!("0x01{}", "00".repeat(20));
        let source = MockSourceLedger::builder()
            .getters(vec![getter(&too_wide)])
            .build();
        let result =
            source.decode_round_event_data(&cell_encoder, "cell").await;
        assert!(matches!(result, Err(Error::MalformedEvent(_))));
    }
}
