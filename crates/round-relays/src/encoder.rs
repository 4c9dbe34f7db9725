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

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};
use round_relayer_types::ton_address::TonAddress;

use crate::source::{EventVoteData, RoundRelaysEventData, SourceEvent};

/// The canonical bytes of a round event, as signed by the relays and as
/// accepted by the bridge's `setRoundRelays`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RoundPayload(pub(crate) Bytes);

impl RoundPayload {
    /// The encoded payload.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl fmt::Display for RoundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for RoundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoundPayload({self})")
    }
}

/// Encodes round events into [`RoundPayload`]s.
///
/// The payload is the ABI encoding of
///
/// ```text
/// tuple(
///   uint64 eventTransactionLt,
///   uint32 eventTimestamp,
///   bytes eventData,
///   int8 configurationWid,
///   uint256 configurationAddress,
///   int8 eventContractWid,
///   uint256 eventContractAddress,
///   address proxy,
///   uint32 round
/// )
/// ```
///
/// where `eventData` is `abi.encode(uint32 round_num, uint160[] eth_keys,
/// uint32 round_end)`.
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    configuration: TonAddress,
    proxy: Address,
}

impl PayloadEncoder {
    /// Creates an encoder for events of `configuration`, relayed to `proxy`.
    pub fn new(configuration: TonAddress, proxy: Address) -> Self {
        Self {
            configuration,
            proxy,
        }
    }

    /// Encodes `event` for round `round_number`.
    pub fn encode(
        &self,
        event: &SourceEvent,
        round_number: u32,
        vote_data: &EventVoteData,
        event_data: &RoundRelaysEventData,
    ) -> RoundPayload {
        let (configuration_wid, configuration_address) =
            ton_address_tokens(&self.configuration);
        let (event_contract_wid, event_contract_address) =
            ton_address_tokens(&event.event_contract);
        let tuple = Token::Tuple(vec![
            Token::Uint(vote_data.event_transaction_lt.into()),
            Token::Uint(vote_data.event_timestamp.into()),
            Token::Bytes(encode_event_data(event_data).to_vec()),
            configuration_wid,
            configuration_address,
            event_contract_wid,
            event_contract_address,
            Token::Address(self.proxy),
            Token::Uint(round_number.into()),
        ]);
        RoundPayload(abi::encode(&[tuple]).into())
    }
}

/// ABI encodes the decoded round event data.
pub fn encode_event_data(event_data: &RoundRelaysEventData) -> Bytes {
    let keys = event_data.eth_keys.iter().copied().map(Token::Uint).collect();
    abi::encode(&[
        Token::Uint(event_data.round_num.into()),
        Token::Array(keys),
        Token::Uint(event_data.round_end.into()),
    ])
    .into()
}

fn ton_address_tokens(address: &TonAddress) -> (Token, Token) {
    (
        Token::Int(int8_word(address.workchain())),
        Token::Uint(address.account_u256()),
    )
}

/// Two's complement, sign extended to 256 bits.
fn int8_word(value: i8) -> U256 {
    let magnitude = U256::from(value.unsigned_abs());
    if value < 0 {
        (!magnitude).overflowing_add(U256::one()).0
    } else {
        magnitude
    }
}
