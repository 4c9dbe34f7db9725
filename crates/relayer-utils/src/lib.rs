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
//! # Round Relayer Utils 🕸️
//!
//! Shared error type, retry policies and logging helpers used across the
//! round relayer crates.

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;
use ethers::types::U256;

/// Terminal hyperlinks for explorer urls.
pub mod clickable_link;
/// A module used for debugging relayer lifecycle, sync state, or other relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// The destination ledger client used for every read and for the single
/// outbound transaction of a run.
pub type EvmSignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// An enum of all possible errors that could be encountered during a relay run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the configuration, with the path of the bad value.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP client error while talking to the source ledger.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// Smart contract error.
    #[error(transparent)]
    EthersContractCallWithSigner(
        #[from] ethers::contract::ContractError<EvmSignerClient>,
    ),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// Ethers currency conversion error
    #[error(transparent)]
    Conversion(#[from] ethers::utils::ConversionError),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// The source ledger gateway answered with a JSON-RPC error object.
    #[error("Source ledger RPC error {code}: {message}")]
    SourceRpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message returned by the gateway.
        message: String,
    },
    /// An event message or a getter output could not be decoded.
    #[error("Malformed event: {}", _0)]
    MalformedEvent(String),
    /// A source ledger address is not in the `<wid>:<hex>` form.
    #[error("Invalid TON address: {}", _0)]
    InvalidTonAddress(String),
    /// Signature recovery failed for one of the event signatures.
    #[error("Failed to recover signer of signature #{index}: {reason}")]
    SignatureRecovery {
        /// Position of the signature in the event's signature list.
        index: usize,
        /// Why the destination ledger refused to recover it.
        reason: String,
    },
    /// The submitter account has transactions that are not confirmed yet.
    #[error(
        "Submitter has pending transactions (pending: {pending}, confirmed: {confirmed})"
    )]
    PendingTransactions {
        /// Transaction count including the mempool.
        pending: U256,
        /// Transaction count at the latest block.
        confirmed: U256,
    },
    /// The simulated submission reverted, nothing was broadcast.
    #[error("Dry run of the round submission failed: {}", _0)]
    DryRunFailed(String),
}

/// A type alias for the result for the round relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
