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

//! # Round Relayer Configuration Module 🕸️
//!
//! The relayer is configured entirely from the process environment. Every
//! endpoint, contract address and credential is required; a missing one is
//! a startup failure. Tuning knobs have defaults, see [`defaults`].

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values of the optional settings.
pub mod defaults;
/// Utils for processing configuration
pub mod utils;

use std::time::Duration;

use ethers::types::Address;
use round_relayer_types::gas_price::GasPrice;
use round_relayer_types::mnemonic::Mnemonic;
use round_relayer_types::rpc_url::RpcUrl;
use round_relayer_types::ton_address::TonAddress;
use serde::Deserialize;

/// RoundRelayerConfig is the configuration of one relay run.
///
/// Field names are the lower cased environment variable names, e.g.
/// `EVM_RPC` populates [`RoundRelayerConfig::evm_rpc`].
#[derive(Debug, Clone, Deserialize)]
pub struct RoundRelayerConfig {
    /// Http(s) endpoint of the destination (EVM) ledger.
    pub evm_rpc: RpcUrl,
    /// Address of the bridge contract that accepts round relays.
    pub evm_bridge: Address,
    /// Seed phrase of the submitter account.
    pub evm_seed: Mnemonic,
    /// Block Explorer for the destination ledger.
    ///
    /// Optional, and only used for printing a clickable link to the
    /// submitted transaction.
    #[serde(default)]
    pub evm_explorer: Option<url::Url>,
    /// JSON-RPC endpoint of the source (TON) ledger gateway.
    pub ton_rpc: RpcUrl,
    /// The event configuration contract that deploys round events.
    pub round_relays_configuration: TonAddress,
    /// The helper contract that decodes the round event data cell.
    pub cell_encoder: TonAddress,
    /// Upper bound of the gas price paid for the submission.
    pub target_gas_price: GasPrice,
    /// Creation time (unix seconds) the scan starts after.
    #[serde(default = "defaults::scan_start_timestamp")]
    pub scan_start_timestamp: u32,
    /// The maximum number of messages fetched in one request.
    #[serde(default = "defaults::scan_page_size")]
    pub scan_page_size: u32,
    /// Delay between two attempts of a failed page read, in milliseconds.
    #[serde(default = "defaults::scan_retry_interval")]
    pub scan_retry_interval: u64,
    /// How many times a failed page read is retried.
    #[serde(default = "defaults::scan_max_retries")]
    pub scan_max_retries: usize,
    /// Timeout of every network request, in milliseconds.
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout: u64,
    /// How many events are collected at the same time.
    #[serde(default = "defaults::collector_concurrency")]
    pub collector_concurrency: usize,
    /// Simulate the submission with `eth_call` before broadcasting it.
    #[serde(default = "defaults::dry_run_before_submit")]
    pub dry_run_before_submit: bool,
}

impl RoundRelayerConfig {
    /// Delay between two attempts of a failed page read.
    pub fn scan_retry_interval(&self) -> Duration {
        Duration::from_millis(self.scan_retry_interval)
    }

    /// Timeout of every network request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}
