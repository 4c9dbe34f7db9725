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
use std::time::Duration;

use derive_more::Display;
use ethers::types::H256;
use round_relayer_config::defaults;
use round_relayer_context::{RelayerContext, SourceRetryPolicy};
use round_relayer_types::gas_price::GasPrice;
use round_relayer_types::ton_address::TonAddress;
use round_relayer_utils::{probe, Error};
use typed_builder::TypedBuilder;

use crate::collector::{AttestationCollector, AttestedRound};
use crate::destination::{DestinationLedger, EvmBridge};
use crate::encoder::PayloadEncoder;
use crate::gate::{RoundCandidate, SubmissionGate, SubmissionState};
use crate::scanner::EventScanner;
use crate::source::{SourceLedger, SourceLedgerExt, TonRpcClient, Watermark};
use crate::submitter::Submitter;

/// The stages of one run, in order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Nothing happened yet.
    #[display(fmt = "init")]
    Init,
    /// Reading round events from the source ledger.
    #[display(fmt = "scan")]
    Scan,
    /// Reading vote data and recovering signers.
    #[display(fmt = "collect")]
    Collect,
    /// Ordering rounds.
    #[display(fmt = "rank")]
    Rank,
    /// Dropping rounds the bridge already has.
    #[display(fmt = "filter")]
    Filter,
    /// Checking the submitter for transactions in flight.
    #[display(fmt = "gate")]
    Gate,
    /// Sending the round transaction.
    #[display(fmt = "submit")]
    Submit,
    /// The run finished.
    #[display(fmt = "done")]
    Done,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// One round transaction was broadcast.
    Submitted {
        /// The round the transaction sets on the bridge.
        round: u32,
        /// Hash of the broadcast transaction.
        tx_hash: H256,
    },
    /// Every known round is already on the bridge.
    NothingToDo,
}

/// Relays at most one round from the source ledger to the bridge.
///
/// Nothing is kept between runs: every run reads the state it needs from
/// both ledgers again.
#[derive(TypedBuilder)]
pub struct RoundRelayPipeline<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    /// The event configuration deploying round events.
    configuration: TonAddress,
    /// The contract decoding event data cells.
    cell_encoder: TonAddress,
    target_gas_price: GasPrice,
    /// Where the scan starts.
    #[builder(default)]
    start: Watermark,
    #[builder(default = defaults::scan_page_size())]
    page_size: u32,
    #[builder(default = Duration::from_millis(defaults::scan_retry_interval()))]
    retry_interval: Duration,
    #[builder(default = defaults::scan_max_retries())]
    max_retries: usize,
    #[builder(default)]
    retry_policy: SourceRetryPolicy,
    #[builder(default = defaults::collector_concurrency())]
    collector_concurrency: usize,
    #[builder(default = defaults::dry_run_before_submit())]
    dry_run_before_submit: bool,
    #[builder(default)]
    explorer: Option<url::Url>,
}

impl RoundRelayPipeline<TonRpcClient, EvmBridge> {
    /// Builds the pipeline for the configured ledgers.
    pub async fn from_context(
        ctx: &RelayerContext,
    ) -> round_relayer_utils::Result<Self> {
        let config = ctx.config();
        let source = Arc::new(TonRpcClient::from_context(ctx)?);
        let destination = Arc::new(EvmBridge::from_context(ctx).await?);
        let pipeline = Self::builder()
            .source(source)
            .destination(destination)
            .configuration(config.round_relays_configuration)
            .cell_encoder(config.cell_encoder)
            .target_gas_price(config.target_gas_price)
            .start(Watermark::starting_after(config.scan_start_timestamp))
            .page_size(config.scan_page_size)
            .retry_interval(config.scan_retry_interval())
            .max_retries(config.scan_max_retries)
            .retry_policy(ctx.source_retry_policy())
            .collector_concurrency(config.collector_concurrency)
            .dry_run_before_submit(config.dry_run_before_submit)
            .explorer(config.evm_explorer.clone())
            .build();
        Ok(pipeline)
    }
}

fn enter(stage: &mut RunStage, next: RunStage) {
    *stage = next;
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        stage = %next,
    );
}

fn log_round(round: &AttestedRound) {
    let signatures: Vec<_> = round
        .attestations
        .iter()
        .map(|a| format!("0x{}", hex::encode(&a.signature)))
        .collect();
    tracing::info!(
        round = round.event_data.round_num,
        event_round = round.round_number,
        event_contract = %round.event.event_contract,
        payload = %round.payload,
        signatures = ?signatures,
        "Round",
    );
}

impl<S, D> RoundRelayPipeline<S, D>
where
    S: SourceLedger,
    D: DestinationLedger,
{
    /// Runs every stage once.
    ///
    /// Any error aborts the run, including a submitter with transactions in
    /// flight ([`Error::PendingTransactions`]). Nothing is retried here;
    /// only page reads of the scan are.
    #[tracing::instrument(
        skip_all,
        fields(configuration = %self.configuration),
    )]
    pub async fn run(&self) -> round_relayer_utils::Result<RunOutcome> {
        let mut stage = RunStage::Init;
        let result = self.run_stages(&mut stage).await;
        match &result {
            Ok(outcome) => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Lifecycle,
                    stage = %stage,
                    outcome = ?outcome,
                );
            }
            Err(e) => {
                tracing::error!(%stage, error = %e, "Run aborted");
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Lifecycle,
                    aborted = true,
                    stage = %stage,
                    error = %e,
                );
            }
        }
        result
    }

    async fn run_stages(
        &self,
        stage: &mut RunStage,
    ) -> round_relayer_utils::Result<RunOutcome> {
        enter(stage, RunStage::Scan);
        let scanner = EventScanner::new(
            self.source.clone(),
            self.page_size,
            self.retry_interval,
            self.max_retries,
            self.retry_policy.clone(),
        );
        let events = scanner
            .scan(&self.configuration, self.start.clone())
            .await?;
        tracing::info!("Found {} events", events.len());

        enter(stage, RunStage::Collect);
        let mut rounds = if events.is_empty() {
            Vec::new()
        } else {
            let proxy =
                self.source.destination_proxy(&self.configuration).await?;
            let collector = AttestationCollector::new(
                self.source.clone(),
                self.destination.clone(),
                self.cell_encoder,
                PayloadEncoder::new(self.configuration, proxy),
                self.collector_concurrency,
            );
            collector.collect_all(&events).await?
        };

        enter(stage, RunStage::Rank);
        SubmissionGate::rank(&mut rounds);
        rounds.iter().for_each(log_round);

        enter(stage, RunStage::Filter);
        let last_round = self.destination.last_round().await?;
        tracing::info!("Last round in destination bridge: {}", last_round);
        let eligible = SubmissionGate::eligible(&rounds, last_round).count();
        if eligible == 0 {
            tracing::info!("No new rounds to relay");
            enter(stage, RunStage::Done);
            return Ok(RunOutcome::NothingToDo);
        }
        tracing::debug!(eligible, "Rounds waiting for submission");

        enter(stage, RunStage::Gate);
        let submitter = self.destination.submitter();
        let counts = self.destination.transaction_counts(submitter).await?;
        tracing::info!(
            %submitter,
            pending = %counts.pending,
            confirmed = %counts.confirmed,
            "Submitter transactions count",
        );
        let state = SubmissionState::new(last_round, counts);
        let Some(candidate) = SubmissionGate::select_candidate(&rounds, &state)
        else {
            tracing::warn!("Submitter has pending transactions");
            return Err(Error::PendingTransactions {
                pending: counts.pending,
                confirmed: counts.confirmed,
            });
        };

        enter(stage, RunStage::Submit);
        let submitter = Submitter::new(
            self.destination.clone(),
            self.target_gas_price,
            self.dry_run_before_submit,
            self.explorer.clone(),
        );
        let tx_hash = submitter
            .submit(&candidate.payload, &candidate.attestations)
            .await?;

        enter(stage, RunStage::Done);
        Ok(RunOutcome::Submitted {
            round: candidate.relayed_round(),
            tx_hash,
        })
    }
}
