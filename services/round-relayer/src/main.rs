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


//! Round Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use round_relayer_config::cli::{load_config, setup_logger, Opts};
use round_relayer_context::RelayerContext;
use round_relays::pipeline::{RoundRelayPipeline, RunOutcome};
use tokio::signal::unix;

/// The main entry point for the relayer.
///
/// Runs the pipeline once. Exits with `0` when a round was submitted or
/// there was nothing to submit, and with `1` otherwise.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "round_relayer")?;
    let config = load_config(&args)?;

    // the context turns the configuration into the ledger clients.
    let ctx = RelayerContext::new(config);
    let pipeline = RoundRelayPipeline::from_context(&ctx).await?;
    tracing::event!(
        target: round_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %round_relayer_utils::probe::Kind::Lifecycle,
        started = true
    );

    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let outcome = tokio::select! {
        outcome = pipeline.run() => outcome?,
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            anyhow::bail!("interrupted before the run finished");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            anyhow::bail!("terminated before the run finished");
        },
    };
    match outcome {
        RunOutcome::Submitted { round, tx_hash } => {
            tracing::info!(round, "Round submitted in {:#x}", tx_hash);
        }
        RunOutcome::NothingToDo => {
            tracing::info!("Nothing to relay");
        }
    }
    Ok(())
}
