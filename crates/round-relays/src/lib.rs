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
//! # Round Relays 🕸️
//!
//! Relays new rounds of a TON event configuration to the EVM bridge.
//!
//! A run reads the round events of the configuration
//! ([`scanner::EventScanner`]), recovers who signed each of them
//! ([`collector::AttestationCollector`]), encodes them the way the bridge
//! verifies them ([`encoder::PayloadEncoder`]), picks the earliest round the
//! bridge still accepts ([`gate::SubmissionGate`]) and submits it
//! ([`submitter::Submitter`]). [`pipeline::RoundRelayPipeline`] ties the
//! stages together.
//!
//! At most one transaction is sent per run. A submitter with a transaction
//! in flight aborts the run before anything is sent.

/// Vote data and signer recovery.
pub mod collector;
/// The destination ledger boundary.
pub mod destination;
/// Canonical round payloads.
pub mod encoder;
/// Round eligibility and the in-flight transaction check.
pub mod gate;
/// In-memory ledgers for tests.
pub mod mocked;
/// One relay run.
pub mod pipeline;
/// Paginated event reads.
pub mod scanner;
/// The source ledger boundary.
pub mod source;
/// The round transaction.
pub mod submitter;
