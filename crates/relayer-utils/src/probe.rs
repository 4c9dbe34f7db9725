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

use derive_more::Display;
/// Target for logger
pub const TARGET: &str = "round_relayer_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A run moved from one stage to the next, or finished.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Source ledger scan progress.
    #[display(fmt = "sync")]
    Sync,
    /// Signatures collected for a round event.
    #[display(fmt = "attestation")]
    Attestation,
    /// Decisions of the submission gate.
    #[display(fmt = "gate")]
    Gate,
    /// The outbound round transaction.
    #[display(fmt = "submission")]
    Submission,
    /// When the relayer will retry to do something.
    #[display(fmt = "retry")]
    Retry,
}
