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


use ethers::types::U256;
use round_relayer_utils::probe;

use crate::collector::AttestedRound;
use crate::destination::TransactionCounts;

/// Something that would set a round on the bridge.
pub trait RoundCandidate {
    /// The round the bridge would know after accepting it.
    fn relayed_round(&self) -> u32;
}

impl RoundCandidate for u32 {
    fn relayed_round(&self) -> u32 {
        *self
    }
}

impl RoundCandidate for AttestedRound {
    /// The round after the one the event was created in.
    fn relayed_round(&self) -> u32 {
        self.round_number.saturating_add(1)
    }
}

/// What the gate knows about the destination ledger, read fresh per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionState {
    /// The highest round the bridge accepted.
    pub last_finalized_round: u32,
    /// Submitter transaction count including the mempool.
    pub pending_tx_count: U256,
    /// Submitter transaction count at the latest block.
    pub confirmed_tx_count: U256,
}

impl SubmissionState {
    /// Combines the bridge's last round with the submitter's counts.
    pub fn new(last_finalized_round: u32, counts: TransactionCounts) -> Self {
        Self {
            last_finalized_round,
            pending_tx_count: counts.pending,
            confirmed_tx_count: counts.confirmed,
        }
    }

    /// Whether a transaction of the submitter may still be in flight.
    pub fn has_pending(&self) -> bool {
        self.pending_tx_count > self.confirmed_tx_count
    }
}

/// Decides which round, if any, is submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionGate;

impl SubmissionGate {
    /// Orders candidates ascending by relayed round, keeping the scan order
    /// of equal rounds.
    pub fn rank<T: RoundCandidate>(rounds: &mut [T]) {
        rounds.sort_by_key(RoundCandidate::relayed_round);
    }

    /// Candidates the bridge still accepts: those relaying a round past the
    /// last finalized one.
    pub fn eligible<T: RoundCandidate>(
        rounds: &[T],
        last_finalized_round: u32,
    ) -> impl Iterator<Item = &T> {
        rounds
            .iter()
            .filter(move |r| r.relayed_round() > last_finalized_round)
    }

    /// The earliest eligible candidate, or nothing if the submitter may have
    /// a transaction in flight.
    pub fn select_candidate<'a, T: RoundCandidate>(
        rounds: &'a [T],
        state: &SubmissionState,
    ) -> Option<&'a T> {
        if state.has_pending() {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Gate,
                pending = %state.pending_tx_count,
                confirmed = %state.confirmed_tx_count,
                blocked = true,
            );
            return None;
        }
        let candidate = Self::eligible(rounds, state.last_finalized_round)
            .min_by_key(|r| r.relayed_round());
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Gate,
            last_finalized_round = state.last_finalized_round,
            candidate = ?candidate.map(RoundCandidate::relayed_round),
        );
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(last: u32, pending: u64, confirmed: u64) -> SubmissionState {
        SubmissionState::new(
            last,
            TransactionCounts {
                pending: pending.into(),
                confirmed: confirmed.into(),
            },
        )
    }

    #[derive(Debug, PartialEq)]
    struct Tagged(u32, char);

    impl RoundCandidate for Tagged {
        fn relayed_round(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn selects_the_earliest_eligible_round() {
        let rounds = [1u32, 2, 3];
        let eligible: Vec<_> =
            SubmissionGate::eligible(&rounds, 1).copied().collect();
        assert_eq!(eligible, [2, 3]);
        assert_eq!(
            SubmissionGate::select_candidate(&rounds, &state(1, 0, 0)),
            Some(&2)
        );
    }

    #[test]
    fn finalized_rounds_are_not_eligible() {
        let rounds = [1u32, 2, 3];
        assert_eq!(SubmissionGate::eligible(&rounds, 3).count(), 0);
        assert_eq!(
            SubmissionGate::select_candidate(&rounds, &state(3, 0, 0)),
            None
        );
        assert_eq!(
            SubmissionGate::select_candidate(&rounds, &state(0, 0, 0)),
            Some(&1)
        );
    }

    #[test]
    fn selection_ignores_input_order() {
        let rounds = [5u32, 3, 6, 4];
        assert_eq!(
            SubmissionGate::select_candidate(&rounds, &state(3, 5, 5)),
            Some(&4)
        );
    }

    #[test]
    fn pending_transactions_block_every_candidate() {
        for rounds in [vec![], vec![1u32], vec![1, 2, 3], vec![7, 8]] {
            for last in [0, 1, 7] {
                assert_eq!(
                    SubmissionGate::select_candidate(
                        &rounds,
                        &state(last, 3, 2)
                    ),
                    None
                );
            }
        }
    }

    #[test]
    fn rank_keeps_scan_order_of_equal_rounds() {
        let mut rounds =
            [Tagged(3, 'a'), Tagged(1, 'b'), Tagged(3, 'c'), Tagged(2, 'd')];
        SubmissionGate::rank(&mut rounds);
        assert_eq!(
            rounds,
            [Tagged(1, 'b'), Tagged(2, 'd'), Tagged(3, 'a'), Tagged(3, 'c')]
        );
    }
}
