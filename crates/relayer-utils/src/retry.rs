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

//! Retry logic for async calls

use std::time::Duration;

use backoff::backoff::Backoff;

/// Waits the same `interval` between attempts and gives up once
/// `max_retries` retries were handed out.
///
/// Used for source ledger page reads, which are safe to repeat.
#[derive(Debug, Clone)]
pub struct ConstantWithMaxRetryCount {
    interval: Duration,
    max_retries: usize,
    attempts: usize,
}

impl ConstantWithMaxRetryCount {
    /// Creates a new policy. `max_retries == 0` disables retrying.
    pub fn new(interval: Duration, max_retries: usize) -> Self {
        Self {
            interval,
            max_retries,
            attempts: 0,
        }
    }

    /// How many retries were handed out since the last reset.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Backoff for ConstantWithMaxRetryCount {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;
        Some(self.interval)
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_after_max_retries() {
        let interval = Duration::from_millis(250);
        let mut policy = ConstantWithMaxRetryCount::new(interval, 2);
        assert_eq!(policy.next_backoff(), Some(interval));
        assert_eq!(policy.next_backoff(), Some(interval));
        assert_eq!(policy.next_backoff(), None);
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn reset_starts_counting_again() {
        let mut policy =
            ConstantWithMaxRetryCount::new(Duration::from_millis(1), 1);
        assert!(policy.next_backoff().is_some());
        assert!(policy.next_backoff().is_none());
        policy.reset();
        assert!(policy.next_backoff().is_some());
    }

    #[test]
    fn zero_retries_never_backs_off() {
        let mut policy =
            ConstantWithMaxRetryCount::new(Duration::from_secs(1), 0);
        assert!(policy.next_backoff().is_none());
    }
}
