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

use round_relayer_context::SourceRetryPolicy;
use round_relayer_types::ton_address::TonAddress;
use round_relayer_utils::retry::ConstantWithMaxRetryCount;
use round_relayer_utils::{probe, Error};

use crate::source::{
    ContractAbi, RawMessage, SourceEvent, SourceLedger, Watermark,
    NEW_EVENT_CONTRACT,
};

/// Reads the `NewEventContract` events of a configuration, page by page.
pub struct EventScanner<S> {
    source: Arc<S>,
    page_size: u32,
    retry_interval: Duration,
    max_retries: usize,
    retry_policy: SourceRetryPolicy,
}

impl<S> EventScanner<S>
where
    S: SourceLedger,
{
    /// Creates a scanner reading `page_size` messages per request.
    ///
    /// A failed page read is repeated every `retry_interval`, at most
    /// `max_retries` times, when `retry_policy` deems the failure transient.
    pub fn new(
        source: Arc<S>,
        page_size: u32,
        retry_interval: Duration,
        max_retries: usize,
        retry_policy: SourceRetryPolicy,
    ) -> Self {
        Self {
            source,
            page_size,
            retry_interval,
            max_retries,
            retry_policy,
        }
    }

    /// Returns every event `configuration` emitted after `watermark`,
    /// ordered by creation time.
    ///
    /// The watermark moves to the last message of each page, including
    /// messages that are not events, and the scan ends on the first empty
    /// page.
    #[tracing::instrument(skip_all, fields(%configuration, from = %watermark))]
    pub async fn scan(
        &self,
        configuration: &TonAddress,
        mut watermark: Watermark,
    ) -> round_relayer_utils::Result<Vec<SourceEvent>> {
        let mut events = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = self.fetch_page(configuration, &watermark).await?;
            let Some(last) = page.last() else {
                break;
            };
            let next = Watermark::of(last);
            if next <= watermark {
                return Err(Error::MalformedEvent(format!(
                    "source ledger went backwards from {watermark} to {next}"
                )));
            }
            pages += 1;
            let page_len = page.len();
            let mut found = 0usize;
            for message in page.iter().filter(|m| Watermark::of(m) > watermark)
            {
                let decoded = self
                    .source
                    .decode_event_message(
                        ContractAbi::TonEventConfiguration,
                        message,
                    )
                    .await?;
                match decoded {
                    Some(decoded) if decoded.name == NEW_EVENT_CONTRACT => {
                        events.push(SourceEvent::from_decoded(
                            message, &decoded,
                        )?);
                        found += 1;
                    }
                    Some(decoded) => {
                        tracing::trace!(
                            id = %message.id,
                            name = %decoded.name,
                            "Skipping event",
                        );
                    }
                    None => {
                        tracing::trace!(
                            id = %message.id,
                            "Skipping undecodable message",
                        );
                    }
                }
            }
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Sync,
                page = pages,
                messages = page_len,
                events = found,
                from = %watermark,
                to = %next,
            );
            watermark = next;
        }
        tracing::debug!(
            pages,
            events = events.len(),
            until = %watermark,
            "Scan finished",
        );
        Ok(events)
    }

    async fn fetch_page(
        &self,
        configuration: &TonAddress,
        watermark: &Watermark,
    ) -> round_relayer_utils::Result<Vec<RawMessage>> {
        let backoff = ConstantWithMaxRetryCount::new(
            self.retry_interval,
            self.max_retries,
        );
        let task = || async {
            self.source
                .query_messages(configuration, watermark, self.page_size)
                .await
                .map_err(|e| {
                    if self.retry_policy.should_retry(&e) {
                        tracing::warn!(
                            error = %e,
                            %watermark,
                            "Page read failed, retrying",
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        };
        backoff::future::retry(backoff, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocked::{new_event_contract_message, MockSourceLedger};

    fn configuration() -> TonAddress {
        "0:1111111111111111111111111111111111111111111111111111111111111111"
            .parse()
            .unwrap()
    }

    fn event_contract(n: u8) -> TonAddress {
        TonAddress::new(0, [n; 32])
    }

    fn scanner(
        source: MockSourceLedger,
        page_size: u32,
    ) -> EventScanner<MockSourceLedger> {
        EventScanner::new(
            Arc::new(source),
            page_size,
            Duration::from_millis(1),
            3,
            SourceRetryPolicy::new(),
        )
    }

    fn log(timestamps: &[(&str, u32)]) -> Vec<RawMessage> {
        timestamps
            .iter()
            .enumerate()
            .map(|(n, (id, created_at))| {
                new_event_contract_message(
                    id,
                    *created_at,
                    &configuration(),
                    &event_contract(n as u8),
                )
            })
            .collect()
    }

    fn ids(events: &[SourceEvent]) -> Vec<&str> {
        events.iter().map(|e| e.message_id.as_str()).collect()
    }

    #[tokio::test]
    async fn paging_matches_a_single_unbounded_read() {
        let messages = log(&[
            ("01", 100),
            ("02", 101),
            ("03", 105),
            ("04", 106),
            ("05", 110),
            ("06", 111),
            ("07", 112),
        ]);
        let unbounded = scanner(
            MockSourceLedger::builder().messages(messages.clone()).build(),
            u32::MAX,
        )
        .scan(&configuration(), Watermark::default())
        .await
        .unwrap();
        for page_size in 1..=4 {
            let paged = scanner(
                MockSourceLedger::builder().messages(messages.clone()).build(),
                page_size,
            )
            .scan(&configuration(), Watermark::default())
            .await
            .unwrap();
            assert_eq!(paged, unbounded, "page size {page_size}");
        }
        assert_eq!(ids(&unbounded), ["01", "02", "03", "04", "05", "06", "07"]);
    }

    #[tokio::test]
    async fn events_sharing_a_timestamp_are_neither_skipped_nor_repeated() {
        let messages = log(&[
            ("0a", 100),
            ("0b", 100),
            ("0c", 100),
            ("0d", 101),
        ]);
        let events = scanner(
            MockSourceLedger::builder().messages(messages).build(),
            2,
        )
        .scan(&configuration(), Watermark::default())
        .await
        .unwrap();
        assert_eq!(ids(&events), ["0a", "0b", "0c", "0d"]);
    }

    #[tokio::test]
    async fn starts_strictly_after_the_watermark() {
        let messages =
            log(&[("01", 100), ("02", 200), ("0f", 200), ("03", 300)]);
        for page_size in [1, 10] {
            let events = scanner(
                MockSourceLedger::builder().messages(messages.clone()).build(),
                page_size,
            )
            .scan(&configuration(), Watermark::starting_after(200))
            .await
            .unwrap();
            assert_eq!(ids(&events), ["03"], "page size {page_size}");
        }
    }

    #[tokio::test]
    async fn pages_without_events_do_not_stop_the_scan() {
        let mut messages = log(&[("05", 300)]);
        for (id, created_at) in [("01", 100), ("02", 101), ("03", 102)] {
            messages.push(RawMessage {
                id: id.to_string(),
                src: configuration().to_string(),
                created_at,
                body: "te6ccgEBAQEAAgAAAA==".to_string(),
            });
        }
        let source = MockSourceLedger::builder().messages(messages).build();
        let scanner = scanner(source, 2);
        let events = scanner
            .scan(&configuration(), Watermark::default())
            .await
            .unwrap();
        assert_eq!(ids(&events), ["05"]);
        // two pages, then the empty one.
        assert_eq!(scanner.source.queries(), 3);
    }

    #[tokio::test]
    async fn transient_page_failures_are_retried() {
        let source = MockSourceLedger::builder()
            .messages(log(&[("01", 100)]))
            .failing_queries(2)
            .build();
        let scanner = scanner(source, 10);
        let events = scanner
            .scan(&configuration(), Watermark::default())
            .await
            .unwrap();
        assert_eq!(ids(&events), ["01"]);
        assert_eq!(scanner.source.queries(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let source = MockSourceLedger::builder()
            .messages(log(&[("01", 100)]))
            .failing_queries(10)
            .build();
        let scanner = scanner(source, 10);
        let result = scanner.scan(&configuration(), Watermark::default()).await;
        assert!(matches!(result, Err(Error::SourceRpc { code: 429, .. })));
        // the first attempt and three retries.
        assert_eq!(scanner.source.queries(), 4);
    }
}
