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

/// The scan starts from the beginning of the message log.
pub const fn scan_start_timestamp() -> u32 {
    0
}
/// The maximum messages per page is set to `50` by default.
pub const fn scan_page_size() -> u32 {
    50
}
/// Failed page reads are retried after `1_000` ms by default.
pub const fn scan_retry_interval() -> u64 {
    1_000
}
/// Failed page reads are retried `5` times by default.
pub const fn scan_max_retries() -> usize {
    5
}
/// Network requests time out after `30_000` ms by default.
pub const fn request_timeout() -> u64 {
    30_000
}
/// Up to `8` events are collected concurrently by default.
pub const fn collector_concurrency() -> usize {
    8
}
/// The submission is simulated before it is broadcast by default.
pub const fn dry_run_before_submit() -> bool {
    true
}
