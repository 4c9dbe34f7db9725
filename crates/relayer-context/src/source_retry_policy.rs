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

use reqwest::StatusCode;
use round_relayer_utils::Error;

/// Decides which source ledger read failures are worth another attempt.
///
/// Timeouts, dropped connections, overloaded gateways and rate limiting are
/// retried. Decoding problems and other JSON-RPC errors are not, the next
/// attempt would fail the same way.
#[derive(Debug, Clone)]
pub struct SourceRetryPolicy {
    err_regex: regex::Regex,
}

impl Default for SourceRetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRetryPolicy {
    /// Creates the policy.
    pub fn new() -> Self {
        Self {
            err_regex: regex::Regex::new(
                r"(?mixU)\b(?:rate|limit|429|Too \s Many \s Requests)\b",
            )
            .expect("Valid Regex"),
        }
    }

    /// Whether the request that failed with `error` should be sent again.
    pub fn should_retry(&self, error: &Error) -> bool {
        let should_retry = match error {
            Error::Reqwest(err) => should_retry_http_error(err),
            Error::SourceRpc { code, message } => {
                self.should_retry_json_rpc_error(*code, message)
            }
            // some gateways answer an overloaded request with a plain text
            // body, which fails to parse as a JSON-RPC response.
            Error::Json(err) => {
                let err_text = err.to_string().to_lowercase();
                self.err_regex.is_match(&err_text)
                    || err_text.starts_with("expected value at line 1 column 1")
            }
            _ => false,
        };
        tracing::event!(
            target: round_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %round_relayer_utils::probe::Kind::Retry,
            should_retry,
            error = %error,
        );
        should_retry
    }

    fn should_retry_json_rpc_error(&self, code: i64, message: &str) -> bool {
        match code {
            429 => true,
            // `exceeded project rate limit`
            -32005 => true,
            -32016 if message.contains("rate limit") => true,
            // generic server error, used by gateways when the node is behind.
            -32000 => self.err_regex.is_match(message),
            _ => false,
        }
    }
}

fn should_retry_http_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    match err.status() {
        Some(StatusCode::TOO_MANY_REQUESTS) => true,
        Some(status) => status.is_server_error(),
        None => false,
    }
}
