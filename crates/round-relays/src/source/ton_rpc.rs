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


use std::sync::atomic::{AtomicU64, Ordering};

use round_relayer_context::RelayerContext;
use round_relayer_types::rpc_url::RpcUrl;
use round_relayer_types::ton_address::TonAddress;
use round_relayer_utils::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    ContractAbi, DecodedEvent, RawMessage, SourceLedger, Watermark,
    EVENT_MESSAGE_TYPE,
};

/// A [`SourceLedger`] backed by a JSON-RPC 2.0 gateway in front of the
/// source ledger.
///
/// The gateway exposes `ton_queryMessages` (message collection queries),
/// `ton_decodeMessage` and `ton_runGetter`, and holds the contract ABIs
/// named by [`ContractAbi`].
#[derive(Debug)]
pub struct TonRpcClient {
    client: reqwest::Client,
    endpoint: RpcUrl,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl TonRpcClient {
    /// Creates a client sending requests to `endpoint` with `client`.
    pub fn new(client: reqwest::Client, endpoint: RpcUrl) -> Self {
        Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a client for the configured source ledger gateway.
    pub fn from_context(
        ctx: &RelayerContext,
    ) -> round_relayer_utils::Result<Self> {
        Ok(Self::new(ctx.http_client()?, ctx.config.ton_rpc.clone()))
    }

    async fn call<P, R>(
        &self,
        method: &str,
        params: P,
    ) -> round_relayer_utils::Result<Option<R>>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            %id,
            %method,
            endpoint = %self.endpoint,
            "Calling source ledger"
        );
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let body = self
            .client
            .post(self.endpoint.as_url().clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let response: JsonRpcResponse<R> = serde_json::from_str(&body)?;
        match response.error {
            Some(JsonRpcError { code, message }) => {
                Err(Error::SourceRpc { code, message })
            }
            None => Ok(response.result),
        }
    }
}

/// Params of a `ton_queryMessages` call for the event messages `source`
/// emitted after `after`, oldest first.
fn query_messages_params(
    source: &TonAddress,
    after: &Watermark,
    limit: u32,
) -> serde_json::Value {
    let src = source.to_string();
    let mut filter = serde_json::json!({
        "src": { "eq": src },
        "msg_type": { "eq": EVENT_MESSAGE_TYPE },
        "created_at": { "gt": after.created_at() },
    });
    // (created_at > t) OR (created_at == t AND id > last_id)
    if let Some(last_id) = after.message_id() {
        filter["OR"] = serde_json::json!({
            "src": { "eq": src },
            "msg_type": { "eq": EVENT_MESSAGE_TYPE },
            "created_at": { "eq": after.created_at() },
            "id": { "gt": last_id },
        });
    }
    serde_json::json!({
        "collection": "messages",
        "filter": filter,
        "order": [
            { "path": "created_at", "direction": "ASC" },
            { "path": "id", "direction": "ASC" },
        ],
        "limit": limit,
        "result": "id src created_at body",
    })
}

#[async_trait::async_trait]
impl SourceLedger for TonRpcClient {
    async fn query_messages(
        &self,
        source: &TonAddress,
        after: &Watermark,
        limit: u32,
    ) -> round_relayer_utils::Result<Vec<RawMessage>> {
        let params = query_messages_params(source, after, limit);
        let messages = self
            .call::<_, Vec<RawMessage>>("ton_queryMessages", params)
            .await?
            .unwrap_or_default();
        Ok(messages)
    }

    async fn decode_event_message(
        &self,
        abi: ContractAbi,
        message: &RawMessage,
    ) -> round_relayer_utils::Result<Option<DecodedEvent>> {
        let params = serde_json::json!({
            "abi": abi,
            "message": message.body,
            "is_internal": false,
        });
        self.call("ton_decodeMessage", params).await
    }

    async fn run_getter(
        &self,
        abi: ContractAbi,
        address: &TonAddress,
        method: &str,
        input: serde_json::Value,
    ) -> round_relayer_utils::Result<serde_json::Value> {
        let params = serde_json::json!({
            "abi": abi,
            "address": address.to_string(),
            "method": method,
            "input": input,
        });
        self.call("ton_runGetter", params).await?.ok_or_else(|| {
            Error::MalformedEvent(format!(
                "{abi}.{method} on {address} returned no output"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_object_wins_over_result() {
        let response: JsonRpcResponse<serde_json::Value> =
            serde_json::from_str(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":429,"message":"Too Many Requests"}}"#,
            )
            .unwrap();
        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, 429);
    }

    #[test]
    fn messages_accept_string_timestamps() {
        let response: JsonRpcResponse<Vec<RawMessage>> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":[{"id":"aa","src":"0:01","created_at":"1650000000","body":"te6"}]}"#,
        )
        .unwrap();
        let messages = response.result.unwrap();
        assert_eq!(messages[0].created_at, 1_650_000_000);
    }

    fn configuration() -> TonAddress {
        TonAddress::new(0, [0x11; 32])
    }

    #[test]
    fn start_of_scan_skips_the_whole_second() {
        let params = query_messages_params(
            &configuration(),
            &Watermark::starting_after(200),
            50,
        );
        assert_eq!(
            params["filter"],
            serde_json::json!({
                "src": { "eq": configuration().to_string() },
                "msg_type": { "eq": EVENT_MESSAGE_TYPE },
                "created_at": { "gt": 200 },
            })
        );
        assert_eq!(params["limit"], 50);
    }

    #[test]
    fn mid_second_watermark_resumes_after_the_last_id() {
        let params = query_messages_params(
            &configuration(),
            &Watermark::new(200, "0b"),
            10,
        );
        let filter = &params["filter"];
        assert_eq!(filter["created_at"], serde_json::json!({ "gt": 200 }));
        assert_eq!(
            filter["OR"],
            serde_json::json!({
                "src": { "eq": configuration().to_string() },
                "msg_type": { "eq": EVENT_MESSAGE_TYPE },
                "created_at": { "eq": 200 },
                "id": { "gt": "0b" },
            })
        );
        assert_eq!(
            params["order"],
            serde_json::json!([
                { "path": "created_at", "direction": "ASC" },
                { "path": "id", "direction": "ASC" },
            ])
        );
        assert_eq!(params["limit"], 10);
    }
}
