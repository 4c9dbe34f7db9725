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

use std::fmt;

use ethers::types::H256;

/// A transaction hash rendered as an OSC-8 terminal hyperlink pointing to a
/// block explorer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClickableLink {
    text: String,
    url: url::Url,
}

impl ClickableLink {
    /// Links `tx_hash` to `<explorer>/tx/<hash>`.
    pub fn for_transaction(explorer: &url::Url, tx_hash: H256) -> Self {
        let text = format!("{tx_hash:#x}");
        let mut url = explorer.clone();
        url.set_path(&format!("tx/{text}"));
        Self { text, url }
    }

    /// The url the link points to.
    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

impl fmt::Display for ClickableLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\u{1b}]8;;{}\u{1b}\\{}\u{1b}]8;;\u{1b}\\",
            self.url, self.text
        )
    }
}
