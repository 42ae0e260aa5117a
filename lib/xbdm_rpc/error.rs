// Copyright 2025 The Pigweed Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

use std::io;

use thiserror::Error;

use crate::tag::ReturnType;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested return type is not one the extension can produce.
    #[error("unsupported return type {0}")]
    UnsupportedType(ReturnType),

    #[error("call has {count} arguments, the extension accepts at most {max}")]
    ArgumentLimitExceeded { count: usize, max: usize },

    /// The extension reported an error. The message is passed through verbatim.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("remote call extension is not installed on the target")]
    ExtensionNotInstalled,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A deferred result was still pending when the poll budget ran out.
    #[error("deferred result still pending after {polls} polls")]
    Timeout { polls: u32 },

    #[error("malformed response {response:?}: {reason}")]
    MalformedResponse {
        response: String,
        reason: &'static str,
    },

    #[error("expected {expected} bytes of memory, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("{count} values of {width} bytes exceed a single memory transfer")]
    TransferTooLarge { count: usize, width: usize },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json5::Error),
}

impl Error {
    pub(crate) fn malformed(response: &str, reason: &'static str) -> Self {
        Error::MalformedResponse {
            response: response.to_string(),
            reason,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
