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

//! Deferred results.
//!
//! A call that cannot finish right away answers with `buf_addr=<hex>` instead
//! of its result. The result is fetched by polling that address until the
//! reply no longer carries the marker.

use std::time::Duration;

use nom::branch::alt;
use nom::character::complete::{hex_digit1, multispace1};
use nom::combinator::{eof, map_res};
use nom::sequence::terminated;
use nom::{IResult, Parser};
use tokio::time::Instant;
use tracing::debug;

use crate::command::WireCommand;
use crate::error::{Error, Result};
use crate::response::check_status;
use crate::transport::Transport;

pub const DEFERRED_MARKER: &str = "buf_addr=";

/// How long to keep polling a deferred result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredPolicy {
    pub poll_interval: Duration,
    /// `None` leaves the loop bounded only by the call deadline, if any.
    pub max_polls: Option<u32>,
}

impl Default for DeferredPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            max_polls: Some(1_200),
        }
    }
}

/// Returns the buffer address if `response` is a deferred result.
pub fn deferred_address(response: &str) -> Result<Option<u32>> {
    let Some(index) = response.find(DEFERRED_MARKER) else {
        return Ok(None);
    };
    let rest = &response[index + DEFERRED_MARKER.len()..];
    let parsed: IResult<&str, u32> = terminated(
        map_res(hex_digit1, |digits: &str| u32::from_str_radix(digits, 16)),
        alt((multispace1, eof)),
    )
    .parse(rest);
    parsed
        .map(|(_, address)| Some(address))
        .map_err(|_| Error::malformed(response, "expected a hex buffer address"))
}

/// Polls until `response` is no longer deferred and returns the final reply.
///
/// Fails with [`Error::Timeout`] once `policy.max_polls` polls have been sent
/// or the next wait would run past `deadline`.
pub async fn resolve<T: Transport>(
    transport: &mut T,
    mut response: String,
    policy: &DeferredPolicy,
    deadline: Option<Instant>,
    timeout: Duration,
) -> Result<String> {
    let mut polls = 0;
    while let Some(address) = deferred_address(&response)? {
        if policy.max_polls.is_some_and(|max| polls >= max) {
            return Err(Error::Timeout { polls });
        }
        if deadline.is_some_and(|deadline| Instant::now() + policy.poll_interval > deadline) {
            return Err(Error::Timeout { polls });
        }

        tokio::time::sleep(policy.poll_interval).await;
        debug!("polling deferred result at 0x{:X} (poll {})", address, polls + 1);
        let command = WireCommand::poll(address);
        response = transport.send_command(command.as_str(), timeout).await?;
        check_status(&response)?;
        polls += 1;
    }
    Ok(response)
}
