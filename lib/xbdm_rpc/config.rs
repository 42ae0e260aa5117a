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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deferred::DeferredPolicy;
use crate::error::Result;

/// Timeouts and retry limits for one debug monitor connection.
///
/// All durations are in milliseconds. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Reply timeout for plain commands and memory access.
    pub command_timeout_ms: u64,
    /// Reply timeout for remote calls and their deferred polls.
    pub call_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub connect_retries: u32,
    pub connect_backoff_ms: u64,
    /// Wait between deferred result polls.
    pub poll_interval_ms: u64,
    /// Upper bound on deferred result polls. `None` polls until the deadline.
    pub max_polls: Option<u32>,
    /// Default deadline for calls that do not set their own.
    pub call_deadline_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 2_000,
            call_timeout_ms: 4_000_000,
            connect_timeout_ms: 5_000,
            connect_retries: 3,
            connect_backoff_ms: 100,
            poll_interval_ms: 250,
            max_polls: Some(1_200),
            call_deadline_ms: None,
        }
    }
}

impl ConnectionConfig {
    pub fn from_json5(text: &str) -> Result<Self> {
        Ok(serde_json5::from_str(text)?)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn call_deadline(&self) -> Option<Duration> {
        self.call_deadline_ms.map(Duration::from_millis)
    }

    pub fn deferred_policy(&self) -> DeferredPolicy {
        DeferredPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_polls: self.max_polls,
        }
    }
}
