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

use tokio::time::Instant;
use tracing::debug;

use crate::command::{Call, CallDescriptor, WireCommand};
use crate::config::ConnectionConfig;
use crate::deferred;
use crate::error::{Error, Result};
use crate::memory::{self, MemoryScalar};
use crate::response::{self, ArrayElement, ReturnValue, Value};
use crate::tag::{ProtocolTag, ReturnType};
use crate::transport::{RawMemory, Transport};

/// A client for calling functions and accessing memory on a target.
///
/// The client owns its transport, so calls on one connection never overlap.
pub struct Client<T> {
    transport: T,
    config: ConnectionConfig,
}

impl<T: Transport> Client<T> {
    /// Creates a new `Client` with the given transport and default timeouts.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ConnectionConfig::default())
    }

    pub fn with_config(transport: T, config: ConnectionConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends a plain monitor command and returns its reply.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        let response = self
            .transport
            .send_command(command, self.config.command_timeout())
            .await?;
        response::check_status(&response)?;
        Ok(response)
    }

    /// Calls a function and converts its result to `R`.
    pub async fn call<R: ReturnValue>(&mut self, call: &Call) -> Result<R> {
        let ret = ReturnType::scalar(R::KIND);
        let value = self.invoke(call, ret, 0).await?;
        R::from_value(value).ok_or(Error::UnsupportedType(ret))
    }

    /// Calls a function that returns nothing.
    pub async fn call_void(&mut self, call: &Call) -> Result<()> {
        self.call::<()>(call).await
    }

    /// Calls a function that returns a string.
    pub async fn call_string(&mut self, call: &Call) -> Result<String> {
        self.call::<String>(call).await
    }

    /// Calls a function that returns `size` elements.
    ///
    /// A `size` of zero yields one default element without contacting the
    /// target.
    pub async fn call_array<R: ArrayElement>(&mut self, call: &Call, size: u32) -> Result<Vec<R>> {
        if size == 0 {
            return Ok(vec![R::default()]);
        }

        let ret = ReturnType::array(R::KIND);
        match self.invoke(call, ret, size).await? {
            Value::Array(values) => values
                .into_iter()
                .map(R::from_value)
                .collect::<Option<Vec<R>>>()
                .ok_or(Error::UnsupportedType(ret)),
            _ => Err(Error::UnsupportedType(ret)),
        }
    }

    /// Looks up the address of export `ordinal` in `module`.
    pub async fn resolve_function(&mut self, module: &str, ordinal: u32) -> Result<u32> {
        let command = WireCommand::resolve_function(module, ordinal);
        let response = self.send_command(command.as_str()).await?;
        u32::from_str_radix(response::payload(&response).trim(), 16)
            .map_err(|_| Error::malformed(&response, "expected a hex address"))
    }

    async fn invoke(&mut self, call: &Call, ret: ReturnType, array_size: u32) -> Result<Value> {
        ret.validate()?;
        let tag = ProtocolTag::resolve(ret.kind, ret.array);
        let command = CallDescriptor {
            call,
            return_tag: tag,
            array_size,
        }
        .encode()?;

        let deadline = call
            .deadline_duration()
            .or(self.config.call_deadline())
            .map(|deadline| Instant::now() + deadline);
        let timeout = self.config.call_timeout();
        let policy = self.config.deferred_policy();

        debug!("calling {:?} returning {}", call.target(), ret);
        let response = self.transport.send_command(command.as_str(), timeout).await?;
        response::check_status(&response)?;
        let response =
            deferred::resolve(&mut self.transport, response, &policy, deadline, timeout).await?;

        response::decode(&response, tag, ret, array_size)
    }
}

impl<T: Transport + RawMemory> Client<T> {
    pub async fn read_bytes(&mut self, address: u32, length: u32) -> Result<Vec<u8>> {
        Ok(self.transport.read_raw_bytes(address, length).await?)
    }

    pub async fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<()> {
        Ok(self.transport.write_raw_bytes(address, data).await?)
    }

    pub async fn read<V: MemoryScalar>(&mut self, address: u32) -> Result<V> {
        let bytes = self.read_bytes(address, V::WIDTH as u32).await?;
        memory::decode_scalar(&bytes)
    }

    pub async fn read_array<V: MemoryScalar>(&mut self, address: u32, count: usize) -> Result<Vec<V>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let length = V::WIDTH
            .checked_mul(count)
            .and_then(|length| u32::try_from(length).ok())
            .ok_or(Error::TransferTooLarge {
                count,
                width: V::WIDTH,
            })?;
        let bytes = self.read_bytes(address, length).await?;
        memory::decode_array(&bytes, count)
    }

    pub async fn write<V: MemoryScalar>(&mut self, address: u32, value: V) -> Result<()> {
        self.write_bytes(address, &memory::encode_scalar(value)).await
    }

    pub async fn write_array<V: MemoryScalar>(&mut self, address: u32, values: &[V]) -> Result<()> {
        self.write_bytes(address, &memory::encode_array(values)).await
    }

    /// Reads exactly `length` bytes as text.
    pub async fn read_string(&mut self, address: u32, length: u32) -> Result<String> {
        let bytes = self.read_bytes(address, length).await?;
        Ok(memory::decode_string(&bytes))
    }

    /// Writes `text` followed by a NUL terminator.
    pub async fn write_string(&mut self, address: u32, text: &str) -> Result<()> {
        self.write_bytes(address, &memory::encode_string(text)).await
    }
}
