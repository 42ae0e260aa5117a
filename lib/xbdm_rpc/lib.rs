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

//! Remote function calls and memory access over the debug monitor protocol.
//!
//! This crate provides a `Client` that marshals function calls into the text
//! grammar of the target's call extension, decodes typed results (polling for
//! deferred ones), and reads and writes big-endian target memory. I/O goes
//! through the `Transport` and `RawMemory` traits. `LineTransport` implements
//! both over any futures `AsyncRead + AsyncWrite` stream.
//!
//! This crate is targeted at host level tooling.
//!
//! # Example
//!
//! ```
//! use xbdm_rpc::{Call, Client, ConnectionConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::default();
//!     let transport = xbdm_rpc::connect("192.168.1.20", &config).await?;
//!     let mut client = Client::with_config(transport, config);
//!
//!     let address = client.resolve_function("xam.xex", 656).await?;
//!     client
//!         .call_void(&Call::address(address).arg(34u32).arg(0xffu32).arg(2u32))
//!         .await?;
//!
//!     // Read memory
//!     let health: f32 = client.read(0x8300_1234).await?;
//!     println!("Health: {health}");
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod deferred;
pub mod error;
pub mod memory;
pub mod response;
pub mod tag;
pub mod transport;
pub mod value;

pub use client::Client;
pub use command::{Call, Target, ThreadAffinity};
pub use config::ConnectionConfig;
pub use error::{Error, Result};
pub use memory::MemoryScalar;
pub use response::{ArrayElement, ReturnValue, Value};
pub use tag::{ProtocolTag, ReturnType, ValueKind};
pub use transport::{LineTransport, RawMemory, Transport, connect};
pub use value::TaggedValue;
