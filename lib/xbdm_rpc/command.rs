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

use core::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::tag::ProtocolTag;
use crate::value::TaggedValue;

/// Version of the call grammar understood by the target extension.
pub const PROTOCOL_VERSION: u32 = 2;

/// The extension rejects calls with more arguments than this.
pub const MAX_ARGUMENTS: usize = 37;

/// Where a remote call lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// An absolute function address.
    Address(u32),
    /// An export of a loaded module, by ordinal.
    Ordinal { module: String, ordinal: u32 },
}

/// Which thread on the target runs the call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreadAffinity {
    #[default]
    System,
    Title,
}

/// A remote function call, built up at the call site.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    target: Target,
    thread: ThreadAffinity,
    args: Vec<TaggedValue>,
    deadline: Option<Duration>,
}

impl Call {
    pub fn address(address: u32) -> Self {
        Self::new(Target::Address(address))
    }

    pub fn ordinal(module: impl Into<String>, ordinal: u32) -> Self {
        Self::new(Target::Ordinal {
            module: module.into(),
            ordinal,
        })
    }

    pub fn new(target: Target) -> Self {
        Self {
            target,
            thread: ThreadAffinity::default(),
            args: Vec::new(),
            deadline: None,
        }
    }

    pub fn thread(mut self, thread: ThreadAffinity) -> Self {
        self.thread = thread;
        self
    }

    /// Appends a positional argument.
    ///
    /// Unsuffixed integer literals default to `i32`, so `&[1, 2][..]` is sent
    /// as 32-bit words. Write `&[1u8, 2][..]` for a byte block.
    pub fn arg(mut self, value: impl Into<TaggedValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<TaggedValue>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Bounds how long the call may wait on a deferred result.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn thread_affinity(&self) -> ThreadAffinity {
        self.thread
    }

    pub fn arguments(&self) -> &[TaggedValue] {
        &self.args
    }

    pub fn deadline_duration(&self) -> Option<Duration> {
        self.deadline
    }
}

/// A call together with the result shape it expects.
#[derive(Clone, Copy, Debug)]
pub struct CallDescriptor<'a> {
    pub call: &'a Call,
    pub return_tag: ProtocolTag,
    /// Element count for array returns, zero otherwise.
    pub array_size: u32,
}

impl CallDescriptor<'_> {
    /// Builds the command string.
    ///
    /// Format: `consolefeatures ver=<V> type=<T>[ system][ module="<m>" ord=<o>]
    /// as=<n> params="A\<addr>\A\<argc>\<args>"`
    pub fn encode(&self) -> Result<WireCommand> {
        let args = self.call.arguments();
        if args.len() > MAX_ARGUMENTS {
            return Err(Error::ArgumentLimitExceeded {
                count: args.len(),
                max: MAX_ARGUMENTS,
            });
        }

        let mut text = format!(
            "consolefeatures ver={PROTOCOL_VERSION} type={}",
            self.return_tag
        );
        if self.call.thread_affinity() == ThreadAffinity::System {
            text.push_str(" system");
        }
        let address = match self.call.target() {
            Target::Address(address) => *address,
            Target::Ordinal { module, ordinal } => {
                text.push_str(&format!(r#" module="{module}" ord={ordinal}"#));
                0
            }
        };
        text.push_str(&format!(
            r#" as={} params="A\{address:X}\A\{}\"#,
            self.array_size,
            args.len()
        ));
        for arg in args {
            arg.encode_into(&mut text);
        }
        text.push('"');

        Ok(WireCommand(text))
    }
}

/// A fully built request line, sent once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireCommand(String);

impl WireCommand {
    /// Follow-up request for a deferred result parked at `address`.
    ///
    /// Format: `consolefeatures buf_addr=0x<addr>`
    pub fn poll(address: u32) -> Self {
        WireCommand(format!("consolefeatures buf_addr=0x{address:X}"))
    }

    /// Asks the extension for the address of a module export.
    ///
    /// Format: `consolefeatures ver=<V> type=9 params="A\0\A\2\<len>\<hex>\<ord>\"`
    pub fn resolve_function(module: &str, ordinal: u32) -> Self {
        let name: Vec<u8> = module.chars().map(|c| c as u8).collect();
        WireCommand(format!(
            r#"consolefeatures ver={PROTOCOL_VERSION} type=9 params="A\0\A\2\{}\{}\{ordinal}\""#,
            name.len(),
            hex::encode_upper(&name)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WireCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
