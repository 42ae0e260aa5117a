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

use crate::memory;
use crate::tag::ProtocolTag;

/// A call argument, tagged with its wire shape.
///
/// Host values are converted with `From`, which decides the wire shape once at
/// the call boundary. Kinds without a dedicated shape end up in `UInt64`.
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedValue {
    /// Bit pattern of any integer up to 32 bits wide.
    ///
    /// Format: `1\<decimal>\`
    Int(i32),
    /// Format: `3\<decimal>\`
    Float32(f32),
    /// Format: `3\<decimal>\`
    Float64(f64),
    /// Format: `7/<len>\<hex>\`
    Bytes(Vec<u8>),
    /// 32-bit words, serialized big-endian.
    ///
    /// Format: `7/<4 * count>\<hex>\`
    Ints(Vec<u32>),
    /// Format: `7/<4 * count>\<hex>\`
    Floats(Vec<f32>),
    /// One byte per character. Characters above U+00FF are truncated.
    ///
    /// Format: `7/<chars>\<hex>\`
    Text(String),
    /// Format: `8\<decimal>\`
    UInt64(u64),
}

impl TaggedValue {
    /// Passes the raw bits of an `f32` as a 64-bit integer.
    pub fn f32_bits(value: f32) -> Self {
        TaggedValue::UInt64(u64::from(value.to_bits()))
    }

    /// Passes the raw bits of an `f64` as a 64-bit integer.
    pub fn f64_bits(value: f64) -> Self {
        TaggedValue::UInt64(value.to_bits())
    }

    /// Passes `text` as a NUL terminated big-endian wide string.
    pub fn wide_text(text: &str) -> Self {
        TaggedValue::Bytes(memory::encode_wide_string(text))
    }

    pub fn tag(&self) -> ProtocolTag {
        match self {
            TaggedValue::Int(_) => ProtocolTag::Int,
            TaggedValue::Float32(_) | TaggedValue::Float64(_) => ProtocolTag::Float,
            TaggedValue::Bytes(_)
            | TaggedValue::Ints(_)
            | TaggedValue::Floats(_)
            | TaggedValue::Text(_) => ProtocolTag::ByteArray,
            TaggedValue::UInt64(_) => ProtocolTag::UInt64,
        }
    }

    /// Appends this argument's wire fragment to `out`.
    pub fn encode_into(&self, out: &mut String) {
        let tag = self.tag();
        match self {
            TaggedValue::Int(value) => out.push_str(&format!(r"{tag}\{value}\")),
            TaggedValue::Float32(value) => out.push_str(&format!(r"{tag}\{value}\")),
            TaggedValue::Float64(value) => out.push_str(&format!(r"{tag}\{value}\")),
            TaggedValue::UInt64(value) => out.push_str(&format!(r"{tag}\{value}\")),
            TaggedValue::Bytes(bytes) => encode_block(out, tag, bytes.len(), bytes),
            TaggedValue::Ints(words) => {
                let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
                encode_block(out, tag, bytes.len(), &bytes);
            }
            TaggedValue::Floats(floats) => {
                let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_be_bytes()).collect();
                encode_block(out, tag, bytes.len(), &bytes);
            }
            TaggedValue::Text(text) => {
                let bytes: Vec<u8> = text.chars().map(|c| c as u8).collect();
                encode_block(out, tag, bytes.len(), &bytes);
            }
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.encode_into(&mut out);
        out
    }
}

fn encode_block(out: &mut String, tag: ProtocolTag, len: usize, bytes: &[u8]) {
    out.push_str(&format!(r"{tag}/{len}\{}\", hex::encode_upper(bytes)));
}

impl From<bool> for TaggedValue {
    fn from(value: bool) -> Self {
        TaggedValue::Int(i32::from(value))
    }
}

impl From<u8> for TaggedValue {
    fn from(value: u8) -> Self {
        TaggedValue::Int(i32::from(value))
    }
}

impl From<i16> for TaggedValue {
    fn from(value: i16) -> Self {
        TaggedValue::Int(i32::from(value))
    }
}

impl From<u16> for TaggedValue {
    fn from(value: u16) -> Self {
        TaggedValue::Int(i32::from(value))
    }
}

impl From<i32> for TaggedValue {
    fn from(value: i32) -> Self {
        TaggedValue::Int(value)
    }
}

impl From<u32> for TaggedValue {
    fn from(value: u32) -> Self {
        // Bit reinterpretation, not a clamp.
        TaggedValue::Int(value as i32)
    }
}

impl From<i8> for TaggedValue {
    fn from(value: i8) -> Self {
        TaggedValue::UInt64(i64::from(value) as u64)
    }
}

impl From<char> for TaggedValue {
    fn from(value: char) -> Self {
        TaggedValue::UInt64(u64::from(value))
    }
}

impl From<i64> for TaggedValue {
    fn from(value: i64) -> Self {
        TaggedValue::UInt64(value as u64)
    }
}

impl From<u64> for TaggedValue {
    fn from(value: u64) -> Self {
        TaggedValue::UInt64(value)
    }
}

impl From<f32> for TaggedValue {
    fn from(value: f32) -> Self {
        TaggedValue::Float32(value)
    }
}

impl From<f64> for TaggedValue {
    fn from(value: f64) -> Self {
        TaggedValue::Float64(value)
    }
}

impl From<Vec<u8>> for TaggedValue {
    fn from(value: Vec<u8>) -> Self {
        TaggedValue::Bytes(value)
    }
}

impl From<&[u8]> for TaggedValue {
    fn from(value: &[u8]) -> Self {
        TaggedValue::Bytes(value.to_vec())
    }
}

impl From<Vec<u32>> for TaggedValue {
    fn from(value: Vec<u32>) -> Self {
        TaggedValue::Ints(value)
    }
}

impl From<&[u32]> for TaggedValue {
    fn from(value: &[u32]) -> Self {
        TaggedValue::Ints(value.to_vec())
    }
}

impl From<Vec<i32>> for TaggedValue {
    fn from(value: Vec<i32>) -> Self {
        TaggedValue::from(value.as_slice())
    }
}

impl From<&[i32]> for TaggedValue {
    fn from(value: &[i32]) -> Self {
        TaggedValue::Ints(value.iter().map(|&v| v as u32).collect())
    }
}

impl From<Vec<f32>> for TaggedValue {
    fn from(value: Vec<f32>) -> Self {
        TaggedValue::Floats(value)
    }
}

impl From<&[f32]> for TaggedValue {
    fn from(value: &[f32]) -> Self {
        TaggedValue::Floats(value.to_vec())
    }
}

impl From<String> for TaggedValue {
    fn from(value: String) -> Self {
        TaggedValue::Text(value)
    }
}

impl From<&str> for TaggedValue {
    fn from(value: &str) -> Self {
        TaggedValue::Text(value.to_string())
    }
}
