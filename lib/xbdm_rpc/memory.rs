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

//! Conversion between host values and target memory.
//!
//! Target memory is big-endian. Every value occupies a fixed-width group of
//! bytes in target order, so decoding reverses each group on a little-endian
//! host.

use crate::error::{Error, Result};

/// A fixed-width value that can be stored in target memory.
pub trait MemoryScalar: Copy + Default {
    const WIDTH: usize;

    /// Reads one value from exactly `WIDTH` bytes in target order.
    fn from_target_bytes(bytes: &[u8]) -> Self;

    /// Appends `WIDTH` bytes in target order.
    fn extend_target_bytes(self, out: &mut Vec<u8>);
}

macro_rules! memory_scalars {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MemoryScalar for $ty {
                const WIDTH: usize = core::mem::size_of::<$ty>();

                fn from_target_bytes(bytes: &[u8]) -> Self {
                    let mut group = [0u8; core::mem::size_of::<$ty>()];
                    group.copy_from_slice(bytes);
                    <$ty>::from_be_bytes(group)
                }

                fn extend_target_bytes(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }
            }
        )*
    };
}

memory_scalars!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl MemoryScalar for bool {
    const WIDTH: usize = 1;

    fn from_target_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn extend_target_bytes(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

pub fn decode_scalar<T: MemoryScalar>(bytes: &[u8]) -> Result<T> {
    check_len(bytes, T::WIDTH)?;
    Ok(T::from_target_bytes(bytes))
}

/// Decodes `count` values from exactly `count * T::WIDTH` bytes.
pub fn decode_array<T: MemoryScalar>(bytes: &[u8], count: usize) -> Result<Vec<T>> {
    check_len(bytes, T::WIDTH * count)?;
    Ok(bytes
        .chunks_exact(T::WIDTH)
        .map(T::from_target_bytes)
        .collect())
}

pub fn encode_scalar<T: MemoryScalar>(value: T) -> Vec<u8> {
    let mut out = Vec::with_capacity(T::WIDTH);
    value.extend_target_bytes(&mut out);
    out
}

pub fn encode_array<T: MemoryScalar>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(T::WIDTH * values.len());
    for value in values {
        value.extend_target_bytes(&mut out);
    }
    out
}

/// Decodes the bytes as UTF-8, keeping any trailing NULs or padding.
pub fn decode_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Encodes one byte per character plus a NUL terminator.
///
/// Characters above U+00FF keep only their low byte.
pub fn encode_string(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u8).chain([0]).collect()
}

/// Encodes a big-endian wide string: each character as a zero byte followed
/// by its low byte, then a two-byte NUL terminator.
pub fn encode_wide_string(text: &str) -> Vec<u8> {
    text.chars()
        .flat_map(|c| [0, c as u8])
        .chain([0, 0])
        .collect()
}

fn check_len(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(Error::ShortRead {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
