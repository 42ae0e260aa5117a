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

use crate::error::{Error, Result};

/// Wire discriminant identifying the shape of a value.
///
/// The numeric values are shared with the target extension and never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProtocolTag {
    Void = 0,
    Int = 1,
    String = 2,
    Float = 3,
    Byte = 4,
    IntArray = 5,
    FloatArray = 6,
    ByteArray = 7,
    UInt64 = 8,
    UInt64Array = 9,
}

impl ProtocolTag {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => ProtocolTag::Void,
            1 => ProtocolTag::Int,
            2 => ProtocolTag::String,
            3 => ProtocolTag::Float,
            4 => ProtocolTag::Byte,
            5 => ProtocolTag::IntArray,
            6 => ProtocolTag::FloatArray,
            7 => ProtocolTag::ByteArray,
            8 => ProtocolTag::UInt64,
            9 => ProtocolTag::UInt64Array,
            _ => return None,
        })
    }

    /// Maps a host value kind to the tag the extension expects for it.
    ///
    /// Kinds without a dedicated tag fall back to `UInt64`, array or not.
    pub fn resolve(kind: ValueKind, array: bool) -> Self {
        match (kind, array) {
            (ValueKind::Void, _) => ProtocolTag::Void,
            (ValueKind::I16 | ValueKind::U16 | ValueKind::I32 | ValueKind::U32, false) => {
                ProtocolTag::Int
            }
            (ValueKind::I16 | ValueKind::U16 | ValueKind::I32 | ValueKind::U32, true) => {
                ProtocolTag::IntArray
            }
            (ValueKind::F32 | ValueKind::F64, false) => ProtocolTag::Float,
            (ValueKind::F32 | ValueKind::F64, true) => ProtocolTag::FloatArray,
            (ValueKind::U8 | ValueKind::Char, false) => ProtocolTag::Byte,
            (ValueKind::U8 | ValueKind::Char, true) => ProtocolTag::ByteArray,
            (ValueKind::String, _) => ProtocolTag::String,
            (ValueKind::I64 | ValueKind::U64, false) => ProtocolTag::UInt64,
            (ValueKind::I64 | ValueKind::U64, true) => ProtocolTag::UInt64Array,
            (ValueKind::Bool | ValueKind::I8, _) => ProtocolTag::UInt64,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ProtocolTag::IntArray
                | ProtocolTag::FloatArray
                | ProtocolTag::ByteArray
                | ProtocolTag::UInt64Array
        )
    }
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Host-side semantic kind of a value crossing the call boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void,
    Bool,
    I8,
    U8,
    Char,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
}

impl ValueKind {
    fn name(self) -> &'static str {
        match self {
            ValueKind::Void => "()",
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::U8 => "u8",
            ValueKind::Char => "char",
            ValueKind::I16 => "i16",
            ValueKind::U16 => "u16",
            ValueKind::I32 => "i32",
            ValueKind::U32 => "u32",
            ValueKind::I64 => "i64",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::String => "String",
        }
    }
}

/// The expected result of a remote call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReturnType {
    pub kind: ValueKind,
    pub array: bool,
}

impl ReturnType {
    pub const VOID: ReturnType = ReturnType::scalar(ValueKind::Void);

    pub const fn scalar(kind: ValueKind) -> Self {
        Self { kind, array: false }
    }

    pub const fn array(kind: ValueKind) -> Self {
        Self { kind, array: true }
    }

    pub fn tag(self) -> ProtocolTag {
        ProtocolTag::resolve(self.kind, self.array)
    }

    pub fn is_supported(self) -> bool {
        match self.kind {
            ValueKind::Void => !self.array,
            ValueKind::Bool
            | ValueKind::U8
            | ValueKind::I16
            | ValueKind::U16
            | ValueKind::I32
            | ValueKind::U32
            | ValueKind::I64
            | ValueKind::U64
            | ValueKind::F32
            | ValueKind::F64
            | ValueKind::String => true,
            ValueKind::I8 | ValueKind::Char => false,
        }
    }

    /// Fails with [`Error::UnsupportedType`] unless the type is whitelisted.
    pub fn validate(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(Error::UnsupportedType(self))
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "[{}]", self.kind.name())
        } else {
            f.write_str(self.kind.name())
        }
    }
}
