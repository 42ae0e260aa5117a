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

use nom::bytes::complete::take_till1;
use nom::character::complete::{char, digit1};
use nom::combinator::map_res;
use nom::multi::separated_list0;
use nom::sequence::terminated;
use nom::{IResult, Parser};

use crate::error::{Error, Result};
use crate::tag::{ProtocolTag, ReturnType, ValueKind};

/// Marks a response carrying an application error from the extension.
pub const ERROR_MARKER: &str = "error=";

/// Present in the monitor's reply when the call extension is not loaded.
pub const MISSING_EXTENSION_MARKER: &str = "DEBUG";

/// Status code the monitor uses for commands it does not recognize.
const UNKNOWN_COMMAND: u16 = 407;

/// Integer array results always come back in this many slots.
pub const INT_ARRAY_SLOTS: usize = 8;

/// A decoded call result.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    I8(i8),
    U8(u8),
    Char(char),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
    Array(Vec<Value>),
}

/// Host types a call result can be converted into.
pub trait ReturnValue: Sized {
    const KIND: ValueKind;

    fn from_value(value: Value) -> Option<Self>;
}

/// Host types that can be returned as array elements.
pub trait ArrayElement: ReturnValue + Clone + Default {}

macro_rules! scalar_return_values {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ReturnValue for $ty {
                const KIND: ValueKind = ValueKind::$variant;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_return_values!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    char => Char,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl ArrayElement for u8 {}
impl ArrayElement for i16 {}
impl ArrayElement for u16 {}
impl ArrayElement for i32 {}
impl ArrayElement for u32 {}
impl ArrayElement for i64 {}
impl ArrayElement for u64 {}
impl ArrayElement for f32 {}
impl ArrayElement for f64 {}

impl ReturnValue for () {
    const KIND: ValueKind = ValueKind::Void;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Void => Some(()),
            _ => None,
        }
    }
}

impl ReturnValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl ReturnValue for Vec<char> {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(text) => Some(text.chars().collect()),
            _ => None,
        }
    }
}

/// Returns the text following the first space, or all of it if there is none.
pub fn payload(response: &str) -> &str {
    response.split_once(' ').map_or(response, |(_, rest)| rest)
}

/// Turns error and missing-extension replies into errors.
pub fn check_status(response: &str) -> Result<()> {
    if let Some(index) = response.find(ERROR_MARKER) {
        return Err(Error::Remote(
            response[index + ERROR_MARKER.len()..].to_string(),
        ));
    }
    if response.contains(MISSING_EXTENSION_MARKER) {
        return Err(Error::ExtensionNotInstalled);
    }
    match status_code(response) {
        Some(UNKNOWN_COMMAND) => Err(Error::ExtensionNotInstalled),
        Some(code) if (400..500).contains(&code) => Err(Error::Remote(payload(response).to_string())),
        _ => Ok(()),
    }
}

fn status_code(response: &str) -> Option<u16> {
    let result: IResult<&str, u16> =
        map_res(digit1, |digits: &str| digits.parse::<u16>()).parse(response);
    result.ok().map(|(_, code)| code)
}

fn element_list(input: &str) -> IResult<&str, Vec<&str>> {
    terminated(
        separated_list0(char(','), take_till1(|c: char| c == ',' || c == ';')),
        char(';'),
    )
    .parse(input)
}

/// Decodes the response to a call that was sent with `tag`.
///
/// The payload is not self-describing, so `tag` and `ret` must match the
/// request. `array_size` sizes the array forms.
pub fn decode(response: &str, tag: ProtocolTag, ret: ReturnType, array_size: u32) -> Result<Value> {
    check_status(response)?;

    let payload = payload(response);
    let kind = ret.kind;
    let unsupported = || Error::UnsupportedType(ret);

    match tag {
        ProtocolTag::Void => Ok(Value::Void),
        ProtocolTag::Int => {
            let bits = u32::from_str_radix(payload.trim(), 16)
                .map_err(|_| Error::malformed(response, "expected a hex integer"))?;
            int_value(bits, kind).ok_or_else(unsupported)
        }
        ProtocolTag::String => match kind {
            ValueKind::String => Ok(Value::Text(payload.to_string())),
            _ => Err(unsupported()),
        },
        ProtocolTag::Float => {
            if !matches!(kind, ValueKind::F32 | ValueKind::F64) {
                return Err(unsupported());
            }
            float_value(payload.trim(), kind)
                .ok_or_else(|| Error::malformed(response, "expected a decimal number"))
        }
        ProtocolTag::Byte => {
            let byte = u8::from_str_radix(payload.trim(), 16)
                .map_err(|_| Error::malformed(response, "expected a hex byte"))?;
            byte_value(byte, kind).ok_or_else(unsupported)
        }
        ProtocolTag::UInt64 => {
            let bits = u64::from_str_radix(payload.trim(), 16)
                .map_err(|_| Error::malformed(response, "expected a hex integer"))?;
            wide_value(bits, kind).ok_or_else(unsupported)
        }
        ProtocolTag::IntArray => {
            let zero = int_value(0, kind).ok_or_else(unsupported)?;
            let slots = (array_size as usize).min(INT_ARRAY_SLOTS);
            let values = decode_array(response, payload, slots, zero, |element| {
                u32::from_str_radix(element, 16)
                    .ok()
                    .and_then(|bits| int_value(bits, kind))
            })?;
            Ok(Value::Array(values))
        }
        ProtocolTag::FloatArray => {
            let zero = float_value("0", kind).ok_or_else(unsupported)?;
            let values = decode_array(response, payload, array_size as usize, zero, |element| {
                float_value(element, kind)
            })?;
            Ok(Value::Array(values))
        }
        ProtocolTag::ByteArray => {
            let zero = byte_value(0, kind).ok_or_else(unsupported)?;
            let values = decode_array(response, payload, array_size as usize, zero, |element| {
                element.parse::<u8>().ok().and_then(|byte| byte_value(byte, kind))
            })?;
            Ok(Value::Array(values))
        }
        ProtocolTag::UInt64Array => {
            let zero = wide_value(0, kind).ok_or_else(unsupported)?;
            let values = decode_array(response, payload, array_size as usize, zero, |element| {
                element.parse::<u64>().ok().and_then(|bits| wide_value(bits, kind))
            })?;
            Ok(Value::Array(values))
        }
    }
}

fn decode_array(
    response: &str,
    payload: &str,
    slots: usize,
    zero: Value,
    mut parse: impl FnMut(&str) -> Option<Value>,
) -> Result<Vec<Value>> {
    let (_, elements) = element_list(payload)
        .map_err(|_| Error::malformed(response, "expected a `;` terminated element list"))?;
    if elements.len() > slots {
        return Err(Error::malformed(response, "more elements than array slots"));
    }

    let mut values = vec![zero; slots];
    for (slot, element) in values.iter_mut().zip(elements) {
        *slot = parse(element.trim())
            .ok_or_else(|| Error::malformed(response, "invalid array element"))?;
    }
    Ok(values)
}

fn int_value(bits: u32, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::I16 => Some(Value::I16(bits as i16)),
        ValueKind::U16 => Some(Value::U16(bits as u16)),
        ValueKind::I32 => Some(Value::I32(bits as i32)),
        ValueKind::U32 => Some(Value::U32(bits)),
        _ => None,
    }
}

fn float_value(text: &str, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::F32 => text.parse().ok().map(Value::F32),
        ValueKind::F64 => text.parse().ok().map(Value::F64),
        _ => None,
    }
}

fn byte_value(byte: u8, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::U8 => Some(Value::U8(byte)),
        ValueKind::Char => Some(Value::Char(char::from(byte))),
        _ => None,
    }
}

fn wide_value(bits: u64, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::U64 => Some(Value::U64(bits)),
        ValueKind::I64 => Some(Value::I64(bits as i64)),
        ValueKind::Bool => Some(Value::Bool(bits != 0)),
        ValueKind::I8 => Some(Value::I8(bits as i8)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TaggedValue;

    fn scalar(response: &str, kind: ValueKind) -> Result<Value> {
        let ret = ReturnType::scalar(kind);
        decode(response, ret.tag(), ret, 0)
    }

    fn array(response: &str, kind: ValueKind, size: u32) -> Result<Value> {
        let ret = ReturnType::array(kind);
        decode(response, ret.tag(), ret, size)
    }

    #[test]
    fn test_payload_follows_first_space() {
        assert_eq!(payload("200- 1A"), "1A");
        assert_eq!(payload("200 hello world"), "hello world");
        assert_eq!(payload("nospace"), "nospace");
    }

    #[test]
    fn test_decode_int_widths() {
        assert_eq!(scalar("200- FFFFFFFF", ValueKind::U32).unwrap(), Value::U32(u32::MAX));
        assert_eq!(scalar("200- FFFFFFFF", ValueKind::I32).unwrap(), Value::I32(-1));
        assert_eq!(scalar("200- FFFE", ValueKind::I16).unwrap(), Value::I16(-2));
        assert_eq!(scalar("200- 1234", ValueKind::U16).unwrap(), Value::U16(0x1234));
    }

    #[test]
    fn test_int_round_trips_bit_patterns() {
        for bits in [0u32, 1, 0x7fff_ffff, 0x8000_0000, 0xdead_beef, u32::MAX] {
            let fragment = TaggedValue::from(bits).encode();
            let decimal = fragment
                .strip_prefix("1\\")
                .and_then(|rest| rest.strip_suffix('\\'))
                .unwrap();
            let sent = decimal.parse::<i32>().unwrap() as u32;
            let response = format!("200- {sent:X}");
            assert_eq!(scalar(&response, ValueKind::U32).unwrap(), Value::U32(bits));
            assert_eq!(
                scalar(&response, ValueKind::I32).unwrap(),
                Value::I32(bits as i32)
            );
        }
    }

    #[test]
    fn test_decode_string_and_chars() {
        assert_eq!(
            scalar("200- Hello there", ValueKind::String).unwrap(),
            Value::Text("Hello there".to_string())
        );
        let chars = Vec::<char>::from_value(scalar("200- ab", ValueKind::String).unwrap());
        assert_eq!(chars, Some(vec!['a', 'b']));
    }

    #[test]
    fn test_decode_float_at_requested_width() {
        assert_eq!(scalar("200- 1.5", ValueKind::F32).unwrap(), Value::F32(1.5));
        assert_eq!(scalar("200- 0.1", ValueKind::F64).unwrap(), Value::F64(0.1));
        assert!(matches!(
            scalar("200- abc", ValueKind::F32),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_decode_byte_and_char() {
        assert_eq!(scalar("200- 41", ValueKind::U8).unwrap(), Value::U8(0x41));
        assert_eq!(scalar("200- 41", ValueKind::Char).unwrap(), Value::Char('A'));
    }

    #[test]
    fn test_decode_uint64_signedness() {
        assert_eq!(
            scalar("200- FFFFFFFFFFFFFFFF", ValueKind::U64).unwrap(),
            Value::U64(u64::MAX)
        );
        assert_eq!(
            scalar("200- FFFFFFFFFFFFFFFF", ValueKind::I64).unwrap(),
            Value::I64(-1)
        );
        assert_eq!(scalar("200- 1", ValueKind::Bool).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_decode_void_ignores_payload() {
        assert_eq!(scalar("200- whatever", ValueKind::Void).unwrap(), Value::Void);
    }

    #[test]
    fn test_decode_int_array() {
        assert_eq!(
            array("200 1A,2B,3C;", ValueKind::U32, 3).unwrap(),
            Value::Array(vec![Value::U32(0x1A), Value::U32(0x2B), Value::U32(0x3C)])
        );
        assert_eq!(
            array("200- FFFF;", ValueKind::I16, 2).unwrap(),
            Value::Array(vec![Value::I16(-1), Value::I16(0)])
        );
    }

    #[test]
    fn test_int_array_capacity_is_eight() {
        assert!(array("200- 1,2,3,4,5,6,7,8;", ValueKind::I32, 8).is_ok());
        assert!(matches!(
            array("200- 1,2,3,4,5,6,7,8,9;", ValueKind::I32, 9),
            Err(Error::MalformedResponse { .. })
        ));
        let Value::Array(values) = array("200- 1;", ValueKind::U32, 20).unwrap() else {
            panic!("expected an array");
        };
        assert_eq!(values.len(), INT_ARRAY_SLOTS);
    }

    #[test]
    fn test_int_array_rejects_elements_past_requested_size() {
        assert!(matches!(
            array("200- 1,2,3;", ValueKind::U32, 2),
            Err(Error::MalformedResponse { .. })
        ));
        assert!(matches!(
            array("200- 1,2,3;", ValueKind::U64, 2),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_decode_decimal_arrays() {
        assert_eq!(
            array("200- 1.5,-2.25;", ValueKind::F32, 3).unwrap(),
            Value::Array(vec![Value::F32(1.5), Value::F32(-2.25), Value::F32(0.0)])
        );
        assert_eq!(
            array("200- 10,255;", ValueKind::U8, 2).unwrap(),
            Value::Array(vec![Value::U8(10), Value::U8(255)])
        );
        assert_eq!(
            array("200- 18446744073709551615,2;", ValueKind::I64, 2).unwrap(),
            Value::Array(vec![Value::I64(-1), Value::I64(2)])
        );
    }

    #[test]
    fn test_decode_array_rejects_malformed_lists() {
        for response in ["200- 1,2", "200- 1,,2;", "200- 1,2,3;", "200- x;"] {
            assert!(
                matches!(
                    array(response, ValueKind::U64, 2),
                    Err(Error::MalformedResponse { .. })
                ),
                "{response}"
            );
        }
    }

    #[test]
    fn test_remote_error_carries_message() {
        match scalar("200- error=bad address", ValueKind::U32) {
            Err(Error::Remote(message)) => assert_eq!(message, "bad address"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_extension() {
        assert!(matches!(
            scalar("200- DEBUG", ValueKind::U32),
            Err(Error::ExtensionNotInstalled)
        ));
        assert!(matches!(
            check_status("407- unknown command"),
            Err(Error::ExtensionNotInstalled)
        ));
    }

    #[test]
    fn test_other_client_errors_are_remote() {
        match check_status("405- access denied") {
            Err(Error::Remote(message)) => assert_eq!(message, "access denied"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_status("200- OK").is_ok());
    }

    #[test]
    fn test_mismatched_kind_is_unsupported() {
        let ret = ReturnType::scalar(ValueKind::F32);
        assert!(matches!(
            decode("200- 1", ProtocolTag::Int, ret, 0),
            Err(Error::UnsupportedType(_))
        ));
    }
}
