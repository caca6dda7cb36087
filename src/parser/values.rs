use crate::leb128;
use crate::model::Name;
use nom::bytes::complete::{tag, take};
use nom::combinator::{map, map_res};
use nom::error::{Error, ErrorKind};
use nom::multi::count;
use nom::{IResult, Parser};

/// Parses a single byte and verifies the parsed byte matches the given byte.
pub fn match_byte<'input>(byte: u8) -> impl FnMut(&'input [u8]) -> IResult<&'input [u8], u8> {
    map(tag([byte]), |bytes: &'input [u8]| bytes[0])
}

/// Adapts a LEB128 decode result to a nom parse result.
fn adapt<'a, T>(input: &'a [u8], decoded: Result<(&'a [u8], T), leb128::Leb128Error>) -> IResult<&'a [u8], T> {
    match decoded {
        Ok((remaining, value)) => Ok((&input[input.len() - remaining.len()..], value)),
        Err(_) => Err(nom::Err::Error(Error::new(input, ErrorKind::Verify))),
    }
}

/// Parses an unsigned 7-bit integer using LEB128 encoding.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn parse_u7(input: &[u8]) -> IResult<&[u8], u8> {
    let decoded = leb128::decode_unsigned(input, 7);

    adapt(input, decoded.map(|(rest, value)| (rest, value as u8)))
}

/// Parses an unsigned 32-bit integer using LEB128 encoding.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn parse_u32(input: &[u8]) -> IResult<&[u8], u32> {
    let decoded = leb128::decode_unsigned(input, 32);

    adapt(input, decoded.map(|(rest, value)| (rest, value as u32)))
}

/// Parses a signed 32-bit integer using LEB128 encoding.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn parse_s32(input: &[u8]) -> IResult<&[u8], i32> {
    let decoded = leb128::decode_signed(input, 32);

    adapt(input, decoded.map(|(rest, value)| (rest, value as i32)))
}

/// Parses a signed 64-bit integer using LEB128 encoding.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn parse_s64(input: &[u8]) -> IResult<&[u8], i64> {
    let decoded = leb128::decode_signed(input, 64);

    adapt(input, decoded)
}

/// Parses a 32-bit float from its little-endian IEEE-754 bits.
/// NaN payloads pass through bit-for-bit.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#floating-point>
pub fn parse_f32(input: &[u8]) -> IResult<&[u8], f32> {
    map(take(4usize), |bytes: &[u8]| {
        f32::from_bits(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    })(input)
}

/// Parses a 64-bit float from its little-endian IEEE-754 bits.
/// NaN payloads pass through bit-for-bit.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#floating-point>
pub fn parse_f64(input: &[u8]) -> IResult<&[u8], f64> {
    map(take(8usize), |bytes: &[u8]| {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        f64::from_bits(u64::from_le_bytes(raw))
    })(input)
}

/// Parses a WebAssembly name value.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#names>
pub fn parse_name(input: &[u8]) -> IResult<&[u8], Name> {
    map(map_res(parse_byte_vector, std::str::from_utf8), Name::from)(input)
}

/// Parses a WebAssembly byte vector.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#bytes>
pub fn parse_byte_vector(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, length) = parse_u32(input)?;
    let (input, bytes) = take(length as usize)(input)?;

    Ok((input, bytes))
}

/// Parses a WebAssembly encoded vector of items from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/conventions.html#vectors>
pub fn parse_vector<'input, O, P>(
    parser: P,
) -> impl FnMut(&'input [u8]) -> IResult<&'input [u8], Vec<O>>
where
    P: Copy + Parser<&'input [u8], O, Error<&'input [u8]>>,
{
    move |input| {
        let (input, length) = parse_u32(input)?;

        count(parser, length as usize)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u32_stops_at_terminator() {
        let input = vec![0xE5, 0x8E, 0x26, 0xFF];
        let (remaining, actual) = parse_u32(input.as_slice()).unwrap();

        assert_eq!(actual, 624485);
        assert_eq!(remaining, &[0xFF]);
    }

    #[test]
    fn parse_u32_rejects_over_wide_encoding() {
        let input = vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x00];

        assert!(parse_u32(input.as_slice()).is_err());
    }

    #[test]
    fn parse_s32_negative() {
        let input = vec![0x7F];
        let (_, actual) = parse_s32(input.as_slice()).unwrap();

        assert_eq!(actual, -1);
    }

    #[test]
    fn parse_f32_preserves_nan_payload() {
        let bits: u32 = 0x7FC0_0001;
        let input = bits.to_le_bytes();

        let (_, actual) = parse_f32(&input).unwrap();

        assert_eq!(actual.to_bits(), bits);
    }

    #[test]
    fn parse_name_with_remaining() {
        let name = "Hello, World!";
        let extra = 42;
        let mut input = Vec::from(name);
        input.insert(0, name.len() as u8);
        input.push(extra);

        let (remaining, parsed_name) = parse_name(input.as_slice()).unwrap();

        assert_eq!(parsed_name, Name::from(name));
        assert_eq!(remaining, &[extra]);
    }

    #[test]
    fn parse_vector_of_integers() {
        let input = vec![0x03, 0x01, 0x02, 0x03, 0xFF];
        let (remaining, items) = parse_vector(parse_u32)(input.as_slice()).unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(remaining, &[0xFF]);
    }
}
