use crate::parser::values::{match_byte, parse_u32, parse_vector};
use crate::{
    BlockType, ElementKind, FunctionType, GlobalType, Limit, MemoryType, Mutability, TableType,
    ValueType,
};
use nom::branch::alt;
use nom::combinator::map;
use nom::sequence::{preceded, tuple};
use nom::IResult;

/// Parses a WebAssembly value type from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#value-types>
pub fn parse_value_type(input: &[u8]) -> IResult<&[u8], ValueType> {
    alt((
        map(match_byte(0x7F), |_| ValueType::I32),
        map(match_byte(0x7E), |_| ValueType::I64),
        map(match_byte(0x7D), |_| ValueType::F32),
        map(match_byte(0x7C), |_| ValueType::F64),
    ))(input)
}

/// Parses a table element kind from the input.
/// The MVP admits only 𝖿𝗎𝗇𝖼𝗋𝖾𝖿.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#reference-types>
pub fn parse_element_kind(input: &[u8]) -> IResult<&[u8], ElementKind> {
    map(match_byte(0x70), |_| ElementKind::FunctionReference)(input)
}

/// Parses a limit from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#limits>
pub fn parse_limit(input: &[u8]) -> IResult<&[u8], Limit> {
    alt((
        map(preceded(match_byte(0x00), parse_u32), Limit::unbounded),
        map(
            preceded(match_byte(0x01), tuple((parse_u32, parse_u32))),
            |(initial, maximum)| Limit::bounded(initial, maximum),
        ),
    ))(input)
}

/// Parses a memory type from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#memory-types>
pub fn parse_memory_type(input: &[u8]) -> IResult<&[u8], MemoryType> {
    map(parse_limit, MemoryType::new)(input)
}

/// Parses a table type from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#table-types>
pub fn parse_table_type(input: &[u8]) -> IResult<&[u8], TableType> {
    map(
        tuple((parse_element_kind, parse_limit)),
        |(kind, limits)| TableType::new(kind, limits),
    )(input)
}

/// Parses a global type from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#global-types>
pub fn parse_global_type(input: &[u8]) -> IResult<&[u8], GlobalType> {
    map(
        tuple((
            parse_value_type,
            alt((
                map(match_byte(0x00), |_| Mutability::Immutable),
                map(match_byte(0x01), |_| Mutability::Mutable),
            )),
        )),
        |(kind, mutability)| GlobalType::new(kind, mutability),
    )(input)
}

/// Parses a function type from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#function-types>
pub fn parse_function_type(input: &[u8]) -> IResult<&[u8], FunctionType> {
    map(
        preceded(
            match_byte(0x60),
            tuple((parse_vector(parse_value_type), parse_vector(parse_value_type))),
        ),
        |(parameters, results)| FunctionType::new(parameters.into(), results.into()),
    )(input)
}

/// Parses a control instruction's block type from the input.
/// The MVP admits the empty type or a single value type.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#control-instructions>
pub fn parse_block_type(input: &[u8]) -> IResult<&[u8], BlockType> {
    alt((
        map(match_byte(0x40), |_| BlockType::Empty),
        map(parse_value_type, BlockType::Value),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_types_decode() {
        assert_eq!(parse_value_type(&[0x7F]).unwrap().1, ValueType::I32);
        assert_eq!(parse_value_type(&[0x7E]).unwrap().1, ValueType::I64);
        assert_eq!(parse_value_type(&[0x7D]).unwrap().1, ValueType::F32);
        assert_eq!(parse_value_type(&[0x7C]).unwrap().1, ValueType::F64);
        assert!(parse_value_type(&[0x70]).is_err());
    }

    #[test]
    fn limits_decode() {
        assert_eq!(parse_limit(&[0x00, 0x01]).unwrap().1, Limit::unbounded(1));
        assert_eq!(
            parse_limit(&[0x01, 0x01, 0x02]).unwrap().1,
            Limit::bounded(1, 2)
        );
    }

    #[test]
    fn function_type_decodes() {
        let input = [0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F];
        let (_, actual) = parse_function_type(&input).unwrap();

        assert_eq!(
            actual,
            FunctionType::new(
                vec![ValueType::I32, ValueType::I32].into(),
                vec![ValueType::I32].into(),
            )
        );
    }

    #[test]
    fn block_type_decodes() {
        assert_eq!(parse_block_type(&[0x40]).unwrap().1, BlockType::Empty);
        assert_eq!(
            parse_block_type(&[0x7D]).unwrap().1,
            BlockType::Value(ValueType::F32)
        );
    }
}
