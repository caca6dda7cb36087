use crate::isa::{self, Constructor};
use crate::parser::types::parse_block_type;
use crate::parser::values::{
    match_byte, parse_f32, parse_f64, parse_s32, parse_s64, parse_u32, parse_vector,
};
use crate::{ControlInstruction, Expression, Instruction, MemoryArgument, MemoryInstruction};
use nom::combinator::map;
use nom::error::{Error, ErrorKind};
use nom::sequence::tuple;
use nom::IResult;

/// Marks the end of an expression or block.
const END: u8 = 0x0B;

/// Separates the branches of an if instruction.
const ELSE: u8 = 0x05;

/// Parses a WebAssembly expression from the input:
/// a sequence of instructions terminated by an 𝖾𝗇𝖽 marker.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#expressions>
pub fn parse_expression(input: &[u8]) -> IResult<&[u8], Expression> {
    let (input, (instructions, _)) = parse_sequence(input, &[END])?;

    Ok((input, Expression::new(instructions)))
}

/// Parses instructions until one of the terminal opcodes is found.
/// Returns the instructions and the terminal that ended the sequence.
fn parse_sequence<'input>(
    mut input: &'input [u8],
    terminals: &[u8],
) -> IResult<&'input [u8], (Vec<Instruction>, u8)> {
    let mut instructions = Vec::new();

    loop {
        match input.first() {
            None => return Err(nom::Err::Error(Error::new(input, ErrorKind::Eof))),
            Some(byte) if terminals.contains(byte) => {
                return Ok((&input[1..], (instructions, *byte)));
            }
            Some(_) => {
                let (remaining, instruction) = parse_instruction(input)?;

                instructions.push(instruction);
                input = remaining;
            }
        }
    }
}

/// Parses a WebAssembly instruction from the input.
/// Structured instructions (block, loop, if) bracket nested sequences;
/// all others dispatch through the operator catalog.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html>
pub fn parse_instruction(input: &[u8]) -> IResult<&[u8], Instruction> {
    let (&opcode, rest) = match input.split_first() {
        Some((opcode, rest)) => (opcode, rest),
        None => return Err(nom::Err::Error(Error::new(input, ErrorKind::Eof))),
    };

    match opcode {
        // block blocktype instr* end
        0x02 => {
            let (rest, kind) = parse_block_type(rest)?;
            let (rest, (instructions, _)) = parse_sequence(rest, &[END])?;

            Ok((
                rest,
                ControlInstruction::Block(kind, Expression::new(instructions)).into(),
            ))
        }
        // loop blocktype instr* end
        0x03 => {
            let (rest, kind) = parse_block_type(rest)?;
            let (rest, (instructions, _)) = parse_sequence(rest, &[END])?;

            Ok((
                rest,
                ControlInstruction::Loop(kind, Expression::new(instructions)).into(),
            ))
        }
        // if blocktype instr* (else instr*)? end
        0x04 => {
            let (rest, kind) = parse_block_type(rest)?;
            let (rest, (positive, terminal)) = parse_sequence(rest, &[END, ELSE])?;

            let (rest, negative) = if terminal == ELSE {
                let (rest, (negative, _)) = parse_sequence(rest, &[END])?;

                (rest, Some(Expression::new(negative)))
            } else {
                (rest, None)
            };

            Ok((
                rest,
                ControlInstruction::If(kind, Expression::new(positive), negative).into(),
            ))
        }
        // br_table label* default
        0x0E => map(
            tuple((parse_vector(parse_u32), parse_u32)),
            |(targets, default)| ControlInstruction::BranchTable(targets, default).into(),
        )(rest),
        // call_indirect typeidx reserved
        0x11 => {
            let (rest, kind) = parse_u32(rest)?;
            let (rest, _) = match_byte(0x00)(rest)?;

            Ok((rest, ControlInstruction::CallIndirect(kind).into()))
        }
        // memory.size and memory.grow carry a reserved zero byte.
        0x3F => map(match_byte(0x00), |_| MemoryInstruction::Size.into())(rest),
        0x40 => map(match_byte(0x00), |_| MemoryInstruction::Grow.into())(rest),
        _ => match isa::by_opcode(opcode).map(|operator| operator.constructor) {
            Some(Constructor::Fixed(build)) => Ok((rest, build())),
            Some(Constructor::Index(build)) => map(parse_u32, build)(rest),
            Some(Constructor::I32(build)) => map(parse_s32, build)(rest),
            Some(Constructor::I64(build)) => map(parse_s64, build)(rest),
            Some(Constructor::F32(build)) => map(parse_f32, build)(rest),
            Some(Constructor::F64(build)) => map(parse_f64, build)(rest),
            Some(Constructor::Memory(build)) => map(parse_memory_argument, build)(rest),
            // Unknown opcodes, including the reserved 0xFC extended table.
            _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Tag))),
        },
    }
}

/// Parses a memory argument: an alignment exponent and an address offset.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#memory-instructions>
fn parse_memory_argument(input: &[u8]) -> IResult<&[u8], MemoryArgument> {
    map(tuple((parse_u32, parse_u32)), |(align, offset)| {
        MemoryArgument::new(align, offset)
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BlockType, IntegerType, NumericInstruction, SignExtension, ValueType, VariableInstruction,
    };

    #[test]
    fn parse_empty_expression() {
        let (remaining, expression) = parse_expression(&[0x0B]).unwrap();

        assert!(remaining.is_empty());
        assert_eq!(expression, Expression::empty());
    }

    #[test]
    fn parse_add_body() {
        let input = [0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B];
        let (_, expression) = parse_expression(&input).unwrap();

        assert_eq!(
            expression,
            Expression::new(vec![
                VariableInstruction::LocalGet(0).into(),
                VariableInstruction::LocalGet(1).into(),
                NumericInstruction::Add(ValueType::I32).into(),
            ])
        );
    }

    #[test]
    fn parse_constants() {
        let input = [0x41, 0x2A, 0x0B];
        let (_, expression) = parse_expression(&input).unwrap();

        assert_eq!(expression, Expression::new(vec![42i32.into()]));
    }

    #[test]
    fn parse_nested_block() {
        let input = [0x02, 0x7F, 0x41, 0x01, 0x0B, 0x0B];
        let (_, expression) = parse_expression(&input).unwrap();

        assert_eq!(
            expression,
            Expression::new(vec![ControlInstruction::Block(
                BlockType::Value(ValueType::I32),
                Expression::new(vec![1i32.into()]),
            )
            .into()])
        );
    }

    #[test]
    fn parse_if_with_else() {
        let input = [0x04, 0x40, 0x01, 0x05, 0x00, 0x0B, 0x0B];
        let (_, expression) = parse_expression(&input).unwrap();

        assert_eq!(
            expression,
            Expression::new(vec![ControlInstruction::If(
                BlockType::Empty,
                Expression::new(vec![ControlInstruction::Nop.into()]),
                Some(Expression::new(vec![ControlInstruction::Unreachable.into()])),
            )
            .into()])
        );
    }

    #[test]
    fn parse_branch_table() {
        let input = [0x0E, 0x02, 0x00, 0x01, 0x02, 0x0B];
        let (_, expression) = parse_expression(&input).unwrap();

        assert_eq!(
            expression,
            Expression::new(vec![
                ControlInstruction::BranchTable(vec![0, 1], 2).into()
            ])
        );
    }

    #[test]
    fn parse_call_indirect_requires_reserved_zero() {
        assert!(parse_expression(&[0x11, 0x00, 0x00, 0x0B]).is_ok());
        assert!(parse_expression(&[0x11, 0x00, 0x01, 0x0B]).is_err());
    }

    #[test]
    fn parse_conversion_operator() {
        let input = [0xA8, 0x0B];
        let (_, expression) = parse_expression(&input).unwrap();

        assert_eq!(
            expression,
            Expression::new(vec![NumericInstruction::ConvertAndTruncate(
                IntegerType::I32,
                crate::FloatType::F32,
                SignExtension::Signed,
            )
            .into()])
        );
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(parse_expression(&[0xFC, 0x00, 0x0B]).is_err());
        assert!(parse_expression(&[0xD0, 0x0B]).is_err());
    }

    #[test]
    fn unterminated_expression_is_rejected() {
        assert!(parse_expression(&[0x41, 0x00]).is_err());
    }
}
