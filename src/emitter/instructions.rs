use crate::emitter::errors::EmitError;
use crate::emitter::values::{emit_byte, emit_f32, emit_f64, emit_s32, emit_s64, emit_u32, emit_vector};
use crate::emitter::types::emit_block_type;
use crate::model::{
    ControlInstruction, Expression, FloatType, Instruction, IntegerType, MemoryArgument,
    MemoryInstruction, NumericInstruction, ParametricInstruction, SignExtension, ValueType,
    VariableInstruction,
};
use std::io::Write;

/// Marks the end of an expression or block.
const END: u8 = 0x0B;

/// Separates the branches of an if instruction.
const ELSE: u8 = 0x05;

/// Emit an expression to the output:
/// the instruction sequence followed by the 𝖾𝗇𝖽 marker.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#expressions>
pub fn emit_expression(expression: &Expression, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = 0;

    for instruction in expression.instructions() {
        emitted += emit_instruction(instruction, output)?;
    }

    emitted += emit_byte(END, output)?;

    Ok(emitted)
}

/// Emit an instruction to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html>
pub fn emit_instruction(
    instruction: &Instruction,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    match instruction {
        Instruction::Numeric(instruction) => emit_numeric_instruction(instruction, output),
        Instruction::Parametric(instruction) => emit_parametric_instruction(instruction, output),
        Instruction::Variable(instruction) => emit_variable_instruction(instruction, output),
        Instruction::Memory(instruction) => emit_memory_instruction(instruction, output),
        Instruction::Control(instruction) => emit_control_instruction(instruction, output),
    }
}

/// Selects the opcode for an operator declared for both integer widths.
fn integer_opcode(kind: IntegerType, i32_opcode: u8, i64_opcode: u8) -> u8 {
    match kind {
        IntegerType::I32 => i32_opcode,
        IntegerType::I64 => i64_opcode,
    }
}

/// Selects the opcode for an operator declared for both float widths.
fn float_opcode(kind: FloatType, f32_opcode: u8, f64_opcode: u8) -> u8 {
    match kind {
        FloatType::F32 => f32_opcode,
        FloatType::F64 => f64_opcode,
    }
}

/// Selects the opcode for an operator declared for every value type.
fn value_opcode(kind: ValueType, opcodes: [u8; 4]) -> u8 {
    match kind {
        ValueType::I32 => opcodes[0],
        ValueType::I64 => opcodes[1],
        ValueType::F32 => opcodes[2],
        ValueType::F64 => opcodes[3],
    }
}

/// Selects the opcode for an operator with a signedness annotation.
fn signed_opcode(extension: SignExtension, signed: u8, unsigned: u8) -> u8 {
    match extension {
        SignExtension::Signed => signed,
        SignExtension::Unsigned => unsigned,
    }
}

/// Emit a numeric instruction to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#numeric-instructions>
pub fn emit_numeric_instruction(
    instruction: &NumericInstruction,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    use NumericInstruction::*;

    match instruction {
        I32Constant(value) => {
            let mut emitted = emit_byte(0x41, output)?;
            emitted += emit_s32(*value, output)?;
            Ok(emitted)
        }
        I64Constant(value) => {
            let mut emitted = emit_byte(0x42, output)?;
            emitted += emit_s64(*value, output)?;
            Ok(emitted)
        }
        F32Constant(value) => {
            let mut emitted = emit_byte(0x43, output)?;
            emitted += emit_f32(*value, output)?;
            Ok(emitted)
        }
        F64Constant(value) => {
            let mut emitted = emit_byte(0x44, output)?;
            emitted += emit_f64(*value, output)?;
            Ok(emitted)
        }
        CountLeadingZeros(kind) => emit_byte(integer_opcode(*kind, 0x67, 0x79), output),
        CountTrailingZeros(kind) => emit_byte(integer_opcode(*kind, 0x68, 0x7A), output),
        CountOnes(kind) => emit_byte(integer_opcode(*kind, 0x69, 0x7B), output),
        AbsoluteValue(kind) => emit_byte(float_opcode(*kind, 0x8B, 0x99), output),
        Negate(kind) => emit_byte(float_opcode(*kind, 0x8C, 0x9A), output),
        SquareRoot(kind) => emit_byte(float_opcode(*kind, 0x91, 0x9F), output),
        Ceiling(kind) => emit_byte(float_opcode(*kind, 0x8D, 0x9B), output),
        Floor(kind) => emit_byte(float_opcode(*kind, 0x8E, 0x9C), output),
        Truncate(kind) => emit_byte(float_opcode(*kind, 0x8F, 0x9D), output),
        Nearest(kind) => emit_byte(float_opcode(*kind, 0x90, 0x9E), output),
        Add(kind) => emit_byte(value_opcode(*kind, [0x6A, 0x7C, 0x92, 0xA0]), output),
        Subtract(kind) => emit_byte(value_opcode(*kind, [0x6B, 0x7D, 0x93, 0xA1]), output),
        Multiply(kind) => emit_byte(value_opcode(*kind, [0x6C, 0x7E, 0x94, 0xA2]), output),
        DivideInteger(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x6D, 0x6E),
                signed_opcode(*extension, 0x7F, 0x80),
            ),
            output,
        ),
        DivideFloat(kind) => emit_byte(float_opcode(*kind, 0x95, 0xA3), output),
        Remainder(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x6F, 0x70),
                signed_opcode(*extension, 0x81, 0x82),
            ),
            output,
        ),
        And(kind) => emit_byte(integer_opcode(*kind, 0x71, 0x83), output),
        Or(kind) => emit_byte(integer_opcode(*kind, 0x72, 0x84), output),
        Xor(kind) => emit_byte(integer_opcode(*kind, 0x73, 0x85), output),
        ShiftLeft(kind) => emit_byte(integer_opcode(*kind, 0x74, 0x86), output),
        ShiftRight(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x75, 0x76),
                signed_opcode(*extension, 0x87, 0x88),
            ),
            output,
        ),
        RotateLeft(kind) => emit_byte(integer_opcode(*kind, 0x77, 0x89), output),
        RotateRight(kind) => emit_byte(integer_opcode(*kind, 0x78, 0x8A), output),
        Minimum(kind) => emit_byte(float_opcode(*kind, 0x96, 0xA4), output),
        Maximum(kind) => emit_byte(float_opcode(*kind, 0x97, 0xA5), output),
        CopySign(kind) => emit_byte(float_opcode(*kind, 0x98, 0xA6), output),
        EqualToZero(kind) => emit_byte(integer_opcode(*kind, 0x45, 0x50), output),
        Equal(kind) => emit_byte(value_opcode(*kind, [0x46, 0x51, 0x5B, 0x61]), output),
        NotEqual(kind) => emit_byte(value_opcode(*kind, [0x47, 0x52, 0x5C, 0x62]), output),
        LessThanInteger(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x48, 0x49),
                signed_opcode(*extension, 0x53, 0x54),
            ),
            output,
        ),
        LessThanFloat(kind) => emit_byte(float_opcode(*kind, 0x5D, 0x63), output),
        GreaterThanInteger(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x4A, 0x4B),
                signed_opcode(*extension, 0x55, 0x56),
            ),
            output,
        ),
        GreaterThanFloat(kind) => emit_byte(float_opcode(*kind, 0x5E, 0x64), output),
        LessThanOrEqualToInteger(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x4C, 0x4D),
                signed_opcode(*extension, 0x57, 0x58),
            ),
            output,
        ),
        LessThanOrEqualToFloat(kind) => emit_byte(float_opcode(*kind, 0x5F, 0x65), output),
        GreaterThanOrEqualToInteger(kind, extension) => emit_byte(
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x4E, 0x4F),
                signed_opcode(*extension, 0x59, 0x5A),
            ),
            output,
        ),
        GreaterThanOrEqualToFloat(kind) => emit_byte(float_opcode(*kind, 0x60, 0x66), output),
        Wrap => emit_byte(0xA7, output),
        Extend(extension) => emit_byte(signed_opcode(*extension, 0xAC, 0xAD), output),
        ConvertAndTruncate(kind, float, extension) => emit_byte(
            match (kind, float) {
                (IntegerType::I32, FloatType::F32) => signed_opcode(*extension, 0xA8, 0xA9),
                (IntegerType::I32, FloatType::F64) => signed_opcode(*extension, 0xAA, 0xAB),
                (IntegerType::I64, FloatType::F32) => signed_opcode(*extension, 0xAE, 0xAF),
                (IntegerType::I64, FloatType::F64) => signed_opcode(*extension, 0xB0, 0xB1),
            },
            output,
        ),
        Demote => emit_byte(0xB6, output),
        Promote => emit_byte(0xBB, output),
        Convert(kind, integer, extension) => emit_byte(
            match (kind, integer) {
                (FloatType::F32, IntegerType::I32) => signed_opcode(*extension, 0xB2, 0xB3),
                (FloatType::F32, IntegerType::I64) => signed_opcode(*extension, 0xB4, 0xB5),
                (FloatType::F64, IntegerType::I32) => signed_opcode(*extension, 0xB7, 0xB8),
                (FloatType::F64, IntegerType::I64) => signed_opcode(*extension, 0xB9, 0xBA),
            },
            output,
        ),
        ReinterpretFloat(kind) => emit_byte(integer_opcode(*kind, 0xBC, 0xBD), output),
        ReinterpretInteger(kind) => emit_byte(float_opcode(*kind, 0xBE, 0xBF), output),
    }
}

/// Emit a parametric instruction to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#parametric-instructions>
pub fn emit_parametric_instruction(
    instruction: &ParametricInstruction,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    match instruction {
        ParametricInstruction::Drop => emit_byte(0x1A, output),
        ParametricInstruction::Select => emit_byte(0x1B, output),
    }
}

/// Emit a variable instruction to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#variable-instructions>
pub fn emit_variable_instruction(
    instruction: &VariableInstruction,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    let (opcode, index) = match instruction {
        VariableInstruction::LocalGet(index) => (0x20, index),
        VariableInstruction::LocalSet(index) => (0x21, index),
        VariableInstruction::LocalTee(index) => (0x22, index),
        VariableInstruction::GlobalGet(index) => (0x23, index),
        VariableInstruction::GlobalSet(index) => (0x24, index),
    };

    let mut emitted = emit_byte(opcode, output)?;
    emitted += emit_u32(*index, output)?;

    Ok(emitted)
}

/// Emit a memory instruction to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#memory-instructions>
pub fn emit_memory_instruction(
    instruction: &MemoryInstruction,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    use MemoryInstruction::*;

    let (opcode, argument) = match instruction {
        Load(kind, argument) => (value_opcode(*kind, [0x28, 0x29, 0x2A, 0x2B]), argument),
        Store(kind, argument) => (value_opcode(*kind, [0x36, 0x37, 0x38, 0x39]), argument),
        Load8(kind, extension, argument) => (
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x2C, 0x2D),
                signed_opcode(*extension, 0x30, 0x31),
            ),
            argument,
        ),
        Load16(kind, extension, argument) => (
            integer_opcode(
                *kind,
                signed_opcode(*extension, 0x2E, 0x2F),
                signed_opcode(*extension, 0x32, 0x33),
            ),
            argument,
        ),
        Load32(extension, argument) => (signed_opcode(*extension, 0x34, 0x35), argument),
        Store8(kind, argument) => (integer_opcode(*kind, 0x3A, 0x3C), argument),
        Store16(kind, argument) => (integer_opcode(*kind, 0x3B, 0x3D), argument),
        Store32(argument) => (0x3E, argument),
        // memory.size and memory.grow carry a reserved zero byte.
        Size => {
            let mut emitted = emit_byte(0x3F, output)?;
            emitted += emit_byte(0x00, output)?;
            return Ok(emitted);
        }
        Grow => {
            let mut emitted = emit_byte(0x40, output)?;
            emitted += emit_byte(0x00, output)?;
            return Ok(emitted);
        }
    };

    let mut emitted = emit_byte(opcode, output)?;
    emitted += emit_memory_argument(argument, output)?;

    Ok(emitted)
}

/// Emit a memory argument to the output.
fn emit_memory_argument(
    argument: &MemoryArgument,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    let mut emitted = emit_u32(argument.align(), output)?;

    emitted += emit_u32(argument.offset(), output)?;

    Ok(emitted)
}

/// Emit a control instruction to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#control-instructions>
pub fn emit_control_instruction(
    instruction: &ControlInstruction,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    use ControlInstruction::*;

    match instruction {
        Unreachable => emit_byte(0x00, output),
        Nop => emit_byte(0x01, output),
        Block(kind, expression) => {
            let mut emitted = emit_byte(0x02, output)?;
            emitted += emit_block_type(kind, output)?;
            emitted += emit_expression(expression, output)?;
            Ok(emitted)
        }
        Loop(kind, expression) => {
            let mut emitted = emit_byte(0x03, output)?;
            emitted += emit_block_type(kind, output)?;
            emitted += emit_expression(expression, output)?;
            Ok(emitted)
        }
        If(kind, positive, negative) => {
            let mut emitted = emit_byte(0x04, output)?;
            emitted += emit_block_type(kind, output)?;

            for instruction in positive.instructions() {
                emitted += emit_instruction(instruction, output)?;
            }

            if let Some(negative) = negative {
                emitted += emit_byte(ELSE, output)?;

                for instruction in negative.instructions() {
                    emitted += emit_instruction(instruction, output)?;
                }
            }

            emitted += emit_byte(END, output)?;
            Ok(emitted)
        }
        Branch(label) => {
            let mut emitted = emit_byte(0x0C, output)?;
            emitted += emit_u32(*label, output)?;
            Ok(emitted)
        }
        BranchIf(label) => {
            let mut emitted = emit_byte(0x0D, output)?;
            emitted += emit_u32(*label, output)?;
            Ok(emitted)
        }
        BranchTable(targets, default) => {
            let mut emitted = emit_byte(0x0E, output)?;
            emitted += emit_vector(targets, output, |label, o| emit_u32(*label, o))?;
            emitted += emit_u32(*default, output)?;
            Ok(emitted)
        }
        Return => emit_byte(0x0F, output),
        Call(function) => {
            let mut emitted = emit_byte(0x10, output)?;
            emitted += emit_u32(*function, output)?;
            Ok(emitted)
        }
        CallIndirect(kind) => {
            let mut emitted = emit_byte(0x11, output)?;
            emitted += emit_u32(*kind, output)?;
            emitted += emit_byte(0x00, output)?;
            Ok(emitted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockType;
    use crate::parser::parse_binary;

    fn emitted(instruction: Instruction) -> Vec<u8> {
        let mut output = Vec::new();
        emit_instruction(&instruction, &mut output).unwrap();
        output
    }

    #[test]
    fn constants() {
        assert_eq!(emitted(42i32.into()), vec![0x41, 0x2A]);
        assert_eq!(emitted((-1i64).into()), vec![0x42, 0x7F]);
        assert_eq!(emitted(1.0f32.into()), vec![0x43, 0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn integer_operators_select_the_width() {
        assert_eq!(
            emitted(NumericInstruction::Add(ValueType::I32).into()),
            vec![0x6A]
        );
        assert_eq!(
            emitted(NumericInstruction::Add(ValueType::I64).into()),
            vec![0x7C]
        );
        assert_eq!(
            emitted(NumericInstruction::DivideInteger(IntegerType::I32, SignExtension::Signed).into()),
            vec![0x6D]
        );
        assert_eq!(
            emitted(
                NumericInstruction::DivideInteger(IntegerType::I64, SignExtension::Unsigned).into()
            ),
            vec![0x80]
        );
    }

    #[test]
    fn memory_operators_carry_their_argument() {
        assert_eq!(
            emitted(MemoryInstruction::Load(ValueType::I32, MemoryArgument::new(2, 8)).into()),
            vec![0x28, 0x02, 0x08]
        );
        assert_eq!(emitted(MemoryInstruction::Size.into()), vec![0x3F, 0x00]);
        assert_eq!(emitted(MemoryInstruction::Grow.into()), vec![0x40, 0x00]);
    }

    #[test]
    fn structured_instructions_nest() {
        let block = ControlInstruction::Block(
            BlockType::Value(ValueType::I32),
            Expression::new(vec![1i32.into()]),
        );

        assert_eq!(emitted(block.into()), vec![0x02, 0x7F, 0x41, 0x01, 0x0B]);
    }

    #[test]
    fn if_with_else_uses_the_separator() {
        let conditional = ControlInstruction::If(
            BlockType::Empty,
            Expression::new(vec![ControlInstruction::Nop.into()]),
            Some(Expression::new(vec![ControlInstruction::Unreachable.into()])),
        );

        assert_eq!(
            emitted(conditional.into()),
            vec![0x04, 0x40, 0x01, 0x05, 0x00, 0x0B]
        );
    }

    #[test]
    fn call_indirect_emits_reserved_byte() {
        assert_eq!(
            emitted(ControlInstruction::CallIndirect(3).into()),
            vec![0x11, 0x03, 0x00]
        );
    }

    #[test]
    fn expressions_round_trip_through_the_parser() {
        let expression = Expression::new(vec![
            VariableInstruction::LocalGet(0).into(),
            ControlInstruction::If(
                BlockType::Value(ValueType::I32),
                Expression::new(vec![1i32.into()]),
                Some(Expression::new(vec![2i32.into()])),
            )
            .into(),
        ]);

        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");

        let mut body = Vec::new();
        emit_byte(0x00, &mut body).unwrap();
        emit_expression(&expression, &mut body).unwrap();

        let mut code = Vec::new();
        emit_byte(0x01, &mut code).unwrap();
        crate::emitter::values::emit_usize(body.len(), &mut code).unwrap();
        code.extend(body);

        bytes.extend([0x01, 0x05, 0x01, 0x60, 0x00, 0x01, 0x7F]);
        bytes.extend([0x03, 0x02, 0x01, 0x00]);
        bytes.push(0x0A);
        crate::emitter::values::emit_usize(code.len(), &mut bytes).unwrap();
        bytes.extend(code);

        let module = parse_binary(bytes.as_slice()).unwrap();

        assert_eq!(module.functions().unwrap()[0].body(), &expression);
    }
}
