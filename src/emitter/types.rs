use crate::emitter::errors::EmitError;
use crate::emitter::values::{emit_byte, emit_u32, emit_vector};
use crate::model::{
    BlockType, ElementKind, FunctionType, GlobalType, Limit, MemoryType, Mutability, TableType,
    ValueType,
};
use std::io::Write;

/// Emit a value type to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#value-types>
pub fn emit_value_type(kind: &ValueType, output: &mut dyn Write) -> Result<usize, EmitError> {
    let byte = match kind {
        ValueType::I32 => 0x7F,
        ValueType::I64 => 0x7E,
        ValueType::F32 => 0x7D,
        ValueType::F64 => 0x7C,
    };

    emit_byte(byte, output)
}

/// Emit a table element kind to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#reference-types>
pub fn emit_element_kind(kind: &ElementKind, output: &mut dyn Write) -> Result<usize, EmitError> {
    match kind {
        ElementKind::FunctionReference => emit_byte(0x70, output),
    }
}

/// Emit a limit to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#limits>
pub fn emit_limit(limit: &Limit, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = 0;

    match limit.maximum() {
        None => {
            emitted += emit_byte(0x00, output)?;
            emitted += emit_u32(limit.initial(), output)?;
        }
        Some(maximum) => {
            emitted += emit_byte(0x01, output)?;
            emitted += emit_u32(limit.initial(), output)?;
            emitted += emit_u32(maximum, output)?;
        }
    }

    Ok(emitted)
}

/// Emit a memory type to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#memory-types>
pub fn emit_memory_type(kind: &MemoryType, output: &mut dyn Write) -> Result<usize, EmitError> {
    emit_limit(kind.limits(), output)
}

/// Emit a table type to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#table-types>
pub fn emit_table_type(kind: &TableType, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_element_kind(&kind.kind(), output)?;

    emitted += emit_limit(kind.limits(), output)?;

    Ok(emitted)
}

/// Emit a global type to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#global-types>
pub fn emit_global_type(kind: &GlobalType, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_value_type(&kind.kind(), output)?;

    emitted += match kind.mutability() {
        Mutability::Immutable => emit_byte(0x00, output)?,
        Mutability::Mutable => emit_byte(0x01, output)?,
    };

    Ok(emitted)
}

/// Emit a function type to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/types.html#function-types>
pub fn emit_function_type(kind: &FunctionType, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_byte(0x60, output)?;

    emitted += emit_vector(kind.parameters().kinds(), output, emit_value_type)?;
    emitted += emit_vector(kind.results().kinds(), output, emit_value_type)?;

    Ok(emitted)
}

/// Emit a block type to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#control-instructions>
pub fn emit_block_type(kind: &BlockType, output: &mut dyn Write) -> Result<usize, EmitError> {
    match kind {
        BlockType::Empty => emit_byte(0x40, output),
        BlockType::Value(kind) => emit_value_type(kind, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_binary;

    #[test]
    fn limits_encode_by_presence_of_maximum() {
        let mut unbounded = Vec::new();
        emit_limit(&Limit::unbounded(1), &mut unbounded).unwrap();
        assert_eq!(unbounded, vec![0x00, 0x01]);

        let mut bounded = Vec::new();
        emit_limit(&Limit::bounded(1, 2), &mut bounded).unwrap();
        assert_eq!(bounded, vec![0x01, 0x01, 0x02]);
    }

    #[test]
    fn function_type_encodes() {
        let mut output = Vec::new();
        let kind = FunctionType::new(
            vec![ValueType::I32, ValueType::I32].into(),
            vec![ValueType::I32].into(),
        );

        emit_function_type(&kind, &mut output).unwrap();

        assert_eq!(output, vec![0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F]);
    }

    #[test]
    fn value_type_bytes() {
        let expected = [
            (ValueType::I32, 0x7Fu8),
            (ValueType::I64, 0x7E),
            (ValueType::F32, 0x7D),
            (ValueType::F64, 0x7C),
        ];

        for (kind, byte) in expected {
            let mut output = Vec::new();
            emit_value_type(&kind, &mut output).unwrap();

            assert_eq!(output, vec![byte]);
        }
    }

    #[test]
    fn empty_module_binary_form() {
        let module = parse_binary(b"\x00\x61\x73\x6D\x01\x00\x00\x00").unwrap();

        assert_eq!(module, crate::Module::empty());
    }
}
