use crate::emitter::errors::EmitError;
use crate::leb128;
use crate::model::Name;
use std::io::Write;

/// Emit a single byte to the output.
pub fn emit_byte(byte: u8, output: &mut dyn Write) -> Result<usize, EmitError> {
    output.write_all(&[byte])?;

    Ok(1)
}

/// Emit an unsigned 32-bit integer in LEB128 encoding to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn emit_u32(value: u32, output: &mut dyn Write) -> Result<usize, EmitError> {
    Ok(leb128::encode_unsigned(value as u64, output)?)
}

/// Emit a usize as an unsigned 32-bit integer in LEB128 encoding to the output.
pub fn emit_usize(value: usize, output: &mut dyn Write) -> Result<usize, EmitError> {
    emit_u32(value as u32, output)
}

/// Emit a signed 32-bit integer in LEB128 encoding to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn emit_s32(value: i32, output: &mut dyn Write) -> Result<usize, EmitError> {
    Ok(leb128::encode_signed(value as i64, output)?)
}

/// Emit a signed 64-bit integer in LEB128 encoding to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#integers>
pub fn emit_s64(value: i64, output: &mut dyn Write) -> Result<usize, EmitError> {
    Ok(leb128::encode_signed(value, output)?)
}

/// Emit a 32-bit float as its little-endian IEEE-754 bits to the output.
/// NaN payloads pass through bit-for-bit.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#floating-point>
pub fn emit_f32(value: f32, output: &mut dyn Write) -> Result<usize, EmitError> {
    let bytes = value.to_bits().to_le_bytes();

    output.write_all(&bytes)?;

    Ok(bytes.len())
}

/// Emit a 64-bit float as its little-endian IEEE-754 bits to the output.
/// NaN payloads pass through bit-for-bit.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#floating-point>
pub fn emit_f64(value: f64, output: &mut dyn Write) -> Result<usize, EmitError> {
    let bytes = value.to_bits().to_le_bytes();

    output.write_all(&bytes)?;

    Ok(bytes.len())
}

/// Emit raw bytes, with no length prefix, to the output.
pub fn emit_bytes(bytes: &[u8], output: &mut dyn Write) -> Result<usize, EmitError> {
    output.write_all(bytes)?;

    Ok(bytes.len())
}

/// Emit a length-prefixed byte vector to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#bytes>
pub fn emit_byte_vector(bytes: &[u8], output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_usize(bytes.len(), output)?;

    emitted += emit_bytes(bytes, output)?;

    Ok(emitted)
}

/// Emit a name as a length-prefixed UTF-8 byte vector to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/values.html#names>
pub fn emit_name(name: &Name, output: &mut dyn Write) -> Result<usize, EmitError> {
    emit_byte_vector(name.as_bytes(), output)
}

/// Emit a length-prefixed vector of items to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/conventions.html#vectors>
pub fn emit_vector<T>(
    items: &[T],
    output: &mut dyn Write,
    emit: impl Fn(&T, &mut dyn Write) -> Result<usize, EmitError>,
) -> Result<usize, EmitError> {
    let mut emitted = emit_usize(items.len(), output)?;

    for item in items {
        emitted += emit(item, output)?;
    }

    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_u32_minimal_form() {
        let mut output = Vec::new();
        let emitted = emit_u32(624485, &mut output).unwrap();

        assert_eq!(emitted, 3);
        assert_eq!(output, vec![0xE5, 0x8E, 0x26]);
    }

    #[test]
    fn emit_f32_preserves_nan_payload() {
        let mut output = Vec::new();
        emit_f32(f32::from_bits(0x7FC0_0001), &mut output).unwrap();

        assert_eq!(output, 0x7FC0_0001u32.to_le_bytes());
    }

    #[test]
    fn emit_name_length_prefixed() {
        let mut output = Vec::new();
        let emitted = emit_name(&"add".into(), &mut output).unwrap();

        assert_eq!(emitted, 4);
        assert_eq!(output, b"\x03add");
    }

    #[test]
    fn emit_vector_counts_items() {
        let mut output = Vec::new();
        let items = [1u32, 2, 3];
        let emitted = emit_vector(&items, &mut output, |item, o| emit_u32(*item, o)).unwrap();

        assert_eq!(emitted, 4);
        assert_eq!(output, vec![0x03, 0x01, 0x02, 0x03]);
    }
}
