//! Emit WebAssembly binary format.

mod errors;
mod instructions;
mod sections;
mod types;
mod values;

use crate::model::Module;
pub use errors::EmitError;
use sections::emit_module;
use std::io::Write;

/// Emits a binary representation of a WebAssembly module to a `Write` output.
/// The emitted encoding is canonical:
/// shortest-form LEB128 integers and sections in id order.
/// Reading a canonical binary and emitting the resulting module reproduces
/// the input byte-for-byte.
///
/// See <https://webassembly.github.io/spec/core/binary/index.html>
///
/// # Examples
/// ## Empty
/// ```rust
/// use wasmkit::{emit_binary, Module};
///
/// let mut buffer = Vec::new();
/// emit_binary(&Module::empty(), &mut buffer).unwrap();
///
/// assert_eq!(buffer, vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00]);
/// ```
pub fn emit_binary<O: Write>(module: &Module, output: &mut O) -> Result<usize, EmitError> {
    emit_module(module, output)
}

/// Counts the number of bytes written, but does else nothing with the bytes.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub(crate) struct CountingWrite {
    bytes: usize,
}

impl CountingWrite {
    /// Create a default instance of a counting write.
    pub fn new() -> Self {
        CountingWrite { bytes: 0 }
    }

    /// The number of bytes written so far.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Write for CountingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes += buf.len();

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.bytes += buf.len();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Custom, Data, Element, ElementKind, Export, Expression, Function, FunctionType, Global,
        Import, Limit, LocalGroup, Memory, MemoryType, Module, ModuleBuilder, ModuleSection,
        Start, Table, TableType, ValueType,
    };
    use crate::parser::parse_binary;

    /// Emits the module and checks the round-trip law on the result.
    fn round_trip(module: &Module) -> Vec<u8> {
        let mut bytes = Vec::new();

        emit_binary(module, &mut bytes).unwrap();

        let parsed = parse_binary(bytes.as_slice()).unwrap();
        assert_eq!(&parsed, module);

        byte_round_trip(bytes)
    }

    /// Checks `emit(parse(bytes)) == bytes` without requiring the parsed
    /// model to record custom sections at the emitting module's insertion
    /// points (a trailing custom section reads back at the last present
    /// section, an equivalent placement).
    fn byte_round_trip(bytes: Vec<u8>) -> Vec<u8> {
        let parsed = parse_binary(bytes.as_slice()).unwrap();

        let mut reemitted = Vec::new();
        emit_binary(&parsed, &mut reemitted).unwrap();
        assert_eq!(reemitted, bytes);

        bytes
    }

    fn singular_module() -> Module {
        let mut builder = Module::builder();

        builder
            .add_function_type(FunctionType::new(
                vec![ValueType::I32, ValueType::I32].into(),
                vec![ValueType::I32].into(),
            ))
            .unwrap();
        builder
            .add_function_type(FunctionType::runnable())
            .unwrap();
        builder
            .add_import(Import::function("env".into(), "report".into(), 1))
            .unwrap();
        builder
            .add_function(Function::new(
                0,
                vec![LocalGroup::new(1, ValueType::I64)],
                Expression::new(vec![
                    crate::VariableInstruction::LocalGet(0).into(),
                    crate::VariableInstruction::LocalGet(1).into(),
                    crate::NumericInstruction::Add(ValueType::I32).into(),
                ]),
            ))
            .unwrap();
        builder
            .add_table(Table::new(TableType::new(
                ElementKind::FunctionReference,
                Limit::bounded(1, 2),
            )))
            .unwrap();
        builder
            .add_memory(Memory::new(MemoryType::new(Limit::bounded(1, 4))))
            .unwrap();
        builder
            .add_global(Global::immutable(
                ValueType::I64,
                Expression::new(vec![0i64.into()]),
            ))
            .unwrap();
        builder.add_export(Export::function("add".into(), 1));
        builder.set_start(Some(Start::new(0)));
        builder
            .add_element(Element::new(
                0,
                Expression::new(vec![0i32.into()]),
                vec![1],
            ))
            .unwrap();
        builder
            .add_data(Data::new(
                0,
                Expression::new(vec![8i32.into()]),
                b"hello".to_vec(),
            ))
            .unwrap();

        builder.build()
    }

    #[test]
    fn empty_module() {
        let bytes = round_trip(&Module::empty());

        assert_eq!(bytes, b"\x00\x61\x73\x6D\x01\x00\x00\x00");
    }

    #[test]
    fn custom_section_round_trips_in_place() {
        let mut builder = Module::builder();

        builder.add_custom_section(
            ModuleSection::Custom,
            Custom::new("version".into(), b"0.1.0".to_vec()),
        );

        let module = builder.build();
        let bytes = round_trip(&module);

        let mut expected: Vec<u8> = Vec::new();
        expected.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        expected.extend([0x00, 0x0D, 0x07]);
        expected.extend(b"version");
        expected.extend(b"0.1.0");

        assert_eq!(bytes, expected);
    }

    #[test]
    fn full_module_round_trips() {
        round_trip(&singular_module());
    }

    #[test]
    fn custom_sections_interleave_with_known_sections() {
        let mut builder = ModuleBuilder::new();

        builder
            .add_memory(Memory::new(MemoryType::new(Limit::unbounded(1))))
            .unwrap();
        builder.add_custom_section(
            ModuleSection::Memory,
            Custom::new("after-memory".into(), vec![0xAB]),
        );
        builder.add_custom_section(
            ModuleSection::Data,
            Custom::new("trailer".into(), vec![0xCD]),
        );

        let mut bytes = Vec::new();
        emit_binary(&builder.build(), &mut bytes).unwrap();

        byte_round_trip(bytes);
    }

    #[test]
    fn name_section_round_trips() {
        let mut names = crate::NameSection::empty();
        names.set_module_name(Some("m".into()));

        let mut builder = Module::builder();
        builder.set_names(&names);

        let module = builder.build();
        let mut bytes = Vec::new();
        emit_binary(&module, &mut bytes).unwrap();
        let bytes = byte_round_trip(bytes);

        let mut expected: Vec<u8> = Vec::new();
        expected.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        expected.extend([0x00, 0x09, 0x04]);
        expected.extend(b"name");
        expected.extend([0x00, 0x02, 0x01, b'm']);

        assert_eq!(bytes, expected);
        assert_eq!(
            parse_binary(bytes.as_slice())
                .unwrap()
                .names()
                .unwrap()
                .unwrap()
                .module_name()
                .map(|n| n.as_str()),
            Some("m")
        );
    }
}
