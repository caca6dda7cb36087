//! Parser of the WebAssembly binary format.

mod errors;
mod instructions;
mod sections;
mod types;
mod values;

use crate::parser::sections::{
    parse_code, parse_custom, parse_data, parse_element, parse_export, parse_function_section,
    parse_global, parse_import, parse_memory, parse_start, parse_table, parse_type_section,
};
use crate::parser::values::{parse_byte_vector, parse_u7};
use crate::{Expression, Function, LocalGroup, Module, ModuleBuilder, ModuleSection, TypeIndex};
pub use errors::ParseError;
use nom::bytes::complete::tag;
use nom::combinator::all_consuming;
use nom::sequence::tuple;
use nom::Parser;

/// A magic constant used to quickly identify WebAssembly binary file contents.
const PREAMBLE: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// The version of the binary WebAssembly format.
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Parses the given bytes into a WebAssembly module.
/// The bytes are parsed using the WebAssembly binary format:
/// a preamble followed by a stream of sections.
/// Known sections must appear in strictly increasing id order;
/// custom sections may appear anywhere and retain their position.
/// Each section's declared payload length is authoritative:
/// a payload that decodes short or long is malformed.
///
/// Also, the function and code sections must have matching lengths.
///
/// See <https://webassembly.github.io/spec/core/binary/index.html>
///
/// # Examples
/// ## Empty
/// ```rust
/// use wasmkit::parse_binary;
///
/// let module = parse_binary(b"\x00\x61\x73\x6D\x01\x00\x00\x00").unwrap();
///
/// assert_eq!(module.function_types(), None);
/// assert_eq!(module.functions(), None);
/// assert_eq!(module.memories(), None);
/// assert_eq!(module.exports(), None);
/// ```
pub fn parse_binary(input: &[u8]) -> Result<Module, ParseError> {
    let mut builder = Module::builder();

    let (mut input, _) = tuple((tag(PREAMBLE), tag(VERSION)))(input)
        .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| ParseError::InvalidPreamble)?;

    let mut last_known_id = 0u8;
    let mut insertion_point = ModuleSection::Custom;
    let mut signatures: Option<Vec<TypeIndex>> = None;
    let mut codes: Option<Vec<(Vec<LocalGroup>, Expression)>> = None;

    while !input.is_empty() {
        let (rest, id) = parse_u7(input)?;
        let (rest, payload) = parse_byte_vector(rest)?;

        if id == ModuleSection::Custom.id() {
            let custom = complete(parse_custom, payload)?;

            log::debug!(
                "custom section `{}` after {:?}",
                custom.name(),
                insertion_point
            );
            builder.add_custom_section(insertion_point, custom);

            input = rest;
            continue;
        }

        match ModuleSection::from_id(id) {
            Some(section) => {
                if id <= last_known_id {
                    return Err(ParseError::SectionOrder(id));
                }

                last_known_id = id;
                insertion_point = section;

                match section {
                    ModuleSection::Custom => {}
                    ModuleSection::Type => {
                        builder.set_function_types(Some(complete(parse_type_section, payload)?));
                    }
                    ModuleSection::Import => {
                        builder.set_imports(Some(complete(
                            values::parse_vector(parse_import),
                            payload,
                        )?));
                    }
                    ModuleSection::Function => {
                        signatures = Some(complete(parse_function_section, payload)?);
                    }
                    ModuleSection::Table => {
                        builder.set_tables(Some(complete(
                            values::parse_vector(parse_table),
                            payload,
                        )?));
                    }
                    ModuleSection::Memory => {
                        builder.set_memories(Some(complete(
                            values::parse_vector(parse_memory),
                            payload,
                        )?));
                    }
                    ModuleSection::Global => {
                        builder.set_globals(Some(complete(
                            values::parse_vector(parse_global),
                            payload,
                        )?));
                    }
                    ModuleSection::Export => {
                        builder.set_exports(Some(complete(
                            values::parse_vector(parse_export),
                            payload,
                        )?));
                    }
                    ModuleSection::Start => {
                        builder.set_start(Some(complete(parse_start, payload)?));
                    }
                    ModuleSection::Element => {
                        builder.set_elements(Some(complete(
                            values::parse_vector(parse_element),
                            payload,
                        )?));
                    }
                    ModuleSection::Code => {
                        codes = Some(complete(values::parse_vector(parse_code), payload)?);
                    }
                    ModuleSection::Data => {
                        builder.set_data(Some(complete(
                            values::parse_vector(parse_data),
                            payload,
                        )?));
                    }
                }
            }
            None => return Err(ParseError::UnknownSection(id)),
        }

        input = rest;
    }

    validate_function_counts(codes.as_ref(), signatures.as_ref())?;
    zip_functions(&mut builder, signatures, codes);

    Ok(builder.build())
}

/// Runs a section payload decoder, requiring it to consume the payload exactly.
fn complete<'input, O, P>(parser: P, payload: &'input [u8]) -> Result<O, ParseError>
where
    P: Parser<&'input [u8], O, nom::error::Error<&'input [u8]>>,
{
    let (_, value) = all_consuming(parser)(payload)?;

    Ok(value)
}

/// Zips code and function sections into the function syntax type.
fn zip_functions(
    builder: &mut ModuleBuilder,
    signatures: Option<Vec<TypeIndex>>,
    codes: Option<Vec<(Vec<LocalGroup>, Expression)>>,
) {
    let functions = codes.zip(signatures).map(|(codes, signatures)| {
        codes
            .into_iter()
            .zip(signatures)
            .map(|((locals, body), kind)| Function::new(kind, locals, body))
            .collect()
    });

    builder.set_functions(functions);
}

/// Validates that the parsed function and code section lengths match.
fn validate_function_counts(
    codes: Option<&Vec<(Vec<LocalGroup>, Expression)>>,
    signatures: Option<&Vec<TypeIndex>>,
) -> Result<(), ParseError> {
    let code_count = codes.map(Vec::len);
    let signature_count = signatures.map(Vec::len);

    if code_count.unwrap_or(0) == signature_count.unwrap_or(0) {
        Ok(())
    } else {
        Err(ParseError::MismatchedFunctionParts(
            code_count,
            signature_count,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Custom, Export, Function, FunctionType, Import, Limit, Memory, MemoryType, ResultType,
        ValueType,
    };

    #[test]
    fn empty_module() {
        let module = parse_binary(b"\x00\x61\x73\x6D\x01\x00\x00\x00").unwrap();

        assert_eq!(module, Module::empty());
    }

    #[test]
    fn invalid_preamble() {
        assert!(matches!(
            parse_binary(b"\x00\x61\x73\x6D\x02\x00\x00\x00"),
            Err(ParseError::InvalidPreamble)
        ));
        assert!(matches!(
            parse_binary(b"wasm"),
            Err(ParseError::InvalidPreamble)
        ));
    }

    #[test]
    fn custom_section_only() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        bytes.extend([0x00, 0x0D, 0x07]);
        bytes.extend(b"version");
        bytes.extend(b"0.1.0");

        let module = parse_binary(bytes.as_slice()).unwrap();
        let customs = module.custom_sections_at(ModuleSection::Custom).unwrap();

        assert_eq!(
            customs,
            &[Custom::new("version".into(), b"0.1.0".to_vec())]
        );
    }

    #[test]
    fn add_function_module() {
        // (module (func (export "add") (param i32 i32) (result i32) ...))
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        // type section: (i32, i32) -> i32
        bytes.extend([0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F]);
        // function section: one function of type 0
        bytes.extend([0x03, 0x02, 0x01, 0x00]);
        // export section: "add" -> function 0
        bytes.extend([0x07, 0x07, 0x01, 0x03]);
        bytes.extend(b"add");
        bytes.extend([0x00, 0x00]);
        // code section: local.get 0, local.get 1, i32.add
        bytes.extend([0x0A, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B]);

        let module = parse_binary(bytes.as_slice()).unwrap();

        assert_eq!(
            module.function_types(),
            Some(
                &[FunctionType::new(
                    ResultType::new(vec![ValueType::I32, ValueType::I32]),
                    ResultType::new(vec![ValueType::I32]),
                )][..]
            )
        );
        assert_eq!(module.functions().map(<[Function]>::len), Some(1));
        assert_eq!(
            module.exports(),
            Some(&[Export::function("add".into(), 0)][..])
        );
    }

    #[test]
    fn out_of_order_sections_are_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        // memory section before type section is fine (5 > 1 required in order);
        // here: export section (7) followed by memory section (5).
        bytes.extend([0x07, 0x01, 0x00]);
        bytes.extend([0x05, 0x03, 0x01, 0x00, 0x01]);

        assert!(matches!(
            parse_binary(bytes.as_slice()),
            Err(ParseError::SectionOrder(5))
        ));
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        bytes.extend([0x05, 0x03, 0x01, 0x00, 0x01]);
        bytes.extend([0x05, 0x03, 0x01, 0x00, 0x01]);

        assert!(matches!(
            parse_binary(bytes.as_slice()),
            Err(ParseError::SectionOrder(5))
        ));
    }

    #[test]
    fn unknown_section_id_is_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        bytes.extend([0x0C, 0x01, 0x00]);

        assert!(matches!(
            parse_binary(bytes.as_slice()),
            Err(ParseError::UnknownSection(12))
        ));
    }

    #[test]
    fn payload_overrun_is_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        // memory section claims 2 bytes but the vector needs 3.
        bytes.extend([0x05, 0x02, 0x01, 0x00]);

        assert!(parse_binary(bytes.as_slice()).is_err());
    }

    #[test]
    fn payload_underrun_is_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        // memory section declares 4 bytes; the vector only uses 3.
        bytes.extend([0x05, 0x04, 0x01, 0x00, 0x01, 0xFF]);

        assert!(parse_binary(bytes.as_slice()).is_err());
    }

    #[test]
    fn function_without_code_is_rejected() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        bytes.extend([0x01, 0x04, 0x01, 0x60, 0x00, 0x00]);
        bytes.extend([0x03, 0x02, 0x01, 0x00]);

        assert!(matches!(
            parse_binary(bytes.as_slice()),
            Err(ParseError::MismatchedFunctionParts(None, Some(1)))
        ));
    }

    #[test]
    fn memory_module_round_trips_through_model() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        bytes.extend([0x05, 0x04, 0x01, 0x01, 0x01, 0x02]);

        let module = parse_binary(bytes.as_slice()).unwrap();

        assert_eq!(
            module.memories(),
            Some(&[Memory::new(MemoryType::new(Limit::bounded(1, 2)))][..])
        );
    }

    #[test]
    fn imports_parse_in_declaration_order() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"\x00\x61\x73\x6D\x01\x00\x00\x00");
        bytes.extend([0x01, 0x04, 0x01, 0x60, 0x00, 0x00]);
        let imports = [
            0x02u8, 0x0B, 0x01, 0x03, b'e', b'n', b'v', 0x03, b'r', b'u', b'n', 0x00, 0x00,
        ];
        bytes.extend(imports);

        let module = parse_binary(bytes.as_slice()).unwrap();

        assert_eq!(
            module.imports(),
            Some(&[Import::function("env".into(), "run".into(), 0)][..])
        );
    }
}
