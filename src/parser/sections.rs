use crate::parser::instructions::parse_expression;
use crate::parser::types::{
    parse_global_type, parse_memory_type, parse_table_type, parse_value_type,
};
use crate::parser::values::{
    match_byte, parse_byte_vector, parse_name, parse_u32, parse_vector,
};
use crate::{
    Custom, Data, Element, Export, ExportDescription, Expression, Global, Import,
    ImportDescription, LocalGroup, Memory, Start, Table, TypeIndex,
};
use nom::branch::alt;
use nom::bytes::complete::take;
use nom::combinator::{all_consuming, map, rest};
use nom::sequence::{preceded, tuple};
use nom::IResult;

/// Parses a custom section payload: a name followed by uninterpreted bytes.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#binary-customsec>
pub fn parse_custom(input: &[u8]) -> IResult<&[u8], Custom> {
    map(tuple((parse_name, rest)), |(name, bytes): (_, &[u8])| {
        Custom::new(name, bytes.to_vec())
    })(input)
}

/// Parses a WebAssembly import component from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#binary-importsec>
pub fn parse_import(input: &[u8]) -> IResult<&[u8], Import> {
    map(
        tuple((parse_name, parse_name, parse_import_description)),
        |(module, name, description)| Import::new(module, name, description),
    )(input)
}

/// Parses an import description.
fn parse_import_description(input: &[u8]) -> IResult<&[u8], ImportDescription> {
    alt((
        map(
            preceded(match_byte(0x00), parse_u32),
            ImportDescription::Function,
        ),
        map(
            preceded(match_byte(0x01), parse_table_type),
            ImportDescription::Table,
        ),
        map(
            preceded(match_byte(0x02), parse_memory_type),
            ImportDescription::Memory,
        ),
        map(
            preceded(match_byte(0x03), parse_global_type),
            ImportDescription::Global,
        ),
    ))(input)
}

/// Parses a WebAssembly table component from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#table-section>
pub fn parse_table(input: &[u8]) -> IResult<&[u8], Table> {
    map(parse_table_type, Table::from)(input)
}

/// Parses a WebAssembly memory component from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#memory-section>
pub fn parse_memory(input: &[u8]) -> IResult<&[u8], Memory> {
    map(parse_memory_type, Memory::from)(input)
}

/// Parses a WebAssembly global component from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#global-section>
pub fn parse_global(input: &[u8]) -> IResult<&[u8], Global> {
    map(
        tuple((parse_global_type, parse_expression)),
        |(kind, initializer)| Global::new(kind, initializer),
    )(input)
}

/// Parses a WebAssembly export component from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#export-section>
pub fn parse_export(input: &[u8]) -> IResult<&[u8], Export> {
    map(
        tuple((parse_name, parse_export_description)),
        |(name, description)| Export::new(name, description),
    )(input)
}

/// Parses an export description.
fn parse_export_description(input: &[u8]) -> IResult<&[u8], ExportDescription> {
    alt((
        map(
            preceded(match_byte(0x00), parse_u32),
            ExportDescription::Function,
        ),
        map(
            preceded(match_byte(0x01), parse_u32),
            ExportDescription::Table,
        ),
        map(
            preceded(match_byte(0x02), parse_u32),
            ExportDescription::Memory,
        ),
        map(
            preceded(match_byte(0x03), parse_u32),
            ExportDescription::Global,
        ),
    ))(input)
}

/// Parses a WebAssembly start component from the input.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#start-section>
pub fn parse_start(input: &[u8]) -> IResult<&[u8], Start> {
    map(parse_u32, Start::new)(input)
}

/// Parses a WebAssembly element segment from the input.
/// The MVP encodes active segments only: a table index,
/// an offset expression, and a vector of function indices.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#element-section>
pub fn parse_element(input: &[u8]) -> IResult<&[u8], Element> {
    map(
        tuple((parse_u32, parse_expression, parse_vector(parse_u32))),
        |(table, offset, functions)| Element::new(table, offset, functions),
    )(input)
}

/// Parses a WebAssembly data segment from the input.
/// The MVP encodes active segments only: a memory index,
/// an offset expression, and the initializing bytes.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#data-section>
pub fn parse_data(input: &[u8]) -> IResult<&[u8], Data> {
    map(
        tuple((parse_u32, parse_expression, parse_byte_vector)),
        |(memory, offset, bytes)| Data::new(memory, offset, bytes.to_vec()),
    )(input)
}

/// Parses a WebAssembly code entry: a size-prefixed pair of local groups and
/// a function body. The declared size is authoritative.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#code-section>
pub fn parse_code(input: &[u8]) -> IResult<&[u8], (Vec<LocalGroup>, Expression)> {
    let (input, size) = parse_u32(input)?;
    let (remaining, input) = take(size as usize)(input)?;
    let (_, code) = all_consuming(tuple((parse_locals, parse_expression)))(input)?;

    Ok((remaining, code))
}

/// Parses the local groups of a function.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#code-section>
pub fn parse_locals(input: &[u8]) -> IResult<&[u8], Vec<LocalGroup>> {
    parse_vector(parse_local_group)(input)
}

fn parse_local_group(input: &[u8]) -> IResult<&[u8], LocalGroup> {
    map(tuple((parse_u32, parse_value_type)), |(count, kind)| {
        LocalGroup::new(count, kind)
    })(input)
}

/// Parses a type section payload into function types.
pub fn parse_type_section(input: &[u8]) -> IResult<&[u8], Vec<crate::FunctionType>> {
    parse_vector(crate::parser::types::parse_function_type)(input)
}

/// Parses a function section payload into type indices.
pub fn parse_function_section(input: &[u8]) -> IResult<&[u8], Vec<TypeIndex>> {
    parse_vector(parse_u32)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementKind, GlobalType, Limit, Name, TableType, ValueType};

    #[test]
    fn parse_import_of_function() {
        let mut input = Vec::new();
        input.push(3);
        input.extend(b"env");
        input.push(3);
        input.extend(b"log");
        input.extend([0x00, 0x02]);

        let (_, import) = parse_import(input.as_slice()).unwrap();

        assert_eq!(import, Import::function("env".into(), "log".into(), 2));
    }

    #[test]
    fn parse_import_of_table() {
        let mut input = Vec::new();
        input.push(1);
        input.extend(b"t");
        input.push(1);
        input.extend(b"f");
        input.extend([0x01, 0x70, 0x00, 0x0A]);

        let (_, import) = parse_import(input.as_slice()).unwrap();

        assert_eq!(
            import,
            Import::table(
                "t".into(),
                "f".into(),
                TableType::new(ElementKind::FunctionReference, Limit::unbounded(10)),
            )
        );
    }

    #[test]
    fn parse_global_with_initializer() {
        let input = [0x7F, 0x01, 0x41, 0x2A, 0x0B];
        let (_, global) = parse_global(&input).unwrap();

        assert_eq!(
            global,
            Global::new(
                GlobalType::mutable(ValueType::I32),
                Expression::new(vec![42i32.into()]),
            )
        );
    }

    #[test]
    fn parse_export_of_memory() {
        let input = [0x03, b'm', b'e', b'm', 0x02, 0x00];
        let (_, export) = parse_export(&input).unwrap();

        assert_eq!(export, Export::memory(Name::from("mem"), 0));
    }

    #[test]
    fn parse_element_segment() {
        let input = [0x00, 0x41, 0x00, 0x0B, 0x02, 0x00, 0x01];
        let (_, element) = parse_element(&input).unwrap();

        assert_eq!(
            element,
            Element::new(0, Expression::new(vec![0i32.into()]), vec![0, 1])
        );
    }

    #[test]
    fn parse_data_segment() {
        let input = [0x00, 0x41, 0x08, 0x0B, 0x02, 0xAB, 0xCD];
        let (_, data) = parse_data(&input).unwrap();

        assert_eq!(
            data,
            Data::new(0, Expression::new(vec![8i32.into()]), vec![0xAB, 0xCD])
        );
    }

    #[test]
    fn parse_code_with_locals() {
        // size 5: one group of 2 i32 locals, then a nop body.
        let input = [0x05, 0x01, 0x02, 0x7F, 0x01, 0x0B];
        let (_, (locals, body)) = parse_code(&input).unwrap();

        assert_eq!(locals, vec![LocalGroup::new(2, ValueType::I32)]);
        assert_eq!(
            body,
            Expression::new(vec![crate::ControlInstruction::Nop.into()])
        );
    }

    #[test]
    fn parse_code_rejects_size_underrun() {
        // Declared size 3 leaves a trailing byte inside the entry.
        let input = [0x03, 0x00, 0x0B, 0x01];
        assert!(parse_code(&input).is_err());
    }
}
