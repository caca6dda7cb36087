use crate::emitter::errors::EmitError;
use crate::emitter::instructions::emit_expression;
use crate::emitter::types::{
    emit_function_type, emit_global_type, emit_memory_type, emit_table_type, emit_value_type,
};
use crate::emitter::values::{
    emit_byte, emit_byte_vector, emit_bytes, emit_name, emit_u32, emit_usize, emit_vector,
};
use crate::emitter::CountingWrite;
use crate::model::{
    Custom, Data, Element, Export, ExportDescription, Function, Global, Import, ImportDescription,
    LocalGroup, Memory, Module, ModuleSection, Start, Table,
};
use std::io::Write;

/// A magic constant used to quickly identify WebAssembly binary file contents.
const PREAMBLE: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];

/// The version of the binary WebAssembly format emitted.
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Emit a module to the output: the preamble followed by the sections in
/// canonical id order, each preceded by the custom sections recorded at its
/// insertion point.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html>
pub fn emit_module(module: &Module, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_bytes(&PREAMBLE, output)?;

    emitted += emit_bytes(&VERSION, output)?;
    emitted += emit_custom_sections(module, ModuleSection::Custom, output)?;

    if let Some(types) = module.function_types() {
        emitted += emit_section(ModuleSection::Type, output, |o| {
            emit_vector(types, o, emit_function_type)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Type, output)?;

    if let Some(imports) = module.imports() {
        emitted += emit_section(ModuleSection::Import, output, |o| {
            emit_vector(imports, o, emit_import)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Import, output)?;

    if let Some(functions) = module.functions() {
        emitted += emit_section(ModuleSection::Function, output, |o| {
            emit_vector(functions, o, |function, o| emit_usize(function.kind() as usize, o))
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Function, output)?;

    if let Some(tables) = module.tables() {
        emitted += emit_section(ModuleSection::Table, output, |o| {
            emit_vector(tables, o, emit_table)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Table, output)?;

    if let Some(memories) = module.memories() {
        emitted += emit_section(ModuleSection::Memory, output, |o| {
            emit_vector(memories, o, emit_memory)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Memory, output)?;

    if let Some(globals) = module.globals() {
        emitted += emit_section(ModuleSection::Global, output, |o| {
            emit_vector(globals, o, emit_global)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Global, output)?;

    if let Some(exports) = module.exports() {
        emitted += emit_section(ModuleSection::Export, output, |o| {
            emit_vector(exports, o, emit_export)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Export, output)?;

    if let Some(start) = module.start() {
        emitted += emit_section(ModuleSection::Start, output, |o| emit_start(start, o))?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Start, output)?;

    if let Some(elements) = module.elements() {
        emitted += emit_section(ModuleSection::Element, output, |o| {
            emit_vector(elements, o, emit_element)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Element, output)?;

    if let Some(functions) = module.functions() {
        emitted += emit_section(ModuleSection::Code, output, |o| {
            emit_vector(functions, o, emit_function_code)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Code, output)?;

    if let Some(data) = module.data() {
        emitted += emit_section(ModuleSection::Data, output, |o| {
            emit_vector(data, o, emit_data)
        })?;
    }
    emitted += emit_custom_sections(module, ModuleSection::Data, output)?;

    Ok(emitted)
}

/// Emit a section: its id, its payload length (computed by a counting
/// pre-pass), and the payload itself.
fn emit_section(
    section: ModuleSection,
    output: &mut dyn Write,
    emit: impl Fn(&mut dyn Write) -> Result<usize, EmitError>,
) -> Result<usize, EmitError> {
    let mut counter = CountingWrite::new();

    emit(&mut counter)?;

    let mut emitted = emit_byte(section.id(), output)?;
    emitted += emit_usize(counter.bytes(), output)?;
    emitted += emit(output)?;

    Ok(emitted)
}

/// Emit the custom sections recorded at the given insertion point.
fn emit_custom_sections(
    module: &Module,
    insertion_point: ModuleSection,
    output: &mut dyn Write,
) -> Result<usize, EmitError> {
    let mut emitted = 0;

    if let Some(customs) = module.custom_sections_at(insertion_point) {
        for custom in customs {
            emitted += emit_section(ModuleSection::Custom, output, |o| emit_custom(custom, o))?;
        }
    }

    Ok(emitted)
}

/// Emit a custom section payload to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#binary-customsec>
pub fn emit_custom(custom: &Custom, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_name(custom.name(), output)?;

    emitted += emit_bytes(custom.bytes(), output)?;

    Ok(emitted)
}

/// Emit an import to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#import-section>
pub fn emit_import(import: &Import, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_name(import.module(), output)?;

    emitted += emit_name(import.name(), output)?;
    emitted += match import.description() {
        ImportDescription::Function(index) => {
            emit_byte(0x00, output)? + emit_u32(*index, output)?
        }
        ImportDescription::Table(kind) => emit_byte(0x01, output)? + emit_table_type(kind, output)?,
        ImportDescription::Memory(kind) => {
            emit_byte(0x02, output)? + emit_memory_type(kind, output)?
        }
        ImportDescription::Global(kind) => {
            emit_byte(0x03, output)? + emit_global_type(kind, output)?
        }
    };

    Ok(emitted)
}

/// Emit a table to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#table-section>
pub fn emit_table(table: &Table, output: &mut dyn Write) -> Result<usize, EmitError> {
    emit_table_type(table.kind(), output)
}

/// Emit a memory to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#memory-section>
pub fn emit_memory(memory: &Memory, output: &mut dyn Write) -> Result<usize, EmitError> {
    emit_memory_type(memory.kind(), output)
}

/// Emit a global to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#global-section>
pub fn emit_global(global: &Global, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_global_type(global.kind(), output)?;

    emitted += emit_expression(global.initializer(), output)?;

    Ok(emitted)
}

/// Emit an export to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#export-section>
pub fn emit_export(export: &Export, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_name(export.name(), output)?;

    let (kind, index) = match export.description() {
        ExportDescription::Function(index) => (0x00, index),
        ExportDescription::Table(index) => (0x01, index),
        ExportDescription::Memory(index) => (0x02, index),
        ExportDescription::Global(index) => (0x03, index),
    };

    emitted += emit_byte(kind, output)?;
    emitted += emit_u32(*index, output)?;

    Ok(emitted)
}

/// Emit a start component to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#start-section>
pub fn emit_start(start: &Start, output: &mut dyn Write) -> Result<usize, EmitError> {
    emit_u32(start.function(), output)
}

/// Emit an element segment to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#element-section>
pub fn emit_element(element: &Element, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_u32(element.table(), output)?;

    emitted += emit_expression(element.offset(), output)?;
    emitted += emit_vector(element.functions(), output, |function, o| {
        emit_u32(*function, o)
    })?;

    Ok(emitted)
}

/// Emit a data segment to the output.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#data-section>
pub fn emit_data(data: &Data, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_u32(data.memory(), output)?;

    emitted += emit_expression(data.offset(), output)?;
    emitted += emit_byte_vector(data.bytes(), output)?;

    Ok(emitted)
}

/// Emit the code entry of a function: a size-prefixed pair of local groups
/// and the body expression.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#code-section>
pub fn emit_function_code(function: &Function, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut counter = CountingWrite::new();

    emit_code_contents(function, &mut counter)?;

    let mut emitted = emit_usize(counter.bytes(), output)?;
    emitted += emit_code_contents(function, output)?;

    Ok(emitted)
}

/// Emits the local groups and body of a function.
fn emit_code_contents(function: &Function, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_vector(function.locals(), output, emit_local_group)?;

    emitted += emit_expression(function.body(), output)?;

    Ok(emitted)
}

/// Emits one group of locals: a count and a shared value type.
fn emit_local_group(group: &LocalGroup, output: &mut dyn Write) -> Result<usize, EmitError> {
    let mut emitted = emit_u32(group.count(), output)?;

    emitted += emit_value_type(&group.kind(), output)?;

    Ok(emitted)
}
