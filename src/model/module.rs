//! WebAssembly model of modules and their segments.

use crate::model::indices::*;
use crate::model::types::*;
use crate::model::{Expression, ModelError, Name, NameSection};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::mem::discriminant;

/// The name of the distinguished custom section carrying module,
/// function, and local names.
pub const NAME_SECTION: &str = "name";

/// A builder pattern for `Module`s.
/// The builder performs minimal validation when using the `add_*` family of
/// methods: only that the added element would not exceed the maximum size of
/// a u32.
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    /// Creates a new empty builder of WebAssembly modules.
    pub fn new() -> Self {
        ModuleBuilder {
            module: Module::empty(),
        }
    }

    /// Sets the function types segment for the module to be built.
    pub fn set_function_types(&mut self, function_types: Option<Vec<FunctionType>>) {
        self.module.function_types = function_types;
    }

    /// Adds the function type to the module's segment.
    /// Returns the index of the type in the module.
    pub fn add_function_type(
        &mut self,
        function_type: FunctionType,
    ) -> Result<TypeIndex, ModelError> {
        let function_types = self.module.function_types.get_or_insert_with(Vec::new);
        let index = u32::try_from(function_types.len())?;

        function_types.push(function_type);

        Ok(index)
    }

    /// Sets the functions segment for the module to be built.
    pub fn set_functions(&mut self, functions: Option<Vec<Function>>) {
        self.module.functions = functions;
    }

    /// Adds the function to the module's segment, pairing its type index in
    /// the function section with its body in the code section.
    /// Returns the index of the function in the module.
    ///
    /// **Note:** In order for the returned index to be accurate,
    /// all function imports must be defined prior to adding any functions.
    pub fn add_function(&mut self, function: Function) -> Result<FunctionIndex, ModelError> {
        let imports = self.module.import_count_of(ImportKind::Function);
        let functions = self.module.functions.get_or_insert_with(Vec::new);
        let index = u32::try_from(functions.len() + imports)?;

        functions.push(function);

        Ok(index)
    }

    /// Sets the table segment for the module to be built.
    pub fn set_tables(&mut self, tables: Option<Vec<Table>>) {
        self.module.tables = tables;
    }

    /// Adds the table to the module's segment.
    /// Returns the index of the table in the module.
    ///
    /// **Note:** In order for the returned index to be accurate,
    /// all table imports must be defined prior to adding any tables.
    pub fn add_table(&mut self, table: Table) -> Result<TableIndex, ModelError> {
        let imports = self.module.import_count_of(ImportKind::Table);
        let tables = self.module.tables.get_or_insert_with(Vec::new);
        let index = u32::try_from(tables.len() + imports)?;

        tables.push(table);

        Ok(index)
    }

    /// Sets the memories segment for the module to be built.
    pub fn set_memories(&mut self, memories: Option<Vec<Memory>>) {
        self.module.memories = memories;
    }

    /// Adds the memory to the module's segment.
    /// Returns the index of the memory in the module.
    ///
    /// **Note:** In order for the returned index to be accurate,
    /// all memory imports must be defined prior to adding any memories.
    pub fn add_memory(&mut self, memory: Memory) -> Result<MemoryIndex, ModelError> {
        let imports = self.module.import_count_of(ImportKind::Memory);
        let memories = self.module.memories.get_or_insert_with(Vec::new);
        let index = u32::try_from(memories.len() + imports)?;

        memories.push(memory);

        Ok(index)
    }

    /// Sets the globals segment for the module to be built.
    pub fn set_globals(&mut self, globals: Option<Vec<Global>>) {
        self.module.globals = globals;
    }

    /// Adds the global to the module's segment.
    /// Returns the index of the global in the module.
    ///
    /// **Note:** In order for the returned index to be accurate,
    /// all global imports must be defined prior to adding any globals.
    pub fn add_global(&mut self, global: Global) -> Result<GlobalIndex, ModelError> {
        let imports = self.module.import_count_of(ImportKind::Global);
        let globals = self.module.globals.get_or_insert_with(Vec::new);
        let index = u32::try_from(globals.len() + imports)?;

        globals.push(global);

        Ok(index)
    }

    /// Sets the elements segment for the module to be built.
    pub fn set_elements(&mut self, elements: Option<Vec<Element>>) {
        self.module.elements = elements;
    }

    /// Adds the element segment to the module.
    pub fn add_element(&mut self, element: Element) -> Result<u32, ModelError> {
        let elements = self.module.elements.get_or_insert_with(Vec::new);
        let index = u32::try_from(elements.len())?;

        elements.push(element);

        Ok(index)
    }

    /// Sets the data segment for the module to be built.
    pub fn set_data(&mut self, data: Option<Vec<Data>>) {
        self.module.data = data;
    }

    /// Adds the data segment to the module.
    pub fn add_data(&mut self, datum: Data) -> Result<u32, ModelError> {
        let data = self.module.data.get_or_insert_with(Vec::new);
        let index = u32::try_from(data.len())?;

        data.push(datum);

        Ok(index)
    }

    /// Sets the start segment for the module to be built.
    pub fn set_start(&mut self, start: Option<Start>) {
        self.module.start = start;
    }

    /// Sets the imports segment for the module to be built.
    pub fn set_imports(&mut self, imports: Option<Vec<Import>>) {
        self.module.imports = imports;
    }

    /// Adds the import to the module's segment.
    /// Returns the index of the import in its index space
    /// (i.e. function, table, memory, or global index).
    pub fn add_import(&mut self, import: Import) -> Result<u32, ModelError> {
        let import_discriminant = discriminant(import.description());
        let imports = self.module.imports.get_or_insert_with(Vec::new);
        let index = u32::try_from(
            imports
                .iter()
                .filter(|i| discriminant(i.description()) == import_discriminant)
                .count(),
        )?;

        imports.push(import);

        Ok(index)
    }

    /// Sets the exports segment for the module to be built.
    pub fn set_exports(&mut self, exports: Option<Vec<Export>>) {
        self.module.exports = exports;
    }

    /// Adds the export to the module's segment.
    pub fn add_export(&mut self, export: Export) {
        let exports = self.module.exports.get_or_insert_with(Vec::new);
        exports.push(export);
    }

    /// Sets the custom sections at the given insertion point for the module
    /// to be built. The binary format allows custom sections at the start of
    /// a module, or after any other section.
    pub fn set_custom_sections(
        &mut self,
        insertion_point: ModuleSection,
        custom_sections: Option<Vec<Custom>>,
    ) {
        self.module
            .custom_sections
            .set_custom_sections(insertion_point, custom_sections);
    }

    /// Adds a custom section at the given insertion point.
    pub fn add_custom_section(&mut self, insertion_point: ModuleSection, custom_section: Custom) {
        self.module
            .custom_sections
            .add_custom_section(insertion_point, custom_section);
    }

    /// Installs the given names as the distinguished `name` custom section,
    /// placed after all known sections.
    pub fn set_names(&mut self, names: &NameSection) {
        self.add_custom_section(ModuleSection::Data, names.to_custom());
    }

    /// Builds the current segments into a module.
    pub fn build(self) -> Module {
        self.into()
    }
}

impl From<ModuleBuilder> for Module {
    fn from(builder: ModuleBuilder) -> Self {
        builder.module
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        ModuleBuilder::new()
    }
}

/// WebAssembly programs are organized into modules,
/// which are the unit of deployment, loading, and compilation.
/// A module collects definitions for types, functions, tables, memories, and
/// globals. In addition, it can declare imports and exports and provide
/// initialization in the form of data and element segments, or a start
/// function. Each of the vectors – and thus the entire module – may be empty.
///
/// A module value is created by reading binary or by assembling text and is
/// immutable thereafter.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#modules>
///
/// # Examples
/// ```rust
/// use wasmkit::Module;
///
/// let module = Module::empty();
///
/// assert_eq!(module.function_types(), None);
/// assert_eq!(module.functions(), None);
/// assert_eq!(module.tables(), None);
/// assert_eq!(module.memories(), None);
/// assert_eq!(module.globals(), None);
/// assert_eq!(module.elements(), None);
/// assert_eq!(module.data(), None);
/// assert_eq!(module.start(), None);
/// assert_eq!(module.imports(), None);
/// assert_eq!(module.exports(), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    function_types: Option<Vec<FunctionType>>,
    functions: Option<Vec<Function>>,
    tables: Option<Vec<Table>>,
    memories: Option<Vec<Memory>>,
    globals: Option<Vec<Global>>,
    elements: Option<Vec<Element>>,
    data: Option<Vec<Data>>,
    start: Option<Start>,
    imports: Option<Vec<Import>>,
    exports: Option<Vec<Export>>,
    custom_sections: CustomSections,
}

impl Module {
    /// Creates a builder for WebAssembly modules.
    pub fn builder() -> ModuleBuilder {
        ModuleBuilder::new()
    }

    /// Creates a new empty `Module`.
    pub fn empty() -> Self {
        Module {
            function_types: None,
            functions: None,
            tables: None,
            memories: None,
            globals: None,
            elements: None,
            data: None,
            start: None,
            imports: None,
            exports: None,
            custom_sections: CustomSections::new(),
        }
    }

    /// The 𝗍𝗒𝗉𝖾𝗌 component of a module defines a vector of function types.
    pub fn function_types(&self) -> Option<&[FunctionType]> {
        self.function_types.as_deref()
    }

    /// The 𝖿𝗎𝗇𝖼𝗌 component of a module defines a vector of locally defined functions.
    pub fn functions(&self) -> Option<&[Function]> {
        self.functions.as_deref()
    }

    /// The 𝗍𝖺𝖻𝗅𝖾𝗌 component of a module defines a vector of tables described
    /// by their table type.
    pub fn tables(&self) -> Option<&[Table]> {
        self.tables.as_deref()
    }

    /// The 𝗆𝖾𝗆𝗌 component of a module defines a vector of linear memories as
    /// described by their memory type.
    pub fn memories(&self) -> Option<&[Memory]> {
        self.memories.as_deref()
    }

    /// The 𝗀𝗅𝗈𝖻𝖺𝗅𝗌 component of a module defines a vector of global variables.
    pub fn globals(&self) -> Option<&[Global]> {
        self.globals.as_deref()
    }

    /// The 𝖾𝗅𝖾𝗆𝗌 component of a module defines a vector of element segments.
    pub fn elements(&self) -> Option<&[Element]> {
        self.elements.as_deref()
    }

    /// The 𝖽𝖺𝗍𝖺𝗌 component of a module defines a vector of data segments.
    pub fn data(&self) -> Option<&[Data]> {
        self.data.as_deref()
    }

    /// The 𝗌𝗍𝖺𝗋𝗍 component of a module declares the function index of a start
    /// function that is automatically invoked when the module is
    /// instantiated, after tables and memories have been initialized.
    pub fn start(&self) -> Option<&Start> {
        self.start.as_ref()
    }

    /// The 𝗂𝗆𝗉𝗈𝗋𝗍𝗌 component of a module defines a set of imports that are
    /// required for instantiation.
    pub fn imports(&self) -> Option<&[Import]> {
        self.imports.as_deref()
    }

    /// The 𝖾𝗑𝗉𝗈𝗋𝗍𝗌 component of a module defines a set of exports that become
    /// accessible to the host environment once the module has been
    /// instantiated.
    pub fn exports(&self) -> Option<&[Export]> {
        self.exports.as_deref()
    }

    /// The custom sections of a module for a given insertion point.
    /// Custom sections are allowed at the beginning of a module and after
    /// every other section.
    pub fn custom_sections_at(&self, insertion_point: ModuleSection) -> Option<&[Custom]> {
        self.custom_sections.custom_sections_at(insertion_point)
    }

    /// The number of imports with the given kind of description.
    /// Imports precede local definitions in each index space.
    pub fn import_count_of(&self, kind: ImportKind) -> usize {
        match &self.imports {
            Some(imports) => imports
                .iter()
                .filter(|import| import.kind() == kind)
                .count(),
            None => 0,
        }
    }

    /// The distinguished `name` custom section decoded into its facade,
    /// if the module carries one.
    pub fn names(&self) -> Result<Option<NameSection>, ModelError> {
        for insertion_point in ModuleSection::ordered() {
            if let Some(sections) = self.custom_sections_at(insertion_point) {
                for section in sections {
                    if section.name().as_str() == NAME_SECTION {
                        return NameSection::parse(section).map(Some);
                    }
                }
            }
        }

        Ok(None)
    }
}

/// Maps insertion points to custom sections for a WebAssembly module.
#[derive(Clone, Debug)]
struct CustomSections {
    custom_sections: HashMap<ModuleSection, Vec<Custom>>,
}

impl CustomSections {
    /// Creates a new empty instance of custom sections.
    pub fn new() -> Self {
        CustomSections {
            custom_sections: HashMap::new(),
        }
    }

    /// The custom sections at an insertion point.
    pub fn custom_sections_at(&self, insertion_point: ModuleSection) -> Option<&[Custom]> {
        self.custom_sections
            .get(&insertion_point)
            .map(Vec::as_slice)
    }

    /// Sets the custom sections at the given insertion point.
    pub fn set_custom_sections(
        &mut self,
        insertion_point: ModuleSection,
        custom_sections: Option<Vec<Custom>>,
    ) {
        match custom_sections {
            Some(sections) => self.custom_sections.insert(insertion_point, sections),
            None => self.custom_sections.remove(&insertion_point),
        };
    }

    /// Adds a custom section at the given insertion point.
    pub fn add_custom_section(&mut self, insertion_point: ModuleSection, custom_section: Custom) {
        let custom_sections = self.custom_sections.entry(insertion_point).or_default();

        custom_sections.push(custom_section);
    }
}

impl PartialEq for CustomSections {
    fn eq(&self, other: &Self) -> bool {
        self.custom_sections.len() == other.custom_sections.len()
            && self.custom_sections.keys().all(|key| {
                other.custom_sections.contains_key(key)
                    && self.custom_sections.get(key) == other.custom_sections.get(key)
            })
    }
}

/// Custom sections have the id 0.
/// They are intended to be used for debugging information or third-party
/// extensions, and are ignored by the WebAssembly semantics.
/// Their contents consist of a name further identifying the custom section,
/// followed by an uninterpreted sequence of bytes for custom use.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html#binary-customsec>
#[derive(Clone, Debug, PartialEq)]
pub struct Custom {
    name: Name,
    bytes: Vec<u8>,
}

impl Custom {
    /// Creates a new instance of a custom section.
    pub fn new(name: Name, bytes: Vec<u8>) -> Self {
        Custom { name, bytes }
    }

    /// The name of the custom section.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The contents of the custom section.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A run of local variables of the same value type in a function body.
/// The binary format encodes locals as such groups;
/// preserving them keeps the encoding of a read module intact.
///
/// # Examples
/// ```rust
/// use wasmkit::{LocalGroup, ValueType};
///
/// let group = LocalGroup::new(3, ValueType::I64);
///
/// assert_eq!(group.count(), 3);
/// assert_eq!(group.kind(), ValueType::I64);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LocalGroup {
    count: u32,
    kind: ValueType,
}

impl LocalGroup {
    /// Creates a new group of `count` locals of the given value type.
    pub fn new(count: u32, kind: ValueType) -> Self {
        LocalGroup { count, kind }
    }

    /// The number of locals in the group.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The value type shared by the locals in the group.
    pub fn kind(&self) -> ValueType {
        self.kind
    }
}

/// The 𝗍𝗒𝗉𝖾 of a function declares its signature by reference to a type
/// defined in the module. The parameters of the function are referenced
/// through 0-based local indices in the function's body; they are mutable.
/// The 𝗅𝗈𝖼𝖺𝗅𝗌 declare a vector of mutable local variables and their types.
/// These variables are referenced through local indices in the function's
/// body. The index of the first local is the smallest index not referencing
/// a parameter.
/// The 𝖻𝗈𝖽𝗒 is an instruction sequence that upon termination must produce a
/// stack matching the function type's result type.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#functions>
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    kind: TypeIndex,
    locals: Vec<LocalGroup>,
    body: Expression,
}

impl Function {
    /// Creates a new instance of a `Function`.
    pub fn new(kind: TypeIndex, locals: Vec<LocalGroup>, body: Expression) -> Self {
        Function { kind, locals, body }
    }

    /// The index of the type definition for this `Function`.
    pub fn kind(&self) -> TypeIndex {
        self.kind
    }

    /// The local groups of this `Function`, excluding parameters.
    pub fn locals(&self) -> &[LocalGroup] {
        &self.locals
    }

    /// The value types of this `Function`'s locals, one entry per local.
    pub fn flattened_locals(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.locals
            .iter()
            .flat_map(|group| (0..group.count()).map(move |_| group.kind()))
    }

    /// The code for this `Function`.
    pub fn body(&self) -> &Expression {
        &self.body
    }
}

/// A table is a vector of opaque function references.
/// The initial size in the limits of the table type specifies the initial
/// size of that table, while its maximum, if present, restricts the size to
/// which it can grow later. Tables can be initialized through element
/// segments. Tables are referenced through table indices,
/// starting with the smallest index not referencing a table import.
/// Most constructs implicitly reference table index 0.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#tables>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Table {
    kind: TableType,
}

impl Table {
    /// Creates a new instance of a `Table`.
    pub fn new(kind: TableType) -> Self {
        Table { kind }
    }

    /// The type descriptor of this `Table`.
    pub fn kind(&self) -> &TableType {
        &self.kind
    }
}

impl From<TableType> for Table {
    fn from(kind: TableType) -> Self {
        Table { kind }
    }
}

/// A memory is a vector of raw uninterpreted bytes.
/// The initial size in the limits of the memory type specifies the initial
/// size of that memory, while its maximum, if present,
/// restricts the size to which it can grow later.
/// Both are in units of page size. Memories can be initialized through data
/// segments. Memories are referenced through memory indices,
/// starting with the smallest index not referencing a memory import.
/// Most constructs implicitly reference memory index 0.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#memories>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Memory {
    kind: MemoryType,
}

impl Memory {
    /// Creates a new `Memory` of the given type.
    pub fn new(kind: MemoryType) -> Self {
        Memory { kind }
    }

    /// The type definition for this memory.
    pub fn kind(&self) -> &MemoryType {
        &self.kind
    }
}

impl<T> From<T> for Memory
where
    T: Into<MemoryType>,
{
    fn from(kind: T) -> Self {
        Memory { kind: kind.into() }
    }
}

/// Each global stores a single value of the given global type.
/// Its 𝗍𝗒𝗉𝖾 also specifies whether a global is immutable or mutable.
/// Moreover, each global is initialized with an 𝗂𝗇𝗂𝗍 value given by a
/// constant initializer expression.
/// Globals are referenced through global indices,
/// starting with the smallest index not referencing a global import.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#globals>
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    kind: GlobalType,
    initializer: Expression,
}

impl Global {
    /// Creates a new `Global` with the given type and initializer.
    pub fn new(kind: GlobalType, initializer: Expression) -> Self {
        Global { kind, initializer }
    }

    /// Creates a new `Global` for a mutable global variable.
    pub fn mutable(kind: ValueType, initializer: Expression) -> Self {
        Global {
            kind: GlobalType::mutable(kind),
            initializer,
        }
    }

    /// Creates a new `Global` for an immutable global variable.
    pub fn immutable(kind: ValueType, initializer: Expression) -> Self {
        Global {
            kind: GlobalType::immutable(kind),
            initializer,
        }
    }

    /// The type of this `Global`.
    pub fn kind(&self) -> &GlobalType {
        &self.kind
    }

    /// The expression to initialize this `Global` with.
    pub fn initializer(&self) -> &Expression {
        &self.initializer
    }
}

/// The initial contents of a table is uninitialized.
/// An element segment copies a static vector of function indices into a
/// table during instantiation, at an offset given by a constant expression.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#element-segments>
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    table: TableIndex,
    offset: Expression,
    functions: Vec<FunctionIndex>,
}

impl Element {
    /// Creates a new instance of an element segment.
    pub fn new(table: TableIndex, offset: Expression, functions: Vec<FunctionIndex>) -> Self {
        Element {
            table,
            offset,
            functions,
        }
    }

    /// The index of the table this segment initializes.
    pub fn table(&self) -> TableIndex {
        self.table
    }

    /// The constant expression yielding the offset at which to copy.
    pub fn offset(&self) -> &Expression {
        &self.offset
    }

    /// The function indices to copy into the table.
    pub fn functions(&self) -> &[FunctionIndex] {
        &self.functions
    }
}

/// The initial contents of a memory are zero bytes.
/// A data segment copies a static vector of bytes into a memory during
/// instantiation, at an offset given by a constant expression.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#data-segments>
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
    memory: MemoryIndex,
    offset: Expression,
    bytes: Vec<u8>,
}

impl Data {
    /// Creates an instance of a data segment.
    pub fn new(memory: MemoryIndex, offset: Expression, bytes: Vec<u8>) -> Self {
        Data {
            memory,
            offset,
            bytes,
        }
    }

    /// The index of the memory this segment initializes.
    pub fn memory(&self) -> MemoryIndex {
        self.memory
    }

    /// The constant expression yielding the offset at which to copy.
    pub fn offset(&self) -> &Expression {
        &self.offset
    }

    /// The bytes to copy into the memory.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// The 𝗌𝗍𝖺𝗋𝗍 component of a module declares the function index of a start
/// function that is automatically invoked when the module is instantiated,
/// after tables and memories have been initialized.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#start-function>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Start {
    function: FunctionIndex,
}

impl Start {
    /// Creates a new instance of `Start` referencing the given function.
    pub fn new(function: FunctionIndex) -> Self {
        Start { function }
    }

    /// The index of the function to run at module instantiation.
    pub fn function(&self) -> FunctionIndex {
        self.function
    }
}

impl From<u32> for Start {
    fn from(function: u32) -> Self {
        Start { function }
    }
}

/// The 𝖾𝗑𝗉𝗈𝗋𝗍𝗌 component of a module defines a set of exports that become
/// accessible to the host environment once the module has been instantiated.
/// Each export is labeled by a unique name.
/// Exportable definitions are functions, tables, memories, and globals,
/// which are referenced through a respective descriptor.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#exports>
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Export {
    name: Name,
    description: ExportDescription,
}

impl Export {
    /// Create a new instance of an `Export` with the given name and description.
    pub fn new(name: Name, description: ExportDescription) -> Self {
        Export { name, description }
    }

    /// Create a new `Export` for a function.
    pub fn function(name: Name, function: FunctionIndex) -> Self {
        Export {
            name,
            description: ExportDescription::Function(function),
        }
    }

    /// Create a new `Export` for a table.
    pub fn table(name: Name, table: TableIndex) -> Self {
        Export {
            name,
            description: ExportDescription::Table(table),
        }
    }

    /// Create a new `Export` for a memory.
    pub fn memory(name: Name, memory: MemoryIndex) -> Self {
        Export {
            name,
            description: ExportDescription::Memory(memory),
        }
    }

    /// Create a new `Export` for a global.
    pub fn global(name: Name, global: GlobalIndex) -> Self {
        Export {
            name,
            description: ExportDescription::Global(global),
        }
    }

    /// The name of the export.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The description of the export.
    pub fn description(&self) -> &ExportDescription {
        &self.description
    }
}

/// Exportable definitions are functions, tables, memories, and globals,
/// referenced by an index into the unified index space for their kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExportDescription {
    Function(FunctionIndex),
    Table(TableIndex),
    Memory(MemoryIndex),
    Global(GlobalIndex),
}

/// Each import is labeled by a two-level name space,
/// consisting of a 𝗆𝗈𝖽𝗎𝗅𝖾 name and a 𝗇𝖺𝗆𝖾 for an entity within that module.
/// Importable definitions are functions, tables, memories, and globals.
/// Each import is specified by a descriptor with a respective type that a
/// definition provided during instantiation is required to match.
/// Every import defines an index in the respective index space.
/// In each index space, the indices of imports go before the first index of
/// any definition contained in the module itself.
///
/// See <https://webassembly.github.io/spec/core/syntax/modules.html#imports>
#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    module: Name,
    name: Name,
    description: ImportDescription,
}

impl Import {
    /// Creates a new import.
    pub fn new(module: Name, name: Name, description: ImportDescription) -> Self {
        Import {
            module,
            name,
            description,
        }
    }

    /// Create a new `Import` of a function with the given type index.
    pub fn function(module: Name, name: Name, kind: TypeIndex) -> Self {
        Import {
            module,
            name,
            description: ImportDescription::Function(kind),
        }
    }

    /// Create a new `Import` of a table.
    pub fn table(module: Name, name: Name, kind: TableType) -> Self {
        Import {
            module,
            name,
            description: ImportDescription::Table(kind),
        }
    }

    /// Create a new `Import` of a memory.
    pub fn memory(module: Name, name: Name, kind: MemoryType) -> Self {
        Import {
            module,
            name,
            description: ImportDescription::Memory(kind),
        }
    }

    /// Create a new `Import` of a global.
    pub fn global(module: Name, name: Name, kind: GlobalType) -> Self {
        Import {
            module,
            name,
            description: ImportDescription::Global(kind),
        }
    }

    /// The name of the module (i.e. namespace).
    pub fn module(&self) -> &Name {
        &self.module
    }

    /// The name of the import.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The description of the import.
    pub fn description(&self) -> &ImportDescription {
        &self.description
    }

    /// The external kind of the import.
    pub fn kind(&self) -> ImportKind {
        match self.description {
            ImportDescription::Function(_) => ImportKind::Function,
            ImportDescription::Table(_) => ImportKind::Table,
            ImportDescription::Memory(_) => ImportKind::Memory,
            ImportDescription::Global(_) => ImportKind::Global,
        }
    }
}

/// Each import is specified by a descriptor with a respective type that a
/// definition provided during instantiation is required to match.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ImportDescription {
    Function(TypeIndex),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

/// The external kind of an import or export: one of function, table,
/// memory, or global.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImportKind {
    Function,
    Table,
    Memory,
    Global,
}

/// The binary encoding of modules is organized into sections.
/// Most sections correspond to one component of a module record,
/// except that function definitions are split into two sections,
/// separating their type declarations in the function section from their
/// bodies in the code section.
///
/// See <https://webassembly.github.io/spec/core/binary/modules.html>
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ModuleSection {
    /// Custom sections have the id 0.
    /// They may appear anywhere in a module and are ignored by the
    /// WebAssembly semantics.
    Custom = 0,
    /// The type section has the id 1.
    /// It decodes into a vector of function types that represent the 𝗍𝗒𝗉𝖾𝗌
    /// component of a module.
    Type,
    /// The import section has the id 2.
    /// It decodes into a vector of imports that represent the 𝗂𝗆𝗉𝗈𝗋𝗍𝗌
    /// component of a module.
    Import,
    /// The function section has the id 3.
    /// It decodes into a vector of type indices that represent the 𝗍𝗒𝗉𝖾
    /// fields of the functions in the 𝖿𝗎𝗇𝖼𝗌 component of a module.
    /// The 𝗅𝗈𝖼𝖺𝗅𝗌 and 𝖻𝗈𝖽𝗒 fields of the respective functions are encoded
    /// separately in the code section.
    Function,
    /// The table section has the id 4.
    Table,
    /// The memory section has the id 5.
    Memory,
    /// The global section has the id 6.
    Global,
    /// The export section has the id 7.
    Export,
    /// The start section has the id 8.
    Start,
    /// The element section has the id 9.
    Element,
    /// The code section has the id 10.
    /// It decodes into a vector of code entries that are pairs of local
    /// groups and expressions, representing the 𝗅𝗈𝖼𝖺𝗅𝗌 and 𝖻𝗈𝖽𝗒 fields of
    /// the functions in the 𝖿𝗎𝗇𝖼𝗌 component of a module.
    Code,
    /// The data section has the id 11.
    Data,
}

impl ModuleSection {
    /// All sections in canonical id order.
    pub fn ordered() -> [ModuleSection; 12] {
        [
            ModuleSection::Custom,
            ModuleSection::Type,
            ModuleSection::Import,
            ModuleSection::Function,
            ModuleSection::Table,
            ModuleSection::Memory,
            ModuleSection::Global,
            ModuleSection::Export,
            ModuleSection::Start,
            ModuleSection::Element,
            ModuleSection::Code,
            ModuleSection::Data,
        ]
    }

    /// The section with the given id, if the id is known.
    pub fn from_id(id: u8) -> Option<ModuleSection> {
        ModuleSection::ordered().into_iter().find(|s| *s as u8 == id)
    }

    /// The section id used in the binary format.
    pub fn id(&self) -> u8 {
        *self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_equality_when_empty() {
        assert_eq!(Module::builder().build(), Module::empty());
    }

    #[test]
    fn module_equality_for_custom_sections() {
        let mut builder = Module::builder();
        builder.add_custom_section(
            ModuleSection::Data,
            Custom::new("version".into(), b"0.0.1".to_vec()),
        );

        let module = builder.build();

        assert_eq!(module, module.clone());
        assert_ne!(module, Module::empty());
    }

    #[test]
    fn module_equality_not_same_custom_sections() {
        let mut builder = Module::builder();
        builder.add_custom_section(
            ModuleSection::Data,
            Custom::new("version".into(), b"0.0.1".to_vec()),
        );

        let mut other_builder = Module::builder();
        other_builder.add_custom_section(
            ModuleSection::Export,
            Custom::new("version".into(), b"0.0.1".to_vec()),
        );

        assert_ne!(builder.build(), other_builder.build());
    }

    #[test]
    fn function_index_space_starts_after_imports() {
        let mut builder = Module::builder();

        builder
            .add_import(Import::function("env".into(), "callback".into(), 0))
            .unwrap();

        let index = builder
            .add_function(Function::new(0, vec![], Expression::empty()))
            .unwrap();

        assert_eq!(index, 1);
    }

    #[test]
    fn import_index_spaces_are_independent() {
        let mut builder = Module::builder();

        builder
            .add_import(Import::function("env".into(), "callback".into(), 0))
            .unwrap();

        let index = builder
            .add_import(Import::memory(
                "env".into(),
                "memory".into(),
                MemoryType::new(Limit::unbounded(1)),
            ))
            .unwrap();

        assert_eq!(index, 0);
    }

    #[test]
    fn section_ids_round_trip() {
        for section in ModuleSection::ordered() {
            assert_eq!(ModuleSection::from_id(section.id()), Some(section));
        }

        assert_eq!(ModuleSection::from_id(12), None);
    }

    #[test]
    fn flattened_locals_expand_groups() {
        let function = Function::new(
            0,
            vec![
                LocalGroup::new(2, ValueType::I32),
                LocalGroup::new(1, ValueType::F64),
            ],
            Expression::empty(),
        );

        let locals: Vec<ValueType> = function.flattened_locals().collect();

        assert_eq!(locals, vec![ValueType::I32, ValueType::I32, ValueType::F64]);
    }
}
