//! Lowering of `(module …)` S-expressions to the module data model.
//!
//! Assembly is two-phase. A survey pass walks the module fields, parses the
//! explicit type definitions, and binds every `$`-identifier to its final
//! index — imports first, then local definitions, separately per index
//! space. The lowering pass then translates each field, resolving uses
//! against the completed contexts, so forward references need no patching.

use crate::diag::{Diagnostic, DiagnosticKind, Log};
use crate::model::{
    Data, Element, ElementKind, Export, ExportDescription, Expression, Function, FunctionType,
    Global, GlobalType, Import, Instruction, Limit, LocalGroup, Memory, MemoryType, Module,
    Mutability, NameSection, NumericInstruction, Table, TableType, TypeIndex, ValueType,
    VariableInstruction,
};
use crate::text::context::IdentifierContext;
use crate::text::instructions::BodyAssembler;
use crate::text::lexer::tokenize;
use crate::text::sexpr::{self, SExpr, SList};
use crate::text::token::TokenKind;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Bytes per linear-memory page.
const PAGE_SIZE: usize = 65536;

/// The result of assembling a text module:
/// a best-effort module and a flag recording whether any diagnostic of
/// severity `Error` was reported.
#[derive(Debug)]
pub struct Assembly {
    pub module: Module,
    pub failed: bool,
}

/// Assembly failed; the collected diagnostics explain why.
#[derive(Error, Debug)]
#[error("assembly failed with {} diagnostic(s)", .diagnostics.len())]
pub struct AssembleError {
    pub diagnostics: Vec<Diagnostic>,
}

/// Assembles text-format source into a module,
/// reporting diagnostics to the given log.
/// Assembly continues past recoverable defects;
/// the returned `failed` flag records whether any error was reported.
pub fn assemble(source: &str, log: &mut dyn Log) -> Assembly {
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(diagnostic) => {
            log.report(diagnostic);

            return Assembly {
                module: Module::empty(),
                failed: true,
            };
        }
    };

    let roots = match sexpr::parse(tokens) {
        Ok(roots) => roots,
        Err(diagnostic) => {
            log.report(diagnostic);

            return Assembly {
                module: Module::empty(),
                failed: true,
            };
        }
    };

    let module = match roots.as_slice() {
        [SExpr::List(list)] if list.keyword == "module" => list,
        [other] => {
            let (line, column) = other.position();

            log.report(Diagnostic::error(
                DiagnosticKind::Syntax,
                format!("expected `(module …)`, found {}", other.describe()),
                line,
                column,
            ));

            return Assembly {
                module: Module::empty(),
                failed: true,
            };
        }
        _ => {
            log.report(Diagnostic::error(
                DiagnosticKind::Syntax,
                "expected exactly one `(module …)` form".to_string(),
                1,
                1,
            ));

            return Assembly {
                module: Module::empty(),
                failed: true,
            };
        }
    };

    let mut assembler = Assembler::new(log);
    let module = assembler.assemble_module(module);

    Assembly {
        module,
        failed: assembler.failed,
    }
}

/// Assembles text-format source into a module,
/// collecting diagnostics internally.
///
/// # Examples
/// ```rust
/// use wasmkit::assemble_text;
///
/// let module = assemble_text("(module (memory 1))").unwrap();
///
/// assert_eq!(module.memories().map(<[_]>::len), Some(1));
/// assert!(assemble_text("(module (memory))").is_err());
/// ```
pub fn assemble_text(source: &str) -> Result<Module, AssembleError> {
    let mut log = crate::diag::VecLog::new();
    let assembly = assemble(source, &mut log);

    if assembly.failed {
        Err(AssembleError {
            diagnostics: log.into_diagnostics(),
        })
    } else {
        Ok(assembly.module)
    }
}

/// The index spaces with `$`-identifier contexts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Space {
    Type,
    Function,
    Table,
    Memory,
    Global,
    Local,
    Label,
}

pub(crate) struct Assembler<'log> {
    log: &'log mut dyn Log,
    pub(crate) failed: bool,
    pub(crate) types: IdentifierContext,
    pub(crate) functions: IdentifierContext,
    pub(crate) tables: IdentifierContext,
    pub(crate) memories: IdentifierContext,
    pub(crate) globals: IdentifierContext,
    pub(crate) type_defs: Vec<FunctionType>,
    /// Function index → type index, for start-function validation.
    function_signatures: HashMap<u32, TypeIndex>,
    /// Types of imported globals, indexed by global index,
    /// for initializer validation.
    global_imports: Vec<GlobalType>,
    names: NameSection,
    export_names: HashSet<String>,
}

/// One surveyed module field: its assigned index (for definition fields)
/// and whether it lowers to an import.
struct FieldPlan {
    index: Option<u32>,
    is_import: bool,
}

impl<'log> Assembler<'log> {
    fn new(log: &'log mut dyn Log) -> Self {
        Assembler {
            log,
            failed: false,
            types: IdentifierContext::new(),
            functions: IdentifierContext::new(),
            tables: IdentifierContext::new(),
            memories: IdentifierContext::new(),
            globals: IdentifierContext::new(),
            type_defs: Vec::new(),
            function_signatures: HashMap::new(),
            global_imports: Vec::new(),
            names: NameSection::empty(),
            export_names: HashSet::new(),
        }
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity() == crate::diag::Severity::Error {
            self.failed = true;
        }

        self.log.report(diagnostic);
    }

    pub(crate) fn error_at(
        &mut self,
        kind: DiagnosticKind,
        message: String,
        position: (usize, usize),
    ) {
        self.report(Diagnostic::error(kind, message, position.0, position.1));
    }

    fn assemble_module(&mut self, module: &SList) -> Module {
        let mut items = module.items.as_slice();

        if let Some(SExpr::Token(token)) = items.first() {
            if let TokenKind::Identifier(name) = &token.kind {
                self.names.set_module_name(Some(name.as_str().into()));
                items = &items[1..];
            }
        }

        let mut fields = Vec::new();

        for item in items {
            match item {
                SExpr::List(list) => fields.push(list),
                other => {
                    let (line, column) = other.position();

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("expected a module field, found {}", other.describe()),
                        (line, column),
                    );
                }
            }
        }

        let plans = self.survey(&fields);
        self.lower(&fields, &plans)
    }

    /// The survey pass: parses explicit type definitions and assigns every
    /// definition field its final index, binding `$`-identifiers.
    fn survey(&mut self, fields: &[&SList]) -> Vec<FieldPlan> {
        for field in fields.iter().filter(|field| field.keyword == "type") {
            self.survey_type(field);
        }

        // Classify definition fields and count imports per space.
        let mut classified = Vec::with_capacity(fields.len());
        let mut import_totals: HashMap<Space, u32> = HashMap::new();

        for field in fields {
            let entry = self.classify(field);

            if let Some((space, true, _)) = entry {
                *import_totals.entry(space).or_default() += 1;
            }

            classified.push(entry);
        }

        // Assign indices: imports in order of appearance precede local
        // definitions in each index space.
        let mut import_counters: HashMap<Space, u32> = HashMap::new();
        let mut local_counters: HashMap<Space, u32> = HashMap::new();
        let mut plans = Vec::with_capacity(fields.len());

        for (field, entry) in fields.iter().zip(classified) {
            let plan = match entry {
                None => FieldPlan {
                    index: None,
                    is_import: false,
                },
                Some((space, is_import, name)) => {
                    let counter = if is_import {
                        &mut import_counters
                    } else {
                        &mut local_counters
                    };
                    let position = counter.entry(space).or_default();
                    let index = if is_import {
                        *position
                    } else {
                        import_totals.get(&space).copied().unwrap_or(0) + *position
                    };

                    *position += 1;

                    if let Some(name) = name {
                        self.bind(space, &name, index, (field.line, field.column));
                    }

                    FieldPlan {
                        index: Some(index),
                        is_import,
                    }
                }
            };

            plans.push(plan);
        }

        plans
    }

    /// Parses an explicit `(type $id? (func …))` field into the type section.
    fn survey_type(&mut self, field: &SList) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        let name = cursor.take_identifier();
        let index = self.type_defs.len() as u32;

        if let Some(name) = name {
            if !self.types.define(&name, index) {
                self.error_at(
                    DiagnosticKind::DuplicateIdentifier,
                    format!("type `${name}` is already defined"),
                    cursor.position(),
                );
            }
        }

        let signature = match cursor.take_list("func") {
            Some(func) => {
                let mut inner = Cursor::new(&func.items, (func.line, func.column));
                let (parameters, _) = self.parse_parameters(&mut inner);
                let results = self.parse_results(&mut inner);

                if let Some(extra) = inner.next() {
                    let (line, column) = extra.position();

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("unexpected {} in function type", extra.describe()),
                        (line, column),
                    );
                }

                FunctionType::new(parameters.into(), results.into())
            }
            None => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    "expected `(func …)` in type definition".to_string(),
                    cursor.position(),
                );

                FunctionType::runnable()
            }
        };

        self.type_defs.push(signature);
    }

    /// Classifies a field as (space, is-import, name) when it defines an
    /// entry in an index space.
    fn classify(&mut self, field: &SList) -> Option<(Space, bool, Option<String>)> {
        match field.keyword.as_str() {
            "import" => {
                let descriptor = field.items.iter().find_map(|item| match item {
                    SExpr::List(list) => space_of(&list.keyword).map(|space| (space, list)),
                    _ => None,
                });

                match descriptor {
                    Some((space, list)) => {
                        let name = match list.items.first() {
                            Some(SExpr::Token(token)) => match &token.kind {
                                TokenKind::Identifier(name) => Some(name.clone()),
                                _ => None,
                            },
                            _ => None,
                        };

                        Some((space, true, name))
                    }
                    None => {
                        self.error_at(
                            DiagnosticKind::Syntax,
                            "import requires a descriptor: `(func …)`, `(table …)`, `(memory …)`, or `(global …)`".to_string(),
                            (field.line, field.column),
                        );

                        None
                    }
                }
            }
            keyword => {
                let space = space_of(keyword)?;
                let name = match field.items.first() {
                    Some(SExpr::Token(token)) => match &token.kind {
                        TokenKind::Identifier(name) => Some(name.clone()),
                        _ => None,
                    },
                    _ => None,
                };
                let is_import = field.items.iter().any(|item| {
                    matches!(item, SExpr::List(list) if list.keyword == "import")
                });

                Some((space, is_import, name))
            }
        }
    }

    fn bind(&mut self, space: Space, name: &str, index: u32, position: (usize, usize)) {
        let context = match space {
            Space::Function => &mut self.functions,
            Space::Table => &mut self.tables,
            Space::Memory => &mut self.memories,
            Space::Global => &mut self.globals,
            Space::Type => &mut self.types,
            Space::Local | Space::Label => return,
        };

        if !context.define(name, index) {
            self.error_at(
                DiagnosticKind::DuplicateIdentifier,
                format!("`${name}` is already defined in this index space"),
                position,
            );
        } else if space == Space::Function {
            self.names.name_function(index, name.into());
        }
    }

    pub(crate) fn context(&self, space: Space) -> Option<&IdentifierContext> {
        match space {
            Space::Function => Some(&self.functions),
            Space::Table => Some(&self.tables),
            Space::Memory => Some(&self.memories),
            Space::Global => Some(&self.globals),
            Space::Type => Some(&self.types),
            Space::Local | Space::Label => None,
        }
    }

    /// The lowering pass: translates every field against the completed
    /// contexts and builds the module.
    fn lower(&mut self, fields: &[&SList], plans: &[FieldPlan]) -> Module {
        let mut imports = Vec::new();
        let mut functions = Vec::new();
        let mut tables = Vec::new();
        let mut memories = Vec::new();
        let mut globals = Vec::new();
        let mut exports = Vec::new();
        let mut elements = Vec::new();
        let mut data = Vec::new();
        let mut start = None;

        for (field, plan) in fields.iter().zip(plans) {
            match field.keyword.as_str() {
                "type" => {}
                "import" => self.lower_import(field, &mut imports),
                "func" => self.lower_function(
                    field,
                    plan,
                    &mut imports,
                    &mut functions,
                    &mut exports,
                ),
                "table" => self.lower_table(field, plan, &mut imports, &mut tables, &mut exports),
                "memory" => self.lower_memory(
                    field,
                    plan,
                    &mut imports,
                    &mut memories,
                    &mut data,
                    &mut exports,
                ),
                "global" => {
                    self.lower_global(field, plan, &mut imports, &mut globals, &mut exports)
                }
                "export" => self.lower_export(field, &mut exports),
                "start" => self.lower_start(field, &mut start),
                "elem" => self.lower_element(field, &mut elements),
                "data" => self.lower_data(field, &mut data),
                other => self.error_at(
                    DiagnosticKind::Syntax,
                    format!("unknown module field `{other}`"),
                    (field.line, field.column),
                ),
            }
        }

        if let Some(start) = &start {
            self.validate_start(start, fields);
        }

        let mut builder = Module::builder();

        if !self.type_defs.is_empty() {
            builder.set_function_types(Some(std::mem::take(&mut self.type_defs)));
        }
        if !imports.is_empty() {
            builder.set_imports(Some(imports));
        }
        if !functions.is_empty() {
            builder.set_functions(Some(functions));
        }
        if !tables.is_empty() {
            builder.set_tables(Some(tables));
        }
        if !memories.is_empty() {
            builder.set_memories(Some(memories));
        }
        if !globals.is_empty() {
            builder.set_globals(Some(globals));
        }
        if !exports.is_empty() {
            builder.set_exports(Some(exports));
        }
        builder.set_start(start);
        if !elements.is_empty() {
            builder.set_elements(Some(elements));
        }
        if !data.is_empty() {
            builder.set_data(Some(data));
        }
        if !self.names.is_empty() {
            let names = std::mem::take(&mut self.names);
            builder.set_names(&names);
        }

        builder.build()
    }

    fn lower_import(&mut self, field: &SList, imports: &mut Vec<Import>) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        let module = self.take_name(&mut cursor, "import module name");
        let name = self.take_name(&mut cursor, "import field name");
        let descriptor = match cursor.next() {
            Some(SExpr::List(list)) => list.clone(),
            other => {
                let position = other
                    .map(SExpr::position)
                    .unwrap_or((field.line, field.column));

                self.error_at(
                    DiagnosticKind::Syntax,
                    "import requires a descriptor list".to_string(),
                    position,
                );

                return;
            }
        };

        let mut inner = Cursor::new(&descriptor.items, (descriptor.line, descriptor.column));
        inner.take_identifier();

        let (module, name) = match (module, name) {
            (Some(module), Some(name)) => (module, name),
            _ => return,
        };

        match descriptor.keyword.as_str() {
            "func" => {
                let (kind, _) = self.parse_type_use(&mut inner);
                let index = self.next_function_import_index(imports);

                self.function_signatures.insert(index, kind);
                imports.push(Import::function(module.into(), name.into(), kind));
            }
            "table" => match self.parse_table_type(&mut inner) {
                Some(kind) => imports.push(Import::table(module.into(), name.into(), kind)),
                None => {}
            },
            "memory" => match self.parse_limits(&mut inner) {
                Some(limits) => imports.push(Import::memory(
                    module.into(),
                    name.into(),
                    MemoryType::new(limits),
                )),
                None => self.error_at(
                    DiagnosticKind::Syntax,
                    "imported memory requires limits".to_string(),
                    (descriptor.line, descriptor.column),
                ),
            },
            "global" => match self.parse_global_type(&mut inner) {
                Some(kind) => {
                    self.global_imports.push(kind);
                    imports.push(Import::global(module.into(), name.into(), kind));
                }
                None => {}
            },
            other => self.error_at(
                DiagnosticKind::Syntax,
                format!("unknown import descriptor `{other}`"),
                (descriptor.line, descriptor.column),
            ),
        }
    }

    fn lower_function(
        &mut self,
        field: &SList,
        plan: &FieldPlan,
        imports: &mut Vec<Import>,
        functions: &mut Vec<Function>,
        exports: &mut Vec<Export>,
    ) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        cursor.take_identifier();

        let index = plan.index.unwrap_or(0);
        let inline_import = self.take_inline_sugar(&mut cursor, index, ExportDescription::Function, exports);
        let (kind, parameter_names) = self.parse_type_use(&mut cursor);

        self.function_signatures.insert(index, kind);

        if let Some((module, name)) = inline_import {
            if cursor.peek().is_some() {
                self.error_at(
                    DiagnosticKind::Syntax,
                    "an imported function cannot declare locals or a body".to_string(),
                    cursor.position(),
                );
            }

            imports.push(Import::function(module.into(), name.into(), kind));

            return;
        }

        // Locals follow the type use; names bind after the parameters.
        let mut locals = Vec::new();
        let mut local_context = IdentifierContext::new();
        let mut local_index = 0u32;

        for name in &parameter_names {
            if let Some(name) = name {
                if !local_context.define(name, local_index) {
                    self.error_at(
                        DiagnosticKind::DuplicateIdentifier,
                        format!("local `${name}` is already defined"),
                        (field.line, field.column),
                    );
                }

                self.names.name_local(index, local_index, name.as_str().into());
            }

            local_index += 1;
        }

        while let Some(local) = cursor.take_list("local") {
            let mut inner = Cursor::new(&local.items, (local.line, local.column));

            if let Some(name) = inner.take_identifier() {
                let kind = self.take_value_type(&mut inner, "local type");

                if !local_context.define(&name, local_index) {
                    self.error_at(
                        DiagnosticKind::DuplicateIdentifier,
                        format!("local `${name}` is already defined"),
                        (local.line, local.column),
                    );
                }

                self.names.name_local(index, local_index, name.into());
                locals.push(LocalGroup::new(1, kind));
                local_index += 1;
            } else {
                while inner.peek().is_some() {
                    let kind = self.take_value_type(&mut inner, "local type");

                    locals.push(LocalGroup::new(1, kind));
                    local_index += 1;
                }
            }
        }

        let mut body = BodyAssembler::new(self, local_context);
        let expression = body.assemble(cursor.remaining(), cursor.position());

        functions.push(Function::new(kind, locals, expression));
    }

    fn lower_table(
        &mut self,
        field: &SList,
        plan: &FieldPlan,
        imports: &mut Vec<Import>,
        tables: &mut Vec<Table>,
        exports: &mut Vec<Export>,
    ) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        cursor.take_identifier();

        let index = plan.index.unwrap_or(0);
        let inline_import =
            self.take_inline_sugar(&mut cursor, index, ExportDescription::Table, exports);
        let kind = self.parse_table_type(&mut cursor);

        match (inline_import, kind) {
            (Some((module, name)), Some(kind)) => {
                imports.push(Import::table(module.into(), name.into(), kind));
            }
            (Some(_), None) => self.error_at(
                DiagnosticKind::Syntax,
                "imported table requires limits".to_string(),
                (field.line, field.column),
            ),
            (None, Some(kind)) => tables.push(Table::new(kind)),
            (None, None) => self.error_at(
                DiagnosticKind::Syntax,
                "table requires limits".to_string(),
                (field.line, field.column),
            ),
        }
    }

    fn lower_memory(
        &mut self,
        field: &SList,
        plan: &FieldPlan,
        imports: &mut Vec<Import>,
        memories: &mut Vec<Memory>,
        data: &mut Vec<Data>,
        exports: &mut Vec<Export>,
    ) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        cursor.take_identifier();

        let index = plan.index.unwrap_or(0);
        let inline_import =
            self.take_inline_sugar(&mut cursor, index, ExportDescription::Memory, exports);
        let limits = self.parse_limits(&mut cursor);

        // Inline data fixes the limits to exactly the pages it occupies.
        let inline_data = cursor.take_list("data").map(|list| {
            let mut bytes = Vec::new();
            let mut inner = Cursor::new(&list.items, (list.line, list.column));

            while let Some(item) = inner.next() {
                match item {
                    SExpr::Token(token) => match &token.kind {
                        TokenKind::String(payload) => bytes.extend_from_slice(payload),
                        _ => self.error_at(
                            DiagnosticKind::Syntax,
                            format!("expected a string literal, found {}", token.describe()),
                            (token.line, token.column),
                        ),
                    },
                    other => {
                        let (line, column) = other.position();

                        self.error_at(
                            DiagnosticKind::Syntax,
                            format!("expected a string literal, found {}", other.describe()),
                            (line, column),
                        );
                    }
                }
            }

            bytes
        });

        if let Some(extra) = cursor.next() {
            let (line, column) = extra.position();

            self.error_at(
                DiagnosticKind::Syntax,
                format!("unexpected {} in memory field", extra.describe()),
                (line, column),
            );
        }

        match (inline_import, limits, inline_data) {
            (Some((module, name)), Some(limits), None) => {
                imports.push(Import::memory(
                    module.into(),
                    name.into(),
                    MemoryType::new(limits),
                ));
            }
            (Some(_), None, _) => self.error_at(
                DiagnosticKind::Syntax,
                "imported memory requires limits".to_string(),
                (field.line, field.column),
            ),
            (Some(_), Some(_), Some(_)) => self.error_at(
                DiagnosticKind::Syntax,
                "imported memory cannot carry inline data".to_string(),
                (field.line, field.column),
            ),
            (None, Some(_), Some(_)) => self.error_at(
                DiagnosticKind::Syntax,
                "memory with inline data must not declare limits".to_string(),
                (field.line, field.column),
            ),
            (None, Some(limits), None) => {
                self.validate_limits(&limits, (field.line, field.column));
                memories.push(Memory::new(MemoryType::new(limits)));
            }
            (None, None, Some(bytes)) => {
                let pages = (bytes.len() + PAGE_SIZE - 1) / PAGE_SIZE;
                let limits = Limit::bounded(pages as u32, pages as u32);

                memories.push(Memory::new(MemoryType::new(limits)));
                data.push(Data::new(
                    index,
                    Expression::new(vec![Instruction::Numeric(
                        NumericInstruction::I32Constant(0),
                    )]),
                    bytes,
                ));
            }
            (None, None, None) => self.error_at(
                DiagnosticKind::Syntax,
                "memory requires limits".to_string(),
                (field.line, field.column),
            ),
        }
    }

    fn lower_global(
        &mut self,
        field: &SList,
        plan: &FieldPlan,
        imports: &mut Vec<Import>,
        globals: &mut Vec<Global>,
        exports: &mut Vec<Export>,
    ) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        cursor.take_identifier();

        let index = plan.index.unwrap_or(0);
        let inline_import =
            self.take_inline_sugar(&mut cursor, index, ExportDescription::Global, exports);
        let kind = match self.parse_global_type(&mut cursor) {
            Some(kind) => kind,
            None => return,
        };

        if let Some((module, name)) = inline_import {
            self.global_imports.push(kind);
            imports.push(Import::global(module.into(), name.into(), kind));

            return;
        }

        let locals = IdentifierContext::new();
        let mut body = BodyAssembler::new(self, locals);
        let initializer = body.assemble(cursor.remaining(), cursor.position());

        self.validate_initializer(&initializer, kind.kind(), (field.line, field.column));
        globals.push(Global::new(kind, initializer));
    }

    fn lower_export(&mut self, field: &SList, exports: &mut Vec<Export>) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        let name = match self.take_name(&mut cursor, "export name") {
            Some(name) => name,
            None => return,
        };

        let descriptor = match cursor.next() {
            Some(SExpr::List(list)) => list.clone(),
            other => {
                let position = other
                    .map(SExpr::position)
                    .unwrap_or((field.line, field.column));

                self.error_at(
                    DiagnosticKind::Syntax,
                    "export requires a descriptor list".to_string(),
                    position,
                );

                return;
            }
        };

        let space = match space_of(&descriptor.keyword) {
            Some(space) => space,
            None => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    format!("unknown export descriptor `{}`", descriptor.keyword),
                    (descriptor.line, descriptor.column),
                );

                return;
            }
        };

        let mut inner = Cursor::new(&descriptor.items, (descriptor.line, descriptor.column));
        let index = self.index_use(&mut inner, space);
        let description = match space {
            Space::Function => ExportDescription::Function(index),
            Space::Table => ExportDescription::Table(index),
            Space::Memory => ExportDescription::Memory(index),
            Space::Global => ExportDescription::Global(index),
            Space::Type | Space::Local | Space::Label => return,
        };

        self.record_export(&name, (field.line, field.column));
        exports.push(Export::new(name.into(), description));
    }

    fn lower_start(&mut self, field: &SList, start: &mut Option<crate::Start>) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        let index = self.index_use(&mut cursor, Space::Function);

        if start.is_some() {
            self.error_at(
                DiagnosticKind::Validation,
                "a module may declare at most one start function".to_string(),
                (field.line, field.column),
            );
        }

        *start = Some(crate::Start::new(index));
    }

    fn lower_element(&mut self, field: &SList, elements: &mut Vec<Element>) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        let table = self.optional_index_use(&mut cursor, Space::Table).unwrap_or(0);
        let offset = self.parse_offset(&mut cursor, (field.line, field.column));
        let mut functions = Vec::new();

        while cursor.peek().is_some() {
            functions.push(self.index_use(&mut cursor, Space::Function));
        }

        elements.push(Element::new(table, offset, functions));
    }

    fn lower_data(&mut self, field: &SList, data: &mut Vec<Data>) {
        let mut cursor = Cursor::new(&field.items, (field.line, field.column));
        let memory = self.optional_index_use(&mut cursor, Space::Memory).unwrap_or(0);
        let offset = self.parse_offset(&mut cursor, (field.line, field.column));
        let mut bytes = Vec::new();

        while let Some(item) = cursor.next() {
            match item {
                SExpr::Token(token) => match &token.kind {
                    TokenKind::String(payload) => bytes.extend_from_slice(payload),
                    _ => self.error_at(
                        DiagnosticKind::Syntax,
                        format!("expected a string literal, found {}", token.describe()),
                        (token.line, token.column),
                    ),
                },
                other => {
                    let (line, column) = other.position();

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("expected a string literal, found {}", other.describe()),
                        (line, column),
                    );
                }
            }
        }

        data.push(Data::new(memory, offset, bytes));
    }

    /// Parses a segment offset: `(offset instr*)` or a single folded
    /// instruction, validated as an i32 initializer expression.
    fn parse_offset(&mut self, cursor: &mut Cursor, position: (usize, usize)) -> Expression {
        let expression = match cursor.peek() {
            Some(SExpr::List(list)) if list.keyword == "offset" => {
                let list = list.clone();
                cursor.next();

                let locals = IdentifierContext::new();
                let mut body = BodyAssembler::new(self, locals);

                body.assemble(&list.items, (list.line, list.column))
            }
            Some(SExpr::List(_)) => {
                let item = cursor.next().cloned().into_iter().collect::<Vec<_>>();
                let locals = IdentifierContext::new();
                let mut body = BodyAssembler::new(self, locals);

                body.assemble(&item, position)
            }
            _ => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    "segment requires an offset expression".to_string(),
                    cursor.position(),
                );

                Expression::new(vec![Instruction::Numeric(NumericInstruction::I32Constant(
                    0,
                ))])
            }
        };

        self.validate_initializer(&expression, ValueType::I32, position);

        expression
    }

    /// Consumes inline `(export "name")` and `(import "module" "name")`
    /// sugar on a definition field.
    /// Exports register immediately at the field's index;
    /// an import promotes the whole field.
    fn take_inline_sugar(
        &mut self,
        cursor: &mut Cursor,
        index: u32,
        describe: fn(u32) -> ExportDescription,
        exports: &mut Vec<Export>,
    ) -> Option<(String, String)> {
        let mut import = None;

        loop {
            if let Some(export) = cursor.take_list("export") {
                let mut inner = Cursor::new(&export.items, (export.line, export.column));

                if let Some(name) = self.take_name(&mut inner, "export name") {
                    self.record_export(&name, (export.line, export.column));
                    exports.push(Export::new(name.into(), describe(index)));
                }

                continue;
            }

            if import.is_none() {
                if let Some(list) = cursor.take_list("import") {
                    let mut inner = Cursor::new(&list.items, (list.line, list.column));
                    let module = self.take_name(&mut inner, "import module name");
                    let name = self.take_name(&mut inner, "import field name");

                    if let (Some(module), Some(name)) = (module, name) {
                        import = Some((module, name));
                    }

                    continue;
                }
            }

            return import;
        }
    }

    fn record_export(&mut self, name: &str, position: (usize, usize)) {
        if !self.export_names.insert(name.to_string()) {
            self.error_at(
                DiagnosticKind::Validation,
                format!("duplicate export name `{name}`"),
                position,
            );
        }
    }

    /// Parses a type use: `(type X)?` and/or inline
    /// `(param …)* (result …)*` clauses.
    /// Both forms together must agree structurally.
    /// Returns the resolved type index and the declared parameter names.
    pub(crate) fn parse_type_use(
        &mut self,
        cursor: &mut Cursor,
    ) -> (TypeIndex, Vec<Option<String>>) {
        let reference = cursor.take_list("type").map(|list| {
            let mut inner = Cursor::new(&list.items, (list.line, list.column));

            self.index_use(&mut inner, Space::Type)
        });

        let (parameters, names) = self.parse_parameters(cursor);
        let results = self.parse_results(cursor);
        let inline = FunctionType::new(parameters.into(), results.into());
        let inline_is_empty =
            inline.parameters().is_empty() && inline.results().is_empty();

        match reference {
            Some(index) => {
                let declared = self.type_defs.get(index as usize);

                if !inline_is_empty && declared.is_some() && declared != Some(&inline) {
                    self.error_at(
                        DiagnosticKind::TypeMismatch,
                        format!("inline signature disagrees with type {index}"),
                        cursor.position(),
                    );
                }

                (index, names)
            }
            None => (self.intern_type(inline), names),
        }
    }

    /// Parses `(param …)*` clauses.
    /// A named parameter declares exactly one value type.
    fn parse_parameters(
        &mut self,
        cursor: &mut Cursor,
    ) -> (Vec<ValueType>, Vec<Option<String>>) {
        let mut parameters = Vec::new();
        let mut names = Vec::new();

        while let Some(param) = cursor.take_list("param") {
            let mut inner = Cursor::new(&param.items, (param.line, param.column));

            if let Some(name) = inner.take_identifier() {
                let kind = self.take_value_type(&mut inner, "parameter type");

                parameters.push(kind);
                names.push(Some(name));

                if inner.peek().is_some() {
                    self.error_at(
                        DiagnosticKind::Syntax,
                        "a named parameter declares exactly one type".to_string(),
                        (param.line, param.column),
                    );
                }
            } else {
                while inner.peek().is_some() {
                    parameters.push(self.take_value_type(&mut inner, "parameter type"));
                    names.push(None);
                }
            }
        }

        (parameters, names)
    }

    /// Parses `(result …)*` clauses.
    fn parse_results(&mut self, cursor: &mut Cursor) -> Vec<ValueType> {
        let mut results = Vec::new();

        while let Some(result) = cursor.take_list("result") {
            let mut inner = Cursor::new(&result.items, (result.line, result.column));

            while inner.peek().is_some() {
                results.push(self.take_value_type(&mut inner, "result type"));
            }
        }

        results
    }

    /// Finds a structurally equal type in the type section,
    /// or appends a new one.
    pub(crate) fn intern_type(&mut self, signature: FunctionType) -> TypeIndex {
        match self.type_defs.iter().position(|t| *t == signature) {
            Some(index) => index as u32,
            None => {
                self.type_defs.push(signature);

                (self.type_defs.len() - 1) as u32
            }
        }
    }

    /// Parses a table type: limits and the `funcref` element keyword.
    fn parse_table_type(&mut self, cursor: &mut Cursor) -> Option<TableType> {
        let limits = self.parse_limits(cursor)?;

        if let Some(SExpr::Token(token)) = cursor.peek() {
            if let TokenKind::Keyword(keyword) = &token.kind {
                if keyword == "funcref" {
                    cursor.next();
                } else {
                    let position = (token.line, token.column);
                    let keyword = keyword.clone();

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("`funcref` is the only accepted table element type, found `{keyword}`"),
                        position,
                    );
                    cursor.next();
                }
            }
        }

        self.validate_limits(&limits, cursor.position());

        Some(TableType::new(ElementKind::FunctionReference, limits))
    }

    /// Parses limits: plain unsigned integers `initial maximum?`,
    /// or a `(limits initial maximum?)` clause.
    /// Duplicate limit clauses are rejected.
    fn parse_limits(&mut self, cursor: &mut Cursor) -> Option<Limit> {
        let mut limits: Option<Limit> = None;

        loop {
            let next = match cursor.peek() {
                Some(next) => next.clone(),
                None => break,
            };

            match next {
                SExpr::Token(token) => match token.kind {
                    TokenKind::UnsignedInteger(_) => {
                        let initial = self.take_u32(cursor, "limit");
                        let maximum = match cursor.peek() {
                            Some(SExpr::Token(token))
                                if matches!(token.kind, TokenKind::UnsignedInteger(_)) =>
                            {
                                Some(self.take_u32(cursor, "limit"))
                            }
                            _ => None,
                        };

                        self.merge_limits(&mut limits, Limit::new(initial, maximum), (token.line, token.column));
                    }
                    TokenKind::SignedInteger(_) => {
                        self.error_at(
                            DiagnosticKind::Syntax,
                            "limits must be unsigned integers".to_string(),
                            (token.line, token.column),
                        );
                        cursor.next();
                    }
                    _ => break,
                },
                SExpr::List(list) if list.keyword == "limits" => {
                    cursor.next();

                    let mut inner = Cursor::new(&list.items, (list.line, list.column));
                    let initial = self.take_u32(&mut inner, "limit");
                    let maximum = match inner.peek() {
                        Some(_) => Some(self.take_u32(&mut inner, "limit")),
                        None => None,
                    };

                    self.merge_limits(&mut limits, Limit::new(initial, maximum), (list.line, list.column));
                }
                _ => break,
            }
        }

        limits
    }

    fn merge_limits(&mut self, limits: &mut Option<Limit>, parsed: Limit, position: (usize, usize)) {
        if limits.is_some() {
            self.error_at(
                DiagnosticKind::Syntax,
                "duplicate limits".to_string(),
                position,
            );
        } else {
            *limits = Some(parsed);
        }
    }

    fn validate_limits(&mut self, limits: &Limit, position: (usize, usize)) {
        if !limits.is_valid() {
            self.error_at(
                DiagnosticKind::Validation,
                format!(
                    "limit initial size {} exceeds its maximum {}",
                    limits.initial(),
                    limits.maximum().unwrap_or(0)
                ),
                position,
            );
        }
    }

    /// Parses a global type: a value type keyword or `(mut valtype)`.
    fn parse_global_type(&mut self, cursor: &mut Cursor) -> Option<GlobalType> {
        match cursor.peek() {
            Some(SExpr::List(list)) if list.keyword == "mut" => {
                let list = list.clone();
                cursor.next();

                let mut inner = Cursor::new(&list.items, (list.line, list.column));
                let kind = self.take_value_type(&mut inner, "global type");

                Some(GlobalType::mutable(kind))
            }
            Some(SExpr::Token(token))
                if matches!(&token.kind, TokenKind::Keyword(keyword) if value_type(keyword).is_some()) =>
            {
                let kind = self.take_value_type(cursor, "global type");

                Some(GlobalType::immutable(kind))
            }
            other => {
                let position = other
                    .map(SExpr::position)
                    .unwrap_or_else(|| cursor.position());

                self.error_at(
                    DiagnosticKind::Syntax,
                    "global requires a value type or `(mut …)`".to_string(),
                    position,
                );

                None
            }
        }
    }

    /// Validates an initializer expression: a single constant-producing
    /// instruction or `global.get` of an imported immutable global,
    /// with the result type the consumer expects.
    fn validate_initializer(
        &mut self,
        expression: &Expression,
        expected: ValueType,
        position: (usize, usize),
    ) {
        let produced = match expression.instructions() {
            [Instruction::Numeric(NumericInstruction::I32Constant(_))] => Some(ValueType::I32),
            [Instruction::Numeric(NumericInstruction::I64Constant(_))] => Some(ValueType::I64),
            [Instruction::Numeric(NumericInstruction::F32Constant(_))] => Some(ValueType::F32),
            [Instruction::Numeric(NumericInstruction::F64Constant(_))] => Some(ValueType::F64),
            [Instruction::Variable(VariableInstruction::GlobalGet(index))] => {
                match self.global_imports.get(*index as usize) {
                    Some(kind) if kind.mutability() == Mutability::Immutable => Some(kind.kind()),
                    Some(_) => {
                        self.error_at(
                            DiagnosticKind::Validation,
                            "initializer may only read an immutable imported global".to_string(),
                            position,
                        );

                        return;
                    }
                    None => {
                        self.error_at(
                            DiagnosticKind::Validation,
                            "initializer may only read an imported global".to_string(),
                            position,
                        );

                        return;
                    }
                }
            }
            _ => {
                self.error_at(
                    DiagnosticKind::Validation,
                    "initializer must be a single constant instruction".to_string(),
                    position,
                );

                return;
            }
        };

        if produced != Some(expected) {
            self.error_at(
                DiagnosticKind::Validation,
                format!("initializer must produce {expected:?}"),
                position,
            );
        }
    }

    fn validate_start(&mut self, start: &crate::Start, fields: &[&SList]) {
        let runnable = self
            .function_signatures
            .get(&start.function())
            .and_then(|kind| self.type_defs.get(*kind as usize))
            .map(|signature| {
                signature.parameters().is_empty() && signature.results().is_empty()
            });

        if runnable == Some(false) {
            let position = fields
                .iter()
                .find(|field| field.keyword == "start")
                .map(|field| (field.line, field.column))
                .unwrap_or((1, 1));

            self.error_at(
                DiagnosticKind::Validation,
                "the start function must take no parameters and return no results".to_string(),
                position,
            );
        }
    }

    /// Reads an index use: a numeric index or a `$`-identifier resolved in
    /// the given space. Unresolved identifiers report a suggestion.
    pub(crate) fn index_use(&mut self, cursor: &mut Cursor, space: Space) -> u32 {
        match self.optional_index_use(cursor, space) {
            Some(index) => index,
            None => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    "expected an index or `$`-identifier".to_string(),
                    cursor.position(),
                );

                0
            }
        }
    }

    /// Reads an index use when the next item is one.
    pub(crate) fn optional_index_use(&mut self, cursor: &mut Cursor, space: Space) -> Option<u32> {
        match cursor.peek() {
            Some(SExpr::Token(token)) => match &token.kind {
                TokenKind::UnsignedInteger(value) => {
                    let position = (token.line, token.column);
                    let value = *value;
                    cursor.next();

                    if value > u32::MAX as u128 {
                        self.error_at(
                            DiagnosticKind::Syntax,
                            format!("index {value} is out of range"),
                            position,
                        );

                        return Some(0);
                    }

                    Some(value as u32)
                }
                TokenKind::Identifier(name) => {
                    let name = name.clone();
                    let position = (token.line, token.column);
                    cursor.next();

                    let context = self.context(space)?;

                    match context.resolve(&name) {
                        Some(index) => Some(index),
                        None => {
                            let suggestion = context
                                .suggest(&name)
                                .map(|candidate| format!("; did you mean `${candidate}`?"))
                                .unwrap_or_default();

                            self.error_at(
                                DiagnosticKind::UnresolvedIdentifier,
                                format!("`${name}` is not defined{suggestion}"),
                                position,
                            );

                            Some(0)
                        }
                    }
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn next_function_import_index(&self, imports: &[Import]) -> u32 {
        imports
            .iter()
            .filter(|import| import.kind() == crate::ImportKind::Function)
            .count() as u32
    }

    pub(crate) fn take_u32(&mut self, cursor: &mut Cursor, what: &str) -> u32 {
        match cursor.peek() {
            Some(SExpr::Token(token)) => match token.kind {
                TokenKind::UnsignedInteger(value) if value <= u32::MAX as u128 => {
                    cursor.next();

                    value as u32
                }
                TokenKind::UnsignedInteger(value) => {
                    let position = (token.line, token.column);
                    cursor.next();

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("{what} {value} is out of range"),
                        position,
                    );

                    0
                }
                _ => {
                    let (position, description) = ((token.line, token.column), token.describe());

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("expected an unsigned integer {what}, found {description}"),
                        position,
                    );
                    cursor.next();

                    0
                }
            },
            _ => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    format!("expected an unsigned integer {what}"),
                    cursor.position(),
                );

                0
            }
        }
    }

    pub(crate) fn take_value_type(&mut self, cursor: &mut Cursor, what: &str) -> ValueType {
        match cursor.peek() {
            Some(SExpr::Token(token)) => {
                if let TokenKind::Keyword(keyword) = &token.kind {
                    if let Some(kind) = value_type(keyword) {
                        cursor.next();

                        return kind;
                    }
                }

                let (position, description) = ((token.line, token.column), token.describe());

                self.error_at(
                    DiagnosticKind::Syntax,
                    format!("expected a {what}, found {description}"),
                    position,
                );
                cursor.next();

                ValueType::I32
            }
            _ => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    format!("expected a {what}"),
                    cursor.position(),
                );

                ValueType::I32
            }
        }
    }

    /// Reads a string literal that must be valid UTF-8 (a name).
    fn take_name(&mut self, cursor: &mut Cursor, what: &str) -> Option<String> {
        match cursor.peek() {
            Some(SExpr::Token(token)) => match &token.kind {
                TokenKind::String(bytes) => match String::from_utf8(bytes.clone()) {
                    Ok(name) => {
                        cursor.next();

                        Some(name)
                    }
                    Err(_) => {
                        let position = (token.line, token.column);

                        self.error_at(
                            DiagnosticKind::Syntax,
                            format!("{what} must be valid UTF-8"),
                            position,
                        );
                        cursor.next();

                        None
                    }
                },
                _ => {
                    let (position, description) = ((token.line, token.column), token.describe());

                    self.error_at(
                        DiagnosticKind::Syntax,
                        format!("expected a {what} string, found {description}"),
                        position,
                    );

                    None
                }
            },
            _ => {
                self.error_at(
                    DiagnosticKind::Syntax,
                    format!("expected a {what} string"),
                    cursor.position(),
                );

                None
            }
        }
    }
}

/// The index space a field keyword defines into, if any.
fn space_of(keyword: &str) -> Option<Space> {
    match keyword {
        "func" => Some(Space::Function),
        "table" => Some(Space::Table),
        "memory" => Some(Space::Memory),
        "global" => Some(Space::Global),
        _ => None,
    }
}

/// The value type named by a keyword, if any.
pub(crate) fn value_type(keyword: &str) -> Option<ValueType> {
    match keyword {
        "i32" => Some(ValueType::I32),
        "i64" => Some(ValueType::I64),
        "f32" => Some(ValueType::F32),
        "f64" => Some(ValueType::F64),
        _ => None,
    }
}

/// A forward-only cursor over the items of an S-expression list.
pub(crate) struct Cursor<'items> {
    items: &'items [SExpr],
    position: usize,
    parent: (usize, usize),
}

impl<'items> Cursor<'items> {
    pub(crate) fn new(items: &'items [SExpr], parent: (usize, usize)) -> Self {
        Cursor {
            items,
            position: 0,
            parent,
        }
    }

    pub(crate) fn peek(&self) -> Option<&'items SExpr> {
        self.items.get(self.position)
    }

    pub(crate) fn next(&mut self) -> Option<&'items SExpr> {
        let item = self.items.get(self.position)?;

        self.position += 1;

        Some(item)
    }

    /// The position of the next item, or of the enclosing list when the
    /// cursor is exhausted.
    pub(crate) fn position(&self) -> (usize, usize) {
        self.peek().map(SExpr::position).unwrap_or(self.parent)
    }

    /// The items not yet consumed.
    pub(crate) fn remaining(&self) -> &'items [SExpr] {
        &self.items[self.position.min(self.items.len())..]
    }

    /// Consumes the next item when it is an identifier token.
    pub(crate) fn take_identifier(&mut self) -> Option<String> {
        match self.peek() {
            Some(SExpr::Token(token)) => match &token.kind {
                TokenKind::Identifier(name) => {
                    let name = name.clone();

                    self.next();

                    Some(name)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Consumes the next item when it is a list with the given keyword.
    pub(crate) fn take_list(&mut self, keyword: &str) -> Option<&'items SList> {
        match self.peek() {
            Some(SExpr::List(list)) if list.keyword == keyword => {
                self.next();

                Some(list)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::VecLog;
    use crate::model::{
        BlockType, ControlInstruction, ImportDescription, IntegerType, MemoryArgument,
        MemoryInstruction, SignExtension,
    };
    use crate::{emit_binary, parse_binary};

    fn diagnostics_of(source: &str) -> Vec<Diagnostic> {
        let mut log = VecLog::new();
        let assembly = assemble(source, &mut log);

        assert!(assembly.failed, "expected `{source}` to fail");

        log.into_diagnostics()
    }

    #[test]
    fn empty_module_has_zero_sections() {
        let module = assemble_text("(module)").unwrap();

        assert_eq!(module, Module::empty());

        let mut bytes = Vec::new();
        emit_binary(&module, &mut bytes).unwrap();

        assert_eq!(bytes, b"\x00\x61\x73\x6D\x01\x00\x00\x00");
    }

    #[test]
    fn named_module_carries_a_name_section() {
        let module = assemble_text("(module $m)").unwrap();
        let names = module.names().unwrap().unwrap();

        assert_eq!(names.module_name().map(|n| n.as_str()), Some("m"));
        assert_eq!(module.memories(), None);
        assert_eq!(module.functions(), None);
    }

    #[test]
    fn memory_with_inline_data() {
        let module = assemble_text(r#"(module (memory (data "hello world")))"#).unwrap();

        assert_eq!(
            module.memories(),
            Some(&[Memory::new(MemoryType::new(Limit::bounded(1, 1)))][..])
        );
        assert_eq!(
            module.data(),
            Some(
                &[Data::new(
                    0,
                    Expression::new(vec![0i32.into()]),
                    b"hello world".to_vec(),
                )][..]
            )
        );
    }

    #[test]
    fn add_function_with_inline_export() {
        let module = assemble_text(
            "(module (func (export \"add\") (param i32 i32) (result i32) \
             local.get 0 local.get 1 i32.add))",
        )
        .unwrap();

        assert_eq!(
            module.function_types(),
            Some(
                &[FunctionType::new(
                    vec![ValueType::I32, ValueType::I32].into(),
                    vec![ValueType::I32].into(),
                )][..]
            )
        );
        assert_eq!(
            module.exports(),
            Some(&[Export::function("add".into(), 0)][..])
        );
        assert_eq!(
            module.functions().unwrap()[0].body(),
            &Expression::new(vec![
                VariableInstruction::LocalGet(0).into(),
                VariableInstruction::LocalGet(1).into(),
                NumericInstruction::Add(ValueType::I32).into(),
            ])
        );
    }

    #[test]
    fn signed_limits_are_a_syntax_error() {
        let diagnostics = diagnostics_of("(module (memory (limits +10 +40)))");

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::Syntax));
    }

    #[test]
    fn duplicate_limit_clauses_are_a_syntax_error() {
        let diagnostics = diagnostics_of("(module (memory (limits 10 40) (limits 10 40)))");

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::Syntax && d.message().contains("duplicate")));
    }

    #[test]
    fn imported_memory_requires_limits() {
        let diagnostics = diagnostics_of(r#"(module (memory (import "mod" "mem")))"#);

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::Syntax && d.message().contains("limits")));
    }

    #[test]
    fn limits_clause_is_accepted() {
        let module = assemble_text("(module (memory (limits 10 40)))").unwrap();

        assert_eq!(
            module.memories(),
            Some(&[Memory::new(MemoryType::new(Limit::bounded(10, 40)))][..])
        );
    }

    #[test]
    fn forward_references_resolve() {
        let module = assemble_text(
            "(module (func $caller call $callee) (func $callee))",
        )
        .unwrap();

        assert_eq!(
            module.functions().unwrap()[0].body(),
            &Expression::new(vec![ControlInstruction::Call(1).into()])
        );
    }

    #[test]
    fn unresolved_identifier_suggests_a_spelling() {
        let diagnostics = diagnostics_of("(module (func $factorial) (start $factorail))");
        let unresolved = diagnostics
            .iter()
            .find(|d| d.kind() == DiagnosticKind::UnresolvedIdentifier)
            .unwrap();

        assert!(unresolved.message().contains("$factorial"));
    }

    #[test]
    fn duplicate_identifiers_are_reported() {
        let diagnostics = diagnostics_of("(module (func $f) (func $f))");

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::DuplicateIdentifier));
    }

    #[test]
    fn import_indices_precede_local_definitions() {
        let module = assemble_text(
            r#"(module
                 (import "env" "log" (func $log (param i32)))
                 (func $main call $log))"#,
        )
        .unwrap();

        assert_eq!(
            module.imports().unwrap()[0].description(),
            &ImportDescription::Function(0)
        );
        assert_eq!(
            module.functions().unwrap()[0].body(),
            &Expression::new(vec![ControlInstruction::Call(0).into()])
        );
    }

    #[test]
    fn folded_instructions_linearize() {
        let module = assemble_text(
            "(module (func (result i32) (i32.add (i32.const 2) (i32.const 3))))",
        )
        .unwrap();

        assert_eq!(
            module.functions().unwrap()[0].body(),
            &Expression::new(vec![
                2i32.into(),
                3i32.into(),
                NumericInstruction::Add(ValueType::I32).into(),
            ])
        );
    }

    #[test]
    fn branch_targets_resolve_by_label_and_depth() {
        let module = assemble_text(
            "(module (func (block $outer (block $inner br $outer br 0))))",
        )
        .unwrap();

        let body = module.functions().unwrap()[0].body();
        let outer = match &body.instructions()[0] {
            Instruction::Control(ControlInstruction::Block(_, outer)) => outer,
            other => panic!("expected a block, found {other:?}"),
        };
        let inner = match &outer.instructions()[0] {
            Instruction::Control(ControlInstruction::Block(_, inner)) => inner,
            other => panic!("expected a block, found {other:?}"),
        };

        assert_eq!(
            inner.instructions(),
            &[
                ControlInstruction::Branch(1).into(),
                ControlInstruction::Branch(0).into(),
            ]
        );
    }

    #[test]
    fn folded_if_emits_condition_first() {
        let module = assemble_text(
            "(module (func (result i32) \
               (if (result i32) (i32.const 1) (then (i32.const 2)) (else (i32.const 3)))))",
        )
        .unwrap();

        assert_eq!(
            module.functions().unwrap()[0].body(),
            &Expression::new(vec![
                1i32.into(),
                ControlInstruction::If(
                    BlockType::Value(ValueType::I32),
                    Expression::new(vec![2i32.into()]),
                    Some(Expression::new(vec![3i32.into()])),
                )
                .into(),
            ])
        );
    }

    #[test]
    fn memory_operators_accept_annotated_arguments() {
        let module = assemble_text(
            "(module (memory 1) (func (result i32) i32.const 0 i32.load offset=8 align=2))",
        )
        .unwrap();

        let body = module.functions().unwrap()[0].body();

        assert_eq!(
            body.instructions()[1],
            MemoryInstruction::Load(ValueType::I32, MemoryArgument::new(1, 8)).into()
        );
    }

    #[test]
    fn type_use_mismatch_is_reported() {
        let diagnostics = diagnostics_of(
            "(module (type $t (func (param i32))) (func (type $t) (param f64)))",
        );

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::TypeMismatch));
    }

    #[test]
    fn inline_signatures_are_interned_structurally() {
        let module = assemble_text(
            "(module (func (param i32) (result i32) local.get 0) \
             (func (param i32) (result i32) local.get 0))",
        )
        .unwrap();

        assert_eq!(module.function_types().map(<[_]>::len), Some(1));
    }

    #[test]
    fn duplicate_export_names_are_reported() {
        let diagnostics =
            diagnostics_of("(module (func (export \"run\")) (func (export \"run\")))");

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::Validation));
    }

    #[test]
    fn global_initializers_are_validated() {
        assert!(assemble_text("(module (global i32 (i32.const 7)))").is_ok());

        let diagnostics = diagnostics_of("(module (global i32 (i64.const 7)))");
        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::Validation));
    }

    #[test]
    fn start_function_must_be_runnable() {
        let diagnostics =
            diagnostics_of("(module (func $f (param i32)) (start $f))");

        assert!(diagnostics
            .iter()
            .any(|d| d.kind() == DiagnosticKind::Validation));
    }

    #[test]
    fn missing_immediates_substitute_zero_and_continue() {
        let mut log = VecLog::new();
        let assembly = assemble("(module (func i32.const unknown.op))", &mut log);

        assert!(assembly.failed);
        // Both the missing literal and the unknown mnemonic are reported.
        assert!(log.diagnostics().len() >= 2);
        assert_eq!(
            assembly.module.functions().unwrap()[0].body().instructions()[0],
            0i32.into()
        );
    }

    #[test]
    fn elements_and_segments_lower() {
        let module = assemble_text(
            r#"(module
                 (table 2 funcref)
                 (memory 1)
                 (func $f)
                 (elem (i32.const 0) $f $f)
                 (data (i32.const 8) "ab" "cd"))"#,
        )
        .unwrap();

        assert_eq!(
            module.elements(),
            Some(&[Element::new(0, Expression::new(vec![0i32.into()]), vec![0, 0])][..])
        );
        assert_eq!(
            module.data(),
            Some(
                &[Data::new(
                    0,
                    Expression::new(vec![8i32.into()]),
                    b"abcd".to_vec(),
                )][..]
            )
        );
    }

    #[test]
    fn assembled_modules_survive_a_binary_round_trip() {
        let module = assemble_text(
            r#"(module $adder
                 (memory (export "memory") 1)
                 (func (export "add") (param $x i32) (param $y i32) (result i32)
                   (i32.add (local.get $x) (local.get $y))))"#,
        )
        .unwrap();

        let mut bytes = Vec::new();
        emit_binary(&module, &mut bytes).unwrap();

        let parsed = parse_binary(bytes.as_slice()).unwrap();

        // Equal up to name-section ordering: the custom section may land at
        // a different insertion point after a round trip.
        assert_eq!(parsed.function_types(), module.function_types());
        assert_eq!(parsed.functions(), module.functions());
        assert_eq!(parsed.memories(), module.memories());
        assert_eq!(parsed.exports(), module.exports());
        assert_eq!(parsed.names().unwrap(), module.names().unwrap());
    }

    #[test]
    fn tables_reject_foreign_element_types() {
        let diagnostics = diagnostics_of("(module (table 1 externref))");

        assert!(diagnostics
            .iter()
            .any(|d| d.message().contains("funcref")));
    }

    #[test]
    fn loop_and_conversion_mnemonics_assemble() {
        let module = assemble_text(
            "(module (func (param f32) (result i32) \
               (block $b (br 0)) \
               local.get 0 i32.trunc_f32_s))",
        )
        .unwrap();

        let body = module.functions().unwrap()[0].body();

        assert_eq!(
            body.instructions()[2],
            NumericInstruction::ConvertAndTruncate(
                IntegerType::I32,
                crate::FloatType::F32,
                SignExtension::Signed,
            )
            .into()
        );
    }
}
