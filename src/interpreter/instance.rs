//! Module instantiation and invocation.

use crate::interpreter::exec::{
    execute_expression, Evaluator, ExecContext, Frame, InstructionInterpreter,
};
use crate::interpreter::importer::{ImportError, Importer};
use crate::interpreter::store::{GlobalInstance, MemoryInstance, TableInstance};
use crate::interpreter::{ExecutionPolicy, Trap, TrapReason, Value};
use crate::model::{
    ExportDescription, FunctionType, ImportDescription, Instruction, Module, NumericInstruction,
    VariableInstruction,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Instantiation failed; no instance is produced.
#[derive(thiserror::Error, Debug)]
pub enum InstantiationError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Trap(#[from] Trap),
}

/// An invocation failed before or during execution.
#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error("no export is named `{0}`")]
    UnknownExport(String),
    #[error("export `{0}` is not a function")]
    NotAFunction(String),
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),
}

/// A function in the instance's index space:
/// either supplied by the importer or defined by the module.
enum FunctionKind {
    Host(crate::interpreter::importer::HostFunction),
    Local { function: usize },
}

struct FunctionEntry {
    signature: FunctionType,
    kind: FunctionKind,
}

/// A module instantiated against an import environment.
/// One invocation holds exclusive access to the instance;
/// callers wishing to share an instance across threads must provide
/// external mutual exclusion.
pub struct ModuleInstance {
    module: Module,
    types: Vec<FunctionType>,
    functions: Vec<FunctionEntry>,
    memories: Vec<Rc<RefCell<MemoryInstance>>>,
    tables: Vec<Rc<RefCell<TableInstance>>>,
    globals: Vec<Rc<RefCell<GlobalInstance>>>,
    exports: HashMap<String, ExportDescription>,
    policy: ExecutionPolicy,
    depth: Cell<usize>,
    interpreter: Box<dyn InstructionInterpreter>,
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance").finish_non_exhaustive()
    }
}

impl ModuleInstance {
    /// Instantiates a module against an importer.
    /// The fixed sequence — resolve imports, allocate memories and tables,
    /// initialize globals, copy data and element segments, run the start
    /// function — fails atomically: any error yields no instance,
    /// though writes to imported memories and tables may have happened.
    pub fn instantiate(
        module: &Module,
        importer: &mut dyn Importer,
        policy: ExecutionPolicy,
    ) -> Result<ModuleInstance, InstantiationError> {
        let types: Vec<FunctionType> = module.function_types().unwrap_or_default().to_vec();
        let mut functions = Vec::new();
        let mut memories = Vec::new();
        let mut tables = Vec::new();
        let mut globals = Vec::new();
        let mut imported_globals = 0;

        // (1) Resolve every import in declaration order,
        // checking signature and limits compatibility.
        for import in module.imports().unwrap_or_default() {
            let namespace = import.module().as_str();
            let field = import.name().as_str();

            match import.description() {
                ImportDescription::Function(kind) => {
                    let signature = types.get(*kind as usize).cloned().ok_or_else(|| {
                        InstantiationError::Validation(format!(
                            "import `{namespace}.{field}` references type {kind}, which does not exist"
                        ))
                    })?;
                    let host = importer.import_function(namespace, field, &signature)?;

                    if host.signature() != &signature {
                        return Err(incompatible(namespace, field));
                    }

                    functions.push(FunctionEntry {
                        signature,
                        kind: FunctionKind::Host(host),
                    });
                }
                ImportDescription::Memory(kind) => {
                    let handle = importer.import_memory(namespace, field, kind)?;

                    {
                        let provided = handle.borrow();

                        if provided.size_in_pages() < kind.limits().initial()
                            || !maximum_within(kind.limits().maximum(), provided.maximum())
                        {
                            return Err(incompatible(namespace, field));
                        }
                    }

                    memories.push(handle);
                }
                ImportDescription::Table(kind) => {
                    let handle = importer.import_table(namespace, field, kind)?;

                    {
                        let provided = handle.borrow();

                        if provided.size() < kind.limits().initial()
                            || !maximum_within(kind.limits().maximum(), provided.maximum())
                        {
                            return Err(incompatible(namespace, field));
                        }
                    }

                    tables.push(handle);
                }
                ImportDescription::Global(kind) => {
                    let handle = importer.import_global(namespace, field, kind)?;

                    if handle.borrow().kind() != *kind {
                        return Err(incompatible(namespace, field));
                    }

                    globals.push(handle);
                    imported_globals += 1;
                }
            }
        }

        // Local functions extend the index space after the imports.
        for (position, function) in module.functions().unwrap_or_default().iter().enumerate() {
            let signature = types.get(function.kind() as usize).cloned().ok_or_else(|| {
                InstantiationError::Validation(format!(
                    "function {position} references type {}, which does not exist",
                    function.kind()
                ))
            })?;

            functions.push(FunctionEntry {
                signature,
                kind: FunctionKind::Local { function: position },
            });
        }

        // (2) Allocate zero-filled memories and null-initialized tables.
        for memory in module.memories().unwrap_or_default() {
            let limits = memory.kind().limits();

            if !limits.is_valid() {
                return Err(InstantiationError::Validation(
                    "memory limits have initial > maximum".to_string(),
                ));
            }

            memories.push(Rc::new(RefCell::new(MemoryInstance::new(limits))));
        }

        for table in module.tables().unwrap_or_default() {
            if !table.kind().limits().is_valid() {
                return Err(InstantiationError::Validation(
                    "table limits have initial > maximum".to_string(),
                ));
            }

            tables.push(Rc::new(RefCell::new(TableInstance::new(table.kind()))));
        }

        // (3) Initialize globals; initializers see only imported globals.
        for global in module.globals().unwrap_or_default() {
            let value =
                evaluate_initializer(global.initializer(), &globals, imported_globals)?;

            if value.kind() != global.kind().kind() {
                return Err(InstantiationError::Validation(format!(
                    "global initializer produces {:?}, expected {:?}",
                    value.kind(),
                    global.kind().kind()
                )));
            }

            globals.push(Rc::new(RefCell::new(GlobalInstance::new(
                *global.kind(),
                value,
            ))));
        }

        // (4) Copy data segments, then element segments;
        // an out-of-bounds copy aborts instantiation with a trap.
        for data in module.data().unwrap_or_default() {
            let offset = evaluate_offset(data.offset(), &globals, imported_globals)?;
            let memory = memories.get(data.memory() as usize).ok_or_else(|| {
                InstantiationError::Validation(format!(
                    "data segment targets memory {}, which does not exist",
                    data.memory()
                ))
            })?;

            memory.borrow_mut().store(offset as u64, data.bytes())?;
        }

        for element in module.elements().unwrap_or_default() {
            let offset = evaluate_offset(element.offset(), &globals, imported_globals)?;
            let table = tables.get(element.table() as usize).ok_or_else(|| {
                InstantiationError::Validation(format!(
                    "element segment targets table {}, which does not exist",
                    element.table()
                ))
            })?;
            let addresses: Vec<usize> = element
                .functions()
                .iter()
                .map(|function| {
                    let address = *function as usize;

                    if address < functions.len() {
                        Ok(address)
                    } else {
                        Err(InstantiationError::Validation(format!(
                            "element segment references function {function}, which does not exist"
                        )))
                    }
                })
                .collect::<Result<_, _>>()?;

            table.borrow_mut().initialize(offset, &addresses)?;
        }

        let mut exports = HashMap::new();

        for export in module.exports().unwrap_or_default() {
            let name = export.name().as_str().to_string();

            if exports.insert(name, *export.description()).is_some() {
                return Err(InstantiationError::Validation(format!(
                    "duplicate export name `{}`",
                    export.name()
                )));
            }
        }

        let instance = ModuleInstance {
            module: module.clone(),
            types,
            functions,
            memories,
            tables,
            globals,
            exports,
            policy,
            depth: Cell::new(0),
            interpreter: Box::new(Evaluator),
        };

        // (5) Run the start function, which must have type [] → [].
        if let Some(start) = module.start() {
            let index = start.function() as usize;
            let runnable = instance
                .functions
                .get(index)
                .map(|entry| {
                    entry.signature.parameters().is_empty() && entry.signature.results().is_empty()
                })
                .ok_or_else(|| {
                    InstantiationError::Validation(format!(
                        "the start section references function {index}, which does not exist"
                    ))
                })?;

            if !runnable {
                return Err(InstantiationError::Validation(
                    "the start function must have type [] → []".to_string(),
                ));
            }

            log::debug!("running start function {index}");
            instance.call_function(index, &[])?;
        }

        Ok(instance)
    }

    /// Invokes an exported function with the given arguments.
    pub fn invoke(&self, name: &str, arguments: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        let description = self
            .exports
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownExport(name.to_string()))?;
        let index = match description {
            ExportDescription::Function(index) => *index as usize,
            _ => return Err(RuntimeError::NotAFunction(name.to_string())),
        };
        let entry = self
            .functions
            .get(index)
            .ok_or_else(|| RuntimeError::UnknownExport(name.to_string()))?;
        let parameters = entry.signature.parameters().kinds();

        if arguments.len() != parameters.len() {
            return Err(RuntimeError::ArgumentMismatch(format!(
                "`{name}` takes {} argument(s), {} supplied",
                parameters.len(),
                arguments.len()
            )));
        }

        for (argument, parameter) in arguments.iter().zip(parameters) {
            if argument.kind() != *parameter {
                return Err(RuntimeError::ArgumentMismatch(format!(
                    "`{name}` expects {parameter:?}, {:?} supplied",
                    argument.kind()
                )));
            }
        }

        Ok(self.call_function(index, arguments)?)
    }

    /// The description of an export, if present.
    pub fn export(&self, name: &str) -> Option<&ExportDescription> {
        self.exports.get(name)
    }

    /// An exported memory handle, if the export names one.
    pub fn exported_memory(&self, name: &str) -> Option<Rc<RefCell<MemoryInstance>>> {
        match self.exports.get(name)? {
            ExportDescription::Memory(index) => self.memories.get(*index as usize).map(Rc::clone),
            _ => None,
        }
    }

    /// An exported global handle, if the export names one.
    pub fn exported_global(&self, name: &str) -> Option<Rc<RefCell<GlobalInstance>>> {
        match self.exports.get(name)? {
            ExportDescription::Global(index) => self.globals.get(*index as usize).map(Rc::clone),
            _ => None,
        }
    }

    /// Calls a function by its index in the instance's function index space.
    /// Reentrant invocations extend the same depth accounting;
    /// exceeding the policy's depth traps as `call stack exhausted`.
    pub(crate) fn call_function(
        &self,
        function: usize,
        arguments: &[Value],
    ) -> Result<Vec<Value>, Trap> {
        if self.depth.get() >= self.policy.max_call_stack_depth {
            return Err(Trap::new(
                TrapReason::CallStackExhausted,
                format!("call depth exceeds {}", self.policy.max_call_stack_depth),
            ));
        }

        self.depth.set(self.depth.get() + 1);
        let results = self.dispatch(function, arguments);
        self.depth.set(self.depth.get() - 1);

        results
    }

    fn dispatch(&self, function: usize, arguments: &[Value]) -> Result<Vec<Value>, Trap> {
        let entry = self.functions.get(function).ok_or_else(|| {
            Trap::new(
                TrapReason::UndefinedElement,
                format!("function index {function} out of range"),
            )
        })?;

        match &entry.kind {
            FunctionKind::Host(host) => host.call(arguments),
            FunctionKind::Local { function: local } => {
                let function = self
                    .module
                    .functions()
                    .unwrap_or_default()
                    .get(*local)
                    .ok_or_else(|| {
                        Trap::new(
                            TrapReason::UndefinedElement,
                            format!("code for function {function} is missing"),
                        )
                    })?;
                let mut locals = arguments.to_vec();

                locals.extend(function.flattened_locals().map(Value::default_of));

                let mut frame = Frame::new(locals);
                let mut context = ExecContext {
                    instance: self,
                    frame: &mut frame,
                };

                execute_expression(function.body(), &mut context)?;

                frame.take_top(entry.signature.results().len())
            }
        }
    }

    /// The active instruction interpreter.
    pub(crate) fn interpreter(&self) -> &dyn InstructionInterpreter {
        self.interpreter.as_ref()
    }

    /// The function type at a type-section index.
    pub(crate) fn signature(&self, kind: u32) -> Option<&FunctionType> {
        self.types.get(kind as usize)
    }

    /// The resolved signature of a function in the index space.
    pub(crate) fn function_signature(&self, function: usize) -> Option<&FunctionType> {
        self.functions.get(function).map(|entry| &entry.signature)
    }

    pub(crate) fn memory(&self, index: usize) -> Result<&Rc<RefCell<MemoryInstance>>, Trap> {
        self.memories.get(index).ok_or_else(|| {
            Trap::new(
                TrapReason::OutOfBoundsMemoryAccess,
                format!("memory {index} does not exist"),
            )
        })
    }

    pub(crate) fn table(&self, index: usize) -> Result<&Rc<RefCell<TableInstance>>, Trap> {
        self.tables.get(index).ok_or_else(|| {
            Trap::new(
                TrapReason::UndefinedElement,
                format!("table {index} does not exist"),
            )
        })
    }

    pub(crate) fn global(&self, index: u32) -> Result<&Rc<RefCell<GlobalInstance>>, Trap> {
        self.globals.get(index as usize).ok_or_else(|| {
            Trap::new(
                TrapReason::Unreachable,
                format!("global index {index} out of range"),
            )
        })
    }

    /// Grows a memory, bounded by its declared maximum and the policy's cap
    /// on total pages across all memories owned by the instance.
    /// Returns the previous page count, or -1 when the growth is denied.
    pub(crate) fn grow_memory(&self, index: usize, delta: u32) -> Result<i32, Trap> {
        let memory = self.memory(index)?;
        let available = match self.policy.max_memory_pages {
            0 => u32::MAX,
            cap => {
                let total: u32 = self
                    .memories
                    .iter()
                    .map(|memory| memory.borrow().size_in_pages())
                    .sum();

                cap.saturating_sub(total)
            }
        };

        Ok(memory.borrow_mut().grow(delta, available))
    }
}

fn incompatible(module: &str, name: &str) -> InstantiationError {
    InstantiationError::Import(ImportError::Incompatible {
        module: module.to_string(),
        name: name.to_string(),
    })
}

/// Provided limits satisfy declared limits when the declared maximum,
/// if any, bounds the provided maximum.
fn maximum_within(declared: Option<u32>, provided: Option<u32>) -> bool {
    match declared {
        None => true,
        Some(declared) => matches!(provided, Some(provided) if provided <= declared),
    }
}

/// Evaluates an initializer expression:
/// exactly one constant-producing instruction or a `global.get` of an
/// already-imported immutable global.
fn evaluate_initializer(
    expression: &crate::model::Expression,
    globals: &[Rc<RefCell<GlobalInstance>>],
    imported: usize,
) -> Result<Value, InstantiationError> {
    match expression.instructions() {
        [Instruction::Numeric(NumericInstruction::I32Constant(value))] => Ok(Value::I32(*value)),
        [Instruction::Numeric(NumericInstruction::I64Constant(value))] => Ok(Value::I64(*value)),
        [Instruction::Numeric(NumericInstruction::F32Constant(value))] => Ok(Value::F32(*value)),
        [Instruction::Numeric(NumericInstruction::F64Constant(value))] => Ok(Value::F64(*value)),
        [Instruction::Variable(VariableInstruction::GlobalGet(index))] => {
            let index = *index as usize;

            if index >= imported {
                return Err(InstantiationError::Validation(
                    "an initializer may only read an imported global".to_string(),
                ));
            }

            Ok(globals[index].borrow().get())
        }
        _ => Err(InstantiationError::Validation(
            "an initializer must be a single constant instruction".to_string(),
        )),
    }
}

/// Evaluates a segment offset initializer, which must yield an i32.
fn evaluate_offset(
    expression: &crate::model::Expression,
    globals: &[Rc<RefCell<GlobalInstance>>],
    imported: usize,
) -> Result<u32, InstantiationError> {
    match evaluate_initializer(expression, globals, imported)? {
        Value::I32(offset) => Ok(offset as u32),
        other => Err(InstantiationError::Validation(format!(
            "a segment offset must yield an i32, found {:?}",
            other.kind()
        ))),
    }
}
