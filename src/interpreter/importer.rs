//! The import environment a module instantiates against.

use crate::interpreter::store::{GlobalInstance, MemoryInstance, TableInstance};
use crate::interpreter::{Trap, Value};
use crate::model::{
    ElementKind, FunctionType, GlobalType, Limit, MemoryType, ResultType, TableType, ValueType,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

/// An importer cannot supply a requested import,
/// or supplies one that fails compatibility.
#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("no importer provides `{module}.{name}`")]
    Unresolved { module: String, name: String },
    #[error("`{module}.{name}` is incompatible with the declared type")]
    Incompatible { module: String, name: String },
}

/// A callable supplied by the host.
/// It accepts an ordered argument list matching its declared parameters and
/// returns an ordered result list, or traps.
/// A host function may call back into an instance on the same thread;
/// the call depth policy bounds native and wasm frames alike.
#[derive(Clone)]
pub struct HostFunction {
    signature: FunctionType,
    callable: Rc<dyn Fn(&[Value]) -> Result<Vec<Value>, Trap>>,
}

impl HostFunction {
    /// Creates a host function with the given signature.
    pub fn new(
        signature: FunctionType,
        callable: impl Fn(&[Value]) -> Result<Vec<Value>, Trap> + 'static,
    ) -> Self {
        HostFunction {
            signature,
            callable: Rc::new(callable),
        }
    }

    /// The declared signature of the callable.
    pub fn signature(&self) -> &FunctionType {
        &self.signature
    }

    /// Invokes the callable.
    pub fn call(&self, arguments: &[Value]) -> Result<Vec<Value>, Trap> {
        (self.callable)(arguments)
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Supplies the external values a module's imports require.
/// Instantiation asks for each import in declaration order;
/// signature and limits compatibility is checked by the instantiator.
pub trait Importer {
    /// Resolves a function import with the expected signature.
    fn import_function(
        &mut self,
        module: &str,
        name: &str,
        signature: &FunctionType,
    ) -> Result<HostFunction, ImportError>;

    /// Resolves a global import with the expected type.
    fn import_global(
        &mut self,
        module: &str,
        name: &str,
        kind: &GlobalType,
    ) -> Result<Rc<RefCell<GlobalInstance>>, ImportError>;

    /// Resolves a memory import with the expected type.
    fn import_memory(
        &mut self,
        module: &str,
        name: &str,
        kind: &MemoryType,
    ) -> Result<Rc<RefCell<MemoryInstance>>, ImportError>;

    /// Resolves a table import with the expected type.
    fn import_table(
        &mut self,
        module: &str,
        name: &str,
        kind: &TableType,
    ) -> Result<Rc<RefCell<TableInstance>>, ImportError>;
}

/// An importer that satisfies nothing.
/// Instantiating a module with no imports against it always succeeds.
#[derive(Debug, Default)]
pub struct EmptyImporter;

impl Importer for EmptyImporter {
    fn import_function(
        &mut self,
        module: &str,
        name: &str,
        _signature: &FunctionType,
    ) -> Result<HostFunction, ImportError> {
        Err(unresolved(module, name))
    }

    fn import_global(
        &mut self,
        module: &str,
        name: &str,
        _kind: &GlobalType,
    ) -> Result<Rc<RefCell<GlobalInstance>>, ImportError> {
        Err(unresolved(module, name))
    }

    fn import_memory(
        &mut self,
        module: &str,
        name: &str,
        _kind: &MemoryType,
    ) -> Result<Rc<RefCell<MemoryInstance>>, ImportError> {
        Err(unresolved(module, name))
    }

    fn import_table(
        &mut self,
        module: &str,
        name: &str,
        _kind: &TableType,
    ) -> Result<Rc<RefCell<TableInstance>>, ImportError> {
        Err(unresolved(module, name))
    }
}

fn unresolved(module: &str, name: &str) -> ImportError {
    ImportError::Unresolved {
        module: module.to_string(),
        name: name.to_string(),
    }
}

/// Composes importers by module-name prefix:
/// each registered namespace serves the imports addressed to it.
#[derive(Default)]
pub struct NamespacedImporter {
    namespaces: HashMap<String, Box<dyn Importer>>,
}

impl NamespacedImporter {
    /// Creates an importer with no namespaces.
    pub fn new() -> Self {
        NamespacedImporter::default()
    }

    /// Registers an importer to serve the given module name.
    pub fn register(&mut self, namespace: impl Into<String>, importer: impl Importer + 'static) {
        self.namespaces.insert(namespace.into(), Box::new(importer));
    }

    fn namespace(&mut self, module: &str, name: &str) -> Result<&mut Box<dyn Importer>, ImportError> {
        self.namespaces
            .get_mut(module)
            .ok_or_else(|| unresolved(module, name))
    }
}

impl Importer for NamespacedImporter {
    fn import_function(
        &mut self,
        module: &str,
        name: &str,
        signature: &FunctionType,
    ) -> Result<HostFunction, ImportError> {
        self.namespace(module, name)?
            .import_function(module, name, signature)
    }

    fn import_global(
        &mut self,
        module: &str,
        name: &str,
        kind: &GlobalType,
    ) -> Result<Rc<RefCell<GlobalInstance>>, ImportError> {
        self.namespace(module, name)?.import_global(module, name, kind)
    }

    fn import_memory(
        &mut self,
        module: &str,
        name: &str,
        kind: &MemoryType,
    ) -> Result<Rc<RefCell<MemoryInstance>>, ImportError> {
        self.namespace(module, name)?.import_memory(module, name, kind)
    }

    fn import_table(
        &mut self,
        module: &str,
        name: &str,
        kind: &TableType,
    ) -> Result<Rc<RefCell<TableInstance>>, ImportError> {
        self.namespace(module, name)?.import_table(module, name, kind)
    }
}

/// The `spectest` host module used by the specification test suite:
/// print functions that side-effect a writer, three constant globals,
/// a `(1, 2)`-page memory, and a `(10, 20)` table.
pub struct SpecTestImporter<W> {
    output: Rc<RefCell<W>>,
    memory: Rc<RefCell<MemoryInstance>>,
    table: Rc<RefCell<TableInstance>>,
    globals: HashMap<&'static str, Rc<RefCell<GlobalInstance>>>,
}

impl<W: Write + 'static> SpecTestImporter<W> {
    /// Creates the `spectest` namespace, printing to the given writer.
    pub fn new(output: W) -> Self {
        let mut globals = HashMap::new();

        globals.insert(
            "global_i32",
            Rc::new(RefCell::new(GlobalInstance::constant(Value::I32(666)))),
        );
        globals.insert(
            "global_f32",
            Rc::new(RefCell::new(GlobalInstance::constant(Value::F32(666.6)))),
        );
        globals.insert(
            "global_f64",
            Rc::new(RefCell::new(GlobalInstance::constant(Value::F64(666.6)))),
        );

        SpecTestImporter {
            output: Rc::new(RefCell::new(output)),
            memory: Rc::new(RefCell::new(MemoryInstance::new(&Limit::bounded(1, 2)))),
            table: Rc::new(RefCell::new(TableInstance::new(&TableType::new(
                ElementKind::FunctionReference,
                Limit::bounded(10, 20),
            )))),
            globals,
        }
    }

    /// The parameter types of each print function.
    fn print_parameters(name: &str) -> Option<Vec<ValueType>> {
        match name {
            "print" => Some(vec![]),
            "print_i32" => Some(vec![ValueType::I32]),
            "print_i64" => Some(vec![ValueType::I64]),
            "print_f32" => Some(vec![ValueType::F32]),
            "print_f64" => Some(vec![ValueType::F64]),
            "print_i32_f32" => Some(vec![ValueType::I32, ValueType::F32]),
            "print_f64_f64" => Some(vec![ValueType::F64, ValueType::F64]),
            _ => None,
        }
    }
}

impl<W: Write + 'static> Importer for SpecTestImporter<W> {
    fn import_function(
        &mut self,
        module: &str,
        name: &str,
        signature: &FunctionType,
    ) -> Result<HostFunction, ImportError> {
        if module != "spectest" {
            return Err(unresolved(module, name));
        }

        let parameters = Self::print_parameters(name).ok_or_else(|| unresolved(module, name))?;
        let expected = FunctionType::new(ResultType::new(parameters), ResultType::empty());

        if signature != &expected {
            return Err(ImportError::Incompatible {
                module: module.to_string(),
                name: name.to_string(),
            });
        }

        let output = Rc::clone(&self.output);

        Ok(HostFunction::new(expected, move |arguments| {
            let mut output = output.borrow_mut();

            for (position, argument) in arguments.iter().enumerate() {
                let separator = if position == 0 { "" } else { " " };

                write!(output, "{separator}{argument}")
                    .map_err(|_| Trap::new(crate::interpreter::TrapReason::Unreachable, "print failed"))?;
            }

            writeln!(output)
                .map_err(|_| Trap::new(crate::interpreter::TrapReason::Unreachable, "print failed"))?;

            Ok(vec![])
        }))
    }

    fn import_global(
        &mut self,
        module: &str,
        name: &str,
        _kind: &GlobalType,
    ) -> Result<Rc<RefCell<GlobalInstance>>, ImportError> {
        if module != "spectest" {
            return Err(unresolved(module, name));
        }

        self.globals
            .get(name)
            .map(Rc::clone)
            .ok_or_else(|| unresolved(module, name))
    }

    fn import_memory(
        &mut self,
        module: &str,
        name: &str,
        _kind: &MemoryType,
    ) -> Result<Rc<RefCell<MemoryInstance>>, ImportError> {
        if module == "spectest" && name == "memory" {
            Ok(Rc::clone(&self.memory))
        } else {
            Err(unresolved(module, name))
        }
    }

    fn import_table(
        &mut self,
        module: &str,
        name: &str,
        _kind: &TableType,
    ) -> Result<Rc<RefCell<TableInstance>>, ImportError> {
        if module == "spectest" && name == "table" {
            Ok(Rc::clone(&self.table))
        } else {
            Err(unresolved(module, name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_importer_resolves_nothing() {
        let mut importer = EmptyImporter;

        assert!(matches!(
            importer.import_function("env", "log", &FunctionType::runnable()),
            Err(ImportError::Unresolved { .. })
        ));
    }

    #[test]
    fn spectest_prints_space_separated_values() {
        let output: Vec<u8> = Vec::new();
        let mut importer = SpecTestImporter::new(output);
        let signature = FunctionType::new(
            ResultType::new(vec![ValueType::I32, ValueType::F32]),
            ResultType::empty(),
        );

        let print = importer
            .import_function("spectest", "print_i32_f32", &signature)
            .unwrap();

        assert_eq!(
            print.call(&[Value::I32(1), Value::F32(2.5)]).unwrap(),
            vec![]
        );
    }

    #[test]
    fn spectest_rejects_mismatched_signatures() {
        let mut importer = SpecTestImporter::new(Vec::new());
        let wrong = FunctionType::new(
            ResultType::new(vec![ValueType::I64]),
            ResultType::empty(),
        );

        assert!(matches!(
            importer.import_function("spectest", "print_i32", &wrong),
            Err(ImportError::Incompatible { .. })
        ));
    }

    #[test]
    fn spectest_supplies_the_documented_instances() {
        let mut importer = SpecTestImporter::new(Vec::new());

        let memory = importer
            .import_memory("spectest", "memory", &MemoryType::new(Limit::bounded(1, 2)))
            .unwrap();
        assert_eq!(memory.borrow().size_in_pages(), 1);
        assert_eq!(memory.borrow().maximum(), Some(2));

        let table = importer
            .import_table(
                "spectest",
                "table",
                &TableType::new(ElementKind::FunctionReference, Limit::bounded(10, 20)),
            )
            .unwrap();
        assert_eq!(table.borrow().size(), 10);

        let global = importer
            .import_global(
                "spectest",
                "global_i32",
                &GlobalType::immutable(ValueType::I32),
            )
            .unwrap();
        assert_eq!(global.borrow().get(), Value::I32(666));
    }

    #[test]
    fn namespaced_importer_dispatches_by_module() {
        let mut composed = NamespacedImporter::new();

        composed.register("spectest", SpecTestImporter::new(Vec::new()));

        assert!(composed
            .import_memory("spectest", "memory", &MemoryType::new(Limit::unbounded(1)))
            .is_ok());
        assert!(matches!(
            composed.import_memory("env", "memory", &MemoryType::new(Limit::unbounded(1))),
            Err(ImportError::Unresolved { .. })
        ));
    }
}
