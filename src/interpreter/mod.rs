//! Instantiation and execution of WebAssembly modules.
//!
//! A [`ModuleInstance`] is created by instantiating an immutable module
//! against an [`Importer`]; invoking its exports runs function bodies on a
//! value stack with specification-conformant numeric semantics and trap
//! behavior. The interpreter is single-threaded cooperative:
//! no operation suspends, and cancellation happens through the
//! [`ExecutionPolicy`] limits or a trapping host function.

mod exec;
mod importer;
mod instance;
mod policy;
mod store;
mod trap;
mod value;

pub use exec::{Control, Evaluator, ExecContext, Frame, InstructionInterpreter};
pub use importer::{EmptyImporter, HostFunction, ImportError, Importer, NamespacedImporter, SpecTestImporter};
pub use instance::{InstantiationError, ModuleInstance, RuntimeError};
pub use policy::ExecutionPolicy;
pub use store::{FunctionAddress, GlobalInstance, MemoryInstance, TableInstance, PAGE_SIZE};
pub use trap::{Trap, TrapReason};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::assemble_text;

    fn instantiate(source: &str) -> ModuleInstance {
        let module = assemble_text(source).unwrap();

        ModuleInstance::instantiate(&module, &mut EmptyImporter, ExecutionPolicy::testing())
            .unwrap()
    }

    #[test]
    fn add_wraps_modulo_two_to_the_32() {
        let instance = instantiate(
            "(module (func (export \"add\") (param i32 i32) (result i32) \
             local.get 0 local.get 1 i32.add))",
        );

        assert_eq!(
            instance
                .invoke("add", &[Value::I32(2), Value::I32(3)])
                .unwrap(),
            vec![Value::I32(5)]
        );
        assert_eq!(
            instance
                .invoke("add", &[Value::I32(0x7FFF_FFFF), Value::I32(1)])
                .unwrap(),
            vec![Value::I32(-2147483648)]
        );
    }

    #[test]
    fn division_by_zero_traps_with_the_spec_message() {
        let instance = instantiate(
            "(module (func (export \"run\") (result i32) \
             i32.const 1 i32.const 0 i32.div_s))",
        );

        match instance.invoke("run", &[]) {
            Err(RuntimeError::Trap(trap)) => {
                assert_eq!(trap.reason(), TrapReason::IntegerDivideByZero);
                assert_eq!(trap.to_string(), "integer divide by zero");
            }
            other => panic!("expected a trap, found {other:?}"),
        }
    }

    #[test]
    fn unreachable_traps() {
        let instance = instantiate("(module (func (export \"run\") unreachable))");

        match instance.invoke("run", &[]) {
            Err(RuntimeError::Trap(trap)) => {
                assert_eq!(trap.reason(), TrapReason::Unreachable)
            }
            other => panic!("expected a trap, found {other:?}"),
        }
    }

    #[test]
    fn data_segments_initialize_memory() {
        let instance = instantiate(
            r#"(module
                 (memory (export "memory") 1)
                 (data (i32.const 8) "hi")
                 (func (export "read") (result i32) i32.const 8 i32.load8_u))"#,
        );

        assert_eq!(
            instance.invoke("read", &[]).unwrap(),
            vec![Value::I32(b'h' as i32)]
        );

        let memory = instance.exported_memory("memory").unwrap();
        assert_eq!(memory.borrow().load::<2>(8).unwrap(), *b"hi");
    }

    #[test]
    fn out_of_bounds_data_segment_aborts_instantiation() {
        let module = assemble_text(
            r#"(module (memory 1) (data (i32.const 65535) "ab"))"#,
        )
        .unwrap();

        match ModuleInstance::instantiate(&module, &mut EmptyImporter, ExecutionPolicy::default())
        {
            Err(InstantiationError::Trap(trap)) => {
                assert_eq!(trap.reason(), TrapReason::OutOfBoundsMemoryAccess)
            }
            other => panic!("expected a trap, found {other:?}"),
        }
    }

    #[test]
    fn element_segments_fill_tables_and_call_indirect_dispatches() {
        let instance = instantiate(
            "(module \
               (table 3 funcref) \
               (type $binary (func (param i32 i32) (result i32))) \
               (func $add (type $binary) local.get 0 local.get 1 i32.add) \
               (func $sub (type $binary) local.get 0 local.get 1 i32.sub) \
               (elem (i32.const 1) $add $sub) \
               (func (export \"dispatch\") (param i32 i32 i32) (result i32) \
                 local.get 1 local.get 2 local.get 0 call_indirect (type $binary)))",
        );

        assert_eq!(
            instance
                .invoke(
                    "dispatch",
                    &[Value::I32(1), Value::I32(10), Value::I32(4)]
                )
                .unwrap(),
            vec![Value::I32(14)]
        );
        assert_eq!(
            instance
                .invoke(
                    "dispatch",
                    &[Value::I32(2), Value::I32(10), Value::I32(4)]
                )
                .unwrap(),
            vec![Value::I32(6)]
        );
    }

    #[test]
    fn call_indirect_traps_cover_the_failure_modes() {
        let instance = instantiate(
            "(module \
               (table 2 funcref) \
               (type $none (func)) \
               (type $unary (func (param i32) (result i32))) \
               (func $noop (type $none)) \
               (elem (i32.const 0) $noop) \
               (func (export \"null-slot\") i32.const 1 call_indirect (type $none)) \
               (func (export \"out-of-bounds\") i32.const 9 call_indirect (type $none)) \
               (func (export \"mismatch\") (result i32) \
                 i32.const 7 i32.const 0 call_indirect (type $unary)))",
        );

        let reason = |name: &str| match instance.invoke(name, &[]) {
            Err(RuntimeError::Trap(trap)) => trap.reason(),
            other => panic!("expected a trap, found {other:?}"),
        };

        assert_eq!(reason("null-slot"), TrapReason::UninitializedElement);
        assert_eq!(reason("out-of-bounds"), TrapReason::UndefinedElement);
        assert_eq!(reason("mismatch"), TrapReason::IndirectCallTypeMismatch);
    }

    #[test]
    fn memory_grow_reports_the_previous_size_and_respects_maximum() {
        let instance = instantiate(
            "(module (memory 1 2) \
               (func (export \"grow\") (param i32) (result i32) \
                 local.get 0 memory.grow) \
               (func (export \"size\") (result i32) memory.size))",
        );

        assert_eq!(
            instance.invoke("grow", &[Value::I32(1)]).unwrap(),
            vec![Value::I32(1)]
        );
        assert_eq!(instance.invoke("size", &[]).unwrap(), vec![Value::I32(2)]);
        // Past the declared maximum: -1, size unchanged.
        assert_eq!(
            instance.invoke("grow", &[Value::I32(1)]).unwrap(),
            vec![Value::I32(-1)]
        );
        assert_eq!(instance.invoke("size", &[]).unwrap(), vec![Value::I32(2)]);
    }

    #[test]
    fn float_semantics_follow_the_specification() {
        let instance = instantiate(
            "(module \
               (func (export \"min\") (param f64 f64) (result f64) \
                 local.get 0 local.get 1 f64.min) \
               (func (export \"trunc\") (param f32) (result i32) \
                 local.get 0 i32.trunc_f32_s) \
               (func (export \"bits\") (param f32) (result i32) \
                 local.get 0 i32.reinterpret_f32))",
        );

        // min propagates a canonical NaN.
        match instance
            .invoke("min", &[Value::F64(f64::NAN), Value::F64(1.0)])
            .unwrap()[0]
        {
            Value::F64(result) => assert_eq!(result.to_bits(), 0x7FF8_0000_0000_0000),
            other => panic!("expected an f64, found {other:?}"),
        }

        // min treats -0 as smaller than +0.
        match instance
            .invoke("min", &[Value::F64(0.0), Value::F64(-0.0)])
            .unwrap()[0]
        {
            Value::F64(result) => assert!(result.is_sign_negative()),
            other => panic!("expected an f64, found {other:?}"),
        }

        // Truncation of NaN is an invalid conversion.
        match instance.invoke("trunc", &[Value::F32(f32::NAN)]) {
            Err(RuntimeError::Trap(trap)) => {
                assert_eq!(trap.reason(), TrapReason::InvalidConversionToInteger)
            }
            other => panic!("expected a trap, found {other:?}"),
        }

        // Reinterpretation preserves NaN payloads bit-for-bit.
        let payload = f32::from_bits(0x7FA0_0001);
        assert_eq!(
            instance.invoke("bits", &[Value::F32(payload)]).unwrap(),
            vec![Value::I32(0x7FA0_0001u32 as i32)]
        );
    }

    #[test]
    fn branches_unwind_to_their_label() {
        let instance = instantiate(
            "(module (func (export \"pick\") (param i32) (result i32) \
               (block (result i32) \
                 (block (result i32) \
                   i32.const 10 \
                   local.get 0 \
                   br_if 1 \
                   drop \
                   i32.const 20))))",
        );

        assert_eq!(
            instance.invoke("pick", &[Value::I32(1)]).unwrap(),
            vec![Value::I32(10)]
        );
        assert_eq!(
            instance.invoke("pick", &[Value::I32(0)]).unwrap(),
            vec![Value::I32(20)]
        );
    }

    #[test]
    fn loops_iterate_and_branch_tables_pick_their_target() {
        let instance = instantiate(
            "(module \
               (func (export \"sum\") (param i32) (result i32) (local i32) \
                 (block $done \
                   (loop $top \
                     local.get 0 \
                     i32.eqz \
                     br_if $done \
                     local.get 1 local.get 0 i32.add local.set 1 \
                     local.get 0 i32.const 1 i32.sub local.set 0 \
                     br $top)) \
                 local.get 1) \
               (func (export \"classify\") (param i32) (result i32) \
                 (block $other (block $one (block $zero \
                   local.get 0 br_table $zero $one $other) \
                   i32.const 100 return) \
                   i32.const 200 return) \
                 i32.const 300))",
        );

        assert_eq!(
            instance.invoke("sum", &[Value::I32(4)]).unwrap(),
            vec![Value::I32(10)]
        );
        // A br_table index beyond the table uses the default target.
        assert_eq!(
            instance.invoke("classify", &[Value::I32(0)]).unwrap(),
            vec![Value::I32(100)]
        );
        assert_eq!(
            instance.invoke("classify", &[Value::I32(1)]).unwrap(),
            vec![Value::I32(200)]
        );
        assert_eq!(
            instance.invoke("classify", &[Value::I32(9)]).unwrap(),
            vec![Value::I32(300)]
        );
    }

    #[test]
    fn recursion_beyond_the_policy_depth_traps() {
        let instance = instantiate("(module (func $loop (export \"loop\") call $loop))");

        match instance.invoke("loop", &[]) {
            Err(RuntimeError::Trap(trap)) => {
                assert_eq!(trap.reason(), TrapReason::CallStackExhausted);
                assert_eq!(trap.to_string(), "call stack exhausted");
            }
            other => panic!("expected a trap, found {other:?}"),
        }
    }

    #[test]
    fn start_function_runs_at_instantiation() {
        let instance = instantiate(
            "(module \
               (memory 1) \
               (func $init i32.const 0 i32.const 41 i32.store) \
               (start $init) \
               (func (export \"get\") (result i32) i32.const 0 i32.load))",
        );

        assert_eq!(instance.invoke("get", &[]).unwrap(), vec![Value::I32(41)]);
    }

    #[test]
    fn globals_initialize_and_mutate() {
        let instance = instantiate(
            "(module \
               (global $counter (mut i32) (i32.const 5)) \
               (func (export \"bump\") (result i32) \
                 global.get $counter i32.const 1 i32.add \
                 global.set $counter global.get $counter))",
        );

        assert_eq!(instance.invoke("bump", &[]).unwrap(), vec![Value::I32(6)]);
        assert_eq!(instance.invoke("bump", &[]).unwrap(), vec![Value::I32(7)]);
    }

    #[test]
    fn spectest_imports_satisfy_the_module() {
        let module = assemble_text(
            r#"(module
                 (import "spectest" "print_i32" (func $print (param i32)))
                 (import "spectest" "global_i32" (global i32))
                 (import "spectest" "memory" (memory 1 2))
                 (func (export "run") (result i32)
                   global.get 0 call $print global.get 0))"#,
        )
        .unwrap();

        let mut importer = SpecTestImporter::new(Vec::new());
        let instance =
            ModuleInstance::instantiate(&module, &mut importer, ExecutionPolicy::testing())
                .unwrap();

        assert_eq!(instance.invoke("run", &[]).unwrap(), vec![Value::I32(666)]);
    }

    #[test]
    fn missing_imports_fail_atomically() {
        let module = assemble_text(
            r#"(module (import "env" "missing" (func)) (memory 1))"#,
        )
        .unwrap();

        assert!(matches!(
            ModuleInstance::instantiate(&module, &mut EmptyImporter, ExecutionPolicy::default()),
            Err(InstantiationError::Import(ImportError::Unresolved { .. }))
        ));
    }

    #[test]
    fn incompatible_import_limits_are_rejected() {
        // The module wants at least 3 pages; spectest supplies (1, 2).
        let module = assemble_text(
            r#"(module (import "spectest" "memory" (memory 3)))"#,
        )
        .unwrap();

        let mut importer = SpecTestImporter::new(Vec::new());

        assert!(matches!(
            ModuleInstance::instantiate(&module, &mut importer, ExecutionPolicy::default()),
            Err(InstantiationError::Import(ImportError::Incompatible { .. }))
        ));
    }

    #[test]
    fn invocation_checks_argument_kinds() {
        let instance = instantiate(
            "(module (func (export \"id\") (param i32) (result i32) local.get 0))",
        );

        assert!(matches!(
            instance.invoke("id", &[Value::I64(1)]),
            Err(RuntimeError::ArgumentMismatch(_))
        ));
        assert!(matches!(
            instance.invoke("id", &[]),
            Err(RuntimeError::ArgumentMismatch(_))
        ));
        assert!(matches!(
            instance.invoke("absent", &[]),
            Err(RuntimeError::UnknownExport(_))
        ));
    }

    #[test]
    fn traps_leave_prior_memory_writes_visible() {
        let instance = instantiate(
            "(module \
               (memory (export \"memory\") 1) \
               (func (export \"run\") \
                 i32.const 0 i32.const 7 i32.store \
                 unreachable))",
        );

        assert!(instance.invoke("run", &[]).is_err());

        let memory = instance.exported_memory("memory").unwrap();
        assert_eq!(memory.borrow().load::<4>(0).unwrap(), 7i32.to_le_bytes());
    }

    #[test]
    fn select_and_comparisons_produce_i32_flags() {
        let instance = instantiate(
            "(module (func (export \"max\") (param i32 i32) (result i32) \
               local.get 0 local.get 1 \
               local.get 0 local.get 1 i32.gt_s \
               select))",
        );

        assert_eq!(
            instance
                .invoke("max", &[Value::I32(3), Value::I32(9)])
                .unwrap(),
            vec![Value::I32(9)]
        );
        assert_eq!(
            instance
                .invoke("max", &[Value::I32(-1), Value::I32(-9)])
                .unwrap(),
            vec![Value::I32(-1)]
        );
    }
}
