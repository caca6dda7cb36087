//! The stack-machine evaluator.
//!
//! A call frame holds the operand stack and the locals vector.
//! Structured instructions execute their nested expressions directly;
//! a branch unwinds as a [`Control::Branch`] carrying the remaining depth,
//! delivering the target's arity values and truncating the operand stack to
//! the target's entry height.

use crate::interpreter::instance::ModuleInstance;
use crate::interpreter::{Trap, TrapReason, Value};
use crate::model::{
    ControlInstruction, Expression, FloatType, Instruction, IntegerType, MemoryArgument,
    MemoryInstruction, NumericInstruction, ParametricInstruction, SignExtension, ValueType,
    VariableInstruction,
};

/// The canonical NaN bit pattern for binary32.
const F32_CANONICAL_NAN: u32 = 0x7FC0_0000;

/// The canonical NaN bit pattern for binary64.
const F64_CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

/// How execution continues after an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    /// Fall through to the next instruction.
    Continue,
    /// Unwind to the label at the given relative depth.
    Branch(u32),
    /// Unwind to the function boundary.
    Return,
}

/// A single call frame: the operand stack and the locals vector
/// (parameters concatenated with zero-initialized locals).
#[derive(Debug)]
pub struct Frame {
    stack: Vec<Value>,
    locals: Vec<Value>,
}

impl Frame {
    /// Creates a frame with the given locals and an empty operand stack.
    pub fn new(locals: Vec<Value>) -> Self {
        Frame {
            stack: Vec::new(),
            locals,
        }
    }

    /// The current operand stack height.
    pub fn height(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, Trap> {
        self.stack.pop().ok_or_else(|| {
            Trap::new(TrapReason::Unreachable, "operand stack underflow")
        })
    }

    pub fn pop_i32(&mut self) -> Result<i32, Trap> {
        match self.pop()? {
            Value::I32(value) => Ok(value),
            other => Err(type_mismatch(ValueType::I32, other)),
        }
    }

    pub fn pop_i64(&mut self) -> Result<i64, Trap> {
        match self.pop()? {
            Value::I64(value) => Ok(value),
            other => Err(type_mismatch(ValueType::I64, other)),
        }
    }

    pub fn pop_f32(&mut self) -> Result<f32, Trap> {
        match self.pop()? {
            Value::F32(value) => Ok(value),
            other => Err(type_mismatch(ValueType::F32, other)),
        }
    }

    pub fn pop_f64(&mut self) -> Result<f64, Trap> {
        match self.pop()? {
            Value::F64(value) => Ok(value),
            other => Err(type_mismatch(ValueType::F64, other)),
        }
    }

    /// Removes and returns the top `arity` values, preserving their order.
    pub fn take_top(&mut self, arity: usize) -> Result<Vec<Value>, Trap> {
        if self.stack.len() < arity {
            return Err(Trap::new(
                TrapReason::Unreachable,
                "operand stack underflow",
            ));
        }

        Ok(self.stack.split_off(self.stack.len() - arity))
    }

    fn truncate(&mut self, height: usize) {
        self.stack.truncate(height);
    }

    fn stack_extend(&mut self, values: Vec<Value>) {
        self.stack.extend(values);
    }

    pub fn local(&self, index: u32) -> Result<Value, Trap> {
        self.locals.get(index as usize).copied().ok_or_else(|| {
            Trap::new(
                TrapReason::Unreachable,
                format!("local index {index} out of range"),
            )
        })
    }

    pub fn set_local(&mut self, index: u32, value: Value) -> Result<(), Trap> {
        match self.locals.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;

                Ok(())
            }
            None => Err(Trap::new(
                TrapReason::Unreachable,
                format!("local index {index} out of range"),
            )),
        }
    }
}

fn type_mismatch(expected: ValueType, found: Value) -> Trap {
    Trap::new(
        TrapReason::Unreachable,
        format!("expected {expected:?} on the operand stack, found {:?}", found.kind()),
    )
}

/// Everything an instruction needs to execute:
/// the owning instance and the current frame.
pub struct ExecContext<'a> {
    pub instance: &'a ModuleInstance,
    pub frame: &'a mut Frame,
}

/// Pluggable instruction execution.
/// The default implementation interprets;
/// a translating backend implements the same interface.
pub trait InstructionInterpreter {
    fn interpret(
        &self,
        instruction: &Instruction,
        context: &mut ExecContext<'_>,
    ) -> Result<Control, Trap>;
}

/// Runs an instruction sequence through the instance's interpreter,
/// stopping at the first non-local transfer of control.
pub fn execute_expression(
    expression: &Expression,
    context: &mut ExecContext<'_>,
) -> Result<Control, Trap> {
    let interpreter = context.instance.interpreter();

    for instruction in expression.instructions() {
        match interpreter.interpret(instruction, context)? {
            Control::Continue => {}
            transfer => return Ok(transfer),
        }
    }

    Ok(Control::Continue)
}

/// The default interpreter: one large dispatch over the operator set.
#[derive(Debug, Default)]
pub struct Evaluator;

impl InstructionInterpreter for Evaluator {
    fn interpret(
        &self,
        instruction: &Instruction,
        context: &mut ExecContext<'_>,
    ) -> Result<Control, Trap> {
        match instruction {
            Instruction::Numeric(instruction) => {
                numeric(instruction, context.frame).map(|()| Control::Continue)
            }
            Instruction::Parametric(instruction) => {
                parametric(instruction, context.frame).map(|()| Control::Continue)
            }
            Instruction::Variable(instruction) => {
                variable(instruction, context).map(|()| Control::Continue)
            }
            Instruction::Memory(instruction) => {
                memory(instruction, context).map(|()| Control::Continue)
            }
            Instruction::Control(instruction) => control(instruction, context),
        }
    }
}

/// Executes a nested block body and applies the label semantics:
/// a branch to this label truncates the operand stack to the entry height
/// and delivers the label's arity values.
/// Returns true when the body fell through or branched to this label,
/// false when an enclosing loop should repeat.
fn run_block(
    body: &Expression,
    arity: usize,
    height: usize,
    repeats: bool,
    context: &mut ExecContext<'_>,
) -> Result<Control, Trap> {
    loop {
        match execute_expression(body, context)? {
            Control::Continue => {
                let results = context.frame.take_top(arity)?;

                context.frame.truncate(height);
                context.frame.stack_extend(results);

                return Ok(Control::Continue);
            }
            Control::Branch(0) if repeats => {
                // A branch to a loop label restarts the loop,
                // delivering no values.
                context.frame.truncate(height);
            }
            Control::Branch(0) => {
                let results = context.frame.take_top(arity)?;

                context.frame.truncate(height);
                context.frame.stack_extend(results);

                return Ok(Control::Continue);
            }
            Control::Branch(depth) => return Ok(Control::Branch(depth - 1)),
            Control::Return => return Ok(Control::Return),
        }
    }
}

fn control(
    instruction: &ControlInstruction,
    context: &mut ExecContext<'_>,
) -> Result<Control, Trap> {
    match instruction {
        ControlInstruction::Nop => Ok(Control::Continue),
        ControlInstruction::Unreachable => Err(Trap::new(
            TrapReason::Unreachable,
            "unreachable instruction executed",
        )),
        ControlInstruction::Block(kind, body) => {
            let height = context.frame.height();

            run_block(body, kind.arity(), height, false, context)
        }
        ControlInstruction::Loop(kind, body) => {
            let height = context.frame.height();

            run_block(body, kind.arity(), height, true, context)
        }
        ControlInstruction::If(kind, positive, negative) => {
            let condition = context.frame.pop_i32()?;
            let height = context.frame.height();

            match (condition != 0, negative) {
                (true, _) => run_block(positive, kind.arity(), height, false, context),
                (false, Some(negative)) => {
                    run_block(negative, kind.arity(), height, false, context)
                }
                (false, None) => Ok(Control::Continue),
            }
        }
        ControlInstruction::Branch(label) => Ok(Control::Branch(*label)),
        ControlInstruction::BranchIf(label) => {
            if context.frame.pop_i32()? != 0 {
                Ok(Control::Branch(*label))
            } else {
                Ok(Control::Continue)
            }
        }
        ControlInstruction::BranchTable(targets, default) => {
            let index = context.frame.pop_i32()? as u32;
            let label = targets.get(index as usize).copied().unwrap_or(*default);

            Ok(Control::Branch(label))
        }
        ControlInstruction::Return => Ok(Control::Return),
        ControlInstruction::Call(function) => {
            call(context, *function as usize).map(|()| Control::Continue)
        }
        ControlInstruction::CallIndirect(kind) => {
            let expected = context.instance.signature(*kind).ok_or_else(|| {
                Trap::new(
                    TrapReason::IndirectCallTypeMismatch,
                    format!("type index {kind} out of range"),
                )
            })?.clone();
            let index = context.frame.pop_i32()? as u32;
            let table = context.instance.table(0)?;
            let address = table.borrow().get(index)?.ok_or_else(|| {
                Trap::new(
                    TrapReason::UninitializedElement,
                    format!("table slot {index} is null"),
                )
            })?;

            let actual = context.instance.function_signature(address).ok_or_else(|| {
                Trap::new(
                    TrapReason::UndefinedElement,
                    format!("function address {address} out of range"),
                )
            })?;

            if actual != &expected {
                return Err(Trap::new(
                    TrapReason::IndirectCallTypeMismatch,
                    format!("table slot {index} holds a function of another type"),
                ));
            }

            call(context, address).map(|()| Control::Continue)
        }
    }
}

/// Pops arguments, invokes the function,
/// and pushes its results back on the caller's stack.
fn call(context: &mut ExecContext<'_>, function: usize) -> Result<(), Trap> {
    let parameters = match context.instance.function_signature(function) {
        Some(signature) => signature.parameters().len(),
        None => {
            return Err(Trap::new(
                TrapReason::UndefinedElement,
                format!("function index {function} out of range"),
            ))
        }
    };

    let arguments = context.frame.take_top(parameters)?;
    let results = context.instance.call_function(function, &arguments)?;

    context.frame.stack_extend(results);

    Ok(())
}

fn parametric(instruction: &ParametricInstruction, frame: &mut Frame) -> Result<(), Trap> {
    match instruction {
        ParametricInstruction::Drop => {
            frame.pop()?;

            Ok(())
        }
        ParametricInstruction::Select => {
            let condition = frame.pop_i32()?;
            let negative = frame.pop()?;
            let positive = frame.pop()?;

            frame.push(if condition != 0 { positive } else { negative });

            Ok(())
        }
    }
}

fn variable(
    instruction: &VariableInstruction,
    context: &mut ExecContext<'_>,
) -> Result<(), Trap> {
    match instruction {
        VariableInstruction::LocalGet(index) => {
            let value = context.frame.local(*index)?;

            context.frame.push(value);

            Ok(())
        }
        VariableInstruction::LocalSet(index) => {
            let value = context.frame.pop()?;

            context.frame.set_local(*index, value)
        }
        VariableInstruction::LocalTee(index) => {
            let value = context.frame.pop()?;

            context.frame.push(value);
            context.frame.set_local(*index, value)
        }
        VariableInstruction::GlobalGet(index) => {
            let global = context.instance.global(*index)?;
            let value = global.borrow().get();

            context.frame.push(value);

            Ok(())
        }
        VariableInstruction::GlobalSet(index) => {
            let value = context.frame.pop()?;
            let global = context.instance.global(*index)?;

            global.borrow_mut().set(value)
        }
    }
}

/// The zero-based index at which a memory access starts:
/// the dynamic address operand plus the static offset,
/// a 33-bit computation that cannot wrap.
fn effective_address(base: i32, argument: &MemoryArgument) -> u64 {
    base as u32 as u64 + argument.offset() as u64
}

fn memory(instruction: &MemoryInstruction, context: &mut ExecContext<'_>) -> Result<(), Trap> {
    use MemoryInstruction::*;

    match instruction {
        Load(kind, argument) => {
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;
            let memory = memory.borrow();
            let value = match kind {
                ValueType::I32 => Value::I32(i32::from_le_bytes(memory.load::<4>(address)?)),
                ValueType::I64 => Value::I64(i64::from_le_bytes(memory.load::<8>(address)?)),
                ValueType::F32 => Value::F32(f32::from_bits(u32::from_le_bytes(
                    memory.load::<4>(address)?,
                ))),
                ValueType::F64 => Value::F64(f64::from_bits(u64::from_le_bytes(
                    memory.load::<8>(address)?,
                ))),
            };

            context.frame.push(value);

            Ok(())
        }
        Store(kind, argument) => {
            let value = context.frame.pop()?;
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;
            let mut memory = memory.borrow_mut();

            match (kind, value) {
                (ValueType::I32, Value::I32(value)) => {
                    memory.store(address, &value.to_le_bytes())
                }
                (ValueType::I64, Value::I64(value)) => {
                    memory.store(address, &value.to_le_bytes())
                }
                (ValueType::F32, Value::F32(value)) => {
                    memory.store(address, &value.to_bits().to_le_bytes())
                }
                (ValueType::F64, Value::F64(value)) => {
                    memory.store(address, &value.to_bits().to_le_bytes())
                }
                (expected, found) => Err(type_mismatch(*expected, found)),
            }
        }
        Load8(kind, extension, argument) => {
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;
            let byte = memory.borrow().load::<1>(address)?[0];
            let widened: i64 = match extension {
                SignExtension::Signed => byte as i8 as i64,
                SignExtension::Unsigned => byte as i64,
            };

            context.frame.push(narrow_to(kind, widened));

            Ok(())
        }
        Load16(kind, extension, argument) => {
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;
            let bytes = memory.borrow().load::<2>(address)?;
            let widened: i64 = match extension {
                SignExtension::Signed => i16::from_le_bytes(bytes) as i64,
                SignExtension::Unsigned => u16::from_le_bytes(bytes) as i64,
            };

            context.frame.push(narrow_to(kind, widened));

            Ok(())
        }
        Load32(extension, argument) => {
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;
            let bytes = memory.borrow().load::<4>(address)?;
            let widened: i64 = match extension {
                SignExtension::Signed => i32::from_le_bytes(bytes) as i64,
                SignExtension::Unsigned => u32::from_le_bytes(bytes) as i64,
            };

            context.frame.push(Value::I64(widened));

            Ok(())
        }
        Store8(kind, argument) => {
            let value = narrow_operand(kind, context.frame)?;
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;

            memory.borrow_mut().store(address, &[value as u8])
        }
        Store16(kind, argument) => {
            let value = narrow_operand(kind, context.frame)?;
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;

            memory
                .borrow_mut()
                .store(address, &(value as u16).to_le_bytes())
        }
        Store32(argument) => {
            let value = context.frame.pop_i64()?;
            let address = effective_address(context.frame.pop_i32()?, argument);
            let memory = context.instance.memory(0)?;

            memory
                .borrow_mut()
                .store(address, &(value as u32).to_le_bytes())
        }
        Size => {
            let memory = context.instance.memory(0)?;
            let pages = memory.borrow().size_in_pages();

            context.frame.push(Value::I32(pages as i32));

            Ok(())
        }
        Grow => {
            let delta = context.frame.pop_i32()? as u32;
            let previous = context.instance.grow_memory(0, delta)?;

            context.frame.push(Value::I32(previous));

            Ok(())
        }
    }
}

/// Widens a narrow load result back to its declaring integer type.
fn narrow_to(kind: &IntegerType, widened: i64) -> Value {
    match kind {
        IntegerType::I32 => Value::I32(widened as i32),
        IntegerType::I64 => Value::I64(widened),
    }
}

/// Pops the integer operand of a narrow store as its low 64 bits.
fn narrow_operand(kind: &IntegerType, frame: &mut Frame) -> Result<u64, Trap> {
    match kind {
        IntegerType::I32 => Ok(frame.pop_i32()? as u32 as u64),
        IntegerType::I64 => Ok(frame.pop_i64()? as u64),
    }
}

fn numeric(instruction: &NumericInstruction, frame: &mut Frame) -> Result<(), Trap> {
    use IntegerType::*;
    use NumericInstruction::*;
    use SignExtension::*;

    match instruction {
        I32Constant(value) => {
            frame.push(Value::I32(*value));
            Ok(())
        }
        I64Constant(value) => {
            frame.push(Value::I64(*value));
            Ok(())
        }
        F32Constant(value) => {
            frame.push(Value::F32(*value));
            Ok(())
        }
        F64Constant(value) => {
            frame.push(Value::F64(*value));
            Ok(())
        }
        CountLeadingZeros(I32) => unary_i32(frame, |v| v.leading_zeros() as i32),
        CountLeadingZeros(I64) => unary_i64(frame, |v| v.leading_zeros() as i64),
        CountTrailingZeros(I32) => unary_i32(frame, |v| v.trailing_zeros() as i32),
        CountTrailingZeros(I64) => unary_i64(frame, |v| v.trailing_zeros() as i64),
        CountOnes(I32) => unary_i32(frame, |v| v.count_ones() as i32),
        CountOnes(I64) => unary_i64(frame, |v| v.count_ones() as i64),
        AbsoluteValue(FloatType::F32) => unary_f32(frame, f32::abs),
        AbsoluteValue(FloatType::F64) => unary_f64(frame, f64::abs),
        Negate(FloatType::F32) => unary_f32(frame, |v| -v),
        Negate(FloatType::F64) => unary_f64(frame, |v| -v),
        SquareRoot(FloatType::F32) => unary_f32(frame, |v| canon32(v.sqrt())),
        SquareRoot(FloatType::F64) => unary_f64(frame, |v| canon64(v.sqrt())),
        Ceiling(FloatType::F32) => unary_f32(frame, |v| canon32(v.ceil())),
        Ceiling(FloatType::F64) => unary_f64(frame, |v| canon64(v.ceil())),
        Floor(FloatType::F32) => unary_f32(frame, |v| canon32(v.floor())),
        Floor(FloatType::F64) => unary_f64(frame, |v| canon64(v.floor())),
        Truncate(FloatType::F32) => unary_f32(frame, |v| canon32(v.trunc())),
        Truncate(FloatType::F64) => unary_f64(frame, |v| canon64(v.trunc())),
        Nearest(FloatType::F32) => unary_f32(frame, |v| canon32(v.round_ties_even())),
        Nearest(FloatType::F64) => unary_f64(frame, |v| canon64(v.round_ties_even())),
        Add(ValueType::I32) => binary_i32(frame, i32::wrapping_add),
        Add(ValueType::I64) => binary_i64(frame, i64::wrapping_add),
        Add(ValueType::F32) => binary_f32(frame, |a, b| canon32(a + b)),
        Add(ValueType::F64) => binary_f64(frame, |a, b| canon64(a + b)),
        Subtract(ValueType::I32) => binary_i32(frame, i32::wrapping_sub),
        Subtract(ValueType::I64) => binary_i64(frame, i64::wrapping_sub),
        Subtract(ValueType::F32) => binary_f32(frame, |a, b| canon32(a - b)),
        Subtract(ValueType::F64) => binary_f64(frame, |a, b| canon64(a - b)),
        Multiply(ValueType::I32) => binary_i32(frame, i32::wrapping_mul),
        Multiply(ValueType::I64) => binary_i64(frame, i64::wrapping_mul),
        Multiply(ValueType::F32) => binary_f32(frame, |a, b| canon32(a * b)),
        Multiply(ValueType::F64) => binary_f64(frame, |a, b| canon64(a * b)),
        DivideInteger(I32, Signed) => try_binary_i32(frame, div_s32),
        DivideInteger(I32, Unsigned) => try_binary_i32(frame, div_u32),
        DivideInteger(I64, Signed) => try_binary_i64(frame, div_s64),
        DivideInteger(I64, Unsigned) => try_binary_i64(frame, div_u64),
        DivideFloat(FloatType::F32) => binary_f32(frame, |a, b| canon32(a / b)),
        DivideFloat(FloatType::F64) => binary_f64(frame, |a, b| canon64(a / b)),
        Remainder(I32, Signed) => try_binary_i32(frame, rem_s32),
        Remainder(I32, Unsigned) => try_binary_i32(frame, rem_u32),
        Remainder(I64, Signed) => try_binary_i64(frame, rem_s64),
        Remainder(I64, Unsigned) => try_binary_i64(frame, rem_u64),
        And(I32) => binary_i32(frame, |a, b| a & b),
        And(I64) => binary_i64(frame, |a, b| a & b),
        Or(I32) => binary_i32(frame, |a, b| a | b),
        Or(I64) => binary_i64(frame, |a, b| a | b),
        Xor(I32) => binary_i32(frame, |a, b| a ^ b),
        Xor(I64) => binary_i64(frame, |a, b| a ^ b),
        ShiftLeft(I32) => binary_i32(frame, |a, b| a.wrapping_shl(b as u32)),
        ShiftLeft(I64) => binary_i64(frame, |a, b| a.wrapping_shl(b as u32)),
        ShiftRight(I32, Signed) => binary_i32(frame, |a, b| a.wrapping_shr(b as u32)),
        ShiftRight(I32, Unsigned) => {
            binary_i32(frame, |a, b| (a as u32).wrapping_shr(b as u32) as i32)
        }
        ShiftRight(I64, Signed) => binary_i64(frame, |a, b| a.wrapping_shr(b as u32)),
        ShiftRight(I64, Unsigned) => {
            binary_i64(frame, |a, b| (a as u64).wrapping_shr(b as u32) as i64)
        }
        RotateLeft(I32) => binary_i32(frame, |a, b| a.rotate_left(b as u32 & 31)),
        RotateLeft(I64) => binary_i64(frame, |a, b| a.rotate_left(b as u32 & 63)),
        RotateRight(I32) => binary_i32(frame, |a, b| a.rotate_right(b as u32 & 31)),
        RotateRight(I64) => binary_i64(frame, |a, b| a.rotate_right(b as u32 & 63)),
        Minimum(FloatType::F32) => binary_f32(frame, fmin32),
        Minimum(FloatType::F64) => binary_f64(frame, fmin64),
        Maximum(FloatType::F32) => binary_f32(frame, fmax32),
        Maximum(FloatType::F64) => binary_f64(frame, fmax64),
        CopySign(FloatType::F32) => binary_f32(frame, f32::copysign),
        CopySign(FloatType::F64) => binary_f64(frame, f64::copysign),
        EqualToZero(I32) => unary_i32(frame, |v| (v == 0) as i32),
        EqualToZero(I64) => {
            let value = frame.pop_i64()?;

            frame.push(Value::I32((value == 0) as i32));

            Ok(())
        }
        Equal(ValueType::I32) => compare_i32(frame, |a, b| a == b),
        Equal(ValueType::I64) => compare_i64(frame, |a, b| a == b),
        Equal(ValueType::F32) => compare_f32(frame, |a, b| a == b),
        Equal(ValueType::F64) => compare_f64(frame, |a, b| a == b),
        NotEqual(ValueType::I32) => compare_i32(frame, |a, b| a != b),
        NotEqual(ValueType::I64) => compare_i64(frame, |a, b| a != b),
        NotEqual(ValueType::F32) => compare_f32(frame, |a, b| a != b),
        NotEqual(ValueType::F64) => compare_f64(frame, |a, b| a != b),
        LessThanInteger(I32, Signed) => compare_i32(frame, |a, b| a < b),
        LessThanInteger(I32, Unsigned) => compare_i32(frame, |a, b| (a as u32) < (b as u32)),
        LessThanInteger(I64, Signed) => compare_i64(frame, |a, b| a < b),
        LessThanInteger(I64, Unsigned) => compare_i64(frame, |a, b| (a as u64) < (b as u64)),
        LessThanFloat(FloatType::F32) => compare_f32(frame, |a, b| a < b),
        LessThanFloat(FloatType::F64) => compare_f64(frame, |a, b| a < b),
        GreaterThanInteger(I32, Signed) => compare_i32(frame, |a, b| a > b),
        GreaterThanInteger(I32, Unsigned) => compare_i32(frame, |a, b| (a as u32) > (b as u32)),
        GreaterThanInteger(I64, Signed) => compare_i64(frame, |a, b| a > b),
        GreaterThanInteger(I64, Unsigned) => compare_i64(frame, |a, b| (a as u64) > (b as u64)),
        GreaterThanFloat(FloatType::F32) => compare_f32(frame, |a, b| a > b),
        GreaterThanFloat(FloatType::F64) => compare_f64(frame, |a, b| a > b),
        LessThanOrEqualToInteger(I32, Signed) => compare_i32(frame, |a, b| a <= b),
        LessThanOrEqualToInteger(I32, Unsigned) => {
            compare_i32(frame, |a, b| (a as u32) <= (b as u32))
        }
        LessThanOrEqualToInteger(I64, Signed) => compare_i64(frame, |a, b| a <= b),
        LessThanOrEqualToInteger(I64, Unsigned) => {
            compare_i64(frame, |a, b| (a as u64) <= (b as u64))
        }
        LessThanOrEqualToFloat(FloatType::F32) => compare_f32(frame, |a, b| a <= b),
        LessThanOrEqualToFloat(FloatType::F64) => compare_f64(frame, |a, b| a <= b),
        GreaterThanOrEqualToInteger(I32, Signed) => compare_i32(frame, |a, b| a >= b),
        GreaterThanOrEqualToInteger(I32, Unsigned) => {
            compare_i32(frame, |a, b| (a as u32) >= (b as u32))
        }
        GreaterThanOrEqualToInteger(I64, Signed) => compare_i64(frame, |a, b| a >= b),
        GreaterThanOrEqualToInteger(I64, Unsigned) => {
            compare_i64(frame, |a, b| (a as u64) >= (b as u64))
        }
        GreaterThanOrEqualToFloat(FloatType::F32) => compare_f32(frame, |a, b| a >= b),
        GreaterThanOrEqualToFloat(FloatType::F64) => compare_f64(frame, |a, b| a >= b),
        Wrap => {
            let value = frame.pop_i64()?;

            frame.push(Value::I32(value as i32));

            Ok(())
        }
        Extend(extension) => {
            let value = frame.pop_i32()?;
            let widened = match extension {
                Signed => value as i64,
                Unsigned => value as u32 as i64,
            };

            frame.push(Value::I64(widened));

            Ok(())
        }
        ConvertAndTruncate(target, source, extension) => {
            let value = match source {
                FloatType::F32 => frame.pop_f32()? as f64,
                FloatType::F64 => frame.pop_f64()?,
            };
            let converted = match (target, extension) {
                (I32, Signed) => Value::I32(trunc_s32(value)?),
                (I32, Unsigned) => Value::I32(trunc_u32(value)? as i32),
                (I64, Signed) => Value::I64(trunc_s64(value)?),
                (I64, Unsigned) => Value::I64(trunc_u64(value)? as i64),
            };

            frame.push(converted);

            Ok(())
        }
        Demote => {
            let value = frame.pop_f64()?;

            frame.push(Value::F32(canon32(value as f32)));

            Ok(())
        }
        Promote => {
            let value = frame.pop_f32()?;

            frame.push(Value::F64(canon64(value as f64)));

            Ok(())
        }
        Convert(target, source, extension) => {
            let value: i64 = match source {
                I32 => match extension {
                    Signed => frame.pop_i32()? as i64,
                    Unsigned => frame.pop_i32()? as u32 as i64,
                },
                I64 => frame.pop_i64()?,
            };
            let converted = match (target, source, extension) {
                (FloatType::F32, I64, Unsigned) => Value::F32(value as u64 as f32),
                (FloatType::F32, _, _) => Value::F32(value as f32),
                (FloatType::F64, I64, Unsigned) => Value::F64(value as u64 as f64),
                (FloatType::F64, _, _) => Value::F64(value as f64),
            };

            frame.push(converted);

            Ok(())
        }
        ReinterpretFloat(I32) => {
            let value = frame.pop_f32()?;

            frame.push(Value::I32(value.to_bits() as i32));

            Ok(())
        }
        ReinterpretFloat(I64) => {
            let value = frame.pop_f64()?;

            frame.push(Value::I64(value.to_bits() as i64));

            Ok(())
        }
        ReinterpretInteger(FloatType::F32) => {
            let value = frame.pop_i32()?;

            frame.push(Value::F32(f32::from_bits(value as u32)));

            Ok(())
        }
        ReinterpretInteger(FloatType::F64) => {
            let value = frame.pop_i64()?;

            frame.push(Value::F64(f64::from_bits(value as u64)));

            Ok(())
        }
    }
}

fn unary_i32(frame: &mut Frame, operation: impl Fn(i32) -> i32) -> Result<(), Trap> {
    let value = frame.pop_i32()?;

    frame.push(Value::I32(operation(value)));

    Ok(())
}

fn unary_i64(frame: &mut Frame, operation: impl Fn(i64) -> i64) -> Result<(), Trap> {
    let value = frame.pop_i64()?;

    frame.push(Value::I64(operation(value)));

    Ok(())
}

fn unary_f32(frame: &mut Frame, operation: impl Fn(f32) -> f32) -> Result<(), Trap> {
    let value = frame.pop_f32()?;

    frame.push(Value::F32(operation(value)));

    Ok(())
}

fn unary_f64(frame: &mut Frame, operation: impl Fn(f64) -> f64) -> Result<(), Trap> {
    let value = frame.pop_f64()?;

    frame.push(Value::F64(operation(value)));

    Ok(())
}

fn binary_i32(frame: &mut Frame, operation: impl Fn(i32, i32) -> i32) -> Result<(), Trap> {
    let right = frame.pop_i32()?;
    let left = frame.pop_i32()?;

    frame.push(Value::I32(operation(left, right)));

    Ok(())
}

fn binary_i64(frame: &mut Frame, operation: impl Fn(i64, i64) -> i64) -> Result<(), Trap> {
    let right = frame.pop_i64()?;
    let left = frame.pop_i64()?;

    frame.push(Value::I64(operation(left, right)));

    Ok(())
}

fn try_binary_i32(
    frame: &mut Frame,
    operation: impl Fn(i32, i32) -> Result<i32, Trap>,
) -> Result<(), Trap> {
    let right = frame.pop_i32()?;
    let left = frame.pop_i32()?;

    frame.push(Value::I32(operation(left, right)?));

    Ok(())
}

fn try_binary_i64(
    frame: &mut Frame,
    operation: impl Fn(i64, i64) -> Result<i64, Trap>,
) -> Result<(), Trap> {
    let right = frame.pop_i64()?;
    let left = frame.pop_i64()?;

    frame.push(Value::I64(operation(left, right)?));

    Ok(())
}

fn binary_f32(frame: &mut Frame, operation: impl Fn(f32, f32) -> f32) -> Result<(), Trap> {
    let right = frame.pop_f32()?;
    let left = frame.pop_f32()?;

    frame.push(Value::F32(operation(left, right)));

    Ok(())
}

fn binary_f64(frame: &mut Frame, operation: impl Fn(f64, f64) -> f64) -> Result<(), Trap> {
    let right = frame.pop_f64()?;
    let left = frame.pop_f64()?;

    frame.push(Value::F64(operation(left, right)));

    Ok(())
}

fn compare_i32(frame: &mut Frame, operation: impl Fn(i32, i32) -> bool) -> Result<(), Trap> {
    let right = frame.pop_i32()?;
    let left = frame.pop_i32()?;

    frame.push(Value::I32(operation(left, right) as i32));

    Ok(())
}

fn compare_i64(frame: &mut Frame, operation: impl Fn(i64, i64) -> bool) -> Result<(), Trap> {
    let right = frame.pop_i64()?;
    let left = frame.pop_i64()?;

    frame.push(Value::I32(operation(left, right) as i32));

    Ok(())
}

fn compare_f32(frame: &mut Frame, operation: impl Fn(f32, f32) -> bool) -> Result<(), Trap> {
    let right = frame.pop_f32()?;
    let left = frame.pop_f32()?;

    frame.push(Value::I32(operation(left, right) as i32));

    Ok(())
}

fn compare_f64(frame: &mut Frame, operation: impl Fn(f64, f64) -> bool) -> Result<(), Trap> {
    let right = frame.pop_f64()?;
    let left = frame.pop_f64()?;

    frame.push(Value::I32(operation(left, right) as i32));

    Ok(())
}

fn div_s32(left: i32, right: i32) -> Result<i32, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i32.div_s"))
    } else if left == i32::MIN && right == -1 {
        Err(Trap::new(TrapReason::IntegerOverflow, "i32.div_s overflow"))
    } else {
        Ok(left.wrapping_div(right))
    }
}

fn div_u32(left: i32, right: i32) -> Result<i32, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i32.div_u"))
    } else {
        Ok(((left as u32) / (right as u32)) as i32)
    }
}

fn rem_s32(left: i32, right: i32) -> Result<i32, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i32.rem_s"))
    } else {
        // INT_MIN % -1 is 0, not an overflow.
        Ok(left.wrapping_rem(right))
    }
}

fn rem_u32(left: i32, right: i32) -> Result<i32, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i32.rem_u"))
    } else {
        Ok(((left as u32) % (right as u32)) as i32)
    }
}

fn div_s64(left: i64, right: i64) -> Result<i64, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i64.div_s"))
    } else if left == i64::MIN && right == -1 {
        Err(Trap::new(TrapReason::IntegerOverflow, "i64.div_s overflow"))
    } else {
        Ok(left.wrapping_div(right))
    }
}

fn div_u64(left: i64, right: i64) -> Result<i64, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i64.div_u"))
    } else {
        Ok(((left as u64) / (right as u64)) as i64)
    }
}

fn rem_s64(left: i64, right: i64) -> Result<i64, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i64.rem_s"))
    } else {
        Ok(left.wrapping_rem(right))
    }
}

fn rem_u64(left: i64, right: i64) -> Result<i64, Trap> {
    if right == 0 {
        Err(Trap::new(TrapReason::IntegerDivideByZero, "i64.rem_u"))
    } else {
        Ok(((left as u64) % (right as u64)) as i64)
    }
}

/// Replaces a NaN result with the canonical NaN payload.
fn canon32(value: f32) -> f32 {
    if value.is_nan() {
        f32::from_bits(F32_CANONICAL_NAN)
    } else {
        value
    }
}

/// Replaces a NaN result with the canonical NaN payload.
fn canon64(value: f64) -> f64 {
    if value.is_nan() {
        f64::from_bits(F64_CANONICAL_NAN)
    } else {
        value
    }
}

/// IEEE-754 minimum with NaN propagation and `-0 < +0`.
fn fmin32(left: f32, right: f32) -> f32 {
    if left.is_nan() || right.is_nan() {
        f32::from_bits(F32_CANONICAL_NAN)
    } else if left < right {
        left
    } else if right < left {
        right
    } else if left.is_sign_negative() {
        left
    } else {
        right
    }
}

/// IEEE-754 maximum with NaN propagation and `-0 < +0`.
fn fmax32(left: f32, right: f32) -> f32 {
    if left.is_nan() || right.is_nan() {
        f32::from_bits(F32_CANONICAL_NAN)
    } else if left > right {
        left
    } else if right > left {
        right
    } else if left.is_sign_positive() {
        left
    } else {
        right
    }
}

fn fmin64(left: f64, right: f64) -> f64 {
    if left.is_nan() || right.is_nan() {
        f64::from_bits(F64_CANONICAL_NAN)
    } else if left < right {
        left
    } else if right < left {
        right
    } else if left.is_sign_negative() {
        left
    } else {
        right
    }
}

fn fmax64(left: f64, right: f64) -> f64 {
    if left.is_nan() || right.is_nan() {
        f64::from_bits(F64_CANONICAL_NAN)
    } else if left > right {
        left
    } else if right > left {
        right
    } else if left.is_sign_positive() {
        left
    } else {
        right
    }
}

/// Float-to-integer truncations trap on NaN and on values outside the
/// destination range. The comparisons run in f64, which represents every
/// boundary exactly.
fn trunc_s32(value: f64) -> Result<i32, Trap> {
    if value.is_nan() {
        return Err(Trap::new(
            TrapReason::InvalidConversionToInteger,
            "i32.trunc of NaN",
        ));
    }

    let truncated = value.trunc();

    if truncated >= 2147483648.0 || truncated < -2147483648.0 {
        return Err(Trap::new(TrapReason::IntegerOverflow, "i32.trunc overflow"));
    }

    Ok(truncated as i32)
}

fn trunc_u32(value: f64) -> Result<u32, Trap> {
    if value.is_nan() {
        return Err(Trap::new(
            TrapReason::InvalidConversionToInteger,
            "i32.trunc of NaN",
        ));
    }

    let truncated = value.trunc();

    if truncated >= 4294967296.0 || truncated <= -1.0 {
        return Err(Trap::new(TrapReason::IntegerOverflow, "i32.trunc overflow"));
    }

    Ok(truncated as u32)
}

fn trunc_s64(value: f64) -> Result<i64, Trap> {
    if value.is_nan() {
        return Err(Trap::new(
            TrapReason::InvalidConversionToInteger,
            "i64.trunc of NaN",
        ));
    }

    let truncated = value.trunc();

    if truncated >= 9223372036854775808.0 || truncated < -9223372036854775808.0 {
        return Err(Trap::new(TrapReason::IntegerOverflow, "i64.trunc overflow"));
    }

    Ok(truncated as i64)
}

fn trunc_u64(value: f64) -> Result<u64, Trap> {
    if value.is_nan() {
        return Err(Trap::new(
            TrapReason::InvalidConversionToInteger,
            "i64.trunc of NaN",
        ));
    }

    let truncated = value.trunc();

    if truncated >= 18446744073709551616.0 || truncated <= -1.0 {
        return Err(Trap::new(TrapReason::IntegerOverflow, "i64.trunc overflow"));
    }

    Ok(truncated as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_prefers_negative_zero() {
        assert!(fmin32(0.0, -0.0).is_sign_negative());
        assert!(fmin64(-0.0, 0.0).is_sign_negative());
        assert!(fmax32(-0.0, 0.0).is_sign_positive());
        assert!(fmax64(0.0, -0.0).is_sign_positive());
    }

    #[test]
    fn minimum_propagates_canonical_nan() {
        assert_eq!(
            fmin32(f32::from_bits(0x7FA0_0001), 1.0).to_bits(),
            F32_CANONICAL_NAN
        );
        assert_eq!(fmax64(1.0, f64::NAN).to_bits(), F64_CANONICAL_NAN);
    }

    #[test]
    fn signed_division_traps() {
        assert_eq!(
            div_s32(1, 0).unwrap_err().reason(),
            TrapReason::IntegerDivideByZero
        );
        assert_eq!(
            div_s32(i32::MIN, -1).unwrap_err().reason(),
            TrapReason::IntegerOverflow
        );
        assert_eq!(div_s32(7, -2).unwrap(), -3);
    }

    #[test]
    fn signed_remainder_of_minimum_is_zero() {
        assert_eq!(rem_s32(i32::MIN, -1).unwrap(), 0);
        assert_eq!(rem_s64(i64::MIN, -1).unwrap(), 0);
    }

    #[test]
    fn truncation_traps_on_nan_and_overflow() {
        assert_eq!(
            trunc_s32(f64::NAN).unwrap_err().reason(),
            TrapReason::InvalidConversionToInteger
        );
        assert_eq!(
            trunc_s32(2147483648.0).unwrap_err().reason(),
            TrapReason::IntegerOverflow
        );
        assert_eq!(trunc_s32(-2147483648.9).unwrap(), i32::MIN);
        assert_eq!(trunc_u32(4294967295.9).unwrap(), u32::MAX);
        assert_eq!(trunc_u32(-0.9).unwrap(), 0);
        assert_eq!(
            trunc_u64(-1.0).unwrap_err().reason(),
            TrapReason::IntegerOverflow
        );
    }

    #[test]
    fn frame_take_top_preserves_order() {
        let mut frame = Frame::new(vec![]);

        frame.push(Value::I32(1));
        frame.push(Value::I32(2));
        frame.push(Value::I32(3));

        assert_eq!(
            frame.take_top(2).unwrap(),
            vec![Value::I32(2), Value::I32(3)]
        );
        assert_eq!(frame.height(), 1);
    }
}
