//! WebAssembly instruction set.

use crate::model::{
    FloatType, FunctionIndex, GlobalIndex, IntegerType, LabelIndex, LocalIndex, TypeIndex,
    ValueType,
};

/// WebAssembly code consists of sequences of instructions.
/// Its computational model is based on a stack machine in that instructions
/// manipulate values on an implicit operand stack,
/// consuming (popping) argument values and producing or returning (pushing)
/// result values.
/// In addition to dynamic operands from the stack, some instructions also
/// have static immediate arguments, typically indices or type annotations,
/// which are part of the instruction itself.
/// Some instructions are structured in that they bracket nested sequences of
/// instructions.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#instructions>
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Numeric(NumericInstruction),
    Parametric(ParametricInstruction),
    Variable(VariableInstruction),
    Memory(MemoryInstruction),
    Control(ControlInstruction),
}

/// Numeric instructions provide basic operations over numeric values of a
/// specific type. These operations closely match respective operations
/// available in hardware.
///
/// Some integer instructions come in two flavors,
/// where a signedness annotation sx distinguishes whether the operands are to
/// be interpreted as unsigned or signed integers.
/// For the other integer instructions, the use of two's complement for the
/// signed interpretation means that they behave the same regardless of
/// signedness.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#numeric-instructions>
///
/// # Examples
/// ```rust
/// use wasmkit::{Instruction, NumericInstruction};
///
/// assert_eq!(
///     Instruction::Numeric(NumericInstruction::I32Constant(42)),
///     42i32.into()
/// );
/// assert_eq!(
///     Instruction::Numeric(NumericInstruction::F64Constant(0.5)),
///     0.5f64.into()
/// );
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NumericInstruction {
    /// i32.const
    I32Constant(i32),
    /// i64.const
    I64Constant(i64),
    /// f32.const
    F32Constant(f32),
    /// f64.const
    F64Constant(f64),
    /// inn.clz
    CountLeadingZeros(IntegerType),
    /// inn.ctz
    CountTrailingZeros(IntegerType),
    /// inn.popcnt
    CountOnes(IntegerType),
    /// fnn.abs
    AbsoluteValue(FloatType),
    /// fnn.neg
    Negate(FloatType),
    /// fnn.sqrt
    SquareRoot(FloatType),
    /// fnn.ceil
    Ceiling(FloatType),
    /// fnn.floor
    Floor(FloatType),
    /// fnn.trunc
    Truncate(FloatType),
    /// fnn.nearest
    Nearest(FloatType),
    /// xnn.add
    Add(ValueType),
    /// xnn.sub
    Subtract(ValueType),
    /// xnn.mul
    Multiply(ValueType),
    /// inn.div_sx
    DivideInteger(IntegerType, SignExtension),
    /// fnn.div
    DivideFloat(FloatType),
    /// inn.rem_sx
    Remainder(IntegerType, SignExtension),
    /// inn.and
    And(IntegerType),
    /// inn.or
    Or(IntegerType),
    /// inn.xor
    Xor(IntegerType),
    /// inn.shl
    ShiftLeft(IntegerType),
    /// inn.shr_sx
    ShiftRight(IntegerType, SignExtension),
    /// inn.rotl
    RotateLeft(IntegerType),
    /// inn.rotr
    RotateRight(IntegerType),
    /// fnn.min
    Minimum(FloatType),
    /// fnn.max
    Maximum(FloatType),
    /// fnn.copysign
    CopySign(FloatType),
    /// inn.eqz
    EqualToZero(IntegerType),
    /// xnn.eq
    Equal(ValueType),
    /// xnn.ne
    NotEqual(ValueType),
    /// inn.lt_sx
    LessThanInteger(IntegerType, SignExtension),
    /// fnn.lt
    LessThanFloat(FloatType),
    /// inn.gt_sx
    GreaterThanInteger(IntegerType, SignExtension),
    /// fnn.gt
    GreaterThanFloat(FloatType),
    /// inn.le_sx
    LessThanOrEqualToInteger(IntegerType, SignExtension),
    /// fnn.le
    LessThanOrEqualToFloat(FloatType),
    /// inn.ge_sx
    GreaterThanOrEqualToInteger(IntegerType, SignExtension),
    /// fnn.ge
    GreaterThanOrEqualToFloat(FloatType),
    /// i32.wrap/i64
    Wrap,
    /// i64.extend_sx/i32
    Extend(SignExtension),
    /// inn.trunc_sx/fmm
    ConvertAndTruncate(IntegerType, FloatType, SignExtension),
    /// f32.demote/f64
    Demote,
    /// f64.promote/f32
    Promote,
    /// fnn.convert_sx/imm
    Convert(FloatType, IntegerType, SignExtension),
    /// inn.reinterpret/fnn
    ReinterpretFloat(IntegerType),
    /// fnn.reinterpret/inn
    ReinterpretInteger(FloatType),
}

impl From<NumericInstruction> for Instruction {
    fn from(instruction: NumericInstruction) -> Self {
        Self::Numeric(instruction)
    }
}

impl From<i32> for Instruction {
    fn from(value: i32) -> Self {
        Self::Numeric(NumericInstruction::I32Constant(value))
    }
}

impl From<i64> for Instruction {
    fn from(value: i64) -> Self {
        Self::Numeric(NumericInstruction::I64Constant(value))
    }
}

impl From<f32> for Instruction {
    fn from(value: f32) -> Self {
        Self::Numeric(NumericInstruction::F32Constant(value))
    }
}

impl From<f64> for Instruction {
    fn from(value: f64) -> Self {
        Self::Numeric(NumericInstruction::F64Constant(value))
    }
}

/// Instructions in this group can operate on operands of any value type.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#parametric-instructions>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParametricInstruction {
    /// The 𝖽𝗋𝗈𝗉 instruction simply throws away a single operand.
    Drop,
    /// The 𝗌𝖾𝗅𝖾𝖼𝗍 instruction selects one of its first two operands based on
    /// whether its third operand is zero or not.
    Select,
}

impl From<ParametricInstruction> for Instruction {
    fn from(instruction: ParametricInstruction) -> Self {
        Instruction::Parametric(instruction)
    }
}

/// Variable instructions are concerned with access to local or global variables.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#variable-instructions>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VariableInstruction {
    /// local.get localidx
    LocalGet(LocalIndex),
    /// local.set localidx
    LocalSet(LocalIndex),
    /// local.tee localidx
    /// Like 𝗅𝗈𝖼𝖺𝗅.𝗌𝖾𝗍 but also returns its argument.
    LocalTee(LocalIndex),
    /// global.get globalidx
    GlobalGet(GlobalIndex),
    /// global.set globalidx
    GlobalSet(GlobalIndex),
}

impl From<VariableInstruction> for Instruction {
    fn from(instruction: VariableInstruction) -> Self {
        Instruction::Variable(instruction)
    }
}

/// Instructions in this group are concerned with linear memory.
/// Memory is accessed with 𝗅𝗈𝖺𝖽 and 𝗌𝗍𝗈𝗋𝖾 instructions for the different
/// value types. They all take a memory immediate memarg that contains an
/// address offset and the expected alignment
/// (expressed as the exponent of a power of 2).
/// Integer loads and stores can optionally specify a storage size that is
/// smaller than the bit width of the respective value type.
/// In the case of loads, a sign extension mode sx is then required to select
/// appropriate behavior.
///
/// The static address offset is added to the dynamic address operand,
/// yielding a 33 bit effective address that is the zero-based index at which
/// the memory is accessed. All values are read and written in little endian
/// byte order. A trap results if any of the accessed memory bytes lies
/// outside the address range implied by the memory's current size.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#memory-instructions>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryInstruction {
    /// xnn.load memarg
    Load(ValueType, MemoryArgument),
    /// xnn.store memarg
    Store(ValueType, MemoryArgument),
    /// inn.load8_sx memarg
    Load8(IntegerType, SignExtension, MemoryArgument),
    /// inn.load16_sx memarg
    Load16(IntegerType, SignExtension, MemoryArgument),
    /// i64.load32_sx memarg
    Load32(SignExtension, MemoryArgument),
    /// inn.store8 memarg
    Store8(IntegerType, MemoryArgument),
    /// inn.store16 memarg
    Store16(IntegerType, MemoryArgument),
    /// i64.store32 memarg
    Store32(MemoryArgument),
    /// The 𝗆𝖾𝗆𝗈𝗋𝗒.𝗌𝗂𝗓𝖾 instruction returns the current size of a memory,
    /// in units of page size.
    Size,
    /// The 𝗆𝖾𝗆𝗈𝗋𝗒.𝗀𝗋𝗈𝗐 instruction grows memory by a given delta and returns
    /// the previous size, or −1 if enough memory cannot be allocated.
    Grow,
}

impl From<MemoryInstruction> for Instruction {
    fn from(instruction: MemoryInstruction) -> Self {
        Instruction::Memory(instruction)
    }
}

/// Instructions in this group affect the flow of control.
/// The 𝖻𝗅𝗈𝖼𝗄, 𝗅𝗈𝗈𝗉 and 𝗂𝖿 instructions are structured instructions.
/// They bracket nested sequences of instructions, called blocks,
/// terminated with, or separated by, 𝖾𝗇𝖽 or 𝖾𝗅𝗌𝖾 pseudo-instructions.
/// As the grammar prescribes, they must be well-nested.
///
/// Each structured control instruction introduces an implicit label.
/// Labels are targets for branch instructions that reference them with label
/// indices. Unlike with other index spaces, indexing of labels is relative by
/// nesting depth: label 0 refers to the innermost structured control
/// instruction enclosing the referring branch instruction,
/// while increasing indices refer to those farther out.
/// Branches can only be directed outwards, "breaking" from the block of the
/// control construct they target. In case of 𝖻𝗅𝗈𝖼𝗄 or 𝗂𝖿 the effect is a
/// forward jump, resuming execution after the matching 𝖾𝗇𝖽.
/// In case of 𝗅𝗈𝗈𝗉 it is a backward jump to the beginning of the loop.
///
/// Taking a branch unwinds the operand stack up to the height where the
/// targeted structured control instruction was entered.
/// However, branches may additionally consume operands themselves,
/// which they push back on the operand stack after unwinding.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#control-instructions>
///
/// # Examples
/// ```rust
/// use wasmkit::{BlockType, ControlInstruction, Expression, Instruction, ValueType};
///
/// let body = Expression::new(vec![ControlInstruction::Nop.into(), 0i32.into()]);
///
/// assert_eq!(
///     Instruction::Control(ControlInstruction::Block(
///         BlockType::Value(ValueType::I32),
///         body.clone()
///     )),
///     ControlInstruction::Block(BlockType::Value(ValueType::I32), body).into()
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ControlInstruction {
    /// The 𝗇𝗈𝗉 instruction does nothing.
    Nop,
    /// The 𝗎𝗇𝗋𝖾𝖺𝖼𝗁𝖺𝖻𝗅𝖾 instruction causes an unconditional trap.
    Unreachable,
    /// A logical grouping used to introduce a label around an expression.
    Block(BlockType, Expression),
    /// Executes the expression in a loop.
    Loop(BlockType, Expression),
    /// Conditionally executes a positive or (optional) negative branch based
    /// on a test value.
    If(BlockType, Expression, Option<Expression>),
    /// The 𝖻𝗋 instruction performs an unconditional branch.
    Branch(LabelIndex),
    /// The 𝖻𝗋_𝗂𝖿 instruction performs a conditional branch.
    BranchIf(LabelIndex),
    /// The 𝖻𝗋_𝗍𝖺𝖻𝗅𝖾 instruction performs an indirect branch through an
    /// operand indexing into the label vector that is an immediate to the
    /// instruction, or to a default target if the operand is out of bounds.
    BranchTable(Vec<LabelIndex>, LabelIndex),
    /// The 𝗋𝖾𝗍𝗎𝗋𝗇 instruction is a shortcut for an unconditional branch to
    /// the outermost block, which implicitly is the body of the current
    /// function.
    Return,
    /// The 𝖼𝖺𝗅𝗅 instruction invokes another function,
    /// consuming the necessary arguments from the stack and returning the
    /// result values of the call.
    Call(FunctionIndex),
    /// The 𝖼𝖺𝗅𝗅_𝗂𝗇𝖽𝗂𝗋𝖾𝖼𝗍 instruction calls a function indirectly through an
    /// operand indexing into the default table, which must have element kind
    /// 𝖿𝗎𝗇𝖼𝗋𝖾𝖿. Since the table may contain functions of heterogeneous type,
    /// the callee is dynamically checked against the function type indexed by
    /// the instruction's immediate, and the call is aborted with a trap if it
    /// does not match.
    CallIndirect(TypeIndex),
}

impl From<ControlInstruction> for Instruction {
    fn from(instruction: ControlInstruction) -> Self {
        Instruction::Control(instruction)
    }
}

/// A structured instruction can consume input and produce output on the
/// operand stack according to its annotated block type,
/// given as an optional value type: a shorthand for the function type
/// []→[valtype?].
///
/// See <https://webassembly.github.io/spec/core/binary/instructions.html#control-instructions>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
}

impl BlockType {
    /// The number of values a branch to this block's label delivers.
    pub fn arity(&self) -> usize {
        match self {
            BlockType::Empty => 0,
            BlockType::Value(_) => 1,
        }
    }
}

/// Argument to load and store instructions that contains an address offset
/// and the expected alignment (expressed as the exponent of a power of 2).
/// The alignment is a hint and does not affect semantics.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#memory-instructions>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryArgument {
    align: u32,
    offset: u32,
}

impl MemoryArgument {
    /// Creates a new memory argument with the given alignment exponent and offset.
    pub fn new(align: u32, offset: u32) -> Self {
        MemoryArgument { align, offset }
    }

    /// Creates a new memory argument with a zero offset and the given alignment exponent.
    pub fn default_offset(align: u32) -> Self {
        MemoryArgument { align, offset: 0 }
    }

    /// The static address offset of the memory instruction.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The memory alignment of the instruction expressed as the exponent of a power of 2.
    pub fn align(&self) -> u32 {
        self.align
    }
}

/// Some integer instructions come in two flavors, where a signedness
/// annotation sx distinguishes whether the operands are to be interpreted as
/// unsigned or signed integers.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#numeric-instructions>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignExtension {
    Signed,
    Unsigned,
}

/// Function bodies, initialization values for globals,
/// and offsets of element or data segments are given as expressions,
/// which are sequences of instructions terminated by an 𝖾𝗇𝖽 marker.
/// In some places, validation restricts expressions to be constant,
/// which limits the set of allowable instructions.
///
/// See <https://webassembly.github.io/spec/core/syntax/instructions.html#expressions>
///
/// # Examples
/// ```rust
/// use wasmkit::{ControlInstruction, Expression};
///
/// let expression = Expression::new(vec![0i32.into(), ControlInstruction::Nop.into()]);
///
/// assert_eq!(expression.len(), 2);
/// assert!(!expression.is_empty());
/// assert!(Expression::empty().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    instructions: Vec<Instruction>,
}

impl Expression {
    /// Create a new expression from the given instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Expression { instructions }
    }

    /// Create a new empty expression.
    pub fn empty() -> Self {
        Expression {
            instructions: vec![],
        }
    }

    /// The instructions for this expression.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns true if this `Expression` has a length of zero, false otherwise.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the length of this `Expression`, in number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }
}

impl From<Vec<Instruction>> for Expression {
    fn from(instructions: Vec<Instruction>) -> Self {
        Expression { instructions }
    }
}
