//! Catalog of WebAssembly operators.
//!
//! Each operator records its opcode, its declaring value type (if any),
//! its binary-format mnemonic, the shape of its immediates,
//! and a constructor used by the text assembler.
//! The binary reader consults the catalog for opcode dispatch;
//! the assembler looks operators up by their text mnemonic.
//!
//! The text mnemonic of a nullary operator derives from the binary mnemonic
//! by a canonical transform: a legacy form like `f32.convert_u/i64` maps to
//! `f32.convert_i64_u` (the trailing type slot is substituted before the
//! signedness suffix).

use crate::model::{
    ControlInstruction, FloatType, Instruction, IntegerType, MemoryArgument, MemoryInstruction,
    NumericInstruction, ParametricInstruction, SignExtension, ValueType, VariableInstruction,
};
use std::collections::HashMap;
use std::sync::OnceLock;

/// The shape of the immediates carried by an operator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Immediate {
    /// No immediates.
    None,
    /// A local index.
    Local,
    /// A global index.
    Global,
    /// A function index.
    Function,
    /// A label depth.
    Label,
    /// A vector of label depths and a default label depth.
    LabelTable,
    /// A type use (type index and a reserved byte in the binary format).
    TypeUse,
    /// A block type followed by a bracketed instruction sequence.
    Block,
    /// An i32 literal.
    I32,
    /// An i64 literal.
    I64,
    /// An f32 literal, encoded as little-endian IEEE-754 bits.
    F32,
    /// An f64 literal, encoded as little-endian IEEE-754 bits.
    F64,
    /// A memory argument; the field is the natural alignment exponent of the access.
    Memory(u32),
}

/// Builds a model instruction from a decoded or assembled immediate.
#[derive(Copy, Clone)]
pub enum Constructor {
    /// The operator is structured (block, loop, if, else, end, br_table,
    /// call_indirect) and is assembled by dedicated logic.
    Structured,
    /// A nullary operator.
    Fixed(fn() -> Instruction),
    /// An operator carrying one index immediate.
    Index(fn(u32) -> Instruction),
    /// i32.const
    I32(fn(i32) -> Instruction),
    /// i64.const
    I64(fn(i64) -> Instruction),
    /// f32.const
    F32(fn(f32) -> Instruction),
    /// f64.const
    F64(fn(f64) -> Instruction),
    /// An operator carrying a memory argument.
    Memory(fn(MemoryArgument) -> Instruction),
}

/// A single operator of the WebAssembly MVP instruction set.
pub struct Operator {
    /// The opcode byte in the binary format.
    pub opcode: u8,
    /// The value type declaring the operator, or `None` for
    /// control/parametric/variable/memory operators.
    pub kind: Option<ValueType>,
    /// The binary-format (legacy) mnemonic.
    pub mnemonic: &'static str,
    /// The shape of the operator's immediates.
    pub immediate: Immediate,
    /// The constructor used by the text assembler.
    pub constructor: Constructor,
}

impl Operator {
    /// The text-format mnemonic, derived from the binary mnemonic.
    pub fn text_mnemonic(&self) -> String {
        text_mnemonic(self.mnemonic)
    }
}

/// Derives the text-format mnemonic from a binary-format mnemonic.
///
/// Legacy forms spell the operand type after a slash
/// (`i32.trunc_s/f32`); the text format folds the operand type into the
/// name before the signedness suffix (`i32.trunc_f32_s`).
/// Mnemonics without a slash are unchanged.
///
/// # Examples
/// ```rust
/// use wasmkit::isa::text_mnemonic;
///
/// assert_eq!(text_mnemonic("f32.convert_u/i64"), "f32.convert_i64_u");
/// assert_eq!(text_mnemonic("i32.wrap/i64"), "i32.wrap_i64");
/// assert_eq!(text_mnemonic("i32.add"), "i32.add");
/// ```
pub fn text_mnemonic(binary: &str) -> String {
    match binary.split_once('/') {
        None => binary.to_string(),
        Some((head, operand)) => {
            if let Some(base) = head.strip_suffix("_s") {
                format!("{base}_{operand}_s")
            } else if let Some(base) = head.strip_suffix("_u") {
                format!("{base}_{operand}_u")
            } else {
                format!("{head}_{operand}")
            }
        }
    }
}

/// All operators of the MVP instruction set, in opcode order.
pub fn operators() -> &'static [Operator] {
    static OPERATORS: OnceLock<Vec<Operator>> = OnceLock::new();

    OPERATORS.get_or_init(build_catalog).as_slice()
}

/// Looks up an operator by its opcode byte.
pub fn by_opcode(opcode: u8) -> Option<&'static Operator> {
    static INDEX: OnceLock<HashMap<u8, usize>> = OnceLock::new();

    let index = INDEX.get_or_init(|| {
        operators()
            .iter()
            .enumerate()
            .map(|(position, operator)| (operator.opcode, position))
            .collect()
    });

    index.get(&opcode).map(|&position| &operators()[position])
}

/// Looks up an operator by its text-format mnemonic.
pub fn by_text_mnemonic(mnemonic: &str) -> Option<&'static Operator> {
    static INDEX: OnceLock<HashMap<String, usize>> = OnceLock::new();

    let index = INDEX.get_or_init(|| {
        operators()
            .iter()
            .enumerate()
            .map(|(position, operator)| (operator.text_mnemonic(), position))
            .collect()
    });

    index.get(mnemonic).map(|&position| &operators()[position])
}

fn build_catalog() -> Vec<Operator> {
    use ControlInstruction as C;
    use FloatType::*;
    use IntegerType::*;
    use MemoryInstruction as M;
    use NumericInstruction as N;
    use SignExtension::*;
    use VariableInstruction as V;

    let op = |opcode, kind, mnemonic, immediate, constructor| Operator {
        opcode,
        kind,
        mnemonic,
        immediate,
        constructor,
    };
    let none = |opcode, mnemonic, immediate, constructor| {
        op(opcode, None, mnemonic, immediate, constructor)
    };
    let i32t = Some(ValueType::I32);
    let i64t = Some(ValueType::I64);
    let f32t = Some(ValueType::F32);
    let f64t = Some(ValueType::F64);

    vec![
        // Control operators.
        none(0x00, "unreachable", Immediate::None, Constructor::Fixed(|| C::Unreachable.into())),
        none(0x01, "nop", Immediate::None, Constructor::Fixed(|| C::Nop.into())),
        none(0x02, "block", Immediate::Block, Constructor::Structured),
        none(0x03, "loop", Immediate::Block, Constructor::Structured),
        none(0x04, "if", Immediate::Block, Constructor::Structured),
        none(0x05, "else", Immediate::None, Constructor::Structured),
        none(0x0B, "end", Immediate::None, Constructor::Structured),
        none(0x0C, "br", Immediate::Label, Constructor::Index(|label| C::Branch(label).into())),
        none(0x0D, "br_if", Immediate::Label, Constructor::Index(|label| C::BranchIf(label).into())),
        none(0x0E, "br_table", Immediate::LabelTable, Constructor::Structured),
        none(0x0F, "return", Immediate::None, Constructor::Fixed(|| C::Return.into())),
        none(0x10, "call", Immediate::Function, Constructor::Index(|function| C::Call(function).into())),
        none(0x11, "call_indirect", Immediate::TypeUse, Constructor::Structured),
        // Parametric operators.
        none(0x1A, "drop", Immediate::None, Constructor::Fixed(|| ParametricInstruction::Drop.into())),
        none(0x1B, "select", Immediate::None, Constructor::Fixed(|| ParametricInstruction::Select.into())),
        // Variable operators.
        none(0x20, "local.get", Immediate::Local, Constructor::Index(|local| V::LocalGet(local).into())),
        none(0x21, "local.set", Immediate::Local, Constructor::Index(|local| V::LocalSet(local).into())),
        none(0x22, "local.tee", Immediate::Local, Constructor::Index(|local| V::LocalTee(local).into())),
        none(0x23, "global.get", Immediate::Global, Constructor::Index(|global| V::GlobalGet(global).into())),
        none(0x24, "global.set", Immediate::Global, Constructor::Index(|global| V::GlobalSet(global).into())),
        // Memory operators.
        none(0x28, "i32.load", Immediate::Memory(2), Constructor::Memory(|arg| M::Load(ValueType::I32, arg).into())),
        none(0x29, "i64.load", Immediate::Memory(3), Constructor::Memory(|arg| M::Load(ValueType::I64, arg).into())),
        none(0x2A, "f32.load", Immediate::Memory(2), Constructor::Memory(|arg| M::Load(ValueType::F32, arg).into())),
        none(0x2B, "f64.load", Immediate::Memory(3), Constructor::Memory(|arg| M::Load(ValueType::F64, arg).into())),
        none(0x2C, "i32.load8_s", Immediate::Memory(0), Constructor::Memory(|arg| M::Load8(I32, Signed, arg).into())),
        none(0x2D, "i32.load8_u", Immediate::Memory(0), Constructor::Memory(|arg| M::Load8(I32, Unsigned, arg).into())),
        none(0x2E, "i32.load16_s", Immediate::Memory(1), Constructor::Memory(|arg| M::Load16(I32, Signed, arg).into())),
        none(0x2F, "i32.load16_u", Immediate::Memory(1), Constructor::Memory(|arg| M::Load16(I32, Unsigned, arg).into())),
        none(0x30, "i64.load8_s", Immediate::Memory(0), Constructor::Memory(|arg| M::Load8(I64, Signed, arg).into())),
        none(0x31, "i64.load8_u", Immediate::Memory(0), Constructor::Memory(|arg| M::Load8(I64, Unsigned, arg).into())),
        none(0x32, "i64.load16_s", Immediate::Memory(1), Constructor::Memory(|arg| M::Load16(I64, Signed, arg).into())),
        none(0x33, "i64.load16_u", Immediate::Memory(1), Constructor::Memory(|arg| M::Load16(I64, Unsigned, arg).into())),
        none(0x34, "i64.load32_s", Immediate::Memory(2), Constructor::Memory(|arg| M::Load32(Signed, arg).into())),
        none(0x35, "i64.load32_u", Immediate::Memory(2), Constructor::Memory(|arg| M::Load32(Unsigned, arg).into())),
        none(0x36, "i32.store", Immediate::Memory(2), Constructor::Memory(|arg| M::Store(ValueType::I32, arg).into())),
        none(0x37, "i64.store", Immediate::Memory(3), Constructor::Memory(|arg| M::Store(ValueType::I64, arg).into())),
        none(0x38, "f32.store", Immediate::Memory(2), Constructor::Memory(|arg| M::Store(ValueType::F32, arg).into())),
        none(0x39, "f64.store", Immediate::Memory(3), Constructor::Memory(|arg| M::Store(ValueType::F64, arg).into())),
        none(0x3A, "i32.store8", Immediate::Memory(0), Constructor::Memory(|arg| M::Store8(I32, arg).into())),
        none(0x3B, "i32.store16", Immediate::Memory(1), Constructor::Memory(|arg| M::Store16(I32, arg).into())),
        none(0x3C, "i64.store8", Immediate::Memory(0), Constructor::Memory(|arg| M::Store8(I64, arg).into())),
        none(0x3D, "i64.store16", Immediate::Memory(1), Constructor::Memory(|arg| M::Store16(I64, arg).into())),
        none(0x3E, "i64.store32", Immediate::Memory(2), Constructor::Memory(|arg| M::Store32(arg).into())),
        none(0x3F, "memory.size", Immediate::None, Constructor::Fixed(|| M::Size.into())),
        none(0x40, "memory.grow", Immediate::None, Constructor::Fixed(|| M::Grow.into())),
        // Constants.
        op(0x41, i32t, "i32.const", Immediate::I32, Constructor::I32(|value| N::I32Constant(value).into())),
        op(0x42, i64t, "i64.const", Immediate::I64, Constructor::I64(|value| N::I64Constant(value).into())),
        op(0x43, f32t, "f32.const", Immediate::F32, Constructor::F32(|value| N::F32Constant(value).into())),
        op(0x44, f64t, "f64.const", Immediate::F64, Constructor::F64(|value| N::F64Constant(value).into())),
        // i32 comparisons.
        op(0x45, i32t, "i32.eqz", Immediate::None, Constructor::Fixed(|| N::EqualToZero(I32).into())),
        op(0x46, i32t, "i32.eq", Immediate::None, Constructor::Fixed(|| N::Equal(ValueType::I32).into())),
        op(0x47, i32t, "i32.ne", Immediate::None, Constructor::Fixed(|| N::NotEqual(ValueType::I32).into())),
        op(0x48, i32t, "i32.lt_s", Immediate::None, Constructor::Fixed(|| N::LessThanInteger(I32, Signed).into())),
        op(0x49, i32t, "i32.lt_u", Immediate::None, Constructor::Fixed(|| N::LessThanInteger(I32, Unsigned).into())),
        op(0x4A, i32t, "i32.gt_s", Immediate::None, Constructor::Fixed(|| N::GreaterThanInteger(I32, Signed).into())),
        op(0x4B, i32t, "i32.gt_u", Immediate::None, Constructor::Fixed(|| N::GreaterThanInteger(I32, Unsigned).into())),
        op(0x4C, i32t, "i32.le_s", Immediate::None, Constructor::Fixed(|| N::LessThanOrEqualToInteger(I32, Signed).into())),
        op(0x4D, i32t, "i32.le_u", Immediate::None, Constructor::Fixed(|| N::LessThanOrEqualToInteger(I32, Unsigned).into())),
        op(0x4E, i32t, "i32.ge_s", Immediate::None, Constructor::Fixed(|| N::GreaterThanOrEqualToInteger(I32, Signed).into())),
        op(0x4F, i32t, "i32.ge_u", Immediate::None, Constructor::Fixed(|| N::GreaterThanOrEqualToInteger(I32, Unsigned).into())),
        // i64 comparisons.
        op(0x50, i64t, "i64.eqz", Immediate::None, Constructor::Fixed(|| N::EqualToZero(I64).into())),
        op(0x51, i64t, "i64.eq", Immediate::None, Constructor::Fixed(|| N::Equal(ValueType::I64).into())),
        op(0x52, i64t, "i64.ne", Immediate::None, Constructor::Fixed(|| N::NotEqual(ValueType::I64).into())),
        op(0x53, i64t, "i64.lt_s", Immediate::None, Constructor::Fixed(|| N::LessThanInteger(I64, Signed).into())),
        op(0x54, i64t, "i64.lt_u", Immediate::None, Constructor::Fixed(|| N::LessThanInteger(I64, Unsigned).into())),
        op(0x55, i64t, "i64.gt_s", Immediate::None, Constructor::Fixed(|| N::GreaterThanInteger(I64, Signed).into())),
        op(0x56, i64t, "i64.gt_u", Immediate::None, Constructor::Fixed(|| N::GreaterThanInteger(I64, Unsigned).into())),
        op(0x57, i64t, "i64.le_s", Immediate::None, Constructor::Fixed(|| N::LessThanOrEqualToInteger(I64, Signed).into())),
        op(0x58, i64t, "i64.le_u", Immediate::None, Constructor::Fixed(|| N::LessThanOrEqualToInteger(I64, Unsigned).into())),
        op(0x59, i64t, "i64.ge_s", Immediate::None, Constructor::Fixed(|| N::GreaterThanOrEqualToInteger(I64, Signed).into())),
        op(0x5A, i64t, "i64.ge_u", Immediate::None, Constructor::Fixed(|| N::GreaterThanOrEqualToInteger(I64, Unsigned).into())),
        // f32 comparisons.
        op(0x5B, f32t, "f32.eq", Immediate::None, Constructor::Fixed(|| N::Equal(ValueType::F32).into())),
        op(0x5C, f32t, "f32.ne", Immediate::None, Constructor::Fixed(|| N::NotEqual(ValueType::F32).into())),
        op(0x5D, f32t, "f32.lt", Immediate::None, Constructor::Fixed(|| N::LessThanFloat(F32).into())),
        op(0x5E, f32t, "f32.gt", Immediate::None, Constructor::Fixed(|| N::GreaterThanFloat(F32).into())),
        op(0x5F, f32t, "f32.le", Immediate::None, Constructor::Fixed(|| N::LessThanOrEqualToFloat(F32).into())),
        op(0x60, f32t, "f32.ge", Immediate::None, Constructor::Fixed(|| N::GreaterThanOrEqualToFloat(F32).into())),
        // f64 comparisons.
        op(0x61, f64t, "f64.eq", Immediate::None, Constructor::Fixed(|| N::Equal(ValueType::F64).into())),
        op(0x62, f64t, "f64.ne", Immediate::None, Constructor::Fixed(|| N::NotEqual(ValueType::F64).into())),
        op(0x63, f64t, "f64.lt", Immediate::None, Constructor::Fixed(|| N::LessThanFloat(F64).into())),
        op(0x64, f64t, "f64.gt", Immediate::None, Constructor::Fixed(|| N::GreaterThanFloat(F64).into())),
        op(0x65, f64t, "f64.le", Immediate::None, Constructor::Fixed(|| N::LessThanOrEqualToFloat(F64).into())),
        op(0x66, f64t, "f64.ge", Immediate::None, Constructor::Fixed(|| N::GreaterThanOrEqualToFloat(F64).into())),
        // i32 arithmetic.
        op(0x67, i32t, "i32.clz", Immediate::None, Constructor::Fixed(|| N::CountLeadingZeros(I32).into())),
        op(0x68, i32t, "i32.ctz", Immediate::None, Constructor::Fixed(|| N::CountTrailingZeros(I32).into())),
        op(0x69, i32t, "i32.popcnt", Immediate::None, Constructor::Fixed(|| N::CountOnes(I32).into())),
        op(0x6A, i32t, "i32.add", Immediate::None, Constructor::Fixed(|| N::Add(ValueType::I32).into())),
        op(0x6B, i32t, "i32.sub", Immediate::None, Constructor::Fixed(|| N::Subtract(ValueType::I32).into())),
        op(0x6C, i32t, "i32.mul", Immediate::None, Constructor::Fixed(|| N::Multiply(ValueType::I32).into())),
        op(0x6D, i32t, "i32.div_s", Immediate::None, Constructor::Fixed(|| N::DivideInteger(I32, Signed).into())),
        op(0x6E, i32t, "i32.div_u", Immediate::None, Constructor::Fixed(|| N::DivideInteger(I32, Unsigned).into())),
        op(0x6F, i32t, "i32.rem_s", Immediate::None, Constructor::Fixed(|| N::Remainder(I32, Signed).into())),
        op(0x70, i32t, "i32.rem_u", Immediate::None, Constructor::Fixed(|| N::Remainder(I32, Unsigned).into())),
        op(0x71, i32t, "i32.and", Immediate::None, Constructor::Fixed(|| N::And(I32).into())),
        op(0x72, i32t, "i32.or", Immediate::None, Constructor::Fixed(|| N::Or(I32).into())),
        op(0x73, i32t, "i32.xor", Immediate::None, Constructor::Fixed(|| N::Xor(I32).into())),
        op(0x74, i32t, "i32.shl", Immediate::None, Constructor::Fixed(|| N::ShiftLeft(I32).into())),
        op(0x75, i32t, "i32.shr_s", Immediate::None, Constructor::Fixed(|| N::ShiftRight(I32, Signed).into())),
        op(0x76, i32t, "i32.shr_u", Immediate::None, Constructor::Fixed(|| N::ShiftRight(I32, Unsigned).into())),
        op(0x77, i32t, "i32.rotl", Immediate::None, Constructor::Fixed(|| N::RotateLeft(I32).into())),
        op(0x78, i32t, "i32.rotr", Immediate::None, Constructor::Fixed(|| N::RotateRight(I32).into())),
        // i64 arithmetic.
        op(0x79, i64t, "i64.clz", Immediate::None, Constructor::Fixed(|| N::CountLeadingZeros(I64).into())),
        op(0x7A, i64t, "i64.ctz", Immediate::None, Constructor::Fixed(|| N::CountTrailingZeros(I64).into())),
        op(0x7B, i64t, "i64.popcnt", Immediate::None, Constructor::Fixed(|| N::CountOnes(I64).into())),
        op(0x7C, i64t, "i64.add", Immediate::None, Constructor::Fixed(|| N::Add(ValueType::I64).into())),
        op(0x7D, i64t, "i64.sub", Immediate::None, Constructor::Fixed(|| N::Subtract(ValueType::I64).into())),
        op(0x7E, i64t, "i64.mul", Immediate::None, Constructor::Fixed(|| N::Multiply(ValueType::I64).into())),
        op(0x7F, i64t, "i64.div_s", Immediate::None, Constructor::Fixed(|| N::DivideInteger(I64, Signed).into())),
        op(0x80, i64t, "i64.div_u", Immediate::None, Constructor::Fixed(|| N::DivideInteger(I64, Unsigned).into())),
        op(0x81, i64t, "i64.rem_s", Immediate::None, Constructor::Fixed(|| N::Remainder(I64, Signed).into())),
        op(0x82, i64t, "i64.rem_u", Immediate::None, Constructor::Fixed(|| N::Remainder(I64, Unsigned).into())),
        op(0x83, i64t, "i64.and", Immediate::None, Constructor::Fixed(|| N::And(I64).into())),
        op(0x84, i64t, "i64.or", Immediate::None, Constructor::Fixed(|| N::Or(I64).into())),
        op(0x85, i64t, "i64.xor", Immediate::None, Constructor::Fixed(|| N::Xor(I64).into())),
        op(0x86, i64t, "i64.shl", Immediate::None, Constructor::Fixed(|| N::ShiftLeft(I64).into())),
        op(0x87, i64t, "i64.shr_s", Immediate::None, Constructor::Fixed(|| N::ShiftRight(I64, Signed).into())),
        op(0x88, i64t, "i64.shr_u", Immediate::None, Constructor::Fixed(|| N::ShiftRight(I64, Unsigned).into())),
        op(0x89, i64t, "i64.rotl", Immediate::None, Constructor::Fixed(|| N::RotateLeft(I64).into())),
        op(0x8A, i64t, "i64.rotr", Immediate::None, Constructor::Fixed(|| N::RotateRight(I64).into())),
        // f32 arithmetic.
        op(0x8B, f32t, "f32.abs", Immediate::None, Constructor::Fixed(|| N::AbsoluteValue(F32).into())),
        op(0x8C, f32t, "f32.neg", Immediate::None, Constructor::Fixed(|| N::Negate(F32).into())),
        op(0x8D, f32t, "f32.ceil", Immediate::None, Constructor::Fixed(|| N::Ceiling(F32).into())),
        op(0x8E, f32t, "f32.floor", Immediate::None, Constructor::Fixed(|| N::Floor(F32).into())),
        op(0x8F, f32t, "f32.trunc", Immediate::None, Constructor::Fixed(|| N::Truncate(F32).into())),
        op(0x90, f32t, "f32.nearest", Immediate::None, Constructor::Fixed(|| N::Nearest(F32).into())),
        op(0x91, f32t, "f32.sqrt", Immediate::None, Constructor::Fixed(|| N::SquareRoot(F32).into())),
        op(0x92, f32t, "f32.add", Immediate::None, Constructor::Fixed(|| N::Add(ValueType::F32).into())),
        op(0x93, f32t, "f32.sub", Immediate::None, Constructor::Fixed(|| N::Subtract(ValueType::F32).into())),
        op(0x94, f32t, "f32.mul", Immediate::None, Constructor::Fixed(|| N::Multiply(ValueType::F32).into())),
        op(0x95, f32t, "f32.div", Immediate::None, Constructor::Fixed(|| N::DivideFloat(F32).into())),
        op(0x96, f32t, "f32.min", Immediate::None, Constructor::Fixed(|| N::Minimum(F32).into())),
        op(0x97, f32t, "f32.max", Immediate::None, Constructor::Fixed(|| N::Maximum(F32).into())),
        op(0x98, f32t, "f32.copysign", Immediate::None, Constructor::Fixed(|| N::CopySign(F32).into())),
        // f64 arithmetic.
        op(0x99, f64t, "f64.abs", Immediate::None, Constructor::Fixed(|| N::AbsoluteValue(F64).into())),
        op(0x9A, f64t, "f64.neg", Immediate::None, Constructor::Fixed(|| N::Negate(F64).into())),
        op(0x9B, f64t, "f64.ceil", Immediate::None, Constructor::Fixed(|| N::Ceiling(F64).into())),
        op(0x9C, f64t, "f64.floor", Immediate::None, Constructor::Fixed(|| N::Floor(F64).into())),
        op(0x9D, f64t, "f64.trunc", Immediate::None, Constructor::Fixed(|| N::Truncate(F64).into())),
        op(0x9E, f64t, "f64.nearest", Immediate::None, Constructor::Fixed(|| N::Nearest(F64).into())),
        op(0x9F, f64t, "f64.sqrt", Immediate::None, Constructor::Fixed(|| N::SquareRoot(F64).into())),
        op(0xA0, f64t, "f64.add", Immediate::None, Constructor::Fixed(|| N::Add(ValueType::F64).into())),
        op(0xA1, f64t, "f64.sub", Immediate::None, Constructor::Fixed(|| N::Subtract(ValueType::F64).into())),
        op(0xA2, f64t, "f64.mul", Immediate::None, Constructor::Fixed(|| N::Multiply(ValueType::F64).into())),
        op(0xA3, f64t, "f64.div", Immediate::None, Constructor::Fixed(|| N::DivideFloat(F64).into())),
        op(0xA4, f64t, "f64.min", Immediate::None, Constructor::Fixed(|| N::Minimum(F64).into())),
        op(0xA5, f64t, "f64.max", Immediate::None, Constructor::Fixed(|| N::Maximum(F64).into())),
        op(0xA6, f64t, "f64.copysign", Immediate::None, Constructor::Fixed(|| N::CopySign(F64).into())),
        // Conversions.
        op(0xA7, i32t, "i32.wrap/i64", Immediate::None, Constructor::Fixed(|| N::Wrap.into())),
        op(0xA8, i32t, "i32.trunc_s/f32", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I32, F32, Signed).into())),
        op(0xA9, i32t, "i32.trunc_u/f32", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I32, F32, Unsigned).into())),
        op(0xAA, i32t, "i32.trunc_s/f64", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I32, F64, Signed).into())),
        op(0xAB, i32t, "i32.trunc_u/f64", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I32, F64, Unsigned).into())),
        op(0xAC, i64t, "i64.extend_s/i32", Immediate::None, Constructor::Fixed(|| N::Extend(Signed).into())),
        op(0xAD, i64t, "i64.extend_u/i32", Immediate::None, Constructor::Fixed(|| N::Extend(Unsigned).into())),
        op(0xAE, i64t, "i64.trunc_s/f32", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I64, F32, Signed).into())),
        op(0xAF, i64t, "i64.trunc_u/f32", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I64, F32, Unsigned).into())),
        op(0xB0, i64t, "i64.trunc_s/f64", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I64, F64, Signed).into())),
        op(0xB1, i64t, "i64.trunc_u/f64", Immediate::None, Constructor::Fixed(|| N::ConvertAndTruncate(I64, F64, Unsigned).into())),
        op(0xB2, f32t, "f32.convert_s/i32", Immediate::None, Constructor::Fixed(|| N::Convert(F32, I32, Signed).into())),
        op(0xB3, f32t, "f32.convert_u/i32", Immediate::None, Constructor::Fixed(|| N::Convert(F32, I32, Unsigned).into())),
        op(0xB4, f32t, "f32.convert_s/i64", Immediate::None, Constructor::Fixed(|| N::Convert(F32, I64, Signed).into())),
        op(0xB5, f32t, "f32.convert_u/i64", Immediate::None, Constructor::Fixed(|| N::Convert(F32, I64, Unsigned).into())),
        op(0xB6, f32t, "f32.demote/f64", Immediate::None, Constructor::Fixed(|| N::Demote.into())),
        op(0xB7, f64t, "f64.convert_s/i32", Immediate::None, Constructor::Fixed(|| N::Convert(F64, I32, Signed).into())),
        op(0xB8, f64t, "f64.convert_u/i32", Immediate::None, Constructor::Fixed(|| N::Convert(F64, I32, Unsigned).into())),
        op(0xB9, f64t, "f64.convert_s/i64", Immediate::None, Constructor::Fixed(|| N::Convert(F64, I64, Signed).into())),
        op(0xBA, f64t, "f64.convert_u/i64", Immediate::None, Constructor::Fixed(|| N::Convert(F64, I64, Unsigned).into())),
        op(0xBB, f64t, "f64.promote/f32", Immediate::None, Constructor::Fixed(|| N::Promote.into())),
        op(0xBC, i32t, "i32.reinterpret/f32", Immediate::None, Constructor::Fixed(|| N::ReinterpretFloat(I32).into())),
        op(0xBD, i64t, "i64.reinterpret/f64", Immediate::None, Constructor::Fixed(|| N::ReinterpretFloat(I64).into())),
        op(0xBE, f32t, "f32.reinterpret/i32", Immediate::None, Constructor::Fixed(|| N::ReinterpretInteger(F32).into())),
        op(0xBF, f64t, "f64.reinterpret/i64", Immediate::None, Constructor::Fixed(|| N::ReinterpretInteger(F64).into())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_are_unique_and_ordered() {
        let catalog = operators();

        for window in catalog.windows(2) {
            assert!(window[0].opcode < window[1].opcode);
        }
    }

    #[test]
    fn lookup_by_opcode() {
        let operator = by_opcode(0x6A).unwrap();

        assert_eq!(operator.mnemonic, "i32.add");
        assert_eq!(operator.kind, Some(ValueType::I32));
        assert!(by_opcode(0xC0).is_none());
    }

    #[test]
    fn lookup_by_text_mnemonic() {
        assert_eq!(by_text_mnemonic("i32.trunc_f32_s").unwrap().opcode, 0xA8);
        assert_eq!(by_text_mnemonic("f32.convert_i64_u").unwrap().opcode, 0xB5);
        assert_eq!(by_text_mnemonic("local.get").unwrap().opcode, 0x20);
        assert!(by_text_mnemonic("i32.trunc_s/f32").is_none());
    }

    #[test]
    fn mnemonic_transform_is_total_for_nullary_operators() {
        for operator in operators() {
            if matches!(operator.constructor, Constructor::Fixed(_)) {
                let text = operator.text_mnemonic();

                assert!(!text.contains('/'), "{} still legacy", operator.mnemonic);
                assert_eq!(by_text_mnemonic(&text).unwrap().opcode, operator.opcode);
            }
        }
    }

    #[test]
    fn nullary_constructors_build_their_operator() {
        let operator = by_text_mnemonic("i32.add").unwrap();

        match operator.constructor {
            Constructor::Fixed(build) => assert_eq!(
                build(),
                Instruction::Numeric(NumericInstruction::Add(ValueType::I32))
            ),
            _ => panic!("i32.add is nullary"),
        }
    }
}
