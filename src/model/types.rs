//! Model for types in the WebAssembly syntax.

/// Value types classify the individual values that WebAssembly code can
/// compute with and the values that a variable accepts.
/// This implementation targets the MVP, where value types and number types
/// coincide: 32 and 64 bit integers and IEEE 754-2019 binary32/binary64
/// floating-point data.
/// Number types are transparent, meaning that their bit patterns can be
/// observed; integers are not inherently signed or unsigned, their
/// interpretation is determined by individual operations.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#value-types>
///
/// # Examples
/// ```rust
/// use wasmkit::{IntegerType, FloatType, ValueType};
///
/// assert_eq!(ValueType::I32, IntegerType::I32.into());
/// assert_eq!(ValueType::I64, IntegerType::I64.into());
/// assert_eq!(ValueType::F32, FloatType::F32.into());
/// assert_eq!(ValueType::F64, FloatType::F64.into());
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

/// The types 𝗂𝟥𝟤 and 𝗂𝟨𝟦 classify 32 and 64 bit integers, respectively.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IntegerType {
    I32,
    I64,
}

/// The types 𝖿𝟥𝟤 and 𝖿𝟨𝟦 classify 32 and 64 bit floating-point data, respectively.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FloatType {
    F32,
    F64,
}

impl From<IntegerType> for ValueType {
    fn from(kind: IntegerType) -> Self {
        match kind {
            IntegerType::I32 => ValueType::I32,
            IntegerType::I64 => ValueType::I64,
        }
    }
}

impl From<FloatType> for ValueType {
    fn from(kind: FloatType) -> Self {
        match kind {
            FloatType::F32 => ValueType::F32,
            FloatType::F64 => ValueType::F64,
        }
    }
}

/// The kind of element stored in a table.
/// The MVP admits a single kind, 𝖿𝗎𝗇𝖼𝗋𝖾𝖿: an opaque reference to a function,
/// regardless of its function type.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#reference-types>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElementKind {
    FunctionReference,
}

/// Result types classify the result of executing instructions or functions,
/// which is a sequence of values, written with brackets.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#result-types>
///
/// # Examples
/// ```rust
/// use wasmkit::{ResultType, ValueType};
///
/// let result_type = ResultType::new(vec![ValueType::I32, ValueType::F64]);
///
/// assert_eq!(result_type.len(), 2);
/// assert!(!result_type.is_empty());
/// assert_eq!(result_type.kinds(), &[ValueType::I32, ValueType::F64]);
/// assert_eq!(ResultType::empty().len(), 0);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResultType {
    kinds: Vec<ValueType>,
}

impl ResultType {
    /// Creates a new `ResultType` with the given value types.
    pub fn new(kinds: Vec<ValueType>) -> Self {
        ResultType { kinds }
    }

    /// Creates a new empty `ResultType`.
    pub fn empty() -> Self {
        ResultType { kinds: vec![] }
    }

    /// A reference to a slice of the `ValueType`s.
    pub fn kinds(&self) -> &[ValueType] {
        &self.kinds
    }

    /// The length of the `ValueType` vector.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if this `ResultType` has a length of zero, false otherwise.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl From<Vec<ValueType>> for ResultType {
    fn from(kinds: Vec<ValueType>) -> Self {
        ResultType { kinds }
    }
}

/// Function types classify the signature of functions,
/// mapping a vector of parameters to a vector of results.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#function-types>
///
/// # Examples
/// ```rust
/// use wasmkit::{FunctionType, ResultType, ValueType};
///
/// let signature = FunctionType::new(
///     ResultType::new(vec![ValueType::I32, ValueType::I32]),
///     ResultType::new(vec![ValueType::I32]),
/// );
///
/// assert_eq!(signature.parameters().len(), 2);
/// assert_eq!(signature.results().len(), 1);
/// assert!(FunctionType::runnable().parameters().is_empty());
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionType {
    parameters: ResultType,
    results: ResultType,
}

impl FunctionType {
    /// Creates a new function signature with the given parameter and result types.
    pub fn new(parameters: ResultType, results: ResultType) -> Self {
        FunctionType {
            parameters,
            results,
        }
    }

    /// Creates a new function signature with no parameter or result types.
    pub fn runnable() -> Self {
        FunctionType {
            parameters: ResultType::empty(),
            results: ResultType::empty(),
        }
    }

    /// The parameter types of this `FunctionType`.
    pub fn parameters(&self) -> &ResultType {
        &self.parameters
    }

    /// The result types of this `FunctionType`.
    pub fn results(&self) -> &ResultType {
        &self.results
    }
}

/// Limits classify the size range of resizeable storage associated with
/// memory types and table types.
/// When a maximum is present, a well-formed limit satisfies
/// `initial <= maximum`.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#limits>
///
/// # Examples
/// ```rust
/// use wasmkit::Limit;
///
/// assert_eq!(Limit::unbounded(2), Limit::new(2, None));
/// assert_eq!(Limit::bounded(2, 5), Limit::new(2, Some(5)));
/// assert_eq!(Limit::bounded(2, 5).initial(), 2);
/// assert_eq!(Limit::bounded(2, 5).maximum(), Some(5));
/// assert!(Limit::bounded(2, 5).is_valid());
/// assert!(!Limit::bounded(5, 2).is_valid());
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Limit {
    initial: u32,
    maximum: Option<u32>,
}

impl Limit {
    /// Creates a new limit with a required initial size and optional maximum.
    pub fn new(initial: u32, maximum: Option<u32>) -> Self {
        Limit { initial, maximum }
    }

    /// Creates a new limit with a required initial size and no maximum.
    pub fn unbounded(initial: u32) -> Self {
        Limit {
            initial,
            maximum: None,
        }
    }

    /// Creates a new limit with a required initial size and maximum.
    pub fn bounded(initial: u32, maximum: u32) -> Self {
        Limit {
            initial,
            maximum: Some(maximum),
        }
    }

    /// The initial size of the limit.
    pub fn initial(&self) -> u32 {
        self.initial
    }

    /// The optional maximum size of the limit.
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }

    /// True when the initial size does not exceed the maximum, if present.
    pub fn is_valid(&self) -> bool {
        match self.maximum {
            Some(maximum) => self.initial <= maximum,
            None => true,
        }
    }
}

/// Memory types classify linear memories and their size range.
/// The limits constrain the minimum and optionally the maximum size of a
/// memory, in units of page size.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#memory-types>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryType {
    limits: Limit,
}

impl MemoryType {
    /// Creates a new memory type from the given limits.
    pub fn new(limits: Limit) -> Self {
        MemoryType { limits }
    }

    /// The limits of the number of pages for this `MemoryType`.
    pub fn limits(&self) -> &Limit {
        &self.limits
    }
}

impl From<Limit> for MemoryType {
    fn from(limits: Limit) -> Self {
        MemoryType { limits }
    }
}

/// Table types classify tables over elements of a given kind within a size
/// range. Like memories, tables are constrained by limits for their minimum
/// and optionally maximum size, in numbers of entries.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#table-types>
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableType {
    kind: ElementKind,
    limits: Limit,
}

impl TableType {
    /// Creates a new `TableType` for the given element kind and limits.
    pub fn new(kind: ElementKind, limits: Limit) -> Self {
        TableType { kind, limits }
    }

    /// The limits of the number of elements for this `TableType`.
    pub fn limits(&self) -> &Limit {
        &self.limits
    }

    /// The kind of the elements of this `TableType`.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }
}

/// Global types classify global variables, which hold a value and can either
/// be mutable or immutable.
///
/// See <https://webassembly.github.io/spec/core/syntax/types.html#global-types>
///
/// # Examples
/// ```rust
/// use wasmkit::{GlobalType, Mutability, ValueType};
///
/// let counter = GlobalType::mutable(ValueType::I64);
///
/// assert_eq!(counter.mutability(), Mutability::Mutable);
/// assert_eq!(counter.kind(), ValueType::I64);
/// assert_eq!(
///     GlobalType::immutable(ValueType::F64),
///     GlobalType::new(ValueType::F64, Mutability::Immutable)
/// );
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GlobalType {
    kind: ValueType,
    mutability: Mutability,
}

impl GlobalType {
    /// Creates a new `GlobalType` with the given value type and mutability.
    pub fn new(kind: ValueType, mutability: Mutability) -> Self {
        GlobalType { kind, mutability }
    }

    /// Creates a new `GlobalType` for a mutable global variable.
    pub fn mutable(kind: ValueType) -> Self {
        GlobalType {
            kind,
            mutability: Mutability::Mutable,
        }
    }

    /// Creates a new `GlobalType` for an immutable (i.e. constant) global variable.
    pub fn immutable(kind: ValueType) -> Self {
        GlobalType {
            kind,
            mutability: Mutability::Immutable,
        }
    }

    /// The `ValueType` of the global variable defined by this `GlobalType`.
    pub fn kind(&self) -> ValueType {
        self.kind
    }

    /// The mutability (i.e. variable versus constant) of the global variable type.
    pub fn mutability(&self) -> Mutability {
        self.mutability
    }
}

/// The mutability of a global variable.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mutability {
    Mutable,
    Immutable,
}
