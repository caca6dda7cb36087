//! Runtime faults with specification-mandated messages.

use std::fmt;
use thiserror::Error;

/// The closed set of specification trap messages.
/// `Display` renders the exact text the test suite matches on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrapReason {
    OutOfBoundsMemoryAccess,
    IntegerDivideByZero,
    IntegerOverflow,
    InvalidConversionToInteger,
    UndefinedElement,
    UninitializedElement,
    IndirectCallTypeMismatch,
    Unreachable,
    CallStackExhausted,
}

impl fmt::Display for TrapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            TrapReason::OutOfBoundsMemoryAccess => "out of bounds memory access",
            TrapReason::IntegerDivideByZero => "integer divide by zero",
            TrapReason::IntegerOverflow => "integer overflow",
            TrapReason::InvalidConversionToInteger => "invalid conversion to integer",
            TrapReason::UndefinedElement => "undefined element",
            TrapReason::UninitializedElement => "uninitialized element",
            TrapReason::IndirectCallTypeMismatch => "indirect call type mismatch",
            TrapReason::Unreachable => "unreachable",
            TrapReason::CallStackExhausted => "call stack exhausted",
        };

        f.write_str(message)
    }
}

/// A runtime fault. It aborts the current invocation and leaves the instance
/// in a defined but possibly partially-mutated state:
/// memory writes before the trap persist.
/// The reason carries the specification message;
/// the detail is an implementation-friendly elaboration.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{reason}")]
pub struct Trap {
    reason: TrapReason,
    detail: String,
}

impl Trap {
    /// Creates a new trap with the given reason and detail.
    pub fn new(reason: TrapReason, detail: impl Into<String>) -> Self {
        Trap {
            reason,
            detail: detail.into(),
        }
    }

    /// The specification message for this trap.
    pub fn reason(&self) -> TrapReason {
        self.reason
    }

    /// The implementation detail accompanying the message.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_the_specification() {
        assert_eq!(
            TrapReason::OutOfBoundsMemoryAccess.to_string(),
            "out of bounds memory access"
        );
        assert_eq!(
            TrapReason::IntegerDivideByZero.to_string(),
            "integer divide by zero"
        );
        assert_eq!(TrapReason::Unreachable.to_string(), "unreachable");
        assert_eq!(
            TrapReason::CallStackExhausted.to_string(),
            "call stack exhausted"
        );
    }

    #[test]
    fn traps_render_their_reason() {
        let trap = Trap::new(TrapReason::IntegerOverflow, "i32.div_s of INT_MIN by -1");

        assert_eq!(trap.to_string(), "integer overflow");
        assert_eq!(trap.detail(), "i32.div_s of INT_MIN by -1");
    }
}
