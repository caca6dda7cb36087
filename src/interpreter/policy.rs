//! Execution limits imposed by the host.

/// Configuration bounding an instance's execution.
/// Cancellation is cooperative:
/// there is no preemptive interrupt beyond these limits.
#[derive(Copy, Clone, Debug)]
pub struct ExecutionPolicy {
    /// The maximum call depth, counting wasm and host frames alike.
    /// Exceeding it traps with `call stack exhausted`.
    pub max_call_stack_depth: usize,
    /// A cap on the total page count across all memories owned by the
    /// instance, applied on `memory.grow`. Zero means unbounded.
    pub max_memory_pages: u32,
    /// Reserved for a translating backend; the default interprets.
    pub translation_cache: bool,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy {
            max_call_stack_depth: 256,
            max_memory_pages: 0,
            translation_cache: false,
        }
    }
}

impl ExecutionPolicy {
    /// The policy used by conformance tests:
    /// the default depth with a 0x1000-page memory cap.
    pub fn testing() -> Self {
        ExecutionPolicy {
            max_memory_pages: 0x1000,
            ..ExecutionPolicy::default()
        }
    }
}
