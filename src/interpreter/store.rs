//! Runtime storage owned by a module instance:
//! linear memories, tables, and globals.

use crate::interpreter::{Trap, TrapReason, Value};
use crate::model::{GlobalType, Limit, Mutability, TableType};

/// Bytes per linear-memory page.
pub const PAGE_SIZE: usize = 65536;

/// An address of a function within an instance's function index space,
/// as stored in table slots.
pub type FunctionAddress = usize;

/// A linear memory: a contiguous byte array whose length is always a whole
/// number of pages. Freshly allocated pages are zero-filled.
///
/// # Examples
/// ```rust
/// use wasmkit::interpreter::MemoryInstance;
/// use wasmkit::Limit;
///
/// let mut memory = MemoryInstance::new(&Limit::bounded(1, 2));
///
/// assert_eq!(memory.size_in_pages(), 1);
/// assert_eq!(memory.grow(1, u32::MAX), 1);
/// assert_eq!(memory.grow(1, u32::MAX), -1);
/// ```
#[derive(Debug)]
pub struct MemoryInstance {
    bytes: Vec<u8>,
    maximum: Option<u32>,
}

impl MemoryInstance {
    /// Allocates a zero-filled memory at its declared initial size.
    pub fn new(limits: &Limit) -> Self {
        MemoryInstance {
            bytes: vec![0; limits.initial() as usize * PAGE_SIZE],
            maximum: limits.maximum(),
        }
    }

    /// The current size, in pages.
    pub fn size_in_pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    /// The current size, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// The declared maximum size, in pages.
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }

    /// Grows the memory by the given number of pages,
    /// bounded by the declared maximum and the host cap on total pages.
    /// Returns the previous page count, or -1 when the growth is denied;
    /// a denied growth leaves the size unchanged.
    pub fn grow(&mut self, delta: u32, available: u32) -> i32 {
        let previous = self.size_in_pages();
        let next = match previous.checked_add(delta) {
            Some(next) => next,
            None => return -1,
        };

        if delta > available || next > self.maximum.unwrap_or(u32::MAX) {
            return -1;
        }

        self.bytes.resize(next as usize * PAGE_SIZE, 0);

        previous as i32
    }

    /// Reads `N` bytes at the effective address.
    /// The accessed range must lie within the current size.
    pub fn load<const N: usize>(&self, address: u64) -> Result<[u8; N], Trap> {
        let end = address.checked_add(N as u64);

        match end {
            Some(end) if end <= self.bytes.len() as u64 => {
                let mut bytes = [0u8; N];

                bytes.copy_from_slice(&self.bytes[address as usize..address as usize + N]);

                Ok(bytes)
            }
            _ => Err(Trap::new(
                TrapReason::OutOfBoundsMemoryAccess,
                format!("{N} bytes at address {address}"),
            )),
        }
    }

    /// Writes bytes at the effective address.
    /// The accessed range must lie within the current size.
    pub fn store(&mut self, address: u64, bytes: &[u8]) -> Result<(), Trap> {
        let end = address.checked_add(bytes.len() as u64);

        match end {
            Some(end) if end <= self.bytes.len() as u64 => {
                self.bytes[address as usize..address as usize + bytes.len()]
                    .copy_from_slice(bytes);

                Ok(())
            }
            _ => Err(Trap::new(
                TrapReason::OutOfBoundsMemoryAccess,
                format!("{} bytes at address {address}", bytes.len()),
            )),
        }
    }
}

/// A table of function references. Slots start out null.
#[derive(Debug)]
pub struct TableInstance {
    slots: Vec<Option<FunctionAddress>>,
    maximum: Option<u32>,
}

impl TableInstance {
    /// Allocates a table at its declared initial size, every slot null.
    pub fn new(kind: &TableType) -> Self {
        TableInstance {
            slots: vec![None; kind.limits().initial() as usize],
            maximum: kind.limits().maximum(),
        }
    }

    /// The current number of slots.
    pub fn size(&self) -> u32 {
        self.slots.len() as u32
    }

    /// The declared maximum number of slots.
    pub fn maximum(&self) -> Option<u32> {
        self.maximum
    }

    /// Reads a slot.
    /// An out-of-bounds index traps as `undefined element`.
    pub fn get(&self, index: u32) -> Result<Option<FunctionAddress>, Trap> {
        self.slots.get(index as usize).copied().ok_or_else(|| {
            Trap::new(
                TrapReason::UndefinedElement,
                format!("table index {index} of {}", self.slots.len()),
            )
        })
    }

    /// Copies function addresses into the table at the given offset.
    /// An out-of-bounds copy traps as `undefined element`.
    pub fn initialize(&mut self, offset: u32, functions: &[FunctionAddress]) -> Result<(), Trap> {
        let end = offset as usize + functions.len();

        if end > self.slots.len() {
            return Err(Trap::new(
                TrapReason::UndefinedElement,
                format!("element segment of {} entries at offset {offset}", functions.len()),
            ));
        }

        for (slot, function) in self.slots[offset as usize..end].iter_mut().zip(functions) {
            *slot = Some(*function);
        }

        Ok(())
    }
}

/// A global variable holding one value;
/// writes require the declared mutability.
#[derive(Debug)]
pub struct GlobalInstance {
    kind: GlobalType,
    value: Value,
}

impl GlobalInstance {
    /// Creates a global with its initial value.
    pub fn new(kind: GlobalType, value: Value) -> Self {
        GlobalInstance { kind, value }
    }

    /// The declared type of the global.
    pub fn kind(&self) -> GlobalType {
        self.kind
    }

    /// The current value.
    pub fn get(&self) -> Value {
        self.value
    }

    /// Replaces the value of a mutable global.
    pub fn set(&mut self, value: Value) -> Result<(), Trap> {
        if self.kind.mutability() != Mutability::Mutable {
            return Err(Trap::new(
                TrapReason::Unreachable,
                "write to an immutable global",
            ));
        }

        if value.kind() != self.kind.kind() {
            return Err(Trap::new(
                TrapReason::Unreachable,
                format!(
                    "global of {:?} written with {:?}",
                    self.kind.kind(),
                    value.kind()
                ),
            ));
        }

        self.value = value;

        Ok(())
    }
}

/// Convenience constructor for host-supplied globals.
impl GlobalInstance {
    /// An immutable global of the value's own type.
    pub fn constant(value: Value) -> Self {
        GlobalInstance {
            kind: GlobalType::immutable(value.kind()),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    #[test]
    fn memory_starts_zero_filled() {
        let memory = MemoryInstance::new(&Limit::unbounded(1));

        assert_eq!(memory.size_in_pages(), 1);
        assert_eq!(memory.load::<8>(0).unwrap(), [0; 8]);
    }

    #[test]
    fn boundary_access_succeeds_one_past_traps() {
        let mut memory = MemoryInstance::new(&Limit::unbounded(1));
        let last = (PAGE_SIZE - 4) as u64;

        memory.store(last, &[1, 2, 3, 4]).unwrap();
        assert_eq!(memory.load::<4>(last).unwrap(), [1, 2, 3, 4]);

        let trap = memory.load::<4>(last + 1).unwrap_err();
        assert_eq!(trap.reason(), TrapReason::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn grow_beyond_maximum_is_denied_without_effect() {
        let mut memory = MemoryInstance::new(&Limit::bounded(1, 2));

        assert_eq!(memory.grow(2, u32::MAX), -1);
        assert_eq!(memory.size_in_pages(), 1);
        assert_eq!(memory.grow(1, u32::MAX), 1);
        assert_eq!(memory.size_in_pages(), 2);
    }

    #[test]
    fn grow_respects_the_host_cap() {
        let mut memory = MemoryInstance::new(&Limit::unbounded(1));

        assert_eq!(memory.grow(8, 4), -1);
        assert_eq!(memory.grow(4, 4), 1);
    }

    #[test]
    fn table_slots_start_null() {
        let table = TableInstance::new(&TableType::new(
            ElementKind::FunctionReference,
            Limit::bounded(2, 4),
        ));

        assert_eq!(table.size(), 2);
        assert_eq!(table.get(0).unwrap(), None);
        assert_eq!(
            table.get(2).unwrap_err().reason(),
            TrapReason::UndefinedElement
        );
    }

    #[test]
    fn table_initialization_is_bounds_checked() {
        let mut table = TableInstance::new(&TableType::new(
            ElementKind::FunctionReference,
            Limit::unbounded(2),
        ));

        table.initialize(1, &[7]).unwrap();
        assert_eq!(table.get(1).unwrap(), Some(7));
        assert!(table.initialize(2, &[7]).is_err());
    }

    #[test]
    fn immutable_globals_reject_writes() {
        let mut global = GlobalInstance::constant(Value::I32(666));

        assert!(global.set(Value::I32(1)).is_err());
        assert_eq!(global.get(), Value::I32(666));

        let mut counter = GlobalInstance::new(
            GlobalType::mutable(crate::ValueType::I64),
            Value::I64(0),
        );

        counter.set(Value::I64(9)).unwrap();
        assert_eq!(counter.get(), Value::I64(9));
    }
}
