//! Host-side side-data blocks.

use kbind_codegen::{HEADER_SLOTS, SideDataLayout};

/// One side-data block instance, zero-initialized.
///
/// Backed by pointer-sized words, which matches the alignment and slot size
/// of every field in [`SideDataLayout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideDataBlock {
    slots: Vec<usize>,
}

impl SideDataBlock {
    /// Allocate a block for `layout`.
    pub fn new(layout: &SideDataLayout) -> Self {
        Self { slots: vec![0; layout.slot_count()] }
    }

    /// Header slots reserved for the host runtime.
    pub fn header(&self) -> &[usize] {
        &self.slots[..HEADER_SLOTS]
    }

    pub fn header_mut(&mut self) -> &mut [usize] {
        &mut self.slots[..HEADER_SLOTS]
    }

    /// All slots, header first.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [usize] {
        &mut self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pointer `UnboundKernel::call` hands to the wrapper as `extra_ptr`.
    ///
    /// The wrapper only loads through it.
    pub fn as_ptr(&self) -> *const u8 {
        self.slots.as_ptr().cast()
    }
}
