//! Zeroed, aligned buffers reachable by the GDMA.

use core::alloc::Layout;
use core::ptr::NonNull;

use enumset::{enum_set, EnumSet, EnumSetType};

use crate::errors::{Error, Result};
use crate::hal::Platform;

/// Heap capabilities a buffer was requested with
#[derive(Debug, EnumSetType)]
#[enumset(repr = "u32")]
pub enum MemCap {
    /// Reachable by DMA
    Dma = 3,
    /// Byte-addressable
    Bit8 = 2,
    /// External PSRAM
    Spiram = 10,
    /// Internal SRAM
    Internal = 11,
}

pub type MemCaps = EnumSet<MemCap>;

/// Default alignment of buffers placed in internal SRAM
pub const SRAM_TRANS_ALIGN: usize = 4;

/// Default alignment of buffers placed in PSRAM
pub const PSRAM_TRANS_ALIGN: usize = 64;

/// Where a buffer should live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Internal,
    Psram,
}

impl Placement {
    pub fn caps(&self) -> MemCaps {
        match self {
            Self::Internal => enum_set!(MemCap::Internal | MemCap::Dma),
            Self::Psram => enum_set!(MemCap::Spiram | MemCap::Bit8),
        }
    }
}

/// An owned, zero-initialised heap buffer with a fixed alignment, taken
/// from the heap of a [`Platform`] matching its placement.
///
/// The memory is only ever touched through raw pointers once the DMA has been
/// pointed at it, so the type hands out pointers rather than slices.
pub struct DmaBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    caps: MemCaps,
    free: unsafe fn(*mut u8, Layout, MemCaps),
}

impl DmaBuffer {
    pub fn new<P: Platform>(len: usize, align: usize, placement: Placement) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidSize);
        }

        let layout = Layout::from_size_align(len, align).map_err(|_| Error::InvalidArg)?;
        let caps = placement.caps();

        let ptr = unsafe { P::alloc_zeroed(layout, caps) };
        let ptr = NonNull::new(ptr).ok_or(Error::NoMem)?;

        Ok(Self {
            ptr,
            layout,
            caps,
            free: P::free,
        })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn caps(&self) -> MemCaps {
        self.caps
    }

    /// Whether `ptr` is the start of this buffer.
    pub fn contains(&self, ptr: *const u8) -> bool {
        core::ptr::eq(ptr, self.as_ptr())
    }

    /// Whether `len` bytes at `ptr` share at least one byte with this buffer.
    pub fn overlaps(&self, ptr: *const u8, len: usize) -> bool {
        let start = self.as_ptr() as usize;
        let other = ptr as usize;

        len != 0 && other < start + self.len() && start < other.saturating_add(len)
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        unsafe { (self.free)(self.ptr.as_ptr(), self.layout, self.caps) };
    }
}

unsafe impl Send for DmaBuffer {}
unsafe impl Sync for DmaBuffer {}
