//! GDMA descriptors and the descriptor rings that feed the LCD peripheral.
//!
//! Two rings are always built from one pool, one per frame buffer (or per
//! bounce buffer). Switching what the DMA sends is done by relinking the
//! terminal descriptors of the rings, never by moving pixel data.

use core::ptr;

use num_enum::{FromPrimitive, IntoPrimitive};

/// Largest buffer one descriptor can carry
pub const DMA_DESCRIPTOR_BUFFER_MAX_SIZE: usize = 4095;

/// Depth of the GDMA L2 FIFO, in pixels
pub const GDMA_L2FIFO_BASE_SIZE: usize = 16;

/// Pixels already sitting in the GDMA FIFO plus the LCD holding register
/// when the DMA is restarted
pub const LCD_FIFO_PRESERVE_SIZE_PX: usize = GDMA_L2FIFO_BASE_SIZE + 1;

/// Bytes skipped by the restart descriptor
pub const RESTART_SKIP_BYTES: usize = LCD_FIFO_PRESERVE_SIZE_PX * core::mem::size_of::<u16>();

const DW0_SIZE_MASK: u32 = 0xfff;
const DW0_LENGTH_SHIFT: u32 = 12;
const DW0_ERR_EOF: u32 = 1 << 28;
const DW0_SUC_EOF: u32 = 1 << 30;
const DW0_OWNER: u32 = 1 << 31;

/// Who may currently touch the buffer of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DescriptorOwner {
    #[num_enum(default)]
    Cpu = 0,
    Dma = 1,
}

/// A GDMA linked-list descriptor, bit-compatible with `dma_descriptor_t`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DmaDescriptor {
    dw0: u32,
    buffer: *mut u8,
    next: *mut DmaDescriptor,
}

impl DmaDescriptor {
    pub const fn new() -> Self {
        Self {
            dw0: 0,
            buffer: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Size of the buffer, in bytes
    pub fn size(&self) -> usize {
        (self.dw0 & DW0_SIZE_MASK) as usize
    }

    pub fn set_size(&mut self, size: usize) {
        self.dw0 = (self.dw0 & !DW0_SIZE_MASK) | (size as u32 & DW0_SIZE_MASK);
    }

    /// Number of valid bytes in the buffer
    pub fn length(&self) -> usize {
        ((self.dw0 >> DW0_LENGTH_SHIFT) & DW0_SIZE_MASK) as usize
    }

    pub fn set_length(&mut self, length: usize) {
        self.dw0 = (self.dw0 & !(DW0_SIZE_MASK << DW0_LENGTH_SHIFT))
            | ((length as u32 & DW0_SIZE_MASK) << DW0_LENGTH_SHIFT);
    }

    /// Whether this descriptor ends a transfer and raises the EOF interrupt
    pub fn suc_eof(&self) -> bool {
        self.dw0 & DW0_SUC_EOF != 0
    }

    pub fn set_suc_eof(&mut self, eof: bool) {
        if eof {
            self.dw0 |= DW0_SUC_EOF;
        } else {
            self.dw0 &= !DW0_SUC_EOF;
        }
    }

    pub fn err_eof(&self) -> bool {
        self.dw0 & DW0_ERR_EOF != 0
    }

    pub fn owner(&self) -> DescriptorOwner {
        DescriptorOwner::from((self.dw0 >> 31) as u8)
    }

    pub fn set_owner(&mut self, owner: DescriptorOwner) {
        match owner {
            DescriptorOwner::Cpu => self.dw0 &= !DW0_OWNER,
            DescriptorOwner::Dma => self.dw0 |= DW0_OWNER,
        }
    }

    pub fn buffer(&self) -> *mut u8 {
        self.buffer
    }

    pub fn next(&self) -> *mut DmaDescriptor {
        self.next
    }

    /// The raw first descriptor word.
    pub fn dw0(&self) -> u32 {
        self.dw0
    }
}

impl Default for DmaDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

/// How the two rings of a [`DescriptorRings`] pool are chained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Both rings form one loop: ring 0 flows into ring 1 and back.
    Bounce,
    /// Each ring loops onto its own head.
    Circular,
    /// Each ring ends in a null link.
    OneShot,
}

pub use self::rings::DescriptorRings;

mod rings {
    use core::mem;
    use core::ptr;

    use super::*;
    use crate::errors::{Error, Result};
    use crate::hal::Platform;
    use crate::memory::{DmaBuffer, Placement};

    /// Two descriptor rings of equal length plus one restart descriptor,
    /// kept in internal DMA-capable memory.
    pub struct DescriptorRings {
        pool: DmaBuffer,
        per_ring: usize,
    }

    impl DescriptorRings {
        /// Number of descriptors needed to carry `len` bytes.
        pub const fn nodes_needed(len: usize) -> usize {
            len.div_ceil(DMA_DESCRIPTOR_BUFFER_MAX_SIZE)
        }

        /// Allocates a pool for two rings of `per_ring` descriptors each.
        ///
        /// A zeroed descriptor is a valid, empty one owned by the CPU.
        pub fn new<P: Platform>(per_ring: usize) -> Result<Self> {
            if per_ring == 0 {
                return Err(Error::InvalidArg);
            }

            let len = per_ring
                .checked_mul(2)
                .and_then(|n| n.checked_add(1))
                .and_then(|n| n.checked_mul(mem::size_of::<DmaDescriptor>()))
                .ok_or(Error::InvalidArg)?;

            let pool = DmaBuffer::new::<P>(len, mem::align_of::<DmaDescriptor>(), Placement::Internal)?;

            Ok(Self { pool, per_ring })
        }

        pub fn node(&self, index: usize) -> *mut DmaDescriptor {
            assert!(index <= self.per_ring * 2);

            unsafe { self.pool.as_mut_ptr().cast::<DmaDescriptor>().add(index) }
        }

        pub fn head(&self, ring: usize) -> *mut DmaDescriptor {
            self.node(ring * self.per_ring)
        }

        /// The last descriptor of `ring`, the one that reports EOF.
        pub fn tail(&self, ring: usize) -> *mut DmaDescriptor {
            self.node(ring * self.per_ring + self.per_ring - 1)
        }

        pub fn restart_node(&self) -> *mut DmaDescriptor {
            self.node(self.per_ring * 2)
        }

        /// Chains the descriptors of both rings.
        ///
        /// Every descriptor is handed back to the CPU; [`Self::mount`] gives
        /// them to the DMA again.
        pub fn link(&self, topology: Topology) {
            let total = self.per_ring * 2;

            for i in 0..total {
                let node = unsafe { &mut *self.node(i) };
                node.set_owner(DescriptorOwner::Cpu);
                node.next = if i + 1 < total {
                    self.node(i + 1)
                } else {
                    ptr::null_mut()
                };
            }

            let (next0, next1) = match topology {
                Topology::Bounce => (self.head(1), self.head(0)),
                Topology::Circular => (self.head(0), self.head(1)),
                Topology::OneShot => (ptr::null_mut(), ptr::null_mut()),
            };

            unsafe {
                (*self.tail(0)).next = next0;
                (*self.tail(1)).next = next1;
            }
        }

        /// Splits `len` bytes at `buffer` over the descriptors of `ring`.
        ///
        /// # Safety
        ///
        /// `buffer` must stay valid for `len` bytes for as long as the DMA may
        /// walk this ring.
        pub unsafe fn mount(&self, ring: usize, buffer: *mut u8, len: usize) -> Result<()> {
            let chunks = Self::nodes_needed(len);
            if chunks == 0 || chunks > self.per_ring {
                return Err(Error::InvalidSize);
            }

            let mut offset = 0;
            for chunk in 0..chunks {
                let node = &mut *self.node(ring * self.per_ring + chunk);
                let size = core::cmp::min(len - offset, DMA_DESCRIPTOR_BUFFER_MAX_SIZE);

                node.set_size(size);
                node.set_length(size);
                node.set_suc_eof(chunk + 1 == chunks);
                node.set_owner(DescriptorOwner::Dma);
                node.buffer = buffer.add(offset);

                offset += size;
            }

            Ok(())
        }

        /// Points the tails of both rings at the head of `target`, so the DMA
        /// moves on to `target` once the current frame is sent.
        #[cfg_attr(target_os = "espidf", link_section = ".iram1.dma_relink_tails")]
        pub fn relink_tails(&self, target: usize) {
            let head = self.head(target);

            for ring in 0..2 {
                unsafe {
                    ptr::write_volatile(ptr::addr_of_mut!((*self.tail(ring)).next), head);
                }
            }
        }

        /// Refreshes the restart descriptor from the head of `ring` and returns it.
        ///
        /// The restart descriptor skips the pixels that already made it into
        /// the FIFOs before the DMA was reset. Returns `None` when the head is
        /// too short to skip them.
        #[cfg_attr(target_os = "espidf", link_section = ".iram1.dma_prepare_restart")]
        pub fn prepare_restart(&self, ring: usize) -> Option<*const DmaDescriptor> {
            let head = unsafe { *self.head(ring) };
            if head.length() <= RESTART_SKIP_BYTES || head.buffer.is_null() {
                return None;
            }

            let mut restart = head;
            restart.buffer = unsafe { head.buffer.add(RESTART_SKIP_BYTES) };
            restart.set_length(head.length() - RESTART_SKIP_BYTES);
            restart.set_size(head.size() - RESTART_SKIP_BYTES);

            let node = self.restart_node();
            unsafe { ptr::write_volatile(node, restart) };

            Some(node)
        }

        /// Which ring a reported EOF descriptor belongs to.
        ///
        /// A single-descriptor ring 0 restarted through the restart descriptor
        /// reports the restart descriptor itself.
        pub fn ring_of_eof(&self, desc: *const DmaDescriptor) -> usize {
            if ptr::eq(desc, self.tail(0)) || ptr::eq(desc, self.restart_node()) {
                0
            } else {
                1
            }
        }
    }
}
