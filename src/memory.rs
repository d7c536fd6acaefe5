//! Pass-through allocation for buffers handed across the RCP client boundary.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::slice;

/// Alignment of every allocation, matching `max_align_t` on 64-bit targets.
pub const ALIGNMENT: usize = 16;

/// Owned, zero-filled heap allocation. Freed exactly once, by [`release`] or on drop.
pub struct RcpBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer uniquely owns its allocation and has no interior mutability.
unsafe impl Send for RcpBuffer {}
unsafe impl Sync for RcpBuffer {}

impl RcpBuffer {
    fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` initialized bytes (or dangling with len 0).
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn layout(len: usize) -> Option<Layout> {
        Layout::from_size_align(len, ALIGNMENT).ok()
    }
}

impl Drop for RcpBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Some(layout) = Self::layout(self.len) {
            // SAFETY: allocated in `allocate` with this exact layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for RcpBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RcpBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Allocate `bytes` bytes.
///
/// Returns `None` when the allocator fails or the size cannot be laid out.
/// A zero-byte request never touches the allocator.
pub fn allocate(bytes: usize) -> Option<RcpBuffer> {
    if bytes == 0 {
        return Some(RcpBuffer::empty());
    }

    let layout = RcpBuffer::layout(bytes)?;
    // SAFETY: layout has non-zero size.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    NonNull::new(ptr).map(|ptr| RcpBuffer { ptr, len: bytes })
}

/// Free a buffer obtained from [`allocate`].
pub fn release(buffer: RcpBuffer) {
    drop(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zeroed_and_writable() {
        let mut buffer = allocate(4096).expect("allocation failed");
        assert_eq!(buffer.len(), 4096);
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
        assert_eq!(buffer.as_ptr() as usize % ALIGNMENT, 0);

        buffer.as_mut_slice()[..4].copy_from_slice(b"R3D\0");
        assert_eq!(&buffer.as_slice()[..4], b"R3D\0");
        release(buffer);
    }

    #[test]
    fn test_zero_bytes() {
        let buffer = allocate(0).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn test_impossible_size_returns_none() {
        assert!(allocate(usize::MAX).is_none());
    }

    #[test]
    fn test_allocator_failure_returns_none() {
        // Valid layout, but no allocator can satisfy it
        let bytes = isize::MAX as usize - 31;
        assert!(Layout::from_size_align(bytes, ALIGNMENT).is_ok());
        assert!(allocate(bytes).is_none());
    }
}
