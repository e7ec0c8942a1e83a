//! Memory-mapped record array.
//!
//! A fixed number of `T` records backed by a file through a shared mapping.
//! Writes land in the page cache immediately and reach the disk on
//! [`MappedArray::flush`] (or whenever the kernel writes the pages back).
//! The array owns both the mapping and the file; dropping it unmaps.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::ops::{Index, IndexMut};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::slice;

use crate::error::BookError;
use crate::order::MatchResult;
use crate::price_level::PriceLevel;

/// Plain records that can live in a mapped file.
///
/// # Safety
/// Every bit pattern of `size_of::<T>()` bytes must be a valid `T`: the
/// backing file may hold anything, including bytes written by another process.
/// Types with enum fields, references or pointers must not implement this.
pub unsafe trait MappedRecord: Copy + 'static {}

// SAFETY: u32 fields and a Decimal made of four u32 words.
unsafe impl MappedRecord for PriceLevel {}
// SAFETY: u32, Decimal and a byte array; no field has invalid bit patterns.
unsafe impl MappedRecord for MatchResult {}
unsafe impl MappedRecord for u8 {}
unsafe impl MappedRecord for u32 {}
unsafe impl MappedRecord for u64 {}

/// File-backed array of exactly `len` records.
///
/// Move-only: the mapping is never duplicated.
pub struct MappedArray<T: MappedRecord> {
    ptr: NonNull<T>,
    len: usize,
    path: PathBuf,
    /// Held so the descriptor lives as long as the mapping
    _file: File,
}

// SAFETY: the array uniquely owns its mapping, like a Box<[T]>.
unsafe impl<T: MappedRecord + Send> Send for MappedArray<T> {}
unsafe impl<T: MappedRecord + Sync> Sync for MappedArray<T> {}

impl<T: MappedRecord> MappedArray<T> {
    /// Open (creating if needed) `path` and map `len` records of it.
    ///
    /// The file is truncated or zero-extended to exactly `len * size_of::<T>()`
    /// bytes, so existing records inside that range keep their contents.
    ///
    /// # Errors
    /// [`BookError::EmptyMapping`] for `len == 0`, otherwise
    /// `Open`/`Resize`/`Map` with the underlying OS error.
    pub fn open(path: impl AsRef<Path>, len: usize) -> Result<Self, BookError> {
        let path = path.as_ref().to_path_buf();
        let bytes = match len.checked_mul(mem::size_of::<T>()) {
            Some(0) | None => return Err(BookError::EmptyMapping { path }),
            Some(bytes) => bytes,
        };

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
        {
            Ok(file) => file,
            Err(source) => return Err(BookError::Open { path, source }),
        };

        if let Err(source) = file.set_len(bytes as u64) {
            return Err(BookError::Resize { path, source });
        }

        // SAFETY: `file` is open read/write and at least `bytes` long. A
        // shared mapping of it has no aliasing Rust references yet.
        let raw = unsafe {
            libc::mmap(
                ptr::null_mut(),
                bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            let source = io::Error::last_os_error();
            return Err(BookError::Map { path, source });
        }

        // mmap returns page-aligned memory, which satisfies any record alignment
        let ptr = match NonNull::new(raw.cast::<T>()) {
            Some(ptr) => ptr,
            None => {
                let source = io::Error::new(io::ErrorKind::Other, "mmap returned null");
                return Err(BookError::Map { path, source });
            }
        };

        Ok(Self {
            ptr,
            len,
            path,
            _file: file,
        })
    }

    /// Number of records
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: empty mappings are rejected by [`open`](Self::open)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` covers `len` initialized records (MappedRecord) for
        // the lifetime of `self`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` makes this the only live view.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Synchronously write dirty pages back to the file.
    pub fn flush(&self) -> Result<(), BookError> {
        let bytes = self.len * mem::size_of::<T>();
        // SAFETY: the range is exactly the live mapping.
        let rc = unsafe { libc::msync(self.ptr.as_ptr().cast(), bytes, libc::MS_SYNC) };
        if rc != 0 {
            return Err(BookError::Flush {
                path: self.path.clone(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl<T: MappedRecord> Index<usize> for MappedArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: MappedRecord> IndexMut<usize> for MappedArray<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<T: MappedRecord> Drop for MappedArray<T> {
    fn drop(&mut self) {
        let bytes = self.len * mem::size_of::<T>();
        // SAFETY: unmapping the region created in `open`; no borrows of it can
        // outlive `self`. The file closes when `_file` drops afterwards.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), bytes);
        }
    }
}

impl<T: MappedRecord> fmt::Debug for MappedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedArray")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish()
    }
}
