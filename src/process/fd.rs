// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Per-thread open-file table
//!
//! The scheduler core owns the table but never looks inside a file: slots
//! hold opaque handles issued by the file subsystem.
//!
//! # Design
//!
//! - Descriptors are small integers in `0..FDT_MAX`
//! - fd 0: console input, fd 1: console output (never allocated)
//! - fd 2+: files, allocated by scanning upward from the high-water index

use crate::config::FDT_MAX;

/// First descriptor handed out by [`FileTable::alloc`]
pub const FD_FIRST: i32 = 2;

/// Opaque handle to an open file, owned by the file subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u64);

/// Fixed-capacity table of open files
#[derive(Debug, Clone)]
pub struct FileTable {
    /// Open files, indexed by descriptor
    slots: [Option<FileHandle>; FDT_MAX],

    /// Where the next allocation scan starts
    next_index: usize,
}

impl FileTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: [None; FDT_MAX],
            next_index: FD_FIRST as usize,
        }
    }

    /// Install a handle in the first free slot
    ///
    /// The scan starts at the high-water index and wraps once to
    /// [`FD_FIRST`]. Returns the descriptor, or None if the table is full.
    pub fn alloc(&mut self, handle: FileHandle) -> Option<i32> {
        let first = FD_FIRST as usize;
        let index = (self.next_index..FDT_MAX)
            .chain(first..self.next_index)
            .find(|&index| self.slots[index].is_none())?;

        self.slots[index] = Some(handle);
        self.next_index = index;
        Some(index as i32)
    }

    /// Look up a descriptor
    pub fn get(&self, fd: i32) -> Option<FileHandle> {
        let index = Self::index(fd)?;
        self.slots[index]
    }

    /// Close a descriptor
    ///
    /// Returns the handle that was installed, or None if the slot was empty.
    /// The console descriptors cannot be closed.
    pub fn close(&mut self, fd: i32) -> Option<FileHandle> {
        let index = Self::index(fd)?;
        self.slots[index].take()
    }

    /// Close every descriptor, returning how many were open
    pub fn clear(&mut self) -> usize {
        let open = self.count();
        self.slots = [None; FDT_MAX];
        self.next_index = FD_FIRST as usize;
        open
    }

    /// Number of open descriptors
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn index(fd: i32) -> Option<usize> {
        if fd < FD_FIRST || fd as usize >= FDT_MAX {
            None
        } else {
            Some(fd as usize)
        }
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
