//! Latency simulation and the allocation-bitmap primitive shared by the
//! inode table, the data-block store, and the open-file table.
//!
//! The source (`tecnicofs/fs/state.c`) calls `insert_delay()` — a busy-wait
//! loop guarded by a volatile counter — every `state_lock_delay` iterations
//! of a bitmap scan, to simulate the access latency of a real storage
//! device. TFS keeps this as observable behavior (spec.md section 5): a
//! bounded busy-wait with a compiler fence preventing its elimination.
use std::sync::atomic::{compiler_fence, Ordering};
use std::sync::Mutex;

use crate::error::{Result, TfsError};
use crate::param::DELAY;

/// Executes a bounded busy-wait standing in for one storage access.
///
/// The loop body is opaque to the optimizer: a compiler fence prevents the
/// whole loop from being proven side-effect-free and removed.
pub fn simulate_latency() {
    let mut counter: u32 = 0;
    for _ in 0..DELAY {
        counter = counter.wrapping_add(1);
        compiler_fence(Ordering::SeqCst);
    }
    // Keep the final value live so the loop can't be hoisted away entirely.
    let _ = std::hint::black_box(counter);
}

/// One slot of an allocation bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Taken,
}

/// A fixed-size FREE/TAKEN bitmap with first-fit allocation.
///
/// `alloc`/`free` hold `slots`'s mutex for the entire scan-and-mark,
/// matching spec.md section 4.1's linearizability requirement.
pub struct Bitmap<const N: usize> {
    name: &'static str,
    slots: Mutex<[SlotState; N]>,
}

impl<const N: usize> Bitmap<N> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new([SlotState::Free; N]),
        }
    }

    /// Returns the lowest-indexed free slot, marking it taken. `None` if the
    /// bitmap is full.
    pub fn alloc(&self) -> Result<Option<usize>> {
        let mut slots = self.slots.lock()?;
        let latency_stride = (crate::param::BLOCK_SIZE / std::mem::size_of::<SlotState>()).max(1);
        for (i, slot) in slots.iter_mut().enumerate() {
            if i % latency_stride == 0 {
                simulate_latency();
            }
            if *slot == SlotState::Free {
                *slot = SlotState::Taken;
                return Ok(Some(i));
            }
        }
        log::warn!("[ tfs_alloc ] {} exhausted", self.name);
        Ok(None)
    }

    /// Marks `index` free. Fails if out of range or already free.
    pub fn free(&self, index: usize) -> Result<()> {
        let mut slots = self.slots.lock()?;
        let slot = slots
            .get_mut(index)
            .ok_or(TfsError::InvalidArgument("bitmap index out of range"))?;
        if *slot == SlotState::Free {
            return Err(TfsError::SlotState("double free of bitmap slot"));
        }
        *slot = SlotState::Free;
        Ok(())
    }

    pub fn is_taken(&self, index: usize) -> Result<bool> {
        let slots = self.slots.lock()?;
        slots
            .get(index)
            .map(|s| *s == SlotState::Taken)
            .ok_or(TfsError::InvalidArgument("bitmap index out of range"))
    }

    /// Number of slots currently marked TAKEN; used by `Filesystem::info`.
    pub fn count_taken(&self) -> Result<usize> {
        let slots = self.slots.lock()?;
        Ok(slots.iter().filter(|s| **s == SlotState::Taken).count())
    }
}
