// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-context arenas and simultaneous region borrowing.
//!
//! An execution context owns one [`ArenaSet`]: a buffer per memory id, each
//! sized by the program's memory plan. A kernel call needs shared access to
//! its argument regions and exclusive access to its result regions at the
//! same time, possibly inside the same arena. [`ArenaSet::borrow_regions`]
//! hands those out safely by splitting each arena at the mutable regions'
//! boundaries; any overlap between a mutable region and another borrowed
//! region is an error rather than undefined behaviour.

use crate::{BufferGuard, MemoryError, MemoryPool};
use tracing::debug;

/// A byte range inside one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub memory_id: u32,
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub fn new(memory_id: u32, offset: usize, len: usize) -> Self {
        Self {
            memory_id,
            offset,
            len,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug)]
struct Arena {
    memory_id: u32,
    /// `None` for zero-capacity arenas, which the pool does not back.
    buffer: Option<BufferGuard>,
}

impl Arena {
    fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, BufferGuard::size_bytes)
    }

    fn bytes(&self) -> &[u8] {
        self.buffer.as_ref().map_or(&[][..], BufferGuard::as_slice)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self.buffer.as_mut() {
            Some(guard) => guard.as_mut_slice(),
            None => &mut [],
        }
    }
}

/// The arenas of one execution context, keyed by memory id.
///
/// Buffers are returned to the pool when the set is dropped.
#[derive(Debug)]
pub struct ArenaSet {
    arenas: Vec<Arena>,
}

impl ArenaSet {
    /// Allocates one zero-filled arena per `(memory_id, capacity)` pair.
    ///
    /// On failure every arena allocated so far is returned to the pool.
    pub fn allocate<I>(pool: &MemoryPool, specs: I) -> Result<Self, MemoryError>
    where
        I: IntoIterator<Item = (u32, usize)>,
    {
        let mut arenas: Vec<Arena> = Vec::new();
        for (memory_id, capacity) in specs {
            if arenas.iter().any(|a| a.memory_id == memory_id) {
                return Err(MemoryError::DuplicateArena { memory_id });
            }
            let buffer = match capacity {
                0 => None,
                n => Some(pool.allocate(n)?),
            };
            arenas.push(Arena { memory_id, buffer });
        }
        debug!(
            arenas = arenas.len(),
            total_bytes = arenas.iter().map(Arena::capacity).sum::<usize>(),
            "allocated arena set"
        );
        Ok(Self { arenas })
    }

    pub fn len(&self) -> usize {
        self.arenas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.is_empty()
    }

    pub fn capacity(&self, memory_id: u32) -> Option<usize> {
        self.find(memory_id).ok().map(Arena::capacity)
    }

    pub fn total_bytes(&self) -> usize {
        self.arenas.iter().map(Arena::capacity).sum()
    }

    /// Overwrites every arena with zeros.
    pub fn zero_all(&mut self) {
        for arena in &mut self.arenas {
            arena.bytes_mut().fill(0);
        }
    }

    /// Shared access to one region.
    pub fn region(&self, region: &Region) -> Result<&[u8], MemoryError> {
        let arena = self.find(region.memory_id)?;
        check_bounds(region.memory_id, arena.capacity(), region.offset, region.len)?;
        Ok(&arena.bytes()[region.offset..region.end()])
    }

    /// Exclusive access to one region.
    pub fn region_mut(&mut self, region: &Region) -> Result<&mut [u8], MemoryError> {
        let arena = self.find_mut(region.memory_id)?;
        check_bounds(region.memory_id, arena.capacity(), region.offset, region.len)?;
        Ok(&mut arena.bytes_mut()[region.offset..region.end()])
    }

    /// Borrows `reads` shared and `writes` exclusively, all at once.
    ///
    /// Results come back in request order. Shared regions may overlap each
    /// other; a mutable region may not overlap any other requested region.
    pub fn borrow_regions(
        &mut self,
        reads: &[Region],
        writes: &[Region],
    ) -> Result<(Vec<&[u8]>, Vec<&mut [u8]>), MemoryError> {
        for region in reads.iter().chain(writes) {
            self.find(region.memory_id)?;
        }

        let mut read_out: Vec<&[u8]> = vec![&[][..]; reads.len()];
        let mut write_out: Vec<&mut [u8]> = writes.iter().map(|_| Default::default()).collect();

        for arena in &mut self.arenas {
            let id = arena.memory_id;
            let read_idx: Vec<usize> = (0..reads.len()).filter(|&i| reads[i].memory_id == id).collect();
            let write_idx: Vec<usize> = (0..writes.len()).filter(|&i| writes[i].memory_id == id).collect();
            if read_idx.is_empty() && write_idx.is_empty() {
                continue;
            }
            let read_ranges: Vec<(usize, usize)> =
                read_idx.iter().map(|&i| (reads[i].offset, reads[i].len)).collect();
            let write_ranges: Vec<(usize, usize)> =
                write_idx.iter().map(|&i| (writes[i].offset, writes[i].len)).collect();

            let (shared, exclusive) = split_disjoint(id, arena.bytes_mut(), &read_ranges, &write_ranges)?;
            for (i, slice) in read_idx.into_iter().zip(shared) {
                read_out[i] = slice;
            }
            for (i, slice) in write_idx.into_iter().zip(exclusive) {
                write_out[i] = slice;
            }
        }
        Ok((read_out, write_out))
    }

    fn find(&self, memory_id: u32) -> Result<&Arena, MemoryError> {
        self.arenas
            .iter()
            .find(|a| a.memory_id == memory_id)
            .ok_or(MemoryError::UnknownArena { memory_id })
    }

    fn find_mut(&mut self, memory_id: u32) -> Result<&mut Arena, MemoryError> {
        self.arenas
            .iter_mut()
            .find(|a| a.memory_id == memory_id)
            .ok_or(MemoryError::UnknownArena { memory_id })
    }
}

fn check_bounds(memory_id: u32, capacity: usize, offset: usize, len: usize) -> Result<(), MemoryError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(MemoryError::RegionOutOfBounds {
            memory_id,
            offset,
            len,
            capacity,
        }),
    }
}

/// Splits `buf` into shared `reads` and exclusive `writes`, each given as
/// `(offset, len)`.
///
/// The buffer is cut at the boundaries of the non-empty writes; every read
/// must then fall entirely inside one of the remaining gaps. Empty regions
/// always succeed (within bounds) and borrow nothing.
pub fn split_disjoint<'a>(
    memory_id: u32,
    buf: &'a mut [u8],
    reads: &[(usize, usize)],
    writes: &[(usize, usize)],
) -> Result<(Vec<&'a [u8]>, Vec<&'a mut [u8]>), MemoryError> {
    let capacity = buf.len();
    for &(offset, len) in reads.iter().chain(writes) {
        check_bounds(memory_id, capacity, offset, len)?;
    }

    let mut order: Vec<usize> = (0..writes.len()).filter(|&i| writes[i].1 > 0).collect();
    order.sort_by_key(|&i| writes[i].0);

    let mut gaps: Vec<(usize, &'a [u8])> = Vec::with_capacity(order.len() + 1);
    let mut exclusive: Vec<&'a mut [u8]> = writes.iter().map(|_| Default::default()).collect();
    let mut rest: &'a mut [u8] = buf;
    let mut base = 0usize;
    let mut previous: Option<usize> = None;

    for &i in &order {
        let (offset, len) = writes[i];
        if offset < base {
            return Err(MemoryError::OverlappingRegions {
                memory_id,
                offset,
                other: previous.unwrap_or(0),
            });
        }
        let (gap, tail) = std::mem::take(&mut rest).split_at_mut(offset - base);
        let (slot, tail) = tail.split_at_mut(len);
        gaps.push((base, &*gap));
        exclusive[i] = slot;
        rest = tail;
        base = offset + len;
        previous = Some(offset);
    }
    gaps.push((base, &*rest));

    let mut shared = Vec::with_capacity(reads.len());
    for &(offset, len) in reads {
        if len == 0 {
            shared.push(&[][..]);
            continue;
        }
        let containing = gaps
            .iter()
            .find(|(start, gap)| *start <= offset && offset + len <= start + gap.len());
        match containing {
            Some(&(start, gap)) => shared.push(&gap[offset - start..offset - start + len]),
            None => {
                let other = order
                    .iter()
                    .map(|&i| writes[i])
                    .find(|&(w, wlen)| offset < w + wlen && w < offset + len)
                    .map_or(0, |(w, _)| w);
                return Err(MemoryError::OverlappingRegions {
                    memory_id,
                    offset,
                    other,
                });
            }
        }
    }

    Ok((shared, exclusive))
}
