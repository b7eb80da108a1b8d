// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed-size placement arena with a first-fit free list.

use lumen_core::renderer::HeapId;
use std::ops::Range;

fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// Usage counters of a [`HeapAllocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStatistics {
    /// Total arena size.
    pub capacity: u64,
    /// Bytes currently carved out.
    pub carved_bytes: u64,
    /// Highest end offset ever carved.
    pub high_water_mark: u64,
    /// Placements that reused bytes below the high-water mark.
    pub aliased_placements: u64,
}

/// Bookkeeping for one device heap.
///
/// Ranges are carved first-fit from a sorted, coalesced free list. A released
/// range goes straight back on the list, so later placements alias the memory
/// of earlier, dead ones. Carved bytes never exceed the capacity.
#[derive(Debug)]
pub struct HeapAllocation {
    id: HeapId,
    capacity: u64,
    free: Vec<Range<u64>>,
    carved: u64,
    high_water: u64,
    aliased: u64,
}

impl HeapAllocation {
    /// Tracks a fresh, empty heap of `capacity` bytes.
    pub fn new(id: HeapId, capacity: u64) -> Self {
        Self {
            id,
            capacity,
            free: if capacity > 0 {
                vec![0..capacity]
            } else {
                Vec::new()
            },
            carved: 0,
            high_water: 0,
            aliased: 0,
        }
    }

    /// The device heap.
    pub fn id(&self) -> HeapId {
        self.id
    }

    /// Total arena size.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes not currently carved.
    pub fn free_bytes(&self) -> u64 {
        self.capacity - self.carved
    }

    /// Carves `size` bytes at an offset aligned to `align`.
    ///
    /// ## Returns
    /// The offset, or `None` if no free range is large enough.
    pub fn carve(&mut self, size: u64, align: u64) -> Option<u64> {
        if size == 0 {
            return None;
        }
        let (index, start) = self.free.iter().enumerate().find_map(|(i, range)| {
            let start = align_up(range.start, align);
            (start.checked_add(size)? <= range.end).then_some((i, start))
        })?;

        let range = self.free[index].clone();
        let mut remainder = Vec::with_capacity(2);
        if range.start < start {
            remainder.push(range.start..start);
        }
        if start + size < range.end {
            remainder.push(start + size..range.end);
        }
        self.free.splice(index..=index, remainder);

        self.carved += size;
        if start < self.high_water {
            self.aliased += 1;
        }
        self.high_water = self.high_water.max(start + size);
        Some(start)
    }

    /// Returns a carved range to the free list.
    pub fn release(&mut self, offset: u64, size: u64) {
        let position = self.free.partition_point(|r| r.start < offset);
        self.free.insert(position, offset..offset + size);
        self.carved = self.carved.saturating_sub(size);

        // Merge with neighbours so large placements keep fitting.
        let mut merged: Vec<Range<u64>> = Vec::with_capacity(self.free.len());
        for range in self.free.drain(..) {
            match merged.last_mut() {
                Some(last) if last.end >= range.start => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        self.free = merged;
    }

    /// A snapshot of the counters.
    pub fn statistics(&self) -> HeapStatistics {
        HeapStatistics {
            capacity: self.capacity,
            carved_bytes: self.carved,
            high_water_mark: self.high_water,
            aliased_placements: self.aliased,
        }
    }
}
