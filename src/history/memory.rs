use super::{Entry, HistoryStore, Located, DEFAULT_CAPACITY};

/// Fixed-capacity ring of owned command entries, kept entirely in memory.
///
/// Grounded on `aesd-circular-buffer.c`'s `aesd_circular_buffer` struct and
/// its `add_entry` / `find_entry_offset_for_fpos` functions: a plain array of
/// optional slots plus `in_offs` (head), `out_offs` (tail), and `full`.
#[derive(Debug)]
pub struct MemoryStore {
    slots: Vec<Option<Entry>>,
    head: usize,
    tail: usize,
    full: bool,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history store capacity must be positive");
        Self {
            slots: vec![None; capacity],
            head: 0,
            tail: 0,
            full: false,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn advance(&self, idx: usize) -> usize {
        if idx + 1 == self.capacity() {
            0
        } else {
            idx + 1
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryStore for MemoryStore {
    fn append(&mut self, bytes: Entry) {
        // Mirrors aesd_circular_buffer_add_entry: write unconditionally at
        // head, then decide whether tail follows head (already full) or
        // whether this write is the one that makes the ring full.
        self.slots[self.head] = Some(bytes);
        self.head = self.advance(self.head);
        if self.full {
            self.tail = self.head;
        } else if self.head == self.tail {
            self.full = true;
        } else {
            self.full = false;
        }
    }

    fn find_by_logical_offset(&self, p: u64) -> Option<Located> {
        // Mirrors aesd_circular_buffer_find_entry_offset_for_fpos: walk
        // forward from the tail in arrival order, summing sizes, until the
        // entry containing `p` is found or the walk wraps back to the tail.
        if self.total_size() == 0 {
            return None;
        }
        let mut idx = self.tail;
        let mut cur_offset: u64 = 0;
        loop {
            let entry = self.slots[idx].as_ref()?;
            let len = entry.len() as u64;
            if p < cur_offset + len {
                return Some(Located {
                    entry: entry.clone(),
                    intra_offset: (p - cur_offset) as usize,
                });
            }
            cur_offset += len;
            idx = self.advance(idx);
            if idx == self.tail {
                return None;
            }
        }
    }

    fn logical_offset_of(&self, cmd_index: usize, intra_offset: u64) -> Option<u64> {
        // Deliberately slot-indexed from slot 0, NOT arrival-order indexed
        // from the tail. See the module doc on HistoryStore::logical_offset_of.
        if cmd_index >= self.capacity() {
            return None;
        }
        let mut offset: u64 = 0;
        for slot in &self.slots[0..cmd_index] {
            offset += slot.as_ref()?.len() as u64;
        }
        let target = self.slots[cmd_index].as_ref()?;
        if intra_offset >= target.len() as u64 {
            return None;
        }
        Some(offset + intra_offset)
    }

    fn foreach(&self, f: &mut dyn FnMut(&[u8])) {
        if !self.full && self.head == self.tail {
            return;
        }
        let mut idx = self.tail;
        loop {
            if let Some(entry) = &self.slots[idx] {
                f(entry);
            }
            idx = self.advance(idx);
            if idx == self.head {
                break;
            }
        }
    }

    fn total_size(&self) -> u64 {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .map(|e| e.len() as u64)
            .sum()
    }

    fn destroy(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.full = false;
    }
}
