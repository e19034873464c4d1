//! The bounded history store: a fixed-capacity ring of owned command entries,
//! plus the logical offset space used by readback and seek control.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

/// Default ring capacity (`N` in the spec).
pub const DEFAULT_CAPACITY: usize = 10;

/// One retained command, including its terminating `\n`.
///
/// `Arc<[u8]>` rather than `Vec<u8>` so `find_by_logical_offset` can hand back
/// a cheap clone instead of forcing callers to hold the store lock while they
/// stream it out byte by byte.
pub type Entry = Arc<[u8]>;

/// A reference to a retained entry plus the intra-entry byte offset a lookup
/// resolved to.
#[derive(Debug, Clone)]
pub struct Located {
    pub entry: Entry,
    pub intra_offset: usize,
}

/// The bounded-history contract shared by the in-memory ring and the
/// file-backed variant.
///
/// Every mutating or reading method here must be called with the
/// process-wide mutex already held (see the Session Worker and Listener) —
/// the store itself performs no internal locking.
pub trait HistoryStore: std::fmt::Debug + Send {
    /// Takes ownership of `bytes`, evicting the oldest entry if the store is
    /// already full. Never fails: allocation of `bytes` itself already
    /// happened in the caller.
    fn append(&mut self, bytes: Entry);

    /// Walks entries starting at the tail (arrival order) looking for the
    /// entry that contains logical offset `p`. `None` if `p` is at or past
    /// the total retained size, or the store is empty.
    fn find_by_logical_offset(&self, p: u64) -> Option<Located>;

    /// Resolves `(cmd_index, intra_offset)` to a logical offset by summing
    /// entry sizes in **slot order starting at slot 0** — not arrival order.
    /// Once the ring has wrapped, slot 0 is no longer the oldest entry; this
    /// asymmetry with `find_by_logical_offset` is deliberate and must be
    /// preserved (see the seek control command).
    fn logical_offset_of(&self, cmd_index: usize, intra_offset: u64) -> Option<u64>;

    /// Invokes `f` with each retained entry's bytes, in arrival order.
    fn foreach(&self, f: &mut dyn FnMut(&[u8]));

    /// Total size, in bytes, of the arrival-order concatenation of all
    /// currently retained entries.
    fn total_size(&self) -> u64;

    /// Releases any backing resources (e.g. the backing file). Called once,
    /// during Listener shutdown.
    fn destroy(&mut self);
}

#[cfg(test)]
pub(crate) fn entry(bytes: &[u8]) -> Entry {
    Arc::from(bytes)
}
