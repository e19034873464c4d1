//! Per-connection growable byte accumulator that extracts complete
//! newline-terminated commands from an arbitrarily chunked byte stream.

/// Fixed growth increment for `rx`, matching the original assignment's
/// `READ_SIZE` (`original_source/server/aesdsocket.c`).
const GROWTH_CHUNK: usize = 1024;

/// Growable receive buffer for one connection.
///
/// Grounded on `aesdsocket.c`'s realloc-by-`READ_SIZE`-then-`memmove`
/// pattern, reworked as an idiomatic `Vec<u8>` with `drain()` doing the
/// equivalent shift. The externally observable behavior — commands
/// extracted in order, residue preserved across ingests — is identical.
#[derive(Debug, Default)]
pub struct LineAssembler {
    rx: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self { rx: Vec::with_capacity(GROWTH_CHUNK) }
    }

    /// Appends `buf` to the pending bytes, growing `rx`'s backing storage by
    /// fixed chunks if needed.
    pub fn ingest(&mut self, buf: &[u8]) {
        if self.rx.capacity() < self.rx.len() + buf.len() {
            let needed = self.rx.len() + buf.len() - self.rx.capacity();
            let grow_by = needed.div_ceil(GROWTH_CHUNK) * GROWTH_CHUNK;
            self.rx.reserve(grow_by);
        }
        self.rx.extend_from_slice(buf);
    }

    /// Returns the next complete `\n`-terminated command, if one is present,
    /// and removes it (plus the newline) from the front of `rx`. Returns
    /// `None` if no newline has arrived yet; any bytes already ingested
    /// remain buffered for the next `ingest`.
    pub fn extract_one(&mut self) -> Option<Vec<u8>> {
        let pos = self.rx.iter().position(|&b| b == b'\n')?;
        let command: Vec<u8> = self.rx.drain(..=pos).collect();
        Some(command)
    }
}
