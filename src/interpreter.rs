//! Classifies a complete command as *data* or *seek-control* and applies it.

use crate::error::SeekError;
use crate::history::HistoryStore;

/// The 19-byte literal prefix that marks a seek control command.
pub const SEEK_PREFIX: &[u8] = b"AESDCHAR_IOCSEEKTO:";

/// Outcome of interpreting one complete command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A data command was appended; the reader cursor resets to 0.
    Data,
    /// A seek control succeeded; the reader cursor is now at this offset.
    Seek(u64),
}

/// Parses `write_cmd,write_cmd_offset` out of a seek control command's body
/// (the bytes after the 19-byte prefix, including the trailing `\n`).
fn parse_seek_args(body: &[u8]) -> Result<(u64, u64), SeekError> {
    let body = body.strip_suffix(b"\n").unwrap_or(body);
    let text = String::from_utf8_lossy(body);
    let (cmd_str, offset_str) = text.split_once(',').ok_or(SeekError::MissingComma)?;
    let write_cmd: u64 = cmd_str.trim().parse().map_err(SeekError::InvalidWriteCmd)?;
    let write_cmd_offset: u64 = offset_str
        .trim()
        .parse()
        .map_err(SeekError::InvalidWriteCmdOffset)?;
    Ok((write_cmd, write_cmd_offset))
}

/// Interprets one complete, `\n`-terminated command against `store`.
///
/// For a data command, appends it verbatim and returns `Applied::Data`. For
/// a seek control, parses and resolves the target offset and returns
/// `Applied::Seek(offset)`. Parse or resolution failures are returned as
/// `SeekError` — the caller logs and drops the command; the connection
/// stays open (spec.md §9 Open Questions).
pub fn interpret(
    store: &mut dyn HistoryStore,
    command: &[u8],
) -> Result<Applied, SeekError> {
    if let Some(body) = command.strip_prefix(SEEK_PREFIX) {
        let (write_cmd, write_cmd_offset) = parse_seek_args(body)?;
        let offset = store
            .logical_offset_of(write_cmd as usize, write_cmd_offset)
            .ok_or(SeekError::OutOfRange { write_cmd })?;
        Ok(Applied::Seek(offset))
    } else {
        store.append(std::sync::Arc::from(command));
        Ok(Applied::Data)
    }
}
