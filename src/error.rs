//! Structured, per-component error enums (`thiserror`), matching the
//! `botster` CLI's convention of narrow error types per module and
//! `anyhow::Context` only at the binary/orchestration boundary.

use thiserror::Error;

/// A malformed seek control command. Per-connection: logged and dropped,
/// the connection stays open (spec.md §9 Open Questions).
#[derive(Debug, Error)]
pub enum SeekError {
    #[error("seek control command is missing the comma separator")]
    MissingComma,

    #[error("seek control command has a malformed write_cmd: {0}")]
    InvalidWriteCmd(std::num::ParseIntError),

    #[error("seek control command has a malformed write_cmd_offset: {0}")]
    InvalidWriteCmdOffset(std::num::ParseIntError),

    #[error("write_cmd {write_cmd} does not name a retained or in-range command")]
    OutOfRange { write_cmd: u64 },
}

/// Errors terminating one Session Worker's connection. The server continues;
/// other connections are unaffected (spec.md §7 "Transient per-connection").
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("recv failed: {0}")]
    Recv(#[source] std::io::Error),

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("peer closed the connection")]
    PeerClosed,
}

/// Fatal setup errors. Action: log, run full cleanup, exit non-zero
/// (spec.md §7 "Fatal setup").
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up the backing store: {0}")]
    Store(#[source] std::io::Error),

    #[error("failed to daemonize: {0}")]
    Daemonize(#[source] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
