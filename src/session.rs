//! Session Worker: one thread per accepted connection, driving the Line
//! Assembler and Command Interpreter, then streaming the store back.
//!
//! Grounded on the `botster` CLI's `broker::reader_loop` (a named background
//! thread doing a blocking read loop and forwarding through a mutex-guarded
//! shared resource) and `broker::connection`'s `anyhow`/`log` error style,
//! adapted from a Unix-domain-socket frame forwarder to a newline-delimited
//! TCP command server.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ConnectionError;
use crate::history::HistoryStore;
use crate::interpreter::{self, Applied};
use crate::line_assembler::LineAssembler;

/// Tracks one live Session Worker for the Listener's registry.
#[derive(Debug)]
pub struct SessionHandle {
    pub addr: SocketAddr,
    pub complete: Arc<AtomicBool>,
    pub join: Option<std::thread::JoinHandle<()>>,
}

impl SessionHandle {
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

/// Spawns the worker thread for one accepted connection and returns its
/// registry handle. The Listener links the handle into its registry and
/// reaps it once `is_complete()` is true.
pub fn spawn(
    stream: TcpStream,
    addr: SocketAddr,
    store: Arc<Mutex<Box<dyn HistoryStore>>>,
) -> SessionHandle {
    let complete = Arc::new(AtomicBool::new(false));
    let complete_for_thread = Arc::clone(&complete);

    let join = std::thread::Builder::new()
        .name(format!("session-{addr}"))
        .spawn(move || {
            // Guarantees the registry sees this worker as complete even if
            // `run` panics, so the Listener doesn't wait forever to reap it.
            let _mark_complete = scopeguard::guard((), |_| {
                complete_for_thread.store(true, Ordering::Release);
            });
            log::info!("Accepted connection from {}", addr.ip());
            if let Err(err) = run(stream, &store) {
                log::warn!("connection from {addr} terminated: {err}");
            }
            log::info!("Closed connection from {}", addr.ip());
        })
        .expect("failed to spawn session worker thread");

    SessionHandle { addr, complete, join: Some(join) }
}

fn run(mut stream: TcpStream, store: &Arc<Mutex<Box<dyn HistoryStore>>>) -> Result<(), ConnectionError> {
    let mut assembler = LineAssembler::new();
    let mut f_pos: u64 = 0;
    let mut buf = [0u8; 1024];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Ok(()), // peer closed
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConnectionError::Recv(e)),
        };
        assembler.ingest(&buf[..n]);

        while let Some(command) = assembler.extract_one() {
            let applied = {
                let mut guard = store.lock().expect("history store mutex poisoned");
                match interpreter::interpret(guard.as_mut(), &command) {
                    Ok(applied) => applied,
                    Err(err) => {
                        log::warn!("malformed seek control command: {err}");
                        continue;
                    }
                }
            };
            f_pos = match applied {
                Applied::Data => 0,
                Applied::Seek(offset) => offset,
            };
            stream_readback(&mut stream, store, f_pos)?;
        }
    }
}

/// Streams the store's contents from `f_pos` through the end, retrying
/// partial `send`s until each chunk is fully drained.
fn stream_readback(
    stream: &mut TcpStream,
    store: &Arc<Mutex<Box<dyn HistoryStore>>>,
    f_pos: u64,
) -> Result<(), ConnectionError> {
    let guard = store.lock().expect("history store mutex poisoned");
    let total = guard.total_size();
    let mut sent = 0u64;
    let mut result = Ok(());
    guard.foreach(&mut |bytes| {
        if result.is_err() {
            return;
        }
        let entry_start = sent;
        sent += bytes.len() as u64;
        if sent <= f_pos {
            return;
        }
        let from = f_pos.saturating_sub(entry_start) as usize;
        if let Err(e) = write_all_retrying(stream, &bytes[from..]) {
            result = Err(ConnectionError::Send(e));
        }
    });
    debug_assert!(sent == total || total == 0);
    result
}

fn write_all_retrying(stream: &mut TcpStream, mut chunk: &[u8]) -> std::io::Result<()> {
    while !chunk.is_empty() {
        match stream.write(chunk) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => chunk = &chunk[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
