//! End-to-end scenarios driving the server over a real `TcpStream`, per the
//! six scenarios this system's design calls out, plus the `FileStore`
//! parity suite added for the file-backed deployment variant.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ringlogd::config::{Config, StoreKind};
use ringlogd::history::DEFAULT_CAPACITY;
use ringlogd::Listener;

struct Server {
    port: u16,
    shutdown: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl Server {
    fn start(port: u16, store_kind: StoreKind, backing_file: std::path::PathBuf) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let config = Config {
            bind_addr: "127.0.0.1".to_string(),
            port,
            history_capacity: DEFAULT_CAPACITY,
            daemon: false,
            store_kind,
            backing_file,
        };
        let listener = Listener::new(Arc::clone(&shutdown));
        let join = std::thread::spawn(move || {
            listener.run(config).expect("listener run failed");
        });
        // Give the accept loop time to bind before the first connect.
        std::thread::sleep(Duration::from_millis(200));
        Self { port, shutdown, join: Some(join) }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).expect("connect failed");
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        stream
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Reads exactly `len` bytes (or until the read timeout fires), accumulating
/// across multiple underlying reads.
fn read_exact_len(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut buf = [0u8; 4096];
    while out.len() < len && Instant::now() < deadline {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(_) => break,
        }
    }
    out
}

fn next_port() -> u16 {
    use std::sync::atomic::AtomicU16;
    static NEXT: AtomicU16 = AtomicU16::new(19100);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[test]
fn single_line_echo() {
    let server = Server::start(next_port(), StoreKind::Memory, std::path::PathBuf::new());
    let mut stream = server.connect();
    stream.write_all(b"hello\n").unwrap();
    let resp = read_exact_len(&mut stream, 6);
    assert_eq!(resp, b"hello\n");
}

#[test]
fn multi_line_accumulation() {
    let server = Server::start(next_port(), StoreKind::Memory, std::path::PathBuf::new());
    let mut stream = server.connect();
    stream.write_all(b"a\nb\nc\n").unwrap();
    // a\n + a\nb\n + a\nb\nc\n = 2 + 4 + 6 bytes concatenated on the wire.
    let resp = read_exact_len(&mut stream, 2 + 4 + 6);
    assert_eq!(resp, b"a\na\nb\na\nb\nc\n");
}

#[test]
fn cross_connection_visibility() {
    let server = Server::start(next_port(), StoreKind::Memory, std::path::PathBuf::new());
    {
        let mut stream = server.connect();
        stream.write_all(b"x\n").unwrap();
        let resp = read_exact_len(&mut stream, 2);
        assert_eq!(resp, b"x\n");
    }
    let mut stream = server.connect();
    stream.write_all(b"y\n").unwrap();
    let resp = read_exact_len(&mut stream, 4);
    assert_eq!(resp, b"x\ny\n");
}

#[test]
fn eviction_after_eleven_commands() {
    let server = Server::start(next_port(), StoreKind::Memory, std::path::PathBuf::new());
    let mut stream = server.connect();
    for i in 0..11u32 {
        let cmd = format!("{i}\n");
        stream.write_all(cmd.as_bytes()).unwrap();
        // Drain each intermediate response before sending the next command
        // so commands don't interleave on the wire.
        let expected_entries: Vec<String> = (0..=i).map(|n| format!("{n}\n")).collect();
        let expected_entries = if expected_entries.len() > DEFAULT_CAPACITY {
            expected_entries[expected_entries.len() - DEFAULT_CAPACITY..].to_vec()
        } else {
            expected_entries
        };
        let expected: String = expected_entries.concat();
        let resp = read_exact_len(&mut stream, expected.len());
        assert_eq!(String::from_utf8(resp).unwrap(), expected, "after command {i}");
    }
}

#[test]
fn partial_send_resilience() {
    let server = Server::start(next_port(), StoreKind::Memory, std::path::PathBuf::new());
    let mut stream = server.connect();
    stream.write_all(b"hel").unwrap();
    std::thread::sleep(Duration::from_millis(200));
    stream.write_all(b"lo\n").unwrap();
    let resp = read_exact_len(&mut stream, 6);
    assert_eq!(resp, b"hello\n");
}

#[test]
fn seek_control_repositions_the_read_cursor() {
    let server = Server::start(next_port(), StoreKind::Memory, std::path::PathBuf::new());
    let mut stream = server.connect();
    stream.write_all(b"abc\n").unwrap();
    let _ = read_exact_len(&mut stream, 4);
    stream.write_all(b"defgh\n").unwrap();
    let _ = read_exact_len(&mut stream, 4 + 6);

    stream.write_all(b"AESDCHAR_IOCSEEKTO:1,2\n").unwrap();
    let resp = read_exact_len(&mut stream, 4);
    assert_eq!(resp, b"fgh\n");
}

#[test]
fn file_backed_store_persists_and_replays_commands() {
    let dir = tempfile::tempdir().unwrap();
    let backing = dir.path().join("ringlogd-test-data");
    let server = Server::start(next_port(), StoreKind::File, backing.clone());
    let mut stream = server.connect();
    stream.write_all(b"hello\n").unwrap();
    let resp = read_exact_len(&mut stream, 6);
    assert_eq!(resp, b"hello\n");
    drop(stream);
    drop(server);
    // Graceful shutdown removes the backing file.
    assert!(!backing.exists());
}
