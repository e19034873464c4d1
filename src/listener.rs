//! Listener & Supervisor: binds the listening socket, accepts connections,
//! spawns Session Workers, reaps completed ones, and orchestrates shutdown.
//!
//! Grounded on the `botster` CLI's `broker::Broker` (a registry of live
//! sessions plus `register`/`unregister`/`kill_all`) and on
//! `original_source/server/aesdsocket.c`'s accept loop, which treats an
//! `accept` failure caused by the signal handler closing the listening
//! socket as a normal shutdown signal rather than a fault. `std::net`
//! doesn't expose POSIX `shutdown(2)` on a bound-but-not-connected listening
//! socket the way the C original does it, so the same "accept failure means
//! shutdown" contract is reproduced here with a non-blocking accept loop
//! that polls the shutdown flag between attempts.

use std::io::ErrorKind;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, TcpListener};
use std::os::fd::FromRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{Config, StoreKind};
use crate::error::ListenerError;
use crate::history::{FileStore, HistoryStore, MemoryStore};
use crate::session::{self, SessionHandle};
use crate::timestamp;

const ACCEPT_BACKLOG: i32 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const WILDCARD_V4: &str = "0.0.0.0";

pub struct Listener {
    shutdown: Arc<AtomicBool>,
}

impl Listener {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self { shutdown }
    }

    /// Runs the full Listener lifecycle: bind, daemonize (if requested),
    /// accept loop, shutdown cleanup. Returns once the shutdown flag is
    /// observed and every worker has been reaped.
    pub fn run(&self, config: Config) -> Result<(), ListenerError> {
        let listener = bind_listener(&config.bind_addr, config.port)?;
        listener
            .set_nonblocking(true)
            .map_err(|e| ListenerError::Bind { addr: config.bind_address(), source: e })?;

        // Fork only after bind/listen have succeeded, matching spec.md
        // §4.E's startup order and original_source/server/aesdsocket.c,
        // which forks after the listening socket is already up so a bind
        // failure is still visible through this process's own exit code.
        if config.daemon {
            daemonize().map_err(ListenerError::Daemonize)?;
        }

        let store: Box<dyn HistoryStore> = match config.store_kind {
            StoreKind::Memory => Box::new(MemoryStore::new(config.history_capacity)),
            StoreKind::File => Box::new(
                FileStore::new(&config.backing_file, config.history_capacity)
                    .map_err(ListenerError::Store)?,
            ),
        };
        let store = Arc::new(Mutex::new(store));

        let timer = match config.store_kind {
            StoreKind::File => Some(timestamp::spawn(Arc::clone(&store), Arc::clone(&self.shutdown))),
            StoreKind::Memory => None,
        };

        let mut registry: Vec<SessionHandle> = Vec::new();

        while !self.shutdown.load(Ordering::Acquire) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        log::warn!("failed to set TCP_NODELAY for {addr}: {e}");
                    }
                    registry.push(session::spawn(stream, addr, Arc::clone(&store)));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    log::error!("accept failed: {e}");
                    break;
                }
            }
            reap(&mut registry);
        }

        log::info!("Caught signal, exiting");
        self.shutdown.store(true, Ordering::Release);
        for handle in &mut registry {
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
        if let Some(timer) = timer {
            let _ = timer.join();
        }

        store.lock().expect("history store mutex poisoned").destroy();
        Ok(())
    }
}

/// Forks the process; the parent exits with success immediately, the child
/// continues as the running service.
fn daemonize() -> std::io::Result<()> {
    // SAFETY: a single `fork()` call; the parent branch exits immediately
    // without touching any resource the child owns.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(std::io::Error::last_os_error());
    }
    if pid > 0 {
        std::process::exit(0);
    }
    Ok(())
}

fn reap(registry: &mut Vec<SessionHandle>) {
    let mut i = 0;
    while i < registry.len() {
        if registry[i].is_complete() {
            let mut handle = registry.swap_remove(i);
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        } else {
            i += 1;
        }
    }
}

/// Resolves `host:port` to the candidate addresses to attempt, in the
/// order to try them. Mirrors `getaddrinfo(NULL, port, {ai_family =
/// AF_UNSPEC, ai_flags = AI_PASSIVE})`'s behavior in
/// `original_source/server/aesdsocket.c`: for the wildcard host, that call
/// yields both an IPv6 "::" and an IPv4 "0.0.0.0" candidate, and on a
/// typical dual-stack Linux host the IPv6 wildcard is tried first. For any
/// other, explicit host, resolve it normally but still prefer an IPv6
/// result over an IPv4 one if the name resolves to both.
fn resolve_candidates(host: &str, port: u16) -> Result<Vec<SocketAddr>, ListenerError> {
    if host == WILDCARD_V4 {
        return Ok(vec![
            SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0)),
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)),
        ]);
    }

    use std::net::ToSocketAddrs;
    let mut candidates: Vec<SocketAddr> = format!("{host}:{port}")
        .to_socket_addrs()
        .map_err(|e| ListenerError::Bind { addr: format!("{host}:{port}"), source: e })?
        .collect();
    if candidates.is_empty() {
        return Err(ListenerError::Bind {
            addr: format!("{host}:{port}"),
            source: std::io::Error::from(ErrorKind::AddrNotAvailable),
        });
    }
    candidates.sort_by_key(|a| !a.is_ipv6()); // IPv6 candidates first
    Ok(candidates)
}

/// Builds the listening socket with `SO_REUSEADDR` set before `bind`, since
/// `std::net::TcpListener::bind` doesn't expose that option directly.
/// Tries each resolved candidate address in turn (IPv6 preferred, per
/// `resolve_candidates`), returning the first one that binds successfully.
fn bind_listener(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let candidates = resolve_candidates(host, port)?;

    let mut last_err = None;
    for candidate in candidates {
        match try_bind_one(candidate) {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = Some(e),
        }
    }
    Err(ListenerError::Bind {
        addr: format!("{host}:{port}"),
        source: last_err.unwrap_or_else(|| std::io::Error::from(ErrorKind::AddrNotAvailable)),
    })
}

/// Creates, configures, binds, and listens on one candidate address.
fn try_bind_one(addr: SocketAddr) -> std::io::Result<TcpListener> {
    // SAFETY: standard BSD socket syscall sequence (socket, setsockopt,
    // bind, listen); every return value is checked before proceeding.
    unsafe {
        let family = if addr.is_ipv6() { libc::AF_INET6 } else { libc::AF_INET };
        let fd = libc::socket(family, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let reuse: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &reuse as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        let bind_result = match addr {
            SocketAddr::V6(v6) => {
                // Dual-stack: let an IPv6 wildcard also accept IPv4 clients,
                // the way getaddrinfo's AI_PASSIVE wildcard does on a
                // typical Linux host. Best-effort: some platforms don't
                // support toggling this, and that's not fatal.
                let v6only: libc::c_int = 0;
                libc::setsockopt(
                    fd,
                    libc::IPPROTO_IPV6,
                    libc::IPV6_V6ONLY,
                    &v6only as *const _ as *const libc::c_void,
                    std::mem::size_of::<libc::c_int>() as libc::socklen_t,
                );
                bind_v6(fd, v6)
            }
            SocketAddr::V4(v4) => bind_v4(fd, v4),
        };

        if bind_result < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, ACCEPT_BACKLOG) < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(TcpListener::from_raw_fd(fd))
    }
}

/// # Safety
/// `fd` must be a valid, open socket descriptor of family `AF_INET`.
unsafe fn bind_v4(fd: libc::c_int, addr: SocketAddrV4) -> libc::c_int {
    let mut sockaddr: MaybeUninit<libc::sockaddr_in> = MaybeUninit::zeroed();
    unsafe {
        let s = sockaddr.as_mut_ptr();
        (*s).sin_family = libc::AF_INET as libc::sa_family_t;
        (*s).sin_port = addr.port().to_be();
        (*s).sin_addr = libc::in_addr { s_addr: u32::from_ne_bytes(addr.ip().octets()) };
    }
    unsafe {
        let sockaddr = sockaddr.assume_init();
        libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    }
}

/// # Safety
/// `fd` must be a valid, open socket descriptor of family `AF_INET6`.
unsafe fn bind_v6(fd: libc::c_int, addr: SocketAddrV6) -> libc::c_int {
    let mut sockaddr: MaybeUninit<libc::sockaddr_in6> = MaybeUninit::zeroed();
    unsafe {
        let s = sockaddr.as_mut_ptr();
        (*s).sin6_family = libc::AF_INET6 as libc::sa_family_t;
        (*s).sin6_port = addr.port().to_be();
        (*s).sin6_addr = libc::in6_addr { s6_addr: addr.ip().octets() };
        (*s).sin6_scope_id = addr.scope_id();
    }
    unsafe {
        let sockaddr = sockaddr.assume_init();
        libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
        )
    }
}
