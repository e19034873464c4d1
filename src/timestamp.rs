//! Periodic Timestamp Writer (file-backed variant only): every 10 s, appends
//! a formatted local timestamp to the store as an ordinary data command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;

use crate::history::HistoryStore;

const TICK: Duration = Duration::from_secs(10);

/// Spawns the timer thread. It keeps firing until `shutdown` is observed
/// set, at which point it exits without joining back into the accept loop —
/// the Listener joins it directly during its own shutdown sequence.
pub fn spawn(
    store: Arc<Mutex<Box<dyn HistoryStore>>>,
    shutdown: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("timestamp-writer".to_owned())
        .spawn(move || {
            while !shutdown.load(Ordering::Acquire) {
                std::thread::sleep(TICK);
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                tick(&store);
            }
        })
        .expect("failed to spawn timestamp writer thread")
}

fn tick(store: &Arc<Mutex<Box<dyn HistoryStore>>>) {
    let formatted = Local::now().format("timestamp:%a, %d %b %Y %T %z\n").to_string();
    match store.lock() {
        Ok(mut guard) => guard.append(std::sync::Arc::from(formatted.into_bytes())),
        Err(_) => log::error!("timestamp writer: history store mutex poisoned, skipping tick"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;

    #[test]
    fn tick_appends_a_timestamp_line() {
        let store: Arc<Mutex<Box<dyn HistoryStore>>> =
            Arc::new(Mutex::new(Box::new(MemoryStore::new(5))));
        tick(&store);
        let mut seen = Vec::new();
        store.lock().unwrap().foreach(&mut |b| seen.push(b.to_vec()));
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with(b"timestamp:"));
        assert!(seen[0].ends_with(b"\n"));
    }
}
