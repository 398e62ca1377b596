//! Acquisition pump: a dedicated background thread that drives the
//! [`ScanParser`] and publishes completed rotations to a consumer.
//!
//! Follows a producer/waiter idiom for no-copy stream handoff (a
//! `Mutex`-guarded slot plus `Condvar`, `wait_timeout_while` on the consumer
//! side) and a named-background-thread pattern for setup/teardown logging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use crate::MAX_SCAN_NODES;
use crate::engine::Engine;
use crate::error::{DriverError, Result};
use crate::node::Node;
use crate::parser::ScanParser;
use crate::transport::ByteStream;

/// How long a single pump-thread read blocks before re-checking for a stop
/// request. Bounds stop latency; unrelated to the facade's command timeouts.
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

struct PumpState {
    latest: Option<Vec<Node>>,
    generation: u64,
    running: bool,
    last_error: Option<String>,
    packages_ok: u64,
    packages_checksum_error: u64,
    resyncs: u64,
    buffer_full_events: u64,
}

impl PumpState {
    fn new() -> Self {
        Self {
            latest: None,
            generation: 0,
            running: true,
            last_error: None,
            packages_ok: 0,
            packages_checksum_error: 0,
            resyncs: 0,
            buffer_full_events: 0,
        }
    }
}

struct Shared {
    lock: Mutex<PumpState>,
    cv: Condvar,
    /// Bytes queued by the consumer thread for the pump to write on its next
    /// iteration — the one write path the pump shares with the facade (used
    /// for `reset`, the sole command allowed while scanning).
    outgoing: Mutex<Vec<u8>>,
}

/// Snapshot of the parser/pump's running counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpCounters {
    pub packages_ok: u64,
    pub packages_checksum_error: u64,
    pub resyncs: u64,
    pub buffer_full_events: u64,
}

/// A running acquisition pump, owning the background thread and the link it
/// reads from. `stop` hands the link back so the facade can reuse it for a
/// later `startScan` or a clean `disconnect`.
pub struct Pump<S: ByteStream + 'static> {
    shared: Arc<Shared>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<Engine<S>>>,
}

impl<S: ByteStream + 'static> Pump<S> {
    /// Spawn the pump thread, taking ownership of `engine`'s link for as
    /// long as the scan runs.
    pub fn start(engine: Engine<S>, intensity_mode: bool) -> Self {
        let shared = Arc::new(Shared {
            lock: Mutex::new(PumpState::new()),
            cv: Condvar::new(),
            outgoing: Mutex::new(Vec::new()),
        });
        let stop_flag = Arc::new(AtomicBool::new(false));

        let thread_shared = Arc::clone(&shared);
        let thread_stop_flag = Arc::clone(&stop_flag);
        let handle = thread::Builder::new()
            .name("spinscan-pump".into())
            .spawn(move || pump_loop(engine, intensity_mode, thread_shared, thread_stop_flag))
            .expect("failed to spawn acquisition pump thread");

        Self {
            shared,
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Wait up to `timeout` for a new completed rotation, returning its nodes.
    pub fn grab_scan(&self, timeout: Duration) -> Result<Vec<Node>> {
        let state = self.shared.lock.lock().unwrap();
        let start_gen = state.generation;
        let (mut state, wait_result) = self
            .shared
            .cv
            .wait_timeout_while(state, timeout, |s| s.running && s.generation == start_gen)
            .unwrap();

        if let Some(err) = state.last_error.take() {
            return Err(DriverError::Io(std::io::Error::other(err)));
        }
        if wait_result.timed_out() {
            return Err(DriverError::Timeout);
        }
        if !state.running {
            return Err(DriverError::NotScanning);
        }
        Ok(state.latest.clone().unwrap_or_default())
    }

    /// Queue a raw write for the pump thread to perform on its next
    /// iteration, without disturbing the read loop. Used by `reset`, the one
    /// command transaction allowed while scanning.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        self.shared.outgoing.lock().unwrap().extend(bytes);
    }

    /// Current parser/pump diagnostics.
    #[must_use]
    pub fn counters(&self) -> PumpCounters {
        let state = self.shared.lock.lock().unwrap();
        PumpCounters {
            packages_ok: state.packages_ok,
            packages_checksum_error: state.packages_checksum_error,
            resyncs: state.resyncs,
            buffer_full_events: state.buffer_full_events,
        }
    }

    /// Signal the pump thread to stop, join it, and recover the link.
    pub fn stop(mut self) -> Result<Engine<S>> {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.shared.cv.notify_all();
        self.handle
            .take()
            .expect("handle only taken by stop, called once")
            .join()
            .map_err(|_| DriverError::Protocol("acquisition pump thread panicked".into()))
    }
}

fn publish(shared: &Shared, nodes: Vec<Node>) {
    let mut state = shared.lock.lock().unwrap();
    state.latest = Some(nodes);
    state.generation = state.generation.wrapping_add(1);
    drop(state);
    shared.cv.notify_all();
}

fn pump_loop<S: ByteStream>(
    mut engine: Engine<S>,
    intensity_mode: bool,
    shared: Arc<Shared>,
    stop_flag: Arc<AtomicBool>,
) -> Engine<S> {
    info!("pump: starting");
    let mut parser = ScanParser::new(intensity_mode);
    let mut scratch: Vec<Node> = Vec::with_capacity(MAX_SCAN_NODES);
    let mut discarding = false;
    let mut buf = [0u8; 512];

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }

        let pending = std::mem::take(&mut *shared.outgoing.lock().unwrap());
        if !pending.is_empty() {
            if let Err(e) = engine.stream_mut().write_all(&pending) {
                warn!("pump: queued write failed: {e}");
            }
        }

        let n = match engine.read(&mut buf, POLL_TIMEOUT) {
            Ok(n) => n,
            Err(e) => {
                error!("pump: fatal I/O error, exiting: {e}");
                let mut state = shared.lock.lock().unwrap();
                state.running = false;
                state.last_error = Some(e.to_string());
                drop(state);
                shared.cv.notify_all();
                return engine;
            }
        };
        if n == 0 {
            continue;
        }

        for node in parser.feed(&buf[..n]) {
            if node.is_sync() {
                if !scratch.is_empty() {
                    publish(&shared, std::mem::take(&mut scratch));
                }
                discarding = false;
                scratch.push(node);
                continue;
            }
            if discarding {
                continue;
            }
            scratch.push(node);
            if scratch.len() >= MAX_SCAN_NODES {
                warn!("pump: scratch buffer full at {MAX_SCAN_NODES} nodes, discarding until next sync");
                let mut state = shared.lock.lock().unwrap();
                state.buffer_full_events += 1;
                drop(state);
                scratch.clear();
                discarding = true;
            }
        }

        let mut state = shared.lock.lock().unwrap();
        state.packages_ok = parser.packages_ok;
        state.packages_checksum_error = parser.packages_checksum_error;
        state.resyncs = parser.resyncs;
    }

    info!("pump: stopped");
    let mut state = shared.lock.lock().unwrap();
    state.running = false;
    drop(state);
    shared.cv.notify_all();
    engine
}
