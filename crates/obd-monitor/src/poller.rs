//! Polling loop
//!
//! Runs a session on a dedicated thread. The session blocks while it
//! waits for the adapter, so the stop flag is checked between queries and
//! readings cross over to the async side through a channel.

use crate::config::{MonitorConfig, PollConfig};
use obd_session::{
    mode, Clock, MonotonicClock, ObdError, PidResponse, SerialTransport, Session,
    SimulatedAdapter, Transport,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Channel capacity between the polling thread and its consumer
const CHANNEL_CAPACITY: usize = 256;

/// Polls a fixed list of PIDs on an initialized session
pub struct Poller<T, C> {
    session: Session<T, C>,
    config: PollConfig,
    /// PIDs the vehicle actually supports, in configured order
    pids: Vec<u8>,
    /// Consecutive failure count per PID
    failures: HashMap<u8, u8>,
}

impl<T: Transport, C: Clock> Poller<T, C> {
    /// Create a poller over an uninitialized session
    pub fn new(session: Session<T, C>, config: PollConfig) -> Self {
        Self {
            session,
            config,
            pids: Vec::new(),
            failures: HashMap::new(),
        }
    }

    /// Run the handshake, read the supported PIDs and keep the configured
    /// PIDs the vehicle answers
    pub fn start(&mut self) -> Result<(), ObdError> {
        self.session.initialize()?;
        self.session.refresh_supported_pids()?;

        self.pids = self
            .config
            .pids
            .iter()
            .copied()
            .filter(|&pid| {
                let supported = self.session.is_supported(mode::CURRENT_DATA, pid);
                if !supported {
                    warn!("PID {:02X} not supported by vehicle, skipping", pid);
                }
                supported
            })
            .collect();

        info!("Polling {} PIDs", self.pids.len());
        Ok(())
    }

    /// PIDs that will be polled
    pub fn pids(&self) -> &[u8] {
        &self.pids
    }

    /// Consecutive failures recorded for `pid`
    pub fn failures(&self, pid: u8) -> u8 {
        self.failures.get(&pid).copied().unwrap_or(0)
    }

    /// Query every PID once, returning the readings that succeeded
    pub fn poll_once(&mut self) -> Vec<PidResponse> {
        let mut readings = Vec::with_capacity(self.pids.len());

        for &pid in &self.pids {
            match self.session.query(mode::CURRENT_DATA, pid) {
                Ok(response) => {
                    self.failures.insert(pid, 0);
                    readings.push(response);
                }
                Err(e) => {
                    let failures = self.failures.entry(pid).or_insert(0);
                    *failures = failures.saturating_add(1);
                    warn!("PID {:02X} query failed (attempt {}): {}", pid, failures, e);

                    if *failures == self.config.max_retries {
                        warn!("Max retries reached for PID {:02X}", pid);
                    }
                }
            }
        }

        readings
    }

    /// Poll until `shutdown` is set or the receiver goes away
    pub fn run(&mut self, shutdown: &AtomicBool, tx: &mpsc::Sender<PidResponse>) {
        let interval = Duration::from_millis(self.config.interval_ms);

        while !shutdown.load(Ordering::SeqCst) {
            for reading in self.poll_once() {
                if tx.blocking_send(reading).is_err() {
                    debug!("Receiver dropped, stopping OBD polling");
                    return;
                }
            }
            std::thread::sleep(interval);
        }

        info!("OBD polling stopped");
    }
}

/// Errors raised while starting a [`Monitor`]
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("OBD session failed: {0}")]
    Session(#[from] ObdError),

    #[error("Polling thread exited before reporting start")]
    ThreadExited(#[from] oneshot::error::RecvError),
}

/// Handle to a polling thread
pub struct Monitor {
    receiver: mpsc::Receiver<PidResponse>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Open the configured transport and start polling on a background thread.
    ///
    /// Resolves once the handshake and capability query have finished, so a
    /// dead adapter is reported here rather than as an empty stream.
    pub async fn spawn(config: MonitorConfig) -> Result<Self, MonitorError> {
        let transport: Box<dyn Transport + Send> = if config.mock {
            info!("Using simulated ELM327 adapter");
            Box::new(SimulatedAdapter::new().with_jitter())
        } else {
            Box::new(SerialTransport::open(&config.serial)?)
        };

        Self::spawn_with(transport, config).await
    }

    /// Start polling over an already opened transport
    pub async fn spawn_with(
        transport: Box<dyn Transport + Send>,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        let (tx, rx) = mpsc::channel::<PidResponse>(CHANNEL_CAPACITY);
        let (started_tx, started_rx) = oneshot::channel::<Result<(), ObdError>>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = std::thread::spawn(move || {
            let session = Session::new(transport, MonotonicClock::new(), config.session);
            let mut poller = Poller::new(session, config.poll);

            let started = poller.start();
            let failed = started.is_err();
            if started_tx.send(started).is_err() || failed {
                return;
            }
            poller.run(&shutdown_clone, &tx);
        });

        let mut monitor = Self {
            receiver: rx,
            shutdown,
            thread: Some(thread),
        };

        let started = match started_rx.await {
            Ok(started) => started.map_err(MonitorError::from),
            Err(e) => Err(MonitorError::from(e)),
        };
        if let Err(e) = started {
            error!("Failed to start OBD session: {}", e);
            monitor.stop();
            tokio::task::spawn_blocking(move || monitor.join()).await.ok();
            return Err(e);
        }

        Ok(monitor)
    }

    /// Receive the next reading; `None` once the polling thread has ended
    pub async fn next_reading(&mut self) -> Option<PidResponse> {
        self.receiver.recv().await
    }

    /// Ask the polling thread to finish after its current query
    pub fn stop(&mut self) {
        info!("Stopping OBD monitor");
        self.shutdown.store(true, Ordering::SeqCst);
        self.receiver.close();
    }

    /// Wait for the polling thread to exit
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("OBD polling thread panicked");
            }
        }
    }
}
