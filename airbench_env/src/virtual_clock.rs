//! Steppable virtual clock and the tick handshake with the physics loop.
//!
//! Time is kept as integer nanoseconds so that repeated runs with the same
//! step size land on exactly the same tick boundaries.
//!
//! # Handshake
//!
//! ```text
//! orchestrator                 VirtualClock                 physics loop
//!   |-- advance(d) ------------->|                                |
//!   |                            |-- TickGrant{first, count} ---->|
//!   |                            |                                |-- step bodies x count
//!   |                            |<------------- ack(last tick) --|
//!   |<- Ok(now) -----------------|                                |
//! ```

use crate::clock::{duration_from_secs, SimClock};
use crate::error::EnvError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A batch of consecutive fixed-size ticks the driver must execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickGrant {
    /// Index of the first tick in the batch (tick `k` ends at `k * step`)
    pub first_tick: u64,

    /// Number of ticks in the batch
    pub count: u64,

    /// Fixed step size of the issuing clock
    pub step: Duration,
}

impl TickGrant {
    /// Returns the index of the last tick in the batch.
    pub fn last_tick(&self) -> u64 {
        self.first_tick + self.count.saturating_sub(1)
    }

    /// Iterates `(tick index, virtual time at the end of the tick)`.
    pub fn ticks(&self) -> impl Iterator<Item = (u64, Duration)> {
        let step_ns = self.step.as_nanos() as u64;
        (self.first_tick..self.first_tick + self.count)
            .map(move |tick| (tick, Duration::from_nanos(tick * step_ns)))
    }
}

/// Clock side of an attached driver.
struct DriverLink {
    grants: Sender<TickGrant>,
    acks: Receiver<u64>,
    alive: Arc<AtomicBool>,
}

/// Driver side of the handshake, owned by the physics loop thread.
///
/// Dropping it detaches the driver from the clock.
pub struct TickSource {
    grants: Receiver<TickGrant>,
    acks: Sender<u64>,
    alive: Arc<AtomicBool>,
}

impl TickSource {
    /// Returns the grant receiver (for use in `select!`).
    pub fn grants(&self) -> &Receiver<TickGrant> {
        &self.grants
    }

    /// Reports a grant as fully executed, unblocking the clock.
    pub fn acknowledge(&self, grant: &TickGrant) -> Result<(), EnvError> {
        self.acks
            .send(grant.last_tick())
            .map_err(|_| EnvError::detached("clock dropped before acknowledgement"))
    }
}

impl Drop for TickSource {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Deterministic, manually advanced time source with a fixed step.
///
/// Replaces wall-clock sleeping: `advance` returns once the attached driver
/// (if any) has executed every tick boundary crossed.
pub struct VirtualClock {
    /// Fixed step size in nanoseconds (immutable)
    step_ns: u64,

    /// Current virtual time in nanoseconds
    now_ns: AtomicU64,

    /// Attached driver; the lock also serializes concurrent advances
    driver: Mutex<Option<DriverLink>>,

    /// Liveness flag of the attached driver, readable without waiting on an advance
    attached: Mutex<Option<Arc<AtomicBool>>>,
}

impl VirtualClock {
    /// Creates a clock with the given fixed step size.
    pub fn new(step: Duration) -> Result<Self, EnvError> {
        let step_ns = u64::try_from(step.as_nanos())
            .map_err(|_| EnvError::InvalidStepSize(format!("{step:?} overflows")))?;
        if step_ns == 0 {
            return Err(EnvError::InvalidStepSize("step must be positive".to_string()));
        }

        Ok(Self {
            step_ns,
            now_ns: AtomicU64::new(0),
            driver: Mutex::new(None),
            attached: Mutex::new(None),
        })
    }

    /// Creates a clock from a step size in seconds.
    pub fn from_secs(step_secs: f64) -> Result<Self, EnvError> {
        let step = duration_from_secs(step_secs)
            .map_err(|_| EnvError::InvalidStepSize(format!("{step_secs} s")))?;
        Self::new(step)
    }

    /// Creates an Arc-wrapped clock for sharing.
    pub fn shared(step: Duration) -> Result<Arc<Self>, EnvError> {
        Self::new(step).map(Arc::new)
    }

    /// Returns the number of whole ticks elapsed.
    pub fn tick_index(&self) -> u64 {
        self.now_ns.load(Ordering::Acquire) / self.step_ns
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.now_ns.load(Ordering::Acquire)
    }

    /// Attaches a tick driver.
    ///
    /// Fails while another live driver is attached. A driver whose
    /// `TickSource` was dropped is replaced silently.
    pub fn tick_source(&self) -> Result<TickSource, EnvError> {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_driven() {
            return Err(EnvError::DriverAlreadyAttached);
        }

        let (grant_tx, grant_rx) = bounded(1);
        let (ack_tx, ack_rx) = bounded(1);
        let alive = Arc::new(AtomicBool::new(true));

        *driver = Some(DriverLink {
            grants: grant_tx,
            acks: ack_rx,
            alive: Arc::clone(&alive),
        });
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&alive));

        Ok(TickSource {
            grants: grant_rx,
            acks: ack_tx,
            alive,
        })
    }

    /// Returns time to zero for a fresh run.
    ///
    /// Refused while a driver is attached, since the driver's world would no
    /// longer match the clock.
    pub fn reset(&self) -> Result<(), EnvError> {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_driven() {
            return Err(EnvError::DriverAttached("reset".to_string()));
        }
        *driver = None;
        self.now_ns.store(0, Ordering::Release);
        Ok(())
    }

    fn detach(&self, driver: &mut Option<DriverLink>) {
        *driver = None;
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl SimClock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::Acquire))
    }

    fn step_size(&self) -> Duration {
        Duration::from_nanos(self.step_ns)
    }

    fn advance(&self, duration: Duration) -> Result<Duration, EnvError> {
        let delta_ns = u64::try_from(duration.as_nanos())
            .map_err(|_| EnvError::InvalidDuration(format!("{duration:?}")))?;

        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        let from = self.now_ns.load(Ordering::Acquire);
        let to = from
            .checked_add(delta_ns)
            .ok_or_else(|| EnvError::InvalidDuration(format!("{duration:?} overflows clock")))?;

        let grant = TickGrant {
            first_tick: from / self.step_ns + 1,
            count: to / self.step_ns - from / self.step_ns,
            step: self.step_size(),
        };

        if grant.count > 0 {
            if let Some(link) = driver.as_ref() {
                if !link.alive.load(Ordering::Acquire) {
                    self.detach(&mut driver);
                    return Err(EnvError::detached("tick driver stopped"));
                }
                if link.grants.send(grant).is_err() {
                    self.detach(&mut driver);
                    return Err(EnvError::detached("tick driver stopped"));
                }
                match link.acks.recv() {
                    Ok(last) if last == grant.last_tick() => {}
                    Ok(last) => {
                        return Err(EnvError::detached(format!(
                            "driver acknowledged tick {last}, expected {}",
                            grant.last_tick()
                        )));
                    }
                    Err(_) => {
                        self.detach(&mut driver);
                        return Err(EnvError::detached("tick driver stopped mid-grant"));
                    }
                }
            }
        }

        self.now_ns.store(to, Ordering::Release);
        Ok(Duration::from_nanos(to))
    }

    fn is_driven(&self) -> bool {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|alive| alive.load(Ordering::Acquire))
    }
}
