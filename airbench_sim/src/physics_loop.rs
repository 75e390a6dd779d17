//! Background physics stepper.
//!
//! The loop owns the clock's [`TickSource`]. It sleeps on the grant channel
//! and, for every granted tick, steps each registered body in registration
//! order before acknowledging. Time therefore only moves when the
//! orchestrator advances the clock, and every advance returns with the world
//! already caught up.

use crate::error::SimError;

use airbench_core::PhysicsBody;
use airbench_env::{SimClock, TickSource, VehicleId, VirtualClock};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Seed spreading constant for per-body wind streams
const WIND_SEED_MIX: u64 = 0x9e3779b97f4a7c15;

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks executed (each tick steps every body once)
    pub ticks: u64,

    /// Grants received from the clock
    pub grants: u64,

    /// Index of the last executed tick
    pub last_tick: u64,
}

struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<LoopStats>,
}

/// Steps registered bodies on a dedicated thread, in lockstep with a [`VirtualClock`].
pub struct PhysicsLoop {
    clock: Arc<VirtualClock>,
    seed: u64,
    bodies: Vec<Arc<dyn PhysicsBody>>,
    ids: Vec<VehicleId>,
    started: bool,
    worker: Option<Worker>,
    stats: LoopStats,
}

impl PhysicsLoop {
    /// Creates a stopped loop. Nothing runs until [`start`](Self::start).
    pub fn new(clock: Arc<VirtualClock>) -> Self {
        Self {
            clock,
            seed: 0,
            bodies: Vec::new(),
            ids: Vec::new(),
            started: false,
            worker: None,
            stats: LoopStats::default(),
        }
    }

    /// Sets the seed from which per-body disturbance streams are derived.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Adds a body. Registration order is step order.
    pub fn register(&mut self, body: Arc<dyn PhysicsBody>) -> Result<VehicleId, SimError> {
        if self.started {
            return Err(SimError::RegistrationClosed);
        }

        let index = self.bodies.len() as u64;
        let id = VehicleId::from_seed(index);
        let wind_seed = self.seed.wrapping_mul(WIND_SEED_MIX).wrapping_add(index);
        body.attach(id, wind_seed)?;

        debug!(vehicle = body.name(), %id, index, "body registered");
        self.bodies.push(body);
        self.ids.push(id);
        Ok(id)
    }

    /// Spawns the `physics-loop` thread and attaches it to the clock.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.started {
            return Err(SimError::AlreadyStarted);
        }

        let source = self.clock.tick_source()?;
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let bodies = self.bodies.clone();

        let handle = thread::Builder::new()
            .name("physics-loop".to_string())
            .spawn(move || run_loop(source, shutdown_rx, bodies))
            .map_err(SimError::Spawn)?;

        self.started = true;
        self.worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });
        info!(
            bodies = self.bodies.len(),
            step_ms = self.clock.step_size().as_secs_f64() * 1e3,
            "physics loop started"
        );
        Ok(())
    }

    /// Stops the thread and joins it. Safe to call repeatedly.
    pub fn stop(&mut self) -> LoopStats {
        if let Some(worker) = self.worker.take() {
            // A closed channel also wakes the loop, so a failed send is fine
            let _ = worker.shutdown.send(());
            match worker.handle.join() {
                Ok(stats) => self.stats = stats,
                Err(_) => warn!("physics loop thread panicked"),
            }
            info!(ticks = self.stats.ticks, grants = self.stats.grants, "physics loop stopped");
        }
        self.stats
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> &[VehicleId] {
        &self.ids
    }

    pub fn clock(&self) -> &Arc<VirtualClock> {
        &self.clock
    }
}

impl Drop for PhysicsLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(source: TickSource, shutdown: Receiver<()>, bodies: Vec<Arc<dyn PhysicsBody>>) -> LoopStats {
    let mut stats = LoopStats::default();

    loop {
        select! {
            recv(source.grants()) -> grant => {
                let Ok(grant) = grant else {
                    debug!("clock dropped, physics loop exiting");
                    break;
                };
                for (tick, timestamp) in grant.ticks() {
                    for body in &bodies {
                        body.step(grant.step, tick, timestamp);
                    }
                    stats.ticks += 1;
                    stats.last_tick = tick;
                }
                stats.grants += 1;
                if source.acknowledge(&grant).is_err() {
                    break;
                }
            }
            recv(shutdown) -> _ => break,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use airbench_core::{CoreError, EnvironmentState, KinematicsState, StateSnapshot};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every step it receives into a shared journal.
    struct RecordingBody {
        label: &'static str,
        journal: Arc<Mutex<Vec<(&'static str, u64)>>>,
        seed: Mutex<Option<u64>>,
    }

    impl RecordingBody {
        fn new(label: &'static str, journal: &Arc<Mutex<Vec<(&'static str, u64)>>>) -> Arc<Self> {
            Arc::new(Self {
                label,
                journal: Arc::clone(journal),
                seed: Mutex::new(None),
            })
        }
    }

    impl PhysicsBody for RecordingBody {
        fn attach(&self, _id: VehicleId, wind_seed: u64) -> Result<(), CoreError> {
            *self.seed.lock().unwrap() = Some(wind_seed);
            Ok(())
        }

        fn step(&self, _dt: Duration, tick: u64, _timestamp: Duration) {
            self.journal.lock().unwrap().push((self.label, tick));
        }

        fn snapshot(&self) -> Arc<StateSnapshot> {
            Arc::new(StateSnapshot::initial(KinematicsState::zero(), EnvironmentState::default()))
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    fn clock() -> Arc<VirtualClock> {
        VirtualClock::shared(Duration::from_millis(3)).unwrap()
    }

    #[test]
    fn test_steps_bodies_in_registration_order() {
        let clock = clock();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut physics = PhysicsLoop::new(Arc::clone(&clock));
        physics.register(RecordingBody::new("a", &journal)).unwrap();
        physics.register(RecordingBody::new("b", &journal)).unwrap();
        physics.start().unwrap();

        clock.advance(Duration::from_millis(6)).unwrap();

        assert_eq!(
            *journal.lock().unwrap(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
        let stats = physics.stop();
        assert_eq!(stats, LoopStats { ticks: 2, grants: 1, last_tick: 2 });
    }

    #[test]
    fn test_lifecycle_errors() {
        let clock = clock();
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut physics = PhysicsLoop::new(Arc::clone(&clock));
        physics.start().unwrap();
        assert!(physics.is_running());

        assert!(matches!(physics.start(), Err(SimError::AlreadyStarted)));
        assert!(matches!(
            physics.register(RecordingBody::new("late", &journal)),
            Err(SimError::RegistrationClosed)
        ));

        physics.stop();
        physics.stop();
        assert!(!physics.is_running());
        assert!(!clock.is_driven());
    }

    #[test]
    fn test_stopped_loop_detaches_clock() {
        let clock = clock();
        let mut physics = PhysicsLoop::new(Arc::clone(&clock));
        physics.start().unwrap();
        clock.step().unwrap();
        physics.stop();

        // The dead link is reported once, then the clock runs undriven
        assert!(clock.step().is_err());
        assert!(clock.step().is_ok());
    }

    #[test]
    fn test_drop_stops_loop() {
        let clock = clock();
        {
            let mut physics = PhysicsLoop::new(Arc::clone(&clock));
            physics.start().unwrap();
            assert!(clock.is_driven());
        }
        assert!(!clock.is_driven());
    }

    #[test]
    fn test_wind_seeds_depend_on_seed_and_index() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let first = RecordingBody::new("a", &journal);
        let second = RecordingBody::new("b", &journal);

        let mut physics = PhysicsLoop::new(clock()).with_seed(42);
        let ids = [
            physics.register(first.clone()).unwrap(),
            physics.register(second.clone()).unwrap(),
        ];

        assert_eq!(ids, [VehicleId::from_seed(0), VehicleId::from_seed(1)]);
        assert_eq!(physics.ids(), &ids[..]);
        let a = first.seed.lock().unwrap().unwrap();
        let b = second.seed.lock().unwrap().unwrap();
        assert_eq!(a, 42u64.wrapping_mul(WIND_SEED_MIX));
        assert_eq!(b, a + 1);
        assert_eq!(physics.body_count(), 2);
    }
}
