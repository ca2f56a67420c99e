//! Animation supervisor
//!
//! Owns the animation lifecycle: selects which animation runs, performs
//! the stop / reset / start handshake at every switch, and restarts
//! tasks that die on their own. At most one animation task is ever
//! alive; a replacement is only spawned after the previous task has
//! fully terminated.

use crate::core::filter::ProximityFilter;
use crate::core::registry::{
    Animation, AnimationContext, AnimationRegistry, StopSignal,
};
use crate::core::state::SharedState;
use crate::geometry::Geometry;
use crate::hal::SharedSink;
use anyhow::bail;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Which animation to fall back to when nothing is requested or forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always the first registered animation.
    #[default]
    First,
    /// Advance through the registry at every restart boundary.
    RoundRobin,
}

/// Lifecycle phase, published through a watch channel so callers can
/// observe the supervisor while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting(&'static str),
    Running(&'static str),
    Stopping,
    SwitchPending(&'static str),
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Target time between animation frames.
    pub frame_period: Duration,
    /// How often the control loop re-evaluates the target animation.
    pub control_interval: Duration,
    /// How many frame periods a stopping animation is granted before it
    /// is aborted.
    pub stop_timeout_frames: u32,
    pub policy: SelectionPolicy,
    /// Pins this animation for the whole run when it resolves;
    /// runtime requests are then ignored.
    pub forced_animation: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            frame_period: Duration::from_millis(33),
            control_interval: Duration::from_millis(50),
            stop_timeout_frames: 10,
            policy: SelectionPolicy::First,
            forced_animation: None,
        }
    }
}

impl SupervisorConfig {
    fn stop_timeout(&self) -> Duration {
        self.frame_period * self.stop_timeout_frames
    }
}

/// One abnormal task termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFault {
    pub animation: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub starts: u64,
    pub stops: u64,
    pub timeouts: u64,
    pub faults: Vec<TaskFault>,
}

/// Read-side view of a running supervisor.
#[derive(Clone)]
pub struct SupervisorProbe {
    stats: Arc<Mutex<SupervisorStats>>,
    state_rx: watch::Receiver<SupervisorState>,
}

impl SupervisorProbe {
    pub fn stats(&self) -> SupervisorStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> SupervisorState {
        *self.state_rx.borrow()
    }
}

struct RunningTask {
    name: &'static str,
    stop: StopSignal,
    handle: JoinHandle<anyhow::Result<()>>,
}

/// Drives animation selection and the switch state machine.
pub struct AnimationSupervisor {
    registry: Arc<AnimationRegistry>,
    sink: SharedSink,
    geometry: Arc<Geometry>,
    state: Arc<SharedState>,
    filter: Arc<ProximityFilter>,
    config: SupervisorConfig,
    stats: Arc<Mutex<SupervisorStats>>,
    state_tx: watch::Sender<SupervisorState>,
    state_rx: watch::Receiver<SupervisorState>,
    current: Option<RunningTask>,
    rotation: usize,
    default_name: Option<&'static str>,
    last_bad_request: Option<String>,
}

impl AnimationSupervisor {
    pub fn new(
        registry: Arc<AnimationRegistry>,
        sink: SharedSink,
        geometry: Arc<Geometry>,
        state: Arc<SharedState>,
        filter: Arc<ProximityFilter>,
        config: SupervisorConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Idle);
        Self {
            registry,
            sink,
            geometry,
            state,
            filter,
            config,
            stats: Arc::new(Mutex::new(SupervisorStats::default())),
            state_tx,
            state_rx,
            current: None,
            rotation: 0,
            default_name: None,
            last_bad_request: None,
        }
    }

    /// Observation handle, valid for the lifetime of the run.
    pub fn probe(&self) -> SupervisorProbe {
        SupervisorProbe {
            stats: self.stats.clone(),
            state_rx: self.state_rx.clone(),
        }
    }

    fn set_state(&self, state: SupervisorState) {
        let _ = self.state_tx.send(state);
    }

    fn with_stats(&self, f: impl FnOnce(&mut SupervisorStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    /// Resolve the forced animation, if any. An unresolvable name is a
    /// warning, not a pin.
    fn resolve_pin(&self) -> Option<&'static str> {
        let forced = self.config.forced_animation.as_deref()?;
        match self.registry.get(forced) {
            Ok(animation) => {
                info!("animation `{}` is pinned for this run", animation.name());
                Some(animation.name())
            }
            Err(err) => {
                warn!("ignoring forced animation: {err}");
                None
            }
        }
    }

    /// Pick the default target per the selection policy. Advances the
    /// rotation, so this is only called at restart boundaries.
    fn next_default(&mut self) -> Option<&'static str> {
        let names = self.registry.names();
        if names.is_empty() {
            return None;
        }
        let name = match self.config.policy {
            SelectionPolicy::First => names[0],
            SelectionPolicy::RoundRobin => {
                let name = names[self.rotation % names.len()];
                self.rotation += 1;
                name
            }
        };
        self.default_name = Some(name);
        Some(name)
    }

    /// The animation that should currently be running.
    fn desired(&mut self, pin: Option<&'static str>) -> Option<&'static str> {
        if let Some(pinned) = pin {
            return Some(pinned);
        }
        if let Some(requested) = self.state.snapshot().requested_animation() {
            match self.registry.get(&requested) {
                Ok(animation) => {
                    self.last_bad_request = None;
                    return Some(animation.name());
                }
                Err(err) => {
                    // Warn once per distinct bad name, then fall back.
                    if self.last_bad_request.as_deref() != Some(requested.as_str()) {
                        warn!("ignoring animation request: {err}");
                        self.last_bad_request = Some(requested);
                    }
                }
            }
        }
        self.default_name.or_else(|| {
            let names = self.registry.names();
            names.first().copied()
        })
    }

    fn spawn_task(&mut self, animation: Arc<dyn Animation>) {
        let name = animation.name();
        self.set_state(SupervisorState::Starting(name));
        let stop = StopSignal::new();
        let ctx = AnimationContext {
            sink: self.sink.clone(),
            geometry: self.geometry.clone(),
            state: self.state.clone(),
            stop: stop.clone(),
            frame_period: self.config.frame_period,
        };
        let handle = tokio::spawn(async move { animation.run(ctx).await });
        info!("animation `{name}` started");
        self.with_stats(|s| s.starts += 1);
        self.current = Some(RunningTask { name, stop, handle });
        self.set_state(SupervisorState::Running(name));
    }

    /// Stop the running task and wait for it to terminate. A task that
    /// outlives the stop timeout is aborted and recorded as a fault.
    async fn stop_current(&mut self) {
        let Some(task) = self.current.take() else {
            return;
        };
        self.set_state(SupervisorState::Stopping);
        task.stop.trigger();

        let RunningTask {
            name, mut handle, ..
        } = task;
        match tokio::time::timeout(self.config.stop_timeout(), &mut handle).await {
            Ok(Ok(Ok(()))) => debug!("animation `{name}` stopped cleanly"),
            Ok(Ok(Err(err))) => {
                error!("animation `{name}` failed while stopping: {err:#}");
                self.with_stats(|s| {
                    s.faults.push(TaskFault {
                        animation: name.to_owned(),
                        reason: format!("{err:#}"),
                    });
                });
            }
            Ok(Err(join_err)) => {
                error!("animation `{name}` panicked: {join_err}");
                self.with_stats(|s| {
                    s.faults.push(TaskFault {
                        animation: name.to_owned(),
                        reason: format!("panicked: {join_err}"),
                    });
                });
            }
            Err(_) => {
                warn!(
                    "animation `{name}` ignored the stop signal for {:?}, aborting",
                    self.config.stop_timeout()
                );
                handle.abort();
                let _ = handle.await;
                self.with_stats(|s| {
                    s.timeouts += 1;
                    s.faults.push(TaskFault {
                        animation: name.to_owned(),
                        reason: "stop timeout, task aborted".to_owned(),
                    });
                });
            }
        }
        self.with_stats(|s| s.stops += 1);
    }

    /// Full switch boundary: stop, reset the filter, start. The filter
    /// reset happens strictly between the two tasks so the newcomer
    /// observes baseline temperatures.
    async fn switch_to(&mut self, name: &'static str) -> anyhow::Result<()> {
        self.set_state(SupervisorState::SwitchPending(name));
        let animation = self.registry.get(name)?;
        debug!("switching to animation `{name}`");
        self.stop_current().await;
        self.filter.reset();
        self.spawn_task(animation);
        Ok(())
    }

    /// Handle a task that returned without being asked to stop.
    async fn recover_dead_task(&mut self, pin: Option<&'static str>) -> anyhow::Result<()> {
        let Some(task) = self.current.take() else {
            return Ok(());
        };
        let name = task.name;
        let reason = match task.handle.await {
            Ok(Ok(())) => "exited without a stop signal".to_owned(),
            Ok(Err(err)) => format!("{err:#}"),
            Err(join_err) => format!("panicked: {join_err}"),
        };
        error!("animation `{name}` died ({reason}), restarting");
        self.with_stats(|s| {
            s.faults.push(TaskFault {
                animation: name.to_owned(),
                reason,
            });
        });

        let next = match pin {
            Some(pinned) => pinned,
            None => match self.next_default() {
                Some(next) => next,
                None => bail!("no animations registered"),
            },
        };
        self.filter.reset();
        self.spawn_task(self.registry.get(next)?);
        Ok(())
    }

    /// Control loop. Runs until `stop` is triggered, then stops the
    /// active animation and returns.
    pub async fn run(mut self, stop: StopSignal) -> anyhow::Result<()> {
        if self.registry.is_empty() {
            bail!("no animations registered");
        }

        let pin = self.resolve_pin();
        let first = match pin.or_else(|| self.next_default()) {
            Some(name) => name,
            None => bail!("no animations registered"),
        };
        self.filter.reset();
        self.spawn_task(self.registry.get(first)?);

        let mut ticker = tokio::time::interval(self.config.control_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if stop.is_triggered() {
                break;
            }

            let task_died = self
                .current
                .as_ref()
                .is_some_and(|t| t.handle.is_finished() && !t.stop.is_triggered());
            if task_died {
                self.recover_dead_task(pin).await?;
                continue;
            }

            let Some(target) = self.desired(pin) else {
                bail!("no animations registered");
            };
            if self.current.as_ref().map(|t| t.name) != Some(target) {
                self.switch_to(target).await?;
            }
        }

        self.stop_current().await;
        self.set_state(SupervisorState::Idle);
        info!("animation supervisor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::FilterConfig;
    use crate::core::state::KEY_ANIMATION;
    use crate::hal::MemorySink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OCTA_JSON: &str = r#"{
        "led_per_face": 2,
        "sensors": 1,
        "faces": [{ "sensors": [0], "pos": [0.0, 0.0, 1.0] }]
    }"#;

    #[derive(Default)]
    struct Trace {
        events: Mutex<Vec<String>>,
        alive: AtomicUsize,
        max_alive: AtomicUsize,
    }

    impl Trace {
        fn record(&self, event: impl Into<String>) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn enter(&self) {
            let n = self.alive.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_alive.fetch_max(n, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.alive.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Well-behaved animation: loops until the stop signal fires.
    struct Obedient {
        name: &'static str,
        trace: Arc<Trace>,
    }

    #[async_trait]
    impl Animation for Obedient {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, ctx: AnimationContext) -> anyhow::Result<()> {
            self.trace.enter();
            self.trace.record(format!("start {}", self.name));
            while !ctx.stop.is_triggered() {
                tokio::time::sleep(ctx.frame_period).await;
            }
            self.trace.record(format!("stop {}", self.name));
            self.trace.leave();
            Ok(())
        }
    }

    /// Ignores the stop signal entirely.
    struct Stubborn;

    #[async_trait]
    impl Animation for Stubborn {
        fn name(&self) -> &'static str {
            "stubborn"
        }

        async fn run(&self, _ctx: AnimationContext) -> anyhow::Result<()> {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    }

    /// Returns immediately without being asked to stop.
    struct Flaky {
        name: &'static str,
        trace: Arc<Trace>,
    }

    #[async_trait]
    impl Animation for Flaky {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _ctx: AnimationContext) -> anyhow::Result<()> {
            self.trace.record(format!("start {}", self.name));
            Ok(())
        }
    }

    struct Harness {
        supervisor: AnimationSupervisor,
        state: Arc<SharedState>,
    }

    fn harness(
        candidates: Vec<Arc<dyn Animation>>,
        configure: impl FnOnce(&mut SupervisorConfig),
    ) -> Harness {
        let registry = Arc::new(AnimationRegistry::discover(candidates));
        let geometry = Arc::new(Geometry::from_json("octa", OCTA_JSON).unwrap());
        let state = Arc::new(SharedState::new());
        let filter = Arc::new(ProximityFilter::new(FilterConfig::default(), 1));
        let sink = SharedSink::new(MemorySink::new(geometry.led_count()));
        let mut config = SupervisorConfig::default();
        configure(&mut config);
        let supervisor = AnimationSupervisor::new(
            registry, sink, geometry, state.clone(), filter, config,
        );
        Harness { supervisor, state }
    }

    fn obedient_pair(trace: &Arc<Trace>) -> Vec<Arc<dyn Animation>> {
        vec![
            Arc::new(Obedient {
                name: "alpha",
                trace: trace.clone(),
            }),
            Arc::new(Obedient {
                name: "beta",
                trace: trace.clone(),
            }),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn switch_stops_old_before_starting_new() {
        let trace = Arc::new(Trace::default());
        let h = harness(obedient_pair(&trace), |_| {});
        let probe = h.supervisor.probe();
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        h.state.set(KEY_ANIMATION, json!("beta"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        assert_eq!(
            trace.events(),
            vec!["start alpha", "stop alpha", "start beta", "stop beta"]
        );
        let stats = probe.stats();
        assert_eq!(stats.starts, 2);
        assert_eq!(stats.stops, 2);
        assert_eq!(stats.timeouts, 0);
        assert!(stats.faults.is_empty());
        assert_eq!(probe.state(), SupervisorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_animation_is_ever_alive() {
        let trace = Arc::new(Trace::default());
        let h = harness(obedient_pair(&trace), |_| {});
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        for name in ["beta", "alpha", "beta", "alpha"] {
            tokio::time::sleep(Duration::from_millis(200)).await;
            h.state.set(KEY_ANIMATION, json!(name));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        assert_eq!(trace.max_alive.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_animation_ignores_requests() {
        let trace = Arc::new(Trace::default());
        let h = harness(obedient_pair(&trace), |c| {
            c.forced_animation = Some("beta".to_owned());
        });
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        h.state.set(KEY_ANIMATION, json!("alpha"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        assert_eq!(trace.events(), vec!["start beta", "stop beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolvable_forced_name_falls_back_to_policy() {
        let trace = Arc::new(Trace::default());
        let h = harness(obedient_pair(&trace), |c| {
            c.forced_animation = Some("missing".to_owned());
        });
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        assert_eq!(trace.events(), vec!["start alpha", "stop alpha"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_animation_is_aborted_and_replaced() {
        let trace = Arc::new(Trace::default());
        let h = harness(
            vec![
                Arc::new(Stubborn),
                Arc::new(Obedient {
                    name: "alpha",
                    trace: trace.clone(),
                }),
            ],
            |c| c.stop_timeout_frames = 10,
        );
        let probe = h.supervisor.probe();
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        // Ask for the switch; the stubborn task must be aborted first.
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.state.set(KEY_ANIMATION, json!("alpha"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        let stats = probe.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.faults.len(), 1);
        assert_eq!(stats.faults[0].animation, "stubborn");
        // The replacement ran after the abort.
        assert_eq!(trace.events(), vec!["start alpha", "stop alpha"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_task_is_restarted_and_recorded() {
        let trace = Arc::new(Trace::default());
        let h = harness(
            vec![Arc::new(Flaky {
                name: "flaky",
                trace: trace.clone(),
            })],
            |_| {},
        );
        let probe = h.supervisor.probe();
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        tokio::time::sleep(Duration::from_millis(300)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        let stats = probe.stats();
        assert!(stats.starts >= 2, "starts = {}", stats.starts);
        assert!(!stats.faults.is_empty());
        assert_eq!(stats.faults[0].reason, "exited without a stop signal");
    }

    #[tokio::test(start_paused = true)]
    async fn round_robin_rotates_on_restart() {
        let trace = Arc::new(Trace::default());
        let h = harness(
            vec![
                Arc::new(Flaky {
                    name: "one",
                    trace: trace.clone(),
                }),
                Arc::new(Flaky {
                    name: "two",
                    trace: trace.clone(),
                }),
            ],
            |c| c.policy = SelectionPolicy::RoundRobin,
        );
        let stop = StopSignal::new();
        let run = tokio::spawn(h.supervisor.run(stop.clone()));

        tokio::time::sleep(Duration::from_millis(400)).await;
        stop.trigger();
        run.await.unwrap().unwrap();

        let events = trace.events();
        assert!(events.len() >= 3, "events = {events:?}");
        assert_eq!(events[0], "start one");
        assert_eq!(events[1], "start two");
        assert_eq!(events[2], "start one");
    }

    #[tokio::test]
    async fn empty_registry_is_an_error() {
        let h = harness(Vec::new(), |_| {});
        let err = h.supervisor.run(StopSignal::new()).await.unwrap_err();
        assert!(err.to_string().contains("no animations"));
    }
}
