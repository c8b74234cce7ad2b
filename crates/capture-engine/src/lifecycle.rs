//! Recording lifecycle state machine.
//!
//! ```text
//! idle -> initializing -> recording -> stopping -> completed -> idle
//!            |   ^
//!            +---+ (countdown cancelled)            any -> error -> idle
//! ```
//!
//! [`RecordingLifecycle`] is the only authority on recording state. Every
//! other component asks it for permission through [`RecordingLifecycle::transition`]
//! and must honour a `false` answer. Entering `recording` starts a
//! one-second duration timer that requests `stopping` itself once the
//! maximum duration is reached.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clipcast_common::clock::RecordingClock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// State of the recording lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    Idle,
    Initializing,
    Recording,
    Stopping,
    Completed,
    Error,
}

impl RecordingState {
    pub const ALL: [RecordingState; 6] = [
        RecordingState::Idle,
        RecordingState::Initializing,
        RecordingState::Recording,
        RecordingState::Stopping,
        RecordingState::Completed,
        RecordingState::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Initializing => "initializing",
            RecordingState::Recording => "recording",
            RecordingState::Stopping => "stopping",
            RecordingState::Completed => "completed",
            RecordingState::Error => "error",
        }
    }

    /// Whether `self -> target` is a legal edge.
    pub fn can_transition_to(self, target: RecordingState) -> bool {
        use RecordingState::*;
        matches!(
            (self, target),
            (Idle, Initializing)
                | (Initializing, Recording)
                | (Initializing, Idle)
                | (Recording, Stopping)
                | (Stopping, Completed)
                | (Completed, Idle)
                | (Error, Idle)
                | (Idle | Initializing | Recording | Stopping | Completed, Error)
        )
    }

    /// Hardware is (or is about to be) held and no export may run.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RecordingState::Initializing | RecordingState::Recording | RecordingState::Stopping
        )
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to observers after every accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: RecordingState,
    pub to: RecordingState,
    pub session_id: u64,
}

/// Snapshot of the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    /// Incremented every time a new session starts initializing.
    pub session_id: u64,
    pub state: RecordingState,
    pub started_at: Option<DateTime<Utc>>,
    /// Whole seconds recorded, updated by the duration timer.
    pub duration_secs: u64,
    pub max_duration_secs: u64,
}

type Observer = Arc<dyn Fn(&StateChange) + Send + Sync>;
type ReleaseHook = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    session: RecordingSession,
    clock: Option<RecordingClock>,
    /// Elapsed seconds frozen when the session left `recording`.
    frozen_elapsed: Option<f64>,
    observers: Vec<(u64, Observer)>,
    next_observer_id: u64,
    release_hook: Option<ReleaseHook>,
    timer: Option<JoinHandle<()>>,
}

/// The recording finite-state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RecordingLifecycle {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingLifecycle {
    pub fn new(max_duration_secs: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                session: RecordingSession {
                    session_id: 0,
                    state: RecordingState::Idle,
                    started_at: None,
                    duration_secs: 0,
                    max_duration_secs: max_duration_secs.max(1),
                },
                clock: None,
                frozen_elapsed: None,
                observers: Vec::new(),
                next_observer_id: 0,
                release_hook: None,
                timer: None,
            })),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.inner.lock().session.state
    }

    pub fn session(&self) -> RecordingSession {
        self.inner.lock().session.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Precise seconds recorded in the current session.
    ///
    /// Counts while `recording`; frozen once the session moves on.
    pub fn elapsed_secs(&self) -> f64 {
        let inner = self.inner.lock();
        match (inner.session.state, &inner.clock, inner.frozen_elapsed) {
            (RecordingState::Recording, Some(clock), _) => clock.elapsed_secs(),
            (_, _, Some(frozen)) => frozen,
            _ => 0.0,
        }
    }

    /// Change the duration cap. Takes effect on the next timer tick.
    pub fn set_max_duration(&self, max_duration_secs: u64) {
        self.inner.lock().session.max_duration_secs = max_duration_secs.max(1);
    }

    /// Register the hook run on every entry into `error`.
    ///
    /// The hook must be idempotent; it is called outside the state lock.
    pub fn set_release_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lock().release_hook = Some(Arc::new(hook));
    }

    /// Subscribe to state changes. Dropping the returned handle unsubscribes.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_observer_id;
        inner.next_observer_id += 1;
        inner.observers.push((id, Arc::new(observer)));
        Subscription {
            id,
            inner: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Request a transition. Returns `false`, changing nothing, when the
    /// edge is illegal from the current state.
    pub fn transition(&self, target: RecordingState) -> bool {
        let (change, observers, hook) = {
            let mut inner = self.inner.lock();
            let from = inner.session.state;
            if !from.can_transition_to(target) {
                tracing::warn!(
                    from = %from,
                    to = %target,
                    session_id = inner.session.session_id,
                    "Rejected lifecycle transition"
                );
                return false;
            }

            if from == RecordingState::Recording {
                inner.frozen_elapsed = inner.clock.as_ref().map(RecordingClock::elapsed_secs);
                if let Some(timer) = inner.timer.take() {
                    timer.abort();
                }
            }

            inner.session.state = target;
            match target {
                RecordingState::Initializing => {
                    inner.session.session_id += 1;
                    inner.session.started_at = None;
                    inner.session.duration_secs = 0;
                    inner.clock = None;
                    inner.frozen_elapsed = None;
                }
                RecordingState::Recording => {
                    let clock = RecordingClock::start();
                    inner.session.started_at = Some(clock.started_at());
                    inner.clock = Some(clock);
                    inner.timer = self.spawn_timer(inner.session.session_id);
                }
                RecordingState::Idle if from == RecordingState::Completed => {
                    inner.session.started_at = None;
                    inner.session.duration_secs = 0;
                    inner.clock = None;
                    inner.frozen_elapsed = None;
                }
                _ => {}
            }

            let change = StateChange {
                from,
                to: target,
                session_id: inner.session.session_id,
            };
            let observers: Vec<Observer> = inner.observers.iter().map(|(_, o)| o.clone()).collect();
            let hook = (target == RecordingState::Error)
                .then(|| inner.release_hook.clone())
                .flatten();
            (change, observers, hook)
        };

        tracing::info!(
            from = %change.from,
            to = %change.to,
            session_id = change.session_id,
            "Lifecycle transition"
        );

        if let Some(hook) = hook {
            hook();
        }
        for observer in observers {
            observer(&change);
        }
        true
    }

    fn spawn_timer(&self, session_id: u64) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime; duration timer and auto-stop are disabled");
                return None;
            }
        };
        let weak = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let lifecycle = RecordingLifecycle { inner };
                if !lifecycle.on_timer_tick(session_id) {
                    return;
                }
            }
        }))
    }

    /// One duration tick. Returns whether the timer should keep running.
    fn on_timer_tick(&self, session_id: u64) -> bool {
        let limit_reached = {
            let mut inner = self.inner.lock();
            if inner.session.state != RecordingState::Recording
                || inner.session.session_id != session_id
            {
                return false;
            }
            let elapsed = inner
                .clock
                .as_ref()
                .map(RecordingClock::elapsed_whole_secs)
                .unwrap_or(inner.session.duration_secs + 1);
            inner.session.duration_secs = elapsed;
            tracing::debug!(session_id, duration_secs = elapsed, "Recording timer tick");
            elapsed >= inner.session.max_duration_secs
        };

        if limit_reached {
            tracing::info!(session_id, "Maximum recording duration reached, stopping");
            self.transition(RecordingState::Stopping);
            return false;
        }
        true
    }
}

impl std::fmt::Debug for RecordingLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingLifecycle")
            .field("session", &self.session())
            .finish()
    }
}

/// Handle returned by [`RecordingLifecycle::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    inner: Option<Weak<Mutex<Inner>>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(inner) = self.inner.take().and_then(|weak| weak.upgrade()) {
            inner.lock().observers.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
