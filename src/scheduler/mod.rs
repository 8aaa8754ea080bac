//! Cue scheduling loop
//!
//! One [`Scheduler::tick`] is one pass of the polling loop:
//!
//! 1. reload the configuration
//! 2. pause while the stop file exists
//! 3. on the first pass (or after a pause) draw a random interval
//! 4. once the interval has elapsed, pick a cue, duck the other
//!    applications, play the cue and restore their volumes
//!
//! [`Scheduler::run`] repeats this every [`POLL_INTERVAL`] forever.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Local;
use rand::rngs::ThreadRng;
use rand::Rng;
use tracing::{info, warn};

use crate::audio::CuePlayer;
use crate::config::{ConfigStore, Settings};
use crate::cue::{select_cue_with, CueFile};
use crate::error::PlaybackError;
use crate::session::{attenuate_all, RestoreSummary, SessionSource};

/// Sleep between loop iterations
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What the loop is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Counting down to the next cue
    Waiting,
    /// Stop file present, no cues are played
    Paused,
    /// A cue cycle is in progress
    Playing,
}

/// Timer state carried from one iteration to the next
#[derive(Debug, Clone)]
pub struct SchedulerState {
    phase: Phase,
    last_fire: Instant,
    interval: Duration,
    fresh_start: bool,
}

impl SchedulerState {
    /// State of a freshly started loop; the first tick draws the interval
    pub fn new(now: Instant) -> Self {
        Self {
            phase: Phase::Waiting,
            last_fire: now,
            interval: Duration::ZERO,
            fresh_start: true,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// When the timer was last reset
    pub fn last_fire(&self) -> Instant {
        self.last_fire
    }

    /// The currently drawn interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the next tick redraws the interval
    pub fn is_fresh_start(&self) -> bool {
        self.fresh_start
    }

    /// Whether the drawn interval has elapsed at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_fire) >= self.interval
    }

    /// Time left until the interval elapses
    pub fn remaining(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last_fire))
    }
}

/// Why a due cycle did not play a cue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The cue folder is missing or holds no eligible cue
    NoCue,
    /// No other application is producing sound
    NoActiveSessions,
}

/// Result of one loop iteration
#[derive(Debug)]
pub enum TickOutcome {
    /// The stop file is present
    Paused,
    /// The interval has not elapsed yet
    Waiting {
        /// Time left until the next cue
        remaining: Duration,
    },
    /// The interval elapsed but nothing was played
    Skipped(SkipReason),
    /// A cue cycle ran; volumes were restored regardless of playback
    Played {
        /// The cue that was drawn
        cue: CueFile,
        /// Outcome of playback
        playback: Result<(), PlaybackError>,
        /// Outcome of the volume restore
        restore: RestoreSummary,
    },
}

/// The cue scheduling loop
pub struct Scheduler<S, P, R = ThreadRng> {
    store: ConfigStore,
    sessions: S,
    player: P,
    rng: R,
    state: SchedulerState,
}

impl<S: SessionSource, P: CuePlayer> Scheduler<S, P, ThreadRng> {
    /// Create a scheduler using the thread RNG
    pub fn new(store: ConfigStore, sessions: S, player: P) -> Self {
        Self::with_rng(store, sessions, player, rand::thread_rng())
    }
}

impl<S: SessionSource, P: CuePlayer, R: Rng> Scheduler<S, P, R> {
    /// Create a scheduler with a specific RNG
    pub fn with_rng(store: ConfigStore, sessions: S, player: P, rng: R) -> Self {
        Self {
            store,
            sessions,
            player,
            rng,
            state: SchedulerState::new(Instant::now()),
        }
    }

    /// Timer state
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// The session source
    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// The cue player
    pub fn player(&self) -> &P {
        &self.player
    }

    /// Run the loop forever
    pub fn run(mut self) -> ! {
        info!(pid = std::process::id(), "Starting cue player");
        loop {
            self.tick();
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// One loop iteration at the current time
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// One loop iteration at `now`
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let settings = self.store.load();

        if settings.stop_file.exists() {
            if self.state.phase != Phase::Paused {
                info!(
                    file = %file_name(&settings.stop_file),
                    "Stop file detected, playback paused"
                );
                self.state.phase = Phase::Paused;
            }
            return TickOutcome::Paused;
        }

        if self.state.phase == Phase::Paused {
            info!(
                file = %file_name(&settings.stop_file),
                "Stop file not found, resuming playback"
            );
            self.state.phase = Phase::Waiting;
            self.state.fresh_start = true;
        }

        if self.state.fresh_start {
            info!(
                folder = %file_name(&settings.cue_dir),
                min_secs = settings.interval_min,
                max_secs = settings.interval_max,
                "Configuration loaded"
            );
            self.rearm(&settings, now);
            self.state.fresh_start = false;
        }

        if !self.state.is_due(now) {
            return TickOutcome::Waiting {
                remaining: self.state.remaining(now),
            };
        }

        info!("Interval elapsed, checking for active audio");
        let started = Instant::now();
        self.state.phase = Phase::Playing;
        let outcome = self.play_cycle(&settings);
        self.state.phase = Phase::Waiting;

        self.rearm(&settings, now + started.elapsed());
        outcome
    }

    /// Select, duck, play and restore
    fn play_cycle(&mut self, settings: &Settings) -> TickOutcome {
        let today = Local::now().date_naive();
        let Some(cue) = select_cue_with(&settings.cue_dir, today, &mut self.rng) else {
            info!("No cue to play this cycle");
            return TickOutcome::Skipped(SkipReason::NoCue);
        };

        let sessions = match self.sessions.active_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "Failed to list audio sessions");
                Vec::new()
            }
        };
        if sessions.is_empty() {
            info!("No audio detected, skipping the cue this cycle");
            return TickOutcome::Skipped(SkipReason::NoActiveSessions);
        }
        info!(count = sessions.len(), "Audio detected");

        let attenuation = attenuate_all(sessions, settings.attenuated_volume);
        let playback = self.player.play(&cue.path, attenuation.reference_volume());
        let restore = attenuation.restore();

        TickOutcome::Played {
            cue,
            playback,
            restore,
        }
    }

    /// Draw a new interval and restart the timer at `now`
    fn rearm(&mut self, settings: &Settings, now: Instant) {
        let secs = self.rng.gen_range(settings.interval_bounds());
        self.state.interval = Duration::from_secs(secs);
        self.state.last_fire = now;
        info!(
            minutes = %format!("{:.1}", secs as f64 / 60.0),
            "Next check scheduled"
        );
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
