//! Audio sessions of other applications and volume ducking
//!
//! While a cue plays, every other application that is producing sound is
//! lowered to the attenuated volume. The volumes in effect before ducking are
//! kept in a [`VolumeSnapshot`] owned by an [`Attenuation`] guard, which puts
//! them back when it is dropped, whether playback succeeded, failed or
//! panicked.
//!
//! The desktop audio server is reached through the [`SessionSource`] and
//! [`AudioSession`] traits; [`PulseAudio`] is the implementation for
//! PulseAudio and PipeWire desktops.

mod pulse;

pub use pulse::{parse_sink_inputs, PulseAudio, SinkInput, IGNORED_PROCESSES};

use tracing::{info, warn};

use crate::error::SessionResult;

/// Cue volume used when no session volume could be read
pub const DEFAULT_CUE_VOLUME: f32 = 0.8;

/// One application's live audio output
pub trait AudioSession {
    /// Process id of the owning application
    fn pid(&self) -> u32;

    /// Process name of the owning application
    fn process_name(&self) -> &str;

    /// Current volume, 0.0 to 1.0
    fn volume(&self) -> SessionResult<f32>;

    /// Set the volume, 0.0 to 1.0
    fn set_volume(&self, volume: f32) -> SessionResult<()>;

    /// Return to the volume captured before ducking
    ///
    /// `original` is the value [`AudioSession::volume`] reported. Sessions
    /// that know more than a single level, such as per-channel balance,
    /// restore that instead.
    fn restore_volume(&self, original: f32) -> SessionResult<()> {
        self.set_volume(original)
    }
}

/// Lists the sessions that are currently producing sound
///
/// Implementations leave out system processes and this process itself.
pub trait SessionSource {
    /// Sessions producing sound right now
    fn active_sessions(&self) -> SessionResult<Vec<Box<dyn AudioSession>>>;
}

/// A session and the volume it had before ducking
pub struct CapturedVolume {
    session: Box<dyn AudioSession>,
    original: f32,
}

impl CapturedVolume {
    /// Process id of the captured session
    pub fn pid(&self) -> u32 {
        self.session.pid()
    }

    /// Volume before ducking
    pub fn original(&self) -> f32 {
        self.original
    }
}

/// Volumes captured before ducking, in capture order
#[derive(Default)]
pub struct VolumeSnapshot {
    entries: Vec<CapturedVolume>,
}

impl VolumeSnapshot {
    /// Number of captured sessions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no session was captured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Captured volume of the first session owned by `pid`
    pub fn original_volume(&self, pid: u32) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.pid() == pid)
            .map(CapturedVolume::original)
    }

    /// Captured entries in capture order
    pub fn entries(&self) -> &[CapturedVolume] {
        &self.entries
    }
}

/// Outcome of a restore pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Sessions set back to their captured volume
    pub restored: usize,
    /// Process ids whose volume could not be restored
    pub failed: Vec<u32>,
}

impl RestoreSummary {
    /// Whether every captured session was restored
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ducked state of the other applications
///
/// Restores the captured volumes exactly once: either through
/// [`Attenuation::restore`] or when dropped.
pub struct Attenuation {
    snapshot: VolumeSnapshot,
    reference_volume: f32,
}

impl Attenuation {
    /// Suggested cue volume: the first captured session's volume before ducking
    pub fn reference_volume(&self) -> f32 {
        self.reference_volume
    }

    /// The captured volumes
    pub fn snapshot(&self) -> &VolumeSnapshot {
        &self.snapshot
    }

    /// Restore the captured volumes now
    pub fn restore(mut self) -> RestoreSummary {
        restore_all(std::mem::take(&mut self.snapshot))
    }
}

impl Drop for Attenuation {
    fn drop(&mut self) {
        if !self.snapshot.is_empty() {
            restore_all(std::mem::take(&mut self.snapshot));
        }
    }
}

/// Capture each session's volume and lower it to `target`
///
/// Sessions whose volume cannot be read are left alone. A session whose
/// volume can be read but not lowered is still captured, so a restore is
/// attempted for it.
pub fn attenuate_all(sessions: Vec<Box<dyn AudioSession>>, target: f32) -> Attenuation {
    let target = target.clamp(0.0, 1.0);
    let mut snapshot = VolumeSnapshot::default();
    let mut reference_volume = None;

    info!(count = sessions.len(), "Lowering background audio");
    for session in sessions {
        let original = match session.volume() {
            Ok(volume) => volume,
            Err(e) => {
                warn!(
                    error = %e,
                    process = session.process_name(),
                    pid = session.pid(),
                    "Could not read session volume, leaving it untouched"
                );
                continue;
            }
        };

        if reference_volume.is_none() {
            info!(
                process = session.process_name(),
                pid = session.pid(),
                volume = %percent(original),
                "Using session as the cue volume reference"
            );
            reference_volume = Some(original);
        }

        if let Err(e) = session.set_volume(target) {
            warn!(
                error = %e,
                process = session.process_name(),
                pid = session.pid(),
                "Could not lower session volume"
            );
        }

        snapshot.entries.push(CapturedVolume { session, original });
    }

    Attenuation {
        snapshot,
        reference_volume: reference_volume
            .unwrap_or(DEFAULT_CUE_VOLUME)
            .clamp(0.0, 1.0),
    }
}

/// Set every captured session back to its captured volume
///
/// One attempt per session; failures are logged and the pass continues.
pub fn restore_all(snapshot: VolumeSnapshot) -> RestoreSummary {
    let mut summary = RestoreSummary::default();
    if snapshot.is_empty() {
        return summary;
    }

    info!("Restoring original volume");
    for entry in snapshot.entries {
        let pid = entry.session.pid();
        match entry.session.restore_volume(entry.original) {
            Ok(()) => {
                info!(
                    process = entry.session.process_name(),
                    pid,
                    volume = %percent(entry.original),
                    "Volume restored"
                );
                summary.restored += 1;
            }
            Err(e) => {
                warn!(error = %e, pid, "Could not restore volume (the process probably exited)");
                summary.failed.push(pid);
            }
        }
    }
    summary
}

fn percent(volume: f32) -> String {
    format!("{:.0}%", volume * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone)]
    struct FakeSession {
        pid: u32,
        volume: Rc<Cell<f32>>,
        gone: Rc<Cell<bool>>,
        unreadable: bool,
        writes: Rc<RefCell<Vec<f32>>>,
    }

    impl FakeSession {
        fn new(pid: u32, volume: f32) -> Self {
            Self {
                pid,
                volume: Rc::new(Cell::new(volume)),
                gone: Rc::new(Cell::new(false)),
                unreadable: false,
                writes: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn boxed(&self) -> Box<dyn AudioSession> {
            Box::new(self.clone())
        }
    }

    impl AudioSession for FakeSession {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn process_name(&self) -> &str {
            "fake"
        }

        fn volume(&self) -> SessionResult<f32> {
            if self.unreadable || self.gone.get() {
                return Err(SessionError::Vanished(self.pid));
            }
            Ok(self.volume.get())
        }

        fn set_volume(&self, volume: f32) -> SessionResult<()> {
            if self.gone.get() {
                return Err(SessionError::Vanished(self.pid));
            }
            self.writes.borrow_mut().push(volume);
            self.volume.set(volume);
            Ok(())
        }
    }

    #[test]
    fn test_attenuate_lowers_and_captures() {
        let music = FakeSession::new(100, 0.7);
        let video = FakeSession::new(200, 0.4);

        let attenuation = attenuate_all(vec![music.boxed(), video.boxed()], 0.1);
        assert_eq!(music.volume.get(), 0.1);
        assert_eq!(video.volume.get(), 0.1);
        assert_eq!(attenuation.snapshot().len(), 2);
        assert_eq!(attenuation.snapshot().original_volume(100), Some(0.7));
        assert_eq!(attenuation.snapshot().original_volume(200), Some(0.4));
        assert_eq!(attenuation.reference_volume(), 0.7);

        let summary = attenuation.restore();
        assert_eq!(summary.restored, 2);
        assert!(summary.is_complete());
        assert_eq!(music.volume.get(), 0.7);
        assert_eq!(video.volume.get(), 0.4);
    }

    /// Stereo stream that restores its own channel balance
    struct StereoSession {
        listed: [f32; 2],
        channels: Rc<RefCell<[f32; 2]>>,
    }

    impl AudioSession for StereoSession {
        fn pid(&self) -> u32 {
            300
        }

        fn process_name(&self) -> &str {
            "stereo"
        }

        fn volume(&self) -> SessionResult<f32> {
            let [left, right] = *self.channels.borrow();
            Ok((left + right) / 2.0)
        }

        fn set_volume(&self, volume: f32) -> SessionResult<()> {
            *self.channels.borrow_mut() = [volume, volume];
            Ok(())
        }

        fn restore_volume(&self, _original: f32) -> SessionResult<()> {
            *self.channels.borrow_mut() = self.listed;
            Ok(())
        }
    }

    #[test]
    fn test_restore_keeps_channel_balance() {
        let channels = Rc::new(RefCell::new([1.0, 0.5]));
        let stereo = StereoSession {
            listed: [1.0, 0.5],
            channels: Rc::clone(&channels),
        };

        let attenuation = attenuate_all(vec![Box::new(stereo)], 0.1);
        assert_eq!(*channels.borrow(), [0.1, 0.1]);
        assert_eq!(attenuation.reference_volume(), 0.75);

        assert!(attenuation.restore().is_complete());
        assert_eq!(*channels.borrow(), [1.0, 0.5]);
    }

    #[test]
    fn test_drop_restores() {
        let music = FakeSession::new(100, 0.9);
        {
            let _attenuation = attenuate_all(vec![music.boxed()], 0.2);
            assert_eq!(music.volume.get(), 0.2);
        }
        assert_eq!(music.volume.get(), 0.9);
    }

    #[test]
    fn test_restore_runs_once() {
        let music = FakeSession::new(100, 0.9);
        let attenuation = attenuate_all(vec![music.boxed()], 0.2);
        attenuation.restore();
        // One write to duck, one to restore, nothing from Drop
        assert_eq!(*music.writes.borrow(), vec![0.2, 0.9]);
    }

    #[test]
    fn test_restore_after_panic() {
        let music = FakeSession::new(100, 0.6);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _attenuation = attenuate_all(vec![music.boxed()], 0.1);
            panic!("playback blew up");
        }));
        assert!(result.is_err());
        assert_eq!(music.volume.get(), 0.6);
    }

    #[test]
    fn test_vanished_session_does_not_abort_restore() {
        let first = FakeSession::new(1, 0.5);
        let closed = FakeSession::new(2, 0.8);
        let last = FakeSession::new(3, 0.3);

        let attenuation = attenuate_all(vec![first.boxed(), closed.boxed(), last.boxed()], 0.05);
        closed.gone.set(true);

        let summary = attenuation.restore();
        assert_eq!(summary.restored, 2);
        assert_eq!(summary.failed, vec![2]);
        assert_eq!(first.volume.get(), 0.5);
        assert_eq!(last.volume.get(), 0.3);
    }

    #[test]
    fn test_unreadable_session_left_alone() {
        let mut broken = FakeSession::new(1, 0.5);
        broken.unreadable = true;
        let music = FakeSession::new(2, 0.4);

        let attenuation = attenuate_all(vec![broken.boxed(), music.boxed()], 0.1);
        assert_eq!(attenuation.snapshot().len(), 1);
        assert!(broken.writes.borrow().is_empty());
        // The reference comes from the first session that could be read
        assert_eq!(attenuation.reference_volume(), 0.4);
    }

    #[test]
    fn test_no_sessions_uses_default_reference() {
        let attenuation = attenuate_all(Vec::new(), 0.1);
        assert!(attenuation.snapshot().is_empty());
        assert_eq!(attenuation.reference_volume(), DEFAULT_CUE_VOLUME);
        assert_eq!(attenuation.restore(), RestoreSummary::default());
    }

    #[test]
    fn test_same_pid_sessions_each_restored() {
        let tab_a = FakeSession::new(42, 0.9);
        let tab_b = FakeSession::new(42, 0.5);

        let attenuation = attenuate_all(vec![tab_a.boxed(), tab_b.boxed()], 0.1);
        let summary = attenuation.restore();
        assert_eq!(summary.restored, 2);
        assert_eq!(tab_a.volume.get(), 0.9);
        assert_eq!(tab_b.volume.get(), 0.5);
    }
}
