//! PulseAudio / PipeWire sessions via `pactl`
//!
//! Works on native PulseAudio and on PipeWire through `pipewire-pulse`.
//! Each playback stream ("sink input") is one session.

use std::collections::HashMap;
use std::process::Command;

use serde::Deserialize;
use sysinfo::{Pid, System};
use tracing::{debug, trace};

use super::{AudioSession, SessionSource};
use crate::error::{SessionError, SessionResult};

const PACTL: &str = "pactl";

/// Raw volume that PulseAudio treats as 100%
const PA_VOLUME_NORM: f32 = 65536.0;

/// Audio server and helper processes that are never ducked
pub const IGNORED_PROCESSES: &[&str] = &[
    "pulseaudio",
    "pipewire",
    "pipewire-pulse",
    "wireplumber",
    "speech-dispatcher",
    "cue-player",
];

/// Sink input entry of `pactl --format=json list sink-inputs`
#[derive(Debug, Clone, Deserialize)]
struct SinkInputEntry {
    index: u32,
    #[serde(default)]
    corked: bool,
    #[serde(default)]
    channel_map: Option<String>,
    #[serde(default)]
    volume: HashMap<String, ChannelVolume>,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelVolume {
    value: u32,
}

/// An uncorked playback stream owned by another application
#[derive(Debug, Clone, PartialEq)]
pub struct SinkInput {
    /// Sink input index, used to address the stream
    pub index: u32,
    /// Owning process id
    pub pid: u32,
    /// Owning process name
    pub process_name: String,
    /// Mean channel volume, 1.0 is 100%
    pub volume: f32,
    /// Raw per-channel volumes in channel map order, empty when the listing
    /// has no usable channel map
    pub channels: Vec<u32>,
}

impl SinkInputEntry {
    fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn pid(&self) -> Option<u32> {
        self.property("application.process.id")?.parse().ok()
    }

    fn mean_volume(&self) -> f32 {
        if self.volume.is_empty() {
            return 1.0;
        }
        let sum: f32 = self.volume.values().map(|ch| ch.value as f32).sum();
        sum / self.volume.len() as f32 / PA_VOLUME_NORM
    }

    /// Raw channel volumes ordered by the channel map
    fn channel_volumes(&self) -> Vec<u32> {
        let Some(map) = self.channel_map.as_deref() else {
            return Vec::new();
        };
        map.split(',')
            .map(|channel| self.volume.get(channel.trim()).map(|ch| ch.value))
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default()
    }
}

/// Parse a JSON sink input listing into the sessions worth ducking
///
/// Corked streams, streams without a process id, streams owned by
/// `own_pid` and streams of [`IGNORED_PROCESSES`] are left out. When the
/// listing has no binary name, `lookup_name` is asked for one by pid.
pub fn parse_sink_inputs(
    json: &str,
    own_pid: u32,
    mut lookup_name: impl FnMut(u32) -> Option<String>,
) -> SessionResult<Vec<SinkInput>> {
    let entries: Vec<SinkInputEntry> =
        serde_json::from_str(json).map_err(|e| SessionError::Malformed(e.to_string()))?;

    let mut inputs = Vec::new();
    for entry in entries {
        if entry.corked {
            trace!(index = entry.index, "Skipping corked stream");
            continue;
        }
        let Some(pid) = entry.pid() else {
            trace!(index = entry.index, "Skipping stream without a process id");
            continue;
        };
        if pid == own_pid {
            continue;
        }

        let process_name = entry
            .property("application.process.binary")
            .or_else(|| lookup_name(pid))
            .or_else(|| entry.property("application.name"))
            .unwrap_or_else(|| "unknown".to_string());

        if IGNORED_PROCESSES.contains(&process_name.as_str()) {
            trace!(process = %process_name, "Skipping ignored process");
            continue;
        }

        inputs.push(SinkInput {
            index: entry.index,
            pid,
            volume: entry.mean_volume(),
            channels: entry.channel_volumes(),
            process_name,
        });
    }
    Ok(inputs)
}

/// Session source backed by the `pactl` command line tool
#[derive(Debug, Clone, Default)]
pub struct PulseAudio;

impl PulseAudio {
    /// Create a source that shells out to `pactl`
    pub fn new() -> Self {
        Self
    }

    /// Whether `pactl` can be run
    pub fn is_available() -> bool {
        Command::new(PACTL)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// All uncorked sink inputs of other applications
    pub fn sink_inputs(&self) -> SessionResult<Vec<SinkInput>> {
        let stdout = run_pactl(&["--format=json", "list", "sink-inputs"])?;
        let json = String::from_utf8_lossy(&stdout);

        let mut system = System::new();
        parse_sink_inputs(&json, std::process::id(), |pid| {
            let pid = Pid::from_u32(pid);
            system.refresh_process(pid);
            system.process(pid).map(|p| p.name().to_string())
        })
    }
}

impl SessionSource for PulseAudio {
    fn active_sessions(&self) -> SessionResult<Vec<Box<dyn AudioSession>>> {
        let inputs = self.sink_inputs()?;
        debug!(count = inputs.len(), "Active audio sessions");
        Ok(inputs
            .into_iter()
            .map(|input| Box::new(input) as Box<dyn AudioSession>)
            .collect())
    }
}

impl AudioSession for SinkInput {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Volume reported when the session was listed
    fn volume(&self) -> SessionResult<f32> {
        Ok(self.volume)
    }

    fn set_volume(&self, volume: f32) -> SessionResult<()> {
        let raw = (volume.clamp(0.0, 1.0) * PA_VOLUME_NORM).round() as u32;
        self.apply_raw_volume(&[raw])
    }

    /// Put back the per-channel volumes seen in the listing
    ///
    /// Falls back to setting every channel to `original` when the channel
    /// layout was not reported.
    fn restore_volume(&self, original: f32) -> SessionResult<()> {
        if self.channels.is_empty() {
            return self.set_volume(original);
        }
        self.apply_raw_volume(&self.channels)
    }
}

impl SinkInput {
    /// Arguments of `pactl set-sink-input-volume` for raw channel values
    fn volume_args(&self, raw: &[u32]) -> Vec<String> {
        let mut args = vec!["set-sink-input-volume".to_string(), self.index.to_string()];
        args.extend(raw.iter().map(u32::to_string));
        args
    }

    fn apply_raw_volume(&self, raw: &[u32]) -> SessionResult<()> {
        let args = self.volume_args(raw);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_pactl(&args)
            .map(|_| ())
            .map_err(|e| match e {
                SessionError::CommandFailed { ref stderr, .. }
                    if stderr.contains("No such entity") =>
                {
                    SessionError::Vanished(self.pid)
                }
                other => other,
            })
    }
}

fn run_pactl(args: &[&str]) -> SessionResult<Vec<u8>> {
    let output = Command::new(PACTL)
        .args(args)
        .output()
        .map_err(|source| SessionError::Spawn {
            program: PACTL,
            source,
        })?;

    if !output.status.success() {
        return Err(SessionError::CommandFailed {
            program: PACTL,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
