use std::fs;
use std::io;
use std::path::Path;

use glam::Vec2;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::{Entity, GameEvent, Missile};

/// One coherent read of the game process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub local: Entity,
    #[serde(default)]
    pub adversaries: Vec<Entity>,
    #[serde(default)]
    pub missiles: Vec<Missile>,
    pub clock: f32,
    /// Row-major view-projection matrix as laid out in game memory.
    pub projection: [f32; 16],
    pub screen_size: Vec2,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("game process is not attached")]
    Detached,
    #[error("inconsistent read: {0}")]
    Inconsistent(String),
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("dump decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of snapshots. Attaching to and decoding the live process lives
/// behind this trait.
pub trait ProcessReader {
    fn read_snapshot(&mut self) -> Result<RawSnapshot, ReadError>;
}

impl<R: ProcessReader + ?Sized> ProcessReader for Box<R> {
    fn read_snapshot(&mut self) -> Result<RawSnapshot, ReadError> {
        (**self).read_snapshot()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpFrame {
    #[serde(flatten)]
    pub snapshot: RawSnapshot,
    #[serde(default)]
    pub events: Vec<GameEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDump {
    pub frames: Vec<DumpFrame>,
}

/// Replays a recorded dump one frame per read, holding on the last frame.
pub struct DumpReader {
    frames: Vec<DumpFrame>,
    cursor: usize,
    forwarded: usize,
    events: Option<UnboundedSender<GameEvent>>,
}

impl DumpReader {
    pub fn from_path(path: &Path) -> Result<Self, ReadError> {
        let text = fs::read_to_string(path)?;
        let dump: SnapshotDump = serde_json::from_str(&text)?;
        Self::from_frames(dump.frames)
    }

    pub fn from_frames(frames: Vec<DumpFrame>) -> Result<Self, ReadError> {
        if frames.is_empty() {
            return Err(ReadError::Inconsistent("dump contains no frames".to_string()));
        }
        Ok(Self {
            frames,
            cursor: 0,
            forwarded: 0,
            events: None,
        })
    }

    /// Forward each frame's recorded events to `sink` the first time the frame is read.
    pub fn with_event_sink(mut self, sink: UnboundedSender<GameEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}

impl ProcessReader for DumpReader {
    fn read_snapshot(&mut self) -> Result<RawSnapshot, ReadError> {
        let frame = self.frames.get(self.cursor).ok_or(ReadError::Detached)?;
        let snapshot = frame.snapshot.clone();

        if self.forwarded <= self.cursor {
            if let Some(sink) = self.events.as_ref() {
                for event in &frame.events {
                    if sink.send(event.clone()).is_err() {
                        debug!("[ayaya_engine::adapter] event receiver closed; dropping {}", event.label());
                    }
                }
            }
            self.forwarded = self.cursor + 1;
        }

        if self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
        }
        Ok(snapshot)
    }
}
