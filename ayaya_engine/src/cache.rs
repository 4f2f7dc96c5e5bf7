use std::collections::BTreeMap;

use glam::{Mat4, Vec2};

use crate::model::TeamId;

/// Globals every module may read during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    ScreenSize,
    ViewProjection,
    GameTime,
    LocalTeam,
    OpposingTeam,
}

impl CacheKey {
    pub const ALL: [CacheKey; 5] = [
        CacheKey::ScreenSize,
        CacheKey::ViewProjection,
        CacheKey::GameTime,
        CacheKey::LocalTeam,
        CacheKey::OpposingTeam,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheValue {
    Size(Vec2),
    Matrix(Mat4),
    Seconds(f32),
    Team(TeamId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub value: CacheValue,
    pub tick: u64,
}

/// Keyed values valid for exactly one tick.
///
/// The snapshot builder overwrites every key before modules are dispatched,
/// so `get` performs no staleness check of its own. `entry` exposes the tick
/// stamp for callers that want to verify freshness.
#[derive(Debug, Default)]
pub struct StateCache {
    current_tick: u64,
    entries: BTreeMap<CacheKey, CacheEntry>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn set(&mut self, key: CacheKey, value: CacheValue) -> Option<CacheValue> {
        self.entries
            .insert(
                key,
                CacheEntry {
                    value,
                    tick: self.current_tick,
                },
            )
            .map(|previous| previous.value)
    }

    pub fn get(&self, key: CacheKey) -> Option<CacheValue> {
        self.entries.get(&key).map(|entry| entry.value)
    }

    pub fn entry(&self, key: CacheKey) -> Option<&CacheEntry> {
        self.entries.get(&key)
    }

    pub fn is_fresh(&self, key: CacheKey) -> bool {
        self.entries
            .get(&key)
            .is_some_and(|entry| entry.tick == self.current_tick)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn screen_size(&self) -> Option<Vec2> {
        match self.get(CacheKey::ScreenSize)? {
            CacheValue::Size(size) => Some(size),
            _ => None,
        }
    }

    pub fn view_projection(&self) -> Option<Mat4> {
        match self.get(CacheKey::ViewProjection)? {
            CacheValue::Matrix(matrix) => Some(matrix),
            _ => None,
        }
    }

    pub fn game_time(&self) -> Option<f32> {
        match self.get(CacheKey::GameTime)? {
            CacheValue::Seconds(seconds) => Some(seconds),
            _ => None,
        }
    }

    pub fn local_team(&self) -> Option<TeamId> {
        self.team(CacheKey::LocalTeam)
    }

    pub fn opposing_team(&self) -> Option<TeamId> {
        self.team(CacheKey::OpposingTeam)
    }

    fn team(&self, key: CacheKey) -> Option<TeamId> {
        match self.get(key)? {
            CacheValue::Team(team) => Some(team),
            _ => None,
        }
    }
}
