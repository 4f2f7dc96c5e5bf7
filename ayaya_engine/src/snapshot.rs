use std::collections::BTreeSet;

use glam::{Mat4, Vec2};

use crate::adapter::{ProcessReader, RawSnapshot, ReadError};
use crate::cache::{CacheKey, CacheValue, StateCache};
use crate::model::{Entity, EntityHandle, Missile, TeamId};

/// The coherent world view handed to modules for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub me: Entity,
    pub enemies: Vec<Entity>,
    pub missiles: Vec<Missile>,
    pub clock: f32,
    pub local_team: TeamId,
    pub opposing_team: TeamId,
    pub projection: Mat4,
    pub screen_size: Vec2,
}

impl Snapshot {
    pub fn enemy(&self, handle: EntityHandle) -> Option<&Entity> {
        self.enemies.iter().find(|entity| entity.handle == handle)
    }
}

/// Pulls one read from the adapter, validates it, and publishes the derived
/// globals into the state cache.
///
/// Validation happens before any cache write, so a rejected read leaves the
/// cache exactly as the previous successful tick left it.
pub fn build_snapshot<R>(
    reader: &mut R,
    cache: &mut StateCache,
    tick: u64,
) -> Result<Snapshot, ReadError>
where
    R: ProcessReader + ?Sized,
{
    let raw = reader.read_snapshot()?;
    let snapshot = validate(raw, tick)?;

    cache.begin_tick(tick);
    cache.set(CacheKey::ScreenSize, CacheValue::Size(snapshot.screen_size));
    cache.set(CacheKey::ViewProjection, CacheValue::Matrix(snapshot.projection));
    cache.set(CacheKey::GameTime, CacheValue::Seconds(snapshot.clock));
    cache.set(CacheKey::LocalTeam, CacheValue::Team(snapshot.local_team));
    cache.set(CacheKey::OpposingTeam, CacheValue::Team(snapshot.opposing_team));

    Ok(snapshot)
}

fn validate(raw: RawSnapshot, tick: u64) -> Result<Snapshot, ReadError> {
    let RawSnapshot {
        local,
        adversaries,
        missiles,
        clock,
        projection,
        screen_size,
    } = raw;

    let local_team = local.team;
    let opposing_team = local_team.opposing().ok_or_else(|| {
        ReadError::Inconsistent(format!("local actor reports unknown team {}", local_team.0))
    })?;

    if !clock.is_finite() || clock < 0.0 {
        return Err(ReadError::Inconsistent(format!("game clock {clock} is not valid")));
    }
    if !screen_size.is_finite() || screen_size.x <= 0.0 || screen_size.y <= 0.0 {
        return Err(ReadError::Inconsistent(format!(
            "screen size {screen_size} is not valid"
        )));
    }
    if projection.iter().any(|value| !value.is_finite()) {
        return Err(ReadError::Inconsistent(
            "view-projection matrix contains non-finite values".to_string(),
        ));
    }
    if !local.is_finite() {
        return Err(ReadError::Inconsistent("local actor position is not finite".to_string()));
    }

    let mut seen = BTreeSet::new();
    seen.insert(local.handle);
    for entity in &adversaries {
        if !seen.insert(entity.handle) {
            return Err(ReadError::Inconsistent(format!(
                "entity {} appears twice in one read",
                entity.handle
            )));
        }
        if !entity.is_finite() {
            return Err(ReadError::Inconsistent(format!(
                "entity {} has non-finite state",
                entity.handle
            )));
        }
    }

    let enemies = adversaries
        .into_iter()
        .filter(|entity| entity.team == opposing_team)
        .collect();

    Ok(Snapshot {
        tick,
        me: local,
        enemies,
        missiles,
        clock,
        local_team,
        opposing_team,
        // Game memory is row-major for row vectors; as glam columns it multiplies column vectors.
        projection: Mat4::from_cols_array(&projection),
        screen_size,
    })
}
