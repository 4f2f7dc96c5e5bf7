use std::fmt;

use ayaya_stream::{RenderBuff, RenderEntity, RenderMissile};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Stable address of an object inside the game process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

impl TeamId {
    pub const ORDER: TeamId = TeamId(100);
    pub const CHAOS: TeamId = TeamId(200);

    /// The other side of the map, or `None` for ids the game never hands to a player.
    pub fn opposing(self) -> Option<TeamId> {
        match self {
            TeamId::ORDER => Some(TeamId::CHAOS),
            TeamId::CHAOS => Some(TeamId::ORDER),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub name: String,
    pub start_time: f32,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub level: u8,
    pub ready: bool,
}

/// Where an actor was last ordered to walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementPath {
    pub end: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub handle: EntityHandle,
    pub name: String,
    pub team: TeamId,
    pub screen_pos: Vec2,
    pub world_pos: Vec3,
    pub bounding_radius: f32,
    pub health: f32,
    #[serde(default)]
    pub max_health: f32,
    #[serde(default)]
    pub mana: f32,
    pub movement_speed: f32,
    #[serde(default)]
    pub attack_range: f32,
    #[serde(default)]
    pub spells: Vec<Spell>,
    #[serde(default)]
    pub buffs: Vec<Buff>,
    #[serde(default)]
    pub path: Option<MovementPath>,
}

impl Entity {
    pub fn buff(&self, name: &str) -> Option<&Buff> {
        self.buffs.iter().find(|buff| buff.name == name)
    }

    pub fn spell(&self, slot: usize) -> Option<&Spell> {
        self.spells.get(slot)
    }

    /// Destination of the current move order; a standing actor is its own destination.
    pub fn path_end(&self) -> Vec3 {
        self.path.map(|path| path.end).unwrap_or(self.world_pos)
    }

    pub fn is_finite(&self) -> bool {
        let scalars = [
            self.bounding_radius,
            self.health,
            self.max_health,
            self.mana,
            self.movement_speed,
            self.attack_range,
        ];
        self.screen_pos.is_finite()
            && self.world_pos.is_finite()
            && scalars.iter().all(|value| value.is_finite())
            && self.path.map_or(true, |path| path.end.is_finite())
    }

    pub fn to_render(&self) -> RenderEntity {
        RenderEntity {
            handle: self.handle.0,
            name: self.name.clone(),
            team: self.team.0,
            screen_pos: self.screen_pos.to_array(),
            world_pos: self.world_pos.to_array(),
            bounding_radius: self.bounding_radius,
            health: self.health,
            max_health: self.max_health,
            mana: self.mana,
            path_end: self.path.map(|path| path.end.to_array()),
            buffs: self
                .buffs
                .iter()
                .map(|buff| RenderBuff {
                    name: buff.name.clone(),
                    count: buff.count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Missile {
    pub handle: EntityHandle,
    pub name: String,
    pub source: EntityHandle,
    pub start: Vec3,
    pub end: Vec3,
    pub created_at: f32,
}

impl Missile {
    pub fn to_render(&self) -> RenderMissile {
        RenderMissile {
            handle: self.handle.0,
            name: self.name.clone(),
            source: self.source.0,
            start: self.start.to_array(),
            end: self.end.to_array(),
            start_screen: None,
            end_screen: None,
        }
    }
}

/// Discrete happenings observed between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    MoveCreate { actor: Entity },
    MissileCreate { missile: Missile },
}

impl GameEvent {
    pub fn label(&self) -> String {
        match self {
            GameEvent::MoveCreate { actor } => format!("move_create {}", actor.handle),
            GameEvent::MissileCreate { missile } => {
                format!("missile_create {} from {}", missile.name, missile.source)
            }
        }
    }
}
