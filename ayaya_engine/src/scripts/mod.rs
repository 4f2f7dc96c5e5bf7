//! Modules compiled into the engine.

pub mod core;
pub mod xerath;

use crate::script_host::ScriptModule;
use crate::targeting::RangeTableError;

/// The built-in modules in load order.
pub fn builtin() -> Result<Vec<Box<dyn ScriptModule>>, RangeTableError> {
    let modules: Vec<Box<dyn ScriptModule>> = vec![
        Box::new(self::core::CoreModule::new()),
        Box::new(self::xerath::XerathModule::new()?),
    ];
    Ok(modules)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::rc::Rc;

    use glam::{Mat4, Vec2};

    use crate::cache::{CacheKey, CacheValue, StateCache};
    use crate::input::InputArbiter;
    use crate::input_bridge::RecordingInputDevice;
    use crate::model::fixtures::champion;
    use crate::model::{Entity, TeamId};
    use crate::projection::MatrixProjector;
    use crate::script_host::Manager;
    use crate::settings::Settings;
    use crate::snapshot::Snapshot;

    /// Everything a hook needs, owned in one place so tests can borrow a `Manager`.
    pub(crate) struct Stage {
        pub(crate) snapshot: Snapshot,
        pub(crate) cache: StateCache,
        pub(crate) device: RecordingInputDevice,
        pub(crate) input: InputArbiter,
        pub(crate) projector: MatrixProjector,
        pub(crate) settings: Settings,
    }

    impl Stage {
        pub(crate) fn new(me: Entity, enemies: Vec<Entity>, clock: f32) -> Self {
            let screen = Vec2::new(1920.0, 1080.0);
            let mut cache = StateCache::new();
            cache.begin_tick(1);
            cache.set(CacheKey::GameTime, CacheValue::Seconds(clock));
            cache.set(CacheKey::ScreenSize, CacheValue::Size(screen));
            cache.set(CacheKey::ViewProjection, CacheValue::Matrix(Mat4::IDENTITY));
            let device = RecordingInputDevice::new();
            Self {
                snapshot: Snapshot {
                    tick: 1,
                    local_team: me.team,
                    opposing_team: me.team.opposing().unwrap_or(TeamId::CHAOS),
                    me,
                    enemies,
                    missiles: Vec::new(),
                    clock,
                    projection: Mat4::IDENTITY,
                    screen_size: screen,
                },
                cache,
                input: InputArbiter::new(Rc::new(device.clone())),
                device,
                projector: MatrixProjector::new(Mat4::IDENTITY, screen),
                settings: Settings::default(),
            }
        }

        pub(crate) fn solo(name: &str) -> Self {
            Self::new(champion(1, name, TeamId::ORDER), Vec::new(), 1.0)
        }

        pub(crate) fn manager(&self) -> Manager<'_> {
            Manager::new(
                &self.snapshot,
                &self.cache,
                &self.input,
                &self.projector,
                &self.settings,
            )
        }
    }
}
