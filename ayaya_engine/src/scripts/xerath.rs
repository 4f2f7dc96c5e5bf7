//! Charge-up skillshot automation.
//!
//! Holding the activation key starts charging Q on the weakest enemy in
//! reach. Once the charge buff is up, the next move order of that enemy
//! triggers a release aimed at where it will be when the spear lands, as
//! long as that point is inside the current charge range.

use std::time::Duration;

use log::{debug, info};

use crate::display::DrawList;
use crate::input::{ActionOutcome, CastAction, KeyCode};
use crate::model::{Entity, EntityHandle};
use crate::script_host::{Capabilities, Manager, ScriptError, ScriptModule};
use crate::targeting::{
    evaluate, predict_position, select_lowest_health, Decision, RangeTable, RangeTableError,
};

pub const NAME: &str = "xerath";
pub const CHAMPION: &str = "Xerath";
pub const CHARGE_BUFF: &str = "XerathArcanopulseChargeUp";

const Q_SLOT: usize = 0;
const Q_COST: [f32; 5] = [80.0, 90.0, 100.0, 110.0, 120.0];
const ACTIVATION_KEY: KeyCode = KeyCode::XBUTTON1;
const RELEASE_KEY: KeyCode = KeyCode::N;
const SELECT_RANGE: f32 = 1450.0;
/// Seconds between release and impact.
const TRAVEL_TIME: f32 = 0.528;
const SETTLE: Duration = Duration::from_millis(3);
const CONFIRM: Duration = Duration::from_millis(10);

const CHARGE_RANGES: [(f32, f32); 8] = [
    (0.0, 736.0),
    (0.25, 837.0),
    (0.5, 940.0),
    (0.75, 1040.0),
    (1.0, 1143.0),
    (1.25, 1245.0),
    (1.5, 1347.0),
    (1.75, 1450.0),
];

const MARKER_POINTS: u32 = 10;
const MARKER_COLOR: u32 = 0xff00_00ff;
const MARKER_THICKNESS: f32 = 5.0;

pub struct XerathModule {
    ranges: RangeTable,
    target: Option<EntityHandle>,
    /// Why the last release attempt did not start, if it did not.
    skipped: Option<ActionOutcome>,
}

impl XerathModule {
    pub fn new() -> Result<Self, RangeTableError> {
        Ok(Self {
            ranges: RangeTable::new(CHARGE_RANGES.to_vec())?,
            target: None,
            skipped: None,
        })
    }

    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    pub fn skipped(&self) -> Option<&ActionOutcome> {
        self.skipped.as_ref()
    }
}

/// Mana needed for Q at `level`; `None` while the spell is unlearned.
fn q_cost(level: u8) -> Option<f32> {
    let index = usize::from(level).checked_sub(1)?;
    Q_COST.get(index.min(Q_COST.len() - 1)).copied()
}

impl ScriptModule for XerathModule {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            setup: true,
            tick: true,
            draw: true,
            move_create: true,
            missile_create: false,
        }
    }

    fn setup(&mut self) -> Result<(), ScriptError> {
        info!(
            "[ayaya_engine::scripts::xerath] loaded; charge range {}..{}",
            self.ranges.min_range(),
            self.ranges.max_range()
        );
        Ok(())
    }

    fn on_tick(&mut self, manager: &Manager<'_>, _tick: u64) -> Result<(), ScriptError> {
        let me = manager.me();
        if me.name != CHAMPION {
            return Ok(());
        }
        let input = manager.input();
        if input.is_key_pressed(RELEASE_KEY) {
            input.release_key(KeyCode::Q)?;
        }
        if !input.is_key_pressed(ACTIVATION_KEY) || me.buff(CHARGE_BUFF).is_some() {
            return Ok(());
        }

        let Some(q) = me.spell(Q_SLOT) else {
            return Ok(());
        };
        let Some(cost) = q_cost(q.level) else {
            return Ok(());
        };
        if !q.ready || me.mana <= cost || input.is_key_pressed(KeyCode::Q) {
            return Ok(());
        }

        let Some(target) = select_lowest_health(manager.enemies(), me, SELECT_RANGE) else {
            return Ok(());
        };
        if input.press_key(KeyCode::Q)? {
            debug!(
                "[ayaya_engine::scripts::xerath] charging at {} ({})",
                target.name, target.handle
            );
            self.target = Some(target.handle);
        }
        Ok(())
    }

    fn on_draw(&mut self, draw: &mut DrawList, manager: &Manager<'_>) -> Result<(), ScriptError> {
        let Some(handle) = self.target else {
            return Ok(());
        };
        if let Some(target) = manager.snapshot().enemy(handle) {
            draw.circle(
                target.world_pos,
                target.bounding_radius / 2.0,
                MARKER_POINTS,
                MARKER_COLOR,
                MARKER_THICKNESS,
            );
        }
        Ok(())
    }

    fn on_move_create(&mut self, actor: &Entity, manager: &Manager<'_>) -> Result<(), ScriptError> {
        let me = manager.me();
        if me.name != CHAMPION || self.target != Some(actor.handle) {
            return Ok(());
        }
        let Some(charge) = me.buff(CHARGE_BUFF).filter(|buff| buff.count >= 1) else {
            return Ok(());
        };

        let charged_for = manager.game_time()? - charge.start_time;
        let range = self.ranges.range_at(charged_for);
        let predicted = predict_position(
            actor.world_pos,
            actor.path_end(),
            actor.movement_speed,
            TRAVEL_TIME,
        );
        if let Decision::OutOfRange { distance, range, .. } = evaluate(me.world_pos, predicted, range) {
            debug!(
                "[ayaya_engine::scripts::xerath] {} out of reach ({distance:.0} > {range:.0})",
                actor.handle
            );
            self.skipped = Some(ActionOutcome::AbortedOutOfRange { distance, range });
            return Ok(());
        }

        let Some(aim) = manager.projector().world_to_screen(predicted) else {
            debug!("[ayaya_engine::scripts::xerath] predicted point is off screen");
            return Ok(());
        };
        let action = CastAction {
            key: KeyCode::Q,
            target: aim,
            settle: SETTLE,
            confirm: CONFIRM,
        };
        match manager.input().submit(NAME, action) {
            Ok(_) => {
                self.target = None;
                self.skipped = None;
            }
            Err(outcome) => {
                debug!("[ayaya_engine::scripts::xerath] release not started: {outcome:?}");
                self.skipped = Some(outcome);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::input_bridge::DeviceCall;
    use crate::model::fixtures::champion;
    use crate::model::{Buff, MovementPath, TeamId};
    use crate::scripts::testing::Stage;

    fn xerath() -> Entity {
        champion(1, CHAMPION, TeamId::ORDER)
    }

    fn charging_xerath(start_time: f32) -> Entity {
        let mut me = xerath();
        me.buffs.push(Buff {
            name: CHARGE_BUFF.to_string(),
            start_time,
            count: 1,
        });
        me
    }

    fn walker(handle: u64, x: f32) -> Entity {
        let mut enemy = champion(handle, "Annie", TeamId::CHAOS);
        enemy.world_pos = Vec3::new(x, 0.0, 0.0);
        enemy.path = Some(MovementPath {
            end: Vec3::new(x + 1000.0, 0.0, 0.0),
        });
        enemy
    }

    #[test]
    fn q_cost_follows_spell_level() {
        assert_eq!(q_cost(0), None);
        assert_eq!(q_cost(1), Some(80.0));
        assert_eq!(q_cost(5), Some(120.0));
        assert_eq!(q_cost(9), Some(120.0));
    }

    #[test]
    fn activation_key_charges_on_weakest_enemy_in_reach() {
        let mut healthy = champion(2, "Annie", TeamId::CHAOS);
        healthy.health = 600.0;
        let mut wounded = champion(3, "Lux", TeamId::CHAOS);
        wounded.health = 250.0;
        let mut distant = champion(4, "Ezreal", TeamId::CHAOS);
        distant.health = 10.0;
        distant.screen_pos = Vec2::new(5000.0, 540.0);
        let stage = Stage::new(xerath(), vec![healthy, wounded, distant], 1.0);
        stage.device.hold_key(ACTIVATION_KEY, true);

        let mut module = XerathModule::new().unwrap();
        module.on_tick(&stage.manager(), 1).unwrap();

        assert_eq!(module.target(), Some(EntityHandle(3)));
        assert_eq!(stage.device.calls(), vec![DeviceCall::PressKey(KeyCode::Q)]);
    }

    #[test]
    fn tick_stays_idle_without_the_activation_key_or_while_charging() {
        let stage = Stage::new(xerath(), vec![champion(2, "Annie", TeamId::CHAOS)], 1.0);
        let mut module = XerathModule::new().unwrap();
        module.on_tick(&stage.manager(), 1).unwrap();
        assert!(stage.device.calls().is_empty());

        let stage = Stage::new(charging_xerath(0.5), vec![champion(2, "Annie", TeamId::CHAOS)], 1.0);
        stage.device.hold_key(ACTIVATION_KEY, true);
        module.on_tick(&stage.manager(), 2).unwrap();
        assert!(stage.device.calls().is_empty());
        assert_eq!(module.target(), None);
    }

    #[test]
    fn other_champions_are_ignored() {
        let stage = Stage::new(
            champion(1, "Annie", TeamId::ORDER),
            vec![champion(2, "Lux", TeamId::CHAOS)],
            1.0,
        );
        stage.device.hold_key(ACTIVATION_KEY, true);
        let mut module = XerathModule::new().unwrap();
        module.on_tick(&stage.manager(), 1).unwrap();
        assert!(stage.device.calls().is_empty());
    }

    #[test]
    fn release_key_lets_go_of_q() {
        let stage = Stage::solo(CHAMPION);
        stage.device.hold_key(RELEASE_KEY, true);
        let mut module = XerathModule::new().unwrap();
        module.on_tick(&stage.manager(), 1).unwrap();
        assert_eq!(stage.device.calls(), vec![DeviceCall::ReleaseKey(KeyCode::Q)]);
    }

    #[test]
    fn remembered_target_is_marked() {
        let stage = Stage::new(xerath(), vec![walker(2, 500.0)], 1.0);
        let mut module = XerathModule::new().unwrap();
        module.target = Some(EntityHandle(2));

        let mut draw = DrawList::new();
        module.on_draw(&mut draw, &stage.manager()).unwrap();
        assert_eq!(draw.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn move_order_inside_charge_range_releases_at_prediction() {
        // One second of charge reaches 1143; the walker lands at ~680.
        let stage = Stage::new(charging_xerath(0.0), vec![walker(2, 500.0)], 1.0);
        stage.device.hold_key(KeyCode::Q, true);
        let mut module = XerathModule::new().unwrap();
        module.target = Some(EntityHandle(2));
        let actor = stage.snapshot.enemies[0].clone();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                module.on_move_create(&actor, &stage.manager()).unwrap();
                assert!(stage.input.is_leased());
                stage.input.wait_idle().await;
            })
            .await;

        assert_eq!(module.target(), None);
        let calls = stage.device.calls();
        assert!(calls.contains(&DeviceCall::ReleaseKey(KeyCode::Q)));
        assert_eq!(calls.last(), Some(&DeviceCall::BlockRawInput(false)));
        assert!(!stage.device.is_blocked());
    }

    #[test]
    fn move_order_beyond_charge_range_waits_for_the_next_one() {
        let stage = Stage::new(charging_xerath(0.0), vec![walker(2, 1100.0)], 1.0);
        let mut module = XerathModule::new().unwrap();
        module.target = Some(EntityHandle(2));
        let actor = stage.snapshot.enemies[0].clone();

        module.on_move_create(&actor, &stage.manager()).unwrap();
        assert!(stage.device.calls().is_empty());
        assert_eq!(module.target(), Some(EntityHandle(2)));
        assert!(matches!(
            module.skipped(),
            Some(ActionOutcome::AbortedOutOfRange { range, .. }) if *range == 1143.0
        ));
    }

    #[test]
    fn busy_device_declines_and_keeps_the_target() {
        let stage = Stage::new(charging_xerath(0.0), vec![walker(2, 500.0)], 1.0);
        let _held = stage.input.try_acquire("other").unwrap();
        let mut module = XerathModule::new().unwrap();
        module.target = Some(EntityHandle(2));
        let actor = stage.snapshot.enemies[0].clone();

        module.on_move_create(&actor, &stage.manager()).unwrap();
        assert!(stage.device.calls().is_empty());
        assert_eq!(module.target(), Some(EntityHandle(2)));
        assert_eq!(
            module.skipped(),
            Some(&ActionOutcome::Declined {
                held_by: "other".to_string()
            })
        );
    }

    #[test]
    fn unrelated_movers_are_ignored() {
        let stage = Stage::new(charging_xerath(0.0), vec![walker(2, 500.0), walker(3, 400.0)], 1.0);
        let mut module = XerathModule::new().unwrap();
        module.target = Some(EntityHandle(2));
        let other = stage.snapshot.enemies[1].clone();

        module.on_move_create(&other, &stage.manager()).unwrap();
        assert!(!stage.input.is_leased());
        assert_eq!(module.target(), Some(EntityHandle(2)));
    }
}
