use log::info;

use crate::display::DrawList;
use crate::script_host::{Capabilities, Manager, ScriptError, ScriptModule};

pub const NAME: &str = "core";
pub const SHOW_PLAYER_RANGE: &str = "show.player.range";
pub const SHOW_DISCORD: &str = "show.discord";

const DISCORD_TEXT: &str = "Join the AyayaLeague discord: https://discord.gg/qYy8Qz4Cr5";
const DISCORD_X: f32 = 20.0;
const DISCORD_Y: f32 = 35.0;
const DISCORD_SIZE: f32 = 26.0;
const DISCORD_COLOR: u32 = 255;

const RANGE_RADIUS: f32 = 50.0;
const RANGE_POINTS: u32 = 200;
const RANGE_COLOR: u32 = 0xffff_ffff;
const RANGE_THICKNESS: f32 = 2.0;

/// Always-on overlay helpers.
#[derive(Debug, Default)]
pub struct CoreModule;

impl CoreModule {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptModule for CoreModule {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            setup: true,
            draw: true,
            ..Capabilities::none()
        }
    }

    fn setup(&mut self) -> Result<(), ScriptError> {
        info!("[ayaya_engine::scripts::core] core loaded");
        Ok(())
    }

    fn on_draw(&mut self, draw: &mut DrawList, manager: &Manager<'_>) -> Result<(), ScriptError> {
        // On unless the user turned it off.
        if manager.setting_enabled(NAME, SHOW_DISCORD).unwrap_or(true) {
            draw.text(DISCORD_TEXT, DISCORD_X, DISCORD_Y, DISCORD_SIZE, DISCORD_COLOR);
        }
        if manager.setting_enabled(NAME, SHOW_PLAYER_RANGE).unwrap_or(false) {
            draw.circle(
                manager.me().world_pos,
                RANGE_RADIUS,
                RANGE_POINTS,
                RANGE_COLOR,
                RANGE_THICKNESS,
            );
        }
        Ok(())
    }
}
