use std::{cell::RefCell, rc::Rc};

use ayaya_stream::{DrawCommand, PerformanceSample, RenderSnapshot};
use glam::Vec3;

use crate::projection::Projector;
use crate::snapshot::Snapshot;

/// Outbound channel to whatever surface draws the overlay. Fire-and-forget.
pub trait DisplaySink {
    fn publish(&self, snapshot: RenderSnapshot);
}

pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn publish(&self, _snapshot: RenderSnapshot) {}
}

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    published: Rc<RefCell<Vec<RenderSnapshot>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<RenderSnapshot> {
        self.published.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.published.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.borrow().is_empty()
    }
}

impl DisplaySink for RecordingDisplay {
    fn publish(&self, snapshot: RenderSnapshot) {
        self.published.borrow_mut().push(snapshot);
    }
}

/// Primitives collected from the draw hooks for one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, color: u32) {
        self.commands.push(DrawCommand::Text {
            text: text.into(),
            x,
            y,
            size,
            color,
        });
    }

    pub fn circle(&mut self, center: Vec3, radius: f32, points: u32, color: u32, thickness: f32) {
        self.commands.push(DrawCommand::Circle {
            center: center.to_array(),
            radius,
            points,
            color,
            thickness,
        });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Builds the overlay payload for one tick. `seq` and `host_time_ns` are
/// stamped by the transport.
pub fn render_snapshot(
    snapshot: &Snapshot,
    performance: PerformanceSample,
    draw: DrawList,
    projector: &dyn Projector,
) -> RenderSnapshot {
    RenderSnapshot {
        seq: 0,
        host_time_ns: 0,
        tick: snapshot.tick,
        me: snapshot.me.to_render(),
        enemy_champions: snapshot.enemies.iter().map(|e| e.to_render()).collect(),
        missiles: snapshot
            .missiles
            .iter()
            .map(|missile| {
                let mut render = missile.to_render();
                render.start_screen = projector.world_to_screen(missile.start).map(|p| p.to_array());
                render.end_screen = projector.world_to_screen(missile.end).map(|p| p.to_array());
                render
            })
            .collect(),
        performance,
        screen: snapshot.screen_size.to_array(),
        matrix: snapshot.projection.to_cols_array(),
        draw: draw.into_commands(),
    }
}
