use glam::{Mat4, Vec2, Vec3, Vec4};

/// World to screen mapping. Returns `None` for points the camera cannot see.
pub trait Projector {
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixProjector {
    matrix: Mat4,
    screen: Vec2,
}

/// Clip-space w below this is behind or too close to the camera plane.
const MIN_CLIP_W: f32 = 0.1;

impl MatrixProjector {
    pub fn new(matrix: Mat4, screen: Vec2) -> Self {
        Self { matrix, screen }
    }
}

impl Projector for MatrixProjector {
    fn world_to_screen(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.matrix * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w < MIN_CLIP_W {
            return None;
        }
        let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);
        let screen = Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.screen.x,
            (1.0 - ndc.y) * 0.5 * self.screen.y,
        );
        screen.is_finite().then_some(screen)
    }
}
