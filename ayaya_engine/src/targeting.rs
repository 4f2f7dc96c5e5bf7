//! Intercept and range math for actions that land some time after the
//! decision to take them. Everything here is pure.

use glam::Vec3;
use thiserror::Error;

use crate::model::Entity;

/// Where a target walking towards `endpoint` will be after `travel_time` seconds.
///
/// A target already standing on its endpoint stays where it is.
pub fn predict_position(position: Vec3, endpoint: Vec3, speed: f32, travel_time: f32) -> Vec3 {
    let direction = (endpoint - position).normalize_or_zero();
    position + direction * (speed * travel_time)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Proceed { predicted: Vec3, distance: f32 },
    OutOfRange { predicted: Vec3, distance: f32, range: f32 },
}

impl Decision {
    pub fn proceeds(&self) -> bool {
        matches!(self, Decision::Proceed { .. })
    }

    pub fn predicted(&self) -> Vec3 {
        match *self {
            Decision::Proceed { predicted, .. } | Decision::OutOfRange { predicted, .. } => predicted,
        }
    }
}

/// Abort when the predicted landing point is farther from the actor than `range`.
pub fn evaluate(actor: Vec3, predicted: Vec3, range: f32) -> Decision {
    let distance = predicted.distance(actor);
    let reachable = distance <= range;
    if !reachable {
        Decision::OutOfRange {
            predicted,
            distance,
            range,
        }
    } else {
        Decision::Proceed {
            predicted,
            distance,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RangeTableError {
    #[error("range table needs at least one breakpoint")]
    Empty,
    #[error("breakpoint times must be finite and strictly increasing (at index {0})")]
    Unordered(usize),
}

/// `(elapsed, range)` breakpoints for an ability whose reach grows while charging.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTable {
    breakpoints: Vec<(f32, f32)>,
    max_range: f32,
}

impl RangeTable {
    pub fn new(breakpoints: Vec<(f32, f32)>) -> Result<Self, RangeTableError> {
        if breakpoints.is_empty() {
            return Err(RangeTableError::Empty);
        }
        for (index, window) in breakpoints.windows(2).enumerate() {
            if !window[0].0.is_finite() || !(window[1].0 > window[0].0) {
                return Err(RangeTableError::Unordered(index + 1));
            }
        }
        let max_range = breakpoints
            .iter()
            .map(|(_, range)| *range)
            .fold(f32::NEG_INFINITY, f32::max);
        Ok(Self {
            breakpoints,
            max_range,
        })
    }

    pub fn max_range(&self) -> f32 {
        self.max_range
    }

    pub fn min_range(&self) -> f32 {
        self.breakpoints[0].1
    }

    /// Linear interpolation between neighbouring breakpoints, clamped to the table.
    pub fn range_at(&self, elapsed: f32) -> f32 {
        let (first_time, first_range) = self.breakpoints[0];
        if !(elapsed > first_time) {
            return first_range;
        }
        for window in self.breakpoints.windows(2) {
            let (t0, r0) = window[0];
            let (t1, r1) = window[1];
            if elapsed <= t1 {
                let fraction = (elapsed - t0) / (t1 - t0);
                let range = r0 + (r1 - r0) * fraction;
                return range.min(self.max_range);
            }
        }
        self.breakpoints[self.breakpoints.len() - 1].1.min(self.max_range)
    }
}

/// Lowest-health candidate whose on-screen distance to `actor` is inside
/// `(range + candidate radius + actor radius) / 2`. Ties keep the first seen.
pub fn select_lowest_health<'a, I>(candidates: I, actor: &Entity, range: f32) -> Option<&'a Entity>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut best: Option<&'a Entity> = None;
    for candidate in candidates {
        let distance = candidate.screen_pos.distance(actor.screen_pos);
        let reach = (range + candidate.bounding_radius + actor.bounding_radius) / 2.0;
        let within = distance < reach;
        if !within {
            continue;
        }
        if best.map_or(true, |current| candidate.health < current.health) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::champion;
    use crate::model::TeamId;
    use glam::Vec2;

    fn charge_table() -> RangeTable {
        RangeTable::new(vec![
            (0.0, 736.0),
            (0.25, 837.0),
            (0.5, 940.0),
            (0.75, 1040.0),
            (1.0, 1143.0),
            (1.25, 1245.0),
            (1.5, 1347.0),
            (1.75, 1450.0),
        ])
        .unwrap()
    }

    #[test]
    fn prediction_walks_along_the_path() {
        let predicted = predict_position(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0), 10.0, 2.0);
        assert_eq!(predicted, Vec3::new(20.0, 0.0, 0.0));

        assert!(!evaluate(Vec3::ZERO, predicted, 15.0).proceeds());
        assert!(evaluate(Vec3::ZERO, predicted, 25.0).proceeds());
        match evaluate(Vec3::ZERO, predicted, 15.0) {
            Decision::OutOfRange { distance, range, .. } => {
                assert_eq!(distance, 20.0);
                assert_eq!(range, 15.0);
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn standing_target_is_not_displaced() {
        let at = Vec3::new(4.0, 0.0, 9.0);
        assert_eq!(predict_position(at, at, 340.0, 0.528), at);
    }

    #[test]
    fn range_interpolates_and_clamps() {
        let table = charge_table();
        assert!((table.range_at(0.125) - 786.5).abs() < 1e-3);
        assert_eq!(table.range_at(0.0), 736.0);
        assert_eq!(table.range_at(-1.0), 736.0);
        assert_eq!(table.range_at(0.25), 837.0);
        assert_eq!(table.range_at(5.0), 1450.0);
        assert_eq!(table.range_at(f32::NAN), 736.0);
        assert_eq!(table.max_range(), 1450.0);
    }

    #[test]
    fn range_table_rejects_bad_breakpoints() {
        assert_eq!(RangeTable::new(Vec::new()), Err(RangeTableError::Empty));
        assert_eq!(
            RangeTable::new(vec![(0.0, 1.0), (0.0, 2.0)]),
            Err(RangeTableError::Unordered(1))
        );
    }

    #[test]
    fn selection_prefers_lowest_health_within_reach() {
        let mut me = champion(1, "Xerath", TeamId::ORDER);
        me.screen_pos = Vec2::ZERO;
        me.bounding_radius = 50.0;

        let mut near_healthy = champion(2, "Garen", TeamId::CHAOS);
        near_healthy.screen_pos = Vec2::new(100.0, 0.0);
        near_healthy.health = 900.0;

        let mut near_weak = champion(3, "Annie", TeamId::CHAOS);
        near_weak.screen_pos = Vec2::new(0.0, 200.0);
        near_weak.health = 120.0;

        let mut far_weakest = champion(4, "Teemo", TeamId::CHAOS);
        far_weakest.screen_pos = Vec2::new(2000.0, 0.0);
        far_weakest.health = 10.0;

        let enemies = vec![near_healthy, near_weak, far_weakest];
        let picked = select_lowest_health(&enemies, &me, 1450.0).unwrap();
        assert_eq!(picked.name, "Annie");
    }

    #[test]
    fn unmeasurable_reach_never_selects() {
        let mut me = champion(1, "Xerath", TeamId::ORDER);
        me.screen_pos = Vec2::ZERO;

        let mut far_broken = champion(2, "Teemo", TeamId::CHAOS);
        far_broken.screen_pos = Vec2::new(5000.0, 0.0);
        far_broken.bounding_radius = f32::NAN;
        far_broken.health = 1.0;

        let mut near = champion(3, "Annie", TeamId::CHAOS);
        near.screen_pos = Vec2::new(100.0, 0.0);
        near.health = 400.0;

        let enemies = vec![far_broken, near];
        assert_eq!(select_lowest_health(&enemies, &me, 1450.0).unwrap().name, "Annie");
        assert!(matches!(
            evaluate(Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0), 1450.0),
            Decision::OutOfRange { .. }
        ));
    }

    #[test]
    fn selection_ties_keep_first_and_empty_reach_yields_none() {
        let mut me = champion(1, "Xerath", TeamId::ORDER);
        me.screen_pos = Vec2::ZERO;

        let mut first = champion(2, "Ahri", TeamId::CHAOS);
        first.screen_pos = Vec2::new(10.0, 0.0);
        first.health = 300.0;
        let mut second = champion(3, "Zed", TeamId::CHAOS);
        second.screen_pos = Vec2::new(20.0, 0.0);
        second.health = 300.0;

        let enemies = vec![first, second];
        assert_eq!(select_lowest_health(&enemies, &me, 1450.0).unwrap().name, "Ahri");
        assert!(select_lowest_health(&enemies, &me, -1000.0).is_none());
        assert!(select_lowest_health(&Vec::new(), &me, 1450.0).is_none());
    }
}
