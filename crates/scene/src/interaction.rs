//! Hover highlighting and click-to-boost.

use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::graph::{NodeId, SceneGraph, SceneResult};
use crate::solar::SolarSystem;

/// Tracks which planet is under the cursor and keeps exactly that planet
/// highlighted.
#[derive(Debug, Clone)]
pub struct HoverState {
    highlight: Vec3,
    hovered: Option<usize>,
}

impl HoverState {
    pub fn new(highlight: Vec3) -> Self {
        Self {
            highlight,
            hovered: None,
        }
    }

    /// Index of the hovered planet.
    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Apply a raycast result. `hit` is the picked node, if any; nodes that
    /// are not planet bodies (the sun, the ship) clear the hover.
    ///
    /// Returns `true` when the hovered planet changed.
    pub fn update(
        &mut self,
        graph: &mut SceneGraph,
        system: &SolarSystem,
        hit: Option<NodeId>,
    ) -> SceneResult<bool> {
        let next = hit.and_then(|node| system.planet_at(node));
        if next == self.hovered {
            return Ok(false);
        }

        if let Some(prev) = self.hovered.and_then(|i| system.planet(i))
            && let Some(r) = graph.renderable_mut(prev.body)?
        {
            r.highlight = None;
        }
        if let Some(planet) = next.and_then(|i| system.planet(i)) {
            if let Some(r) = graph.renderable_mut(planet.body)? {
                r.highlight = Some(self.highlight);
            }
            debug!("Hovering {}", planet.name);
        }

        self.hovered = next;
        Ok(true)
    }

    /// Drop the hover, e.g. when the cursor leaves the window.
    pub fn clear(&mut self, graph: &mut SceneGraph, system: &SolarSystem) -> SceneResult<bool> {
        self.update(graph, system, None)
    }
}

/// Temporary spin-speed multipliers started by clicking a planet.
///
/// A boost lasts a fixed time. Clicking a boosted planet restarts its timer;
/// boosts never stack.
#[derive(Debug, Clone)]
pub struct SpeedBoosts {
    factor: f32,
    duration: f32,
    remaining: HashMap<usize, f32>,
}

impl SpeedBoosts {
    pub fn new(factor: f32, duration: f32) -> Self {
        Self {
            factor,
            duration,
            remaining: HashMap::new(),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Start or restart the boost for a planet.
    pub fn start(&mut self, planet: usize) {
        self.remaining.insert(planet, self.duration);
    }

    pub fn is_active(&self, planet: usize) -> bool {
        self.remaining.contains_key(&planet)
    }

    /// Seconds of boost left, zero when inactive.
    pub fn remaining(&self, planet: usize) -> f32 {
        self.remaining.get(&planet).copied().unwrap_or(0.0)
    }

    /// Current speed multiplier for a planet.
    pub fn multiplier(&self, planet: usize) -> f32 {
        if self.is_active(planet) { self.factor } else { 1.0 }
    }

    /// How much of the next `dt` seconds the planet spends boosted.
    pub fn boosted_time(&self, planet: usize, dt: f32) -> f32 {
        self.remaining(planet).min(dt.max(0.0))
    }

    /// Count down every boost by `dt`, returning the planets whose boost ran
    /// out, in ascending order.
    pub fn tick(&mut self, dt: f32) -> Vec<usize> {
        let mut expired = Vec::new();
        self.remaining.retain(|&planet, left| {
            *left -= dt;
            if *left <= 0.0 {
                expired.push(planet);
                false
            } else {
                true
            }
        });
        expired.sort_unstable();
        expired
    }

    pub fn active_count(&self) -> usize {
        self.remaining.len()
    }
}
