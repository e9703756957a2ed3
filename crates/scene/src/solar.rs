//! The solar system: planet descriptors and the nodes built from them.
//!
//! Each planet hangs off its own pivot node centred on the sun. Rotating the
//! pivot carries the planet around its orbit; rotating the planet node spins
//! it about its own axis.
//!
//! ```text
//! system
//! ├── sun
//! ├── pivot:Earth ── Earth      (offset by orbit_radius on +X)
//! ├── orbit:Earth               (ring scaled to orbit_radius)
//! └── ...
//! ```

use std::f32::consts::TAU;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use orrery_core::{Error, Result};

use crate::graph::{MaterialId, MeshId, NodeId, Renderable, SceneGraph, SceneResult};
use crate::interaction::SpeedBoosts;
use crate::transform::Transform;

/// Scales the Kepler-style default orbit speed so Earth (orbit 4.6) takes
/// roughly half a minute per revolution.
const ORBIT_SPEED_SCALE: f32 = 2.0;

/// One planet: its size, look, orbit and spin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetDescriptor {
    pub name: String,
    pub radius: f32,
    /// Texture path relative to the asset root.
    #[serde(default)]
    pub texture: Option<PathBuf>,
    pub orbit_radius: f32,
    /// Spin about the planet's own Y axis, radians per second.
    pub rotation_speed: f32,
    /// Revolution speed of the pivot, radians per second. Derived from the
    /// orbit radius when omitted.
    #[serde(default)]
    pub orbit_speed: Option<f32>,
    /// Orbit phase at startup, degrees.
    #[serde(default)]
    pub start_angle: f32,
    /// Tint, and the whole look when the texture is missing.
    #[serde(default = "white")]
    pub color: [f32; 3],
}

impl PlanetDescriptor {
    /// Angular speed of the orbit. Without an explicit value, falls off with
    /// `r^-1.5` so outer planets move slower.
    pub fn orbit_speed(&self) -> f32 {
        self.orbit_speed
            .unwrap_or_else(|| ORBIT_SPEED_SCALE / self.orbit_radius.max(f32::EPSILON).powf(1.5))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunDescriptor {
    #[serde(default = "sun_name")]
    pub name: String,
    pub radius: f32,
    #[serde(default)]
    pub texture: Option<PathBuf>,
    #[serde(default)]
    pub rotation_speed: f32,
    #[serde(default = "white")]
    pub color: [f32; 3],
}

/// A sun and the planets orbiting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDescriptor {
    pub sun: SunDescriptor,
    pub planets: Vec<PlanetDescriptor>,
}

fn white() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn sun_name() -> String {
    String::from("Sun")
}

fn planet(
    name: &str,
    radius: f32,
    orbit_radius: f32,
    rotation_speed: f32,
    start_angle: f32,
    color: [f32; 3],
) -> PlanetDescriptor {
    PlanetDescriptor {
        name: name.to_string(),
        radius,
        texture: Some(PathBuf::from(format!(
            "textures/{}.jpg",
            name.to_lowercase()
        ))),
        orbit_radius,
        rotation_speed,
        orbit_speed: None,
        start_angle,
        color,
    }
}

impl Default for SystemDescriptor {
    /// The eight planets, compressed so the inner system fits the opening
    /// view and everything fits inside the far clip plane.
    fn default() -> Self {
        Self {
            sun: SunDescriptor {
                name: sun_name(),
                radius: 1.5,
                texture: Some(PathBuf::from("textures/sun.jpg")),
                rotation_speed: 0.05,
                color: [1.0, 0.8, 0.35],
            },
            planets: vec![
                planet("Mercury", 0.18, 2.5, 0.4, 0.0, [0.6, 0.58, 0.55]),
                planet("Venus", 0.3, 3.4, 0.3, 40.0, [0.9, 0.75, 0.45]),
                planet("Earth", 0.32, 4.6, 1.0, 95.0, [0.25, 0.45, 0.9]),
                planet("Mars", 0.24, 5.8, 0.9, 160.0, [0.8, 0.35, 0.2]),
                planet("Jupiter", 0.8, 8.4, 2.2, 210.0, [0.8, 0.65, 0.5]),
                planet("Saturn", 0.7, 11.2, 2.0, 250.0, [0.9, 0.8, 0.55]),
                planet("Uranus", 0.5, 13.8, 1.4, 300.0, [0.55, 0.85, 0.9]),
                planet("Neptune", 0.48, 16.2, 1.5, 335.0, [0.3, 0.45, 0.95]),
            ],
        }
    }
}

impl SystemDescriptor {
    /// Load a planet table from JSON and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Resource(format!("cannot open system {}: {e}", path.display()))
        })?;
        let system: Self = serde_json::from_reader(BufReader::new(file))?;
        system.validate()?;
        info!(
            "Loaded system from {} ({} planets)",
            path.display(),
            system.planets.len()
        );
        Ok(system)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let system: Self = serde_json::from_str(json)?;
        system.validate()?;
        Ok(system)
    }

    /// Positive finite sizes, unique names, and every orbit clear of the sun.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;

        if !positive(self.sun.radius) {
            return Err(Error::Config("sun radius must be positive".into()));
        }

        for (i, p) in self.planets.iter().enumerate() {
            if p.name.trim().is_empty() {
                return Err(Error::Config(format!("planet #{i} has no name")));
            }
            if self.planets[..i].iter().any(|q| q.name == p.name) {
                return Err(Error::Config(format!("duplicate planet name {:?}", p.name)));
            }
            if !positive(p.radius) || !positive(p.orbit_radius) {
                return Err(Error::Config(format!(
                    "{}: radius and orbit_radius must be positive",
                    p.name
                )));
            }
            if p.orbit_radius <= self.sun.radius + p.radius {
                return Err(Error::Config(format!(
                    "{}: orbit intersects the sun",
                    p.name
                )));
            }
            if !p.rotation_speed.is_finite() || !p.orbit_speed().is_finite() {
                return Err(Error::Config(format!("{}: speeds must be finite", p.name)));
            }
        }
        Ok(())
    }
}

/// Material of the sun or a planet, and whether it carries the body's own
/// texture. Untextured bodies are tinted with their descriptor color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyMaterial {
    pub id: MaterialId,
    pub textured: bool,
}

impl BodyMaterial {
    pub fn textured(id: MaterialId) -> Self {
        Self { id, textured: true }
    }

    pub fn plain(id: MaterialId) -> Self {
        Self {
            id,
            textured: false,
        }
    }

    /// Tint for a body whose fallback color is `color`.
    pub fn tint(&self, color: [f32; 3]) -> Vec3 {
        if self.textured {
            Vec3::ONE
        } else {
            Vec3::from(color)
        }
    }
}

/// GPU handles the solar system is drawn with.
#[derive(Debug, Clone)]
pub struct SystemAssets {
    /// Unit-radius sphere.
    pub sphere: MeshId,
    /// Unit-radius orbit ring, if orbits are shown.
    pub ring: Option<(MeshId, MaterialId)>,
    pub sun_material: BodyMaterial,
    /// One per planet, in descriptor order.
    pub planet_materials: Vec<BodyMaterial>,
}

/// Scene nodes belonging to one planet.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanetHandle {
    pub name: String,
    pub pivot: NodeId,
    pub body: NodeId,
    pub ring: Option<NodeId>,
}

#[derive(Debug, Clone, Copy)]
struct PlanetMotion {
    orbit_speed: f32,
    rotation_speed: f32,
    orbit_angle: f32,
    spin_angle: f32,
}

/// Live solar system: descriptor-driven nodes and their animation state.
#[derive(Debug)]
pub struct SolarSystem {
    root: NodeId,
    sun: NodeId,
    sun_rotation_speed: f32,
    sun_angle: f32,
    planets: Vec<PlanetHandle>,
    motion: Vec<PlanetMotion>,
}

impl SolarSystem {
    /// Create the sun, a pivot per planet, the planet under it and, when the
    /// assets provide one, an orbit ring.
    pub fn build(
        graph: &mut SceneGraph,
        descriptor: &SystemDescriptor,
        assets: &SystemAssets,
    ) -> Result<Self> {
        if assets.planet_materials.len() != descriptor.planets.len() {
            return Err(Error::Internal(format!(
                "{} planet materials for {} planets",
                assets.planet_materials.len(),
                descriptor.planets.len()
            )));
        }
        Self::build_nodes(graph, descriptor, assets)
            .map_err(|e| Error::Internal(format!("building solar system: {e}")))
    }

    fn build_nodes(
        graph: &mut SceneGraph,
        descriptor: &SystemDescriptor,
        assets: &SystemAssets,
    ) -> SceneResult<Self> {
        let root = graph.add_node("system", Transform::new(), None)?;

        let sun_desc = &descriptor.sun;
        let sun = graph.add_node(
            sun_desc.name.as_str(),
            Transform::new().with_uniform_scale(sun_desc.radius),
            Some(root),
        )?;
        graph.set_renderable(
            sun,
            Renderable::new(assets.sphere, assets.sun_material.id)
                .with_color(assets.sun_material.tint(sun_desc.color))
                .emissive()
                .pickable(1.0),
        )?;

        let mut planets = Vec::with_capacity(descriptor.planets.len());
        let mut motion = Vec::with_capacity(descriptor.planets.len());

        for (desc, &material) in descriptor.planets.iter().zip(&assets.planet_materials) {
            let orbit_angle = desc.start_angle.to_radians().rem_euclid(TAU);
            let pivot = graph.add_node(
                format!("pivot:{}", desc.name),
                Transform::new().with_rotation(Quat::from_rotation_y(orbit_angle)),
                Some(root),
            )?;
            let body = graph.add_node(
                desc.name.as_str(),
                Transform::new()
                    .with_position(Vec3::new(desc.orbit_radius, 0.0, 0.0))
                    .with_uniform_scale(desc.radius),
                Some(pivot),
            )?;
            graph.set_renderable(
                body,
                Renderable::new(assets.sphere, material.id)
                    .with_color(material.tint(desc.color))
                    .pickable(1.0),
            )?;

            let ring = match assets.ring {
                Some((mesh, ring_material)) => {
                    let ring = graph.add_node(
                        format!("orbit:{}", desc.name),
                        Transform::new().with_uniform_scale(desc.orbit_radius),
                        Some(root),
                    )?;
                    graph.set_renderable(
                        ring,
                        Renderable::new(mesh, ring_material)
                            .with_color(Vec3::splat(0.35))
                            .emissive(),
                    )?;
                    Some(ring)
                }
                None => None,
            };

            debug!(
                "Planet {} orbit r={} speed={:.3} rad/s",
                desc.name,
                desc.orbit_radius,
                desc.orbit_speed()
            );

            planets.push(PlanetHandle {
                name: desc.name.clone(),
                pivot,
                body,
                ring,
            });
            motion.push(PlanetMotion {
                orbit_speed: desc.orbit_speed(),
                rotation_speed: desc.rotation_speed,
                orbit_angle,
                spin_angle: 0.0,
            });
        }

        info!("Solar system built with {} planets", planets.len());

        Ok(Self {
            root,
            sun,
            sun_rotation_speed: sun_desc.rotation_speed,
            sun_angle: 0.0,
            planets,
            motion,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn sun(&self) -> NodeId {
        self.sun
    }

    pub fn planets(&self) -> &[PlanetHandle] {
        &self.planets
    }

    pub fn planet(&self, index: usize) -> Option<&PlanetHandle> {
        self.planets.get(index)
    }

    /// Planet index owning `node` (the planet body itself).
    pub fn planet_at(&self, node: NodeId) -> Option<usize> {
        self.planets.iter().position(|p| p.body == node)
    }

    pub fn orbit_angle(&self, index: usize) -> Option<f32> {
        self.motion.get(index).map(|m| m.orbit_angle)
    }

    pub fn spin_angle(&self, index: usize) -> Option<f32> {
        self.motion.get(index).map(|m| m.spin_angle)
    }

    /// Base spin speed times any active boost.
    pub fn effective_rotation_speed(&self, index: usize, boosts: &SpeedBoosts) -> Option<f32> {
        self.motion
            .get(index)
            .map(|m| m.rotation_speed * boosts.multiplier(index))
    }

    /// Show or hide every orbit ring.
    pub fn set_orbits_visible(&self, graph: &mut SceneGraph, visible: bool) -> SceneResult<()> {
        for ring in self.planets.iter().filter_map(|p| p.ring) {
            graph.set_visible(ring, visible)?;
        }
        Ok(())
    }

    /// Advance every orbit and spin by `dt` seconds.
    ///
    /// Boosted planets spin faster only for the part of `dt` their boost is
    /// still active, so a boost contributes exactly its configured duration.
    /// Call before [`SpeedBoosts::tick`] for the same frame.
    pub fn update(
        &mut self,
        graph: &mut SceneGraph,
        boosts: &SpeedBoosts,
        dt: f32,
    ) -> SceneResult<()> {
        self.sun_angle = (self.sun_angle + self.sun_rotation_speed * dt).rem_euclid(TAU);
        graph.transform_mut(self.sun)?.set_yaw(self.sun_angle);

        for (index, (handle, m)) in self.planets.iter().zip(&mut self.motion).enumerate() {
            m.orbit_angle = (m.orbit_angle + m.orbit_speed * dt).rem_euclid(TAU);

            let boosted = boosts.boosted_time(index, dt);
            let spin = m.rotation_speed * (dt + (boosts.factor() - 1.0) * boosted);
            m.spin_angle = (m.spin_angle + spin).rem_euclid(TAU);

            graph.transform_mut(handle.pivot)?.set_yaw(m.orbit_angle);
            graph.transform_mut(handle.body)?.set_yaw(m.spin_angle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets_for(desc: &SystemDescriptor, rings: bool) -> SystemAssets {
        SystemAssets {
            sphere: MeshId(0),
            ring: rings.then_some((MeshId(1), MaterialId(99))),
            sun_material: BodyMaterial::plain(MaterialId(0)),
            planet_materials: (1..=desc.planets.len() as u32)
                .map(|i| BodyMaterial::plain(MaterialId(i)))
                .collect(),
        }
    }

    fn build(desc: &SystemDescriptor) -> (SceneGraph, SolarSystem) {
        let mut graph = SceneGraph::new();
        let system = SolarSystem::build(&mut graph, desc, &assets_for(desc, true)).unwrap();
        (graph, system)
    }

    #[test]
    fn test_default_system_is_valid() {
        let desc = SystemDescriptor::default();
        assert!(desc.validate().is_ok());
        assert_eq!(desc.planets.len(), 8);
    }

    #[test]
    fn test_one_pivot_and_body_per_descriptor() {
        let desc = SystemDescriptor::default();
        let (graph, system) = build(&desc);

        assert_eq!(system.planets().len(), desc.planets.len());
        for (handle, d) in system.planets().iter().zip(&desc.planets) {
            assert_eq!(handle.name, d.name);
            let body = graph.node(handle.body).unwrap();
            assert_eq!(body.parent(), Some(handle.pivot));
            assert_eq!(graph.node(handle.pivot).unwrap().children(), &[handle.body]);
            assert!(body.renderable.as_ref().unwrap().pickable);
        }

        let mut bodies: Vec<_> = system.planets().iter().map(|p| p.body).collect();
        bodies.dedup();
        assert_eq!(bodies.len(), desc.planets.len());
    }

    #[test]
    fn test_mismatched_materials_rejected() {
        let desc = SystemDescriptor::default();
        let mut assets = assets_for(&desc, false);
        assets.planet_materials.pop();
        let mut graph = SceneGraph::new();
        assert!(SolarSystem::build(&mut graph, &desc, &assets).is_err());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_orbit_keeps_radius_and_advances_angle() {
        let desc = SystemDescriptor::default();
        let (mut graph, mut system) = build(&desc);
        let boosts = SpeedBoosts::new(2.0, 2.0);

        let before: Vec<f32> = (0..desc.planets.len())
            .map(|i| system.orbit_angle(i).unwrap())
            .collect();
        system.update(&mut graph, &boosts, 0.5).unwrap();

        for (i, d) in desc.planets.iter().enumerate() {
            let pos = graph.world_position(system.planets()[i].body).unwrap();
            assert!(
                (pos.length() - d.orbit_radius).abs() < 1e-3,
                "{} drifted to {}",
                d.name,
                pos.length()
            );
            assert!(pos.y.abs() < 1e-4);

            let expected = (before[i] + d.orbit_speed() * 0.5).rem_euclid(TAU);
            assert!((system.orbit_angle(i).unwrap() - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_spin_does_not_move_planet() {
        let desc = SystemDescriptor::default();
        let (mut graph, mut system) = build(&desc);
        let boosts = SpeedBoosts::new(2.0, 2.0);
        let earth = 2;
        system.motion[earth].orbit_speed = 0.0;

        let before = graph.world_position(system.planets()[earth].body).unwrap();
        system.update(&mut graph, &boosts, 1.0).unwrap();
        let after = graph.world_position(system.planets()[earth].body).unwrap();

        assert!((before - after).length() < 1e-4);
        assert!((system.spin_angle(earth).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_boost_doubles_spin() {
        let desc = SystemDescriptor::default();
        let (mut graph, mut system) = build(&desc);
        let mut boosts = SpeedBoosts::new(2.0, 2.0);
        boosts.start(0);

        assert_eq!(
            system.effective_rotation_speed(0, &boosts),
            Some(desc.planets[0].rotation_speed * 2.0)
        );
        assert_eq!(
            system.effective_rotation_speed(1, &boosts),
            Some(desc.planets[1].rotation_speed)
        );

        system.update(&mut graph, &boosts, 0.5).unwrap();
        let spun = system.spin_angle(0).unwrap();
        assert!((spun - desc.planets[0].rotation_speed * 2.0 * 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_rings_toggle() {
        let desc = SystemDescriptor::default();
        let (mut graph, system) = build(&desc);
        let with_rings = graph.visible_renderables().len();
        assert_eq!(with_rings, 1 + 2 * desc.planets.len());

        system.set_orbits_visible(&mut graph, false).unwrap();
        assert_eq!(graph.visible_renderables().len(), 1 + desc.planets.len());
    }

    fn tint_of(graph: &SceneGraph, node: NodeId) -> Vec3 {
        graph.node(node).unwrap().renderable.as_ref().unwrap().base_color
    }

    #[test]
    fn test_descriptor_color_only_tints_untextured_bodies() {
        let desc = SystemDescriptor::default();
        let mut assets = assets_for(&desc, false);
        assets.sun_material = BodyMaterial::textured(MaterialId(0));
        assets.planet_materials[2] = BodyMaterial::textured(MaterialId(3));
        let mut graph = SceneGraph::new();
        let system = SolarSystem::build(&mut graph, &desc, &assets).unwrap();

        assert_eq!(tint_of(&graph, system.sun()), Vec3::ONE);
        let earth = system.planets()[2].body;
        assert_eq!(tint_of(&graph, earth), Vec3::ONE);
        let mars = system.planets()[3].body;
        assert_eq!(tint_of(&graph, mars), Vec3::from(desc.planets[3].color));
        let node = graph.node(earth).unwrap();
        assert_eq!(node.renderable.as_ref().unwrap().material, MaterialId(3));
    }

    #[test]
    fn test_planet_at() {
        let desc = SystemDescriptor::default();
        let (_, system) = build(&desc);
        let mars = &system.planets()[3];
        assert_eq!(system.planet_at(mars.body), Some(3));
        assert_eq!(system.planet_at(mars.pivot), None);
        assert_eq!(system.planet_at(system.sun()), None);
    }

    #[test]
    fn test_json_defaults_and_validation() {
        let json = r#"{
            "sun": { "radius": 1.0 },
            "planets": [
                { "name": "A", "radius": 0.2, "orbit_radius": 3.0, "rotation_speed": 1.0 }
            ]
        }"#;
        let desc = SystemDescriptor::from_json(json).unwrap();
        assert_eq!(desc.sun.name, "Sun");
        assert_eq!(desc.planets[0].color, [1.0, 1.0, 1.0]);
        assert!(desc.planets[0].texture.is_none());
        assert!(desc.planets[0].orbit_speed() > 0.0);

        let inside_sun = r#"{
            "sun": { "radius": 2.0 },
            "planets": [
                { "name": "A", "radius": 0.5, "orbit_radius": 2.2, "rotation_speed": 1.0 }
            ]
        }"#;
        assert!(matches!(
            SystemDescriptor::from_json(inside_sun),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut desc = SystemDescriptor::default();
        desc.planets[1].name = desc.planets[0].name.clone();
        assert!(matches!(desc.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_orbit_speed_falls_off() {
        let desc = SystemDescriptor::default();
        let speeds: Vec<f32> = desc.planets.iter().map(|p| p.orbit_speed()).collect();
        assert!(speeds.windows(2).all(|w| w[0] > w[1]));
    }
}
