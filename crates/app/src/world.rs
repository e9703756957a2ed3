//! Everything that changes from frame to frame, minus the GPU.
//!
//! [`World::update`] runs one frame in a fixed order: camera-mode keys,
//! the ship, picking under the cursor, click boosts, the solar system and
//! finally the camera rig.

use glam::{Vec2, Vec3};
use tracing::info;

use orrery_core::{Config, Result};
use orrery_platform::{InputState, MouseButton};
use orrery_renderer::FrameScene;
use orrery_scene::{
    Camera, CameraMode, CameraRig, HoverState, Lighting, MaterialId, MeshId, NodeId, Renderable,
    RigInput, SceneGraph, SceneResult, SolarSystem, Spaceship, SpeedBoosts, SystemAssets,
    SystemDescriptor, raycast,
};

use crate::controls;

const SHIP_COLOR: Vec3 = Vec3::new(0.75, 0.78, 0.85);

/// GPU handles the world is built from.
#[derive(Debug, Clone)]
pub struct WorldAssets {
    pub system: SystemAssets,
    pub ship_mesh: MeshId,
    pub ship_material: MaterialId,
    pub ship_color: Option<Vec3>,
}

pub struct World {
    graph: SceneGraph,
    system: SolarSystem,
    ship: Spaceship,
    ship_node: NodeId,
    camera: Camera,
    rig: CameraRig,
    lighting: Lighting,
    hover: HoverState,
    boosts: SpeedBoosts,
    click_slop: f32,
    show_orbits: bool,
}

impl World {
    pub fn new(
        config: &Config,
        descriptor: &SystemDescriptor,
        assets: &WorldAssets,
        aspect: f32,
    ) -> Result<Self> {
        let mut graph = SceneGraph::new();
        let system = SolarSystem::build(&mut graph, descriptor, &assets.system)?;

        let ship = Spaceship::new(&config.spaceship);
        let ship_node = add_ship(&mut graph, &ship, assets)
            .map_err(|e| orrery_core::Error::Internal(format!("adding spaceship: {e}")))?;

        let mut camera = Camera::from_config(&config.camera, aspect);
        let mut rig = CameraRig::new(&config.camera);
        rig.update(&mut camera, RigInput::default(), &ship.pose(), 0.0);

        let mut world = Self {
            graph,
            system,
            ship,
            ship_node,
            camera,
            rig,
            lighting: Lighting::default(),
            hover: HoverState::new(Vec3::from(config.interaction.highlight_color)),
            boosts: SpeedBoosts::new(
                config.interaction.boost_factor,
                config.interaction.boost_seconds,
            ),
            click_slop: config.interaction.click_slop,
            show_orbits: config.system.show_orbits,
        };
        world
            .system
            .set_orbits_visible(&mut world.graph, world.show_orbits)
            .map_err(|e| orrery_core::Error::Internal(e.to_string()))?;
        Ok(world)
    }

    /// Advance one frame of `dt` seconds.
    pub fn update(&mut self, input: &InputState, viewport: Vec2, dt: f32) -> SceneResult<()> {
        if let Some(mode) = controls::requested_mode(input, self.rig.mode()) {
            self.rig.set_mode(mode);
            self.graph
                .set_visible(self.ship_node, mode != CameraMode::Cockpit)?;
        }
        if controls::toggle_orbits(input) {
            self.show_orbits = !self.show_orbits;
            self.system
                .set_orbits_visible(&mut self.graph, self.show_orbits)?;
        }

        self.ship.update(controls::ship_input(input), dt);
        *self.graph.transform_mut(self.ship_node)? = self.ship.transform();

        let hit = input
            .cursor_position()
            .and_then(|cursor| self.camera.screen_ray(cursor, viewport))
            .and_then(|ray| raycast(&self.graph, &ray))
            .map(|hit| hit.node);
        self.hover.update(&mut self.graph, &self.system, hit)?;

        if input.is_click(self.click_slop)
            && let Some(planet) = self.hover.hovered()
        {
            self.boosts.start(planet);
            if let Some(handle) = self.system.planet(planet) {
                info!(
                    "{} spins x{} for {}s",
                    handle.name,
                    self.boosts.factor(),
                    self.boosts.duration()
                );
            }
        }

        self.system.update(&mut self.graph, &self.boosts, dt)?;
        self.boosts.tick(dt);
        self.lighting.sun.position = self.graph.world_position(self.system.sun())?;

        let orbiting = self.rig.mode() == CameraMode::Orbit;
        let rig_input = RigInput {
            drag: if orbiting && input.is_mouse_pressed(MouseButton::Left) {
                input.cursor_delta()
            } else {
                Vec2::ZERO
            },
            zoom: input.scroll_delta().y,
        };
        self.rig
            .update(&mut self.camera, rig_input, &self.ship.pose(), dt);
        Ok(())
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera.set_aspect(aspect);
    }

    pub fn frame_scene(&self) -> FrameScene {
        FrameScene::collect(&self.graph, &self.camera, self.lighting)
    }
}

fn add_ship(graph: &mut SceneGraph, ship: &Spaceship, assets: &WorldAssets) -> SceneResult<NodeId> {
    let id = graph.add_node("spaceship", ship.transform(), None)?;
    graph.set_renderable(
        id,
        Renderable::new(assets.ship_mesh, assets.ship_material)
            .with_color(assets.ship_color.unwrap_or(SHIP_COLOR)),
    )?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_platform::KeyCode;
    use orrery_scene::BodyMaterial;

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

    impl World {
        fn graph(&self) -> &SceneGraph {
            &self.graph
        }

        fn system(&self) -> &SolarSystem {
            &self.system
        }

        fn camera(&self) -> &Camera {
            &self.camera
        }

        fn camera_mode(&self) -> CameraMode {
            self.rig.mode()
        }

        fn ship(&self) -> &Spaceship {
            &self.ship
        }

        fn hovered(&self) -> Option<usize> {
            self.hover.hovered()
        }
    }

    fn world() -> World {
        let config = Config::default();
        let desc = SystemDescriptor::default();
        let assets = WorldAssets {
            system: SystemAssets {
                sphere: MeshId(0),
                ring: Some((MeshId(1), MaterialId(0))),
                sun_material: BodyMaterial::plain(MaterialId(0)),
                planet_materials: vec![BodyMaterial::plain(MaterialId(0)); desc.planets.len()],
            },
            ship_mesh: MeshId(2),
            ship_material: MaterialId(0),
            ship_color: None,
        };
        World::new(&config, &desc, &assets, VIEWPORT.x / VIEWPORT.y).unwrap()
    }

    /// Pixel the planet's center projects to.
    fn pixel_of(w: &World, planet: usize) -> Vec2 {
        let pos = w
            .graph()
            .world_position(w.system().planets()[planet].body)
            .unwrap();
        let clip = w.camera().view_projection_matrix() * pos.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        Vec2::new(
            (ndc.x + 1.0) * 0.5 * VIEWPORT.x,
            (ndc.y + 1.0) * 0.5 * VIEWPORT.y,
        )
    }

    fn press(w: &mut World, input: &mut InputState, key: KeyCode) {
        input.on_key_pressed(key);
        w.update(input, VIEWPORT, 0.016).unwrap();
        input.begin_frame();
        input.on_key_released(key);
        w.update(input, VIEWPORT, 0.016).unwrap();
        input.begin_frame();
    }

    #[test]
    fn test_ship_and_system_are_drawn() {
        let w = world();
        let scene = w.frame_scene();
        // Sun, planets, rings and the ship.
        let planets = w.system().planets().len();
        assert_eq!(scene.draws.len(), 1 + 2 * planets + 1);
        assert!(scene.draws.iter().any(|d| d.mesh == MeshId(2)));
    }

    #[test]
    fn test_mode_keys_switch_camera() {
        let mut w = world();
        let mut input = InputState::new();
        assert_eq!(w.camera_mode(), CameraMode::Overview);

        press(&mut w, &mut input, KeyCode::KeyC);
        assert_eq!(w.camera_mode(), CameraMode::Orbit);

        press(&mut w, &mut input, KeyCode::Digit4);
        assert_eq!(w.camera_mode(), CameraMode::Cockpit);
        // The ship is hidden from its own cockpit.
        assert!(!w.frame_scene().draws.iter().any(|d| d.mesh == MeshId(2)));

        press(&mut w, &mut input, KeyCode::Digit3);
        assert!(w.frame_scene().draws.iter().any(|d| d.mesh == MeshId(2)));
    }

    #[test]
    fn test_orbit_toggle_hides_rings() {
        let mut w = world();
        let mut input = InputState::new();
        let before = w.frame_scene().draws.len();
        press(&mut w, &mut input, KeyCode::KeyO);
        let after = w.frame_scene().draws.len();
        assert_eq!(before - after, w.system().planets().len());
    }

    #[test]
    fn test_thrust_moves_ship_forward() {
        let mut w = world();
        let mut input = InputState::new();
        let start = w.ship().position();
        input.on_key_pressed(KeyCode::KeyW);
        for _ in 0..60 {
            w.update(&input, VIEWPORT, 1.0 / 60.0).unwrap();
            input.begin_frame();
        }
        let moved = w.ship().position() - start;
        assert!(moved.dot(Vec3::NEG_Z) > 0.0);
    }

    #[test]
    fn test_cursor_outside_window_clears_hover() {
        let mut w = world();
        let mut input = InputState::new();
        let earth = 2;
        let pixel = pixel_of(&w, earth);
        assert!(pixel.cmpge(Vec2::ZERO).all() && pixel.cmplt(VIEWPORT).all());

        input.on_mouse_moved(pixel.x, pixel.y);
        w.update(&input, VIEWPORT, 0.0).unwrap();
        input.begin_frame();
        assert_eq!(w.hovered(), Some(earth));
        let body = w.system().planets()[earth].body;
        let highlight = |w: &World| {
            let node = w.graph().node(body).unwrap();
            node.renderable.as_ref().unwrap().highlight
        };
        assert!(highlight(&w).is_some());

        input.on_cursor_left();
        w.update(&input, VIEWPORT, 0.0).unwrap();
        assert_eq!(w.hovered(), None);
        assert_eq!(highlight(&w), None);
    }
}
