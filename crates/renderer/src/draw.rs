//! The per-frame snapshot handed from the scene to the renderer.

use glam::{Mat4, Vec3};

use orrery_scene::{Camera, Lighting, MaterialId, MeshId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub model: Mat4,
    pub tint: Vec3,
    /// Drawn without lighting (the sun, orbit rings).
    pub emissive: bool,
}

/// Everything one frame draws.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameScene {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub lighting: Lighting,
    pub draws: Vec<DrawItem>,
}

impl FrameScene {
    /// Snapshot every visible renderable in `graph` as seen from `camera`.
    pub fn collect(graph: &SceneGraph, camera: &Camera, lighting: Lighting) -> Self {
        let draws = graph
            .visible_renderables()
            .into_iter()
            .map(|node| DrawItem {
                mesh: node.renderable.mesh,
                material: node.renderable.material,
                model: node.world,
                tint: node.renderable.color(),
                emissive: node.renderable.emissive,
            })
            .collect();

        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            camera_position: camera.position,
            lighting,
            draws,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_scene::{Renderable, Transform};

    #[test]
    fn test_collect_skips_hidden_subtrees() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("root", Transform::new(), None).unwrap();
        let shown = graph
            .add_node(
                "shown",
                Transform::new().with_position(Vec3::X),
                Some(root),
            )
            .unwrap();
        let hidden_parent = graph.add_node("hidden", Transform::new(), Some(root)).unwrap();
        let hidden_child = graph
            .add_node("child", Transform::new(), Some(hidden_parent))
            .unwrap();
        graph
            .set_renderable(shown, Renderable::new(MeshId(0), MaterialId(0)))
            .unwrap();
        graph
            .set_renderable(hidden_child, Renderable::new(MeshId(1), MaterialId(1)))
            .unwrap();
        graph.set_visible(hidden_parent, false).unwrap();

        let scene = FrameScene::collect(&graph, &Camera::new(), Lighting::default());

        assert_eq!(scene.draws.len(), 1);
        assert_eq!(scene.draws[0].mesh, MeshId(0));
        assert_eq!(scene.draws[0].model, Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_collect_carries_highlight_tint() {
        let mut graph = SceneGraph::new();
        let id = graph.add_node("planet", Transform::new(), None).unwrap();
        let mut renderable =
            Renderable::new(MeshId(0), MaterialId(0)).with_color(Vec3::new(0.2, 0.4, 0.6));
        renderable.highlight = Some(Vec3::new(1.0, 1.0, 0.0));
        graph.set_renderable(id, renderable).unwrap();

        let scene = FrameScene::collect(&graph, &Camera::new(), Lighting::default());

        assert_eq!(scene.draws[0].tint, Vec3::new(1.0, 1.0, 0.0));
        assert!(!scene.draws[0].emissive);
    }
}
