mod common;

use cgmath::{Deg, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3};
use common::test_utils::assert_matrix_eq;
use scene_ngin::data_structures::{
    behavior::{Behavior, RotateBehavior},
    scene::Scene,
    scene_graph::GameObject,
    transform::Transform,
};

fn transform(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_position(Vector3::new(x, y, z))
}

#[test]
fn root_global_equals_local() {
    let local = transform(1.0, 2.0, 3.0)
        .with_rotation(Quaternion::from_angle_y(Deg(30.0)))
        .with_scale(Vector3::new(2.0, 2.0, 2.0));
    let mut scene = Scene::new();
    scene.add_object(GameObject::new("root").with_transform(local));

    scene.update_transforms();

    let root = scene.find("root").unwrap();
    assert_matrix_eq(root.global_reference_frame(), local.to_matrix());
}

#[test]
fn chain_composes_parent_global_with_local() {
    let a = transform(1.0, 0.0, 0.0).with_rotation(Quaternion::from_angle_z(Deg(90.0)));
    let b = transform(0.0, 2.0, 0.0).with_scale(Vector3::new(3.0, 1.0, 1.0));
    let c = transform(0.0, 0.0, 5.0);
    let mut scene = Scene::new();
    scene.add_object(
        GameObject::new("a")
            .with_transform(a)
            .with_child(GameObject::new("b").with_transform(b).with_child(
                GameObject::new("c").with_transform(c),
            )),
    );

    scene.update_transforms();

    let expected = a.to_matrix() * b.to_matrix() * c.to_matrix();
    assert_matrix_eq(scene.find("c").unwrap().global_reference_frame(), expected);
    assert_matrix_eq(
        scene.find("b").unwrap().global_reference_frame(),
        a.to_matrix() * b.to_matrix(),
    );
}

#[test]
fn static_node_keeps_first_global_transform() {
    let node = GameObject::new("rock")
        .with_transform(transform(0.0, 1.0, 0.0))
        .with_static(true);
    let first = node.update_global(&Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0)));
    let second = node.update_global(&Matrix4::identity());

    assert_matrix_eq(second, first);
    assert_matrix_eq(node.global_reference_frame(), first);
}

#[test]
fn dynamic_node_follows_its_parent() {
    let node = GameObject::new("crate").with_transform(transform(0.0, 1.0, 0.0));
    node.update_global(&Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0)));
    let moved = node.update_global(&Matrix4::identity());

    assert_matrix_eq(moved, Matrix4::from_translation(Vector3::new(0.0, 1.0, 0.0)));
}

#[test]
fn find_searches_depth_first_in_child_order() {
    let tree = GameObject::new("root")
        .with_child(GameObject::new("left").with_child(GameObject::new("target")))
        .with_child(GameObject::new("target").with_transform(transform(9.0, 0.0, 0.0)));

    let found = tree.find("target").unwrap();
    assert_eq!(found.local_transform().position, Vector3::new(0.0, 0.0, 0.0));
    assert!(tree.find("missing").is_none());
    assert_eq!(tree.node_count(), 4);
}

#[test]
fn find_mut_allows_editing_a_nested_node() {
    let mut scene = Scene::new();
    scene.add_object(GameObject::new("root").with_child(GameObject::new("arm")));

    scene
        .find_mut("arm")
        .unwrap()
        .local_transform_mut()
        .translate(Vector3::new(0.0, 0.0, 2.0));

    assert_eq!(
        scene.find("arm").unwrap().local_transform().position,
        Vector3::new(0.0, 0.0, 2.0)
    );
    assert_eq!(scene.node_count(), 2);
}

#[test]
fn deep_chains_are_walked_and_dropped_without_recursion() {
    // a small stack makes any per-level recursion overflow
    let worker = std::thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(|| {
            let mut node = GameObject::new("leaf");
            for i in 0..100_000 {
                node = GameObject::new(&format!("n{i}")).with_child(node);
            }
            let mut scene = Scene::new();
            scene.add_object(node);

            assert_eq!(scene.node_count(), 100_001);
            scene
                .find_mut("leaf")
                .unwrap()
                .local_transform_mut()
                .translate(Vector3::new(1.0, 0.0, 0.0));
            scene.update_transforms();
            assert_eq!(
                scene.find("leaf").unwrap().global_reference_frame(),
                Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0))
            );
            drop(scene);
        })
        .unwrap();
    worker.join().unwrap();
}

#[test]
fn update_runs_behaviors_of_the_whole_tree() {
    let mut scene = Scene::new();
    scene.add_object(
        GameObject::new("spinner")
            .with_behavior(RotateBehavior::new(Vector3::unit_y(), 90.0))
            .with_child(
                GameObject::new("moon").with_behavior(RotateBehavior::new(Vector3::unit_z(), 45.0)),
            ),
    );

    scene.update(1.0);
    scene.update_transforms();

    let expected = Quaternion::from_angle_y(Deg(90.0));
    let spinner = scene.find("spinner").unwrap().local_transform().rotation;
    assert!((spinner.s - expected.s).abs() < 1e-5);
    assert!((spinner.v.y - expected.v.y).abs() < 1e-5);

    let moon = scene.find("moon").unwrap().local_transform().rotation;
    let expected = Quaternion::from_angle_z(Deg(45.0));
    assert!((moon.v.z - expected.v.z).abs() < 1e-5);
}

/// Steps one unit along X per update, whatever the frame time.
struct Walker;

impl Behavior for Walker {
    fn update(&mut self, transform: &mut Transform, _elapsed_seconds: f64) {
        transform.translate(Vector3::new(1.0, 0.0, 0.0));
    }
}

#[test]
fn disabled_rotation_leaves_transform_alone() {
    let mut behavior = RotateBehavior::new(Vector3::unit_x(), 10.0);
    behavior.enabled = false;
    let mut local = Transform::new();
    behavior.update(&mut local, 3.0);
    assert_eq!(local, Transform::new());

    behavior.reset();
    assert!(behavior.enabled);
}

#[test]
fn custom_behavior_moves_node_every_update() {
    let mut scene = Scene::new();
    scene.add_object(GameObject::new("walker").with_behavior(Walker));

    scene.update(0.016);
    scene.update(0.016);
    scene.reset_behaviors();

    assert_eq!(
        scene.find("walker").unwrap().local_transform().position,
        Vector3::new(2.0, 0.0, 0.0)
    );
}
