//! Integration scenarios mirroring the crate's testable properties: an AABB
//! fill, a sphere clear carved out of it, a sphere paint layered over that,
//! idempotent re-application, order-independence of disjoint edits, and GC
//! preservation of voxel contents.

use voxdag::color::Albedo;
use voxdag::editor::shapes::{AabbEditor, FillMode, PointEditor, SphereEditor, SphereMode};
use voxdag::spatial::vector::V3c;
use voxdag::{ColorPointer, NodePointer, NodePoolConfig, VoxDag};

fn small_world() -> VoxDag {
    let node_cfg = NodePoolConfig {
        level_count: 4,
        top_level_count: 1,
        word_bits_per_page: 8,
        page_bits_per_bucket: 1,
        bucket_bits_per_top_level: 3,
        bucket_bits_per_bottom_level: 4,
    };
    let color_cfg = voxdag::ColorPoolConfig {
        leaf_level: node_cfg.leaf_level(),
        node_bits_per_node_page: 4,
        word_bits_per_leaf_page: 9,
        node_page_count: 16,
        leaf_page_count: 16,
        keep_history: false,
    };
    VoxDag::with_config(node_cfg, color_cfg).unwrap()
}

#[test]
fn scenario_1_fill_aabb_normalizes_to_filled_root() {
    let world = small_world();
    let side = world.node_pool().config().world_side();
    let red = Albedo::rgba(255, 0, 0, 255);
    world
        .apply(&AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(side, side, side),
            mode: FillMode::Fill,
            color: red,
        })
        .unwrap();

    let (geo_root, color_root) = world.get_root();
    assert_eq!(geo_root, NodePointer::Filled);
    assert_eq!(color_root, ColorPointer::SolidColor(red));
    assert_eq!(world.node_pool().node_count(), 0);
}

#[test]
fn scenario_2_clearing_a_sphere_carves_a_hole() {
    let world = small_world();
    let side = world.node_pool().config().world_side();
    let red = Albedo::rgba(255, 0, 0, 255);
    world
        .apply(&AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(side, side, side),
            mode: FillMode::Fill,
            color: red,
        })
        .unwrap();

    let center = V3c::new(side / 2, side / 2, side / 2);
    world
        .apply(&SphereEditor {
            center,
            radius: side / 8,
            mode: SphereMode::Clear,
            color: Albedo::default(),
        })
        .unwrap();

    let (geo_root, _) = world.get_root();
    assert_ne!(geo_root, NodePointer::Filled);
    assert_ne!(geo_root, NodePointer::Null);

    let (occ, _) = world.get_voxel(center);
    assert!(!occ);
    let (occ, c) = world.get_voxel(V3c::new(0, 0, 0));
    assert!(occ);
    assert_eq!(c, red);
    let (occ, c) = world.get_voxel(V3c::new(side - 1, side - 1, side - 1));
    assert!(occ);
    assert_eq!(c, red);
}

#[test]
fn scenario_3_painting_a_wider_sphere_leaves_the_cleared_core_alone() {
    let world = small_world();
    let side = world.node_pool().config().world_side();
    let red = Albedo::rgba(255, 0, 0, 255);
    let blue = Albedo::rgba(0, 0, 255, 255);
    let center = V3c::new(side / 2, side / 2, side / 2);
    let inner_radius = side / 8;
    let outer_radius = side / 8 + 2;

    world
        .apply(&AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(side, side, side),
            mode: FillMode::Fill,
            color: red,
        })
        .unwrap();
    world
        .apply(&SphereEditor {
            center,
            radius: inner_radius,
            mode: SphereMode::Clear,
            color: Albedo::default(),
        })
        .unwrap();
    world
        .apply(&SphereEditor {
            center,
            radius: outer_radius,
            mode: SphereMode::Paint,
            color: blue,
        })
        .unwrap();

    // still cleared at the core
    let (occ, _) = world.get_voxel(center);
    assert!(!occ);

    // in the painted shell: occupied and repainted blue
    let shell_point = V3c::new(center.x, center.y, center.z + inner_radius + 1);
    let (occ, c) = world.get_voxel(shell_point);
    assert!(occ);
    assert_eq!(c, blue);

    // far outside every sphere: still the original red fill
    let (occ, c) = world.get_voxel(V3c::new(0, 0, 0));
    assert!(occ);
    assert_eq!(c, red);
}

#[test]
fn scenario_4_repeating_an_identical_fill_is_a_no_op() {
    let world = small_world();
    let side = world.node_pool().config().world_side();
    let editor = AabbEditor {
        min: V3c::new(0, 0, 0),
        max: V3c::new(side / 2, side / 2, side / 2),
        mode: FillMode::Fill,
        color: Albedo::rgba(9, 8, 7, 255),
    };
    world.apply(&editor).unwrap();
    let first = world.get_root();
    world.apply(&editor).unwrap();
    let second = world.get_root();
    assert_eq!(first, second);
}

#[test]
fn scenario_5_disjoint_edit_order_does_not_affect_the_result() {
    let side = small_world().node_pool().config().world_side();
    let a = PointEditor {
        position: V3c::new(0, 0, 0),
        value: true,
        color: Albedo::rgba(1, 2, 3, 255),
    };
    let b = PointEditor {
        position: V3c::new(side - 1, side - 1, side - 1),
        value: true,
        color: Albedo::rgba(4, 5, 6, 255),
    };

    let forward = small_world();
    forward.apply(&a).unwrap();
    forward.apply(&b).unwrap();

    let backward = small_world();
    backward.apply(&b).unwrap();
    backward.apply(&a).unwrap();

    assert_eq!(forward.get_root(), backward.get_root());
}

#[test]
fn scenario_6_gc_preserves_voxel_contents() {
    let mut world = small_world();
    let side = world.node_pool().config().world_side();
    let red = Albedo::rgba(255, 0, 0, 255);
    let blue = Albedo::rgba(0, 0, 255, 255);
    let center = V3c::new(side / 2, side / 2, side / 2);

    world
        .apply(&AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(side, side, side),
            mode: FillMode::Fill,
            color: red,
        })
        .unwrap();
    world
        .apply(&SphereEditor {
            center,
            radius: side / 8,
            mode: SphereMode::Clear,
            color: Albedo::default(),
        })
        .unwrap();
    world
        .apply(&SphereEditor {
            center,
            radius: side / 8 + 2,
            mode: SphereMode::Paint,
            color: blue,
        })
        .unwrap();

    let sample_points = [
        V3c::new(0, 0, 0),
        center,
        V3c::new(center.x, center.y, center.z + side / 8 + 1),
        V3c::new(side - 1, side - 1, side - 1),
    ];
    let before: Vec<_> = sample_points.iter().map(|&p| world.get_voxel(p)).collect();

    world.garbage_collect().unwrap();

    let after: Vec<_> = sample_points.iter().map(|&p| world.get_voxel(p)).collect();
    assert_eq!(before, after);
}
