//! Minimal end-to-end demo: fill a region, carve a sphere out of it, read a
//! few voxels back, then flush and garbage-collect. Run with
//! `RUST_LOG=debug cargo run --example basic_edit` to see the pool/flush
//! logging described in the crate docs.

use voxdag::color::Albedo;
use voxdag::editor::shapes::{AabbEditor, FillMode, SphereEditor, SphereMode};
use voxdag::spatial::vector::V3c;
use voxdag::{InMemoryBackend, VoxDag};

fn main() {
    env_logger::init();

    let mut world = VoxDag::new().expect("default config is valid");
    let world_side = world.node_pool().config().world_side();
    let half = world_side / 2;

    world
        .apply(&AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(half, half, half),
            mode: FillMode::Fill,
            color: Albedo::rgba(200, 120, 40, 255),
        })
        .expect("fill succeeds");

    world
        .apply(&SphereEditor {
            center: V3c::new(half / 2, half / 2, half / 2),
            radius: half / 4,
            mode: SphereMode::Clear,
            color: Albedo::default(),
        })
        .expect("carve succeeds");

    let (occupied, color) = world.get_voxel(V3c::new(0, 0, 0));
    println!("corner voxel: occupied={occupied} color={color:?}");

    let mut geometry_backend = InMemoryBackend::default();
    world.flush_geometry(&mut geometry_backend);
    let mut color_backend = InMemoryBackend::default();
    world.flush_color(&mut color_backend);

    world.garbage_collect().expect("gc succeeds");
    println!(
        "live geometry nodes after gc: {}",
        world.node_pool().node_count()
    );
}
