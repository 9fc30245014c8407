#[macro_use]
extern crate bencher;

use bencher::Bencher;

use bbox::BoundingBox;
use nalgebra::Point3;

use implicit_surface_arrangement::{Primitive, Settings};

fn bench_sphere_r16(b: &mut Bencher) {
    let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
    let settings = Settings {
        resolution: 16,
        scene_aabb_margin: 0.0,
    };
    let primitives = vec![Primitive::Sphere {
        center: [0.0, 0.0, 0.0],
        radius: 0.5,
    }];
    b.iter(|| implicit_surface_arrangement::run(&settings, &bounds, &primitives).unwrap());
}

fn bench_two_planes_r16(b: &mut Bencher) {
    let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
    let settings = Settings {
        resolution: 16,
        scene_aabb_margin: 0.0,
    };
    let primitives = vec![
        Primitive::Plane {
            point: [0.0, 0.0, 0.0],
            normal: [1.0, 0.0, 0.0],
        },
        Primitive::Plane {
            point: [0.0, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
        },
    ];
    b.iter(|| implicit_surface_arrangement::run(&settings, &bounds, &primitives).unwrap());
}

benchmark_group!(benches, bench_sphere_r16, bench_two_planes_r16);
benchmark_main!(benches);
