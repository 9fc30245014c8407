use bbox::BoundingBox;
use nalgebra::Point3;
use std::path::PathBuf;

use implicit_surface_arrangement::{polymesh::PolyMesh, Primitive, Settings};

fn main() {
    let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
    let settings = Settings {
        resolution: 16,
        scene_aabb_margin: 0.0,
    };
    let sphere = Primitive::Sphere {
        center: [0.0, 0.0, 0.0],
        radius: 0.5,
    };

    let result = implicit_surface_arrangement::run(&settings, &bounds, &[sphere]).unwrap();
    let mesh = PolyMesh::from_extracted(&result.extracted, &result.patches, None);
    mesh.export_as_obj(&PathBuf::from("sphere.obj"), false).unwrap();
}
