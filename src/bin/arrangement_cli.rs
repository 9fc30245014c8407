//! CLI boundary for the arrangement pipeline (spec §6's "CLI shape"). A thin
//! shim over `implicit_surface_arrangement::run`; holds none of the core
//! logic.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bbox::BoundingBox;
use clap::{Parser, Subcommand};
use nalgebra::Point3;

#[cfg(feature = "obj")]
use implicit_surface_arrangement::polymesh::PolyMesh;
use implicit_surface_arrangement::{load_scene, run, solve_result, Settings};

#[derive(Parser, Debug)]
#[command(name = "arrangement-cli")]
#[command(about = "Runs the implicit surface arrangement pipeline over a scene file")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads a scene + settings, executes the pipeline once, and reports the
    /// resulting mesh (collapses spec §6's `update_setting` /
    /// `update_environment` / `execute_solver` into one shot).
    Run {
        /// Path to a JSON array of tagged CSG primitive descriptors.
        #[arg(long)]
        scene: PathBuf,

        /// Background mesh resolution along each axis.
        #[arg(long, default_value_t = 16)]
        resolution: u32,

        /// Extra margin added around the scene's bounding box.
        #[arg(long, default_value_t = 0.0)]
        margin: f64,

        /// Writes the resulting mesh as an OBJ file at this path (requires
        /// the `obj` feature).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Prints per-stage counts after the run (spec §6's
        /// `print_statistics`; there is no standing statistics facility to
        /// clear, so this crate has no `clear_statistics` counterpart).
        #[arg(long)]
        stats: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Run {
            scene,
            resolution,
            margin,
            out,
            stats,
        } => {
            let scene_json = fs::read_to_string(&scene).with_context(|| format!("reading scene file {}", scene.display()))?;
            let primitives = load_scene(&scene_json)?;

            let points: Vec<Point3<f64>> = primitives
                .iter()
                .flat_map(|p| bounding_hint(p))
                .collect();
            let bounds = if points.is_empty() {
                BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0))
            } else {
                implicit_surface_arrangement::scene_bounds(&points, margin.max(1.0))?
            };

            let settings = Settings {
                resolution,
                scene_aabb_margin: margin,
            };
            let result = run(&settings, &bounds, &primitives)?;
            let solved = solve_result(&result, None);

            println!("success: {}", solved.success);
            println!("surface integral: {}", solved.surf_int);
            println!("volume integral: {}", solved.vol_int);

            if stats {
                println!("patches: {}", result.patches.len());
                println!("shells: {}", result.shells.len());
                println!("components: {}", result.components.len());
                println!("cells: {}", result.cells.len());
            }

            if let Some(path) = out {
                write_obj(&result.extracted, &result.patches, &path)?;
            }

            Ok(())
        }
    }
}

/// A handful of points a primitive's own geometry hints at, used only to
/// seed a default bounding box when the caller doesn't pass one explicitly.
/// Primitives with no inherent extent (`Plane`, `Line`, `Constant`) hint at
/// nothing and fall back to the `[-1, 1]^3` default above.
fn bounding_hint(primitive: &implicit_surface_arrangement::Primitive) -> Vec<Point3<f64>> {
    use implicit_surface_arrangement::Primitive::*;
    match primitive {
        Sphere { center, radius } => vec![
            Point3::new(center[0] - radius, center[1] - radius, center[2] - radius),
            Point3::new(center[0] + radius, center[1] + radius, center[2] + radius),
        ],
        Box { center, half_size } => vec![
            Point3::new(center[0] - half_size[0], center[1] - half_size[1], center[2] - half_size[2]),
            Point3::new(center[0] + half_size[0], center[1] + half_size[1], center[2] + half_size[2]),
        ],
        Cylinder { axis_point, radius, .. } => vec![
            Point3::new(axis_point[0] - radius, axis_point[1] - radius, axis_point[2] - radius),
            Point3::new(axis_point[0] + radius, axis_point[1] + radius, axis_point[2] + radius),
        ],
        Mesh { points, .. } => points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
        _ => Vec::new(),
    }
}

#[cfg(feature = "obj")]
fn write_obj(extracted: &implicit_surface_arrangement::mesh_extraction::ExtractedMesh, patches: &[implicit_surface_arrangement::topology::Patch], path: &PathBuf) -> Result<()> {
    let mesh = PolyMesh::from_extracted(extracted, patches, None);
    mesh.export_as_obj(path, false).with_context(|| format!("writing OBJ to {}", path.display()))?;
    Ok(())
}

#[cfg(not(feature = "obj"))]
fn write_obj(_extracted: &implicit_surface_arrangement::mesh_extraction::ExtractedMesh, _patches: &[implicit_surface_arrangement::topology::Patch], _path: &PathBuf) -> Result<()> {
    anyhow::bail!("--out requires the `obj` feature")
}
