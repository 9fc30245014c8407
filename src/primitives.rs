//! The primitive evaluator: `evaluate(primitive_index, point) -> f64` of
//! spec §6. Spec §1 calls the evaluation kernels themselves an external
//! collaborator; this module is the concrete stand-in needed to actually
//! run the pipeline end to end (the CSG tree that *selects* primitives, and
//! the JSON scene loader's parsing into this enum, stay out of scope per
//! spec §1 beyond the tagged-sum primitive descriptor itself).
//!
//! Evaluation formulas follow the reference SDF construction used by the
//! original implementation (signed distance, negative inside).

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// One CSG primitive, tagged by type, matching spec §6's field list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Plane {
        point: [f64; 3],
        normal: [f64; 3],
    },
    Line {
        point: [f64; 3],
        direction: [f64; 3],
    },
    Sphere {
        center: [f64; 3],
        radius: f64,
    },
    Cylinder {
        axis_point: [f64; 3],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        axis_direction: Option<[f64; 3]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        axis_point2: Option<[f64; 3]>,
        radius: f64,
    },
    Cone {
        apex_point: [f64; 3],
        axis_direction: [f64; 3],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        apex_angle: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius1: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radius2: Option<f64>,
        /// Height of the explicit truncated cone when `radius1`/`radius2`
        /// are given instead of an `apex_angle`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<f64>,
    },
    Constant {
        value: f64,
    },
    Box {
        center: [f64; 3],
        half_size: [f64; 3],
    },
    Mesh {
        points: Vec<[f64; 3]>,
        indices: Vec<u32>,
        faces: Vec<MeshFaceRange>,
    },
    Extrude {
        profile: Vec<[f64; 2]>,
        axis_point: [f64; 3],
        axis_direction: [f64; 3],
        height: f64,
    },
}

/// A polygon within a `Mesh` primitive's `points`/`indices` polygon soup.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MeshFaceRange {
    pub begin: u32,
    pub count: u32,
}

fn v(p: [f64; 3]) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

fn pt(p: [f64; 3]) -> Point3<f64> {
    Point3::new(p[0], p[1], p[2])
}

impl Primitive {
    /// Evaluates the primitive's signed distance field at `point`.
    /// Negative is inside, matching the sign convention spec §4.2 relies on
    /// (`σ[j,i] = sgn(S[j,i])`).
    pub fn evaluate(&self, point: &Point3<f64>) -> f64 {
        match self {
            Primitive::Constant { value } => *value,
            Primitive::Plane { point: p0, normal } => {
                let n = v(*normal).normalize();
                n.dot(&(point - pt(*p0)))
            }
            Primitive::Line {
                point: p0,
                direction,
            } => {
                // A line is a zero-radius, infinite cylinder (spec §6).
                infinite_line_sdf(point, &pt(*p0), &v(*direction).normalize())
            }
            Primitive::Sphere { center, radius } => (point - pt(*center)).norm() - radius,
            Primitive::Cylinder {
                axis_point,
                axis_direction,
                axis_point2,
                radius,
            } => {
                let offset = match (axis_direction, axis_point2) {
                    (Some(d), _) => v(*d),
                    (None, Some(p2)) => pt(*p2) - pt(*axis_point),
                    (None, None) => Vector3::z(),
                };
                cylinder_sdf(point, &pt(*axis_point), &offset, *radius)
            }
            Primitive::Cone {
                apex_point,
                axis_direction,
                apex_angle,
                radius1,
                radius2,
                height,
            } => cone_sdf(point, *apex_point, *axis_direction, *apex_angle, *radius1, *radius2, *height),
            Primitive::Box { center, half_size } => box_sdf(point, *center, *half_size),
            Primitive::Mesh {
                points,
                indices,
                faces,
            } => mesh_sdf(point, points, indices, faces),
            Primitive::Extrude {
                profile,
                axis_point,
                axis_direction,
                height,
            } => extrude_sdf(point, profile, *axis_point, *axis_direction, *height),
        }
    }
}

/// Signed distance to an infinite line (the `Line` primitive is a
/// zero-radius, infinite-length cylinder).
fn infinite_line_sdf(point: &Point3<f64>, axis_point: &Point3<f64>, axis_dir: &Vector3<f64>) -> f64 {
    let to_point = point - axis_point;
    let along = to_point.dot(axis_dir);
    let closest = to_point - axis_dir * along;
    closest.norm()
}

/// Signed distance to a finite cylinder running from `bottom_center` to
/// `bottom_center + offset`, following the original evaluator's `ba`/`pa`
/// construction exactly (including its `sign(d) * sqrt(abs(d)) / baba`
/// closing step).
fn cylinder_sdf(point: &Point3<f64>, bottom_center: &Point3<f64>, offset: &Vector3<f64>, radius: f64) -> f64 {
    let ba = -offset;
    let pa = point - (bottom_center + offset);
    let baba = ba.norm_squared();
    let paba = pa.dot(&ba);
    let x = (pa * baba - ba * paba).norm() - radius * baba;
    let y = (paba - baba * 0.5).abs() - baba * 0.5;
    let x2 = x * x;
    let y2 = y * y * baba;
    let d = if x.max(y) < 0.0 {
        -x2.min(y2)
    } else {
        (if x > 0.0 { x2 } else { 0.0 }) + (if y > 0.0 { y2 } else { 0.0 })
    };
    d.signum() * d.abs().sqrt() / baba
}

fn box_sdf(point: &Point3<f64>, center: [f64; 3], half_size: [f64; 3]) -> f64 {
    let p = point - pt(center);
    let half = v(half_size);
    let d = Vector3::new(p.x.abs() - half.x, p.y.abs() - half.y, p.z.abs() - half.z);
    let outside = Vector3::new(d.x.max(0.0), d.y.max(0.0), d.z.max(0.0)).norm();
    let inside = d.x.max(d.y).max(d.z).min(0.0);
    outside + inside
}

/// Approximate signed distance to a finite cone/frustum, matching the
/// `evaluate(cone_descriptor_t, ...)` construction (inigo-quilez style
/// rounded-frustum SDF) of the original implementation. `apex_angle` takes
/// precedence over an explicit `radius1`/`radius2`/`height` triple.
fn cone_sdf(
    point: &Point3<f64>,
    apex_point: [f64; 3],
    axis_direction: [f64; 3],
    apex_angle: Option<f64>,
    radius1: Option<f64>,
    radius2: Option<f64>,
    height: Option<f64>,
) -> f64 {
    let axis = v(axis_direction).normalize();
    let h = height.unwrap_or(1.0);
    let (r1, r2) = if let Some(angle) = apex_angle {
        (0.0, h * (angle / 2.0).tan())
    } else {
        (radius1.unwrap_or(0.0), radius2.unwrap_or(0.0))
    };
    let bottom = pt(apex_point) + axis * h;
    let ba = bottom - pt(apex_point);
    let pa = point - pt(apex_point);
    let baba = ba.norm_squared();
    let paba = pa.dot(&ba) / baba;
    let papa = pa.norm_squared();
    let x = (papa - paba * paba * baba).max(0.0).sqrt();
    let cax = (x - if paba < 0.5 { r1 } else { r2 }).max(0.0);
    let cay = (paba - 0.5).abs() - 0.5;
    let rba = r2 - r1;
    let k = rba * rba + baba;
    let f = ((rba * (x - r1) + paba * baba) / k).clamp(0.0, 1.0);
    let cbx = x - r1 - f * rba;
    let cby = paba - f;
    let s = if cbx < 0.0 && cay < 0.0 { -1.0 } else { 1.0 };
    s * (cax * cax + cay * cay * baba)
        .min(cbx * cbx + cby * cby * baba)
        .sqrt()
}

/// Closest-point distance to a mesh polygon soup, signed by ray-parity
/// inside/outside classification (shoots along +X), matching the original's
/// `evaluate(mesh_descriptor_t, ...)`.
fn mesh_sdf(point: &Point3<f64>, points: &[[f64; 3]], indices: &[u32], faces: &[MeshFaceRange]) -> f64 {
    let mut min_distance = f64::INFINITY;
    let mut crossings = 0u32;
    let ray_dir = Vector3::new(1.0, 0.0, 0.0);

    for face in faces {
        let begin = face.begin as usize;
        let count = face.count as usize;
        if count < 3 {
            continue;
        }
        let p0 = pt(points[indices[begin] as usize]);
        let mut hit_this_face = false;
        for j in 1..count - 1 {
            let p1 = pt(points[indices[begin + j] as usize]);
            let p2 = pt(points[indices[begin + j + 1] as usize]);
            let d = triangle_distance(point, &p0, &p1, &p2);
            if d < min_distance {
                min_distance = d;
            }
            if !hit_this_face && ray_intersects_triangle(point, &ray_dir, &p0, &p1, &p2) {
                hit_this_face = true;
            }
        }
        if hit_this_face {
            crossings += 1;
        }
    }

    if min_distance < 1e-8 {
        0.0
    } else if crossings % 2 == 1 {
        -min_distance
    } else {
        min_distance
    }
}

fn triangle_distance(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    // Closest distance from `p` to triangle (a,b,c), clamping the
    // barycentric projection to the triangle's interior/edges.
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (p - a).norm();
    }
    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (p - b).norm();
    }
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let t = d1 / (d1 - d3);
        return (p - (a + ab * t)).norm();
    }
    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (p - c).norm();
    }
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let t = d2 / (d2 - d6);
        return (p - (a + ac * t)).norm();
    }
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (p - (b + (c - b) * t)).norm();
    }
    let denom = 1.0 / (va + vb + vc);
    let vv = vb * denom;
    let ww = vc * denom;
    (p - (a + ab * vv + ac * ww)).norm()
}

fn ray_intersects_triangle(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> bool {
    // Moller-Trumbore.
    let edge1 = b - a;
    let edge2 = c - a;
    let h = dir.cross(&edge2);
    let det = edge1.dot(&h);
    if det.abs() < 1e-12 {
        return false;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(&h) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&edge1);
    let w = dir.dot(&q) * inv_det;
    if w < 0.0 || u + w > 1.0 {
        return false;
    }
    let t = edge2.dot(&q) * inv_det;
    t > 1e-9
}

/// Signed distance to a prism obtained by extruding a closed 2D polygon
/// along `axis_direction` for `height`, starting at `axis_point`. The
/// profile is evaluated in the plane perpendicular to the axis.
fn extrude_sdf(
    point: &Point3<f64>,
    profile: &[[f64; 2]],
    axis_point: [f64; 3],
    axis_direction: [f64; 3],
    height: f64,
) -> f64 {
    let axis = v(axis_direction).normalize();
    // Build an orthonormal basis (u, w) for the cross-section plane.
    let arbitrary = if axis.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = axis.cross(&arbitrary).normalize();
    let w = axis.cross(&u);

    let rel = point - pt(axis_point);
    let along = rel.dot(&axis);
    let x = rel.dot(&u);
    let y = rel.dot(&w);

    let planar_sdf = polygon_sdf(x, y, profile);
    let slab_sdf = (along - height / 2.0).abs() - height / 2.0;

    let outside_planar = planar_sdf.max(0.0);
    let outside_slab = slab_sdf.max(0.0);
    let outside = (outside_planar * outside_planar + outside_slab * outside_slab).sqrt();
    let inside = planar_sdf.max(slab_sdf).min(0.0);
    outside + inside
}

/// Signed distance from `(x, y)` to a closed polygon, negative inside,
/// via winding-number classification and closest-edge distance.
fn polygon_sdf(x: f64, y: f64, profile: &[[f64; 2]]) -> f64 {
    if profile.len() < 3 {
        return f64::INFINITY;
    }
    let mut min_dist_sq = f64::INFINITY;
    let mut inside = false;
    let n = profile.len();
    for i in 0..n {
        let [ax, ay] = profile[i];
        let [bx, by] = profile[(i + 1) % n];
        let (ex, ey) = (bx - ax, by - ay);
        let (px, py) = (x - ax, y - ay);
        let t = ((px * ex + py * ey) / (ex * ex + ey * ey)).clamp(0.0, 1.0);
        let (cx, cy) = (ax + ex * t, ay + ey * t);
        let (dx, dy) = (x - cx, y - cy);
        let dist_sq = dx * dx + dy * dy;
        if dist_sq < min_dist_sq {
            min_dist_sq = dist_sq;
        }
        if (ay > y) != (by > y) {
            let x_cross = ax + (y - ay) * ex / ey;
            if x < x_cross {
                inside = !inside;
            }
        }
    }
    let dist = min_dist_sq.sqrt();
    if inside {
        -dist
    } else {
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_signed_distance() {
        let sphere = Primitive::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 1.0,
        };
        assert_relative_eq!(sphere.evaluate(&Point3::new(0.0, 0.0, 0.0)), -1.0, epsilon = 1e-12);
        assert_relative_eq!(sphere.evaluate(&Point3::new(2.0, 0.0, 0.0)), 1.0, epsilon = 1e-12);
        assert_relative_eq!(sphere.evaluate(&Point3::new(1.0, 0.0, 0.0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn plane_signed_distance() {
        let plane = Primitive::Plane {
            point: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
        };
        assert_relative_eq!(plane.evaluate(&Point3::new(5.0, -3.0, 2.0)), 2.0, epsilon = 1e-12);
        assert_relative_eq!(plane.evaluate(&Point3::new(5.0, -3.0, -2.0)), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn box_signed_distance_center_is_negative() {
        let cube = Primitive::Box {
            center: [0.0, 0.0, 0.0],
            half_size: [1.0, 1.0, 1.0],
        };
        assert!(cube.evaluate(&Point3::new(0.0, 0.0, 0.0)) < 0.0);
        assert!(cube.evaluate(&Point3::new(5.0, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn line_is_zero_radius_cylinder() {
        let line = Primitive::Line {
            point: [0.0, 0.0, 0.0],
            direction: [0.0, 0.0, 1.0],
        };
        assert_relative_eq!(line.evaluate(&Point3::new(3.0, 4.0, 100.0)), 5.0, epsilon = 1e-9);
    }
}
