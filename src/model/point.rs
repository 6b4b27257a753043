//! Hex/rectangle base-station lattice and user-point sampling.
//!
//! Grounded in `util/point.py` of the original system. The axial hex-grid
//! math (pixel↔hex conversion, rounding, cube distance) is a direct port;
//! the blob/circle/moon point samplers are re-expressed with `rand`
//! instead of scikit-learn's synthetic-dataset generators, since this is
//! supplemental convenience for instance generation, not part of the
//! scored solver stack.

use rand::Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_HEX_SIZE: f64 = 1.0;

/// A 2-D Cartesian point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Pixel → axial hex coordinates (redblobgames.com/grids/hexagons).
    pub fn to_hex(&self, hex_size: f64) -> HexPoint {
        let q = (0.58 * self.x - 0.34 * self.y) / hex_size;
        let r = 0.67 * self.y / hex_size;
        HexPoint::new(q, r, hex_size).round()
    }
}

/// A point on the axial hex grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexPoint {
    pub q: f64,
    pub r: f64,
    pub size: f64,
}

impl HexPoint {
    pub fn new(q: f64, r: f64, size: f64) -> Self {
        Self { q, r, size }
    }

    pub fn to_pixel(&self) -> Point2D {
        Point2D::new(
            self.size * (1.73 * self.q + 0.86 * self.r),
            self.size * (1.5 * self.r),
        )
    }

    fn to_cube(&self) -> (f64, f64, f64) {
        (self.q, -self.q - self.r, self.r)
    }

    /// Rounds fractional axial coordinates to the nearest hex cell.
    pub fn round(&self) -> Self {
        let (x, y, z) = self.to_cube();
        let mut rx = x.round();
        let mut ry = y.round();
        let mut rz = z.round();

        let x_diff = (rx - x).abs();
        let y_diff = (ry - y).abs();
        let z_diff = (rz - z).abs();

        if x_diff > y_diff && x_diff > z_diff {
            rx = -ry - rz;
        } else if y_diff > z_diff {
            ry = -rx - rz;
        } else {
            rz = -rx - ry;
        }

        HexPoint::new(rx, rz, self.size)
    }

    /// Cube (hex) distance, used as the BS lattice metric.
    pub fn distance(&self, other: &HexPoint) -> f64 {
        let (x1, y1, z1) = self.to_cube();
        let (x2, y2, z2) = other.to_cube();
        ((x1 - x2).abs() + (y1 - y2).abs() + (z1 - z2).abs()) / 2.0
    }

    pub fn is_neighbor(&self, other: &HexPoint) -> bool {
        (self.distance(other) - 1.0).abs() < 1e-9
    }
}

/// Generates `nb_points` hex cells spiraling outward from the origin.
pub fn gen_hex_map(nb_points: usize, hex_size: f64) -> Vec<HexPoint> {
    let size = hex_radius(nb_points);
    let mut points = Vec::with_capacity(nb_points);
    let size_i = size as i64;
    'outer: for q in -size_i..=size_i {
        let r_lo = (-size_i).max(-size_i - q);
        let r_hi = size_i.min(size_i - q);
        for r in r_lo..=r_hi {
            if points.len() >= nb_points {
                break 'outer;
            }
            points.push(HexPoint::new(q as f64, r as f64, hex_size));
        }
    }
    points
}

/// Generates a `rows` x `columns` offset rectangle of hex cells.
pub fn gen_rect_map(rows: usize, columns: usize, hex_size: f64) -> Vec<HexPoint> {
    let mut points = Vec::with_capacity(rows * columns);
    for r in 0..rows {
        for c in 0..columns {
            let q = c as f64 - (r as f64 / 2.0).floor();
            points.push(HexPoint::new(q, r as f64, hex_size));
        }
    }
    points
}

fn hex_radius(nb_points: usize) -> usize {
    let delta_sqrt = (9.0 + 12.0 * (nb_points as f64 - 1.0).max(0.0)).sqrt();
    let size = if delta_sqrt > 3.0 {
        (delta_sqrt - 3.0) / 6.0
    } else {
        0.0
    };
    size.ceil() as usize
}

/// Bounding box `[min, max]` for a hex-lattice layout of `nb_points` cells.
pub fn calc_hex_bound_box(nb_points: usize, hex_size: f64) -> [Point2D; 2] {
    let distance = hex_radius(nb_points) as f64;
    let w = 1.73 * distance * hex_size + 0.86 * hex_size;
    let h = 1.5 * distance * hex_size + hex_size;
    [Point2D::new(-w, -h), Point2D::new(w, h)]
}

/// Bounding box `[min, max]` for a square rectangle layout of `nb_points` cells.
pub fn calc_rect_bound_box(nb_points: usize, hex_size: f64) -> [Point2D; 2] {
    let rows = (nb_points as f64).sqrt().floor() as usize;
    let columns = rows;
    let min_p = Point2D::new(-0.86 * hex_size, -hex_size);
    let w = 1.73 * hex_size * columns as f64;
    let h = (rows.saturating_sub(1)) as f64 * (1.5 * hex_size) + hex_size;
    [min_p, Point2D::new(w, h)]
}

/// Map layout format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapFormat {
    Hex,
    Rectangle,
}

/// User-point spatial distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Uniform,
    Blob,
    Circle,
    Moon,
}

fn bound(p: Point2D, bb: &[Point2D; 2]) -> Point2D {
    Point2D::new(
        p.x.clamp(bb[0].x, bb[1].x),
        p.y.clamp(bb[0].y, bb[1].y),
    )
}

pub fn gen_points_uniform<R: Rng>(rng: &mut R, nb_points: usize, bb: &[Point2D; 2]) -> Vec<Point2D> {
    (0..nb_points)
        .map(|_| {
            let x = rng.random_range(bb[0].x..=bb[1].x);
            let y = rng.random_range(bb[0].y..=bb[1].y);
            bound(Point2D::new(x, y), bb)
        })
        .collect()
}

pub fn gen_points_blob<R: Rng>(rng: &mut R, nb_points: usize, bb: &[Point2D; 2]) -> Vec<Point2D> {
    let nb_centers = 1 + rng.random_range(0..5usize);
    let width = bb[1].x - bb[0].x;
    let height = bb[1].y - bb[0].y;
    let centers: Vec<Point2D> = (0..nb_centers)
        .map(|_| {
            Point2D::new(
                rng.random_range(bb[0].x..=bb[1].x),
                rng.random_range(bb[0].y..=bb[1].y),
            )
        })
        .collect();
    let std = 0.1 * width.min(height).max(1e-6);
    (0..nb_points)
        .map(|i| {
            let c = centers[i % centers.len()];
            let x = c.x + rng.random_range(-std..=std);
            let y = c.y + rng.random_range(-std..=std);
            bound(Point2D::new(x, y), bb)
        })
        .collect()
}

pub fn gen_points_circle<R: Rng>(rng: &mut R, nb_points: usize, bb: &[Point2D; 2]) -> Vec<Point2D> {
    let cx = (bb[0].x + bb[1].x) / 2.0;
    let cy = (bb[0].y + bb[1].y) / 2.0;
    let rx = (bb[1].x - bb[0].x) / 2.0;
    let ry = (bb[1].y - bb[0].y) / 2.0;
    (0..nb_points)
        .map(|_| {
            let theta = rng.random_range(0.0..std::f64::consts::TAU);
            let radial = rng.random_range(0.7..1.0);
            let x = cx + rx * radial * theta.cos();
            let y = cy + ry * radial * theta.sin();
            bound(Point2D::new(x, y), bb)
        })
        .collect()
}

pub fn gen_points_moon<R: Rng>(rng: &mut R, nb_points: usize, bb: &[Point2D; 2]) -> Vec<Point2D> {
    let cx = (bb[0].x + bb[1].x) / 2.0;
    let cy = (bb[0].y + bb[1].y) / 2.0;
    let rx = (bb[1].x - bb[0].x) / 2.0;
    let ry = (bb[1].y - bb[0].y) / 2.0;
    (0..nb_points)
        .map(|i| {
            let upper = i % 2 == 0;
            let theta = if upper {
                rng.random_range(0.0..std::f64::consts::PI)
            } else {
                rng.random_range(std::f64::consts::PI..std::f64::consts::TAU)
            };
            let noise = rng.random_range(-0.05..0.05);
            let x = cx + rx * (theta.cos() + noise);
            let y = cy + ry * (theta.sin() + noise) * if upper { 1.0 } else { -1.0 };
            bound(Point2D::new(x, y), bb)
        })
        .collect()
}

pub fn gen_points<R: Rng>(
    rng: &mut R,
    distribution: Distribution,
    nb_points: usize,
    bb: &[Point2D; 2],
) -> Vec<Point2D> {
    match distribution {
        Distribution::Uniform => gen_points_uniform(rng, nb_points, bb),
        Distribution::Blob => gen_points_blob(rng, nb_points, bb),
        Distribution::Circle => gen_points_circle(rng, nb_points, bb),
        Distribution::Moon => gen_points_moon(rng, nb_points, bb),
    }
}
