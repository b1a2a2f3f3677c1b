//! Continuous-space value types and the segment/polygon predicates built on them.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::ConfigurationError;

/// Slack applied to orientation tests so that touching segments count as crossing.
const ORIENTATION_EPSILON: f64 = 1e-12;

/// Immutable point in the terminal's continuous coordinate space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f64,
    y: f64,
}

impl Position {
    /// Sentinel meaning "no position". Goals set to this value clear the agent's route.
    pub const NONE: Position = Position {
        x: f64::NEG_INFINITY,
        y: f64::NEG_INFINITY,
    };

    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate.
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Reports whether this is the [`Position::NONE`] sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.x == f64::NEG_INFINITY && self.y == f64::NEG_INFINITY
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(&self, other: Position) -> f64 {
        (*self - other).length()
    }

    /// Vector pointing from this position toward `other`.
    #[must_use]
    pub fn vector_to(&self, other: Position) -> Vector {
        other - *self
    }
}

impl Sub for Position {
    type Output = Vector;

    fn sub(self, rhs: Position) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Vector> for Position {
    type Output = Position;

    fn add(self, rhs: Vector) -> Position {
        Position::new(self.x + rhs.x(), self.y + rhs.y())
    }
}

/// Immutable two-dimensional vector used for velocities, forces and displacements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    x: f64,
    y: f64,
}

impl Vector {
    /// The zero vector.
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    /// Creates a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Horizontal component.
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector with the same direction, or zero when the length is zero or non-finite.
    #[must_use]
    pub fn normalize(&self) -> Vector {
        let length = self.length();
        if length <= f64::EPSILON || !length.is_finite() {
            return Vector::ZERO;
        }
        Vector::new(self.x / length, self.y / length)
    }

    /// Dot product.
    #[must_use]
    pub fn dot(&self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Counter-clockwise perpendicular of the same length.
    #[must_use]
    pub fn perpendicular(&self) -> Vector {
        Vector::new(-self.y, self.x)
    }

    /// Rescales the vector to the provided length, keeping its direction.
    #[must_use]
    pub fn with_length(&self, length: f64) -> Vector {
        self.normalize() * length
    }

    /// Reports whether both components are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Unsigned angle between two vectors in degrees, or `None` if either is zero.
    #[must_use]
    pub fn angle_to(&self, other: Vector) -> Option<f64> {
        let lengths = self.length() * other.length();
        if lengths <= f64::EPSILON {
            return None;
        }
        let cosine = (self.dot(other) / lengths).clamp(-1.0, 1.0);
        Some(cosine.acos().to_degrees())
    }

    /// Reports whether `self` is approximately `other` rotated by `degrees`
    /// (in either direction), within `tolerance` degrees.
    #[must_use]
    pub fn is_rotation_of(&self, other: Vector, degrees: f64, tolerance: f64) -> bool {
        self.angle_to(other)
            .is_some_and(|angle| (angle - degrees.abs()).abs() <= tolerance)
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

/// Reports whether segments `p1-p2` and `q1-q2` share at least one point.
#[must_use]
pub fn segments_intersect(p1: Position, p2: Position, q1: Position, q2: Position) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > ORIENTATION_EPSILON && d2 < -ORIENTATION_EPSILON)
        || (d1 < -ORIENTATION_EPSILON && d2 > ORIENTATION_EPSILON))
        && ((d3 > ORIENTATION_EPSILON && d4 < -ORIENTATION_EPSILON)
            || (d3 < -ORIENTATION_EPSILON && d4 > ORIENTATION_EPSILON))
    {
        return true;
    }

    (d1.abs() <= ORIENTATION_EPSILON && within_bounds(q1, q2, p1))
        || (d2.abs() <= ORIENTATION_EPSILON && within_bounds(q1, q2, p2))
        || (d3.abs() <= ORIENTATION_EPSILON && within_bounds(p1, p2, q1))
        || (d4.abs() <= ORIENTATION_EPSILON && within_bounds(p1, p2, q2))
}

/// Point on segment `a-b` nearest to `point`.
#[must_use]
pub fn closest_point_on_segment(point: Position, a: Position, b: Position) -> Position {
    let edge = b - a;
    let length_squared = edge.dot(edge);
    if length_squared <= f64::EPSILON {
        return a;
    }
    let t = ((point - a).dot(edge) / length_squared).clamp(0.0, 1.0);
    a + edge * t
}

/// Distance from `point` to segment `a-b`.
#[must_use]
pub fn distance_to_segment(point: Position, a: Position, b: Position) -> f64 {
    point.distance(closest_point_on_segment(point, a, b))
}

fn orientation(a: Position, b: Position, c: Position) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn within_bounds(a: Position, b: Position, point: Position) -> bool {
    point.x >= a.x.min(b.x) - ORIENTATION_EPSILON
        && point.x <= a.x.max(b.x) + ORIENTATION_EPSILON
        && point.y >= a.y.min(b.y) - ORIENTATION_EPSILON
        && point.y <= a.y.max(b.y) + ORIENTATION_EPSILON
}

/// Simple closed polygon describing an obstacle, queue area, checkpoint or chair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Position>,
}

impl Polygon {
    /// Creates a polygon from at least three finite vertices.
    pub fn new(vertices: Vec<Position>) -> Result<Self, ConfigurationError> {
        if vertices.len() < 3 {
            return Err(ConfigurationError::DegeneratePolygon {
                vertices: vertices.len(),
            });
        }
        if let Some(bad) = vertices
            .iter()
            .find(|vertex| !vertex.x().is_finite() || !vertex.y().is_finite())
        {
            return Err(ConfigurationError::InvalidParameter {
                name: "polygon vertex",
                value: if bad.x().is_finite() { bad.y() } else { bad.x() },
            });
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned rectangle spanning the two corners.
    #[must_use]
    pub fn rectangle(corner: Position, opposite: Position) -> Self {
        let (min_x, max_x) = (corner.x.min(opposite.x), corner.x.max(opposite.x));
        let (min_y, max_y) = (corner.y.min(opposite.y), corner.y.max(opposite.y));
        Self {
            vertices: vec![
                Position::new(min_x, min_y),
                Position::new(max_x, min_y),
                Position::new(max_x, max_y),
                Position::new(min_x, max_y),
            ],
        }
    }

    /// Vertices in declaration order.
    #[must_use]
    pub fn vertices(&self) -> &[Position] {
        &self.vertices
    }

    /// Iterator over the closed boundary edges.
    pub fn edges(&self) -> impl Iterator<Item = (Position, Position)> + '_ {
        let count = self.vertices.len();
        (0..count).map(move |index| (self.vertices[index], self.vertices[(index + 1) % count]))
    }

    /// Lower-left and upper-right corners of the bounding box.
    #[must_use]
    pub fn bounding_box(&self) -> (Position, Position) {
        let mut min = Position::new(f64::INFINITY, f64::INFINITY);
        let mut max = Position::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for vertex in &self.vertices {
            min = Position::new(min.x.min(vertex.x), min.y.min(vertex.y));
            max = Position::new(max.x.max(vertex.x), max.y.max(vertex.y));
        }
        (min, max)
    }

    /// Geometric centre, taken as the mean of the vertices.
    #[must_use]
    pub fn centroid(&self) -> Position {
        let count = self.vertices.len() as f64;
        let (sum_x, sum_y) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(x, y), vertex| (x + vertex.x, y + vertex.y));
        Position::new(sum_x / count, sum_y / count)
    }

    /// Even-odd containment test. Points exactly on the boundary may report either way.
    #[must_use]
    pub fn contains(&self, point: Position) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > point.y) != (b.y > point.y) {
                let crossing = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
                if point.x < crossing {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Reports whether segment `from-to` touches the polygon's boundary or interior.
    #[must_use]
    pub fn intersects_segment(&self, from: Position, to: Position) -> bool {
        if self.contains(from) || self.contains(to) {
            return true;
        }
        self.edges()
            .any(|(a, b)| segments_intersect(from, to, a, b))
    }

    /// Reports whether the axis-aligned square/rectangle `min..max` overlaps the polygon.
    #[must_use]
    pub fn intersects_rect(&self, min: Position, max: Position) -> bool {
        let (poly_min, poly_max) = self.bounding_box();
        if poly_max.x < min.x || poly_min.x > max.x || poly_max.y < min.y || poly_min.y > max.y {
            return false;
        }

        let inside_rect = |point: &Position| {
            point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
        };
        if self.vertices.iter().any(inside_rect) {
            return true;
        }

        let rect = Polygon::rectangle(min, max);
        if rect.vertices.iter().any(|corner| self.contains(*corner)) {
            return true;
        }

        let crossing = rect
            .edges()
            .any(|(a, b)| self.edges().any(|(c, d)| segments_intersect(a, b, c, d)));
        crossing
    }

    /// Point on the polygon's boundary nearest to `point`.
    #[must_use]
    pub fn nearest_boundary_point(&self, point: Position) -> Position {
        let mut best = self.vertices[0];
        let mut best_distance = f64::INFINITY;
        for (a, b) in self.edges() {
            let candidate = closest_point_on_segment(point, a, b);
            let distance = point.distance(candidate);
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }

    /// Distance from `point` to the polygon boundary.
    #[must_use]
    pub fn distance_to(&self, point: Position) -> f64 {
        point.distance(self.nearest_boundary_point(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn vector_arithmetic_matches_expectation() {
        let a = Vector::new(3.0, 4.0);
        assert!(approx(a.length(), 5.0));
        assert!(approx(a.normalize().length(), 1.0));
        assert!(approx(a.dot(Vector::new(1.0, 0.0)), 3.0));
        assert_eq!(a + Vector::new(1.0, 1.0), Vector::new(4.0, 5.0));
        assert_eq!(a - Vector::new(1.0, 1.0), Vector::new(2.0, 3.0));
        assert_eq!(a * 2.0, Vector::new(6.0, 8.0));
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
    }

    #[test]
    fn perpendicular_vectors_count_as_quarter_rotation() {
        let east = Vector::new(1.0, 0.0);
        assert!(east.perpendicular().is_rotation_of(east, 90.0, 1.0));
        assert!((-east.perpendicular()).is_rotation_of(east, 90.0, 1.0));
        assert!(!Vector::new(1.0, 0.2).is_rotation_of(east, 90.0, 1.0));
        assert!(!Vector::ZERO.is_rotation_of(east, 90.0, 1.0));
    }

    #[test]
    fn none_sentinel_is_recognised() {
        assert!(Position::NONE.is_none());
        assert!(!Position::new(0.0, 0.0).is_none());
    }

    #[test]
    fn crossing_segments_intersect() {
        assert!(segments_intersect(
            Position::new(0.0, 0.0),
            Position::new(2.0, 2.0),
            Position::new(0.0, 2.0),
            Position::new(2.0, 0.0),
        ));
        assert!(!segments_intersect(
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(0.0, 1.0),
            Position::new(1.0, 1.0),
        ));
        assert!(segments_intersect(
            Position::new(0.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 0.0),
            Position::new(1.0, 1.0),
        ));
    }

    #[test]
    fn closest_point_clamps_to_segment_ends() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(2.0, 0.0);
        assert_eq!(closest_point_on_segment(Position::new(1.0, 3.0), a, b), Position::new(1.0, 0.0));
        assert_eq!(closest_point_on_segment(Position::new(-4.0, 1.0), a, b), a);
        assert!(approx(distance_to_segment(Position::new(3.0, 0.0), a, b), 1.0));
    }

    #[test]
    fn polygon_queries_agree_on_square() {
        let square = Polygon::rectangle(Position::new(1.0, 1.0), Position::new(3.0, 3.0));
        assert!(square.contains(Position::new(2.0, 2.0)));
        assert!(!square.contains(Position::new(4.0, 2.0)));
        assert!(square.intersects_segment(Position::new(0.0, 2.0), Position::new(4.0, 2.0)));
        assert!(!square.intersects_segment(Position::new(0.0, 0.0), Position::new(4.0, 0.0)));
        assert!(square.intersects_rect(Position::new(2.5, 2.5), Position::new(5.0, 5.0)));
        assert!(square.intersects_rect(Position::new(0.0, 0.0), Position::new(5.0, 5.0)));
        assert!(!square.intersects_rect(Position::new(3.5, 0.0), Position::new(5.0, 5.0)));
        assert_eq!(square.nearest_boundary_point(Position::new(2.0, 5.0)), Position::new(2.0, 3.0));
        assert_eq!(square.centroid(), Position::new(2.0, 2.0));
    }

    #[test]
    fn thin_bar_crossing_a_cell_intersects_it() {
        let bar = Polygon::rectangle(Position::new(4.85, 0.0), Position::new(4.95, 8.0));
        let cell_min = Position::new(4.8, 4.0);
        let cell_max = Position::new(5.2, 4.4);

        assert!(!bar.vertices().iter().any(|vertex| vertex.y > 0.0 && vertex.y < 8.0));
        assert!(bar.intersects_rect(cell_min, cell_max));
        assert!(!bar.intersects_rect(Position::new(4.4, 4.0), Position::new(4.8, 4.4)));
    }

    #[test]
    fn polygon_rejects_degenerate_input() {
        let result = Polygon::new(vec![Position::new(0.0, 0.0), Position::new(1.0, 0.0)]);
        assert_eq!(
            result,
            Err(ConfigurationError::DegeneratePolygon { vertices: 2 })
        );
    }
}
