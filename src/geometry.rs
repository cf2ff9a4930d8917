//! Points, sizes and rectangles on the canvas plane.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let d = self - other;
        libm::sqrtf(d.x * d.x + d.y * d.y)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        *self = *self + rhs;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point {
    type Output = Point;
    fn div(self, rhs: f32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Half of the size as a point offset
    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Axis-aligned rectangle, `origin` being the top-left corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Rectangle spanned by two arbitrary corners
    pub fn from_corners(a: Point, b: Point) -> Self {
        let min = Point::new(a.x.min(b.x), a.y.min(b.y));
        let max = Point::new(a.x.max(b.x), a.y.max(b.y));
        Self::new(min, Size::new(max.x - min.x, max.y - min.y))
    }

    /// Square of side `side` centered on `center`
    pub fn centered(center: Point, side: f32) -> Self {
        Self::new(
            center - Point::new(side / 2.0, side / 2.0),
            Size::new(side, side),
        )
    }

    pub fn max(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width,
            self.origin.y + self.size.height,
        )
    }

    pub fn center(&self) -> Point {
        self.origin + self.size.center()
    }

    /// Inclusive point containment
    pub fn contains(&self, p: Point) -> bool {
        let max = self.max();
        p.x >= self.origin.x && p.x <= max.x && p.y >= self.origin.y && p.y <= max.y
    }

    /// Whether `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains(other.origin) && self.contains(other.max())
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let a = self.max();
        let b = other.max();
        Rect::from_corners(
            Point::new(self.origin.x.min(other.origin.x), self.origin.y.min(other.origin.y)),
            Point::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }

    pub fn translate(&self, offset: Point) -> Rect {
        Rect::new(self.origin + offset, self.size)
    }

    /// Scale both origin and size about (0, 0)
    pub fn scale(&self, factor: f32) -> Rect {
        Rect::new(
            self.origin * factor,
            Size::new(self.size.width * factor, self.size.height * factor),
        )
    }
}

/// Mapping between plane coordinates and absolute viewport pixels.
///
/// `center` is the plane point shown in the middle of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub zoom: f32,
    pub center: Point,
    pub viewport: Size,
}

impl Projection {
    pub fn to_plane(&self, absolute: Point) -> Point {
        (absolute - self.viewport.center()) / self.zoom + self.center
    }

    pub fn to_absolute(&self, plane: Point) -> Point {
        (plane - self.center) * self.zoom + self.viewport.center()
    }

    pub fn rect_to_absolute(&self, rect: Rect) -> Rect {
        Rect::new(
            self.to_absolute(rect.origin),
            Size::new(rect.size.width * self.zoom, rect.size.height * self.zoom),
        )
    }
}
