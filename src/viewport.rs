use std::ops::{Add, Sub};

/// A position in image space (or a cursor position in canvas space).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

fn clamp_axis(v: i32, canvas: u32, image: u32) -> i32 {
    // An image narrower than the canvas is centered, never panned.
    if image < canvas {
        return 0;
    }
    let slack = (image - canvas).min(i32::MAX as u32) as i32;
    v.max(0).min(slack)
}

/// Clamp the origin of the visible rectangle so it never leaves the image.
///
/// The result always lies in `[0, max(iw - cw, 0)] x [0, max(ih - ch, 0)]`.
/// On an axis where the image is smaller than the canvas the coordinate is
/// forced to zero.
pub fn clamp(pt: Point, canvas_w: u32, canvas_h: u32, image_w: u32, image_h: u32) -> Point {
    Point::new(
        clamp_axis(pt.x, canvas_w, image_w),
        clamp_axis(pt.y, canvas_h, image_h),
    )
}

/// Margin at which an image is drawn into the canvas.
/// Zero on any axis where the image fills the canvas, otherwise half the gap.
pub fn center(canvas_w: u32, canvas_h: u32, image_w: u32, image_h: u32) -> (u32, u32) {
    (
        canvas_w.saturating_sub(image_w) / 2,
        canvas_h.saturating_sub(image_h) / 2,
    )
}
