//! Geometry aliases shared across the crate.
//!
//! We lean entirely on [`smithay::utils`] for the actual arithmetic (points, sizes, rectangles)
//! rather than re-deriving it. Everything in this crate lives in [`Logical`] space: the
//! global/output-local distinction that outputs care about is handled by [`OutputLayout`], not by
//! a second coordinate-space type parameter.
//!
//! [`OutputLayout`]: crate::output::OutputLayout

pub use smithay::utils::{Logical, Point, Rectangle, Size};

/// Shorthand for the rectangle type used throughout layout code: a logical-space box.
pub type Box2 = Rectangle<i32, Logical>;

/// Shorthand for the point type used throughout layout code: a logical-space point.
pub type Point2 = Point<i32, Logical>;

pub trait RectCenterExt {
    fn center(self) -> Point<i32, Logical>;
}

impl RectCenterExt for Box2 {
    fn center(self) -> Point<i32, Logical> {
        self.loc + self.size.downscale(2).to_point()
    }
}
