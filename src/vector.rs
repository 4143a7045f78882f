use std::ops::{Add, Sub};

/// Integer grid vector. Doubles as a position and as a heading; headings are
/// unit vectors along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Vector2 {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl Vector2 {
    pub(crate) const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Taxicab distance to `other`.
    pub(crate) fn taxicab(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub(crate) fn is_unit(self) -> bool {
        self.x.abs() + self.y.abs() == 1
    }

    /// Rotation by -90 degrees: (1,0) -> (0,1) -> (-1,0) -> (0,-1) -> (1,0).
    pub(crate) fn rotated_left(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotation by +90 degrees, inverse of [`rotated_left`].
    ///
    /// [`rotated_left`]: Self::rotated_left
    pub(crate) fn rotated_right(self) -> Self {
        Self::new(self.y, -self.x)
    }
}

impl Add for Vector2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}
