//! Plain-data components used by the sample systems.

use tessera_core::Component;

/// Hit points. An entity at zero or below is reaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Health(pub i32);

impl Component for Health {}

/// 2D position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Component for Position {}

/// 2D velocity, in units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// X component.
    pub dx: f32,
    /// Y component.
    pub dy: f32,
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

impl Component for Velocity {}
