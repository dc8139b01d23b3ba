//! Discretised state spaces the belief is tracked over.
//!
//! This module is composed of:
//! - `grid`: the bounded 2D area (`GridSpec`) with square or rectangular bin layouts.
//! - `line`: the 1D range variant (`LineSpec`).
//! - `crossing`: per-axis boundary-crossing sequences shared by both.

mod crossing;
mod grid;
mod line;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

pub use grid::{Area, BinLayout, GridSpec, bin_dimensions};
pub use line::LineSpec;

/// A position or displacement in a state space with a fixed number of axes.
pub trait Point:
    Copy + fmt::Debug + PartialEq + Send + Sync + Add<Output = Self> + Sub<Output = Self> + 'static
{
    const AXES: usize;

    fn axis(self, index: usize) -> f64;

    fn from_axes(f: impl FnMut(usize) -> f64) -> Self;

    fn zero() -> Self {
        Self::from_axes(|_| 0.0)
    }

    fn scale(self, factor: f64) -> Self {
        Self::from_axes(|axis| self.axis(axis) * factor)
    }

    fn norm(self) -> f64 {
        (0..Self::AXES)
            .map(|axis| self.axis(axis).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn is_finite(self) -> bool {
        (0..Self::AXES).all(|axis| self.axis(axis).is_finite())
    }
}

impl Point for f64 {
    const AXES: usize = 1;

    fn axis(self, _index: usize) -> f64 {
        self
    }

    fn from_axes(mut f: impl FnMut(usize) -> f64) -> Self {
        f(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl Point for Vec2 {
    const AXES: usize = 2;

    fn axis(self, index: usize) -> f64 {
        match index {
            0 => self.x,
            _ => self.y,
        }
    }

    fn from_axes(mut f: impl FnMut(usize) -> f64) -> Self {
        let x = f(0);
        let y = f(1);
        Vec2 { x, y }
    }

    fn norm(self) -> f64 {
        self.length()
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

/// A bounded, discretised space the update engine can predict over.
///
/// Bins are dense indices in `0..bin_count()`. Points outside the bounded
/// region map to `None` rather than to an error.
pub trait StateSpace: Send + Sync {
    type Point: Point;

    fn bin_count(&self) -> usize;

    fn point_to_bin(&self, point: Self::Point) -> Option<usize>;

    /// Centre of `bin`. Callers must pass a bin in range.
    fn bin_to_point(&self, bin: usize) -> Self::Point;

    fn is_edge_bin(&self, bin: usize) -> bool;

    /// Bins on the path from `bin_to_point(target) - displacement` to `target`.
    /// Off-space cells are clamped onto the boundary, so entries may repeat.
    fn crossed_bins(&self, displacement: Self::Point, target: usize) -> Vec<usize>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    InvalidArea { width: f64, height: f64 },
    InvalidRange { min: f64, max: f64 },
    InvalidBinCount,
    NoLayout { width: f64, height: f64, requested: usize },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::InvalidArea { width, height } => {
                write!(f, "area dimensions must be finite and positive (got {width} x {height})")
            }
            GeometryError::InvalidRange { min, max } => {
                write!(f, "range [{min}, {max}) is empty or not finite")
            }
            GeometryError::InvalidBinCount => write!(f, "bin count must be at least 1"),
            GeometryError::NoLayout {
                width,
                height,
                requested,
            } => write!(
                f,
                "no bin layout near {requested} bins fits a {width} x {height} area"
            ),
        }
    }
}

impl std::error::Error for GeometryError {}
