use super::crossing::axis_track;
use super::{GeometryError, StateSpace};

/// The range `[min, max)` split into equal bins, as used for lane position.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSpec {
    min: f64,
    max: f64,
    bins: usize,
    bin_size: f64,
}

impl LineSpec {
    pub fn new(min: f64, max: f64, bins: usize) -> Result<Self, GeometryError> {
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(GeometryError::InvalidRange { min, max });
        }
        if bins == 0 {
            return Err(GeometryError::InvalidBinCount);
        }
        Ok(Self {
            min,
            max,
            bins,
            bin_size: (max - min) / bins as f64,
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    pub fn coordinate_to_bin(&self, x: f64) -> Option<usize> {
        if !(self.min..self.max).contains(&x) {
            return None;
        }
        Some((((x - self.min) / self.bin_size) as usize).min(self.bins - 1))
    }

    pub fn bin_to_coordinate(&self, bin: usize) -> f64 {
        debug_assert!(bin < self.bins, "bin {bin} out of range");
        self.min + (bin as f64 + 0.5) * self.bin_size
    }

    pub fn is_edge_bin(&self, bin: usize) -> bool {
        bin == 0 || bin + 1 == self.bins
    }

    pub fn clip_displacement(&self, displacement: f64) -> f64 {
        let length = self.max - self.min;
        displacement.clamp(-length, length)
    }

    pub fn crossed_bins(&self, displacement: f64, target: usize) -> Vec<usize> {
        let centre = self.bin_to_coordinate(target);
        let look = centre - self.clip_displacement(displacement);
        let track = axis_track(look, centre, self.min, self.bin_size, target as i64);
        let last = self.bins as i64 - 1;

        let mut cells = Vec::with_capacity(track.crossings.len() + 1);
        let mut index = track.start;
        cells.push(index.clamp(0, last) as usize);
        for _ in &track.crossings {
            index += track.step;
            cells.push(index.clamp(0, last) as usize);
        }
        cells
    }
}

impl StateSpace for LineSpec {
    type Point = f64;

    fn bin_count(&self) -> usize {
        self.bins
    }

    fn point_to_bin(&self, point: f64) -> Option<usize> {
        self.coordinate_to_bin(point)
    }

    fn bin_to_point(&self, bin: usize) -> f64 {
        self.bin_to_coordinate(bin)
    }

    fn is_edge_bin(&self, bin: usize) -> bool {
        LineSpec::is_edge_bin(self, bin)
    }

    fn crossed_bins(&self, displacement: f64, target: usize) -> Vec<usize> {
        LineSpec::crossed_bins(self, displacement, target)
    }
}
