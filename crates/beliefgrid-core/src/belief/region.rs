use super::{BeliefError, BeliefState};
use crate::geometry::{GridSpec, Vec2};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in grid coordinates, such as a keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Vec2,
    pub size: Vec2,
}

/// Maps grid belief mass onto a fixed set of regions.
///
/// A bin overlapped by several regions splits its mass evenly between them,
/// so when the regions cover the grid the projected masses sum to the
/// belief's total.
#[derive(Debug, Clone)]
pub struct RegionProjection {
    members: Vec<Vec<usize>>,
    overlap: Vec<u32>,
}

impl RegionProjection {
    pub fn new(grid: &GridSpec, regions: &[Region]) -> Self {
        let mut overlap = vec![0u32; grid.bin_count()];
        let members: Vec<Vec<usize>> = regions
            .iter()
            .map(|region| {
                let bins = grid.bins_inside_rect(region.center, region.size);
                for &bin in &bins {
                    overlap[bin] += 1;
                }
                bins
            })
            .collect();
        Self { members, overlap }
    }

    pub fn region_count(&self) -> usize {
        self.members.len()
    }

    /// Bins covered by `region`, or `None` past the last region.
    pub fn bins_of(&self, region: usize) -> Option<&[usize]> {
        self.members.get(region).map(Vec::as_slice)
    }

    pub fn overlap_count(&self, bin: usize) -> u32 {
        self.overlap.get(bin).copied().unwrap_or(0)
    }

    pub fn project(&self, belief: &BeliefState) -> Result<Vec<f64>, BeliefError> {
        if belief.len() != self.overlap.len() {
            return Err(BeliefError::DimensionMismatch {
                expected: self.overlap.len(),
                found: belief.len(),
            });
        }
        let probabilities = belief.probabilities();
        Ok(self
            .members
            .iter()
            .map(|bins| {
                bins.iter()
                    .map(|&bin| probabilities[bin] / f64::from(self.overlap[bin]))
                    .sum::<f64>()
            })
            .collect())
    }

    /// Region with the most projected mass, lowest index on ties.
    pub fn most_likely(&self, belief: &BeliefState) -> Result<Option<usize>, BeliefError> {
        let masses = self.project(belief)?;
        let mut best: Option<(usize, f64)> = None;
        for (region, mass) in masses.into_iter().enumerate() {
            if best.is_none_or(|(_, best_mass)| mass > best_mass) {
                best = Some((region, mass));
            }
        }
        Ok(best.map(|(region, _)| region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halves() -> (GridSpec, RegionProjection) {
        let grid = GridSpec::square(2.0, 16).expect("grid");
        let regions = [
            Region {
                center: Vec2::new(-1.0, 0.0),
                size: Vec2::new(2.0, 4.0),
            },
            Region {
                center: Vec2::new(1.0, 0.0),
                size: Vec2::new(2.0, 4.0),
            },
        ];
        let projection = RegionProjection::new(&grid, &regions);
        (grid, projection)
    }

    #[test]
    fn shared_boundary_bins_split_their_mass() {
        let (grid, projection) = halves();
        assert_eq!(projection.region_count(), 2);
        let boundary = grid.coordinate_to_bin(Vec2::new(0.5, -1.5)).expect("inside");
        assert_eq!(projection.overlap_count(boundary), 2);
        assert_eq!(projection.overlap_count(0), 1);
        assert!(projection.bins_of(0).expect("left").contains(&boundary));
        assert!(projection.bins_of(1).expect("right").contains(&boundary));
        assert_eq!(projection.bins_of(2), None);

        let belief = BeliefState::one_hot(16, boundary).expect("belief");
        assert_eq!(projection.project(&belief), Ok(vec![0.5, 0.5]));
    }

    #[test]
    fn tiling_regions_conserve_mass() {
        let (_, projection) = halves();
        let raw: Vec<f64> = (1..=16).map(f64::from).collect();
        let total: f64 = raw.iter().sum();
        let belief = BeliefState::from_probabilities(raw.iter().map(|p| p / total).collect(), 0)
            .expect("belief");
        let masses = projection.project(&belief).expect("projection");
        let projected: f64 = masses.iter().sum();
        assert!((projected - 1.0).abs() < 1e-12);
        assert_eq!(projection.most_likely(&belief), Ok(Some(0)));
    }

    #[test]
    fn rejects_mismatched_belief() {
        let (_, projection) = halves();
        let belief = BeliefState::one_hot(9, 0).expect("belief");
        assert!(matches!(
            projection.project(&belief),
            Err(BeliefError::DimensionMismatch { expected: 16, found: 9 })
        ));
    }
}
