use super::crossing::{axis_track, merge_tracks, signed_cell};
use super::{GeometryError, Point, StateSpace, Vec2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Cells of a rectangular layout may be at most this many times wider than
/// tall (or the reverse).
const MAX_CELL_SKEW: f64 = 2.0;

/// Bounded area centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Area {
    /// Platform of half-extent `radius` along both axes.
    Square { radius: f64 },
    Rectangle { width: f64, height: f64 },
}

impl Area {
    pub fn width(&self) -> f64 {
        match *self {
            Area::Square { radius } => 2.0 * radius,
            Area::Rectangle { width, .. } => width,
        }
    }

    pub fn height(&self) -> f64 {
        match *self {
            Area::Square { radius } => 2.0 * radius,
            Area::Rectangle { height, .. } => height,
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let (width, height) = (self.width(), self.height());
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(GeometryError::InvalidArea { width, height });
        }
        Ok(())
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (half_w, half_h) = (self.width() / 2.0, self.height() / 2.0);
        (-half_w..half_w).contains(&point.x) && (-half_h..half_h).contains(&point.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinLayout {
    pub cols: usize,
    pub rows: usize,
}

impl BinLayout {
    pub const fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    pub const fn bin_count(self) -> usize {
        self.cols * self.rows
    }
}

/// Smallest square layout holding at least `requested` bins.
pub(crate) fn square_layout(requested: usize) -> BinLayout {
    let mut per_axis = (requested as f64).sqrt() as usize;
    while per_axis * per_axis < requested {
        per_axis += 1;
    }
    while per_axis > 1 && (per_axis - 1) * (per_axis - 1) >= requested {
        per_axis -= 1;
    }
    BinLayout::new(per_axis.max(1), per_axis.max(1))
}

/// Factorises a bin budget for a `width` x `height` area.
///
/// Among all layouts whose cells are no more than twice as wide as tall (or
/// vice versa), picks the one closest to `target` bins, then the one with
/// the most square cells, then the fewest columns. The winner is re-queried
/// with its own bin count, so asking again with the returned layout's bin
/// count yields the same layout.
pub fn bin_dimensions(width: f64, height: f64, target: usize) -> Result<BinLayout, GeometryError> {
    Area::Rectangle { width, height }.validate()?;
    if target == 0 {
        return Err(GeometryError::InvalidBinCount);
    }

    let no_layout = GeometryError::NoLayout {
        width,
        height,
        requested: target,
    };
    let aspect = width / height;
    let nearest = closest_layout(aspect, target).ok_or_else(|| no_layout.clone())?;
    closest_layout(aspect, nearest.bin_count()).ok_or(no_layout)
}

fn closest_layout(aspect: f64, target: usize) -> Option<BinLayout> {
    let max_rows = ((4.0 * target as f64 / aspect).sqrt().ceil() as usize)
        .max((1.0 / aspect).ceil() as usize)
        + 1;

    let mut best: Option<(usize, f64, BinLayout)> = None;
    for rows in 1..=max_rows {
        let lowest = ((aspect * rows as f64) / MAX_CELL_SKEW).ceil().max(1.0) as usize;
        let highest = (aspect * rows as f64 * MAX_CELL_SKEW).floor() as usize;
        if highest < lowest {
            continue;
        }

        let floor_cols = target / rows;
        for cols in [floor_cols, floor_cols + 1] {
            let layout = BinLayout::new(cols.clamp(lowest, highest), rows);
            let distance = layout.bin_count().abs_diff(target);
            let skew = (aspect * rows as f64 / layout.cols as f64).ln().abs();
            let better = match &best {
                None => true,
                Some((best_distance, best_skew, best_layout)) => distance
                    .cmp(best_distance)
                    .then(skew.partial_cmp(best_skew).unwrap_or(Ordering::Equal))
                    .then(layout.cols.cmp(&best_layout.cols))
                    .is_lt(),
            };
            if better {
                best = Some((distance, skew, layout));
            }
        }
    }

    best.map(|(_, _, layout)| layout)
}

/// Bounded 2D area split into a row-major grid of equal cells.
///
/// Bin `row * cols + col` covers column `col` along x and row `row` along y,
/// both counted from the negative corner of the area.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    area: Area,
    layout: BinLayout,
    cell: Vec2,
}

impl GridSpec {
    /// Builds the grid for `area`, rounding `requested_bins` to a valid layout.
    pub fn new(area: Area, requested_bins: usize) -> Result<Self, GeometryError> {
        area.validate()?;
        if requested_bins == 0 {
            return Err(GeometryError::InvalidBinCount);
        }
        let layout = match area {
            Area::Square { .. } => square_layout(requested_bins),
            Area::Rectangle { width, height } => bin_dimensions(width, height, requested_bins)?,
        };
        Ok(Self::with_layout(area, layout))
    }

    pub fn square(radius: f64, requested_bins: usize) -> Result<Self, GeometryError> {
        Self::new(Area::Square { radius }, requested_bins)
    }

    pub fn rectangle(width: f64, height: f64, requested_bins: usize) -> Result<Self, GeometryError> {
        Self::new(Area::Rectangle { width, height }, requested_bins)
    }

    /// Uses `layout` verbatim instead of deriving one from a bin budget.
    pub fn from_layout(area: Area, layout: BinLayout) -> Result<Self, GeometryError> {
        area.validate()?;
        if layout.bin_count() == 0 {
            return Err(GeometryError::InvalidBinCount);
        }
        Ok(Self::with_layout(area, layout))
    }

    fn with_layout(area: Area, layout: BinLayout) -> Self {
        let cell = Vec2::new(
            area.width() / layout.cols as f64,
            area.height() / layout.rows as f64,
        );
        Self { area, layout, cell }
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn layout(&self) -> BinLayout {
        self.layout
    }

    pub fn bin_count(&self) -> usize {
        self.layout.bin_count()
    }

    pub fn cell_size(&self) -> Vec2 {
        self.cell
    }

    fn origin(&self) -> Vec2 {
        Vec2::new(-self.area.width() / 2.0, -self.area.height() / 2.0)
    }

    pub fn coordinate_to_bin(&self, point: Vec2) -> Option<usize> {
        if !self.area.contains(point) {
            return None;
        }
        let offset = point - self.origin();
        let col = ((offset.x / self.cell.x) as usize).min(self.layout.cols - 1);
        let row = ((offset.y / self.cell.y) as usize).min(self.layout.rows - 1);
        Some(row * self.layout.cols + col)
    }

    pub fn bin_to_coordinate(&self, bin: usize) -> Vec2 {
        debug_assert!(bin < self.bin_count(), "bin {bin} out of range");
        let (col, row) = self.cell_of(bin);
        let origin = self.origin();
        Vec2::new(
            origin.x + (col as f64 + 0.5) * self.cell.x,
            origin.y + (row as f64 + 0.5) * self.cell.y,
        )
    }

    /// Column and row of `bin`.
    pub fn cell_of(&self, bin: usize) -> (usize, usize) {
        (bin % self.layout.cols, bin / self.layout.cols)
    }

    pub fn is_edge_bin(&self, bin: usize) -> bool {
        let (col, row) = self.cell_of(bin);
        col == 0 || row == 0 || col + 1 == self.layout.cols || row + 1 == self.layout.rows
    }

    /// Shortens `displacement` uniformly so it spans at most the area along
    /// either axis.
    pub fn clip_displacement(&self, displacement: Vec2) -> Vec2 {
        let ratio = (displacement.x.abs() / self.area.width())
            .max(displacement.y.abs() / self.area.height());
        if ratio > 1.0 {
            Vec2::new(displacement.x / ratio, displacement.y / ratio)
        } else {
            displacement
        }
    }

    pub fn crossed_bins(&self, displacement: Vec2, target: usize) -> Vec<usize> {
        let (target_col, target_row) = self.cell_of(target);
        let centre = self.bin_to_coordinate(target);
        let look = centre - self.clip_displacement(displacement);
        let origin = self.origin();

        let x = axis_track(look.x, centre.x, origin.x, self.cell.x, target_col as i64);
        let y = axis_track(look.y, centre.y, origin.y, self.cell.y, target_row as i64);

        let max_col = self.layout.cols as i64 - 1;
        let max_row = self.layout.rows as i64 - 1;
        merge_tracks(&x, &y)
            .into_iter()
            .map(|(col, row)| {
                let col = col.clamp(0, max_col) as usize;
                let row = row.clamp(0, max_row) as usize;
                row * self.layout.cols + col
            })
            .collect()
    }

    /// Bins overlapped by the axis-aligned rectangle `centre` ± `size / 2`,
    /// clamped to the grid. A rectangle edge lying on a cell boundary also
    /// picks up the cell beyond it.
    pub fn bins_inside_rect(&self, centre: Vec2, size: Vec2) -> Vec<usize> {
        let origin = self.origin();
        let low = centre - size.scale(0.5);
        let high = centre + size.scale(0.5);

        let max_col = self.layout.cols as i64 - 1;
        let max_row = self.layout.rows as i64 - 1;
        let col_from = signed_cell(low.x, origin.x, self.cell.x).clamp(0, max_col);
        let col_to = signed_cell(high.x, origin.x, self.cell.x).clamp(0, max_col);
        let row_from = signed_cell(low.y, origin.y, self.cell.y).clamp(0, max_row);
        let row_to = signed_cell(high.y, origin.y, self.cell.y).clamp(0, max_row);

        let mut bins = Vec::new();
        for row in row_from..=row_to {
            for col in col_from..=col_to {
                bins.push(row as usize * self.layout.cols + col as usize);
            }
        }
        bins
    }
}

impl StateSpace for GridSpec {
    type Point = Vec2;

    fn bin_count(&self) -> usize {
        GridSpec::bin_count(self)
    }

    fn point_to_bin(&self, point: Vec2) -> Option<usize> {
        self.coordinate_to_bin(point)
    }

    fn bin_to_point(&self, bin: usize) -> Vec2 {
        self.bin_to_coordinate(bin)
    }

    fn is_edge_bin(&self, bin: usize) -> bool {
        GridSpec::is_edge_bin(self, bin)
    }

    fn crossed_bins(&self, displacement: Vec2, target: usize) -> Vec<usize> {
        GridSpec::crossed_bins(self, displacement, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_by_three() -> GridSpec {
        GridSpec::square(1.5, 9).expect("valid grid")
    }

    #[test]
    fn square_layout_rounds_up_to_perfect_square() {
        assert_eq!(square_layout(9), BinLayout::new(3, 3));
        assert_eq!(square_layout(10), BinLayout::new(4, 4));
        assert_eq!(square_layout(1), BinLayout::new(1, 1));
        assert_eq!(square_layout(1000), BinLayout::new(32, 32));
    }

    #[test]
    fn rectangle_layout_prefers_exact_and_square_cells() {
        assert_eq!(bin_dimensions(16.0, 9.0, 1000), Ok(BinLayout::new(40, 25)));
        assert_eq!(bin_dimensions(1.0, 1.0, 100), Ok(BinLayout::new(10, 10)));
        assert_eq!(bin_dimensions(2.0, 1.0, 8), Ok(BinLayout::new(4, 2)));
    }

    #[test]
    fn rectangle_layout_rejects_bad_input() {
        assert_eq!(bin_dimensions(1.0, 1.0, 0), Err(GeometryError::InvalidBinCount));
        assert!(matches!(
            bin_dimensions(-1.0, 1.0, 4),
            Err(GeometryError::InvalidArea { .. })
        ));
        assert!(matches!(
            GridSpec::rectangle(1.0, f64::NAN, 4),
            Err(GeometryError::InvalidArea { .. })
        ));
    }

    #[test]
    fn bin_dimensions_is_idempotent() {
        for &(width, height) in &[(16.0, 9.0), (1.0, 1.0), (3.0, 1.0), (1.0, 7.5), (10.0, 0.3)] {
            for target in [1, 2, 3, 7, 13, 50, 97, 100, 640, 1000, 4099] {
                let layout = bin_dimensions(width, height, target).expect("layout");
                let again = bin_dimensions(width, height, layout.bin_count()).expect("layout");
                assert_eq!(layout, again, "{width}x{height} target {target}");
            }
        }
    }

    #[test]
    fn layout_cells_stay_close_to_square() {
        let grid = GridSpec::rectangle(16.0, 9.0, 1000).expect("grid");
        let cell = grid.cell_size();
        let skew = cell.x / cell.y;
        assert!((0.5..=2.0).contains(&skew), "skew {skew}");
    }

    #[test]
    fn bin_round_trips_through_centre() {
        let grids = [
            three_by_three(),
            GridSpec::square(5.0, 100).expect("grid"),
            GridSpec::rectangle(16.0, 9.0, 1000).expect("grid"),
            GridSpec::rectangle(0.7, 3.1, 37).expect("grid"),
        ];
        for grid in &grids {
            for bin in 0..grid.bin_count() {
                let centre = grid.bin_to_coordinate(bin);
                assert_eq!(grid.coordinate_to_bin(centre), Some(bin));
            }
        }
    }

    #[test]
    fn row_major_indexing_runs_along_x() {
        let grid = three_by_three();
        assert_eq!(grid.bin_to_coordinate(0), Vec2::new(-1.0, -1.0));
        assert_eq!(grid.bin_to_coordinate(2), Vec2::new(1.0, -1.0));
        assert_eq!(grid.bin_to_coordinate(6), Vec2::new(-1.0, 1.0));
        assert_eq!(grid.coordinate_to_bin(Vec2::new(1.2, -0.9)), Some(2));
    }

    #[test]
    fn outside_points_have_no_bin() {
        let grid = three_by_three();
        assert_eq!(grid.coordinate_to_bin(Vec2::new(1.5, 0.0)), None);
        assert_eq!(grid.coordinate_to_bin(Vec2::new(0.0, -1.6)), None);
        assert_eq!(grid.coordinate_to_bin(Vec2::new(f64::NAN, 0.0)), None);
        assert_eq!(grid.coordinate_to_bin(Vec2::new(-1.5, -1.5)), Some(0));
    }

    #[test]
    fn edge_bins_form_the_outer_ring() {
        let grid = three_by_three();
        let edges: Vec<usize> = (0..9).filter(|&bin| grid.is_edge_bin(bin)).collect();
        assert_eq!(edges, vec![0, 1, 2, 3, 5, 6, 7, 8]);

        let single = GridSpec::square(1.0, 1).expect("grid");
        assert!(single.is_edge_bin(0));
    }

    #[test]
    fn zero_displacement_crosses_only_target() {
        let grid = three_by_three();
        for bin in 0..9 {
            assert_eq!(grid.crossed_bins(Vec2::ZERO, bin), vec![bin]);
        }
    }

    #[test]
    fn crossed_bins_follow_row_from_look_back_point() {
        let grid = three_by_three();
        let push = Vec2::new(2.0, 0.0);
        assert_eq!(grid.crossed_bins(push, 2), vec![0, 1, 2]);
        assert_eq!(grid.crossed_bins(push, 1), vec![0, 0, 1]);
        assert_eq!(grid.crossed_bins(push, 0), vec![0, 0, 0]);
    }

    #[test]
    fn crossed_bins_length_counts_every_boundary() {
        let grid = GridSpec::square(5.0, 100).expect("grid");
        let path = grid.crossed_bins(Vec2::new(2.3, -3.7), 9);
        let (col, row) = grid.cell_of(9);
        let look = grid.bin_to_coordinate(9) - Vec2::new(2.3, -3.7);
        let origin = Vec2::new(-5.0, -5.0);
        let look_col = ((look.x - origin.x) / 1.0).floor() as i64;
        let look_row = ((look.y - origin.y) / 1.0).floor() as i64;
        let expected = 1 + (col as i64 - look_col).unsigned_abs() + (row as i64 - look_row).unsigned_abs();
        assert_eq!(path.len() as u64, expected);
        assert_eq!(path.last(), Some(&9));
        assert!(path.iter().all(|&bin| bin < grid.bin_count()));
    }

    #[test]
    fn long_displacements_are_clipped_to_area() {
        let grid = three_by_three();
        let clipped = grid.clip_displacement(Vec2::new(30.0, 1.5));
        assert!((clipped.x - 3.0).abs() < 1e-12);
        assert!((clipped.y - 0.15).abs() < 1e-12);
        let path = grid.crossed_bins(Vec2::new(300.0, 0.0), 2);
        assert!(path.len() <= 1 + 3 + 3);
        assert_eq!(path.last(), Some(&2));
    }

    #[test]
    fn rect_query_clamps_and_includes_touching_cells() {
        let grid = GridSpec::square(2.0, 16).expect("grid");
        let left = grid.bins_inside_rect(Vec2::new(-1.0, 0.0), Vec2::new(2.0, 4.0));
        assert_eq!(left.len(), 12);
        assert!(left.contains(&2));
        let outside = grid.bins_inside_rect(Vec2::new(10.0, 10.0), Vec2::new(1.0, 1.0));
        assert_eq!(outside, vec![15]);
    }
}
