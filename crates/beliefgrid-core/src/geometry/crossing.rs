/// Cell indices visited along one axis while moving from `from` to `to`,
/// together with the segment parameter at which each boundary is crossed.
///
/// Cell `k` spans `[origin + k * cell, origin + (k + 1) * cell)`. Indices are
/// signed and unclamped; the caller maps them back onto the grid.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AxisTrack {
    pub start: i64,
    pub step: i64,
    pub crossings: Vec<f64>,
}

pub(crate) fn signed_cell(coordinate: f64, origin: f64, cell: f64) -> i64 {
    ((coordinate - origin) / cell).floor() as i64
}

pub(crate) fn axis_track(from: f64, to: f64, origin: f64, cell: f64, end: i64) -> AxisTrack {
    let start = signed_cell(from, origin, cell);
    let step = (end - start).signum();
    let span = to - from;
    let mut crossings = Vec::with_capacity(start.abs_diff(end) as usize);

    let mut index = start;
    while index != end {
        // Moving up crosses the lower edge of the next cell; moving down crosses
        // the lower edge of the current one.
        let boundary_cell = if step > 0 { index + 1 } else { index };
        let boundary = origin + boundary_cell as f64 * cell;
        let t = if span == 0.0 {
            0.0
        } else {
            ((boundary - from) / span).clamp(0.0, 1.0)
        };
        crossings.push(t);
        index += step;
    }

    AxisTrack {
        start,
        step,
        crossings,
    }
}

/// Merges two per-axis tracks into the ordered sequence of visited cells.
/// Ties go to the x axis first.
pub(crate) fn merge_tracks(x: &AxisTrack, y: &AxisTrack) -> Vec<(i64, i64)> {
    let mut cells = Vec::with_capacity(1 + x.crossings.len() + y.crossings.len());
    let (mut col, mut row) = (x.start, y.start);
    cells.push((col, row));

    let (mut i, mut j) = (0, 0);
    while i < x.crossings.len() || j < y.crossings.len() {
        let take_x = j == y.crossings.len()
            || (i < x.crossings.len() && x.crossings[i] <= y.crossings[j]);
        if take_x {
            col += x.step;
            i += 1;
        } else {
            row += y.step;
            j += 1;
        }
        cells.push((col, row));
    }

    cells
}
