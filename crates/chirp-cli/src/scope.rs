//! ASCII oscilloscope for the render path.

/// Draw `samples` as a `rows`-high plot, one column per sample.
///
/// `level` is the amplitude at the top and bottom edges; louder samples are
/// pinned to the edge. The middle row marks zero.
pub fn draw(samples: &[f64], rows: usize, level: f64) -> String {
    let rows = rows.max(3);
    let width = samples.len();
    let level = if level > 0.0 { level } else { 1.0 };
    let center = (rows - 1) / 2;

    let mut grid = vec![vec![' '; width]; rows];
    for cell in &mut grid[center] {
        *cell = '-';
    }

    for (column, &sample) in samples.iter().enumerate() {
        let normalized = if sample.is_finite() {
            (sample / level).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        // +1 maps to row 0, -1 to the last row
        let row = ((1.0 - normalized) * 0.5 * (rows - 1) as f64).round() as usize;
        grid[row.min(rows - 1)][column] = '*';
    }

    let mut out = String::with_capacity(rows * (width + 10));
    for (index, line) in grid.iter().enumerate() {
        let label = if index == 0 {
            format!("{level:+.2}")
        } else if index == center {
            " 0.00".to_string()
        } else if index == rows - 1 {
            format!("{:+.2}", -level)
        } else {
            String::new()
        };
        out.push_str(&format!("{label:>6} |"));
        out.extend(line.iter());
        out.push('\n');
    }
    out
}
