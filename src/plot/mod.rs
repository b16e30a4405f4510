//! Braille sparklines.
//!
//! Each character cell packs two samples side by side, each drawn as a bar
//! of up to four dots, so a plot `width` columns wide shows `2 * width`
//! samples and `height` rows resolve `4 * height` levels.
mod color;
mod error;

pub use color::{ColorGradient, Rgba};
pub use error::{Error, Result};

/// `BRAILLE[left][right]` is the cell with `left` dots filled bottom-up in
/// the left column and `right` in the right column.
pub const BRAILLE: [[char; 5]; 5] = [
    [' ', '⢀', '⢠', '⢰', '⢸'],
    ['⡀', '⣀', '⣠', '⣰', '⣸'],
    ['⡄', '⣄', '⣤', '⣴', '⣼'],
    ['⡆', '⣆', '⣦', '⣶', '⣾'],
    ['⡇', '⣇', '⣧', '⣷', '⣿'],
];

/// Shown instead of a plot that has nothing to draw or no room to draw it.
pub const PLACEHOLDER: &str = "no data";

/// Smallest value that still lights a dot in the bottom row.
const MIN_VISIBLE: f64 = 0.0001;

/// Splits the still-undrawn part of a sample into the fill of one row.
///
/// Returns the dot count for the row (0..=4) and the remainder that carries
/// into the next row up. A full row carries the excess, a partial row ends the
/// bar. On the bottom row any visible value lights at least one dot.
///
/// # Examples
///
/// ```
/// # use stackscope::plot::fill_index;
/// assert_eq!(fill_index(2.5, 0.5, true), (4, 0.5));
/// assert_eq!(fill_index(0.0001, 1.0, true), (1, 0.0));
/// assert_eq!(fill_index(0.0001, 1.0, false), (0, 0.0));
/// ```
pub fn fill_index(value: f64, unit: f64, bottom_row: bool) -> (usize, f64) {
    if value.is_nan() || value <= 0.0 || unit.is_nan() || unit <= 0.0 {
        return (0, 0.0);
    }
    if value >= 4.0 * unit {
        return (4, value - 4.0 * unit);
    }
    let mut index = (value / unit).floor() as usize;
    if index == 0 && bottom_row && value >= MIN_VISIBLE {
        index = 1;
    }
    (index.min(4), 0.0)
}

/// Renders `samples` (oldest to newest, in percent) as `height` lines of
/// exactly `width` cells each, top line first.
///
/// The newest samples are drawn in the rightmost column. Samples beyond what
/// fits are dropped from the oldest end and unused columns stay blank.
/// `scale` stretches the vertical axis so that `100 * scale` fills the plot.
pub fn render_rows(samples: &[f64], scale: f64, width: usize, height: usize) -> Vec<String> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let unit = 100.0 * scale / (height * 4) as f64;
    let visible = &samples[samples.len().saturating_sub(width * 2)..];

    let mut padded = Vec::with_capacity(visible.len() + 1);
    if visible.len() % 2 == 1 {
        padded.push(0.0);
    }
    padded.extend_from_slice(visible);

    let columns = padded.len() / 2;
    let mut rows = vec![String::with_capacity(width * 3); height];
    for row in rows.iter_mut() {
        row.extend(std::iter::repeat_n(BRAILLE[0][0], width - columns));
    }

    for pair in padded.chunks_exact(2) {
        let (mut left, mut right) = (pair[0], pair[1]);
        for (level, row) in rows.iter_mut().enumerate() {
            let (l, left_rest) = fill_index(left, unit, level == 0);
            let (r, right_rest) = fill_index(right, unit, level == 0);
            left = left_rest;
            right = right_rest;
            row.push(BRAILLE[l][r]);
        }
    }

    rows.reverse();
    rows
}

/// Renders a complete plot, optionally tinted, or [`PLACEHOLDER`] when there
/// is nothing to draw.
pub fn render(
    samples: &[f64],
    scale: f64,
    width: usize,
    height: usize,
    gradient: Option<&ColorGradient>,
) -> String {
    if samples.is_empty() || width == 0 || height == 0 {
        return PLACEHOLDER.to_owned();
    }
    let rows = render_rows(samples, scale, width, height);
    match gradient {
        Some(gradient) => gradient.paint(&rows).join("\n"),
        None => rows.join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_index_table() {
        let cases = [
            (4.0, 1.0, 4, 0.0),
            (3.99, 1.0, 3, 0.0),
            (3.0, 1.0, 3, 0.0),
            (2.99, 1.0, 2, 0.0),
            (1.99, 1.0, 1, 0.0),
            (0.99, 1.0, 1, 0.0),
            (0.0, 1.0, 0, 0.0),
            (0.0001, 1.0, 1, 0.0),
            (0.0, 0.5, 0, 0.0),
            (0.5, 0.5, 1, 0.0),
            (0.5001, 0.5, 1, 0.0),
            (1.0, 0.5, 2, 0.0),
            (1.5, 0.5, 3, 0.0),
            (1.99, 0.5, 3, 0.0),
            (2.0, 0.5, 4, 0.0),
            (2.5, 0.5, 4, 0.5),
            (2.99, 0.5, 4, 0.99),
            (3.5, 0.5, 4, 1.5),
        ];
        for (value, unit, index, rest) in cases {
            let (got_index, got_rest) = fill_index(value, unit, true);
            assert_eq!(got_index, index, "index of {value} / {unit}");
            assert!((got_rest - rest).abs() < 0.001, "rest of {value} / {unit}");
        }
    }

    #[test]
    fn test_fill_index_bad_input() {
        assert_eq!(fill_index(f64::NAN, 1.0, true), (0, 0.0));
        assert_eq!(fill_index(-3.0, 1.0, true), (0, 0.0));
        assert_eq!(fill_index(3.0, 0.0, true), (0, 0.0));
        assert_eq!(fill_index(0.5, 1.0, false), (0, 0.0));
    }

    #[test]
    fn test_zero_series_is_blank() {
        let rows = render_rows(&[0.0; 10], 1.0, 5, 3);
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row, "     ");
        }
    }

    #[test]
    fn test_full_series_is_solid() {
        let rows = render_rows(&[100.0; 4], 1.0, 2, 2);
        assert_eq!(rows, vec!["⣿⣿".to_owned(), "⣿⣿".to_owned()]);
    }

    #[test]
    fn test_bars_grow_from_bottom() {
        // unit = 100 / 8 = 12.5: 50 fills the bottom row, 25 half of it.
        let rows = render_rows(&[50.0, 25.0], 1.0, 1, 2);
        assert_eq!(rows, vec![" ".to_owned(), "⣧".to_owned()]);
        let rows = render_rows(&[75.0, 0.0], 1.0, 1, 2);
        assert_eq!(rows, vec!["⡄".to_owned(), "⡇".to_owned()]);
    }

    #[test]
    fn test_newest_samples_on_the_right() {
        let rows = render_rows(&[100.0, 100.0, 0.0], 1.0, 3, 1);
        assert_eq!(rows, vec![" ⢸⡇".to_owned()]);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let rows = render_rows(&[100.0, 100.0, 0.0, 0.0, 0.0, 0.0], 1.0, 2, 1);
        assert_eq!(rows, vec!["  ".to_owned()]);
    }

    #[test]
    fn test_small_values_stay_visible() {
        let rows = render_rows(&[0.5, 0.0], 1.0, 1, 2);
        assert_eq!(rows, vec![" ".to_owned(), "⡀".to_owned()]);
    }

    #[test]
    fn test_small_remainder_leaves_upper_row_empty() {
        // 51 fills the bottom row (4 * 12.5) and carries 1, less than one dot.
        let rows = render_rows(&[51.0, 51.0], 1.0, 1, 2);
        assert_eq!(rows, vec![" ".to_owned(), "⣿".to_owned()]);
    }

    #[test]
    fn test_scale_stretches() {
        // With scale 0.25 a value of 25 fills the whole plot.
        let rows = render_rows(&[25.0, 25.0], 0.25, 1, 2);
        assert_eq!(rows, vec!["⣿".to_owned(), "⣿".to_owned()]);
    }

    #[test]
    fn test_render_placeholder() {
        assert_eq!(render(&[], 1.0, 10, 4, None), PLACEHOLDER);
        assert_eq!(render(&[50.0], 1.0, 0, 4, None), PLACEHOLDER);
        assert_eq!(render(&[50.0], 1.0, 10, 0, None), PLACEHOLDER);
    }

    #[test]
    fn test_render_joins_rows() {
        let plot = render(&[100.0, 100.0], 1.0, 1, 2, None);
        assert_eq!(plot, "⣿\n⣿");

        let gradient = ColorGradient::new(Rgba::rgb(0, 255, 0), Rgba::rgb(255, 0, 0));
        let tinted = render(&[100.0, 100.0], 1.0, 1, 2, Some(&gradient));
        let lines: Vec<&str> = tinted.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("38;2;0;255;0"));
    }
}
