//! # Formatting Helpers
//!
//! Human-readable rendering of durations, byte counts, rates and shapes, plus
//! the ranking table and progress bar used for terminal output.
//!
//! ```rust
//! use zarr_write_bench::utils::*;
//!
//! assert_eq!(format_duration(1.5), "1.50s");
//! assert_eq!(format_rate(1048576.0), "1.00 MB/s");
//! assert_eq!(format_shape(&[1920, 1080, 512]), "1920x1080x512");
//! ```

use crate::axis::DIMENSION_DELIMITER;
use std::fmt::Write;

const BYTE_UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

/// Format a duration given in seconds.
///
/// Sub-second values use μs or ms with two decimals; anything past a minute
/// switches to whole `h`/`m`/`s` components.
///
/// ```rust
/// # use zarr_write_bench::utils::format_duration;
/// assert_eq!(format_duration(0.00025), "250.00μs");
/// assert_eq!(format_duration(0.02575), "25.75ms");
/// assert_eq!(format_duration(90.0), "1m 30s");
/// ```
pub fn format_duration(seconds: f64) -> String {
    match seconds {
        s if s < 1e-3 => format!("{:.2}μs", s * 1e6),
        s if s < 1.0 => format!("{:.2}ms", s * 1e3),
        s if s < 60.0 => format!("{:.2}s", s),
        s => {
            let total = s as u64;
            let (h, m, sec) = (total / 3600, total / 60 % 60, total % 60);
            if h == 0 {
                format!("{}m {}s", m, sec)
            } else {
                format!("{}h {}m {}s", h, m, sec)
            }
        }
    }
}

/// Binary-scaled size: "512 B", "1.50 KB", "2.50 MB", ...
pub fn format_bytes(bytes: u64) -> String {
    scaled(bytes as f64)
}

fn scaled(value: f64) -> String {
    if value < 1024.0 {
        return format!("{:.0} B", value);
    }
    let mut value = value / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < BYTE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, BYTE_UNITS[unit])
}

/// Write rate with a "/s" suffix
pub fn format_rate(bytes_per_second: f64) -> String {
    scaled(bytes_per_second) + "/s"
}

/// Join a shape with the dimension delimiter, e.g. `64x64x32`.
pub fn format_shape(shape: &[u64]) -> String {
    let mut out = String::new();
    for (i, dim) in shape.iter().enumerate() {
        if i > 0 {
            out.push(DIMENSION_DELIMITER);
        }
        let _ = write!(out, "{}", dim);
    }
    out
}

/// Fixed-width text table.
///
/// ```rust
/// # use zarr_write_bench::utils::Table;
/// let mut table = Table::new(&["Rank", "Mean"], &[4, 6]);
/// table.row(&["#1", "1.52s"]);
/// assert_eq!(
///     table.render(),
///     "+------+--------+\n\
///      | Rank | Mean   |\n\
///      +------+--------+\n\
///      | #1   | 1.52s  |\n\
///      +------+--------+\n"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    widths: Vec<usize>,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: &[&str], widths: &[usize]) -> Self {
        Self {
            widths: widths.to_vec(),
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<S: AsRef<str>>(&mut self, cells: &[S]) {
        self.rows
            .push(cells.iter().map(|c| c.as_ref().to_string()).collect());
    }

    fn separator(&self, out: &mut String) {
        out.push('+');
        for width in &self.widths {
            out.push_str(&"-".repeat(width + 2));
            out.push('+');
        }
        out.push('\n');
    }

    fn line(&self, cells: &[String], out: &mut String) {
        out.push('|');
        for (cell, width) in cells.iter().zip(&self.widths) {
            let _ = write!(out, " {:<width$} |", cell, width = width);
        }
        out.push('\n');
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.separator(&mut out);
        self.line(&self.header, &mut out);
        self.separator(&mut out);
        for row in &self.rows {
            self.line(row, &mut out);
        }
        self.separator(&mut out);
        out
    }
}

/// Progress bar: `█` for completed Configurations, `░` for the rest.
///
/// A zero total renders as complete; progress past the total is capped.
///
/// ```rust
/// # use zarr_write_bench::utils::create_progress_indicator;
/// assert_eq!(create_progress_indicator(0, 8, 8), "░░░░░░░░");
/// assert_eq!(create_progress_indicator(2, 8, 8), "██░░░░░░");
/// ```
pub fn create_progress_indicator(done: usize, total: usize, width: usize) -> String {
    let filled = match total {
        0 => width,
        _ => (done.min(total) * width) / total,
    };
    (0..width)
        .map(|i| if i < filled { '█' } else { '░' })
        .collect()
}
