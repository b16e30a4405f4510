use crate::config;
use crate::metrics::PlotWidths;

/// Rows taken by everything except the plots: title, table header, details
/// line, process or log header and one caption line per plot section.
const FIXED_ROWS: usize = 1 + 1 + 1 + 1 + 4;

/// Widget geometry for one terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub table_rows: usize,
    pub process_rows: usize,
    /// Rows of every plot, zero when the terminal is too small to plot.
    pub plot_height: usize,
    pub widths: PlotWidths,
}

impl Layout {
    pub fn compute(width: u16, height: u16, tables: &config::Layout) -> Self {
        let width = usize::from(width);
        let height = usize::from(height);

        let mut table_rows = usize::from(tables.containers_list_height);
        let mut process_rows = usize::from(tables.processes_list_height);

        // Tables shrink before the plots disappear entirely.
        let needed = (FIXED_ROWS + table_rows + process_rows + 4).saturating_sub(height);
        let from_processes = needed.min(process_rows);
        process_rows -= from_processes;
        table_rows -= (needed - from_processes).min(table_rows.saturating_sub(1));
        let plot_rows = height.saturating_sub(FIXED_ROWS + table_rows + process_rows);

        let half = width.saturating_sub(1) / 2;
        Self {
            width,
            height,
            table_rows,
            process_rows,
            plot_height: plot_rows / 4,
            widths: PlotWidths {
                cpu: width,
                memory: width,
                network: half,
                io: half,
            },
        }
    }
}
