//! Reporting layer for userstats: the console summary and the SVG charts.

pub mod charts;
pub mod console;
pub mod palette;

pub use charts::{render_report, ChartOptions};
pub use console::print_summary;
