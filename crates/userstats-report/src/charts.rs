//! SVG chart artifacts, one file per analysis task.

use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, warn};
use userstats_core::models::{CrossTable, FrequencyTable};
use userstats_core::settings::AnalysisConfig;
use userstats_core::{Result, StatsError};
use userstats_data::aggregator::UserStats;

use crate::palette;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;
const FONT: &str = "sans-serif";

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Chart settings that come from the run configuration rather than the data.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    /// Label of the valid age range, e.g. `18-70`.
    pub age_range_label: String,
    /// Price band labels in ascending order; heatmap columns.
    pub price_bands: Vec<String>,
    /// Heatmap rows: the categories with the most priced purchases.
    pub top_categories: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for ChartOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            age_range_label: format!("{}-{}", config.age_in_range.min, config.age_in_range.max),
            price_bands: config.price_bands.labels(),
            top_categories: config.heatmap_top_categories,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Draw every chart into `output_dir` and return the files written.
///
/// A chart whose table is empty is skipped with a warning; drawing or I/O
/// failures abort.
pub fn render_report(
    stats: &UserStats,
    options: &ChartOptions,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|source| StatsError::FileRead {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    let mut emit = |name: &str, drawn: Result<bool>| -> Result<()> {
        if drawn? {
            written.push(output_dir.join(name));
        } else {
            warn!("Skipping {}: no data", name);
        }
        Ok(())
    };

    let out = |name: &str| output_dir.join(name);

    let in_range = stats.age_in_range;
    emit(
        "age_filter_ratio.svg",
        pie_chart(
            &out("age_filter_ratio.svg"),
            "Age filter ratio",
            &[
                (format!("age {}", options.age_range_label), in_range),
                ("other".to_string(), stats.age_out_of_range()),
            ],
        ),
    )?;

    emit(
        "age_correction.svg",
        dual_bar_chart(
            &out("age_correction.svg"),
            ("Age distribution (all)", &as_values(stats.age_histogram.labelled())),
            (
                &format!("Age distribution ({})", options.age_range_label),
                &as_values(stats.age_histogram_in_range.labelled()),
            ),
        ),
    )?;

    emit(
        "gender_ratio.svg",
        pie_chart(&out("gender_ratio.svg"), "Gender ratio", &owned(&stats.gender)),
    )?;

    let regular = stats.total_users.saturating_sub(stats.abnormal_address);
    emit(
        "abnormal_address_ratio.svg",
        pie_chart(
            &out("abnormal_address_ratio.svg"),
            "Abnormal address ratio",
            &[
                ("placeholder address".to_string(), stats.abnormal_address),
                ("regular address".to_string(), regular),
            ],
        ),
    )?;

    emit(
        "country_distribution.svg",
        bar_chart(
            &out("country_distribution.svg"),
            "Country distribution",
            &ranked(&stats.country),
            palette::PRIMARY,
            "count",
        ),
    )?;

    emit(
        "purchase_product_payment_distribution.svg",
        dual_bar_chart(
            &out("purchase_product_payment_distribution.svg"),
            ("Product categories", &ranked(&stats.product)),
            ("Payment methods", &ranked(&stats.payment)),
        ),
    )?;

    let cross_charts: [(&str, &str, Vec<(String, u64)>); 4] = [
        (
            "agegroup_product_distribution.svg",
            "Products by age group",
            stats.age_product.flatten(),
        ),
        (
            "agegroup_payment_distribution.svg",
            "Payment methods by age group",
            stats.age_payment.flatten(),
        ),
        (
            "gender_product_distribution.svg",
            "Products by gender",
            stats.gender_product.flatten(),
        ),
        (
            "gender_payment_distribution.svg",
            "Payment methods by gender",
            stats.gender_payment.flatten(),
        ),
    ];
    for (name, title, entries) in cross_charts {
        emit(
            name,
            bar_chart(&out(name), title, &as_values(entries), palette::SECONDARY, "count"),
        )?;
    }

    let avg_price: Vec<(String, f64)> = stats
        .average_price_by_age()
        .into_iter()
        .map(|(group, mean)| (group.label().to_string(), mean))
        .collect();
    emit(
        "avg_price_by_age.svg",
        bar_chart(
            &out("avg_price_by_age.svg"),
            "Average purchase price by age group",
            &avg_price,
            palette::SKY,
            "average price",
        ),
    )?;

    emit(
        "device_usage_distribution.svg",
        bar_chart(
            &out("device_usage_distribution.svg"),
            "Device usage",
            &ranked(&stats.device),
            palette::PRIMARY,
            "count",
        ),
    )?;

    emit(
        "purchase_category_price_distribution.svg",
        stacked_bar_chart(
            &out("purchase_category_price_distribution.svg"),
            "Price bands of top categories",
            &stats.category_price,
            options,
        ),
    )?;

    emit(
        "category_price_heatmap.svg",
        heatmap(
            &out("category_price_heatmap.svg"),
            "Average price band by category (row share)",
            &stats.category_price,
            options,
        ),
    )?;

    debug!("Wrote {} chart(s) to {}", written.len(), output_dir.display());
    Ok(written)
}

// ── Chart kinds ───────────────────────────────────────────────────────────────

/// Returns `Ok(false)` without touching the file system when every slice is 0.
fn pie_chart(path: &Path, title: &str, slices: &[(String, u64)]) -> Result<bool> {
    let slices: Vec<&(String, u64)> = slices.iter().filter(|(_, n)| *n > 0).collect();
    if slices.is_empty() {
        return Ok(false);
    }

    let root = SVGBackend::new(path, (HEIGHT, HEIGHT)).into_drawing_area();
    root.fill(&palette::BACKGROUND).map_err(render_err)?;
    let area = root.titled(title, (FONT, 24)).map_err(render_err)?;

    let (w, h) = area.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.33;
    let sizes: Vec<f64> = slices.iter().map(|(_, n)| *n as f64).collect();
    let labels: Vec<String> = slices.iter().map(|(l, _)| l.clone()).collect();
    let colors = palette::series(slices.len());

    let mut pie = Pie::new(
        &center,
        &radius,
        sizes.as_slice(),
        colors.as_slice(),
        labels.as_slice(),
    );
    pie.start_angle(90.0);
    pie.label_style((FONT, 16).into_font().color(&palette::TEXT));
    pie.percentages((FONT, 14).into_font().color(&palette::BACKGROUND));
    area.draw(&pie).map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(true)
}

fn bar_chart(
    path: &Path,
    title: &str,
    entries: &[(String, f64)],
    color: RGBColor,
    y_desc: &str,
) -> Result<bool> {
    if entries.is_empty() {
        return Ok(false);
    }
    let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&palette::BACKGROUND).map_err(render_err)?;
    draw_bars(&root, title, entries, color, y_desc)?;
    root.present().map_err(render_err)?;
    Ok(true)
}

/// Two count panels side by side; drawn when at least one side has data.
fn dual_bar_chart(
    path: &Path,
    left: (&str, &[(String, f64)]),
    right: (&str, &[(String, f64)]),
) -> Result<bool> {
    if left.1.is_empty() && right.1.is_empty() {
        return Ok(false);
    }
    let root = SVGBackend::new(path, (WIDTH * 2, HEIGHT)).into_drawing_area();
    root.fill(&palette::BACKGROUND).map_err(render_err)?;

    let panels = root.split_evenly((1, 2));
    for (panel, ((title, entries), color)) in panels
        .iter()
        .zip([(left, palette::PRIMARY), (right, palette::SECONDARY)])
    {
        if !entries.is_empty() {
            draw_bars(panel, title, entries, color, "count")?;
        }
    }

    root.present().map_err(render_err)?;
    Ok(true)
}

/// One bar per top category, split into price band segments.
fn stacked_bar_chart(
    path: &Path,
    title: &str,
    table: &CrossTable<String>,
    options: &ChartOptions,
) -> Result<bool> {
    let rows = top_rows(table, options.top_categories);
    let bands = &options.price_bands;
    if rows.is_empty() || bands.is_empty() {
        return Ok(false);
    }

    let labels: Vec<String> = rows.iter().map(|(key, _)| key.clone()).collect();
    let tallest = rows
        .iter()
        .map(|(_, counts)| bands.iter().map(|b| counts.get(b)).sum::<u64>())
        .max()
        .unwrap_or(0);

    let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&palette::BACKGROUND).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(slot_range(labels.len()), 0.0..headroom(tallest as f64))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(labels.len())
        .x_label_style((FONT, 12))
        .x_label_formatter(&|v| slot_label(*v, &labels))
        .y_desc("count")
        .draw()
        .map_err(render_err)?;

    // (slot, bottom, top, count) per band, stacked in band order.
    let mut segments: Vec<Vec<(f64, f64, f64, u64)>> = vec![Vec::new(); bands.len()];
    for (i, (_, counts)) in rows.iter().enumerate() {
        let mut bottom = 0.0;
        for (b, band) in bands.iter().enumerate() {
            let n = counts.get(band);
            let top = bottom + n as f64;
            segments[b].push((i as f64, bottom, top, n));
            bottom = top;
        }
    }

    let centred = (FONT, 12)
        .into_font()
        .color(&palette::TEXT)
        .pos(Pos::new(HPos::Center, VPos::Center));
    for (b, band) in bands.iter().enumerate() {
        let color = palette::series_color(b);
        chart
            .draw_series(segments[b].iter().filter(|s| s.3 > 0).map(|&(x, lo, hi, _)| {
                Rectangle::new([(x - BAR_HALF_WIDTH, lo), (x + BAR_HALF_WIDTH, hi)], color.filled())
            }))
            .map_err(render_err)?
            .label(band.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

        chart
            .draw_series(segments[b].iter().filter(|s| s.3 > 0).map(|&(x, lo, hi, n)| {
                Text::new(n.to_string(), (x, (lo + hi) / 2.0), centred.clone())
            }))
            .map_err(render_err)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(palette::BACKGROUND.mix(0.8))
        .border_style(palette::TEXT)
        .label_font((FONT, 13))
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(true)
}

fn heatmap(
    path: &Path,
    title: &str,
    table: &CrossTable<String>,
    options: &ChartOptions,
) -> Result<bool> {
    let rows = top_rows(table, options.top_categories);
    let bands = &options.price_bands;
    if rows.is_empty() || bands.is_empty() {
        return Ok(false);
    }

    let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&palette::BACKGROUND).map_err(render_err)?;

    let n_rows = rows.len();
    let n_cols = bands.len();
    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(140)
        .build_cartesian_2d(slot_range(n_cols), slot_range(n_rows))
        .map_err(render_err)?;

    // Highest-volume category on the top row.
    let row_labels: Vec<String> = rows.iter().rev().map(|(key, _)| key.clone()).collect();
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_cols)
        .y_labels(n_rows)
        .x_label_formatter(&|v| slot_label(*v, bands))
        .y_label_formatter(&|v| slot_label(*v, &row_labels))
        .x_desc("average price")
        .draw()
        .map_err(render_err)?;

    let mut cells = Vec::with_capacity(n_rows * n_cols);
    for (i, (_, counts)) in rows.iter().enumerate() {
        let r = (n_rows - 1 - i) as f64;
        for (c, band) in bands.iter().enumerate() {
            cells.push((r, c as f64, row_share(counts, band)));
        }
    }

    chart
        .draw_series(cells.iter().map(|&(r, c, share)| {
            Rectangle::new(
                [(c - 0.5, r - 0.5), (c + 0.5, r + 0.5)],
                palette::heat_color(share).filled(),
            )
        }))
        .map_err(render_err)?;

    let centred = (FONT, 13)
        .into_font()
        .color(&palette::TEXT)
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart
        .draw_series(
            cells
                .iter()
                .map(|&(r, c, share)| Text::new(share_label(share), (c, r), centred.clone())),
        )
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(true)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

const BAR_HALF_WIDTH: f64 = 0.4;

fn draw_bars(
    area: &Area<'_>,
    title: &str,
    entries: &[(String, f64)],
    color: RGBColor,
    y_desc: &str,
) -> Result<()> {
    let max = entries.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let labels: Vec<String> = entries.iter().map(|(l, _)| l.clone()).collect();

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 24))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(slot_range(entries.len()), 0.0..headroom(max))
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(entries.len())
        .x_label_style((FONT, 12))
        .x_label_formatter(&|v| slot_label(*v, &labels))
        .y_desc(y_desc)
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(entries.iter().enumerate().map(|(i, (_, v))| {
            let x = i as f64;
            Rectangle::new(
                [(x - BAR_HALF_WIDTH, 0.0), (x + BAR_HALF_WIDTH, *v)],
                color.filled(),
            )
        }))
        .map_err(render_err)?;

    Ok(())
}

/// Axis with one unit-wide slot per category, slot `i` centred on `i`.
fn slot_range(n: usize) -> Range<f64> {
    -0.5..(n as f64 - 0.5)
}

/// Category at an integral tick, empty between slots and past either end.
fn slot_label(value: f64, labels: &[String]) -> String {
    let nearest = value.round();
    if (value - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    labels.get(nearest as usize).cloned().unwrap_or_default()
}

/// Upper y bound with 10% room above the tallest bar.
fn headroom(max: f64) -> f64 {
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

/// Share of `band` in its row, 0 for an empty row.
fn row_share(counts: &FrequencyTable, band: &str) -> f64 {
    let total = counts.total();
    if total == 0 {
        0.0
    } else {
        counts.get(band) as f64 / total as f64
    }
}

fn share_label(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

fn as_values(entries: Vec<(String, u64)>) -> Vec<(String, f64)> {
    entries.into_iter().map(|(label, n)| (label, n as f64)).collect()
}

fn ranked(table: &FrequencyTable) -> Vec<(String, f64)> {
    table
        .by_count_desc()
        .into_iter()
        .map(|(label, n)| (label.to_string(), n as f64))
        .collect()
}

fn owned(table: &FrequencyTable) -> Vec<(String, u64)> {
    table.iter().map(|(label, n)| (label.to_string(), n)).collect()
}

/// Up to `limit` rows with the largest totals, ties broken by key.
fn top_rows(table: &CrossTable<String>, limit: usize) -> Vec<(String, &FrequencyTable)> {
    let mut rows: Vec<(String, &FrequencyTable)> = table
        .iter()
        .filter(|(_, counts)| counts.total() > 0)
        .map(|(key, counts)| (key.clone(), counts))
        .collect();
    rows.sort_by(|a, b| b.1.total().cmp(&a.1.total()).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(limit);
    rows
}

fn render_err<E: std::fmt::Display>(err: E) -> StatsError {
    StatsError::Render(err.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
