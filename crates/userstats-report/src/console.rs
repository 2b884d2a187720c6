//! Plain-text run summary.

use std::fmt::Display;
use std::io::{self, Write};

use userstats_core::formatting::{display_width, format_count, format_ratio, pad_display};
use userstats_core::models::{AgeGroup, AgeHistogram, CrossTable, FrequencyTable};
use userstats_data::analysis::AnalysisResult;

const INDENT: &str = "  ";

/// Write the counts, ratios and tables of `result` to `out`.
pub fn print_summary<W: Write>(result: &AnalysisResult, out: &mut W) -> io::Result<()> {
    let stats = &result.stats;
    let meta = &result.metadata;

    writeln!(out, "Files processed:      {}", format_count(meta.files_processed as u64))?;
    writeln!(out, "Rows read:            {}", format_count(stats.raw_rows))?;
    writeln!(out, "Rows after dedup:     {}", format_count(stats.total_users))?;
    writeln!(out, "Duplicate rows:       {}", format_count(stats.duplicate_rows()))?;
    writeln!(
        out,
        "Age in range:         {} ({})",
        format_count(stats.age_in_range),
        format_ratio(stats.age_in_range, stats.total_users)
    )?;
    writeln!(
        out,
        "Abnormal addresses:   {} ({})",
        format_count(stats.abnormal_address),
        format_ratio(stats.abnormal_address, stats.total_users)
    )?;

    write_table(out, "Gender", &stats.gender)?;
    write_table(out, "Country", &stats.country)?;
    write_table(out, "Product categories", &stats.product)?;
    write_table(out, "Payment methods", &stats.payment)?;
    write_cross(out, "Age group × product", &stats.age_product)?;
    write_cross(out, "Age group × payment", &stats.age_payment)?;
    write_cross(out, "Gender × product", &stats.gender_product)?;
    write_cross(out, "Gender × payment", &stats.gender_payment)?;
    write_table(out, "Devices", &stats.device)?;
    write_histogram(out, "Age distribution", &stats.age_histogram)?;
    write_prices(out, "Average price by age group", &stats.average_price_by_age())?;

    writeln!(out)?;
    writeln!(out, "Analysis time: {:.2} s", meta.elapsed_seconds)?;
    Ok(())
}

// ── Sections ──────────────────────────────────────────────────────────────────

fn write_table<W: Write>(out: &mut W, title: &str, table: &FrequencyTable) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}:", title)?;
    write_rows(out, INDENT, table)
}

fn write_cross<W: Write, K: Ord + Display>(
    out: &mut W,
    title: &str,
    cross: &CrossTable<K>,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}:", title)?;
    if cross.is_empty() {
        writeln!(out, "{}(none)", INDENT)?;
    }
    for (key, row) in cross.iter() {
        writeln!(out, "{}{}", INDENT, key)?;
        write_rows(out, "    ", row)?;
    }
    Ok(())
}

/// Bins in age order rather than by count.
fn write_histogram<W: Write>(out: &mut W, title: &str, hist: &AgeHistogram) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}:", title)?;
    if hist.is_empty() {
        return writeln!(out, "{}(none)", INDENT);
    }
    let total = hist.total();
    let bins = hist.labelled();
    let label_width = bins.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (label, n) in &bins {
        writeln!(
            out,
            "{}{:<lw$}  {:>7}  {:>7}",
            INDENT,
            label,
            format_count(*n),
            format_ratio(*n, total),
            lw = label_width
        )?;
    }
    Ok(())
}

fn write_prices<W: Write>(out: &mut W, title: &str, prices: &[(AgeGroup, f64)]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}:", title)?;
    if prices.is_empty() {
        return writeln!(out, "{}(none)", INDENT);
    }
    let label_width = prices.iter().map(|(g, _)| g.label().len()).max().unwrap_or(0);
    for (group, mean) in prices {
        writeln!(
            out,
            "{}{:<lw$}  {:>10.2}",
            INDENT,
            group.label(),
            mean,
            lw = label_width
        )?;
    }
    Ok(())
}

/// One line per label, counts right-aligned and shares of the table total.
fn write_rows<W: Write>(out: &mut W, indent: &str, table: &FrequencyTable) -> io::Result<()> {
    if table.is_empty() {
        return writeln!(out, "{}(none)", indent);
    }

    let total = table.total();
    let rows = table.by_count_desc();
    let label_width = rows.iter().map(|(l, _)| display_width(l)).max().unwrap_or(0);
    let counts: Vec<String> = rows.iter().map(|(_, n)| format_count(*n)).collect();
    let count_width = counts.iter().map(String::len).max().unwrap_or(0);

    for ((label, n), count) in rows.iter().zip(&counts) {
        writeln!(
            out,
            "{}{}  {:>cw$}  {:>7}",
            indent,
            pad_display(label, label_width),
            count,
            format_ratio(*n, total),
            cw = count_width
        )?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use userstats_data::aggregator::UserStats;
    use userstats_data::analysis::AnalysisMetadata;

    fn result(stats: UserStats) -> AnalysisResult {
        AnalysisResult {
            metadata: AnalysisMetadata {
                generated_at: "2025-04-20T15:43:23+00:00".to_string(),
                data_dir: "data".to_string(),
                files_processed: 2,
                raw_rows: stats.raw_rows,
                unique_users: stats.total_users,
                elapsed_seconds: 1.234,
            },
            stats,
        }
    }

    fn render(result: &AnalysisResult) -> String {
        let mut buf = Vec::new();
        print_summary(result, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_summary_counts_and_ratios() {
        let stats = UserStats {
            raw_rows: 12_500,
            total_users: 8,
            age_in_range: 7,
            abnormal_address: 2,
            ..UserStats::default()
        };
        let text = render(&result(stats));

        assert!(text.contains("Rows read:            12,500"));
        assert!(text.contains("Rows after dedup:     8"));
        assert!(text.contains("Duplicate rows:       12,492"));
        assert!(text.contains("Age in range:         7 (87.50%)"));
        assert!(text.contains("Abnormal addresses:   2 (25.00%)"));
        assert!(text.contains("Analysis time: 1.23 s"));
    }

    #[test]
    fn test_summary_aligns_cjk_labels() {
        let mut stats = UserStats::default();
        stats.gender = ["男", "男", "非二元"].into_iter().collect();
        let text = render(&result(stats));

        let lines: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("  男") || l.starts_with("  非二元"))
            .collect();
        assert_eq!(lines.len(), 2);
        // "男" is two columns wide, "非二元" six: counts line up.
        assert_eq!(lines[0], "  男      2   66.67%");
        assert_eq!(lines[1], "  非二元  1   33.33%");
    }

    #[test]
    fn test_summary_cross_tables() {
        let mut stats = UserStats::default();
        stats.age_product.increment(AgeGroup::Young, "书籍");
        stats.age_product.increment(AgeGroup::Senior, "食品");
        let text = render(&result(stats));

        let young = text.find("  young").unwrap();
        let senior = text.find("  senior").unwrap();
        assert!(young < senior);
        assert!(text.contains("    书籍  1  100.00%"));
    }

    #[test]
    fn test_summary_empty_tables() {
        let text = render(&result(UserStats::default()));
        assert!(text.contains("Gender:\n  (none)"));
        assert!(text.contains("Gender × payment:\n  (none)"));
        assert!(text.contains("Age in range:         0 (0.00%)"));
        assert!(text.contains("Duplicate rows:       0"));
        assert!(text.contains("Age distribution:\n  (none)"));
        assert!(text.contains("Average price by age group:\n  (none)"));
    }

    #[test]
    fn test_summary_age_distribution_in_age_order() {
        let mut stats = UserStats::default();
        for age in [65, 22, 23, 100] {
            stats.age_histogram.record(age);
        }
        let text = render(&result(stats));

        assert!(text.contains("  20-24          2   50.00%"));
        let young = text.find("  20-24").unwrap();
        let old = text.find("  65-69").unwrap();
        let centenarian = text.find("  100-104").unwrap();
        assert!(young < old && old < centenarian);
    }

    #[test]
    fn test_summary_average_price_by_age() {
        let mut stats = UserStats::default();
        let young = stats.price_by_age.entry(AgeGroup::Young).or_default();
        young.add(100.0);
        young.add(51.0);
        stats.price_by_age.entry(AgeGroup::MiddleAged).or_default().add(3200.0);
        let text = render(&result(stats));

        assert!(text.contains("  young             75.50"));
        assert!(text.contains("  middle-aged     3200.00"));
    }
}
