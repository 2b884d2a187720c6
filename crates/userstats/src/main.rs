mod bootstrap;

use std::time::Instant;

use anyhow::Result;
use userstats_core::settings::Settings;
use userstats_data::analysis::analyze_directory;
use userstats_report::{print_summary, render_report, ChartOptions};

fn main() -> Result<()> {
    let start = Instant::now();
    let (settings, config) = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("userstats v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Data: {}, pattern: {}, output: {}",
        config.data_dir.display(),
        config.file_pattern,
        config.output_dir.display()
    );

    if let Some(path) = &settings.dump_config {
        config.save_to(path)?;
        tracing::info!("Wrote effective configuration to {}", path.display());
    }

    let result = analyze_directory(&config)?;

    let stdout = std::io::stdout();
    print_summary(&result, &mut stdout.lock())?;

    if settings.no_charts {
        tracing::info!("Chart rendering disabled");
    } else {
        let written =
            render_report(&result.stats, &ChartOptions::from(&config), &config.output_dir)?;
        for path in &written {
            tracing::info!("Wrote {}", path.display());
        }
        tracing::info!(
            "{} chart(s) written to {}",
            written.len(),
            config.output_dir.display()
        );
    }

    tracing::info!("Finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
