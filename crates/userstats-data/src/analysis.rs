//! Streaming analysis pipeline.
//!
//! Files are processed one at a time in enumeration order:
//! read, deduplicate against everything seen so far, normalise, aggregate.
//! Only the current file's rows are held in memory.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};
use userstats_core::models::UserRecord;
use userstats_core::settings::AnalysisConfig;
use userstats_core::Result;

use crate::aggregator::{Aggregator, UserStats};
use crate::dedup::Deduplicator;
use crate::normalizer::FieldNormalizer;
use crate::reader::{find_data_files, read_chunk};

// ── Public types ──────────────────────────────────────────────────────────────

/// Row counts for one processed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSummary {
    pub raw_rows: usize,
    /// Rows whose identifier had not been seen before.
    pub accepted: usize,
}

/// Metadata produced alongside the statistics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub data_dir: String,
    pub files_processed: usize,
    /// Rows read before deduplication.
    pub raw_rows: u64,
    pub unique_users: u64,
    /// Wall-clock seconds for the whole pass.
    pub elapsed_seconds: f64,
}

/// The complete output of [`analyze_directory`].
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub stats: UserStats,
    pub metadata: AnalysisMetadata,
}

// ── StreamingPipeline ─────────────────────────────────────────────────────────

/// Owns the dedup set and the accumulator for a single run.
pub struct StreamingPipeline {
    dedup: Deduplicator,
    normalizer: FieldNormalizer,
    aggregator: Aggregator,
}

impl StreamingPipeline {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dedup: Deduplicator::new(),
            normalizer: FieldNormalizer::new(config)?,
            aggregator: Aggregator::new(config.binary_genders.clone(), config.age_bin_width),
        })
    }

    pub fn process_chunk(&mut self, chunk: Vec<UserRecord>) -> ChunkSummary {
        let raw_rows = chunk.len();
        self.aggregator.record_chunk(raw_rows as u64);

        let fresh = self.dedup.filter_new(chunk);
        let accepted = fresh.len();
        for record in fresh {
            let user = self.normalizer.normalize(record);
            self.aggregator.add(&user);
        }

        ChunkSummary { raw_rows, accepted }
    }

    pub fn unique_users(&self) -> usize {
        self.dedup.len()
    }

    pub fn stats(&self) -> &UserStats {
        self.aggregator.stats()
    }

    pub fn finish(self) -> UserStats {
        self.aggregator.finish()
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full pass over `config.data_dir`.
///
/// Any I/O or schema error aborts the run; no partial result is returned.
pub fn analyze_directory(config: &AnalysisConfig) -> Result<AnalysisResult> {
    let start = Instant::now();
    let mut pipeline = StreamingPipeline::new(config)?;

    let files = find_data_files(&config.data_dir, &config.file_pattern)?;
    info!(
        "Found {} data file(s) in {}",
        files.len(),
        config.data_dir.display()
    );

    for path in &files {
        let records = read_chunk(path, &config.columns)?;
        let summary = pipeline.process_chunk(records);
        info!(
            "Processed {}: {} rows, {} new users",
            path.file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy()),
            summary.raw_rows,
            summary.accepted
        );
        debug!("Unique users so far: {}", pipeline.unique_users());
    }

    let stats = pipeline.finish();
    let elapsed = start.elapsed().as_secs_f64();

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        data_dir: config.data_dir.display().to_string(),
        files_processed: files.len(),
        raw_rows: stats.raw_rows,
        unique_users: stats.total_users,
        elapsed_seconds: elapsed,
    };

    info!(
        "Analysis finished: {} unique users from {} rows in {:.2}s",
        metadata.unique_users, metadata.raw_rows, metadata.elapsed_seconds
    );

    Ok(AnalysisResult { stats, metadata })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bare_row, user_row, write_users};
    use tempfile::TempDir;
    use userstats_core::models::AgeGroup;
    use userstats_core::settings::DEFAULT_PLACEHOLDER_ADDRESS;
    use userstats_core::StatsError;

    const PURCHASE_BOOK: &str =
        r#"{"categories": "书籍", "payment_method": "支付宝", "average_price": 45.0}"#;
    const PURCHASE_PHONE: &str =
        r#"{"categories": "电子产品", "payment_method": "信用卡", "average_price": 3200}"#;

    fn pipeline() -> StreamingPipeline {
        StreamingPipeline::new(&AnalysisConfig::default()).unwrap()
    }

    fn config_for(dir: &TempDir) -> AnalysisConfig {
        AnalysisConfig {
            data_dir: dir.path().to_path_buf(),
            ..AnalysisConfig::default()
        }
    }

    fn sample_files(dir: &TempDir) {
        write_users(
            dir.path(),
            "part-000.parquet",
            &[
                user_row(
                    "u1",
                    Some(25),
                    Some("男"),
                    Some("北京市海淀区"),
                    Some("Japan"),
                    Some(PURCHASE_BOOK),
                    Some(r#"{"devices": ["mobile", "desktop"]}"#),
                ),
                user_row(
                    "u2",
                    Some(60),
                    Some("非二元"),
                    Some(DEFAULT_PLACEHOLDER_ADDRESS),
                    Some("USA"),
                    Some(PURCHASE_PHONE),
                    Some(r#"{"devices": ["tablet"]}"#),
                ),
            ],
        );
        write_users(
            dir.path(),
            "part-001.parquet",
            &[
                user_row(
                    "u1",
                    Some(99),
                    Some("女"),
                    None,
                    None,
                    Some(PURCHASE_PHONE),
                    None,
                ),
                user_row(
                    "u3",
                    Some(40),
                    Some("女"),
                    Some("广州市天河区"),
                    Some("China"),
                    Some("not json at all"),
                    Some(r#"{"devices": "mobile"}"#),
                ),
            ],
        );
    }

    // ── StreamingPipeline ─────────────────────────────────────────────────────

    #[test]
    fn test_duplicate_identifier_counted_once() {
        let mut p = pipeline();
        let summary = p.process_chunk(vec![
            bare_row("u1", Some(20)),
            bare_row("u2", Some(20)),
            bare_row("u1", Some(20)),
        ]);

        assert_eq!(summary, ChunkSummary { raw_rows: 3, accepted: 2 });
        assert_eq!(p.unique_users(), 2);
        assert_eq!(p.finish().total_users, 2);
    }

    #[test]
    fn test_country_correction_scenarios() {
        let mut p = pipeline();
        p.process_chunk(vec![
            user_row(
                "a",
                None,
                None,
                Some(DEFAULT_PLACEHOLDER_ADDRESS),
                Some("USA"),
                None,
                None,
            ),
            user_row(
                "b",
                None,
                None,
                Some("123 Main St, Beijing"),
                Some("USA"),
                None,
                None,
            ),
        ]);
        let stats = p.finish();

        assert_eq!(stats.country.get("USA"), 1);
        assert_eq!(stats.country.get("China"), 1);
        assert_eq!(stats.abnormal_address, 1);
    }

    #[test]
    fn test_undecodable_purchase_only_skips_purchase_tables() {
        let mut p = pipeline();
        p.process_chunk(vec![user_row(
            "u1",
            Some(30),
            Some("男"),
            None,
            None,
            Some("{\"categories\": "),
            None,
        )]);
        let stats = p.finish();

        assert_eq!(stats.total_users, 1);
        assert!(stats.product.is_empty());
        assert!(stats.payment.is_empty());
        assert_eq!(stats.gender.get("男"), 1);
    }

    #[test]
    fn test_non_binary_gender_scenario() {
        let mut p = pipeline();
        p.process_chunk(vec![user_row(
            "u1",
            Some(30),
            Some("非二元"),
            None,
            None,
            Some(PURCHASE_BOOK),
            None,
        )]);
        let stats = p.finish();

        assert_eq!(stats.gender.get("非二元"), 1);
        assert!(stats.gender_product.is_empty());
        assert!(stats.gender_payment.is_empty());
        assert_eq!(stats.product.get("书籍"), 1);
    }

    #[test]
    fn test_age_boundaries() {
        let mut p = pipeline();
        p.process_chunk(vec![
            user_row("a17", Some(17), None, None, None, Some(PURCHASE_BOOK), None),
            user_row("a18", Some(18), None, None, None, Some(PURCHASE_BOOK), None),
            user_row("a70", Some(70), None, None, None, Some(PURCHASE_BOOK), None),
            user_row("a71", Some(71), None, None, None, Some(PURCHASE_BOOK), None),
        ]);
        let stats = p.finish();

        assert_eq!(stats.age_in_range, 2);
        assert_eq!(stats.age_out_of_range(), 2);
        assert_eq!(stats.age_product.row(&AgeGroup::Young).unwrap().get("书籍"), 1);
        assert_eq!(stats.age_product.row(&AgeGroup::Senior).unwrap().get("书籍"), 1);
        assert!(stats.age_product.row(&AgeGroup::Other).is_none());
        assert_eq!(stats.age_product.total(), 2);
    }

    #[test]
    fn test_age_histogram_and_price_by_age() {
        let config = AnalysisConfig {
            age_bin_width: 10,
            ..AnalysisConfig::default()
        };
        let mut p = StreamingPipeline::new(&config).unwrap();
        p.process_chunk(vec![
            user_row("a", Some(25), None, None, None, Some(PURCHASE_BOOK), None),
            user_row("b", Some(27), None, None, None, Some(PURCHASE_PHONE), None),
            user_row("c", Some(12), None, None, None, Some(PURCHASE_PHONE), None),
            bare_row("d", None),
        ]);
        let stats = p.finish();

        assert_eq!(stats.age_histogram.total(), 3);
        assert_eq!(
            stats.age_histogram_in_range.labelled(),
            vec![("20-29".to_string(), 2)]
        );
        assert_eq!(
            stats.average_price_by_age(),
            vec![(AgeGroup::Young, (45.0 + 3200.0) / 2.0)]
        );
    }

    #[test]
    fn test_dedup_set_tracks_distinct_ids_across_chunks() {
        let mut p = pipeline();
        p.process_chunk(vec![bare_row("a", None), bare_row("b", None)]);
        let second = p.process_chunk(vec![bare_row("b", None), bare_row("c", None)]);
        assert_eq!(second.accepted, 1);
        assert_eq!(p.unique_users(), 3);
        assert_eq!(p.stats().raw_rows, 4);
        assert_eq!(p.stats().files_processed, 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig {
            file_pattern: String::new(),
            ..AnalysisConfig::default()
        };
        assert!(StreamingPipeline::new(&config).is_err());
    }

    // ── analyze_directory ─────────────────────────────────────────────────────

    #[test]
    fn test_analyze_directory_end_to_end() {
        let dir = TempDir::new().unwrap();
        sample_files(&dir);

        let result = analyze_directory(&config_for(&dir)).unwrap();
        let stats = &result.stats;

        assert_eq!(result.metadata.files_processed, 2);
        assert_eq!(result.metadata.raw_rows, 4);
        assert_eq!(result.metadata.unique_users, 3);
        assert_eq!(stats.total_users, 3);

        // First-seen u1 (male, 25, books) wins over the later copy.
        assert_eq!(stats.gender.get("男"), 1);
        assert_eq!(stats.gender.get("女"), 1);
        assert_eq!(stats.product.get("书籍"), 1);
        assert_eq!(stats.product.get("电子产品"), 1);

        assert_eq!(stats.country.get("China"), 2);
        assert_eq!(stats.country.get("USA"), 1);
        assert_eq!(stats.abnormal_address, 1);

        assert_eq!(stats.device.get("mobile"), 1);
        assert_eq!(stats.device.get("tablet"), 1);
        assert_eq!(
            stats
                .category_price
                .row(&"电子产品".to_string())
                .unwrap()
                .get("1000+"),
            1
        );
    }

    #[test]
    fn test_analyze_directory_sum_property() {
        let dir = TempDir::new().unwrap();
        sample_files(&dir);
        let stats = analyze_directory(&config_for(&dir)).unwrap().stats;

        // u3's purchase blob is undecodable, so only two users have a product.
        assert_eq!(stats.product.total(), 2);
        assert_eq!(stats.payment.total(), 2);
        assert_eq!(stats.gender.total(), 3);
        assert_eq!(stats.country.total(), 3);
    }

    #[test]
    fn test_analyze_directory_is_idempotent() {
        let dir = TempDir::new().unwrap();
        sample_files(&dir);
        let config = config_for(&dir);

        let first = analyze_directory(&config).unwrap().stats;
        let second = analyze_directory(&config).unwrap().stats;
        assert_eq!(first, second);
    }

    #[test]
    fn test_analyze_directory_empty() {
        let dir = TempDir::new().unwrap();
        let result = analyze_directory(&config_for(&dir)).unwrap();
        assert_eq!(result.metadata.files_processed, 0);
        assert_eq!(result.stats.total_users, 0);
        assert_eq!(result.stats.age_in_range_ratio(), 0.0);
    }

    #[test]
    fn test_analyze_directory_missing_dir() {
        let config = AnalysisConfig {
            data_dir: "/tmp/userstats-does-not-exist-123".into(),
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analyze_directory(&config),
            Err(StatsError::DataPathNotFound(_))
        ));
    }

    #[test]
    fn test_metadata_serializes() {
        let dir = TempDir::new().unwrap();
        let result = analyze_directory(&config_for(&dir)).unwrap();
        let json = serde_json::to_value(&result.metadata).unwrap();
        assert_eq!(json["files_processed"], 0);
        assert!(json["generated_at"].is_string());
    }
}
