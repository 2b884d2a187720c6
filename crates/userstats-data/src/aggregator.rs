use std::collections::BTreeMap;

use userstats_core::formatting::percentage;
use userstats_core::models::{AgeGroup, AgeHistogram, CrossTable, FrequencyTable, PriceSummary};

use crate::normalizer::NormalizedUser;

/// Every counter and table accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub files_processed: u64,
    /// Rows read before deduplication.
    pub raw_rows: u64,
    pub total_users: u64,
    pub age_in_range: u64,
    pub abnormal_address: u64,

    pub gender: FrequencyTable,
    pub country: FrequencyTable,
    pub product: FrequencyTable,
    pub payment: FrequencyTable,
    pub device: FrequencyTable,

    pub age_product: CrossTable<AgeGroup>,
    pub age_payment: CrossTable<AgeGroup>,
    pub gender_product: CrossTable<String>,
    pub gender_payment: CrossTable<String>,
    /// Product category × average-price band.
    pub category_price: CrossTable<String>,

    /// Every known age, before the in-range filter.
    pub age_histogram: AgeHistogram,
    pub age_histogram_in_range: AgeHistogram,
    /// Average purchase price per tracked age group.
    pub price_by_age: BTreeMap<AgeGroup, PriceSummary>,
}

impl UserStats {
    pub fn age_out_of_range(&self) -> u64 {
        self.total_users.saturating_sub(self.age_in_range)
    }

    /// Percentage of users inside the valid age range, 0 when there are none.
    pub fn age_in_range_ratio(&self) -> f64 {
        percentage(self.age_in_range as f64, self.total_users as f64, 2)
    }

    pub fn abnormal_address_ratio(&self) -> f64 {
        percentage(self.abnormal_address as f64, self.total_users as f64, 2)
    }

    pub fn duplicate_rows(&self) -> u64 {
        self.raw_rows.saturating_sub(self.total_users)
    }

    /// Mean price per age group in bucket order, groups without prices omitted.
    pub fn average_price_by_age(&self) -> Vec<(AgeGroup, f64)> {
        self.price_by_age
            .iter()
            .filter_map(|(group, summary)| summary.mean().map(|mean| (*group, mean)))
            .collect()
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Sole mutator of [`UserStats`] during a run.
pub struct Aggregator {
    binary_genders: Vec<String>,
    stats: UserStats,
}

impl Aggregator {
    pub fn new(binary_genders: Vec<String>, age_bin_width: i64) -> Self {
        Self {
            binary_genders,
            stats: UserStats {
                age_histogram: AgeHistogram::new(age_bin_width),
                age_histogram_in_range: AgeHistogram::new(age_bin_width),
                ..UserStats::default()
            },
        }
    }

    /// Account for one input file and the rows it held before dedup.
    pub fn record_chunk(&mut self, raw_rows: u64) {
        self.stats.files_processed += 1;
        self.stats.raw_rows += raw_rows;
    }

    pub fn add(&mut self, user: &NormalizedUser) {
        let stats = &mut self.stats;

        stats.total_users += 1;
        if user.age_in_range {
            stats.age_in_range += 1;
        }
        if let Some(age) = user.age {
            stats.age_histogram.record(age);
            if user.age_in_range {
                stats.age_histogram_in_range.record(age);
            }
        }
        if let Some(gender) = &user.gender {
            stats.gender.increment(gender);
        }
        if user.placeholder_address {
            stats.abnormal_address += 1;
        }
        if let Some(country) = &user.country {
            stats.country.increment(country);
        }
        if let Some(category) = &user.category {
            stats.product.increment(category);
        }
        if let Some(payment) = &user.payment_method {
            stats.payment.increment(payment);
        }
        for device in &user.devices {
            stats.device.increment(device);
        }

        // Rows are created for every tracked bucket even when the record has
        // no category or payment.
        if user.age_group.is_tracked() {
            let row = stats.age_product.row_mut(user.age_group);
            if let Some(category) = &user.category {
                row.increment(category);
            }
            let row = stats.age_payment.row_mut(user.age_group);
            if let Some(payment) = &user.payment_method {
                row.increment(payment);
            }
            if let Some(price) = user.average_price {
                stats.price_by_age.entry(user.age_group).or_default().add(price);
            }
        }

        let binary_gender = user
            .gender
            .as_ref()
            .filter(|g| self.binary_genders.iter().any(|b| b == *g));
        if let Some(gender) = binary_gender {
            let row = stats.gender_product.row_mut(gender.clone());
            if let Some(category) = &user.category {
                row.increment(category);
            }
            let row = stats.gender_payment.row_mut(gender.clone());
            if let Some(payment) = &user.payment_method {
                row.increment(payment);
            }
        }

        if let (Some(category), Some(band)) = (&user.category, &user.price_band) {
            stats.category_price.increment(category.clone(), band);
        }
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn finish(self) -> UserStats {
        self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
