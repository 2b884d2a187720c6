//! Per-record derived fields: corrected country, age bucket, and the values
//! pulled out of the purchase and login blobs.

use regex::Regex;
use userstats_core::data_processors::{decode_blob_or_empty, LoginExtractor, PurchaseExtractor};
use userstats_core::models::{AgeBuckets, AgeGroup, AgeRange, PriceBands, UserRecord};
use userstats_core::settings::{AnalysisConfig, CountryPolicy};
use userstats_core::{Result, StatsError};

/// Chinese provinces, municipalities and SARs recognised by the
/// region-name country rule.
const REGION_NAMES: &[&str] = &[
    "中国", "北京", "上海", "天津", "重庆", "河北", "山西", "辽宁", "吉林", "黑龙江", "江苏",
    "浙江", "安徽", "福建", "江西", "山东", "河南", "湖北", "湖南", "广东", "海南", "四川",
    "贵州", "云南", "陕西", "甘肃", "青海", "台湾", "内蒙古", "广西", "西藏", "宁夏", "新疆",
    "香港", "澳门",
];

/// Placeholder-based country correction.
///
/// An address equal to `placeholder` keeps the record's own country; any
/// other address, including a missing one, yields `corrected`.
pub fn correct_country(
    address: Option<&str>,
    original_country: Option<&str>,
    placeholder: &str,
    corrected: &str,
) -> Option<String> {
    if address == Some(placeholder) {
        original_country.map(str::to_string)
    } else {
        Some(corrected.to_string())
    }
}

// ── CountryRule ───────────────────────────────────────────────────────────────

/// Compiled form of [`CountryPolicy`].
#[derive(Debug, Clone)]
pub enum CountryRule {
    Placeholder { placeholder: String, corrected: String },
    RegionNames { pattern: Regex, corrected: String },
}

impl CountryRule {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let corrected = config.corrected_country.clone();
        match config.country_policy {
            CountryPolicy::Placeholder => Ok(CountryRule::Placeholder {
                placeholder: config.placeholder_address.clone(),
                corrected,
            }),
            CountryPolicy::RegionNames => {
                let pattern = Regex::new(&REGION_NAMES.join("|"))
                    .map_err(|e| StatsError::Config(format!("region pattern: {}", e)))?;
                Ok(CountryRule::RegionNames { pattern, corrected })
            }
        }
    }

    pub fn apply(&self, address: Option<&str>, original_country: Option<&str>) -> Option<String> {
        match self {
            CountryRule::Placeholder {
                placeholder,
                corrected,
            } => correct_country(address, original_country, placeholder, corrected),
            CountryRule::RegionNames { pattern, corrected } => {
                if address.is_some_and(|a| pattern.is_match(a)) {
                    Some(corrected.clone())
                } else {
                    original_country.map(str::to_string)
                }
            }
        }
    }
}

// ── NormalizedUser ────────────────────────────────────────────────────────────

/// A deduplicated record with every field the aggregator counts.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUser {
    pub age: Option<i64>,
    pub age_group: AgeGroup,
    pub age_in_range: bool,
    pub gender: Option<String>,
    /// Address was exactly the non-Chinese placeholder.
    pub placeholder_address: bool,
    pub country: Option<String>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    /// Finite `average_price` from the purchase blob.
    pub average_price: Option<f64>,
    pub price_band: Option<String>,
    pub devices: Vec<String>,
}

// ── FieldNormalizer ───────────────────────────────────────────────────────────

pub struct FieldNormalizer {
    country_rule: CountryRule,
    placeholder: String,
    age_in_range: AgeRange,
    age_buckets: AgeBuckets,
    price_bands: PriceBands,
}

impl FieldNormalizer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            country_rule: CountryRule::from_config(config)?,
            placeholder: config.placeholder_address.clone(),
            age_in_range: config.age_in_range,
            age_buckets: config.age_buckets,
            price_bands: config.price_bands.clone(),
        })
    }

    /// Never fails: undecodable blobs contribute nothing.
    pub fn normalize(&self, record: UserRecord) -> NormalizedUser {
        let purchase = PurchaseExtractor::extract(&decode_blob_or_empty(
            record.purchase_history.as_deref(),
        ));
        let devices = LoginExtractor::devices(&decode_blob_or_empty(
            record.login_history.as_deref(),
        ));

        let address = record.address.as_deref();
        let country = self
            .country_rule
            .apply(address, record.country.as_deref());

        NormalizedUser {
            age: record.age,
            age_group: self.age_buckets.classify(record.age),
            age_in_range: record.age.is_some_and(|a| self.age_in_range.contains(a)),
            placeholder_address: address == Some(self.placeholder.as_str()),
            country,
            gender: record.gender,
            price_band: purchase
                .average_price
                .and_then(|price| self.price_bands.band_for(price)),
            average_price: purchase.average_price.filter(|p| p.is_finite()),
            category: purchase.category,
            payment_method: purchase.payment_method,
            devices,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
