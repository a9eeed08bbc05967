use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp, Normal};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::GeneratorSettings;
use crate::error::{AppError, Result};
use crate::models::{EmergencyType, FeatureRecord, LabeledSample};

const PROBABILITY_FLOOR: f64 = 0.01;
const PROBABILITY_CEILING: f64 = 0.95;
const HOLIDAY_RATE: f64 = 0.05;

/// Generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Seed for both the general and the distribution stream
    pub seed: u64,

    /// Share of rows receiving injected sensor noise
    pub outlier_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            outlier_fraction: 0.01,
        }
    }
}

impl From<&GeneratorSettings> for GeneratorConfig {
    fn from(settings: &GeneratorSettings) -> Self {
        Self {
            seed: settings.seed,
            outlier_fraction: settings.outlier_fraction,
        }
    }
}

/// Fixed sampling distributions of the environmental features
struct FeatureDistributions {
    temperature: Normal<f64>,
    humidity: Normal<f64>,
    air_quality: Normal<f64>,
    wind_speed: Exp<f64>,
    precipitation: Exp<f64>,
    population_density: Uniform<f64>,
    building_density: Uniform<f64>,
    emergency_kind: WeightedIndex<f64>,
}

impl FeatureDistributions {
    fn new() -> Result<Self> {
        let weights: Vec<f64> = EmergencyType::WEIGHTED_EMERGENCIES
            .iter()
            .map(|(_, weight)| *weight)
            .collect();

        Ok(Self {
            temperature: normal(25.0, 10.0)?,
            humidity: normal(50.0, 20.0)?,
            air_quality: normal(50.0, 20.0)?,
            wind_speed: exponential(5.0)?,
            precipitation: exponential(2.0)?,
            population_density: Uniform::new(10.0, 1000.0),
            building_density: Uniform::new(0.1, 0.9),
            emergency_kind: WeightedIndex::new(weights)
                .map_err(|e| AppError::Internal(format!("Invalid emergency weights: {}", e)))?,
        })
    }
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev)
        .map_err(|e| AppError::Internal(format!("Invalid normal distribution: {}", e)))
}

/// Exponential distribution parameterized by its scale (mean)
fn exponential(scale: f64) -> Result<Exp<f64>> {
    Exp::new(1.0 / scale)
        .map_err(|e| AppError::Internal(format!("Invalid exponential distribution: {}", e)))
}

/// Probability that an emergency occurs under the given conditions, clamped to [0.01, 0.95]
pub fn emergency_probability(record: &FeatureRecord) -> f64 {
    let temp_effect = (record.temperature - 30.0).max(0.0) / 20.0;
    let wind_effect = record.wind_speed / 20.0;
    let humidity_effect = (30.0 - record.humidity).max(0.0) / 30.0;
    let population_effect = record.population_density / 500.0;
    let building_effect = record.building_density;
    let holiday_effect = record.is_holiday * 0.3;

    let is_summer = (5.0..=8.0).contains(&record.month);
    let base_probability = 0.01 + if is_summer { 0.02 } else { 0.0 };

    let probability = base_probability
        + 0.2 * temp_effect
        + 0.1 * wind_effect
        + 0.15 * humidity_effect
        + 0.2 * population_effect
        + 0.15 * building_effect
        + holiday_effect;

    probability.clamp(PROBABILITY_FLOOR, PROBABILITY_CEILING)
}

/// Seeded synthetic emergency dataset generator
pub struct SyntheticDataGenerator {
    config: GeneratorConfig,
}

impl SyntheticDataGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate hourly records starting one year before now
    pub fn generate(&self, num_records: usize) -> Result<Vec<LabeledSample>> {
        let start = Utc::now() - Duration::days(365);
        self.generate_from(start, num_records)
    }

    /// Generate hourly records starting at `start`; identical inputs give identical output
    pub fn generate_from(
        &self,
        start: DateTime<Utc>,
        num_records: usize,
    ) -> Result<Vec<LabeledSample>> {
        let distributions = FeatureDistributions::new()?;
        let mut general = StdRng::seed_from_u64(self.config.seed);
        let mut sampling = StdRng::seed_from_u64(self.config.seed);

        let samples: Vec<LabeledSample> = (0..num_records)
            .map(|i| {
                let timestamp = start + Duration::hours(i as i64);
                Self::sample_at(timestamp, &distributions, &mut general, &mut sampling)
            })
            .collect();

        let outlier_count =
            ((num_records as f64 * self.config.outlier_fraction) as usize).min(num_records);
        let outliers: BTreeSet<usize> =
            rand::seq::index::sample(&mut sampling, num_records, outlier_count)
                .into_iter()
                .collect();
        let samples = inject_outliers(samples, &outliers);

        let hits = samples
            .iter()
            .filter(|s| s.emergency_type.is_emergency())
            .count();
        info!(
            records = num_records,
            emergencies = hits,
            outliers = outliers.len(),
            seed = self.config.seed,
            "Generated synthetic emergency data"
        );

        Ok(samples)
    }

    fn sample_at(
        timestamp: DateTime<Utc>,
        distributions: &FeatureDistributions,
        general: &mut StdRng,
        sampling: &mut StdRng,
    ) -> LabeledSample {
        let features = FeatureRecord {
            temperature: distributions.temperature.sample(sampling),
            humidity: distributions.humidity.sample(sampling),
            air_quality: distributions.air_quality.sample(sampling),
            wind_speed: distributions.wind_speed.sample(sampling),
            precipitation: distributions.precipitation.sample(sampling),
            population_density: distributions.population_density.sample(sampling),
            building_density: distributions.building_density.sample(sampling),
            hour_of_day: 0.0,
            day_of_week: 0.0,
            is_holiday: if general.gen::<f64>() < HOLIDAY_RATE { 1.0 } else { 0.0 },
            month: 0.0,
            day_of_year: 0.0,
        }
        .with_timestamp(&timestamp);

        let probability = emergency_probability(&features);
        let emergency_type = if general.gen::<f64>() < probability {
            let kind = distributions.emergency_kind.sample(sampling);
            EmergencyType::WEIGHTED_EMERGENCIES[kind].0
        } else {
            EmergencyType::None
        };

        LabeledSample {
            timestamp,
            features,
            emergency_type,
            emergency_probability: probability,
        }
    }
}

/// Emulate sensor noise on a fixed set of rows; labels and probabilities are left untouched
fn inject_outliers(samples: Vec<LabeledSample>, outliers: &BTreeSet<usize>) -> Vec<LabeledSample> {
    samples
        .into_iter()
        .enumerate()
        .map(|(i, mut sample)| {
            if outliers.contains(&i) {
                debug!(row = i, "Injecting outlier");
                sample.features.temperature *= 1.5;
                sample.features.wind_speed *= 2.0;
            }
            sample
        })
        .collect()
}
