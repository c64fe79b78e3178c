//! Synthetic labeled telemetry for training and demos.
//!
//! Readings are drawn from fixed distributions and labeled with a threshold
//! rule, so a model trained on them should recover the rule.

use crate::error::{AppError, Result};
use crate::models::{FeatureVector, LabeledSample, RiskLevel};
use rand::distributions::Uniform;
use rand::prelude::*;
use rand_distr::{Exp, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_SAMPLES: usize = 1000;

/// Risk category implied by the readings; first matching rule wins
pub fn label_for(features: &FeatureVector) -> RiskLevel {
    let overheating_or_dry = features.engine_temp > 110.0 || features.oil_level < 0.4;
    let worn = features.brake_health < 60.0 || features.vibration_level > 1.0;

    if overheating_or_dry || worn {
        RiskLevel::High
    } else if features.battery_health < 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Draw `n_samples` labeled rows; identical for identical seeds
pub fn generate(n_samples: usize, seed: u64) -> Result<Vec<LabeledSample>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let engine_temp = Normal::new(90.0, 15.0)
        .map_err(|e| AppError::Internal(format!("engine temperature distribution: {}", e)))?;
    let vibration = Exp::new(2.0)
        .map_err(|e| AppError::Internal(format!("vibration distribution: {}", e)))?;
    let brake = Uniform::new(50.0, 100.0);
    let battery = Uniform::new(60.0, 100.0);
    let oil = Uniform::new(0.3, 1.0);

    let samples: Vec<LabeledSample> = (0..n_samples)
        .map(|i| {
            let features = FeatureVector::new(
                rng.sample(engine_temp),
                rng.sample(brake),
                rng.sample(battery),
                rng.sample(vibration),
                rng.sample(oil),
            );
            LabeledSample::new(format!("V{:04}", i), features, label_for(&features))
        })
        .collect();

    info!("Generated {} synthetic samples (seed {})", samples.len(), seed);
    Ok(samples)
}

/// Write one JSON object per line
pub fn write_json_lines(path: &Path, samples: &[LabeledSample]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for sample in samples {
        serde_json::to_writer(&mut writer, sample)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read JSON-lines records, skipping blank lines
pub fn read_json_lines(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line)? {
            Value::Object(map) => records.push(map),
            other => {
                return Err(AppError::Schema(format!(
                    "line {} is not a JSON object: {}",
                    n + 1,
                    other
                )))
            }
        }
    }
    Ok(records)
}
