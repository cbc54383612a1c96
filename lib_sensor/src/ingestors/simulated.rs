//! # Simulated Sensor Generator
//!
//! Produces a plausible stream of readings without hardware: each call moves
//! the previous values by a bounded random step and clamps them to the
//! sensor's physical range.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::core::coordinator::{IngestionCoordinator, Source};
use crate::core::reading::Reading;

const DISTANCE_RANGE: RangeInclusive<f64> = 20.0..=100.0;
const DISTANCE_STEP: f64 = 5.0;
const TDS_RANGE: RangeInclusive<f64> = 100.0..=500.0;
const TDS_STEP: f64 = 25.0;

/// Random-walk generator for distance (cm) and TDS (ppm).
#[derive(Debug)]
pub struct DummyGenerator {
    distance: f64,
    tds: f64,
    rng: StdRng,
}

impl Default for DummyGenerator {
    fn default() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl DummyGenerator {
    /// A reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            distance: 50.0,
            tds: 200.0,
            rng,
        }
    }

    /// Advances the walk and returns the new reading, stamped now.
    pub fn next_reading(&mut self) -> Reading {
        self.distance = step(&mut self.rng, self.distance, DISTANCE_STEP, &DISTANCE_RANGE);
        self.tds = step(&mut self.rng, self.tds, TDS_STEP, &TDS_RANGE);
        Reading::new(self.distance, self.tds, Utc::now())
    }

    /// Submits one reading every `interval` straight to `coordinator`, until
    /// `shutdown` fires. The in-process counterpart of the dummy producer.
    pub async fn feed(mut self, coordinator: Arc<IngestionCoordinator>, interval: Duration, shutdown: CancellationToken) {
        log::info!("Simulated readings every {}ms", interval.as_millis());
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let reading = self.next_reading();
                    let raw = match serde_json::to_value(&reading) {
                        Ok(raw) => raw,
                        Err(e) => {
                            log::error!("Failed to encode simulated reading: {}", e);
                            continue;
                        }
                    };
                    // Failures are logged by the coordinator.
                    let _ = coordinator.submit(&raw, Source::Simulated).await;
                }
            }
        }

        log::info!("Simulated feed stopped.");
    }
}

fn step(rng: &mut StdRng, current: f64, max_step: f64, range: &RangeInclusive<f64>) -> f64 {
    let moved = current + rng.random_range(-max_step..max_step);
    let clamped = moved.clamp(*range.start(), *range.end());
    (clamped * 100.0).round() / 100.0
}
