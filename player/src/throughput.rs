use crate::engine::EngineMetrics;
use std::time::Duration;

/// A completed segment download as reported by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub bytes: u64,
    pub duration: Duration,
}

impl Transfer {
    /// Download rate in kbps, `None` for an empty or instantaneous transfer.
    pub fn kbps(&self) -> Option<u64> {
        if self.bytes == 0 || self.duration.is_zero() {
            return None;
        }

        let bits = self.bytes as f64 * 8.0;
        Some((bits / self.duration.as_secs_f64() / 1000.0).round() as u64)
    }
}

/// Throughput observed during one sampling tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThroughputSample {
    pub kbps_instant: u64,
    pub kbps_average: u64,
}

impl ThroughputSample {
    /// Rate fed to the switching thresholds: the last transfer when there is
    /// one, otherwise the running average. Zero means no data.
    pub fn kbps(&self) -> u64 {
        if self.kbps_instant > 0 {
            self.kbps_instant
        } else {
            self.kbps_average
        }
    }

    /// `kbps` discounted by `factor`. Reported alongside every sample but
    /// not compared against the thresholds.
    pub fn safe_kbps(&self, factor: f64) -> u64 {
        (self.kbps() as f64 * factor).round() as u64
    }
}

/// Builds the tick sample from whatever the engine could report. Missing
/// metrics yield an all-zero sample.
pub fn sample(metrics: Option<&EngineMetrics>) -> ThroughputSample {
    let Some(metrics) = metrics else {
        return ThroughputSample::default();
    };

    ThroughputSample {
        kbps_instant: metrics
            .last_transfer
            .and_then(|t| t.kbps())
            .unwrap_or(0),
        kbps_average: metrics.average_kbps.unwrap_or(0),
    }
}
