use hdrhistogram::Histogram;

/// Per-bucket latency distribution at microsecond resolution.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, String> {
        let hist = Histogram::<u64>::new(3)
            .map_err(|err| format!("Failed to create histogram: {}", err))?;
        Ok(Self { hist })
    }

    /// Record a latency value in milliseconds.
    pub fn record_ms(&mut self, latency_ms: f64) {
        let micros = (latency_ms.max(0.0) * 1000.0).round();
        let value = if micros >= u64::MAX as f64 {
            u64::MAX
        } else {
            (micros as u64).max(1)
        };
        self.hist.saturating_record(value);
    }

    /// Value at `quantile` (0.0 to 1.0) in milliseconds, `None` when empty.
    #[must_use]
    pub fn value_at_ms(&self, quantile: f64) -> Option<f64> {
        if self.count() == 0 {
            return None;
        }
        let micros = self.hist.value_at_quantile(quantile);
        Some(micros as f64 / 1000.0)
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}
