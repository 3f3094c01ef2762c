use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    turns: IntCounterVec,
    retrieved_chunks: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let turns = IntCounterVec::new(
            Opts::new("analyst_turns_total", "Questions processed, by outcome"),
            &["outcome"],
        )?;
        let retrieved_chunks = IntCounter::new(
            "analyst_retrieved_chunks_total",
            "Document chunks cited in answers",
        )?;
        registry.register(Box::new(turns.clone()))?;
        registry.register(Box::new(retrieved_chunks.clone()))?;

        Ok(Self {
            registry,
            turns,
            retrieved_chunks,
        })
    }

    pub fn record_answer(&self, citations: usize) {
        self.turns.with_label_values(&["answered"]).inc();
        self.retrieved_chunks.inc_by(citations as u64);
    }

    pub fn record_failure(&self, outcome: &str) {
        self.turns.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> (Vec<u8>, String) {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        (buffer, encoder.format_type().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_recorded_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_answer(3);
        metrics.record_failure("retrieval_failure");

        let (body, content_type) = metrics.render();
        let text = String::from_utf8(body).unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("analyst_turns_total{outcome=\"answered\"} 1"));
        assert!(text.contains("analyst_turns_total{outcome=\"retrieval_failure\"} 1"));
        assert!(text.contains("analyst_retrieved_chunks_total 3"));
    }
}
