use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};

/// Prometheus counters for the gateway
#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    registry: Registry,

    /// Contract reads by entry point and outcome
    pub ledger_reads_total: IntCounterVec,

    /// Transaction submissions by entry point and outcome
    pub submissions_total: IntCounterVec,

    /// Faucet claims by outcome
    pub faucet_claims_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ledger_reads_total = IntCounterVec::new(
            opts!("tokenxllm_ledger_reads_total", "Contract reads issued"),
            &["function", "outcome"],
        )?;

        let submissions_total = IntCounterVec::new(
            opts!("tokenxllm_submissions_total", "Transaction submissions"),
            &["function", "outcome"],
        )?;

        let faucet_claims_total = IntCounterVec::new(
            opts!("tokenxllm_faucet_claims_total", "Faucet claims"),
            &["outcome"],
        )?;

        registry.register(Box::new(ledger_reads_total.clone()))?;
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(faucet_claims_total.clone()))?;

        Ok(Self {
            registry,
            ledger_reads_total,
            submissions_total,
            faucet_claims_total,
        })
    }

    pub fn record_read(&self, function: &str, ok: bool) {
        self.ledger_reads_total
            .with_label_values(&[function, outcome(ok)])
            .inc();
    }

    pub fn record_submission(&self, function: &str, ok: bool) {
        self.submissions_total
            .with_label_values(&[function, outcome(ok)])
            .inc();
    }

    pub fn record_faucet_claim(&self, outcome: &str) {
        self.faucet_claims_total.with_label_values(&[outcome]).inc();
    }

    /// Text exposition of every registered metric
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}
