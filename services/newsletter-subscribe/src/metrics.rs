// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for submission outcomes.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::outcome::Outcome;

/// Per-service metrics registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    outcomes: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let outcomes = IntCounterVec::new(
            Opts::new(
                "newsletter_subscribe_outcomes_total",
                "Subscription attempts by terminal outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(outcomes.clone()))?;

        Ok(Self { registry, outcomes })
    }

    pub fn record(&self, outcome: &Outcome) {
        self.outcomes.with_label_values(&[outcome.label()]).inc();
    }

    pub fn count(&self, outcome: &Outcome) -> u64 {
        self.outcomes.with_label_values(&[outcome.label()]).get()
    }

    /// Render the registry in the Prometheus text format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
