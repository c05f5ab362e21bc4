// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::InvoiceId;
use crate::model::{DocStatus, InvoiceSummary};
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const SUPPLIERS: [&str; 6] = [
    "Albion Produce Ltd",
    "Dockside Seafoods",
    "Eastgate Dairy",
    "Fenland Grains",
    "Kingsmead Bakery",
    "Mercia Paper Co",
];

/// Seeded invoice generator for the colocated tests. Deliberately smaller
/// than the workspace testkit so this crate's tests stay free of
/// dev-dependency cycles.
#[derive(Debug, Clone)]
pub struct InvoiceFaker {
    state: u64,
    seed: u64,
    sequence: u64,
}

impl InvoiceFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            state: normalized ^ 0x9E37_79B9_7F4A_7C15,
            seed: normalized,
            sequence: 0,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    /// An invoice whose document date and upload timestamp both sit at `at`.
    pub fn invoice_dated(&mut self, at: OffsetDateTime) -> InvoiceSummary {
        self.sequence += 1;
        let supplier = SUPPLIERS[(self.next_u64() % SUPPLIERS.len() as u64) as usize];

        InvoiceSummary {
            id: InvoiceId::new(format!("inv-{:04x}-{:06}", self.seed & 0xFFFF, self.sequence)),
            invoice_number: format!("INV-{}-{:05}", at.year(), self.sequence),
            supplier: supplier.to_owned(),
            invoice_date: rfc3339(at),
            total_amount_pennies: 250 + (self.next_u64() % 2_500_000) as i64,
            currency: "GBP".to_owned(),
            status: DocStatus::Pending,
            confidence: None,
            upload_timestamp: at,
        }
    }

    /// `count` invoices stepped evenly across the `span_days` days ending
    /// at `now`, so every date range in the span is populated.
    pub fn invoices_spread_over_days(
        &mut self,
        count: usize,
        span_days: i64,
        now: OffsetDateTime,
    ) -> Vec<InvoiceSummary> {
        let span_seconds = span_days.max(1) * 86_400 - 1;
        let stride_denominator = count.saturating_sub(1).max(1) as i64;
        (0..count)
            .map(|index| {
                let back = span_seconds * index as i64 / stride_denominator;
                self.invoice_dated(now - Duration::seconds(back))
            })
            .collect()
    }
}

/// Fixed reference instant used as "now" across the test suites.
pub fn fixture_now() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).expect("well-known format")
}
