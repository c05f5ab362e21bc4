// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use docket_app::{DeliveryNoteId, DeliveryNoteSummary, DocStatus, InvoiceId, InvoiceSummary};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const SUPPLIERS: [&str; 14] = [
    "Albion Produce Ltd",
    "Brightwell Packaging",
    "Caldwell & Sons",
    "Dockside Seafoods",
    "Eastgate Dairy",
    "Fenland Grains",
    "Greenway Catering Supplies",
    "Harbourview Meats",
    "Ironbridge Hardware",
    "Kingsmead Bakery",
    "Larkspur Beverages",
    "Mercia Paper Co",
    "Northfield Farm Foods",
    "Orchard Lane Grocers",
];

const STATUSES: [DocStatus; 4] = [
    DocStatus::Pending,
    DocStatus::Scanned,
    DocStatus::Matched,
    DocStatus::Unmatched,
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
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

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceFaker {
    rng: DeterministicRng,
    seed: u64,
    sequence: u64,
}

impl InvoiceFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
            sequence: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// An invoice dated somewhere in the 120 days leading up to `now`.
    pub fn invoice(&mut self, now: OffsetDateTime) -> InvoiceSummary {
        let back = self.int_range_i64(0, 120 * 86_400 - 1);
        self.invoice_dated(now - Duration::seconds(back))
    }

    /// An invoice whose document date and upload timestamp both sit at `at`.
    pub fn invoice_dated(&mut self, at: OffsetDateTime) -> InvoiceSummary {
        self.sequence += 1;
        let supplier = self.pick(&SUPPLIERS).to_owned();
        let status = STATUSES[self.rng.int_n(STATUSES.len())];
        let confidence = if self.rng.int_n(10) < 7 {
            Some((50 + self.rng.int_n(50)) as f64 / 100.0)
        } else {
            None
        };

        InvoiceSummary {
            id: InvoiceId::new(format!("inv-{:04x}-{:06}", self.seed & 0xFFFF, self.sequence)),
            invoice_number: format!("INV-{}-{:05}", at.year(), self.int_range_i64(1, 99_999)),
            supplier,
            invoice_date: rfc3339(at),
            total_amount_pennies: self.int_range_i64(250, 2_500_000),
            currency: "GBP".to_owned(),
            status,
            confidence,
            upload_timestamp: at,
        }
    }

    /// `count` invoices dated at uniformly random instants within the
    /// `span_days` days ending at `now`.
    pub fn invoices_spread_over_days(
        &mut self,
        count: usize,
        span_days: i64,
        now: OffsetDateTime,
    ) -> Vec<InvoiceSummary> {
        let span_seconds = span_days.max(1) * 86_400;
        (0..count)
            .map(|_| {
                let back = self.int_range_i64(0, span_seconds - 1);
                self.invoice_dated(now - Duration::seconds(back))
            })
            .collect()
    }

    /// An unpaired delivery note dated at `at`.
    pub fn delivery_note_dated(&mut self, at: OffsetDateTime) -> DeliveryNoteSummary {
        self.sequence += 1;
        DeliveryNoteSummary {
            id: DeliveryNoteId::new(format!(
                "dn-{:04x}-{:06}",
                self.seed & 0xFFFF,
                self.sequence
            )),
            delivery_number: format!("DN-{}-{:05}", at.year(), self.int_range_i64(1, 99_999)),
            supplier: self.pick(&SUPPLIERS).to_owned(),
            delivery_date: rfc3339(at),
            invoice_id: None,
            status: DocStatus::Unmatched,
            upload_timestamp: at,
        }
    }

    /// A delivery note already paired with `invoice`, sharing its supplier.
    pub fn delivery_note_for(
        &mut self,
        invoice: &InvoiceSummary,
        at: OffsetDateTime,
    ) -> DeliveryNoteSummary {
        let mut note = self.delivery_note_dated(at);
        note.supplier = invoice.supplier.clone();
        note.invoice_id = Some(invoice.id.clone());
        note.status = DocStatus::Matched;
        note
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("docket.db");
    Ok((dir, db_path))
}

/// Fixed reference instant used as "now" across the test suites.
pub fn fixture_now() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).expect("well-known format")
}
