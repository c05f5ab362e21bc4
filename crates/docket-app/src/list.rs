// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::group::{Bucket, BucketKey, classify};
use crate::layout::{LayoutMetrics, ListLayout, accumulate};
use crate::model::InvoiceSummary;
use crate::window::{RenderPlan, compute_visible};

#[derive(Debug, Clone, PartialEq)]
pub enum ListCommand {
    ToggleBucket(BucketKey),
    Scroll(f64),
    ReplaceRecords {
        records: Vec<InvoiceSummary>,
        now: OffsetDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    BucketToggled { key: BucketKey, expanded: bool },
    Scrolled(u32),
    RecordsReplaced { records: usize, buckets: usize },
}

/// Reactive store behind the grouped invoice list. Owns the bucket
/// snapshot, the expansion set, and the last-known scroll offset; render
/// plans are derived on demand and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceListState {
    buckets: Vec<Bucket>,
    expansion: BTreeSet<BucketKey>,
    scroll_offset: u32,
    metrics: LayoutMetrics,
}

impl InvoiceListState {
    pub fn new(records: Vec<InvoiceSummary>, now: OffsetDateTime) -> Self {
        Self::with_metrics(records, now, LayoutMetrics::default())
    }

    pub fn with_metrics(
        records: Vec<InvoiceSummary>,
        now: OffsetDateTime,
        metrics: LayoutMetrics,
    ) -> Self {
        Self {
            buckets: classify(records, now),
            expansion: Self::default_expansion(),
            scroll_offset: 0,
            metrics,
        }
    }

    /// Recent buckets start expanded; ThisMonth and Older start collapsed.
    pub fn default_expansion() -> BTreeSet<BucketKey> {
        BTreeSet::from([BucketKey::Today, BucketKey::Yesterday, BucketKey::ThisWeek])
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn expansion(&self) -> &BTreeSet<BucketKey> {
        &self.expansion
    }

    pub fn is_expanded(&self, key: BucketKey) -> bool {
        self.expansion.contains(&key)
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll_offset
    }

    pub fn metrics(&self) -> LayoutMetrics {
        self.metrics
    }

    pub fn total_records(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn layout(&self) -> ListLayout {
        accumulate(&self.buckets, &self.expansion, self.metrics)
    }

    pub fn dispatch(&mut self, command: ListCommand) -> Vec<ListEvent> {
        match command {
            ListCommand::ToggleBucket(key) => self.toggle_bucket(key),
            ListCommand::Scroll(offset) => self.on_scroll(offset),
            ListCommand::ReplaceRecords { records, now } => self.replace_records(records, now),
        }
    }

    /// Flip a bucket between expanded and collapsed. Keys with no bucket in
    /// the current sequence are a no-op, not an error; they may become
    /// meaningful again after a record-set replacement.
    pub fn toggle_bucket(&mut self, key: BucketKey) -> Vec<ListEvent> {
        if !self.buckets.iter().any(|bucket| bucket.key == key) {
            return Vec::new();
        }

        let expanded = if self.expansion.remove(&key) {
            false
        } else {
            self.expansion.insert(key);
            true
        };
        self.clamp_scroll();
        vec![ListEvent::BucketToggled { key, expanded }]
    }

    /// Store a new scroll position. Negative and non-finite offsets clamp
    /// to zero; offsets past the end clamp to the content height. Scroll
    /// arrives many times a second during a fling, so this does no work
    /// beyond the clamp.
    pub fn on_scroll(&mut self, offset: f64) -> Vec<ListEvent> {
        let sanitized = sanitize_unit(offset).min(self.layout().total_height);
        if sanitized == self.scroll_offset {
            return Vec::new();
        }
        self.scroll_offset = sanitized;
        vec![ListEvent::Scrolled(sanitized)]
    }

    /// Swap in a freshly loaded record set. Expansion state survives the
    /// replacement; keys for buckets that no longer exist stay in the set
    /// harmlessly.
    pub fn replace_records(
        &mut self,
        records: Vec<InvoiceSummary>,
        now: OffsetDateTime,
    ) -> Vec<ListEvent> {
        self.buckets = classify(records, now);
        self.clamp_scroll();
        vec![ListEvent::RecordsReplaced {
            records: self.total_records(),
            buckets: self.buckets.len(),
        }]
    }

    /// Derive the entries to draw for the current state. Pure: identical
    /// inputs produce an identical plan.
    pub fn render_plan(&self, viewport_height: f64) -> RenderPlan<'_> {
        let viewport = sanitize_unit(viewport_height);
        let layout = self.layout();
        let entries = compute_visible(
            &self.buckets,
            &layout,
            &self.expansion,
            self.metrics,
            self.scroll_offset,
            viewport,
        );
        RenderPlan {
            entries,
            total_height: layout.total_height,
        }
    }

    fn clamp_scroll(&mut self) {
        let total = self.layout().total_height;
        if self.scroll_offset > total {
            self.scroll_offset = total;
        }
    }
}

/// Hosts forward raw event payloads; anything negative or non-finite
/// means "top", never an error.
fn sanitize_unit(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{InvoiceListState, ListCommand, ListEvent, sanitize_unit};
    use crate::group::BucketKey;
    use crate::layout::LayoutMetrics;
    use crate::window::RenderEntry;
    use crate::testutil::{InvoiceFaker, fixture_now};
    use time::Duration;

    const METRICS: LayoutMetrics = LayoutMetrics::new(48, 120);

    fn sample_state(seed: u64) -> InvoiceListState {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(seed);
        let records = vec![
            faker.invoice_dated(now),
            faker.invoice_dated(now),
            faker.invoice_dated(now - Duration::days(1)),
            faker.invoice_dated(now - Duration::days(3)),
            faker.invoice_dated(now - Duration::days(20)),
            faker.invoice_dated(now - Duration::days(90)),
        ];
        InvoiceListState::with_metrics(records, now, METRICS)
    }

    #[test]
    fn initial_state_expands_recent_buckets_only() {
        let state = sample_state(1);
        assert_eq!(state.scroll_offset(), 0);
        assert!(state.is_expanded(BucketKey::Today));
        assert!(state.is_expanded(BucketKey::Yesterday));
        assert!(state.is_expanded(BucketKey::ThisWeek));
        assert!(!state.is_expanded(BucketKey::ThisMonth));
        assert!(!state.is_expanded(BucketKey::Older));
    }

    #[test]
    fn toggle_flips_membership_and_reports_it() {
        let mut state = sample_state(2);

        let events = state.toggle_bucket(BucketKey::Today);
        assert_eq!(
            events,
            vec![ListEvent::BucketToggled {
                key: BucketKey::Today,
                expanded: false,
            }],
        );
        assert!(!state.is_expanded(BucketKey::Today));

        let events = state.toggle_bucket(BucketKey::Today);
        assert_eq!(
            events,
            vec![ListEvent::BucketToggled {
                key: BucketKey::Today,
                expanded: true,
            }],
        );
    }

    #[test]
    fn toggling_an_absent_bucket_is_a_no_op() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(3);
        // Only a Today bucket exists.
        let mut state =
            InvoiceListState::with_metrics(vec![faker.invoice_dated(now)], now, METRICS);

        assert!(state.toggle_bucket(BucketKey::Older).is_empty());
        // The stale default key is untouched too.
        assert!(state.is_expanded(BucketKey::ThisWeek));
    }

    #[test]
    fn collapse_removes_items_but_keeps_header() {
        let mut state = sample_state(4);
        let before = state.layout().total_height;
        let today_len = state.buckets()[0].len() as u32;

        state.toggle_bucket(BucketKey::Today);
        let after = state.layout().total_height;
        assert_eq!(before - after, today_len * METRICS.item_height);

        let plan = state.render_plan(f64::from(before));
        let item_count = plan
            .entries
            .iter()
            .filter(|entry| matches!(entry, RenderEntry::Item { .. }))
            .count();
        let expanded_items: usize = state
            .buckets()
            .iter()
            .filter(|bucket| state.is_expanded(bucket.key))
            .map(|bucket| bucket.len())
            .sum();
        assert_eq!(item_count, expanded_items);
        assert!(plan.entries.iter().any(|entry| matches!(
            entry,
            RenderEntry::Header {
                key: BucketKey::Today,
                expanded: false,
                ..
            }
        )));
    }

    #[test]
    fn scroll_clamps_negative_and_non_finite_input() {
        let mut state = sample_state(5);

        assert!(state.on_scroll(-250.0).is_empty());
        assert_eq!(state.scroll_offset(), 0);

        assert!(state.on_scroll(f64::NAN).is_empty());
        assert!(state.on_scroll(f64::NEG_INFINITY).is_empty());
        assert_eq!(state.scroll_offset(), 0);

        let events = state.on_scroll(96.0);
        assert_eq!(events, vec![ListEvent::Scrolled(96)]);
    }

    #[test]
    fn scroll_past_the_end_clamps_to_content_height() {
        let mut state = sample_state(6);
        let total = state.layout().total_height;

        let events = state.on_scroll(f64::from(total) * 100.0);
        assert_eq!(events, vec![ListEvent::Scrolled(total)]);
    }

    #[test]
    fn repeated_scroll_to_same_offset_emits_nothing() {
        let mut state = sample_state(7);
        assert_eq!(state.on_scroll(48.0).len(), 1);
        assert!(state.on_scroll(48.0).is_empty());
    }

    #[test]
    fn replacement_preserves_expansion_state() {
        let now = fixture_now();
        let mut state = sample_state(8);
        state.toggle_bucket(BucketKey::Today);
        state.toggle_bucket(BucketKey::ThisMonth);

        let mut faker = InvoiceFaker::new(80);
        let events = state.replace_records(
            vec![faker.invoice_dated(now), faker.invoice_dated(now)],
            now,
        );
        assert_eq!(
            events,
            vec![ListEvent::RecordsReplaced {
                records: 2,
                buckets: 1,
            }],
        );
        assert!(!state.is_expanded(BucketKey::Today));
        assert!(state.is_expanded(BucketKey::ThisMonth));
    }

    #[test]
    fn replacement_with_shrunken_content_clamps_scroll() {
        let now = fixture_now();
        let mut state = sample_state(9);
        let total = state.layout().total_height;
        state.on_scroll(f64::from(total));

        state.replace_records(Vec::new(), now);
        assert_eq!(state.scroll_offset(), 0);
        assert!(state.render_plan(600.0).is_empty());
    }

    #[test]
    fn render_plan_is_idempotent_for_unchanged_inputs() {
        let mut state = sample_state(10);
        state.on_scroll(130.0);

        let first = state.render_plan(600.0);
        let second = state.render_plan(600.0);
        assert_eq!(first, second);
    }

    #[test]
    fn render_plan_clamps_invalid_viewport() {
        let state = sample_state(11);
        let degenerate = state.render_plan(-400.0);
        let zero = state.render_plan(0.0);
        assert_eq!(degenerate, zero);
    }

    #[test]
    fn dispatch_routes_commands() {
        let now = fixture_now();
        let mut state = sample_state(12);

        let events = state.dispatch(ListCommand::Scroll(72.0));
        assert_eq!(events, vec![ListEvent::Scrolled(72)]);

        let events = state.dispatch(ListCommand::ToggleBucket(BucketKey::Yesterday));
        assert_eq!(
            events,
            vec![ListEvent::BucketToggled {
                key: BucketKey::Yesterday,
                expanded: false,
            }],
        );

        let mut faker = InvoiceFaker::new(120);
        let events = state.dispatch(ListCommand::ReplaceRecords {
            records: vec![faker.invoice_dated(now)],
            now,
        });
        assert!(matches!(events[0], ListEvent::RecordsReplaced { .. }));
    }

    #[test]
    fn sanitize_unit_truncates_and_clamps() {
        assert_eq!(sanitize_unit(0.0), 0);
        assert_eq!(sanitize_unit(123.9), 123);
        assert_eq!(sanitize_unit(-1.0), 0);
        assert_eq!(sanitize_unit(f64::INFINITY), 0);
        assert_eq!(sanitize_unit(1.0e12), u32::MAX);
    }
}
