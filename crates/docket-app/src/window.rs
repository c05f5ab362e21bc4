// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::group::{Bucket, BucketKey};
use crate::layout::{LayoutMetrics, ListLayout};
use crate::model::InvoiceSummary;

/// One drawable entry of a render pass, positioned by absolute offset from
/// the top of the scrollable content.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEntry<'a> {
    Header {
        key: BucketKey,
        label: &'static str,
        count: usize,
        expanded: bool,
        offset: u32,
    },
    Item {
        invoice: &'a InvoiceSummary,
        offset: u32,
        height: u32,
    },
}

impl RenderEntry<'_> {
    pub fn offset(&self) -> u32 {
        match self {
            Self::Header { offset, .. } | Self::Item { offset, .. } => *offset,
        }
    }
}

/// Transient output of one render pass. Pure function of its inputs; never
/// cached across events.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan<'a> {
    pub entries: Vec<RenderEntry<'a>>,
    pub total_height: u32,
}

impl RenderPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Select the entries intersecting the viewport, overscanned by one item
/// height on each side.
///
/// Cost is bounded by the bucket count plus the number of visible items:
/// item ranges come from index arithmetic, never from scanning a bucket's
/// records. Items are emitted when their start offset falls inside the
/// overscanned range; an item straddling the top edge starts above
/// `scroll - item_height` and so ends above the viewport, which keeps the
/// entry count within the one-overscan-item-per-side bound. Headers of
/// intersecting buckets are always emitted, even when the header's own
/// extent sits just outside the range, so sticky headers don't flicker
/// during fast scroll.
pub fn compute_visible<'a>(
    buckets: &'a [Bucket],
    layout: &ListLayout,
    expansion: &BTreeSet<BucketKey>,
    metrics: LayoutMetrics,
    scroll_offset: u32,
    viewport_height: u32,
) -> Vec<RenderEntry<'a>> {
    let range_start = scroll_offset.saturating_sub(metrics.item_height);
    let range_end = scroll_offset
        .saturating_add(viewport_height)
        .saturating_add(metrics.item_height);

    let mut entries = Vec::new();
    for (index, bucket) in buckets.iter().enumerate() {
        let Some(bucket_start) = layout.bucket_offsets.get(index).copied() else {
            break;
        };
        let bucket_end = bucket_start.saturating_add(metrics.bucket_height(bucket, expansion));
        if bucket_start >= range_end || bucket_end <= range_start {
            continue;
        }

        let expanded = expansion.contains(&bucket.key);
        entries.push(RenderEntry::Header {
            key: bucket.key,
            label: bucket.label(),
            count: bucket.len(),
            expanded,
            offset: bucket_start,
        });

        if !expanded || bucket.is_empty() || metrics.item_height == 0 {
            continue;
        }

        let items_start = bucket_start.saturating_add(metrics.header_height);
        let first = if range_start > items_start {
            (range_start - items_start).div_ceil(metrics.item_height) as usize
        } else {
            0
        };
        let last = if range_end > items_start {
            (range_end - items_start).div_ceil(metrics.item_height) as usize
        } else {
            0
        };

        for item_index in first..last.min(bucket.records.len()) {
            let offset =
                items_start.saturating_add(item_index as u32 * metrics.item_height);
            entries.push(RenderEntry::Item {
                invoice: &bucket.records[item_index],
                offset,
                height: metrics.item_height,
            });
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::{RenderEntry, compute_visible};
    use crate::group::{BucketKey, classify};
    use crate::layout::{LayoutMetrics, accumulate};
    use crate::testutil::{InvoiceFaker, fixture_now};
    use std::collections::BTreeSet;
    use time::Duration;

    const METRICS: LayoutMetrics = LayoutMetrics::new(48, 120);

    fn all_expanded() -> BTreeSet<BucketKey> {
        BucketKey::ALL.into_iter().collect()
    }

    fn item_count(entries: &[RenderEntry<'_>]) -> usize {
        entries
            .iter()
            .filter(|entry| matches!(entry, RenderEntry::Item { .. }))
            .count()
    }

    #[test]
    fn thousand_records_render_only_the_window() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(101);
        let records: Vec<_> = (0..1000).map(|_| faker.invoice_dated(now)).collect();
        let buckets = classify(records, now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        let entries = compute_visible(&buckets, &layout, &expansion, METRICS, 0, 600);
        // Everything emitted must start before scroll + viewport + overscan.
        for entry in &entries {
            assert!(entry.offset() < 600 + METRICS.item_height);
        }
        assert!(item_count(&entries) <= 6);
        assert!(entries.len() < 1000);
    }

    #[test]
    fn entry_count_respects_virtualization_bound() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(103);
        let buckets = classify(faker.invoices_spread_over_days(800, 120, now), now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        let viewport = 600u32;
        // Items that fit in the overscanned range, plus one header per
        // bucket.
        let bound = ((viewport + 2 * METRICS.item_height).div_ceil(METRICS.item_height)
            as usize)
            + buckets.len();
        for scroll in [0, 180, 240, 1200, 5000, layout.total_height] {
            let entries =
                compute_visible(&buckets, &layout, &expansion, METRICS, scroll, viewport);
            assert!(
                entries.len() <= bound,
                "scroll {scroll}: {} entries > bound {bound}",
                entries.len(),
            );
        }
    }

    #[test]
    fn misaligned_scroll_stays_within_the_entry_bound() {
        // A scroll offset off the item grid must not admit an extra
        // straddling item beyond the overscan allowance.
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(137);
        let records: Vec<_> = (0..20).map(|_| faker.invoice_dated(now)).collect();
        let buckets = classify(records, now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        let viewport = 600u32;
        let entries = compute_visible(&buckets, &layout, &expansion, METRICS, 180, viewport);
        let bound = ((viewport + 2 * METRICS.item_height).div_ceil(METRICS.item_height)
            as usize)
            + buckets.len();
        assert_eq!(entries.len(), bound);
        for entry in &entries {
            if let RenderEntry::Item { offset, .. } = entry {
                assert!(*offset >= 180 - METRICS.item_height);
                assert!(*offset < 180 + viewport + METRICS.item_height);
            }
        }
    }

    #[test]
    fn buckets_outside_the_window_are_skipped_entirely() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(107);
        let records = vec![
            faker.invoice_dated(now),
            faker.invoice_dated(now),
            faker.invoice_dated(now - Duration::days(40)),
        ];
        let buckets = classify(records, now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        // Scroll well past the Today bucket; only Older should remain.
        let scroll = layout.bucket_offsets[1] + METRICS.item_height * 2;
        let entries = compute_visible(&buckets, &layout, &expansion, METRICS, scroll, 200);
        assert!(entries.iter().all(|entry| !matches!(
            entry,
            RenderEntry::Header {
                key: BucketKey::Today,
                ..
            }
        )));
    }

    #[test]
    fn straddling_bucket_emits_header_and_in_range_items_only() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(109);
        let records: Vec<_> = (0..50).map(|_| faker.invoice_dated(now)).collect();
        let buckets = classify(records, now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        // Window sits in the middle of the single bucket.
        let scroll = METRICS.header_height + 20 * METRICS.item_height;
        let entries = compute_visible(&buckets, &layout, &expansion, METRICS, scroll, 600);

        assert!(matches!(entries[0], RenderEntry::Header { .. }));
        let items: Vec<u32> = entries
            .iter()
            .filter_map(|entry| match entry {
                RenderEntry::Item { offset, .. } => Some(*offset),
                RenderEntry::Header { .. } => None,
            })
            .collect();
        assert!(!items.is_empty());
        let range_start = scroll - METRICS.item_height;
        let range_end = scroll + 600 + METRICS.item_height;
        for offset in &items {
            assert!(offset + METRICS.item_height > range_start);
            assert!(*offset < range_end);
        }
        assert!(items.len() < 50);
    }

    #[test]
    fn header_is_emitted_even_when_scrolled_past_it() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(113);
        let records: Vec<_> = (0..30).map(|_| faker.invoice_dated(now)).collect();
        let buckets = classify(records, now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        // Header extent is [0, 48) but scroll is far past it; the bucket
        // still intersects, so the header must be present.
        let entries =
            compute_visible(&buckets, &layout, &expansion, METRICS, 10 * METRICS.item_height, 400);
        assert!(
            entries
                .iter()
                .any(|entry| matches!(entry, RenderEntry::Header { offset: 0, .. })),
        );
    }

    #[test]
    fn collapsed_bucket_emits_header_without_items() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(127);
        let records: Vec<_> = (0..10).map(|_| faker.invoice_dated(now)).collect();
        let buckets = classify(records, now);
        let expansion = BTreeSet::new();
        let layout = accumulate(&buckets, &expansion, METRICS);

        let entries = compute_visible(&buckets, &layout, &expansion, METRICS, 0, 600);
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            entries[0],
            RenderEntry::Header {
                expanded: false,
                count: 10,
                ..
            }
        ));
    }

    #[test]
    fn entries_follow_source_order() {
        let now = fixture_now();
        let mut faker = InvoiceFaker::new(131);
        let buckets = classify(faker.invoices_spread_over_days(40, 10, now), now);
        let expansion = all_expanded();
        let layout = accumulate(&buckets, &expansion, METRICS);

        let entries =
            compute_visible(&buckets, &layout, &expansion, METRICS, 0, layout.total_height);
        for pair in entries.windows(2) {
            assert!(pair[0].offset() <= pair[1].offset());
        }
    }

    #[test]
    fn empty_bucket_sequence_yields_empty_entries() {
        let layout = accumulate(&[], &BTreeSet::new(), METRICS);
        let entries = compute_visible(&[], &layout, &BTreeSet::new(), METRICS, 0, 600);
        assert!(entries.is_empty());
        assert_eq!(layout.total_height, 0);
    }
}
