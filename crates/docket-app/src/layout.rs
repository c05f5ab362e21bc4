// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::group::{Bucket, BucketKey};

/// Fixed per-entry heights in layout units. The TUI substitutes row-based
/// metrics; the defaults mirror the card layout the web front end used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutMetrics {
    pub header_height: u32,
    pub item_height: u32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            header_height: 48,
            item_height: 120,
        }
    }
}

impl LayoutMetrics {
    pub const fn new(header_height: u32, item_height: u32) -> Self {
        Self {
            header_height,
            item_height,
        }
    }

    /// Full vertical extent of one bucket under the given expansion state.
    pub fn bucket_height(&self, bucket: &Bucket, expansion: &BTreeSet<BucketKey>) -> u32 {
        let items = if expansion.contains(&bucket.key) {
            bucket.records.len() as u32 * self.item_height
        } else {
            0
        };
        self.header_height + items
    }
}

/// Cumulative offsets for the bucket sequence plus the total scrollable
/// content height. Derived data: recomputed whenever buckets, expansion,
/// or metrics change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLayout {
    pub bucket_offsets: Vec<u32>,
    pub total_height: u32,
}

/// Walk buckets in order accumulating a running offset. A collapsed bucket
/// contributes exactly `header_height` regardless of its record count.
pub fn accumulate(
    buckets: &[Bucket],
    expansion: &BTreeSet<BucketKey>,
    metrics: LayoutMetrics,
) -> ListLayout {
    let mut bucket_offsets = Vec::with_capacity(buckets.len());
    let mut offset = 0u32;
    for bucket in buckets {
        bucket_offsets.push(offset);
        offset = offset.saturating_add(metrics.bucket_height(bucket, expansion));
    }
    ListLayout {
        bucket_offsets,
        total_height: offset,
    }
}
