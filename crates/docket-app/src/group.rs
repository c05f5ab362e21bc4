// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime};

use crate::model::InvoiceSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BucketKey {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    Older,
}

impl BucketKey {
    /// Priority order: classification tries these top to bottom and the
    /// bucket sequence is emitted in this order.
    pub const ALL: [Self; 5] = [
        Self::Today,
        Self::Yesterday,
        Self::ThisWeek,
        Self::ThisMonth,
        Self::Older,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::ThisWeek => "This Week",
            Self::ThisMonth => "This Month",
            Self::Older => "Older",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::ThisWeek => "this_week",
            Self::ThisMonth => "this_month",
            Self::Older => "older",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(Self::Today),
            "yesterday" => Some(Self::Yesterday),
            "this_week" => Some(Self::ThisWeek),
            "this_month" => Some(Self::ThisMonth),
            "older" => Some(Self::Older),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: BucketKey,
    pub records: Vec<InvoiceSummary>,
}

impl Bucket {
    pub fn label(&self) -> &'static str {
        self.key.label()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Date-only boundaries derived from an explicit reference timestamp. The
/// core never reads a clock; callers pass `now` so classification stays
/// deterministic under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBoundaries {
    pub today: Date,
    pub yesterday: Date,
    pub week_ago: Date,
    pub month_ago: Date,
}

impl DateBoundaries {
    pub fn from_now(now: OffsetDateTime) -> Self {
        let today = now.date();
        Self {
            today,
            yesterday: today - Duration::days(1),
            week_ago: today - Duration::days(7),
            month_ago: month_earlier(today),
        }
    }

    /// Ordered cascade, first match wins. The order is load-bearing:
    /// `yesterday` only catches dates in [yesterday, today) because the
    /// `today` test already consumed everything at or after midnight.
    fn bucket_for(&self, date: Date) -> BucketKey {
        let cascade = [
            (self.today, BucketKey::Today),
            (self.yesterday, BucketKey::Yesterday),
            (self.week_ago, BucketKey::ThisWeek),
            (self.month_ago, BucketKey::ThisMonth),
        ];
        for (boundary, key) in cascade {
            if date >= boundary {
                return key;
            }
        }
        BucketKey::Older
    }
}

/// Calendar month subtraction with the day clamped to the target month's
/// length (Mar 31 - 1 month = Feb 28/29), not a fixed 30 days.
fn month_earlier(date: Date) -> Date {
    let (year, month) = match date.month() {
        Month::January => (date.year() - 1, Month::December),
        other => (date.year(), other.previous()),
    };
    let day = date.day().min(month.length(year));
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

/// Parse a stored TEXT date. Upstream extraction writes RFC 3339, but older
/// rows carry space-separated or date-only values, so try the same cascade
/// of formats the store accepts.
pub fn parse_record_date(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Some(value.midnight().assume_utc());
    }

    None
}

/// Partition records into date buckets relative to `now`.
///
/// Every input record lands in exactly one bucket. A record whose date
/// fails every parse format is classified `Older` and sorts after all
/// parseable records there; nothing is ever dropped. Within a bucket,
/// records sort by full date-time descending, ties keeping input order.
/// Empty buckets are omitted and the sequence follows `BucketKey::ALL`.
pub fn classify(records: Vec<InvoiceSummary>, now: OffsetDateTime) -> Vec<Bucket> {
    let boundaries = DateBoundaries::from_now(now);

    let mut grouped: [Vec<(Option<OffsetDateTime>, InvoiceSummary)>; 5] = Default::default();
    for record in records {
        let parsed = parse_record_date(&record.invoice_date);
        let key = match parsed {
            Some(timestamp) => boundaries.bucket_for(timestamp.date()),
            None => BucketKey::Older,
        };
        let slot = BucketKey::ALL
            .iter()
            .position(|candidate| *candidate == key)
            .unwrap_or(BucketKey::ALL.len() - 1);
        grouped[slot].push((parsed, record));
    }

    BucketKey::ALL
        .iter()
        .zip(grouped)
        .filter(|(_, entries)| !entries.is_empty())
        .map(|(key, mut entries)| {
            // Stable sort: descending by timestamp, unparseable dates last.
            entries.sort_by(|(a, _), (b, _)| b.cmp(a));
            Bucket {
                key: *key,
                records: entries.into_iter().map(|(_, record)| record).collect(),
            }
        })
        .collect()
}
