// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    Pending,
    Scanned,
    Matched,
    Unmatched,
    Error,
}

impl DocStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scanned => "scanned",
            Self::Matched => "matched",
            Self::Unmatched => "unmatched",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "scanned" => Some(Self::Scanned),
            "matched" => Some(Self::Matched),
            "unmatched" => Some(Self::Unmatched),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Invoices,
    DeliveryNotes,
}

impl TabKind {
    pub const ALL: [Self; 2] = [Self::Invoices, Self::DeliveryNotes];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Invoices => "invoices",
            Self::DeliveryNotes => "delivery notes",
        }
    }
}

/// Flat invoice row as the store hands it to the list. The list core never
/// mutates one of these; `invoice_date` stays the raw TEXT value so the
/// grouping engine owns the parse-failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub supplier: String,
    pub invoice_date: String,
    pub total_amount_pennies: i64,
    pub currency: String,
    pub status: DocStatus,
    pub confidence: Option<f64>,
    pub upload_timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryNoteSummary {
    pub id: DeliveryNoteId,
    pub delivery_number: String,
    pub supplier: String,
    pub delivery_date: String,
    pub invoice_id: Option<InvoiceId>,
    pub status: DocStatus,
    pub upload_timestamp: OffsetDateTime,
}

impl DeliveryNoteSummary {
    pub fn is_paired(&self) -> bool {
        self.invoice_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::DocStatus;

    #[test]
    fn doc_status_round_trips_through_storage_form() {
        for status in [
            DocStatus::Pending,
            DocStatus::Scanned,
            DocStatus::Matched,
            DocStatus::Unmatched,
            DocStatus::Error,
        ] {
            assert_eq!(DocStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_doc_status_is_rejected() {
        assert_eq!(DocStatus::parse("paid"), None);
        assert_eq!(DocStatus::parse(""), None);
    }
}
