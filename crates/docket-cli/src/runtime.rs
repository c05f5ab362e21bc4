// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use docket_app::{DeliveryNoteSummary, InvoiceSummary};
use docket_db::Store;

pub struct DbRuntime<'a> {
    store: &'a Store,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl docket_tui::AppRuntime for DbRuntime<'_> {
    fn load_invoice_summaries(&mut self) -> Result<Vec<InvoiceSummary>> {
        self.store.list_invoice_summaries()
    }

    fn load_delivery_note_summaries(&mut self) -> Result<Vec<DeliveryNoteSummary>> {
        self.store.list_delivery_note_summaries()
    }
}
