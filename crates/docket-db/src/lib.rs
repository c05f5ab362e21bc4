// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use docket_app::{DeliveryNoteId, DeliveryNoteSummary, DocStatus, InvoiceId, InvoiceSummary};
use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

pub const APP_NAME: &str = "docket";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "invoices",
        &[
            "id",
            "invoice_number",
            "supplier",
            "invoice_date",
            "total_amount_pennies",
            "currency",
            "status",
            "confidence",
            "upload_timestamp",
        ],
    ),
    (
        "delivery_notes",
        &[
            "id",
            "delivery_number",
            "supplier",
            "delivery_date",
            "invoice_id",
            "status",
            "upload_timestamp",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_invoices_upload_timestamp",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_invoices_upload_timestamp ON invoices (upload_timestamp);",
    },
    RequiredIndex {
        name: "idx_invoices_status",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices (status);",
    },
    RequiredIndex {
        name: "idx_delivery_notes_invoice_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_delivery_notes_invoice_id ON delivery_notes (invoice_id);",
    },
    RequiredIndex {
        name: "idx_delivery_notes_upload_timestamp",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_delivery_notes_upload_timestamp ON delivery_notes (upload_timestamp);",
    },
];

/// Invoice row as uploads hand it to the store. A missing `id` gets a
/// content-derived one; a missing `upload_timestamp` means "now".
#[derive(Debug, Clone, Default)]
pub struct NewInvoice {
    pub id: Option<InvoiceId>,
    pub invoice_number: String,
    pub supplier: String,
    pub invoice_date: String,
    pub total_amount_pennies: i64,
    pub currency: Option<String>,
    pub status: Option<DocStatus>,
    pub confidence: Option<f64>,
    pub upload_timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDeliveryNote {
    pub id: Option<DeliveryNoteId>,
    pub delivery_number: String,
    pub supplier: String,
    pub delivery_date: String,
    pub invoice_id: Option<InvoiceId>,
    pub upload_timestamp: Option<OffsetDateTime>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        if printable != ":memory:" {
            set_private_permissions(path)?;
        }
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;
        Ok(())
    }

    pub fn insert_invoice(&self, new_invoice: &NewInvoice) -> Result<InvoiceId> {
        let uploaded = upload_stamp(new_invoice.upload_timestamp)?;
        let id = match &new_invoice.id {
            Some(id) => id.clone(),
            None => derive_invoice_id(new_invoice, &uploaded),
        };
        let status = new_invoice.status.unwrap_or(DocStatus::Pending);
        let currency = new_invoice.currency.as_deref().unwrap_or("GBP");

        self.conn
            .execute(
                "
                INSERT INTO invoices (
                  id, invoice_number, supplier, invoice_date,
                  total_amount_pennies, currency, status, confidence,
                  upload_timestamp
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id.as_str(),
                    new_invoice.invoice_number,
                    new_invoice.supplier,
                    new_invoice.invoice_date,
                    new_invoice.total_amount_pennies,
                    currency,
                    status.as_str(),
                    new_invoice.confidence,
                    uploaded,
                ],
            )
            .context("insert invoice")?;

        Ok(id)
    }

    pub fn list_invoice_summaries(&self) -> Result<Vec<InvoiceSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT
                  id, invoice_number, supplier, invoice_date,
                  total_amount_pennies, currency, status, confidence,
                  upload_timestamp
                FROM invoices
                ORDER BY upload_timestamp DESC, id DESC
                ",
            )
            .context("prepare invoices query")?;
        let rows = stmt.query_map([], invoice_from_row).context("query invoices")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect invoices")
    }

    pub fn get_invoice(&self, invoice_id: &InvoiceId) -> Result<Option<InvoiceSummary>> {
        self.conn
            .query_row(
                "
                SELECT
                  id, invoice_number, supplier, invoice_date,
                  total_amount_pennies, currency, status, confidence,
                  upload_timestamp
                FROM invoices
                WHERE id = ?
                ",
                params![invoice_id.as_str()],
                invoice_from_row,
            )
            .optional()
            .with_context(|| format!("get invoice {}", invoice_id.as_str()))
    }

    pub fn insert_delivery_note(&self, new_note: &NewDeliveryNote) -> Result<DeliveryNoteId> {
        if let Some(invoice_id) = &new_note.invoice_id
            && self.get_invoice(invoice_id)?.is_none()
        {
            bail!(
                "delivery note references unknown invoice {}; upload the invoice first",
                invoice_id.as_str()
            );
        }

        let uploaded = upload_stamp(new_note.upload_timestamp)?;
        let id = match &new_note.id {
            Some(id) => id.clone(),
            None => DeliveryNoteId::new(checksum_sha256(
                format!(
                    "{}|{}|{}|{uploaded}",
                    new_note.delivery_number, new_note.supplier, new_note.delivery_date,
                )
                .as_bytes(),
            )),
        };
        let status = if new_note.invoice_id.is_some() {
            DocStatus::Matched
        } else {
            DocStatus::Unmatched
        };

        self.conn
            .execute(
                "
                INSERT INTO delivery_notes (
                  id, delivery_number, supplier, delivery_date,
                  invoice_id, status, upload_timestamp
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id.as_str(),
                    new_note.delivery_number,
                    new_note.supplier,
                    new_note.delivery_date,
                    new_note.invoice_id.as_ref().map(|id| id.as_str().to_owned()),
                    status.as_str(),
                    uploaded,
                ],
            )
            .context("insert delivery note")?;

        Ok(id)
    }

    pub fn list_delivery_note_summaries(&self) -> Result<Vec<DeliveryNoteSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT
                  id, delivery_number, supplier, delivery_date,
                  invoice_id, status, upload_timestamp
                FROM delivery_notes
                ORDER BY upload_timestamp DESC, id DESC
                ",
            )
            .context("prepare delivery notes query")?;
        let rows = stmt
            .query_map([], delivery_note_from_row)
            .context("query delivery notes")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect delivery notes")
    }

    /// Attach a delivery note to an invoice; both move to `matched`.
    pub fn pair_delivery_note(
        &self,
        note_id: &DeliveryNoteId,
        invoice_id: &InvoiceId,
    ) -> Result<()> {
        if self.get_invoice(invoice_id)?.is_none() {
            bail!(
                "cannot pair with unknown invoice {}; refresh and retry",
                invoice_id.as_str()
            );
        }

        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE delivery_notes
                SET invoice_id = ?, status = ?
                WHERE id = ?
                ",
                params![
                    invoice_id.as_str(),
                    DocStatus::Matched.as_str(),
                    note_id.as_str(),
                ],
            )
            .context("pair delivery note")?;
        if rows_affected == 0 {
            bail!("delivery note {} not found", note_id.as_str());
        }

        self.conn
            .execute(
                "UPDATE invoices SET status = ? WHERE id = ?",
                params![DocStatus::Matched.as_str(), invoice_id.as_str()],
            )
            .context("mark invoice matched")?;
        Ok(())
    }

    /// Detach a delivery note from its invoice. The invoice drops back to
    /// `unmatched` only once no other note points at it.
    pub fn unpair_delivery_note(&self, note_id: &DeliveryNoteId) -> Result<()> {
        let former: Option<String> = self
            .conn
            .query_row(
                "SELECT invoice_id FROM delivery_notes WHERE id = ?",
                params![note_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("read delivery note pairing")?
            .ok_or_else(|| anyhow!("delivery note {} not found", note_id.as_str()))?;

        self.conn
            .execute(
                "
                UPDATE delivery_notes
                SET invoice_id = NULL, status = ?
                WHERE id = ?
                ",
                params![DocStatus::Unmatched.as_str(), note_id.as_str()],
            )
            .context("unpair delivery note")?;

        if let Some(former) = former {
            let remaining: i64 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM delivery_notes WHERE invoice_id = ?",
                    params![former],
                    |row| row.get(0),
                )
                .context("count remaining pairings")?;
            if remaining == 0 {
                self.conn
                    .execute(
                        "UPDATE invoices SET status = ? WHERE id = ?",
                        params![DocStatus::Unmatched.as_str(), former],
                    )
                    .context("mark invoice unmatched")?;
            }
        }
        Ok(())
    }

    /// Populate an empty database with a browsable spread of documents.
    pub fn seed_demo_data(&self) -> Result<usize> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM invoices", [], |row| row.get(0))
            .context("count invoices")?;
        if existing > 0 {
            return Ok(0);
        }

        let now = OffsetDateTime::now_utc();
        let mut inserted = 0usize;
        let mut first_id = None;
        for (index, (supplier, days_back, pennies)) in DEMO_INVOICES.iter().enumerate() {
            let at = now - Duration::days(*days_back);
            let id = self.insert_invoice(&NewInvoice {
                id: None,
                invoice_number: format!("INV-{}-{:05}", at.year(), index + 1),
                supplier: (*supplier).to_owned(),
                invoice_date: at.format(&Rfc3339).context("format demo invoice date")?,
                total_amount_pennies: *pennies,
                currency: None,
                status: None,
                confidence: Some(0.5 + (index as f64) * 0.03),
                upload_timestamp: Some(at),
            })?;
            first_id.get_or_insert(id);
            inserted += 1;
        }

        for (index, (supplier, days_back)) in DEMO_DELIVERY_NOTES.iter().enumerate() {
            let at = now - Duration::days(*days_back);
            self.insert_delivery_note(&NewDeliveryNote {
                id: None,
                delivery_number: format!("DN-{}-{:05}", at.year(), index + 1),
                supplier: (*supplier).to_owned(),
                delivery_date: at.format(&Rfc3339).context("format demo delivery date")?,
                invoice_id: if index == 0 { first_id.clone() } else { None },
                upload_timestamp: Some(at),
            })?;
            inserted += 1;
        }

        Ok(inserted)
    }
}

const DEMO_INVOICES: [(&str, i64, i64); 10] = [
    ("Albion Produce Ltd", 0, 48_250),
    ("Dockside Seafoods", 0, 132_760),
    ("Eastgate Dairy", 1, 21_440),
    ("Kingsmead Bakery", 2, 9_980),
    ("Fenland Grains", 5, 63_125),
    ("Harbourview Meats", 6, 154_300),
    ("Greenway Catering Supplies", 12, 30_870),
    ("Mercia Paper Co", 19, 12_445),
    ("Northfield Farm Foods", 41, 88_020),
    ("Larkspur Beverages", 95, 27_560),
];

const DEMO_DELIVERY_NOTES: [(&str, i64); 3] = [
    ("Albion Produce Ltd", 0),
    ("Fenland Grains", 4),
    ("Orchard Lane Grocers", 15),
];

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<InvoiceSummary> {
    let status_raw: String = row.get(6)?;
    let status = DocStatus::parse(&status_raw).ok_or_else(|| {
        to_sql_error(anyhow!("unknown invoice status {status_raw}"))
    })?;
    let uploaded_raw: String = row.get(8)?;

    Ok(InvoiceSummary {
        id: InvoiceId::new(row.get::<_, String>(0)?),
        invoice_number: row.get(1)?,
        supplier: row.get(2)?,
        invoice_date: row.get(3)?,
        total_amount_pennies: row.get(4)?,
        currency: row.get(5)?,
        status,
        confidence: row.get(7)?,
        upload_timestamp: parse_datetime(&uploaded_raw).map_err(to_sql_error)?,
    })
}

fn delivery_note_from_row(row: &Row<'_>) -> rusqlite::Result<DeliveryNoteSummary> {
    let status_raw: String = row.get(5)?;
    let status = DocStatus::parse(&status_raw).ok_or_else(|| {
        to_sql_error(anyhow!("unknown delivery note status {status_raw}"))
    })?;
    let uploaded_raw: String = row.get(6)?;
    let invoice_id: Option<String> = row.get(4)?;

    Ok(DeliveryNoteSummary {
        id: DeliveryNoteId::new(row.get::<_, String>(0)?),
        delivery_number: row.get(1)?,
        supplier: row.get(2)?,
        delivery_date: row.get(3)?,
        invoice_id: invoice_id.map(InvoiceId::new),
        status,
        upload_timestamp: parse_datetime(&uploaded_raw).map_err(to_sql_error)?,
    })
}

fn derive_invoice_id(new_invoice: &NewInvoice, uploaded: &str) -> InvoiceId {
    InvoiceId::new(checksum_sha256(
        format!(
            "{}|{}|{}|{uploaded}",
            new_invoice.invoice_number, new_invoice.supplier, new_invoice.invoice_date,
        )
        .as_bytes(),
    ))
}

fn upload_stamp(at: Option<OffsetDateTime>) -> Result<String> {
    match at {
        Some(at) => at.format(&Rfc3339).context("format upload timestamp"),
        None => now_rfc3339(),
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("DOCKET_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set DOCKET_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("docket.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a docket-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

pub fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

fn set_private_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("set permissions on {}", path.display()))?;
    }
    Ok(())
}
