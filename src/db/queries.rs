use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::StoreError;
use crate::models::{DeliveryStatus, Mailing, PendingEntry, StatusUpdate};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Mailings ──

/// Registers a mailing with every phone pending. Repeated phones are stored
/// once; an id that is already known is rejected.
pub fn add_mailing(
    conn: &Connection,
    id: &str,
    phones: &[String],
    text: &str,
) -> Result<Mailing, StoreError> {
    let tx = conn.unchecked_transaction()?;

    let exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM mailings WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::DuplicateMailing(id.to_string()));
    }

    let created_at = Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string();
    tx.execute(
        "INSERT INTO mailings (id, text, created_at) VALUES (?1, ?2, ?3)",
        params![id, text, created_at],
    )?;

    let mut phone_map = BTreeMap::new();
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO mailing_phones (mailing_id, phone, status) VALUES (?1, ?2, ?3)",
        )?;
        for phone in phones {
            stmt.execute(params![id, phone, DeliveryStatus::Pending.as_str()])?;
            phone_map.insert(phone.clone(), DeliveryStatus::Pending);
        }
    }

    tx.commit()?;

    Ok(Mailing {
        id: id.to_string(),
        text: text.to_string(),
        created_at: parse_timestamp(&created_at)?,
        phones: phone_map,
    })
}

pub fn list_mailing_ids(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM mailings ORDER BY seq ASC")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn get_mailing(conn: &Connection, id: &str) -> Result<Option<Mailing>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, text, created_at FROM mailings WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((id, text, created_at)) = row else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT phone, status FROM mailing_phones WHERE mailing_id = ?1")?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut phones = BTreeMap::new();
    for row in rows {
        let (phone, status) = row?;
        let status = DeliveryStatus::parse(&status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown status '{status}' for {id}/{phone}"))
        })?;
        phones.insert(phone, status);
    }

    Ok(Some(Mailing {
        id,
        text,
        created_at: parse_timestamp(&created_at)?,
        phones,
    }))
}

/// Full records for the given ids, in the order asked for. Unknown ids are
/// left out.
pub fn get_mailings(conn: &Connection, ids: &[String]) -> Result<Vec<Mailing>, StoreError> {
    let mut mailings = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(mailing) = get_mailing(conn, id)? {
            mailings.push(mailing);
        }
    }
    Ok(mailings)
}

/// Highest all-digit mailing id stored so far.
pub fn max_numeric_mailing_id(conn: &Connection) -> Result<Option<u64>, StoreError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(CAST(id AS INTEGER)) FROM mailings
         WHERE id != '' AND id NOT GLOB '*[^0-9]*'",
        [],
        |row| row.get(0),
    )?;
    Ok(max.and_then(|m| u64::try_from(m).ok()))
}

pub fn get_all_mailings(conn: &Connection) -> Result<Vec<Mailing>, StoreError> {
    let ids = list_mailing_ids(conn)?;
    get_mailings(conn, &ids)
}

// ── Delivery status ──

pub fn get_pending_entries(conn: &Connection) -> Result<Vec<PendingEntry>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT p.mailing_id, p.phone FROM mailing_phones p
         JOIN mailings m ON m.id = p.mailing_id
         WHERE p.status = ?1
         ORDER BY m.seq ASC, p.phone ASC",
    )?;

    let entries = stmt
        .query_map(params![DeliveryStatus::Pending.as_str()], |row| {
            Ok(PendingEntry {
                mailing_id: row.get(0)?,
                phone: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Applies a batch of status changes in one transaction. Later entries for
/// the same (mailing, phone) win; entries for unknown pairs change nothing.
/// Returns how many rows were touched.
pub fn update_status_bulk(conn: &Connection, updates: &[StatusUpdate]) -> Result<usize, StoreError> {
    if updates.is_empty() {
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    {
        let mut stmt = tx.prepare(
            "UPDATE mailing_phones SET status = ?1 WHERE mailing_id = ?2 AND phone = ?3",
        )?;
        for update in updates {
            let n = stmt.execute(params![update.status.as_str(), update.mailing_id, update.phone])?;
            if n == 0 {
                tracing::debug!(
                    mailing_id = %update.mailing_id,
                    phone = %update.phone,
                    "skipping status update for unknown recipient"
                );
            }
            changed += n;
        }
    }
    tx.commit()?;

    Ok(changed)
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{s}': {e}")))
}
