pub mod models;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

pub use models::{AlertState, CoinOpStatus, OfferStateRow, PricePolicyRecord};

/// Durable key/value + append-only tables the orchestrator is the sole
/// writer of. Cloned handles share the same connection: the store is the
/// only state crossing task boundaries, and rusqlite itself is not `Sync`,
/// so all access goes through a mutex the way the teacher's `api::db` wraps
/// its `Connection` in `Arc<Mutex<_>>`.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating store directory")?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite store at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) {
        drop(self.conn);
    }

    /// Cheap round-trip used by `doctor`.
    pub fn health(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ── alert_state ──────────────────────────────────────────────────

    pub fn get_alert_state(&self, market_id: &str) -> Result<AlertState> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT is_low, last_alert_at FROM alert_state WHERE market_id = ?1",
                params![market_id],
                |row| {
                    Ok(AlertState {
                        is_low: row.get::<_, i64>(0)? != 0,
                        last_alert_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or(AlertState {
            is_low: false,
            last_alert_at: None,
        }))
    }

    pub fn upsert_alert_state(&self, market_id: &str, state: &AlertState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alert_state (market_id, is_low, last_alert_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(market_id) DO UPDATE SET
                is_low = excluded.is_low,
                last_alert_at = excluded.last_alert_at,
                updated_at = excluded.updated_at",
            params![market_id, state.is_low as i64, state.last_alert_at, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── audit_event ──────────────────────────────────────────────────

    pub fn add_audit_event(
        &self,
        event_type: &str,
        payload: &Value,
        market_id: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let canonical = canonicalize(payload);
        conn.execute(
            "INSERT INTO audit_event (event_type, market_id, payload_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![event_type, market_id, canonical, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_recent_audit_events(
        &self,
        event_types: Option<&[String]>,
        market_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<(i64, String, Option<String>, String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, event_type, market_id, payload_json, created_at FROM audit_event WHERE 1=1",
        );
        if event_types.is_some() {
            sql.push_str(" AND event_type IN (SELECT value FROM json_each(?1))");
        }
        if market_id.is_some() {
            sql.push_str(" AND market_id = ?2");
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?3");

        let types_json = event_types
            .map(|t| serde_json::to_string(t).unwrap_or_else(|_| "[]".to_string()))
            .unwrap_or_else(|| "[]".to_string());

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![types_json, market_id, limit], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("listing audit events")
    }

    /// Reads the most recent `xch_price_snapshot` event's `price_usd`
    /// field. Returns `None` for missing, non-positive, or malformed
    /// payloads rather than erroring — price unavailability is routine.
    pub fn get_latest_xch_price_snapshot(&self) -> Result<Option<f64>> {
        let conn = self.conn.lock().unwrap();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM audit_event
                 WHERE event_type = 'xch_price_snapshot'
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else { return Ok(None) };
        let Ok(value) = serde_json::from_str::<Value>(&payload) else {
            return Ok(None);
        };
        let price = value.get("price_usd").and_then(Value::as_f64);
        Ok(price.filter(|p| *p > 0.0))
    }

    // ── price_policy_history ─────────────────────────────────────────

    pub fn add_price_policy_record(&self, record: &PricePolicyRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO price_policy_history
                (market_id, xch_price_usd, previous_xch_price_usd, move_bps, spread_bps, computed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.market_id,
                record.xch_price_usd,
                record.previous_xch_price_usd,
                record.move_bps,
                record.spread_bps,
                record.computed_at,
            ],
        )?;
        Ok(())
    }

    /// Most recent prior price row for a market, distinct from
    /// `get_latest_xch_price_snapshot` which scrapes the global audit log
    /// rather than this per-market history table.
    pub fn get_previous_xch_price(&self, market_id: &str) -> Result<Option<f64>> {
        let conn = self.conn.lock().unwrap();
        let price: Option<f64> = conn
            .query_row(
                "SELECT xch_price_usd FROM price_policy_history
                 WHERE market_id = ?1 ORDER BY id DESC LIMIT 1",
                params![market_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(price)
    }

    // ── tx_signal_state ──────────────────────────────────────────────

    /// Insert-or-ignore. Returns the number of rows newly inserted (empty
    /// and whitespace-only ids are dropped before insertion).
    pub fn observe_mempool_tx_ids(&self, tx_ids: &[String]) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut inserted = 0usize;
        let now = Utc::now().to_rfc3339();
        for tx_id in tx_ids {
            let tx_id = tx_id.trim();
            if tx_id.is_empty() {
                continue;
            }
            let changed = conn.execute(
                "INSERT OR IGNORE INTO tx_signal_state (tx_id, mempool_observed_at)
                 VALUES (?1, ?2)",
                params![tx_id, now],
            )?;
            inserted += changed;
        }
        Ok(inserted)
    }

    /// Monotone: once `tx_block_confirmed_at` is set for a row, later calls
    /// leave it unchanged (COALESCE keeps the earliest value).
    pub fn confirm_tx_ids(&self, tx_ids: &[String]) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut updated = 0usize;
        let now = Utc::now().to_rfc3339();
        for tx_id in tx_ids {
            let tx_id = tx_id.trim();
            if tx_id.is_empty() {
                continue;
            }
            let changed = conn.execute(
                "UPDATE tx_signal_state
                 SET tx_block_confirmed_at = COALESCE(tx_block_confirmed_at, ?2)
                 WHERE tx_id = ?1",
                params![tx_id, now],
            )?;
            updated += changed;
        }
        Ok(updated)
    }

    // ── offer_state ──────────────────────────────────────────────────

    /// `size_base_units` is only meaningful on first insert (it identifies
    /// which ladder bucket the offer fills); reconciliation updates to an
    /// existing row leave it untouched via `COALESCE`.
    pub fn upsert_offer_state(
        &self,
        offer_id: &str,
        market_id: &str,
        state: &str,
        last_seen_status: Option<i64>,
        size_base_units: Option<i64>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO offer_state (offer_id, market_id, state, last_seen_status, size_base_units, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(offer_id) DO UPDATE SET
                state = excluded.state,
                last_seen_status = excluded.last_seen_status,
                size_base_units = COALESCE(offer_state.size_base_units, excluded.size_base_units),
                updated_at = excluded.updated_at",
            params![offer_id, market_id, state, last_seen_status, size_base_units, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_offer_states(
        &self,
        market_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<OfferStateRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT offer_id, market_id, state, last_seen_status, size_base_units, updated_at
             FROM offer_state
             WHERE (?1 IS NULL OR market_id = ?1)
             ORDER BY updated_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![market_id, limit], |row| {
            Ok(OfferStateRow {
                offer_id: row.get(0)?,
                market_id: row.get(1)?,
                state: row.get(2)?,
                last_seen_status: row.get(3)?,
                size_base_units: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("listing offer states")
    }

    /// Open (`state = 'open'`) offers for a market, keyed by the coin denomination
    /// they fill. Rows with no recorded `size_base_units` (pre-dating this
    /// column, or reconciled from a venue the daemon never posted to) are
    /// excluded — the strategy planner can only count what it can attribute.
    pub fn count_open_offers_by_size(&self, market_id: &str) -> Result<HashMap<i64, i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT size_base_units, COUNT(*) FROM offer_state
             WHERE market_id = ?1 AND state = 'open' AND size_base_units IS NOT NULL
             GROUP BY size_base_units",
        )?;
        let rows = stmt.query_map(params![market_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("counting open offers by size")
    }

    /// Open (status 0, per §4.8) offers for a market that this daemon
    /// recorded — the cancel policy only acts on rows it knows about.
    pub fn list_open_offer_ids(&self, market_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT offer_id FROM offer_state WHERE market_id = ?1 AND state = 'open'",
        )?;
        let rows = stmt.query_map(params![market_id], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("listing open offer ids")
    }

    // ── coin_op_ledger ───────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn add_coin_op_ledger_entry(
        &self,
        market_id: &str,
        op_type: &str,
        op_count: i64,
        fee_mojos: i64,
        status: CoinOpStatus,
        reason: &str,
        operation_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO coin_op_ledger
                (market_id, op_type, op_count, fee_mojos, status, reason, operation_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                market_id,
                op_type,
                op_count,
                fee_mojos,
                status.as_str(),
                reason,
                operation_id,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Sum of `fee_mojos` for `status='executed'` rows created today (UTC).
    pub fn get_daily_fee_spent_mojos_utc(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let spent: Option<i64> = conn.query_row(
            "SELECT SUM(fee_mojos) FROM coin_op_ledger
             WHERE status = 'executed' AND substr(created_at, 1, 10) = ?1",
            params![today],
            |row| row.get(0),
        )?;
        Ok(spent.unwrap_or(0))
    }
}

/// Canonical JSON: sorted keys so identical payloads always serialize
/// identically (audit events are compared and hashed by downstream tools).
fn canonicalize(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted: std::collections::BTreeMap<String, Value> =
                    std::collections::BTreeMap::new();
                for (k, v) in map {
                    sorted.insert(k.clone(), sort(v));
                }
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sort(value)).unwrap_or_else(|_| "{}".to_string())
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS alert_state (
            market_id      TEXT PRIMARY KEY,
            is_low         INTEGER NOT NULL DEFAULT 0,
            last_alert_at  TEXT,
            updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS audit_event (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type   TEXT NOT NULL,
            market_id    TEXT,
            payload_json TEXT NOT NULL,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_audit_event_type ON audit_event(event_type);
        CREATE INDEX IF NOT EXISTS idx_audit_event_market ON audit_event(market_id);

        CREATE TABLE IF NOT EXISTS price_policy_history (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            market_id               TEXT NOT NULL,
            xch_price_usd           REAL,
            previous_xch_price_usd  REAL,
            move_bps                REAL,
            spread_bps              INTEGER,
            computed_at             TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tx_signal_state (
            tx_id                  TEXT PRIMARY KEY,
            mempool_observed_at    TEXT NOT NULL,
            tx_block_confirmed_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS offer_state (
            offer_id          TEXT PRIMARY KEY,
            market_id         TEXT NOT NULL,
            state             TEXT NOT NULL,
            last_seen_status  INTEGER,
            size_base_units   INTEGER,
            updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS coin_op_ledger (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            market_id     TEXT NOT NULL,
            op_type       TEXT NOT NULL,
            op_count      INTEGER NOT NULL,
            fee_mojos     INTEGER NOT NULL,
            status        TEXT NOT NULL,
            reason        TEXT NOT NULL,
            operation_id  TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    // `offer_state.size_base_units` was added after the table's initial
    // release; stores created before that migration need it backfilled.
    // SQLite has no `ADD COLUMN IF NOT EXISTS`, so ignore the "duplicate
    // column" error a re-run produces.
    let _ = conn.execute("ALTER TABLE offer_state ADD COLUMN size_base_units INTEGER", []);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn observe_mempool_tx_ids_is_idempotent() {
        let s = store();
        let ids = vec!["aa".to_string(), "bb".to_string(), " ".to_string(), "".to_string()];
        let inserted = s.observe_mempool_tx_ids(&ids).unwrap();
        assert_eq!(inserted, 2);
        let inserted_again = s.observe_mempool_tx_ids(&ids).unwrap();
        assert_eq!(inserted_again, 0);
    }

    #[test]
    fn confirm_tx_ids_is_monotone() {
        let s = store();
        s.observe_mempool_tx_ids(&["aa".to_string()]).unwrap();
        s.confirm_tx_ids(&["aa".to_string()]).unwrap();
        let rows = {
            let conn = s.conn.lock().unwrap();
            conn.query_row(
                "SELECT tx_block_confirmed_at FROM tx_signal_state WHERE tx_id = 'aa'",
                [],
                |row| row.get::<_, String>(0),
            )
            .unwrap()
        };
        s.confirm_tx_ids(&["aa".to_string()]).unwrap();
        let rows_again = {
            let conn = s.conn.lock().unwrap();
            conn.query_row(
                "SELECT tx_block_confirmed_at FROM tx_signal_state WHERE tx_id = 'aa'",
                [],
                |row| row.get::<_, String>(0),
            )
            .unwrap()
        };
        assert_eq!(rows, rows_again);
    }

    #[test]
    fn alert_state_defaults_to_not_low() {
        let s = store();
        let state = s.get_alert_state("xch-usdc").unwrap();
        assert!(!state.is_low);
        assert!(state.last_alert_at.is_none());
    }

    #[test]
    fn daily_fee_spent_only_counts_executed() {
        let s = store();
        s.add_coin_op_ledger_entry("m1", "split", 3, 30, CoinOpStatus::Executed, "ok", None)
            .unwrap();
        s.add_coin_op_ledger_entry("m1", "split", 2, 20, CoinOpStatus::Planned, "ok", None)
            .unwrap();
        assert_eq!(s.get_daily_fee_spent_mojos_utc().unwrap(), 30);
    }

    #[test]
    fn latest_xch_price_snapshot_ignores_malformed_payloads() {
        let s = store();
        assert_eq!(s.get_latest_xch_price_snapshot().unwrap(), None);
        s.add_audit_event("xch_price_snapshot", &serde_json::json!({"price_usd": -1.0}), None)
            .unwrap();
        assert_eq!(s.get_latest_xch_price_snapshot().unwrap(), None);
        s.add_audit_event("xch_price_snapshot", &serde_json::json!({"price_usd": 42.5}), None)
            .unwrap();
        assert_eq!(s.get_latest_xch_price_snapshot().unwrap(), Some(42.5));
    }
}
