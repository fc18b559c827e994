use serde::Deserialize;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Event, EventRow, StopType};

pub type DbConn = Surreal<Db>;

/// Rows per INSERT statement
pub const INSERT_CHUNK: usize = 1000;

/// Open (or create) the RocksDB-backed store
pub async fn connect(path: &str) -> Result<DbConn> {
    let db = Surreal::new::<RocksDb>(path).await?;
    db.use_ns("lastmile").use_db("bay").await?;
    Ok(db)
}

/// Initialize database schema
pub async fn init_schema(db: &DbConn) -> Result<()> {
    db.query(
        r#"
        DEFINE TABLE IF NOT EXISTS event SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_event_kind ON event FIELDS kind;
        DEFINE INDEX IF NOT EXISTS idx_event_zip ON event FIELDS zipcode;
        DEFINE INDEX IF NOT EXISTS idx_event_ts ON event FIELDS local_ts;
        "#,
    )
    .await?
    .check()?;

    Ok(())
}

/// Insert events in chunks; returns how many were written
pub async fn insert_events(db: &DbConn, events: &[Event]) -> Result<usize> {
    let mut written = 0;
    for chunk in events.chunks(INSERT_CHUNK) {
        let rows: Vec<EventRow> = chunk.iter().map(EventRow::from).collect();
        db.query("INSERT INTO event $rows")
            .bind(("rows", rows))
            .await?
            .check()?;
        written += chunk.len();
        debug!("Inserted {}/{} events", written, events.len());
    }
    Ok(written)
}

/// Remove every stored event
pub async fn clear_events(db: &DbConn) -> Result<()> {
    db.query("DELETE event").await?.check()?;
    info!("Cleared event table");
    Ok(())
}

/// All events of the kinds making up `stop`
pub async fn load_events(db: &DbConn, stop: StopType) -> Result<Vec<Event>> {
    let kinds: Vec<String> = stop.kinds().iter().map(|k| k.as_str().to_string()).collect();
    let rows: Vec<EventRow> = db
        .query("SELECT kind, zipcode, local_ts, value_cents FROM event WHERE kind IN $kinds")
        .bind(("kinds", kinds))
        .await?
        .take(0)?;

    rows.iter().map(EventRow::to_event).collect()
}

#[derive(Debug, Deserialize)]
struct KindCount {
    kind: String,
    n: i64,
}

/// Stored event count per kind, e.g. `[("delivery", 120), ("pickup", 80)]`
pub async fn count_events(db: &DbConn) -> Result<Vec<(String, i64)>> {
    let mut rows: Vec<KindCount> = db
        .query("SELECT kind, count() AS n FROM event GROUP BY kind")
        .await?
        .take(0)?;
    rows.sort_by(|a, b| a.kind.cmp(&b.kind));
    Ok(rows.into_iter().map(|r| (r.kind, r.n)).collect())
}
