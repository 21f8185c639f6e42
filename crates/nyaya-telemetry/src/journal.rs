//! Anomaly journal.
//!
//! Every WARN or ERROR event raised during a review (protocol anomalies,
//! transport failures, failed reviews) lands in one SQLite table, keyed by
//! session and participant, so a finished session can be audited later.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{span, Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Kind reported for events that carry no `kind` field.
pub const UNCLASSIFIED: &str = "unclassified";

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    CREATE TABLE IF NOT EXISTS anomalies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at TEXT NOT NULL,
        level TEXT NOT NULL,
        kind TEXT,
        session_id TEXT,
        participant TEXT,
        message TEXT NOT NULL,
        detail TEXT,
        context TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_anomalies_session ON anomalies(session_id, participant);
    CREATE INDEX IF NOT EXISTS idx_anomalies_kind ON anomalies(kind);
";

const FILTER: &str = "(?1 IS NULL OR session_id = ?1)
     AND (?2 IS NULL OR participant = ?2)
     AND (?3 IS NULL OR COALESCE(kind, 'unclassified') = ?3)";

/// One persisted anomaly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub recorded_at: String,
    pub level: String,
    pub kind: Option<String>,
    pub session_id: Option<String>,
    pub participant: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    /// Remaining structured fields as a JSON object.
    pub context: Option<String>,
}

/// Filter for [`AnomalyJournal::entries`] and [`AnomalyJournal::tally`].
/// Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct JournalQuery {
    pub session_id: Option<String>,
    pub participant: Option<String>,
    pub kind: Option<String>,
    /// Newest entries first; defaults to 100. Ignored by `tally`.
    pub limit: Option<u32>,
}

pub struct AnomalyJournal {
    conn: Mutex<Connection>,
}

impl AnomalyJournal {
    /// Open (or create) the journal at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn record(&self, level: Level, fields: EventFields) {
        let context = (!fields.context.is_empty()).then(|| Value::Object(fields.context).to_string());
        let conn = self.conn.lock();
        // A failed write cannot be logged from inside the layer; drop it.
        let _ = conn.execute(
            "INSERT INTO anomalies
                 (recorded_at, level, kind, session_id, participant, message, detail, context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Utc::now().to_rfc3339(),
                level.as_str(),
                fields.kind,
                fields.session_id,
                fields.participant,
                fields.message.unwrap_or_default(),
                fields.detail,
                context,
            ],
        );
    }

    pub fn entries(&self, query: &JournalQuery) -> Result<Vec<JournalEntry>, rusqlite::Error> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, recorded_at, level, kind, session_id, participant, message, detail, context
             FROM anomalies WHERE {FILTER} ORDER BY id DESC LIMIT ?4"
        ))?;
        let rows = stmt.query_map(
            params![
                query.session_id,
                query.participant,
                query.kind,
                query.limit.unwrap_or(100),
            ],
            |row| {
                Ok(JournalEntry {
                    id: row.get(0)?,
                    recorded_at: row.get(1)?,
                    level: row.get(2)?,
                    kind: row.get(3)?,
                    session_id: row.get(4)?,
                    participant: row.get(5)?,
                    message: row.get(6)?,
                    detail: row.get(7)?,
                    context: row.get(8)?,
                })
            },
        )?;
        rows.collect()
    }

    /// Count matching entries per kind, most frequent first.
    pub fn tally(&self, query: &JournalQuery) -> Result<Vec<(String, u64)>, rusqlite::Error> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT COALESCE(kind, 'unclassified') AS k, COUNT(*) AS n
             FROM anomalies WHERE {FILTER} GROUP BY k ORDER BY n DESC, k"
        ))?;
        let rows = stmt.query_map(
            params![query.session_id, query.participant, query.kind],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.unsigned_abs())),
        )?;
        rows.collect()
    }
}

/// Fields pulled out of an event. The well-known ones get their own column;
/// anything else goes into `context`.
#[derive(Default)]
struct EventFields {
    message: Option<String>,
    kind: Option<String>,
    detail: Option<String>,
    session_id: Option<String>,
    participant: Option<String>,
    context: Map<String, Value>,
}

impl EventFields {
    fn put(&mut self, field: &Field, value: Value) {
        let slot = match field.name() {
            "message" => &mut self.message,
            "kind" => &mut self.kind,
            "detail" => &mut self.detail,
            "session_id" => &mut self.session_id,
            "participant" => &mut self.participant,
            name => {
                self.context.insert(name.to_string(), value);
                return;
            }
        };
        *slot = Some(match value {
            Value::String(s) => s,
            other => other.to_string(),
        });
    }

    /// Fill session and participant from an enclosing review span.
    fn inherit(&mut self, scope: &ReviewScope) {
        if self.session_id.is_none() {
            self.session_id.clone_from(&scope.session_id);
        }
        if self.participant.is_none() {
            self.participant.clone_from(&scope.participant);
        }
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }
}

/// Session and participant declared on a span, stored in its extensions.
struct ReviewScope {
    session_id: Option<String>,
    participant: Option<String>,
}

/// tracing layer feeding WARN and ERROR events into an [`AnomalyJournal`].
pub struct JournalLayer {
    journal: Arc<AnomalyJournal>,
}

impl JournalLayer {
    pub fn new(journal: Arc<AnomalyJournal>) -> Self {
        Self { journal }
    }
}

impl<S> Layer<S> for JournalLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let mut fields = EventFields::default();
        attrs.record(&mut fields);
        if fields.session_id.is_none() && fields.participant.is_none() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(ReviewScope {
                session_id: fields.session_id,
                participant: fields.participant,
            });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }
        let mut fields = EventFields::default();
        event.record(&mut fields);

        // Innermost span wins.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(review) = span.extensions().get::<ReviewScope>() {
                    fields.inherit(review);
                }
            }
        }
        self.journal.record(level, fields);
    }
}
