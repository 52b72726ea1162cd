use crate::models::{ExtractedItem, PersistSummary, PostFilter, PostUpdate, StoredPost};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const POST_COLUMNS: &str = "id, link, text, author_name, author_image, post_time, likes, comments, screenshot, description, keywords, captured_at, applied, saved";

/// Handle to the post store. Owns the single connection; every call locks it,
/// so writes are serialized.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and bring the schema up to date
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened database {}", path.as_ref().display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock can't leave SQLite half-written, keep going
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert one item, `None` when its link is already stored
    pub fn insert_post(&self, item: &ExtractedItem, keywords: Option<&str>) -> Result<Option<i64>> {
        insert_post_at(&self.lock(), item, keywords, Utc::now())
    }

    /// Insert with an explicit capture time
    pub fn insert_post_at(
        &self,
        item: &ExtractedItem,
        keywords: Option<&str>,
        captured_at: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        insert_post_at(&self.lock(), item, keywords, captured_at)
    }

    /// Idempotent bulk insert inside one transaction
    pub fn persist(&self, items: &[ExtractedItem], keywords: Option<&str>) -> Result<PersistSummary> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let mut summary = PersistSummary {
            total: items.len(),
            ..PersistSummary::default()
        };
        for item in items {
            match insert_post_at(&tx, item, keywords, now)? {
                Some(_) => summary.new += 1,
                None => summary.duplicates += 1,
            }
        }
        tx.commit()?;

        info!(
            "Persisted {} posts: {} new, {} duplicates",
            summary.total, summary.new, summary.duplicates
        );
        Ok(summary)
    }

    pub fn get_post(&self, id: i64) -> Result<Option<StoredPost>> {
        get_post(&self.lock(), id)
    }

    pub fn query_posts(&self, filter: &PostFilter) -> Result<Vec<StoredPost>> {
        query_posts(&self.lock(), filter)
    }

    pub fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        count_posts(&self.lock(), filter)
    }

    pub fn update_posts(&self, ids: &[i64], update: &PostUpdate) -> Result<usize> {
        update_posts(&self.lock(), ids, update)
    }

    pub fn delete_posts(&self, ids: &[i64]) -> Result<usize> {
        delete_posts(&self.lock(), ids)
    }
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    debug!("Creating tables if not exists...");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            link TEXT NOT NULL UNIQUE,
            text TEXT,
            author_name TEXT,
            author_image TEXT,
            post_time TEXT,
            likes TEXT,
            comments TEXT,
            captured_at TEXT NOT NULL
        );",
        [],
    )?;

    // Migrations for existing DBs: add missing columns
    ensure_column(conn, "posts", "screenshot", "TEXT")?;
    ensure_column(conn, "posts", "description", "TEXT")?;
    ensure_column(conn, "posts", "keywords", "TEXT")?;
    ensure_column(conn, "posts", "applied", "INTEGER NOT NULL DEFAULT 0")?;
    ensure_column(conn, "posts", "saved", "INTEGER NOT NULL DEFAULT 0")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_captured ON posts(captured_at);",
        [],
    )?;

    debug!("Tables ensured.");
    Ok(())
}

fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?; // 2nd column is name
    let names = rows.collect::<Result<Vec<_>>>()?;
    Ok(names)
}

fn ensure_column(conn: &Connection, table: &str, column: &str, column_type: &str) -> Result<()> {
    if column_names(conn, table)?.iter().any(|c| c == column) {
        return Ok(());
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_type);
    match conn.execute(&sql, params![]) {
        Ok(_) => {
            info!("Added column {}.{}", table, column);
            Ok(())
        }
        // Another process may have added it since we looked
        Err(e) if e.to_string().contains("duplicate column name") => Ok(()),
        Err(e) => Err(e),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn insert_post_at(
    conn: &Connection,
    item: &ExtractedItem,
    keywords: Option<&str>,
    captured_at: DateTime<Utc>,
) -> Result<Option<i64>> {
    let result = conn.execute(
        "INSERT INTO posts (link, text, author_name, author_image, post_time, likes, comments, screenshot, keywords, captured_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            item.link,
            item.text,
            item.author_name,
            item.author_image,
            item.post_time,
            item.likes,
            item.comments,
            item.screenshot,
            keywords,
            captured_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    );

    match result {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => {
            debug!("Skipping duplicate post {}", item.link);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> Result<StoredPost> {
    Ok(StoredPost {
        id: row.get(0)?,
        link: row.get(1)?,
        text: row.get(2)?,
        author_name: row.get(3)?,
        author_image: row.get(4)?,
        post_time: row.get(5)?,
        likes: row.get(6)?,
        comments: row.get(7)?,
        screenshot: row.get(8)?,
        description: row.get(9)?,
        keywords: row.get(10)?,
        captured_at: row.get(11)?,
        applied: row.get(12)?,
        saved: row.get(13)?,
    })
}

pub fn get_post(conn: &Connection, id: i64) -> Result<Option<StoredPost>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS);
    conn.query_row(&sql, [id], row_to_post).optional()
}

/// Comma-separated `?` list for an IN clause
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Backslash-escape `%`, `_` and `\` so they match literally in LIKE
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// WHERE clause and its parameters for a filter (without limit/offset)
fn build_where(filter: &PostFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut where_clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ids) = &filter.ids {
        if ids.is_empty() {
            // Empty set matches nothing
            where_clauses.push("0".to_string());
        } else {
            where_clauses.push(format!("id IN ({})", placeholders(ids.len())));
            for id in ids {
                params.push(Box::new(*id));
            }
        }
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // LIKE is case-insensitive for ASCII in SQLite
        where_clauses.push(
            "(text LIKE ? ESCAPE '\\' OR author_name LIKE ? ESCAPE '\\')".to_string(),
        );
        let pattern = format!("%{}%", escape_like(search));
        params.push(Box::new(pattern.clone()));
        params.push(Box::new(pattern));
    }
    if let Some(from) = filter.date_from {
        where_clauses.push("date(captured_at) >= ?".to_string());
        params.push(Box::new(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.date_to {
        where_clauses.push("date(captured_at) <= ?".to_string());
        params.push(Box::new(to.format("%Y-%m-%d").to_string()));
    }
    if let Some(applied) = filter.applied {
        where_clauses.push("applied = ?".to_string());
        params.push(Box::new(applied));
    }
    if let Some(saved) = filter.saved {
        where_clauses.push("saved = ?".to_string());
        params.push(Box::new(saved));
    }

    let where_clause = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };
    (where_clause, params)
}

pub fn query_posts(conn: &Connection, filter: &PostFilter) -> Result<Vec<StoredPost>> {
    let (where_clause, mut params) = build_where(filter);
    let mut sql = format!(
        "SELECT {} FROM posts{} ORDER BY captured_at DESC, id DESC",
        POST_COLUMNS, where_clause
    );
    if filter.limit.is_some() || filter.offset.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
        params.push(Box::new(filter.limit.map(i64::from).unwrap_or(-1)));
        params.push(Box::new(filter.offset.unwrap_or(0)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), row_to_post)?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

pub fn count_posts(conn: &Connection, filter: &PostFilter) -> Result<i64> {
    let (where_clause, params) = build_where(filter);
    let sql = format!("SELECT COUNT(*) FROM posts{}", where_clause);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
}

/// Write only the fields present in `update` for every id
pub fn update_posts(conn: &Connection, ids: &[i64], update: &PostUpdate) -> Result<usize> {
    if ids.is_empty() || update.is_empty() {
        return Ok(0);
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(applied) = update.applied {
        sets.push("applied = ?");
        params.push(Box::new(applied));
    }
    if let Some(saved) = update.saved {
        sets.push("saved = ?");
        params.push(Box::new(saved));
    }
    if let Some(description) = &update.description {
        sets.push("description = ?");
        params.push(Box::new(description.clone()));
    }
    for id in ids {
        params.push(Box::new(*id));
    }

    let sql = format!(
        "UPDATE posts SET {} WHERE id IN ({})",
        sets.join(", "),
        placeholders(ids.len())
    );
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, param_refs.as_slice())
}

pub fn delete_posts(conn: &Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!("DELETE FROM posts WHERE id IN ({})", placeholders(ids.len()));
    let param_refs: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    conn.execute(&sql, param_refs.as_slice())
}
