use crate::error::StoreResult;
use crate::schema;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Handle to one repository's database.
///
/// The connection is guarded by a mutex; transactions are short and
/// synchronous. Async callers go through `tokio::task::spawn_blocking`.
pub struct Store {
  pub(crate) conn: Mutex<Connection>,
  path: Option<PathBuf>,
}

impl std::fmt::Debug for Store {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Store").field("path", &self.path).finish_non_exhaustive()
  }
}

impl Store {
  /// Open (or create) a database file
  pub fn open(path: &Path) -> StoreResult<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    info!(path = %path.display(), "Opening index store");
    let conn = Connection::open(path)?;
    schema::initialize(&conn)?;

    Ok(Self {
      conn: Mutex::new(conn),
      path: Some(path.to_path_buf()),
    })
  }

  /// Open an in-memory database (tests, scratch indexes)
  pub fn open_in_memory() -> StoreResult<Self> {
    let conn = Connection::open_in_memory()?;
    schema::initialize(&conn)?;

    Ok(Self {
      conn: Mutex::new(conn),
      path: None,
    })
  }

  /// Database file path, if file-backed
  pub fn db_path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  /// Run `f` with the connection locked
  pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
    let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&conn)
  }

  /// Run `f` with a mutable connection (for transactions)
  pub(crate) fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
    let mut conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut conn)
  }

  /// Total row counts, cheap enough to call from status handlers
  pub fn counts(&self) -> StoreResult<StoreCounts> {
    self.with_conn(|conn| {
      let repositories: u64 = conn.query_row("SELECT COUNT(*) FROM repositories", [], |r| r.get(0))?;
      let files: u64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
      let symbols: u64 = conn.query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
      let bm25_documents: u64 = conn.query_row("SELECT COUNT(*) FROM bm25_content", [], |r| r.get(0))?;

      debug!(files, symbols, bm25_documents, "Store counts");
      Ok(StoreCounts {
        repositories,
        files,
        symbols,
        bm25_documents,
      })
    })
  }
}

/// Aggregate row counts for a store
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StoreCounts {
  pub repositories: u64,
  pub files: u64,
  pub symbols: u64,
  pub bm25_documents: u64,
}
