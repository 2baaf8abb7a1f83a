//! Symbol read paths.

use crate::error::StoreResult;
use crate::files::FILE_COLUMNS;
use crate::store::Store;
use codescope_core::{FileRecord, Symbol, SymbolKind};
use rusqlite::params;

impl Store {
  /// Definitions matching `name`, optionally scoped to one repository.
  /// Ties break by file path lexicographic order, then line ascending.
  pub fn lookup_symbol(&self, name: &str, repo_id: Option<i64>) -> StoreResult<Vec<(Symbol, FileRecord)>> {
    self.with_conn(|conn| {
      let sql = format!(
        "SELECT s.id, s.file_id, s.name, s.kind, s.line_start, s.line_end, s.signature, s.doc, {}
         FROM symbols s JOIN files f ON f.id = s.file_id
         WHERE s.name = ?1 {}
         ORDER BY f.abs_path ASC, s.line_start ASC",
        FILE_COLUMNS
          .split(", ")
          .map(|c| format!("f.{c}"))
          .collect::<Vec<_>>()
          .join(", "),
        if repo_id.is_some() { "AND f.repo_id = ?2" } else { "" }
      );

      let mut stmt = conn.prepare(&sql)?;

      let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(Symbol, FileRecord)> {
        let kind: String = row.get(3)?;
        let symbol = Symbol {
          id: row.get(0)?,
          file_id: row.get(1)?,
          name: row.get(2)?,
          kind: SymbolKind::parse(&kind),
          line_start: row.get(4)?,
          line_end: row.get(5)?,
          signature: row.get(6)?,
          doc: row.get(7)?,
        };
        // File columns start after the 8 symbol columns
        let file = {
          let offset_row = OffsetRow { row, offset: 8 };
          offset_row.file()?
        };
        Ok((symbol, file))
      };

      let rows: Vec<(Symbol, FileRecord)> = match repo_id {
        Some(id) => stmt
          .query_map(params![name, id], map_row)?
          .collect::<rusqlite::Result<_>>()?,
        None => stmt.query_map(params![name], map_row)?.collect::<rusqlite::Result<_>>()?,
      };

      Ok(rows)
    })
  }

  /// All symbols for one file, in line order
  pub fn file_symbols(&self, file_id: i64) -> StoreResult<Vec<Symbol>> {
    self.with_conn(|conn| {
      let mut stmt = conn.prepare(
        "SELECT id, file_id, name, kind, line_start, line_end, signature, doc
         FROM symbols WHERE file_id = ?1 ORDER BY line_start ASC",
      )?;

      let rows = stmt
        .query_map(params![file_id], |row| {
          let kind: String = row.get(3)?;
          Ok(Symbol {
            id: row.get(0)?,
            file_id: row.get(1)?,
            name: row.get(2)?,
            kind: SymbolKind::parse(&kind),
            line_start: row.get(4)?,
            line_end: row.get(5)?,
            signature: row.get(6)?,
            doc: row.get(7)?,
          })
        })?
        .collect::<rusqlite::Result<_>>()?;

      Ok(rows)
    })
  }

  /// Symbol count for one repository
  pub fn symbol_count(&self, repo_id: i64) -> StoreResult<u64> {
    self.with_conn(|conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM symbols s JOIN files f ON f.id = s.file_id WHERE f.repo_id = ?1",
        params![repo_id],
        |r| r.get(0),
      )?)
    })
  }
}

/// Reads file columns starting at a fixed offset into a joined row
struct OffsetRow<'a, 'b> {
  row: &'a rusqlite::Row<'b>,
  offset: usize,
}

impl OffsetRow<'_, '_> {
  fn file(&self) -> rusqlite::Result<FileRecord> {
    use chrono::{DateTime, Utc};
    use codescope_core::Language;

    let language: Option<String> = self.row.get(self.offset + 4)?;
    let indexed_at: String = self.row.get(self.offset + 7)?;

    Ok(FileRecord {
      id: self.row.get(self.offset)?,
      repo_id: self.row.get(self.offset + 1)?,
      abs_path: self.row.get(self.offset + 2)?,
      rel_path: self.row.get(self.offset + 3)?,
      language: language.as_deref().and_then(Language::parse),
      size: self.row.get(self.offset + 5)?,
      hash: self.row.get(self.offset + 6)?,
      indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default(),
    })
  }
}
