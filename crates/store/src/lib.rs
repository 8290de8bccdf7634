use protocol::{
    EdgeType, FileRecord, FileStatus, Language, LanguageInfo, Project, SymbolKind,
    UniversalRelationship, UniversalSymbol, Visibility,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

mod batch;
pub mod dedup;
mod error;

pub use batch::TransactionBatcher;
pub use error::{Result, StoreError};

/// Current schema version, tracked in `schema_metadata`. Bump and add a
/// migration arm to `run_migrations` when the table shapes change.
pub const SCHEMA_VERSION: i64 = 1;

pub struct GraphStore {
    db_path: PathBuf,
    conn: Connection,
}

impl GraphStore {
    /// Open (creating if absent) the single-file embedded database at
    /// `db_path`, with WAL mode and foreign keys enabled, and the schema
    /// below built around the universal-symbol data model.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Migration(e.to_string()))?;
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        let store = Self {
            db_path: db_path.to_path_buf(),
            conn,
        };
        store.init_schema()?;
        store.check_schema_version()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            BEGIN;

            CREATE TABLE IF NOT EXISTS schema_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                root TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS languages (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                extensions TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS file_index (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                language_id INTEGER NOT NULL,
                relative_path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                size INTEGER NOT NULL,
                last_indexed_at INTEGER NOT NULL,
                parser_used TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                FOREIGN KEY (language_id) REFERENCES languages(id),
                UNIQUE(project_id, relative_path)
            );

            CREATE TABLE IF NOT EXISTS universal_symbols (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                language_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                qualified_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path TEXT NOT NULL,
                line INTEGER NOT NULL,
                column INTEGER NOT NULL DEFAULT 0,
                end_line INTEGER,
                end_column INTEGER,
                signature TEXT,
                return_type TEXT,
                visibility TEXT NOT NULL DEFAULT 'default',
                namespace TEXT,
                parent_symbol_id INTEGER,
                is_exported INTEGER NOT NULL DEFAULT 0,
                is_async INTEGER NOT NULL DEFAULT 0,
                is_abstract INTEGER NOT NULL DEFAULT 0,
                is_definition INTEGER NOT NULL DEFAULT 1,
                semantic_tags TEXT NOT NULL DEFAULT '[]',
                confidence REAL NOT NULL DEFAULT 1.0,
                language_features TEXT NOT NULL DEFAULT 'null',
                duplicate_of INTEGER,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                FOREIGN KEY (language_id) REFERENCES languages(id),
                FOREIGN KEY (parent_symbol_id) REFERENCES universal_symbols(id),
                FOREIGN KEY (duplicate_of) REFERENCES universal_symbols(id),
                UNIQUE(project_id, file_path, qualified_name, line)
            );

            CREATE TABLE IF NOT EXISTS universal_relationships (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                from_symbol_id INTEGER,
                to_symbol_id INTEGER,
                from_name TEXT NOT NULL,
                to_name TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                context_line INTEGER,
                context_snippet TEXT,
                metadata TEXT NOT NULL DEFAULT 'null',
                cross_language INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                FOREIGN KEY (from_symbol_id) REFERENCES universal_symbols(id),
                FOREIGN KEY (to_symbol_id) REFERENCES universal_symbols(id)
            );

            CREATE INDEX IF NOT EXISTS idx_symbols_project_file ON universal_symbols(project_id, file_path);
            CREATE INDEX IF NOT EXISTS idx_symbols_project_qname ON universal_symbols(project_id, qualified_name);
            CREATE INDEX IF NOT EXISTS idx_relationships_project_from ON universal_relationships(project_id, from_symbol_id);
            CREATE INDEX IF NOT EXISTS idx_relationships_project_to ON universal_relationships(project_id, to_symbol_id);
            CREATE INDEX IF NOT EXISTS idx_relationships_project_type ON universal_relationships(project_id, relationship_type);

            CREATE VIRTUAL TABLE IF NOT EXISTS universal_symbols_fts USING fts5(
                name,
                qualified_name,
                signature,
                content=universal_symbols,
                content_rowid=id,
                tokenize='porter unicode61'
            );

            CREATE TRIGGER IF NOT EXISTS universal_symbols_fts_insert AFTER INSERT ON universal_symbols BEGIN
                INSERT INTO universal_symbols_fts(rowid, name, qualified_name, signature)
                VALUES (new.id, new.name, new.qualified_name, new.signature);
            END;

            CREATE TRIGGER IF NOT EXISTS universal_symbols_fts_delete AFTER DELETE ON universal_symbols BEGIN
                DELETE FROM universal_symbols_fts WHERE rowid = old.id;
            END;

            CREATE TRIGGER IF NOT EXISTS universal_symbols_fts_update AFTER UPDATE ON universal_symbols BEGIN
                DELETE FROM universal_symbols_fts WHERE rowid = old.id;
                INSERT INTO universal_symbols_fts(rowid, name, qualified_name, signature)
                VALUES (new.id, new.name, new.qualified_name, new.signature);
            END;

            COMMIT;
            "#,
        )?;
        Ok(())
    }

    fn check_schema_version(&self) -> Result<()> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM schema_metadata WHERE key = 'schema_version'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|s| s.parse().unwrap_or(0));

        match found {
            None => {
                self.conn.execute(
                    "INSERT INTO schema_metadata (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION.to_string()],
                )?;
            }
            Some(v) if v > SCHEMA_VERSION => {
                return Err(StoreError::SchemaMismatch {
                    found: v,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(v) if v < SCHEMA_VERSION => {
                self.run_migrations(v)?;
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn run_migrations(&self, from: i64) -> Result<()> {
        info!(from, to = SCHEMA_VERSION, "running schema migrations");
        // No migrations exist yet above version 1; this is the seam future
        // schema changes hang their forward-migration SQL off of.
        self.conn.execute(
            "UPDATE schema_metadata SET value = ?1 WHERE key = 'schema_version'",
            params![SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    // ---- Project / Language bootstrap -----------------------------------

    pub fn get_or_create_project(&self, name: &str, root: &str, now: i64) -> Result<Project> {
        if let Some(existing) = self.find_project_by_name(name)? {
            return Ok(existing);
        }
        self.conn.execute(
            "INSERT INTO projects (name, root, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, root, now],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Project {
            id: Some(id),
            name: name.to_string(),
            root: root.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "SELECT id, name, root, created_at, updated_at FROM projects WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Project {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        root: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Ensure every language in `languages` is interned. Idempotent and
    /// cheap to call at the start of every run (the process-wide set is
    /// never mutated after this, per the data model).
    pub fn ensure_languages(&self, languages: &[Language]) -> Result<Vec<LanguageInfo>> {
        let mut result = Vec::with_capacity(languages.len());
        for lang in languages {
            result.push(self.ensure_language(*lang)?);
        }
        Ok(result)
    }

    pub fn ensure_language(&self, lang: Language) -> Result<LanguageInfo> {
        if let Some(existing) = self.find_language_by_name(lang.as_str())? {
            return Ok(existing);
        }
        let extensions = serde_json::to_string(lang.default_extensions())?;
        self.conn.execute(
            "INSERT INTO languages (name, extensions) VALUES (?1, ?2)",
            params![lang.as_str(), extensions],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(LanguageInfo {
            id: Some(id),
            name: lang.as_str().to_string(),
            extensions: lang.default_extensions().iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn find_language_by_name(&self, name: &str) -> Result<Option<LanguageInfo>> {
        self.conn
            .query_row(
                "SELECT id, name, extensions FROM languages WHERE name = ?1",
                params![name],
                |row| {
                    let extensions_json: String = row.get(2)?;
                    let extensions: Vec<String> =
                        serde_json::from_str(&extensions_json).unwrap_or_default();
                    Ok(LanguageInfo {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        extensions,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    // ---- File records (C1 / C7) ------------------------------------------

    pub fn all_file_records(&self, project_id: i64) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, language_id, relative_path, content_hash, size,
                    last_indexed_at, parser_used, status, error_message
             FROM file_index WHERE project_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![project_id], row_to_file_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_file_record(&self, project_id: i64, relative_path: &str) -> Result<Option<FileRecord>> {
        self.conn
            .query_row(
                "SELECT id, project_id, language_id, relative_path, content_hash, size,
                        last_indexed_at, parser_used, status, error_message
                 FROM file_index WHERE project_id = ?1 AND relative_path = ?2",
                params![project_id, relative_path],
                row_to_file_record,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn upsert_file_record(&self, record: &FileRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO file_index
                (project_id, language_id, relative_path, content_hash, size,
                 last_indexed_at, parser_used, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(project_id, relative_path) DO UPDATE SET
                language_id = excluded.language_id,
                content_hash = excluded.content_hash,
                size = excluded.size,
                last_indexed_at = excluded.last_indexed_at,
                parser_used = excluded.parser_used,
                status = excluded.status,
                error_message = excluded.error_message",
            params![
                record.project_id,
                record.language_id,
                record.relative_path,
                record.content_hash,
                record.size as i64,
                record.last_indexed_at,
                record.parser_used,
                status_to_str(record.status),
                record.error_message,
            ],
        )?;
        self.find_file_record(record.project_id, &record.relative_path)
            .map(|r| r.and_then(|r| r.id).unwrap_or(0))
    }

    /// Remove a file's record, its symbols, and relationships whose
    /// `from_symbol_id` referenced one of those symbols. Relationships
    /// pointing *into* the removed symbols are retained but unresolved, per
    /// §4.1/§8's incremental-delete invariant.
    pub fn delete_file(&self, project_id: i64, relative_path: &str) -> Result<()> {
        let symbol_ids: Vec<i64> = {
            let mut stmt = self.conn.prepare(
                "SELECT id FROM universal_symbols WHERE project_id = ?1 AND file_path = ?2",
            )?;
            stmt.query_map(params![project_id, relative_path], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        for id in &symbol_ids {
            self.conn.execute(
                "DELETE FROM universal_relationships WHERE from_symbol_id = ?1",
                params![id],
            )?;
            self.conn.execute(
                "UPDATE universal_relationships SET to_symbol_id = NULL WHERE to_symbol_id = ?1",
                params![id],
            )?;
        }
        self.conn.execute(
            "DELETE FROM universal_symbols WHERE project_id = ?1 AND file_path = ?2",
            params![project_id, relative_path],
        )?;
        self.conn.execute(
            "DELETE FROM file_index WHERE project_id = ?1 AND relative_path = ?2",
            params![project_id, relative_path],
        )?;
        Ok(())
    }

    /// Full-reindex mode: wipe every symbol/relationship/file row owned by
    /// the project, keeping the project row itself.
    pub fn clear_project_data(&self, project_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM universal_relationships WHERE project_id = ?1",
            params![project_id],
        )?;
        self.conn.execute(
            "DELETE FROM universal_symbols WHERE project_id = ?1",
            params![project_id],
        )?;
        self.conn.execute(
            "DELETE FROM file_index WHERE project_id = ?1",
            params![project_id],
        )?;
        Ok(())
    }

    // ---- Symbols -----------------------------------------------------------

    pub fn batcher(&self) -> TransactionBatcher<'_> {
        TransactionBatcher::new(&self.conn, "universal_symbols")
    }

    /// Upsert keyed on `(project_id, file_path, qualified_name, line)`, per
    /// the write policy. Returns the row id (stable across reindexes of an
    /// unchanged declaration, satisfying the determinism property).
    pub fn insert_symbol(
        &self,
        batcher: &mut TransactionBatcher<'_>,
        symbol: &UniversalSymbol,
    ) -> Result<i64> {
        let semantic_tags = serde_json::to_string(&symbol.semantic_tags)?;
        let language_features = symbol.language_features.to_string();

        batcher.execute(
            "INSERT INTO universal_symbols
                (project_id, language_id, name, qualified_name, kind, file_path, line, column,
                 end_line, end_column, signature, return_type, visibility, namespace,
                 parent_symbol_id, is_exported, is_async, is_abstract, is_definition,
                 semantic_tags, confidence, language_features, duplicate_of)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)
             ON CONFLICT(project_id, file_path, qualified_name, line) DO UPDATE SET
                language_id = excluded.language_id,
                name = excluded.name,
                kind = excluded.kind,
                column = excluded.column,
                end_line = excluded.end_line,
                end_column = excluded.end_column,
                signature = excluded.signature,
                return_type = excluded.return_type,
                visibility = excluded.visibility,
                namespace = excluded.namespace,
                parent_symbol_id = excluded.parent_symbol_id,
                is_exported = excluded.is_exported,
                is_async = excluded.is_async,
                is_abstract = excluded.is_abstract,
                is_definition = excluded.is_definition,
                semantic_tags = excluded.semantic_tags,
                confidence = excluded.confidence,
                language_features = excluded.language_features,
                duplicate_of = excluded.duplicate_of",
            &[
                &symbol.project_id,
                &symbol.language_id,
                &symbol.name,
                &symbol.qualified_name,
                &kind_to_str(symbol.kind),
                &symbol.file_path,
                &symbol.line,
                &symbol.column,
                &symbol.end_line,
                &symbol.end_column,
                &symbol.signature,
                &symbol.return_type,
                &visibility_to_str(symbol.visibility),
                &symbol.namespace,
                &symbol.parent_symbol_id,
                &symbol.is_exported,
                &symbol.is_async,
                &symbol.is_abstract,
                &symbol.is_definition,
                &semantic_tags,
                &(symbol.confidence as f64),
                &language_features,
                &symbol.duplicate_of,
            ],
        )?;

        self.conn
            .query_row(
                "SELECT id FROM universal_symbols
                 WHERE project_id = ?1 AND file_path = ?2 AND qualified_name = ?3 AND line = ?4",
                params![symbol.project_id, symbol.file_path, symbol.qualified_name, symbol.line],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn update_symbol_parent(&self, symbol_id: i64, parent_symbol_id: Option<i64>) -> Result<()> {
        self.conn.execute(
            "UPDATE universal_symbols SET parent_symbol_id = ?1 WHERE id = ?2",
            params![parent_symbol_id, symbol_id],
        )?;
        Ok(())
    }

    pub fn mark_duplicate(&self, symbol_id: i64, canonical_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE universal_symbols SET duplicate_of = ?1 WHERE id = ?2",
            params![canonical_id, symbol_id],
        )?;
        Ok(())
    }

    /// Out-of-line C++ member definitions (flagged by the harness with the
    /// `out_of_line_definition` semantic tag) that Pass 1 left unparented
    /// because their in-class declaration lives in a different file's batch.
    pub fn unparented_out_of_line_definitions(&self, project_id: i64) -> Result<Vec<UniversalSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM universal_symbols
             WHERE project_id = ?1 AND parent_symbol_id IS NULL
               AND semantic_tags LIKE '%out_of_line_definition%'",
        )?;
        let rows = stmt
            .query_map(params![project_id], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Appends `orphan_definition` to a symbol's `semantic_tags`, marking an
    /// out-of-line definition whose in-class declaration could not be found
    /// anywhere in the project (Pass 2, invariant (b)).
    pub fn flag_orphan_definition(&self, symbol_id: i64) -> Result<()> {
        if let Some(mut symbol) = self.find_symbol_by_id(symbol_id)? {
            if !symbol.semantic_tags.iter().any(|t| t == "orphan_definition") {
                symbol.semantic_tags.push("orphan_definition".to_string());
                let tags = serde_json::to_string(&symbol.semantic_tags)?;
                self.conn.execute(
                    "UPDATE universal_symbols SET semantic_tags = ?1 WHERE id = ?2",
                    params![tags, symbol_id],
                )?;
            }
        }
        Ok(())
    }

    pub fn find_symbol_by_id(&self, id: i64) -> Result<Option<UniversalSymbol>> {
        self.conn
            .query_row(
                "SELECT * FROM universal_symbols WHERE id = ?1",
                params![id],
                row_to_symbol,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn find_symbols_by_qualified_name(
        &self,
        project_id: i64,
        qualified_name: &str,
    ) -> Result<Vec<UniversalSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM universal_symbols WHERE project_id = ?1 AND qualified_name = ?2",
        )?;
        let rows = stmt
            .query_map(params![project_id, qualified_name], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_symbols_by_name(&self, project_id: i64, name: &str) -> Result<Vec<UniversalSymbol>> {
        let mut stmt =
            self.conn.prepare("SELECT * FROM universal_symbols WHERE project_id = ?1 AND name = ?2")?;
        let rows = stmt
            .query_map(params![project_id, name], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_symbols_in_file(&self, project_id: i64, file_path: &str) -> Result<Vec<UniversalSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM universal_symbols WHERE project_id = ?1 AND file_path = ?2 ORDER BY line",
        )?;
        let rows = stmt
            .query_map(params![project_id, file_path], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_symbols_in_namespace(
        &self,
        project_id: i64,
        namespace: &str,
    ) -> Result<Vec<UniversalSymbol>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM universal_symbols WHERE project_id = ?1 AND namespace = ?2")?;
        let rows = stmt
            .query_map(params![project_id, namespace], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_or_create_external_service(
        &self,
        project_id: i64,
        service_name: &str,
        protocol: &str,
    ) -> Result<UniversalSymbol> {
        let existing = self.find_symbols_by_qualified_name(project_id, service_name)?;
        if let Some(service) = existing.into_iter().find(|s| s.kind == SymbolKind::Service) {
            return Ok(service);
        }

        let language = self.ensure_language(Language::Unknown)?;
        let mut symbol = UniversalSymbol::new(
            project_id,
            language.id.unwrap_or(0),
            service_name,
            service_name,
            SymbolKind::Service,
            "<external>",
            0,
            0,
        );
        symbol.visibility = Visibility::Public;
        symbol.language_features = serde_json::json!({ "protocol": protocol });

        let mut batcher = self.batcher();
        let id = self.insert_symbol(&mut batcher, &symbol)?;
        batcher.flush()?;
        symbol.id = Some(id);
        Ok(symbol)
    }

    // ---- Relationships ------------------------------------------------------

    pub fn insert_relationship(
        &self,
        batcher: &mut TransactionBatcher<'_>,
        rel: &UniversalRelationship,
    ) -> Result<i64> {
        let metadata = rel.metadata.to_string();
        batcher.execute(
            "INSERT INTO universal_relationships
                (project_id, from_symbol_id, to_symbol_id, from_name, to_name,
                 relationship_type, confidence, context_line, context_snippet, metadata, cross_language)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            &[
                &rel.project_id,
                &rel.from_symbol_id,
                &rel.to_symbol_id,
                &rel.from_name,
                &rel.to_name,
                &edge_type_to_str(rel.relationship_type),
                &(rel.confidence as f64),
                &rel.context_line,
                &rel.context_snippet,
                &metadata,
                &rel.cross_language,
            ],
        )
    }

    pub fn set_relationship_target(&self, relationship_id: i64, to_symbol_id: Option<i64>) -> Result<()> {
        self.conn.execute(
            "UPDATE universal_relationships SET to_symbol_id = ?1 WHERE id = ?2",
            params![to_symbol_id, relationship_id],
        )?;
        Ok(())
    }

    pub fn unresolved_relationships(&self, project_id: i64) -> Result<Vec<UniversalRelationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM universal_relationships
             WHERE project_id = ?1 AND to_symbol_id IS NULL AND cross_language = 0",
        )?;
        let rows = stmt
            .query_map(params![project_id], row_to_relationship)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn cross_language_relationships(&self, project_id: i64) -> Result<Vec<UniversalRelationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM universal_relationships WHERE project_id = ?1 AND cross_language = 1",
        )?;
        let rows = stmt
            .query_map(params![project_id], row_to_relationship)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn all_relationships(&self, project_id: i64) -> Result<Vec<UniversalRelationship>> {
        let mut stmt =
            self.conn.prepare("SELECT * FROM universal_relationships WHERE project_id = ?1")?;
        let rows = stmt
            .query_map(params![project_id], row_to_relationship)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn symbol_count(&self, project_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM universal_symbols WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn relationship_count(&self, project_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM universal_relationships WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Simple full-text search over name/qualified_name/signature.
    pub fn search_symbols(&self, project_id: i64, query: &str, limit: usize) -> Result<Vec<UniversalSymbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.* FROM universal_symbols s
             JOIN universal_symbols_fts fts ON s.id = fts.rowid
             WHERE s.project_id = ?1 AND universal_symbols_fts MATCH ?2
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![project_id, query, limit as i64], row_to_symbol)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_file_record(row: &Row) -> rusqlite::Result<FileRecord> {
    let status: String = row.get(8)?;
    Ok(FileRecord {
        id: Some(row.get(0)?),
        project_id: row.get(1)?,
        language_id: row.get(2)?,
        relative_path: row.get(3)?,
        content_hash: row.get(4)?,
        size: row.get::<_, i64>(5)? as u64,
        last_indexed_at: row.get(6)?,
        parser_used: row.get(7)?,
        status: str_to_status(&status),
        error_message: row.get(9)?,
    })
}

fn row_to_symbol(row: &Row) -> rusqlite::Result<UniversalSymbol> {
    let kind: String = row.get("kind")?;
    let visibility: String = row.get("visibility")?;
    let semantic_tags: String = row.get("semantic_tags")?;
    let language_features: String = row.get("language_features")?;

    Ok(UniversalSymbol {
        id: Some(row.get("id")?),
        project_id: row.get("project_id")?,
        language_id: row.get("language_id")?,
        name: row.get("name")?,
        qualified_name: row.get("qualified_name")?,
        kind: str_to_kind(&kind),
        file_path: row.get("file_path")?,
        line: row.get("line")?,
        column: row.get("column")?,
        end_line: row.get("end_line")?,
        end_column: row.get("end_column")?,
        signature: row.get("signature")?,
        return_type: row.get("return_type")?,
        visibility: str_to_visibility(&visibility),
        namespace: row.get("namespace")?,
        parent_scope: None,
        parent_symbol_id: row.get("parent_symbol_id")?,
        is_exported: row.get("is_exported")?,
        is_async: row.get("is_async")?,
        is_abstract: row.get("is_abstract")?,
        is_definition: row.get("is_definition")?,
        semantic_tags: serde_json::from_str(&semantic_tags).unwrap_or_default(),
        confidence: row.get::<_, f64>("confidence")? as f32,
        language_features: serde_json::from_str(&language_features).unwrap_or(serde_json::Value::Null),
        duplicate_of: row.get("duplicate_of")?,
    })
}

fn row_to_relationship(row: &Row) -> rusqlite::Result<UniversalRelationship> {
    let relationship_type: String = row.get("relationship_type")?;
    let metadata: String = row.get("metadata")?;

    Ok(UniversalRelationship {
        id: Some(row.get("id")?),
        project_id: row.get("project_id")?,
        from_symbol_id: row.get("from_symbol_id")?,
        to_symbol_id: row.get("to_symbol_id")?,
        from_name: row.get("from_name")?,
        to_name: row.get("to_name")?,
        relationship_type: str_to_edge_type(&relationship_type),
        confidence: row.get::<_, f64>("confidence")? as f32,
        context_line: row.get("context_line")?,
        context_snippet: row.get("context_snippet")?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        cross_language: row.get("cross_language")?,
    })
}

fn kind_to_str(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Module => "module",
        SymbolKind::Namespace => "namespace",
        SymbolKind::Class => "class",
        SymbolKind::Struct => "struct",
        SymbolKind::Interface => "interface",
        SymbolKind::Enum => "enum",
        SymbolKind::Function => "function",
        SymbolKind::Method => "method",
        SymbolKind::Constructor => "constructor",
        SymbolKind::Destructor => "destructor",
        SymbolKind::Field => "field",
        SymbolKind::Variable => "variable",
        SymbolKind::Parameter => "parameter",
        SymbolKind::TypeAlias => "type_alias",
        SymbolKind::Concept => "concept",
        SymbolKind::Macro => "macro",
        SymbolKind::Property => "property",
        SymbolKind::Lambda => "lambda",
        SymbolKind::Import => "import",
        SymbolKind::Export => "export",
        SymbolKind::Service => "service",
        SymbolKind::Other => "other",
    }
}

fn str_to_kind(s: &str) -> SymbolKind {
    match s {
        "module" => SymbolKind::Module,
        "namespace" => SymbolKind::Namespace,
        "class" => SymbolKind::Class,
        "struct" => SymbolKind::Struct,
        "interface" => SymbolKind::Interface,
        "enum" => SymbolKind::Enum,
        "function" => SymbolKind::Function,
        "method" => SymbolKind::Method,
        "constructor" => SymbolKind::Constructor,
        "destructor" => SymbolKind::Destructor,
        "field" => SymbolKind::Field,
        "variable" => SymbolKind::Variable,
        "parameter" => SymbolKind::Parameter,
        "type_alias" => SymbolKind::TypeAlias,
        "concept" => SymbolKind::Concept,
        "macro" => SymbolKind::Macro,
        "property" => SymbolKind::Property,
        "lambda" => SymbolKind::Lambda,
        "import" => SymbolKind::Import,
        "export" => SymbolKind::Export,
        "service" => SymbolKind::Service,
        _ => SymbolKind::Other,
    }
}

fn visibility_to_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "public",
        Visibility::Private => "private",
        Visibility::Protected => "protected",
        Visibility::Internal => "internal",
        Visibility::Default => "default",
    }
}

fn str_to_visibility(s: &str) -> Visibility {
    match s {
        "public" => Visibility::Public,
        "private" => Visibility::Private,
        "protected" => Visibility::Protected,
        "internal" => Visibility::Internal,
        _ => Visibility::Default,
    }
}

fn edge_type_to_str(t: EdgeType) -> &'static str {
    match t {
        EdgeType::Calls => "calls",
        EdgeType::Invokes => "invokes",
        EdgeType::Imports => "imports",
        EdgeType::Exports => "exports",
        EdgeType::Inherits => "inherits",
        EdgeType::Implements => "implements",
        EdgeType::Uses => "uses",
        EdgeType::Contains => "contains",
        EdgeType::Overrides => "overrides",
        EdgeType::Spawns => "spawns",
        EdgeType::Communicates => "communicates",
        EdgeType::BindsTo => "binds_to",
        EdgeType::Reads => "reads",
        EdgeType::Writes => "writes",
        EdgeType::References => "references",
    }
}

fn str_to_edge_type(s: &str) -> EdgeType {
    match s {
        "calls" => EdgeType::Calls,
        "invokes" => EdgeType::Invokes,
        "imports" => EdgeType::Imports,
        "exports" => EdgeType::Exports,
        "inherits" => EdgeType::Inherits,
        "implements" => EdgeType::Implements,
        "uses" => EdgeType::Uses,
        "contains" => EdgeType::Contains,
        "overrides" => EdgeType::Overrides,
        "spawns" => EdgeType::Spawns,
        "communicates" => EdgeType::Communicates,
        "binds_to" => EdgeType::BindsTo,
        "reads" => EdgeType::Reads,
        "writes" => EdgeType::Writes,
        _ => EdgeType::References,
    }
}

fn status_to_str(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Ok => "ok",
        FileStatus::Failed => "failed",
        FileStatus::Skipped => "skipped",
    }
}

fn str_to_status(s: &str) -> FileStatus {
    match s {
        "failed" => FileStatus::Failed,
        "skipped" => FileStatus::Skipped,
        _ => FileStatus::Ok,
    }
}
