//! Incremental orchestrator (C7): drives one indexing pass end to end.
//! Ensures the project/languages exist, discovers changed files, runs C2 +
//! C3 + C4-pass-1 per file in parallel up to `max_concurrent_files` with a
//! single writer thread serializing commits, runs C4-pass-2 once over the
//! whole project, then a C6 dedup sweep over the files this run touched.
//! Change detection is content-hash based; nothing here depends on git.

use crate::adapters::{self, LanguageAdapter, ParseOutcome};
use crate::config::Config;
use crate::discovery::{self, Discovery, FileCandidate};
use crate::error::IndexError;
use crate::resolver;
use protocol::{
    EdgeType, FileRecord, FileStatus, Language, ParseMethod, ParseResult, SymbolKind,
    UniversalRelationship, UniversalSymbol,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use store::dedup::{classify, DedupVerdict, LexicalSimilarity, SimilarityOracle, SymbolBloomFilter, SymbolKey};
use store::{GraphStore, Result as StoreResult};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IndexErrorEntry {
    pub file: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IndexResult {
    pub files_indexed: usize,
    pub symbols_found: usize,
    pub relationships_found: usize,
    pub errors: Vec<IndexErrorEntry>,
    pub duration_ms: u64,
    pub cancelled: bool,
}

/// Runs one indexing pass. `force` expands step 3 to wipe every symbol and
/// relationship the project already owns before reparsing everything.
pub fn run(
    store: &GraphStore,
    config: &Config,
    project_name: &str,
    project_root: &Path,
    languages: &[Language],
    force: bool,
    cancel: Arc<AtomicBool>,
) -> StoreResult<IndexResult> {
    let started = Instant::now();
    let now = now_unix();

    let project = store.get_or_create_project(project_name, &project_root.to_string_lossy(), now)?;
    let project_id = project.id.expect("persisted project has an id");

    let mut language_ids: FxHashMap<Language, i64> = FxHashMap::default();
    for lang in languages {
        let info = store.ensure_language(*lang)?;
        language_ids.insert(*lang, info.id.expect("persisted language has an id"));
    }

    if force {
        store.clear_project_data(project_id)?;
    }

    let discovery = Discovery::new(project_root.to_path_buf(), languages.to_vec(), config.max_file_size);
    let discovered = discovery.discover();

    let known: Vec<(String, String)> = if force {
        Vec::new()
    } else {
        store
            .all_file_records(project_id)?
            .into_iter()
            .map(|r| (r.relative_path, r.content_hash))
            .collect()
    };
    let changes = discovery::filter_changed(&discovered.candidates, &known);

    let mut errors = Vec::new();
    for failure in discovered.failures {
        let language_id = *language_ids
            .get(&failure.language)
            .expect("discovery only yields failures for requested languages");
        let record = FileRecord {
            id: None,
            project_id,
            language_id,
            relative_path: failure.relative_path.clone(),
            content_hash: String::new(),
            size: 0,
            last_indexed_at: now,
            parser_used: "none".to_string(),
            status: FileStatus::Failed,
            error_message: Some(failure.error.to_string()),
        };
        if let Err(e) = store.upsert_file_record(&record) {
            warn!(path = %failure.relative_path, error = %e, "failed to record unreadable file");
        }
        errors.push(IndexErrorEntry {
            file: failure.relative_path,
            kind: failure.error.kind().to_string(),
            message: failure.error.to_string(),
        });
    }

    for path in &changes.to_delete {
        if let Err(e) = store.delete_file(project_id, path) {
            warn!(path, error = %e, "failed to remove deleted file's records");
            errors.push(IndexErrorEntry { file: path.clone(), kind: "store".to_string(), message: e.to_string() });
        }
    }

    let to_parse: Vec<FileCandidate> = changes.to_parse.into_iter().cloned().collect();
    let timeout = config.parser_file_timeout;
    let (tx, rx) = mpsc::sync_channel::<FileOutcome>(config.max_concurrent_files.max(1));

    let writer_result = std::thread::scope(|scope| {
        let writer = scope.spawn(|| drain_writer(rx, store, project_id));
        rayon::scope(|rayon_scope| {
            for candidate in &to_parse {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                let tx = tx.clone();
                let language_id = *language_ids
                    .get(&candidate.language)
                    .expect("discovery only yields candidates for requested languages");
                rayon_scope.spawn(move |_| {
                    let outcome = process_file(candidate, project_id, language_id, timeout);
                    let _ = tx.send(outcome);
                });
            }
        });
        drop(tx);
        writer.join().expect("writer thread panicked")
    });
    errors.extend(writer_result.errors);

    let cancelled = cancel.load(Ordering::Relaxed);
    if !cancelled {
        let resolved = resolver::resolve_pass2(store, project_id)?;
        info!(
            resolved = resolved.resolved,
            unresolved = resolved.unresolved,
            external_services = resolved.external_services_created,
            "pass two complete"
        );

        let dedup = run_dedup_pass(store, project_id, &writer_result.touched_files)?;
        info!(duplicates = dedup.duplicates, similar = dedup.similar, "dedup sweep complete");
    }

    Ok(IndexResult {
        files_indexed: writer_result.files_indexed,
        symbols_found: writer_result.symbols_found,
        relationships_found: writer_result.relationships_found,
        errors,
        duration_ms: started.elapsed().as_millis() as u64,
        cancelled,
    })
}

struct FileOutcome {
    candidate: FileCandidate,
    language_id: i64,
    parse_result: ParseResult,
    status: FileStatus,
    index_error: Option<IndexError>,
}

/// Runs on a rayon worker: read, parse with a deadline, fall back to
/// pattern recovery on timeout/error, and tag any cross-language idioms
/// found in the raw source before handing the result to the writer.
fn process_file(candidate: &FileCandidate, project_id: i64, language_id: i64, timeout: Duration) -> FileOutcome {
    let content = match std::fs::read_to_string(&candidate.path) {
        Ok(c) => c,
        Err(e) => {
            return FileOutcome {
                candidate: candidate.clone(),
                language_id,
                parse_result: ParseResult::default(),
                status: FileStatus::Failed,
                index_error: Some(IndexError::FileIo { path: candidate.relative_path.clone(), message: e.to_string() }),
            };
        }
    };

    let adapter = match LanguageAdapter::for_language(candidate.language) {
        Ok(a) => a,
        Err(e) => {
            return FileOutcome {
                candidate: candidate.clone(),
                language_id,
                parse_result: ParseResult::default(),
                status: FileStatus::Failed,
                index_error: Some(IndexError::ParseError { path: candidate.relative_path.clone(), message: e.to_string() }),
            };
        }
    };

    match adapters::parse_with_timeout(adapter, project_id, language_id, candidate.relative_path.clone(), content.clone(), timeout) {
        Ok(mut parse_result) => {
            annotate_cross_language(&mut parse_result, &content, candidate.language, &candidate.relative_path, project_id);
            FileOutcome { candidate: candidate.clone(), language_id, parse_result, status: FileStatus::Ok, index_error: None }
        }
        Err(ParseOutcome::Timeout) => {
            let symbols = adapters::fallback::recover_symbols(candidate.language, project_id, language_id, &candidate.relative_path, &content);
            let mut parse_result = ParseResult { parse_method: Some(ParseMethod::PatternFallback), ..Default::default() };
            parse_result.symbols = symbols;
            FileOutcome {
                candidate: candidate.clone(),
                language_id,
                parse_result,
                status: FileStatus::Failed,
                index_error: Some(IndexError::ParseTimeout { path: candidate.relative_path.clone() }),
            }
        }
        Err(ParseOutcome::Error(message)) => {
            let symbols = adapters::fallback::recover_symbols(candidate.language, project_id, language_id, &candidate.relative_path, &content);
            let mut parse_result = ParseResult { parse_method: Some(ParseMethod::PatternFallback), ..Default::default() };
            parse_result.symbols = symbols;
            FileOutcome {
                candidate: candidate.clone(),
                language_id,
                parse_result,
                status: FileStatus::Failed,
                index_error: Some(IndexError::ParseError { path: candidate.relative_path.clone(), message }),
            }
        }
    }
}

/// Scans every line for a cross-language idiom and attributes each hit to
/// whichever function/method symbol lexically encloses that line, so the
/// detection becomes a relationship `intern_file` can resolve `from_symbol_id`
/// for in the same pass. Falls back to the file path itself for module-level
/// detections (e.g. a top-level env-var read).
fn annotate_cross_language(parse_result: &mut ParseResult, content: &str, language: Language, file_path: &str, project_id: i64) {
    for (idx, line) in content.lines().enumerate() {
        let line_number = idx as u32 + 1;
        if let Some(detection) = cross_lang::scan_line(language, line, line_number) {
            let from_name = enclosing_symbol_name(&parse_result.symbols, line_number, file_path);
            let mut rels = cross_lang::into_relationships(project_id, &from_name, vec![detection]);
            parse_result.relationships.append(&mut rels);
        }
    }
}

fn enclosing_symbol_name(symbols: &[UniversalSymbol], line: u32, file_path: &str) -> String {
    symbols
        .iter()
        .filter(|s| matches!(s.kind, SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor) && s.line <= line)
        .max_by_key(|s| s.line)
        .map(|s| s.qualified_name.clone())
        .unwrap_or_else(|| file_path.to_string())
}

struct WriterOutcome {
    files_indexed: usize,
    symbols_found: usize,
    relationships_found: usize,
    errors: Vec<IndexErrorEntry>,
    touched_files: Vec<String>,
}

/// The single writer: every file's delete-then-reinsert runs inside one
/// per-file transaction via `intern_file`'s batcher, so symbols/relationships
/// of file A and file B never interleave within a commit, only across them.
fn drain_writer(rx: mpsc::Receiver<FileOutcome>, store: &GraphStore, project_id: i64) -> WriterOutcome {
    let mut outcome = WriterOutcome {
        files_indexed: 0,
        symbols_found: 0,
        relationships_found: 0,
        errors: Vec::new(),
        touched_files: Vec::new(),
    };

    for file_outcome in rx {
        let FileOutcome { candidate, language_id, parse_result, status, index_error } = file_outcome;

        if let Err(e) = store.delete_file(project_id, &candidate.relative_path) {
            warn!(path = %candidate.relative_path, error = %e, "failed to clear prior records before reindex");
            outcome.errors.push(IndexErrorEntry { file: candidate.relative_path.clone(), kind: "store".to_string(), message: e.to_string() });
            continue;
        }

        let parser_used = match parse_result.parse_method {
            Some(ParseMethod::TreeSitter) => "tree-sitter",
            Some(ParseMethod::PatternFallback) => "pattern-fallback",
            None => "none",
        };

        let mut batcher = store.batcher();
        let intern_result = resolver::intern_file(store, &mut batcher, project_id, parse_result);
        if let Err(e) = batcher.flush() {
            warn!(path = %candidate.relative_path, error = %e, "failed to commit file batch");
            outcome.errors.push(IndexErrorEntry { file: candidate.relative_path.clone(), kind: "store".to_string(), message: e.to_string() });
            continue;
        }
        match intern_result {
            Ok(interned) => {
                outcome.symbols_found += interned.symbols_interned;
                outcome.relationships_found += interned.relationships_recorded;
            }
            Err(e) => {
                outcome.errors.push(IndexErrorEntry { file: candidate.relative_path.clone(), kind: "store".to_string(), message: e.to_string() });
                continue;
            }
        }

        let record = FileRecord {
            id: None,
            project_id,
            language_id,
            relative_path: candidate.relative_path.clone(),
            content_hash: candidate.content_hash.clone(),
            size: candidate.size,
            last_indexed_at: now_unix(),
            parser_used: parser_used.to_string(),
            status,
            error_message: index_error.as_ref().map(|e| e.to_string()),
        };
        if let Err(e) = store.upsert_file_record(&record) {
            warn!(path = %candidate.relative_path, error = %e, "failed to update file record");
            outcome.errors.push(IndexErrorEntry { file: candidate.relative_path.clone(), kind: "store".to_string(), message: e.to_string() });
            continue;
        }

        if let Some(err) = &index_error {
            outcome.errors.push(IndexErrorEntry {
                file: candidate.relative_path.clone(),
                kind: err.kind().to_string(),
                message: err.to_string(),
            });
        }

        outcome.files_indexed += 1;
        outcome.touched_files.push(candidate.relative_path.clone());
        debug!(path = %candidate.relative_path, "indexed file");
    }

    outcome
}

struct DedupOutcome {
    duplicates: usize,
    similar: usize,
}

/// Bloom-prefiltered pass over the files this run touched: any symbol whose
/// key the filter has already seen is exact-checked against every
/// same-project symbol sharing its simple name, per C6's two-step mechanism.
fn run_dedup_pass(store: &GraphStore, project_id: i64, touched_files: &[String]) -> StoreResult<DedupOutcome> {
    let mut filter = SymbolBloomFilter::new((touched_files.len() * 8).max(64), 0.01);
    let oracle = LexicalSimilarity;
    let mut outcome = DedupOutcome { duplicates: 0, similar: 0 };

    for file in touched_files {
        for symbol in store.find_symbols_in_file(project_id, file)? {
            if symbol.duplicate_of.is_some() {
                continue;
            }
            let key = SymbolKey::for_symbol(&symbol);
            if filter.might_contain(&key) {
                for candidate in store.find_symbols_by_name(project_id, &symbol.name)? {
                    if candidate.id == symbol.id || candidate.duplicate_of.is_some() {
                        continue;
                    }
                    let score = oracle.similarity(&symbol, &candidate);
                    match classify(score) {
                        DedupVerdict::Duplicate => {
                            if let (Some(sid), Some(cid)) = (symbol.id, candidate.id) {
                                let (dup, canon) = if sid > cid { (sid, cid) } else { (cid, sid) };
                                store.mark_duplicate(dup, canon)?;
                                outcome.duplicates += 1;
                            }
                        }
                        DedupVerdict::Similar => {
                            let mut batcher = store.batcher();
                            let mut rel = UniversalRelationship::new(
                                project_id,
                                symbol.qualified_name.clone(),
                                candidate.qualified_name.clone(),
                                EdgeType::References,
                            );
                            rel.from_symbol_id = symbol.id;
                            rel.to_symbol_id = candidate.id;
                            rel.confidence = score;
                            rel.metadata = serde_json::json!({ "similarityType": "semantic_duplicate" });
                            store.insert_relationship(&mut batcher, &rel)?;
                            batcher.flush()?;
                            outcome.similar += 1;
                        }
                        DedupVerdict::Distinct => {}
                    }
                }
            }
            filter.insert(&key);
        }
    }

    Ok(outcome)
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, GraphStore) {
        let dir = tempdir().unwrap();
        let store = GraphStore::open(&dir.path().join("graph.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn first_run_indexes_all_discovered_files() {
        let (_db_dir, db) = store();
        let project_dir = tempdir().unwrap();
        fs::write(project_dir.path().join("lib.rs"), "pub fn helper() {}\npub fn caller() { helper(); }\n").unwrap();

        let config = Config::default();
        let result = run(
            &db,
            &config,
            "demo",
            project_dir.path(),
            &[Language::Rust],
            false,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(result.files_indexed, 1);
        assert!(result.symbols_found >= 2);
        assert!(!result.cancelled);
    }

    #[test]
    fn unchanged_file_is_skipped_on_second_run() {
        let (_db_dir, db) = store();
        let project_dir = tempdir().unwrap();
        fs::write(project_dir.path().join("lib.rs"), "pub fn helper() {}\n").unwrap();
        let config = Config::default();

        run(&db, &config, "demo", project_dir.path(), &[Language::Rust], false, Arc::new(AtomicBool::new(false))).unwrap();
        let second = run(&db, &config, "demo", project_dir.path(), &[Language::Rust], false, Arc::new(AtomicBool::new(false))).unwrap();

        assert_eq!(second.files_indexed, 0);
    }

    #[test]
    fn deleted_file_removes_its_symbols_on_next_run() {
        let (_db_dir, db) = store();
        let project_dir = tempdir().unwrap();
        let file_path = project_dir.path().join("gone.rs");
        fs::write(&file_path, "pub fn vanishing() {}\n").unwrap();
        let config = Config::default();

        run(&db, &config, "demo", project_dir.path(), &[Language::Rust], false, Arc::new(AtomicBool::new(false))).unwrap();
        fs::remove_file(&file_path).unwrap();
        run(&db, &config, "demo", project_dir.path(), &[Language::Rust], false, Arc::new(AtomicBool::new(false))).unwrap();

        let project = db.find_project_by_name("demo").unwrap().unwrap();
        let remaining = db.find_symbols_by_name(project.id.unwrap(), "vanishing").unwrap();
        assert!(remaining.is_empty());
    }
}
