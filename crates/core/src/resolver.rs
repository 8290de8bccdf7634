//! Symbol resolver (C4): Pass 1 interns a file's symbols and wires
//! parent/child containment by qualified name; Pass 2, run only after every
//! file's Pass 1 transaction has committed, resolves relationship endpoints
//! and materializes external services for cross-language edges. No
//! external shell-out: resolution works purely from the `ParseResult`s
//! already sitting in the store.

use protocol::{SymbolKind, UniversalRelationship, UniversalSymbol};
use rustc_hash::FxHashMap;
use store::{GraphStore, Result as StoreResult, TransactionBatcher};
use tracing::{debug, warn};

/// Outcome of interning one file's symbols: how many were written and how
/// many could not have their parent linked (ambiguous or missing scope).
pub struct InternOutcome {
    pub symbols_interned: usize,
    pub relationships_recorded: usize,
    pub orphaned_parents: usize,
}

/// A symbol's line range, used to enforce the parent/child forest invariant:
/// a parent's span must contain its child's before `parent_symbol_id` is
/// written, so two unrelated siblings that happen to share a simple name
/// can never be mis-parented into each other.
#[derive(Clone, Copy)]
struct Span {
    line: u32,
    end_line: Option<u32>,
}

impl Span {
    fn contains(&self, child: &Span) -> bool {
        let parent_end = self.end_line.unwrap_or(self.line);
        let child_end = child.end_line.unwrap_or(child.line);
        self.line <= child.line && parent_end >= child_end
    }
}

fn is_out_of_line_definition(symbol: &UniversalSymbol) -> bool {
    symbol
        .language_features
        .get("isOutOfLineDefinition")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Pass 1 for a single file. Must run inside the caller's per-file
/// transaction (the `batcher` passed in); qualified-name lookups are scoped
/// to this file's own symbol batch, matching the base algorithm's "second
/// scan over the same batch" description.
pub fn intern_file(
    store: &GraphStore,
    batcher: &mut TransactionBatcher<'_>,
    project_id: i64,
    parse_result: protocol::ParseResult,
) -> StoreResult<InternOutcome> {
    let mut qname_to_id: FxHashMap<String, i64> = FxHashMap::default();
    let mut name_to_ids: FxHashMap<String, Vec<i64>> = FxHashMap::default();
    let mut spans: FxHashMap<i64, Span> = FxHashMap::default();
    // Out-of-line C++ definitions (invariant (b)) skip ordinary parent-scope
    // linking entirely; they're linked to their in-class declaration by
    // qualified name in Pass 2, once every file's symbols are visible.
    let mut parent_scopes: Vec<(i64, String)> = Vec::new();

    for symbol in &parse_result.symbols {
        let id = store.insert_symbol(batcher, symbol)?;
        qname_to_id.insert(symbol.qualified_name.clone(), id);
        name_to_ids.entry(symbol.name.clone()).or_default().push(id);
        spans.insert(id, Span { line: symbol.line, end_line: symbol.end_line });
        if is_out_of_line_definition(symbol) {
            continue;
        }
        if let Some(parent_scope) = &symbol.parent_scope {
            parent_scopes.push((id, parent_scope.clone()));
        }
    }

    let mut orphaned_parents = 0;
    for (child_id, parent_scope) in &parent_scopes {
        let child_span = spans[child_id];
        let parent_id = qname_to_id
            .get(parent_scope)
            .copied()
            .filter(|pid| spans.get(pid).is_some_and(|s| s.contains(&child_span)))
            .or_else(|| {
                // Fall back to a simple-name match within this file's batch;
                // ambiguous matches (>1 candidate, after containment) are left unlinked.
                let simple = parent_scope.rsplit(['.', ':']).next().unwrap_or(parent_scope);
                let candidates: Vec<i64> = name_to_ids
                    .get(simple)
                    .into_iter()
                    .flatten()
                    .copied()
                    .filter(|pid| spans.get(pid).is_some_and(|s| s.contains(&child_span)))
                    .collect();
                match candidates.as_slice() {
                    [only] => Some(*only),
                    _ => None,
                }
            });
        match parent_id {
            Some(pid) if pid != *child_id => store.update_symbol_parent(*child_id, Some(pid))?,
            _ => {
                orphaned_parents += 1;
                warn!(parent_scope, "could not resolve parent scope for symbol");
            }
        }
    }

    let mut relationships_recorded = 0;
    for rel in &parse_result.relationships {
        let mut rel = rel.clone();
        if rel.from_symbol_id.is_none() {
            rel.from_symbol_id = qname_to_id.get(&rel.from_name).copied();
        }
        store.insert_relationship(batcher, &rel)?;
        relationships_recorded += 1;
    }

    debug!(
        symbols = parse_result.symbols.len(),
        relationships = relationships_recorded,
        orphaned_parents,
        "interned file"
    );

    Ok(InternOutcome {
        symbols_interned: parse_result.symbols.len(),
        relationships_recorded,
        orphaned_parents,
    })
}

/// Outcome of Pass 2, aggregated across the whole project for the final
/// `IndexResult`.
#[derive(Default)]
pub struct ResolveOutcome {
    pub resolved: usize,
    pub unresolved: usize,
    pub external_services_created: usize,
    pub out_of_line_definitions_linked: usize,
    pub orphan_definitions_flagged: usize,
}

/// Pass 2: resolve every relationship whose `to_symbol_id` is still null.
/// Must run only after all per-file Pass 1 transactions have committed —
/// the ordering guarantee that lets cross-file resolution see every file's
/// symbols at once.
pub fn resolve_pass2(store: &GraphStore, project_id: i64) -> StoreResult<ResolveOutcome> {
    let mut outcome = ResolveOutcome::default();

    link_out_of_line_definitions(store, project_id, &mut outcome)?;

    let cross_language = store.cross_language_relationships(project_id)?;
    for rel in cross_language.into_iter().filter(|r| r.to_symbol_id.is_none()) {
        resolve_cross_language(store, project_id, &rel, &mut outcome)?;
    }

    let unresolved = store.unresolved_relationships(project_id)?;
    for rel in unresolved {
        match resolve_in_tree(store, project_id, &rel)? {
            Some(target_id) => {
                let canonical = canonicalize(store, target_id)?;
                store.set_relationship_target(rel.id.expect("persisted relationship has an id"), Some(canonical))?;
                outcome.resolved += 1;
            }
            None => outcome.unresolved += 1,
        }
    }

    Ok(outcome)
}

/// An edge resolving to a symbol that is itself `duplicate_of` some other
/// symbol is rewritten to point at the canonical id, so callers never chase
/// the alias chain themselves.
fn canonicalize(store: &GraphStore, symbol_id: i64) -> StoreResult<i64> {
    match store.find_symbol_by_id(symbol_id)? {
        Some(symbol) if symbol.duplicate_of.is_some() => Ok(symbol.duplicate_of.unwrap()),
        _ => Ok(symbol_id),
    }
}

/// Invariant (b): an out-of-line C++ member definition links to the
/// in-class declaration of the same qualified name. Runs in Pass 2 because
/// the declaration may live in a header file interned by a different Pass 1
/// transaction; an unmatched definition is kept but flagged, not dropped.
fn link_out_of_line_definitions(store: &GraphStore, project_id: i64, outcome: &mut ResolveOutcome) -> StoreResult<()> {
    for definition in store.unparented_out_of_line_definitions(project_id)? {
        let definition_id = definition.id.expect("persisted symbol has an id");
        let declaration = store
            .find_symbols_by_qualified_name(project_id, &definition.qualified_name)?
            .into_iter()
            .find(|s| s.id != definition.id && !s.is_definition);

        match declaration.and_then(|d| d.parent_symbol_id) {
            Some(parent_id) => {
                store.update_symbol_parent(definition_id, Some(parent_id))?;
                outcome.out_of_line_definitions_linked += 1;
            }
            None => {
                store.flag_orphan_definition(definition_id)?;
                outcome.orphan_definitions_flagged += 1;
            }
        }
    }
    Ok(())
}

fn resolve_cross_language(
    store: &GraphStore,
    project_id: i64,
    rel: &UniversalRelationship,
    outcome: &mut ResolveOutcome,
) -> StoreResult<()> {
    let protocol = rel
        .metadata
        .get("protocol")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let service = store.get_or_create_external_service(project_id, &rel.to_name, protocol)?;
    if service.id.is_some() {
        store.set_relationship_target(rel.id.expect("persisted relationship has an id"), service.id)?;
        outcome.external_services_created += 1;
    }
    Ok(())
}

/// Exact qualified name, then qualified name within the same namespace
/// path, then simple name within the same file, then simple name
/// project-wide iff unique — per the base algorithm's ordered fallback.
fn resolve_in_tree(store: &GraphStore, project_id: i64, rel: &UniversalRelationship) -> StoreResult<Option<i64>> {
    let from_file = match rel.from_symbol_id {
        Some(id) => store.find_symbol_by_id(id)?.map(|s| s.file_path),
        None => None,
    };

    let exact = store.find_symbols_by_qualified_name(project_id, &rel.to_name)?;
    if !exact.is_empty() {
        return Ok(pick_best(&exact, from_file.as_deref()));
    }

    let simple_name = rel.to_name.rsplit(['.', ':']).next().unwrap_or(&rel.to_name);
    let by_name = store.find_symbols_by_name(project_id, simple_name)?;
    if by_name.is_empty() {
        return Ok(None);
    }

    if let Some(file) = &from_file {
        let same_file: Vec<UniversalSymbol> = by_name.iter().filter(|s| &s.file_path == file).cloned().collect();
        if !same_file.is_empty() {
            return Ok(pick_best(&same_file, Some(file)));
        }
    }

    if by_name.len() == 1 {
        return Ok(by_name[0].id);
    }

    Ok(None)
}

/// Ranks candidates by: same file, then same directory, then
/// `is_definition=true`, then lowest line number — the tie-break order
/// specified for Pass 2.
fn pick_best(candidates: &[UniversalSymbol], from_file: Option<&str>) -> Option<i64> {
    let from_dir = from_file.and_then(|f| f.rfind('/').map(|i| &f[..i]));

    candidates
        .iter()
        .min_by_key(|s| {
            let same_file = from_file.map(|f| s.file_path != f).unwrap_or(true) as u8;
            let dir = s.file_path.rfind('/').map(|i| &s.file_path[..i]);
            let same_dir = (from_dir != dir) as u8;
            let not_definition = !s.is_definition as u8;
            (same_file, same_dir, not_definition, s.line)
        })
        .and_then(|s| s.id)
}

/// Container kinds that may be linked as a symbol's `parent_symbol_id`,
/// mirroring `SymbolKind::is_container` — used by callers validating the
/// parent/child forest invariant before writing a link outside this module
/// (e.g. deduplication reparenting).
pub fn is_valid_parent(kind: SymbolKind) -> bool {
    kind.is_container()
}
