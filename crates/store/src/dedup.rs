//! Deduplication (C6): a bloom-filter prefilter over symbol identity hashes,
//! backed by an exact similarity check for anything the filter can't rule
//! out, per the data model's `duplicate_of` / `SimilarSymbol` split.

use protocol::UniversalSymbol;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const DEFAULT_HIGH_CONFIDENCE: f32 = 0.95;
pub const DEFAULT_MEDIUM_CONFIDENCE: f32 = 0.7;
const MAX_LOAD_FACTOR: f64 = 0.8;

/// The `{normalized_name_hash, signature_hash, container_hash}` triple a
/// symbol is keyed by for bloom-filter membership. Hashed with the
/// standard-library hasher: this is a prefilter, not an identity, so
/// cryptographic strength buys nothing here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub name_hash: u64,
    pub signature_hash: u64,
    pub container_hash: u64,
}

impl SymbolKey {
    pub fn for_symbol(symbol: &UniversalSymbol) -> Self {
        let normalized_name = symbol.name.to_lowercase();
        let signature_shape = signature_shape(symbol.signature.as_deref().unwrap_or(""));
        let container = symbol.namespace.clone().unwrap_or_default();

        SymbolKey {
            name_hash: hash_str(&normalized_name),
            signature_hash: hash_str(&signature_shape),
            container_hash: hash_str(&container),
        }
    }

    fn combined(&self) -> u64 {
        self.name_hash ^ self.signature_hash.rotate_left(21) ^ self.container_hash.rotate_left(42)
    }
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Parameter count plus a coarse, erased-type token list, used as the
/// "signature shape" half of the similarity score so that two declarations
/// differing only in parameter *names* still compare as identical shape.
fn signature_shape(signature: &str) -> String {
    let params = signature
        .split(|c| c == '(' || c == ')')
        .nth(1)
        .unwrap_or("");
    let count = if params.trim().is_empty() {
        0
    } else {
        params.split(',').count()
    };
    let erased_types: Vec<&str> = params
        .split(',')
        .filter_map(|p| p.split(':').nth(1).map(str::trim))
        .collect();
    format!("{}:{}", count, erased_types.join(","))
}

/// A bloom filter over `SymbolKey`s, sized for a false-positive budget and
/// auto-resizing when its load factor crosses 80%.
pub struct SymbolBloomFilter {
    bits: Vec<bool>,
    num_hashes: u32,
    inserted: usize,
    capacity_hint: usize,
    false_positive_rate: f64,
}

impl SymbolBloomFilter {
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let (num_bits, num_hashes) = optimal_params(expected_items.max(1), false_positive_rate);
        Self {
            bits: vec![false; num_bits],
            num_hashes,
            inserted: 0,
            capacity_hint: expected_items.max(1),
            false_positive_rate,
        }
    }

    pub fn insert(&mut self, key: &SymbolKey) {
        self.maybe_resize();
        for i in 0..self.num_hashes {
            let idx = self.bit_index(key, i);
            self.bits[idx] = true;
        }
        self.inserted += 1;
    }

    pub fn might_contain(&self, key: &SymbolKey) -> bool {
        (0..self.num_hashes).all(|i| self.bits[self.bit_index(key, i)])
    }

    fn bit_index(&self, key: &SymbolKey, seed: u32) -> usize {
        let combined = key.combined().wrapping_add(seed as u64 * 0x9E3779B97F4A7C15);
        (combined as usize) % self.bits.len()
    }

    fn load_factor(&self) -> f64 {
        self.inserted as f64 / self.capacity_hint as f64
    }

    fn maybe_resize(&mut self) {
        if self.load_factor() < MAX_LOAD_FACTOR {
            return;
        }
        // Filters don't support removal, so resizing means rebuilding empty
        // at double capacity; callers repopulate via `insert` on the next pass.
        self.capacity_hint *= 2;
        let (num_bits, num_hashes) = optimal_params(self.capacity_hint, self.false_positive_rate);
        self.bits = vec![false; num_bits];
        self.num_hashes = num_hashes;
        self.inserted = 0;
    }
}

fn optimal_params(expected_items: usize, false_positive_rate: f64) -> (usize, u32) {
    let n = expected_items as f64;
    let p = false_positive_rate.clamp(0.0001, 0.5);
    let m = (-(n * p.ln()) / (std::f64::consts::LN_2.powi(2))).ceil().max(64.0);
    let k = ((m / n) * std::f64::consts::LN_2).round().clamp(1.0, 16.0);
    (m as usize, k as u32)
}

/// Pluggable similarity function, per the external "similarity oracle"
/// interface — the core ships only `LexicalSimilarity` but a
/// learned/embeddings-based implementation can be swapped in without
/// touching the dedup control flow.
pub trait SimilarityOracle: Send + Sync {
    fn similarity(&self, a: &UniversalSymbol, b: &UniversalSymbol) -> f32;
}

/// Built-in similarity: normalized-name Levenshtein + signature shape +
/// container path equality, combined into one score in `[0, 1]`.
pub struct LexicalSimilarity;

impl SimilarityOracle for LexicalSimilarity {
    fn similarity(&self, a: &UniversalSymbol, b: &UniversalSymbol) -> f32 {
        let name_sim = name_similarity(&a.name, &b.name);
        let sig_sim = if signature_shape(a.signature.as_deref().unwrap_or(""))
            == signature_shape(b.signature.as_deref().unwrap_or(""))
        {
            1.0
        } else {
            0.0
        };
        let container_sim = if a.namespace == b.namespace { 1.0 } else { 0.0 };

        0.5 * name_sim + 0.3 * sig_sim + 0.2 * container_sim
    }
}

fn name_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    let distance = levenshtein(&a, &b) as f32;
    let max_len = a.chars().count().max(b.chars().count()).max(1) as f32;
    (1.0 - distance / max_len).max(0.0)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut row: Vec<usize> = (0..=m).collect();

    for i in 1..=n {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=m {
            let up = row[j];
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            row[j] = (row[j - 1] + 1).min(up + 1).min(prev_diag + cost);
            prev_diag = up;
        }
    }
    row[m]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    Distinct,
    /// Score ≥ high_confidence: new symbol becomes a weak alias.
    Duplicate,
    /// Score in `[medium_confidence, high_confidence)`: a `SimilarSymbol`
    /// relationship is recorded instead of collapsing the symbol.
    Similar,
}

pub fn classify(score: f32) -> DedupVerdict {
    if score >= DEFAULT_HIGH_CONFIDENCE {
        DedupVerdict::Duplicate
    } else if score >= DEFAULT_MEDIUM_CONFIDENCE {
        DedupVerdict::Similar
    } else {
        DedupVerdict::Distinct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::SymbolKind;

    fn sym(name: &str, sig: &str, ns: Option<&str>) -> UniversalSymbol {
        let mut s = UniversalSymbol::new(1, 1, name, name, SymbolKind::Function, "a.rs", 1, 0);
        s.signature = Some(sig.to_string());
        s.namespace = ns.map(str::to_string);
        s
    }

    #[test]
    fn bloom_filter_never_false_negatives() {
        let mut filter = SymbolBloomFilter::new(100, 0.01);
        let key = SymbolKey::for_symbol(&sym("helper", "fn helper(x: i32)", None));
        filter.insert(&key);
        assert!(filter.might_contain(&key));
    }

    #[test]
    fn identical_signature_symbols_classify_as_duplicate() {
        let a = sym("helper", "fn helper(x: i32)", None);
        let b = sym("helper", "fn helper(x: i32)", None);
        let score = LexicalSimilarity.similarity(&a, &b);
        assert_eq!(classify(score), DedupVerdict::Duplicate);
    }

    #[test]
    fn similar_but_not_identical_names_are_similar_not_duplicate() {
        let a = sym("parseRequest", "fn parseRequest(req: Request)", Some("http"));
        let b = sym("parseRequests", "fn parseRequests(req: Request)", Some("http"));
        let score = LexicalSimilarity.similarity(&a, &b);
        assert_ne!(classify(score), DedupVerdict::Distinct);
    }

    #[test]
    fn unrelated_symbols_are_distinct() {
        let a = sym("helper", "fn helper(x: i32)", None);
        let b = sym("completelyDifferentThing", "fn completelyDifferentThing(y: String, z: bool)", Some("widgets"));
        let score = LexicalSimilarity.similarity(&a, &b);
        assert_eq!(classify(score), DedupVerdict::Distinct);
    }
}
