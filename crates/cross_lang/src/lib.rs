//! Cross-language service communication detection.
//!
//! Recognizes gRPC client construction, raw transport dials, HTTP calls,
//! subprocess spawns, and environment-variable service discovery, the way a
//! human reading unrelated codebases side by side would: by idiom, not by
//! type information. Runs twice per file — once per source line (a cheap
//! regex prefilter) and once per function body (AST context for argument
//! extraction) — mirroring how the harnesses themselves walk the tree.

use once_cell::sync::Lazy;
use protocol::{EdgeType, Language, UniversalRelationship};
use regex::Regex;
use serde_json::json;
use tree_sitter::Node;

/// Minimum confidence a detection must carry to be handed to the orchestrator.
pub const MIN_CONFIDENCE: f32 = 0.5;

/// One recognized cross-language interaction, prior to being turned into a
/// `UniversalRelationship`. Kept separate from the relationship type so a
/// caller can inspect `target_language`/`target_endpoint` without round
/// tripping through `serde_json::Value` metadata.
#[derive(Debug, Clone)]
pub struct Detection {
    pub edge_type: EdgeType,
    pub to_name: String,
    pub confidence: f32,
    pub line: u32,
    pub target_language: Option<Language>,
    pub target_endpoint: Option<String>,
    pub metadata: serde_json::Value,
}

impl Detection {
    fn into_relationship(self, project_id: i64, from_name: &str) -> UniversalRelationship {
        let mut rel = UniversalRelationship::new(project_id, from_name, self.to_name, self.edge_type);
        rel.confidence = self.confidence;
        rel.context_line = Some(self.line);
        rel.metadata = self.metadata;
        rel.cross_language = true;
        rel
    }
}

/// Scans one source line for a cross-language idiom. Cheap by construction
/// (a handful of precompiled regexes) so it can run over every line of every
/// file without the cost of a second AST pass.
pub fn scan_line(language: Language, line: &str, line_number: u32) -> Option<Detection> {
    grpc_client_construction(language, line, line_number)
        .or_else(|| grpc_dial(line, line_number))
        .or_else(|| http_client_call(language, line, line_number))
        .or_else(|| subprocess_spawn(language, line, line_number))
        .or_else(|| env_service_discovery(line, line_number))
        .filter(|d| d.confidence >= MIN_CONFIDENCE)
}

/// Scans a function body's AST for the richer patterns that a single line
/// can't resolve alone: connection-flow tracking, where an env-var read
/// feeds a field which later feeds a client constructor within the same
/// function. `source` is the full file text the node's byte ranges index
/// into.
pub fn scan_function_body(node: Node, source: &str, language: Language) -> Vec<Detection> {
    let mut flow = ConnectionFlow::default();
    walk_for_flow(node, source, language, &mut flow);
    flow.resolve()
}

/// Turns raw detections into persisted relationships, keyed to the calling
/// symbol's qualified name.
pub fn into_relationships(project_id: i64, from_name: &str, detections: Vec<Detection>) -> Vec<UniversalRelationship> {
    detections.into_iter().map(|d| d.into_relationship(project_id, from_name)).collect()
}

// ---------------------------------------------------------------------
// 1. gRPC client construction
// ---------------------------------------------------------------------

static GO_GRPC_CLIENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"New([A-Z][A-Za-z0-9]*)Client\s*\(").unwrap());
static PY_GRPC_STUB: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z][A-Za-z0-9]*)Stub\s*\(").unwrap());
static TS_GRPC_CLIENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"new\s+([A-Z][A-Za-z0-9]*)Client\s*\(").unwrap());

fn grpc_client_construction(language: Language, line: &str, line_number: u32) -> Option<Detection> {
    let captured = match language {
        Language::Go => GO_GRPC_CLIENT.captures(line),
        Language::Python => PY_GRPC_STUB.captures(line),
        Language::TypeScript | Language::JavaScript => TS_GRPC_CLIENT.captures(line),
        _ => None,
    }?;
    let service = captured.get(1)?.as_str();
    let to_name = normalize_service_name(service);
    Some(Detection {
        edge_type: EdgeType::Communicates,
        to_name,
        confidence: 0.85,
        line: line_number,
        target_language: None,
        target_endpoint: None,
        metadata: json!({ "protocol": "grpc" }),
    })
}

// ---------------------------------------------------------------------
// 2. Raw transport dials
// ---------------------------------------------------------------------

static GRPC_DIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"grpc\.Dial(?:Context)?\s*\(\s*"([^"]+)""#).unwrap());

fn grpc_dial(line: &str, line_number: u32) -> Option<Detection> {
    let captured = GRPC_DIAL.captures(line)?;
    let endpoint = captured.get(1)?.as_str().to_string();
    let host = endpoint.split(':').next().unwrap_or(&endpoint).to_string();
    Some(Detection {
        edge_type: EdgeType::Communicates,
        to_name: host,
        confidence: 0.9,
        line: line_number,
        target_language: None,
        target_endpoint: Some(endpoint.clone()),
        metadata: json!({ "protocol": "grpc", "endpoint": endpoint }),
    })
}

// ---------------------------------------------------------------------
// 3. HTTP clients
// ---------------------------------------------------------------------

static FETCH_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?:fetch|axios(?:\.[a-z]+)?)\s*\(\s*[`"']([^`"']+)[`"']"#).unwrap());
static REQUESTS_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"requests\.[a-z]+\s*\(\s*[f]?["']([^"']+)["']"#).unwrap());
static GO_HTTP_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"http\.(?:Get|Post|Client\{?\}?\.Do)\s*\(\s*"([^"]+)""#).unwrap());

fn http_client_call(language: Language, line: &str, line_number: u32) -> Option<Detection> {
    let url = match language {
        Language::TypeScript | Language::JavaScript => FETCH_CALL.captures(line).and_then(|c| c.get(1)),
        Language::Python => REQUESTS_CALL.captures(line).and_then(|c| c.get(1)),
        Language::Go => GO_HTTP_CALL.captures(line).and_then(|c| c.get(1)),
        _ => None,
    }?
    .as_str()
    .to_string();

    let (host, confidence) = parse_endpoint(&url);
    Some(Detection {
        edge_type: EdgeType::Invokes,
        to_name: host,
        confidence,
        line: line_number,
        target_language: None,
        target_endpoint: Some(url.clone()),
        metadata: json!({ "protocol": "http", "endpoint": url }),
    })
}

/// Splits a `scheme://host:port/path` literal into a bare host name for
/// `to_name`, lowering confidence for anything that doesn't parse cleanly
/// as a URL (a template literal with interpolation, for instance).
fn parse_endpoint(url: &str) -> (String, f32) {
    if let Some(rest) = url.split("://").nth(1) {
        let host = rest.split(['/', ':']).next().unwrap_or(rest);
        if host.is_empty() || host.contains("${") || host.contains('{') {
            (url.to_string(), 0.55)
        } else {
            (host.to_string(), 0.85)
        }
    } else if url.starts_with('/') {
        // relative path, no host info — keep the path itself as the target.
        (url.to_string(), 0.6)
    } else {
        (url.to_string(), 0.55)
    }
}

// ---------------------------------------------------------------------
// 4. Subprocess / spawn
// ---------------------------------------------------------------------

static SUBPROCESS_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:subprocess\.Popen|exec\.Command|child_process\.(?:spawn|exec)|os/exec\.Command)\s*\(\s*[`"']([^`"']+)[`"']"#).unwrap());

fn subprocess_spawn(language: Language, line: &str, line_number: u32) -> Option<Detection> {
    let _ = language;
    let captured = SUBPROCESS_CALL.captures(line)?;
    let program = captured.get(1)?.as_str();
    let target_language = interpreter_language(program)?;
    Some(Detection {
        edge_type: EdgeType::Spawns,
        to_name: program.to_string(),
        confidence: 0.75,
        line: line_number,
        target_language: Some(target_language),
        target_endpoint: None,
        metadata: json!({ "targetLanguage": target_language.as_str() }),
    })
}

fn interpreter_language(program: &str) -> Option<Language> {
    let bin = program.rsplit('/').next().unwrap_or(program);
    match bin {
        "python" | "python3" => Some(Language::Python),
        "node" | "nodejs" => Some(Language::JavaScript),
        "java" => Some(Language::Java),
        "go" | "run" => Some(Language::Go),
        _ => {
            let ext = bin.rsplit('.').next()?;
            match ext {
                "py" => Some(Language::Python),
                "js" | "mjs" | "cjs" => Some(Language::JavaScript),
                "ts" => Some(Language::TypeScript),
                "go" => Some(Language::Go),
                "rb" => None,
                _ => None,
            }
        }
    }
}

// ---------------------------------------------------------------------
// 5. Environment-variable service discovery
// ---------------------------------------------------------------------

static ENV_VAR_READ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b([A-Z][A-Z0-9_]*(?:_SERVICE_ADDR|_SERVICE_ADDRESS|_HOST|_PORT|_URL|_ENDPOINT|_ADDR))\b"#).unwrap());

fn env_service_discovery(line: &str, line_number: u32) -> Option<Detection> {
    // Only consider it an env-var read if it looks like one is actually being
    // read (os.Getenv/process.env/os.environ/std::env::var), not a bare
    // identifier mention, to keep the false-positive rate down.
    if !(line.contains("Getenv") || line.contains("env::var") || line.contains("process.env") || line.contains("os.environ") || line.contains("mustMapEnv")) {
        return None;
    }
    let captured = ENV_VAR_READ.captures(line)?;
    let var_name = captured.get(1)?.as_str();
    let to_name = normalize_env_var(var_name);
    Some(Detection {
        edge_type: EdgeType::Communicates,
        to_name,
        confidence: 0.8,
        line: line_number,
        target_language: None,
        target_endpoint: None,
        metadata: json!({ "envVar": var_name, "discoveryMethod": "environment-variable" }),
    })
}

/// Normalizes a discovered service-constructor name (`CartService` from
/// `NewCartServiceClient`) to the same canonical form the env-var path
/// produces, so both agree on `to_name` for the same logical service.
pub fn normalize_service_name(raw: &str) -> String {
    raw.to_lowercase().replace(['_', '-'], "")
}

/// Normalizes an environment variable name per the discovery-suffix rule:
/// lowercase, strip one recognized discovery suffix, then drop remaining
/// underscores/hyphens. The suffix is the transport/address part only
/// (`_ADDR`, `_HOST`, ...) — `_SERVICE` itself is part of the service name
/// and must survive (`CART_SERVICE_ADDR` -> `cartservice`, not `cart`).
/// `REDIS_ADDR` is special-cased to `redis` since plain `_ADDR` stripping
/// would otherwise already produce `redis` here too, but it's called out
/// explicitly in the base rule.
pub fn normalize_env_var(var_name: &str) -> String {
    if var_name.eq_ignore_ascii_case("REDIS_ADDR") {
        return "redis".to_string();
    }
    const SUFFIXES: [&str; 6] = ["_ADDRESS", "_ADDR", "_HOST", "_PORT", "_URL", "_ENDPOINT"];
    let upper = var_name.to_uppercase();
    let stripped = SUFFIXES.iter().find_map(|suffix| upper.strip_suffix(suffix)).unwrap_or(&upper);
    stripped.to_lowercase().replace(['_', '-'], "")
}

// ---------------------------------------------------------------------
// 6. Connection-flow tracking
// ---------------------------------------------------------------------

/// Tracks, within a single function body, the chain env-var read → field
/// assignment → connection constructor → client call, so the terminal
/// `communicates` edge can carry the originating `envVar` alongside the
/// resolved service name. Scoped to one function; never carried across
/// function boundaries.
#[derive(Default)]
struct ConnectionFlow {
    env_var_by_field: std::collections::HashMap<String, String>,
    terminal: Vec<Detection>,
}

impl ConnectionFlow {
    fn resolve(self) -> Vec<Detection> {
        self.terminal
    }
}

fn walk_for_flow(node: Node, source: &str, language: Language, flow: &mut ConnectionFlow) {
    let line_text = line_at(source, node.start_position().row);

    if let Some(detection) = env_service_discovery(&line_text, node.start_position().row as u32 + 1) {
        // Record "&svc.cartSvcAddr" style first-argument targets so later
        // client construction on the same field can be traced back.
        if let Some(field) = assigned_field_name(node, source) {
            if let serde_json::Value::Object(ref map) = detection.metadata {
                if let Some(env_var) = map.get("envVar").and_then(|v| v.as_str()) {
                    flow.env_var_by_field.insert(field, env_var.to_string());
                }
            }
        }
        flow.terminal.push(detection);
    } else if let Some(mut detection) = grpc_client_construction(language, &line_text, node.start_position().row as u32 + 1) {
        if let Some(field) = referenced_field_name(node, source) {
            if let Some(env_var) = flow.env_var_by_field.get(&field) {
                if let serde_json::Value::Object(ref mut map) = detection.metadata {
                    map.insert("envVar".to_string(), json!(env_var));
                    map.insert("connectionMethod".to_string(), json!("field"));
                }
                detection.confidence = detection.confidence.max(0.9);
            }
        }
        flow.terminal.push(detection);
    } else if let Some(detection) = grpc_dial(&line_text, node.start_position().row as u32 + 1) {
        flow.terminal.push(detection);
    } else if let Some(detection) = http_client_call(language, &line_text, node.start_position().row as u32 + 1) {
        flow.terminal.push(detection);
    } else if let Some(detection) = subprocess_spawn(language, &line_text, node.start_position().row as u32 + 1) {
        flow.terminal.push(detection);
    }

    for child in node.children(&mut node.walk()) {
        walk_for_flow(child, source, language, flow);
    }
}

fn line_at(source: &str, row: usize) -> String {
    source.lines().nth(row).unwrap_or("").to_string()
}

/// Best-effort extraction of the field a `mustMapEnv(&svc.cartSvcAddr, ...)`
/// style call is writing into, from the raw node text.
fn assigned_field_name(node: Node, source: &str) -> Option<String> {
    let text = node.utf8_text(source.as_bytes()).ok()?;
    static FIELD_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"&\w+\.(\w+)").unwrap());
    FIELD_ARG.captures(text).map(|c| c[1].to_string())
}

/// Best-effort extraction of the field a client constructor call reads its
/// connection from, e.g. `pb.NewCartServiceClient(svc.cartSvcConn)`.
fn referenced_field_name(node: Node, source: &str) -> Option<String> {
    let text = node.utf8_text(source.as_bytes()).ok()?;
    static FIELD_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\.(\w+Conn\w*)").unwrap());
    FIELD_ARG.captures(text).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_grpc_client_construction_is_recognized() {
        let detection = scan_line(Language::Go, "client := pb.NewCartServiceClient(conn)", 10).unwrap();
        assert_eq!(detection.edge_type, EdgeType::Communicates);
        assert_eq!(detection.to_name, "cartservice");
        assert!(detection.confidence >= 0.8);
    }

    #[test]
    fn grpc_dial_extracts_host_and_endpoint() {
        let detection = scan_line(Language::Go, r#"conn, err := grpc.Dial("cart:7070")"#, 3).unwrap();
        assert_eq!(detection.to_name, "cart");
        assert_eq!(detection.target_endpoint.as_deref(), Some("cart:7070"));
    }

    #[test]
    fn env_var_service_discovery_normalizes_name() {
        let detection = scan_line(Language::Go, r#"mustMapEnv(&svc.cartSvcAddr, "CART_SERVICE_ADDR")"#, 1).unwrap();
        assert_eq!(detection.to_name, "cartservice");
    }

    #[test]
    fn redis_addr_is_special_cased() {
        assert_eq!(normalize_env_var("REDIS_ADDR"), "redis");
    }

    #[test]
    fn product_catalog_service_addr_collapses_underscores() {
        assert_eq!(normalize_env_var("PRODUCT_CATALOG_SERVICE_ADDR"), "productcatalogservice");
    }

    #[test]
    fn subprocess_with_python_script_infers_target_language() {
        let detection = scan_line(Language::JavaScript, r#"child_process.spawn("worker.py")"#, 5).unwrap();
        assert_eq!(detection.edge_type, EdgeType::Spawns);
        assert!(matches!(detection.target_language, Some(Language::Python)));
    }

    #[test]
    fn http_fetch_extracts_host() {
        let detection = scan_line(Language::JavaScript, r#"fetch("http://cartservice:7070/api")"#, 2).unwrap();
        assert_eq!(detection.to_name, "cartservice");
        assert_eq!(detection.edge_type, EdgeType::Invokes);
    }

    #[test]
    fn low_confidence_detections_are_dropped_by_scan_line() {
        // A URL without a parseable host still matches but scores below the
        // persistence threshold only when host extraction totally fails.
        let result = scan_line(Language::JavaScript, "const x = 1;", 1);
        assert!(result.is_none());
    }
}
