use clap::Parser;
use module_sentinel::{orchestrator, Config};
use protocol::Language;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::GraphStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "module-sentinel")]
#[command(about = "Multi-language source indexing pipeline", long_about = None)]
struct Cli {
    /// Root directory of the project to index.
    #[arg(long)]
    project: PathBuf,

    /// Project name recorded in the store; defaults to the directory name.
    #[arg(long)]
    name: Option<String>,

    /// Comma-separated languages to index; defaults to all supported languages.
    #[arg(long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Wipe and fully reparse the project instead of indexing incrementally.
    #[arg(long)]
    force: bool,

    /// Path to the embedded database file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Maximum files parsed concurrently.
    #[arg(long = "max-concurrent")]
    max_concurrent: Option<usize>,

    #[arg(long)]
    debug: bool,
}

const ALL_LANGUAGES: &[Language] = &[
    Language::Cpp,
    Language::C,
    Language::TypeScript,
    Language::JavaScript,
    Language::Python,
    Language::Go,
    Language::Rust,
    Language::Java,
    Language::CSharp,
];

fn parse_language(name: &str) -> Option<Language> {
    match name.to_lowercase().as_str() {
        "cpp" | "c++" => Some(Language::Cpp),
        "c" => Some(Language::C),
        "typescript" | "ts" => Some(Language::TypeScript),
        "javascript" | "js" => Some(Language::JavaScript),
        "python" | "py" => Some(Language::Python),
        "go" | "golang" => Some(Language::Go),
        "rust" | "rs" => Some(Language::Rust),
        "java" => Some(Language::Java),
        "csharp" | "c#" | "cs" => Some(Language::CSharp),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env()
        .with_database_path(cli.db.clone())
        .with_max_concurrent_files(cli.max_concurrent)
        .with_debug(cli.debug);

    let filter = if config.debug_mode {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let project_root = cli.project;
    let project_name = cli
        .name
        .unwrap_or_else(|| project_root.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "project".to_string()));

    let languages: Vec<Language> = if cli.languages.is_empty() {
        ALL_LANGUAGES.to_vec()
    } else {
        cli.languages
            .iter()
            .filter_map(|name| {
                let lang = parse_language(name);
                if lang.is_none() {
                    error!(language = name, "unrecognized language, skipping");
                }
                lang
            })
            .collect()
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, finishing in-flight files and stopping");
            signal_cancel.store(true, Ordering::SeqCst);
        }
    });

    let run_cancel = cancel.clone();
    let force = cli.force;
    let db_path = config.database_path.clone();
    let run_config = config.clone();

    let result = tokio::task::spawn_blocking(move || {
        let store = GraphStore::open(&db_path)?;
        orchestrator::run(&store, &run_config, &project_name, &project_root, &languages, force, run_cancel)
    })
    .await;

    match result {
        Ok(Ok(index_result)) => {
            println!("{}", serde_json::to_string(&index_result).expect("IndexResult always serializes"));
            if index_result.cancelled {
                ExitCode::from(2)
            } else if !index_result.errors.is_empty() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Ok(Err(store_error)) => {
            error!(error = %store_error, "indexing run failed");
            ExitCode::FAILURE
        }
        Err(join_error) => {
            error!(error = %join_error, "indexing task panicked");
            ExitCode::FAILURE
        }
    }
}
