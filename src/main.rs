use clap::{Args, Parser, Subcommand};
use moldrec_api::{RestApi, ServiceConfig};
use moldrec_core::{compose_query, RecommendConfig, Recommendation, DEFAULT_TOP_N};
use moldrec_storage::{github::DEFAULT_API_BASE, GithubConfig, SourceConfig, SqliteSource, StorageManager, DEFAULT_TABLE};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_CSV: &str = "2025년 금형제작리스트_통합.csv";

/// Recommend similar past mold designs
#[derive(Parser, Debug)]
#[command(name = "moldrec")]
#[command(about = "Recommend similar past mold designs", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Interactive recommendation prompt
    Query(QueryArgs),
    /// Bulk-load a CSV export into SQLite
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// CSV file with the design records
    #[arg(long, default_value = DEFAULT_CSV, conflicts_with = "db")]
    csv: PathBuf,

    /// SQLite database to read instead of a CSV file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Table inside the SQLite database
    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,
}

impl SourceArgs {
    fn config(&self) -> SourceConfig {
        match &self.db {
            Some(db) => SourceConfig::Sqlite {
                path: db.clone(),
                table: self.table.clone(),
            },
            None => SourceConfig::Csv { path: self.csv.clone() },
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP API port
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Results returned when a request does not ask for a count
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top_n: usize,

    /// Upper bound on requested result counts
    #[arg(long, default_value_t = 100)]
    max_top_n: usize,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPO")]
    github_repo: Option<String>,

    /// Path of the CSV inside the repository
    #[arg(long, env = "GITHUB_FILE")]
    github_file: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE)]
    github_api: String,
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top_n: usize,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// CSV export to load
    #[arg(long)]
    csv: PathBuf,

    /// Target SQLite database (created if missing)
    #[arg(long)]
    db: PathBuf,

    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,

    /// Rows between progress log lines
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Query(args) => tokio::task::spawn_blocking(move || query(args)).await?,
        Command::Import(args) => import(args),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting moldrec v{}", env!("CARGO_PKG_VERSION"));

    let source = args.source.config();
    info!("Data source: {:?}", source);

    let github = GithubConfig {
        token: args.github_token,
        repo: args.github_repo,
        file: args.github_file,
        api_base: args.github_api,
    };
    let storage = Arc::new(StorageManager::open(&source)?.with_github(&github)?);
    info!(
        "Loaded {} records, GitHub sync {}",
        storage.snapshot().len(),
        if storage.github_enabled() { "enabled" } else { "disabled" }
    );

    let config = ServiceConfig {
        host: args.host,
        port: args.port,
        recommend: RecommendConfig {
            top_n: args.top_n,
            max_top_n: args.max_top_n,
        },
    };
    let (host, port) = (config.host.clone(), config.port);

    let storage_http = storage.clone();
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on {}:{}", config.host, config.port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(storage_http, config).await {
                eprintln!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://{}:{}/", host, port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    storage.shutdown();
    Ok(())
}

fn is_quit(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "q" | "quit" | "exit")
}

/// `None` on end of input or a quit command.
fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> anyhow::Result<Option<String>> {
    print!("{}: ", label);
    io::stdout().flush()?;
    match lines.next() {
        None => Ok(None),
        Some(line) => {
            let line = line?;
            Ok(if is_quit(&line) { None } else { Some(line.trim().to_string()) })
        }
    }
}

fn print_results(results: &[Recommendation]) {
    if results.is_empty() {
        println!("No matching designs.");
        return;
    }
    println!("{:>3}  {:<12} {:<10} {:<12} {:<24} {:<12} {:>6}", "#", "제번", "고객사", "제품종류", "품명", "제품", "유사도");
    for (i, r) in results.iter().enumerate() {
        println!(
            "{:>3}  {:<12} {:<10} {:<12} {:<24} {:<12} {:>6.4}",
            i + 1,
            r.record.code,
            r.record.customer.as_deref().unwrap_or("-"),
            r.record.category,
            r.record.part_name,
            r.record.product.as_deref().unwrap_or("-"),
            r.similarity
        );
    }
}

fn query(args: QueryArgs) -> anyhow::Result<()> {
    let storage = StorageManager::open(&args.source.config())?;
    println!("Loaded {} records. Type q, quit or exit to leave.", storage.snapshot().len());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let Some(category) = prompt(&mut lines, "제품종류")? else { break };
        let Some(name) = prompt(&mut lines, "품명")? else { break };

        let results = storage.recommend(&compose_query(&category, &name), args.top_n);
        print_results(&results);
        println!();
    }
    Ok(())
}

fn import(args: ImportArgs) -> anyhow::Result<()> {
    let target = SqliteSource::open(&args.db, &args.table)?;
    let inserted = target.import_csv(&args.csv, args.batch_size)?;
    info!(
        "Imported {} rows from {} into {}#{} ({} total)",
        inserted,
        args.csv.display(),
        args.db.display(),
        args.table,
        target.count()?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_words() {
        assert!(is_quit("q"));
        assert!(is_quit(" QUIT "));
        assert!(is_quit("Exit"));
        assert!(!is_quit("사출금형"));
        assert!(!is_quit(""));
    }

    #[test]
    fn test_prompt_stops_at_quit_or_eof() {
        let input: Vec<io::Result<String>> = vec![Ok("사출금형 ".to_string()), Ok("exit".to_string())];
        let mut lines = input.into_iter();
        assert_eq!(prompt(&mut lines, "제품종류").unwrap(), Some("사출금형".to_string()));
        assert_eq!(prompt(&mut lines, "품명").unwrap(), None);
        assert_eq!(prompt(&mut lines, "품명").unwrap(), None);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["moldrec", "serve", "--db", "mold.db", "--port", "8080"]).unwrap();
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, 8080);
                assert_eq!(
                    args.source.config(),
                    SourceConfig::Sqlite { path: PathBuf::from("mold.db"), table: DEFAULT_TABLE.to_string() }
                );
            }
            other => panic!("unexpected {:?}", other),
        }

        let cli = Cli::try_parse_from(["moldrec", "--log-level", "debug", "query"]).unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::Query(a) if a.source.config() == SourceConfig::Csv { path: PathBuf::from(DEFAULT_CSV) }));

        assert!(Cli::try_parse_from(["moldrec", "import", "--csv", "a.csv"]).is_err());
        assert!(Cli::try_parse_from(["moldrec", "serve", "--csv", "a.csv", "--db", "b.db"]).is_err());
    }
}
