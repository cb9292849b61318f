use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgpath::cache::{FileWeightsProvider, WeightsCache};
use kgpath::db::{migrate, Db};
use kgpath::graph::SqliteGraphStore;
use kgpath::pipeline::{QueryResponse, QueryStatus, RelationshipQa};
use kgpath::question::{BetweenPattern, ExplicitTerms, TermExtractor};
use kgpath::Config;

/// Answer "how are X and Y related?" from a knowledge graph.
#[derive(Parser, Debug)]
#[command(name = "kgpath", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find and score canonical relationship chains between two concepts.
    Ask {
        /// The question, e.g. "How is Asset Information related to BIM Uses?"
        question: String,

        /// First concept. Overrides extraction from the question.
        #[arg(long)]
        from: Option<String>,

        /// Second concept. Overrides extraction from the question.
        #[arg(long)]
        to: Option<String>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Apply migrations and verify the database schema.
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.kgpath.log_level))
        .init();

    match cli.command.unwrap_or(Command::Verify) {
        Command::Ask {
            question,
            from,
            to,
            json,
        } => {
            if from.is_some() || to.is_some() {
                run_ask(&config, &question, ExplicitTerms::new(from, to), json).await
            } else {
                run_ask(&config, &question, BetweenPattern, json).await
            }
        }
        Command::Verify => run_schema_verification(&config).await,
    }
}

async fn open_database(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await
        .with_context(|| format!("Failed to migrate {}", config.db_path().display()))?;
    Ok(db)
}

async fn run_ask<E: TermExtractor>(config: &Config, question: &str, extractor: E, json: bool) -> Result<()> {
    let db = open_database(config).await?;

    let weights = WeightsCache::new(
        FileWeightsProvider::new(config.weights.source.clone()),
        config.weights.ttl_seconds,
    );
    let qa = RelationshipQa::new(SqliteGraphStore::new(db), extractor, weights)
        .with_search_config(&config.search)
        .with_resolver_config(config.resolver.clone());

    let response = qa.answer(question).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if response.status == QueryStatus::Error {
        anyhow::bail!("Query failed");
    }
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("\n╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║ kgpath Relationship Query                                                    ║");
    println!("╚══════════════════════════════════════════════════════════════════════════════╝");
    println!("\nQuestion: \"{}\"", response.question);
    println!("Status:   {}", status_name(response.status));
    println!("Hop limit: {}", response.hop_limit_used);
    println!("Weights:  {} ({})\n", response.weights.version, response.weights.source);

    if !response.answer.is_empty() {
        println!("{}\n", response.answer);
    }

    for (side, candidates) in [("X", &response.resolved_candidates.x), ("Y", &response.resolved_candidates.y)] {
        if let Some(best) = candidates.first() {
            println!(
                "{} -> {} [{}] (score {}, {} candidate(s))",
                side,
                best.candidate.label,
                best.candidate.entity_type,
                best.score,
                candidates.len()
            );
        }
    }

    if let Some(evidence) = &response.evidence {
        println!("─────────────────────────────────────────────────────────────────────────────");
        println!(
            "Evidence: {:.1}/10 ({} confidence, {} hops)",
            evidence.metrics.score, evidence.metrics.confidence, evidence.metrics.hops
        );
        println!("─────────────────────────────────────────────────────────────────────────────");
        print!("{}", evidence.text);
    }

    if !response.diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for line in &response.diagnostics {
            println!("  - {}", line);
        }
    }
    println!();
}

fn status_name(status: QueryStatus) -> &'static str {
    match status {
        QueryStatus::PathFound => "PATH_FOUND",
        QueryStatus::TermNotFound => "TERM_NOT_FOUND",
        QueryStatus::NoPath => "NO_PATH",
        QueryStatus::Error => "ERROR",
    }
}

/// Run database schema verification
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting kgpath v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Database path: {}", config.db_path().display());
    log::info!(
        "Canonical relations: {}",
        config.search.canonical_relations.join(", ")
    );
    match &config.weights.source {
        Some(path) => log::info!("Weights source: {}", path.display()),
        None => log::info!("Weights source: built-in defaults"),
    }

    let db = open_database(config).await?;
    log::info!("Database initialized successfully");

    let (entities, relations) = db
        .with_connection(|conn| {
            migrate::verify_schema(conn)?;
            let entities: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
            let relations: i64 = conn.query_row("SELECT COUNT(*) FROM entity_relations", [], |row| row.get(0))?;
            Ok((entities, relations))
        })
        .await?;

    log::info!("✓ Database schema verification complete ({} entities, {} relations)", entities, relations);
    Ok(())
}
