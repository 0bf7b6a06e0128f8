//! ConceptLens CLI - knowledge gaps and hidden links for a concept set

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use conceptlens_core::config::Config;
use conceptlens_core::domain::concept::{CallGuard, DifficultyLevel};
use conceptlens_core::domain::context::{ContextRetriever, InMemoryContextStore};
use conceptlens_core::domain::gaps::KnowledgeGap;
use conceptlens_core::domain::links::HiddenLink;
use conceptlens_core::domain::ontology::{ExternalOntologyClient, convert_to_property_graph};
use conceptlens_core::domain::ranking::{
    RankingEngine, RankingOptions, ResultType, UnifiedPriority, UnifiedResult, UserProfile,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "conceptlens")]
#[command(author, version, about = "Knowledge gaps and hidden links for your concepts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// JSON file with notes, excerpts and relations to use as user context
    #[arg(long, global = true)]
    context: Option<PathBuf>,

    /// JSON file with the user profile
    #[arg(long, global = true)]
    profile: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Look a concept up in the external ontologies
    Search {
        concept: String,
    },

    /// Export the ontology neighborhood of a concept as a property graph
    Graph {
        concept: String,
    },

    /// Detect knowledge gaps
    Gaps {
        #[arg(required = true)]
        concepts: Vec<String>,
    },

    /// Discover hidden links between concepts
    Links {
        #[arg(required = true)]
        concepts: Vec<String>,
        /// Longest path searched, in edges
        #[arg(long)]
        max_hops: Option<usize>,
    },

    /// Rank gaps and links together
    Rank {
        #[arg(required = true)]
        concepts: Vec<String>,
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        /// Only these priorities (low, medium, high, critical)
        #[arg(long, value_delimiter = ',')]
        priority: Vec<String>,
        /// Only these result types (gap, link)
        #[arg(long = "type", value_delimiter = ',')]
        result_type: Vec<String>,
        /// Only results with a category containing this text
        #[arg(long)]
        category: Option<String>,
        /// Only results learnable within this many minutes
        #[arg(long)]
        max_time: Option<u32>,
        /// Print summary statistics after the ranking
        #[arg(long)]
        stats: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conceptlens=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Search { concept } => {
            let config = Config::load()?;
            cmd_search(&config, &concept, cli.format, cancel).await
        }

        Commands::Graph { concept } => {
            let config = Config::load()?;
            cmd_graph(&config, &concept, cli.format, cancel).await
        }

        Commands::Gaps { concepts } => {
            let config = Config::load()?;
            let engine = build_engine(&config, cli.context.as_deref(), cancel)?;
            let mut gap_config = config.gaps.clone();
            if let Some(path) = cli.profile.as_deref() {
                if let Some(preferred) = load_profile(path)?.preferred_difficulty {
                    gap_config.difficulty_preference = preferred;
                }
            }
            let gaps = engine
                .gap_detector()
                .detect_knowledge_gaps(&concepts, &gap_config)
                .await?;
            print_gaps(&gaps, cli.format)
        }

        Commands::Links { concepts, max_hops } => {
            let config = Config::load()?;
            let engine = build_engine(&config, cli.context.as_deref(), cancel)?;
            let mut options = config.links.clone();
            if let Some(hops) = max_hops {
                options.max_hops = hops.max(1);
            }
            let links = engine
                .link_reasoner()
                .detect_hidden_links(&concepts, &options)
                .await?;
            print_links(&links, cli.format)
        }

        Commands::Rank {
            concepts,
            max_results,
            min_score,
            priority,
            result_type,
            category,
            max_time,
            stats,
        } => {
            let config = Config::load()?;
            let engine = build_engine(&config, cli.context.as_deref(), cancel)?;
            let profile = match cli.profile.as_deref() {
                Some(path) => load_profile(path)?,
                None => UserProfile::default(),
            };

            let mut options = config.ranking.clone();
            if let Some(n) = max_results {
                options.max_results = n;
            }
            if let Some(score) = min_score {
                options.min_unified_score = score;
            }
            if !priority.is_empty() {
                options.priority_filter = Some(parse_all(&priority, UnifiedPriority::parse, "priority")?);
            }
            if !result_type.is_empty() {
                options.type_filter = Some(parse_all(&result_type, ResultType::parse, "type")?);
            }
            if category.is_some() {
                options.category_filter = category;
            }
            if max_time.is_some() {
                options.max_learning_time = max_time;
            }

            cmd_rank(&engine, &config, &concepts, &profile, &options, stats, cli.format).await
        }
    }
}

fn build_engine(
    config: &Config,
    context: Option<&Path>,
    cancel: CancellationToken,
) -> anyhow::Result<RankingEngine> {
    let store = match context {
        Some(path) => {
            let store = InMemoryContextStore::load(path)
                .map_err(|e| anyhow::anyhow!("Failed to load context {}: {}", path.display(), e))?;
            debug!(
                notes = store.note_count(),
                excerpts = store.excerpt_count(),
                "Loaded context store"
            );
            store
        }
        None => InMemoryContextStore::new(),
    };
    let retriever: Arc<dyn ContextRetriever> = Arc::new(store);
    Ok(RankingEngine::from_config(config, retriever, cancel)?)
}

fn load_profile(path: &Path) -> anyhow::Result<UserProfile> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read profile {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&contents)?)
}

fn parse_all<T>(values: &[String], parse: fn(&str) -> Option<T>, what: &str) -> anyhow::Result<Vec<T>> {
    values
        .iter()
        .map(|v| parse(v).ok_or_else(|| anyhow::anyhow!("Unknown {}: {}", what, v)))
        .collect()
}

fn ontology_client(config: &Config, cancel: CancellationToken) -> anyhow::Result<ExternalOntologyClient> {
    let guard = CallGuard::new(Duration::from_secs(config.ontology.timeout_secs)).with_token(cancel);
    Ok(ExternalOntologyClient::from_config(&config.ontology)?.with_guard(guard))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_search(
    config: &Config,
    concept: &str,
    format: OutputFormat,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let client = ontology_client(config, cancel)?;
    let search = client.search_concept_detailed(concept).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&search.results)?);
        return Ok(());
    }

    if search.all_providers_failed() {
        println!("No ontology endpoint answered. Check your network connection.");
        return Ok(());
    }
    if search.results.is_empty() {
        println!("No matches for '{}'.", concept);
        return Ok(());
    }

    println!("Matches for '{}':", concept);
    for result in &search.results {
        println!();
        println!("  {} [{:.0}] ({})", result.label, result.relevance_score, result.source);
        println!("    {}", result.uri);
        if let Some(description) = &result.description {
            println!("    {}", description);
        }
        if !result.categories.is_empty() {
            println!("    Categories: {}", result.categories.join(", "));
        }
        if !result.related_concepts.is_empty() {
            println!("    Related: {}", result.related_concepts.join(", "));
        }
    }
    Ok(())
}

async fn cmd_graph(
    config: &Config,
    concept: &str,
    format: OutputFormat,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let client = ontology_client(config, cancel)?;
    let results = client.search_concept(concept).await;
    let graph = convert_to_property_graph(&results);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }

    println!("Nodes ({}):", graph.nodes.len());
    for node in &graph.nodes {
        println!("  {} ({:?})", node.id, node.kind);
    }
    println!("Edges ({}):", graph.edges.len());
    for edge in &graph.edges {
        println!("  {} -[{}]-> {}", edge.source, edge.relation.as_str(), edge.target);
    }
    Ok(())
}

fn print_gaps(gaps: &[KnowledgeGap], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(gaps)?);
        return Ok(());
    }

    if gaps.is_empty() {
        println!("No knowledge gaps found.");
        return Ok(());
    }

    println!("Knowledge gaps ({}):", gaps.len());
    for gap in gaps {
        println!();
        println!(
            "  {} [score {:.1}, {}]",
            gap.missing_concept,
            gap.gap_score,
            gap.priority.as_str()
        );
        println!("    Path: {}", gap.suggested_learning_path.join(" -> "));
        if !gap.related_user_concepts.is_empty() {
            println!("    Related to: {}", gap.related_user_concepts.join(", "));
        }
        println!(
            "    About {} min, {}",
            gap.estimated_learning_time,
            gap.difficulty()
        );
    }
    Ok(())
}

fn print_links(links: &[HiddenLink], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(links)?);
        return Ok(());
    }

    if links.is_empty() {
        println!("No hidden links found.");
        return Ok(());
    }

    println!("Hidden links ({}):", links.len());
    for link in links {
        println!();
        println!(
            "  {} <-> {} [{}, confidence {:.1}]",
            link.from_concept,
            link.to_concept,
            link.link_type.as_str(),
            link.confidence_score
        );
        println!(
            "    Path: {}",
            link.concepts_on_path().cloned().collect::<Vec<_>>().join(" -> ")
        );
        println!(
            "    {} hops, {} search",
            link.reasoning.hops,
            link.reasoning.method.as_str()
        );
    }
    Ok(())
}

async fn cmd_rank(
    engine: &RankingEngine,
    config: &Config,
    concepts: &[String],
    profile: &UserProfile,
    options: &RankingOptions,
    stats: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let results = engine
        .generate_unified_ranking(concepts, profile, options, Some(&config.weights))
        .await;
    let summary = stats.then(|| engine.generate_performance_stats(&results));

    if format == OutputFormat::Json {
        let body = match summary {
            Some(summary) => serde_json::json!({ "results": results, "stats": summary }),
            None => serde_json::to_value(&results)?,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("Nothing to rank.");
    } else {
        println!("Ranking ({}):", results.len());
        for (i, result) in results.iter().enumerate() {
            print_result(i + 1, result, profile.target_difficulty());
        }
    }

    if let Some(summary) = summary {
        println!();
        println!("Summary");
        println!("=======");
        println!("  Gaps: {}", summary.knowledge_gaps);
        println!("  Links: {}", summary.hidden_links);
        println!("  Average score: {:.1}", summary.average_unified_score);
        println!("  Total learning time: {} min", summary.total_learning_time);
        for (category, count) in &summary.top_categories {
            println!("  {}: {}", category, count);
        }
    }
    Ok(())
}

fn print_result(rank: usize, result: &UnifiedResult, target: DifficultyLevel) {
    println!();
    println!(
        "{:>2}. {} [{}] {:.1} ({})",
        rank,
        result.title,
        result.result_type.as_str(),
        result.unified_score,
        result.priority.as_str()
    );
    println!("    {}", result.description);
    let marker = if result.difficulty == target { "" } else { " *" };
    println!(
        "    {} min, {}{}",
        result.estimated_learning_time, result.difficulty, marker
    );
    for recommendation in &result.recommendations {
        println!("    - {}", recommendation);
    }
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
