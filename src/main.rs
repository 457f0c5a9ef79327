mod init;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use merj_core::Config;
use merj_core::config::StoreBackend;
use merj_index::conflict::{conflict_reports, map_file_lines};
use merj_index::languages;
use merj_index::{
    AncestorIndexer, CollectionCache, ConflictDescriptor, ConflictResolver, DiffInput,
    DiffPipeline, DiffRetrieval, IndexerConfig, WalkOptions, chunk_file, compile_context,
    save_conflict_results, validate_registry,
};
use merj_llm::voyage::VoyageProvider;
use merj_memory::{InMemoryVectorStore, QdrantOps, VectorStore};

/// Similar historical code for merge conflicts.
#[derive(Parser)]
#[command(name = "merj", version, about)]
struct Cli {
    /// Configuration file. Falls back to `MERJ_CONFIG`, then `config/default.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file.
    Init {
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip the prompts and write the defaults.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print the chunks of a source file as JSON.
    Chunk { file: PathBuf },
    /// Print the enclosing unit of each 1-based line as JSON.
    Lines {
        file: PathBuf,
        #[arg(required = true, allow_negative_numbers = true)]
        lines: Vec<i64>,
    },
    /// Chunk and embed the files named in a conflict descriptor list.
    Conflicts {
        /// JSON array of `{filefrom, fileto, lns}` objects.
        descriptors: PathBuf,
        /// Directory relative file names are resolved against.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Save the report here instead of printing it.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Index an ancestor checkout into its commit collection.
    Index {
        repo: PathBuf,
        #[arg(long)]
        commit: String,
    },
    /// Retrieve similar code for both sides of a diff.
    Resolve {
        /// Collection to query.
        #[arg(long, required_unless_present = "ancestor")]
        collection: Option<String>,
        /// Index this checkout first and query its collection.
        #[arg(long, requires = "commit", conflicts_with = "collection")]
        ancestor: Option<PathBuf>,
        #[arg(long)]
        commit: Option<String>,
        /// JSON object with `lbd` and `rbd` descriptor lists.
        #[arg(long)]
        diff_json: PathBuf,
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long)]
        k: Option<u64>,
        #[arg(long)]
        threshold: Option<f32>,
        /// Context length limit in characters, 0 for none.
        #[arg(long)]
        max_length: Option<usize>,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    match cli.command {
        Commands::Init { output, yes } => init::run(output, yes),
        Commands::Chunk { file } => {
            validate_registry()?;
            print_chunks(&file)
        }
        Commands::Lines { file, lines } => {
            validate_registry()?;
            let mapping = map_file_lines(&file, &lines)?;
            println!("{}", serde_json::to_string_pretty(&mapping)?);
            Ok(())
        }
        Commands::Conflicts {
            descriptors,
            root,
            output,
        } => {
            let config = load_config(cli.config)?;
            run_conflicts(&config, &descriptors, root, output.as_deref()).await
        }
        Commands::Index { repo, commit } => {
            let config = load_config(cli.config)?;
            let store = create_store(&config)?;
            let provider = Arc::new(create_provider(&config)?);
            let mut cache = CollectionCache::new();
            let report = indexer(&config, store, provider)
                .index_commit(&repo, &commit, &mut cache)
                .await?;
            let summary = serde_json::json!({
                "lca": report.commit,
                "chunks": report.chunks,
                "collection": report.collection,
                "reused": report.reused,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Resolve {
            collection,
            ancestor,
            commit,
            diff_json,
            root,
            k,
            threshold,
            max_length,
            json,
        } => {
            let config = load_config(cli.config)?;
            let store = create_store(&config)?;
            let provider = Arc::new(create_provider(&config)?);

            let collection = match (collection, ancestor, commit) {
                (Some(name), _, _) => name,
                (None, Some(repo), Some(commit)) => {
                    let mut cache = CollectionCache::new();
                    indexer(&config, Arc::clone(&store), Arc::clone(&provider))
                        .index_commit(&repo, &commit, &mut cache)
                        .await?
                        .collection
                }
                _ => bail!("either --collection or --ancestor with --commit is required"),
            };

            let input: DiffInput = read_json(&diff_json)?;
            let k = k.unwrap_or(config.retrieval.k);
            let threshold = threshold.unwrap_or(config.retrieval.distance_threshold);
            let max_length = max_length.or(config.retrieval.max_context_length);

            let pipeline = DiffPipeline::new(ConflictResolver::new(root), store, provider);
            let retrieval = pipeline
                .process_diff(&input, &collection, k, threshold)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&retrieval)?);
            } else {
                print_summary(&retrieval, max_length);
            }
            Ok(())
        }
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn load_config(flag: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = resolve_config_path(flag);
    let config = Config::load(&path)?;
    config.validate()?;
    validate_registry()?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("MERJ_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn create_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Qdrant => {
            let ops = QdrantOps::new(&config.store.qdrant_url)
                .with_context(|| format!("failed to connect to {}", config.store.qdrant_url))?;
            Ok(Arc::new(ops))
        }
        StoreBackend::Memory => {
            tracing::info!("using in-memory vector store, collections last for this run only");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}

fn create_provider(config: &Config) -> anyhow::Result<VoyageProvider> {
    let embedding = &config.embedding;
    Ok(VoyageProvider::new(
        embedding.api_key.as_ref().map(|k| k.expose().to_owned()),
        embedding.base_url.clone(),
        embedding.model.clone(),
        embedding.input_type.clone(),
    )?)
}

fn indexer(
    config: &Config,
    store: Arc<dyn VectorStore>,
    provider: Arc<VoyageProvider>,
) -> AncestorIndexer<VoyageProvider> {
    AncestorIndexer::new(
        store,
        provider,
        IndexerConfig {
            batch_size: config.embedding.batch_size,
            collection_prefix: config.index.collection_prefix.clone(),
            walk: WalkOptions {
                respect_gitignore: config.index.respect_gitignore,
            },
        },
    )
}

fn print_chunks(file: &Path) -> anyhow::Result<()> {
    if !file.is_file() {
        bail!("file not found: {}", file.display());
    }
    let Some(lang) = languages::resolve(file) else {
        bail!("unsupported file type: {}", file.display());
    };
    let chunks = chunk_file(file, lang);
    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}

async fn run_conflicts(
    config: &Config,
    descriptors: &Path,
    root: PathBuf,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let descriptors: Vec<ConflictDescriptor> = read_json(descriptors)?;
    let provider = create_provider(config)?;
    let results = ConflictResolver::new(root)
        .chunk_and_embed_conflicts(&descriptors, &provider)
        .await?;

    match output {
        Some(path) => {
            save_conflict_results(&results, path)?;
            println!("Results saved to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&conflict_reports(&results))?),
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_summary(retrieval: &DiffRetrieval, max_length: Option<usize>) {
    println!("Collection: {}", retrieval.metadata.collection);
    println!(
        "Chunks: {} local, {} remote, {} total",
        retrieval.local_chunks.len(),
        retrieval.remote_chunks.len(),
        retrieval.total_chunks
    );
    let matched = retrieval
        .rag_results
        .iter()
        .filter(|r| !r.similar_code.is_empty())
        .count();
    println!("Chunks with similar code: {matched}");
    if let Some(error) = &retrieval.retrieval_error {
        println!("Retrieval failed: {error}");
    }
    println!();
    println!("{}", compile_context(&retrieval.rag_results, max_length));
}
