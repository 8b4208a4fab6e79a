use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use joinindex::{
    DocNo, JoinDocument, JoinIndex, JoinIndexSettings, JoinScope, MissingValue, MultiValueMode,
    SegmentId, SortDirection, SortValue,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "joinindex")]
#[command(about = "Inspect parent/child join field data and global ordinals", long_about = None)]
struct Args {
    /// JSON dataset: {"settings": {...}, "segments": [[document | null, ...], ...]}
    #[arg(long, env = "JOININDEX_DATASET")]
    dataset: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every document's join values
    Values,

    /// Print the global dictionary of one join type
    Ordinals {
        #[arg(long)]
        join_type: String,
    },

    /// Sort all documents by their join values
    Sort {
        /// Join type to sort on, or _all for the whole join field
        #[arg(long, default_value = "_all")]
        scope: String,

        /// min or max
        #[arg(long, default_value = "min")]
        mode: MultiValueMode,

        /// _first or _last
        #[arg(long, default_value = "_last")]
        missing: MissingValue,

        /// asc or desc
        #[arg(long, default_value = "asc")]
        order: SortDirection,

        /// Number of documents to print
        #[arg(long, default_value = "10")]
        size: usize,
    },
}

/// Documents per segment; `null` is a document without a join field
#[derive(Deserialize)]
struct Dataset {
    #[serde(default)]
    settings: JoinIndexSettings,
    segments: Vec<Vec<Option<JoinDocument>>>,
}

fn load(path: &PathBuf) -> Result<JoinIndex> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let dataset: Dataset = serde_json::from_slice(&data).context("parsing dataset")?;

    let index = JoinIndex::new(dataset.settings)?;
    for (i, docs) in dataset.segments.iter().enumerate() {
        let mut writer = index.writer(SegmentId::new(i as u64));
        for doc in docs {
            match doc {
                Some(doc) => {
                    writer.add_document(doc)?;
                }
                None => {
                    writer.add_unrelated();
                }
            }
        }
        index.add_segment(Arc::new(writer.finish()))?;
    }

    let snapshot = index.snapshot();
    info!(
        segments = snapshot.len(),
        docs = snapshot.total_docs(),
        snapshot = %snapshot.id(),
        "dataset loaded"
    );
    Ok(index)
}

fn display(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("joinindex v{}", joinindex::VERSION);

    let index = load(&args.dataset)?;

    match args.command {
        Command::Values => {
            let global = index.global_data()?;
            for view in global.segments() {
                for doc in 0..view.max_doc() {
                    let values: Vec<String> = view
                        .leaf()
                        .bytes_values(DocNo(doc))?
                        .iter()
                        .map(|v| display(v))
                        .collect();
                    println!(
                        "{}\t{}\t{}\t[{}]",
                        view.doc_base() + doc as u64,
                        view.segment_id(),
                        doc,
                        values.join(", ")
                    );
                }
            }
        }
        Command::Ordinals { join_type } => {
            let global = index.global_data()?;
            let Some(ordinals) = global.type_ordinals(&join_type) else {
                bail!("'{}' is not a join type of this dataset", join_type);
            };
            for (ord, key) in ordinals.dictionary().iter() {
                println!("{}\t{}", ord, display(key));
            }
        }
        Command::Sort {
            scope,
            mode,
            missing,
            order,
            size,
        } => {
            let scope = match scope.as_str() {
                "_all" => JoinScope::AllTypes,
                join_type => JoinScope::Type(join_type.to_string()),
            };
            let extractor = index.sort_extractor(scope, mode, missing, order)?;
            for hit in extractor.top_n(size)? {
                let value = match &hit.value {
                    SortValue::Key(key) => display(key),
                    SortValue::Missing => "-".to_string(),
                };
                println!("{}\t{}\t{}\t{}", hit.global_doc, hit.segment_id, hit.doc.as_u32(), value);
            }
        }
    }

    Ok(())
}
