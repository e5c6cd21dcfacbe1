//! Status command - Show artifact presence and index stats per vocabulary

use std::path::PathBuf;

use anyhow::Result;
use citegraph_config::CiteGraphConfig;
use citegraph_core::checkpoint::artifact_exists;
use citegraph_core::{DataLayout, IndexStats, IndexStore, SqliteIndexStore, Vocabulary};
use clap::Args;
use serde::Serialize;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Artifact state of one vocabulary
#[derive(Debug, Serialize)]
struct VocabularyStatus {
    vocabulary: Vocabulary,
    /// `None` for the native vocabulary, which has no map
    map: Option<bool>,
    edges: bool,
    index: IndexState,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
enum IndexState {
    Missing,
    Ready(IndexStats),
    Corrupt { reason: String },
}

fn inspect(
    layout: &DataLayout,
    store: &SqliteIndexStore,
    vocabulary: Vocabulary,
) -> VocabularyStatus {
    let dir = layout.index_dir(vocabulary);
    let index = if !store.exists(&dir) {
        IndexState::Missing
    } else {
        match store.open(&dir, vocabulary).and_then(|index| index.stats()) {
            Ok(stats) => IndexState::Ready(stats),
            Err(e) => IndexState::Corrupt {
                reason: e.to_string(),
            },
        }
    };

    VocabularyStatus {
        vocabulary,
        map: layout.map_path(vocabulary).map(|p| artifact_exists(&p)),
        edges: artifact_exists(&layout.edges_path(vocabulary)),
        index,
    }
}

fn presence(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "missing"
    }
}

/// Execute the status command
pub fn execute(args: StatusArgs, config: &CiteGraphConfig) -> Result<()> {
    let layout = DataLayout::new(&config.storage.data_dir);
    let store = SqliteIndexStore::default();
    let statuses: Vec<VocabularyStatus> = Vocabulary::ALL
        .into_iter()
        .map(|vocabulary| inspect(&layout, &store, vocabulary))
        .collect();

    if args.json {
        let status = serde_json::json!({
            "data_dir": layout.root(),
            "archives": {
                "metadata": config.archives.metadata,
                "citations": config.archives.citations,
            },
            "vocabularies": statuses,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Data directory: {}", layout.root().display());
    println!(
        "Metadata archive: {}",
        config
            .archives
            .metadata
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not configured)".to_string())
    );
    let citations: Vec<&PathBuf> = config.archives.citations.iter().collect();
    if citations.is_empty() {
        println!("Citation archives: (not configured)");
    } else {
        println!("Citation archives:");
        for path in citations {
            println!("  {}", path.display());
        }
    }
    println!();

    for status in statuses {
        println!("{}", status.vocabulary);
        if let Some(map) = status.map {
            println!("  identifier map: {}", presence(map));
        }
        println!("  edge stream:    {}", presence(status.edges));
        match status.index {
            IndexState::Missing => println!("  index:          missing"),
            IndexState::Ready(stats) => println!(
                "  index:          {} edges (schema {})",
                stats.edge_count, stats.schema_version
            ),
            IndexState::Corrupt { reason } => println!("  index:          corrupt ({})", reason),
        }
    }

    Ok(())
}
