//! Query commands - Outgoing/incoming lookups and identifier conversion

use anyhow::{Context, Result};
use citegraph_config::CiteGraphConfig;
use citegraph_core::index::INDEX_DB_FILE;
use citegraph_core::{Identifier, Vocabulary, VocabularyCache};
use clap::Args;

use super::{open_cache, parse_vocabulary};
use crate::progress::{clear_spinner, spinner};
use crate::GlobalOptions;

/// Which side of the citation relation to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// What the identifier cites
    Outgoing,
    /// What cites the identifier
    Incoming,
}

/// Arguments for the outgoing and incoming commands
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Compact URI, e.g. pmid:33917884 or doi:10.1038/nature12373
    curie: String,

    /// Output as a JSON array
    #[arg(long)]
    json: bool,
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Compact URI to convert
    curie: String,

    /// Target vocabulary (omid, pmid, doi)
    #[arg(value_parser = parse_vocabulary)]
    to: Vocabulary,
}

fn index_missing(cache: &VocabularyCache, vocabulary: Vocabulary) -> bool {
    !cache
        .layout()
        .index_dir(vocabulary)
        .join(INDEX_DB_FILE)
        .is_file()
}

/// Execute an outgoing or incoming lookup
pub fn execute(
    args: QueryArgs,
    direction: Direction,
    config: &CiteGraphConfig,
    global: &GlobalOptions,
) -> Result<()> {
    let identifier = Identifier::parse(&args.curie)?;
    let cache = open_cache(config, false)?;

    // First use of a vocabulary builds its index, which can take a while
    let pb = if index_missing(&cache, identifier.vocabulary) {
        spinner(
            &format!("Building {} index (first use)", identifier.vocabulary),
            global.quiet,
        )
    } else {
        None
    };
    let result = match direction {
        Direction::Outgoing => cache.outgoing(&identifier),
        Direction::Incoming => cache.incoming(&identifier),
    };
    clear_spinner(pb);
    let neighbours = result.with_context(|| format!("Lookup failed for {}", identifier))?;

    let rendered: Vec<String> = neighbours.iter().map(ToString::to_string).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        for line in rendered {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Execute the convert command
pub fn execute_convert(args: ConvertArgs, config: &CiteGraphConfig) -> Result<()> {
    let identifier = Identifier::parse(&args.curie)?;
    let cache = open_cache(config, false)?;

    match cache
        .convert(&identifier, args.to)
        .with_context(|| format!("Conversion failed for {}", identifier))?
    {
        Some(converted) => {
            println!("{}", converted);
            Ok(())
        }
        None => anyhow::bail!("{} has no {} identifier", identifier, args.to),
    }
}
