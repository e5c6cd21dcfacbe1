//! Build command - Build or open per-vocabulary indexes

use anyhow::{bail, Context, Result};
use citegraph_config::CiteGraphConfig;
use citegraph_core::Vocabulary;
use clap::Args;
use tracing::info;

use super::{open_cache, parse_vocabulary, print_info};
use crate::progress::{finish_spinner, finish_spinner_error, spinner};
use crate::GlobalOptions;

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Vocabularies to build (omid, pmid, doi)
    #[arg(value_parser = parse_vocabulary)]
    vocabularies: Vec<Vocabulary>,

    /// Build all vocabularies
    #[arg(long, conflicts_with = "vocabularies")]
    all: bool,

    /// Rebuild maps, edge streams and indexes even if they exist
    #[arg(long)]
    force: bool,
}

impl BuildArgs {
    fn selected(&self) -> Vec<Vocabulary> {
        if self.all {
            return Vocabulary::ALL.to_vec();
        }
        let mut selected = Vec::new();
        for vocabulary in &self.vocabularies {
            if !selected.contains(vocabulary) {
                selected.push(*vocabulary);
            }
        }
        selected
    }
}

/// Execute the build command
pub fn execute(args: BuildArgs, config: &CiteGraphConfig, global: &GlobalOptions) -> Result<()> {
    let vocabularies = args.selected();
    if vocabularies.is_empty() {
        bail!("No vocabulary given; name one or more of omid, pmid, doi, or pass --all");
    }

    let cache = open_cache(config, args.force)?;
    let names: Vec<String> = vocabularies.iter().map(|v| v.to_string()).collect();
    info!(vocabularies = %names.join(","), force = args.force, "Starting build");

    let pb = spinner(&format!("Building indexes: {}", names.join(", ")), global.quiet);
    if let Err(e) = cache.warm(&vocabularies) {
        finish_spinner_error(pb, "Build failed");
        return Err(e).context("Failed to build indexes");
    }
    finish_spinner(pb, &format!("Indexes ready: {}", names.join(", ")));

    for vocabulary in vocabularies {
        let stats = cache
            .resolve(vocabulary)
            .and_then(|index| index.stats())
            .with_context(|| format!("Failed to read {} index stats", vocabulary))?;
        print_info(
            &format!(
                "{}: {} edges ({})",
                vocabulary,
                stats.edge_count,
                stats.path.display()
            ),
            global.quiet,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(vocabularies: Vec<Vocabulary>, all: bool) -> BuildArgs {
        BuildArgs {
            vocabularies,
            all,
            force: false,
        }
    }

    #[test]
    fn test_all_selects_every_vocabulary() {
        assert_eq!(args(vec![], true).selected(), Vocabulary::ALL.to_vec());
    }

    #[test]
    fn test_selection_is_deduplicated_in_order() {
        let selected = args(
            vec![Vocabulary::Doi, Vocabulary::Pubmed, Vocabulary::Doi],
            false,
        )
        .selected();
        assert_eq!(selected, vec![Vocabulary::Doi, Vocabulary::Pubmed]);
    }
}
