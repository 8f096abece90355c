use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

use bioseek::config::EngineConfig;
use bioseek::models::{truncate_abstract, PaperMetadata};
use bioseek::search::{RefineRequest, SearchEngine};
use cli::Args;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::new(&args.index_dir).apply_env()?;
    config.top_k = args.top_k;
    config.max_results = args.max_results;
    config.deadline_ms = args.timeout * 1000;

    let engine = SearchEngine::load(config).context("failed to load model bundle")?;

    let categories = if args.categories.is_empty() {
        None
    } else {
        Some(args.categories.as_slice())
    };
    let response = engine.search(&args.query, categories, args.deep)?;

    // Follow-up flags filter the ranked list without touching the shards
    let request = RefineRequest {
        journals: (!args.journals.is_empty()).then(|| args.journals.clone()),
        pubyears: args.years.as_ref().map(|range| (range[0], Some(range[1]))),
        categories: None,
    };
    let has_filters = request.journals.is_some() || request.pubyears.is_some();
    let (results, facets) = if has_filters {
        let refined = SearchEngine::refine(&response.results, &request)?;
        (refined.results, refined.facets)
    } else {
        let facets = SearchEngine::build_facets(&response.results);
        (response.results.clone(), facets)
    };

    if args.format == "json" {
        let payload = serde_json::json!({
            "scores": response.scores,
            "results": results,
            "journals": facets.journals,
            "pubyears": facets.pubyears,
            "categories": facets.categories,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    for (rank, paper) in results.iter().enumerate() {
        print_result(rank, paper, &response);
    }
    Ok(())
}

fn print_result(rank: usize, paper: &PaperMetadata, response: &bioseek::SearchResponse) {
    let rank_label = format!("{}.", rank + 1);
    println!("{} {}", rank_label.as_str().dimmed(), paper.title.as_str().bold());
    // The score index only lines up on unfiltered output
    if let Some(score) = response
        .results
        .iter()
        .position(|r| r.doi == paper.doi)
        .and_then(|idx| response.scores.get(idx))
    {
        println!("   {} {:.4}", "score".dimmed(), score);
    }
    println!(
        "   {} ({}), {}",
        paper.journal_name.as_str().green(),
        paper.year,
        paper.doi_url.as_str().blue().underline()
    );
    if let Some(text) = &paper.abstract_text {
        println!("   {}", truncate_abstract(text, 300));
    }
    println!();
}
