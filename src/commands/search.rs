//! Search command - query the exchange archive
//!
//! One positional phrase runs a single hybrid search; 2-5 phrases run a
//! conjunctive concept search (always vector-based, mode is ignored).

use anyhow::Result;

use verdigris::assemble::{attach_summaries, AssembledResult};
use verdigris::search::{
    ConceptSearchResult, QueryInput, SearchMode, SearchOptions, SearchOutcome,
};
use verdigris::RecallEngine;

pub fn execute(
    mut query: Vec<String>,
    mode: &str,
    limit: usize,
    after: Option<String>,
    before: Option<String>,
    summaries: bool,
) -> Result<()> {
    let input = if query.len() == 1 {
        QueryInput::Single(query.remove(0))
    } else {
        QueryInput::Concepts(query)
    };

    let options = SearchOptions {
        mode: mode.parse::<SearchMode>()?,
        limit,
        after,
        before,
    };

    let engine = RecallEngine::open_default()?;

    match engine.run(&input, &options)? {
        SearchOutcome::Single(results) => {
            if let QueryInput::Single(ref q) = input {
                println!("Query: \"{}\" (mode: {})\n", q, mode);
            }
            print_single(results, summaries);
        }
        SearchOutcome::Concepts(results) => {
            if let QueryInput::Concepts(ref concepts) = input {
                println!("Concepts: {}\n", concepts.join(" AND "));
            }
            print_concepts(results);
        }
    }

    Ok(())
}

fn print_single(results: Vec<verdigris::search::SearchResult>, summaries: bool) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    println!("Found {} results:\n", results.len());
    println!("{}", "─".repeat(60));

    let assembled: Vec<AssembledResult> = if summaries {
        attach_summaries(results)
    } else {
        results
            .into_iter()
            .map(|result| AssembledResult {
                result,
                summary: None,
            })
            .collect()
    };

    for (i, entry) in assembled.iter().enumerate() {
        let r = &entry.result;
        let score = match r.similarity {
            Some(s) => format!("similarity: {:.3}", s),
            None => "text match".to_string(),
        };

        println!(
            "\n[{}] {} ({}, {}) ({})",
            i + 1,
            r.exchange.id,
            r.exchange.project,
            r.exchange.timestamp,
            score
        );
        println!("    {}", r.snippet);
        println!(
            "    {}:{}-{}",
            r.exchange.archive_path, r.exchange.line_start, r.exchange.line_end
        );
        if let Some(ref summary) = entry.summary {
            println!("    Summary: {}", summary);
        }
    }

    println!("\n{}", "─".repeat(60));
}

fn print_concepts(results: Vec<ConceptSearchResult>) {
    if results.is_empty() {
        println!("No conversations matched every concept.");
        return;
    }

    println!("Found {} conversations:\n", results.len());
    println!("{}", "─".repeat(60));

    for (i, r) in results.iter().enumerate() {
        let per_concept = r
            .concept_similarities
            .iter()
            .map(|s| format!("{:.3}", s))
            .collect::<Vec<_>>()
            .join(" | ");

        println!(
            "\n[{}] {} (avg: {:.3}) ({})",
            i + 1,
            r.exchange.archive_path,
            r.average_similarity,
            per_concept
        );
        println!("    {}", r.snippet);
    }

    println!("\n{}", "─".repeat(60));
}
