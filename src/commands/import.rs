//! Import command - load exchange records into the store
//!
//! Reads already-parsed exchange records from a JSONL file (one JSON
//! object per line) and indexes them: each combined user+assistant text
//! is embedded and the vector added to the USearch index. Parsing raw
//! transcript logs into records happens upstream of this command.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;
use uuid::Uuid;

use verdigris::config::{self, Config};
use verdigris::embeddings;
use verdigris::store::{Exchange, ExchangeStore};

pub fn execute(file: &Path) -> Result<()> {
    let config = Config::load()?;
    let mut store = ExchangeStore::open(
        config::data_dir()?.join("store"),
        config.embeddings.dimensions,
    )?;

    match store.stored_model()? {
        Some((stored, _)) if stored != config.embeddings.model => {
            bail!(
                "Store was indexed with model '{}' but config selects '{}'. Delete the store directory to re-import.",
                stored,
                config.embeddings.model
            );
        }
        Some(_) => {}
        None => store.record_model(&config.embeddings.model, config.embeddings.dimensions)?,
    }

    println!("Loading embedding model...");
    let embedder = embeddings::resident()?;

    let reader = BufReader::new(
        std::fs::File::open(file)
            .with_context(|| format!("Failed to open import file: {}", file.display()))?,
    );

    let mut imported = 0usize;
    let mut skipped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut exchange: Exchange = serde_json::from_str(&line)
            .with_context(|| format!("Malformed exchange record on line {}", line_no + 1))?;

        if exchange.id.is_empty() {
            exchange.id = Uuid::new_v4().to_string();
        }

        let embedding = {
            let mut embedder = embedder.lock();
            embedder.embed(&exchange.combined_text())?
        };

        match store.insert(&exchange, &embedding) {
            Ok(()) => imported += 1,
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                // Already indexed; exchanges are immutable, skip
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    store.save_index()?;

    println!("Imported {} exchanges ({} already indexed).", imported, skipped);
    println!("Store now holds {} exchanges.", store.count()?);

    Ok(())
}
