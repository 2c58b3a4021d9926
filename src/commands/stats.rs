//! Stats command - show store contents at a glance

use anyhow::Result;

use verdigris::config::{self, Config};
use verdigris::store::ExchangeStore;

pub fn execute() -> Result<()> {
    let config = Config::load()?;
    let store = ExchangeStore::open(
        config::data_dir()?.join("store"),
        config.embeddings.dimensions,
    )?;

    println!("Exchanges: {}", store.count()?);
    println!("Archives:  {}", store.archive_count()?);
    println!("Projects:  {}", store.project_count()?);

    match store.stored_model()? {
        Some((model, dimensions)) => {
            println!("Model:     {} ({} dimensions)", model, dimensions)
        }
        None => println!("Model:     (nothing indexed yet)"),
    }

    Ok(())
}
