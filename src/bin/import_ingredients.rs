//! Seeds the ingredient table from a `name,measurement_unit` file.
//!
//! ```sh
//! import-ingredients data/ingredients.csv
//! ```

use std::{env, fs::read_to_string};

use foodgram::{actions::import_ingredients, import::parse_ingredient_seeds, server::state::AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(path) = env::args().nth(1) else {
        return Err("usage: import-ingredients <file>".into());
    };

    let contents = read_to_string(&path)?;
    let seeds = parse_ingredient_seeds(&contents)
        .map_err(|(line, e)| format!("{path}:{line}: {e}"))?;
    log::info!("Read {} ingredients from {path}", seeds.len());

    let state = AppState::new(Config::load()?).await?;
    let inserted = import_ingredients(&seeds, state.cache.clone(), &state.pool)
        .await
        .map_err(|e| format!("Import failed: {}", e.info.unwrap_or_default()))?;

    log::info!(
        "Added {inserted} ingredients, {} were already present",
        seeds.len() as u64 - inserted
    );

    Ok(())
}
