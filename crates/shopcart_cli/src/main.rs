//! CLI smoke entry point.
//!
//! Usage: `shopcart_cli [config.json]`. Without a config the store is
//! in-memory. An empty store is seeded with demo categories, then the
//! catalog is printed.

use log::warn;
use shopcart_core::{
    init_from_config, Category, CategoryService, Repository, SqliteUnitOfWork, StoreConfig,
    UnitOfWork,
};
use std::error::Error;
use std::process::ExitCode;

const DEMO_CATEGORIES: &[(&str, i64)] = &[("Books", 1), ("Games", 2), ("Music", 3)];

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("shopcart_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Err(err) = init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let uow = SqliteUnitOfWork::open(&config)?;
    let categories = CategoryService::new(&uow);

    if categories.list_categories()?.is_empty() {
        for (name, display_order) in DEMO_CATEGORIES {
            uow.category().add(&Category::new(*name, *display_order))?;
        }
        uow.save()?;
    }

    println!("shopcart_core version={}", shopcart_core::core_version());
    for category in categories.list_categories()? {
        println!(
            "category id={} order={} name={}",
            category.id, category.display_order, category.name
        );
    }

    if let Err(err) = uow.dispose() {
        warn!("event=cli_shutdown module=cli status=error error={err}");
    }
    Ok(())
}
