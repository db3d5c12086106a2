mod app;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod library;
mod logging;
mod news;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use crate::news::types::{Category, Country};

#[derive(Parser, Debug)]
#[command(name = "newsdeck")]
#[command(about = "A terminal news reader with cached headlines")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/newsdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Two-letter country code, e.g. us or gb
  #[arg(short = 'C', long, value_parser = parse_country)]
  country: Option<String>,

  /// Category to open (general, world, business, technology, ...)
  #[arg(short = 'k', long)]
  category: Option<Category>,

  /// Ignore cached articles for the first load
  #[arg(short, long)]
  refresh: bool,
}

fn parse_country(code: &str) -> Result<String, String> {
  Country::find(code)
    .map(|c| c.code.to_string())
    .ok_or_else(|| format!("unsupported country '{}'", code))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init(&config::data_dir()?)?;

  let config = config::Config::load(args.config.as_deref())?;

  let options = app::StartOptions {
    country: args.country,
    category: args.category,
    force_refresh: args.refresh,
  };

  let mut app = app::App::new(config, options)?;
  app.run().await?;

  Ok(())
}
