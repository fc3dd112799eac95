mod app;
mod cli;
mod config;
mod engine;
mod error;
mod game;
mod library;
mod metadata;
mod modlist;
mod sorted;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
