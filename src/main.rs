// src/main.rs

use clap::Parser;
use env_logger::Builder;
use eyre::{Result, WrapErr};
use log::{debug, info, LevelFilter};

use imap_archive::cfg::config::{load_config, resolve_config_path};
use imap_archive::imap_source;
use imap_archive::render::WkHtmlToPdf;
use imap_archive::storage::FsWriter;
use imap_archive::{ArchivalPipeline, ArchiveSettings};

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the level picked here
    Builder::new()
        .filter_level(if cli.debug { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .try_init()
        .ok();

    let config_path = resolve_config_path(&cli.config);
    let mut config = load_config(&config_path)?;
    cli.apply(&mut config);
    config
        .validate()
        .wrap_err_with(|| format!("Invalid configuration in {}", config_path.display()))?;
    debug!("config: {:#?}", config);

    let domain = config.domain()?.to_string();
    let source = imap_source::connect(&domain, config.credentials()?, cli.debug)?;
    let renderer = WkHtmlToPdf::from_config(&config.renderer);
    let writer = FsWriter::new(&config.output_dir)?;

    info!("Writing artifacts to {}", config.output_dir.display());
    let mut pipeline = ArchivalPipeline::new(source, renderer, writer, ArchiveSettings::from(&config));
    pipeline.execute()?;

    Ok(())
}
