use crate::config::{Theme, load_config};
use crate::engine::CommandEngine;
use crate::protocol::Service;
use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mmds",
    version,
    about = "Persistent Mermaid render sidecar (line-delimited JSON over stdio)"
)]
pub struct Args {
    /// External render command (diagram code on stdin, SVG on stdout)
    #[arg(short = 'e', long = "engine")]
    pub engine: Option<String>,

    /// Extra argument passed to the render command before the block id
    /// (repeatable)
    #[arg(long = "engine-arg")]
    pub engine_args: Vec<String>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Initial theme (default, dark, neutral, forest, base)
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    if let Some(name) = args.theme.as_deref() {
        config.theme = Theme::parse(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown theme: {name}"))?;
    }

    let (program, engine_args) = match (args.engine, config.engine) {
        (Some(program), _) => (program, args.engine_args),
        (None, Some(command)) => (command.program, command.args),
        (None, None) => {
            return Err(anyhow::anyhow!(
                "No render engine configured (pass --engine or set one in the config file)"
            ));
        }
    };

    let engine = CommandEngine::new(program, engine_args);
    let mut service = Service::new(engine, config.theme)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    service.serve(stdin.lock(), stdout.lock())?;
    Ok(())
}
