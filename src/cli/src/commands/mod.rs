//! CLI command definitions and dispatch.

mod config;
mod convert;
mod digest;
mod inspect;
mod layers;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use a3s_image::SourcedImage;
use a3s_image_core::{ImageReference, Platform, ToolConfig};
use clap::{Parser, Subcommand};

use crate::layout::DirectorySource;

/// A3S Image - inspect and convert container image manifests.
#[derive(Parser)]
#[command(name = "a3s-image", version, about)]
pub struct Cli {
    /// Config file (default: ~/.a3s/image.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Operating system to select from manifest lists
    #[arg(long, global = true)]
    pub os: Option<String>,

    /// Architecture to select from manifest lists
    #[arg(long, global = true)]
    pub arch: Option<String>,

    /// Reference the source image was pulled by; a digest is verified
    #[arg(long, global = true)]
    pub reference: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Display image metadata as JSON
    Inspect(inspect::InspectArgs),
    /// List image layers
    Layers(layers::LayersArgs),
    /// Print the manifest digest
    Digest(digest::DigestArgs),
    /// Print the image configuration
    Config(config::ConfigArgs),
    /// Convert an image to another manifest format
    Convert(convert::ConvertArgs),
}

/// Settings shared by every command.
pub struct Context {
    pub platform: Platform,
    pub reference: Option<ImageReference>,
}

impl Context {
    /// Merge flags over the config file.
    pub fn new(cli: &Cli, config: &ToolConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let mut platform = config.effective_platform();
        if let Some(os) = &cli.os {
            platform.os = os.clone();
        }
        if let Some(arch) = &cli.arch {
            platform.architecture = arch.clone();
        }
        let reference = cli
            .reference
            .as_deref()
            .map(ImageReference::parse)
            .transpose()?;
        Ok(Self {
            platform,
            reference,
        })
    }
}

/// Open the image stored in `dir`.
pub(crate) async fn open_image(
    dir: &Path,
    ctx: &Context,
) -> Result<(SourcedImage, Arc<DirectorySource>), Box<dyn std::error::Error>> {
    let source = Arc::new(DirectorySource::new(dir, ctx.reference.clone()));
    let image = SourcedImage::from_source_for_platform(source.clone(), &ctx.platform).await?;
    Ok((image, source))
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: &ToolConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new(&cli, config)?;
    match cli.command {
        Command::Inspect(args) => inspect::execute(args, &ctx).await,
        Command::Layers(args) => layers::execute(args, &ctx).await,
        Command::Digest(args) => digest::execute(args, &ctx).await,
        Command::Config(args) => config::execute(args, &ctx).await,
        Command::Convert(args) => convert::execute(args, &ctx).await,
    }
}
