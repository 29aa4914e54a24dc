//! `a3s-image digest` command.

use std::path::PathBuf;

use a3s_image::{manifest_digest, Image};
use clap::Args;

use super::Context;

#[derive(Args)]
pub struct DigestArgs {
    /// Image directory
    pub dir: PathBuf,
}

pub async fn execute(args: DigestArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (image, _) = super::open_image(&args.dir, ctx).await?;
    let (manifest, _) = image.manifest().await?;
    println!("{}", manifest_digest(&manifest)?);
    Ok(())
}
