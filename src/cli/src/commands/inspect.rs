//! `a3s-image inspect` command - display image metadata as JSON.

use std::path::PathBuf;

use a3s_image::Image;
use clap::Args;

use super::Context;

#[derive(Args)]
pub struct InspectArgs {
    /// Image directory
    pub dir: PathBuf,
}

pub async fn execute(args: InspectArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (image, _) = super::open_image(&args.dir, ctx).await?;
    let info = image.inspect().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
