//! `a3s-image layers` command.

use std::path::PathBuf;

use a3s_image::Image;
use clap::Args;

use super::Context;
use crate::output;

#[derive(Args)]
pub struct LayersArgs {
    /// Image directory
    pub dir: PathBuf,

    /// Show full digests
    #[arg(long)]
    pub no_trunc: bool,
}

pub async fn execute(args: LayersArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (image, _) = super::open_image(&args.dir, ctx).await?;

    let mut table = output::new_table(&["#", "DIGEST", "SIZE"]);
    for (index, layer) in image.layer_infos().iter().enumerate() {
        let digest = layer.digest.as_str();
        let digest = if args.no_trunc {
            digest
        } else {
            output::short_digest(digest)
        };
        table.add_row(vec![
            index.to_string(),
            digest.to_string(),
            output::format_size(layer.size),
        ]);
    }

    println!("{table}");
    Ok(())
}
