//! `a3s-image config` command - print the image configuration.

use std::io::Write;
use std::path::PathBuf;

use a3s_image::Image;
use clap::Args;

use super::Context;

#[derive(Args)]
pub struct ConfigArgs {
    /// Image directory
    pub dir: PathBuf,

    /// Print the configuration in the OCI shape instead of the raw blob
    #[arg(long)]
    pub oci: bool,
}

pub async fn execute(args: ConfigArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (image, _) = super::open_image(&args.dir, ctx).await?;

    if args.oci {
        let config = image.parsed_manifest().oci_config().await?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let blob = image
        .config_blob()
        .await?
        .ok_or("schema 1 images have no config blob, use --oci")?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(blob)?;
    writeln!(stdout)?;
    Ok(())
}
