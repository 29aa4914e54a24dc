//! `a3s-image convert` command - rewrite an image in another manifest format.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use a3s_image::media_type::{DOCKER_V2_SCHEMA1_SIGNED, DOCKER_V2_SCHEMA2, OCI_IMAGE_MANIFEST};
use a3s_image::{
    manifest_digest, BlobInfo, Image, ImageDestination, ImageSource, UpdateInformation,
    UpdateOptions,
};
use a3s_image_core::ImageReference;
use clap::{Args, ValueEnum};

use super::Context;
use crate::layout::DirectoryDestination;

/// Default embedded reference for schema 1 output.
const DEFAULT_REFERENCE: &str = "localhost/image:latest";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Docker schema 1 (signed)
    Legacy,
    /// Docker schema 2
    Modern,
    /// OCI image manifest
    Oci,
}

impl Format {
    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Legacy => DOCKER_V2_SCHEMA1_SIGNED,
            Format::Modern => DOCKER_V2_SCHEMA2,
            Format::Oci => OCI_IMAGE_MANIFEST,
        }
    }
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Source image directory
    pub src: PathBuf,

    /// Destination image directory (created if missing)
    pub dst: PathBuf,

    /// Target manifest format
    #[arg(long, value_enum)]
    pub format: Format,

    /// Name and tag to embed in schema 1 output
    #[arg(long)]
    pub target_reference: Option<String>,
}

pub async fn execute(args: ConvertArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (image, source) = super::open_image(&args.src, ctx).await?;

    let target_reference = match (&args.target_reference, &ctx.reference) {
        (Some(reference), _) => ImageReference::parse(reference)?,
        (None, Some(reference)) => reference.clone(),
        (None, None) => ImageReference::parse(DEFAULT_REFERENCE)?,
    };
    let destination = Arc::new(DirectoryDestination::create(&args.dst, target_reference.clone()).await?);

    // Copy each distinct layer once; schema 1 may list the same blob repeatedly.
    let mut copied: HashMap<String, BlobInfo> = HashMap::new();
    let mut uploaded = Vec::new();
    for layer in image.layer_infos() {
        let info = match copied.get(layer.digest.as_str()) {
            Some(info) => info.clone(),
            None => {
                let (stream, _) = source.get_blob(&layer).await?;
                let stored = destination.put_blob(stream, &layer).await?;
                if stored.digest != layer.digest {
                    return Err(format!(
                        "layer {} has content with digest {}",
                        layer.digest, stored.digest
                    )
                    .into());
                }
                copied.insert(layer.digest.to_string(), stored.clone());
                stored
            }
        };
        uploaded.push(info);
    }

    let mut options = UpdateOptions {
        manifest_mime_type: Some(args.format.mime_type().to_string()),
        information_only: UpdateInformation {
            destination: Some(destination.clone() as Arc<dyn ImageDestination>),
            layer_infos: Some(uploaded),
            layer_diff_ids: None,
        },
        ..Default::default()
    };
    if args.format == Format::Legacy {
        options.embedded_reference = Some(target_reference);
    }
    if image.parsed_manifest().update_needs_diff_ids(&options) {
        tracing::warn!("Layer diff IDs are not available, the new config will carry empty rootfs diff IDs");
    }

    let updated = image.updated_image(&options).await?;
    if let Some(config) = updated.config_blob().await? {
        destination.put_bytes(config).await?;
    }
    let (manifest, mime_type) = updated.manifest().await?;
    destination.put_manifest(&manifest, &mime_type).await?;

    tracing::info!(
        src = %args.src.display(),
        dst = %destination.root().display(),
        %mime_type,
        "Converted image"
    );
    println!("{}", manifest_digest(&manifest)?);
    Ok(())
}
