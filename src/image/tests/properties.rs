//! Invariants, round-trip laws and boundary behaviors of parsed manifests.

mod common;

use std::sync::Arc;

use a3s_image::media_type::{
    DOCKER_V2_LIST, DOCKER_V2_SCHEMA1_SIGNED, DOCKER_V2_SCHEMA2, OCI_IMAGE_MANIFEST,
};
use a3s_image::{
    BlobInfo, Image, ImageDestination, ImageSource, MemoryImage, ParsedManifest, SourcedImage,
    UpdateInformation, UpdateOptions, GZIPPED_EMPTY_LAYER_DIGEST,
};
use a3s_image_core::{Digest, ImageError, ImageReference, Platform};
use common::{
    fake_digest, schema1_manifest, schema2_config, schema2_manifest, v1_id, MemoryDestination,
    MemorySource,
};
use tokio_util::sync::CancellationToken;

fn empty_layer() -> Digest {
    Digest::new(GZIPPED_EMPTY_LAYER_DIGEST)
}

/// Three-entry schema 1 image whose middle entry is a throwaway.
fn legacy_bytes() -> Vec<u8> {
    schema1_manifest(&[
        (v1_id('c'), v1_id('b'), fake_digest('2'), false),
        (v1_id('b'), v1_id('a'), empty_layer(), true),
        (v1_id('a'), String::new(), fake_digest('0'), false),
    ])
}

async fn legacy() -> ParsedManifest {
    ParsedManifest::parse(None, &legacy_bytes(), DOCKER_V2_SCHEMA1_SIGNED)
        .await
        .unwrap()
}

/// Schema 2 image with its config blob served by a source.
async fn modern() -> (ParsedManifest, Arc<MemorySource>, Vec<u8>) {
    let config = schema2_config(&[("base", false), ("env", true), ("app", false)]);
    let manifest = schema2_manifest(&config, &[(fake_digest('0'), 100), (fake_digest('2'), 200)]);
    let source = Arc::new(MemorySource::new(manifest.clone(), DOCKER_V2_SCHEMA2).with_blob(config.clone()));
    let parsed = ParsedManifest::parse(
        Some(source.clone() as Arc<dyn ImageSource>),
        &manifest,
        DOCKER_V2_SCHEMA2,
    )
    .await
    .unwrap();
    (parsed, source, config)
}

async fn convert(parsed: &ParsedManifest, mime_type: &str) -> ParsedManifest {
    parsed
        .updated_image(&UpdateOptions {
            manifest_mime_type: Some(mime_type.to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
}

async fn assert_reparses_equal(parsed: &ParsedManifest, reference: &ImageReference) {
    let bytes = parsed.serialize().unwrap();
    let reparsed = ParsedManifest::parse(None, &bytes, parsed.mime_type()).await.unwrap();
    assert_eq!(reparsed.config_info(), parsed.config_info());
    assert_eq!(reparsed.layer_infos(), parsed.layer_infos());
    assert_eq!(
        reparsed.embedded_reference_conflicts(reference),
        parsed.embedded_reference_conflicts(reference)
    );
}

#[tokio::test]
async fn test_serialize_reparse_every_dialect() {
    let reference = ImageReference::parse("docker.io/library/busybox:latest").unwrap();
    let legacy = legacy().await;
    assert!(!legacy.embedded_reference_conflicts(&reference));
    assert_reparses_equal(&legacy, &reference).await;

    let (modern, _, _) = modern().await;
    assert_reparses_equal(&modern, &reference).await;

    let oci = convert(&modern, OCI_IMAGE_MANIFEST).await;
    assert_reparses_equal(&oci, &reference).await;
}

#[tokio::test]
async fn test_config_blob_is_cached_and_verified() {
    let (modern, source, config) = modern().await;
    let first = modern.config_blob().await.unwrap().unwrap().to_vec();
    let second = modern.config_blob().await.unwrap().unwrap().to_vec();
    assert_eq!(first, config);
    assert_eq!(first, second);
    assert_eq!(Digest::from_bytes(&first), modern.config_info().digest);
    assert_eq!(source.blob_requests.lock().len(), 1);
}

#[tokio::test]
async fn test_layer_count_matches_serialized_form() {
    let (modern, _, _) = modern().await;
    let value: serde_json::Value = serde_json::from_slice(&modern.serialize().unwrap()).unwrap();
    assert_eq!(value["layers"].as_array().unwrap().len(), modern.layer_infos().len());

    let legacy = legacy().await;
    let value: serde_json::Value = serde_json::from_slice(&legacy.serialize().unwrap()).unwrap();
    assert_eq!(value["history"].as_array().unwrap().len(), legacy.layer_infos().len());
    assert_eq!(value["fsLayers"].as_array().unwrap().len(), legacy.layer_infos().len());
}

#[tokio::test]
async fn test_update_leaves_original_unchanged() {
    let (modern, _, _) = modern().await;
    let before = modern.serialize().unwrap();
    let infos_before = modern.layer_infos();

    let options = UpdateOptions {
        layer_infos: Some(vec![
            BlobInfo::new(fake_digest('7'), 7),
            BlobInfo::new(fake_digest('8'), 8),
        ]),
        manifest_mime_type: Some(OCI_IMAGE_MANIFEST.to_string()),
        ..Default::default()
    };
    let updated = modern.updated_image(&options).await.unwrap();
    assert_eq!(updated.mime_type(), OCI_IMAGE_MANIFEST);
    assert_eq!(modern.serialize().unwrap(), before);
    assert_eq!(modern.layer_infos(), infos_before);
    assert_eq!(modern.mime_type(), DOCKER_V2_SCHEMA2);

    let legacy = legacy().await;
    let infos_before = legacy.layer_infos();
    let failed = legacy
        .updated_image(&UpdateOptions {
            layer_infos: Some(vec![BlobInfo::new(fake_digest('9'), 1)]),
            ..Default::default()
        })
        .await;
    assert!(matches!(failed, Err(ImageError::LayerCountMismatch { expected: 3, actual: 1 })));
    assert_eq!(legacy.layer_infos(), infos_before);
}

#[tokio::test]
async fn test_updated_layer_infos_are_applied_in_order() {
    let (modern, _, _) = modern().await;
    let oci = convert(&modern, OCI_IMAGE_MANIFEST).await;

    let mut first = BlobInfo::new(fake_digest('5'), 55);
    first.urls = vec!["https://mirror.example.com/5".to_string()];
    first
        .annotations
        .insert("org.opencontainers.image.title".to_string(), "base".to_string());
    let second = BlobInfo::new(fake_digest('6'), 66);
    let infos = vec![first, second];

    let updated = oci
        .updated_image(&UpdateOptions {
            layer_infos: Some(infos.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.layer_infos(), infos);

    // schema 2 has no annotations to carry.
    let updated = modern
        .updated_image(&UpdateOptions {
            layer_infos: Some(infos.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    let layers = updated.layer_infos();
    assert_eq!(layers[0].digest, infos[0].digest);
    assert_eq!(layers[0].size, 55);
    assert_eq!(layers[0].urls, infos[0].urls);
    assert!(layers[0].annotations.is_empty());
    assert_eq!(layers[1].digest, infos[1].digest);
}

#[tokio::test]
async fn test_legacy_modern_legacy_round_trip() {
    let legacy = legacy().await;
    let original: Vec<Digest> = legacy.layer_infos().into_iter().map(|l| l.digest).collect();

    let uploaded: Vec<BlobInfo> = original
        .iter()
        .enumerate()
        .map(|(i, digest)| BlobInfo::new(digest.clone(), 100 * (i as i64 + 1)))
        .collect();
    let diff_ids: Vec<Digest> = (0..original.len())
        .map(|i| Digest::from_bytes(format!("diff {}", i).as_bytes()))
        .collect();

    let options = UpdateOptions {
        manifest_mime_type: Some(DOCKER_V2_SCHEMA2.to_string()),
        information_only: UpdateInformation {
            layer_infos: Some(uploaded),
            layer_diff_ids: Some(diff_ids.clone()),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(legacy.update_needs_diff_ids(&options));
    let modern = legacy.updated_image(&options).await.unwrap();

    // The throwaway entry has no layer in schema 2.
    let modern_layers = modern.layer_infos();
    assert_eq!(modern_layers.len(), 2);
    assert_eq!(modern_layers[0].size, 100);
    assert_eq!(modern_layers[1].size, 300);
    let config = modern.oci_config().await.unwrap();
    assert_eq!(
        config.rootfs().diff_ids(),
        &vec![diff_ids[0].to_string(), diff_ids[2].to_string()]
    );
    assert_eq!(config.history().len(), 3);
    let throwaway = serde_json::to_value(&config.history()[1]).unwrap();
    assert_eq!(throwaway["empty_layer"], true);

    let destination = Arc::new(MemoryDestination::new("docker.io/library/busybox:latest"));
    let back = modern
        .updated_image(&UpdateOptions {
            manifest_mime_type: Some(DOCKER_V2_SCHEMA1_SIGNED.to_string()),
            information_only: UpdateInformation {
                destination: Some(destination.clone() as Arc<dyn ImageDestination>),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();
    let round_tripped: Vec<Digest> = back.layer_infos().into_iter().map(|l| l.digest).collect();
    assert_eq!(round_tripped, original);
    assert_eq!(destination.upload_count(), 1);
}

#[tokio::test]
async fn test_modern_oci_modern_keeps_config_bytes() {
    let (modern, _, config) = modern().await;
    let oci = convert(&modern, OCI_IMAGE_MANIFEST).await;
    let back = convert(&oci, DOCKER_V2_SCHEMA2).await;

    let sizes = |m: &ParsedManifest| -> Vec<(Digest, i64)> {
        m.layer_infos().into_iter().map(|l| (l.digest, l.size)).collect()
    };
    assert_eq!(sizes(&back), sizes(&modern));
    assert_eq!(back.config_info().digest, modern.config_info().digest);
    assert_eq!(back.config_blob().await.unwrap().unwrap(), config.as_slice());
    assert_eq!(oci.config_blob().await.unwrap().unwrap(), config.as_slice());
}

#[tokio::test]
async fn test_empty_update_preserves_layers_in_every_dialect() {
    let (modern, _, _) = modern().await;
    let oci = convert(&modern, OCI_IMAGE_MANIFEST).await;
    for parsed in [legacy().await, modern, oci] {
        let updated = parsed.updated_image(&UpdateOptions::default()).await.unwrap();
        assert_eq!(updated.layer_infos(), parsed.layer_infos());
        assert_eq!(updated.mime_type(), parsed.mime_type());

        let same_dialect = parsed
            .updated_image(&UpdateOptions {
                manifest_mime_type: Some(parsed.mime_type().to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(same_dialect.layer_infos(), parsed.layer_infos());
    }
}

#[tokio::test]
async fn test_list_without_matching_platform() {
    let list = serde_json::to_vec(&serde_json::json!({
        "schemaVersion": 2,
        "mediaType": DOCKER_V2_LIST,
        "manifests": [
            { "mediaType": DOCKER_V2_SCHEMA2, "size": 1, "digest": fake_digest('1'),
              "platform": { "architecture": "arm64", "os": "linux" } },
        ],
    }))
    .unwrap();
    let source = Arc::new(MemorySource::new(list, DOCKER_V2_LIST));

    let err = SourcedImage::from_source_for_platform(source.clone(), &Platform::new("linux", "amd64"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ImageError::NoPlatformMatch { .. }));
    assert!(err.to_string().contains("no supported platform"));
    assert!(source.target_requests.lock().is_empty());
}

#[tokio::test]
async fn test_config_blob_digest_mismatch() {
    let config = schema2_config(&[("base", false)]);
    let manifest = schema2_manifest(&config, &[(fake_digest('0'), 100)]);
    let source = Arc::new(
        MemorySource::new(manifest, DOCKER_V2_SCHEMA2)
            .with_blob_at(&Digest::from_bytes(&config), b"{\"tampered\":true}".to_vec()),
    );
    let image = SourcedImage::from_source(source).await.unwrap();

    let err = image.config_blob().await.unwrap_err();
    assert!(matches!(err, ImageError::DigestMismatch { .. }));
    // Nothing was cached; the next call fails the same way.
    assert!(image.config_blob().await.is_err());
}

#[tokio::test]
async fn test_legacy_base_with_parent_is_rejected() {
    let manifest = schema1_manifest(&[
        (v1_id('b'), v1_id('a'), fake_digest('1'), false),
        (v1_id('a'), v1_id('f'), fake_digest('0'), false),
    ]);
    let err = ParsedManifest::parse(None, &manifest, DOCKER_V2_SCHEMA1_SIGNED)
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::MalformedManifest(_)));
}

#[tokio::test]
async fn test_legacy_non_adjacent_duplicate_is_rejected() {
    let manifest = schema1_manifest(&[
        (v1_id('a'), v1_id('b'), fake_digest('2'), false),
        (v1_id('b'), v1_id('a'), fake_digest('1'), false),
        (v1_id('a'), String::new(), fake_digest('0'), false),
    ]);
    let err = ParsedManifest::parse(None, &manifest, DOCKER_V2_SCHEMA1_SIGNED)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("appears multiple times"));
}

#[tokio::test]
async fn test_modern_to_legacy_with_empty_history_is_rejected() {
    let config = schema2_config(&[]);
    let manifest = schema2_manifest(&config, &[]);
    let source = Arc::new(MemorySource::new(manifest, DOCKER_V2_SCHEMA2).with_blob(config));
    let image = SourcedImage::from_source(source).await.unwrap();

    let destination = Arc::new(MemoryDestination::new("docker.io/library/empty:latest"));
    let err = image
        .updated_image(&UpdateOptions {
            manifest_mime_type: Some(DOCKER_V2_SCHEMA1_SIGNED.to_string()),
            information_only: UpdateInformation {
                destination: Some(destination.clone() as Arc<dyn ImageDestination>),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ImageError::MalformedManifest(_)));
    assert_eq!(destination.upload_count(), 0);
}

#[tokio::test]
async fn test_memory_image_has_no_signatures_or_size() {
    let (modern, _, _) = modern().await;
    let image = MemoryImage::new(modern);
    assert_eq!(image.size(), -1);
    let err = image.signatures(&CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("not supported for in-memory images"));
}

#[tokio::test]
async fn test_updated_sourced_image_drops_reference() {
    let config = schema2_config(&[("base", false)]);
    let manifest = schema2_manifest(&config, &[(fake_digest('0'), 100)]);
    let source = Arc::new(
        MemorySource::new(manifest, DOCKER_V2_SCHEMA2)
            .with_reference("registry.example.com/app:v1")
            .with_blob(config)
            .with_signature(b"sig"),
    );
    let image = SourcedImage::from_source(source.clone()).await.unwrap();
    assert!(image.reference().is_some());

    let cancel = CancellationToken::new();
    assert_eq!(image.signatures(&cancel).await.unwrap(), vec![b"sig".to_vec()]);
    assert_eq!(image.signatures(&cancel).await.unwrap(), vec![b"sig".to_vec()]);
    assert_eq!(*source.signature_requests.lock(), 1);

    let updated = image.updated_image(&UpdateOptions::default()).await.unwrap();
    assert!(updated.reference().is_none());
    assert!(updated.signatures(&cancel).await.is_err());
    assert_eq!(updated.layer_infos(), image.layer_infos());
}

#[tokio::test]
async fn test_sourced_inspect_lists_layers() {
    let config = schema2_config(&[("base", false), ("env", true), ("app", false)]);
    let manifest = schema2_manifest(&config, &[(fake_digest('0'), 100), (fake_digest('2'), 200)]);
    let source = Arc::new(MemorySource::new(manifest, DOCKER_V2_SCHEMA2).with_blob(config));
    let image = SourcedImage::from_source(source).await.unwrap();

    let info = image.inspect().await.unwrap();
    assert_eq!(info.architecture, "amd64");
    assert_eq!(info.os, "linux");
    assert_eq!(info.docker_version, "20.10.7");
    assert_eq!(info.labels.get("org.example").map(String::as_str), Some("yes"));
    assert_eq!(
        info.layers,
        vec![fake_digest('0').to_string(), fake_digest('2').to_string()]
    );
}

#[tokio::test]
async fn test_legacy_inspect_reads_newest_entry() {
    let info = legacy().await.inspect().await.unwrap();
    assert_eq!(info.tag, "latest");
    assert_eq!(info.architecture, "amd64");
    assert_eq!(info.docker_version, "1.13.1");
    assert_eq!(info.labels.get("maintainer").map(String::as_str), Some("a3s"));
    assert!(info.created.is_some());
}
