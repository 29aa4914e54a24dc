//! Pretty JWS signatures for schema 1 manifests.
//!
//! Registries reject schema 1 manifests without a signature block, even
//! under the nominally unsigned MIME type. The engine therefore signs every
//! serialized schema 1 manifest with a throwaway P-256 key, in the same
//! layout `docker/libtrust` produces. The signature block is spliced into
//! the JSON object; the protected header records how to cut it back out.

use a3s_image_core::{ImageError, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use data_encoding::BASE32_NOPAD;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Key under which the signature array is spliced into the manifest.
const SIGNATURES_KEY: &str = "signatures";

/// Accepts base64url with or without padding.
const LENIENT_BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProtectedHeader {
    format_length: usize,
    format_tail: String,
    #[serde(default)]
    time: String,
}

#[derive(Serialize)]
struct JsonWebKey {
    crv: &'static str,
    kid: String,
    kty: &'static str,
    x: String,
    y: String,
}

#[derive(Serialize)]
struct SignatureHeader {
    jwk: JsonWebKey,
    alg: &'static str,
}

#[derive(Serialize)]
struct JwsSignature {
    header: SignatureHeader,
    signature: String,
    protected: String,
}

#[derive(Deserialize)]
struct SignedEnvelope {
    #[serde(default)]
    signatures: Vec<SignatureEnvelope>,
}

#[derive(Deserialize)]
struct SignatureEnvelope {
    protected: String,
}

/// Append a signature made with an ephemeral key to a JSON object.
pub fn add_dummy_signature(unsigned: &[u8]) -> Result<Vec<u8>> {
    let format_length = format_length(unsigned)?;
    let indent = detect_indent(unsigned);

    let key = SigningKey::random(&mut rand::rngs::OsRng);
    let protected = ProtectedHeader {
        format_length,
        format_tail: URL_SAFE_NO_PAD.encode(&unsigned[format_length..]),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    let protected = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&protected)?);
    let signing_input = format!("{}.{}", protected, URL_SAFE_NO_PAD.encode(unsigned));
    let signature: Signature = key.sign(signing_input.as_bytes());

    let signatures = vec![JwsSignature {
        header: SignatureHeader {
            jwk: json_web_key(key.verifying_key())?,
            alg: "ES256",
        },
        signature: URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        protected,
    }];

    let mut out = Vec::with_capacity(format_length + 512);
    out.extend_from_slice(&unsigned[..format_length]);
    out.push(b',');
    if indent.is_empty() {
        out.extend_from_slice(format!("\"{}\":", SIGNATURES_KEY).as_bytes());
        out.extend_from_slice(&serde_json::to_vec(&signatures)?);
    } else {
        out.push(b'\n');
        out.extend_from_slice(indent.as_bytes());
        out.extend_from_slice(format!("\"{}\": ", SIGNATURES_KEY).as_bytes());
        out.extend_from_slice(pretty_with_prefix(&signatures, indent)?.as_bytes());
        out.push(b'\n');
    }
    out.push(b'}');
    Ok(out)
}

/// Recover the signed payload from a pretty-JWS document.
///
/// All signatures must agree on where the payload ends.
pub fn signed_payload(signed: &[u8]) -> Result<Vec<u8>> {
    let envelope: SignedEnvelope = serde_json::from_slice(signed)
        .map_err(|e| ImageError::MalformedManifest(format!("invalid signed manifest: {}", e)))?;
    if envelope.signatures.is_empty() {
        return Err(ImageError::MalformedManifest(
            "signed manifest has no signatures".to_string(),
        ));
    }

    let mut format: Option<(usize, Vec<u8>)> = None;
    for signature in &envelope.signatures {
        let header = LENIENT_BASE64URL
            .decode(&signature.protected)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid protected header: {}", e)))?;
        let header: ProtectedHeader = serde_json::from_slice(&header)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid protected header: {}", e)))?;
        let tail = LENIENT_BASE64URL
            .decode(&header.format_tail)
            .map_err(|e| ImageError::MalformedManifest(format!("invalid format tail: {}", e)))?;

        match &format {
            None => format = Some((header.format_length, tail)),
            Some((length, existing)) if *length == header.format_length && *existing == tail => {}
            Some(_) => {
                return Err(ImageError::MalformedManifest(
                    "signatures disagree on payload format".to_string(),
                ))
            }
        }
    }

    let Some((length, tail)) = format else {
        return Err(ImageError::MalformedManifest(
            "signed manifest has no signatures".to_string(),
        ));
    };
    if length > signed.len() {
        return Err(ImageError::MalformedManifest(format!(
            "format length {} exceeds manifest size {}",
            length,
            signed.len()
        )));
    }

    let mut payload = signed[..length].to_vec();
    payload.extend_from_slice(&tail);
    Ok(payload)
}

/// Offset just past the last significant byte before the closing brace.
fn format_length(content: &[u8]) -> Result<usize> {
    let close = content.iter().rposition(|&b| b == b'}').ok_or_else(|| {
        ImageError::SigningError("invalid JSON content: missing '}'".to_string())
    })?;

    let mut end = close;
    while end > 0 && content[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    match end.checked_sub(1).map(|i| content[i]) {
        None => Err(ImageError::SigningError(
            "invalid JSON content: nothing before '}'".to_string(),
        )),
        Some(b',') => Err(ImageError::SigningError(
            "invalid JSON content: trailing comma".to_string(),
        )),
        Some(_) => Ok(end),
    }
}

/// Indentation of the first member of a pretty-printed object, or "".
fn detect_indent(content: &[u8]) -> &str {
    if content.len() > 2 && content[0] == b'{' && content[1] == b'\n' {
        if let Some(quote) = content[1..].iter().position(|&b| b == b'"') {
            if quote > 0 {
                return std::str::from_utf8(&content[2..quote + 1]).unwrap_or("");
            }
        }
    }
    ""
}

/// Pretty-print with `indent`, prefixing every continuation line with `indent`.
fn pretty_with_prefix<T: Serialize>(value: &T, indent: &str) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    let pretty = String::from_utf8(buf)
        .map_err(|e| ImageError::SigningError(format!("non UTF-8 signature JSON: {}", e)))?;
    Ok(pretty.replace('\n', &format!("\n{}", indent)))
}

fn json_web_key(verifying_key: &VerifyingKey) -> Result<JsonWebKey> {
    let public = p256::PublicKey::from(verifying_key);
    let point = public.to_encoded_point(false);
    let (x, y) = match (point.x(), point.y()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(ImageError::SigningError(
                "public key has no affine coordinates".to_string(),
            ))
        }
    };
    let der = public
        .to_public_key_der()
        .map_err(|e| ImageError::SigningError(format!("failed to encode public key: {}", e)))?;

    Ok(JsonWebKey {
        crv: "P-256",
        kid: key_id(der.as_bytes()),
        kty: "EC",
        x: URL_SAFE_NO_PAD.encode(x),
        y: URL_SAFE_NO_PAD.encode(y),
    })
}

/// libtrust key ID: first 240 bits of the SPKI hash, base32, in groups of four.
fn key_id(spki_der: &[u8]) -> String {
    let hash = Sha256::digest(spki_der);
    let encoded = BASE32_NOPAD.encode(&hash[..30]);
    encoded
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
