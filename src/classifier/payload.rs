use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decodes audio sent as a `data:<mime>;base64,<payload>` URL or as bare
/// base64.
pub fn decode_audio_payload(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(data_url) => {
            let (header, data) = data_url
                .split_once(',')
                .context("Malformed data URL, missing ','")?;
            if !header.ends_with(";base64") {
                bail!("Only base64 data URLs are supported");
            }
            data
        }
        None => payload,
    };
    if encoded.is_empty() {
        bail!("Empty audio payload");
    }
    STANDARD
        .decode(encoded)
        .context("Audio payload is not valid base64")
}

/// File extension for an audio clip, sniffed from its content. Falls back to
/// `fallback` when the content is not recognised as audio or video.
pub fn audio_extension(bytes: &[u8], fallback: &'static str) -> &'static str {
    match infer::get(bytes) {
        Some(kind)
            if matches!(
                kind.matcher_type(),
                infer::MatcherType::Audio | infer::MatcherType::Video
            ) =>
        {
            kind.extension()
        }
        _ => fallback,
    }
}
