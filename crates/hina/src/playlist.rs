//! Line-oriented playlist grammar.
//!
//! Parsing is pure: given the manifest text and its base URL, it produces
//! either the variant list of a master playlist or the ordered segment
//! list of a media playlist. No network access happens here.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use regex::Regex;
use url::Url;

use crate::error::{HinaError, HinaResult};

static BANDWIDTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"BANDWIDTH=(\d+)").unwrap());

/// A quality variant advertised by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub bandwidth: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMethod {
    Aes128,
    /// Declared but unsupported method. Segments stay encrypted in the
    /// output.
    Other(String),
}

/// Snapshot of the most recent `#EXT-X-KEY` tag. Applies to every
/// following segment until superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    pub method: KeyMethod,
    pub uri: String,
    /// Explicit IV from the tag. When absent, the IV derives from the
    /// segment's media sequence number at decrypt time.
    pub iv: Option<[u8; 16]>,
}

#[derive(Debug, Clone)]
pub struct MediaSegment {
    pub url: String,
    pub key: Option<Arc<KeyRef>>,
    pub media_sequence: u64,
}

pub fn is_master_playlist(manifest: &str) -> bool {
    manifest.contains("#EXT-X-STREAM-INF")
}

/// Resolves a playlist reference against its base URL.
///
/// Resolution failures never abort parsing; a malformed reference or base
/// yields the reference unchanged and surfaces later as a fetch failure.
pub fn resolve(reference: &str, base: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(reference))
        .map(Into::into)
        .unwrap_or_else(|_| reference.to_string())
}

/// Extracts the variants of a master playlist. A variant needs a
/// `BANDWIDTH` attribute and a following URI line to count.
pub fn variants(manifest: &str, base: &str) -> Vec<Variant> {
    let lines: Vec<&str> = manifest.lines().map(str::trim).collect();

    let mut variants = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if !line.starts_with("#EXT-X-STREAM-INF") {
            continue;
        }
        let Some(bandwidth) = BANDWIDTH_REGEX
            .captures(line)
            .and_then(|c| c[1].parse().ok())
        else {
            continue;
        };
        if let Some((_, uri)) = next_uri_line(&lines, index + 1) {
            variants.push(Variant {
                bandwidth,
                url: resolve(uri, base),
            });
        }
    }
    variants
}

/// Picks the variant with the strictly greatest bandwidth. When no
/// variant carries a bandwidth attribute, falls back to the first
/// playlist-looking line.
pub fn best_variant_url(manifest: &str, base: &str) -> HinaResult<String> {
    let mut max_bandwidth = 0;
    let mut best = None;
    for variant in variants(manifest, base) {
        if variant.bandwidth > max_bandwidth {
            max_bandwidth = variant.bandwidth;
            best = Some(variant.url);
        }
    }

    best.or_else(|| {
        manifest
            .lines()
            .map(str::trim)
            .find(|line| line.ends_with(".m3u8") && !line.starts_with('#'))
            .map(|uri| resolve(uri, base))
    })
    .ok_or(HinaError::NoVariant)
}

/// Parses a media playlist into its ordered segment list.
///
/// Two pieces of state run through the scan: the media sequence counter
/// (seeded by `#EXT-X-MEDIA-SEQUENCE`, default 0, incremented once per
/// segment) and the current encryption key (set by `#EXT-X-KEY`,
/// persisting across segments until superseded; `METHOD=NONE` clears it).
pub fn parse_media_playlist(manifest: &str, base: &str) -> HinaResult<Vec<MediaSegment>> {
    let lines: Vec<&str> = manifest.lines().map(str::trim).collect();

    let mut media_sequence: u64 = 0;
    let mut current_key: Option<Arc<KeyRef>> = None;
    let mut segments = Vec::new();

    let mut cursor = 0;
    while cursor < lines.len() {
        let line = lines[cursor];
        if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = value.trim().parse().unwrap_or(0);
        } else if let Some(value) = line.strip_prefix("#EXT-X-KEY:") {
            current_key = parse_key(value, base).map(Arc::new);
        } else if line.starts_with("#EXTINF") {
            // The segment URI is the next non-tag, non-blank line, which
            // may sit past other tags between it and the #EXTINF.
            if let Some((index, uri)) = next_uri_line(&lines, cursor + 1) {
                segments.push(MediaSegment {
                    url: resolve(uri, base),
                    key: current_key.clone(),
                    media_sequence,
                });
                media_sequence += 1;
                cursor = index;
            }
        }
        cursor += 1;
    }

    if segments.is_empty() {
        return Err(HinaError::NoSegments);
    }
    Ok(segments)
}

/// Finds the next line that is neither blank nor a tag/comment.
fn next_uri_line<'a>(lines: &[&'a str], from: usize) -> Option<(usize, &'a str)> {
    lines
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(index, line)| (index, *line))
}

/// Parses an `#EXT-X-KEY` attribute list. `METHOD=NONE` returns `None`,
/// dropping any previously active key.
fn parse_key(attributes: &str, base: &str) -> Option<KeyRef> {
    let attributes = parse_attributes(attributes);
    let method = attributes.get("METHOD").map(String::as_str).unwrap_or("NONE");
    if method == "NONE" {
        return None;
    }

    let uri = attributes
        .get("URI")
        .map(|uri| resolve(uri, base))
        .unwrap_or_default();
    let iv = attributes.get("IV").and_then(|iv| parse_iv(iv));

    Some(KeyRef {
        method: match method {
            "AES-128" => KeyMethod::Aes128,
            other => KeyMethod::Other(other.to_string()),
        },
        uri,
        iv,
    })
}

/// Splits `NAME=VALUE,NAME="VALUE"` attribute lists. Quoted values may
/// contain commas.
fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();

    let mut start = 0;
    let mut in_quotes = false;
    let mut push = |piece: &str| {
        if let Some((name, value)) = piece.split_once('=') {
            attributes.insert(
                name.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            );
        }
    };
    for (index, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    push(&input[start..]);

    attributes
}

fn parse_iv(iv: &str) -> Option<[u8; 16]> {
    let iv = iv.strip_prefix("0x").or_else(|| iv.strip_prefix("0X")).unwrap_or(iv);
    u128::from_str_radix(iv, 16).ok().map(u128::to_be_bytes)
}
