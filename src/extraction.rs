// =============================================================================
// extraction.rs - THE JSON PROSPECTOR
// =============================================================================
//
// We ask the model for JSON. The model replies with "Sure! Here is the
// analysis you requested:" followed by a fenced code block, followed by a
// paragraph of closing remarks nobody asked for. Somewhere in there is an
// object with a `weaknesses` array. This module digs it out.
//
// Strategy: find the first '{' (memchr, because it is right there), then
// walk forward counting braces until depth returns to zero. Braces inside
// string literals don't count, and neither do escaped quotes. The first
// balanced region wins. A greedy "first '{' to last '}'" match would glue
// two separate objects together whenever the model emits more than one.
//
// When anything goes wrong the caller gets a fixed placeholder weakness
// instead of an error. The endpoint never fails because a model was chatty.
// =============================================================================

use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{Category, Severity, Weakness};

/// Locate the first top-level balanced `{...}` region in `text`.
///
/// Returns `None` if there is no `{` or the first one is never closed.
pub fn find_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = memchr::memchr(b'{', bytes)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // Every delimiter we care about is ASCII, so walking bytes is safe for
    // UTF-8 and the slice boundaries always land on char boundaries.
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Debug, Deserialize)]
struct WeaknessEnvelope {
    #[serde(default)]
    weaknesses: Vec<Weakness>,
}

/// What came out of a model reply.
#[derive(Debug)]
pub enum Extraction {
    /// A JSON object was found and every entry mapped cleanly.
    Parsed(Vec<Weakness>),
    /// No balanced `{...}` region anywhere in the reply.
    NoJson,
    /// A region was found but it is not valid JSON, or an entry is missing a
    /// field or uses a label outside the allowed sets.
    Malformed(serde_json::Error),
}

impl Extraction {
    /// Turn the outcome into the list we persist and return, substituting a
    /// placeholder for the two failure shapes.
    pub fn into_weaknesses(self) -> Vec<Weakness> {
        match self {
            Extraction::Parsed(weaknesses) => weaknesses,
            Extraction::NoJson => vec![placeholders::response_not_json()],
            Extraction::Malformed(e) => vec![placeholders::parse_error(&e)],
        }
    }
}

/// Run the full extraction over a model reply.
pub fn extract_weaknesses(reply: &str) -> Extraction {
    let Some(object) = find_json_object(reply) else {
        warn!(reply_chars = reply.chars().count(), "Model reply contained no JSON object");
        return Extraction::NoJson;
    };

    match serde_json::from_str::<WeaknessEnvelope>(object) {
        Ok(envelope) => {
            debug!(count = envelope.weaknesses.len(), "Parsed weaknesses from model reply");
            Extraction::Parsed(envelope.weaknesses)
        }
        Err(e) => {
            warn!(error = %e, "Model reply JSON did not map to weaknesses");
            Extraction::Malformed(e)
        }
    }
}

/// The fixed stand-ins used when a stage of the pipeline falls over.
pub mod placeholders {
    use super::*;

    /// No model could be built at all. Always exactly these two.
    pub fn ai_unavailable(target_url: &str) -> Vec<Weakness> {
        vec![
            Weakness::new(
                "AI Analysis Unavailable",
                "Google AI service is currently unavailable. This appears to be a temporary API issue.",
                Severity::Medium,
                Category::Technical,
            ),
            Weakness::new(
                "Manual Review Required",
                format!(
                    "Content was successfully scraped from {target_url} but AI analysis failed. Manual review recommended."
                ),
                Severity::Low,
                Category::Technical,
            ),
        ]
    }

    /// The model call itself failed.
    pub fn ai_service_error(error: &dyn std::fmt::Display) -> Weakness {
        Weakness::new(
            "AI Service Error",
            format!("Google AI analysis failed: {error}. Content scraping was successful."),
            Severity::Medium,
            Category::Technical,
        )
    }

    pub fn response_not_json() -> Weakness {
        Weakness::new(
            "AI Response Parsing Issue",
            "AI provided a response but it couldn't be parsed as JSON",
            Severity::Medium,
            Category::Technical,
        )
    }

    pub fn parse_error(error: &serde_json::Error) -> Weakness {
        Weakness::new(
            "Analysis parsing error",
            format!("Failed to parse AI analysis: {error}"),
            Severity::Medium,
            Category::Technical,
        )
    }
}
