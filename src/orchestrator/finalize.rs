use once_cell::sync::Lazy;
use regex::Regex;

/// A run of blank lines, tolerating stray spaces and tabs on the
/// "empty" lines.
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").unwrap());

/// Shown when the backend produced nothing usable for the turn.
pub const EMPTY_RESPONSE_TEXT: &str = "Response was empty. :(";

/// Last stage of a turn: whitespace trim, blank-line collapsing, and the
/// tools-used annotation. Structured mode skips everything that would
/// alter payload bytes beyond the outer trim.
pub fn finalize(text: &str, tools_used: &[String], structured: bool) -> String {
    let mut out = text.trim().to_string();

    if !structured {
        out = BLANK_RUN.replace_all(&out, "\n\n").into_owned();
        if !tools_used.is_empty() {
            out.push_str(&format!("\n\n(tools used: {})", tools_used.join(", ")));
        }
    }

    if out.trim().is_empty() {
        return EMPTY_RESPONSE_TEXT.to_string();
    }
    out
}
