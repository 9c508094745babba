//! Bounded response framing: splits finalized text into blocks that fit
//! the frontend's message limit, preferring paragraph breaks, then
//! sentence breaks, then hard slices.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PARA_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n+").unwrap());

/// Flattens whatever a misbehaving collaborator handed us into plain
/// text. Never fails.
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(coerce_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Splits `body` into ordered blocks of at most `limit` characters. The
/// prefix lands on the first block only, with its length reserved from
/// that block's budget. Nothing is dropped: every character of `body`
/// appears in some block, with only paragraph-boundary whitespace
/// normalized away.
pub fn chunk(prefix: &str, body: &str, limit: usize) -> Vec<String> {
    let mut builder = ChunkBuilder::new(prefix, limit.max(1));

    for (i, paragraph) in PARA_BREAK.split(body).enumerate() {
        if paragraph.is_empty() {
            continue;
        }
        let paragraph_start = i > 0;
        if builder.fits(paragraph, paragraph_start) {
            builder.add(paragraph, paragraph_start);
            continue;
        }
        for (j, sentence) in split_sentences(paragraph).iter().enumerate() {
            builder.add(sentence, paragraph_start && j == 0);
        }
    }

    builder.finish()
}

struct ChunkBuilder {
    prefix: String,
    limit: usize,
    blocks: Vec<String>,
    current: String,
    current_chars: usize,
    first: bool,
}

impl ChunkBuilder {
    fn new(prefix: &str, limit: usize) -> Self {
        ChunkBuilder {
            prefix: prefix.to_string(),
            limit,
            blocks: Vec::new(),
            current: String::new(),
            current_chars: 0,
            first: true,
        }
    }

    /// Budget of the block currently being filled.
    fn budget(&self) -> usize {
        if self.first {
            self.limit
                .saturating_sub(self.prefix.chars().count())
                .max(1)
        } else {
            self.limit
        }
    }

    fn remaining(&self) -> usize {
        self.budget().saturating_sub(self.current_chars)
    }

    /// Whether the atom fits the block currently being filled, separator
    /// included. Anything that does not fit goes through the sentence
    /// fallback before hard slicing.
    fn fits(&self, atom: &str, paragraph_start: bool) -> bool {
        let sep = if paragraph_start && !self.current.is_empty() {
            2
        } else {
            0
        };
        sep + atom.chars().count() <= self.remaining()
    }

    fn append(&mut self, text: &str) {
        self.current.push_str(text);
        self.current_chars += text.chars().count();
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let block = if self.first {
            format!("{}{}", self.prefix, self.current)
        } else {
            std::mem::take(&mut self.current)
        };
        self.current.clear();
        self.current_chars = 0;
        self.first = false;
        self.blocks.push(block);
    }

    fn add(&mut self, atom: &str, paragraph_start: bool) {
        let sep = if paragraph_start && !self.current.is_empty() {
            "\n\n"
        } else {
            ""
        };
        let needed = sep.chars().count() + atom.chars().count();
        if needed <= self.remaining() {
            self.append(sep);
            self.append(atom);
            return;
        }

        self.flush();
        let mut rest = atom;
        loop {
            let budget = self.budget();
            let (piece, tail) = take_chars(rest, budget);
            self.append(piece);
            if tail.is_empty() {
                break;
            }
            // Oversized atom: emit exact budget-sized slices.
            self.flush();
            rest = tail;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        if self.blocks.is_empty() && !self.prefix.is_empty() {
            self.blocks.push(self.prefix);
        }
        self.blocks
    }
}

/// Splits at sentence-final punctuation followed by whitespace. Each
/// piece keeps its trailing whitespace so concatenation is lossless.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();
    while let Some((_, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            while matches!(iter.peek(), Some(&(_, p)) if matches!(p, '.' | '!' | '?' | '"' | '\'' | ')')) {
                iter.next();
            }
            if matches!(iter.peek(), Some(&(_, p)) if p.is_whitespace()) {
                while matches!(iter.peek(), Some(&(_, p)) if p.is_whitespace()) {
                    iter.next();
                }
                let end = iter.peek().map(|&(i, _)| i).unwrap_or(text.len());
                pieces.push(&text[start..end]);
                start = end;
            }
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Splits after at most `n` characters, on a char boundary.
fn take_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((i, _)) => s.split_at(i),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Every non-whitespace character of the input survives into some
    /// block; only boundary whitespace may be normalized away.
    fn assert_lossless(prefix: &str, body: &str, blocks: &[String]) {
        let mut concat = blocks.concat();
        if let Some(stripped) = concat.strip_prefix(prefix) {
            concat = stripped.to_string();
        }
        assert_eq!(strip_ws(&concat), strip_ws(body));
    }

    #[test]
    fn short_body_is_one_block() {
        let blocks = chunk("bot: ", "hello", 100);
        assert_eq!(blocks, vec!["bot: hello"]);
    }

    #[test]
    fn splits_on_paragraphs_first() {
        let body = "first paragraph\n\nsecond paragraph\n\nthird paragraph";
        let blocks = chunk("", body, 34);
        assert!(blocks.iter().all(|b| b.chars().count() <= 34));
        assert_eq!(blocks[0], "first paragraph\n\nsecond paragraph");
        assert_eq!(blocks[1], "third paragraph");
        assert_lossless("", body, &blocks);
    }

    #[test]
    fn paragraph_runs_are_normalized() {
        let body = "one\n\n\n\ntwo\n \t\nthree";
        let blocks = chunk("", body, 100);
        assert_eq!(blocks, vec!["one\n\ntwo\n\nthree"]);
    }

    #[test]
    fn falls_back_to_sentences() {
        let body = "First sentence here. Second sentence here. Third one.";
        let blocks = chunk("", body, 25);
        assert!(blocks.iter().all(|b| b.chars().count() <= 25));
        assert_eq!(blocks[0], "First sentence here. ");
        assert_eq!(blocks[1], "Second sentence here. ");
        assert_eq!(blocks[2], "Third one.");
        assert_lossless("", body, &blocks);
    }

    #[test]
    fn oversized_token_is_hard_sliced() {
        let body = "a".repeat(25);
        let blocks = chunk("", &body, 10);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].len(), 10);
        assert_eq!(blocks[1].len(), 10);
        assert_eq!(blocks[2].len(), 5);
        assert_eq!(blocks.join(""), body);
    }

    #[test]
    fn prefix_reserved_from_first_block_only() {
        let body = "abcdefghij klmnopqrst";
        let blocks = chunk("[me] ", body, 10);
        assert!(blocks[0].starts_with("[me] "));
        assert!(blocks.iter().all(|b| b.chars().count() <= 10));
        assert!(!blocks[1].starts_with("[me] "));
        assert_lossless("[me] ", body, &blocks);
    }

    #[test]
    fn prefix_reduced_first_block_breaks_at_sentences() {
        // Fits the raw limit but not the prefix-reduced first block; the
        // split must land on the sentence boundary, not mid-word.
        let body = "Alpha beta gamma delta. Epsilon zeta.";
        let blocks = chunk("@alice: ", body, 40);
        assert_eq!(blocks[0], "@alice: Alpha beta gamma delta. ");
        assert_eq!(blocks[1], "Epsilon zeta.");
        assert_lossless("@alice: ", body, &blocks);
    }

    #[test]
    fn multibyte_slicing_stays_on_boundaries() {
        let body = "héllø wörld ünïcödé tèxt ".repeat(4);
        let blocks = chunk("", &body, 11);
        assert!(blocks.iter().all(|b| b.chars().count() <= 11));
        assert_lossless("", &body, &blocks);
    }

    #[test]
    fn empty_body_yields_prefix_or_nothing() {
        assert_eq!(chunk("p: ", "", 10), vec!["p: "]);
        assert!(chunk("", "", 10).is_empty());
    }

    #[test]
    fn coerces_awkward_values() {
        assert_eq!(coerce_text(&json!("plain")), "plain");
        assert_eq!(coerce_text(&json!(null)), "");
        assert_eq!(coerce_text(&json!(42)), "42");
        assert_eq!(coerce_text(&json!(["a", "b"])), "a\nb");
        assert_eq!(coerce_text(&json!({"k": "v"})), "{\"k\":\"v\"}");
        assert_eq!(coerce_text(&json!([["x"], "y"])), "x\ny");
    }
}
