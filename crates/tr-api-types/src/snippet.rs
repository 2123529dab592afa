//! Snippet block grammar.
//!
//! A snippet request body is a textual document carrying one or more
//! `<taylored number="N" [compute="B64"]>...</taylored>` elements. The
//! `number` attribute is the positive decimal snippet id used to correlate
//! response events; `compute` is an opaque token that is never interpreted.
//! The runner tags every event of a run with the **first** block's id.

use std::sync::LazyLock;

use regex::Regex;

static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<taylored\s+number=["'](\d+)["'](?:\s+compute=["']([^"']*)["'])?>(.*?)</taylored>"#)
        .expect("snippet block pattern is valid")
});

/// One parsed `<taylored>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetBlock {
    pub id: u64,
    pub compute: Option<String>,
    pub body: String,
}

/// Parse every snippet block in `doc`, in document order.
pub fn parse_blocks(doc: &str) -> Vec<SnippetBlock> {
    SNIPPET_RE
        .captures_iter(doc)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str().parse().ok()?;
            Some(SnippetBlock {
                id,
                compute: caps.get(2).map(|m| m.as_str().to_string()),
                body: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
            })
        })
        .collect()
}

/// The id of the first snippet block in `doc`, if any.
pub fn first_snippet_id(doc: &str) -> Option<u64> {
    let caps = SNIPPET_RE.captures(doc)?;
    caps.get(1)?.as_str().parse().ok()
}
