//! Documentation fetching for the developer tutor

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::str_arg;
use crate::agent::{keys, FunctionTool, Tool, ToolContext, ToolSchema};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters of page text kept in state
pub const MAX_STORED_CHARS: usize = 8000;
const PREVIEW_CHARS: usize = 300;

/// Elements removed with everything inside them. Script and style go first
/// so markup inside them cannot confuse the rest.
const NOISE_TAGS: [&str; 6] = ["script", "style", "nav", "footer", "aside", "header"];

static NOISE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    NOISE_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?i)<(/?){}\b[^>]*>", tag)).unwrap())
        .collect()
});
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/li|/h[1-6]|/tr|/pre|/section|/article)\b[^>]*>").unwrap()
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Visible text of an HTML page, one non-empty line per text block
pub fn extract_text(html: &str) -> String {
    let text = COMMENT_RE.replace_all(html, "");
    let text = NOISE_RES
        .iter()
        .fold(text.into_owned(), |html, tag_re| strip_element(&html, tag_re));
    let text = BLOCK_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "\n");
    let text = decode_entities(&text);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove every element matched by `tag_re` (open or close tag of one name),
/// counting nesting so an inner close tag does not end the outer element.
/// An element left open keeps its content.
fn strip_element(html: &str, tag_re: &Regex) -> String {
    let mut out = String::with_capacity(html.len());
    let mut kept_until = 0;
    let mut open_at = 0;
    let mut depth = 0usize;

    for caps in tag_re.captures_iter(html) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        if caps[1].is_empty() {
            if depth == 0 {
                open_at = tag.start();
            }
            depth += 1;
        } else if depth > 0 {
            depth -= 1;
            if depth == 0 {
                out.push_str(&html[kept_until..open_at]);
                kept_until = tag.end();
            }
        }
    }

    out.push_str(&html[kept_until..]);
    out
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// First `n` characters (not bytes)
fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keep page text in turn-scoped state and describe what was kept
pub fn store_documentation(ctx: &ToolContext, url: &str, text: &str) -> Value {
    let stored = truncate_chars(text, MAX_STORED_CHARS);
    ctx.state().set(keys::PARSED_DOCUMENTATION, stored);

    let stored_len = stored.chars().count();
    let preview = if stored_len > PREVIEW_CHARS {
        format!("{}...", truncate_chars(stored, PREVIEW_CHARS))
    } else {
        stored.to_string()
    };

    json!({
        "success": true,
        "url": url,
        "content_preview": preview,
        "total_length": text.chars().count(),
        "stored_length": stored_len,
    })
}

async fn fetch_page(url: &str) -> Result<String> {
    let client = Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

pub async fn parse_documentation(ctx: &ToolContext, url: &str) -> Result<Value> {
    match fetch_page(url).await {
        Ok(html) => {
            let text = extract_text(&html);
            info!("Parsed {} ({} chars)", url, text.len());
            Ok(store_documentation(ctx, url, &text))
        }
        Err(e) => {
            warn!("Failed to fetch {}: {}", url, e);
            let timed_out = e
                .downcast_ref::<reqwest::Error>()
                .map_or(false, |re| re.is_timeout());
            let error = if timed_out {
                "Request timed out".to_string()
            } else {
                format!("Error: {}", e)
            };
            Ok(json!({"success": false, "error": error, "url": url}))
        }
    }
}

pub fn parse_documentation_tool() -> Arc<dyn Tool> {
    let schema = ToolSchema::new(
        "parse_documentation",
        "Fetch a documentation page and keep its text for this turn",
    )
    .with_string_param("url", "Documentation URL", true);

    Arc::new(FunctionTool::new(schema, |args, ctx| async move {
        let url = str_arg(&args, "url").to_string();
        parse_documentation(&ctx, &url).await
    }))
}
