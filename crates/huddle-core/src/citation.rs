//! Source descriptor normalization.
//!
//! The agent reports the sources behind an answer as loosely shaped JSON:
//! tool invocations (`{"tool": "...", "args": {...}}`) or links
//! (`{"url": "...", "title": "..."}`). Everything downstream works with the
//! closed [`Citation`] union instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized source record attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Citation {
    /// A tool the agent invoked while researching the answer.
    Tool {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Map<String, Value>>,
    },
    /// A hyperlink the answer draws on.
    Link { url: String, title: String },
}

impl Citation {
    pub fn tool(tool: impl Into<String>, args: Option<Map<String, Value>>) -> Self {
        Citation::Tool {
            tool: tool.into(),
            args,
        }
    }

    /// Creates a link citation; the title falls back to the url.
    pub fn link(url: impl Into<String>, title: Option<String>) -> Self {
        let url = url.into();
        let title = title.unwrap_or_else(|| url.clone());
        Citation::Link { url, title }
    }

    /// Normalizes one raw source descriptor.
    ///
    /// A descriptor carrying `url` is always a link. Otherwise it must carry
    /// `tool`. Anything else is malformed and yields `None`.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        if let Some(url) = obj.get("url") {
            let url = url.as_str()?;
            let title = obj
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            return Some(Citation::link(url, title));
        }

        let tool = obj.get("tool")?.as_str()?;
        let args = obj.get("args").and_then(Value::as_object).cloned();
        Some(Citation::tool(tool, args))
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Citation::Tool { tool, args: None } => write!(f, "{tool}"),
            Citation::Tool {
                tool,
                args: Some(args),
            } => {
                let Ok(args) = serde_json::to_string(args) else {
                    return Err(fmt::Error);
                };
                write!(f, "{tool}({args})")
            }
            Citation::Link { url, title } if url == title => write!(f, "{url}"),
            Citation::Link { url, title } => write!(f, "{title} <{url}>"),
        }
    }
}

/// Result of normalizing a batch of raw descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedSources {
    pub citations: Vec<Citation>,
    /// Descriptors that matched neither variant.
    pub dropped: usize,
}

/// Normalizes a list of raw descriptors, preserving order and dropping
/// malformed entries.
pub fn normalize_sources(raw: &[Value]) -> NormalizedSources {
    let mut out = NormalizedSources::default();
    for item in raw {
        match Citation::from_raw(item) {
            Some(citation) => out.citations.push(citation),
            None => {
                tracing::debug!(descriptor = %item, "dropping malformed source descriptor");
                out.dropped += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_link_title_defaults_to_url() {
        let citation = Citation::from_raw(&json!({"url": "https://x"})).unwrap();
        assert_eq!(
            citation,
            Citation::Link {
                url: "https://x".to_string(),
                title: "https://x".to_string(),
            }
        );
    }

    #[test]
    fn test_link_keeps_title() {
        let citation =
            Citation::from_raw(&json!({"url": "https://x", "title": "Injury report"})).unwrap();
        assert_eq!(
            citation,
            Citation::link("https://x", Some("Injury report".to_string()))
        );
    }

    #[test]
    fn test_url_wins_over_tool() {
        let citation =
            Citation::from_raw(&json!({"tool": "web_search", "url": "https://x"})).unwrap();
        assert!(matches!(citation, Citation::Link { .. }));
    }

    #[test]
    fn test_tool_with_args() {
        let citation =
            Citation::from_raw(&json!({"tool": "search", "args": {"q": "waiver wire"}})).unwrap();
        let Citation::Tool { tool, args } = citation else {
            panic!("expected tool citation");
        };
        assert_eq!(tool, "search");
        assert_eq!(
            args.map(Value::Object),
            Some(json!({"q": "waiver wire"}))
        );
    }

    #[test]
    fn test_tool_without_args() {
        let citation = Citation::from_raw(&json!({"tool": "projections"})).unwrap();
        assert_eq!(citation, Citation::tool("projections", None));
    }

    #[test]
    fn test_malformed_descriptors_are_dropped() {
        let raw = vec![
            json!({"tool": "projections"}),
            json!({"name": "nothing useful"}),
            json!("just a string"),
            json!({"url": 42}),
            json!({"url": "https://x"}),
        ];
        let normalized = normalize_sources(&raw);
        assert_eq!(normalized.dropped, 3);
        assert_eq!(
            normalized.citations,
            vec![
                Citation::tool("projections", None),
                Citation::link("https://x", None),
            ]
        );
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(Citation::tool("projections", None)).unwrap();
        assert_eq!(json, json!({"kind": "tool", "tool": "projections"}));
    }

    #[test]
    fn test_display_matches_sources_line() {
        let tool =
            Citation::from_raw(&json!({"tool": "search", "args": {"q": "waiver wire"}})).unwrap();
        assert_eq!(tool.to_string(), r#"search({"q":"waiver wire"})"#);
        assert_eq!(
            Citation::link("https://x", Some("Report".into())).to_string(),
            "Report <https://x>"
        );
        assert_eq!(Citation::link("https://x", None).to_string(), "https://x");
    }
}
