//! A set of built-in tools that models can use.

mod save;
mod search;
mod wiki;

use std::path::PathBuf;

use research_agent_core::ToolRegistry;
use research_agent_core::tool::RegistryError;

pub use save::{DEFAULT_FILENAME, SaveTool};
pub use search::SearchTool;
pub use wiki::WikiTool;

const BROWSER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; research-agent/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Creates a registry with all built-in tools.
///
/// Relative file names given to the save tool resolve against
/// `output_dir`.
pub fn default_registry<P: Into<PathBuf>>(
    output_dir: P,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(SearchTool::new())?;
    registry.register(WikiTool::new())?;
    registry.register(SaveTool::new().with_output_dir(output_dir))?;
    Ok(registry)
}

/// Removes tags from an HTML fragment, and normalizes the text.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    html_decode(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    // `&amp;` goes last, so `&amp;lt;` stays `&lt;`.
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = default_registry(".").unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["search_tool", "wiki_tool", "save_tool"]
        );
        for definition in registry.definitions() {
            assert!(!definition.description.trim().is_empty());
            assert_eq!(definition.parameters["type"], "object");
        }
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("The <b>boiling\n point</b> &amp;&nbsp;more"),
            "The boiling point & more"
        );
        assert_eq!(html_decode("&amp;lt;"), "&lt;");
    }
}
