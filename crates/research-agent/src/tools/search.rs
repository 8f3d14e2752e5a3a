use reqwest::Client;
use reqwest::header::USER_AGENT;
use research_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use super::{BROWSER_USER_AGENT, html_decode, strip_tags};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: usize = 5;
const NO_RESULTS: &str = "No good DuckDuckGo Search Result was found";

#[derive(Deserialize, JsonSchema)]
pub struct SearchParameters {
    #[schemars(description = "The search query string to look up on the web.")]
    query: String,
}

/// A tool for searching the web with DuckDuckGo.
pub struct SearchTool {
    parameter_schema: Value,
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl SearchTool {
    /// Creates a new search tool.
    #[inline]
    pub fn new() -> Self {
        SearchTool {
            parameter_schema: schema_for!(SearchParameters).to_value(),
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the endpoint serving DuckDuckGo-compatible HTML results.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the maximum number of results to return.
    #[inline]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

impl Default for SearchTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SearchTool {
    type Input = SearchParameters;

    fn name(&self) -> &str {
        "search_tool"
    }

    fn description(&self) -> &str {
        r#"
Search the web for current, real-time information using DuckDuckGo.
Use this tool for recent news or events, current statistics or data, and other up-to-date facts."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: SearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let url = format!(
            "{}?q={}",
            self.endpoint,
            urlencoding::encode(&input.query)
        );
        let max_results = self.max_results;
        async move {
            debug!("searching: {url}");
            let html = fetch_html(&client, &url).await.map_err(|err| {
                warn!("search request failed: {err}");
                ToolError::upstream()
                    .with_reason(format!("search request failed: {err}"))
            })?;

            let results = extract_results(&html, max_results);
            let body = if results.is_empty() {
                NO_RESULTS.to_owned()
            } else {
                results
                    .iter()
                    .map(SearchResult::to_string)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            };
            Ok(format!("Search results for '{}':\n{body}", input.query))
        }
    }
}

async fn fetch_html(
    client: &Client,
    url: &str,
) -> Result<String, reqwest::Error> {
    client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

#[derive(Debug, PartialEq, Eq)]
struct SearchResult {
    title: String,
    snippet: String,
    url: String,
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}\nURL: {}", self.title, self.snippet, self.url)
    }
}

/// Extracts results from a DuckDuckGo HTML result page.
fn extract_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    html.split("result__body")
        .skip(1)
        .filter_map(parse_result)
        .take(max_results)
        .collect()
}

fn parse_result(chunk: &str) -> Option<SearchResult> {
    let title = element_text(chunk, "result__a")?;
    if title.is_empty() {
        return None;
    }
    let snippet = element_text(chunk, "result__snippet").unwrap_or_default();
    let url = element_href(chunk, "result__a")
        .and_then(|href| resolve_link(&href))
        .or_else(|| element_text(chunk, "result__url"))
        .unwrap_or_default();
    Some(SearchResult {
        title,
        snippet,
        url,
    })
}

/// Returns the plain text inside the first `<a>` with the class.
fn element_text(chunk: &str, class: &str) -> Option<String> {
    let (_, rest) = chunk.split_once(&format!("class=\"{class}\""))?;
    let (_, rest) = rest.split_once('>')?;
    let (inner, _) = rest.split_once("</a>")?;
    Some(strip_tags(inner))
}

fn element_href(chunk: &str, class: &str) -> Option<String> {
    let marker = format!("class=\"{class}\"");
    let start = chunk.find(&marker)?;
    // The attribute may come before or after the class in the same tag.
    let tag_start = chunk[..start].rfind('<')?;
    let tag_end = start + chunk[start..].find('>')?;
    let tag = &chunk[tag_start..tag_end];
    let (_, rest) = tag.split_once("href=\"")?;
    let (href, _) = rest.split_once('"')?;
    Some(html_decode(href))
}

/// Unwraps DuckDuckGo redirect links to the target URL.
fn resolve_link(href: &str) -> Option<String> {
    if let Some((_, query)) = href.split_once("uddg=") {
        let encoded = query.split('&').next().unwrap_or(query);
        return urlencoding::decode(encoded)
            .ok()
            .map(|url| url.into_owned());
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_owned());
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const RESULT_PAGE: &str = r#"
<div class="results">
  <div class="result results_links results_links_deep web-result">
    <div class="links_main links_deep result__body">
      <h2 class="result__title">
        <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FBoiling_point&amp;rut=abc">Boiling point - <b>Wikipedia</b></a>
      </h2>
      <a class="result__url" href="//duckduckgo.com/l/?uddg=x">en.wikipedia.org/wiki/Boiling_point</a>
      <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">The <b>boiling point</b> of water is 100&nbsp;°C at sea level &amp; 1 atm.</a>
    </div>
  </div>
  <div class="result results_links results_links_deep web-result">
    <div class="links_main links_deep result__body">
      <h2 class="result__title">
        <a rel="nofollow" class="result__a" href="https://www.usgs.gov/water">Water &quot;facts&quot;</a>
      </h2>
      <a class="result__url" href="https://www.usgs.gov/water">www.usgs.gov/water</a>
    </div>
  </div>
  <div class="result results_links results_links_deep web-result">
    <div class="links_main links_deep result__body">
      <a class="result__url" href="https://example.com">example.com</a>
    </div>
  </div>
</div>
"#;

    #[test]
    fn test_extract_results() {
        let results = extract_results(RESULT_PAGE, 5);
        assert_eq!(
            results,
            [
                SearchResult {
                    title: "Boiling point - Wikipedia".to_owned(),
                    snippet: "The boiling point of water is 100 °C \
                              at sea level & 1 atm."
                        .to_owned(),
                    url: "https://en.wikipedia.org/wiki/Boiling_point"
                        .to_owned(),
                },
                SearchResult {
                    title: "Water \"facts\"".to_owned(),
                    snippet: String::new(),
                    url: "https://www.usgs.gov/water".to_owned(),
                },
            ]
        );
        assert_eq!(
            results[1].to_string(),
            "Water \"facts\"\n\nURL: https://www.usgs.gov/water"
        );
    }

    #[test]
    fn test_extract_results_limit() {
        assert_eq!(extract_results(RESULT_PAGE, 1).len(), 1);
        assert!(extract_results("<html>nothing here</html>", 5).is_empty());
    }

    #[test]
    fn test_schema() {
        let tool = SearchTool::new();
        let schema = tool.parameter_schema();
        assert_eq!(schema["properties"]["query"]["type"], json!("string"));
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let tool = SearchTool::new().with_endpoint("http://127.0.0.1:1/html/");
        let err = tool
            .execute(SearchParameters {
                query: "boiling point".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), research_agent_core::tool::ErrorKind::Upstream);
        assert!(err.to_string().contains("search request failed"));
    }
}
