use reqwest::Client;
use reqwest::header::USER_AGENT;
use research_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use super::BROWSER_USER_AGENT;

const DEFAULT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
const DEFAULT_TOP_K_RESULTS: usize = 1;
const DEFAULT_DOC_CONTENT_CHARS_MAX: usize = 3000;
const NO_RESULTS: &str = "No good Wikipedia Search Result was found";

#[derive(Deserialize, JsonSchema)]
pub struct WikiParameters {
    #[schemars(description = "The topic to search on Wikipedia.")]
    query: String,
}

/// A tool for looking up article summaries on Wikipedia.
pub struct WikiTool {
    parameter_schema: Value,
    client: Client,
    endpoint: String,
    top_k_results: usize,
    doc_content_chars_max: usize,
}

impl WikiTool {
    /// Creates a new Wikipedia tool.
    #[inline]
    pub fn new() -> Self {
        WikiTool {
            parameter_schema: schema_for!(WikiParameters).to_value(),
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            top_k_results: DEFAULT_TOP_K_RESULTS,
            doc_content_chars_max: DEFAULT_DOC_CONTENT_CHARS_MAX,
        }
    }

    /// Sets the MediaWiki API endpoint, e.g. to use another language.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets how many articles are summarized per query.
    #[inline]
    pub fn with_top_k_results(mut self, top_k_results: usize) -> Self {
        self.top_k_results = top_k_results.max(1);
        self
    }

    /// Sets the maximum number of characters returned.
    #[inline]
    pub fn with_doc_content_chars_max(mut self, chars_max: usize) -> Self {
        self.doc_content_chars_max = chars_max;
        self
    }
}

impl Default for WikiTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WikiTool {
    type Input = WikiParameters;

    fn name(&self) -> &str {
        "wiki_tool"
    }

    fn description(&self) -> &str {
        r#"
Search Wikipedia for encyclopedic information and well-established facts.
Use this tool for historical information, scientific concepts and definitions, biographies and other well-documented knowledge."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: WikiParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let url = format!(
            "{}?action=query&format=json&formatversion=2&generator=search\
             &gsrsearch={}&gsrlimit={}&prop=extracts&exintro=1&explaintext=1\
             &exlimit=max&redirects=1",
            self.endpoint,
            urlencoding::encode(&input.query),
            self.top_k_results,
        );
        let request =
            self.client.get(url).header(USER_AGENT, BROWSER_USER_AGENT);
        let chars_max = self.doc_content_chars_max;
        async move {
            let resp = request
                .send()
                .await
                .and_then(|resp| resp.error_for_status())
                .map_err(upstream_error)?;
            let resp: QueryResponse =
                resp.json().await.map_err(upstream_error)?;
            if let Some(err) = resp.error {
                warn!("wikipedia returned an error: {err:?}");
                return Err(ToolError::upstream().with_reason(format!(
                    "Wikipedia API error `{}`: {}",
                    err.code, err.info
                )));
            }

            let summary = resp
                .query
                .map(|query| format_pages(query.pages, chars_max))
                .filter(|summary| !summary.is_empty())
                .unwrap_or_else(|| NO_RESULTS.to_owned());
            Ok(format!(
                "Wikipedia information on '{}':\n{summary}",
                input.query
            ))
        }
    }
}

fn upstream_error(err: reqwest::Error) -> ToolError {
    warn!("wikipedia request failed: {err}");
    ToolError::upstream()
        .with_reason(format!("Wikipedia request failed: {err}"))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<Query>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    /// Rank of the page in the search results.
    #[serde(default)]
    index: u32,
    #[serde(default)]
    extract: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    info: String,
}

/// Formats pages in search rank order and truncates the whole text to
/// `chars_max` characters.
fn format_pages(mut pages: Vec<Page>, chars_max: usize) -> String {
    pages.sort_by_key(|page| page.index);
    let text = pages
        .iter()
        .filter(|page| !page.extract.trim().is_empty())
        .map(|page| {
            format!("Page: {}\nSummary: {}", page.title, page.extract.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(text, chars_max)
}

fn truncate_chars(mut text: String, chars_max: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(chars_max) {
        text.truncate(idx);
    }
    text
}
