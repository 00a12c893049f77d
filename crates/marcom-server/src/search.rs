//! Web search providers for competitor research.
//!
//! Two providers sit behind [`WebSearch`]: the `DuckDuckGo` instant-answer
//! API, which needs no key, and `SerpApi`'s Google results. Both are plain
//! JSON-over-HTTPS calls made with [`reqwest`].

use marcom_core::{CoreError, SearchProvider, SearchResult, WebSearch};
use serde_json::Value;
use tracing::debug;

const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";
const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// The configured search provider.
pub enum SearchBackend {
    /// `DuckDuckGo` instant answers.
    DuckDuckGo(DuckDuckGoSearch),
    /// `SerpApi` Google results.
    SerpApi(SerpApiSearch),
}

impl SearchBackend {
    /// Name of the provider, for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DuckDuckGo(_) => "duckduckgo",
            Self::SerpApi(_) => "serpapi",
        }
    }
}

impl WebSearch for SearchBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CoreError> {
        match self {
            Self::DuckDuckGo(s) => s.search(query, max_results).await,
            Self::SerpApi(s) => s.search(query, max_results).await,
        }
    }
}

/// Create the search backend for `provider`.
pub fn create_search(provider: SearchProvider, api_key: &str) -> SearchBackend {
    let client = reqwest::Client::new();
    match provider {
        SearchProvider::DuckDuckGo => SearchBackend::DuckDuckGo(DuckDuckGoSearch { client }),
        SearchProvider::SerpApi => SearchBackend::SerpApi(SerpApiSearch {
            client,
            api_key: api_key.to_owned(),
        }),
    }
}

async fn fetch_json(request: reqwest::RequestBuilder, provider: &str) -> Result<Value, CoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| CoreError::Search(format!("{provider} request failed: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CoreError::Search(format!("{provider} returned {status}")));
    }
    response
        .json()
        .await
        .map_err(|e| CoreError::Search(format!("{provider} response parse failed: {e}")))
}

// ---------------------------------------------------------------------------
// DuckDuckGo
// ---------------------------------------------------------------------------

/// `DuckDuckGo` instant-answer search.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CoreError> {
        let request = self.client.get(DUCKDUCKGO_URL).query(&[
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
            ("skip_disambig", "1"),
        ]);
        let json = fetch_json(request, "DuckDuckGo").await?;
        let results = parse_duckduckgo(&json, max_results);
        debug!(query, results = results.len(), "DuckDuckGo search complete");
        Ok(results)
    }
}

/// Flatten an instant-answer response: the abstract first, then related
/// topics (descending into topic groups).
fn parse_duckduckgo(json: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = str_field(json, "AbstractText");
    let abstract_url = str_field(json, "AbstractURL");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        results.push(SearchResult {
            title: str_field(json, "Heading").to_owned(),
            snippet: abstract_text.to_owned(),
            link: abstract_url.to_owned(),
        });
    }

    let topics = json.get("RelatedTopics").and_then(Value::as_array);
    for topic in topics.into_iter().flatten() {
        let nested = topic.get("Topics").and_then(Value::as_array);
        let group: Vec<&Value> = match nested {
            Some(inner) => inner.iter().collect(),
            None => vec![topic],
        };
        for item in group {
            let text = str_field(item, "Text");
            let link = str_field(item, "FirstURL");
            if text.is_empty() || link.is_empty() {
                continue;
            }
            let title = text.split(" - ").next().unwrap_or(text);
            results.push(SearchResult {
                title: title.to_owned(),
                snippet: text.to_owned(),
                link: link.to_owned(),
            });
        }
    }

    results.truncate(max_results);
    results
}

// ---------------------------------------------------------------------------
// SerpApi
// ---------------------------------------------------------------------------

/// `SerpApi` Google search.
pub struct SerpApiSearch {
    client: reqwest::Client,
    api_key: String,
}

impl SerpApiSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CoreError> {
        if self.api_key.is_empty() {
            return Err(CoreError::Search(String::from(
                "SerpApi requires research.api_key or SEARCH_API_KEY",
            )));
        }
        let num = max_results.to_string();
        let request = self.client.get(SERPAPI_URL).query(&[
            ("engine", "google"),
            ("q", query),
            ("num", num.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);
        let json = fetch_json(request, "SerpApi").await?;
        let results = parse_serpapi(&json, max_results);
        debug!(query, results = results.len(), "SerpApi search complete");
        Ok(results)
    }
}

fn parse_serpapi(json: &Value, max_results: usize) -> Vec<SearchResult> {
    json.get("organic_results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let link = str_field(item, "link");
            (!link.is_empty()).then(|| SearchResult {
                title: str_field(item, "title").to_owned(),
                snippet: str_field(item, "snippet").to_owned(),
                link: link.to_owned(),
            })
        })
        .take(max_results)
        .collect()
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn duckduckgo_flattens_abstract_and_topic_groups() {
        let json = json!({
            "Heading": "Tuition in Malaysia",
            "AbstractText": "Private tuition is common.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Tuition",
            "RelatedTopics": [
                {"Text": "Kumon - Maths and English programme", "FirstURL": "https://duckduckgo.com/Kumon"},
                {"Name": "Centres", "Topics": [
                    {"Text": "Nobel Education - SPM tuition", "FirstURL": "https://duckduckgo.com/Nobel"},
                    {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
                ]}
            ]
        });

        let results = parse_duckduckgo(&json, 25);

        assert_eq!(results.len(), 3);
        assert_eq!(results.first().unwrap().link, "https://en.wikipedia.org/wiki/Tuition");
        assert_eq!(results.get(1).unwrap().title, "Kumon");
        assert_eq!(results.get(2).unwrap().snippet, "Nobel Education - SPM tuition");
        assert_eq!(parse_duckduckgo(&json, 1).len(), 1);
    }

    #[test]
    fn duckduckgo_empty_answer_yields_nothing() {
        assert!(parse_duckduckgo(&json!({"AbstractText": ""}), 25).is_empty());
    }

    #[test]
    fn serpapi_reads_organic_results() {
        let json = json!({
            "organic_results": [
                {"title": "Rival Academy", "snippet": "SPM classes from RM150", "link": "https://rival.example"},
                {"title": "No link"},
                {"title": "Another", "snippet": "", "link": "https://another.example"}
            ]
        });

        let results = parse_serpapi(&json, 25);

        assert_eq!(results.len(), 2);
        assert_eq!(results.first().unwrap().title, "Rival Academy");
        assert_eq!(parse_serpapi(&json, 1).len(), 1);
    }

    #[tokio::test]
    async fn serpapi_without_key_is_an_error() {
        let search = create_search(SearchProvider::SerpApi, "");
        assert_eq!(search.name(), "serpapi");
        assert!(search.search("tuition", 5).await.is_err());
    }
}
