//! Competitor research for a single product.
//!
//! Three steps: rebuild the product information into a web search query
//! (through the retry gate, field `query`), run the search, then ask for a
//! report grounded in the results. The search itself sits behind the
//! [`WebSearch`] trait; the HTTP providers live in the service crate.

use std::future::Future;
use std::sync::Arc;

use marcom_llm::{GenerationRequest, PromptEngine, PromptKind, RetryGate, TextGenerator, Validator};
use marcom_types::Product;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::error::CoreError;

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title.
    pub title: String,
    /// Text snippet.
    pub snippet: String,
    /// Page URL.
    pub link: String,
}

/// A web search provider.
pub trait WebSearch: Send + Sync {
    /// Run `query` and return at most `max_results` hits.
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<SearchResult>, CoreError>> + Send;
}

/// The outcome of a research request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorReport {
    /// The search query that was run.
    pub query: String,
    /// The generated report.
    pub report: String,
}

/// Runs competitor research against a text generator and a search provider.
pub struct Researcher<G, W> {
    gate: RetryGate<G>,
    prompts: Arc<PromptEngine>,
    search: W,
    max_results: usize,
}

impl<G, W> Researcher<G, W>
where
    G: TextGenerator,
    W: WebSearch,
{
    /// Create a researcher.
    pub const fn new(
        gate: RetryGate<G>,
        prompts: Arc<PromptEngine>,
        search: W,
        max_results: usize,
    ) -> Self {
        Self {
            gate,
            prompts,
            search,
            max_results,
        }
    }

    /// Turn product information into a web search query.
    pub async fn reconstruct_query(&self, product: &Product) -> Result<String, CoreError> {
        let prompt = self
            .prompts
            .render(PromptKind::ResearchQuery, &product_context(product))?;
        let non_blank: &Validator = &|map: &Map<String, Value>| query_field(map).is_some();
        let response = self
            .gate
            .obtain(&GenerationRequest::json(prompt), &["query"], Some(non_blank))
            .await?;
        let query = query_field(&response).unwrap_or_default().to_owned();
        Ok(query)
    }

    /// Research competitors of `product`.
    pub async fn research(&self, product: &Product) -> Result<CompetitorReport, CoreError> {
        let query = self.reconstruct_query(product).await?;
        info!(product = %product.name, query = %query, "searching for competitors");

        let results = self.search.search(&query, self.max_results).await?;
        info!(results = results.len(), "search complete, generating report");

        let mut context = product_context(product);
        if let Some(obj) = context.as_object_mut() {
            obj.insert("query".to_owned(), json!(query));
            obj.insert("results".to_owned(), json!(results));
        }
        let prompt = self.prompts.render(PromptKind::ResearchReport, &context)?;
        let report = self
            .gate
            .generate_text(&GenerationRequest::text(prompt))
            .await?;

        Ok(CompetitorReport { query, report })
    }
}

fn query_field(map: &Map<String, Value>) -> Option<&str> {
    map.get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
}

fn product_context(product: &Product) -> Value {
    json!({
        "name": product.name,
        "description": product.description,
        "price": product.display_price(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use marcom_llm::{LlmError, RetryPolicy};
    use marcom_types::{ProductId, SimulationId};
    use rust_decimal::Decimal;

    use super::*;

    struct Canned {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    impl TextGenerator for Canned {
        async fn complete(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.clone());
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    struct FixedSearch;

    impl WebSearch for FixedSearch {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, CoreError> {
            assert_eq!(max_results, 5);
            Ok(vec![SearchResult {
                title: format!("Result for {query}"),
                snippet: String::from("A cheaper alternative"),
                link: String::from("https://rival.example"),
            }])
        }
    }

    #[tokio::test]
    async fn research_builds_query_then_report() {
        let generator = Arc::new(Canned {
            responses: Mutex::new(VecDeque::from([
                String::from("{\"query\": \"\"}"),
                String::from("{\"query\": \"exam preparation course malaysia\"}"),
                String::from("Rival is cheaper. Sources: https://rival.example"),
            ])),
            prompts: Mutex::new(Vec::new()),
        });
        let researcher = Researcher::new(
            RetryGate::new(Arc::clone(&generator), RetryPolicy::default()),
            Arc::new(PromptEngine::builtin().unwrap()),
            FixedSearch,
            5,
        );
        let product = Product {
            id: ProductId::new(1),
            simulation_id: SimulationId::new(0),
            name: String::from("Intensive Exam Preparation Course"),
            description: String::from("Past year paper analysis"),
            price: Decimal::new(3505, 1),
            cost: Decimal::ZERO,
        };

        let report = researcher.research(&product).await.unwrap();

        assert_eq!(report.query, "exam preparation course malaysia");
        assert!(report.report.starts_with("Rival is cheaper"));

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts.first().unwrap().prompt.user.contains("RM350.50"));
        assert!(
            prompts
                .last()
                .unwrap()
                .prompt
                .user
                .contains("Result for exam preparation course malaysia")
        );
    }
}
