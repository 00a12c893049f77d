//! The structured-response retry gate.
//!
//! Every structured call to the text generator goes through
//! [`RetryGate::obtain`]. The gate keeps asking until the response is a
//! JSON object that carries every required field and passes the caller's
//! validator. Generation faults never reach the caller: they are logged and
//! retried. How long the gate keeps trying is decided by an injected
//! [`RetryPolicy`], unbounded with no backoff by default.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::GateError;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::parse::extract_json_object;

/// A caller-supplied check run against a parsed response.
pub type Validator = dyn Fn(&Map<String, Value>) -> bool + Send + Sync;

/// How many times the gate asks, and how long it waits between asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Maximum number of generator calls; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Pause between a rejected attempt and the next one.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Retry forever with no pause.
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::ZERO,
        }
    }

    /// Give up after `max_attempts` calls.
    pub const fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Duration::ZERO,
        }
    }

    /// Wait `backoff` between attempts.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    const fn exhausted(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts >= max,
            None => false,
        }
    }
}

/// Why an attempt was rejected.
enum Rejection {
    Backend(String),
    Parse(String),
    Empty,
    MissingField(String),
    FailedCheck,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "backend error: {e}"),
            Self::Parse(e) => write!(f, "not in expected format: {e}"),
            Self::Empty => f.write_str("empty response"),
            Self::MissingField(field) => write!(f, "missing field `{field}`"),
            Self::FailedCheck => f.write_str("failed validation check"),
        }
    }
}

/// Wraps a [`TextGenerator`] with retry-until-valid semantics.
pub struct RetryGate<G> {
    generator: Arc<G>,
    policy: RetryPolicy,
}

impl<G> Clone for RetryGate<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            policy: self.policy,
        }
    }
}

impl<G: TextGenerator> RetryGate<G> {
    /// Create a gate over `generator` with the given policy.
    pub const fn new(generator: Arc<G>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// The policy this gate enforces.
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Obtain a JSON object carrying every field in `required_fields` and
    /// satisfying `validator`.
    ///
    /// Under an unbounded policy this only returns `Ok`.
    pub async fn obtain(
        &self,
        request: &GenerationRequest,
        required_fields: &[&str],
        validator: Option<&Validator>,
    ) -> Result<Map<String, Value>, GateError> {
        self.obtain_with(request, required_fields, |map| match validator {
            Some(check) if !check(map) => None,
            _ => Some(map.clone()),
        })
        .await
    }

    /// Obtain a response that `convert` accepts, returning the converted
    /// value.
    ///
    /// `convert` plays the validator's role: `None` rejects the attempt and
    /// triggers a retry.
    pub async fn obtain_with<T, F>(
        &self,
        request: &GenerationRequest,
        required_fields: &[&str],
        convert: F,
    ) -> Result<T, GateError>
    where
        F: Fn(&Map<String, Value>) -> Option<T> + Send + Sync,
        T: Send,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let rejection = match self.generator.complete(request).await {
                Err(e) => Rejection::Backend(e.to_string()),
                Ok(raw) => match check_structured(&raw, required_fields, &convert) {
                    Ok(value) => {
                        debug!(attempts, "structured response accepted");
                        return Ok(value);
                    }
                    Err(rejection) => rejection,
                },
            };
            self.after_rejection(attempts, rejection).await?;
        }
    }

    /// Obtain a non-empty free-text response.
    pub async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GateError> {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let rejection = match self.generator.complete(request).await {
                Err(e) => Rejection::Backend(e.to_string()),
                Ok(text) if text.trim().is_empty() => Rejection::Empty,
                Ok(text) => return Ok(text.trim().to_owned()),
            };
            self.after_rejection(attempts, rejection).await?;
        }
    }

    /// Log a rejected attempt, then either wait for the next one or give up.
    async fn after_rejection(&self, attempts: u32, rejection: Rejection) -> Result<(), GateError> {
        warn!(attempt = attempts, reason = %rejection, "response rejected, retrying");
        if self.policy.exhausted(attempts) {
            return Err(GateError::AttemptsExhausted {
                attempts,
                last_failure: rejection.to_string(),
            });
        }
        if !self.policy.backoff.is_zero() {
            tokio::time::sleep(self.policy.backoff).await;
        }
        Ok(())
    }
}

/// Parse `raw`, check the required fields, then run `convert`.
fn check_structured<T>(
    raw: &str,
    required_fields: &[&str],
    convert: &impl Fn(&Map<String, Value>) -> Option<T>,
) -> Result<T, Rejection> {
    let map = extract_json_object(raw).map_err(|e| Rejection::Parse(e.to_string()))?;
    if map.is_empty() {
        return Err(Rejection::Empty);
    }
    if let Some(field) = required_fields.iter().find(|f| !map.contains_key(**f)) {
        return Err(Rejection::MissingField((*field).to_owned()));
    }
    convert(&map).ok_or(Rejection::FailedCheck)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::LlmError;
    use crate::prompt::RenderedPrompt;

    /// Replays canned responses in order, repeating the last one.
    struct Scripted {
        responses: Mutex<VecDeque<Result<String, String>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(responses: &[Result<&str, &str>]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(
                    responses
                        .iter()
                        .map(|r| r.map(ToOwned::to_owned).map_err(ToOwned::to_owned))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextGenerator for Scripted {
        async fn complete(&self, _request: &GenerationRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut queue = self.responses.lock().unwrap();
            let next = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            next.map_err(LlmError::LlmBackend)
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::json(RenderedPrompt {
            system: String::from("system"),
            user: String::from("user"),
        })
    }

    #[tokio::test]
    async fn retries_until_fields_present() {
        let generator = Scripted::new(&[
            Ok("not json at all"),
            Ok("{}"),
            Ok(r#"{"description": "only half"}"#),
            Err("connection refused"),
            Ok(r#"{"description": "You are Aina.", "third_person_description": "Aina is a student."}"#),
        ]);
        let gate = RetryGate::new(Arc::clone(&generator), RetryPolicy::default());

        let map = gate
            .obtain(&request(), &["description", "third_person_description"], None)
            .await
            .unwrap();

        assert_eq!(generator.calls(), 5);
        assert_eq!(
            map.get("description").and_then(Value::as_str),
            Some("You are Aina.")
        );
    }

    #[tokio::test]
    async fn validator_rejections_are_retried() {
        let generator = Scripted::new(&[
            Ok(r#"{"description": "You like {Budget, Low}"}"#),
            Ok(r#"{"description": "You are on a tight budget."}"#),
        ]);
        let gate = RetryGate::new(Arc::clone(&generator), RetryPolicy::unbounded());
        let no_braces = |m: &Map<String, Value>| {
            m.get("description")
                .and_then(Value::as_str)
                .is_some_and(|d| !d.contains('{') && !d.contains('}'))
        };

        let map = gate
            .obtain(&request(), &["description"], Some(&no_braces))
            .await
            .unwrap();

        assert_eq!(generator.calls(), 2);
        assert_eq!(
            map.get("description").and_then(Value::as_str),
            Some("You are on a tight budget.")
        );
    }

    #[tokio::test]
    async fn bounded_policy_gives_up() {
        let generator = Scripted::new(&[Ok("garbage")]);
        let gate = RetryGate::new(Arc::clone(&generator), RetryPolicy::bounded(3));

        let result = gate.obtain(&request(), &["query"], None).await;

        assert!(matches!(
            result,
            Err(GateError::AttemptsExhausted { attempts: 3, .. })
        ));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn converter_returns_typed_value() {
        let generator = Scripted::new(&[
            Ok(r#"{"query": 42}"#),
            Ok(r#"{"query": "exam prep course malaysia"}"#),
        ]);
        let gate = RetryGate::new(Arc::clone(&generator), RetryPolicy::default());

        let query: String = gate
            .obtain_with(&request(), &["query"], |m| {
                m.get("query").and_then(Value::as_str).map(ToOwned::to_owned)
            })
            .await
            .unwrap();

        assert_eq!(query, "exam prep course malaysia");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let generator = Scripted::new(&[Ok(""), Ok("  "), Ok("It was worth the price.")]);
        let gate = RetryGate::new(
            Arc::clone(&generator),
            RetryPolicy::unbounded().with_backoff(Duration::from_secs(2)),
        );

        let started = tokio::time::Instant::now();
        let text = gate.generate_text(&request()).await.unwrap();

        assert_eq!(text, "It was worth the price.");
        assert_eq!(generator.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }
}
