//! Shared fixtures: a prompt-aware scripted generator and a small market.

#![allow(clippy::unwrap_used, dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use marcom_core::{CoreError, EngineContext, InMemoryStore, SimulationStore};
use marcom_llm::{GenerationRequest, LlmError, PromptEngine, RetryGate, RetryPolicy, TextGenerator};
use marcom_types::{
    AgentAttribute, AgentDescriptions, AgentId, AgentProfile, AgentRecordKey, Event, MemoryEntry,
    Product, ProductId, SimulationDefinition, SimulationId,
};
use rust_decimal::Decimal;

/// Answers each prompt kind with something plausible; decisions come from a
/// per-agent script and default to SKIP once the script runs out.
#[derive(Default)]
pub struct ScriptedGenerator {
    decisions: Mutex<HashMap<String, VecDeque<String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    rewrites: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue raw decision responses for the agent called `name`.
    pub fn script(&self, name: &str, responses: &[String]) {
        self.decisions
            .lock()
            .unwrap()
            .entry(name.to_owned())
            .or_default()
            .extend(responses.iter().cloned());
    }

    pub fn rewrite_calls(&self) -> usize {
        self.rewrites.load(Ordering::SeqCst)
    }

    /// User prompts of every decision request made for `name`.
    pub fn decision_prompts(&self, name: &str) -> Vec<String> {
        let marker = format!("agents as {name}.");
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.prompt.system.contains(&marker) && r.prompt.user.contains("Available actions"))
            .map(|r| r.prompt.user.clone())
            .collect()
    }

    fn agent_name(&self, system: &str) -> Option<String> {
        self.decisions
            .lock()
            .unwrap()
            .keys()
            .find(|name| system.contains(&format!("agents as {name}.")))
            .cloned()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let system = &request.prompt.system;
        let user = &request.prompt.user;

        if system.contains("rewrite character descriptions") {
            self.rewrites.fetch_add(1, Ordering::SeqCst);
            if let Some(rest) = user.split("about the agent ").nth(1) {
                let name = rest.split(" in third person view").next().unwrap_or_default();
                return Ok(format!(
                    r#"{{"description": "You are in a simulation with other agents as {name}.", "third_person_description": "{name} is a careful shopper."}}"#
                ));
            }
            return Ok(String::from(r#"{"description": "You watch every ringgit."}"#));
        }

        if user.contains("Available actions") {
            let next = self.agent_name(system).and_then(|name| {
                self.decisions
                    .lock()
                    .unwrap()
                    .get_mut(&name)
                    .and_then(VecDeque::pop_front)
            });
            return Ok(next.unwrap_or_else(|| decision("SKIP", "", "")));
        }

        if user.contains("Reply to the message") {
            return Ok(String::from(r#"{"message": "Sounds good to me"}"#));
        }

        Ok(String::from("It went about as well as I expected."))
    }
}

/// A decision response.
pub fn decision(action: &str, target_id: &str, content: &str) -> String {
    serde_json::json!({
        "action": action,
        "reason": format!("chose {action}"),
        "target_id": target_id,
        "target_content": content,
    })
    .to_string()
}

pub fn context<S: SimulationStore>(
    generator: &Arc<ScriptedGenerator>,
    store: &Arc<S>,
) -> EngineContext<ScriptedGenerator, S> {
    EngineContext {
        gate: RetryGate::new(Arc::clone(generator), RetryPolicy::default()),
        prompts: Arc::new(PromptEngine::builtin().unwrap()),
        store: Arc::clone(store),
        memory_window: 30,
    }
}

/// An in-memory store whose `fail_on`-th event append (counting from 1) is
/// rejected. Every other call goes through.
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_on: usize,
    appends: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_append(fail_on: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            fail_on,
            appends: AtomicUsize::new(0),
        })
    }
}

impl SimulationStore for FlakyStore {
    async fn load_descriptions(
        &self,
        key: AgentRecordKey,
    ) -> Result<Option<AgentDescriptions>, CoreError> {
        self.inner.load_descriptions(key).await
    }

    async fn save_descriptions(
        &self,
        key: AgentRecordKey,
        descriptions: &AgentDescriptions,
    ) -> Result<(), CoreError> {
        self.inner.save_descriptions(key, descriptions).await
    }

    async fn append_memory(&self, entry: &MemoryEntry) -> Result<(), CoreError> {
        self.inner.append_memory(entry).await
    }

    async fn recent_memory(
        &self,
        key: AgentRecordKey,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, CoreError> {
        self.inner.recent_memory(key, limit).await
    }

    async fn append_event(&self, event: &Event) -> Result<(), CoreError> {
        let call = self.appends.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if call == self.fail_on {
            return Err(CoreError::Store(String::from("database is locked")));
        }
        self.inner.append_event(event).await
    }

    async fn list_events(&self, simulation_id: SimulationId) -> Result<Vec<Event>, CoreError> {
        self.inner.list_events(simulation_id).await
    }

    async fn load_next_cycle(&self, simulation_id: SimulationId) -> Result<Option<i64>, CoreError> {
        self.inner.load_next_cycle(simulation_id).await
    }

    async fn save_next_cycle(
        &self,
        simulation_id: SimulationId,
        next_cycle: i64,
    ) -> Result<(), CoreError> {
        self.inner.save_next_cycle(simulation_id, next_cycle).await
    }
}

fn product(simulation: i64, id: i64, name: &str, price: i64) -> Product {
    Product {
        id: ProductId::new(id),
        simulation_id: SimulationId::new(simulation),
        name: name.to_owned(),
        description: format!("{name} for SPM students"),
        price: Decimal::new(price, 0),
        cost: Decimal::new(price / 2, 0),
    }
}

/// Two agents (Aina with one attribute, Ben with none) and two products.
pub fn market(simulation: i64, total_cycles: i64) -> SimulationDefinition {
    SimulationDefinition {
        id: SimulationId::new(simulation),
        environment: String::from("A tuition market in Kuala Lumpur."),
        agents: vec![
            AgentProfile {
                id: AgentId::new(1),
                name: String::from("Aina"),
                description: String::from("Aina is a form five student."),
                attributes: vec![AgentAttribute::new("Budget", "Low")],
                model: None,
            },
            AgentProfile {
                id: AgentId::new(2),
                name: String::from("Ben"),
                description: String::from("Ben is a parent of two."),
                attributes: Vec::new(),
                model: None,
            },
        ],
        products: vec![
            product(simulation, 1, "Course", 350),
            product(simulation, 2, "Tutor", 80),
        ],
        total_cycles,
    }
}
