//! Advisory re-ranking through an external language model.
//!
//! The oracle sees the call graph, the change set and the failure counts
//! and answers in free text. Nothing from that text is trusted as
//! structure: test identifiers are pulled out with the identifier grammar,
//! deduplicated in first-occurrence order, and kept only when the call
//! graph knows them. Callers always hold the heuristic ranking as fallback.

use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::{
    core::{
        callgraph::{CallGraph, TEST_ID_PATTERN},
        changes::ChangeSet,
        ledger::FailureLedger,
    },
    infra::config::AdvisorConfig,
};

static CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TEST_ID_PATTERN).expect("valid test id pattern"));

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError
{
    #[error("advisor API key is not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("advisor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("advisor returned HTTP {status}: {body}")]
    Status
    {
        status: u16,
        body: String,
    },

    #[error("advisor response had no message content")]
    MalformedResponse,

    #[error("advisor response named no known tests")]
    NoCandidates,
}

/// A chat-style completion service.
pub trait Oracle
{
    fn complete(
        &self,
        prompt: &str,
    ) -> Result<String, AdvisorError>;
}

/// OpenAI-compatible `chat/completions` client.
pub struct HttpOracle
{
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a>
{
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a>
{
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse
{
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice
{
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply
{
    content: Option<String>,
}

impl HttpOracle
{
    /// Build a client from config; the key is read from the configured
    /// environment variable.
    pub fn from_config(cfg: &AdvisorConfig) -> Result<Self, AdvisorError>
    {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AdvisorError::MissingApiKey(cfg.api_key_env.clone()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: cfg
                .endpoint
                .clone(),
            model: cfg
                .model
                .clone(),
            api_key,
        })
    }
}

impl Oracle for HttpOracle
{
    #[instrument(skip_all, fields(endpoint = %self.endpoint, model = %self.model))]
    fn complete(
        &self,
        prompt: &str,
    ) -> Result<String, AdvisorError>
    {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You prioritize automated tests for a code change.",
                },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success()
        {
            let body = response
                .text()
                .unwrap_or_default();
            return Err(AdvisorError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| {
                c.message
                    .content
            })
            .ok_or(AdvisorError::MalformedResponse)
    }
}

/// Pull test identifiers out of free text, first occurrence wins.
pub fn extract_test_ids(text: &str) -> Vec<String>
{
    let mut seen = indexmap::IndexSet::new();
    for m in CANDIDATE.find_iter(text)
    {
        seen.insert(
            m.as_str()
                .to_string(),
        );
    }
    seen.into_iter()
        .collect()
}

/// Render the prompt: the three inputs as JSON inside instructions.
pub fn build_prompt(
    graph: &CallGraph,
    changes: &ChangeSet,
    ledger: &FailureLedger,
) -> String
{
    let payload = json!({
        "call_graph": graph,
        "changed_functions": changes.functions,
        "changed_files": changes.files,
        "failure_counts": ledger.counts(),
    });

    let pretty = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());

    format!(
        "Below is a map from each test to the functions it calls, the functions and files \
         changed in the current diff, and how often each test failed in the past.\n\n\
         {pretty}\n\n\
         Select the tests most likely to catch a regression in this change, most important \
         first, and explain briefly why. Refer to tests by their exact names."
    )
}

/// Sanitizing front of an [`Oracle`].
pub struct Advisor<'a>
{
    oracle: &'a dyn Oracle,
}

impl<'a> Advisor<'a>
{
    pub fn new(oracle: &'a dyn Oracle) -> Self
    {
        Self { oracle }
    }

    /// Ask the oracle for a selection. Only identifiers present in `graph`
    /// survive; an answer with none of them is [`AdvisorError::NoCandidates`].
    pub fn rerank(
        &self,
        graph: &CallGraph,
        changes: &ChangeSet,
        ledger: &FailureLedger,
    ) -> Result<Vec<String>, AdvisorError>
    {
        let prompt = build_prompt(graph, changes, ledger);
        let answer = self
            .oracle
            .complete(&prompt)?;

        let (known, unknown): (Vec<String>, Vec<String>) = extract_test_ids(&answer)
            .into_iter()
            .partition(|t| graph.contains(t));

        if !unknown.is_empty()
        {
            warn!(?unknown, "advisor named tests that are not in the call graph");
        }
        debug!(selected = known.len(), "advisor selection");

        if known.is_empty()
        {
            return Err(AdvisorError::NoCandidates);
        }
        Ok(known)
    }
}
