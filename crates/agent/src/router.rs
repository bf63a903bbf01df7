//! The mode router: select mode, optionally retrieve, then respond.

use crate::mode::ChatMode;
use crate::state::{Retrieval, TurnState};
use lumen_catalog::{Catalog, FilterOutcome};
use lumen_core::{AppError, AppResult};
use lumen_llm::{
    ChatMessage, ChatRole, ExtractionRequest, Extractor, LlmClient, LlmRequest, ResponseSchema,
};
use lumen_prompt::{build_prompt, load_prompt, PromptDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

const SELECT_MODE_PROMPT: &str = "router.select_mode";
const RETRIEVE_PROMPT: &str = "router.retrieve";
const RESPOND_PROMPT: &str = "router.respond";

/// Name of the search criteria extraction schema.
const SEARCH_SCHEMA_NAME: &str = "search_criteria";

/// Model settings for the response step.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub model: String,
    /// Language every reply is written in
    pub language: String,
    pub temperature: f32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            language: "Deutsch".to_string(),
            temperature: 0.0,
        }
    }
}

/// The three prompt definitions the router renders.
#[derive(Debug, Clone)]
pub struct RouterPrompts {
    select_mode: PromptDefinition,
    retrieve: PromptDefinition,
    respond: PromptDefinition,
}

impl RouterPrompts {
    /// Load the router prompts, honouring overrides in `workspace`.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        Ok(Self {
            select_mode: load_prompt(workspace, SELECT_MODE_PROMPT)?,
            retrieve: load_prompt(workspace, RETRIEVE_PROMPT)?,
            respond: load_prompt(workspace, RESPOND_PROMPT)?,
        })
    }
}

/// Workflow position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    SelectMode,
    Retrieve,
    GenerateResponse,
}

/// Routes one conversation turn through classification, retrieval and reply.
///
/// Holds no conversation state; every call gets the full history and
/// returns a fresh [`TurnState`].
pub struct ModeRouter {
    extractor: Arc<dyn Extractor>,
    llm: Arc<dyn LlmClient>,
    catalog: Arc<Catalog>,
    prompts: RouterPrompts,
    settings: RouterSettings,
}

impl ModeRouter {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        llm: Arc<dyn LlmClient>,
        catalog: Arc<Catalog>,
        prompts: RouterPrompts,
        settings: RouterSettings,
    ) -> Self {
        Self {
            extractor,
            llm,
            catalog,
            prompts,
            settings,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Answer the last user message of `messages`.
    ///
    /// # Errors
    /// - `AppError::Other` if the history does not end with a user message
    /// - `AppError::Extraction` when a structured extraction keeps failing
    /// - `AppError::Schema` / `AppError::UnsupportedOperator` for unusable
    ///   search criteria
    /// - `AppError::LlmRejected` if the provider refuses a request
    /// - `AppError::Llm` if the reply cannot be generated
    pub async fn run_turn(&self, messages: Vec<ChatMessage>) -> AppResult<TurnState> {
        if messages.last().map(|m| m.role) != Some(ChatRole::User) {
            return Err(AppError::Other(
                "A turn needs a user message at the end of the history".to_string(),
            ));
        }

        let span = tracing::info_span!("turn", history = messages.len());
        self.drive(TurnState::new(messages)).instrument(span).await
    }

    async fn drive(&self, mut state: TurnState) -> AppResult<TurnState> {
        let mut step = Step::SelectMode;

        loop {
            tracing::debug!("Router step: {:?}", step);
            (state, step) = match step {
                Step::SelectMode => {
                    let state = self.select_mode(state).await?;
                    let next = match state.mode {
                        ChatMode::Retrieval => Step::Retrieve,
                        ChatMode::ChitChat => Step::GenerateResponse,
                    };
                    (state, next)
                }
                Step::Retrieve => (self.retrieve(state).await?, Step::GenerateResponse),
                Step::GenerateResponse => return self.generate_response(state).await,
            };
        }
    }

    /// Classify the conversation as chit-chat or retrieval.
    pub async fn select_mode(&self, mut state: TurnState) -> AppResult<TurnState> {
        let instruction = build_prompt(&self.prompts.select_mode, HashMap::new())?.instruction();
        let request = ExtractionRequest::new(
            ChatMode::response_schema(),
            with_instruction(instruction, &state.messages),
        );

        let value = self.extractor.extract(&request).await?;
        state.mode = ChatMode::from_extraction(&value)?;

        tracing::info!("Chat mode: {}", state.mode);
        Ok(state)
    }

    /// Extract search criteria and run them against the catalog.
    pub async fn retrieve(&self, mut state: TurnState) -> AppResult<TurnState> {
        let instruction = build_prompt(&self.prompts.retrieve, HashMap::new())?.instruction();
        let schema = ResponseSchema {
            name: SEARCH_SCHEMA_NAME.to_string(),
            schema: self.catalog.schema().extraction_schema(),
        };
        let request = ExtractionRequest::new(schema, with_instruction(instruction, &state.messages));

        let value = self.extractor.extract(&request).await?;
        let spec = self.catalog.parse_spec(&value)?;
        tracing::debug!("Search criteria: {}", serde_json::to_string(&spec)?);

        let matches = match self.catalog.filter(&spec)? {
            FilterOutcome::Matches(records) => records.into_iter().cloned().collect(),
            FilterOutcome::NoResults => Vec::new(),
        };

        tracing::info!(
            "Retrieved {} of {} records ({} active conditions)",
            matches.len(),
            self.catalog.len(),
            spec.active().count()
        );

        state.retrieval = Some(Retrieval { spec, matches });
        Ok(state)
    }

    /// Produce the reply from the history and, in retrieval mode, the matches.
    pub async fn generate_response(&self, mut state: TurnState) -> AppResult<TurnState> {
        let mut variables = HashMap::new();
        variables.insert("language".to_string(), self.settings.language.clone());

        if state.mode == ChatMode::Retrieval {
            variables.insert("retrieval".to_string(), "true".to_string());
            let matches = state.matches();
            if !matches.is_empty() {
                let records: Vec<serde_json::Value> = matches.iter().map(|r| r.to_json()).collect();
                variables.insert("results".to_string(), serde_json::to_string(&records)?);
                variables.insert("count".to_string(), matches.len().to_string());
            }
        }

        let instruction = build_prompt(&self.prompts.respond, variables)?.instruction();
        let request = LlmRequest::new(&self.settings.model, state.messages.clone())
            .with_system(instruction)
            .with_temperature(self.settings.temperature);

        let response = self.llm.complete(&request).await?;
        tracing::debug!(
            "Reply from {} ({} completion tokens)",
            response.model,
            response.usage.completion_tokens
        );

        state.response = Some(response.content);
        Ok(state)
    }
}

/// System instruction followed by the conversation.
fn with_instruction(instruction: String, history: &[ChatMessage]) -> Vec<ChatMessage> {
    std::iter::once(ChatMessage::system(instruction))
        .chain(history.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_catalog::{FieldDef, FieldType, Record, Schema, Value};
    use lumen_llm::MockClient;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Extractor that replays canned results and records schema names.
    struct ScriptedExtractor {
        replies: Mutex<VecDeque<AppResult<serde_json::Value>>>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    impl ScriptedExtractor {
        fn new(replies: Vec<AppResult<serde_json::Value>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn schema_names(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.schema.name.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl Extractor for ScriptedExtractor {
        async fn extract(&self, request: &ExtractionRequest) -> AppResult<serde_json::Value> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Extraction("script exhausted".to_string())))
        }
    }

    fn catalog() -> Arc<Catalog> {
        let schema = Schema::new(vec![
            FieldDef::new("name", FieldType::Text),
            FieldDef::new("nennleistung", FieldType::Float),
        ])
        .unwrap();
        let lamp = |name: &str, watt: f64| {
            Record::new()
                .with("name", Value::Text(name.to_string()))
                .with("nennleistung", Value::Float(watt))
        };
        Arc::new(Catalog::new(
            schema,
            vec![lamp("XBO 2000 W/HS OFR", 2000.0), lamp("XBO 4000 W/HS XL OFR", 4000.0)],
        ))
    }

    struct Fixture {
        router: ModeRouter,
        extractor: Arc<ScriptedExtractor>,
        llm: Arc<MockClient>,
        _workspace: TempDir,
    }

    fn fixture(extractions: Vec<AppResult<serde_json::Value>>, replies: &[&str]) -> Fixture {
        fixture_in(TempDir::new().unwrap(), extractions, replies)
    }

    fn fixture_in(
        workspace: TempDir,
        extractions: Vec<AppResult<serde_json::Value>>,
        replies: &[&str],
    ) -> Fixture {
        let extractor = Arc::new(ScriptedExtractor::new(extractions));
        let llm = Arc::new(MockClient::with_replies(replies.iter().copied()));
        let router = ModeRouter::new(
            extractor.clone(),
            llm.clone(),
            catalog(),
            RouterPrompts::load(workspace.path()).unwrap(),
            RouterSettings::default(),
        );
        Fixture {
            router,
            extractor,
            llm,
            _workspace: workspace,
        }
    }

    fn question(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(text)]
    }

    #[tokio::test]
    async fn test_chit_chat_skips_retrieval() {
        let f = fixture(vec![Ok(json!({"chat_mode": "chit-chat"}))], &["Hallo! Wie kann ich helfen?"]);

        let state = f.router.run_turn(question("Hallo")).await.unwrap();

        assert_eq!(state.mode, ChatMode::ChitChat);
        assert!(state.retrieval.is_none());
        assert_eq!(state.answer(), "Hallo! Wie kann ich helfen?");
        assert_eq!(f.extractor.schema_names(), vec!["chat_mode"]);

        let sent = f.llm.requests();
        assert_eq!(sent.len(), 1);
        let system = sent[0].system.as_deref().unwrap();
        assert!(system.contains("Antworte immer auf Deutsch."));
        assert!(!system.contains("Ergebnisse"));
        assert_eq!(sent[0].messages, question("Hallo"));
    }

    #[tokio::test]
    async fn test_retrieval_embeds_matches() {
        let f = fixture(
            vec![
                Ok(json!({"chat_mode": "retrieval"})),
                Ok(json!({"name": null, "nennleistung": {"operator": ">=", "value": 3000}})),
            ],
            &["Die XBO 4000 W/HS XL OFR hat 4000 W."],
        );

        let state = f
            .router
            .run_turn(question("Welche Lampen haben mindestens 3000 W?"))
            .await
            .unwrap();

        assert_eq!(state.mode, ChatMode::Retrieval);
        assert_eq!(state.matches().len(), 1);
        assert_eq!(
            state.matches()[0].value("name"),
            &Value::Text("XBO 4000 W/HS XL OFR".to_string())
        );
        assert_eq!(f.extractor.schema_names(), vec!["chat_mode", SEARCH_SCHEMA_NAME]);

        let system = f.llm.requests()[0].system.clone().unwrap();
        assert!(system.contains("XBO 4000 W/HS XL OFR"));
        assert!(!system.contains("XBO 2000 W/HS OFR"));
    }

    #[tokio::test]
    async fn test_no_results_instructs_model() {
        let f = fixture(
            vec![
                Ok(json!({"chat_mode": "retrieval"})),
                Ok(json!({"name": null, "nennleistung": {"operator": ">", "value": 10000}})),
            ],
            &["Leider nichts gefunden."],
        );

        let state = f.router.run_turn(question("Gibt es 10 kW Lampen?")).await.unwrap();

        assert!(state.retrieval.as_ref().unwrap().is_empty());
        let system = f.llm.requests()[0].system.clone().unwrap();
        assert!(system.contains("keine Leuchtmittel zu dieser Anfrage gefunden"));
    }

    #[tokio::test]
    async fn test_extraction_sees_instruction_then_history() {
        let f = fixture(vec![Ok(json!({"chat_mode": "chit-chat"}))], &["ok"]);
        let history = vec![
            ChatMessage::user("Hallo"),
            ChatMessage::assistant("Hallo!"),
            ChatMessage::user("Danke"),
        ];

        f.router.run_turn(history.clone()).await.unwrap();

        let seen = f.extractor.seen.lock().unwrap();
        assert_eq!(seen[0].messages[0].role, ChatRole::System);
        assert_eq!(&seen[0].messages[1..], history.as_slice());
    }

    #[tokio::test]
    async fn test_unknown_field_aborts_turn() {
        let f = fixture(
            vec![
                Ok(json!({"chat_mode": "retrieval"})),
                Ok(json!({"farbe": "rot"})),
            ],
            &[],
        );

        let result = f.router.run_turn(question("Rote Lampen?")).await;

        assert!(matches!(result, Err(AppError::Schema(_))));
        assert!(f.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_operator_aborts_turn() {
        let f = fixture(
            vec![
                Ok(json!({"chat_mode": "retrieval"})),
                Ok(json!({"name": null, "nennleistung": {"operator": "=~", "value": 1}})),
            ],
            &["nie gesendet"],
        );

        let result = f.router.run_turn(question("Lampen wie 1 W?")).await;

        match result {
            Err(AppError::UnsupportedOperator(token)) => assert_eq!(token, "=~"),
            other => panic!("Expected unsupported operator, got {:?}", other.map(|s| s.mode)),
        }
        assert_eq!(f.extractor.schema_names(), vec!["chat_mode", SEARCH_SCHEMA_NAME]);
        assert!(f.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_override_system_part_is_sent() {
        let workspace = TempDir::new().unwrap();
        let prompts = workspace.path().join(".lumen").join("prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(
            prompts.join("router.select_mode.yml"),
            r#"id: router.select_mode
title: Modus
apiVersion: "1.0"
system: "Du bist der Lumen-Klassifikator."
template: "Wähle chit-chat oder retrieval."
output:
  format: json
"#,
        )
        .unwrap();
        std::fs::write(
            prompts.join("router.respond.yml"),
            r#"id: router.respond
title: Antwort
apiVersion: "1.0"
system: "Du bist Lumi, der Lampenberater."
template: "Antworte auf {{language}}."
output:
  format: text
"#,
        )
        .unwrap();

        let f = fixture_in(workspace, vec![Ok(json!({"chat_mode": "chit-chat"}))], &["Hallo!"]);
        f.router.run_turn(question("Hallo")).await.unwrap();

        let seen = f.extractor.seen.lock().unwrap();
        assert_eq!(
            seen[0].messages[0].content,
            "Du bist der Lumen-Klassifikator.\n\nWähle chit-chat oder retrieval."
        );

        let system = f.llm.requests()[0].system.clone().unwrap();
        assert_eq!(system, "Du bist Lumi, der Lampenberater.\n\nAntworte auf Deutsch.");
    }

    #[tokio::test]
    async fn test_reply_uses_configured_temperature() {
        let workspace = TempDir::new().unwrap();
        let llm = Arc::new(MockClient::with_replies(["Hallo!"]));
        let router = ModeRouter::new(
            Arc::new(ScriptedExtractor::new(vec![Ok(json!({"chat_mode": "chit-chat"}))])),
            llm.clone(),
            catalog(),
            RouterPrompts::load(workspace.path()).unwrap(),
            RouterSettings {
                temperature: 0.7,
                ..RouterSettings::default()
            },
        );

        router.run_turn(question("Hallo")).await.unwrap();

        assert_eq!(llm.requests()[0].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_extraction_failure_propagates() {
        let f = fixture(
            vec![Err(AppError::Extraction("model output unusable".to_string()))],
            &[],
        );

        let result = f.router.run_turn(question("Hallo")).await;

        match result {
            Err(AppError::Extraction(msg)) => assert!(msg.contains("unusable")),
            other => panic!("Expected extraction failure, got {:?}", other.map(|s| s.mode)),
        }
        assert!(f.llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_turn_requires_user_message() {
        let f = fixture(vec![], &[]);
        let result = f.router.run_turn(vec![ChatMessage::assistant("Hallo")]).await;
        assert!(matches!(result, Err(AppError::Other(_))));
        assert!(f.extractor.schema_names().is_empty());
    }

    #[tokio::test]
    async fn test_steps_are_independent() {
        let f = fixture(vec![], &["Antwort"]);
        let mut state = TurnState::new(question("Hallo"));
        state.mode = ChatMode::Retrieval;
        state.retrieval = Some(Retrieval {
            spec: lumen_catalog::FilterSpec::new(),
            matches: f.router.catalog().records().to_vec(),
        });

        let state = f.router.generate_response(state).await.unwrap();

        assert_eq!(state.answer(), "Antwort");
        let system = f.llm.requests()[0].system.clone().unwrap();
        assert!(system.contains("Ergebnisse (2)"));
    }
}
