//! Session and iteration controller
//!
//! `CompareService` is the orchestrator's public surface. It resolves the
//! caller, validates input, runs admission and hands admitted batches to the
//! dispatcher. Reconcile requests go through the same caller resolution.
//! Every check that can refuse a request runs before any task exists.

use prism_core::{MediaType, PrismError, Result, SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admission::{AdmissionGate, CreditBalance, StaticCredits};
use crate::catalog::{ModelCatalog, ModelConfig};
use crate::config::PrismConfig;
use crate::dispatch::Dispatcher;
use crate::ledger::TaskLedger;
use crate::provider::{check_prompt, MAX_PROMPT_CHARS};
use crate::providers::ProviderRegistry;
use crate::reconcile::{Reconciler, SessionSnapshot};
use crate::task::CompareView;

/// Resolves the authenticated caller
pub trait CurrentUser: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

impl CurrentUser for PrismConfig {
    fn current_user(&self) -> Option<UserId> {
        PrismConfig::current_user(self)
    }
}

/// A fixed identity, or none for an anonymous caller
#[derive(Debug, Clone, Default)]
pub struct StaticUser(pub Option<UserId>);

impl StaticUser {
    pub fn signed_in(user_id: impl Into<UserId>) -> Self {
        Self(Some(user_id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CurrentUser for StaticUser {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

/// Start a comparison. All catalog models are used when `models` is omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
}

impl CompareRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            models: None,
        }
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = Some(models.into_iter().map(Into::into).collect());
        self
    }
}

/// Re-run one chosen model with a refined prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterateRequest {
    pub prompt: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub session_id: String,
}

impl ReconcileRequest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// Dispatch and iterate response: `{sessionId, tasks, totalCost}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub session_id: SessionId,
    pub tasks: Vec<CompareView>,
    pub total_cost: u32,
}

/// `0` on success, a stable error code string otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseCode {
    Ok(u8),
    Error(String),
}

/// Response envelope `{code, message, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: ResponseCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: ResponseCode::Ok(0),
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(error: &PrismError) -> Self {
        Self {
            code: ResponseCode::Error(error.code().to_string()),
            message: error.to_string(),
            data: None,
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::error(&e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok(0)
    }
}

/// Orchestrator entry points
pub struct CompareService {
    providers: ProviderRegistry,
    ledger: Arc<dyn TaskLedger>,
    credits: Arc<dyn CreditBalance>,
    users: Arc<dyn CurrentUser>,
    catalog: ModelCatalog,
    max_prompt_chars: usize,
}

impl CompareService {
    pub fn new(
        providers: ProviderRegistry,
        ledger: Arc<dyn TaskLedger>,
        credits: Arc<dyn CreditBalance>,
        users: Arc<dyn CurrentUser>,
        catalog: ModelCatalog,
    ) -> Self {
        Self {
            providers,
            ledger,
            credits,
            users,
            catalog,
            max_prompt_chars: MAX_PROMPT_CHARS,
        }
    }

    /// Wire everything from configuration around the given ledger
    pub fn from_config(config: &PrismConfig, ledger: Arc<dyn TaskLedger>) -> Self {
        Self::new(
            ProviderRegistry::from_config(config),
            ledger,
            Arc::new(StaticCredits::from_map(&config.credits)),
            Arc::new(config.clone()),
            config.catalog(),
        )
        .with_max_prompt_chars(config.compare.max_prompt_chars)
    }

    pub fn with_max_prompt_chars(mut self, max_chars: usize) -> Self {
        self.max_prompt_chars = max_chars;
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn ledger(&self) -> &dyn TaskLedger {
        self.ledger.as_ref()
    }

    /// Fan a prompt out to several models under one new session
    pub fn start_comparison(&self, request: &CompareRequest) -> Result<DispatchResponse> {
        let user_id = self.authenticate()?;
        let prompt = self.validate_prompt(&request.prompt)?;
        let models = match &request.models {
            None => self.catalog.all().to_vec(),
            Some(ids) if ids.is_empty() => {
                return Err(PrismError::InvalidInput(
                    "at least one model is required".to_string(),
                ))
            }
            Some(ids) => self.catalog.resolve(ids).map_err(PrismError::InvalidModel)?,
        };
        self.launch(&user_id, prompt, &models)
    }

    /// Re-dispatch a single model as a fresh, unrelated session
    pub fn start_iteration(&self, request: &IterateRequest) -> Result<DispatchResponse> {
        let user_id = self.authenticate()?;
        let prompt = self.validate_prompt(&request.prompt)?;
        let model = self
            .catalog
            .get(request.model.trim())
            .cloned()
            .ok_or_else(|| PrismError::InvalidModel(request.model.clone()))?;
        if !self.providers.contains(&model.provider) {
            return Err(PrismError::ProviderUnconfigured(model.provider));
        }
        self.launch(&user_id, prompt, std::slice::from_ref(&model))
    }

    /// Refresh a session the caller owns
    pub fn reconcile(&self, request: &ReconcileRequest) -> Result<SessionSnapshot> {
        let session_id = request.session_id.trim();
        if session_id.is_empty() {
            return Err(PrismError::InvalidInput("sessionId is required".to_string()));
        }
        let user_id = self.authenticate()?;
        Reconciler::new(&self.providers, self.ledger.as_ref(), &self.catalog)
            .reconcile(&SessionId::from(session_id), &user_id)
    }

    fn authenticate(&self) -> Result<UserId> {
        self.users.current_user().ok_or(PrismError::Unauthenticated)
    }

    fn validate_prompt<'p>(&self, prompt: &'p str) -> Result<&'p str> {
        check_prompt(prompt, self.max_prompt_chars).map_err(PrismError::InvalidInput)
    }

    fn launch(
        &self,
        user_id: &UserId,
        prompt: &str,
        models: &[ModelConfig],
    ) -> Result<DispatchResponse> {
        let total_cost = ModelCatalog::total_cost(models)?;
        let pass = AdmissionGate::new(self.credits.as_ref()).admit(user_id, total_cost)?;

        let outcome = Dispatcher::new(&self.providers, self.ledger.as_ref()).dispatch(
            pass,
            SessionId::generate(),
            prompt,
            MediaType::Image,
            models,
        )?;

        Ok(DispatchResponse {
            session_id: outcome.session_id,
            tasks: outcome
                .tasks
                .iter()
                .map(|t| CompareView::from_task(t, &self.catalog))
                .collect(),
            total_cost: outcome.total_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::providers::mock::MockProvider;
    use prism_core::TaskStatus;

    struct Harness {
        ledger: Arc<MemoryLedger>,
        credits: Arc<StaticCredits>,
        alpha: Arc<MockProvider>,
        service: CompareService,
    }

    fn catalog() -> ModelCatalog {
        ModelCatalog::new(vec![
            ModelConfig::new("alpha/one", "Alpha", "Crisp", 2, "alpha"),
            ModelConfig::new("beta/one", "Beta", "Soft", 4, "beta"),
            ModelConfig::new("gamma/one", "Gamma", "Odd", 1, "gamma"),
        ])
    }

    fn harness(user: StaticUser, balance: u32) -> Harness {
        let alice = UserId::from("alice");
        let alpha = Arc::new(
            MockProvider::named("alpha")
                .with_script(vec![TaskStatus::Processing, TaskStatus::Success]),
        );
        let beta = Arc::new(MockProvider::named("beta").with_script(vec![TaskStatus::Success]));
        let ledger = Arc::new(MemoryLedger::new());
        let credits = Arc::new(StaticCredits::new().with_balance(&alice, balance));
        let service = CompareService::new(
            ProviderRegistry::new().with(alpha.clone()).with(beta),
            ledger.clone(),
            credits.clone(),
            Arc::new(user),
            catalog(),
        );
        Harness {
            ledger,
            credits,
            alpha,
            service,
        }
    }

    fn alice(balance: u32) -> Harness {
        harness(StaticUser::signed_in("alice"), balance)
    }

    fn cat_request() -> CompareRequest {
        CompareRequest::new("a cute orange cat").with_models(["alpha/one", "beta/one"])
    }

    #[test]
    fn test_cat_scenario_end_to_end() {
        let h = alice(10);
        let started = h.service.start_comparison(&cat_request()).unwrap();
        assert_eq!(started.tasks.len(), 2);
        assert_eq!(started.total_cost, 6);

        let request = ReconcileRequest::new(started.session_id.as_str());
        let first = h.service.reconcile(&request).unwrap();
        assert_eq!(first.tasks[0].status, TaskStatus::Processing);
        assert_eq!(first.tasks[1].status, TaskStatus::Success);
        assert!(!first.all_complete);

        let second = h.service.reconcile(&request).unwrap();
        assert_eq!(second.tasks[0].status, TaskStatus::Success);
        assert!(second.tasks[0].image_url.is_some());
        assert!(second.all_complete);
    }

    #[test]
    fn test_insufficient_credits_creates_nothing() {
        let h = alice(3);
        let err = h.service.start_comparison(&cat_request()).unwrap_err();
        assert!(matches!(
            err,
            PrismError::InsufficientCredits {
                required: 6,
                available: 3
            }
        ));
        assert!(h.ledger.list().unwrap().is_empty());
        assert_eq!(h.alpha.generate_calls(), 0);
        assert_eq!(
            h.credits.remaining_credits(&UserId::from("alice")).unwrap(),
            3
        );
    }

    #[test]
    fn test_overflowing_batch_cost_is_rejected_before_submission() {
        let alpha = Arc::new(MockProvider::named("alpha"));
        let ledger = Arc::new(MemoryLedger::new());
        let service = CompareService::new(
            ProviderRegistry::new().with(alpha.clone()),
            ledger.clone(),
            Arc::new(StaticCredits::new().with_balance(&UserId::from("alice"), 5)),
            Arc::new(StaticUser::signed_in("alice")),
            ModelCatalog::new(vec![
                ModelConfig::new("alpha/huge", "Huge", "Costly", u32::MAX, "alpha"),
                ModelConfig::new("alpha/one", "Alpha", "Crisp", 6, "alpha"),
            ]),
        );

        let err = service
            .start_comparison(&CompareRequest::new("a cute orange cat"))
            .unwrap_err();

        assert!(matches!(err, PrismError::InvalidInput(_)));
        assert_eq!(alpha.generate_calls(), 0);
        assert!(ledger.list().unwrap().is_empty());
    }

    #[test]
    fn test_omitted_models_uses_whole_catalog() {
        let h = alice(100);
        let started = h
            .service
            .start_comparison(&CompareRequest::new("a cat"))
            .unwrap();
        assert_eq!(started.tasks.len(), 3);
        assert_eq!(started.total_cost, 7);
        // gamma has no registered provider; its task fails on its own
        assert_eq!(started.tasks[2].status, TaskStatus::Failed);
        assert_eq!(
            started.tasks[2].error.as_deref(),
            Some("gamma provider not configured")
        );
        assert_eq!(started.tasks[0].status, TaskStatus::Pending);
    }

    #[test]
    fn test_iteration_is_a_new_unlinked_session() {
        let h = alice(100);
        let first = h.service.start_comparison(&cat_request()).unwrap();

        let iterated = h
            .service
            .start_iteration(&IterateRequest {
                prompt: "a cute orange cat wearing a hat".to_string(),
                model: "beta/one".to_string(),
            })
            .unwrap();

        assert_ne!(iterated.session_id, first.session_id);
        assert_eq!(iterated.tasks.len(), 1);
        assert_eq!(iterated.total_cost, 4);
        assert_eq!(iterated.tasks[0].model, "beta/one");

        let stored = h.ledger.find_by_session(&iterated.session_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored.iter().all(|t| t.session_id != first.session_id));
        assert_eq!(stored[0].prompt, "a cute orange cat wearing a hat");
    }

    #[test]
    fn test_iteration_rejects_unknown_model_and_missing_provider() {
        let h = alice(100);
        let unknown = h.service.start_iteration(&IterateRequest {
            prompt: "a cat".to_string(),
            model: "nope/model".to_string(),
        });
        assert!(matches!(unknown, Err(PrismError::InvalidModel(_))));

        let unconfigured = h.service.start_iteration(&IterateRequest {
            prompt: "a cat".to_string(),
            model: "gamma/one".to_string(),
        });
        assert!(matches!(
            unconfigured,
            Err(PrismError::ProviderUnconfigured(ref p)) if p == "gamma"
        ));
        assert!(h.ledger.list().unwrap().is_empty());
    }

    #[test]
    fn test_anonymous_caller_is_unauthenticated() {
        let h = harness(StaticUser::anonymous(), 100);
        assert!(matches!(
            h.service.start_comparison(&cat_request()),
            Err(PrismError::Unauthenticated)
        ));
        assert!(matches!(
            h.service.reconcile(&ReconcileRequest::new("some-session")),
            Err(PrismError::Unauthenticated)
        ));
        assert!(h.ledger.list().unwrap().is_empty());
    }

    #[test]
    fn test_prompt_validation() {
        let h = alice(100);
        assert!(matches!(
            h.service.start_comparison(&CompareRequest::new("   ")),
            Err(PrismError::InvalidInput(_))
        ));

        let short = alice(100);
        let service = short.service.with_max_prompt_chars(5);
        assert!(matches!(
            service.start_comparison(&CompareRequest::new("a very long prompt")),
            Err(PrismError::InvalidInput(_))
        ));

        let trimmed = h
            .service
            .start_comparison(&CompareRequest::new("  a cat  ").with_models(["alpha/one"]))
            .unwrap();
        let stored = h.ledger.find_by_session(&trimmed.session_id).unwrap();
        assert_eq!(stored[0].prompt, "a cat");
    }

    #[test]
    fn test_unknown_or_empty_model_list() {
        let h = alice(100);
        assert!(matches!(
            h.service
                .start_comparison(&CompareRequest::new("a cat").with_models(["alpha/one", "zeta/x"])),
            Err(PrismError::InvalidModel(ref m)) if m == "zeta/x"
        ));
        assert!(matches!(
            h.service
                .start_comparison(&CompareRequest::new("a cat").with_models(Vec::<String>::new())),
            Err(PrismError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reconcile_requires_session_id() {
        let h = alice(100);
        assert!(matches!(
            h.service.reconcile(&ReconcileRequest::new(" ")),
            Err(PrismError::InvalidInput(_))
        ));
        assert!(matches!(
            h.service.reconcile(&ReconcileRequest::new("missing")),
            Err(PrismError::NotFound(_))
        ));
    }

    #[test]
    fn test_envelope_codes() {
        let ok: ApiResponse<u32> = ApiResponse::from_result(Ok(6));
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["code"], 0);
        assert_eq!(value["data"], 6);
        assert!(ok.is_ok());

        let err: ApiResponse<u32> = ApiResponse::from_result(Err(PrismError::Unauthenticated));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "unauthenticated");
        assert_eq!(value["message"], "No auth, please sign in");
        assert!(value.get("data").is_none());
        assert!(!err.is_ok());
    }

    #[test]
    fn test_request_wire_shapes() {
        let request: CompareRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        assert!(request.models.is_none());
        let request: ReconcileRequest =
            serde_json::from_str(r#"{"sessionId":"abc"}"#).unwrap();
        assert_eq!(request.session_id, "abc");
    }
}
