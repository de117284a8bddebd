//! MathWiz Agents - Solver Agents and Orchestration
//!
//! Provides the question-processing workflow:
//! - Solver agents (Calculus, Algebra, Statistics, GeneralMath)
//! - Prioritized keyword routing
//! - The per-question pipeline (route, build context, solve, reflect, persist)
//!
//! Routing is substring keyword matching over an ordered route list. Answer
//! correctness is delegated entirely to the generation backend; this crate
//! only sequences the pipeline and records its outcome.

use async_trait::async_trait;
use chrono::Utc;
use mathwiz_context::{ContextAssembler, QuestionContext};
use mathwiz_core::{
    new_entity_key, EntityKey, GenerationCall, GenerationOptions, MathWizResult, MessageRole,
    PipelineStage, Reflection, Solution, Task, TaskStatus, Timestamp,
};
use mathwiz_llm::{mock_response, GenerationProvider, ProviderRegistry};
use mathwiz_storage::SessionStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// AGENT PROFILES
// ============================================================================

/// Static description of one solver agent: its identity, routing keywords,
/// capability list, confidence prior, and prompt framing.
///
/// Confidence priors are fixed constants per agent, not computed scores.
/// They stand in for a real scoring model and must stay reproducible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentProfile {
    pub name: &'static str,
    /// Fixed confidence prior attached to every solution from this agent
    pub confidence: f32,
    pub method_source: &'static str,
    pub capabilities: &'static [&'static str],
    /// Routing keywords, matched as lower-cased substrings
    pub keywords: &'static [&'static str],
    /// Opening line of the solve prompt
    prompt_role: &'static str,
    /// Closing instruction of the solve prompt
    prompt_tail: &'static str,
}

const CALCULUS_PROFILE: AgentProfile = AgentProfile {
    name: "Calculus Agent",
    confidence: 0.85,
    method_source: "generation + calculus knowledge",
    capabilities: &[
        "derivatives",
        "integrals",
        "limits",
        "differential equations",
        "multivariable calculus",
    ],
    keywords: &[
        "derivative",
        "integral",
        "limit",
        "differentiate",
        "integrate",
        "dx",
        "dy",
        "calculus",
        "rate of change",
        "area under curve",
    ],
    prompt_role: "You are an expert calculus tutor. Solve this problem step by step with clear reasoning.",
    prompt_tail: "Provide a detailed, step-by-step solution with explanations for each step.",
};

const ALGEBRA_PROFILE: AgentProfile = AgentProfile {
    name: "Algebra Agent",
    confidence: 0.88,
    method_source: "generation + algebra knowledge",
    capabilities: &[
        "linear equations",
        "quadratic equations",
        "polynomials",
        "factoring",
        "systems of equations",
    ],
    keywords: &[
        "solve",
        "equation",
        "variable",
        "algebra",
        "factor",
        "polynomial",
        "quadratic",
        "linear",
        "x =",
        "y =",
    ],
    prompt_role: "You are an algebra expert. Solve the following algebra problem step by step.",
    prompt_tail: "Provide a detailed solution showing all algebraic steps.",
};

const STATISTICS_PROFILE: AgentProfile = AgentProfile {
    name: "Statistics Agent",
    confidence: 0.86,
    method_source: "generation + statistics knowledge",
    capabilities: &[
        "probability",
        "statistics",
        "data analysis",
        "distributions",
        "hypothesis testing",
    ],
    keywords: &[
        "probability",
        "statistics",
        "mean",
        "median",
        "mode",
        "variance",
        "standard deviation",
        "distribution",
        "sample",
        "hypothesis",
        "confidence interval",
        "correlation",
    ],
    prompt_role: "You are a statistics and probability expert. Solve the following problem step by step.",
    prompt_tail: "Provide a detailed solution with statistical reasoning and calculations.",
};

const GENERAL_PROFILE: AgentProfile = AgentProfile {
    name: "General Math Agent",
    confidence: 0.80,
    method_source: "generation + general math knowledge",
    capabilities: &[
        "arithmetic",
        "geometry",
        "trigonometry",
        "word problems",
        "general mathematics",
    ],
    keywords: &[
        "calculate",
        "compute",
        "find",
        "what is",
        "math",
        "geometry",
        "triangle",
        "circle",
        "angle",
        "area",
        "volume",
    ],
    prompt_role: "You are a mathematics expert. Solve the following problem step by step.",
    prompt_tail: "Provide a clear, step-by-step solution.",
};

// ============================================================================
// INTROSPECTION
// ============================================================================

/// Length bucket used in self-diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemComplexity {
    /// Under 50 characters
    Low,
    /// Under 100 characters
    Medium,
    /// 100 characters or more
    High,
}

impl ProblemComplexity {
    fn from_question(question: &str) -> Self {
        let len = question.chars().count();
        if len >= 100 {
            Self::High
        } else if len >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Self-diagnostic data an agent produces about one question.
/// Purely descriptive; nothing in the pipeline consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introspection {
    pub agent_name: String,
    pub complexity: ProblemComplexity,
    /// Whether the agent's routing predicate matches this question
    pub capability_match: bool,
    /// Capability entries whose words appear in the question text
    pub matched_capabilities: Vec<String>,
    pub limitations: Vec<String>,
    pub improvement_hints: Vec<String>,
}

const IMPROVEMENT_HINTS: &[&str] = &[
    "Could benefit from more examples",
    "May need additional context for edge cases",
    "Consider cross-validation with other agents",
];

// ============================================================================
// MATH AGENT TRAIT
// ============================================================================

/// A solver bound to one math subdomain.
///
/// The solve and reflect contracts are fail-soft: an absent or failing
/// generation backend yields a clearly-labeled placeholder answer and a
/// rule-based reflection rather than an error. The pipeline therefore never
/// aborts once routing has succeeded.
#[async_trait]
pub trait MathAgent: Send + Sync {
    /// The agent's static profile.
    fn profile(&self) -> &AgentProfile;

    /// The generation backend, if one was injected.
    fn generation(&self) -> Option<&Arc<dyn GenerationProvider>>;

    /// The agent's display name.
    fn name(&self) -> &'static str {
        self.profile().name
    }

    /// The agent's capability list.
    fn capabilities(&self) -> Vec<String> {
        self.profile()
            .capabilities
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    /// Whether this agent's keyword set matches the question.
    /// Lower-cased substring match, no tokenization or stemming.
    fn can_handle(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        self.profile().keywords.iter().any(|k| lowered.contains(k))
    }

    /// Build the solve prompt: role framing, the question, retrieved context
    /// when present, and a closing instruction. Conversation history is not
    /// embedded in the prompt; it travels separately in the context bundle.
    fn build_prompt(&self, question: &str, context: Option<&QuestionContext>) -> String {
        let profile = self.profile();
        let mut prompt = format!("{}\n\nProblem: {}\n", profile.prompt_role, question);
        if let Some(text) = context.and_then(|c| c.retrieval_text.as_deref()) {
            prompt.push_str(&format!("\nRelevant context from textbooks:\n{text}\n"));
        }
        prompt.push_str(&format!("\n{}", profile.prompt_tail));
        prompt
    }

    /// Solve the question, producing a solution record linked to `task_id`.
    ///
    /// Never fails: a missing backend yields a labeled placeholder answer, a
    /// failing backend yields the mock completion.
    async fn solve(
        &self,
        task_id: &str,
        question: &str,
        context: Option<&QuestionContext>,
    ) -> Solution {
        let profile = self.profile();
        let answer = match self.generation() {
            Some(provider) => {
                let prompt = self.build_prompt(question, context);
                match provider.generate(&prompt, &GenerationOptions::solving()).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::debug!(agent = profile.name, error = %e, "generation failed, using mock answer");
                        mock_response()
                    }
                }
            }
            None => format!(
                "[{}] Solution for: {}\n(generation backend not configured)",
                profile.name, question
            ),
        };
        Solution::new(
            task_id,
            question,
            &answer,
            profile.method_source,
            profile.confidence,
        )
    }

    /// Critique a solution. Uses the generation backend when available,
    /// carrying the solution's confidence forward; otherwise (or when the
    /// critique call fails) falls back to a deterministic rule-based tier.
    async fn reflect(&self, solution: &Solution, question: &str) -> Reflection {
        if let Some(provider) = self.generation() {
            let prompt = reflection_prompt(question, &solution.answer);
            match provider.generate(&prompt, &GenerationOptions::reflecting()).await {
                Ok(critique) => {
                    return Reflection::new(
                        &solution.task_id,
                        &critique,
                        "See detailed evaluation above",
                        solution.confidence,
                    );
                }
                Err(e) => {
                    tracing::debug!(agent = self.name(), error = %e, "reflection call failed, using rule-based fallback");
                }
            }
        }
        self.rule_based_reflection(solution)
    }

    /// Deterministic reflection by confidence tier: > 0.85 robust,
    /// > 0.70 solid, else needs verification.
    fn rule_based_reflection(&self, solution: &Solution) -> Reflection {
        let confidence = solution.confidence;
        let mut evaluation = format!(
            "{} completed the task with {:.0}% confidence",
            self.name(),
            confidence * 100.0
        );
        let suggestion = if confidence > 0.85 {
            evaluation.push_str(". Solution appears robust and well-explained.");
            "Solution is comprehensive and clear."
        } else if confidence > 0.70 {
            evaluation.push_str(". Solution is solid but could be enhanced.");
            "Consider adding more detailed explanations or alternative approaches."
        } else {
            evaluation.push_str(". Solution may need verification.");
            "Recommend manual verification or consultation with additional resources."
        };
        Reflection::new(&solution.task_id, &evaluation, suggestion, confidence)
    }

    /// Derived, non-authoritative diagnostics about how this agent relates
    /// to the question. Never consumed elsewhere in the pipeline.
    fn introspect(&self, question: &str) -> Introspection {
        let profile = self.profile();
        let lowered = question.to_lowercase();
        let matched_capabilities = profile
            .capabilities
            .iter()
            .filter(|cap| cap.split_whitespace().any(|word| lowered.contains(word)))
            .map(|c| c.to_string())
            .collect();

        let mut limitations = Vec::new();
        if question.chars().count() > 200 {
            limitations.push("Long problem may require breaking into sub-problems".to_string());
        }
        if !self.can_handle(question) {
            limitations.push("Problem may be outside primary expertise area".to_string());
        }
        if lowered.contains("prove") || lowered.contains("proof") {
            limitations.push("Formal proofs may require specialized validation".to_string());
        }
        if limitations.is_empty() {
            limitations.push("No significant limitations identified".to_string());
        }

        Introspection {
            agent_name: profile.name.to_string(),
            complexity: ProblemComplexity::from_question(question),
            capability_match: self.can_handle(question),
            matched_capabilities,
            limitations,
            improvement_hints: IMPROVEMENT_HINTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

fn reflection_prompt(question: &str, answer: &str) -> String {
    let excerpt: String = answer.chars().take(500).collect();
    format!(
        "Reflect on this solution and evaluate its quality:\n\n\
         Problem: {question}\n\
         Solution: {excerpt}\n\n\
         Provide:\n\
         1. Evaluation: Is the solution correct and complete?\n\
         2. Suggestions: Any improvements or clarifications needed?\n\
         3. Confidence: Rate your confidence in this solution (0-1)\n\n\
         Be critical and constructive."
    )
}

// ============================================================================
// SOLVER AGENTS
// ============================================================================

macro_rules! solver_agent {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name {
            generation: Option<Arc<dyn GenerationProvider>>,
        }

        impl $name {
            /// Create the agent, optionally bound to a generation backend.
            pub fn new(generation: Option<Arc<dyn GenerationProvider>>) -> Self {
                Self { generation }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("generation", &self.generation.is_some())
                    .finish()
            }
        }
    };
}

solver_agent!(
    /// Solver for derivatives, integrals, limits, and differential equations.
    CalculusAgent
);
solver_agent!(
    /// Solver for equations, polynomials, and factoring.
    AlgebraAgent
);
solver_agent!(
    /// Solver for probability, distributions, and hypothesis testing.
    StatisticsAgent
);
solver_agent!(
    /// Fallback solver. Its routing predicate always matches.
    GeneralMathAgent
);

#[async_trait]
impl MathAgent for CalculusAgent {
    fn profile(&self) -> &AgentProfile {
        &CALCULUS_PROFILE
    }
    fn generation(&self) -> Option<&Arc<dyn GenerationProvider>> {
        self.generation.as_ref()
    }
}

#[async_trait]
impl MathAgent for AlgebraAgent {
    fn profile(&self) -> &AgentProfile {
        &ALGEBRA_PROFILE
    }
    fn generation(&self) -> Option<&Arc<dyn GenerationProvider>> {
        self.generation.as_ref()
    }
}

#[async_trait]
impl MathAgent for StatisticsAgent {
    fn profile(&self) -> &AgentProfile {
        &STATISTICS_PROFILE
    }
    fn generation(&self) -> Option<&Arc<dyn GenerationProvider>> {
        self.generation.as_ref()
    }
}

#[async_trait]
impl MathAgent for GeneralMathAgent {
    fn profile(&self) -> &AgentProfile {
        &GENERAL_PROFILE
    }
    fn generation(&self) -> Option<&Arc<dyn GenerationProvider>> {
        self.generation.as_ref()
    }

    /// Fallback role: handles any question.
    fn can_handle(&self, _question: &str) -> bool {
        true
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Ordered predicate routing. Specialized agents are evaluated in a fixed
/// priority order, first match wins; the fallback agent takes anything left.
///
/// The ordering is a policy decision, not derived from confidence or
/// specificity. It must stay stable for reproducibility: a question matching
/// both Calculus and Algebra keywords goes to Calculus solely because
/// Calculus is checked first.
pub struct Router {
    /// Specialized agents in evaluation order
    routes: Vec<Arc<dyn MathAgent>>,
    fallback: Arc<dyn MathAgent>,
}

impl Router {
    /// Build the standard route table: Calculus, Algebra, Statistics, with
    /// GeneralMath as the fallback.
    pub fn with_default_agents(generation: Option<Arc<dyn GenerationProvider>>) -> Self {
        Self {
            routes: vec![
                Arc::new(CalculusAgent::new(generation.clone())),
                Arc::new(AlgebraAgent::new(generation.clone())),
                Arc::new(StatisticsAgent::new(generation.clone())),
            ],
            fallback: Arc::new(GeneralMathAgent::new(generation)),
        }
    }

    /// Build a router from an explicit route list and fallback.
    pub fn new(routes: Vec<Arc<dyn MathAgent>>, fallback: Arc<dyn MathAgent>) -> Self {
        Self { routes, fallback }
    }

    /// Pick the agent for a question: first specialized agent whose predicate
    /// matches, in route order, else the fallback.
    pub fn select(&self, question: &str) -> Arc<dyn MathAgent> {
        for agent in &self.routes {
            if agent.can_handle(question) {
                return Arc::clone(agent);
            }
        }
        Arc::clone(&self.fallback)
    }

    /// Agent names in evaluation order, fallback last.
    pub fn route_order(&self) -> Vec<&'static str> {
        self.routes
            .iter()
            .map(|a| a.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// All agents including the fallback.
    pub fn agents(&self) -> impl Iterator<Item = &Arc<dyn MathAgent>> {
        self.routes.iter().chain(std::iter::once(&self.fallback))
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("route_order", &self.route_order())
            .finish()
    }
}

// ============================================================================
// QUESTION OUTCOME
// ============================================================================

/// Result of processing one question, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub task_id: EntityKey,
    pub convo_id: EntityKey,
    pub question: String,
    pub answer: String,
    pub agent_used: String,
    pub confidence: f32,
    pub method_source: String,
    pub reflection: Reflection,
    pub timestamp: Timestamp,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Single entry point for question processing.
///
/// Per question the pipeline runs strictly sequentially through the
/// [`PipelineStage`] sequence. Context failures degrade to placeholders;
/// persistence is best-effort logging and never blocks the answer. Distinct
/// questions may run through independent orchestrator calls concurrently;
/// the session store handles interleaved writes.
pub struct Orchestrator {
    router: Router,
    assembler: ContextAssembler,
    store: Option<Arc<dyn SessionStore>>,
    generation: Option<Arc<dyn GenerationProvider>>,
}

impl Orchestrator {
    /// Wire the orchestrator from registered providers and an optional store.
    pub fn new(registry: &ProviderRegistry, store: Option<Arc<dyn SessionStore>>) -> Self {
        let generation = registry.generation();
        let mut assembler = ContextAssembler::new();
        if let Some(retrieval) = registry.retrieval() {
            assembler = assembler.with_retrieval(retrieval);
        }
        if let Some(store) = &store {
            assembler = assembler.with_store(Arc::clone(store));
        }
        Self {
            router: Router::with_default_agents(generation.clone()),
            assembler,
            store,
            generation,
        }
    }

    /// Replace the context assembler, e.g. to change retrieval or history
    /// limits.
    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Process one question end to end.
    ///
    /// Resolves conversation identity, routes to an agent, assembles context,
    /// solves, reflects, persists the interaction, and returns the outcome.
    /// Only store-layer failures while establishing conversation identity
    /// surface as errors; everything downstream degrades gracefully.
    pub async fn process_question(
        &self,
        question: &str,
        user_id: &str,
        convo_id: Option<&str>,
        use_context: bool,
    ) -> MathWizResult<QuestionOutcome> {
        let mut stage = PipelineStage::Received;
        tracing::debug!(?stage, user_id, "question received");

        let convo_id = match &self.store {
            Some(store) => {
                store.get_or_create_user(user_id)?;
                let convo = store.start_or_resume_conversation(user_id, convo_id)?;
                store.append_message(&convo.convo_id, MessageRole::User, question)?;
                convo.convo_id
            }
            None => convo_id.map_or_else(new_entity_key, str::to_string),
        };

        stage = advance(stage);
        let agent = self.router.select(question);
        tracing::info!(?stage, agent = agent.name(), convo_id = %convo_id, "agent selected");

        stage = advance(stage);
        let history_convo = use_context.then_some(convo_id.as_str());
        let context = self.assembler.build(question, history_convo).await;
        tracing::debug!(
            ?stage,
            passages = context.passages.len(),
            has_history = context.conversation_history.is_some(),
            "context assembled"
        );

        stage = advance(stage);
        let task_id = new_entity_key();
        let solution = agent.solve(&task_id, question, Some(&context)).await;

        stage = advance(stage);
        let reflection = agent.reflect(&solution, question).await;

        stage = advance(stage);
        if let Some(store) = &self.store {
            self.persist(
                store.as_ref(),
                &agent,
                &convo_id,
                &solution,
                &reflection,
                question,
                &context,
            );
        }

        stage = advance(stage);
        debug_assert_eq!(stage, PipelineStage::Responded);
        Ok(QuestionOutcome {
            task_id,
            convo_id,
            question: question.to_string(),
            answer: solution.answer.clone(),
            agent_used: agent.name().to_string(),
            confidence: solution.confidence,
            method_source: solution.method_source.clone(),
            reflection,
            timestamp: Utc::now(),
        })
    }

    /// Persist the interaction record. Best-effort: failures are logged and
    /// the answer is still returned to the caller.
    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        store: &dyn SessionStore,
        agent: &Arc<dyn MathAgent>,
        convo_id: &str,
        solution: &Solution,
        reflection: &Reflection,
        question: &str,
        context: &QuestionContext,
    ) {
        if let Err(e) = store.append_message(convo_id, MessageRole::Agent, &solution.answer) {
            tracing::error!(error = %e, convo_id = %convo_id, "failed to record agent message");
        }

        let task = Task::new(
            &solution.task_id,
            convo_id,
            agent.name(),
            TaskStatus::Completed,
            solution.confidence,
        );
        match store.persist_task(&task, solution, Some(reflection)) {
            Ok(()) => tracing::debug!(task_id = %task.task_id, "task persisted"),
            Err(e) => tracing::error!(error = %e, task_id = %task.task_id, "task persistence failed"),
        }

        if let Some(provider) = &self.generation {
            let call = GenerationCall::new(
                &solution.task_id,
                provider.model_id(),
                &agent.build_prompt(question, Some(context)),
                &solution.answer,
            );
            if let Err(e) = store.record_generation_call(&call) {
                tracing::debug!(error = %e, "generation call record dropped");
            }
        }
    }

    /// Capability list per agent name, fallback included.
    pub fn agent_capabilities(&self) -> HashMap<String, Vec<String>> {
        self.router
            .agents()
            .map(|agent| (agent.name().to_string(), agent.capabilities()))
            .collect()
    }

    /// The router's evaluation order, for inspection.
    pub fn route_order(&self) -> Vec<&'static str> {
        self.router.route_order()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("router", &self.router)
            .field("store", &self.store.is_some())
            .field("generation", &self.generation.is_some())
            .finish()
    }
}

fn advance(stage: PipelineStage) -> PipelineStage {
    stage.next().unwrap_or(PipelineStage::Responded)
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY TESTS
// ============================================================================
