//! The agent loop controller.
//!
//! One [`Agent::submit`] call runs a whole turn:
//!
//! 1. Append the user message and move to `Thinking`
//! 2. Generate from the system text, capability prompt and history
//! 3. Parse tool calls; with none, the response is the answer
//! 4. Otherwise dispatch each call in order, append every result as one
//!    Tool message and generate again
//!
//! The turn ends on a plain answer, on the consecutive-failure tripwire, on
//! the iteration bound, or when the [`StopHandle`] is triggered.

use std::sync::Arc;

use rivet_config::AppConfig;
use rivet_core::{
    AgentState, Backend, BackendError, Conversation, DropOldest, Error, GenerationConfig,
    GenerationRequest, Message, Prompt, Result, ToolCall, ToolRegistry, ToolResult, TrimPolicy,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::control::StopHandle;
use crate::parser::{ToolCallParser, format_tool_results};
use crate::stream_event::AgentEvent;

/// Appended to the answer when the loop runs out of iterations.
pub const ITERATION_LIMIT_MARKER: &str = "[Reached maximum iterations]";

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without calling a tool
    Answered,
    /// The consecutive-failure tripwire fired
    ToolFailures,
    IterationLimit,
    Cancelled,
}

impl StopReason {
    fn note(self) -> &'static str {
        match self {
            Self::Answered => "Answer ready",
            Self::ToolFailures => "Too many consecutive tool failures",
            Self::IterationLimit => "Reached maximum iterations",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Outcome of one [`Agent::submit`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub answer: String,
    /// Generation calls made during the turn
    pub iterations: usize,
    pub tool_calls_made: usize,
    pub stop_reason: StopReason,
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    backend: Option<Arc<dyn Backend>>,
    tools: Option<ToolRegistry>,
    system_prompt: String,
    generation: GenerationConfig,
    max_iterations: usize,
    max_consecutive_errors: usize,
    trim: Arc<dyn TrimPolicy>,
    events: Option<mpsc::Sender<AgentEvent>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        let settings = rivet_config::AgentSettings::default();
        Self {
            backend: None,
            tools: None,
            system_prompt: settings.system_prompt,
            generation: GenerationConfig::default(),
            max_iterations: settings.max_iterations as usize,
            max_consecutive_errors: settings.max_consecutive_errors as usize,
            trim: Arc::new(DropOldest::new(settings.context_max_tokens)),
            events: None,
        }
    }

    /// Start from a loaded configuration. The registry holds every built-in
    /// tool configured from `config.tools` and `config.security`.
    pub fn from_config(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self::new()
            .tools(rivet_tools::registry_from_config(config))
            .system_prompt(agent.system_prompt.clone())
            .generation(GenerationConfig::from(&config.generation))
            .max_iterations(agent.max_iterations as usize)
            .max_consecutive_errors(agent.max_consecutive_errors as usize)
            .trim_policy(Arc::new(DropOldest::new(agent.context_max_tokens)))
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the tool registry. Without one, [`rivet_tools::default_registry`] is used.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn generation(mut self, config: GenerationConfig) -> Self {
        self.generation = config;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Failed tool calls in a row that end the turn. Clamped to at least 1.
    pub fn max_consecutive_errors(mut self, max: usize) -> Self {
        self.max_consecutive_errors = max.max(1);
        self
    }

    pub fn trim_policy(mut self, policy: Arc<dyn TrimPolicy>) -> Self {
        self.trim = policy;
        self
    }

    /// Deliver [`AgentEvent`]s to `sink`. Sends are awaited, so a slow
    /// receiver slows the loop down; a dropped receiver is ignored.
    pub fn event_sink(mut self, sink: mpsc::Sender<AgentEvent>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn build(self) -> Agent {
        Agent {
            backend: self.backend,
            tools: self.tools.unwrap_or_else(rivet_tools::default_registry),
            conversation: Conversation::with_policy(self.trim),
            system_prompt: self.system_prompt,
            generation: self.generation,
            max_iterations: self.max_iterations,
            max_consecutive_errors: self.max_consecutive_errors,
            events: self.events,
            control: StopHandle::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The ReAct loop controller.
///
/// Not reentrant: `submit` takes `&mut self`, and callers sharing an agent
/// behind a lock should check [`StopHandle::is_busy`] first.
pub struct Agent {
    backend: Option<Arc<dyn Backend>>,
    tools: ToolRegistry,
    conversation: Conversation,
    system_prompt: String,
    generation: GenerationConfig,
    max_iterations: usize,
    max_consecutive_errors: usize,
    events: Option<mpsc::Sender<AgentEvent>>,
    control: StopHandle,
    /// Token armed for the turn in flight
    cancel: CancellationToken,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Run one turn for `message` and return its answer.
    ///
    /// Tool faults are fed back to the model and never fail the call.
    /// Errors are limited to a missing backend (state stays `Idle`) and
    /// backend failures (state becomes `Error`).
    pub async fn submit(
        &mut self,
        message: impl Into<String>,
        images: Vec<String>,
    ) -> Result<TurnResult> {
        let backend = self
            .backend
            .clone()
            .ok_or_else(|| Error::config("no backend loaded"))?;
        let cancel = self.control.arm();
        self.cancel = cancel.clone();
        let mut parser = ToolCallParser::new();
        let mut turn = Turn::default();
        let system = self.system_text();

        info!(
            backend = backend.name(),
            images = images.len(),
            history = self.conversation.len(),
            "Starting turn"
        );
        self.conversation
            .push(Message::user_with_images(message, images.clone()));
        self.transition(AgentState::Thinking, Some("Processing message...".into()))
            .await;

        while turn.iterations < self.max_iterations {
            if cancel.is_cancelled() {
                return Ok(self.unwind(turn, &[]).await);
            }
            turn.iterations += 1;
            debug!(iteration = turn.iterations, "Generating");

            let request = GenerationRequest {
                prompt: Prompt {
                    system: system.clone(),
                    messages: self.conversation.messages().to_vec(),
                },
                images: images.clone(),
                config: self.generation.clone(),
            };
            let response = match self.generate(backend.as_ref(), request, &cancel).await {
                Ok(Some(text)) => text,
                Ok(None) => return Ok(self.unwind(turn, &[]).await),
                Err(e) => {
                    error!(iteration = turn.iterations, error = %e, "Generation failed");
                    self.transition(AgentState::Error, Some(e.to_string())).await;
                    self.emit(AgentEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                    return Err(e.into());
                }
            };

            let parsed = parser.parse(&response);
            if parsed.calls.is_empty() {
                self.conversation.push(Message::assistant(parsed.text.clone()));
                let result = turn.finish(parsed.text, StopReason::Answered);
                return Ok(self.complete(result, AgentState::Done).await);
            }

            debug!(calls = parsed.calls.len(), "Parsed tool calls");
            if !parsed.text.is_empty() {
                turn.prose.push(parsed.text);
            }
            self.conversation.push(Message::assistant(response.trim()));
            let note = format!("Executing {} tool call(s)...", parsed.calls.len());
            self.transition(AgentState::CallingTool, Some(note)).await;

            let mut outcomes: Vec<(ToolCall, ToolResult)> = Vec::with_capacity(parsed.calls.len());
            for call in parsed.calls {
                if cancel.is_cancelled() {
                    return Ok(self.unwind(turn, &outcomes).await);
                }
                let Some(result) = self.dispatch(&call, &cancel).await else {
                    return Ok(self.unwind(turn, &outcomes).await);
                };
                turn.tool_calls_made += 1;

                let last_error = result.error.clone();
                if result.success {
                    turn.consecutive_failures = 0;
                } else {
                    turn.consecutive_failures += 1;
                }
                outcomes.push((call, result));

                if turn.consecutive_failures >= self.max_consecutive_errors {
                    warn!(
                        failures = turn.consecutive_failures,
                        "Consecutive tool failure limit reached"
                    );
                    self.conversation
                        .push(Message::tool(format_tool_results(&outcomes)));
                    let summary = format!(
                        "Too many consecutive tool failures. Stopping.\nLast error: {}\n[Stopped after {} consecutive tool failures]",
                        last_error.as_deref().unwrap_or("unknown error"),
                        turn.consecutive_failures
                    );
                    self.conversation.push(Message::assistant(summary.clone()));
                    let result = turn.finish(summary, StopReason::ToolFailures);
                    return Ok(self.complete(result, AgentState::Error).await);
                }
            }

            self.conversation
                .push(Message::tool(format_tool_results(&outcomes)));
            self.transition(
                AgentState::Thinking,
                Some("Processing tool results...".into()),
            )
            .await;
        }

        warn!(max = self.max_iterations, "Iteration limit reached");
        let answer = if turn.prose.is_empty() {
            ITERATION_LIMIT_MARKER.to_string()
        } else {
            format!("{}\n{ITERATION_LIMIT_MARKER}", turn.prose.join("\n\n"))
        };
        self.conversation.push(Message::assistant(answer.clone()));
        let result = turn.finish(answer, StopReason::IterationLimit);
        Ok(self.complete(result, AgentState::Done).await)
    }

    /// Clear the history, return to `Idle` and drop the backend's session cache.
    pub fn reset(&mut self) {
        self.conversation.clear();
        if self.control.set_state(AgentState::Idle) != AgentState::Idle
            && let Some(events) = &self.events
        {
            let _ = events.try_send(AgentEvent::StateChanged {
                state: AgentState::Idle,
                note: Some("reset".into()),
            });
        }
        if let Some(backend) = &self.backend {
            backend.reset_session();
        }
        info!("Agent reset");
    }

    /// Request cancellation of the turn in flight.
    pub fn stop(&self) {
        self.control.stop();
    }

    /// A handle that can stop the agent and read its state from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.control.clone()
    }

    /// Append a message without running a turn.
    pub fn add_message(&mut self, message: Message) {
        self.conversation.push(message);
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> AgentState {
        self.control.state()
    }

    pub fn is_busy(&self) -> bool {
        self.control.is_busy()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn set_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backend = Some(backend);
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn set_event_sink(&mut self, sink: Option<mpsc::Sender<AgentEvent>>) {
        self.events = sink;
    }

    /// System prompt followed by the capability prompt.
    pub fn system_text(&self) -> String {
        let tools = self.tools.render_prompt();
        if self.system_prompt.is_empty() {
            tools
        } else {
            format!("{}\n\n{tools}", self.system_prompt)
        }
    }

    /// Generate one response. `None` means the turn was cancelled first.
    ///
    /// With an event sink installed the backend is streamed and every token
    /// is forwarded before it is appended, so both see the same order. A
    /// stop while a token waits on a full sink ends the generation.
    async fn generate(
        &self,
        backend: &dyn Backend,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<String>, BackendError> {
        if self.events.is_none() {
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => Ok(None),
                text = backend.generate(request) => text.map(Some),
            };
        }

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            stream = backend.generate_stream(request) => stream?,
        };

        let mut text = String::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                token = stream.recv() => match token {
                    Some(Ok(token)) => {
                        self.emit(AgentEvent::Token {
                            content: token.clone(),
                        })
                        .await;
                        text.push_str(&token);
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }
        Ok(Some(text))
    }

    /// Run one call through the registry with its events and state changes.
    ///
    /// Only calls that wait on the user race the stop handle; anything else
    /// runs to completion under its own timeout. `None` means cancelled.
    async fn dispatch(&self, call: &ToolCall, cancel: &CancellationToken) -> Option<ToolResult> {
        let interactive = self
            .tools
            .get(&call.name)
            .is_some_and(|tool| tool.interacts_with_user());

        debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
        self.emit(AgentEvent::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        })
        .await;
        if cancel.is_cancelled() {
            return None;
        }

        let result = if interactive {
            self.transition(
                AgentState::WaitingForUser,
                Some(format!("Waiting for the user ({})", call.name)),
            )
            .await;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.tools.execute(call) => Some(result),
            };
            if result.is_some() {
                self.transition(AgentState::CallingTool, None).await;
            }
            result?
        } else {
            self.tools.execute(call).await
        };

        if !result.success {
            debug!(
                tool = %call.name,
                call_id = %call.id,
                error = result.error.as_deref().unwrap_or_default(),
                "Tool call failed"
            );
        }
        self.emit(AgentEvent::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            success: result.success,
            output: result.output.clone(),
            error: result.error.clone(),
        })
        .await;
        Some(result)
    }

    /// Record what finished before a stop and return to `Idle`.
    async fn unwind(&mut self, turn: Turn, outcomes: &[(ToolCall, ToolResult)]) -> TurnResult {
        if !outcomes.is_empty() {
            self.conversation
                .push(Message::tool(format_tool_results(outcomes)));
        }
        let answer = turn.prose.join("\n\n");
        info!(iterations = turn.iterations, "Turn cancelled");
        let result = turn.finish(answer, StopReason::Cancelled);
        self.complete(result, AgentState::Idle).await
    }

    async fn complete(&self, result: TurnResult, state: AgentState) -> TurnResult {
        self.transition(state, Some(result.stop_reason.note().into()))
            .await;
        info!(
            iterations = result.iterations,
            tool_calls = result.tool_calls_made,
            stop_reason = ?result.stop_reason,
            "Turn finished"
        );
        self.emit(AgentEvent::Done {
            iterations: result.iterations,
            tool_calls_made: result.tool_calls_made,
            stop_reason: result.stop_reason,
        })
        .await;
        result
    }

    async fn transition(&self, state: AgentState, note: Option<String>) {
        let previous = self.control.set_state(state);
        if previous == state {
            return;
        }
        debug!(from = %previous, to = %state, "State changed");
        self.emit(AgentEvent::StateChanged { state, note }).await;
    }

    /// Deliver an event, giving up once the turn is stopped.
    ///
    /// A send that has room goes through even after a stop; only a send
    /// blocked on a full sink is abandoned.
    async fn emit(&self, event: AgentEvent) {
        let Some(events) = &self.events else {
            return;
        };
        tokio::select! {
            biased;
            _ = events.send(event) => {}
            _ = self.cancel.cancelled() => {
                debug!("Event sink full after stop, dropping event");
            }
        }
    }
}

/// Counters and prose for the turn in progress.
#[derive(Debug, Default)]
struct Turn {
    iterations: usize,
    tool_calls_made: usize,
    consecutive_failures: usize,
    prose: Vec<String>,
}

impl Turn {
    fn finish(self, answer: String, stop_reason: StopReason) -> TurnResult {
        TurnResult {
            answer,
            iterations: self.iterations,
            tool_calls_made: self.tool_calls_made,
            stop_reason,
        }
    }
}
