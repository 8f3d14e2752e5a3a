use research_agent_model::{ModelRequest, ToolCallRequest};

use super::{Agent, RunError, RunErrorKind, RunOutcome, RunStatus, Stage};
use crate::cancel::CancelSignal;
use crate::history::{History, HistoryError, Turn};

/// The state of one agent run.
pub(super) struct RunState<'a> {
    agent: &'a Agent,
    history: History,
    stage: Stage,
    iterations: usize,
    acting_phases: usize,
}

impl<'a> RunState<'a> {
    #[inline]
    pub fn new(agent: &'a Agent, history: History) -> Self {
        Self {
            agent,
            history,
            stage: Stage::Generating,
            iterations: 0,
            acting_phases: 0,
        }
    }

    pub async fn run(
        mut self,
        cancel: &CancelSignal,
    ) -> Result<RunOutcome, RunError> {
        if let Err(err) = self.history.check_prompt() {
            return Err(self.fail(RunErrorKind::InvalidHistory(err)));
        }

        self.notify_stage();
        loop {
            match self.stage {
                Stage::Generating => {
                    if cancel.is_cancelled() {
                        info!("run cancelled");
                        return Ok(self.finish(RunStatus::Cancelled));
                    }
                    if self
                        .agent
                        .max_iterations
                        .is_some_and(|max| self.iterations >= max)
                    {
                        warn!(
                            "stopping after {} model calls without an answer",
                            self.iterations
                        );
                        let status = RunStatus::IterationLimitReached;
                        return Ok(self.finish(status));
                    }
                    let Some(result) = self.generate(cancel).await else {
                        info!("run cancelled while waiting for the model");
                        return Ok(self.finish(RunStatus::Cancelled));
                    };
                    if let Err(kind) = result {
                        return Err(self.fail(kind));
                    }
                }
                Stage::Acting => {
                    if let Err(err) = self.act().await {
                        let kind = RunErrorKind::MalformedResponse(err);
                        return Err(self.fail(kind));
                    }
                }
                Stage::Done => {
                    return Ok(self.finish(RunStatus::Completed));
                }
            }
        }
    }

    /// Asks the model for the next assistant turn.
    ///
    /// Returns `None` if cancelled before the model responds.
    async fn generate(
        &mut self,
        cancel: &CancelSignal,
    ) -> Option<Result<(), RunErrorKind>> {
        self.iterations += 1;
        debug!("generating, iteration {}", self.iterations);

        let agent = self.agent;
        let request = ModelRequest {
            messages: self.history.to_messages(),
            tools: agent.tools.definitions(),
        };
        let on_transcript = agent.observers.on_transcript.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = agent
                .model_client
                .send_request(request, on_transcript) => Some(result),
        };
        let result = result?;

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                error!("model request failed: {err}");
                return Some(Err(RunErrorKind::Model(err)));
            }
        };
        trace!("model finished with reason: {:?}", resp.finish_reason);

        // Check every call before the turn is appended, so a bad batch never
        // reaches the history or the tools.
        if let Err(kind) = self.check_tool_calls(&resp.tool_calls) {
            return Some(Err(kind));
        }
        let turn =
            Turn::assistant(resp.transcript, resp.tool_calls, resp.opaque_msg);
        if let Err(err) = self.append(turn) {
            return Some(Err(RunErrorKind::MalformedResponse(err)));
        }

        if self.history.pending_tool_calls().is_empty() {
            self.set_stage(Stage::Done);
        } else {
            self.set_stage(Stage::Acting);
        }
        Some(Ok(()))
    }

    /// Runs the pending tool calls in request order.
    async fn act(&mut self) -> Result<(), HistoryError> {
        self.acting_phases += 1;
        let calls: Vec<ToolCallRequest> = self
            .history
            .pending_tool_calls()
            .into_iter()
            .cloned()
            .collect();
        debug!("running {} tool call(s)", calls.len());

        for call in calls {
            info!("calling tool `{}` ({})", call.name, call.id);
            let output =
                self.agent.tools.invoke(&call.name, call.arguments).await;
            self.append(Turn::tool_result(call.id, output))?;
        }

        self.set_stage(Stage::Generating);
        Ok(())
    }

    fn check_tool_calls(
        &self,
        calls: &[ToolCallRequest],
    ) -> Result<(), RunErrorKind> {
        for call in calls {
            self.agent
                .tools
                .validate(&call.name, &call.arguments)
                .map_err(RunErrorKind::InvalidArguments)?;
        }
        Ok(())
    }

    fn append(&mut self, turn: Turn) -> Result<(), HistoryError> {
        self.history.push(turn)?;
        if let (Some(on_turn), Some(turn)) =
            (&self.agent.observers.on_turn, self.history.last())
        {
            on_turn(turn);
        }
        Ok(())
    }

    fn set_stage(&mut self, stage: Stage) {
        trace!("stage: {:?} -> {stage:?}", self.stage);
        self.stage = stage;
        self.notify_stage();
    }

    fn notify_stage(&self) {
        if let Some(on_stage) = &self.agent.observers.on_stage {
            on_stage(self.stage);
        }
    }

    fn finish(self, status: RunStatus) -> RunOutcome {
        debug!(
            "run finished: {status:?} after {} model call(s)",
            self.iterations
        );
        RunOutcome {
            history: self.history,
            status,
            acting_phases: self.acting_phases,
        }
    }

    fn fail(self, kind: RunErrorKind) -> RunError {
        RunError::new(kind, self.history)
    }
}
