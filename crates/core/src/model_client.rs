use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use research_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
    ToolCallRequest,
};
use tracing::Instrument;

pub(crate) type TranscriptFn = Arc<dyn Fn(String) + Send + Sync>;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Option<TranscriptFn>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// How failed model requests are retried.
///
/// Only errors that the provider reports as retryable (e.g. rate limits)
/// are retried. The delay between attempts grows exponentially.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of the delay between two attempts.
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const NEVER: Self = Self {
        max_retries: 0,
        initial_interval: Duration::ZERO,
        max_interval: Duration::ZERO,
    };

    fn backoff(&self) -> impl Backoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
        }
    }
}

/// A wrapper around a model provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
    model_name: Arc<str>,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let model_name = Arc::from(provider.model_name());
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_transcript).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            model_name,
            retry_policy: RetryPolicy::default(),
        }
    }

    #[inline]
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) {
        self.retry_policy = retry_policy;
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Sends a request and returns the response, retrying retryable
    /// failures according to the retry policy.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: Option<TranscriptFn>,
    ) -> SendRequestResult {
        let mut backoff = self.retry_policy.backoff();
        let mut retries = 0;
        loop {
            let result =
                (self.handler_fn)(req.clone(), on_transcript.clone()).await;
            let err = match result {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };
            if !err.is_retryable() || retries >= self.retry_policy.max_retries
            {
                return Err(err);
            }
            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };
            retries += 1;
            warn!(
                "model request failed ({err}), retry {retries}/{} in {delay:?}",
                self.retry_policy.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// The stream ended before the model produced anything.
#[derive(Debug)]
struct EmptyResponse;

impl Display for EmptyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the model response ended without any content")
    }
}

impl StdError for EmptyResponse {}

impl ModelProviderError for EmptyResponse {
    #[inline]
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub(crate) struct ModelClientResponse {
    pub transcript: String,
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: Option<TranscriptFn>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            // The request has been handled gracefully without errors,
            // now try getting the opaque message for this response.
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                if let Some(on_transcript) = &on_transcript {
                    on_transcript(msg.clone());
                }
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");
    if finish_reason.is_none() && transcript.is_empty() && tool_calls.is_empty()
    {
        error!("the response has no events");
        return Err(Box::new(EmptyResponse));
    }

    Ok(ModelClientResponse {
        transcript,
        opaque_msg,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use research_agent_model::ModelMessage;
    use research_agent_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("How ".to_owned()),
            PresetEvent::MessageDelta("are ".to_owned()),
            PresetEvent::MessageDelta("you?".to_owned()),
        ]));

        let model_client = ModelClient::new(model_provider);
        assert_eq!(model_client.model_name(), "test-model");

        for _ in 0..3 {
            let deltas = Arc::new(Mutex::new(Vec::new()));
            let on_transcript: TranscriptFn = {
                let deltas = Arc::clone(&deltas);
                Arc::new(move |delta| deltas.lock().unwrap().push(delta))
            };
            let resp = model_client
                .send_request(request(), Some(on_transcript))
                .await
                .unwrap();
            assert_eq!(resp.transcript, "How are you?");
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
            assert!(resp.opaque_msg.is_some());
            assert_eq!(*deltas.lock().unwrap(), ["How ", "are ", "you?"]);
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(request(), None)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_empty_response() {
        let mut model_provider = TestModelProvider::default();
        let empty = Vec::<PresetEvent>::new();
        model_provider.add_assistant_turn(
            PresetResponse::with_events(empty).unterminated(),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let err = model_client
            .send_request(request(), None)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(
            err.to_string(),
            "the model response ended without any content"
        );
        assert_eq!(model_provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unterminated_response_with_content() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_turn(
            PresetResponse::with_text("100°C at sea level.").unterminated(),
        );
        let model_client = ModelClient::new(model_provider);

        let resp = model_client.send_request(request(), None).await.unwrap();
        assert_eq!(resp.transcript, "100°C at sea level.");
        assert_eq!(resp.finish_reason, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rate_limited() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_turn(
            PresetResponse::with_text("Finally.").with_failures(2),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let resp = model_client.send_request(request(), None).await.unwrap();
        assert_eq!(resp.transcript, "Finally.");
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_turn(
            PresetResponse::with_text("Too late.").with_failures(5),
        );
        let mut model_client = ModelClient::new(model_provider.clone());
        model_client.set_retry_policy(RetryPolicy {
            max_retries: 2,
            ..Default::default()
        });

        let err = model_client
            .send_request(request(), None)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_for_other_errors() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_assistant_turn(PresetResponse::with_text("").with_failures(0));
        let model_client = ModelClient::new(model_provider.clone());

        assert!(model_client.send_request(request(), None).await.is_err());
        assert_eq!(model_provider.requests().len(), 1);
    }
}
