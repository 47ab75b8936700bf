use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use futures_util::stream::{self, Stream};

use super::ollama_types::InferenceError;
use crate::pipeline::upload::MediaType;

/// Lazy, finite, non-restartable sequence of response text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, InferenceError>> + Send>>;

/// Everything a multimodal model needs to transcribe one table image.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Base-64 image data, no `data:` prefix.
    pub image_base64: String,
    pub media_type: MediaType,
    pub system_instruction: String,
    pub task_instruction: String,
    /// JSON schema the response must follow.
    pub response_schema: serde_json::Value,
    pub temperature: f32,
}

/// Inference capability abstraction (allows mocking and provider swaps).
///
/// Implementations open the request lazily: nothing is sent until the
/// returned stream is first polled.
pub trait InferenceBackend: Send + Sync {
    fn stream_table(&self, request: InferenceRequest) -> FragmentStream;

    /// Provider/model label for logs.
    fn name(&self) -> &str;
}

/// One scripted stream item for `MockInference`.
#[derive(Debug, Clone)]
pub enum MockFragment {
    Text(String),
    Fail(String),
}

/// Mock inference backend for testing.
///
/// Each call to `stream_table` replays the next scripted response. When the
/// script runs out the last response is replayed again. The most recent
/// request is kept for inspection.
pub struct MockInference {
    responses: Mutex<VecDeque<Vec<MockFragment>>>,
    last_response: Mutex<Vec<MockFragment>>,
    last_request: Mutex<Option<InferenceRequest>>,
}

impl MockInference {
    pub fn new(fragments: &[&str]) -> Self {
        Self::scripted(vec![fragments
            .iter()
            .map(|f| MockFragment::Text((*f).to_string()))
            .collect()])
    }

    pub fn scripted(responses: Vec<Vec<MockFragment>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last_response: Mutex::new(Vec::new()),
            last_request: Mutex::new(None),
        }
    }

    /// A backend whose stream yields some text and then a transport error.
    pub fn failing_after(fragments: &[&str], message: &str) -> Self {
        let mut script: Vec<MockFragment> = fragments
            .iter()
            .map(|f| MockFragment::Text((*f).to_string()))
            .collect();
        script.push(MockFragment::Fail(message.to_string()));
        Self::scripted(vec![script])
    }

    pub fn last_request(&self) -> Option<InferenceRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

impl InferenceBackend for MockInference {
    fn stream_table(&self, request: InferenceRequest) -> FragmentStream {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }

        let script = {
            let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
            match (next, self.last_response.lock()) {
                (Some(script), Ok(mut last)) => {
                    *last = script.clone();
                    script
                }
                (Some(script), Err(_)) => script,
                (None, Ok(last)) => last.clone(),
                (None, Err(_)) => Vec::new(),
            }
        };

        let items: Vec<Result<String, InferenceError>> = script
            .into_iter()
            .map(|f| match f {
                MockFragment::Text(text) => Ok(text),
                MockFragment::Fail(message) => Err(InferenceError::Network(message)),
            })
            .collect();
        Box::pin(stream::iter(items))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn request() -> InferenceRequest {
        InferenceRequest {
            image_base64: "AAAA".into(),
            media_type: MediaType::Png,
            system_instruction: "sys".into(),
            task_instruction: "task".into(),
            response_schema: serde_json::json!({}),
            temperature: 0.1,
        }
    }

    #[tokio::test]
    async fn mock_replays_fragments_in_order() {
        let mock = MockInference::new(&["a", "b", "c"]);
        let items: Vec<_> = mock.stream_table(request()).collect().await;
        let texts: Vec<String> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(mock.last_request().unwrap().task_instruction, "task");
    }

    #[tokio::test]
    async fn mock_script_advances_then_repeats_last() {
        let mock = MockInference::scripted(vec![
            vec![MockFragment::Text("first".into())],
            vec![MockFragment::Text("second".into())],
        ]);
        let first: Vec<_> = mock.stream_table(request()).collect().await;
        let second: Vec<_> = mock.stream_table(request()).collect().await;
        let third: Vec<_> = mock.stream_table(request()).collect().await;
        assert_eq!(first[0].as_ref().unwrap(), "first");
        assert_eq!(second[0].as_ref().unwrap(), "second");
        assert_eq!(third[0].as_ref().unwrap(), "second");
    }

    #[tokio::test]
    async fn failing_mock_ends_with_error() {
        let mock = MockInference::failing_after(&["[["], "connection reset");
        let items: Vec<_> = mock.stream_table(request()).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(InferenceError::Network(_))));
    }
}
