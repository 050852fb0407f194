use thiserror::Error;

pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Run-level failures. This is the only error type that crosses the public
/// API boundary; per-batch problems stay inside the shrink loop until batch
/// size 1 is exhausted.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to build HTTP client: {0}")]
    Init(#[from] reqwest::Error),

    #[error("inference service is not reachable at {0}")]
    Unavailable(String),

    #[error("batch at email {index} failed at batch size 1: {source}")]
    Aborted {
        index: usize,
        #[source]
        source: BatchError,
    },
}

/// One failed batch attempt. Retryable: the orchestrator halves the batch
/// size and re-issues the same range.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("model call failed: {0}")]
    Call(#[from] CallError),

    #[error("model reply could not be parsed: {0}")]
    Parse(#[from] ParseError),
}

/// Failures talking to the inference service. `Request` covers transport
/// errors, timeouts, and non-2xx statuses from whichever endpoint failed
/// last.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("request to {endpoint} endpoint failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("model returned an empty completion")]
    EmptyCompletion,
}

/// Failures decoding a model reply after all repair heuristics ran.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply decoded to {got}, expected an array of records")]
    UnexpectedShape { got: &'static str },

    #[error("reply contained no usable records")]
    NoRecords,
}
