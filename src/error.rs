// =============================================================================
// error.rs - EVERYTHING THAT CAN GO WRONG (AND NOTHING THAT CAN CRASH US)
// =============================================================================
//
// Two families of failure live here.
//
// ServiceError is what a collaborator hands back when the outside world
// misbehaves: the data store returned a 500, DART answered with a status code
// nobody documented, the assistant took longer than our deadline, or the
// circuit breaker decided we have bothered an API enough for one minute.
// The orchestrator never lets one of these escape. It turns them into an
// apologetic message and carries on.
//
// DialogueError is the only thing the orchestrator ever returns to its
// caller, and only when the caller asks for something the current step does
// not allow. The session is left exactly as it was.
// =============================================================================

use thiserror::Error;

use crate::orchestrator::Step;

/// Failures raised by external collaborators (directory, filings, ratio
/// store, distress dataset, conversational fallback).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request never got a response: DNS, TLS, connection reset.
    #[error("{service}: transport error: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered, but not with a 2xx.
    #[error("{service}: unexpected HTTP status {status}")]
    Status {
        service: &'static str,
        status: u16,
    },

    /// The upstream answered 2xx with a body we could not make sense of.
    #[error("{service}: could not decode response: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },

    /// The upstream reported an application-level error (e.g. a DART status
    /// other than "000" or "013").
    #[error("{service}: upstream rejected the request: {detail}")]
    Rejected {
        service: &'static str,
        detail: String,
    },

    /// The caller-supplied deadline expired before the call completed.
    #[error("{service}: no response within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    /// The circuit breaker for this service is open.
    #[error("{0}: circuit open, request skipped")]
    CircuitOpen(String),

    /// Reading the historical distress dataset from disk failed.
    #[error("distress dataset I/O error: {0}")]
    DatasetIo(#[from] std::io::Error),

    /// The historical distress dataset is not valid CSV.
    #[error("distress dataset is malformed: {0}")]
    DatasetCsv(#[from] csv::Error),
}

impl ServiceError {
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        ServiceError::Transport { service, source }
    }

    pub fn decode(service: &'static str, detail: impl ToString) -> Self {
        ServiceError::Decode {
            service,
            detail: detail.to_string(),
        }
    }
}

/// Raised when an orchestrator operation is invoked in a step that does not
/// accept it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("{operation} is not accepted while the session is {actual}")]
    WrongStep {
        operation: &'static str,
        actual: Step,
    },
}
