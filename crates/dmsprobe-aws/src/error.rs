//! SDK error classification.

use std::error::Error;

use aws_sdk_kinesis::config::http::HttpResponse;
use aws_sdk_kinesis::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use dmsprobe_core::error::{ResourceKind, ServiceError};

const NOT_FOUND_CODES: [&str; 2] = ["ResourceNotFoundFault", "ResourceNotFoundException"];

/// Whether an error code/message pair means the resource does not exist.
///
/// CloudFormation reports a missing stack as a generic validation error.
pub(crate) fn is_not_found(code: Option<&str>, message: Option<&str>) -> bool {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => true,
        Some("ValidationError") => message.is_some_and(|m| m.contains("does not exist")),
        _ => false,
    }
}

const TRANSIENT_CODES: [&str; 9] = [
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "LimitExceededException",
    "ServiceUnavailable",
    "InternalFailure",
    "InternalServiceError",
];

/// Whether a service error response is worth retrying: throttling codes and
/// any 5xx status.
pub(crate) fn is_transient_response(code: Option<&str>, status: Option<u16>) -> bool {
    code.is_some_and(|c| TRANSIENT_CODES.contains(&c)) || status.is_some_and(|s| s >= 500)
}

/// Map an SDK failure to [`ServiceError`].
///
/// Missing resources become `NotFound` for `resource`. Timeouts, dispatch
/// failures, throttling and 5xx responses are `Unavailable`. Anything else
/// (bad credentials, rejected parameters, malformed responses) is `Invalid`
/// so it fails without burning the retry budget.
pub(crate) fn classify<E>(
    operation: &'static str,
    resource: (ResourceKind, &str),
    err: SdkError<E, HttpResponse>,
) -> ServiceError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
{
    if is_not_found(err.code(), err.message()) {
        let (kind, id) = resource;
        return ServiceError::not_found(kind, id);
    }
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
        SdkError::ServiceError(context) => {
            is_transient_response(err.code(), Some(context.raw().status().as_u16()))
        }
        _ => false,
    };
    let message = DisplayErrorContext(&err).to_string();
    if transient {
        ServiceError::unavailable(operation, message)
    } else {
        ServiceError::invalid(operation, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        assert!(is_not_found(Some("ResourceNotFoundFault"), None));
        assert!(is_not_found(Some("ResourceNotFoundException"), Some("Stream x not found")));
        assert!(!is_not_found(Some("ThrottlingException"), None));
        assert!(!is_not_found(None, None));
    }

    #[test]
    fn missing_stack_validation_error() {
        assert!(is_not_found(
            Some("ValidationError"),
            Some("Stack with id dms-sample does not exist")
        ));
        assert!(!is_not_found(Some("ValidationError"), Some("1 validation error detected")));
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert!(is_transient_response(Some("ThrottlingException"), Some(400)));
        assert!(is_transient_response(Some("ProvisionedThroughputExceededException"), None));
        assert!(is_transient_response(None, Some(503)));
        assert!(is_transient_response(Some("InternalFailure"), Some(500)));
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!is_transient_response(Some("AccessDeniedException"), Some(400)));
        assert!(!is_transient_response(Some("UnrecognizedClientException"), Some(403)));
        assert!(!is_transient_response(Some("InvalidParameterValueException"), Some(400)));
        assert!(!is_transient_response(Some("InvalidResourceStateFault"), Some(400)));
        assert!(!is_transient_response(None, None));
    }

    #[test]
    fn timeouts_are_unavailable() {
        use aws_sdk_kinesis::operation::describe_stream::DescribeStreamError;

        let timeout: SdkError<DescribeStreamError, HttpResponse> =
            SdkError::timeout_error("request timed out");
        let err = classify("describe_stream", (ResourceKind::Stream, "s"), timeout);
        assert!(err.is_transient(), "unexpected: {err:?}");
    }

    #[test]
    fn construction_failures_are_invalid() {
        use aws_sdk_kinesis::operation::describe_stream::DescribeStreamError;

        let failure: SdkError<DescribeStreamError, HttpResponse> =
            SdkError::construction_failure("missing stream name");
        let err = classify("describe_stream", (ResourceKind::Stream, "s"), failure);
        assert!(matches!(err, ServiceError::Invalid { operation: "describe_stream", .. }));
    }
}
