// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::cloud::CloudError;
use super::operation::OperationFailure;
use http::HeaderMap;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by all ARM operations.
///
/// ARM operations fail for many reasons. The request may be malformed before
/// it is sent, the transport may be unable to reach the service, the service
/// may reject the initiating request, the long-running operation may finish in
/// a failed state, or the application may stop waiting for it.
///
/// Most applications will just return the error or log it, without any further
/// action. However, some applications may need to interrogate the error
/// details. This type offers a series of predicates to determine the error
/// kind. The type also offers accessors to query the most common error details.
/// Applications can query the error [source][std::error::Error::source] for
/// deeper information.
///
/// # Example
/// ```
/// use azure_arm_gax::error::Error;
/// match example_function() {
///     Err(e) if e.is_operation_failed() => {
///         println!("the operation failed {e}, details {:?}", e.operation_failure());
///     },
///     Err(e) if e.is_wait_canceled() => { println!("stopped waiting {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::wait_canceled())
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use azure_arm_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The request, or the overall polling loop, could not complete before its
    /// deadline.
    ///
    /// This is always a client-side generated error. Note that the operation
    /// may or may not complete in the service. Stopping the wait never cancels
    /// the operation in Azure.
    ///
    /// # Troubleshooting
    ///
    /// Some ARM operations, such as creating a database server, routinely take
    /// tens of minutes. Consider increasing the polling deadline for such
    /// operations.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use azure_arm_gax::error::Error;
    /// let error = Error::exhausted("too many retry attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The request could not complete before the retry or polling policy
    /// expired.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause of this problem is a transient problem that lasts
    /// longer than your policy. If your application can tolerate longer
    /// recovery times then extend the policy.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a deserialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use azure_arm_gax::error::Error;
    /// let error = Error::deser("simulated problem");
    /// assert!(error.is_deserialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response could not be deserialized.
    ///
    /// When returned by a long-running operation, the operation completed
    /// successfully in the service, but the final body does not match the
    /// expected model. The operation is never retried in this case.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a serialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use azure_arm_gax::error::Error;
    /// let error = Error::ser("simulated problem");
    /// assert!(error.is_serialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    ///
    /// This is always a client-side generated error, generated before the
    /// request is made. This error is never transient: the serialization is
    /// deterministic, and will fail on future attempts with the same input.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// Creates an error representing a path expansion problem.
    pub fn binding<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Binding,
            source: Some(source.into()),
        }
    }

    /// If true, the request was missing required path parameters or the
    /// parameters did not have a valid format.
    ///
    /// # Troubleshooting
    ///
    /// Typically this indicates a problem in the application. Use the
    /// [BindingError][crate::error::binding::BindingError] in the error
    /// source to find the offending parameters.
    pub fn is_binding(&self) -> bool {
        matches!(&self.kind, ErrorKind::Binding)
    }

    /// Creates an error for a request that did not produce a full HTTP
    /// response.
    ///
    /// Examples include: a broken connection after the request is sent, a
    /// connection refused by the peer, or a DNS failure.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(source.into()),
        }
    }

    /// A problem in the transport layer without a full HTTP response.
    ///
    /// # Troubleshooting
    ///
    /// This indicates a problem completing the request. This type of error is
    /// rare, but includes crashes and restarts on proxies and load balancers.
    /// The polling loop retries these errors, see
    /// [PollingErrorPolicy][crate::polling_error_policy::PollingErrorPolicy].
    pub fn is_io(&self) -> bool {
        matches!(&self.kind, ErrorKind::Io)
    }

    /// The request failed in the transport layer, either with an I/O error or
    /// because the attempt timed out.
    pub fn is_transport(&self) -> bool {
        matches!(&self.kind, ErrorKind::Io | ErrorKind::Timeout)
    }

    /// Creates an error for a response with an unexpected status code.
    ///
    /// The payload is inspected for the ARM error envelope, see
    /// [CloudError].
    ///
    /// # Example
    /// ```
    /// use azure_arm_gax::error::Error;
    /// let payload = bytes::Bytes::from_static(br#"{"error": {"code": "ResourceNotFound", "message": "gone"}}"#);
    /// let error = Error::unexpected_status(404, http::HeaderMap::new(), payload);
    /// assert!(error.is_unexpected_status());
    /// assert_eq!(error.http_status_code(), Some(404));
    /// assert_eq!(error.cloud_error().map(|c| c.code.as_str()), Some("ResourceNotFound"));
    /// ```
    pub fn unexpected_status(status_code: u16, headers: HeaderMap, payload: bytes::Bytes) -> Self {
        let cloud_error = CloudError::try_from(&payload).ok();
        let details = HttpDetails {
            status_code,
            headers,
            payload,
            cloud_error,
        };
        Self {
            kind: ErrorKind::UnexpectedStatus(Box::new(details)),
            source: None,
        }
    }

    /// The service answered with a status code that the operation does not
    /// expect.
    ///
    /// When returned while starting a long-running operation, no poller was
    /// created and no poll request was sent.
    pub fn is_unexpected_status(&self) -> bool {
        matches!(&self.kind, ErrorKind::UnexpectedStatus(_))
    }

    /// Creates an error for a long-running operation that reached the `Failed`
    /// or `Canceled` states.
    pub fn operation(failure: OperationFailure) -> Self {
        Self {
            kind: ErrorKind::Operation(Box::new(failure)),
            source: None,
        }
    }

    /// The long-running operation completed, but the service reports it
    /// failed or was canceled.
    ///
    /// The last response is available via
    /// [operation_failure()][Error::operation_failure].
    pub fn is_operation_failed(&self) -> bool {
        matches!(&self.kind, ErrorKind::Operation(_))
    }

    /// Creates an error for a wait abandoned by the application.
    ///
    /// # Example
    /// ```
    /// use azure_arm_gax::error::Error;
    /// let error = Error::wait_canceled();
    /// assert!(error.is_wait_canceled());
    /// assert!(!error.is_operation_failed());
    /// ```
    pub fn wait_canceled() -> Self {
        Self {
            kind: ErrorKind::WaitCanceled,
            source: None,
        }
    }

    /// The application canceled the wait for a long-running operation.
    ///
    /// This is unrelated to a server-reported `Canceled` state, which is
    /// reported via [is_operation_failed()][Error::is_operation_failed]. The
    /// operation itself continues in Azure.
    pub fn is_wait_canceled(&self) -> bool {
        matches!(&self.kind, ErrorKind::WaitCanceled)
    }

    /// The HTTP status code, if any, associated with this error.
    ///
    /// # Example
    /// ```
    /// use azure_arm_gax::error::Error;
    /// let e = search_for_thing("the thing");
    /// if let Some(code) = e.http_status_code() {
    ///     if code == 404 {
    ///         println!("cannot find the thing, more details in {e}");
    ///     }
    /// }
    ///
    /// fn search_for_thing(name: &str) -> Error {
    ///     # Error::unexpected_status(404, http::HeaderMap::new(), bytes::Bytes::from_static(b"NOT FOUND"))
    /// }
    /// ```
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::UnexpectedStatus(d) => Some(d.status_code),
            ErrorKind::Operation(f) => Some(f.status_code),
            _ => None,
        }
    }

    /// The headers, if any, associated with this error.
    ///
    /// ARM responses include `x-ms-request-id` and `x-ms-correlation-request-id`
    /// headers, which are useful when contacting Azure support.
    pub fn http_headers(&self) -> Option<&http::HeaderMap> {
        match &self.kind {
            ErrorKind::UnexpectedStatus(d) => Some(&d.headers),
            ErrorKind::Operation(f) => Some(&f.headers),
            _ => None,
        }
    }

    /// The raw payload, if any, associated with this error.
    pub fn http_payload(&self) -> Option<&bytes::Bytes> {
        match &self.kind {
            ErrorKind::UnexpectedStatus(d) => Some(&d.payload),
            ErrorKind::Operation(f) => Some(&f.payload),
            _ => None,
        }
    }

    /// The parsed ARM error envelope, if the payload contained one.
    pub fn cloud_error(&self) -> Option<&CloudError> {
        match &self.kind {
            ErrorKind::UnexpectedStatus(d) => d.cloud_error.as_ref(),
            ErrorKind::Operation(f) => f.cloud_error.as_ref(),
            _ => None,
        }
    }

    /// The details of a failed long-running operation.
    pub fn operation_failure(&self) -> Option<&OperationFailure> {
        match &self.kind {
            ErrorKind::Operation(f) => Some(f.as_ref()),
            _ => None,
        }
    }

    /// Creates an error for problems that do not fit any other category.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Binding, Some(e)) => {
                write!(f, "cannot build the request path {e}")
            }
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request {e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the deadline {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "{e}")
            }
            (ErrorKind::Io, Some(e)) => {
                write!(f, "the transport reports an error: {e}")
            }
            (ErrorKind::UnexpectedStatus(d), _) => d.display(f),
            (ErrorKind::Operation(failure), _) => write!(f, "{failure}"),
            (ErrorKind::WaitCanceled, _) => {
                write!(f, "the application canceled the wait for the operation")
            }
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Binding,
    Serialization,
    Deserialization,
    Timeout,
    Exhausted,
    Io,
    UnexpectedStatus(Box<HttpDetails>),
    Operation(Box<OperationFailure>),
    WaitCanceled,
    /// A uncategorized error.
    Other,
}

#[derive(Debug)]
struct HttpDetails {
    status_code: u16,
    headers: HeaderMap,
    payload: bytes::Bytes,
    cloud_error: Option<CloudError>,
}

impl HttpDetails {
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.status_code;
        if let Some(cloud) = &self.cloud_error {
            return write!(
                f,
                "the service responded with an unexpected status [{code}]: {} - {}",
                cloud.code, cloud.message
            );
        }
        match std::str::from_utf8(self.payload.as_ref()) {
            Ok(message) => write!(
                f,
                "the service responded with an unexpected status [{code}]: {message}"
            ),
            Err(_) => write!(
                f,
                "the service responded with an unexpected status [{code}]: {:?}",
                self.payload
            ),
        }
    }
}
