use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// An error raised by a [`ModelProvider`] or its responses.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Classifies this error.
    fn kind(&self) -> ErrorKind;
}

/// A completion engine that streams its replies.
///
/// A provider may keep connection pools or other internal state, but
/// callers treat it as stateless: every request stands on its own and
/// carries the whole conversation, system instructions first.
pub trait ModelProvider: Send + Sync {
    /// The error type of this provider.
    type Error: ModelProviderError;

    /// The streaming reply type of this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Sends `req` and resolves once the engine accepts it.
    ///
    /// The future owns everything it needs and borrows neither `self` nor
    /// `req`, so it can outlive both.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
