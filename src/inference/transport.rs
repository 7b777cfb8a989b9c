//! The seam between the invoker and the network.

use async_trait::async_trait;

use super::errors::InvocationFailure;
use super::types::{InvokeModelRequest, InvokeModelResponse};

/// Anything that can carry an `InvokeModel` call to a model runtime.
///
/// Implementations must be safe to share across sequential turns; the
/// invoker only ever needs `&self`.
#[async_trait]
pub trait InvokeModel: Send + Sync {
    /// Perform one call. No retries.
    async fn invoke_model(
        &self,
        request: InvokeModelRequest,
    ) -> Result<InvokeModelResponse, InvocationFailure>;
}
