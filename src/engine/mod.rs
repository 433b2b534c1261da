pub mod client;
pub mod error;
pub mod health;
pub mod types;

pub use client::EngineClient;
pub use error::EngineError;
pub use health::wait_until_ready;
pub use types::{ProgressReport, Txt2ImgRequest};

/// Capability surface of the remote generation engine.
///
/// The engine serializes work, so callers never have more than one
/// `submit` in flight. `poll_progress` may run concurrently with it.
#[allow(async_fn_in_trait)]
pub trait EngineGateway {
    /// Succeeds once the engine has finished loading and accepts requests.
    async fn health_check(&self) -> Result<(), EngineError>;

    /// Render one image. Returns the image file bytes carried in the response payload.
    async fn submit(&self, req: &Txt2ImgRequest) -> Result<Vec<u8>, EngineError>;

    /// Progress of whatever the engine is currently rendering.
    async fn poll_progress(&self) -> Result<ProgressReport, EngineError>;
}
