use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::GameLensResult;
use crate::perception::types::{PixelBuffer, SaliencyResult};

/// Strategy trait for where saliency analysis runs.
/// Two implementations: inline on the calling thread, and a dedicated worker thread.
/// Both run the identical algorithm, so their outputs are interchangeable.
#[async_trait]
pub trait SaliencyExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, image: Arc<PixelBuffer>, max_dim: u32) -> GameLensResult<SaliencyResult>;

    /// Release any owned resources. Further `analyze` calls fail with an
    /// executor error.
    fn shutdown(&mut self) {}
}
