use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::GameLensResult;
use crate::perception::saliency::analyze_saliency;
use crate::perception::traits::SaliencyExecutor;
use crate::perception::types::{PixelBuffer, SaliencyResult};

/// Runs saliency on the calling thread. Always available; also the fallback
/// path when the background worker fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

#[async_trait]
impl SaliencyExecutor for InlineExecutor {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn analyze(&self, image: Arc<PixelBuffer>, max_dim: u32) -> GameLensResult<SaliencyResult> {
        analyze_saliency(&image, max_dim)
    }
}
