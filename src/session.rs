use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::{GameLensError, GameLensResult};
use crate::executor::{select_executor, InlineExecutor};
use crate::perception::pipeline::detect_ui_elements;
use crate::perception::traits::SaliencyExecutor;
use crate::perception::types::{DetectedBox, PixelBuffer, SaliencyResult};

/// Caller-owned analysis handle.
///
/// Holds the execution strategy chosen at construction and the working
/// resolutions from config. Detection always runs inline; saliency goes
/// through the selected executor and falls back to inline when the executor
/// itself fails.
pub struct AnalysisSession {
    executor: Option<Box<dyn SaliencyExecutor>>,
    fallback: InlineExecutor,
    detection_max_dim: u32,
    saliency_max_dim: u32,
}

impl AnalysisSession {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_executor(select_executor(&config.executor), config)
    }

    pub fn with_executor(executor: Box<dyn SaliencyExecutor>, config: &AppConfig) -> Self {
        tracing::info!(executor = executor.name(), "analysis session ready");
        Self {
            executor: Some(executor),
            fallback: InlineExecutor,
            detection_max_dim: config.detection.max_dim,
            saliency_max_dim: config.saliency.max_dim,
        }
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.as_ref().map_or("none", |e| e.name())
    }

    pub fn detect(&self, image: &PixelBuffer, screen_w: u32, screen_h: u32) -> GameLensResult<Vec<DetectedBox>> {
        detect_ui_elements(image, screen_w, screen_h, self.detection_max_dim)
    }

    /// Saliency via the selected executor. Channel failures (spawn, timeout,
    /// panic) are retried once inline; input errors are returned as-is.
    pub async fn saliency(&self, image: Arc<PixelBuffer>) -> GameLensResult<SaliencyResult> {
        let max_dim = self.saliency_max_dim;
        let Some(executor) = self.executor.as_ref() else {
            return self.fallback.analyze(image, max_dim).await;
        };
        match executor.analyze(image.clone(), max_dim).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_executor_failure() => {
                tracing::warn!(executor = executor.name(), error = %e, "saliency executor failed; running inline");
                self.fallback.analyze(image, max_dim).await.map_err(|inline_err| {
                    GameLensError::Saliency(format!("{}: {e}; inline: {inline_err}", executor.name()))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the executor and release its worker.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut executor) = self.executor.take() {
            tracing::debug!(executor = executor.name(), "shutting down saliency executor");
            executor.shutdown();
        }
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        self.release();
    }
}
