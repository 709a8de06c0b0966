pub mod background;
pub mod inline;

use std::time::Duration;

use crate::config::ExecutorConfig;
use crate::perception::traits::SaliencyExecutor;

pub use background::BackgroundExecutor;
pub use inline::InlineExecutor;

/// Pick the saliency execution strategy once, at session start.
///
/// The background worker is used when enabled in config and the thread can
/// be spawned; otherwise analysis runs inline.
pub fn select_executor(config: &ExecutorConfig) -> Box<dyn SaliencyExecutor> {
    if !config.background {
        tracing::info!("background saliency disabled; using inline executor");
        return Box::new(InlineExecutor);
    }
    match BackgroundExecutor::spawn(Duration::from_millis(config.timeout_ms)) {
        Ok(worker) => {
            tracing::info!(timeout_ms = config.timeout_ms, "using background saliency executor");
            Box::new(worker)
        }
        Err(e) => {
            tracing::warn!(error = %e, "background executor unavailable; using inline executor");
            Box::new(InlineExecutor)
        }
    }
}
