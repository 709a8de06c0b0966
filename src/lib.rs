pub mod config;
pub mod errors;
pub mod executor;
pub mod perception;
pub mod session;

pub use errors::{GameLensError, GameLensResult};
pub use perception::pipeline::detect_ui_elements;
pub use perception::saliency::analyze_saliency;
pub use perception::types::{DetectedBox, ElementLabel, PixelBuffer, SaliencyResult};
pub use session::AnalysisSession;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default `info`
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
