use crate::config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Targets logged at the configured level: the library, both binaries and
/// the HTTP trace layer.
const LOG_TARGETS: [&str; 4] = [
    "vehicle_predictive_maintenance",
    "predictive_maintenance",
    "pm_cli",
    "tower_http",
];

/// Filter used when `RUST_LOG` is unset: warnings from everything, plus our
/// own targets at `level`.
pub fn default_directives(level: &str) -> String {
    std::iter::once("warn".to_string())
        .chain(LOG_TARGETS.iter().map(|target| format!("{}={}", target, level)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};

    /// Records the target of every event that gets past the filter
    struct TargetRecorder(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for TargetRecorder {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0
                .lock()
                .unwrap()
                .push(event.metadata().target().to_string());
        }
    }

    #[test]
    fn test_default_directives_cover_binaries() {
        let directives = default_directives("info");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("predictive_maintenance=info"));
        assert!(directives.contains("pm_cli=info"));
    }

    #[test]
    fn test_default_filter_passes_server_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(default_directives("info")))
            .with(TargetRecorder(seen.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "predictive_maintenance", "server started");
            tracing::error!(target: "predictive_maintenance", "artifacts failed to load");
            tracing::debug!(target: "predictive_maintenance", "too verbose");
            tracing::info!(target: "pm_cli", "training finished");
            tracing::info!(target: "hyper", "dependency chatter");
            tracing::warn!(target: "hyper", "dependency warning");
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "predictive_maintenance",
                "predictive_maintenance",
                "pm_cli",
                "hyper"
            ]
        );
    }
}
