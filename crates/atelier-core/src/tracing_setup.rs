use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for binaries embedding the engine.
/// `RUST_LOG` overrides the default filter when set.
pub fn init_tracing() {
    init_tracing_with_filter("atelier_core=debug,info");
}

pub fn init_tracing_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer().with_target(true);

    // try_init so repeated calls (tests, embedded hosts) are harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
