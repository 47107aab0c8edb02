/// Install the global subscriber. Call once, from the binary.
///
/// `RUST_LOG` picks the verbosity (default `info`), e.g.
/// `RUST_LOG=meatup_orders::clients=debug`.
pub fn setup_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .compact()
        .init();
}
