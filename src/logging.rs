/// Installs the global fmt subscriber. Debug builds trace every protocol
/// exchange; release builds only report session lifecycle and errors.
pub(crate) fn set_up() {
    #[cfg(debug_assertions)]
    let level = tracing::Level::TRACE;

    #[cfg(not(debug_assertions))]
    let level = tracing::Level::INFO;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    tracing::debug!("logging ready");
}
