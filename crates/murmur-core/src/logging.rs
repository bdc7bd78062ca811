//! Tracing initialisation.

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// `default_directive` (e.g. `"murmur_ingest=debug"`) is added on top of the
/// environment filter; an unparseable directive is ignored. Returns `false`
/// if a global subscriber was already set, which makes this safe to call from
/// every test.
pub fn try_init(default_directive: &str) -> bool {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = default_directive.parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
