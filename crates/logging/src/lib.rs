//! Helpers for logging.
//!
//! Everything in tabula logs through the `log` facade.  Binaries, tests, and benches call one of the functions here to
//! get those messages onto stderr.
use log::LevelFilter;

/// Log to stderr, honoring `RUST_LOG` and defaulting to `info`.
///
/// If called multiple times in the same process, only applies once.
pub fn log_to_stderr() {
    install(None);
}

/// Log to stderr at exactly `level`, ignoring `RUST_LOG`.
///
/// Like [log_to_stderr], only the first call in a process has any effect.
pub fn log_to_stderr_at(level: LevelFilter) {
    install(Some(level));
}

fn install(level: Option<LevelFilter>) {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let mut builder = match level {
            Some(l) => {
                let mut b = env_logger::Builder::new();
                b.filter_level(l);
                b
            }
            None => env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            ),
        };

        builder
            .format(|buf, record| {
                use std::io::Write;

                let now = time::OffsetDateTime::now_utc();

                writeln!(
                    buf,
                    "{} {} time={} target={}",
                    record.level(),
                    record.args(),
                    now,
                    record.target()
                )
            })
            // Something else may have installed a logger already; theirs wins.
            .try_init()
            .ok();
    });
}
