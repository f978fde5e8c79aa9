use std::io::Write;

use env_logger::Builder;

/// Installs `env_logger` with the timestamp/level/file:line format used
/// across this crate's own integration tests. Safe to call more than
/// once per process: `try_init` swallows the "already initialized"
/// error so every test fixture can call this unconditionally.
pub fn init_logging() {
    let mut builder = Builder::from_default_env();
    builder
        .format_timestamp_secs()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init()
        .ok();
}
