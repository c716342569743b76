// `log` output goes to the browser console through `console_log`.

use log::LevelFilter;

use crate::error::SiteError;

/// Parse a config `log_level` (`off`, `error` .. `trace`, any case).
pub fn parse_level(name: &str) -> Result<LevelFilter, SiteError> {
    name.trim()
        .parse::<LevelFilter>()
        .map_err(|_| SiteError::InvalidConfig(format!("unknown log_level '{}'", name)))
}

/// Install the console logger once, then apply `level`. A later mount only
/// changes the level.
#[cfg(target_arch = "wasm32")]
pub fn init(level: LevelFilter) {
    console_log::init_with_level(log::Level::Trace).ok();
    log::set_max_level(level);
}
