//! `log` backend for the browser worker: records go to `console.*` with a
//! level-appropriate method. Native builds write to stderr.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{} {}", record.level(), record.args());
        emit(record.level(), &line);
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let msg = JsValue::from_str(line);
    match level {
        Level::Error => console::error_1(&msg),
        Level::Warn => console::warn_1(&msg),
        Level::Info => console::info_1(&msg),
        Level::Debug | Level::Trace => console::debug_1(&msg),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: Level, line: &str) {
    eprintln!("{line}");
}

/// Parse a level name; unknown names fall back to `info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Install the console logger. Safe to call more than once; later calls
/// only change the level.
pub fn init(level: LevelFilter) {
    #[cfg(feature = "console-panic")]
    console_error_panic_hook::set_once();

    if log::set_logger(&LOGGER).is_ok() {
        log::debug!("[log] console logger installed");
    }
    log::set_max_level(level);
}
