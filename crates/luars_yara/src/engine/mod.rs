// Scanning engine facade
// Host-agnostic wrapper over yara-x: compile, load, scan.
// Nothing in here knows about Lua; the Lua binding lives in lib_yara.

pub mod error_code;
mod ruleset;
mod scan;
mod yara_error;

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use ruleset::Ruleset;
pub use scan::{MatchEvent, SCAN_TIMEOUT, ScanFlow, ScanTarget};
pub use yara_error::{ScanFailure, YaraError};

/// Process-wide engine state, created by [`init`].
#[derive(Debug)]
pub struct Engine {
    version: &'static str,
}

impl Engine {
    pub fn version(&self) -> &'static str {
        self.version
    }
}

static ENGINE: OnceLock<Engine> = OnceLock::new();
static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Bring the engine up once per process.
///
/// Every call after the first returns the same instance without doing any work.
/// There is no matching shutdown; the engine lives as long as the process.
pub fn init() -> &'static Engine {
    ENGINE.get_or_init(|| {
        INIT_COUNT.fetch_add(1, Ordering::SeqCst);
        // Building an empty ruleset forces yara-x to set up its shared
        // compilation runtime, so the first real compile doesn't pay for it.
        drop(yara_x::Compiler::new().build());
        let engine = Engine {
            version: concat!("yara-x (luars_yara ", env!("CARGO_PKG_VERSION"), ")"),
        };
        log::info!("scanning engine initialized: {}", engine.version);
        engine
    })
}

/// Number of times the initializer has actually run (0 or 1).
pub fn init_count() -> usize {
    INIT_COUNT.load(Ordering::SeqCst)
}
