// YARA bindings for luars
// Compiles rules and scans memory from Lua through the yara-x engine

#[cfg(test)]
mod test;

pub mod engine;
pub mod lib_yara;
mod yara_option;

pub use engine::{MatchEvent, Ruleset, ScanFailure, ScanFlow, ScanTarget, YaraError};
pub use lib_yara::RulesHandle;
pub use yara_option::YaraOption;

use luars::{LuaResult, LuaVM};

/// Install the `yara` library into `vm` with default options.
pub fn open_yara(vm: &mut LuaVM) -> LuaResult<()> {
    open_yara_with(vm, &YaraOption::default())
}

/// Install the `yara` library into `vm`.
///
/// The engine itself is initialized lazily, on the first compile or load.
pub fn open_yara_with(vm: &mut LuaVM, option: &YaraOption) -> LuaResult<()> {
    lib_yara::install(vm, option)
}
