// yara library
// Implements: compile, load (opt-in)
mod rules;

use luars::lua_vm::{LuaError, LuaResult, LuaState};
use luars::{LuaVM, LuaValue, TableBuilder};

use crate::YaraOption;
use crate::engine::Ruleset;
pub use rules::{RULES_TYPE_NAME, RulesHandle};
use rules::push_rules;

pub(crate) fn arg_error(l: &mut LuaState, index: usize, fname: &str, msg: &str) -> LuaError {
    l.error(format!("bad argument #{} to '{}' ({})", index, fname, msg))
}

/// Build the library table and publish it as a global and in `package.loaded`.
pub fn install(vm: &mut LuaVM, option: &YaraOption) -> LuaResult<()> {
    let mut builder = TableBuilder::new().set("compile", LuaValue::cfunction(yara_compile));
    if option.enable_load {
        builder = builder.set("load", LuaValue::cfunction(yara_load));
    }
    let lib_table = builder.build(vm)?;

    vm.set_global(&option.global_name, lib_table)?;

    // Also register in package.loaded so require() finds it, even when a
    // script has replaced the global `package`
    if let Some(loaded_table) = vm.registry_get("_LOADED")?
        && loaded_table.is_table()
    {
        let mod_key = vm.create_string(&option.global_name)?;
        vm.raw_set(&loaded_table, mod_key, lib_table);
    }

    log::debug!(
        "yara library installed as '{}' (load {})",
        option.global_name,
        if option.enable_load { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Push `nil, code` and report two results.
fn push_failure(l: &mut LuaState, code: i64) -> LuaResult<usize> {
    l.push_value(LuaValue::nil())?;
    l.push_value(LuaValue::integer(code))?;
    Ok(2)
}

/// yara.compile(source) -> rules | nil, code
fn yara_compile(l: &mut LuaState) -> LuaResult<usize> {
    let source_value = l.get_arg(1).unwrap_or(LuaValue::nil());
    let Some(source) = source_value.as_str() else {
        return Err(arg_error(l, 1, "compile", "string expected"));
    };

    match Ruleset::compile(source) {
        Ok(ruleset) => {
            push_rules(l, ruleset)?;
            Ok(1)
        }
        Err(err) => push_failure(l, err.code()),
    }
}

/// yara.load(bytes) -> rules | nil, code
fn yara_load(l: &mut LuaState) -> LuaResult<usize> {
    let data_value = l.get_arg(1).unwrap_or(LuaValue::nil());
    let data = match (data_value.as_binary(), data_value.as_str()) {
        (Some(bytes), _) => bytes,
        (None, Some(text)) => text.as_bytes(),
        (None, None) => return Err(arg_error(l, 1, "load", "string expected")),
    };

    match Ruleset::load(data) {
        Ok(ruleset) => {
            push_rules(l, ruleset)?;
            Ok(1)
        }
        Err(err) => push_failure(l, err.code()),
    }
}
