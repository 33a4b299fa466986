// Ruleset handle
// Userdata wrapping one compiled ruleset. Calling it scans memory;
// collecting it releases the ruleset.

use std::rc::Rc;

use luars::LuaValue;
use luars::lua_value::LuaUserdata;
use luars::lua_value::userdata_trait::UserDataTrait;
use luars::lua_vm::{LuaError, LuaResult, LuaState};

use super::arg_error;
use crate::engine::{MatchEvent, Ruleset, ScanFailure, ScanFlow, ScanTarget};

pub const RULES_TYPE_NAME: &str = "yara.rules";

/// Raised in place of a callback that tried to yield out of a scan.
const YIELD_ACROSS_SCAN: &str = "attempt to yield across a C-call boundary";

type MetaMethod = fn(&mut LuaState) -> LuaResult<usize>;

/// Behavior shared by every ruleset handle.
static RULES_METAMETHODS: [(&str, MetaMethod); 3] = [
    ("__call", rules_call),
    ("__gc", rules_gc),
    ("__tostring", rules_tostring),
];

/// Userdata payload. `None` once the handle has been finalized.
#[derive(Debug)]
pub struct RulesHandle {
    ruleset: Option<Rc<Ruleset>>,
}

impl RulesHandle {
    pub fn new(ruleset: Ruleset) -> Self {
        RulesHandle {
            ruleset: Some(Rc::new(ruleset)),
        }
    }

    pub fn ruleset(&self) -> Option<&Rc<Ruleset>> {
        self.ruleset.as_ref()
    }

    /// Drop this handle's ownership of the ruleset. Safe to call repeatedly.
    ///
    /// A scan already running on the ruleset keeps its own reference, so the
    /// ruleset itself goes away when that scan finishes.
    pub fn release(&mut self) {
        if let Some(ruleset) = self.ruleset.take() {
            log::debug!("releasing ruleset with {} rules", ruleset.rule_count());
        }
    }
}

// Handles are driven by their metatable; the trait only provides type
// identity, downcasting and the collector hook.
impl UserDataTrait for RulesHandle {
    fn type_name(&self) -> &'static str {
        RULES_TYPE_NAME
    }

    fn lua_gc(&mut self) {
        self.release();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Metatable shared by every handle of this VM, built on first use and kept
/// in the registry under [`RULES_TYPE_NAME`].
fn rules_metatable(l: &mut LuaState) -> LuaResult<LuaValue> {
    if let Some(mt) = l.vm_mut().registry_get(RULES_TYPE_NAME)?
        && mt.is_table()
    {
        return Ok(mt);
    }

    let mt = create_rules_metatable(l)?;
    l.vm_mut().registry_set(RULES_TYPE_NAME, mt)?;
    Ok(mt)
}

fn create_rules_metatable(l: &mut LuaState) -> LuaResult<LuaValue> {
    let mt = l.create_table(0, RULES_METAMETHODS.len() + 1)?;

    for &(name, func) in RULES_METAMETHODS.iter() {
        let key = l.create_string(name)?;
        l.raw_set(&mt, key, LuaValue::cfunction(func));
    }

    // __name for type identification in error messages
    let name_key = l.create_string("__name")?;
    let name_val = l.create_string(RULES_TYPE_NAME)?;
    l.raw_set(&mt, name_key, name_val);

    Ok(mt)
}

/// Wrap `ruleset` in a new handle and push it onto the stack.
pub(crate) fn push_rules(l: &mut LuaState, ruleset: Ruleset) -> LuaResult<()> {
    let rules_mt = rules_metatable(l)?;
    let userdata = l.create_userdata(LuaUserdata::new(RulesHandle::new(ruleset)))?;

    match userdata.as_userdata_mut() {
        Some(ud) => ud.set_metatable(rules_mt),
        None => debug_assert!(false, "create_userdata returned a non-userdata value"),
    }

    // Register for __gc so the collector releases the ruleset
    l.vm_mut().gc.check_finalizer(&userdata);

    l.push_value(userdata)
}

fn handle_of(value: &LuaValue) -> Option<&mut RulesHandle> {
    value
        .as_userdata_mut()?
        .get_data_mut()
        .downcast_mut::<RulesHandle>()
}

fn check_ruleset(l: &mut LuaState, fname: &str) -> LuaResult<Rc<Ruleset>> {
    let Some(value) = l.get_arg(1) else {
        return Err(arg_error(l, 1, fname, "yara.rules expected"));
    };

    match handle_of(&value) {
        Some(handle) => match handle.ruleset() {
            Some(ruleset) => Ok(Rc::clone(ruleset)),
            None => Err(l.error("attempt to scan with a released ruleset".to_string())),
        },
        None => Err(arg_error(l, 1, fname, "yara.rules expected")),
    }
}

/// Failure inside the match callback.
enum CallbackError {
    /// The callback raised; carries the error object it raised.
    Raised(LuaValue),
    /// The VM itself failed while setting up or running the call.
    Vm(LuaError),
}

/// rules(text, callback) / rules(address, length, callback)
fn rules_call(l: &mut LuaState) -> LuaResult<usize> {
    let ruleset = check_ruleset(l, "scan")?;

    let target_value = l.get_arg(2).unwrap_or(LuaValue::nil());
    let (target, callback_index) = if let Some(text) = target_value.as_str() {
        (ScanTarget::Bytes(text.as_bytes()), 3)
    } else if let Some(bytes) = target_value.as_binary() {
        (ScanTarget::Bytes(bytes), 3)
    } else {
        let addr = match target_value.as_integer() {
            Some(addr) if addr != 0 => addr as usize,
            _ => return Err(arg_error(l, 2, "scan", "string or integer expected")),
        };
        let len = match l.get_arg(3).and_then(|v| v.as_integer()) {
            Some(len) if len >= 0 => len as usize,
            Some(_) => return Err(arg_error(l, 3, "scan", "non-negative length expected")),
            None => return Err(arg_error(l, 3, "scan", "number expected")),
        };
        // SAFETY: passing a raw address is the script's promise that
        // addr..addr+len is readable memory it owns for the whole call; the
        // scan finishes before this function returns.
        (unsafe { ScanTarget::from_raw_parts(addr, len) }, 4)
    };

    let callback = match l.get_arg(callback_index) {
        Some(func) if func.is_function() => func,
        _ => return Err(arg_error(l, callback_index, "scan", "function expected")),
    };

    match ruleset.scan(target, |event| invoke_callback(l, callback, event)) {
        Ok(()) => Ok(0),
        Err(ScanFailure::Callback(CallbackError::Vm(err))) => Err(err),
        Err(failure) => {
            let code = failure.code();
            let detail = match failure {
                ScanFailure::Callback(CallbackError::Raised(err)) => err,
                _ => LuaValue::nil(),
            };
            log::trace!("scan finished with status {}", code);
            l.push_value(LuaValue::integer(code))?;
            l.push_value(detail)?;
            Ok(2)
        }
    }
}

fn invoke_callback(
    l: &mut LuaState,
    callback: LuaValue,
    event: MatchEvent<'_>,
) -> Result<ScanFlow, CallbackError> {
    let rule = l.create_string(event.rule()).map_err(CallbackError::Vm)?;
    let args = match event {
        MatchEvent::Pattern { offset, length, .. } => vec![
            rule,
            LuaValue::integer(offset as i64),
            LuaValue::integer(length as i64),
        ],
        MatchEvent::Condition { .. } => vec![rule],
    };

    let (ok, results) = match l.pcall(callback, args) {
        Ok(outcome) => outcome,
        // The scan cannot be suspended; report the yield as a callback error
        Err(LuaError::Yield) => {
            let msg = l.create_string(YIELD_ACROSS_SCAN).map_err(CallbackError::Vm)?;
            return Err(CallbackError::Raised(msg));
        }
        Err(err) => return Err(CallbackError::Vm(err)),
    };
    if !ok {
        let err = results.first().copied().unwrap_or(LuaValue::nil());
        return Err(CallbackError::Raised(err));
    }

    // Only a literal `false` stops the scan; nil or no result continues.
    if results.first().and_then(|v| v.as_boolean()) == Some(false) {
        Ok(ScanFlow::Abort)
    } else {
        Ok(ScanFlow::Continue)
    }
}

fn rules_gc(l: &mut LuaState) -> LuaResult<usize> {
    if let Some(value) = l.get_arg(1)
        && let Some(handle) = handle_of(&value)
    {
        handle.release();
    }
    Ok(0)
}

fn rules_tostring(l: &mut LuaState) -> LuaResult<usize> {
    let Some(value) = l.get_arg(1) else {
        return Err(arg_error(l, 1, "tostring", "yara.rules expected"));
    };

    let text = match handle_of(&value) {
        Some(handle) => match handle.ruleset() {
            Some(ruleset) => format!(
                "{} ({} rules): {:p}",
                RULES_TYPE_NAME,
                ruleset.rule_count(),
                Rc::as_ptr(ruleset)
            ),
            None => format!("{} (released)", RULES_TYPE_NAME),
        },
        None => return Err(arg_error(l, 1, "tostring", "yara.rules expected")),
    };

    let s = l.create_string(&text)?;
    l.push_value(s)?;
    Ok(1)
}
