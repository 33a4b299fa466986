// Tests for yara.compile and the module surface
use crate::engine;
use crate::test::{ALWAYS_RULE, HELLO_RULE};
use crate::{YaraOption, open_yara, open_yara_with};
use luars::lua_vm::SafeOption;
use luars::{LuaVM, Stdlib};

#[test]
fn test_compile_returns_handle() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    open_yara(&mut vm).unwrap();

    let source = vm.create_string(HELLO_RULE).unwrap();
    vm.set_global("SOURCE", source).unwrap();

    let result = vm.execute(
        r#"
        local rules, code = yara.compile(SOURCE)
        assert(type(rules) == "userdata")
        assert(code == nil)
        "#,
    );
    assert!(result.is_ok(), "compile failed: {:?}", result.err());
    assert_eq!(engine::init_count(), 1);
}

#[test]
fn test_compile_syntax_error_returns_code() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    open_yara(&mut vm).unwrap();

    let results = vm
        .execute(r#"return yara.compile("rule broken { condition: ")"#)
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_nil());
    assert_eq!(
        results[1].as_integer(),
        Some(engine::error_code::ERROR_SYNTAX_ERROR)
    );
}

#[test]
fn test_compile_rejects_non_string() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    open_yara(&mut vm).unwrap();

    let result = vm.execute(
        r#"
        local ok, err = pcall(yara.compile, {})
        assert(not ok)
        assert(string.find(err, "string expected", 1, true))

        ok, err = pcall(yara.compile)
        assert(not ok)
        "#,
    );
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_module_surface() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    open_yara(&mut vm).unwrap();

    let result = vm.execute(
        r#"
        assert(type(yara) == "table")
        assert(type(yara.compile) == "function")
        assert(yara.load == nil)
        assert(require("yara") == yara)
        "#,
    );
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_custom_global_name() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    let option = YaraOption {
        global_name: "scanner".to_string(),
        enable_load: true,
    };
    open_yara_with(&mut vm, &option).unwrap();

    assert!(vm.get_global("yara").unwrap().is_none());
    let result = vm.execute(
        r#"
        assert(type(scanner.compile) == "function")
        assert(type(scanner.load) == "function")
        "#,
    );
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_handle_tostring() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    open_yara(&mut vm).unwrap();

    let source = vm
        .create_string(&format!("{}\n{}", HELLO_RULE, ALWAYS_RULE))
        .unwrap();
    vm.set_global("SOURCE", source).unwrap();

    let results = vm
        .execute("return tostring(yara.compile(SOURCE))")
        .unwrap();
    let text = results[0].as_str().unwrap_or_default();
    assert!(
        text.starts_with("yara.rules (2 rules)"),
        "unexpected tostring: {}",
        text
    );
}

#[test]
fn test_handles_are_independent() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    open_yara(&mut vm).unwrap();

    let hello = vm.create_string(HELLO_RULE).unwrap();
    vm.set_global("HELLO", hello).unwrap();
    let always = vm.create_string(ALWAYS_RULE).unwrap();
    vm.set_global("ALWAYS", always).unwrap();

    let result = vm.execute(
        r#"
        local a = yara.compile(HELLO)
        local b = yara.compile(ALWAYS)
        assert(a ~= b)
        local seen = {}
        a("hello", function(id) seen[#seen + 1] = id end)
        b("hello", function(id) seen[#seen + 1] = id end)
        assert(#seen == 2)
        assert(seen[1] == "hello")
        assert(seen[2] == "always")
        "#,
    );
    assert!(result.is_ok(), "{:?}", result.err());
}

#[test]
fn test_require_with_shadowed_package() {
    let mut vm = LuaVM::new(SafeOption::default());
    vm.open_stdlib(Stdlib::All).unwrap();
    vm.execute("package = nil").unwrap();
    open_yara(&mut vm).unwrap();

    let result = vm.execute(
        r#"
        assert(package == nil)
        assert(require("yara") == yara)
        "#,
    );
    assert!(result.is_ok(), "{:?}", result.err());
}
