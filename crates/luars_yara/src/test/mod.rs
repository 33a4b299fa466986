// Test module organization
pub mod test_compile;

pub(crate) const HELLO_RULE: &str = r#"
rule hello {
    strings:
        $a = "hello"
    condition:
        $a
}
"#;

pub(crate) const ALWAYS_RULE: &str = r#"
rule always {
    condition:
        true
}
"#;

pub(crate) const NEVER_RULE: &str = r#"
rule never {
    strings:
        $a = "zq_not_in_any_buffer"
    condition:
        $a
}
"#;

pub(crate) const FOO_BAR_RULE: &str = r#"
rule foo_bar {
    strings:
        $foo = "foo"
        $bar = "bar"
    condition:
        any of them
}
"#;
