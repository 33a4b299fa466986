#[derive(Debug, Clone)]
pub struct YaraOption {
    /// Global (and `package.loaded`) name the library table is published under.
    pub global_name: String,
    /// Publish `load`, which restores rulesets from their serialized form.
    pub enable_load: bool,
}

impl Default for YaraOption {
    fn default() -> Self {
        Self {
            global_name: "yara".to_string(),
            enable_load: false,
        }
    }
}
