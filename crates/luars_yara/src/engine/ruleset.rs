use std::fmt;

use super::scan::{MatchEvent, SCAN_TIMEOUT, ScanFlow, ScanTarget};
use super::yara_error::{ScanFailure, YaraError};

/// A compiled set of rules, ready to scan memory.
pub struct Ruleset {
    rules: yara_x::Rules,
    rule_count: usize,
}

impl Ruleset {
    /// Compile rule source text.
    ///
    /// The compiler only lives for the duration of this call; it is dropped on
    /// success and on every error path alike.
    pub fn compile(source: &str) -> Result<Self, YaraError> {
        super::init();

        let mut compiler = yara_x::Compiler::new();
        if let Err(err) = compiler.add_source(source) {
            log::warn!("rule compilation failed: {}", err);
            return Err(YaraError::Compile(err.to_string()));
        }

        let ruleset = Self::from_rules(compiler.build());
        log::debug!("compiled {} rules", ruleset.rule_count);
        Ok(ruleset)
    }

    /// Restore a ruleset from the bytes produced by [`Ruleset::serialize`].
    pub fn load(bytes: &[u8]) -> Result<Self, YaraError> {
        super::init();

        let rules = yara_x::Rules::deserialize(bytes).map_err(|err| {
            log::warn!("cannot load compiled rules: {}", err);
            YaraError::Load(err.to_string())
        })?;

        let ruleset = Self::from_rules(rules);
        log::debug!("loaded {} compiled rules", ruleset.rule_count);
        Ok(ruleset)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, YaraError> {
        self.rules
            .serialize()
            .map_err(|err| YaraError::Serialize(err.to_string()))
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Scan `target`, reporting every match to `on_match` in engine order.
    ///
    /// Rules with string patterns produce one [`MatchEvent::Pattern`] per
    /// occurrence; rules without any produce a single [`MatchEvent::Condition`].
    /// Returning [`ScanFlow::Abort`] ends the scan successfully with no further
    /// reports. A callback error ends it with [`ScanFailure::Callback`].
    pub fn scan<F, E>(&self, target: ScanTarget<'_>, mut on_match: F) -> Result<(), ScanFailure<E>>
    where
        F: FnMut(MatchEvent<'_>) -> Result<ScanFlow, E>,
    {
        let data = target.bytes();
        log::trace!("scanning {} bytes against {} rules", data.len(), self.rule_count);

        let mut scanner = yara_x::Scanner::new(&self.rules);
        scanner.set_timeout(SCAN_TIMEOUT);
        let results = scanner.scan(data).map_err(|err| match err {
            yara_x::ScanError::Timeout => YaraError::Timeout,
            other => YaraError::Scan(other.to_string()),
        })?;

        for rule in results.matching_rules() {
            let identifier = rule.identifier();
            let mut patterns = rule.patterns().peekable();

            if patterns.peek().is_none() {
                let event = MatchEvent::Condition { rule: identifier };
                if on_match(event).map_err(ScanFailure::Callback)? == ScanFlow::Abort {
                    log::trace!("scan aborted by callback at rule {}", identifier);
                    return Ok(());
                }
                continue;
            }

            for pattern in patterns {
                for m in pattern.matches() {
                    let range = m.range();
                    let event = MatchEvent::Pattern {
                        rule: identifier,
                        offset: range.start,
                        length: range.len(),
                    };
                    if on_match(event).map_err(ScanFailure::Callback)? == ScanFlow::Abort {
                        log::trace!("scan aborted by callback at rule {}", identifier);
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }

    fn from_rules(rules: yara_x::Rules) -> Self {
        let rule_count = rules.iter().count();
        Ruleset { rules, rule_count }
    }
}

impl fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ruleset")
            .field("rule_count", &self.rule_count)
            .finish_non_exhaustive()
    }
}
