//! Module alias table
//!
//! Maps hardware identifier strings (modaliases) to candidate driver modules.
//! The table is produced at image build time, one `pattern module` record per
//! line, and is read once at startup.

use glob::{MatchOptions, Pattern};
use std::path::Path;
use tracing::debug;

use crate::module::traits::ModuleError;

/// `*` and `?` never cross a `/`, same as shell path globbing
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Rewrite an alias-file pattern into `glob` crate syntax
///
/// Alias files negate classes with `[^...]`, escape with `\` and may contain
/// runs of `*`. The `glob` crate spells negation `[!...]`, has no escape
/// character and rejects `**` inside a path component. A run of stars matches
/// the same strings as one star when `*` cannot cross `/`.
fn translate_pattern(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '[' if !in_class => {
                in_class = true;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('!');
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '*' if !in_class => {
                out.push('*');
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
            }
            '\\' => match chars.next() {
                Some(escaped) if in_class => out.push(escaped),
                Some(escaped @ ('*' | '?' | '[' | ']')) => {
                    out.push('[');
                    out.push(escaped);
                    out.push(']');
                }
                Some(escaped) => out.push(escaped),
                None => return Err("trailing escape character".to_string()),
            },
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// One alias record
#[derive(Debug, Clone)]
pub struct AliasEntry {
    /// Glob pattern as written in the alias file
    pub pattern: String,
    /// Module to load when the pattern matches
    pub module: String,
    compiled: Result<Pattern, String>,
}

impl AliasEntry {
    pub fn new(pattern: impl Into<String>, module: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled = translate_pattern(&pattern)
            .and_then(|translated| Pattern::new(&translated).map_err(|e| e.to_string()));
        Self {
            pattern,
            module: module.into(),
            compiled,
        }
    }

    fn matches(&self, identifier: &str) -> Result<bool, ModuleError> {
        match &self.compiled {
            Ok(pattern) => Ok(pattern.matches_with(identifier, MATCH_OPTIONS)),
            Err(reason) => Err(ModuleError::PatternError {
                pattern: self.pattern.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Immutable, ordered alias table
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    /// Table with no aliases; every lookup yields no candidates
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from (pattern, module) pairs, keeping their order
    pub fn from_pairs<I, P, M>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, M)>,
        P: Into<String>,
        M: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(pattern, module)| AliasEntry::new(pattern, module))
                .collect(),
        }
    }

    /// Parse alias file contents
    pub fn parse(contents: &str) -> Result<Self, ModuleError> {
        let mut entries = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split(' ');
            match (parts.next(), parts.next()) {
                (Some(pattern), Some(module)) if !pattern.is_empty() && !module.is_empty() => {
                    entries.push(AliasEntry::new(pattern, module));
                }
                _ => {
                    return Err(ModuleError::ConfigError(format!(
                        "Malformed alias record at line {}: {:?}",
                        idx + 1,
                        line
                    )));
                }
            }
        }
        Ok(Self { entries })
    }

    /// Load the alias file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::ConfigError(format!("Failed to read alias file {:?}: {}", path, e))
        })?;
        let table = Self::parse(&contents)?;
        debug!("Loaded {} module aliases from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Return every module whose pattern matches `identifier`
    ///
    /// Result is in table order with later duplicates removed. A malformed
    /// pattern fails the whole lookup.
    pub fn match_alias(&self, identifier: &str) -> Result<Vec<String>, ModuleError> {
        let mut result: Vec<String> = Vec::new();
        for entry in &self.entries {
            if entry.matches(identifier)? {
                debug!("modalias {} matched module {}", identifier, entry.module);
                if !result.contains(&entry.module) {
                    result.push(entry.module.clone());
                }
            }
        }
        Ok(result)
    }
}
