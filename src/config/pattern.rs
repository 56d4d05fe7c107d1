//! Compilation of configured identity patterns
//!
//! Patterns are either plain `regex` syntax (`^\d{8}$`) or PCRE-style
//! delimited expressions with trailing flags (`/^\d{7,8}-[\dk]$/i`), the form
//! most existing deployments store.

use parking_lot::RwLock;
use regex::Regex;
use thiserror::Error;

const DELIMITERS: &[char] = &['/', '#', '~', '@', '%', '!', '|', '+'];

#[derive(Debug, Clone, Error)]
pub enum PatternError {
    #[error("invalid pattern syntax: {0}")]
    Syntax(#[from] regex::Error),

    #[error("unsupported pattern flag '{0}'")]
    UnsupportedFlag(char),
}

/// Compile a configured pattern
pub fn compile_pattern(pattern: &str) -> Result<Regex, PatternError> {
    match split_delimited(pattern) {
        Some((body, flags)) => {
            let mut inline = String::new();
            for flag in flags.chars() {
                match flag {
                    'i' | 'm' | 's' | 'x' | 'U' => inline.push(flag),
                    // regex is Unicode-aware already
                    'u' => {}
                    other => return Err(PatternError::UnsupportedFlag(other)),
                }
            }

            if inline.is_empty() {
                Ok(Regex::new(body)?)
            } else {
                Ok(Regex::new(&format!("(?{}){}", inline, body))?)
            }
        }
        None => Ok(Regex::new(pattern)?),
    }
}

/// Last compiled pattern, reused while the configured text stays the same
///
/// Settings are read on every validation, so the pattern text may change
/// between calls; only a changed text is recompiled. Patterns that fail to
/// compile are never cached.
#[derive(Debug, Default)]
pub struct PatternCache {
    current: RwLock<Option<(String, Regex)>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled form of `pattern`
    pub fn get(&self, pattern: &str) -> Result<Regex, PatternError> {
        if let Some((text, re)) = &*self.current.read() {
            if text == pattern {
                return Ok(re.clone());
            }
        }

        let re = compile_pattern(pattern)?;
        *self.current.write() = Some((pattern.to_string(), re.clone()));
        Ok(re)
    }
}

/// Split `/body/flags` into body and flags, if the pattern is delimited
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next().filter(|c| DELIMITERS.contains(c))?;
    let rest = &pattern[delimiter.len_utf8()..];
    let end = rest.rfind(delimiter)?;
    let (body, flags) = (&rest[..end], &rest[end + delimiter.len_utf8()..]);

    if flags.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((body, flags))
    } else {
        None
    }
}
