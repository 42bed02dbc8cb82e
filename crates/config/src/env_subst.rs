//! Allow-list driven `$VAR` / `${VAR}` substitution.
//!
//! Only placeholders whose name is covered by the [`AllowList`] are ever
//! replaced. Everything else passes through verbatim, even when a variable of
//! that name happens to be defined: manifests routinely embed shell or proxy
//! syntax (`$host`, `$remote_addr`) that must survive untouched.

use std::collections::BTreeSet;

use {
    regex::{Captures, Regex},
    tracing::debug,
};

use crate::env::{EnvSource, ProcessEnv};

/// `$NAME` or `${NAME}` where `NAME` is `[A-Za-z_][A-Za-z0-9_]*`.
const PLACEHOLDER_PATTERN: &str =
    r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))";

/// Errors produced by [`Envsubst`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstError {
    /// Strict mode found allow-listed placeholders left unresolved.
    /// Names are deduplicated and sorted.
    #[error("undefined variables: [{}]", .0.join(", "))]
    UndefinedVariables(Vec<String>),
}

/// How a name matched the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    Exact,
    Prefix,
}

/// Names and prefixes eligible for substitution.
///
/// Both lists may be populated at once. Duplicates and overlapping entries
/// are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    pub exact: Vec<String>,
    pub prefixes: Vec<String>,
}

impl AllowList {
    pub fn new(exact: Vec<String>, prefixes: Vec<String>) -> Self {
        Self { exact, prefixes }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    pub fn is_exact(&self, name: &str) -> bool {
        self.exact.iter().any(|e| e == name)
    }

    pub fn is_prefixed(&self, name: &str) -> bool {
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Exact names are checked before prefixes.
    pub fn covers(&self, name: &str) -> Option<Coverage> {
        if self.is_exact(name) {
            Some(Coverage::Exact)
        } else if self.is_prefixed(name) {
            Some(Coverage::Prefix)
        } else {
            None
        }
    }
}

/// The substitution engine. Immutable after construction, so one instance
/// can serve any number of calls from any number of threads.
#[derive(Debug, Clone)]
pub struct Envsubst {
    allow: AllowList,
    strict: bool,
    pattern: Regex,
}

impl Envsubst {
    pub fn new(allow: AllowList, strict: bool) -> Self {
        // The pattern is a literal; failing to compile it is a programming error
        // caught by every test in this module.
        #[allow(clippy::expect_used)]
        let pattern = Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid");
        Self {
            allow,
            strict,
            pattern,
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Substitute against the process environment.
    pub fn substitute(&self, text: &str) -> Result<String, SubstError> {
        self.substitute_with(&ProcessEnv, text)
    }

    /// Substitute against `env`.
    ///
    /// Returns either the fully substituted text or, in strict mode, an error
    /// naming every covered placeholder that is still present afterwards.
    /// Never a partial result.
    pub fn substitute_with(&self, env: &dyn EnvSource, text: &str) -> Result<String, SubstError> {
        let substituted = self.pattern.replace_all(text, |caps: &Captures<'_>| {
            let raw = caps.get(0).map_or("", |m| m.as_str());
            let name = placeholder_name(caps);
            if self.allow.covers(name).is_some()
                && let Some(value) = env.lookup(name)
            {
                return value;
            }
            raw.to_string()
        });

        let (covered, uncovered) = self.leftovers(&substituted);

        if self.strict && !covered.is_empty() {
            return Err(SubstError::UndefinedVariables(covered.into_iter().collect()));
        }

        for name in &uncovered {
            debug!(name = %name, "placeholder not in allow-list, left unchanged");
        }
        if !self.strict {
            for name in &covered {
                debug!(name = %name, "allow-listed variable is undefined, left unchanged");
            }
        }

        Ok(substituted.into_owned())
    }

    /// Names of defined variables in `env` that the allow-list covers, sorted.
    pub fn covered_vars(&self, env: &dyn EnvSource) -> Vec<String> {
        let names: BTreeSet<String> = env
            .vars()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| self.allow.covers(name).is_some())
            .collect();
        names.into_iter().collect()
    }

    /// Placeholder names remaining in `text`, split into covered and uncovered.
    fn leftovers(&self, text: &str) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut covered = BTreeSet::new();
        let mut uncovered = BTreeSet::new();
        for caps in self.pattern.captures_iter(text) {
            let name = placeholder_name(&caps);
            if self.allow.covers(name).is_some() {
                covered.insert(name.to_string());
            } else {
                uncovered.insert(name.to_string());
            }
        }
        (covered, uncovered)
    }
}

fn placeholder_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}
