//! # Identity / Normalization
//!
//! Every stage after the adapters talks about entities through a [`Curie`]:
//! the canonical `NAMESPACE:local_id` key. [`NamespaceRegistry::normalize`]
//! derives it from a raw grounding. The function is pure and total over
//! the registry: any namespace without a rule fails with
//! [`IdentityError::UnknownNamespace`] rather than passing through.
//!
//! Normalization and syntax checking are separate steps. `normalize` only
//! rewrites (case, aliases, embedded prefixes, padding, known fix-ups);
//! `check` tests the result against the namespace's identifier pattern.
//! The validation stage runs both.

mod namespaces;

use std::fmt;

use hashbrown::HashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Grounding;

// ============================================================================
// Curie
// ============================================================================

/// Canonical node identity.
///
/// Ordering is `(namespace, local_id)`, which is the node table order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Curie {
    namespace: String,
    local_id: String,
}

impl Curie {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// The bulk-load `id` string.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Parse a rendered key. Splits on the first `:`; does not re-normalize.
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, local_id) = key.split_once(':')?;
        if namespace.is_empty() || local_id.is_empty() {
            return None;
        }
        Some(Self { namespace: namespace.to_string(), local_id: local_id.to_string() })
    }

    pub fn grounding(&self) -> Grounding {
        Grounding::new(self.namespace.clone(), self.local_id.clone())
    }
}

impl fmt::Display for Curie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.local_id)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a grounding has no canonical identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("no normalization rule for namespace '{0}'")]
    UnknownNamespace(String),

    #[error("malformed identifier {namespace}:{local_id} ({reason})")]
    MalformedIdentifier {
        namespace: String,
        local_id: String,
        reason: String,
    },
}

// ============================================================================
// Rules
// ============================================================================

/// Namespace-specific rewrite applied after prefix stripping.
#[derive(Debug, Clone)]
pub enum Fixup {
    /// Ids starting with `prefix` belong to another namespace.
    Redirect { prefix: String, namespace: String },
    /// Drop an isoform suffix (`P12345-2` → `P12345`) unless the id starts
    /// with the given exempt prefix.
    StripIsoform { exempt_prefix: String },
    /// Exact id replacement for a known upstream misspelling.
    Replace { from: String, to: String },
}

/// How one namespace is normalized and checked.
#[derive(Debug, Clone)]
pub struct NamespaceRule {
    pub canonical: String,
    pub aliases: Vec<String>,
    /// Redundant prefix some sources embed in the id (`GO:0003677`).
    pub embedded_prefix: Option<String>,
    /// Zero-pad all-digit ids to this width.
    pub pad_width: Option<usize>,
    pub fixups: Vec<Fixup>,
    pub pattern: Regex,
}

impl NamespaceRule {
    pub fn new(canonical: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            canonical: canonical.into().to_uppercase(),
            aliases: Vec::new(),
            embedded_prefix: None,
            pad_width: None,
            fixups: Vec::new(),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_uppercase());
        self
    }

    pub fn embedded_prefix(mut self, prefix: &str) -> Self {
        self.embedded_prefix = Some(prefix.to_string());
        self
    }

    pub fn pad(mut self, width: usize) -> Self {
        self.pad_width = Some(width);
        self
    }

    pub fn fixup(mut self, fixup: Fixup) -> Self {
        self.fixups.push(fixup);
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Namespace → rule lookup, including aliases.
///
/// Built explicitly and passed to the stages that need it. The default
/// registry covers the biomedical vocabularies the built-in sources emit.
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    rules: HashMap<String, NamespaceRule>,
    /// upper-cased spelling → canonical name
    aliases: HashMap<String, String>,
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for rule in namespaces::builtin_rules() {
            registry.register(rule);
        }
        registry
    }
}

impl NamespaceRegistry {
    pub fn empty() -> Self {
        Self { rules: HashMap::new(), aliases: HashMap::new() }
    }

    /// Add or replace a rule.
    pub fn register(&mut self, rule: NamespaceRule) {
        self.aliases.insert(rule.canonical.clone(), rule.canonical.clone());
        for alias in &rule.aliases {
            self.aliases.insert(alias.clone(), rule.canonical.clone());
        }
        self.rules.insert(rule.canonical.clone(), rule);
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.lookup(namespace).is_some()
    }

    /// Canonical spelling of a namespace, if it has a rule.
    pub fn canonical_namespace(&self, namespace: &str) -> Option<&str> {
        self.lookup(namespace).map(|r| r.canonical.as_str())
    }

    fn lookup(&self, namespace: &str) -> Option<&NamespaceRule> {
        let upper = namespace.trim().to_uppercase();
        let canonical = self.aliases.get(&upper)?;
        self.rules.get(canonical)
    }

    /// Rewrite a raw grounding into its canonical form. Does not check syntax.
    pub fn normalize(&self, namespace: &str, local_id: &str) -> Result<Curie, IdentityError> {
        let rule = self
            .lookup(namespace)
            .ok_or_else(|| IdentityError::UnknownNamespace(namespace.trim().to_string()))?;
        let id = strip_prefix(rule, local_id.trim());

        // A redirect hands the id to the target namespace's rules, once.
        for fixup in &rule.fixups {
            if let Fixup::Redirect { prefix, namespace: target } = fixup {
                if id.starts_with(prefix.as_str()) {
                    let target_rule = self
                        .lookup(target)
                        .ok_or_else(|| IdentityError::UnknownNamespace(target.clone()))?;
                    return Ok(apply_rule(target_rule, strip_prefix(target_rule, id)));
                }
            }
        }
        Ok(apply_rule(rule, id))
    }

    /// Check a canonical identity against its namespace's id syntax.
    pub fn check(&self, curie: &Curie) -> Result<(), IdentityError> {
        let rule = self
            .lookup(&curie.namespace)
            .ok_or_else(|| IdentityError::UnknownNamespace(curie.namespace.clone()))?;
        if rule.pattern.is_match(&curie.local_id) {
            Ok(())
        } else {
            Err(IdentityError::MalformedIdentifier {
                namespace: curie.namespace.clone(),
                local_id: curie.local_id.clone(),
                reason: format!("does not match {}", rule.pattern.as_str()),
            })
        }
    }

    /// `normalize` then `check`.
    pub fn resolve(&self, namespace: &str, local_id: &str) -> Result<Curie, IdentityError> {
        if local_id.trim().is_empty() {
            return Err(IdentityError::MalformedIdentifier {
                namespace: namespace.to_string(),
                local_id: local_id.to_string(),
                reason: "empty identifier".into(),
            });
        }
        let curie = self.normalize(namespace, local_id)?;
        self.check(&curie)?;
        Ok(curie)
    }

    pub fn resolve_grounding(&self, grounding: &Grounding) -> Result<Curie, IdentityError> {
        self.resolve(&grounding.namespace, &grounding.local_id)
    }
}

fn strip_prefix<'a>(rule: &NamespaceRule, id: &'a str) -> &'a str {
    match &rule.embedded_prefix {
        Some(prefix) => match id.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) && id.len() > prefix.len() => {
                &id[prefix.len()..]
            }
            _ => id,
        },
        None => id,
    }
}

fn apply_rule(rule: &NamespaceRule, id: &str) -> Curie {
    let mut local_id = id.to_string();
    for fixup in &rule.fixups {
        match fixup {
            Fixup::Redirect { .. } => {}
            Fixup::StripIsoform { exempt_prefix } => {
                if !local_id.starts_with(exempt_prefix.as_str()) {
                    if let Some((base, _)) = local_id.split_once('-') {
                        local_id = base.to_string();
                    }
                }
            }
            Fixup::Replace { from, to } => {
                if local_id == *from {
                    local_id = to.clone();
                }
            }
        }
    }
    if let Some(width) = rule.pad_width {
        if !local_id.is_empty()
            && local_id.len() < width
            && local_id.bytes().all(|b| b.is_ascii_digit())
        {
            local_id = format!("{local_id:0>width$}");
        }
    }
    Curie { namespace: rule.canonical.clone(), local_id }
}
