//! Wildcard template compilation.
//!
//! A template is an index name with two kinds of wildcards: `*` stays a
//! wildcard in every title derived from the template, `?` is replaced by the
//! text it matched in a concrete index name. Both compile to capturing groups,
//! in template order. Every group is lazy except the last one, so interior
//! wildcards stop at the first separator while the trailing wildcard absorbs
//! the rest of the name (usually a date suffix).

use regex::Regex;

use crate::error::PatternError;

/// Wildcard that remains a wildcard in synthesized titles.
pub const EXPAND_WILDCARD: char = '*';
/// Wildcard whose matched text is copied into synthesized titles.
pub const CAPTURE_WILDCARD: char = '?';

const LAZY_GROUP: &str = "(.*?)";
const GREEDY_GROUP: &str = "(.*)";

/// Role of a capturing group in a compiled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    /// Matched text is substituted literally into the title (`?`).
    Capture,
    /// Position stays a wildcard in the title (`*`).
    Expand,
}

impl GroupRole {
    fn of(c: char) -> Option<Self> {
        match c {
            CAPTURE_WILDCARD => Some(GroupRole::Capture),
            EXPAND_WILDCARD => Some(GroupRole::Expand),
            _ => None,
        }
    }
}

/// A template compiled once at load time and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    raw: String,
    match_expr: Regex,
    group_roles: Vec<GroupRole>,
    normalized_title: String,
}

impl CompiledPattern {
    /// Compile a raw template such as `logs-?-*`.
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }

        let match_expr = Regex::new(&wildcard_to_regex(raw)).map_err(|source| {
            PatternError::Regex {
                pattern: raw.to_string(),
                source,
            }
        })?;

        Ok(Self {
            raw: raw.to_string(),
            match_expr,
            group_roles: raw.chars().filter_map(GroupRole::of).collect(),
            normalized_title: normalize_title(raw),
        })
    }

    /// The template as configured.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Expression with one capturing group per wildcard.
    pub fn match_expr(&self) -> &Regex {
        &self.match_expr
    }

    /// One role per capturing group, left to right.
    pub fn group_roles(&self) -> &[GroupRole] {
        &self.group_roles
    }

    /// The template with every `?` rendered as `*`.
    pub fn normalized_title(&self) -> &str {
        &self.normalized_title
    }
}

/// Translate a wildcard string into an (unanchored) regular expression.
///
/// Literal characters are escaped, `*` and `?` both become capturing groups,
/// all lazy but the last.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let wildcards = pattern.chars().filter(|c| GroupRole::of(*c).is_some()).count();
    let mut expr = String::with_capacity(pattern.len() * 2);
    let mut seen = 0;
    let mut buf = [0u8; 4];

    for c in pattern.chars() {
        if GroupRole::of(c).is_some() {
            seen += 1;
            expr.push_str(if seen == wildcards { GREEDY_GROUP } else { LAZY_GROUP });
        } else {
            expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }

    expr
}

/// Render capture wildcards as plain wildcards.
pub fn normalize_title(raw: &str) -> String {
    raw.replace(CAPTURE_WILDCARD, &EXPAND_WILDCARD.to_string())
}
