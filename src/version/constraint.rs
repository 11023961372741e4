//! Version constraint expressions.
//!
//! Supported forms: `*`, exact versions, comparisons (`>=1.0`, `!=2.0`),
//! caret (`^1.2`), tilde (`~1.2.3`), wildcards (`1.2.*`), hyphen ranges
//! (`1.0 - 2.0`), conjunctions (space or comma) and disjunctions (`||`).

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

use super::Version;

static OR_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|\|?\s*").expect("or separator pattern is valid"));

static STABILITY_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)@(?:stable|rc|beta|alpha|dev)$").expect("stability flag pattern is valid")
});

static ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^v?[x*](?:\.[x*])*$").expect("any pattern is valid"));

static PARTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(.*)$")
        .expect("partial version pattern is valid")
});

static WILDCARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.[x*])+$")
        .expect("wildcard pattern is valid")
});

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(<>|!=|>=?|<=?|==?)?\s*(.+)$").expect("comparison pattern is valid")
});

const OPERATORS: &[&str] = &["<>", "!=", ">=", "<=", "==", ">", "<", "=", "^", "~", "~>"];

/// Errors produced while parsing versions and constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("Invalid version constraint \"{expression}\": {reason}")]
    InvalidConstraintExpression { expression: String, reason: String },

    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "<>" | "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            _ => Operator::Eq,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Any,
    Compare(Operator, Version),
    All(Vec<Node>),
    AnyOf(Vec<Node>),
}

impl Node {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Node::Any => true,
            Node::Compare(op, bound) => {
                if bound.is_branch() || version.is_branch() {
                    return match op {
                        Operator::Eq => bound == version,
                        Operator::Ne => bound != version,
                        _ => false,
                    };
                }
                match op {
                    Operator::Eq => version == bound,
                    Operator::Ne => version != bound,
                    Operator::Lt => version < bound,
                    Operator::Le => version <= bound,
                    Operator::Gt => version > bound,
                    Operator::Ge => version >= bound,
                }
            }
            Node::All(nodes) => nodes.iter().all(|n| n.matches(version)),
            Node::AnyOf(nodes) => nodes.iter().any(|n| n.matches(version)),
        }
    }

    fn from_nodes(mut nodes: Vec<Node>, all: bool) -> Node {
        if nodes.len() == 1 {
            return nodes.remove(0);
        }
        if all {
            Node::All(nodes)
        } else {
            Node::AnyOf(nodes)
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Any => write!(f, "*"),
            Node::Compare(op, version) => write!(f, "{} {}", op.symbol(), version.normalized()),
            Node::All(nodes) | Node::AnyOf(nodes) => {
                let glue = if matches!(self, Node::All(_)) { " " } else { " || " };
                let inner: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
                write!(f, "[{}]", inner.join(glue))
            }
        }
    }
}

/// A parsed, immutable version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pretty: String,
    node: Node,
}

impl VersionConstraint {
    /// The unconstrained constraint, matching every version.
    pub fn any() -> Self {
        Self {
            pretty: "*".to_string(),
            node: Node::Any,
        }
    }

    /// Parse a constraint expression.
    pub fn parse(expression: &str) -> Result<Self, ConstraintError> {
        let pretty = expression.trim();
        if pretty.is_empty() {
            return Ok(Self::any());
        }

        let invalid = |reason: String| ConstraintError::InvalidConstraintExpression {
            expression: expression.to_string(),
            reason,
        };

        let mut alternatives = Vec::new();
        for alternative in OR_SEPARATOR.split(pretty) {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(invalid("empty alternative".to_string()));
            }
            let mut conjunction = Vec::new();
            for atom in split_conjunction(alternative).map_err(&invalid)? {
                conjunction.extend(parse_atom(&atom).map_err(&invalid)?);
            }
            alternatives.push(Node::from_nodes(conjunction, true));
        }

        Ok(Self {
            pretty: pretty.to_string(),
            node: Node::from_nodes(alternatives, false),
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.node.matches(version)
    }

    pub fn is_any(&self) -> bool {
        self.node == Node::Any
    }

    pub fn pretty(&self) -> &str {
        &self.pretty
    }

    /// Normalized form, e.g. `[>= 1.0.0.0-dev < 2.0.0.0-dev]`.
    pub fn normalized(&self) -> String {
        self.node.to_string()
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty)
    }
}

impl FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

enum Atom {
    Single(String),
    Range(String, String),
}

/// Split an alternative into atoms, joining detached operators (`>= 1.0`)
/// and recognizing hyphen ranges (`1.0 - 2.0`).
fn split_conjunction(alternative: &str) -> Result<Vec<Atom>, String> {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut atoms = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if tokens.get(i + 1) == Some(&"-") {
            let upper = tokens
                .get(i + 2)
                .ok_or_else(|| format!("missing upper bound after \"{} -\"", token))?;
            atoms.push(Atom::Range(token.to_string(), upper.to_string()));
            i += 3;
        } else if OPERATORS.contains(&token) {
            let operand = tokens
                .get(i + 1)
                .ok_or_else(|| format!("operator \"{}\" has no version", token))?;
            atoms.push(Atom::Single(format!("{}{}", token, operand)));
            i += 2;
        } else {
            atoms.push(Atom::Single(token.to_string()));
            i += 1;
        }
    }
    Ok(atoms)
}

fn parse_atom(atom: &Atom) -> Result<Vec<Node>, String> {
    match atom {
        Atom::Single(text) => parse_single(text),
        Atom::Range(lower, upper) => parse_range(lower, upper),
    }
}

fn strip_flags(text: &str) -> &str {
    let text = text.split('#').next().unwrap_or(text);
    match STABILITY_FLAG.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

fn parse_version(text: &str) -> Result<Version, String> {
    Version::parse(text).map_err(|e| e.to_string())
}

/// Numeric components of a partial version and how many were written.
fn partial(text: &str) -> Option<([u64; 4], usize, String)> {
    let caps = PARTIAL.captures(text)?;
    let mut parts = [0u64; 4];
    let mut given = 0;
    for (slot, part) in parts.iter_mut().enumerate() {
        if let Some(m) = caps.get(slot + 1) {
            *part = m.as_str().parse().ok()?;
            given = slot + 1;
        }
    }
    let rest = caps.get(5).map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((parts, given, rest))
}

/// Increment the component at `position` (1-based) and zero everything after.
fn bump(mut parts: [u64; 4], position: usize) -> Result<[u64; 4], String> {
    let index = position.clamp(1, 4) - 1;
    parts[index] = parts[index]
        .checked_add(1)
        .ok_or_else(|| format!("version component {} is too large", parts[index]))?;
    for part in parts.iter_mut().skip(index + 1) {
        *part = 0;
    }
    Ok(parts)
}

/// Lower bound `>= version`, widened to include pre-releases of a plain release.
fn lower_bound(version: Version) -> Node {
    match version.parts() {
        Some(parts) if version.is_plain_release() => {
            Node::Compare(Operator::Ge, Version::dev_floor(parts))
        }
        _ => Node::Compare(Operator::Ge, version),
    }
}

fn parse_single(text: &str) -> Result<Vec<Node>, String> {
    let text = strip_flags(text);
    if text.is_empty() || ANY.is_match(text) {
        return Ok(vec![Node::Any]);
    }

    if let Some(rest) = text.strip_prefix('^') {
        let (parts, given, _) =
            partial(rest).ok_or_else(|| format!("invalid caret constraint \"{}\"", text))?;
        let version = parse_version(rest)?;
        let position = if parts[0] != 0 || given < 2 {
            1
        } else if parts[1] != 0 || given < 3 {
            2
        } else {
            3
        };
        return Ok(vec![
            lower_bound(version),
            Node::Compare(Operator::Lt, Version::dev_floor(bump(parts, position)?)),
        ]);
    }

    if let Some(rest) = text.strip_prefix("~>").or_else(|| text.strip_prefix('~')) {
        let (parts, given, _) =
            partial(rest).ok_or_else(|| format!("invalid tilde constraint \"{}\"", text))?;
        let version = parse_version(rest)?;
        let position = given.saturating_sub(1).max(1);
        return Ok(vec![
            lower_bound(version),
            Node::Compare(Operator::Lt, Version::dev_floor(bump(parts, position)?)),
        ]);
    }

    if let Some(caps) = WILDCARD.captures(text) {
        let mut parts = [0u64; 4];
        let mut position = 0;
        for (slot, part) in parts.iter_mut().enumerate().take(3) {
            if let Some(m) = caps.get(slot + 1) {
                *part = m
                    .as_str()
                    .parse()
                    .map_err(|_| format!("invalid wildcard constraint \"{}\"", text))?;
                position = slot + 1;
            }
        }
        let upper = Node::Compare(Operator::Lt, Version::dev_floor(bump(parts, position)?));
        if parts == [0; 4] {
            return Ok(vec![upper]);
        }
        return Ok(vec![
            Node::Compare(Operator::Ge, Version::dev_floor(parts)),
            upper,
        ]);
    }

    let caps = COMPARISON
        .captures(text)
        .ok_or_else(|| format!("cannot parse \"{}\"", text))?;
    let operator = Operator::from_symbol(caps.get(1).map_or("", |m| m.as_str()));
    let version = parse_version(caps.get(2).map_or("", |m| m.as_str()))?;

    // "<1.0" excludes 1.0 pre-releases and ">=1.0" includes them.
    let node = match (operator, version.parts()) {
        (Operator::Lt, Some(parts)) if version.is_plain_release() => {
            Node::Compare(Operator::Lt, Version::dev_floor(parts))
        }
        (Operator::Ge, _) => lower_bound(version),
        _ => Node::Compare(operator, version),
    };
    Ok(vec![node])
}

fn parse_range(lower: &str, upper: &str) -> Result<Vec<Node>, String> {
    let lower = strip_flags(lower);
    let upper = strip_flags(upper);

    let low = lower_bound(parse_version(lower)?);

    let (parts, given, rest) =
        partial(upper).ok_or_else(|| format!("invalid range bound \"{}\"", upper))?;
    let high = if given >= 3 || !rest.is_empty() {
        Node::Compare(Operator::Le, parse_version(upper)?)
    } else {
        Node::Compare(Operator::Lt, Version::dev_floor(bump(parts, given)?))
    };
    Ok(vec![low, high])
}
