//! Descriptor tag language
//!
//! Descriptors are plain text. Three kinds of lines are special:
//!
//! | Line | Meaning |
//! |------|---------|
//! | `@name args...` | Directive, removed from the body |
//! | `@: anything` | Comment, dropped |
//! | `@@text` | Escaped sigil, kept in the body as `@text` |
//!
//! Every other line is kept verbatim. What remains after parsing is the
//! archive's published description.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static DIRECTIVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@(\w+)(?:\s+(.*))?$").unwrap());
static COMMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*@:").unwrap());
static ESCAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)@@(.*)$").unwrap());

static INTEGER_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[0-9]+$").unwrap());
static FLOAT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").unwrap());

#[derive(Debug, Error, Clone, PartialEq)]
#[error(
    "Directive '{}' on line {} has {} argument(s), but argument {} was requested",
    .directive,
    .line + 1,
    .count,
    .index + 1
)]
pub struct ArityError {
    pub directive: String,
    pub line: usize,
    pub index: usize,
    pub count: usize,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("Unknown directive: {0}")]
pub struct UnknownDirective(pub String);

/// A typed directive argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Argument {
    /// Coerces a single token
    pub fn from_token(token: &str) -> Self {
        if INTEGER_PATTERN.is_match(token) {
            // Out-of-range integers stay textual
            if let Ok(value) = token.parse() {
                return Argument::Integer(value);
            }
        } else if FLOAT_PATTERN.is_match(token) {
            if let Ok(value) = token.parse() {
                return Argument::Float(value);
            }
        }

        Argument::Text(token.to_string())
    }

    /// Returns the text of a `Text` argument
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(v) => Some(v),
            Argument::Integer(_) | Argument::Float(_) => None,
        }
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Integer(_) => "integer",
            Argument::Float(_) => "float",
            Argument::Text(_) => "text",
        }
    }
}

/// The directives a descriptor may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// `ver <version>`
    Version,
    /// `include <prefix>`
    Include,
    /// `exclude <prefix>`
    Exclude,
    /// `external <library>`
    External,
    /// `requires <archive>`
    Requires,
}

impl DirectiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::Version => "ver",
            DirectiveKind::Include => "include",
            DirectiveKind::Exclude => "exclude",
            DirectiveKind::External => "external",
            DirectiveKind::Requires => "requires",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectiveKind {
    type Err = UnknownDirective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ver" => Ok(DirectiveKind::Version),
            "include" => Ok(DirectiveKind::Include),
            "exclude" => Ok(DirectiveKind::Exclude),
            "external" => Ok(DirectiveKind::External),
            "requires" => Ok(DirectiveKind::Requires),
            _ => Err(UnknownDirective(s.to_string())),
        }
    }
}

/// A single `@name args...` line
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    name: String,
    line: usize,
    tokens: Vec<String>,
    arguments: Vec<Argument>,
}

impl Directive {
    /// Creates a directive from its name and the rest of the line
    pub fn new(name: impl Into<String>, rest: &str, line: usize) -> Self {
        let tokens: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        let arguments = tokens.iter().map(|t| Argument::from_token(t)).collect();

        Self {
            name: name.into(),
            line,
            tokens,
            arguments,
        }
    }

    /// The name as written in the descriptor
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0-based line index in the descriptor
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Resolves the directive name to a known kind
    pub fn kind(&self) -> Result<DirectiveKind, UnknownDirective> {
        self.name.parse()
    }

    /// Returns the typed argument at `index`
    pub fn arg(&self, index: usize) -> Result<&Argument, ArityError> {
        self.arguments.get(index).ok_or_else(|| self.arity_error(index))
    }

    /// Returns the argument at `index` exactly as written
    ///
    /// Versions and prefixes use this so `1.10` is not read back as `1.1`.
    pub fn text(&self, index: usize) -> Result<&str, ArityError> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.arity_error(index))
    }

    fn arity_error(&self, index: usize) -> ArityError {
        ArityError {
            directive: self.name.clone(),
            line: self.line,
            index,
            count: self.arguments.len(),
        }
    }
}

/// Result of parsing a descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDescriptor {
    /// Directives in file order
    pub directives: Vec<Directive>,

    /// Residual prose with comments removed and escapes resolved
    pub body: String,
}

/// Parses descriptor text into directives and body text
pub fn parse(text: &str) -> ParsedDescriptor {
    let mut parsed = ParsedDescriptor::default();

    for (index, line) in text.lines().enumerate() {
        if let Some(caps) = DIRECTIVE_PATTERN.captures(line) {
            let rest = caps.get(2).map_or("", |m| m.as_str());
            parsed.directives.push(Directive::new(&caps[1], rest, index));
            continue;
        }

        if COMMENT_PATTERN.is_match(line) {
            continue;
        }

        if let Some(caps) = ESCAPE_PATTERN.captures(line) {
            parsed.body.push_str(&caps[1]);
            parsed.body.push('@');
            parsed.body.push_str(&caps[2]);
            parsed.body.push('\n');
            continue;
        }

        parsed.body.push_str(line);
        parsed.body.push('\n');
    }

    parsed
}
