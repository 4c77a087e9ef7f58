// Argument grammar for chat commands.
//
// Each parameter type is a small hand-written scanner that consumes a prefix
// of the remaining text. A scanner either consumes a whole token and returns
// the rest, or consumes nothing at all.

use std::fmt;

// ============================================================================
// PARAMETER DEFINITIONS
// ============================================================================

const TRUE_WORDS: [&str; 3] = ["on", "true", "enabled"];
const FALSE_WORDS: [&str; 3] = ["off", "false", "disabled"];

/// The shape of value a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// A single non-whitespace token.
    String,
    /// A run of decimal digits that fits in an `i64`.
    Integer,
    /// One of `on`/`true`/`enabled` or `off`/`false`/`disabled`.
    #[allow(dead_code)] // No shipped command takes a flag yet
    Boolean,
    /// A user name, with an optional leading `@` that is dropped.
    Username,
    /// Everything that is left. Only valid as the last parameter.
    Variadic,
}

/// One expected argument of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub required: bool,
    /// Shown in usage replies instead of the parameter name.
    pub hint: Option<&'static str>,
}

impl Parameter {
    pub fn required(name: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            hint: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    /// `<name>` for required parameters, `[name]` for optional ones.
    pub fn usage(&self) -> String {
        let label = self.hint.unwrap_or(self.name);
        if self.required {
            format!("<{}>", label)
        } else {
            format!("[{}]", label)
        }
    }
}

// ============================================================================
// PARSED VALUES
// ============================================================================

/// A typed argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Username(String),
    Variadic(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::String(s) | ArgValue::Username(s) | ArgValue::Variadic(s) => {
                write!(f, "{}", s)
            }
            ArgValue::Integer(n) => write!(f, "{}", n),
            ArgValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// The result of applying one parameter to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArgument {
    pub name: &'static str,
    pub value: Option<ArgValue>,
}

/// The fixed-length argument vector handed to a command handler.
///
/// There is exactly one entry per declared parameter, in declaration order,
/// whether or not the parameter was found in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    args: Vec<ParsedArgument>,
}

impl Arguments {
    pub fn new(args: Vec<ParsedArgument>) -> Self {
        Self { args }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .and_then(|arg| arg.value.as_ref())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ArgValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Textual value of a String, Username or Variadic argument.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::String(s) | ArgValue::Username(s) | ArgValue::Variadic(s)) => {
                Some(s.as_str())
            }
            _ => None,
        }
    }
}

// ============================================================================
// SCANNERS
// ============================================================================

/// Apply `parameter` to the start of `text`.
///
/// On success the remainder has its leading whitespace trimmed. On failure
/// the argument is absent and the remainder is `text` itself, so a missing
/// optional parameter never disturbs the parameters after it.
pub fn parse<'a>(parameter: &Parameter, text: &'a str) -> (ParsedArgument, &'a str) {
    let input = text.trim_start();

    let scanned = match parameter.kind {
        ParameterKind::String => {
            scan_token(input).map(|(tok, rest)| (ArgValue::String(tok.to_string()), rest))
        }
        ParameterKind::Integer => {
            scan_integer(input).map(|(n, rest)| (ArgValue::Integer(n), rest))
        }
        ParameterKind::Boolean => {
            scan_boolean(input).map(|(b, rest)| (ArgValue::Boolean(b), rest))
        }
        ParameterKind::Username => {
            let unprefixed = input.strip_prefix('@').unwrap_or(input);
            scan_token(unprefixed)
                .map(|(tok, rest)| (ArgValue::Username(tok.to_string()), rest))
        }
        ParameterKind::Variadic => {
            if input.is_empty() {
                None
            } else {
                Some((ArgValue::Variadic(input.to_string()), ""))
            }
        }
    };

    match scanned {
        Some((value, rest)) => (
            ParsedArgument {
                name: parameter.name,
                value: Some(value),
            },
            rest.trim_start(),
        ),
        None => (
            ParsedArgument {
                name: parameter.name,
                value: None,
            },
            text,
        ),
    }
}

/// Parse every parameter left to right.
pub fn parse_all(parameters: &[Parameter], text: &str) -> Arguments {
    let mut remaining = text;
    let mut args = Vec::with_capacity(parameters.len());

    for parameter in parameters {
        let (arg, rest) = parse(parameter, remaining);
        remaining = rest;
        args.push(arg);
    }

    Arguments::new(args)
}

fn scan_token(input: &str) -> Option<(&str, &str)> {
    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    Some(input.split_at(end))
}

fn scan_integer(input: &str) -> Option<(i64, &str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let (digits, rest) = input.split_at(end);
    // Overflow is a parse failure, not a wrap.
    digits.parse::<i64>().ok().map(|n| (n, rest))
}

fn scan_boolean(input: &str) -> Option<(bool, &str)> {
    let (token, rest) = scan_token(input)?;
    if TRUE_WORDS.contains(&token) {
        Some((true, rest))
    } else if FALSE_WORDS.contains(&token) {
        Some((false, rest))
    } else {
        None
    }
}
