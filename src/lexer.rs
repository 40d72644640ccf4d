//! Lexical analysis for the shell: splitting one input line into an argument vector.
//!
//! The input language is deliberately tiny — no quoting, escaping, or
//! substitution. A line is a sequence of tokens separated by runs of the
//! space character, and both the line length and the token count are bounded.

/// Maximum number of characters of an input line that are considered.
/// Anything beyond this is dropped before tokenization.
pub const MAX_LINE_LEN: usize = 200;

/// Maximum number of tokens in an argument vector. Tokens past the cap are
/// silently dropped; this is a documented limitation, not an error.
pub const MAX_ARGS: usize = 20;

/// An argument vector produced from one input line.
///
/// Owned by a single loop iteration: the interpreter builds one `Argv` per
/// line and drops it once dispatch completes. An empty vector is legal and
/// means "nothing was entered".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Argv {
    tokens: Vec<String>,
}

impl Argv {
    /// True when the line contained no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens, command name included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// The command name (`argv[0]`), if any.
    pub fn name(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Arguments after the command name.
    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    /// All tokens in order, command name first.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Split a raw input line into an [`Argv`].
///
/// Splits on runs of the space character. Empty or space-only input yields
/// an empty vector. The line is truncated to [`MAX_LINE_LEN`] characters and
/// the result is capped at [`MAX_ARGS`] tokens.
pub fn tokenize(line: &str) -> Argv {
    let bounded: String = line.chars().take(MAX_LINE_LEN).collect();
    let tokens = bounded
        .split(' ')
        .filter(|t| !t.is_empty())
        .take(MAX_ARGS)
        .map(str::to_owned)
        .collect();
    Argv { tokens }
}
