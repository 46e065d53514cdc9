//! Key Pattern Module
//!
//! Key matchers for bulk deletion.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

// == Key Pattern ==
/// Selects keys for `delete_matched`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// Keys starting with the given text
    Prefix(String),
    /// Redis-style glob: `*` matches any run, `?` any one char, `\` escapes
    Glob(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn tokenize(glob: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(glob.len());
    let mut chars = glob.chars();

    while let Some(c) = chars.next() {
        let token = match c {
            '*' => Token::AnyRun,
            '?' => Token::AnyOne,
            // A trailing backslash matches itself
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            c => Token::Literal(c),
        };
        // Consecutive stars behave as one
        if token == Token::AnyRun && tokens.last() == Some(&Token::AnyRun) {
            continue;
        }
        tokens.push(token);
    }

    tokens
}

fn glob_matches(tokens: &[Token], key: &str) -> bool {
    let chars: Vec<char> = key.chars().collect();
    let (mut t, mut k) = (0, 0);
    // Position of the last star and the key index it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while k < chars.len() {
        match tokens.get(t) {
            Some(Token::AnyRun) => {
                backtrack = Some((t, k));
                t += 1;
            }
            Some(Token::AnyOne) => {
                t += 1;
                k += 1;
            }
            Some(Token::Literal(c)) if *c == chars[k] => {
                t += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    t = star + 1;
                    k = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|token| *token == Token::AnyRun)
}

impl KeyPattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn glob(glob: impl Into<String>) -> Self {
        KeyPattern::Glob(glob.into())
    }

    /// Compiles the pattern into a reusable matcher.
    pub fn matcher(&self) -> KeyMatcher<'_> {
        let kind = match self {
            KeyPattern::Prefix(prefix) => MatcherKind::Prefix(prefix),
            KeyPattern::Glob(glob) => MatcherKind::Glob(tokenize(glob)),
        };
        KeyMatcher { kind }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.matcher().matches(key)
    }
}

/// A pattern prepared for matching many keys.
#[derive(Debug)]
pub struct KeyMatcher<'a> {
    kind: MatcherKind<'a>,
}

#[derive(Debug)]
enum MatcherKind<'a> {
    Prefix(&'a str),
    Glob(Vec<Token>),
}

impl KeyMatcher<'_> {
    pub fn matches(&self, key: &str) -> bool {
        match &self.kind {
            MatcherKind::Prefix(prefix) => key.starts_with(prefix),
            MatcherKind::Glob(tokens) => glob_matches(tokens, key),
        }
    }
}

impl FromStr for KeyPattern {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyPattern::Glob(s.to_string()))
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Prefix(prefix) => write!(f, "prefix:{}", prefix),
            KeyPattern::Glob(glob) => write!(f, "glob:{}", glob),
        }
    }
}
