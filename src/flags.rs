//! Flag-parsing mini-language for command argument strings.
//!
//! A command declares its grammar as an ordered list of tokens:
//! a bare `name` is a boolean presence flag, `name=` consumes the next
//! whitespace-delimited word, and `name==` greedily consumes everything up
//! to the next recognized flag or end of input. In the input a flag may be
//! spelled `-name`, `--name`, or `—name`; a lone `--` stops flag
//! interpretation for the rest of the line.

use std::collections::HashMap;

/// How much of the following text a flag consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagArity {
    /// Presence flag; consumes nothing.
    Bool,
    /// Consumes the next whitespace-delimited word.
    Word,
    /// Consumes everything up to the next recognized flag boundary.
    Greedy,
}

/// One declared flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagToken {
    pub name: String,
    pub arity: FlagArity,
}

impl FlagToken {
    /// Parse a grammar token: `name`, `name=`, or `name==`.
    pub fn parse(token: &str) -> Self {
        if let Some(name) = token.strip_suffix("==") {
            Self {
                name: name.to_string(),
                arity: FlagArity::Greedy,
            }
        } else if let Some(name) = token.strip_suffix('=') {
            Self {
                name: name.to_string(),
                arity: FlagArity::Word,
            }
        } else {
            Self {
                name: token.to_string(),
                arity: FlagArity::Bool,
            }
        }
    }

    /// Whether `word` is a dash-prefixed spelling of this flag.
    fn matches(&self, word: &str) -> bool {
        spelled_name(word) == Some(self.name.as_str())
    }
}

/// Strip one accepted dash prefix from a word, longest spelling first.
fn spelled_name(word: &str) -> Option<&str> {
    word.strip_prefix("--")
        .or_else(|| word.strip_prefix('—'))
        .or_else(|| word.strip_prefix('-'))
        .filter(|rest| !rest.is_empty())
}

/// An ordered flag grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSpec {
    tokens: Vec<FlagToken>,
}

impl FlagSpec {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| FlagToken::parse(t.as_ref()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[FlagToken] {
        &self.tokens
    }

    fn recognizes(&self, word: &str) -> bool {
        self.tokens.iter().any(|t| t.matches(word))
    }
}

/// A parsed flag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
}

/// Parsed flags keyed by declared name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagMap {
    values: HashMap<String, FlagValue>,
}

impl FlagMap {
    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    /// True when the flag was present in the input in any form.
    pub fn is_set(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(FlagValue::Bool(set)) => *set,
            Some(FlagValue::Text(_)) => true,
            None => false,
        }
    }

    /// The flag's text value, when it carried one.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FlagValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Split `raw` into flag values and remaining positional text.
///
/// Flags are located by first occurrence in document order; text between
/// flag boundaries that a flag does not consume stays positional, in its
/// original order. A flag declared but absent resolves to `Bool(false)`;
/// a value flag present with nothing following resolves to `Text("")`.
/// After a literal `--`, recognized flag spellings are swallowed but not
/// interpreted; everything else is positional. Whitespace between
/// positional words is collapsed to single spaces.
pub fn parse(raw: &str, spec: &FlagSpec) -> (FlagMap, String) {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let terminator = words
        .iter()
        .position(|w| *w == "--")
        .unwrap_or(words.len());

    let mut map = FlagMap::default();
    let mut found: Vec<(usize, &FlagToken)> = Vec::new();
    for token in &spec.tokens {
        match words[..terminator].iter().position(|w| token.matches(w)) {
            Some(idx) => found.push((idx, token)),
            None => {
                map.values
                    .insert(token.name.clone(), FlagValue::Bool(false));
            }
        }
    }
    found.sort_by_key(|(idx, _)| *idx);

    let mut positional: Vec<&str> = Vec::new();
    let first_flag = found.first().map_or(terminator, |(idx, _)| *idx);
    positional.extend(&words[..first_flag]);

    for (nth, (idx, token)) in found.iter().enumerate() {
        let boundary = found.get(nth + 1).map_or(terminator, |(next, _)| *next);
        let following = &words[idx + 1..boundary];
        match token.arity {
            FlagArity::Bool => {
                map.values.insert(token.name.clone(), FlagValue::Bool(true));
                positional.extend(following);
            }
            FlagArity::Word => match following.split_first() {
                Some((value, rest)) => {
                    map.values
                        .insert(token.name.clone(), FlagValue::Text((*value).to_string()));
                    positional.extend(rest);
                }
                None => {
                    map.values
                        .insert(token.name.clone(), FlagValue::Text(String::new()));
                }
            },
            FlagArity::Greedy => {
                map.values
                    .insert(token.name.clone(), FlagValue::Text(following.join(" ")));
            }
        }
    }

    if terminator < words.len() {
        for word in &words[terminator + 1..] {
            if !spec.recognizes(word) {
                positional.push(word);
            }
        }
    }

    (map, positional.join(" "))
}
