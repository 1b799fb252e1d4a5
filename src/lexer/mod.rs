//! The lexer: a table of `(name, pattern, skip)` rows compiled once, then driven
//! first-match-by-definition-order over the input.
//!
//! Grounded on `examples/original_source/toolchain/regx_engine/lexer.py`'s
//! `Token`/`LexerTable`/`Lexer.__call__` tokenize loop.
use crate::regex::{RegexError, RegexPattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// One row of a lexer table: a token name, its compiled pattern, and whether
/// matches of it are discarded (whitespace, comments) rather than emitted.
pub struct TokenRule {
    pub name: String,
    pub pattern: RegexPattern,
    pub skip: bool,
}

impl TokenRule {
    pub fn new(name: impl Into<String>, pattern: &str, skip: bool) -> Result<Self, crate::regex::RegexError> {
        Ok(Self {
            name: name.into(),
            pattern: RegexPattern::compile(pattern)?,
            skip,
        })
    }
}

/// An ordered table of lexer rules plus the designated end-of-input symbol name.
/// Definition order is significant: it *is* the disambiguation rule,
/// since the engine has no longest-match-across-patterns behavior.
pub struct LexerTable {
    pub rules: Vec<TokenRule>,
    pub eof_symbol: String,
}

impl LexerTable {
    pub fn new(eof_symbol: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            eof_symbol: eof_symbol.into(),
        }
    }

    pub fn push(&mut self, rule: TokenRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// The on-disk schema for a generated lexer program: a lexer
    /// program embedding a serialized table. `RegexPattern` itself holds a
    /// lazily-built DFA behind a `OnceCell` and isn't serde-friendly, so this
    /// serializes the table's *source* definitions and recompiles them on
    /// load - what matters on round-trip is "same table", not "same
    /// bytes", and recompilation is deterministic.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<bincode::ErrorKind>> {
        bincode::serialize(&self.as_def())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LexerTableCodecError> {
        let def: LexerTableDef = bincode::deserialize(bytes).map_err(LexerTableCodecError::Bincode)?;
        def.compile().map_err(LexerTableCodecError::Regex)
    }

    fn as_def(&self) -> LexerTableDef {
        LexerTableDef {
            rules: self
                .rules
                .iter()
                .map(|r| (r.name.clone(), r.pattern.source().to_string(), r.skip))
                .collect(),
            eof_symbol: self.eof_symbol.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LexerTableDef {
    rules: Vec<(String, String, bool)>,
    eof_symbol: String,
}

impl LexerTableDef {
    fn compile(self) -> Result<LexerTable, RegexError> {
        let mut table = LexerTable::new(self.eof_symbol);
        for (name, pattern, skip) in self.rules {
            table.push(TokenRule::new(name, &pattern, skip)?);
        }
        Ok(table)
    }
}

#[derive(Debug)]
pub enum LexerTableCodecError {
    Bincode(Box<bincode::ErrorKind>),
    Regex(RegexError),
}

impl Display for LexerTableCodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LexerTableCodecError::Bincode(e) => write!(f, "{}", e),
            LexerTableCodecError::Regex(e) => write!(f, "{}", e),
        }
    }
}
impl std::error::Error for LexerTableCodecError {}

/// `(name, lexeme, extra, line, column)`. Equality and hash are by
/// `name` only, so a `Token` can stand in for a grammar terminal during parsing.
#[derive(Debug, Clone)]
pub struct Token {
    pub name: String,
    pub lexeme: String,
    pub groups: BTreeMap<String, (usize, usize)>,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn eof(name: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            name: name.into(),
            lexeme: String::new(),
            groups: BTreeMap::new(),
            line,
            column,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Token {}
impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub character: char,
}

impl LexError {
    pub fn new(line: usize, column: usize, character: char) -> Self {
        Self {
            line,
            column,
            character,
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LexError: unexpected character '{}' at {}:{}",
            self.character, self.line, self.column
        )
    }
}

impl std::error::Error for LexError {}

/// Tokenize `input` against `table`: at each position, try every rule in
/// definition order and take the first that matches, track line/column,
/// drop skip-flagged tokens, and append an EOF sentinel.
pub fn tokenize(table: &LexerTable, input: &str) -> Result<Vec<Token>, LexError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line = 1usize;
    let mut column = 1usize;

    while pos < chars.len() {
        let hit = table.rules.iter().find_map(|rule| {
            rule.pattern
                .find_at(&chars, pos)
                .filter(|m| m.end > pos)
                .map(|m| (rule, m))
        });

        let Some((rule, m)) = hit else {
            return Err(LexError::new(line, column, chars[pos]));
        };

        let lexeme: String = chars[pos..m.end].iter().collect();

        if !rule.skip {
            tokens.push(Token {
                name: rule.name.clone(),
                lexeme: lexeme.clone(),
                groups: m.groups,
                line,
                column,
            });
        }

        for c in lexeme.chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        pos = m.end;
    }

    tokens.push(Token::eof(table.eof_symbol.clone(), line, column));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> LexerTable {
        let mut table = LexerTable::new("EOF");
        table
            .push(TokenRule::new("WS", "[ \\t\\n]+", true).unwrap())
            .push(TokenRule::new("IDENT", "[A-Za-z][A-Za-z0-9_]*", false).unwrap())
            .push(TokenRule::new("NUM", "[0-9]+", false).unwrap())
            .push(TokenRule::new("PLUS", "\\+", false).unwrap());
        table
    }

    #[test]
    fn emits_tokens_in_order_and_skips_whitespace() {
        let table = sample_table();
        let tokens = tokenize(&table, "a1 + 23").unwrap();
        let names: Vec<&str> = tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["IDENT", "PLUS", "NUM", "EOF"]);
        assert_eq!(tokens[0].lexeme, "a1");
    }

    #[test]
    fn tracks_line_and_column() {
        let table = sample_table();
        let tokens = tokenize(&table, "a\nb").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[1].column, 1);
    }

    #[test]
    fn unexpected_character_is_a_lex_error() {
        let table = sample_table();
        let err = tokenize(&table, "a1 $").unwrap_err();
        assert_eq!(err.character, '$');
    }

    #[test]
    fn first_match_wins_over_longest_match() {
        // "if" could lex as IDENT ("if") or as a hypothetical keyword rule; since
        // priority is definition order, putting IDENT first means a
        // keyword-looking identifier lexes as IDENT, not as a keyword.
        let mut table = LexerTable::new("EOF");
        table
            .push(TokenRule::new("IDENT", "[A-Za-z]+", false).unwrap())
            .push(TokenRule::new("IF", "if", false).unwrap());
        let tokens = tokenize(&table, "if").unwrap();
        assert_eq!(tokens[0].name, "IDENT");
    }

    #[test]
    fn token_stream_matches_its_json_snapshot() {
        // `serde_json::Value` as an untyped fixture format, the way the
        // teacher's own benchmark test reads JSON fixtures rather than
        // deriving `Serialize` on its domain types.
        let table = sample_table();
        let tokens = tokenize(&table, "a1 + 23").unwrap();
        let actual: serde_json::Value = tokens
            .iter()
            .map(|t| serde_json::json!({"name": t.name, "lexeme": t.lexeme, "line": t.line}))
            .collect();
        let expected = serde_json::json!([
            {"name": "IDENT", "lexeme": "a1", "line": 1},
            {"name": "PLUS", "lexeme": "+", "line": 1},
            {"name": "NUM", "lexeme": "23", "line": 1},
            {"name": "EOF", "lexeme": "", "line": 1},
        ]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn lexer_table_round_trips_through_a_file() {
        use std::io::{Read, Write};

        let table = sample_table();
        let bytes = table.to_bytes().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        let mut reread = Vec::new();
        file.reopen().unwrap().read_to_end(&mut reread).unwrap();

        let restored = LexerTable::from_bytes(&reread).unwrap();
        assert_eq!(restored.eof_symbol, "EOF");
        let tokens = tokenize(&restored, "a1 + 23").unwrap();
        let names: Vec<&str> = tokens.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["IDENT", "PLUS", "NUM", "EOF"]);
    }
}
