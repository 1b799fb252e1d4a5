//! Context-free grammar description with an algebraic production-building
//! notation, plus FIRST-set computation. Grounded on
//! `examples/original_source/toolchain/frontend_generator/grammar.py`'s
//! `Symbol`/`Terminal`/`NonTerminal`/`SentenceForm`/`Production`/`Grammar`
//! classes and `_get_first`.
//!
//! The original overloads Python's `>` to register a production as a side effect
//! of `NonTerminal.__gt__`. Rust has no side-effecting `>` (it is `PartialOrd`,
//! and abusing it for mutation would be surprising); the nearest idiomatic
//! equivalent used by real `>>`-as-DSL-builder crates is `Shr`, so production
//! definition here reads `nt >> b + c + d / attribute` instead of `nt > ...`.
//! Everything else - `+` for concatenation, `|` for alternation, `/` for
//! attribute attachment - carries over directly.
//!
//! One precedence gotcha worth calling out: Rust gives `>>` higher precedence
//! than `|`, the reverse of what the notation wants. `nt >> a | b` parses as
//! `(nt >> a) | b`, not `nt >> (a | b)`. Any multi-alternative production needs
//! explicit parens around the alternation: `nt >> (a | b | c)`.
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// A grammar symbol. Plain data (no builder state) so it can be used pervasively
/// - in productions, LR items, lookahead sets - without dragging along a
/// reference to the grammar that declared it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbol {
    Terminal(String),
    NonTerminal(String),
    Epsilon,
    Eof,
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Terminal(n) | Symbol::NonTerminal(n) => n,
            Symbol::Epsilon => "\u{20ac}",
            Symbol::Eof => "$",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_) | Symbol::Eof | Symbol::Epsilon)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A (possibly empty) sequence of symbols - a production's right-hand side, or
/// an alternative of one. Epsilon is filtered out of any multi-symbol sentence
/// (`x + epsilon == x`), matching the original's `SentenceForm.__new__`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SentenceForm(pub Vec<Symbol>);

impl SentenceForm {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        if symbols.len() <= 1 {
            Self(symbols)
        } else {
            Self(
                symbols
                    .into_iter()
                    .filter(|s| !matches!(s, Symbol::Epsilon))
                    .collect(),
            )
        }
    }
}

impl std::ops::Add<Symbol> for Symbol {
    type Output = SentenceForm;
    fn add(self, rhs: Symbol) -> SentenceForm {
        SentenceForm::new(vec![self, rhs])
    }
}
impl std::ops::Add<Symbol> for SentenceForm {
    type Output = SentenceForm;
    fn add(mut self, rhs: Symbol) -> SentenceForm {
        self.0.push(rhs);
        SentenceForm::new(self.0)
    }
}
impl std::ops::Add<SentenceForm> for Symbol {
    type Output = SentenceForm;
    fn add(self, rhs: SentenceForm) -> SentenceForm {
        let mut v = vec![self];
        v.extend(rhs.0);
        SentenceForm::new(v)
    }
}
impl std::ops::Add<SentenceForm> for SentenceForm {
    type Output = SentenceForm;
    fn add(mut self, rhs: SentenceForm) -> SentenceForm {
        self.0.extend(rhs.0);
        SentenceForm::new(self.0)
    }
}

/// How to build the reduced AST node from a production's right-hand side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribute {
    /// project the i-th RHS symbol's value.
    Project(usize),
    /// build an AST node of kind `Ctor` from the listed RHS positions.
    Construct(String, Vec<usize>),
    /// equivalent to `Project(0)`.
    None,
}

/// `sentence / attribute` - attach an attribute to a sentence form, the RHS a
/// `NonTerminalRef` production definition ultimately needs.
#[derive(Debug, Clone)]
pub struct Attributed(pub SentenceForm, pub Attribute);

impl std::ops::Div<Attribute> for SentenceForm {
    type Output = Attributed;
    fn div(self, attr: Attribute) -> Attributed {
        Attributed(self, attr)
    }
}
impl std::ops::Div<Attribute> for Symbol {
    type Output = Attributed;
    fn div(self, attr: Attribute) -> Attributed {
        Attributed(SentenceForm::new(vec![self]), attr)
    }
}

/// A list of alternative right-hand sides, built up with `|`.
#[derive(Debug, Clone)]
pub struct DisjunctiveForm(pub Vec<Attributed>);

fn plain(sentence: SentenceForm) -> Attributed {
    Attributed(sentence, Attribute::None)
}

impl std::ops::BitOr<Symbol> for Symbol {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: Symbol) -> DisjunctiveForm {
        DisjunctiveForm(vec![plain(SentenceForm::new(vec![self])), plain(SentenceForm::new(vec![rhs]))])
    }
}
impl std::ops::BitOr<SentenceForm> for Symbol {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: SentenceForm) -> DisjunctiveForm {
        DisjunctiveForm(vec![plain(SentenceForm::new(vec![self])), plain(rhs)])
    }
}
impl std::ops::BitOr<Symbol> for SentenceForm {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: Symbol) -> DisjunctiveForm {
        DisjunctiveForm(vec![plain(self), plain(SentenceForm::new(vec![rhs]))])
    }
}
impl std::ops::BitOr<SentenceForm> for SentenceForm {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: SentenceForm) -> DisjunctiveForm {
        DisjunctiveForm(vec![plain(self), plain(rhs)])
    }
}
impl std::ops::BitOr<Attributed> for Attributed {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: Attributed) -> DisjunctiveForm {
        DisjunctiveForm(vec![self, rhs])
    }
}
impl std::ops::BitOr<Attributed> for SentenceForm {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: Attributed) -> DisjunctiveForm {
        DisjunctiveForm(vec![plain(self), rhs])
    }
}
impl std::ops::BitOr<SentenceForm> for Attributed {
    type Output = DisjunctiveForm;
    fn bitor(self, rhs: SentenceForm) -> DisjunctiveForm {
        DisjunctiveForm(vec![self, plain(rhs)])
    }
}
impl std::ops::BitOr<Attributed> for DisjunctiveForm {
    type Output = DisjunctiveForm;
    fn bitor(mut self, rhs: Attributed) -> DisjunctiveForm {
        self.0.push(rhs);
        self
    }
}
impl std::ops::BitOr<SentenceForm> for DisjunctiveForm {
    type Output = DisjunctiveForm;
    fn bitor(mut self, rhs: SentenceForm) -> DisjunctiveForm {
        self.0.push(plain(rhs));
        self
    }
}
impl std::ops::BitOr<Symbol> for DisjunctiveForm {
    type Output = DisjunctiveForm;
    fn bitor(mut self, rhs: Symbol) -> DisjunctiveForm {
        self.0.push(plain(SentenceForm::new(vec![rhs])));
        self
    }
}

/// Identity is `(left, right)`; the attribute is compared only to
/// detect a conflicting redefinition, not to distinguish productions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub left: String,
    pub right: SentenceForm,
    pub attribute: Attribute,
}

impl Production {
    /// The right-hand side as the LR(1) item machinery sees it: a sole epsilon
    /// symbol stands for an *empty* right-hand side (zero children to pop, the
    /// item is reduce-ready at dot position 0), not a one-symbol sentence whose
    /// single symbol happens to be epsilon.
    pub fn effective_right(&self) -> &[Symbol] {
        if self.right.0.len() == 1 && matches!(self.right.0[0], Symbol::Epsilon) {
            &[]
        } else {
            &self.right.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    pub message: String,
}
impl GrammarError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}
impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrammarError: {}", self.message)
    }
}
impl std::error::Error for GrammarError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalDef {
    pub name: String,
    pub pattern: String,
    pub skip: bool,
}

/// Everything about a finished grammar: its ordered terminals/non-terminals,
/// its productions, and the initial non-terminal. This is the type that
/// survives grammar-building (`Grammar`'s `Rc<RefCell<..>>` scaffolding is
/// builder-only plumbing and is dropped once `Grammar::finish` is called).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarData {
    pub terminals: Vec<TerminalDef>,
    pub non_terminals: Vec<String>,
    pub productions: Vec<Production>,
    pub initial_symbol: Option<String>,
}

impl GrammarData {
    fn add_production(&mut self, prod: Production) -> Result<(), GrammarError> {
        if let Some(existing) = self
            .productions
            .iter()
            .find(|p| p.left == prod.left && p.right == prod.right)
        {
            if existing.attribute != prod.attribute {
                return Err(GrammarError::new(format!(
                    "production {} -> {:?} redefined with a different attribute",
                    prod.left, prod.right.0
                )));
            }
            return Ok(());
        }
        if self.initial_symbol.is_none() {
            self.initial_symbol = Some(prod.left.clone());
        }
        self.productions.push(prod);
        Ok(())
    }

    pub fn productions_of<'a>(&'a self, left: &'a str) -> impl Iterator<Item = &'a Production> {
        self.productions.iter().filter(move |p| p.left == left)
    }

    pub fn production_indices_of(&self, left: &str) -> Vec<usize> {
        self.productions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.left == left)
            .map(|(i, _)| i)
            .collect()
    }

    /// FIRST as a fixed point over every sentence form appearing as a production
    /// right-hand side (plus every single symbol): FIRST of a
    /// sequence includes FIRST of its prefix, absorbing epsilon only when every
    /// symbol up to that point admits epsilon.
    pub fn compute_first(&self) -> BTreeMap<Vec<Symbol>, BTreeSet<Symbol>> {
        let mut cache: BTreeMap<Vec<Symbol>, BTreeSet<Symbol>> = BTreeMap::new();
        for t in &self.terminals {
            let sym = Symbol::Terminal(t.name.clone());
            cache.insert(vec![sym.clone()], BTreeSet::from([sym]));
        }
        cache.insert(vec![Symbol::Eof], BTreeSet::from([Symbol::Eof]));
        cache.insert(vec![Symbol::Epsilon], BTreeSet::from([Symbol::Epsilon]));
        for nt in &self.non_terminals {
            cache.insert(vec![Symbol::NonTerminal(nt.clone())], BTreeSet::new());
        }

        fn calc(cache: &BTreeMap<Vec<Symbol>, BTreeSet<Symbol>>, sentence: &[Symbol]) -> BTreeSet<Symbol> {
            let mut result = BTreeSet::new();
            if sentence.is_empty() {
                result.insert(Symbol::Epsilon);
                return result;
            }
            for sym in sentence {
                let first_r = cache.get(std::slice::from_ref(sym)).cloned().unwrap_or_default();
                let has_eps = first_r.contains(&Symbol::Epsilon);
                result.extend(first_r);
                if !has_eps {
                    return result;
                }
            }
            result
        }

        let mut changed = true;
        while changed {
            changed = false;
            for prod in &self.productions {
                let left_key = vec![Symbol::NonTerminal(prod.left.clone())];
                let right_key = prod.right.0.clone();
                let calculated = calc(&cache, &right_key);

                let left_set = cache.entry(left_key).or_default();
                let before = left_set.len();
                left_set.extend(calculated.iter().cloned());
                changed |= left_set.len() != before;

                let right_set = cache.entry(right_key).or_default();
                let before = right_set.len();
                right_set.extend(calculated);
                changed |= right_set.len() != before;
            }
        }
        cache
    }

    pub fn first_of_sentence(
        &self,
        cache: &BTreeMap<Vec<Symbol>, BTreeSet<Symbol>>,
        sentence: &[Symbol],
        allow_epsilon: bool,
    ) -> BTreeSet<Symbol> {
        let mut result = BTreeSet::new();
        if sentence.is_empty() {
            result.insert(Symbol::Epsilon);
        } else {
            for sym in sentence {
                let first_r = cache.get(std::slice::from_ref(sym)).cloned().unwrap_or_default();
                let has_eps = first_r.contains(&Symbol::Epsilon);
                result.extend(first_r);
                if !has_eps {
                    break;
                }
            }
        }
        if !allow_epsilon {
            result.remove(&Symbol::Epsilon);
        }
        result
    }
}

/// Builder wrapping `GrammarData` in `Rc<RefCell<_>>` so `NonTerminalRef`'s `Shr`
/// impl can register a production as a side effect, the way the original's
/// `NonTerminal.__gt__` appends to `grammar_ref.productions`.
#[derive(Clone)]
pub struct Grammar {
    data: Rc<RefCell<GrammarData>>,
    first_sets: Rc<OnceCell<BTreeMap<Vec<Symbol>, BTreeSet<Symbol>>>>,
}

impl Grammar {
    pub fn new() -> Self {
        let data = GrammarData {
            terminals: vec![TerminalDef {
                name: "$".to_string(),
                pattern: String::new(),
                skip: false,
            }],
            non_terminals: Vec::new(),
            productions: Vec::new(),
            initial_symbol: None,
        };
        Self {
            data: Rc::new(RefCell::new(data)),
            first_sets: Rc::new(OnceCell::new()),
        }
    }

    pub fn eof(&self) -> Symbol {
        Symbol::Eof
    }

    pub fn epsilon(&self) -> Symbol {
        Symbol::Epsilon
    }

    pub fn terminal(&self, name: &str, pattern: &str, skip: bool) -> Symbol {
        self.data.borrow_mut().terminals.push(TerminalDef {
            name: name.to_string(),
            pattern: pattern.to_string(),
            skip,
        });
        Symbol::Terminal(name.to_string())
    }

    pub fn non_terminal(&self, name: &str) -> NonTerminalRef {
        self.data.borrow_mut().non_terminals.push(name.to_string());
        NonTerminalRef {
            name: name.to_string(),
            grammar: self.data.clone(),
        }
    }

    /// Snapshot the builder into an immutable `GrammarData`, consuming the
    /// `Rc<RefCell<_>>` builder plumbing.
    pub fn finish(self) -> GrammarData {
        Rc::try_unwrap(self.data)
            .unwrap_or_else(|rc| rc.borrow().clone())
            .into_inner()
    }

    pub fn first_sets(&self) -> BTreeMap<Vec<Symbol>, BTreeSet<Symbol>> {
        self.first_sets
            .get_or_init(|| self.data.borrow().compute_first())
            .clone()
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

/// The RHS of a production definition: a bare symbol/sentence always has
/// `Attribute::None` (equivalent to "project 0"); `/` attaches an explicit one.
pub enum ProductionRhs {
    Sentence(SentenceForm),
    Attributed(Attributed),
    Disjunctive(DisjunctiveForm),
}
impl From<Symbol> for ProductionRhs {
    fn from(s: Symbol) -> Self {
        ProductionRhs::Sentence(SentenceForm::new(vec![s]))
    }
}
impl From<SentenceForm> for ProductionRhs {
    fn from(s: SentenceForm) -> Self {
        ProductionRhs::Sentence(s)
    }
}
impl From<Attributed> for ProductionRhs {
    fn from(a: Attributed) -> Self {
        ProductionRhs::Attributed(a)
    }
}
impl From<DisjunctiveForm> for ProductionRhs {
    fn from(d: DisjunctiveForm) -> Self {
        ProductionRhs::Disjunctive(d)
    }
}

/// A handle to a non-terminal, good for defining its productions via `>>`.
#[derive(Clone)]
pub struct NonTerminalRef {
    pub name: String,
    grammar: Rc<RefCell<GrammarData>>,
}

impl NonTerminalRef {
    pub fn symbol(&self) -> Symbol {
        Symbol::NonTerminal(self.name.clone())
    }

    /// The fallible form of `>>`; prefer this when a conflicting redefinition
    /// should be handled rather than panic.
    pub fn define(&self, rhs: impl Into<ProductionRhs>) -> Result<(), GrammarError> {
        let mut data = self.grammar.borrow_mut();
        match rhs.into() {
            ProductionRhs::Sentence(s) => data.add_production(Production {
                left: self.name.clone(),
                right: s,
                attribute: Attribute::None,
            }),
            ProductionRhs::Attributed(Attributed(s, a)) => data.add_production(Production {
                left: self.name.clone(),
                right: s,
                attribute: a,
            }),
            ProductionRhs::Disjunctive(d) => {
                for Attributed(s, a) in d.0 {
                    data.add_production(Production {
                        left: self.name.clone(),
                        right: s,
                        attribute: a,
                    })?;
                }
                Ok(())
            }
        }
    }
}

impl<T: Into<ProductionRhs>> std::ops::Shr<T> for NonTerminalRef {
    type Output = ();
    fn shr(self, rhs: T) {
        self.define(rhs)
            .expect("grammar production conflict during grammar construction")
    }
}

/// Writes a lexer table out as a generated Rust source file embedding the
/// table's serialized bytes as a byte-string literal, the Rust analogue of
/// `toolchain/frontend_generator/grammar.py`'s `Grammar.write_lexer`
/// (which splices a serialized table into a `lexer.py` template via
/// textual `REPLACE-ME-LEXER` substitution). Rust has no equivalent of
/// loading a module from a string at runtime, so the generated file is a
/// standalone source: a byte-string constant plus a `read()` function that
/// reconstructs the table with [`crate::lexer::LexerTable::from_bytes`].
pub fn write_lexer(table: &crate::lexer::LexerTable, out_dir: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
    let bytes = table
        .to_bytes()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    let out_path = out_dir.join("lexer_table_generated.rs");
    let source = format!(
        "// Generated by cryptosim_lang::grammar::write_lexer. Do not edit by hand.\n\n\
         pub static LEXER_TABLE_BYTES: &[u8] = b\"{}\";\n\n\
         pub fn read() -> Result<cryptosim_lang::lexer::LexerTable, cryptosim_lang::lexer::LexerTableCodecError> {{\n    \
             cryptosim_lang::lexer::LexerTable::from_bytes(LEXER_TABLE_BYTES)\n\
         }}\n",
        escape_byte_string(&bytes)
    );
    std::fs::write(&out_path, source)?;
    Ok(out_path)
}

/// Writes an LR(1) table out as a generated Rust source file, the analogue of
/// `Grammar.write_lr1_parser`. The original's generated `parser.py` also
/// embeds the reduce-time attribute-application logic inline (it has nowhere
/// else to get it from, since the template *is* the whole reader module); the
/// Rust reader program below takes the attribute-application function by
/// reference instead of duplicating its body textually, since `apply_attribute`
/// already lives in `crate::lr` as ordinary compiled code and re-emitting its
/// source as a string would just be a second, driftable copy of the same logic.
pub fn write_lr1_parser(table: &crate::lr::LRTable, out_dir: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
    let bytes = table
        .to_bytes()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    let out_path = out_dir.join("lr_table_generated.rs");
    let source = format!(
        "// Generated by cryptosim_lang::grammar::write_lr1_parser. Do not edit by hand.\n\n\
         pub static LR_TABLE_BYTES: &[u8] = b\"{}\";\n\n\
         pub fn read() -> Result<cryptosim_lang::lr::LRTable, Box<bincode::ErrorKind>> {{\n    \
             cryptosim_lang::lr::LRTable::from_bytes(LR_TABLE_BYTES)\n\
         }}\n\n\
         /// Parses `tokens` with the reconstructed table, applying attributes via\n\
         /// `builder` exactly as `cryptosim_lang::lr::parse` does - the generated reader\n\
         /// never duplicates the shift/reduce loop itself, only the table it drives.\n\
         pub fn parse<V: Clone + Default>(\n    \
             table: &cryptosim_lang::lr::LRTable,\n    \
             tokens: &[cryptosim_lang::lexer::Token],\n    \
             builder: &impl cryptosim_lang::lr::NodeBuilder<V>,\n    \
             leaf: impl Fn(&cryptosim_lang::lexer::Token) -> V,\n\
         ) -> Result<V, cryptosim_lang::lr::ParseError> {{\n    \
             cryptosim_lang::lr::parse(table, tokens, builder, leaf)\n\
         }}\n",
        escape_byte_string(&bytes)
    );
    std::fs::write(&out_path, source)?;
    Ok(out_path)
}

/// Escapes raw bytes into the body of a Rust byte-string literal (`b"..."`):
/// printable ASCII passes through, everything else becomes `\xNN`.
fn escape_byte_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_sentence_forms_with_plus() {
        let g = Grammar::new();
        let a = g.terminal("a", "a", false);
        let b = g.terminal("b", "b", false);
        let sentence = a + b;
        assert_eq!(sentence.0.len(), 2);
    }

    #[test]
    fn epsilon_is_absorbed_in_multi_symbol_sentences() {
        let g = Grammar::new();
        let a = g.terminal("a", "a", false);
        let sentence = a + g.epsilon();
        assert_eq!(sentence.0, vec![Symbol::Terminal("a".into())]);
    }

    #[test]
    fn shr_defines_a_production() {
        let g = Grammar::new();
        let a = g.terminal("a", "a", false);
        let s = g.non_terminal("S");
        s.clone() >> a;
        let data = g.finish();
        assert_eq!(data.productions.len(), 1);
        assert_eq!(data.initial_symbol, Some("S".to_string()));
    }

    #[test]
    fn redefining_with_a_different_attribute_is_a_conflict() {
        let g = Grammar::new();
        let a = g.terminal("a", "a", false);
        let s = g.non_terminal("S");
        s.define(a.clone()).unwrap();
        let err = s.define(a / Attribute::Project(0)).unwrap_err();
        assert!(err.message.contains("different attribute"));
    }

    #[test]
    fn first_set_fixed_point_absorbs_epsilon_only_when_all_symbols_nullable() {
        let g = Grammar::new();
        let a = g.terminal("a", "a", false);
        let s = g.non_terminal("S");
        let t = g.non_terminal("T");
        // S -> T a | epsilon  ; T -> epsilon
        // NB: `>>` binds tighter than `|` in Rust, so the full alternation must be
        // parenthesized - `nt >> a | b` would parse as `(nt >> a) | b`, not
        // `nt >> (a | b)`.
        s.clone() >> ((t.symbol() + a.clone()) | g.epsilon());
        t.clone() >> g.epsilon();
        let data = g.finish();
        let cache = data.compute_first();
        let first_s = data.first_of_sentence(&cache, &[Symbol::NonTerminal("S".into())], true);
        assert!(first_s.contains(&Symbol::Terminal("a".into())));
        assert!(first_s.contains(&Symbol::Epsilon));
    }

    #[test]
    fn write_lexer_emits_a_source_file_embedding_the_table_bytes() {
        let mut table = crate::lexer::LexerTable::new("$");
        table.push(crate::lexer::TokenRule::new("NUM", "[0-9]+", false).unwrap());
        let dir = tempfile::tempdir().unwrap();

        let path = write_lexer(&table, dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("LEXER_TABLE_BYTES"));
        assert!(contents.contains("pub fn read()"));
        assert!(contents.contains("LexerTable::from_bytes"));
    }

    #[test]
    fn write_lr1_parser_emits_a_source_file_whose_embedded_table_round_trips() {
        let g = Grammar::new();
        let a = g.terminal("a", "a", false);
        let s = g.non_terminal("S");
        s.clone() >> a.clone();
        let table = crate::lr::build(g.finish()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let path = write_lr1_parser(&table, dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("LR_TABLE_BYTES"));
        assert!(contents.contains("pub fn parse"));

        // the byte-string literal itself decodes back to an equivalent table,
        // the same guarantee the generated reader's `read()` relies on.
        let marker = "LR_TABLE_BYTES: &[u8] = b\"";
        let start = contents.find(marker).unwrap() + marker.len();
        let end = contents[start..].find('"').unwrap() + start;
        let literal = &contents[start..end];
        let restored_bytes = unescape_byte_string(literal);
        let restored = crate::lr::LRTable::from_bytes(&restored_bytes).unwrap();
        assert_eq!(restored.initial_state, table.initial_state);
    }

    fn unescape_byte_string(literal: &str) -> Vec<u8> {
        let chars: Vec<char> = literal.chars().collect();
        let mut out = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '\\' {
                match chars[i + 1] {
                    'n' => {
                        out.push(b'\n');
                        i += 2;
                    }
                    'r' => {
                        out.push(b'\r');
                        i += 2;
                    }
                    't' => {
                        out.push(b'\t');
                        i += 2;
                    }
                    '\\' => {
                        out.push(b'\\');
                        i += 2;
                    }
                    '"' => {
                        out.push(b'"');
                        i += 2;
                    }
                    'x' => {
                        let hex: String = chars[i + 2..i + 4].iter().collect();
                        out.push(u8::from_str_radix(&hex, 16).unwrap());
                        i += 4;
                    }
                    other => panic!("unexpected escape '\\{}'", other),
                }
            } else {
                out.push(chars[i] as u8);
                i += 1;
            }
        }
        out
    }
}
