//! A from-scratch regular-expression engine: AST, a hand-rolled recursive-descent
//! parser for the regex literal grammar, Thompson-construction evaluation to an
//! NFA, and powerset determinization to a DFA with named-capture tracking.
//!
//! Grounded on `toolchain/regx_engine/ast_regex.py` (the eval-per-node Thompson
//! construction) and `toolchain/regx_engine/regx_engine.py` (the compile pipeline
//! and DFA-walk matching semantics), expressed over `crate::automaton` instead of
//! a bespoke graph.
mod parser;

pub use parser::parse_regex;

use crate::automaton::{Automaton, StateId};
use once_cell::unsync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Content tag carried by automaton states to track named captures through
/// determinization; see `Automaton::powerset_construct`'s `state_builder`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tag {
    GroupOpen(String),
    GroupClose(String),
}

/// A class-item inside `[...]`/`[^...]`. Supported: a literal char, a `\d`/`\D`/`\.`
/// style shorthand-or-escape, and a literal-to-literal range `a-z`.
///
/// Simplification vs. the original: the original's `MixedRange` node allows a
/// range endpoint to itself be a shorthand (`\d-z`), evaluated as a set union
/// rather than a true codepoint range — a looseness that reads as an artifact of
/// the original's polymorphic eval() rather than an intentional feature. Here a
/// range's endpoints are always literal chars; a shorthand/escape inside a class
/// is always a standalone item unioned into the class, never a range endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClassItem {
    Char(char),
    Shorthand(char),
    Range(char, char),
}

/// The regex AST. One variant per production of the grammar sketched in spec
/// §4.2's `regex := alt | concat | closure | atom` sketch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexNode {
    Alternation(Box<RegexNode>, Box<RegexNode>),
    Concatenation(Box<RegexNode>, Box<RegexNode>),
    KleeneStar(Box<RegexNode>),
    KleenePlus(Box<RegexNode>),
    Maybe(Box<RegexNode>),
    Group(Box<RegexNode>),
    NamedGroup(String, Box<RegexNode>),
    PositiveSet(Vec<ClassItem>),
    NegativeSet(Vec<ClassItem>),
    Char(char),
    EscapedOrShorthand(char),
    Dot,
}

const RESERVED: &str = ".*+?()[]{}^\\<>|-";

fn is_reserved(c: char) -> bool {
    RESERVED.contains(c)
}

/// The alphabet a bare `.` or a negated class draws from: printable ASCII plus
/// the common whitespace controls, minus the characters the regex syntax itself
/// reserves. Mirrors the original's `string.printable - RESERVED`.
fn alphabet() -> BTreeSet<char> {
    let mut set: BTreeSet<char> = (0x20u8..=0x7Eu8).map(|b| b as char).collect();
    set.insert('\n');
    set.insert('\t');
    set.insert('\r');
    set.retain(|c| !is_reserved(*c));
    set
}

fn digits() -> BTreeSet<char> {
    ('0'..='9').collect()
}

fn shorthand_resolver(flag: char) -> BTreeSet<char> {
    match flag {
        '.' => alphabet(),
        'd' => digits(),
        'D' => {
            let all = alphabet();
            let d = digits();
            all.difference(&d).copied().collect()
        }
        other => {
            let mut s = BTreeSet::new();
            s.insert(other);
            s
        }
    }
}

fn class_items_chars(items: &[ClassItem]) -> BTreeSet<char> {
    let mut set = BTreeSet::new();
    for item in items {
        match item {
            ClassItem::Char(c) => {
                set.insert(*c);
            }
            ClassItem::Shorthand(c) => set.extend(shorthand_resolver(*c)),
            ClassItem::Range(lo, hi) => {
                set.extend((*lo as u32..=*hi as u32).filter_map(char::from_u32));
            }
        }
    }
    set
}

fn multi_transition(chars: impl IntoIterator<Item = char>) -> Automaton<char, Tag> {
    let mut a = Automaton::new();
    let start = a.start();
    let final_ = a.add_state(true, BTreeSet::new());
    for c in chars {
        a.add_transition(start, c, final_);
    }
    a
}

impl RegexNode {
    /// Evaluate this node into an NFA, per the standard Thompson construction.
    pub fn eval(&self) -> Automaton<char, Tag> {
        match self {
            RegexNode::Alternation(l, r) => l.eval().union(&r.eval()),
            RegexNode::Concatenation(l, r) => l.eval().concat(&r.eval()),
            RegexNode::KleeneStar(inner) => inner.eval().maybe().repeat(),
            RegexNode::KleenePlus(inner) => {
                let first = inner.eval();
                let optional_repeat = first.clone().maybe();
                first.concat(&optional_repeat).repeat()
            }
            RegexNode::Maybe(inner) => inner.eval().maybe(),
            RegexNode::Group(inner) => inner.eval(),
            RegexNode::NamedGroup(name, inner) => {
                let mut automaton = inner.eval();
                let start = automaton.start();
                automaton.add_content(start, Tag::GroupOpen(name.clone()));
                for final_state in automaton.final_states() {
                    automaton.add_content(final_state, Tag::GroupClose(name.clone()));
                }
                automaton
            }
            RegexNode::PositiveSet(items) => multi_transition(class_items_chars(items)),
            RegexNode::NegativeSet(items) => {
                let excluded = class_items_chars(items);
                let remaining = alphabet().difference(&excluded).copied().collect::<Vec<_>>();
                multi_transition(remaining)
            }
            RegexNode::Char(c) => multi_transition([*c]),
            RegexNode::EscapedOrShorthand(flag) => multi_transition(shorthand_resolver(*flag)),
            RegexNode::Dot => multi_transition(alphabet()),
        }
    }
}

/// Error produced while parsing a regex literal: a malformed pattern supplied
/// by the grammar author, not by DSL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexError {
    pub message: String,
}

impl RegexError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

impl Display for RegexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegexError: {}", self.message)
    }
}

impl std::error::Error for RegexError {}

/// A successful match: the consumed span and any named captures within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub lexeme: String,
    pub groups: BTreeMap<String, (usize, usize)>,
}

/// A compiled pattern. The NFA->DFA determinization is deferred to first use via
/// `OnceCell`, the same lazy-compile-on-first-use idiom `util::Code` uses in
/// `examples/creative-forest-lang-pt`.
pub struct RegexPattern {
    source: String,
    ast: RegexNode,
    dfa: OnceCell<Automaton<char, Tag>>,
}

impl RegexPattern {
    pub fn compile(source: &str) -> Result<Self, RegexError> {
        let ast = parse_regex(source)?;
        Ok(Self {
            source: source.to_string(),
            ast,
            dfa: OnceCell::new(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn dfa(&self) -> &Automaton<char, Tag> {
        self.dfa.get_or_init(|| to_dfa(&self.ast.eval()))
    }

    /// Walk the DFA from `pos` in `input` (indexed by `char`, not byte), consuming
    /// characters greedily while a transition exists. Tracks named
    /// groups by their open/close tags as the walk proceeds; succeeds iff the
    /// state the walk stops in is accepting.
    pub fn find_at(&self, input: &[char], pos: usize) -> Option<Match> {
        let dfa = self.dfa();
        let mut state = dfa.start();
        let mut current = pos;
        let mut open_starts: BTreeMap<String, usize> = BTreeMap::new();
        let mut groups: BTreeMap<String, (usize, usize)> = BTreeMap::new();

        apply_tags(dfa, state, current, &mut open_starts, &mut groups);

        while current < input.len() {
            let c = input[current];
            let next = match dfa.state(state).transitions.get(&c) {
                Some(n) => *n,
                None => break,
            };
            state = next;
            current += 1;
            apply_tags(dfa, state, current, &mut open_starts, &mut groups);
        }

        if dfa.state(state).is_final {
            let lexeme: String = input[pos..current].iter().collect();
            Some(Match {
                start: pos,
                end: current,
                lexeme,
                groups,
            })
        } else {
            None
        }
    }
}

fn apply_tags(
    dfa: &Automaton<char, Tag>,
    state: StateId,
    position: usize,
    open_starts: &mut BTreeMap<String, usize>,
    groups: &mut BTreeMap<String, (usize, usize)>,
) {
    let content = &dfa.state(state).content;
    for tag in content {
        if let Tag::GroupOpen(name) = tag {
            open_starts.entry(name.clone()).or_insert(position);
        }
    }
    if dfa.state(state).is_final {
        for tag in content {
            if let Tag::GroupClose(name) = tag {
                if let Some(&start) = open_starts.get(name) {
                    groups.insert(name.clone(), (start, position));
                }
            }
        }
    }
}

/// `Automaton::to_dfa` specialization: Rabin-Scott powerset construction over
/// `char`-labelled NFA states.
pub fn to_dfa(nfa: &Automaton<char, Tag>) -> Automaton<char, Tag> {
    let goto = |items: &[StateId], sym: &char| -> Vec<StateId> {
        let set: BTreeSet<StateId> = items.iter().copied().collect();
        nfa.goto(&set, sym).into_iter().collect()
    };
    let closure = |items: &[StateId]| -> Vec<StateId> {
        let set: BTreeSet<StateId> = items.iter().copied().collect();
        nfa.epsilon_closure(&set).into_iter().collect()
    };
    let state_builder = |items: &[StateId]| -> (bool, BTreeSet<Tag>) {
        let is_final = items.iter().any(|s| nfa.state(*s).is_final);
        let mut tags = BTreeSet::new();
        for s in items {
            tags.extend(nfa.state(*s).content.iter().cloned());
        }
        (is_final, tags)
    };
    let alphabet = |items: &[StateId]| -> Vec<char> {
        let set: BTreeSet<StateId> = items.iter().copied().collect();
        nfa.alphabet_of(&set).into_iter().collect()
    };
    let (dfa, _) =
        Automaton::powerset_construct(vec![nfa.start()], goto, closure, state_builder, alphabet);
    dfa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn full_match(pattern: &str, input: &str) -> Option<Match> {
        let p = RegexPattern::compile(pattern).unwrap();
        let text = chars(input);
        p.find_at(&text, 0).filter(|m| m.end == text.len())
    }

    #[test]
    fn literal_concatenation() {
        assert!(full_match("abc", "abc").is_some());
        assert!(full_match("abc", "abd").is_none());
    }

    #[test]
    fn alternation() {
        assert!(full_match("a|b", "a").is_some());
        assert!(full_match("a|b", "b").is_some());
        assert!(full_match("a|b", "c").is_none());
    }

    #[test]
    fn kleene_star_and_plus() {
        assert!(full_match("a*", "").is_some());
        assert!(full_match("a*", "aaa").is_some());
        assert!(full_match("a+", "").is_none());
        assert!(full_match("a+", "aaa").is_some());
    }

    #[test]
    fn shorthand_digit_class() {
        assert!(full_match(r"\d+", "12345").is_some());
        assert!(full_match(r"\d+", "12a45").is_none());
    }

    #[test]
    fn char_class_and_range() {
        assert!(full_match("[a-c]+", "abcabc").is_some());
        assert!(full_match("[a-c]+", "abd").is_none());
        assert!(full_match("[^a-c]+", "xyz").is_some());
        assert!(full_match("[^a-c]+", "xya").is_none());
    }

    #[test]
    fn named_group_capture() {
        let p = RegexPattern::compile("(?P<num>\\d+)").unwrap();
        let text = chars("42");
        let m = p.find_at(&text, 0).unwrap();
        assert_eq!(m.groups.get("num"), Some(&(0, 2)));
    }

    #[test]
    fn empty_alternation_is_rejected() {
        assert!(parse_regex("a|").is_err());
    }

    #[test]
    fn greedy_prefix_match_does_not_anchor_to_end() {
        let p = RegexPattern::compile("[A-Za-z][A-Za-z0-9_]*").unwrap();
        let text = chars("identifier_1 rest");
        let m = p.find_at(&text, 0).unwrap();
        assert_eq!(m.lexeme, "identifier_1");
    }

    #[test]
    fn determinizing_removes_epsilon_transitions() {
        let nfa = parse_regex("a*b").unwrap().eval();
        assert!(!nfa.is_dfa());
        let dfa = to_dfa(&nfa);
        assert!(dfa.is_dfa());
    }
}
