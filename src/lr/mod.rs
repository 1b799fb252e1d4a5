//! LR(1) parser generator: canonical item-set construction over
//! `crate::automaton::powerset_construct`, table emission, an on-disk
//! serde+bincode schema, and the table-driven shift/reduce parse loop.
//!
//! Grounded on `examples/original_source/toolchain/frontend_generator/grammar.py`
//! (`LRitem`, `_get_lr1_goto`, `_get_lr1_closure`, `write_lr1_parser`, `augment`)
//! and `.../toolchain/regx_engine/parser.py` (`LRtable`, the shift/reduce loop,
//! `_attribute_apply`).
use crate::automaton::{Automaton, StateId};
use crate::grammar::{Attribute, GrammarData, Production, Symbol};
use crate::lexer::Token;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::{Display, Formatter};

/// `(production, dot)` - ignores the lookahead set, used to merge items during
/// closure: core equality ignores lookaheads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemCore {
    pub production: usize,
    pub dot_pos: usize,
}

/// `(production, dot, lookahead-set)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LRItem {
    pub core: ItemCore,
    pub lookaheads: BTreeSet<Symbol>,
}

impl LRItem {
    pub fn new(production: usize, dot_pos: usize, lookaheads: BTreeSet<Symbol>) -> Self {
        Self {
            core: ItemCore { production, dot_pos },
            lookaheads,
        }
    }

    fn production<'g>(&self, grammar: &'g GrammarData) -> &'g Production {
        &grammar.productions[self.core.production]
    }

    pub fn is_reduce(&self, grammar: &GrammarData) -> bool {
        self.core.dot_pos >= self.production(grammar).effective_right().len()
    }

    pub fn peek_next_symbol<'g>(&self, grammar: &'g GrammarData) -> Option<&'g Symbol> {
        self.production(grammar).effective_right().get(self.core.dot_pos)
    }

    pub fn advance_dot(&self) -> LRItem {
        LRItem {
            core: ItemCore {
                production: self.core.production,
                dot_pos: self.core.dot_pos + 1,
            },
            lookaheads: self.lookaheads.clone(),
        }
    }

    fn core_only(&self) -> LRItem {
        LRItem {
            core: self.core,
            lookaheads: BTreeSet::new(),
        }
    }

    /// For every lookahead `lh` in this item, `remaining-after-the-dot . lh` - the
    /// sentence whose FIRST (without epsilon) gives the lookaheads a closure-added
    /// item inherits.
    fn remaining_with_each_lookahead(&self, grammar: &GrammarData) -> Vec<Vec<Symbol>> {
        let remaining = &self.production(grammar).effective_right()[self.core.dot_pos + 1..];
        self.lookaheads
            .iter()
            .map(|lh| {
                let mut v = remaining.to_vec();
                v.push(lh.clone());
                v
            })
            .collect()
    }
}

/// Computes `goto`/`closure` over LR(1) item sets for a fixed grammar, the two
/// callables `Automaton::powerset_construct` is parameterized by.
pub struct LrBuilder<'g> {
    grammar: &'g GrammarData,
    first_cache: BTreeMap<Vec<Symbol>, BTreeSet<Symbol>>,
}

impl<'g> LrBuilder<'g> {
    pub fn new(grammar: &'g GrammarData) -> Self {
        let first_cache = grammar.compute_first();
        Self { grammar, first_cache }
    }

    pub fn goto(&self, items: &[LRItem], symbol: &Symbol) -> Vec<LRItem> {
        items
            .iter()
            .filter(|item| item.peek_next_symbol(self.grammar) == Some(symbol))
            .map(|item| item.advance_dot())
            .collect()
    }

    /// Standard LR(1) closure, run to a genuine fixed point: whenever merging
    /// lookaheads into an already-seen core grows its lookahead set, that item is
    /// requeued so its own closure expansion sees the enlarged set too. The
    /// original's `_get_lr1_closure` merges lookaheads into an already-produced
    /// item in place but never requeues it, so a lookahead arriving after an
    /// item's own expansion has already run is silently dropped from that item's
    /// dependents; closure is meant to be an unqualified fixed point, so
    /// this version closes the gap rather than reproducing it.
    pub fn closure(&self, items: &[LRItem]) -> Vec<LRItem> {
        let mut by_core: BTreeMap<ItemCore, LRItem> = BTreeMap::new();
        let mut queue: VecDeque<LRItem> = VecDeque::new();
        for item in items {
            by_core.insert(item.core, item.clone());
            queue.push_back(item.clone());
        }

        while let Some(item) = queue.pop_front() {
            let next_symbol = match item.peek_next_symbol(self.grammar) {
                Some(Symbol::NonTerminal(name)) => Some(name.clone()),
                _ => None,
            };
            let Some(name) = next_symbol else { continue };

            let mut lookaheads = BTreeSet::new();
            for sentence in item.remaining_with_each_lookahead(self.grammar) {
                lookaheads.extend(self.grammar.first_of_sentence(&self.first_cache, &sentence, false));
            }

            for idx in self.grammar.production_indices_of(&name) {
                let core = ItemCore { production: idx, dot_pos: 0 };
                match by_core.get_mut(&core) {
                    Some(existing) => {
                        let before = existing.lookaheads.len();
                        existing.lookaheads.extend(lookaheads.iter().cloned());
                        if existing.lookaheads.len() != before {
                            queue.push_back(existing.clone());
                        }
                    }
                    None => {
                        let new_item = LRItem::new(idx, 0, lookaheads.clone());
                        by_core.insert(core, new_item.clone());
                        queue.push_back(new_item);
                    }
                }
            }
        }
        by_core.into_values().collect()
    }

    pub fn alphabet(&self, items: &[LRItem]) -> Vec<Symbol> {
        items
            .iter()
            .filter_map(|item| item.peek_next_symbol(self.grammar).cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceInfo {
    pub left: String,
    pub right: Vec<String>,
    pub attribute: Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Shift(StateId),
    Reduce(ReduceInfo),
    Accept,
}

/// The generated parser program: action/goto tables keyed by
/// `(state, symbol name)`, self-contained and serializable. Conflict-free by
/// construction - `set_action` refuses a second, different write to the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LRTable {
    pub initial_symbol: String,
    pub initial_state: StateId,
    action: BTreeMap<(StateId, String), Action>,
    goto: BTreeMap<(StateId, String), StateId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrConflict {
    pub message: String,
}
impl Display for LrConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LrConflict: {}", self.message)
    }
}
impl std::error::Error for LrConflict {}

impl LRTable {
    fn set_action(&mut self, state: StateId, terminal: &str, action: Action) -> Result<(), LrConflict> {
        let key = (state, terminal.to_string());
        if let Some(existing) = self.action.get(&key) {
            if existing != &action {
                return Err(LrConflict {
                    message: format!(
                        "conflict at state {} on '{}': {:?} vs {:?}",
                        state.0, terminal, existing, action
                    ),
                });
            }
            return Ok(());
        }
        self.action.insert(key, action);
        Ok(())
    }

    fn set_goto(&mut self, state: StateId, non_terminal: &str, target: StateId) {
        self.goto.insert((state, non_terminal.to_string()), target);
    }

    pub fn action(&self, state: StateId, terminal: &str) -> Option<&Action> {
        self.action.get(&(state, terminal.to_string()))
    }

    pub fn goto_state(&self, state: StateId, non_terminal: &str) -> Option<StateId> {
        self.goto.get(&(state, non_terminal.to_string())).copied()
    }

    /// The terminals this state has *some* action defined for, used to build a
    /// syntax error's "expected" list.
    pub fn expected_terminals(&self, state: StateId) -> Vec<String> {
        self.action
            .keys()
            .filter(|(s, _)| *s == state)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<bincode::ErrorKind>> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Box<bincode::ErrorKind>> {
        bincode::deserialize(bytes)
    }
}

/// Augments `grammar` with a fresh start symbol `S' -> S` and builds its
/// canonical LR(1) action/goto table.
///
/// The original guards this with `is_augmented` (true when the start symbol
/// already has exactly one production) so repeated calls during interactive
/// grammar-building are idempotent. This crate builds a grammar's table exactly
/// once, ahead of time, so that guard is dropped - augmenting unconditionally
/// here would double-augment only if `build` were called twice on the same
/// `GrammarData`, which no caller does.
pub fn build(mut grammar: GrammarData) -> Result<LRTable, LrConflict> {
    crate::log::Log::trace(
        crate::log::Log::Default(()),
        crate::log::Log::Default(()),
        &format!("building LR(1) table for {} productions", grammar.productions.len()),
    );
    let initial_name = grammar
        .initial_symbol
        .clone()
        .expect("grammar has no initial symbol to augment");
    let augmented_name = format!("{}'", initial_name);
    grammar.non_terminals.push(augmented_name.clone());
    grammar.productions.push(Production {
        left: augmented_name.clone(),
        right: crate::grammar::SentenceForm::new(vec![Symbol::NonTerminal(initial_name.clone())]),
        attribute: Attribute::Project(0),
    });
    grammar.initial_symbol = Some(augmented_name.clone());

    let builder = LrBuilder::new(&grammar);
    let augmented_prod_idx = grammar.production_indices_of(&augmented_name)[0];
    let initial_item = LRItem::new(augmented_prod_idx, 0, BTreeSet::from([Symbol::Eof]));

    let goto_fn = |items: &[LRItem], sym: &Symbol| builder.goto(items, sym);
    let closure_fn = |items: &[LRItem]| builder.closure(items);
    let state_builder = |_items: &[LRItem]| (true, BTreeSet::new());
    let alphabet_fn = |items: &[LRItem]| builder.alphabet(items);

    let (dfa, item_sets): (Automaton<Symbol, ()>, BTreeMap<Vec<LRItem>, StateId>) =
        Automaton::powerset_construct(vec![initial_item], goto_fn, closure_fn, state_builder, alphabet_fn);

    let mut items_by_state: BTreeMap<StateId, Vec<LRItem>> = BTreeMap::new();
    for (items, id) in item_sets {
        items_by_state.insert(id, items);
    }

    let mut table = LRTable {
        initial_symbol: augmented_name.clone(),
        initial_state: dfa.start(),
        action: BTreeMap::new(),
        goto: BTreeMap::new(),
    };

    for state in dfa.states() {
        let items = items_by_state.get(&state.id).cloned().unwrap_or_default();
        for item in &items {
            if item.is_reduce(&grammar) {
                let prod = &grammar.productions[item.core.production];
                if prod.left == augmented_name {
                    table.set_action(state.id, Symbol::Eof.name(), Action::Accept)?;
                    continue;
                }
                let right_names: Vec<String> = prod.effective_right().iter().map(|s| s.name().to_string()).collect();
                for lookahead in &item.lookaheads {
                    let info = ReduceInfo {
                        left: prod.left.clone(),
                        right: right_names.clone(),
                        attribute: prod.attribute.clone(),
                    };
                    table.set_action(state.id, lookahead.name(), Action::Reduce(info))?;
                }
            } else {
                let symbol = item.peek_next_symbol(&grammar).expect("non-reduce item has a next symbol").clone();
                let target = *state
                    .transitions
                    .get(&symbol)
                    .expect("alphabet() promised a transition for every symbol it returns");
                match symbol {
                    Symbol::NonTerminal(name) => table.set_goto(state.id, &name, target),
                    _ => table.set_action(state.id, symbol.name(), Action::Shift(target))?,
                }
            }
        }
    }
    Ok(table)
}

/// One frame of the parser's value stack: the symbol name that produced it (a
/// terminal name for a shifted leaf, a non-terminal name for a reduced node) and
/// its semantic value.
#[derive(Debug, Clone)]
struct ParserSymbol<V> {
    name: String,
    value: V,
}

/// Resolves a production's `Construct(name, ...)` attribute into an actual AST
/// node, by symbol name - resolving the constructor name against a supplied
/// AST module at load time rather than baking it into the table.
pub trait NodeBuilder<V> {
    fn construct(&self, name: &str, args: Vec<V>) -> V;
}

fn apply_attribute<V: Clone + Default>(attribute: &Attribute, popped: Vec<V>, builder: &impl NodeBuilder<V>) -> V {
    match attribute {
        Attribute::Project(i) => popped[*i].clone(),
        Attribute::None => popped.first().cloned().unwrap_or_default(),
        Attribute::Construct(name, positions) => {
            let args = positions.iter().map(|i| popped[*i].clone()).collect();
            builder.construct(name, args)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub found: String,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    pub expected: Vec<String>,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ParseError: unexpected {} '{}' at {}:{}, expected one of {:?}",
            self.found, self.lexeme, self.line, self.column, self.expected
        )
    }
}
impl std::error::Error for ParseError {}

/// Standard table-driven shift/reduce LR parse loop: an
/// explicit state stack and value stack, shift pushes a leaf built from the
/// token, reduce pops `|right|` values and applies the production's attribute,
/// accept returns the single remaining value.
pub fn parse<V: Clone + Default>(
    table: &LRTable,
    tokens: &[Token],
    builder: &impl NodeBuilder<V>,
    leaf: impl Fn(&Token) -> V,
) -> Result<V, ParseError> {
    let mut state_stack = vec![table.initial_state];
    let mut symbol_stack: Vec<ParserSymbol<V>> = Vec::new();
    let mut cursor = 0usize;

    loop {
        let curr_tok = &tokens[cursor];
        let curr_state = *state_stack.last().expect("state stack never empties before Accept");
        match table.action(curr_state, &curr_tok.name) {
            Some(Action::Shift(target)) => {
                state_stack.push(*target);
                symbol_stack.push(ParserSymbol {
                    name: curr_tok.name.clone(),
                    value: leaf(curr_tok),
                });
                cursor += 1;
            }
            Some(Action::Reduce(info)) => {
                let mut popped = Vec::with_capacity(info.right.len());
                for expected_name in info.right.iter().rev() {
                    state_stack.pop();
                    let sym = symbol_stack.pop().expect("reduce pops no more than the stack holds");
                    // the stack is always a viable prefix, so this can't actually
                    // fail - kept as a cheap sanity check against table bugs.
                    debug_assert_eq!(&sym.name, expected_name);
                    popped.push(sym);
                }
                popped.reverse();
                let values: Vec<V> = popped.into_iter().map(|s| s.value).collect();
                let value = apply_attribute(&info.attribute, values, builder);
                let under = *state_stack.last().expect("state stack never empties mid-reduce");
                let goto_state = table
                    .goto_state(under, &info.left)
                    .unwrap_or_else(|| panic!("missing goto({}, {})", under.0, info.left));
                symbol_stack.push(ParserSymbol {
                    name: info.left.clone(),
                    value,
                });
                state_stack.push(goto_state);
            }
            Some(Action::Accept) => {
                return Ok(symbol_stack.pop().expect("accept always follows at least one reduce").value);
            }
            None => {
                return Err(ParseError {
                    found: curr_tok.name.clone(),
                    lexeme: curr_tok.lexeme.clone(),
                    line: curr_tok.line,
                    column: curr_tok.column,
                    expected: table.expected_terminals(curr_state),
                });
            }
        }
    }
}
