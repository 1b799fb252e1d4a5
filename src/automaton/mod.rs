//! Finite automata with epsilon transitions and a generic powerset construction.
//!
//! [Automaton] is the leaf layer of the toolchain: the regex engine (`crate::regex`)
//! evaluates a regex AST into an `Automaton<char, String>` and determinizes it, while
//! the LR(1) table builder (`crate::lr`) runs the very same [powerset_construct] over
//! LR(1) items to build the parser's canonical DFA. Keeping the construction generic
//! over the transition alphabet and the state "content" tag is what lets both callers
//! share one implementation.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stable identity of a state within an [Automaton]. Two states are never considered
/// the same state because their `content` happens to match; identity is positional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub usize);

/// A single automaton state.
///
/// `content` is an ordered set of arbitrary tags. The regex engine stores capture
/// group open/close markers there; the LR(1) builder stores the item set. Content
/// never participates in state identity - see the module docs.
#[derive(Debug, Clone)]
pub struct State<Sym, Tag> {
    pub id: StateId,
    pub is_final: bool,
    pub content: BTreeSet<Tag>,
    pub transitions: BTreeMap<Sym, StateId>,
    pub epsilon: Vec<StateId>,
}

impl<Sym: Ord, Tag: Ord> State<Sym, Tag> {
    fn new(id: StateId, is_final: bool, content: BTreeSet<Tag>) -> Self {
        Self {
            id,
            is_final,
            content,
            transitions: BTreeMap::new(),
            epsilon: Vec::new(),
        }
    }
}

/// A graph of states, arena-indexed by [StateId]. Immutable once built (automata are
/// constructed once ahead of time and never mutated afterward; see `crate::lr` and
/// `crate::regex` for the two producers).
#[derive(Debug, Clone)]
pub struct Automaton<Sym, Tag> {
    states: Vec<State<Sym, Tag>>,
    start: StateId,
}

impl<Sym: Ord + Clone, Tag: Ord + Clone> Automaton<Sym, Tag> {
    /// Create an automaton with a single, non-final start state.
    pub fn new() -> Self {
        let start = State::new(StateId(0), false, BTreeSet::new());
        Self {
            states: vec![start],
            start: StateId(0),
        }
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn state(&self, id: StateId) -> &State<Sym, Tag> {
        &self.states[id.0]
    }

    pub fn states(&self) -> impl Iterator<Item = &State<Sym, Tag>> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn set_final(&mut self, id: StateId, is_final: bool) {
        self.states[id.0].is_final = is_final;
    }

    /// Add a state carrying `content`, returning its fresh, stable id.
    pub fn add_state(&mut self, is_final: bool, content: BTreeSet<Tag>) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(State::new(id, is_final, content));
        id
    }

    pub fn add_transition(&mut self, from: StateId, symbol: Sym, to: StateId) {
        self.states[from.0].transitions.insert(symbol, to);
    }

    pub fn add_epsilon(&mut self, from: StateId, to: StateId) {
        self.states[from.0].epsilon.push(to);
    }

    /// Attach an extra tag to a state's content set, e.g. a named-capture marker.
    pub fn add_content(&mut self, id: StateId, tag: Tag) {
        self.states[id.0].content.insert(tag);
    }

    pub fn final_states(&self) -> Vec<StateId> {
        self.states
            .iter()
            .filter(|s| s.is_final)
            .map(|s| s.id)
            .collect()
    }

    /// True when no state has an epsilon transition, i.e. this automaton is already
    /// a DFA (see invariant in spec `§3 Automaton`).
    pub fn is_dfa(&self) -> bool {
        self.states.iter().all(|s| s.epsilon.is_empty())
    }

    pub fn goto(&self, states: &BTreeSet<StateId>, symbol: &Sym) -> BTreeSet<StateId> {
        states
            .iter()
            .filter_map(|s| self.state(*s).transitions.get(symbol).copied())
            .collect()
    }

    pub fn epsilon_closure(&self, states: &BTreeSet<StateId>) -> BTreeSet<StateId> {
        let mut visited: BTreeSet<StateId> = BTreeSet::new();
        let mut stack: Vec<StateId> = states.iter().copied().collect();
        while let Some(s) = stack.pop() {
            if visited.insert(s) {
                for &next in &self.state(s).epsilon {
                    if !visited.contains(&next) {
                        stack.push(next);
                    }
                }
            }
        }
        visited
    }

    pub fn alphabet_of(&self, states: &BTreeSet<StateId>) -> BTreeSet<Sym> {
        states
            .iter()
            .flat_map(|s| self.state(*s).transitions.keys().cloned())
            .collect()
    }

    /// Merge `other`'s states into a fresh arena, offsetting every [StateId] so the
    /// two automata no longer collide. Returns the offset applied to `other`.
    fn absorb(&mut self, other: &Automaton<Sym, Tag>) -> usize {
        let offset = self.states.len();
        for state in other.states.iter() {
            let mut content = BTreeSet::new();
            content.extend(state.content.iter().cloned());
            let mut new_state = State::new(StateId(state.id.0 + offset), state.is_final, content);
            new_state.transitions = state
                .transitions
                .iter()
                .map(|(sym, to)| (sym.clone(), StateId(to.0 + offset)))
                .collect();
            new_state.epsilon = state.epsilon.iter().map(|s| StateId(s.0 + offset)).collect();
            self.states.push(new_state);
        }
        offset
    }

    /// Thompson concatenation: `self` followed by `other`. Every final state of
    /// `self` gains an epsilon transition into `other`'s start and stops being final.
    pub fn concat(mut self, other: &Automaton<Sym, Tag>) -> Self {
        let finals = self.final_states();
        let offset = self.absorb(other);
        let other_start = StateId(other.start.0 + offset);
        for f in finals {
            self.states[f.0].epsilon.push(other_start);
            self.states[f.0].is_final = false;
        }
        self
    }

    /// Thompson union: a fresh start state epsilon-branches into `self` and `other`.
    pub fn union(mut self, other: &Automaton<Sym, Tag>) -> Self {
        let old_self_start = self.start;
        let offset = self.absorb(other);
        let other_start = StateId(other.start.0 + offset);
        let dummy = self.add_state(false, BTreeSet::new());
        self.states[dummy.0].epsilon.push(old_self_start);
        self.states[dummy.0].epsilon.push(other_start);
        self.start = dummy;
        self
    }

    /// `self?` - add an epsilon from start directly to every final state.
    pub fn maybe(mut self) -> Self {
        let finals = self.final_states();
        for f in finals {
            self.states[self.start.0].epsilon.push(f);
        }
        self
    }

    /// `self*`/`self+` helper - add an epsilon from every final state back to start.
    pub fn repeat(mut self) -> Self {
        let finals = self.final_states();
        let start = self.start;
        for f in finals {
            self.states[f.0].epsilon.push(start);
        }
        self
    }

    /// Rabin-Scott powerset construction, parameterized exactly as in spec `§4.1`:
    /// an initial item set, a `goto` and `closure` over sets of items, a
    /// `state_builder` that turns a closed item set into `(is_final, tag)`, and an
    /// `alphabet` function enumerating the symbols on which a set can transition.
    ///
    /// `Item` is deliberately abstract: the regex engine instantiates it as
    /// [StateId] (NFA states), while `crate::lr` instantiates it as an LR(1) item.
    pub fn powerset_construct<Item, FGoto, FClosure, FBuild, FAlphabet>(
        initial: Vec<Item>,
        goto: FGoto,
        closure: FClosure,
        state_builder: FBuild,
        alphabet: FAlphabet,
    ) -> (Self, BTreeMap<Vec<Item>, StateId>)
    where
        Item: Ord + Clone,
        FGoto: Fn(&[Item], &Sym) -> Vec<Item>,
        FClosure: Fn(&[Item]) -> Vec<Item>,
        FBuild: Fn(&[Item]) -> (bool, BTreeSet<Tag>),
        FAlphabet: Fn(&[Item]) -> Vec<Sym>,
    {
        let mut dfa = Automaton::new();
        dfa.states.clear();

        let start_closure = sorted_unique(closure(&initial));
        let (start_final, start_tag) = state_builder(&start_closure);
        let start_id = dfa.add_state(start_final, start_tag);
        dfa.start = start_id;

        let mut added: BTreeMap<Vec<Item>, StateId> = BTreeMap::new();
        added.insert(start_closure.clone(), start_id);
        let mut pending = std::collections::VecDeque::new();
        pending.push_back(start_closure);

        while let Some(subset) = pending.pop_front() {
            let from_id = added[&subset];
            for symbol in alphabet(&subset) {
                let moved = sorted_unique(goto(&subset, &symbol));
                let closed = sorted_unique(closure(&moved));
                let to_id = if let Some(existing) = added.get(&closed) {
                    *existing
                } else {
                    let (is_final, tag) = state_builder(&closed);
                    let id = dfa.add_state(is_final, tag);
                    added.insert(closed.clone(), id);
                    pending.push_back(closed);
                    id
                };
                dfa.add_transition(from_id, symbol, to_id);
            }
        }
        (dfa, added)
    }
}

fn sorted_unique<T: Ord + Clone>(mut v: Vec<T>) -> Vec<T> {
    v.sort();
    v.dedup();
    v
}

impl<Sym: Ord + Clone, Tag: Ord + Clone> Default for Automaton<Sym, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_char(c: char) -> Automaton<char, String> {
        let mut a = Automaton::new();
        let start = a.start();
        let final_ = a.add_state(true, BTreeSet::new());
        a.add_transition(start, c, final_);
        a
    }

    #[test]
    fn concat_accepts_sequence() {
        let ab = single_char('a').concat(&single_char('b'));
        assert!(!ab.is_dfa());
        let dfa = determinize(&ab);
        assert!(accepts(&dfa, "ab"));
        assert!(!accepts(&dfa, "a"));
        assert!(!accepts(&dfa, "ba"));
    }

    #[test]
    fn union_accepts_either() {
        let a_or_b = single_char('a').union(&single_char('b'));
        let dfa = determinize(&a_or_b);
        assert!(accepts(&dfa, "a"));
        assert!(accepts(&dfa, "b"));
        assert!(!accepts(&dfa, "c"));
    }

    #[test]
    fn repeat_accepts_kleene_star_language() {
        let a_star = single_char('a').repeat().maybe();
        let dfa = determinize(&a_star);
        assert!(accepts(&dfa, ""));
        assert!(accepts(&dfa, "aaa"));
        assert!(!accepts(&dfa, "aab"));
    }

    #[test]
    fn determinizing_a_dfa_is_a_no_op_up_to_renaming() {
        let dfa = determinize(&single_char('a'));
        assert!(dfa.is_dfa());
        let dfa2 = determinize(&dfa);
        assert_eq!(dfa.len(), dfa2.len());
    }

    fn determinize(nfa: &Automaton<char, String>) -> Automaton<char, String> {
        let goto = |states: &[StateId], sym: &char| -> Vec<StateId> {
            let set: BTreeSet<StateId> = states.iter().copied().collect();
            nfa.goto(&set, sym).into_iter().collect()
        };
        let closure = |states: &[StateId]| -> Vec<StateId> {
            let set: BTreeSet<StateId> = states.iter().copied().collect();
            nfa.epsilon_closure(&set).into_iter().collect()
        };
        let state_builder = |states: &[StateId]| -> (bool, BTreeSet<String>) {
            let is_final = states.iter().any(|s| nfa.state(*s).is_final);
            (is_final, BTreeSet::new())
        };
        let alphabet = |states: &[StateId]| -> Vec<char> {
            let set: BTreeSet<StateId> = states.iter().copied().collect();
            nfa.alphabet_of(&set).into_iter().collect()
        };
        let (dfa, _) =
            Automaton::powerset_construct(vec![nfa.start()], goto, closure, state_builder, alphabet);
        dfa
    }

    fn accepts(dfa: &Automaton<char, String>, input: &str) -> bool {
        let mut state = dfa.start();
        for c in input.chars() {
            match dfa.state(state).transitions.get(&c) {
                Some(next) => state = *next,
                None => return false,
            }
        }
        dfa.state(state).is_final
    }
}
