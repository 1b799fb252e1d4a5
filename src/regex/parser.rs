//! Hand-rolled recursive-descent parser for the regex literal grammar.
//! Deliberately not built on `crate::lr`: the regex grammar is small
//! and fixed, and the LR(1) generator needs a working lexer to bootstrap at all,
//! so a tiny direct-coded parser breaks the chicken-and-egg loop the same way
//! `toolchain/regx_engine`'s own tokenizer/parser pair does in the original.
use super::{is_reserved, ClassItem, RegexError, RegexNode};

pub fn parse_regex(source: &str) -> Result<RegexNode, RegexError> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
    };
    let node = parser.parse_alt()?;
    if parser.pos != parser.chars.len() {
        return Err(RegexError::new(format!(
            "trailing input at position {}",
            parser.pos
        )));
    }
    Ok(node)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> Result<(), RegexError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(RegexError::new(format!(
                "expected '{}' at position {}",
                expected, self.pos
            )))
        }
    }

    // alt := concat ('|' concat)*
    fn parse_alt(&mut self) -> Result<RegexNode, RegexError> {
        let mut node = self.parse_concat()?;
        while self.peek() == Some('|') {
            self.pos += 1;
            let rhs = self.parse_concat()?;
            node = RegexNode::Alternation(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    // concat := closure+ ; an empty concat (e.g. the RHS of a trailing '|') is a
    // parse error - an empty regex alternation branch is rejected.
    fn parse_concat(&mut self) -> Result<RegexNode, RegexError> {
        if !self.starts_closure() {
            return Err(RegexError::new(format!(
                "expected an alternative at position {}",
                self.pos
            )));
        }
        let mut node = self.parse_closure()?;
        while self.starts_closure() {
            let next = self.parse_closure()?;
            node = RegexNode::Concatenation(Box::new(node), Box::new(next));
        }
        Ok(node)
    }

    fn starts_closure(&self) -> bool {
        !matches!(self.peek(), None | Some('|') | Some(')'))
    }

    // closure := atom ('*' | '+' | '?')?
    fn parse_closure(&mut self) -> Result<RegexNode, RegexError> {
        let atom = self.parse_atom()?;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                Ok(RegexNode::KleeneStar(Box::new(atom)))
            }
            Some('+') => {
                self.pos += 1;
                Ok(RegexNode::KleenePlus(Box::new(atom)))
            }
            Some('?') => {
                self.pos += 1;
                Ok(RegexNode::Maybe(Box::new(atom)))
            }
            _ => Ok(atom),
        }
    }

    // atom := '(' ('?P<' name '>')? alt ')' | '[' '^'? classItem+ ']' | '\' c | '.' | char
    fn parse_atom(&mut self) -> Result<RegexNode, RegexError> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let name = self.try_parse_named_prefix();
                let inner = self.parse_alt()?;
                self.eat(')')?;
                Ok(match name {
                    Some(n) => RegexNode::NamedGroup(n, Box::new(inner)),
                    None => RegexNode::Group(Box::new(inner)),
                })
            }
            Some('[') => {
                self.pos += 1;
                let negative = if self.peek() == Some('^') {
                    self.pos += 1;
                    true
                } else {
                    false
                };
                let items = self.parse_class_items()?;
                self.eat(']')?;
                Ok(if negative {
                    RegexNode::NegativeSet(items)
                } else {
                    RegexNode::PositiveSet(items)
                })
            }
            Some('\\') => {
                self.pos += 1;
                let c = self
                    .bump()
                    .ok_or_else(|| RegexError::new("dangling escape at end of pattern".into()))?;
                Ok(RegexNode::EscapedOrShorthand(c))
            }
            Some('.') => {
                self.pos += 1;
                Ok(RegexNode::Dot)
            }
            Some(c) if !is_reserved(c) => {
                self.pos += 1;
                Ok(RegexNode::Char(c))
            }
            Some(c) => Err(RegexError::new(format!(
                "unexpected '{}' at position {}",
                c, self.pos
            ))),
            None => Err(RegexError::new(format!(
                "unexpected end of pattern at position {}",
                self.pos
            ))),
        }
    }

    fn try_parse_named_prefix(&mut self) -> Option<String> {
        if self.peek() != Some('?') {
            return None;
        }
        if self.peek_at(1) != Some('P') || self.peek_at(2) != Some('<') {
            return None;
        }
        let mut probe = self.pos + 3;
        let name_start = probe;
        while let Some(c) = self.chars.get(probe).copied() {
            if c == '>' {
                break;
            }
            probe += 1;
        }
        if self.chars.get(probe) != Some(&'>') {
            return None;
        }
        let name: String = self.chars[name_start..probe].iter().collect();
        self.pos = probe + 1;
        Some(name)
    }

    fn parse_class_items(&mut self) -> Result<Vec<ClassItem>, RegexError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(RegexError::new("unterminated character class".into())),
                Some(']') => break,
                Some('\\') => {
                    self.pos += 1;
                    let c = self.bump().ok_or_else(|| {
                        RegexError::new("dangling escape in character class".into())
                    })?;
                    items.push(ClassItem::Shorthand(c));
                }
                Some(lo) => {
                    self.pos += 1;
                    let is_range = self.peek() == Some('-')
                        && !matches!(self.peek_at(1), None | Some(']'));
                    if is_range {
                        self.pos += 1;
                        let hi = self.bump().ok_or_else(|| {
                            RegexError::new("dangling range in character class".into())
                        })?;
                        if lo > hi {
                            return Err(RegexError::new(format!(
                                "inverted character range '{}-{}'",
                                lo, hi
                            )));
                        }
                        items.push(ClassItem::Range(lo, hi));
                    } else {
                        items.push(ClassItem::Char(lo));
                    }
                }
            }
        }
        Ok(items)
    }
}
