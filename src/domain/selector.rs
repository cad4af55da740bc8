//! Selector engine for the CSS subset the overlay configuration uses
//!
//! Supported: selector lists (`a, b`), `*`, tag names, `.class`,
//! `[attr]`, `[attr="v"]`, `[attr~="v"]`, `[attr*="v"]`, `[attr^="v"]`,
//! `[attr$="v"]`, and the child (`>`) and descendant (whitespace) combinators.

use std::fmt;
use std::str::FromStr;

use crate::domain::document::{Document, NodeId};
use crate::domain::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    Contains,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    test: Option<(AttrOp, String)>,
}

impl AttributeSelector {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(actual) = document.attribute_value(node, &self.name) else {
            return false;
        };
        match &self.test {
            None => true,
            Some((AttrOp::Equals, v)) => actual == v.as_str(),
            Some((AttrOp::Includes, v)) => actual.split_whitespace().any(|w| w == v),
            // Empty operands never match, as in CSS
            Some((AttrOp::Contains, v)) => !v.is_empty() && actual.contains(v.as_str()),
            Some((AttrOp::Prefix, v)) => !v.is_empty() && actual.starts_with(v.as_str()),
            Some((AttrOp::Suffix, v)) => !v.is_empty() && actual.ends_with(v.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != element.tag() {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| element.classes().iter().any(|c| c == class))
            && self.attributes.iter().all(|a| a.matches(document, node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Child,
    Descendant,
}

/// `compounds[i]` and `compounds[i + 1]` are joined by `combinators[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.matches_at(document, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, document: &Document, node: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(document, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => document
                .parent(node)
                .is_some_and(|p| self.matches_at(document, p, idx - 1)),
            Combinator::Descendant => {
                let mut current = document.parent(node);
                while let Some(ancestor) = current {
                    if self.matches_at(document, ancestor, idx - 1) {
                        return true;
                    }
                    current = document.parent(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(source: &str) -> DomainResult<Self> {
        Parser::new(source).parse_list()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(document, node))
    }

    /// First match in document order within `scope` (inclusive).
    pub fn first(&self, document: &Document, scope: NodeId) -> Option<NodeId> {
        document
            .subtree(scope)
            .find(|&node| self.matches(document, node))
    }

    /// Every match in document order within `scope` (inclusive).
    pub fn all(&self, document: &Document, scope: NodeId) -> Vec<NodeId> {
        document
            .subtree(scope)
            .filter(|&node| self.matches(document, node))
            .collect()
    }
}

impl FromStr for SelectorList {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Document {
    /// `document.querySelector` over the whole document.
    pub fn query_selector(&self, selector: &SelectorList) -> Option<NodeId> {
        selector.first(self, self.root())
    }

    /// `document.querySelectorAll` over the whole document.
    pub fn query_selector_all(&self, selector: &SelectorList) -> Vec<NodeId> {
        selector.all(self, self.root())
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> DomainError {
        DomainError::selector(self.source, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn expect(&mut self, wanted: char) -> DomainResult<()> {
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(self.error(format!("expected `{wanted}`, found `{c}`"))),
            None => Err(self.error(format!("expected `{wanted}`, found end of input"))),
        }
    }

    fn parse_list(mut self) -> DomainResult<SelectorList> {
        let mut selectors = vec![self.parse_complex()?];
        while self.peek() == Some(',') {
            self.bump();
            selectors.push(self.parse_complex()?);
        }
        if let Some(c) = self.peek() {
            return Err(self.error(format!("unexpected `{c}`")));
        }
        Ok(SelectorList {
            source: self.source.trim().to_string(),
            selectors,
        })
    }

    fn parse_complex(&mut self) -> DomainResult<ComplexSelector> {
        self.skip_whitespace();
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> DomainResult<Compound> {
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.bump();
            compound.tag = Some("*".to_string());
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error("empty compound selector"));
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> DomainResult<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attribute(&mut self) -> DomainResult<AttributeSelector> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(AttributeSelector { name, test: None });
            }
            Some('=') => AttrOp::Equals,
            Some(c) => {
                let op = match c {
                    '~' => AttrOp::Includes,
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    other => return Err(self.error(format!("unknown attribute operator `{other}`"))),
                };
                self.bump();
                if self.peek() != Some('=') {
                    return Err(self.error("expected `=` in attribute selector"));
                }
                op
            }
            None => return Err(self.error("unterminated attribute selector")),
        };
        self.expect('=')?;
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.expect(quote)?;
                value
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(AttributeSelector {
            name,
            test: Some((op, value)),
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
