//! Incremental Earley parser driven by a [`CompiledGrammar`].
//!
//! Source is fed one line at a time. Tokens accumulate in a chart until they
//! form a complete start-rule derivation, at which point the statement is
//! extracted, cleaned up according to the grammar's instructions, and the
//! chart restarts. Statements may therefore span several lines (blocks,
//! block-bodied functions) while single-line statements come out as soon as
//! their line is fed.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::{GrammarError, ParseError};
use crate::grammar::{self, CompiledGrammar, Instruction, Symbol};
use crate::lexer::{Category, Token, significant_tokens};
use crate::syntax::RawNode;

/// How many distinct derivations extraction looks for. Two is enough to
/// prove ambiguity.
const DERIVATION_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Item {
    rule: usize,
    alt: usize,
    dot: usize,
    origin: usize,
}

impl Item {
    fn advance(self) -> Item {
        Item {
            dot: self.dot + 1,
            ..self
        }
    }
}

#[derive(Debug, Default)]
struct ItemSet {
    items: Vec<Item>,
    seen: HashSet<Item>,
}

impl ItemSet {
    fn add(&mut self, item: Item) {
        if self.seen.insert(item) {
            self.items.push(item);
        }
    }

    fn contains(&self, item: &Item) -> bool {
        self.seen.contains(item)
    }
}

/// One parse of a source text, fed line by line.
pub struct ParseSession<'g> {
    grammar: &'g CompiledGrammar,
    tokens: Vec<Token>,
    chart: Vec<ItemSet>,
    /// Token count of a complete statement that the chart was still
    /// extending when last checked.
    completed: Option<usize>,
    line: usize,
    poisoned: Option<ParseError>,
}

impl ParseSession<'static> {
    /// A session over the standard Glyph grammar.
    pub fn standard() -> Result<Self, GrammarError> {
        Ok(ParseSession::new(grammar::standard()?))
    }
}

impl<'g> ParseSession<'g> {
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        let mut session = ParseSession {
            grammar,
            tokens: Vec::new(),
            chart: Vec::new(),
            completed: None,
            line: 0,
            poisoned: None,
        };
        session.restart();
        session
    }

    /// Whether tokens of an unfinished statement are waiting for more lines.
    pub fn has_pending(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Feed the next source line and return the statements it completed.
    ///
    /// The first error poisons the session: every later call, and
    /// [`finish`](Self::finish), reports the same error again.
    pub fn feed_line(&mut self, text: &str) -> Result<Vec<RawNode>, ParseError> {
        if let Some(error) = &self.poisoned {
            return Err(error.clone());
        }
        self.line += 1;
        let mut statements = Vec::new();
        for token in significant_tokens(text, self.line) {
            if let Err(error) = self.push(token, &mut statements) {
                self.poisoned = Some(error.clone());
                return Err(error);
            }
        }
        Ok(statements)
    }

    /// End of input. Returns a statement held back because the chart could
    /// still have extended it, and fails if an unfinished statement remains.
    pub fn finish(&mut self) -> Result<Vec<RawNode>, ParseError> {
        if let Some(error) = &self.poisoned {
            return Err(error.clone());
        }
        let mut statements = Vec::new();
        while let Some(length) = self.completed.take() {
            let flushed = self.extract(length).and_then(|statement| {
                statements.push(statement);
                let rest = self.tokens.split_off(length);
                self.restart();
                rest.into_iter()
                    .try_for_each(|token| self.push(token, &mut statements))
            });
            if let Err(error) = flushed {
                self.poisoned = Some(error.clone());
                return Err(error);
            }
        }
        if self.has_pending() {
            let error = ParseError::NoDerivation {
                unconsumed: describe_tokens(&self.tokens),
            };
            self.poisoned = Some(error.clone());
            return Err(error);
        }
        Ok(statements)
    }

    fn restart(&mut self) {
        self.tokens.clear();
        self.completed = None;
        let mut initial = ItemSet::default();
        let start = self.grammar.start();
        for alt in 0..self.grammar.rule(start).alternatives.len() {
            initial.add(Item {
                rule: start,
                alt,
                dot: 0,
                origin: 0,
            });
        }
        self.chart = vec![initial];
        self.close(0);
    }

    fn push(&mut self, token: Token, out: &mut Vec<RawNode>) -> Result<(), ParseError> {
        if token.category == Category::Unrecognized {
            return Err(ParseError::Unrecognized {
                text: token.text,
                position: token.position,
            });
        }

        let next = self.scan(&token);
        if next.items.is_empty() {
            let Some(length) = self.completed.take() else {
                return Err(self.unexpected(&token));
            };
            // The held-back statement was the longest one available.
            out.push(self.extract(length)?);
            let rest = self.tokens.split_off(length);
            self.restart();
            for pending in rest {
                self.push(pending, out)?;
            }
            return self.push(token, out);
        }

        let end_of_line = token.category == Category::EndOfLine;
        self.tokens.push(token);
        self.chart.push(next);
        let end = self.chart.len() - 1;
        self.close(end);
        if end_of_line {
            self.check_complete(out)?;
        }
        Ok(())
    }

    fn scan(&self, token: &Token) -> ItemSet {
        let mut next = ItemSet::default();
        let Some(current) = self.chart.last() else {
            return next;
        };
        for item in &current.items {
            let alternative = &self.grammar.rule(item.rule).alternatives[item.alt];
            if alternative.get(item.dot).is_some_and(|symbol| symbol.matches(token)) {
                next.add(item.advance());
            }
        }
        next
    }

    /// Predict and complete until the set at `index` is closed.
    fn close(&mut self, index: usize) {
        let grammar = self.grammar;
        let mut cursor = 0;
        while cursor < self.chart[index].items.len() {
            let item = self.chart[index].items[cursor];
            cursor += 1;
            let alternative = &grammar.rule(item.rule).alternatives[item.alt];
            match alternative.get(item.dot) {
                Some(Symbol::Rule(predicted)) => {
                    for alt in 0..grammar.rule(*predicted).alternatives.len() {
                        self.chart[index].add(Item {
                            rule: *predicted,
                            alt,
                            dot: 0,
                            origin: index,
                        });
                    }
                }
                Some(_) => {}
                None => {
                    let advanced: Vec<Item> = self.chart[item.origin]
                        .items
                        .iter()
                        .filter(|parent| {
                            grammar.rule(parent.rule).alternatives[parent.alt].get(parent.dot)
                                == Some(&Symbol::Rule(item.rule))
                        })
                        .map(|parent| parent.advance())
                        .collect();
                    for parent in advanced {
                        self.chart[index].add(parent);
                    }
                }
            }
        }
    }

    fn check_complete(&mut self, out: &mut Vec<RawNode>) -> Result<(), ParseError> {
        let Some(last) = self.chart.last() else {
            return Ok(());
        };
        let grammar = self.grammar;
        let start = grammar.start();
        let complete = last.items.iter().any(|item| {
            item.rule == start
                && item.origin == 0
                && item.dot == grammar.rule(start).alternatives[item.alt].len()
        });
        if !complete {
            return Ok(());
        }
        let extendable = last
            .items
            .iter()
            .any(|item| item.dot < grammar.rule(item.rule).alternatives[item.alt].len());
        if extendable {
            self.completed = Some(self.tokens.len());
        } else {
            let length = self.tokens.len();
            out.push(self.extract(length)?);
            self.restart();
        }
        Ok(())
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        let expected: BTreeSet<String> = self
            .chart
            .last()
            .map(|set| {
                set.items
                    .iter()
                    .filter_map(|item| {
                        self.grammar.rule(item.rule).alternatives[item.alt].get(item.dot)
                    })
                    .filter(|symbol| symbol.is_terminal())
                    .map(|symbol| self.grammar.describe(symbol))
                    .collect()
            })
            .unwrap_or_default();
        ParseError::UnexpectedToken {
            found: describe_token(token),
            position: token.position,
            expected: expected.into_iter().collect(),
        }
    }

    /// Build the cleaned tree of the statement made of the first `length`
    /// pending tokens.
    fn extract(&self, length: usize) -> Result<RawNode, ParseError> {
        let mut extractor = Extractor {
            grammar: self.grammar,
            tokens: &self.tokens[..length],
            chart: &self.chart,
            memo: HashMap::new(),
            active: HashSet::new(),
        };
        let start = self.grammar.start();
        let mut trees = Vec::new();
        for cleaned in extractor.derive(start, 0, length)? {
            match cleaned {
                Cleaned::Single(node) => trees.push(node),
                Cleaned::Dropped | Cleaned::Splice(_) => {
                    return Err(ParseError::Cleanup {
                        rule: self.grammar.rule(start).name.clone(),
                        message: "the start rule must produce exactly one node".to_string(),
                    });
                }
            }
        }

        match trees.len() {
            0 => Err(ParseError::NoDerivation {
                unconsumed: describe_tokens(&self.tokens[..length]),
            }),
            1 => {
                let tree = trees.remove(0);
                debug!(line = self.line, tokens = length, "extracted statement");
                Ok(tree)
            }
            _ => Err(ParseError::Ambiguous {
                report: divergence_report(&trees[0], &trees[1]),
            }),
        }
    }
}

/// Parse a whole source text into raw statements.
pub fn parse_source(grammar: &CompiledGrammar, source: &str) -> Result<Vec<RawNode>, ParseError> {
    let mut session = ParseSession::new(grammar);
    let mut statements = Vec::new();
    for line in source.lines() {
        statements.extend(session.feed_line(line)?);
    }
    statements.extend(session.finish()?);
    Ok(statements)
}

fn describe_token(token: &Token) -> String {
    match token.category {
        Category::EndOfLine => "end of line".to_string(),
        _ => format!("`{}`", token.text),
    }
}

fn describe_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|token| token.category != Category::EndOfLine)
        .map(|token| token.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------
// Tree extraction and cleanup
// ---------------------------------------------------------------------

/// What a completed rule contributes to its parent after cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cleaned {
    Dropped,
    Single(RawNode),
    Splice(Vec<RawNode>),
}

impl Cleaned {
    fn append_to(&self, children: &mut Vec<RawNode>) {
        match self {
            Cleaned::Dropped => {}
            Cleaned::Single(node) => children.push(node.clone()),
            Cleaned::Splice(nodes) => children.extend(nodes.iter().cloned()),
        }
    }
}

struct Extractor<'a> {
    grammar: &'a CompiledGrammar,
    tokens: &'a [Token],
    chart: &'a [ItemSet],
    memo: HashMap<(usize, usize, usize), Vec<Cleaned>>,
    active: HashSet<(usize, usize, usize)>,
}

impl Extractor<'_> {
    /// Up to [`DERIVATION_LIMIT`] distinct cleaned derivations of `rule`
    /// over tokens `start..end`.
    fn derive(&mut self, rule: usize, start: usize, end: usize) -> Result<Vec<Cleaned>, ParseError> {
        let key = (rule, start, end);
        if let Some(done) = self.memo.get(&key) {
            return Ok(done.clone());
        }
        // A unit cycle over the same span adds no new trees.
        if !self.active.insert(key) {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let alternatives = self.grammar.rule(rule).alternatives.len();
        'alternatives: for alt in 0..alternatives {
            let length = self.grammar.rule(rule).alternatives[alt].len();
            let complete = Item {
                rule,
                alt,
                dot: length,
                origin: start,
            };
            if !self.chart[end].contains(&complete) {
                continue;
            }
            for children in self.derive_sequence(rule, alt, start, 0, start, end)? {
                let cleaned = self.clean(rule, children)?;
                if !results.contains(&cleaned) {
                    results.push(cleaned);
                }
                if results.len() >= DERIVATION_LIMIT {
                    break 'alternatives;
                }
            }
        }

        self.active.remove(&key);
        self.memo.insert(key, results.clone());
        Ok(results)
    }

    /// Children lists for symbols `index..` of an alternative spanning
    /// `position..end`.
    fn derive_sequence(
        &mut self,
        rule: usize,
        alt: usize,
        origin: usize,
        index: usize,
        position: usize,
        end: usize,
    ) -> Result<Vec<Vec<RawNode>>, ParseError> {
        let grammar = self.grammar;
        let symbols = &grammar.rule(rule).alternatives[alt];
        if index == symbols.len() {
            return Ok(if position == end { vec![Vec::new()] } else { Vec::new() });
        }
        // Every remaining symbol covers at least one token.
        let remaining = symbols.len() - index - 1;
        if position + remaining >= end {
            return Ok(Vec::new());
        }

        let mut results: Vec<Vec<RawNode>> = Vec::new();
        match &symbols[index] {
            Symbol::Rule(child) => {
                for split in position + 1..=end - remaining {
                    let reached = Item {
                        rule,
                        alt,
                        dot: index + 1,
                        origin,
                    };
                    if !self.chart[split].contains(&reached) {
                        continue;
                    }
                    let heads = self.derive(*child, position, split)?;
                    if heads.is_empty() {
                        continue;
                    }
                    let tails = self.derive_sequence(rule, alt, origin, index + 1, split, end)?;
                    for head in &heads {
                        for tail in &tails {
                            let mut children = Vec::new();
                            head.append_to(&mut children);
                            children.extend(tail.iter().cloned());
                            if !results.contains(&children) {
                                results.push(children);
                            }
                            if results.len() >= DERIVATION_LIMIT {
                                return Ok(results);
                            }
                        }
                    }
                }
            }
            terminal => {
                let token = &self.tokens[position];
                if terminal.matches(token) {
                    for tail in self.derive_sequence(rule, alt, origin, index + 1, position + 1, end)? {
                        let mut children = vec![RawNode::Leaf(token.clone())];
                        children.extend(tail);
                        results.push(children);
                    }
                }
            }
        }
        Ok(results)
    }

    fn clean(&self, rule: usize, mut children: Vec<RawNode>) -> Result<Cleaned, ParseError> {
        let rule = self.grammar.rule(rule);
        let cleaned = match (rule.instruction, rule.kind) {
            (Instruction::Discard, _) => Cleaned::Dropped,
            (Instruction::UnwrapSingleChild, _) => {
                if children.len() != 1 {
                    return Err(ParseError::Cleanup {
                        rule: rule.name.clone(),
                        message: format!("expected one child, found {}", children.len()),
                    });
                }
                Cleaned::Single(children.remove(0))
            }
            (Instruction::FlattenChildren, _) => Cleaned::Splice(children),
            (Instruction::FlattenOrWrap, Some(kind)) => {
                if children.len() == 1 {
                    Cleaned::Single(children.remove(0))
                } else {
                    Cleaned::Single(RawNode::Branch(kind, children))
                }
            }
            (Instruction::Wrap, Some(kind)) => Cleaned::Single(RawNode::Branch(kind, children)),
            (Instruction::FlattenOrWrap | Instruction::Wrap, None) => {
                return Err(ParseError::Cleanup {
                    rule: rule.name.clone(),
                    message: "no node kind to wrap with".to_string(),
                });
            }
        };
        Ok(cleaned)
    }
}

/// Describe where two derivations of the same tokens first disagree.
///
/// Both trees are walked together while their shapes agree; the report names
/// the path to the shallowest pair of nodes whose canonical forms differ and
/// cannot be explained by a single differing child.
pub fn divergence_report(left: &RawNode, right: &RawNode) -> String {
    let mut path = Vec::new();
    let (mut left, mut right) = (left, right);
    loop {
        let same_shape = left.kind().is_some()
            && left.kind() == right.kind()
            && left.children().len() == right.children().len();
        let differing: Vec<usize> = if same_shape {
            left.children()
                .iter()
                .zip(right.children())
                .enumerate()
                .filter(|(_, (l, r))| l.canonical() != r.canonical())
                .map(|(index, _)| index)
                .collect()
        } else {
            Vec::new()
        };
        match (left.kind(), differing.as_slice()) {
            (Some(kind), [child]) => {
                path.push(format!("{kind}[{child}]"));
                left = &left.children()[*child];
                right = &right.children()[*child];
            }
            _ => break,
        }
    }
    let location = if path.is_empty() {
        "the statement root".to_string()
    } else {
        path.join(" > ")
    };
    format!(
        "derivations diverge at {location}: {} versus {}",
        left.canonical(),
        right.canonical()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::compile;

    fn parse_one(line: &str) -> String {
        let mut session = ParseSession::standard().expect("grammar");
        let statements = session.feed_line(line).expect("parse");
        assert_eq!(statements.len(), 1, "one statement from {line:?}");
        statements[0].canonical()
    }

    #[test]
    fn parses_assignment_with_precedence() {
        assert_eq!(
            parse_one("iX = 1 + 2 * 3"),
            r#"(Assignment "iX" (BinaryOp "1" "+" (BinaryOp "2" "*" "3")))"#
        );
        assert_eq!(
            parse_one("iX = 1 - 2 - 3"),
            r#"(Assignment "iX" (BinaryOp (BinaryOp "1" "-" "2") "-" "3"))"#
        );
    }

    #[test]
    fn parses_application_chains() {
        assert_eq!(
            parse_one("iC = fX : 3 : 4 ;"),
            r#"(Assignment "iC" (Call (Apply (Apply "fX" "3") "4")))"#
        );
        assert_eq!(
            parse_one("fX :: (1, 2) ;"),
            r#"(ExpressionStatement (Call (TupleApply "fX" (Tuple "1" "2"))))"#
        );
    }

    #[test]
    fn parses_receivers_and_literals() {
        assert_eq!(
            parse_one("oP.iX = -4"),
            r#"(Assignment (FieldReceiver "oP" "iX") (Negative "4"))"#
        );
        assert_eq!(
            parse_one("tX{(int, string)} = (1, sA)"),
            r#"(Assignment (Annotated "tX" (TupleType "int" "string")) (Tuple "1" "sA"))"#
        );
        assert_eq!(
            parse_one("oPoint = iX iY -> struct"),
            r#"(Assignment "oPoint" (StructConstructor (Params "iX" "iY")))"#
        );
        assert_eq!(
            parse_one("iY = aX[0] + oP.iX"),
            r#"(Assignment "iY" (BinaryOp (Index "aX" "0") "+" (Field "oP" "iX")))"#
        );
    }

    #[test]
    fn blocks_span_lines() {
        let mut session = ParseSession::standard().unwrap();
        assert!(session.feed_line("if bX then").unwrap().is_empty());
        assert!(session.feed_line("  iY = 1").unwrap().is_empty());
        assert!(session.feed_line("else").unwrap().is_empty());
        assert!(session.feed_line("  iY = 2").unwrap().is_empty());
        let done = session.feed_line("endif").unwrap();
        assert_eq!(
            done[0].canonical(),
            r#"(If "bX" (Block (Assignment "iY" "1")) (Else (Block (Assignment "iY" "2"))))"#
        );
        assert!(!session.has_pending());
        assert!(session.finish().unwrap().is_empty());
    }

    #[test]
    fn block_bodied_function_literal() {
        let source = "fiTwice = iA -> do\n  return iA * 2\nenddo\niX = 1";
        let statements = parse_source(grammar::standard().unwrap(), source).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].canonical(),
            r#"(Assignment "fiTwice" (FunctionLiteral (Params "iA") (Block (Return (BinaryOp "iA" "*" "2")))))"#
        );
    }

    #[test]
    fn comments_and_blank_lines_produce_nothing() {
        let mut session = ParseSession::standard().unwrap();
        assert!(session.feed_line("").unwrap().is_empty());
        assert!(session.feed_line("   # just a note").unwrap().is_empty());
        assert!(!session.has_pending());
    }

    #[test]
    fn unexpected_token_poisons_the_session() {
        let mut session = ParseSession::standard().unwrap();
        let err = session.feed_line("iX = = 3").unwrap_err();
        match &err {
            ParseError::UnexpectedToken {
                found,
                position,
                expected,
            } => {
                assert_eq!(found, "`=`");
                assert_eq!(position.column, 6);
                assert!(expected.contains(&"constant".to_string()));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(session.feed_line("iY = 1").unwrap_err(), err);
        assert_eq!(session.finish().unwrap_err(), err);
    }

    #[test]
    fn unrecognized_input_is_reported() {
        let mut session = ParseSession::standard().unwrap();
        let err = session.feed_line("iX = 3 $ 4").unwrap_err();
        assert!(matches!(err, ParseError::Unrecognized { ref text, .. } if text == "$"));
    }

    #[test]
    fn unfinished_statement_fails_at_finish() {
        let mut session = ParseSession::standard().unwrap();
        session.feed_line("while bX do").unwrap();
        assert_eq!(
            session.finish().unwrap_err(),
            ParseError::NoDerivation {
                unconsumed: "while bX do".to_string()
            }
        );
    }

    #[test]
    fn ambiguous_grammar_reports_divergence() {
        let grammar = compile(
            "line : wrap ExpressionStatement = sum EOL ;\n\
             sum : flatten-or-wrap BinaryOp = sum plus sum | CONSTANT ;\n\
             plus : unwrap-single-child = \"+\" ;",
        )
        .unwrap();
        let mut session = ParseSession::new(&grammar);
        let err = session.feed_line("1 + 2 + 3").unwrap_err();
        let ParseError::Ambiguous { report } = &err else {
            panic!("expected ambiguity, got {err:?}");
        };
        assert!(report.starts_with("derivations diverge at ExpressionStatement[0]"));
        assert!(report.contains(r#"(BinaryOp (BinaryOp "1" "+" "2") "+" "3")"#));
        assert!(report.contains(r#"(BinaryOp "1" "+" (BinaryOp "2" "+" "3"))"#));
        assert_eq!(session.finish().unwrap_err(), err);
    }

    #[test]
    fn held_back_statement_is_emitted_when_extension_dies() {
        // `a` alone is a statement, but `a` followed by `b` on the next line
        // is a longer one.
        let grammar = compile(
            "stmt : wrap Block = one | two ;\n\
             one : wrap Return = IDENTIFIER EOL ;\n\
             two : wrap Do = IDENTIFIER EOL CONSTANT EOL ;",
        )
        .unwrap();
        let mut session = ParseSession::new(&grammar);
        assert!(session.feed_line("iA").unwrap().is_empty());
        let out = session.feed_line("iB").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].canonical(), r#"(Block (Return "iA" ""))"#);
        let rest = session.finish().unwrap();
        assert_eq!(rest[0].canonical(), r#"(Block (Return "iB" ""))"#);
    }
}
