//! Grammar engine: compiles declarative grammar text into parser tables.
//!
//! ```text
//! sum : flatten-or-wrap BinaryOp = sum add_op product | product ;
//! ```
//!
//! Each rule names one cleanup instruction and, for the wrapping
//! instructions, the [`NodeKind`] of the branch it builds. Symbols are token
//! categories (`IDENTIFIER`), literal token text (`"+"`), or rule references
//! (`product`). The first rule is the start rule.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::GrammarError;
use crate::lexer::{Category, Token};
use crate::syntax::NodeKind;

/// Text of the standard Glyph grammar.
pub const STANDARD_GRAMMAR: &str = include_str!("glyph.grammar");

/// What cleanup does with a node of a rule once the node is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Drop the node and everything under it.
    Discard,
    /// Replace the node by its only surviving child.
    UnwrapSingleChild,
    /// Splice the surviving children into the parent.
    FlattenChildren,
    /// Substitute a lone child, wrap two or more.
    FlattenOrWrap,
    /// Always build a branch of the rule's kind.
    Wrap,
}

impl Instruction {
    fn from_name(name: &str) -> Option<Instruction> {
        let instruction = match name {
            "discard" => Instruction::Discard,
            "unwrap-single-child" => Instruction::UnwrapSingleChild,
            "flatten-children" => Instruction::FlattenChildren,
            "flatten-or-wrap" => Instruction::FlattenOrWrap,
            "wrap" => Instruction::Wrap,
            _ => return None,
        };
        Some(instruction)
    }

    fn takes_kind(self) -> bool {
        matches!(self, Instruction::Wrap | Instruction::FlattenOrWrap)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instruction::Discard => "discard",
            Instruction::UnwrapSingleChild => "unwrap-single-child",
            Instruction::FlattenChildren => "flatten-children",
            Instruction::FlattenOrWrap => "flatten-or-wrap",
            Instruction::Wrap => "wrap",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Category(Category),
    Literal(String),
    /// Index into [`CompiledGrammar::rules`].
    Rule(usize),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Symbol::Rule(_))
    }

    /// Whether a terminal symbol accepts `token`. Rule references never do.
    pub fn matches(&self, token: &Token) -> bool {
        match self {
            Symbol::Category(category) => token.category == *category,
            Symbol::Literal(text) => token.category != Category::Constant && token.text == *text,
            Symbol::Rule(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub instruction: Instruction,
    pub kind: Option<NodeKind>,
    pub alternatives: Vec<Vec<Symbol>>,
}

/// Validated rules ready for the Earley parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGrammar {
    rules: Vec<Rule>,
}

impl CompiledGrammar {
    pub fn start(&self) -> usize {
        0
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.name == name)
    }

    /// Human-readable form of a terminal, used in "expected ..." messages.
    pub fn describe(&self, symbol: &Symbol) -> String {
        match symbol {
            Symbol::Category(Category::EndOfLine) => "end of line".to_string(),
            Symbol::Category(category) => category.grammar_name().to_lowercase(),
            Symbol::Literal(text) => format!("`{text}`"),
            Symbol::Rule(index) => self.rules[*index].name.clone(),
        }
    }
}

/// The standard Glyph grammar, compiled once per process.
pub fn standard() -> Result<&'static CompiledGrammar, GrammarError> {
    static STANDARD: OnceLock<Result<CompiledGrammar, GrammarError>> = OnceLock::new();
    STANDARD
        .get_or_init(|| compile(STANDARD_GRAMMAR))
        .as_ref()
        .map_err(Clone::clone)
}

/// Compile grammar text. Pure and deterministic; fails on the first
/// offending rule.
pub fn compile(text: &str) -> Result<CompiledGrammar, GrammarError> {
    let raw_rules = RuleReader::new(text).read_all()?;
    if raw_rules.is_empty() {
        return Err(GrammarError::Empty);
    }

    let mut index = HashMap::new();
    for (position, rule) in raw_rules.iter().enumerate() {
        if index.insert(rule.name.clone(), position).is_some() {
            return Err(GrammarError::DuplicateRule {
                rule: rule.name.clone(),
            });
        }
    }

    let mut rules = Vec::with_capacity(raw_rules.len());
    for raw in &raw_rules {
        let kind = match &raw.kind {
            Some(name) => Some(name.parse::<NodeKind>().map_err(|()| {
                GrammarError::UnknownNodeKind {
                    rule: raw.name.clone(),
                    kind: name.clone(),
                }
            })?),
            None => None,
        };

        let mut alternatives = Vec::with_capacity(raw.alternatives.len());
        for alternative in &raw.alternatives {
            if alternative.is_empty() {
                return Err(GrammarError::EmptyAlternative {
                    rule: raw.name.clone(),
                });
            }
            let symbols = alternative
                .iter()
                .map(|word| resolve_symbol(&raw.name, word, &index))
                .collect::<Result<Vec<_>, _>>()?;
            alternatives.push(symbols);
        }

        rules.push(Rule {
            name: raw.name.clone(),
            instruction: raw.instruction,
            kind,
            alternatives,
        });
    }

    let grammar = CompiledGrammar { rules };
    validate(&grammar)?;
    debug!(rules = grammar.rules.len(), "compiled grammar");
    Ok(grammar)
}

fn resolve_symbol(
    rule: &str,
    word: &Word,
    index: &HashMap<String, usize>,
) -> Result<Symbol, GrammarError> {
    match word {
        Word::Literal(text) => Ok(Symbol::Literal(text.clone())),
        Word::Name(name) if is_category_name(name) => Category::from_grammar_name(name)
            .map(Symbol::Category)
            .ok_or_else(|| GrammarError::UnknownCategory {
                rule: rule.to_string(),
                category: name.clone(),
            }),
        Word::Name(name) => index
            .get(name)
            .map(|position| Symbol::Rule(*position))
            .ok_or_else(|| GrammarError::UndefinedRule {
                rule: rule.to_string(),
                reference: name.clone(),
            }),
    }
}

fn is_category_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}

fn validate(grammar: &CompiledGrammar) -> Result<(), GrammarError> {
    let invalid = |rule: &Rule, message: String| GrammarError::InvalidInstruction {
        rule: rule.name.clone(),
        message,
    };

    let start = grammar.rule(grammar.start());
    if matches!(
        start.instruction,
        Instruction::Discard | Instruction::FlattenChildren
    ) {
        return Err(invalid(
            start,
            format!("the start rule cannot use {}", start.instruction),
        ));
    }

    for rule in grammar.rules() {
        match (rule.instruction.takes_kind(), rule.kind) {
            (true, None) => {
                return Err(invalid(
                    rule,
                    format!("{} needs a node kind", rule.instruction),
                ));
            }
            (false, Some(kind)) => {
                return Err(invalid(
                    rule,
                    format!("{} cannot name node kind {kind}", rule.instruction),
                ));
            }
            _ => {}
        }

        match rule.instruction {
            Instruction::UnwrapSingleChild => {
                for alternative in &rule.alternatives {
                    match surviving_count(grammar, alternative) {
                        Some(1) => {}
                        Some(count) => {
                            return Err(invalid(
                                rule,
                                format!(
                                    "unwrap-single-child needs exactly one surviving symbol per alternative, found {count}"
                                ),
                            ));
                        }
                        None => {
                            return Err(invalid(
                                rule,
                                "unwrap-single-child cannot reference a flatten-children rule"
                                    .to_string(),
                            ));
                        }
                    }
                }
            }
            Instruction::FlattenOrWrap => {
                let wraps = rule
                    .alternatives
                    .iter()
                    .any(|alternative| surviving_count(grammar, alternative).is_none_or(|n| n >= 2));
                if !wraps {
                    return Err(invalid(
                        rule,
                        "flatten-or-wrap needs an alternative with two or more surviving symbols"
                            .to_string(),
                    ));
                }
            }
            Instruction::Discard | Instruction::FlattenChildren | Instruction::Wrap => {}
        }
    }
    Ok(())
}

/// Number of children an alternative contributes after cleanup, or `None`
/// when a flatten-children reference makes the count depend on the input.
fn surviving_count(grammar: &CompiledGrammar, alternative: &[Symbol]) -> Option<usize> {
    let mut count = 0;
    for symbol in alternative {
        match symbol {
            Symbol::Rule(index) => match grammar.rule(*index).instruction {
                Instruction::Discard => {}
                Instruction::FlattenChildren => return None,
                _ => count += 1,
            },
            _ => count += 1,
        }
    }
    Some(count)
}

// ---------------------------------------------------------------------
// Reading grammar text
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Word {
    Name(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Word(Word),
    Colon,
    Equals,
    Bar,
    Semicolon,
}

struct RawRule {
    name: String,
    instruction: Instruction,
    kind: Option<String>,
    alternatives: Vec<Vec<Word>>,
}

struct RuleReader {
    pieces: Vec<(Piece, usize)>,
    index: usize,
    error: Option<GrammarError>,
}

impl RuleReader {
    fn new(text: &str) -> Self {
        let mut pieces = Vec::new();
        let mut error = None;
        for (number, line) in text.lines().enumerate() {
            if let Err(message) = split_line(line, &mut |piece| pieces.push((piece, number + 1))) {
                error.get_or_insert(GrammarError::Syntax {
                    line: number + 1,
                    message,
                });
            }
        }
        RuleReader {
            pieces,
            index: 0,
            error,
        }
    }

    fn read_all(mut self) -> Result<Vec<RawRule>, GrammarError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        let mut rules = Vec::new();
        while self.index < self.pieces.len() {
            rules.push(self.read_rule()?);
        }
        Ok(rules)
    }

    fn read_rule(&mut self) -> Result<RawRule, GrammarError> {
        let name = self.expect_name("a rule name")?;
        self.expect(Piece::Colon, "`:` after the rule name")?;
        let instruction_name = self.expect_name("a cleanup instruction")?;
        let instruction = Instruction::from_name(&instruction_name).ok_or_else(|| {
            self.syntax(format!("unknown cleanup instruction `{instruction_name}`"))
        })?;

        let kind = match self.peek() {
            Some(Piece::Word(Word::Name(kind))) => {
                let kind = kind.clone();
                self.index += 1;
                Some(kind)
            }
            _ => None,
        };
        self.expect(Piece::Equals, "`=` before the alternatives")?;

        let mut alternatives = vec![Vec::new()];
        loop {
            match self.next() {
                Some(Piece::Word(word)) => {
                    if let Some(current) = alternatives.last_mut() {
                        current.push(word);
                    }
                }
                Some(Piece::Bar) => alternatives.push(Vec::new()),
                Some(Piece::Semicolon) => break,
                Some(other) => {
                    return Err(self.syntax(format!("unexpected {other:?} in rule `{name}`")));
                }
                None => return Err(self.syntax(format!("rule `{name}` is missing its `;`"))),
            }
        }

        Ok(RawRule {
            name,
            instruction,
            kind,
            alternatives,
        })
    }

    fn peek(&self) -> Option<&Piece> {
        self.pieces.get(self.index).map(|(piece, _)| piece)
    }

    fn next(&mut self) -> Option<Piece> {
        let piece = self.pieces.get(self.index).map(|(piece, _)| piece.clone());
        self.index += 1;
        piece
    }

    fn expect(&mut self, wanted: Piece, what: &str) -> Result<(), GrammarError> {
        match self.next() {
            Some(piece) if piece == wanted => Ok(()),
            _ => Err(self.syntax(format!("expected {what}"))),
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, GrammarError> {
        match self.next() {
            Some(Piece::Word(Word::Name(name))) => Ok(name),
            _ => Err(self.syntax(format!("expected {what}"))),
        }
    }

    fn syntax(&self, message: String) -> GrammarError {
        let line = self
            .pieces
            .get(self.index.saturating_sub(1))
            .or(self.pieces.last())
            .map_or(0, |(_, line)| *line);
        GrammarError::Syntax { line, message }
    }
}

fn split_line(line: &str, emit: &mut impl FnMut(Piece)) -> Result<(), String> {
    let mut chars = line.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            '#' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            ':' => {
                chars.next();
                emit(Piece::Colon);
            }
            '=' => {
                chars.next();
                emit(Piece::Equals);
            }
            '|' => {
                chars.next();
                emit(Piece::Bar);
            }
            ';' => {
                chars.next();
                emit(Piece::Semicolon);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => text.push(escaped),
                            None => return Err("unterminated literal".to_string()),
                        },
                        Some(c) => text.push(c),
                        None => return Err("unterminated literal".to_string()),
                    }
                }
                if text.is_empty() {
                    return Err("empty literal".to_string());
                }
                emit(Piece::Word(Word::Literal(text)));
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                emit(Piece::Word(Word::Name(name)));
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_grammar_compiles() {
        let grammar = standard().expect("standard grammar");
        assert_eq!(grammar.rule(grammar.start()).name, "statement");
        let sum = grammar.rule_index("sum").expect("sum rule");
        assert_eq!(grammar.rule(sum).instruction, Instruction::FlattenOrWrap);
        assert_eq!(grammar.rule(sum).kind, Some(NodeKind::BinaryOp));
    }

    #[test]
    fn reads_literals_containing_punctuation() {
        let grammar = compile(r#"op : unwrap-single-child = "||" | ";" | "=" ;"#).unwrap();
        assert_eq!(
            grammar.rule(0).alternatives,
            vec![
                vec![Symbol::Literal("||".into())],
                vec![Symbol::Literal(";".into())],
                vec![Symbol::Literal("=".into())],
            ]
        );
    }

    #[test]
    fn rejects_undefined_and_duplicate_rules() {
        let err = compile("a : wrap Block = b ;").unwrap_err();
        assert_eq!(
            err,
            GrammarError::UndefinedRule {
                rule: "a".into(),
                reference: "b".into()
            }
        );

        let err = compile("a : wrap Block = EOL ;\na : wrap Block = EOL ;").unwrap_err();
        assert_eq!(err, GrammarError::DuplicateRule { rule: "a".into() });
    }

    #[test]
    fn rejects_empty_alternatives_and_unknown_names() {
        let err = compile("a : wrap Block = EOL | ;").unwrap_err();
        assert_eq!(err, GrammarError::EmptyAlternative { rule: "a".into() });

        let err = compile("a : wrap Block = NUMBER ;").unwrap_err();
        assert!(matches!(err, GrammarError::UnknownCategory { .. }));

        let err = compile("a : wrap Nonsense = EOL ;").unwrap_err();
        assert!(matches!(err, GrammarError::UnknownNodeKind { .. }));

        let err = compile("a : squash Block = EOL ;").unwrap_err();
        assert!(matches!(err, GrammarError::Syntax { line: 1, .. }));
    }

    #[test]
    fn unwrap_needs_exactly_one_survivor() {
        let grammar = "a : unwrap-single-child = IDENTIFIER CONSTANT ;";
        assert!(matches!(
            compile(grammar),
            Err(GrammarError::InvalidInstruction { .. })
        ));

        let with_discard = "a : unwrap-single-child = lp IDENTIFIER ;\nlp : discard = \"(\" ;";
        assert!(compile(with_discard).is_ok());

        let with_flatten =
            "a : unwrap-single-child = items ;\nitems : flatten-children = items EOL | EOL ;";
        assert!(matches!(
            compile(with_flatten),
            Err(GrammarError::InvalidInstruction { .. })
        ));
    }

    #[test]
    fn kinds_must_match_the_instruction() {
        assert!(compile("a : wrap = EOL ;").is_err());
        assert!(compile("a : unwrap-single-child Block = EOL ;").is_err());
        assert!(compile("a : flatten-or-wrap BinaryOp = EOL ;").is_err());
        assert!(compile("a : flatten-or-wrap BinaryOp = EOL EOL | EOL ;").is_ok());
    }

    #[test]
    fn start_rule_cannot_disappear() {
        assert!(compile("a : discard = EOL ;").is_err());
        assert!(compile("a : flatten-children = EOL ;").is_err());
    }

    #[test]
    fn comments_are_ignored() {
        let grammar = compile("# leading\na : wrap Block = EOL ; # trailing\n").unwrap();
        assert_eq!(grammar.rules().len(), 1);
        assert_eq!(compile("# nothing here"), Err(GrammarError::Empty));
    }
}
