//! Lexer for Glyph.
//!
//! Turns one line of source text into a flat sequence of categorized tokens.
//! The lexer is total: anything it cannot categorize becomes an
//! [`Category::Unrecognized`] token, which no grammar symbol matches, so the
//! parser reports it.

use std::fmt;

/// Category of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Identifier,
    Constant,
    Operator,
    Separator,
    Keyword,
    EndOfLine,

    // Filtered out before the parser sees the stream.
    Whitespace,
    Comment,

    Unrecognized,
}

impl Category {
    /// Name used for category references in grammar text.
    pub fn grammar_name(self) -> &'static str {
        match self {
            Category::Identifier => "IDENTIFIER",
            Category::Constant => "CONSTANT",
            Category::Operator => "OPERATOR",
            Category::Separator => "SEPARATOR",
            Category::Keyword => "KEYWORD",
            Category::EndOfLine => "EOL",
            Category::Whitespace => "WHITESPACE",
            Category::Comment => "COMMENT",
            Category::Unrecognized => "UNRECOGNIZED",
        }
    }

    pub fn from_grammar_name(name: &str) -> Option<Category> {
        let category = match name {
            "IDENTIFIER" => Category::Identifier,
            "CONSTANT" => Category::Constant,
            "OPERATOR" => Category::Operator,
            "SEPARATOR" => Category::Separator,
            "KEYWORD" => Category::Keyword,
            "EOL" => Category::EndOfLine,
            _ => return None,
        };
        Some(category)
    }

    pub fn is_significant(self) -> bool {
        !matches!(self, Category::Whitespace | Category::Comment)
    }
}

/// 1-based line and column of a token's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single token: category, the literal text it covers, and where it starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub category: Category,
    pub text: String,
    pub position: Position,
}

/// Structural keywords and type names. Matched only as whole words.
pub const KEYWORDS: &[&str] = &[
    "if", "then", "elif", "else", "endif", "while", "do", "endwhile", "enddo", "for", "to", "in",
    "endfor", "return", "break", "continue", "struct", "int", "double", "bool", "string", "char",
];

// Longest entries first so that matching the first hit is longest match.
const OPERATORS: &[&str] = &[
    "->", "::", "//", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "=",
    ":", ";", ".",
];

const SEPARATORS: &[char] = &['(', ')', '[', ']', '{', '}', ','];

/// Characters that may start an identifier (the type sigils).
pub const SIGILS: &[char] = &['i', 'd', 'b', 's', 'c', 't', 'o', 'a', 'f'];

/// Tokenize one line, including whitespace and comment tokens, and finish
/// with an end-of-line token.
pub fn tokenize(line: &str, line_number: usize) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: line.chars().collect(),
        index: 0,
        line: line_number,
    };
    lexer.run()
}

/// Tokenize one line and keep only the tokens the parser consumes.
pub fn significant_tokens(line: &str, line_number: usize) -> Vec<Token> {
    tokenize(line, line_number)
        .into_iter()
        .filter(|token| token.category.is_significant())
        .collect()
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
}

impl Lexer {
    fn run(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            let start = self.index;
            let category = if ch.is_whitespace() {
                self.consume_while(char::is_whitespace);
                Category::Whitespace
            } else if ch == '#' {
                self.index = self.chars.len();
                Category::Comment
            } else if ch == '"' || ch == '\'' {
                self.lex_quoted(ch)
            } else if ch.is_ascii_digit() {
                self.lex_number()
            } else if ch.is_ascii_alphabetic() || ch == '_' {
                self.lex_word()
            } else if SEPARATORS.contains(&ch) {
                self.consume_char();
                Category::Separator
            } else if let Some(op) = self.match_operator() {
                self.index += op.chars().count();
                Category::Operator
            } else {
                self.consume_unrecognized();
                Category::Unrecognized
            };
            tokens.push(self.token(category, start));
        }

        tokens.push(Token {
            category: Category::EndOfLine,
            text: String::new(),
            position: Position {
                line: self.line,
                column: self.chars.len() + 1,
            },
        });
        tokens
    }

    fn token(&self, category: Category, start: usize) -> Token {
        Token {
            category,
            text: self.chars[start..self.index].iter().collect(),
            position: Position {
                line: self.line,
                column: start + 1,
            },
        }
    }

    fn lex_quoted(&mut self, quote: char) -> Category {
        let open = self.index;
        self.consume_char();
        while let Some(ch) = self.peek_char() {
            self.consume_char();
            if ch == '\\' {
                self.consume_char();
            } else if ch == quote {
                let body = &self.chars[open + 1..self.index - 1];
                return if quote == '\'' && !is_single_char_body(body) {
                    Category::Unrecognized
                } else {
                    Category::Constant
                };
            }
        }
        // Unterminated literal.
        Category::Unrecognized
    }

    fn lex_number(&mut self) -> Category {
        self.consume_while(|c| c.is_ascii_digit());
        if self.peek_char() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char();
            self.consume_while(|c| c.is_ascii_digit());
        }
        // `12abc` is not a number followed by a word.
        if self.peek_char().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Category::Unrecognized;
        }
        Category::Constant
    }

    fn lex_word(&mut self) -> Category {
        let start = self.index;
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let word: String = self.chars[start..self.index].iter().collect();

        if KEYWORDS.contains(&word.as_str()) {
            Category::Keyword
        } else if word == "true" || word == "false" {
            Category::Constant
        } else if is_identifier(&word) {
            Category::Identifier
        } else {
            Category::Unrecognized
        }
    }

    fn match_operator(&self) -> Option<&'static str> {
        OPERATORS.iter().copied().find(|op| {
            op.chars()
                .enumerate()
                .all(|(offset, c)| self.chars.get(self.index + offset) == Some(&c))
        })
    }

    fn consume_unrecognized(&mut self) {
        let start = self.index;
        self.consume_while(|c| {
            !(c.is_whitespace() || c.is_ascii_alphanumeric() || SEPARATORS.contains(&c))
        });
        if self.index == start {
            self.consume_char();
        }
    }

    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek_char().is_some_and(&predicate) {
            self.consume_char();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }
}

/// A char literal holds exactly one character or one escape.
fn is_single_char_body(body: &[char]) -> bool {
    match body {
        [c] => *c != '\\',
        ['\\', _] => true,
        _ => false,
    }
}

/// `f?[sigil][A-Z][A-Za-z0-9_]*`
pub fn is_identifier(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let body = match chars.as_slice() {
        ['f', marked, rest @ ..] if SIGILS.contains(marked) => rest,
        [sigil, rest @ ..] if SIGILS.contains(sigil) => rest,
        _ => return false,
    };
    match body {
        [first, rest @ ..] => {
            first.is_ascii_uppercase() && rest.iter().all(|c| c.is_ascii_alphanumeric() || *c == '_')
        }
        [] => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(line: &str) -> Vec<(Category, String)> {
        significant_tokens(line, 1)
            .into_iter()
            .map(|t| (t.category, t.text))
            .collect()
    }

    #[test]
    fn tokenizes_assignment() {
        let tokens = categories("iX = 3 + 4.5");
        assert_eq!(
            tokens,
            vec![
                (Category::Identifier, "iX".to_string()),
                (Category::Operator, "=".to_string()),
                (Category::Constant, "3".to_string()),
                (Category::Operator, "+".to_string()),
                (Category::Constant, "4.5".to_string()),
                (Category::EndOfLine, String::new()),
            ]
        );
    }

    #[test]
    fn prefers_longest_operator() {
        let tokens = categories("fX :: tA ; iA // iB -> iC");
        let ops: Vec<_> = tokens
            .iter()
            .filter(|(c, _)| *c == Category::Operator)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(ops, vec!["::", ";", "//", "->"]);
    }

    #[test]
    fn keywords_are_whole_words() {
        let tokens = categories("if bIffy then");
        assert_eq!(tokens[0], (Category::Keyword, "if".to_string()));
        assert_eq!(tokens[1], (Category::Identifier, "bIffy".to_string()));
        assert_eq!(tokens[2], (Category::Keyword, "then".to_string()));
    }

    #[test]
    fn recognizes_function_marker_identifiers() {
        assert!(is_identifier("fiFact"));
        assert!(is_identifier("fX"));
        assert!(is_identifier("oPoint"));
        assert!(is_identifier("iX2"));
        assert!(!is_identifier("x"));
        assert!(!is_identifier("iy"));
        assert!(!is_identifier("qX"));
    }

    #[test]
    fn lexes_string_and_char_constants() {
        let tokens = categories(r#"sA = "a \"b\"" + 'c'"#);
        assert_eq!(tokens[2], (Category::Constant, r#""a \"b\"""#.to_string()));
        assert_eq!(tokens[4], (Category::Constant, "'c'".to_string()));
    }

    #[test]
    fn unmatched_runs_become_unrecognized() {
        let tokens = categories("iX = $$ 3");
        assert_eq!(tokens[2], (Category::Unrecognized, "$$".to_string()));
        assert_eq!(tokens[3], (Category::Constant, "3".to_string()));

        let unterminated = categories("sX = \"abc");
        assert_eq!(unterminated[2].0, Category::Unrecognized);

        let lowercase = categories("foo = 1");
        assert_eq!(lowercase[0], (Category::Unrecognized, "foo".to_string()));
    }

    #[test]
    fn comments_and_whitespace_are_filtered() {
        let all = tokenize("iX = 1  # note", 3);
        assert!(all.iter().any(|t| t.category == Category::Comment));
        let significant = significant_tokens("iX = 1  # note", 3);
        assert_eq!(significant.len(), 4);
        assert_eq!(significant[0].position, Position { line: 3, column: 1 });
        assert_eq!(significant[3].category, Category::EndOfLine);
    }
}
