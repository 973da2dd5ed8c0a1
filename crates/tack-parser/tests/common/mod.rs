//! Test support: a minimal tokenizer for writing test programs.
//!
//! The real lexer is an external collaborator; tests only need a small,
//! predictable way to produce token streams. Handles names, integer and
//! string literals, keywords, punctuation, operator characters (emitted
//! as names, per the token contract) and indentation layout.

use tack_common::span::Position;
use tack_common::token::{Token, TokenKind};

pub fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut last_line = 1u32;
    let mut last_col = 0u32;
    for (i, line) in source.split('\n').enumerate() {
        let line_no = i as u32 + 1;
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let current = *indents.last().expect("indent stack is never empty");
        if indent > current {
            indents.push(indent);
            tokens.push(Token::new(
                TokenKind::Indent,
                &line[..indent],
                Position::new(line_no, 0),
                Position::new(line_no, indent as u32),
            ));
        } else {
            while indent < *indents.last().expect("indent stack is never empty") {
                indents.pop();
                tokens.push(Token::new(
                    TokenKind::Dedent,
                    "",
                    Position::new(line_no, 0),
                    Position::new(line_no, 0),
                ));
            }
        }
        scan_line(line, line_no, &mut tokens);
        tokens.push(Token::new(
            TokenKind::Newline,
            "\n",
            Position::new(line_no, line.len() as u32),
            Position::new(line_no, line.len() as u32 + 1),
        ));
        last_line = line_no;
        last_col = line.len() as u32 + 1;
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token::new(
            TokenKind::Dedent,
            "",
            Position::new(last_line, last_col),
            Position::new(last_line, last_col),
        ));
    }
    tokens.push(Token::end_marker(Position::new(last_line, last_col)));
    tokens
}

fn scan_line(line: &str, line_no: u32, tokens: &mut Vec<Token>) {
    let chars: Vec<char> = line.chars().collect();
    let mut col = 0usize;
    let tok = |kind, text: &str, start: usize, end: usize| {
        Token::new(
            kind,
            text,
            Position::new(line_no, start as u32),
            Position::new(line_no, end as u32),
        )
    };
    while col < chars.len() {
        let c = chars[col];
        match c {
            ' ' | '\t' => col += 1,
            '"' => {
                let start = col;
                col += 1;
                while col < chars.len() && chars[col] != '"' {
                    col += 1;
                }
                col = (col + 1).min(chars.len());
                let text: String = chars[start..col].iter().collect();
                tokens.push(tok(TokenKind::Str, &text, start, col));
            }
            '0'..='9' => {
                let start = col;
                while col < chars.len() && chars[col].is_ascii_digit() {
                    col += 1;
                }
                let text: String = chars[start..col].iter().collect();
                tokens.push(tok(TokenKind::Number, &text, start, col));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = col;
                while col < chars.len() && (chars[col].is_alphanumeric() || chars[col] == '_') {
                    col += 1;
                }
                let text: String = chars[start..col].iter().collect();
                let kind = match text.as_str() {
                    "def" => TokenKind::Def,
                    "class" => TokenKind::Class,
                    "import" => TokenKind::Import,
                    "from" => TokenKind::From,
                    "as" => TokenKind::As,
                    "cast" => TokenKind::Cast,
                    _ => TokenKind::Name,
                };
                tokens.push(tok(kind, &text, start, col));
            }
            '-' if chars.get(col + 1) == Some(&'-') => {
                tokens.push(tok(TokenKind::DashDash, "--", col, col + 2));
                col += 2;
            }
            _ => {
                let kind = match c {
                    '(' => TokenKind::LPar,
                    ')' => TokenKind::RPar,
                    '[' => TokenKind::LSqb,
                    ']' => TokenKind::RSqb,
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '$' => TokenKind::Dollar,
                    '.' => TokenKind::Dot,
                    ',' => TokenKind::Comma,
                    ':' => TokenKind::Colon,
                    '*' => TokenKind::Star,
                    '`' => TokenKind::Backtick,
                    // Operator characters are ordinary words.
                    _ => TokenKind::Name,
                };
                tokens.push(tok(kind, &c.to_string(), col, col + 1));
                col += 1;
            }
        }
    }
}
