use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::token;
use crate::token::Token;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("indentation must be a whole number of two-space units")]
    BadIndent,
    #[error("indentation may only grow one level at a time")]
    IndentJump,
    #[error("string literal is not terminated")]
    UnterminatedString,
    #[error("number literal is out of range")]
    BadNumber,
}

/// Splits source text into [`Token`]s, turning the significant leading
/// whitespace of each logical line into explicit `Indent`/`Dedent` tokens.
///
/// The lexer always holds one token: construction produces the first one,
/// `current_token` peeks at it and `next_token` advances. After `Eof` has
/// been produced, further calls keep returning `Eof`.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    token: Option<Token>,
    /// Indentation level of the current logical line, in two-space units.
    indent: usize,
    /// Dedent tokens still owed to the caller.
    dedent: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Result<Lexer<'a>, LexError> {
        let mut lexer = Lexer {
            input: input.chars().peekable(),
            token: None,
            indent: 0,
            dedent: 0,
        };
        lexer.next_token()?;
        Ok(lexer)
    }

    pub fn current_token(&self) -> &Token {
        self.token
            .as_ref()
            .expect("the lexer holds a token once constructed")
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let token = self.scan()?;
        self.token = Some(token.clone());
        Ok(token)
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        if let Some(Token::Eof) = self.token {
            return Ok(Token::Eof);
        }
        if self.dedent > 0 {
            self.dedent -= 1;
            return Ok(Token::Dedent);
        }
        if let Some(Token::Newline) = self.token {
            let level = self.measure_indent()?;
            if level > self.indent {
                if level > self.indent + 1 {
                    return Err(LexError::IndentJump);
                }
                self.indent += 1;
                return Ok(Token::Indent);
            }
            if level < self.indent {
                self.dedent = self.indent - level - 1;
                self.indent = level;
                return Ok(Token::Dedent);
            }
        } else {
            while self.peek_if(|c| c == ' ') {
                self.read_char();
            }
        }
        self.classify()
    }

    /// Counts the indentation of the next line that carries content,
    /// consuming blank lines and comment-only lines along the way.
    fn measure_indent(&mut self) -> Result<usize, LexError> {
        loop {
            let mut level = 0;
            while self.peek_if(|c| c == ' ') {
                self.read_char();
                if self.read_char() != Some(' ') {
                    return Err(LexError::BadIndent);
                }
                level += 1;
            }
            match self.peek_char() {
                Some('\n') => {
                    self.read_char();
                }
                Some('#') => self.skip_comment(),
                _ => return Ok(level),
            }
        }
    }

    fn classify(&mut self) -> Result<Token, LexError> {
        match self.read_char() {
            None => {
                if matches!(self.token, Some(Token::Newline) | Some(Token::Dedent)) {
                    Ok(Token::Eof)
                } else {
                    // Close the last logical line and schedule the dedents
                    // still needed to rebalance the stream before `Eof`.
                    self.dedent = self.indent;
                    self.indent = 0;
                    Ok(Token::Newline)
                }
            }
            Some('\n') => Ok(Token::Newline),
            Some('#') => {
                self.skip_comment();
                Ok(Token::Newline)
            }
            Some(c) if c.is_ascii_digit() => self.read_number(c),
            Some(c @ ('\'' | '"')) => self.read_string(c),
            Some(c) if is_id_start(c) => Ok(token::lookup_ident(&self.read_identifier(c))),
            Some('=') if self.peek_is('=') => {
                self.read_char();
                Ok(Token::Eq)
            }
            Some('!') if self.peek_is('=') => {
                self.read_char();
                Ok(Token::NotEq)
            }
            Some('<') if self.peek_is('=') => {
                self.read_char();
                Ok(Token::LessOrEq)
            }
            Some('>') if self.peek_is('=') => {
                self.read_char();
                Ok(Token::GreaterOrEq)
            }
            Some(c @ ('=' | '.' | ',' | '(' | ')' | '+' | '-' | '*' | '/' | '<' | '>' | ':')) => {
                Ok(Token::Char(c))
            }
            Some(c) => Err(LexError::UnexpectedChar(c)),
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.clone().next()
    }

    fn peek_is(&self, expected: char) -> bool {
        self.peek_char() == Some(expected)
    }

    fn peek_if<F>(&self, predicate: F) -> bool
    where
        F: Fn(char) -> bool,
    {
        match self.peek_char() {
            Some(ch) => predicate(ch),
            None => false,
        }
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::new();
        ident.push(first);

        while self.peek_if(is_id_continue) {
            ident.push(self.read_char().unwrap());
        }

        ident
    }

    fn read_number(&mut self, first: char) -> Result<Token, LexError> {
        let mut number = String::new();
        number.push(first);

        while self.peek_if(|c| c.is_ascii_digit()) {
            number.push(self.read_char().unwrap());
        }

        number
            .parse()
            .map(Token::Number)
            .map_err(|_| LexError::BadNumber)
    }

    /// Reads a string literal whose opening quote (`'` or `"`) was `quote`.
    /// Recognized escapes are `\'`, `\"`, `\n` and `\t`; any other escape
    /// pair is kept verbatim, backslash included.
    fn read_string(&mut self, quote: char) -> Result<Token, LexError> {
        let mut res = String::new();

        loop {
            match self.read_char() {
                None => return Err(LexError::UnterminatedString),
                Some(c) if c == quote => return Ok(Token::String(res)),
                Some('\\') => match self.read_char() {
                    None => return Err(LexError::UnterminatedString),
                    Some('n') => res.push('\n'),
                    Some('t') => res.push('\t'),
                    Some(c @ ('\'' | '"')) => res.push(c),
                    Some(c) => {
                        res.push('\\');
                        res.push(c);
                    }
                },
                Some(c) => res.push(c),
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.read_char() {
            if c == '\n' {
                break;
            }
        }
    }
}

fn is_id_start(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_uppercase() || c == '_'
}

fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}
