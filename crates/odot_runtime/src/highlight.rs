//! Syntax highlighting for console commands.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

use crate::command::COMMAND_WORDS;

const RESET: &str = "\x1b[0m";

/// Highlighter for the console's command lines.
#[derive(Debug, Default)]
pub struct CommandHighlighter;

impl CommandHighlighter {
    /// Creates a new highlighter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Highlights a line: the command word in bold green, JSON strings in
    /// yellow, numbers in magenta, literals in blue, comments dimmed.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.trim().is_empty() {
            return Cow::Borrowed(line);
        }
        if line.trim_start().starts_with('#') {
            return Cow::Owned(format!("\x1b[2;3m{line}{RESET}"));
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut chars = line.chars().peekable();
        let mut first_word = true;

        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    result.push_str("\x1b[33m");
                    result.push(c);
                    push_string_body(&mut result, &mut chars);
                    result.push_str(RESET);
                }
                '-' | '0'..='9' if !first_word => {
                    result.push_str("\x1b[35m");
                    result.push(c);
                    push_while(&mut result, &mut chars, |next| {
                        next.is_ascii_digit() || matches!(next, '.' | 'e' | 'E' | '+' | '-')
                    });
                    result.push_str(RESET);
                }
                '{' | '}' | '[' | ']' => {
                    result.push_str("\x1b[1m");
                    result.push(c);
                    result.push_str(RESET);
                }
                c if c.is_whitespace() => result.push(c),
                c => {
                    let mut word = String::from(c);
                    push_while(&mut word, &mut chars, |next| {
                        !next.is_whitespace() && !matches!(next, '"' | '{' | '}' | '[' | ']' | ',' | ':')
                    });
                    let color = if first_word {
                        if COMMAND_WORDS.contains(&word.as_str()) {
                            "\x1b[1;32m"
                        } else {
                            "\x1b[31m"
                        }
                    } else {
                        match word.as_str() {
                            "true" | "false" | "null" => "\x1b[34m",
                            "from" => "\x1b[32m",
                            _ => "",
                        }
                    };
                    first_word = false;
                    if color.is_empty() {
                        result.push_str(&word);
                    } else {
                        result.push_str(color);
                        result.push_str(&word);
                        result.push_str(RESET);
                    }
                }
            }
        }

        Cow::Owned(result)
    }
}

fn push_string_body(out: &mut String, chars: &mut Peekable<Chars<'_>>) {
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => return,
            _ => {}
        }
    }
}

fn push_while(out: &mut String, chars: &mut Peekable<Chars<'_>>, keep: impl Fn(char) -> bool) {
    while let Some(&next) = chars.peek() {
        if !keep(next) {
            break;
        }
        out.push(next);
        chars.next();
    }
}
