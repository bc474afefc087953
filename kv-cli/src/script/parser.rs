use kv::job::Command;
use logos::Logos;

use super::token::TokenKind;

struct Tokens<'a> {
    source: &'a str,
    lexer: logos::Lexer<'a, TokenKind>,
}

impl<'a> Tokens<'a> {
    fn new(source: &'a str) -> Self {
        Tokens { source, lexer: TokenKind::lexer(source) }
    }

    fn next_token(&mut self) -> Option<(TokenKind, &'a str)> {
        loop {
            match self.lexer.next() {
                None => return None,
                Some(Ok(TokenKind::Whitespace)) => continue,
                Some(Ok(kind)) => return Some((kind, self.lexer.slice())),
                Some(Err(())) => return Some((TokenKind::Error, self.lexer.slice())),
            }
        }
    }
}

/// Parses one line of a job script (or an interactively typed command) into
/// a `kv::job::Command`. Blank lines and `#`-comments yield `Command::Empty`;
/// anything that doesn't match the grammar yields `Command::Invalid`.
pub fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Command::Empty;
    }

    let mut tokens = Tokens::new(trimmed);
    let Some((head, _)) = tokens.next_token() else {
        return Command::Empty;
    };

    match head {
        TokenKind::Write => parse_write(&mut tokens, trimmed),
        TokenKind::Read => parse_key_list(&mut tokens, trimmed, Command::Read),
        TokenKind::Delete => parse_key_list(&mut tokens, trimmed, Command::Delete),
        TokenKind::Show => Command::Show,
        TokenKind::Backup => Command::Backup,
        TokenKind::Help => Command::Help,
        TokenKind::Wait => match tokens.next_token() {
            Some((TokenKind::Number, text)) => match text.parse::<u64>() {
                Ok(ms) => Command::Wait(ms),
                Err(_) => Command::Invalid(trimmed.to_string()),
            },
            _ => Command::Invalid(trimmed.to_string()),
        },
        _ => Command::Invalid(trimmed.to_string()),
    }
}

fn parse_write(tokens: &mut Tokens, original: &str) -> Command {
    if !matches!(tokens.next_token(), Some((TokenKind::LBracket, _))) {
        return Command::Invalid(original.to_string());
    }

    let mut pairs = Vec::new();
    loop {
        match tokens.next_token() {
            Some((TokenKind::RBracket, _)) => break,
            Some((TokenKind::LParen, _)) => {
                let Some((TokenKind::Ident, key)) = tokens.next_token() else {
                    return Command::Invalid(original.to_string());
                };
                if !matches!(tokens.next_token(), Some((TokenKind::Comma, _))) {
                    return Command::Invalid(original.to_string());
                }
                let Some((TokenKind::Ident, value)) = tokens.next_token() else {
                    return Command::Invalid(original.to_string());
                };
                if !matches!(tokens.next_token(), Some((TokenKind::RParen, _))) {
                    return Command::Invalid(original.to_string());
                }
                pairs.push((key.to_string(), value.to_string()));
            }
            _ => return Command::Invalid(original.to_string()),
        }
    }
    Command::Write(pairs)
}

fn parse_key_list(tokens: &mut Tokens, original: &str, build: impl Fn(Vec<String>) -> Command) -> Command {
    if !matches!(tokens.next_token(), Some((TokenKind::LBracket, _))) {
        return Command::Invalid(original.to_string());
    }

    let mut keys = Vec::new();
    let mut expect_key = true;
    loop {
        match tokens.next_token() {
            Some((TokenKind::RBracket, _)) => break,
            Some((TokenKind::Ident, key)) if expect_key => {
                keys.push(key.to_string());
                expect_key = false;
            }
            Some((TokenKind::Comma, _)) if !expect_key => {
                expect_key = true;
            }
            _ => return Command::Invalid(original.to_string()),
        }
    }
    build(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_with_multiple_pairs() {
        let cmd = parse_line("WRITE [(a,1)(b,2)]");
        assert_eq!(cmd, Command::Write(vec![("a".into(), "1".into()), ("b".into(), "2".into())]));
    }

    #[test]
    fn parses_read_key_list() {
        let cmd = parse_line("READ [a,b,c]");
        assert_eq!(cmd, Command::Read(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn parses_delete_key_list() {
        let cmd = parse_line("DELETE [a,b]");
        assert_eq!(cmd, Command::Delete(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn parses_show_wait_backup_help() {
        assert_eq!(parse_line("SHOW"), Command::Show);
        assert_eq!(parse_line("WAIT 100"), Command::Wait(100));
        assert_eq!(parse_line("BACKUP"), Command::Backup);
        assert_eq!(parse_line("HELP"), Command::Help);
    }

    #[test]
    fn blank_and_comment_lines_are_empty() {
        assert_eq!(parse_line(""), Command::Empty);
        assert_eq!(parse_line("   "), Command::Empty);
        assert_eq!(parse_line("# a comment"), Command::Empty);
    }

    #[test]
    fn garbage_line_is_invalid() {
        assert_eq!(parse_line("FROBNICATE"), Command::Invalid("FROBNICATE".to_string()));
    }

    #[test]
    fn malformed_write_is_invalid() {
        match parse_line("WRITE (a,1)") {
            Command::Invalid(_) => {}
            other => panic!("expected Invalid, got {:?}", other),
        }
    }
}
