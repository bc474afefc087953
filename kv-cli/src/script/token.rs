use logos::Logos;

/// Lexical tokens of the job-script grammar (`WRITE`, `READ`, `DELETE`,
/// `SHOW`, `WAIT`, `BACKUP`, `HELP`), tokenized one line at a time.
#[allow(non_camel_case_types)]
#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Error,

    #[regex(r"[ \t\r\f]+", logos::skip)]
    Whitespace,

    #[token("WRITE")]
    Write,
    #[token("READ")]
    Read,
    #[token("DELETE")]
    Delete,
    #[token("SHOW")]
    Show,
    #[token("WAIT")]
    Wait,
    #[token("BACKUP")]
    Backup,
    #[token("HELP")]
    Help,

    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,

    #[regex(r"[0-9]+")]
    Number,

    #[regex(r"[^\s\(\)\[\],]+")]
    Ident,
}
