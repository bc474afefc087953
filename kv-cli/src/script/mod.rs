pub mod parser;
pub mod token;

pub use parser::parse_line;

/// A command typed at the interactive client's stdin prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Subscribe(String),
    Unsubscribe(String),
    Disconnect,
    Invalid(String),
}

/// Parses one line of client stdin input.
pub fn parse_client_line(line: &str) -> ClientCommand {
    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    match (parts.next(), parts.next()) {
        (Some("SUBSCRIBE"), Some(key)) => ClientCommand::Subscribe(key.trim().to_string()),
        (Some("UNSUBSCRIBE"), Some(key)) => ClientCommand::Unsubscribe(key.trim().to_string()),
        (Some("DISCONNECT"), _) => ClientCommand::Disconnect,
        _ => ClientCommand::Invalid(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_and_unsubscribe() {
        assert_eq!(parse_client_line("SUBSCRIBE x"), ClientCommand::Subscribe("x".to_string()));
        assert_eq!(parse_client_line("UNSUBSCRIBE x"), ClientCommand::Unsubscribe("x".to_string()));
    }

    #[test]
    fn parses_disconnect() {
        assert_eq!(parse_client_line("DISCONNECT"), ClientCommand::Disconnect);
    }

    #[test]
    fn unknown_command_is_invalid() {
        assert_eq!(parse_client_line("PING"), ClientCommand::Invalid("PING".to_string()));
    }
}
