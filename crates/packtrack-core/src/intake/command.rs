use crate::validate::normalize_number;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    List,
    /// `/stop` with the (normalized) number, if one was given.
    Stop(Option<String>),
}

/// Recognize a bot command. Accepts the `@botname` suffix Telegram adds in
/// groups. Only `/stop` takes an argument; `/list foo` is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((h, a)) => (h, a.trim()),
        None => (rest, ""),
    };
    let name = head.split_once('@').map_or(head, |(n, _)| n);

    match (name.to_ascii_lowercase().as_str(), args.is_empty()) {
        ("start", true) => Some(Command::Start),
        ("help", true) => Some(Command::Help),
        ("list", true) => Some(Command::List),
        ("stop", true) => Some(Command::Stop(None)),
        ("stop", false) => args
            .split(|c: char| c.is_whitespace() || c == ',')
            .find(|t| !t.is_empty())
            .map(|t| Command::Stop(Some(normalize_number(t)))),
        _ => None,
    }
}

/// Commands that stay live while the chat owes tracking input: exact text,
/// no `@botname` suffix, no arguments. Anything else is tracking input then.
pub fn parse_dialog_command(text: &str) -> Option<Command> {
    match text.trim() {
        "/start" => Some(Command::Start),
        "/help" => Some(Command::Help),
        "/list" => Some(Command::List),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command(" /help "), Some(Command::Help));
        assert_eq!(parse_command("/list"), Some(Command::List));
    }

    #[test]
    fn bot_suffix_is_accepted() {
        assert_eq!(parse_command("/list@PackTrackBot"), Some(Command::List));
        assert_eq!(
            parse_command("/stop@PackTrackBot yt1234567890"),
            Some(Command::Stop(Some("YT1234567890".into())))
        );
    }

    #[test]
    fn stop_without_argument() {
        assert_eq!(parse_command("/stop"), Some(Command::Stop(None)));
    }

    #[test]
    fn arguments_on_other_commands_do_not_match() {
        assert_eq!(parse_command("/list everything"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("YT1234567890"), None);
    }

    #[test]
    fn dialog_commands_are_exact() {
        assert_eq!(parse_dialog_command(" /start "), Some(Command::Start));
        assert_eq!(parse_dialog_command("/list"), Some(Command::List));
        assert_eq!(parse_dialog_command("/stop"), None);
        assert_eq!(parse_dialog_command("/START"), None);
        assert_eq!(parse_dialog_command("/list@PackTrackBot"), None);
    }
}
