/// A parsed line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text goes to the current thread
    Say(String),
    Flush,
    History(Option<usize>),
    Older,
    Summary,
    Summarize,
    Context,
    Threads,
    New(String),
    Switch(String),
    Rename(String),
    Delete(String),
    Resend(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
Type a message and press enter; rapid messages are sent together as one turn.

  /flush            send buffered input now
  /history [n]      show the newest n messages (default page size)
  /older            load the page before the oldest shown message
  /summary          show summaries and summary state
  /summarize        run the summary scheduler now if a summary is due
  /context          show the context the next turn would send
  /threads          list threads
  /new <title>      start a new thread and switch to it
  /switch <id>      switch to another thread
  /rename <title>   rename the current thread
  /delete <id>      delete a thread and its history
  /resend <id>      resend an undelivered message
  /help             this text
  /quit             exit";

/// Parse one input line; `Ok(None)` for blank input
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Say(line.to_string())));
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };

    let command = match name {
        "/flush" => Command::Flush,
        "/history" => {
            if arg.is_empty() {
                Command::History(None)
            } else {
                let size = arg
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("not a page size: {}", arg))?;
                Command::History(Some(size))
            }
        }
        "/older" => Command::Older,
        "/summary" => Command::Summary,
        "/summarize" => Command::Summarize,
        "/context" => Command::Context,
        "/threads" => Command::Threads,
        "/new" => Command::New(required(name, arg)?),
        "/switch" => Command::Switch(required(name, arg)?),
        "/rename" => Command::Rename(required(name, arg)?),
        "/delete" => Command::Delete(required(name, arg)?),
        "/resend" => Command::Resend(required(name, arg)?),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("unknown command {} (try /help)", other)),
    };
    Ok(Some(command))
}

fn required(name: &str, arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("{} needs an argument", name))
    } else {
        Ok(arg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            parse("  hello there ").unwrap(),
            Some(Command::Say("hello there".to_string()))
        );
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(parse("/history").unwrap(), Some(Command::History(None)));
        assert_eq!(parse("/history 5").unwrap(), Some(Command::History(Some(5))));
        assert_eq!(
            parse("/new Late night talk").unwrap(),
            Some(Command::New("Late night talk".to_string()))
        );
        assert_eq!(parse("/exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_bad_input_is_rejected() {
        assert!(parse("/history zero").is_err());
        assert!(parse("/history 0").is_err());
        assert!(parse("/switch").is_err());
        assert!(parse("/dance").is_err());
    }
}
