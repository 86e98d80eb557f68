use crate::server::Pipeline;
use second_brain_core::RagError;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask(String),
    History,
    Cards,
    Help,
    Quit,
    Empty,
}

fn parse_line(line: &str) -> Command {
    match line.trim() {
        "" => Command::Empty,
        ":history" | ":h" => Command::History,
        ":cards" | ":c" => Command::Cards,
        ":help" | ":?" => Command::Help,
        ":quit" | ":q" | ":exit" => Command::Quit,
        question => Command::Ask(question.to_string()),
    }
}

const HELP: &str = "Type a question, or :history, :cards, :help, :quit";

/// Questions and answers from this session, shown on request. Never sent back
/// to the model.
#[derive(Debug, Default)]
struct History {
    exchanges: Vec<(String, String)>,
}

impl History {
    fn record(&mut self, question: &str, answer: &str) {
        self.exchanges.push((question.to_string(), answer.to_string()));
    }

    fn render(&self) -> String {
        if self.exchanges.is_empty() {
            return "No questions asked yet.".to_string();
        }

        self.exchanges
            .iter()
            .rev()
            .map(|(question, answer)| format!("You: {question}\nBot: {answer}"))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

pub async fn run(pipeline: &Pipeline, timeout: Duration) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut history = History::default();

    stdout.write_all(format!("{HELP}\n").as_bytes()).await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let output = match parse_line(&line) {
            Command::Empty => "Please enter a question.".to_string(),
            Command::Help => HELP.to_string(),
            Command::Quit => break,
            Command::History => history.render(),
            Command::Ask(question) => match pipeline.ask_within(&question, timeout).await {
                Ok(answer) => {
                    history.record(&question, &answer);
                    format!("Answer:\n{answer}")
                }
                Err(error) => format!("Error: {error}"),
            },
            Command::Cards => match pipeline.flashcards_within(timeout).await {
                Ok(extraction) => crate::render_cards(extraction.cards()),
                Err(error @ RagError::Parse { .. }) => format!(
                    "Could not parse model output as JSON. Raw output:\n{}",
                    error.raw_output().unwrap_or_default()
                ),
                Err(error) => format!("Error: {error}"),
            },
        };

        stdout.write_all(format!("{output}\n").as_bytes()).await?;
    }

    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_map_to_commands() {
        assert_eq!(parse_line("   "), Command::Empty);
        assert_eq!(parse_line(":q"), Command::Quit);
        assert_eq!(parse_line(":history"), Command::History);
        assert_eq!(parse_line(":cards"), Command::Cards);
        assert_eq!(
            parse_line("  What is the capital of France? "),
            Command::Ask("What is the capital of France?".to_string())
        );
    }

    #[test]
    fn history_renders_newest_first() {
        let mut history = History::default();
        assert_eq!(history.render(), "No questions asked yet.");

        history.record("first?", "one");
        history.record("second?", "two");
        assert_eq!(
            history.render(),
            "You: second?\nBot: two\n---\nYou: first?\nBot: one"
        );
    }
}
