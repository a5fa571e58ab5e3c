use crate::session::TurnOutcome;
use console::{Style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

/// Represents the type of a chat message, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMessageType {
    /// The prompt for user input.
    Prompt,
    /// Footer information, like the turn outcome.
    Footer,
    /// An error message.
    Error,
}

/// Styles a string of text according to the specified `ChatMessageType`.
pub fn style_chat_text(text: &str, style: ChatMessageType) -> StyledObject<&str> {
    let style_obj = match style {
        ChatMessageType::Prompt => Style::new().blue().bold(),
        ChatMessageType::Footer => Style::new().white().dim(),
        ChatMessageType::Error => Style::new().red().bold(),
    };
    style_obj.apply_to(text)
}

/// Formats a turn outcome into a footer line for display under the reply.
pub fn format_turn_footer(outcome: &TurnOutcome) -> String {
    let footer = match outcome {
        TurnOutcome::Completed { finish_reason } => {
            let mut line = String::from("◼ Completed");
            if let Some(reason) = finish_reason {
                line.push_str(&format!(" ({reason})"));
            }
            line.push('.');
            line
        }
        TurnOutcome::Cancelled => "◼ Cancelled.".to_string(),
        TurnOutcome::Interrupted { message } => {
            format!("◼ Interrupted: {message}. Use /retry to regenerate.")
        }
    };
    style_chat_text(&footer, ChatMessageType::Footer).to_string()
}

pub fn present_error(error: anyhow::Error) {
    eprintln!("{} {error:#}", style_chat_text("Error:", ChatMessageType::Error));
}

/// A spinner to indicate that a response is being generated.
#[derive(Debug)]
pub struct GenerationSpinner {
    spinner: ProgressBar,
}

impl GenerationSpinner {
    /// Creates a new `GenerationSpinner` with a message.
    pub fn new(msg: String) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.set_message(msg);
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { spinner }
    }

    /// Stops the spinner and clears it from the terminal.
    pub fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}
