use crate::core::config::Config;
use crate::core::state::{StoryRequest, StoryResult, WorkflowState};
use crate::utils::export::save_story_artifacts;
use crate::utils::playback::{AudioBackend, NarrationPlayer, PlayerStatus};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::error::InquireError;
use inquire::validator::Validation;
use inquire::{Confirm, Select, Text};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const CUSTOM_THEME_OPTION: &str = "Something else...";

pub fn loading_message(state: WorkflowState) -> &'static str {
    match state {
        WorkflowState::GeneratingStory => "Weaving a new tale...",
        WorkflowState::GeneratingImage => "Painting the dream...",
        WorkflowState::GeneratingAudio => "Calming the night whispers...",
        _ => "Loading magic...",
    }
}

/// Esc and Ctrl-C end the session instead of surfacing as errors.
fn cancelled<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Asks for theme, hero and setting. `None` when the user backs out.
pub fn prompt_story_request(config: &Config) -> Result<Option<StoryRequest>> {
    println!("\nCreate a New Dream\n");

    let mut themes = config.themes.clone();
    themes.push(CUSTOM_THEME_OPTION.to_string());
    let Some(mut theme) = cancelled(Select::new("Theme:", themes).prompt())? else {
        return Ok(None);
    };
    if theme == CUSTOM_THEME_OPTION {
        let Some(custom) = cancelled(
            Text::new("Describe the theme:")
                .with_validator(non_blank("A theme needs a few words."))
                .prompt(),
        )?
        else {
            return Ok(None);
        };
        theme = custom.trim().to_string();
    }

    let Some(character) = cancelled(
        Text::new("Who is the hero?")
            .with_placeholder("e.g. Luna the Little Dragon")
            .with_validator(non_blank("Every story needs a hero."))
            .prompt(),
    )?
    else {
        return Ok(None);
    };

    let Some(setting) = cancelled(Select::new("Setting:", config.settings.clone()).prompt())? else {
        return Ok(None);
    };

    Ok(Some(StoryRequest::new(&theme, &character, &setting)?))
}

fn non_blank(
    message: &'static str,
) -> impl Fn(&str) -> Result<Validation, inquire::CustomUserError> + Clone {
    move |input: &str| {
        if input.trim().is_empty() {
            Ok(Validation::Invalid(message.into()))
        } else {
            Ok(Validation::Valid)
        }
    }
}

pub fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")?);
    pb.set_message(loading_message(WorkflowState::Idle));
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

pub fn render_story(story: &StoryResult) {
    println!("\n{}\n{}\n", story.title, "=".repeat(story.title.chars().count()));
    for paragraph in story.paragraphs() {
        println!("{}\n", paragraph);
    }
    if story.image_url.is_some() {
        println!("(An illustration was painted for this story. Save it to have a look.)\n");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    Listen,
    Pause,
    Save,
    NewStory,
    Quit,
}

impl fmt::Display for ResultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResultAction::Listen => "Listen to story",
            ResultAction::Pause => "Pause story",
            ResultAction::Save => "Save illustration & narration",
            ResultAction::NewStory => "New story",
            ResultAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

pub fn result_actions(can_play: bool, playing: bool) -> Vec<ResultAction> {
    let mut actions = Vec::with_capacity(5);
    if can_play {
        actions.push(if playing {
            ResultAction::Pause
        } else {
            ResultAction::Listen
        });
    }
    actions.extend([ResultAction::Save, ResultAction::NewStory, ResultAction::Quit]);
    actions
}

/// Shows a finished story until the user asks for a new one or quits.
///
/// The narration player lives only inside this view, so leaving it (by any
/// path) stops playback.
pub fn show_story(
    story: &StoryResult,
    config: &Config,
    backend: Option<Box<dyn AudioBackend>>,
) -> Result<ResultAction> {
    render_story(story);

    let mut player = match (&story.audio_payload, backend) {
        (Some(_), Some(backend)) => Some(NarrationPlayer::new(backend, config.audio)),
        _ => None,
    };

    loop {
        let playing = player.as_mut().is_some_and(NarrationPlayer::is_playing);
        let actions = result_actions(player.is_some(), playing);

        let Some(action) = cancelled(Select::new("What next?", actions).prompt())? else {
            return Ok(ResultAction::Quit);
        };

        match action {
            ResultAction::Listen | ResultAction::Pause => {
                if let (Some(player), Some(payload)) = (player.as_mut(), &story.audio_payload) {
                    match player.toggle(payload) {
                        Ok(PlayerStatus::Playing) => println!("Playing narration..."),
                        Ok(PlayerStatus::Stopped) => println!("Narration paused."),
                        Err(e) => {
                            log::error!("Failed to play audio: {:#}", e);
                            println!("Could not play the narration: {}", e);
                        }
                    }
                }
            }
            ResultAction::Save => {
                let dir = Path::new(&config.output_folder);
                match save_story_artifacts(story, dir, config.audio) {
                    Ok(written) => {
                        for path in written {
                            println!("Saved {}", path.display());
                        }
                    }
                    Err(e) => {
                        log::error!("Failed to save story: {:#}", e);
                        println!("Could not save the story: {:#}", e);
                    }
                }
            }
            ResultAction::NewStory | ResultAction::Quit => return Ok(action),
        }
    }
}

/// Error view. Returns true when the user wants to try again.
pub fn show_error(message: &str) -> Result<bool> {
    println!("\nMagic Interrupted\n{}\n", message);
    let again = cancelled(Confirm::new("Try again?").with_default(true).prompt())?;
    Ok(again.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_messages_follow_state() {
        assert_eq!(loading_message(WorkflowState::GeneratingStory), "Weaving a new tale...");
        assert_eq!(loading_message(WorkflowState::GeneratingImage), "Painting the dream...");
        assert_eq!(
            loading_message(WorkflowState::GeneratingAudio),
            "Calming the night whispers..."
        );
        assert_eq!(loading_message(WorkflowState::Ready), "Loading magic...");
    }

    #[test]
    fn test_result_actions() {
        assert_eq!(
            result_actions(true, false),
            vec![
                ResultAction::Listen,
                ResultAction::Save,
                ResultAction::NewStory,
                ResultAction::Quit
            ]
        );
        assert_eq!(result_actions(true, true)[0], ResultAction::Pause);
        assert_eq!(result_actions(false, false)[0], ResultAction::Save);
    }

    #[test]
    fn test_non_blank_validator() {
        let validate = non_blank("required");
        assert!(matches!(validate("  "), Ok(Validation::Invalid(_))));
        assert!(matches!(validate("Luna"), Ok(Validation::Valid)));
    }
}
