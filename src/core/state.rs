use crate::core::error::StoryError;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryRequest {
    pub theme: String,
    pub character: String,
    pub setting: String,
}

impl StoryRequest {
    /// Builds a request, rejecting a blank character name.
    pub fn new(theme: &str, character: &str, setting: &str) -> Result<Self, StoryError> {
        let request = Self {
            theme: theme.to_string(),
            character: character.trim().to_string(),
            setting: setting.to_string(),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), StoryError> {
        if self.character.trim().is_empty() {
            return Err(StoryError::Validation(
                "Please tell us who the hero of the story is.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Title and body as returned by the story model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryText {
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct StoryResult {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub audio_payload: Option<String>,
}

impl StoryResult {
    /// Non-blank lines of the story body.
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content
            .split('\n')
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    #[default]
    Idle,
    GeneratingStory,
    GeneratingImage,
    GeneratingAudio,
    Ready,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    Submit,
    StoryDone,
    ImageDone,
    AudioDone,
    Fail,
    Reset,
}

impl WorkflowState {
    pub fn is_generating(self) -> bool {
        matches!(
            self,
            WorkflowState::GeneratingStory
                | WorkflowState::GeneratingImage
                | WorkflowState::GeneratingAudio
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Ready | WorkflowState::Failed)
    }

    /// Transition table. `None` means the event is not allowed in this state.
    pub fn next(self, event: WorkflowEvent) -> Option<WorkflowState> {
        use WorkflowEvent as E;
        use WorkflowState as S;
        match (self, event) {
            (S::Idle, E::Submit) => Some(S::GeneratingStory),
            (S::GeneratingStory, E::StoryDone) => Some(S::GeneratingImage),
            (S::GeneratingImage, E::ImageDone) => Some(S::GeneratingAudio),
            (S::GeneratingAudio, E::AudioDone) => Some(S::Ready),
            (s, E::Fail) if s.is_generating() => Some(S::Failed),
            (S::Ready | S::Failed, E::Reset) => Some(S::Idle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_rejects_blank_character() {
        let err = StoryRequest::new("Magic Forest", "   \t", "On a floating cloud").unwrap_err();
        assert!(matches!(err, StoryError::Validation(_)));
    }

    #[test]
    fn test_request_trims_character() {
        let req =
            StoryRequest::new("Lost Island", "  Luna the Little Dragon ", "In a candy castle")
                .unwrap();
        assert_eq!(req.character, "Luna the Little Dragon");
    }

    #[test]
    fn test_forward_path() {
        let mut state = WorkflowState::Idle;
        for event in [
            WorkflowEvent::Submit,
            WorkflowEvent::StoryDone,
            WorkflowEvent::ImageDone,
            WorkflowEvent::AudioDone,
        ] {
            state = state.next(event).unwrap();
        }
        assert_eq!(state, WorkflowState::Ready);
        assert_eq!(state.next(WorkflowEvent::Reset), Some(WorkflowState::Idle));
    }

    #[test]
    fn test_fail_only_from_generating_states() {
        assert_eq!(
            WorkflowState::GeneratingImage.next(WorkflowEvent::Fail),
            Some(WorkflowState::Failed)
        );
        assert_eq!(WorkflowState::Idle.next(WorkflowEvent::Fail), None);
        assert_eq!(WorkflowState::Ready.next(WorkflowEvent::Fail), None);
    }

    #[test]
    fn test_illegal_transitions() {
        assert_eq!(WorkflowState::GeneratingStory.next(WorkflowEvent::Submit), None);
        assert_eq!(WorkflowState::Ready.next(WorkflowEvent::Submit), None);
        assert_eq!(WorkflowState::GeneratingAudio.next(WorkflowEvent::Reset), None);
        assert_eq!(WorkflowState::GeneratingStory.next(WorkflowEvent::ImageDone), None);
        assert_eq!(WorkflowState::Idle.next(WorkflowEvent::Reset), None);
    }

    #[test]
    fn test_paragraphs_skip_blank_lines() {
        let story = StoryResult {
            content: "Once upon a time.\n\n  The moon smiled.  \nThe end.".to_string(),
            ..Default::default()
        };
        let paragraphs: Vec<&str> = story.paragraphs().collect();
        assert_eq!(paragraphs, vec!["Once upon a time.", "The moon smiled.", "The end."]);
    }
}
