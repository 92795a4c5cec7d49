use crate::core::error::StoryError;
use crate::core::state::{StoryRequest, StoryResult, WorkflowEvent, WorkflowState};
use crate::services::gemini::StoryGenerator;
use log::{error, info};

/// Runs story, illustration and narration generation in sequence and tracks
/// which step is in flight.
#[derive(Debug)]
pub struct StoryWorkflow<G: StoryGenerator> {
    generator: G,
    state: WorkflowState,
    story: StoryResult,
    error: Option<String>,
}

impl<G: StoryGenerator> StoryWorkflow<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            state: WorkflowState::Idle,
            story: StoryResult::default(),
            error: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// The finished story, only while `Ready`.
    pub fn story(&self) -> Option<&StoryResult> {
        (self.state == WorkflowState::Ready).then_some(&self.story)
    }

    /// What went wrong, only while `Failed`.
    pub fn error_message(&self) -> Option<&str> {
        if self.state == WorkflowState::Failed {
            self.error.as_deref()
        } else {
            None
        }
    }

    fn transition(
        &mut self,
        event: WorkflowEvent,
        observer: &mut dyn FnMut(WorkflowState),
    ) -> Result<(), StoryError> {
        let next = self.state.next(event).ok_or(StoryError::InvalidState {
            state: self.state,
            action: event_action(event),
        })?;
        info!("Workflow {:?} -> {:?}", self.state, next);
        self.state = next;
        observer(next);
        Ok(())
    }

    /// Generates a complete story for `request`.
    ///
    /// Only accepted while `Idle`. A blank character is rejected without
    /// leaving `Idle`. The first failing step moves the workflow to `Failed`
    /// and drops everything generated so far. `observer` sees every state the
    /// workflow enters.
    pub async fn submit<F>(
        &mut self,
        request: &StoryRequest,
        mut observer: F,
    ) -> Result<&StoryResult, StoryError>
    where
        F: FnMut(WorkflowState),
    {
        if self.state != WorkflowState::Idle {
            return Err(StoryError::InvalidState {
                state: self.state,
                action: event_action(WorkflowEvent::Submit),
            });
        }
        request.validate()?;

        self.story = StoryResult::default();
        self.error = None;
        self.transition(WorkflowEvent::Submit, &mut observer)?;

        let outcome = self.run_steps(request, &mut observer).await;
        match outcome {
            Ok(()) => Ok(&self.story),
            Err(err) => {
                error!("Story generation failed in {:?}: {}", self.state, err);
                self.story = StoryResult::default();
                self.error = Some(err.user_message());
                self.state = self
                    .state
                    .next(WorkflowEvent::Fail)
                    .unwrap_or(WorkflowState::Failed);
                observer(self.state);
                Err(err)
            }
        }
    }

    async fn run_steps(
        &mut self,
        request: &StoryRequest,
        observer: &mut dyn FnMut(WorkflowState),
    ) -> Result<(), StoryError> {
        let text = self
            .generator
            .generate_story(&request.theme, &request.character, &request.setting)
            .await?;
        info!("Story ready: \"{}\" ({} chars)", text.title, text.content.len());
        self.story.title = text.title;
        self.story.content = text.content;
        self.transition(WorkflowEvent::StoryDone, observer)?;

        let image_url = self
            .generator
            .generate_image(&self.story.title, &self.story.content)
            .await?;
        self.story.image_url = Some(image_url);
        self.transition(WorkflowEvent::ImageDone, observer)?;

        let audio = self.generator.generate_audio(&self.story.content).await?;
        self.story.audio_payload = Some(audio);
        self.transition(WorkflowEvent::AudioDone, observer)?;
        Ok(())
    }

    /// Back to `Idle` from `Ready` or `Failed`, discarding the previous outcome.
    pub fn reset(&mut self) -> Result<(), StoryError> {
        self.transition(WorkflowEvent::Reset, &mut |_: WorkflowState| {})?;
        self.story = StoryResult::default();
        self.error = None;
        Ok(())
    }
}

fn event_action(event: WorkflowEvent) -> &'static str {
    match event {
        WorkflowEvent::Submit => "start a new story",
        WorkflowEvent::StoryDone => "finish the story step",
        WorkflowEvent::ImageDone => "finish the illustration step",
        WorkflowEvent::AudioDone => "finish the narration step",
        WorkflowEvent::Fail => "fail",
        WorkflowEvent::Reset => "reset",
    }
}
