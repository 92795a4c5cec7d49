use anyhow::Result;
use dreamweaver::core::config::Config;
use dreamweaver::core::state::WorkflowState;
use dreamweaver::services::gemini::GeminiClient;
use dreamweaver::services::workflow::StoryWorkflow;
use dreamweaver::ui::{self, ResultAction};
use dreamweaver::utils::playback::default_backend;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Configuration and credential
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Err(e);
        }
    };
    let api_key = Config::api_key()?;

    // 2. Gemini client and workflow
    let client = GeminiClient::from_config(&config, &api_key)?;
    let mut workflow = StoryWorkflow::new(client);

    println!("DreamWeaver");
    println!("Unique bedtime stories for peaceful dreams.");

    // 3. Form -> generation -> story / error, until the user quits
    loop {
        match workflow.state() {
            WorkflowState::Idle => {
                let Some(request) = ui::prompt_story_request(&config)? else {
                    break;
                };

                let pb = ui::spinner()?;
                let outcome = workflow
                    .submit(&request, |state| pb.set_message(ui::loading_message(state)))
                    .await
                    .map(|_| ());
                pb.finish_and_clear();

                if let Err(e) = outcome {
                    // Rejected before starting; the form is shown again.
                    if workflow.state() == WorkflowState::Idle {
                        println!("{}", e.user_message());
                    }
                }
            }
            WorkflowState::Ready => {
                let Some(story) = workflow.story().cloned() else {
                    break;
                };
                match ui::show_story(&story, &config, default_backend())? {
                    ResultAction::NewStory => workflow.reset()?,
                    _ => break,
                }
            }
            WorkflowState::Failed => {
                let message = workflow.error_message().unwrap_or_default().to_string();
                if ui::show_error(&message)? {
                    workflow.reset()?;
                } else {
                    break;
                }
            }
            state => {
                log::error!("Workflow left in {:?} after generation returned", state);
                break;
            }
        }
    }

    println!("Sweet dreams!");
    Ok(())
}
