use std::path::PathBuf;

use super::{StageKind, StageRunner};
use crate::context;
use crate::cost::CostRecord;
use crate::errors::StageError;
use crate::gateway::{ChatMessage, CompletionRecord};
use crate::paper::PaperDocument;
use crate::planning::PlanningRecord;
use crate::prompts::PLANNING_TURN_LABELS;
use crate::store::{ArtifactStore, PLANNING_RESPONSE, PLANNING_TRAJECTORIES};
use crate::trajectory::Trajectory;

/// Run the four-turn planning conversation: overview, design, task list and
/// config. Each turn sees every earlier turn.
///
/// The trajectory and responses are rewritten after every turn, so an
/// interrupted planning stage leaves the turns that finished.
pub async fn run_planning(
    runner: &mut StageRunner<'_>,
    paper: &PaperDocument,
) -> Result<PlanningRecord, StageError> {
    let kind = StageKind::Planning;
    let progress = runner.begin(kind, PLANNING_TURN_LABELS.len())?;
    let store = runner.store();

    let mut trajectory = Trajectory::with_system(context::planning_system(paper.format()));
    let mut responses: Vec<CompletionRecord> = Vec::new();
    let mut cost = CostRecord::default();

    let turns = context::planning_turns(paper);
    for (step, (turn, label)) in turns.into_iter().zip(PLANNING_TURN_LABELS).enumerate() {
        let display = kind.label(label);
        progress.start_file(&display);
        trajectory.push(ChatMessage::user(turn));

        let (record, increment) = match runner.complete(kind, label, &trajectory).await {
            Ok(result) => result,
            Err(e) => {
                runner.abort(kind, &progress, label, &e)?;
                return Err(e);
            }
        };
        let saved = persist_turn(store, step, label, record, &mut trajectory, &mut responses);
        let transcript = match saved {
            Ok(path) => path,
            Err(e) => {
                runner.abort(kind, &progress, label, &e)?;
                return Err(e);
            }
        };

        progress.file_done(&display, &transcript.display().to_string(), &increment);
        cost = cost.merge(&increment);
    }

    runner.finish(kind, &progress, PLANNING_TURN_LABELS.len(), &cost)?;
    Ok(PlanningRecord::from_trajectory(&trajectory)?)
}

/// Append a finished turn and rewrite every planning artifact. Returns the
/// turn's transcript path.
fn persist_turn(
    store: &ArtifactStore,
    step: usize,
    label: &str,
    record: CompletionRecord,
    trajectory: &mut Trajectory,
    responses: &mut Vec<CompletionRecord>,
) -> Result<PathBuf, StageError> {
    let content = record.content()?.to_string();
    trajectory.push(record.to_chat_message()?);
    responses.push(record);

    let transcript = store.write_text(
        &format!("planning_artifacts/1.{}_{label}.txt", step + 1),
        &content,
    )?;
    store.write_json(PLANNING_RESPONSE, responses.as_slice())?;
    trajectory.save(store, PLANNING_TRAJECTORIES)?;
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::StageOutcome;
    use crate::gateway::{RawCompletion, Usage};
    use crate::planning::{PlanInputs, extract_config};
    use crate::store::REPO_CONFIG;
    use crate::testing::{ScriptedGateway, TestRun};

    fn planning_gateway() -> ScriptedGateway {
        ScriptedGateway::new(|messages| {
            let turn = messages.iter().filter(|m| m.role == crate::gateway::Role::User).count();
            let text = match turn {
                1 => "Overview of the method".to_string(),
                2 => "```json\n{\"File list\": [\"model.py\"]}\n```".to_string(),
                3 => "```json\n{\"Task list\": [\"model.py\"], \"Logic Analysis\": [[\"model.py\", \"net\"]]}\n```"
                    .to_string(),
                _ => "## Code: config.yaml\n```yaml\nepochs: 3\n```".to_string(),
            };
            RawCompletion::Record(CompletionRecord::from_text(text, Some(Usage::new(50, 10))))
        })
    }

    #[tokio::test]
    async fn test_four_turns_accumulate_context() {
        let mut run = TestRun::new();
        let gateway = planning_gateway();
        let paper = PaperDocument::Markup("PAPER".to_string());

        let record = run_planning(&mut run.runner(&gateway), &paper).await.unwrap();
        assert_eq!(record.overview, "Overview of the method");
        assert!(record.config.as_deref().unwrap().contains("epochs: 3"));

        let calls = gateway.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[3].len(), 8);
        assert!(calls[3][1].content.contains("PAPER"));

        let store = &run.store;
        let saved = Trajectory::load(&store.path(PLANNING_TRAJECTORIES)).unwrap();
        assert_eq!(saved.len(), 9);
        let responses: Vec<CompletionRecord> = store.read_json(PLANNING_RESPONSE).unwrap();
        assert_eq!(responses.len(), 4);
        assert!(store.exists("planning_artifacts/1.3_task_list.txt"));
        assert_eq!(run.ledger.total().calls, 4);
    }

    #[tokio::test]
    async fn test_planning_feeds_config_and_task_list() {
        let mut run = TestRun::new();
        let gateway = planning_gateway();
        let paper = PaperDocument::Markup("PAPER".to_string());
        run_planning(&mut run.runner(&gateway), &paper).await.unwrap();

        extract_config(&run.store).unwrap();
        assert_eq!(
            run.store.read_repo_file(REPO_CONFIG).unwrap().as_deref(),
            Some("epochs: 3\n")
        );
        let inputs = PlanInputs::load(&run.store).unwrap();
        assert_eq!(inputs.tasks.files, vec!["model.py"]);
        assert_eq!(inputs.tasks.rationale("model.py"), "net");
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_earlier_turns() {
        let mut run = TestRun::new();
        let gateway = ScriptedGateway::failing_after(2);
        let paper = PaperDocument::Markup("PAPER".to_string());

        let err = run_planning(&mut run.runner(&gateway), &paper).await.unwrap_err();
        assert!(matches!(err, StageError::Gateway { ref file, .. } if file == "task_list"));

        let saved = Trajectory::load(&run.store.path(PLANNING_TRAJECTORIES)).unwrap();
        assert_eq!(saved.assistant_turns().len(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_transcript_fails_the_stage() {
        let mut run = TestRun::new();
        std::fs::create_dir_all(run.store.path("planning_artifacts/1.1_overview.txt")).unwrap();
        let gateway = planning_gateway();
        let paper = PaperDocument::Markup("PAPER".to_string());

        let err = run_planning(&mut run.runner(&gateway), &paper).await.unwrap_err();
        assert!(matches!(err, StageError::Other(_)));
        assert_eq!(gateway.call_count(), 1);

        let audit_run = run.audit.current_run().unwrap();
        match &audit_run.stages.last().unwrap().outcome {
            StageOutcome::Failed { file, .. } => assert_eq!(file.as_deref(), Some("overview")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
