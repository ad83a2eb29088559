//! The `examsession run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use examsession_core::controller::{SessionEnd, SessionEngine, SessionHandle};
use examsession_core::error::{ActionError, SubmissionError};
use examsession_core::model::{format_clock, Direction};
use examsession_core::outcome::ExamOutcome;
use examsession_core::plan::{parse_plan, validate_plan};
use examsession_core::session::{Lifecycle, SessionSnapshot, Step};
use examsession_core::traits::{ContentService, ScoringService, SessionObserver};
use examsession_providers::{load_config_from, MockContentService, MockScoringService};
use examsession_report::JsonFileHandoff;

pub struct RunArgs {
    pub plan: PathBuf,
    pub config: Option<PathBuf>,
    pub user: Option<String>,
    pub duration_secs: Option<u64>,
    pub output: Option<PathBuf>,
    pub html: bool,
    pub offline: bool,
}

/// Console session observer.
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_lifecycle(&self, lifecycle: Lifecycle) {
        match lifecycle {
            Lifecycle::Loading => eprintln!("Loading questions..."),
            Lifecycle::Finishing => eprintln!("Submitting answers..."),
            Lifecycle::Failed => eprintln!("Session failed."),
            Lifecycle::Active | Lifecycle::Completed => {}
        }
    }

    fn on_tick(&self, remaining_secs: u64) {
        if remaining_secs % 600 == 0 || remaining_secs == 60 || remaining_secs <= 10 {
            eprintln!("  Time left: {}", format_clock(remaining_secs));
        }
    }

    fn on_submission_error(&self, error: &SubmissionError) {
        eprintln!("  Submission failed: {}. Type `f` to retry.", error.reason());
    }
}

/// One line of user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserCommand {
    /// 1-based option number.
    Answer(usize),
    Move(Direction),
    /// 1-based subject and question numbers.
    Jump(usize, usize),
    Finish,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<UserCommand> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(UserCommand::Status);
    };
    let mut number = |what: &str| -> Result<usize> {
        let raw = parts
            .next()
            .with_context(|| format!("missing {what} number"))?;
        let n: usize = raw
            .parse()
            .with_context(|| format!("invalid {what} number: '{raw}'"))?;
        anyhow::ensure!(n >= 1, "{what} numbers start at 1");
        Ok(n)
    };

    let command = match verb.to_lowercase().as_str() {
        "a" | "answer" => UserCommand::Answer(number("option")?),
        "j" | "jump" => {
            let subject = number("subject")?;
            UserCommand::Jump(subject, number("question")?)
        }
        "f" | "finish" => UserCommand::Finish,
        "s" | "status" => UserCommand::Status,
        "h" | "help" | "?" => UserCommand::Help,
        "q" | "quit" => UserCommand::Quit,
        other => match other.parse::<Direction>() {
            Ok(direction) => UserCommand::Move(direction),
            Err(_) => anyhow::bail!("unknown command '{other}' (type `h` for help)"),
        },
    };
    Ok(command)
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let mut config = load_config_from(args.config.as_deref())?;
    if let Some(user) = args.user {
        config.user_id = user;
    }

    let plan = parse_plan(&args.plan)?;
    for w in validate_plan(&plan) {
        eprintln!("Warning: {}", w.message);
    }

    let content: Arc<dyn ContentService>;
    let scoring: Arc<dyn ScoringService>;
    if args.offline {
        anyhow::ensure!(
            !plan.bank.is_empty(),
            "--offline needs [[questions]] in the exam plan"
        );
        content = Arc::new(MockContentService::from_plan(&plan));
        scoring = Arc::new(MockScoringService::from_plan(&plan));
    } else {
        let service = Arc::new(config.http_service()?);
        tracing::info!("using exam service at {}", service.base_url());
        content = service.clone();
        scoring = service;
    }

    let output = args.output.unwrap_or_else(|| config.output_dir.clone());
    let handoff = Arc::new(JsonFileHandoff::new(output).with_html(args.html));
    let session_config = config.session_config(args.duration_secs.or(plan.duration_secs));

    eprintln!(
        "examsession v{}: {} ({} subjects, {})",
        env!("CARGO_PKG_VERSION"),
        plan.name,
        plan.subjects.len(),
        format_clock(session_config.duration_secs)
    );

    let engine = SessionEngine::new(content, scoring, session_config)
        .with_handoff(handoff.clone())
        .with_observer(Arc::new(ConsoleObserver));
    let running = engine
        .start(plan.subjects.clone())
        .await
        .context("failed to start the exam")?;
    let handle = running.handle();

    print_help();
    print_question(&handle.snapshot().await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match handle_line(&handle, &line).await? {
                    Flow::Continue => {}
                    Flow::Closed => break,
                    Flow::Quit => {
                        quit = true;
                        break;
                    }
                }
            }
            _ = handle.wait_for(|l| l.is_terminal()) => break,
        }
    }

    if quit {
        running.abandon();
        println!("Exam abandoned; nothing was submitted.");
        return Ok(());
    }

    // Input ended with the exam still open: hand it in.
    if handle.lifecycle() == Lifecycle::Active {
        handle.finish().await?;
    }
    if handle.wait_for(|l| *l != Lifecycle::Finishing).await? == Lifecycle::Active {
        let reason = handle.snapshot().await?.last_error.unwrap_or_default();
        running.abandon();
        anyhow::bail!("submission failed: {reason}");
    }
    drop(handle);

    match running.finished().await? {
        SessionEnd::Completed(outcome) => {
            print_summary(&outcome);
            println!("Results saved to: {}", handoff.json_path(&outcome).display());
            Ok(())
        }
        SessionEnd::Failed { last_error } => match last_error {
            Some(e) => Err(e).context("exam could not be submitted"),
            None => anyhow::bail!("exam could not be submitted"),
        },
    }
}

/// What the input loop does after one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
    /// The controller already ended; its outcome is collected afterwards.
    Closed,
}

async fn handle_line(handle: &SessionHandle, line: &str) -> Result<Flow> {
    let command = match parse_command(line) {
        Ok(UserCommand::Quit) => return Ok(Flow::Quit),
        Ok(command) => command,
        Err(e) => {
            eprintln!("  {e:#}");
            return Ok(Flow::Continue);
        }
    };
    match dispatch(handle, command).await {
        Ok(()) => Ok(Flow::Continue),
        Err(ActionError::SessionClosed) => Ok(Flow::Closed),
        Err(e) => Err(e.into()),
    }
}

async fn dispatch(handle: &SessionHandle, command: UserCommand) -> Result<(), ActionError> {
    match command {
        UserCommand::Answer(n) => {
            let snapshot = handle.snapshot().await?;
            let Some(option) = snapshot.question.options.get(n - 1) else {
                eprintln!("  No option {n}; this question has {}.", snapshot.question.options.len());
                return Ok(());
            };
            match handle.answer(&option.id).await {
                Ok(Step::Ignored) => eprintln!("  The exam is being submitted; answer ignored."),
                Ok(_) => print_question(&handle.snapshot().await?),
                Err(e) => eprintln!("  {e}"),
            }
        }
        UserCommand::Move(direction) => match handle.navigate(direction).await? {
            Step::Updated => print_question(&handle.snapshot().await?),
            Step::Finish(_) => println!("That was the last question."),
            Step::Ignored => eprintln!("  The exam is being submitted."),
        },
        UserCommand::Jump(subject, question) => {
            match handle.jump(subject - 1, question - 1).await {
                Ok(Step::Ignored) => eprintln!("  The exam is being submitted."),
                Ok(_) => print_question(&handle.snapshot().await?),
                Err(e) => eprintln!("  {e}"),
            }
        }
        UserCommand::Finish => {
            if handle.finish().await? == Step::Ignored {
                eprintln!("  Already submitting.");
            }
        }
        UserCommand::Status => print_status(&handle.snapshot().await?),
        UserCommand::Help => print_help(),
        UserCommand::Quit => {}
    }
    Ok(())
}

fn print_help() {
    println!("Commands: a <n> answer | n next | p previous | j <subject> <question> jump");
    println!("          f finish (or retry) | s status | h help | q quit without submitting");
}

fn print_question(snapshot: &SessionSnapshot) {
    println!(
        "\n[{}/{}] {}  question {}/{}  {}",
        snapshot.subject_index + 1,
        snapshot.subject_count,
        snapshot.subject.name,
        snapshot.question_index + 1,
        snapshot.answered_in_subject.len(),
        format_clock(snapshot.remaining_secs)
    );
    println!("  {}", snapshot.question.prompt);
    for (i, option) in snapshot.question.options.iter().enumerate() {
        let marker = if snapshot.selected_option_id.as_deref() == Some(option.id.as_str()) {
            '*'
        } else {
            ' '
        };
        println!("  {marker} {}) {}", i + 1, option.text);
    }
    if snapshot.is_last_question() {
        println!("  (last question: `n` hands the exam in)");
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    let grid: String = snapshot
        .answered_in_subject
        .iter()
        .map(|answered| if *answered { '#' } else { '.' })
        .collect();
    println!(
        "  {:?} | time left {} | answered {}/{} ({:.0}%) | {}: {grid}",
        snapshot.lifecycle,
        format_clock(snapshot.remaining_secs),
        snapshot.progress.answered,
        snapshot.progress.total,
        snapshot.progress.percent(),
        snapshot.subject.name
    );
    if let Some(error) = &snapshot.last_error {
        println!("  last submission failed: {error}");
    }
}

fn print_summary(outcome: &ExamOutcome) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Subject", "Score", "Correct", "Questions"]);

    for r in &outcome.results {
        table.add_row(vec![
            Cell::new(&r.subject_name),
            Cell::new(format!("{} / {}", r.score, r.max_score)),
            Cell::new(r.correct_answers),
            Cell::new(r.total_questions),
        ]);
    }
    let totals = &outcome.totals;
    table.add_row(vec![
        Cell::new("Total"),
        Cell::new(format!("{} / {}", totals.score, totals.max_score)),
        Cell::new(totals.correct_answers),
        Cell::new(totals.total_questions),
    ]);

    println!("\nExam finished ({})", outcome.trigger);
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("a 2").unwrap(), UserCommand::Answer(2));
        assert_eq!(
            parse_command("n").unwrap(),
            UserCommand::Move(Direction::Next)
        );
        assert_eq!(
            parse_command("prev").unwrap(),
            UserCommand::Move(Direction::Previous)
        );
        assert_eq!(parse_command("j 2 3").unwrap(), UserCommand::Jump(2, 3));
        assert_eq!(parse_command("F").unwrap(), UserCommand::Finish);
        assert_eq!(parse_command("  ").unwrap(), UserCommand::Status);
        assert_eq!(parse_command("q").unwrap(), UserCommand::Quit);
    }

    #[tokio::test]
    async fn input_after_session_end_closes_the_loop() {
        let plan = parse_plan(std::path::Path::new("../../plans/sample.toml")).unwrap();
        let engine = SessionEngine::new(
            Arc::new(MockContentService::from_plan(&plan)),
            Arc::new(MockScoringService::from_plan(&plan)),
            Default::default(),
        );
        let running = engine.start(plan.subjects.clone()).await.unwrap();
        let handle = running.handle();

        assert_eq!(handle_line(&handle, "f").await.unwrap(), Flow::Continue);
        handle.wait_for(|l| l.is_terminal()).await.unwrap();
        running.finished().await.unwrap();

        assert_eq!(handle_line(&handle, "s").await.unwrap(), Flow::Closed);
        assert_eq!(handle_line(&handle, "a 1").await.unwrap(), Flow::Closed);
        assert_eq!(handle_line(&handle, "bogus").await.unwrap(), Flow::Continue);
        assert_eq!(handle_line(&handle, "q").await.unwrap(), Flow::Quit);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(parse_command("a").is_err());
        assert!(parse_command("a 0").is_err());
        assert!(parse_command("a x").is_err());
        assert!(parse_command("j 1").is_err());
        assert!(parse_command("launch").is_err());
    }
}
