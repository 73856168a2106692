//! Interactive lesson walk on stdin/stdout.

use lesson_core::model::{LessonId, OptionId, StepType, UserId};
use services::{CompletionReport, HelpView, LessonSessionService, SessionError, StepView};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    svc: &LessonSessionService,
    user: &UserId,
    lesson: &LessonId,
) -> anyhow::Result<()> {
    let mut step = svc.start_lesson(user, lesson).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_step(&step);
        if step.completed {
            println!("This lesson is already completed.");
            return Ok(());
        }

        let Some(input) = lines.next_line().await? else {
            println!("Progress saved.");
            return Ok(());
        };
        let input = input.trim();
        if input == "q" {
            println!("Progress saved.");
            return Ok(());
        }

        let completion = if step.has_options() {
            if input == "h" {
                if !step.help_available {
                    println!("No help for this step.");
                    continue;
                }
                let help = svc.request_help(user, lesson, &step.step_id).await?;
                print_help(&help);
                step = help.step;
                continue;
            }
            let Some(option) = pick(&step, input) else {
                println!("Pick 1-{}, h for help, or q to quit.", step.options.len());
                continue;
            };
            match svc.submit_answer(user, lesson, &option).await {
                Ok(result) => {
                    let verdict = match result.feedback.is_correct {
                        Some(true) => "Correct. ",
                        Some(false) => "Not quite. ",
                        None => "",
                    };
                    println!("\n{verdict}{}\n", result.feedback.response);
                    step = result.step;
                    result.completion
                }
                Err(e @ SessionError::Persistence { .. }) if e.is_retryable() => {
                    println!("Could not save ({e}); try again.");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            let result = svc.advance(user, lesson).await?;
            step = result.step;
            result.completion
        };

        if let Some(report) = completion {
            print_completion(&report);
            return Ok(());
        }
    }
}

fn pick(step: &StepView, input: &str) -> Option<OptionId> {
    let n: usize = input.parse().ok()?;
    step.options.get(n.checked_sub(1)?).map(|o| o.id.clone())
}

fn print_step(step: &StepView) {
    let label = match step.step_type {
        StepType::Narration => "",
        StepType::Question => "? ",
        StepType::Scripture => "Scripture: ",
        StepType::Reflection => "Reflect: ",
    };
    println!("[{}/{}] {label}{}", step.position + 1, step.total_steps, step.text);
    if let Some(passage) = &step.scripture {
        println!("    {passage}");
    }
    for (i, option) in step.options.iter().enumerate() {
        let mark = if step.selected.as_ref() == Some(&option.id) { '*' } else { ' ' };
        println!("  {mark}{}. {}", i + 1, option.text);
    }
    if step.help_available && !step.help_used {
        println!("  (h for help)");
    }
    if !step.has_options() && !step.completed {
        println!("  [enter to continue]");
    }
}

fn print_help(help: &HelpView) {
    println!();
    for line in help_lines(help) {
        println!("{line}");
    }
    println!();
}

fn help_lines(help: &HelpView) -> Vec<String> {
    let mut lines = Vec::with_capacity(help.elaboration.len() * 2);
    for (i, option) in help.elaboration.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, option.text));
        lines.push(format!("     {}", option.response));
    }
    lines
}

fn print_completion(report: &CompletionReport) {
    println!(
        "Lesson {} complete in {} min.",
        report.lesson_id,
        report.time_spent.num_minutes()
    );
    for unlocked in &report.newly_unlocked {
        println!("Unlocked: {unlocked}");
    }
    if let Some(next) = &report.next_lesson {
        println!("Next up: {next}");
    }
}
