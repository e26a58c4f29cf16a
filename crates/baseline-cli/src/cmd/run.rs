use crate::output::print_json;
use baseline_cli::templates::template_store;
use baseline_core::action::SystemRunner;
use baseline_core::mutation::ProjectTree;
use baseline_core::sequencer::{RunState, Sequencer, StepRecord, StepStatus};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct RunSummary<'a> {
    root: String,
    app_name: &'a str,
    state: RunState,
    steps: &'a [StepRecord],
}

pub fn run(root: &Path, config_path: Option<&Path>, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let plan = super::plan(root, config_path)?;

    if dry_run {
        for (i, step) in plan.steps.iter().enumerate() {
            println!("{:>2}. {}", i + 1, step.name());
            for op in step.operations() {
                println!("      {op}");
            }
        }
        return Ok(());
    }

    if !root.is_dir() {
        anyhow::bail!("application root {} is not a directory", root.display());
    }

    let tree = ProjectTree::new(root);
    let templates = template_store(&plan.config.template_paths);
    let context = plan.input.context();
    let runner = SystemRunner::new().with_path_prefix(plan.config.action_path.iter().cloned());

    let total = plan.steps.len();
    let report = Sequencer::new(&tree, &templates, &context, &runner).run_with(&plan.steps, |event| {
        if !json && event.status == StepStatus::Succeeded {
            println!("  applied: {}", event.name);
        }
    });

    if json {
        print_json(&RunSummary {
            root: root.display().to_string(),
            app_name: &plan.input.app_name,
            state: report.state,
            steps: &report.steps,
        })?;
    }

    let applied = report.succeeded();
    if let Some(failure) = report.failure {
        anyhow::bail!("{failure} ({applied}/{total} steps applied)");
    }

    if !json {
        println!();
        println!("{} baseline applied to {}: {applied} steps", plan.input.app_name, root.display());
    }
    Ok(())
}
