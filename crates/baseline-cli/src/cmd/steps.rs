use crate::output::{print_json, print_table};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StepSummary<'a> {
    index: usize,
    name: &'a str,
    operations: Vec<String>,
}

pub fn run(root: &Path, config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let plan = super::plan(root, config_path)?;

    if json {
        let summaries: Vec<StepSummary<'_>> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepSummary {
                index: i + 1,
                name: step.name(),
                operations: step.operations().iter().map(|op| op.to_string()).collect(),
            })
            .collect();
        return print_json(&summaries);
    }

    let rows: Vec<Vec<String>> = plan
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            vec![
                (i + 1).to_string(),
                step.name().to_string(),
                step.operations().len().to_string(),
            ]
        })
        .collect();
    print_table(&["#", "STEP", "OPS"], &rows);
    Ok(())
}
