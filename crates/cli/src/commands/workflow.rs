use serde::Serialize;
use tripflow_core::domain::request::RequestKind;
use tripflow_core::domain::user::Role;
use tripflow_core::workflow::{workflow_for, WorkflowAction, STATUS_CANCELLED, STATUS_REJECTED};

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct StageRow {
    status: &'static str,
    role: Role,
    actions: Vec<WorkflowAction>,
    legacy_aliases: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct WorkflowTable {
    module: &'static str,
    kind: RequestKind,
    stages: Vec<StageRow>,
    approved_status: &'static str,
    approved_aliases: Vec<&'static str>,
    processing_role: Role,
    processed_status: &'static str,
    processing_can_reject: bool,
    terminal_statuses: [&'static str; 2],
}

pub fn run(module: &str, json_output: bool) -> CommandResult {
    let Some(kind) = RequestKind::parse(module) else {
        let known: Vec<&str> = RequestKind::ALL.iter().map(RequestKind::as_str).collect();
        return CommandResult::failure(
            "workflow",
            "unknown_module",
            format!("unknown module `{module}`; expected one of: {}", known.join(", ")),
            2,
        );
    };

    let table = build_table(kind);
    let output = if json_output {
        match serde_json::to_string_pretty(&table) {
            Ok(output) => output,
            Err(error) => {
                return CommandResult::failure("workflow", "serialization", error.to_string(), 1)
            }
        }
    } else {
        render_human(&table)
    };
    CommandResult { exit_code: 0, output }
}

fn build_table(kind: RequestKind) -> WorkflowTable {
    let definition = workflow_for(kind);
    WorkflowTable {
        module: kind.label(),
        kind,
        stages: definition
            .stages
            .iter()
            .map(|stage| StageRow {
                status: stage.status,
                role: stage.role,
                actions: stage.actions.to_vec(),
                legacy_aliases: stage.legacy_aliases.to_vec(),
            })
            .collect(),
        approved_status: definition.approved_status,
        approved_aliases: definition.approved_aliases.to_vec(),
        processing_role: definition.processing.role,
        processed_status: definition.processing.processed_status,
        processing_can_reject: definition.processing.can_reject,
        terminal_statuses: [STATUS_REJECTED, STATUS_CANCELLED],
    }
}

fn render_human(table: &WorkflowTable) -> String {
    let mut lines = vec![format!("{} workflow", table.module)];
    for (index, stage) in table.stages.iter().enumerate() {
        let actions: Vec<&str> = stage.actions.iter().map(WorkflowAction::as_str).collect();
        let mut line =
            format!("{}. {} [{}] actions: {}", index + 1, stage.status, stage.role.label(), actions.join("/"));
        if !stage.legacy_aliases.is_empty() {
            line.push_str(&format!(" (legacy: {})", stage.legacy_aliases.join(", ")));
        }
        lines.push(line);
    }

    let mut approved = format!("=> {}", table.approved_status);
    if !table.approved_aliases.is_empty() {
        approved.push_str(&format!(" (legacy: {})", table.approved_aliases.join(", ")));
    }
    lines.push(approved);

    let reject = if table.processing_can_reject { "process/reject" } else { "process" };
    lines.push(format!(
        "=> {} [{}] actions: {reject}",
        table.processed_status,
        table.processing_role.label()
    ));
    lines.push(format!("terminal: {}", table.terminal_statuses.join(", ")));
    lines.join("\n")
}
