use std::rc::Rc;

use anyhow::{bail, Context, Result};
use huddle_core::codec::{Collection, WireEntity};
use huddle_core::drag::{TransitionOutcome, TransitionRequest};
use huddle_core::ids::now_timestamp;
use huddle_core::models::{Board, Task, TaskStatus};
use huddle_core::presence::{AdmissionState, MemoryRoster, PresenceArbiter};
use huddle_core::remote::{ChangeOp, MemoryRemote};
use huddle_core::CoreRuntime;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::config::CliConfig;
use super::protocol::CliCommand;

pub async fn run_command(command: CliCommand, config: &CliConfig) -> Result<Value> {
    match command {
        CliCommand::Simulate {
            clients,
            tasks,
            fail_every,
        } => simulate(config, clients.unwrap_or(config.clients), tasks, fail_every).await,
        CliCommand::Presence { names } => presence(config, &names).await,
        CliCommand::CsvRoundTrip { input } => {
            let csv = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read CSV file: {}", input.display()))?;
            csv_round_trip(config, &csv).await
        }
        CliCommand::ShowConfig => serde_json::to_value(config).context("Failed to serialize config"),
    }
}

/// A store holding only the default board, as a fresh deployment has.
fn seeded_remote(config: &CliConfig) -> MemoryRemote {
    let remote = MemoryRemote::new();
    let board = Board {
        id: config.core.default_board.clone(),
        name: config.core.default_board.clone(),
        permanent: true,
        created_at: now_timestamp(),
    };
    remote.seed(Collection::Boards, vec![board.to_wire()]);
    remote
}

async fn start_client(config: &CliConfig, remote: &MemoryRemote, index: usize) -> Result<CoreRuntime> {
    let mut core = config.core.clone();
    core.data_dir = config.client_dir(index);
    let mut runtime = CoreRuntime::new(core, Rc::new(remote.clone()))
        .with_context(|| format!("Failed to create client {}", index))?;
    runtime.start().await?;
    Ok(runtime)
}

async fn pump_all(runtimes: &mut [CoreRuntime]) -> Result<()> {
    for runtime in runtimes.iter_mut() {
        runtime.pump().await?;
    }
    Ok(())
}

async fn simulate(
    config: &CliConfig,
    clients: usize,
    tasks: usize,
    fail_every: Option<usize>,
) -> Result<Value> {
    if clients == 0 {
        bail!("simulate needs at least one client");
    }

    let remote = seeded_remote(config);
    let mut runtimes = Vec::with_capacity(clients);
    for index in 0..clients {
        runtimes.push(start_client(config, &remote, index).await?);
    }

    let board_id = config.core.default_board.clone();
    let mut created = Vec::new();
    let mut rolled_back = 0;
    for n in 0..tasks {
        if matches!(fail_every, Some(every) if every > 0 && (n + 1) % every == 0) {
            remote.fail_next(Collection::Tasks, ChangeOp::Insert, 1);
        }
        let author = &runtimes[n % clients];
        match author.add_task(Task::new(&board_id, format!("task {}", n + 1))).await {
            Ok(task) => created.push(task),
            Err(e) if e.is_retryable() => {
                warn!(task = n + 1, error = %e, "write rolled back");
                rolled_back += 1;
            }
            Err(e) => return Err(e.into()),
        }
        pump_all(&mut runtimes).await?;
    }

    // Every task is dragged one column by a client other than its author
    let mut moved = 0;
    for (n, task) in created.iter().enumerate() {
        let mover = &runtimes[(n + 1) % clients];
        let request = TransitionRequest::new(&task.id, TaskStatus::Todo, TaskStatus::Quarter);
        if let TransitionOutcome::Moved(_) = mover.move_task(request).await? {
            moved += 1;
        }
        pump_all(&mut runtimes).await?;
    }

    let converged = runtimes
        .windows(2)
        .all(|pair| *pair[0].data_store().borrow() == *pair[1].data_store().borrow());
    let overview = runtimes[0].data_store().borrow().tasks_overview();
    info!(clients, created = created.len(), rolled_back, converged, "simulation finished");

    for runtime in runtimes.iter_mut() {
        runtime.shutdown();
    }

    Ok(json!({
        "clients": clients,
        "tasksRequested": tasks,
        "created": created.len(),
        "rolledBack": rolled_back,
        "moved": moved,
        "remoteWrites": remote.write_count(),
        "converged": converged,
        "overview": overview,
    }))
}

async fn presence(config: &CliConfig, names: &[String]) -> Result<Value> {
    let roster = MemoryRoster::new();
    let arbiter = PresenceArbiter::new(Rc::new(roster.clone()), config.core.max_sessions_per_name);

    let mut attempts = Vec::with_capacity(names.len());
    for name in names {
        let entry = match arbiter.admit(name).await? {
            AdmissionState::Admitted(record) => json!({
                "name": name,
                "state": "admitted",
                "sessionId": record.session_id,
            }),
            AdmissionState::Rejected { holders } => json!({
                "name": name,
                "state": "rejected",
                "holders": holders,
            }),
            other => json!({ "name": name, "state": format!("{:?}", other) }),
        };
        attempts.push(entry);
    }

    Ok(json!({
        "maxSessionsPerName": arbiter.max_sessions(),
        "attempts": attempts,
        "liveSessions": roster.sessions().len(),
    }))
}

async fn csv_round_trip(config: &CliConfig, csv: &str) -> Result<Value> {
    let remote = seeded_remote(config);
    let mut runtime = start_client(config, &remote, 0).await?;
    runtime.switch_board(&config.core.default_board)?;

    let imported = runtime.import_csv(csv).await?;
    runtime.pump().await?;
    let exported = runtime.export_active_board_csv()?;
    runtime.shutdown();

    Ok(json!({
        "boardId": config.core.default_board,
        "imported": imported.len(),
        "csv": exported,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> CliConfig {
        let mut config = CliConfig::default();
        config.core.data_dir = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_simulate_converges() {
        let dir = tempfile::tempdir().unwrap();
        let command = CliCommand::Simulate {
            clients: Some(3),
            tasks: 6,
            fail_every: None,
        };
        let result = run_command(command, &config(&dir)).await.unwrap();
        assert_eq!(result["created"], 6);
        assert_eq!(result["moved"], 6);
        assert_eq!(result["converged"], true);
        assert_eq!(result["overview"]["totalTasks"], 6);
    }

    #[tokio::test]
    async fn test_simulate_counts_rollbacks() {
        let dir = tempfile::tempdir().unwrap();
        let command = CliCommand::Simulate {
            clients: None,
            tasks: 4,
            fail_every: Some(2),
        };
        let result = run_command(command, &config(&dir)).await.unwrap();
        assert_eq!(result["clients"], 2);
        assert_eq!(result["created"], 2);
        assert_eq!(result["rolledBack"], 2);
        assert_eq!(result["converged"], true);
    }

    #[tokio::test]
    async fn test_simulate_rejects_zero_clients() {
        let dir = tempfile::tempdir().unwrap();
        let command = CliCommand::Simulate {
            clients: Some(0),
            tasks: 1,
            fail_every: None,
        };
        assert!(run_command(command, &config(&dir)).await.is_err());
    }

    #[tokio::test]
    async fn test_presence_reports_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["kayden", "Kayden", "KAYDEN", "yukti"].map(String::from).to_vec();
        let result = run_command(CliCommand::Presence { names }, &config(&dir)).await.unwrap();
        let states: Vec<&str> = result["attempts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["state"].as_str().unwrap())
            .collect();
        assert_eq!(states, vec!["admitted", "admitted", "rejected", "admitted"]);
        assert_eq!(result["liveSessions"], 3);
    }

    #[tokio::test]
    async fn test_csv_round_trip_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tasks.csv");
        std::fs::write(
            &input,
            "title,description,assignee,dueDate,status,skills,createdAt\n\
             Wire motor,left side,yukti,2026-03-01,50,electrical;build,2026-02-01\n",
        )
        .unwrap();

        let result = run_command(CliCommand::CsvRoundTrip { input }, &config(&dir))
            .await
            .unwrap();
        assert_eq!(result["imported"], 1);
        assert_eq!(
            result["csv"].as_str().unwrap(),
            "title,description,assignee,dueDate,status,skills,createdAt\n\
             Wire motor,left side,yukti,2026-03-01,50,electrical;build,2026-02-01\n"
        );
    }

    #[tokio::test]
    async fn test_missing_csv_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.csv");
        let err = run_command(CliCommand::CsvRoundTrip { input }, &config(&dir))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.csv"));
    }
}
