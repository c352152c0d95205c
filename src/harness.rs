//! Load harness.
//!
//! Drives concurrent creation through the façade in four phases (teams,
//! participants, projects, chat messages) with a bounded fan-out and a
//! per-task timeout. The point is to pressure the serialization kernel:
//! with N teams, M participants each and K messages per room, a correct
//! run ends with exactly N×M participants, N projects and N×K messages
//! and no unexpected errors.

use crate::facade::Hub;
use crate::model::ProjectCategory;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

/// Workload shape.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub teams: usize,
    pub participants_per_team: usize,
    pub messages_per_team: usize,
    /// Bounded fan-out cap.
    pub concurrency: usize,
    /// Per-task timeout.
    pub task_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            teams: 100,
            participants_per_team: 10,
            messages_per_team: 10,
            concurrency: 50,
            task_timeout: Duration::from_secs(10),
        }
    }
}

/// One phase's outcome.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub name: &'static str,
    pub operations: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

/// Whole-run outcome plus the totals observed afterwards.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    pub phases: Vec<PhaseReport>,
    pub total_elapsed: Duration,
    pub teams: usize,
    pub participants: usize,
    pub projects: usize,
    pub messages: usize,
}

impl HarnessReport {
    pub fn total_errors(&self) -> usize {
        self.phases.iter().map(|p| p.errors).sum()
    }

    /// Check the counters against the workload shape.
    pub fn satisfies(&self, config: &HarnessConfig) -> bool {
        self.total_errors() == 0
            && self.teams == config.teams
            && self.participants == config.teams * config.participants_per_team
            && self.projects == config.teams
            && self.messages == config.teams * config.messages_per_team
    }
}

impl fmt::Display for HarnessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for phase in &self.phases {
            writeln!(
                f,
                "phase {:<13} {:>6} ops  {:>3} errors  {:>8.2?}",
                phase.name, phase.operations, phase.errors, phase.elapsed
            )?;
        }
        writeln!(f, "total elapsed {:.2?}", self.total_elapsed)?;
        write!(
            f,
            "teams={} participants={} projects={} messages={}",
            self.teams, self.participants, self.projects, self.messages
        )
    }
}

fn team_name(i: usize) -> String {
    format!("team-{i:04}")
}

fn room_name(i: usize) -> String {
    format!("room-{i:04}")
}

/// Run the four phases against a started system.
pub async fn run(hub: &Hub, config: &HarnessConfig) -> HarnessReport {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut phases = Vec::new();

    // Phase 1: teams.
    let phase_start = Instant::now();
    let mut set = JoinSet::new();
    for i in 0..config.teams {
        let hub = hub.clone();
        let semaphore = semaphore.clone();
        let timeout = config.task_timeout;
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };
            matches!(
                tokio::time::timeout(timeout, hub.create_team(&team_name(i), "load")).await,
                Ok(Ok(_))
            )
        });
    }
    phases.push(drain("teams", set, phase_start).await);

    // Phase 2: participants.
    let phase_start = Instant::now();
    let mut set = JoinSet::new();
    for k in 0..config.teams * config.participants_per_team {
        let hub = hub.clone();
        let semaphore = semaphore.clone();
        let timeout = config.task_timeout;
        let (i, j) = (k / config.participants_per_team, k % config.participants_per_team);
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };
            let team = team_name(i);
            let person = format!("p-{j:02}");
            let email = format!("p{j:02}@{team}");
            matches!(
                tokio::time::timeout(timeout, hub.add_participant(&team, &person, &email)).await,
                Ok(Ok(_))
            )
        });
    }
    phases.push(drain("participants", set, phase_start).await);

    // Phase 3: projects.
    let phase_start = Instant::now();
    let mut set = JoinSet::new();
    for i in 0..config.teams {
        let hub = hub.clone();
        let semaphore = semaphore.clone();
        let timeout = config.task_timeout;
        let category = match i % 3 {
            0 => ProjectCategory::Social,
            1 => ProjectCategory::Ambiental,
            _ => ProjectCategory::Educativo,
        };
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };
            matches!(
                tokio::time::timeout(
                    timeout,
                    hub.create_project(&team_name(i), "load project", category),
                )
                .await,
                Ok(Ok(_))
            )
        });
    }
    phases.push(drain("projects", set, phase_start).await);

    // Phase 4: chat. One room per team, then the message fan-out.
    let phase_start = Instant::now();
    let mut set = JoinSet::new();
    for i in 0..config.teams {
        let hub = hub.clone();
        let semaphore = semaphore.clone();
        let timeout = config.task_timeout;
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };
            matches!(
                tokio::time::timeout(timeout, hub.create_room(&room_name(i))).await,
                Ok(Ok(_))
            )
        });
    }
    let rooms_report = drain("rooms", set, phase_start).await;

    let phase_start = Instant::now();
    let mut set = JoinSet::new();
    for k in 0..config.teams * config.messages_per_team {
        let hub = hub.clone();
        let semaphore = semaphore.clone();
        let timeout = config.task_timeout;
        let (i, j) = (k / config.messages_per_team, k % config.messages_per_team);
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return false;
            };
            let room = room_name(i);
            let content = format!("update {j:02}");
            matches!(
                tokio::time::timeout(timeout, hub.send_message(&room, "loadbot", &content)).await,
                Ok(Ok(()))
            )
        });
    }
    let messages_report = drain("messages", set, phase_start).await;
    phases.push(rooms_report);
    phases.push(messages_report);

    // Totals, observed through the same public surface the phases used.
    // These calls queue behind every cast already enqueued, so all sent
    // messages are counted.
    let teams = hub.list_teams().await.map(|t| t.len()).unwrap_or(0);
    let participants = hub
        .list_teams()
        .await
        .map(|teams| teams.iter().map(|t| t.participants.len()).sum())
        .unwrap_or(0);
    let projects = hub.list_projects().await.map(|p| p.len()).unwrap_or(0);
    let mut messages = 0;
    if let Ok(rooms) = hub.list_rooms().await {
        for room in rooms {
            if let Ok(history) = hub.history(&room).await {
                messages += history.len();
            }
        }
    }

    let report = HarnessReport {
        phases,
        total_elapsed: started.elapsed(),
        teams,
        participants,
        projects,
        messages,
    };
    info!(
        elapsed = ?report.total_elapsed,
        errors = report.total_errors(),
        "harness finished"
    );
    report
}

async fn drain(name: &'static str, mut set: JoinSet<bool>, started: Instant) -> PhaseReport {
    let mut operations = 0;
    let mut errors = 0;
    while let Some(joined) = set.join_next().await {
        operations += 1;
        if !matches!(joined, Ok(true)) {
            errors += 1;
        }
    }
    PhaseReport { name, operations, errors, elapsed: started.elapsed() }
}
