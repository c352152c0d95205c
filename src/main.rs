//! hackd: hackathon collaboration daemon.
//!
//! Starts the system and serves a line-oriented console on stdin. Domain
//! errors are normal outcomes and print as one line; only unknown
//! commands count as failures for the exit code.

use anyhow::Result;
use hackd::model::ProjectState;
use hackd::{supervisor, Config, Hub};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // HACKD_LOG wins, then RUST_LOG, then plain info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HACKD_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hackd.toml".to_string());
    let config = Config::load_or_default(&config_path)?;

    info!(
        node = %config.node.name,
        data_dir = %config.storage.data_dir.display(),
        "starting hackd"
    );

    let hub = supervisor::start(&config).await?;
    let unknown_commands = console(hub).await?;
    if unknown_commands > 0 {
        std::process::exit(1);
    }
    Ok(())
}

enum Outcome {
    Handled,
    Unknown,
    Quit,
}

async fn console(hub: Hub) -> Result<usize> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut unknown = 0;

    println!("hackd console ready, /help for commands");
    while let Some(line) = lines.next_line().await? {
        match dispatch(&hub, line.trim()).await {
            Outcome::Handled => {}
            Outcome::Unknown => {
                unknown += 1;
                println!("unknown command, try /help");
            }
            Outcome::Quit => break,
        }
    }
    Ok(unknown)
}

async fn dispatch(hub: &Hub, line: &str) -> Outcome {
    if line.is_empty() {
        return Outcome::Handled;
    }
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (command, args.as_slice()) {
        ("/help", _) => {
            print_help();
        }
        ("/quit", _) => return Outcome::Quit,

        ("/teams", []) => match hub.list_teams().await {
            Ok(teams) => {
                for team in &teams {
                    println!(
                        "{} ({}) - {} participants",
                        team.name,
                        team.topic,
                        team.participants.len()
                    );
                }
                println!("{} teams", teams.len());
            }
            Err(err) => print_domain_error(&err),
        },

        ("/join", [team, name, email]) => match hub.add_participant(team, name, email).await {
            Ok(team) => println!("joined {} ({} members)", team.name, team.participants.len()),
            Err(err) => print_domain_error(&err),
        },

        ("/project", [team]) => match hub.get_project(team).await {
            Ok(project) => {
                println!(
                    "{}: {} [{} / {}]",
                    project.team_name, project.description, project.category, project.state
                );
                println!(
                    "  progress: {} entries, feedback: {} entries",
                    project.progress.len(),
                    project.feedback.len()
                );
            }
            Err(err) => print_domain_error(&err),
        },

        ("/project_state", [team, state]) => match state.parse::<ProjectState>() {
            Ok(state) => match hub.update_state(team, state).await {
                Ok(project) => println!("{} is now {}", project.team_name, project.state),
                Err(err) => print_domain_error(&err),
            },
            Err(reason) => println!("error [invalid_state]: {reason}"),
        },

        ("/mentors", []) => match hub.list_mentors().await {
            Ok(mentors) => {
                for mentor in &mentors {
                    println!(
                        "{} [{}] {} - {} feedback given",
                        mentor.id,
                        mentor.specialty,
                        mentor.name,
                        mentor.feedback_given.len()
                    );
                }
                println!("{} mentors", mentors.len());
            }
            Err(err) => print_domain_error(&err),
        },

        ("/chat", [room]) => match hub.history(room).await {
            Ok(history) => {
                for message in &history {
                    println!("[{}] {}: {}", message.timestamp, message.author, message.content);
                }
                println!("{} messages in {room}", history.len());
            }
            Err(err) => print_domain_error(&err),
        },

        ("/chat_create", [room]) => match hub.create_room(room).await {
            Ok(name) => println!("room {name} created"),
            Err(err) => print_domain_error(&err),
        },

        ("/chat_send", [room, author, rest @ ..]) if !rest.is_empty() => {
            let content = rest.join(" ");
            match hub.send_message(room, author, &content).await {
                Ok(()) => println!("sent"),
                Err(err) => print_domain_error(&err),
            }
        }

        ("/persist_save", []) => {
            let info = hub.persist_state().await;
            println!(
                "saved: {} teams, {} projects, {} mentors, {} rooms",
                info.teams, info.projects, info.mentors, info.rooms
            );
        }

        ("/persist_info", []) => {
            let info = hub.persist_info().await;
            println!(
                "on disk: {} teams, {} projects, {} mentors, {} rooms",
                info.teams, info.projects, info.mentors, info.rooms
            );
        }

        ("/cluster_info", []) => {
            let info = hub.cluster_info();
            println!(
                "node {} role={} holder={} peers={:?}",
                info.node,
                info.role,
                info.chat_holder.as_deref().unwrap_or("none"),
                info.peers
            );
        }

        ("/cluster_connect", [addr]) => match hub.connect_peer(addr).await {
            Ok(peer) => println!("linked to {peer}"),
            Err(err) => println!("error [link_failed]: {err}"),
        },

        ("/cluster_nodes", []) => {
            let info = hub.cluster_info();
            for peer in &info.peers {
                println!("{peer}");
            }
            println!("{} peers", info.peers.len());
        }

        ("/cluster_ping", []) => {
            for (peer, alive) in hub.ping_peers().await {
                println!("{peer}: {}", if alive { "pong" } else { "no reply" });
            }
        }

        _ => return Outcome::Unknown,
    }
    Outcome::Handled
}

fn print_domain_error(err: &hackd::DomainError) {
    println!("error [{}]: {err}", err.error_code());
}

fn print_help() {
    println!(
        "\
commands:
  /teams                              list teams
  /join <team> <name> <email>         add a participant
  /project <team>                     show a team's project
  /project_state <team> <state>       set project state
  /mentors                            list mentors
  /chat <room>                        room history (oldest first)
  /chat_create <room>                 create a room
  /chat_send <room> <author> <msg>    send a message
  /persist_save                       write all snapshots now
  /persist_info                       counts per snapshot file
  /cluster_info                       this node's cluster view
  /cluster_connect <addr>             link to a peer
  /cluster_nodes                      connected peers
  /cluster_ping                       round-trip every peer
  /quit                               leave the console"
    );
}
