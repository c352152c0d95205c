//! Project flows: lifecycle, progress, category/state queries.

mod common;

use hackd::model::{ProjectCategory, ProjectState};
use hackd::DomainError;

#[tokio::test]
async fn test_project_lifecycle() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_team("Gamma", "IA").await.unwrap();
    let project = hub
        .create_project("Gamma", "app", ProjectCategory::Educativo)
        .await
        .unwrap();
    assert_eq!(project.state, ProjectState::Iniciado);

    let project = hub
        .update_state("Gamma", ProjectState::EnProgreso)
        .await
        .unwrap();
    assert_eq!(project.state, ProjectState::EnProgreso);

    let project = hub.append_progress("Gamma", "proto").await.unwrap();
    assert_eq!(project.progress.len(), 1);
    assert_eq!(project.progress[0], "proto");
}

#[tokio::test]
async fn test_project_without_team_is_allowed() {
    // Registries are independent: the project key is not validated
    // against the team registry.
    let system = common::start().await;
    let project = system
        .hub
        .create_project("Ghost", "app", ProjectCategory::Social)
        .await
        .unwrap();
    assert_eq!(project.team_name, "Ghost");
}

#[tokio::test]
async fn test_duplicate_project_rejected() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_project("Gamma", "app", ProjectCategory::Social)
        .await
        .unwrap();
    let dup = hub
        .create_project("Gamma", "again", ProjectCategory::Ambiental)
        .await;
    assert_eq!(dup, Err(DomainError::ProjectExists("Gamma".into())));
}

#[tokio::test]
async fn test_state_tokens_reject_unknown_values() {
    // The typed API cannot carry an out-of-range state; the string
    // boundary refuses to parse one.
    assert!("iniciado".parse::<ProjectState>().is_ok());
    assert!("en_progreso".parse::<ProjectState>().is_ok());
    assert!("completado".parse::<ProjectState>().is_ok());
    assert!("terminado".parse::<ProjectState>().is_err());
    assert!("EN_PROGRESO".parse::<ProjectState>().is_err());
}

#[tokio::test]
async fn test_any_state_transition_is_allowed() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_project("Gamma", "app", ProjectCategory::Social)
        .await
        .unwrap();
    hub.update_state("Gamma", ProjectState::Completado).await.unwrap();
    let back = hub.update_state("Gamma", ProjectState::Iniciado).await.unwrap();
    assert_eq!(back.state, ProjectState::Iniciado);
}

#[tokio::test]
async fn test_category_and_state_queries() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_project("A", "x", ProjectCategory::Social).await.unwrap();
    hub.create_project("B", "y", ProjectCategory::Educativo).await.unwrap();
    hub.create_project("C", "z", ProjectCategory::Educativo).await.unwrap();
    hub.update_state("C", ProjectState::Completado).await.unwrap();

    let educational = hub.list_by_category(ProjectCategory::Educativo).await.unwrap();
    assert_eq!(educational.len(), 2);

    let completed = hub.list_by_state(ProjectState::Completado).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].team_name, "C");

    assert_eq!(hub.list_projects().await.unwrap().len(), 3);
}
