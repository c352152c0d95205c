//! Snapshot persistence: restart visibility, legacy bootstrap, reset.

mod common;

use hackd::model::{ProjectCategory, Team};
use std::collections::HashMap;

#[tokio::test]
async fn test_mutations_visible_after_restart() {
    let system = common::start().await;
    system.hub.create_team("Alpha", "AI").await.unwrap();
    system.hub.add_participant("Alpha", "Ana", "a@x").await.unwrap();
    system
        .hub
        .create_project("Alpha", "app", ProjectCategory::Social)
        .await
        .unwrap();
    let mentor = system.hub.register_mentor("Dr S", "IA").await.unwrap();
    system.hub.create_room("Room1").await.unwrap();
    system.hub.send_message("Room1", "A", "uno").await.unwrap();
    // Make sure the cast landed before the restart.
    system.hub.history("Room1").await.unwrap();

    let system = common::restart(system).await;
    let hub = &system.hub;

    let team = hub.get_team("Alpha").await.unwrap();
    assert_eq!(team.participants.len(), 1);
    let project = hub.get_project("Alpha").await.unwrap();
    assert_eq!(project.category, ProjectCategory::Social);
    let mentor = hub.get_mentor(&mentor.id).await.unwrap();
    assert_eq!(mentor.name, "Dr S");
    let history = hub.history("Room1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "uno");
}

#[tokio::test]
async fn test_persist_counts_stable_across_restart() {
    let system = common::start().await;
    system.hub.create_team("Alpha", "AI").await.unwrap();
    system.hub.create_team("Beta", "IoT").await.unwrap();
    system
        .hub
        .create_project("Alpha", "app", ProjectCategory::Social)
        .await
        .unwrap();
    system.hub.register_mentor("Dr S", "IA").await.unwrap();
    system.hub.create_room("Room1").await.unwrap();

    let before = system.hub.persist_state().await;
    assert_eq!(before.teams, 2);
    assert_eq!(before.projects, 1);
    assert_eq!(before.mentors, 1);
    assert_eq!(before.rooms, 2); // general + Room1

    let system = common::restart(system).await;
    let after = system.hub.persist_info().await;
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_legacy_list_snapshot_bootstraps() {
    // A legacy snapshot holds an ordered list of records instead of the
    // canonical map; bootstrap converts it without error.
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    let legacy = vec![Team::new("Alpha", "AI"), Team::new("Beta", "IoT")];
    std::fs::write(
        data_dir.join("teams.json"),
        serde_json::to_vec(&legacy).unwrap(),
    )
    .unwrap();

    let system = common::start_in(dir).await;
    let teams = system.hub.list_teams().await.unwrap();
    assert_eq!(teams.len(), 2);
    assert_eq!(system.hub.get_team("Beta").await.unwrap().topic, "IoT");
}

#[tokio::test]
async fn test_corrupt_snapshot_does_not_prevent_startup() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("teams.json"), b"{broken").unwrap();

    let system = common::start_in(dir).await;
    assert!(system.hub.list_teams().await.unwrap().is_empty());
    // The registry is fully usable afterwards.
    system.hub.create_team("Alpha", "AI").await.unwrap();
}

#[tokio::test]
async fn test_full_reset_empties_everything() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_team("Alpha", "AI").await.unwrap();
    hub.create_project("Alpha", "app", ProjectCategory::Social)
        .await
        .unwrap();
    hub.register_mentor("Dr S", "IA").await.unwrap();
    hub.create_room("Room1").await.unwrap();
    hub.send_message("general", "A", "uno").await.unwrap();

    hub.reset().await;

    assert!(hub.list_teams().await.unwrap().is_empty());
    assert!(hub.list_projects().await.unwrap().is_empty());
    assert!(hub.list_mentors().await.unwrap().is_empty());
    assert_eq!(hub.list_rooms().await.unwrap(), vec!["general".to_string()]);
    assert!(hub.history("general").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_matches_registry_state() {
    // After a successful mutation the on-disk map deserializes to the
    // same records the registry serves.
    let system = common::start().await;
    system.hub.create_team("Alpha", "AI").await.unwrap();
    system.hub.add_participant("Alpha", "Ana", "a@x").await.unwrap();

    let raw = std::fs::read(system.dir.path().join("data").join("teams.json")).unwrap();
    let on_disk: HashMap<String, Team> = serde_json::from_slice(&raw).unwrap();
    let live = system.hub.get_team("Alpha").await.unwrap();
    assert_eq!(on_disk.get("Alpha"), Some(&live));
}
