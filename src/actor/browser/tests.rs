//! Supervisor tests.
//!
//! Unix tests launch small shell scripts standing in for a browser.

use std::time::Duration;

use super::*;

fn config_with(executable: &Path) -> BrowserConfig {
    let mut config = BrowserConfig::new(BrowserTarget::Chrome, "/tmp/extension");
    config.executable = Some(executable.to_path_buf());
    config.startup_timeout = Duration::from_secs(5);
    config.stop_grace = Duration::from_secs(2);
    config
}

async fn next_transition(events: &mut mpsc::UnboundedReceiver<Transition>) -> Transition {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("transition in time")
        .expect("stream open")
}

#[tokio::test]
async fn test_invalid_executable_crashes_with_os_error() {
    let mut supervisor = BrowserSupervisor::new();
    let mut events = supervisor.take_events().unwrap();
    let config = config_with(Path::new("/nonexistent/webext-dev/browser"));

    let err = match supervisor.launch(&config, Readiness::Spawned).await {
        Ok(_) => panic!("launch succeeded"),
        Err(e) => e,
    };
    match &err {
        LaunchError::Spawn { program, source } => {
            assert_eq!(program, Path::new("/nonexistent/webext-dev/browser"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected spawn error, got {other:?}"),
    }

    let t = next_transition(&mut events).await;
    assert_eq!((t.from, t.to), (ProcessStatus::Starting, ProcessStatus::Crashed));
    assert_eq!(t.pid, None);
}

#[tokio::test]
async fn test_invalid_flag_is_rejected_before_spawn() {
    let supervisor = BrowserSupervisor::new();
    let mut config = config_with(Path::new("/nonexistent"));
    config.flags = vec!["--ok".into(), "bad\nflag".into()];

    let err = supervisor.launch(&config, Readiness::Spawned).await.err();
    assert!(matches!(err, Some(LaunchError::InvalidFlag { .. })));
}

#[tokio::test]
async fn test_firefox_requires_gecko_id() {
    let extension = tempfile::tempdir().unwrap();
    std::fs::write(
        extension.path().join("manifest.json"),
        r#"{"manifest_version":3,"name":"demo"}"#,
    )
    .unwrap();

    let supervisor = BrowserSupervisor::new();
    let mut config = BrowserConfig::new(BrowserTarget::Firefox, extension.path());
    config.executable = Some(PathBuf::from("/nonexistent/firefox"));

    let err = supervisor.launch(&config, Readiness::Spawned).await.err();
    assert!(matches!(err, Some(LaunchError::MissingGeckoId(_))));
}

#[test]
fn test_restart_budget() {
    let mut off = BrowserSupervisor::new();
    assert!(!off.on_crash().unwrap());

    let mut on = BrowserSupervisor::new().with_auto_restart(true, 2);
    assert!(on.on_crash().unwrap());
    assert!(on.on_crash().unwrap());
    assert!(matches!(on.on_crash(), Err(LaunchError::RestartLimit(2))));
}

#[cfg(unix)]
mod unix {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    /// Write an executable `/bin/sh` script that ignores its arguments.
    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-browser");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_launch_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let mut supervisor = BrowserSupervisor::new();
        let mut events = supervisor.take_events().unwrap();

        let handle = supervisor
            .launch(&config_with(&exe), Readiness::Spawned)
            .await
            .unwrap();
        assert_eq!(handle.status(), ProcessStatus::Running);
        assert!(handle.is_ephemeral());
        let profile = handle.profile_dir().to_path_buf();
        assert!(profile.is_dir());

        let t = next_transition(&mut events).await;
        assert_eq!((t.from, t.to), (ProcessStatus::Starting, ProcessStatus::Running));

        assert_eq!(supervisor.stop(handle).await, ProcessStatus::Exited);
        let t = next_transition(&mut events).await;
        assert_eq!((t.from, t.to), (ProcessStatus::Running, ProcessStatus::Exited));
        assert!(!profile.exists());
    }

    #[tokio::test]
    async fn test_stop_kills_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "trap '' TERM\nwhile true; do sleep 1; done");
        let supervisor = BrowserSupervisor::new();
        let mut config = config_with(&exe);
        config.stop_grace = Duration::from_millis(300);

        let handle = supervisor.launch(&config, Readiness::Spawned).await.unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(5), handle.stop()).await;
        assert_eq!(stopped.unwrap(), ProcessStatus::Exited);
    }

    #[tokio::test]
    async fn test_nonzero_exit_while_running_is_crash() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "sleep 0.2\nexit 4");
        let supervisor = BrowserSupervisor::new();

        let handle = supervisor
            .launch(&config_with(&exe), Readiness::Spawned)
            .await
            .unwrap();
        assert_eq!(handle.wait().await, ProcessStatus::Crashed);

        // Stop still cleans up and ends in exited
        assert_eq!(handle.stop().await, ProcessStatus::Exited);
    }

    #[tokio::test]
    async fn test_clean_exit_while_running_is_exited() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "sleep 0.2\nexit 0");
        let supervisor = BrowserSupervisor::new();

        let handle = supervisor
            .launch(&config_with(&exe), Readiness::Spawned)
            .await
            .unwrap();
        assert_eq!(handle.wait().await, ProcessStatus::Exited);
    }

    #[tokio::test]
    async fn test_early_exit_before_ready() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exit 3");
        let (_manager_tx, manager_rx) = watch::channel(None);
        let mut supervisor = BrowserSupervisor::new();
        let mut events = supervisor.take_events().unwrap();

        let err = supervisor
            .launch(&config_with(&exe), Readiness::Manager(manager_rx))
            .await
            .err();
        assert!(matches!(err, Some(LaunchError::EarlyExit { .. })));

        let t = next_transition(&mut events).await;
        assert_eq!(t.to, ProcessStatus::Crashed);
        assert!(t.pid.is_some());
    }

    #[tokio::test]
    async fn test_startup_timeout_without_manager() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let (_manager_tx, manager_rx) = watch::channel(None);
        let supervisor = BrowserSupervisor::new();
        let mut config = config_with(&exe);
        config.startup_timeout = Duration::from_millis(200);

        let err = supervisor
            .launch(&config, Readiness::Manager(manager_rx))
            .await
            .err();
        assert!(matches!(err, Some(LaunchError::StartupTimeout(_))));
    }

    #[tokio::test]
    async fn test_manager_registration_makes_ready() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let (manager_tx, manager_rx) = watch::channel(None);
        let supervisor = BrowserSupervisor::new();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager_tx.send_replace(Some(PeerId(7)));
            // Keep the sender alive until the launch observed it
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let handle = supervisor
            .launch(&config_with(&exe), Readiness::Manager(manager_rx))
            .await
            .unwrap();
        assert_eq!(handle.status(), ProcessStatus::Running);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_manager_from_previous_browser_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let (_manager_tx, manager_rx) = watch::channel(Some(PeerId(1)));
        let supervisor = BrowserSupervisor::new();
        let mut config = config_with(&exe);
        config.startup_timeout = Duration::from_millis(300);

        let err = supervisor
            .launch(&config, Readiness::Manager(manager_rx))
            .await
            .err();
        assert!(matches!(err, Some(LaunchError::StartupTimeout(_))));
    }

    #[tokio::test]
    async fn test_new_manager_replacing_old_one_makes_ready() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let (manager_tx, manager_rx) = watch::channel(Some(PeerId(1)));
        let supervisor = BrowserSupervisor::new();

        tokio::spawn(async move {
            // Old manager leaves, then the relaunched browser's registers
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager_tx.send_replace(None);
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager_tx.send_replace(Some(PeerId(2)));
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let handle = supervisor
            .launch(&config_with(&exe), Readiness::Manager(manager_rx))
            .await
            .unwrap();
        assert_eq!(handle.status(), ProcessStatus::Running);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_persistent_profile_survives_stop() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "exec sleep 30");
        let profile = dir.path().join("profile");
        let supervisor = BrowserSupervisor::new();
        let mut config = config_with(&exe);
        config.user_data_dir = Some(profile.clone());

        let handle = supervisor.launch(&config, Readiness::Spawned).await.unwrap();
        assert!(!handle.is_ephemeral());
        handle.stop().await;
        assert!(profile.is_dir());
    }
}
