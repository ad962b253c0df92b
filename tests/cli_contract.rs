use std::path::Path;
use std::process::{Command, Output};

const WORKER_SCRIPTS: &[&str] = &[
    "create_instagram_post.py",
    "create_instagram_post_scheduled.py",
    "create_instagram_video.py",
    "create_instagram_video_scheduled.py",
    "create_instagram_story.py",
    "create_instagram_story_scheduled.py",
    "create_instagram_carousel.py",
    "create_instagram_carousel_scheduled.py",
    "create_instagram_mixed_carousel.py",
    "create_instagram_mixed_carousel_scheduled.py",
    "auto_scheduler.py",
    "validate_token.py",
    "track_demographics.py",
    "save_follower_insights.py",
    "save_instagram_details.py",
];

fn postdeck(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_postdeck"))
        .args(args)
        .env_remove("POSTDECK_HOST")
        .env_remove("POSTDECK_PORT")
        .env_remove("POSTDECK_WORKER_DIR")
        .env_remove("POSTDECK_ACCESS_TOKEN")
        .env("NO_COLOR", "1")
        .output()
        .expect("postdeck binary should run")
}

fn write_config(dir: &Path, worker_dir: &Path) -> std::path::PathBuf {
    let path = dir.join("postdeck.toml");
    let content = format!(
        "[workers]\ninterpreter = \"sh\"\ndir = {:?}\n",
        worker_dir.display().to_string()
    );
    std::fs::write(&path, content).expect("config should be writable");
    path
}

#[test]
fn help_lists_commands() {
    let out = postdeck(&["help"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("doctor"));
}

#[test]
fn unknown_command_fails() {
    let out = postdeck(&["publish-everything"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unknown command"));
}

#[test]
fn missing_explicit_config_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");
    let out = postdeck(&["doctor", "--config", missing.to_str().unwrap()]);
    assert!(!out.status.success());
}

#[cfg(unix)]
#[test]
fn doctor_passes_with_complete_worker_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let workers = tmp.path().join("workers");
    std::fs::create_dir(&workers).unwrap();
    for script in WORKER_SCRIPTS {
        std::fs::write(workers.join(script), "exit 0\n").unwrap();
    }
    let config = write_config(tmp.path(), &workers);

    let out = postdeck(&["doctor", "--config", config.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "doctor failed: {stdout}");
    assert!(stdout.contains("All worker scripts are present"));
}

#[cfg(unix)]
#[test]
fn doctor_reports_missing_scripts() {
    let tmp = tempfile::tempdir().unwrap();
    let workers = tmp.path().join("workers");
    std::fs::create_dir(&workers).unwrap();
    std::fs::write(workers.join("create_instagram_post.py"), "exit 0\n").unwrap();
    let config = write_config(tmp.path(), &workers);

    let out = postdeck(&["doctor", "--config", config.to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("validate_token.py"));
    assert!(!stderr.contains("Missing worker script: create_instagram_post.py"));
}
