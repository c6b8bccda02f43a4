//! End-to-end pipeline runs against a scratch git repository, fake build
//! tools and a mock server standing in for every remote API.

#![cfg(unix)]

use apk_release::cli::RuntimeConfig;
use apk_release::config::{
    Channel, DriveConfig, ForumConfig, GithubConfig, LogFormat, ReleaseConfig, SigningConfig,
    TelegramConfig,
};
use apk_release::http::RetryPolicy;
use apk_release::notify::{ForumDelivery, TelegramDelivery};
use apk_release::publish::MirrorReport;
use apk_release::{Pipeline, PipelineOutcome, ReleaseError};
use serde_json::{Value, json};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Writing a script while another test forks can make exec fail with ETXTBSY
static SERIAL: Mutex<()> = Mutex::new(());

const DESCRIPTOR: &str = r#"android {
    defaultConfig {
        applicationId = "net.example.app"
        versionCode = calculateVersionCode()
        versionName = "1.2.0"
    }
}
"#;

const CATEGORIES: &str = r#"{
    "categories": [
        {"title": "Features", "labels": ["sparkles", "tada"]},
        {"title": "Fixes", "labels": ["bug"]}
    ]
}"#;

const GRADLEW_OK: &str = "#!/bin/sh
mkdir -p app/build/outputs/apk/xposed/release
printf 'PK' > app/build/outputs/apk/xposed/release/app-release.apk
";

const GRADLEW_FAIL: &str = "#!/bin/sh
echo 'FAILURE: Build failed with an exception.' >&2
exit 1
";

const GRADLEW_VERSION_CODE: &str = "#!/bin/sh
if [ \"$2\" = printVersionCode ]; then
  echo '> Task :app:printVersionCode'
  echo 412
  exit 0
fi
mkdir -p app/build/outputs/apk/xposed/release
printf 'PK' > app/build/outputs/apk/xposed/release/app-release.apk
";

const GRADLEW_NO_VERSION_CODE: &str = "#!/bin/sh
if [ \"$2\" = printVersionCode ]; then
  echo \"Task 'printVersionCode' not found in root project\" >&2
  exit 1
fi
mkdir -p app/build/outputs/apk/xposed/release
printf 'PK' > app/build/outputs/apk/xposed/release/app-release.apk
";

const APKSIGNER: &str = "#!/bin/sh
out=''
while [ $# -gt 1 ]; do
  if [ \"$1\" = '--out' ]; then out=\"$2\"; fi
  shift
done
cp \"$1\" \"$out\"
";

struct Workspace {
    dir: TempDir,
    sdk: TempDir,
}

impl Workspace {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn dist(&self) -> PathBuf {
        self.root().join("dist")
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Release Bot",
            "-c",
            "user.email=bot@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn tags(dir: &Path) -> Vec<String> {
    let output = Command::new("git")
        .args(["tag", "--list"])
        .current_dir(dir)
        .output()
        .expect("git runs");
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .collect()
}

/// Bare repository registered as `origin` of `ws`.
fn origin(ws: &Workspace) -> TempDir {
    let remote = tempfile::tempdir().unwrap();
    git(remote.path(), &["init", "--bare", "-q"]);
    git(ws.root(), &["remote", "add", "origin", remote.path().to_str().unwrap()]);
    remote
}

fn write_script(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Repository with a `v1.2.0` tag followed by `commits_after_tag`.
fn workspace(gradlew: &str, commits_after_tag: &[&str]) -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::create_dir_all(root.join("app")).unwrap();
    std::fs::create_dir_all(root.join(".github/workflows")).unwrap();
    std::fs::write(root.join("app/build.gradle.kts"), DESCRIPTOR).unwrap();
    std::fs::write(root.join(".github/workflows/configuration.json"), CATEGORIES).unwrap();
    std::fs::write(root.join(".github/workflows/key"), b"keystore").unwrap();
    write_script(&root.join("gradlew"), gradlew);

    git(root, &["init", "-q"]);
    git(root, &["add", "-A"]);
    git(root, &["commit", "-q", "-m", ":tada: Initial release"]);
    git(root, &["tag", "v1.2.0"]);

    for (i, message) in commits_after_tag.iter().enumerate() {
        std::fs::write(root.join(format!("change-{}.txt", i)), message).unwrap();
        git(root, &["add", "-A"]);
        git(root, &["commit", "-q", "-m", message]);
    }

    let sdk = tempfile::tempdir().unwrap();
    write_script(&sdk.path().join("build-tools/29.0.3/apksigner"), APKSIGNER);

    Workspace { dir, sdk }
}

fn config(ws: &Workspace, server: &MockServer) -> ReleaseConfig {
    let root = ws.root().to_path_buf();
    ReleaseConfig {
        channel: Channel::stable(),
        variant: "xposed".into(),
        descriptor: root.join("app/build.gradle.kts"),
        categories: root.join(".github/workflows/configuration.json"),
        log_format: LogFormat::Markdown,
        create_tag: false,
        version_code_task: None,
        restart_paths: Vec::new(),
        signing: SigningConfig {
            android_home: Some(ws.sdk.path().to_path_buf()),
            build_tools_version: "29.0.3".into(),
            keystore: root.join(".github/workflows/key"),
            alias: Some("release".into()),
            password: Some("hunter2".into()),
        },
        github: GithubConfig {
            api_url: server.uri(),
            repo: Some("owner/app".into()),
            token: Some("gh-token".into()),
        },
        drive: DriveConfig {
            base_url: server.uri(),
            token: Some("drive-token".into()),
            root: "/releases".into(),
            public_url: Some("https://drive.example/releases".into()),
        },
        forum: ForumConfig {
            base_url: server.uri(),
            api_key: Some("forum-key".into()),
            username: "system".into(),
            category: 8,
        },
        telegram: TelegramConfig {
            api_url: server.uri(),
            token: Some("123:abc".into()),
            archive_chat: None,
            broadcast_chat: Some("-100news".into()),
        },
        workspace: root,
    }
}

async fn mount_github(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/repos/owner/app/releases"))
        .and(header("authorization", "token gh-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1,
            "html_url": "https://github.com/owner/app/releases/tag/x",
            "upload_url": format!("{}/uploads/releases/1/assets{{?name,label}}", server.uri()),
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/uploads/releases/1/assets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "browser_download_url": "https://github.com/owner/app/releases/download/x/app-xposed-signed.apk"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_notifications(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "topic_id": 6})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendDocument"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"document": {"file_id": "FILE1"}}
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMediaGroup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
        .expect(1)
        .mount(server)
        .await;
}

fn drive_ok() -> Mock {
    Mock::given(method("PUT"))
        .and(path("/api/fs/put"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "message": "success"})))
}

#[tokio::test]
async fn releases_new_feature_commit() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    mount_github(&server).await;
    drive_ok().expect(3).mount(&server).await;
    mount_notifications(&server).await;

    let ws = workspace(GRADLEW_OK, &[":sparkles: Add export"]);
    let config = config(&ws, &server);
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime)
        .with_retry(RetryPolicy::immediate(1))
        .run()
        .await
        .unwrap();

    let PipelineOutcome::Released(summary) = outcome else {
        panic!("expected a release");
    };
    assert_eq!(summary.previous_tag.as_deref(), Some("v1.2.0"));
    assert_eq!(summary.changelog.to_markdown(), "Features\n- Add export\n");
    assert!(summary.version.to_string().starts_with("1.2.0-Stable."));
    assert_eq!(summary.publish.mirror, Some(MirrorReport { succeeded: 3, total: 3 }));
    assert_eq!(summary.notify.forum, ForumDelivery::Posted);
    assert_eq!(summary.notify.telegram, TelegramDelivery::Document);
    assert!(!summary.is_degraded());
    assert!(summary.git_tag.is_none());

    let manifest: Value =
        serde_json::from_str(&std::fs::read_to_string(ws.dist().join("index.json")).unwrap()).unwrap();
    assert_eq!(manifest["version"], summary.version.to_string());
    assert_eq!(manifest["log"], "Features\n- Add export\n");

    let descriptor = std::fs::read_to_string(ws.root().join("app/build.gradle.kts")).unwrap();
    assert!(descriptor.contains(&format!("versionName = \"{}\"", summary.version)));

    let readme = std::fs::read_to_string(ws.dist().join("README.md")).unwrap();
    assert!(readme.ends_with("Features\n- Add export\n"));

    assert!(ws.dist().join("app-xposed.apk").is_file());
    assert!(ws.dist().join("app-xposed-signed.apk").is_file());
}

#[tokio::test]
async fn nothing_to_release_without_marked_commits() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let ws = workspace(GRADLEW_OK, &["Update README", "wip"]);
    let config = config(&ws, &server);
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime).run().await.unwrap();

    assert!(matches!(
        outcome,
        PipelineOutcome::NothingToRelease { previous_tag: Some(ref tag) } if tag == "v1.2.0"
    ));
    assert!(!ws.dist().exists());
    let descriptor = std::fs::read_to_string(ws.root().join("app/build.gradle.kts")).unwrap();
    assert_eq!(descriptor, DESCRIPTOR);
}

#[tokio::test]
async fn build_failure_stops_before_any_network_call() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let ws = workspace(GRADLEW_FAIL, &[":bug: Fix crash on start"]);
    let config = config(&ws, &server);
    let runtime = RuntimeConfig::quiet();

    let err = Pipeline::new(&config, &runtime).run().await.unwrap_err();

    assert!(matches!(err, ReleaseError::BuildFailed { code: Some(1), .. }));
    assert!(!ws.dist().join("app-xposed-signed.apk").exists());
}

#[tokio::test]
async fn missing_github_token_fails_before_build() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;

    let ws = workspace(GRADLEW_OK, &[":sparkles: Add export"]);
    let mut config = config(&ws, &server);
    config.github.token = None;
    let runtime = RuntimeConfig::quiet();

    let err = Pipeline::new(&config, &runtime).run().await.unwrap_err();

    assert!(matches!(err, ReleaseError::MissingConfig { env: "GITHUB_TOKEN", .. }));
    assert!(!ws.root().join("app/build").exists());
}

#[tokio::test]
async fn failed_mirror_file_degrades_but_releases() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    mount_github(&server).await;
    Mock::given(method("PUT"))
        .and(path("/api/fs/put"))
        .and(header("file-path", "%2Freleases%2FStable%2FREADME.md"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    drive_ok().expect(2).mount(&server).await;
    mount_notifications(&server).await;

    let ws = workspace(GRADLEW_OK, &[":sparkles: Add export", ":bug: Fix sync"]);
    let config = config(&ws, &server);
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime)
        .with_retry(RetryPolicy::immediate(3))
        .run()
        .await
        .unwrap();

    let PipelineOutcome::Released(summary) = outcome else {
        panic!("expected a release");
    };
    assert_eq!(summary.publish.mirror, Some(MirrorReport { succeeded: 2, total: 3 }));
    assert_eq!(summary.publish.github.release.id, 1);
    assert!(summary.is_degraded());
    assert_eq!(
        summary.changelog.to_markdown(),
        "Features\n- Add export\nFixes\n- Fix sync\n"
    );
}

#[tokio::test]
async fn pre_release_channel_skips_forum() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/owner/app/releases"))
        .and(wiremock::matchers::body_partial_json(json!({"prerelease": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 2,
            "html_url": "https://github.com/owner/app/releases/tag/y",
            "upload_url": format!("{}/uploads/releases/2/assets{{?name,label}}", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/uploads/releases/2/assets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"browser_download_url": "https://x/y.apk"})))
        .mount(&server)
        .await;
    drive_ok().mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // Beta has no tag of its own yet, so the range starts at the newest tag
    let ws = workspace(GRADLEW_OK, &[":sparkles: Add export"]);
    let mut config = config(&ws, &server);
    config.channel = Channel::new("Beta");
    config.telegram.token = None;
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime)
        .with_retry(RetryPolicy::immediate(1))
        .run()
        .await
        .unwrap();

    let PipelineOutcome::Released(summary) = outcome else {
        panic!("expected a release");
    };
    assert_eq!(summary.previous_tag.as_deref(), Some("v1.2.0"));
    assert!(summary.version.to_string().starts_with("1.2.0-Beta."));
    assert_eq!(summary.notify.forum, ForumDelivery::Skipped);
    assert_eq!(summary.notify.telegram, TelegramDelivery::Skipped);
    assert_eq!(summary.changelog.to_markdown(), "Features\n- Add export\n");
}

#[tokio::test]
async fn tag_is_pushed_after_build_with_restart_notice() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    mount_github(&server).await;
    drive_ok().mount(&server).await;

    let ws = workspace(GRADLEW_OK, &[":sparkles: Add export"]);
    let remote = origin(&ws);
    let mut config = config(&ws, &server);
    config.create_tag = true;
    config.restart_paths = vec!["change-0".into()];
    config.forum.api_key = None;
    config.telegram.token = None;
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime)
        .with_retry(RetryPolicy::immediate(1))
        .run()
        .await
        .unwrap();

    let PipelineOutcome::Released(summary) = outcome else {
        panic!("expected a release");
    };
    let tag = format!("Stable.{}", summary.version);
    assert_eq!(summary.git_tag.as_deref(), Some(tag.as_str()));
    assert!(tags(ws.root()).contains(&tag));
    assert_eq!(tags(remote.path()), vec![tag]);

    let readme = std::fs::read_to_string(ws.dist().join("README.md")).unwrap();
    let notice = readme.find("# Restart required").expect("restart notice");
    assert!(notice < readme.find("# Changelog").unwrap());
}

#[tokio::test]
async fn failed_build_pushes_no_tag() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let ws = workspace(GRADLEW_FAIL, &[":bug: Fix crash on start"]);
    let remote = origin(&ws);
    let mut config = config(&ws, &server);
    config.create_tag = true;
    let runtime = RuntimeConfig::quiet();

    let err = Pipeline::new(&config, &runtime).run().await.unwrap_err();

    assert!(matches!(err, ReleaseError::BuildFailed { .. }));
    assert_eq!(tags(ws.root()), vec!["v1.2.0".to_string()]);
    assert!(tags(remote.path()).is_empty());
}

#[tokio::test]
async fn version_code_comes_from_gradle_task() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    mount_github(&server).await;
    drive_ok().mount(&server).await;

    let ws = workspace(GRADLEW_VERSION_CODE, &[":sparkles: Add export"]);
    let mut config = config(&ws, &server);
    config.version_code_task = Some("printVersionCode".into());
    config.forum.api_key = None;
    config.telegram.token = None;
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime)
        .with_retry(RetryPolicy::immediate(1))
        .run()
        .await
        .unwrap();

    let PipelineOutcome::Released(summary) = outcome else {
        panic!("expected a release");
    };
    assert_eq!(summary.version.code, 412);
    let manifest: Value =
        serde_json::from_str(&std::fs::read_to_string(ws.dist().join("index.json")).unwrap()).unwrap();
    assert_eq!(manifest["code"], 412);
}

#[tokio::test]
async fn failing_version_code_task_falls_back_to_date() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let server = MockServer::start().await;
    mount_github(&server).await;
    drive_ok().mount(&server).await;

    let ws = workspace(GRADLEW_NO_VERSION_CODE, &[":sparkles: Add export"]);
    let mut config = config(&ws, &server);
    config.version_code_task = Some("printVersionCode".into());
    config.forum.api_key = None;
    config.telegram.token = None;
    let runtime = RuntimeConfig::quiet();

    let outcome = Pipeline::new(&config, &runtime)
        .with_retry(RetryPolicy::immediate(1))
        .run()
        .await
        .unwrap();

    let PipelineOutcome::Released(summary) = outcome else {
        panic!("expected a release");
    };
    // yyyyMMdd of the release stamp
    let date_code: u64 = summary.version.stamp[..8].parse().unwrap();
    assert_eq!(summary.version.code, date_code);
}
