#![allow(dead_code)]

use clipchat::Config;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Test harness running the real server on a free port
pub struct TestServer {
    handle: JoinHandle<()>,
    port: u16,
    workspace: TempDir,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with a config tweaked by `configure`
    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let port = portpicker::pick_unused_port().expect("No available port");
        let workspace = tempfile::tempdir().expect("create workspace");

        let mut config = Config {
            listen_on_port: port,
            workspace: workspace.path().to_string_lossy().into_owned(),
            permits: 2,
            ..Default::default()
        };
        configure(&mut config);

        let handle = tokio::spawn(async move {
            if let Err(error) = clipchat::run(config).await {
                eprintln!("test server exited: {error:?}");
            }
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let server = TestServer {
            handle,
            port,
            workspace,
            client,
        };

        // Poll until server is ready
        for _ in 0..200 {
            if let Ok(response) = server.client.get(server.url("/")).send().await
                && response.status().is_success()
            {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.workspace.path().join("uploads")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.workspace.path().join("processed")
    }

    pub async fn upload(&self, file_name: &str, data: Vec<u8>) -> reqwest::Response {
        let form = Form::new().part("file", Part::bytes(data).file_name(file_name.to_string()));
        self.client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}
