use crate::chat::{ChatClient, ChatSettings};
use crate::config::Config;
use crate::media::Codecs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub const UPLOADS_DIR: &str = "uploads";
pub const PROCESSED_DIR: &str = "processed";

fn init_workspace(workspace: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(workspace.join(UPLOADS_DIR))?;
    std::fs::create_dir_all(workspace.join(PROCESSED_DIR))?;
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatClient,
    pub codecs: Codecs,
    pub allowed_extensions: Arc<[String]>,
    pub max_upload_size: u64,
    pub permits: Arc<Semaphore>,

    pub uploads_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let workspace = PathBuf::from(&config.workspace);
        init_workspace(&workspace)?;

        let chat = ChatClient::new(ChatSettings::from_config(config)?)?;
        if chat.is_configured() {
            let settings = chat.settings();
            info!(provider = %settings.provider, model = %settings.model, "Chat backend ready");
        } else {
            warn!("No chat API key configured, /chat will answer 503");
        }

        info!(permits = config.permits, "Media operations limited");

        Ok(Self {
            chat,
            codecs: Codecs {
                video: config.video_codec.clone(),
                audio: config.audio_codec.clone(),
            },
            allowed_extensions: config.normalized_extensions().into(),
            max_upload_size: config.max_upload_size,
            permits: Arc::new(Semaphore::new(config.permits)),

            uploads_dir: workspace.join(UPLOADS_DIR),
            processed_dir: workspace.join(PROCESSED_DIR),
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        self.uploads_dir.as_path()
    }

    pub fn processed_dir(&self) -> &Path {
        self.processed_dir.as_path()
    }

    /// Run blocking FFmpeg work on the blocking pool, at most `permits` at a time
    pub async fn run_media<T, F>(&self, op: &'static str, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        debug!(op, available = self.permits.available_permits(), "media op wait for permit");
        let _permit = self.permits.clone().acquire_owned().await?;
        debug!(op, "media op started");

        tokio::task::spawn_blocking(f).await?
    }
}
