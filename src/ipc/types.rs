use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::backend::Backend;
use crate::cache::SwrCache;
use crate::config::Config;
use crate::session::Session;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUrlSource {
    Default,
    Env,
    Workspace,
}

impl BaseUrlSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BaseUrlSource::Default => "default",
            BaseUrlSource::Env => "env",
            BaseUrlSource::Workspace => "workspace",
        }
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    pub base_url_source: BaseUrlSource,
    pub backend: Backend,
    pub session: Session,
    pub cache: SwrCache,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let backend = Backend::new(&config)?;
        let cache = SwrCache::new(config.dedupe_window);
        let base_url_source = if config.api_base_url_from_env {
            BaseUrlSource::Env
        } else {
            BaseUrlSource::Default
        };
        Ok(Self {
            workspace: None,
            db: None,
            config,
            base_url_source,
            backend,
            session: Session::default(),
            cache,
        })
    }
}
