use std::path::PathBuf;

use serde::Deserialize;

use crate::library::LibraryStore;
use crate::settings::Settings;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub settings: Settings,
    pub workspace: Option<PathBuf>,
    pub workspace_id: Option<String>,
    pub library: Option<Box<dyn LibraryStore>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            workspace: None,
            workspace_id: None,
            library: None,
        }
    }
}
