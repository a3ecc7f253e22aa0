use crate::{
    config::Config, db::Store, session::Sessions, settings::SettingsStore, video::MediaFetcher,
};

/// Everything handlers need, injected into the dispatcher as one dependency
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub fetcher: MediaFetcher,
    pub settings: SettingsStore,
    pub sessions: Sessions,
}

impl AppState {
    pub async fn init(config: Config) -> crate::errors::BotResult<Self> {
        let store = Store::connect(&config.database_url).await?;
        let settings = SettingsStore::load(&config.settings_path).await?;
        let fetcher = MediaFetcher::new(&config.downloader, &config.scratch_dir);

        Ok(Self {
            config,
            store,
            fetcher,
            settings,
            sessions: Sessions::new(),
        })
    }
}
