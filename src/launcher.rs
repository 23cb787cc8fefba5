// Long-lived owner of the deploy command.
//
// One `Launcher` exists per process. It is created by `activate`, handed to
// the menu loop and released by `dispose`. `deploy` takes `&mut self`, so a
// second deploy can never start while one is in flight.

use crate::api::{ApiClient, Uploader};
use crate::config::Config;
use crate::error::DeployError;
use crate::store::{JsonFileStore, Scope, SettingsStore, TOKEN_KEY};
use crate::workflow::{DeployWorkflow, Outcome, Ui};

pub struct Launcher<S = JsonFileStore, P = ApiClient> {
    config: Config,
    store: S,
    uploader: P,
    deploys: u32,
}

impl Launcher {
    /// Open the settings file and build the HTTP client.
    pub fn activate(config: Config) -> Result<Self, DeployError> {
        let store = JsonFileStore::open(&config.state_file)?;
        let uploader = ApiClient::new(&config)?;
        tracing::info!(
            api = uploader.base_url(),
            state = %store.path().display(),
            "hostme launcher activated"
        );
        Ok(Self::with_parts(config, store, uploader))
    }
}

impl<S: SettingsStore, P: Uploader> Launcher<S, P> {
    pub fn with_parts(config: Config, store: S, uploader: P) -> Self {
        Self {
            config,
            store,
            uploader,
            deploys: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn uploader(&self) -> &P {
        &self.uploader
    }

    /// Run one "Deploy with Hostme" invocation to completion.
    pub fn deploy<U: Ui + ?Sized>(&mut self, ui: &mut U) -> Outcome {
        self.deploys += 1;
        let span = tracing::info_span!("deploy", attempt = self.deploys);
        let _enter = span.enter();
        let outcome = DeployWorkflow::new(ui, &mut self.store, &self.uploader, &self.config).run();
        match &outcome {
            Outcome::Deployed { url } => tracing::info!(%url, "deploy finished"),
            Outcome::Cancelled => tracing::info!("deploy cancelled"),
            Outcome::NothingSelected => tracing::debug!("no folder selected"),
            Outcome::Failed(err) => tracing::info!(error = %err, "deploy did not complete"),
        }
        outcome
    }

    /// Forget the stored bearer token.
    pub fn clear_token(&mut self) -> Result<(), DeployError> {
        self.store.remove(&Scope::Global, TOKEN_KEY)
    }

    pub fn has_token(&self) -> bool {
        matches!(self.store.get(&Scope::Global, TOKEN_KEY), Ok(Some(_)))
    }

    /// Release the launcher.
    pub fn dispose(self) {
        tracing::info!(deploys = self.deploys, "hostme launcher disposed");
    }
}
