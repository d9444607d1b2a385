use std::sync::Arc;

use crate::application::ports::user_repository::{SessionRepository, UserRepository};
use crate::application::services::documents::DocumentService;
use crate::bootstrap::config::Config;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

pub struct AppServices {
    documents: DocumentService,
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
}

impl AppServices {
    pub fn new(
        documents: DocumentService,
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            documents,
            user_repo,
            session_repo,
        }
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn documents(&self) -> &DocumentService {
        &self.services.documents
    }

    pub fn user_repo(&self) -> Arc<dyn UserRepository> {
        self.services.user_repo.clone()
    }

    pub fn session_repo(&self) -> Arc<dyn SessionRepository> {
        self.services.session_repo.clone()
    }
}
