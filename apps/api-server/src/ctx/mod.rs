use crate::{
    auth::IdentityResolver, db::CaptionRepository, session::SessionKey, workflow::UploadCoordinator,
};
use std::sync::Arc;

/// Shared state handed to every handler. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct Ctx {
    coordinator: Arc<UploadCoordinator>,
    repository: Arc<dyn CaptionRepository>,
    identity: Arc<dyn IdentityResolver>,
    session_key: Arc<SessionKey>,
}

impl Ctx {
    pub fn new(
        coordinator: Arc<UploadCoordinator>,
        repository: Arc<dyn CaptionRepository>,
        identity: Arc<dyn IdentityResolver>,
        session_key: Arc<SessionKey>,
    ) -> Self {
        Self {
            coordinator,
            repository,
            identity,
            session_key,
        }
    }

    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.coordinator
    }

    pub fn repository(&self) -> &dyn CaptionRepository {
        self.repository.as_ref()
    }

    pub fn identity_resolver(&self) -> &dyn IdentityResolver {
        self.identity.as_ref()
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }
}
