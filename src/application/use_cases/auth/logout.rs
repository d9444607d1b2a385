use super::AuthError;
use crate::application::ports::user_repository::SessionRepository;
use crate::application::services::documents::DocumentService;

pub struct Logout<'a, S: SessionRepository + ?Sized> {
    pub sessions: &'a S,
    pub documents: &'a DocumentService,
}

impl<'a, S: SessionRepository + ?Sized> Logout<'a, S> {
    /// Returns whether a session was closed.
    pub async fn execute(&self, token: &str) -> Result<bool, AuthError> {
        let closed = self
            .sessions
            .delete_session(token)
            .await
            .map_err(AuthError::Storage)?;
        if closed {
            // the token is dead, so are its cached list queries
            self.documents.forget_requester(token).await;
        }
        Ok(closed)
    }
}
