use log::{debug, warn};
use std::sync::Arc;

use super::ports::{AuthProvider, RemoteServiceClient, TransportError};
use crate::error::EngineError;
use crate::types::{DismissalRequest, NotificationsQuery, NotificationsResponse};

/// Authenticated access to the notification service.
///
/// Every call fetches a token first; a token the server refuses is removed
/// from the provider so the next attempt obtains a fresh one.
#[derive(Clone)]
pub(crate) struct RemoteGateway {
    remote: Arc<dyn RemoteServiceClient>,
    auth: Arc<dyn AuthProvider>,
}

impl RemoteGateway {
    pub(crate) fn new(remote: Arc<dyn RemoteServiceClient>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { remote, auth }
    }

    async fn token(&self) -> Result<String, EngineError> {
        self.auth.get_auth_token().await.map_err(EngineError::Auth)
    }

    async fn settle<T>(
        &self,
        token: &str,
        result: Result<T, TransportError>,
    ) -> Result<T, EngineError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.requires_reauth() {
                    warn!("[CardSync] Server rejected auth token: {}", err);
                    self.auth.remove_token(token).await;
                }
                Err(EngineError::Transport(err))
            }
        }
    }

    pub(crate) async fn get_notifications(
        &self,
        query: NotificationsQuery,
    ) -> Result<NotificationsResponse, EngineError> {
        let token = self.token().await?;
        debug!(
            "[CardSync] Requesting notifications for groups {:?}",
            query.request_types
        );
        let result = self.remote.get_notifications(&token, query).await;
        self.settle(&token, result).await
    }

    pub(crate) async fn get_opt_in(&self) -> Result<bool, EngineError> {
        let token = self.token().await?;
        let result = self.remote.get_opt_in(&token).await;
        self.settle(&token, result).await
    }

    pub(crate) async fn delete_notification(
        &self,
        request: DismissalRequest,
    ) -> Result<(), EngineError> {
        let token = self.token().await?;
        debug!(
            "[CardSync] Dismissing notification {} (age {}ms)",
            request.notification_id, request.age_ms
        );
        let result = self.remote.delete_notification(&token, request).await;
        self.settle(&token, result).await
    }
}
