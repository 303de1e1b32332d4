//! [`SessionProvider`] holding one resolved guide identity

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SessionProvider;

/// Session whose user is fixed at startup until signed out
#[derive(Debug, Default)]
pub struct StaticSession {
    user: RwLock<Option<String>>,
}

impl StaticSession {
    pub fn new(user: Option<String>) -> Self {
        Self {
            user: RwLock::new(user),
        }
    }

    pub async fn sign_in(&self, user: String) {
        *self.user.write().await = Some(user);
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_user(&self) -> Option<String> {
        self.user.read().await.clone()
    }

    async fn sign_out(&self) {
        if let Some(user) = self.user.write().await.take() {
            tracing::info!(user = %user, "Signed out");
        }
    }
}
