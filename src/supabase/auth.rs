use reqwest::Method;
use serde_json::{Value, json};
use tracing::info;

use super::client::{Credential, SupabaseClient, with_retry};
use crate::error::TimecapsuleError;
use crate::types::auth::{AuthUser, Session, SignUpOutcome, UserAttributes};

impl SupabaseClient {
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, TimecapsuleError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let req = self
            .request(Method::POST, url, Credential::Anon)
            .json(&json!({ "email": email, "password": password }));
        let session: Session = self.send(req).await?.json().await?;
        info!(user_id = %session.user.id, "password sign-in succeeded");
        Ok(session)
    }

    /// Creates the account. `metadata` lands in the user's metadata, where the
    /// sign-up trigger copies it into `public.users`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<SignUpOutcome, TimecapsuleError> {
        let url = self.endpoint("auth/v1/signup")?;
        let req = self.request(Method::POST, url, Credential::Anon).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let payload: Value = self.send(req).await?.json().await?;

        if payload.get("access_token").is_some() {
            let session: Session = serde_json::from_value(payload)?;
            info!(user_id = %session.user.id, "sign-up created a session");
            return Ok(SignUpOutcome::Session(session));
        }
        // Without auto-confirm the service answers with the bare user, or
        // with `{ user }` on some versions.
        let user_value = match payload.get("user") {
            Some(user) => user.clone(),
            None => payload,
        };
        let user: AuthUser = serde_json::from_value(user_value)?;
        info!(user_id = %user.id, "sign-up awaiting email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    /// Resolves an access token to its user; fails with the service's 401 when
    /// the token is invalid or expired.
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, TimecapsuleError> {
        with_retry("get_user", || async {
            let url = self.endpoint("auth/v1/user")?;
            let req = self.request(Method::GET, url, Credential::User(access_token));
            Ok(self.send(req).await?.json::<AuthUser>().await?)
        })
        .await
    }

    pub async fn update_user(
        &self,
        access_token: &str,
        attributes: &UserAttributes,
    ) -> Result<AuthUser, TimecapsuleError> {
        let url = self.endpoint("auth/v1/user")?;
        let req = self
            .request(Method::PUT, url, Credential::User(access_token))
            .json(attributes);
        let user: AuthUser = self.send(req).await?.json().await?;
        info!(user_id = %user.id, "user attributes updated");
        Ok(user)
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), TimecapsuleError> {
        let url = self.endpoint("auth/v1/logout")?;
        let req = self.request(Method::POST, url, Credential::User(access_token));
        self.send(req).await?;
        Ok(())
    }
}
