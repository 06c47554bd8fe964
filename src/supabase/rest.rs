use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::client::{Credential, SupabaseClient, with_retry};
use crate::error::TimecapsuleError;

impl SupabaseClient {
    /// `GET /rest/v1/{table}` with PostgREST query parameters
    /// (`select`, column filters such as `owner_id=eq.…`, `order`, `limit`).
    pub async fn select<T>(
        &self,
        table: &str,
        query: &[(&str, String)],
        cred: Credential<'_>,
    ) -> Result<Vec<T>, TimecapsuleError>
    where
        T: DeserializeOwned,
    {
        with_retry("select", || async {
            let url = self.endpoint(&format!("rest/v1/{table}"))?;
            let req = self.request(Method::GET, url, cred).query(query);
            let rows = self.send(req).await?.json::<Vec<T>>().await?;
            debug!(table, rows = rows.len(), "select");
            Ok(rows)
        })
        .await
    }

    /// Inserts and returns the stored rows.
    pub async fn insert<T, B>(
        &self,
        table: &str,
        rows: &B,
        cred: Credential<'_>,
    ) -> Result<Vec<T>, TimecapsuleError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let req = self
            .request(Method::POST, url, cred)
            .header("Prefer", "return=representation")
            .json(rows);
        Ok(self.send(req).await?.json().await?)
    }

    /// Inserts, merging into existing rows that collide on `on_conflict`.
    pub async fn upsert<T, B>(
        &self,
        table: &str,
        rows: &B,
        on_conflict: &str,
        cred: Credential<'_>,
    ) -> Result<Vec<T>, TimecapsuleError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let req = self
            .request(Method::POST, url, cred)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(rows);
        Ok(self.send(req).await?.json().await?)
    }

    /// Cheapest query that proves the database answers: `users?select=count&limit=1`.
    pub async fn probe(&self) -> Result<(), TimecapsuleError> {
        with_retry("probe", || async {
            let url = self.endpoint("rest/v1/users")?;
            let req = self
                .request(Method::GET, url, Credential::Admin)
                .query(&[("select", "count"), ("limit", "1")]);
            self.send(req).await?;
            Ok(())
        })
        .await
    }
}
