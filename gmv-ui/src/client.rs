//! Remote genealogy API client
//!
//! Thin typed wrapper over the backend's REST endpoints. Every call is a plain
//! request/response; there is no retry or backoff here, failures go back to
//! the page which offers a manual Retry.

use std::time::Duration;

use gmv_common::filters::{FilterState, ViewMode};
use gmv_common::models::{
    AnalyticsSnapshot, GeocodeFix, GeocodeHit, GeocodeStats, MovementEvent, Person,
    PrecomputedSegment, Tree, UnresolvedLocation,
};
use gmv_common::{Error, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

const USER_AGENT: &str = concat!("gmv-ui/", env!("CARGO_PKG_VERSION"));

/// Validate an identifier before it is placed in a URL path
///
/// Backend ids are opaque but always alphanumeric with `-`/`_`; anything else
/// is rejected rather than escaped.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() < 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn check_id(kind: &str, id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(Error::Validation(format!("Invalid {} id: {}", kind, id)))
    }
}

/// Query parameters the backend understands for movement requests
pub fn movement_query(filters: &FilterState) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("mode", filters.mode.as_str().to_string()),
        ("year_min", filters.year_min.to_string()),
        ("year_max", filters.year_max.to_string()),
    ];
    for id in &filters.selected {
        pairs.push(("person_id", id.clone()));
    }
    if filters.mode == ViewMode::Family {
        for relation in &filters.relations {
            pairs.push(("relation", relation.as_str().to_string()));
        }
    }
    pairs
}

/// Genealogy backend client
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(non_empty_or(body, "backend resource"))),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(Error::Validation(non_empty_or(body, "rejected by backend")))
            }
            _ => Err(Error::Network(format!("backend returned {}: {}", status.as_u16(), body))),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "GET backend");

        let response = self.send(self.http.get(&url).query(query)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Network(format!("unexpected response from {}: {}", path, e)))
    }

    /// GET /trees
    pub async fn list_trees(&self) -> Result<Vec<Tree>> {
        self.get_json("/trees", &[]).await
    }

    /// POST /trees/upload (multipart `file`)
    pub async fn upload_tree(&self, filename: &str, bytes: Vec<u8>) -> Result<Tree> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .send(self.http.post(self.url("/trees/upload")).multipart(form))
            .await?;
        response
            .json::<Tree>()
            .await
            .map_err(|e| Error::Network(format!("unexpected upload response: {}", e)))
    }

    /// GET /trees/{id}/people
    pub async fn list_people(&self, tree_id: &str, query: Option<&str>) -> Result<Vec<Person>> {
        check_id("tree", tree_id)?;
        let params: Vec<(&str, String)> = query
            .filter(|q| !q.is_empty())
            .map(|q| vec![("q", q.to_string())])
            .unwrap_or_default();
        self.get_json(&format!("/trees/{}/people", tree_id), &params).await
    }

    /// GET /trees/{id}/people/{pid}/events
    pub async fn person_events(&self, tree_id: &str, person_id: &str) -> Result<Vec<MovementEvent>> {
        check_id("tree", tree_id)?;
        check_id("person", person_id)?;
        self.get_json(&format!("/trees/{}/people/{}/events", tree_id, person_id), &[])
            .await
    }

    /// GET /trees/{id}/movements
    pub async fn movements(&self, tree_id: &str, filters: &FilterState) -> Result<Vec<MovementEvent>> {
        check_id("tree", tree_id)?;
        self.get_json(&format!("/trees/{}/movements", tree_id), &movement_query(filters))
            .await
    }

    /// GET /trees/{id}/movements/segments
    pub async fn precomputed_segments(
        &self,
        tree_id: &str,
        filters: &FilterState,
    ) -> Result<Vec<PrecomputedSegment>> {
        check_id("tree", tree_id)?;
        self.get_json(
            &format!("/trees/{}/movements/segments", tree_id),
            &movement_query(filters),
        )
        .await
    }

    /// GET /trees/{id}/analytics
    pub async fn analytics(&self, tree_id: &str) -> Result<AnalyticsSnapshot> {
        check_id("tree", tree_id)?;
        self.get_json(&format!("/trees/{}/analytics", tree_id), &[]).await
    }

    /// GET /geocode/stats
    pub async fn geocode_stats(&self) -> Result<GeocodeStats> {
        self.get_json("/geocode/stats", &[]).await
    }

    /// GET /geocode/unresolved
    pub async fn unresolved_locations(&self) -> Result<Vec<UnresolvedLocation>> {
        self.get_json("/geocode/unresolved", &[]).await
    }

    /// POST /geocode/fix
    pub async fn submit_geocode_fix(&self, fix: &GeocodeFix) -> Result<()> {
        self.send(self.http.post(self.url("/geocode/fix")).json(fix))
            .await
            .map(|_| ())
    }

    /// GET /geocode/lookup; `Ok(None)` when the geocoder has no match
    pub async fn geocode_lookup(&self, location: &str) -> Result<Option<GeocodeHit>> {
        match self
            .get_json::<GeocodeHit>("/geocode/lookup", &[("q", location.to_string())])
            .await
        {
            Ok(hit) => Ok(Some(hit)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn non_empty_or(body: String, fallback: &str) -> String {
    if body.trim().is_empty() {
        fallback.to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmv_common::filters::Relation;

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("tree_01-A"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id("a b"));
    }

    #[test]
    fn test_movement_query_person_mode_omits_relations() {
        let mut filters = FilterState::default();
        filters.selected = vec!["p1".into(), "p2".into()];
        let pairs = movement_query(&filters);
        assert!(pairs.contains(&("person_id", "p1".to_string())));
        assert!(pairs.contains(&("person_id", "p2".to_string())));
        assert!(!pairs.iter().any(|(k, _)| *k == "relation"));
    }

    #[test]
    fn test_movement_query_family_mode_sends_relations() {
        let mut filters = FilterState::default();
        filters.mode = ViewMode::Family;
        filters.relations = [Relation::Siblings].into_iter().collect();
        let pairs = movement_query(&filters);
        assert!(pairs.contains(&("relation", "siblings".to_string())));
        assert!(pairs.contains(&("mode", "family".to_string())));
    }

    #[tokio::test]
    async fn test_invalid_tree_id_rejected_before_request() {
        let client =
            BackendClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = client.analytics("bad/id").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
