//! Common utilities for the chart registry client
//!
//! Provides the authenticated HTTP wrapper shared by all registry calls.

pub mod reference;

use crate::error::ChartError;
use crate::models::TokenResponse;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Parsed `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint to request credentials from
    pub realm: String,
    /// Service name passed back to the token endpoint
    pub service: Option<String>,
    /// Requested access scope, e.g. `repository:org/chart:pull`
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse a bearer challenge header. Quoted values may contain commas.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self { realm: realm?, service, scope })
    }

    /// Token endpoint URL for the given fallback scope
    pub fn token_url(&self, fallback_scope: &str) -> String {
        let mut query = Vec::new();
        if let Some(service) = &self.service {
            query.push(format!("service={}", urlencoding::encode(service)));
        }
        let scope = self.scope.as_deref().unwrap_or(fallback_scope);
        query.push(format!("scope={}", urlencoding::encode(scope)));
        format!("{}?{}", self.realm, query.join("&"))
    }
}

fn split_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;

    for c in params.chars() {
        match c {
            '"' if in_value => in_quotes = !in_quotes,
            '=' if !in_value => in_value = true,
            ',' if !in_quotes => {
                if !key.trim().is_empty() {
                    pairs.push((key.trim().to_string(), value.clone()));
                }
                key.clear();
                value.clear();
                in_value = false;
            }
            _ if in_value => value.push(c),
            _ => key.push(c),
        }
    }
    if !key.trim().is_empty() {
        pairs.push((key.trim().to_string(), value));
    }
    pairs
}

/// HTTP client wrapper answering anonymous bearer challenges
#[derive(Debug)]
pub struct RegistryHttp {
    client: Client,
    // scope -> bearer token
    tokens: Mutex<HashMap<String, String>>,
}

impl RegistryHttp {
    /// Create a new HTTP wrapper
    pub fn new(client: Client) -> Self {
        Self {
            client,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn cached_token(&self, scope: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
    }

    fn store_token(&self, scope: &str, token: String) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope.to_string(), token);
    }

    async fn send(&self, url: &str, accept: &str, token: Option<&str>) -> Result<Response, ChartError> {
        let mut request = self.client.get(url).header(ACCEPT, accept);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(request.send().await?)
    }

    async fn fetch_token(&self, challenge: &BearerChallenge, scope: &str) -> Result<String, ChartError> {
        let url = challenge.token_url(scope);
        debug!("Requesting anonymous registry token from {}", challenge.realm);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ChartError::Authentication(format!(
                "token endpoint {} returned {}",
                challenge.realm,
                response.status()
            )));
        }
        response
            .json::<TokenResponse>()
            .await?
            .into_token()
            .ok_or_else(|| ChartError::Authentication(format!("token endpoint {} returned no token", challenge.realm)))
    }

    /// GET `url`, retrying once with an anonymous token when challenged.
    /// Non-success statuses are returned as `ChartError::Registry`.
    pub async fn get(&self, url: &str, accept: &str, scope: &str) -> Result<Response, ChartError> {
        let cached = self.cached_token(scope);
        let mut response = self.send(url, accept, cached.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerChallenge::parse)
                .ok_or_else(|| ChartError::Authentication(format!("{} requires credentials", url)))?;

            let token = self.fetch_token(&challenge, scope).await?;
            self.store_token(scope, token.clone());
            response = self.send(url, accept, Some(&token)).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ChartError::Authentication(format!("anonymous pull of {} refused", url)));
            }
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChartError::Registry(format!(
                "GET {} failed: {} - {}",
                url,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response)
    }

    /// GET and decode a JSON body, returning the response headers alongside
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        accept: &str,
        scope: &str,
    ) -> Result<(T, HeaderMap), ChartError> {
        let response = self.get(url, accept, scope).await?;
        let headers = response.headers().clone();
        let text = response.text().await?;
        let value = serde_json::from_str(&text)?;
        Ok((value, headers))
    }
}
