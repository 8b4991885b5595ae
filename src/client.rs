//! HTTP client for the heroes API.
//!
//! [`HeroClient`] performs the requests and reports typed errors.
//! [`HeroService`] wraps it in a fail-soft policy: failures are logged to a
//! [`MessageLog`] and replaced by an empty value.

use crate::error::ClientError;
use crate::hero::{Hero, HeroDraft};
use reqwest::{Client, Url};
use std::sync::{Arc, Mutex};

/// Strict client: every failure comes back as a [`ClientError`].
#[derive(Clone, Debug)]
pub struct HeroClient {
    http: Client,
    base: Url,
}

impl HeroClient {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8080/api/tohHeroes`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(HeroClient { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // Segments are percent-encoded by `Url`.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn hero_url(&self, id: i64) -> Result<Url, ClientError> {
        self.url(&["hero", &id.to_string()])
    }

    pub async fn get_heroes(&self) -> Result<Vec<Hero>, ClientError> {
        let response = self.http.get(self.url(&[])?).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn get_hero(&self, id: i64) -> Result<Hero, ClientError> {
        let response = self.http.get(self.hero_url(id)?).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn search_heroes(&self, term: &str) -> Result<Vec<Hero>, ClientError> {
        let response = self.http.get(self.url(&["search", term])?).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn add_hero(&self, draft: &HeroDraft) -> Result<Hero, ClientError> {
        let response = self.http.post(self.url(&[])?).json(draft).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn update_hero(&self, hero: &Hero) -> Result<(), ClientError> {
        let response = self
            .http
            .put(self.hero_url(hero.id)?)
            .json(&HeroDraft::from(hero))
            .send()
            .await?;
        check(response)?;
        Ok(())
    }

    pub async fn delete_hero(&self, id: i64) -> Result<(), ClientError> {
        let response = self.http.delete(self.hero_url(id)?).send().await?;
        check(response)?;
        Ok(())
    }
}

fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::from_status(status.as_u16()))
    }
}

/// Shared, append-only list of human-readable messages.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        MessageLog::default()
    }

    pub fn add(&self, message: impl Into<String>) {
        self.lock().push(message.into());
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fail-soft hero service.
///
/// Callers cannot tell "no results" from "request failed"; the failure is
/// only visible in the message log. Use [`HeroService::client`] for typed errors.
#[derive(Clone, Debug)]
pub struct HeroService {
    client: HeroClient,
    messages: MessageLog,
}

impl HeroService {
    pub fn new(client: HeroClient, messages: MessageLog) -> Self {
        HeroService { client, messages }
    }

    pub fn client(&self) -> &HeroClient {
        &self.client
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    fn log(&self, message: String) {
        log::info!("HeroService: {}", message);
        self.messages.add(format!("HeroService: {}", message));
    }

    /// Log a failed operation and hand back the fallback value.
    fn handle_error<T>(&self, operation: &str, err: ClientError, fallback: T) -> T {
        log::error!("HeroService: {} failed: {}", operation, err);
        self.messages
            .add(format!("HeroService: {} failed: {}", operation, err));
        fallback
    }

    pub async fn get_heroes(&self) -> Vec<Hero> {
        match self.client.get_heroes().await {
            Ok(heroes) => {
                self.log("fetched heroes".to_string());
                heroes
            }
            Err(e) => self.handle_error("get_heroes", e, Vec::new()),
        }
    }

    pub async fn get_hero(&self, id: i64) -> Option<Hero> {
        match self.client.get_hero(id).await {
            Ok(hero) => {
                self.log(format!("fetched hero id={}", id));
                Some(hero)
            }
            Err(e) => self.handle_error(&format!("get_hero id={}", id), e, None),
        }
    }

    /// Heroes whose name contains `term`. A blank term returns nothing
    /// without a request.
    pub async fn search_heroes(&self, term: &str) -> Vec<Hero> {
        if term.trim().is_empty() {
            return Vec::new();
        }
        match self.client.search_heroes(term).await {
            Ok(heroes) => {
                if heroes.is_empty() {
                    self.log(format!("no heroes matching \"{}\"", term));
                } else {
                    self.log(format!("found heroes matching \"{}\"", term));
                }
                heroes
            }
            Err(e) => self.handle_error("search_heroes", e, Vec::new()),
        }
    }

    /// Add a hero by name. Surrounding whitespace is trimmed and blank
    /// names are skipped without a request.
    pub async fn add_hero(&self, name: &str) -> Option<Hero> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        match self.client.add_hero(&HeroDraft::named(name)).await {
            Ok(hero) => {
                self.log(format!("added hero w/ id={}", hero.id));
                Some(hero)
            }
            Err(e) => self.handle_error("add_hero", e, None),
        }
    }

    pub async fn update_hero(&self, hero: &Hero) -> Option<()> {
        match self.client.update_hero(hero).await {
            Ok(()) => {
                self.log(format!("updated hero id={}", hero.id));
                Some(())
            }
            Err(e) => self.handle_error("update_hero", e, None),
        }
    }

    pub async fn delete_hero(&self, id: i64) -> Option<()> {
        match self.client.delete_hero(id).await {
            Ok(()) => {
                self.log(format!("deleted hero id={}", id));
                Some(())
            }
            Err(e) => self.handle_error("delete_hero", e, None),
        }
    }
}
