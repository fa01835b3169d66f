//! Character API calls
//!
//! Thin typed wrappers over the backend's JSON endpoints. Requests carry the
//! current session id as the `sid` cookie once a session is known.

use armory_core::{
    Achievement, Affix, ArmoryError, AuthBackend, AuthErrorBody, CallbackRequest,
    CallbackResponse, CharacterAchievementSummary, CharacterData, CharacterEquipment,
    CharacterMedia, CharacterProfile, CollectionItem, CompletedAchievementMap, DungeonsResponse,
    ReputationsByExpansion, Result, SeasonDetails, SeasonsResponse, ValidateResponse,
};
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Collection families exposed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Mounts,
    Pets,
    Toys,
    Heirlooms,
    Transmogs,
}

impl CollectionKind {
    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Mounts => "mounts",
            CollectionKind::Pets => "pets",
            CollectionKind::Toys => "toys",
            CollectionKind::Heirlooms => "heirlooms",
            CollectionKind::Transmogs => "transmogs",
        }
    }

    /// Path of the full catalog for this collection
    pub fn catalog_path(&self) -> String {
        match self {
            CollectionKind::Transmogs => "/transmogs".to_string(),
            other => format!("/{}/all", other.name()),
        }
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mounts" => Ok(CollectionKind::Mounts),
            "pets" => Ok(CollectionKind::Pets),
            "toys" => Ok(CollectionKind::Toys),
            "heirlooms" => Ok(CollectionKind::Heirlooms),
            "transmogs" => Ok(CollectionKind::Transmogs),
            other => Err(format!("unknown collection '{}'", other)),
        }
    }
}

/// Achievement catalog joined with one character's completions
#[derive(Debug, Clone)]
pub struct AchievementSnapshot {
    pub catalog: Vec<Achievement>,
    pub summary: CharacterAchievementSummary,
    pub completed: CompletedAchievementMap,
}

/// Path for a character-scoped document, with the segments percent-encoded
pub fn character_path(prefix: &str, realm: &str, name: &str, suffix: &str) -> String {
    let mut path = format!(
        "/{}/{}/{}",
        prefix,
        urlencoding::encode(realm),
        urlencoding::encode(name)
    );
    if !suffix.is_empty() {
        path.push('/');
        path.push_str(suffix);
    }
    path
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    session_id: RwLock<Option<String>>,
    /// Affix catalog, fetched once per client
    affixes: OnceCell<Vec<Affix>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArmoryError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: RwLock::new(None),
            affixes: OnceCell::new(),
        })
    }

    /// Session attached to subsequent requests
    pub fn set_session(&self, session_id: Option<String>) {
        if let Ok(mut current) = self.session_id.write() {
            *current = session_id;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_sid(request: RequestBuilder, session_id: Option<&str>) -> RequestBuilder {
        match session_id {
            Some(id) => request.header(COOKIE, format!("sid={}", id)),
            None => request,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let session = self.session_id.read().ok().and_then(|s| s.clone());
        Self::with_sid(request, session.as_deref())
    }

    /// Transport failures, timeouts included, are network errors
    async fn send(request: RequestBuilder) -> Result<reqwest::Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ArmoryError::Network(format!("request timed out: {}", e))
            } else {
                ArmoryError::Network(e.to_string())
            }
        })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ArmoryError::Network(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ArmoryError::NotFound(url));
        }
        if !status.is_success() {
            return Err(ArmoryError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("GET {}", path);
        let response = Self::send(self.authorized(self.http.get(self.url(path)))).await?;
        Self::read_json(response).await
    }

    pub async fn all_achievements(&self) -> Result<Vec<Achievement>> {
        let achievements: Vec<Achievement> = self.get_json("/achievements/all").await?;
        tracing::info!(total = achievements.len(), "Received achievement catalog");
        Ok(achievements)
    }

    pub async fn character_achievements(
        &self,
        realm: &str,
        name: &str,
    ) -> Result<CharacterAchievementSummary> {
        let summary: CharacterAchievementSummary = self
            .get_json(&character_path("character", realm, name, "achievements"))
            .await?;
        tracing::info!(
            total_quantity = summary.total_quantity,
            total_points = summary.total_points,
            entries = summary.achievements.len(),
            "Received character achievements for {}-{}",
            name,
            realm
        );
        Ok(summary)
    }

    pub async fn character_equipment(&self, realm: &str, name: &str) -> Result<CharacterEquipment> {
        self.get_json(&character_path("character", realm, name, "equipment")).await
    }

    pub async fn character_media(&self, realm: &str, name: &str) -> Result<CharacterMedia> {
        self.get_json(&character_path("character", realm, name, "media")).await
    }

    pub async fn character_profile(&self, realm: &str, name: &str) -> Result<CharacterProfile> {
        self.get_json(&character_path("character", realm, name, "profile")).await
    }

    pub async fn character_reputations(
        &self,
        realm: &str,
        name: &str,
    ) -> Result<ReputationsByExpansion> {
        self.get_json(&character_path("reputations", realm, name, "")).await
    }

    pub async fn collection_catalog(&self, kind: CollectionKind) -> Result<Vec<CollectionItem>> {
        self.get_json(&kind.catalog_path()).await
    }

    pub async fn collected_items(
        &self,
        kind: CollectionKind,
        realm: &str,
        name: &str,
    ) -> Result<Vec<CollectionItem>> {
        self.get_json(&character_path("collections", realm, name, kind.name()))
            .await
    }

    /// Mythic+ profile for the current season
    pub async fn character_dungeons(&self, realm: &str, name: &str) -> Result<DungeonsResponse> {
        self.get_json(&character_path("dungeons", realm, name, ""))
            .await
            .map_err(|e| no_mythic_data(e, realm, name))
    }

    /// Best runs of one season. The backend keys these by lowercase name.
    pub async fn season_details(
        &self,
        realm: &str,
        name: &str,
        season_id: u64,
    ) -> Result<SeasonDetails> {
        let suffix = format!("season/{}", season_id);
        self.get_json(&character_path("dungeons", realm, &name.to_lowercase(), &suffix))
            .await
            .map_err(|e| match e {
                ArmoryError::NotFound(_) => {
                    ArmoryError::NotFound(format!("no data for Mythic+ season {}", season_id))
                }
                other => other,
            })
    }

    pub async fn seasons(&self) -> Result<SeasonsResponse> {
        self.get_json("/dungeons/seasons").await
    }

    pub async fn affixes(&self) -> Result<&[Affix]> {
        let affixes = self
            .affixes
            .get_or_try_init(|| async {
                let affixes: Vec<Affix> = self.get_json("/affixes").await?;
                tracing::debug!(total = affixes.len(), "Cached affix catalog");
                Ok::<_, ArmoryError>(affixes)
            })
            .await?;
        Ok(affixes.as_slice())
    }

    /// Catalog and completions fetched concurrently; either failure fails both
    pub async fn load_achievements(&self, realm: &str, name: &str) -> Result<AchievementSnapshot> {
        let (catalog, summary) = tokio::try_join!(
            self.all_achievements(),
            self.character_achievements(realm, name)
        )?;
        let completed = CompletedAchievementMap::from_summary(&summary);

        Ok(AchievementSnapshot {
            catalog,
            summary,
            completed,
        })
    }

    /// Equipment, media and profile fetched concurrently
    pub async fn load_character(&self, realm: &str, name: &str) -> Result<CharacterData> {
        let (equipment, media, profile) = tokio::try_join!(
            self.character_equipment(realm, name),
            self.character_media(realm, name),
            self.character_profile(realm, name)
        )?;

        Ok(CharacterData {
            equipment,
            media,
            profile,
        })
    }
}

fn no_mythic_data(error: ArmoryError, realm: &str, name: &str) -> ArmoryError {
    match error {
        ArmoryError::NotFound(_) => {
            ArmoryError::NotFound(format!("no Mythic+ data for {}-{}", name, realm))
        }
        other => other,
    }
}

#[async_trait::async_trait]
impl AuthBackend for ApiClient {
    async fn validate(&self, session_id: &str) -> Result<ValidateResponse> {
        let request = Self::with_sid(self.http.get(self.url("/auth/validate")), Some(session_id));
        Self::read_json(Self::send(request).await?).await
    }

    async fn exchange_code(&self, request: &CallbackRequest) -> Result<CallbackResponse> {
        let response = Self::send(self.http.post(self.url("/auth/callback")).json(request)).await?;

        let status = response.status();
        if !status.is_success() {
            let body: AuthErrorBody = response.json().await.unwrap_or_default();
            if let Some(message) = &body.message {
                tracing::warn!("Code exchange rejected ({}): {}", status, message);
            }
            return Err(ArmoryError::Auth(
                body.error.unwrap_or_else(|| "exchange_failed".to_string()),
            ));
        }

        Self::read_json(response).await
    }

    async fn logout(&self, session_id: &str) -> Result<()> {
        let request = Self::with_sid(self.http.post(self.url("/auth/logout")), Some(session_id));
        let response = Self::send(request).await?;
        if !response.status().is_success() {
            return Err(ArmoryError::Api {
                status: response.status().as_u16(),
                message: "logout rejected".to_string(),
            });
        }
        Ok(())
    }
}
