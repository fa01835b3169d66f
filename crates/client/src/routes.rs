//! Client routes and the auth guard in front of them

use crate::session::AuthService;
use armory_core::{
    keys, read_json, write_json, ArmoryError, AuthBackend, KeyValueStore, LastCharacter, Result,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterView {
    Character,
    Collections,
    Achievements,
    AchievementCategory(String),
    Reputations,
    Instances,
}

impl CharacterView {
    fn from_segments(segments: &[String]) -> Option<Self> {
        match segments {
            [] => Some(CharacterView::Character),
            [view] => match view.as_str() {
                "character" => Some(CharacterView::Character),
                "collections" => Some(CharacterView::Collections),
                "achievements" => Some(CharacterView::Achievements),
                "reputations" => Some(CharacterView::Reputations),
                "instances" => Some(CharacterView::Instances),
                _ => None,
            },
            [view, category] if view == "achievements" => {
                Some(CharacterView::AchievementCategory(category.clone()))
            }
            _ => None,
        }
    }

    fn path(&self) -> String {
        match self {
            CharacterView::Character => "character".to_string(),
            CharacterView::Collections => "collections".to_string(),
            CharacterView::Achievements => "achievements".to_string(),
            CharacterView::AchievementCategory(slug) => {
                format!("achievements/{}", urlencoding::encode(slug))
            }
            CharacterView::Reputations => "reputations".to_string(),
            CharacterView::Instances => "instances".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`, optionally carrying a failed login's reason code
    Landing { error: Option<String> },
    AuthCallback,
    Dashboard,
    Character {
        realm: String,
        name: String,
        view: CharacterView,
    },
}

/// Decode a `a=1&b=2` query string. Later duplicates win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw)
}

impl Route {
    pub fn parse(input: &str) -> Result<Self> {
        let (path, query) = input.split_once('?').unwrap_or((input, ""));
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode)
            .collect();

        let route = match segments.as_slice() {
            [] => Route::Landing {
                error: parse_query(query).remove("error").filter(|e| !e.is_empty()),
            },
            [auth, callback] if auth == "auth" && callback == "callback" => Route::AuthCallback,
            [page] if page == "dashboard" || page == "character" => Route::Dashboard,
            [realm, name, rest @ ..] => {
                let view = CharacterView::from_segments(rest)
                    .ok_or_else(|| ArmoryError::NotFound(format!("route {}", path)))?;
                Route::Character {
                    realm: realm.clone(),
                    name: name.clone(),
                    view,
                }
            }
            _ => return Err(ArmoryError::NotFound(format!("route {}", path))),
        };
        Ok(route)
    }

    pub fn character(realm: &str, name: &str, view: CharacterView) -> Self {
        Route::Character {
            realm: realm.to_string(),
            name: name.to_string(),
            view,
        }
    }

    pub fn landing_with_error(reason: impl Into<String>) -> Self {
        Route::Landing {
            error: Some(reason.into()),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Dashboard | Route::Character { .. })
    }

    pub fn last_character(&self) -> Option<LastCharacter> {
        match self {
            Route::Character { realm, name, .. } => Some(LastCharacter {
                realm: realm.clone(),
                name: name.clone(),
            }),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Landing { error: None } => "/".to_string(),
            Route::Landing { error: Some(e) } => format!("/?error={}", urlencoding::encode(e)),
            Route::AuthCallback => "/auth/callback".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Character { realm, name, view } => format!(
                "/{}/{}/{}",
                urlencoding::encode(realm),
                urlencoding::encode(name),
                view.path()
            ),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(Route),
    Redirect(Route),
}

impl GuardDecision {
    pub fn route(&self) -> &Route {
        match self {
            GuardDecision::Allow(route) | GuardDecision::Redirect(route) => route,
        }
    }
}

pub struct RouteGuard<B: AuthBackend> {
    auth: Arc<AuthService<B>>,
    durable: Arc<dyn KeyValueStore>,
    ready_timeout: Duration,
}

impl<B: AuthBackend> RouteGuard<B> {
    pub fn new(
        auth: Arc<AuthService<B>>,
        durable: Arc<dyn KeyValueStore>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            auth,
            durable,
            ready_timeout,
        }
    }

    /// Decide on a navigation once the startup auth check has settled
    pub async fn check(&self, route: Route) -> Result<GuardDecision> {
        let authenticated = self.auth.wait_until_initialized(self.ready_timeout).await?;

        if route.requires_auth() && !authenticated {
            tracing::info!("{} requires login, redirecting to landing", route);
            return Ok(GuardDecision::Redirect(Route::Landing { error: None }));
        }

        if authenticated && matches!(route, Route::Landing { .. }) {
            return Ok(GuardDecision::Redirect(self.home()));
        }

        if let Some(character) = route.last_character() {
            self.remember(&character);
        }
        Ok(GuardDecision::Allow(route))
    }

    pub fn last_character(&self) -> Option<LastCharacter> {
        read_json(self.durable.as_ref(), keys::LAST_CHARACTER).unwrap_or_else(|e| {
            tracing::warn!("Ignoring stored last character: {}", e);
            None
        })
    }

    fn home(&self) -> Route {
        match self.last_character() {
            Some(c) => Route::character(&c.realm, &c.name, CharacterView::Character),
            None => Route::Dashboard,
        }
    }

    fn remember(&self, character: &LastCharacter) {
        if let Err(e) = write_json(self.durable.as_ref(), keys::LAST_CHARACTER, character) {
            tracing::warn!("Could not record last character: {}", e);
        }
    }
}
