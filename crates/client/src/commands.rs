//! Command handlers behind the CLI

use crate::api::{ApiClient, CollectionKind};
use crate::callback::CallbackListener;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::routes::{CharacterView, GuardDecision, Route, RouteGuard};
use crate::session::AuthService;
use armory_core::{
    build_chain, display_category, is_collected, Achievement, AchievementFilter, Affix,
    ArmoryError, AuthState, CompletedAchievementMap, DungeonRun, KeyValueStore, MemoryStore,
    Progress, ProgressCalculator, Reputation, Result,
};
use std::path::Path;
use std::sync::Arc;

/// Everything one CLI invocation needs. The process plays the part of a
/// browser tab: its `MemoryStore` is the ephemeral scope.
pub struct App {
    config: Config,
    api: Arc<ApiClient>,
    auth: Arc<AuthService<ApiClient>>,
    guard: RouteGuard<ApiClient>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let durable: Arc<dyn KeyValueStore> =
            Arc::new(SqliteStore::open(Path::new(&config.database_path))?);
        let ephemeral: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::ephemeral());

        let api = Arc::new(ApiClient::new(config.api_base(), config.request_timeout())?);
        let auth = Arc::new(AuthService::new(
            api.clone(),
            durable.clone(),
            ephemeral,
            config.api_base(),
            &config.callback_url,
        ));
        let guard = RouteGuard::new(auth.clone(), durable, config.auth_ready_timeout());

        Ok(Self {
            config,
            api,
            auth,
            guard,
        })
    }

    /// Kick off the startup auth check without waiting for it
    pub fn start(&self) {
        let auth = self.auth.clone();
        tokio::spawn(async move {
            auth.check_auth_status().await;
        });
    }

    /// Run a navigation through the guard; a redirect means the user has to
    /// log in first
    async fn enter(&self, route: Route) -> Result<()> {
        match self.guard.check(route).await? {
            GuardDecision::Allow(_) => {
                self.api
                    .set_session(self.auth.session().map(|s| s.session_id));
                Ok(())
            }
            GuardDecision::Redirect(target) => {
                println!("Redirected to {}, run `armory login` first", target);
                Err(ArmoryError::NotAuthenticated)
            }
        }
    }

    // ========================================================================
    // Session commands
    // ========================================================================

    pub async fn login(&self, remember: bool) -> Result<()> {
        let listener = CallbackListener::bind(
            &self.config.callback_address()?,
            &self.config.callback_path()?,
        )
        .await?;
        tracing::debug!("Callback listener on {}", listener.local_addr()?);

        let url = self.auth.login(remember)?;
        println!("Open this URL in your browser to log in:\n\n  {}\n", url);
        println!("Waiting for the login to complete...");

        let params = match listener.wait(self.config.login_timeout()).await {
            Ok(params) => params,
            Err(e) => {
                self.auth.abandon_login(&e);
                println!("Returning to {}", Route::landing_with_error(e.reason()));
                return Err(e);
            }
        };

        match self.auth.handle_callback(params).await {
            Ok(session) => {
                let storage = if session.is_persistent { "remembered on this device" } else { "this session only" };
                println!("Logged in ({})", storage);
                let next = self.guard.check(Route::Landing { error: None }).await?;
                println!("Continue at {}", next.route());
                Ok(())
            }
            Err(e) => {
                println!("Returning to {}", Route::landing_with_error(e.reason()));
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> Result<()> {
        self.start();
        self.auth
            .wait_until_initialized(self.config.auth_ready_timeout())
            .await?;
        self.auth.logout().await;
        println!("Logged out");
        Ok(())
    }

    pub async fn status(&self) -> Result<()> {
        self.start();
        self.auth
            .wait_until_initialized(self.config.auth_ready_timeout())
            .await?;

        match self.auth.state() {
            AuthState::Authenticated(session) => {
                println!("Authenticated");
                println!(
                    "  storage:  {}",
                    if session.is_persistent { "durable" } else { "session" }
                );
                println!("  since:    {}", session.initialized_at.format("%Y-%m-%d %H:%M UTC"));
            }
            other => println!("{}", other.label()),
        }

        if let Some(last) = self.guard.last_character() {
            println!("  last character: {}/{}", last.realm, last.name);
        }
        Ok(())
    }

    pub async fn open(&self, path: &str) -> Result<()> {
        let route = Route::parse(path)?;
        self.start();
        match self.guard.check(route).await? {
            GuardDecision::Allow(route) => println!("Allowed: {}", route),
            GuardDecision::Redirect(route) => println!("Redirected to {}", route),
        }
        Ok(())
    }

    // ========================================================================
    // Character commands
    // ========================================================================

    pub async fn character(&self, realm: &str, name: &str) -> Result<()> {
        self.start();
        self.enter(Route::character(realm, name, CharacterView::Character))
            .await?;

        let data = self.api.load_character(realm, name).await?;
        let profile = &data.profile;

        println!("{} - level {}", profile.name, profile.level);
        if let Some(realm) = &profile.realm {
            println!("  realm:    {}", realm.name);
        }
        if let Some(class) = &profile.character_class {
            let spec = profile.active_spec.as_ref().map(|s| s.name.as_str()).unwrap_or("-");
            println!("  class:    {} ({})", class.name, spec);
        }
        if let Some(faction) = &profile.faction {
            println!("  faction:  {}", faction.name);
        }
        if let Some(guild) = &profile.guild {
            println!("  guild:    <{}>", guild.name);
        }
        println!(
            "  item lvl: {} equipped / {} average",
            profile.equipped_item_level, profile.average_item_level
        );
        println!("  points:   {}", profile.achievement_points);
        if let Some(avatar) = data.media.asset("avatar") {
            println!("  avatar:   {}", avatar);
        }

        println!();
        for item in &data.equipment.equipped_items {
            let slot = item.slot.as_ref().map(|s| s.name.as_str()).unwrap_or("?");
            let level = item.level.as_ref().map(|l| l.value).unwrap_or(0);
            println!("  {:<12} {:>4}  {}", slot, level, item.name);
        }
        Ok(())
    }

    pub async fn achievements(
        &self,
        realm: &str,
        name: &str,
        category: Option<&str>,
        filter: AchievementFilter,
        exclude_chains: bool,
    ) -> Result<()> {
        let view = match category {
            Some(slug) => CharacterView::AchievementCategory(slug.to_string()),
            None => CharacterView::Achievements,
        };
        self.start();
        self.enter(Route::character(realm, name, view)).await?;

        let (snapshot, profile) = tokio::try_join!(
            self.api.load_achievements(realm, name),
            self.api.character_profile(realm, name)
        )?;
        let calculator = ProgressCalculator::new(profile.faction_name());
        let catalog = &snapshot.catalog;
        let completed = &snapshot.completed;

        if let Some(slug) = category {
            let listed = calculator.achievements_in_category(
                catalog,
                completed,
                slug,
                filter,
                !exclude_chains,
            );
            if listed.is_empty() {
                println!("No achievements in '{}'", slug);
            }
            for achievement in listed {
                println!("{}", achievement_line(achievement, completed));
            }
            return Ok(());
        }

        let matching = |a: &Achievement| filter.matches(is_collected(a, completed));
        let progress = calculator.calculate_progress(catalog, completed, Some(&matching), !exclude_chains);
        let stats = calculator.summary(catalog, completed);

        println!(
            "{} ({} points, {} completions on record)",
            profile.name, snapshot.summary.total_points, completed.len()
        );
        println!("  {:<24} {}", "Progress", progress_line(&progress));
        println!("  {:<24} {}", "Overall", progress_line(&stats.overall));
        println!("  {:<24} {}", "Legacy", progress_line(&stats.legacy));
        println!("  {:<24} {}", "Feats of Strength", progress_line(&stats.feats));
        println!();
        for category in calculator.category_breakdown(catalog, completed) {
            println!(
                "  {:<24} {}  [{}]",
                category.name,
                progress_line(&category.progress),
                category.slug
            );
        }
        Ok(())
    }

    pub async fn chain(&self, realm: &str, name: &str, id: u64) -> Result<()> {
        self.start();
        self.enter(Route::character(realm, name, CharacterView::Achievements))
            .await?;

        let snapshot = self.api.load_achievements(realm, name).await?;
        let start = snapshot
            .catalog
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| ArmoryError::NotFound(format!("achievement {}", id)))?;

        let chain = build_chain(start, &snapshot.catalog)?;
        println!("{} ({} steps)", display_category(start), chain.len());
        for achievement in chain {
            let marker = if achievement.id == id { ">" } else { " " };
            println!("{}{}", marker, achievement_line(achievement, &snapshot.completed));
        }
        Ok(())
    }

    pub async fn reputations(&self, realm: &str, name: &str) -> Result<()> {
        self.start();
        self.enter(Route::character(realm, name, CharacterView::Reputations))
            .await?;

        let by_expansion = self.api.character_reputations(realm, name).await?;
        if by_expansion.is_empty() {
            println!("No reputations found");
        }
        for (expansion, reputations) in &by_expansion {
            println!("{}", expansion);
            for reputation in reputations {
                println!("  {}", reputation_line(reputation));
            }
        }
        Ok(())
    }

    /// Best Mythic+ run per dungeon for `season`, or the current season
    pub async fn instances(&self, realm: &str, name: &str, season: Option<u64>) -> Result<()> {
        self.start();
        self.enter(Route::character(realm, name, CharacterView::Instances))
            .await?;

        let season_id = match season {
            Some(id) => id,
            None => self.current_season(realm, name).await?,
        };

        let (details, affixes) = tokio::try_join!(
            self.api.season_details(realm, name, season_id),
            self.api.affixes()
        )?;

        match &details.mythic_rating {
            Some(rating) => println!("Season {}: rating {:.1}", season_id, rating.rating),
            None => println!("Season {}", season_id),
        }

        let best = details.best_run_per_dungeon();
        if best.is_empty() {
            println!("No keystone runs this season");
        }
        for run in best {
            println!("  {}", run_line(run, affixes));
        }
        Ok(())
    }

    /// Current season from the season index, else from the character's profile
    async fn current_season(&self, realm: &str, name: &str) -> Result<u64> {
        if let Some(season) = self.api.seasons().await?.current_season {
            return Ok(season.id);
        }
        tracing::debug!("Season index has no current season, asking the character profile");
        self.api
            .character_dungeons(realm, name)
            .await?
            .season
            .map(|s| s.id)
            .ok_or_else(|| ArmoryError::NotFound("current Mythic+ season".to_string()))
    }

    pub async fn collections(&self, realm: &str, name: &str, kind: CollectionKind) -> Result<()> {
        self.start();
        self.enter(Route::character(realm, name, CharacterView::Collections))
            .await?;

        let (catalog, collected) = tokio::try_join!(
            self.api.collection_catalog(kind),
            self.api.collected_items(kind, realm, name)
        )?;

        let progress = Progress::new(collected.len(), catalog.len().max(collected.len()));
        println!("{}: {}", kind.name(), progress_line(&progress));
        for item in &collected {
            println!("  {}", item.name);
        }
        Ok(())
    }
}

fn progress_line(progress: &Progress) -> String {
    format!(
        "{:>5}/{:<5} {:>5.1}%",
        progress.completed, progress.total, progress.percentage
    )
}

fn achievement_line(achievement: &Achievement, completed: &CompletedAchievementMap) -> String {
    let mark = if is_collected(achievement, completed) { "x" } else { " " };
    format!("[{}] {} ({} pts)", mark, achievement.name, achievement.points)
}

/// Affix names come from the catalog when the run only carries ids
fn run_line(run: &DungeonRun, catalog: &[Affix]) -> String {
    let affixes: Vec<&str> = run
        .keystone_affixes
        .iter()
        .map(|affix| {
            catalog
                .iter()
                .find(|known| known.id == affix.id)
                .map(|known| known.name.as_str())
                .filter(|n| !n.is_empty())
                .unwrap_or(affix.name.as_str())
        })
        .collect();

    format!(
        "{:<32} +{:<3} {:<7} {}",
        run.dungeon.name,
        run.keystone_level,
        if run.is_completed { "timed" } else { "over" },
        affixes.join(", ")
    )
}

fn reputation_line(reputation: &Reputation) -> String {
    let standing = &reputation.standing;
    let mut line = format!(
        "{:<32} {:<12} {}/{} ({:.0}%)",
        reputation.faction.name,
        standing.name,
        standing.value,
        standing.max,
        standing.percentage()
    );
    if let Some(paragon) = &reputation.paragon {
        line.push_str(&format!("  paragon {}/{}", paragon.value, paragon.max));
    }
    line
}
