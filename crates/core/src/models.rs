//! Shared data models for the character API
//!
//! Records are validated when they are deserialized: every field the backend
//! may omit is an explicit `Option` or has a documented default, so the rest
//! of the code never has to guess at the shape of a document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Category name used when the backend sends no usable category
pub const GENERAL_CATEGORY: &str = "General";

/// Some endpoints wrap each record as `{ ..., "data": { ... } }`, others send
/// the record itself. Both are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(data) => data,
        }
    }
}

// ============================================================================
// Achievements
// ============================================================================

/// Reference to a category by id and name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: u64,
    pub name: String,
}

/// Achievement category with its optional parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementCategory {
    pub id: u64,
    pub name: String,
    pub parent: Option<CategoryRef>,
}

impl AchievementCategory {
    pub fn parent_id(&self) -> Option<u64> {
        self.parent.as_ref().map(|p| p.id)
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.name.as_str())
    }
}

impl Default for AchievementCategory {
    fn default() -> Self {
        Self {
            id: 0,
            name: GENERAL_CATEGORY.to_string(),
            parent: None,
        }
    }
}

/// One achievement definition from the catalog
/// Serializes back to the catalog record shape so it reads in again unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Envelope<AchievementData>", into = "AchievementData")]
pub struct Achievement {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub points: u32,
    pub is_account_wide: bool,
    pub display_order: i32,
    pub category: AchievementCategory,
    /// Faction gate ("Alliance" / "Horde") for faction-specific variants
    pub faction_requirement: Option<String>,
    /// Follow-up achievement in the same chain
    pub next_achievement_id: Option<u64>,
    /// Completion flag carried by the catalog record itself
    pub criteria_completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AchievementData {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    is_account_wide: Option<bool>,
    #[serde(default)]
    display_order: Option<i32>,
    #[serde(default)]
    category: Option<CategoryData>,
    #[serde(default)]
    next_achievement: Option<IdRef>,
    #[serde(default)]
    requirements: Option<RequirementsData>,
    #[serde(default)]
    criteria: Option<CriteriaData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CategoryData {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_category: Option<CategoryRef>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequirementsData {
    #[serde(default)]
    faction: Option<FactionData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FactionData {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CriteriaData {
    #[serde(default)]
    is_completed: Option<bool>,
}

impl From<Envelope<AchievementData>> for Achievement {
    fn from(envelope: Envelope<AchievementData>) -> Self {
        let data = envelope.into_inner();

        let category = match data.category {
            Some(c) => AchievementCategory {
                id: c.id.unwrap_or(0),
                name: c
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| GENERAL_CATEGORY.to_string()),
                parent: c.parent_category,
            },
            None => AchievementCategory::default(),
        };

        let faction_requirement = data
            .requirements
            .and_then(|r| r.faction)
            .and_then(|f| f.name)
            .filter(|n| !n.is_empty());

        Achievement {
            id: data.id,
            name: data.name.unwrap_or_default(),
            description: data.description.unwrap_or_default(),
            points: data.points.unwrap_or(0),
            is_account_wide: data.is_account_wide.unwrap_or(false),
            display_order: data.display_order.unwrap_or(0),
            category,
            faction_requirement,
            next_achievement_id: data.next_achievement.map(|n| n.id),
            criteria_completed: data.criteria.and_then(|c| c.is_completed),
        }
    }
}

impl From<Achievement> for AchievementData {
    fn from(a: Achievement) -> Self {
        AchievementData {
            id: a.id,
            name: Some(a.name),
            description: Some(a.description),
            points: Some(a.points),
            is_account_wide: Some(a.is_account_wide),
            display_order: Some(a.display_order),
            category: Some(CategoryData {
                id: Some(a.category.id),
                name: Some(a.category.name),
                parent_category: a.category.parent,
            }),
            next_achievement: a.next_achievement_id.map(|id| IdRef { id }),
            requirements: a.faction_requirement.map(|name| RequirementsData {
                faction: Some(FactionData { name: Some(name) }),
            }),
            criteria: a.criteria_completed.map(|done| CriteriaData {
                is_completed: Some(done),
            }),
        }
    }
}

/// Character completion summary from `/character/{realm}/{name}/achievements`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterAchievementSummary {
    #[serde(default)]
    pub total_quantity: u32,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub achievements: Vec<CharacterAchievementEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterAchievementEntry {
    #[serde(alias = "achievementId")]
    pub id: u64,
    #[serde(default)]
    pub criteria: Option<EntryCriteria>,
    #[serde(default)]
    pub completed_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryCriteria {
    #[serde(default)]
    pub is_completed: bool,
}

/// Completion signal for one achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Completion time in epoch milliseconds
    Timestamp(i64),
    Flag(bool),
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        match self {
            Completion::Timestamp(ts) => *ts > 0,
            Completion::Flag(done) => *done,
        }
    }
}

/// Snapshot of a character's completed achievements, keyed by achievement id.
///
/// Built once per fetch and replaced wholesale on refetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedAchievementMap(HashMap<u64, Completion>);

impl CompletedAchievementMap {
    pub fn from_summary(summary: &CharacterAchievementSummary) -> Self {
        summary
            .achievements
            .iter()
            .map(|entry| {
                let completion = match entry.completed_timestamp {
                    Some(ts) => Completion::Timestamp(ts),
                    None => Completion::Flag(
                        entry.criteria.as_ref().map(|c| c.is_completed).unwrap_or(false),
                    ),
                };
                (entry.id, completion)
            })
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<Completion> {
        self.0.get(&id).copied()
    }

    pub fn is_complete(&self, id: u64) -> bool {
        self.get(id).map(|c| c.is_complete()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(u64, Completion)> for CompletedAchievementMap {
    fn from_iter<I: IntoIterator<Item = (u64, Completion)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Character documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

/// `{ "type": "HORDE", "name": "Horde" }` style enumerations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedName {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRef {
    pub name: String,
}

/// Character profile from `/character/{realm}/{name}/profile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    #[serde(default)]
    pub realm: Option<RealmRef>,
    #[serde(default)]
    pub faction: Option<TypedName>,
    #[serde(default)]
    pub character_class: Option<NamedRef>,
    #[serde(default)]
    pub active_spec: Option<NamedRef>,
    #[serde(default)]
    pub guild: Option<GuildRef>,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub achievement_points: u32,
    #[serde(default)]
    pub average_item_level: u32,
    #[serde(default)]
    pub equipped_item_level: u32,
}

impl CharacterProfile {
    /// Lowercased faction name, empty when the profile has none
    pub fn faction_name(&self) -> String {
        self.faction
            .as_ref()
            .map(|f| f.name.to_lowercase())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLevel {
    pub value: u32,
    #[serde(default)]
    pub display_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquippedItem {
    pub name: String,
    #[serde(default)]
    pub quality: Option<TypedName>,
    #[serde(default)]
    pub level: Option<ItemLevel>,
    #[serde(default)]
    pub item: Option<IdRef>,
    #[serde(default)]
    pub slot: Option<TypedName>,
    #[serde(rename = "iconUrl", default)]
    pub icon_url: Option<String>,
}

/// Equipment from `/character/{realm}/{name}/equipment`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterEquipment {
    #[serde(default)]
    pub equipped_items: Vec<EquippedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub key: String,
    pub value: String,
}

/// Render assets from `/character/{realm}/{name}/media`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterMedia {
    #[serde(default)]
    pub assets: Vec<MediaAsset>,
}

impl CharacterMedia {
    pub fn asset(&self, key: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Equipment, media and profile fetched together for one character
#[derive(Debug, Clone)]
pub struct CharacterData {
    pub equipment: CharacterEquipment,
    pub media: CharacterMedia,
    pub profile: CharacterProfile,
}

// ============================================================================
// Reputations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    #[serde(default)]
    pub raw: i64,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub max: i64,
    #[serde(default)]
    pub tier: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragon {
    #[serde(default)]
    pub raw: i64,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reputation {
    pub faction: NamedRef,
    pub standing: Standing,
    #[serde(default)]
    pub paragon: Option<Paragon>,
    #[serde(default)]
    pub expansion: String,
}

impl Standing {
    /// Progress through the current tier, 0 when the tier has no maximum
    pub fn percentage(&self) -> f64 {
        if self.max <= 0 {
            return 0.0;
        }
        (self.value as f64 / self.max as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Reputations grouped by expansion name
pub type ReputationsByExpansion = BTreeMap<String, Vec<Reputation>>;

// ============================================================================
// Mythic+ dungeons
// ============================================================================

/// Weekly keystone modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affix {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingColor {
    #[serde(default)]
    pub r: u8,
    #[serde(default)]
    pub g: u8,
    #[serde(default)]
    pub b: u8,
    #[serde(default)]
    pub a: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MythicRating {
    #[serde(default)]
    pub color: Option<RatingColor>,
    #[serde(default)]
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub media: Option<String>,
}

/// One keystone run. The backend mixes camelCase and snake_case names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonRun {
    /// Epoch millis
    #[serde(default, alias = "completedTimestamp")]
    pub completed_timestamp: Option<i64>,
    /// Millis
    #[serde(default)]
    pub duration: u64,
    #[serde(alias = "keystoneLevel")]
    pub keystone_level: u32,
    pub dungeon: DungeonRef,
    /// Finished within the timer
    #[serde(default, alias = "isCompleted", alias = "is_completed_within_time")]
    pub is_completed: bool,
    #[serde(default)]
    pub mythic_rating: Option<MythicRating>,
    #[serde(default)]
    pub keystone_affixes: Vec<Affix>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRef {
    pub id: u64,
}

/// Mythic+ profile from `/dungeons/{realm}/{name}`, and the per-season
/// document from `/dungeons/{realm}/{name}/season/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DungeonsResponse {
    #[serde(default)]
    pub season: Option<SeasonRef>,
    #[serde(default, alias = "bestRuns")]
    pub best_runs: Vec<DungeonRun>,
    #[serde(default, alias = "current_mythic_rating")]
    pub mythic_rating: Option<MythicRating>,
    #[serde(default)]
    pub character: Option<NamedRef>,
}

pub type SeasonDetails = DungeonsResponse;

impl DungeonsResponse {
    /// Highest keystone per dungeon, in order of first appearance. Ties keep
    /// the earlier run.
    pub fn best_run_per_dungeon(&self) -> Vec<&DungeonRun> {
        let mut best: Vec<&DungeonRun> = Vec::new();
        for run in &self.best_runs {
            match best.iter_mut().find(|b| b.dungeon.id == run.dungeon.id) {
                Some(slot) if run.keystone_level > slot.keystone_level => *slot = run,
                Some(_) => {}
                None => best.push(run),
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonSeason {
    pub id: u64,
    #[serde(default, alias = "seasonName")]
    pub season_name: String,
    #[serde(default, alias = "isCurrent")]
    pub is_current: bool,
}

/// Season index from `/dungeons/seasons`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonsResponse {
    #[serde(default)]
    pub seasons: Vec<DungeonSeason>,
    #[serde(default, alias = "currentSeason")]
    pub current_season: Option<DungeonSeason>,
}

// ============================================================================
// Collections
// ============================================================================

/// A mount, pet, toy, heirloom or transmog set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Envelope<CollectionItemData>")]
pub struct CollectionItem {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionItemData {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

impl From<Envelope<CollectionItemData>> for CollectionItem {
    fn from(envelope: Envelope<CollectionItemData>) -> Self {
        let data = envelope.into_inner();
        CollectionItem {
            id: data.id,
            name: data.name.unwrap_or_default(),
        }
    }
}

/// Character last viewed, remembered across runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCharacter {
    pub realm: String,
    pub name: String,
}
