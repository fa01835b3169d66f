//! Achievement deduplication and progress calculation
//!
//! The catalog carries faction-specific copies of the same milestone under
//! different ids. Everything that counts achievements goes through
//! [`ProgressCalculator::deduplicate`] first so that each logical achievement
//! is counted once, using the variant that applies to the current character.

use crate::error::{ArmoryError, Result};
use crate::models::{Achievement, CompletedAchievementMap, GENERAL_CATEGORY};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

pub const LEGACY_CATEGORY: &str = "Legacy";
pub const FEATS_CATEGORY: &str = "Feats of Strength";

/// `part / whole * 100`, or 0 when `whole` is 0
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Completion counts for a set of achievements
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            completed,
            total,
            percentage: percentage(completed, total),
        }
    }

    fn record(&mut self, collected: bool) {
        self.total += 1;
        if collected {
            self.completed += 1;
        }
        self.percentage = percentage(self.completed, self.total);
    }
}

/// Overall progress plus the two buckets kept out of it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AchievementStats {
    pub overall: Progress,
    pub legacy: Progress,
    pub feats: Progress,
}

/// Progress within one display category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryProgress {
    pub name: String,
    pub slug: String,
    #[serde(flatten)]
    pub progress: Progress,
}

/// Which bucket an achievement is counted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryBucket {
    General(String),
    Legacy,
    FeatsOfStrength,
}

impl CategoryBucket {
    pub fn name(&self) -> &str {
        match self {
            CategoryBucket::General(name) => name,
            CategoryBucket::Legacy => LEGACY_CATEGORY,
            CategoryBucket::FeatsOfStrength => FEATS_CATEGORY,
        }
    }
}

/// Collected-state filter for achievement listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AchievementFilter {
    #[default]
    All,
    Collected,
    Uncollected,
}

impl AchievementFilter {
    pub fn matches(&self, collected: bool) -> bool {
        match self {
            AchievementFilter::All => true,
            AchievementFilter::Collected => collected,
            AchievementFilter::Uncollected => !collected,
        }
    }
}

impl FromStr for AchievementFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(AchievementFilter::All),
            "collected" => Ok(AchievementFilter::Collected),
            "uncollected" => Ok(AchievementFilter::Uncollected),
            other => Err(format!("unknown filter '{}' (expected all, collected or uncollected)", other)),
        }
    }
}

/// Either completion signal marks the achievement as collected
pub fn is_collected(achievement: &Achievement, completed: &CompletedAchievementMap) -> bool {
    completed.is_complete(achievement.id) || achievement.criteria_completed == Some(true)
}

/// Achievements with the same key are variants of one logical achievement
pub fn dedup_key(achievement: &Achievement) -> String {
    let parent = achievement
        .category
        .parent_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!("{}|{}|{}", achievement.description, achievement.category.id, parent)
}

/// Bucket an achievement is counted in. Legacy and Feats of Strength match on
/// either the achievement's own category or its parent.
pub fn classify(achievement: &Achievement) -> CategoryBucket {
    let own = achievement.category.name.as_str();
    let parent = achievement.category.parent_name();

    if own == LEGACY_CATEGORY || parent == Some(LEGACY_CATEGORY) {
        return CategoryBucket::Legacy;
    }
    if own == FEATS_CATEGORY || parent == Some(FEATS_CATEGORY) {
        return CategoryBucket::FeatsOfStrength;
    }
    CategoryBucket::General(display_category(achievement).to_string())
}

/// Parent category name if present, otherwise the achievement's own category
pub fn display_category(achievement: &Achievement) -> &str {
    let own = achievement.category.name.as_str();
    if own == LEGACY_CATEGORY || own == FEATS_CATEGORY {
        return own;
    }

    match achievement.category.parent_name() {
        Some(parent) if !parent.is_empty() => parent,
        _ if !own.is_empty() => own,
        _ => GENERAL_CATEGORY,
    }
}

/// Route-friendly category identifier: "Dungeons & Raids" -> "dungeons-raids".
/// Letters outside ASCII are kept; routes percent-encode them.
pub fn category_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn slug_matches(name: &str, slug: &str) -> bool {
    category_slug(name) == slug || (slug == "feats" && name == FEATS_CATEGORY)
}

/// Walk the `next_achievement_id` links through `achievement` and return the
/// whole chain, earliest first. Fails if the links form a cycle.
pub fn build_chain<'a>(
    achievement: &'a Achievement,
    all: &'a [Achievement],
) -> Result<Vec<&'a Achievement>> {
    let by_id: HashMap<u64, &Achievement> = all.iter().map(|a| (a.id, a)).collect();

    let mut predecessor: HashMap<u64, &Achievement> = HashMap::new();
    for a in all {
        if let Some(next) = a.next_achievement_id {
            predecessor.entry(next).or_insert(a);
        }
    }

    let mut visited = HashSet::from([achievement.id]);
    let mut head = achievement;
    while let Some(&prev) = predecessor.get(&head.id) {
        if !visited.insert(prev.id) {
            return Err(ArmoryError::ChainCycle(prev.id));
        }
        head = prev;
    }

    let mut chain = vec![head];
    let mut seen = HashSet::from([head.id]);
    let mut current = head;
    while let Some(next_id) = current.next_achievement_id {
        let Some(&next) = by_id.get(&next_id) else {
            break;
        };
        if !seen.insert(next.id) {
            return Err(ArmoryError::ChainCycle(next.id));
        }
        chain.push(next);
        current = next;
    }

    Ok(chain)
}

/// Progress calculations for one character
#[derive(Debug, Clone, Default)]
pub struct ProgressCalculator {
    faction: String,
}

impl ProgressCalculator {
    /// `faction` is compared case-insensitively; pass "" when unknown
    pub fn new(faction: impl AsRef<str>) -> Self {
        Self {
            faction: faction.as_ref().to_lowercase(),
        }
    }

    pub fn faction(&self) -> &str {
        &self.faction
    }

    /// One representative per logical achievement, in order of first
    /// appearance. Within a group of variants the faction match wins, then a
    /// completed variant, then the first one.
    pub fn deduplicate<'a>(
        &self,
        achievements: &'a [Achievement],
        completed: &CompletedAchievementMap,
    ) -> Vec<&'a Achievement> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&'a Achievement>> = HashMap::new();

        for achievement in achievements {
            let key = dedup_key(achievement);
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(achievement);
        }

        let chosen: Vec<&'a Achievement> = order
            .iter()
            .filter_map(|key| groups.get(key))
            .map(|group| self.choose(group, completed))
            .collect();

        tracing::debug!(
            input = achievements.len(),
            output = chosen.len(),
            faction = %self.faction,
            "Deduplicated achievements"
        );

        chosen
    }

    fn choose<'a>(
        &self,
        group: &[&'a Achievement],
        completed: &CompletedAchievementMap,
    ) -> &'a Achievement {
        if group.len() == 1 {
            return group[0];
        }

        if !self.faction.is_empty() {
            let faction_match = group.iter().find(|a| {
                a.faction_requirement
                    .as_deref()
                    .map(|f| f.to_lowercase() == self.faction)
                    .unwrap_or(false)
            });
            if let Some(&a) = faction_match {
                return a;
            }
        }

        group
            .iter()
            .find(|a| is_collected(a, completed))
            .copied()
            .unwrap_or(group[0])
    }

    /// Completed/total over the deduplicated list, optionally filtered. With
    /// `include_chain_achievements` false only the last step of each chain is
    /// counted.
    pub fn calculate_progress(
        &self,
        achievements: &[Achievement],
        completed: &CompletedAchievementMap,
        filter: Option<&dyn Fn(&Achievement) -> bool>,
        include_chain_achievements: bool,
    ) -> Progress {
        let counted: Vec<&Achievement> = self
            .deduplicate(achievements, completed)
            .into_iter()
            .filter(|a| filter.map(|f| f(*a)).unwrap_or(true))
            .filter(|a| include_chain_achievements || a.next_achievement_id.is_none())
            .collect();

        let done = counted.iter().filter(|a| is_collected(a, completed)).count();
        Progress::new(done, counted.len())
    }

    /// Overall, Legacy and Feats of Strength progress
    pub fn summary(
        &self,
        achievements: &[Achievement],
        completed: &CompletedAchievementMap,
    ) -> AchievementStats {
        let mut stats = AchievementStats::default();

        for achievement in self.deduplicate(achievements, completed) {
            let collected = is_collected(achievement, completed);
            match classify(achievement) {
                CategoryBucket::Legacy => stats.legacy.record(collected),
                CategoryBucket::FeatsOfStrength => stats.feats.record(collected),
                CategoryBucket::General(_) => stats.overall.record(collected),
            }
        }

        stats
    }

    /// Progress per display category, Legacy and Feats of Strength excluded
    pub fn category_breakdown(
        &self,
        achievements: &[Achievement],
        completed: &CompletedAchievementMap,
    ) -> Vec<CategoryProgress> {
        let mut breakdown: Vec<CategoryProgress> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for achievement in self.deduplicate(achievements, completed) {
            let CategoryBucket::General(name) = classify(achievement) else {
                continue;
            };

            let slot = *index.entry(name.clone()).or_insert_with(|| {
                breakdown.push(CategoryProgress {
                    slug: category_slug(&name),
                    name: name.clone(),
                    progress: Progress::default(),
                });
                breakdown.len() - 1
            });
            breakdown[slot].progress.record(is_collected(achievement, completed));
        }

        breakdown
    }

    /// Deduplicated achievements of one display category, ordered for display.
    /// Chain steps are dropped the same way `calculate_progress` drops them.
    pub fn achievements_in_category<'a>(
        &self,
        achievements: &'a [Achievement],
        completed: &CompletedAchievementMap,
        slug: &str,
        filter: AchievementFilter,
        include_chain_achievements: bool,
    ) -> Vec<&'a Achievement> {
        let mut listed: Vec<&'a Achievement> = self
            .deduplicate(achievements, completed)
            .into_iter()
            .filter(|a| slug_matches(classify(a).name(), slug))
            .filter(|a| filter.matches(is_collected(a, completed)))
            .filter(|a| include_chain_achievements || a.next_achievement_id.is_none())
            .collect();

        listed.sort_by_key(|a| (a.display_order, a.id));
        listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AchievementCategory, CategoryRef, Completion};

    fn achievement(id: u64, description: &str, category_id: u64) -> Achievement {
        Achievement {
            id,
            name: format!("Achievement {}", id),
            description: description.to_string(),
            points: 10,
            is_account_wide: false,
            display_order: 0,
            category: AchievementCategory {
                id: category_id,
                name: "Quests".to_string(),
                parent: None,
            },
            faction_requirement: None,
            next_achievement_id: None,
            criteria_completed: None,
        }
    }

    fn with_faction(mut a: Achievement, faction: &str) -> Achievement {
        a.faction_requirement = Some(faction.to_string());
        a
    }

    fn with_next(mut a: Achievement, next: u64) -> Achievement {
        a.next_achievement_id = Some(next);
        a
    }

    fn in_category(mut a: Achievement, name: &str, parent: Option<(u64, &str)>) -> Achievement {
        a.category.name = name.to_string();
        a.category.parent = parent.map(|(id, name)| CategoryRef { id, name: name.to_string() });
        a
    }

    fn done(ids: &[u64]) -> CompletedAchievementMap {
        ids.iter()
            .map(|id| (*id, Completion::Timestamp(1_700_000_000_000)))
            .collect()
    }

    fn ids(list: &[&Achievement]) -> Vec<u64> {
        list.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_dedup_prefers_faction_match() {
        let all = vec![
            with_faction(achievement(1, "D", 1), "Alliance"),
            with_faction(achievement(2, "D", 1), "Horde"),
        ];
        let calc = ProgressCalculator::new("Horde");

        let chosen = calc.deduplicate(&all, &CompletedAchievementMap::default());
        assert_eq!(ids(&chosen), vec![2]);
    }

    #[test]
    fn test_dedup_faction_match_is_case_insensitive() {
        let all = vec![
            with_faction(achievement(1, "D", 1), "ALLIANCE"),
            with_faction(achievement(2, "D", 1), "HORDE"),
        ];
        let calc = ProgressCalculator::new("alliance");

        let chosen = calc.deduplicate(&all, &CompletedAchievementMap::default());
        assert_eq!(ids(&chosen), vec![1]);
    }

    #[test]
    fn test_dedup_falls_back_to_completed() {
        let all = vec![achievement(1, "D", 1), achievement(2, "D", 1)];
        let calc = ProgressCalculator::new("Horde");

        let chosen = calc.deduplicate(&all, &done(&[2]));
        assert_eq!(ids(&chosen), vec![2]);
    }

    #[test]
    fn test_dedup_unmatched_faction_falls_back_to_completed_then_first() {
        let all = vec![
            with_faction(achievement(1, "D", 1), "Alliance"),
            with_faction(achievement(2, "D", 1), "Alliance"),
        ];
        let calc = ProgressCalculator::new("");

        assert_eq!(ids(&calc.deduplicate(&all, &done(&[2]))), vec![2]);
        assert_eq!(ids(&calc.deduplicate(&all, &done(&[]))), vec![1]);
    }

    #[test]
    fn test_dedup_key_includes_categories() {
        let all = vec![
            achievement(1, "D", 1),
            achievement(2, "D", 2),
            in_category(achievement(3, "D", 1), "Quests", Some((9, "Parent"))),
        ];
        let calc = ProgressCalculator::default();

        let chosen = calc.deduplicate(&all, &done(&[]));
        assert_eq!(ids(&chosen), vec![1, 2, 3]);
    }

    #[test]
    fn test_dedup_keeps_chosen_attributes_intact() {
        let mut horde = with_faction(achievement(2, "D", 1), "Horde");
        horde.name = "For the Horde".to_string();
        horde.points = 25;
        let all = vec![with_faction(achievement(1, "D", 1), "Alliance"), horde.clone()];

        let chosen = ProgressCalculator::new("horde").deduplicate(&all, &done(&[]));
        assert_eq!(chosen, vec![&horde]);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let all = vec![
            with_faction(achievement(1, "D", 1), "Alliance"),
            with_faction(achievement(2, "D", 1), "Horde"),
            achievement(3, "E", 1),
            achievement(4, "E", 1),
            achievement(5, "F", 2),
        ];
        let completed = done(&[4]);
        let calc = ProgressCalculator::new("Horde");

        let once: Vec<Achievement> = calc.deduplicate(&all, &completed).into_iter().cloned().collect();
        let twice: Vec<Achievement> = calc.deduplicate(&once, &completed).into_iter().cloned().collect();

        assert_eq!(once, twice);
        assert_eq!(once.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 4, 5]);
    }

    #[test]
    fn test_is_collected_signals() {
        let mut a = achievement(1, "D", 1);
        assert!(!is_collected(&a, &done(&[])));
        assert!(is_collected(&a, &done(&[1])));

        let zero: CompletedAchievementMap = [(1, Completion::Timestamp(0))].into_iter().collect();
        assert!(!is_collected(&a, &zero));

        a.criteria_completed = Some(true);
        assert!(is_collected(&a, &zero));
    }

    #[test]
    fn test_progress_end_to_end() {
        let all = vec![
            with_faction(achievement(1, "D", 1), "Alliance"),
            with_faction(achievement(2, "D", 1), "Horde"),
        ];
        let completed: CompletedAchievementMap =
            [(2, Completion::Timestamp(1_700_000_000_000))].into_iter().collect();

        let progress = ProgressCalculator::new("Horde").calculate_progress(&all, &completed, None, true);
        assert_eq!(progress, Progress { completed: 1, total: 1, percentage: 100.0 });
    }

    #[test]
    fn test_progress_empty_is_zero() {
        let progress = ProgressCalculator::default().calculate_progress(&[], &done(&[]), None, true);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0.0);
        assert!(!progress.percentage.is_nan());
    }

    #[test]
    fn test_progress_filter_and_chains() {
        let all = vec![
            with_next(achievement(1, "A", 1), 2),
            with_next(achievement(2, "B", 1), 3),
            achievement(3, "C", 1),
            achievement(4, "D", 2),
        ];
        let completed = done(&[1, 3]);
        let calc = ProgressCalculator::default();

        let everything = calc.calculate_progress(&all, &completed, None, true);
        assert_eq!((everything.completed, everything.total), (2, 4));
        assert_eq!(everything.percentage, 50.0);

        let finals = calc.calculate_progress(&all, &completed, None, false);
        assert_eq!((finals.completed, finals.total), (1, 2));

        let only_cat_2 = |a: &Achievement| a.category.id == 2;
        let filtered = calc.calculate_progress(&all, &completed, Some(&only_cat_2), true);
        assert_eq!((filtered.completed, filtered.total), (0, 1));
    }

    #[test]
    fn test_percentage_bounds() {
        let all: Vec<Achievement> = (1..=7).map(|i| achievement(i, &format!("D{}", i), 1)).collect();
        let calc = ProgressCalculator::default();

        for completed_ids in [vec![], vec![1], vec![1, 2, 3], (1..=7).collect::<Vec<_>>()] {
            let progress = calc.calculate_progress(&all, &done(&completed_ids), None, true);
            assert!(progress.percentage >= 0.0 && progress.percentage <= 100.0);
            assert!(progress.completed <= progress.total);
        }
    }

    #[test]
    fn test_build_chain_orders_from_head() {
        let all = vec![
            with_next(achievement(1, "A", 1), 2),
            with_next(achievement(2, "B", 1), 3),
            achievement(3, "C", 1),
        ];

        let chain = build_chain(&all[1], &all).unwrap();
        assert_eq!(ids(&chain), vec![1, 2, 3]);

        let chain = build_chain(&all[2], &all).unwrap();
        assert_eq!(ids(&chain), vec![1, 2, 3]);
    }

    #[test]
    fn test_build_chain_single_and_dangling() {
        let all = vec![with_next(achievement(1, "A", 1), 42), achievement(5, "B", 1)];

        assert_eq!(ids(&build_chain(&all[0], &all).unwrap()), vec![1]);
        assert_eq!(ids(&build_chain(&all[1], &all).unwrap()), vec![5]);
    }

    #[test]
    fn test_build_chain_detects_cycle() {
        let all = vec![
            with_next(achievement(1, "A", 1), 2),
            with_next(achievement(2, "B", 1), 3),
            with_next(achievement(3, "C", 1), 1),
        ];

        let err = build_chain(&all[0], &all).unwrap_err();
        assert!(matches!(err, ArmoryError::ChainCycle(_)));

        let self_loop = vec![with_next(achievement(7, "A", 1), 7)];
        assert!(matches!(build_chain(&self_loop[0], &self_loop), Err(ArmoryError::ChainCycle(7))));
    }

    #[test]
    fn test_display_category_and_buckets() {
        let child = in_category(achievement(1, "A", 10), "Eastern Kingdoms", Some((96, "Quests")));
        assert_eq!(display_category(&child), "Quests");
        assert_eq!(classify(&child), CategoryBucket::General("Quests".to_string()));

        let top = in_category(achievement(2, "B", 11), "Dungeons & Raids", None);
        assert_eq!(display_category(&top), "Dungeons & Raids");

        let feats = in_category(achievement(3, "C", 81), FEATS_CATEGORY, None);
        assert_eq!(classify(&feats), CategoryBucket::FeatsOfStrength);

        let legacy_child = in_category(achievement(4, "D", 15), "Raids", Some((92, LEGACY_CATEGORY)));
        assert_eq!(classify(&legacy_child), CategoryBucket::Legacy);

        let blank = in_category(achievement(5, "E", 0), "", None);
        assert_eq!(display_category(&blank), GENERAL_CATEGORY);
    }

    #[test]
    fn test_summary_excludes_legacy_and_feats_from_overall() {
        let all = vec![
            in_category(achievement(1, "A", 1), "Quests", None),
            in_category(achievement(2, "B", 2), "Exploration", None),
            in_category(achievement(3, "C", 3), LEGACY_CATEGORY, None),
            in_category(achievement(4, "D", 4), FEATS_CATEGORY, None),
        ];
        let stats = ProgressCalculator::default().summary(&all, &done(&[1, 3]));

        assert_eq!(stats.overall, Progress::new(1, 2));
        assert_eq!(stats.legacy, Progress::new(1, 1));
        assert_eq!(stats.feats, Progress::new(0, 1));
    }

    #[test]
    fn test_category_breakdown() {
        let all = vec![
            in_category(achievement(1, "A", 1), "Zones", Some((96, "Quests"))),
            in_category(achievement(2, "B", 2), "Dailies", Some((96, "Quests"))),
            in_category(achievement(3, "C", 3), "Player vs. Player", None),
            in_category(achievement(4, "D", 4), FEATS_CATEGORY, None),
        ];
        let breakdown = ProgressCalculator::default().category_breakdown(&all, &done(&[2]));

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].name, "Quests");
        assert_eq!(breakdown[0].slug, "quests");
        assert_eq!(breakdown[0].progress, Progress::new(1, 2));
        assert_eq!(breakdown[1].slug, "player-vs-player");
    }

    #[test]
    fn test_achievements_in_category_filters_and_orders() {
        let mut a = in_category(achievement(1, "A", 1), "Zones", Some((96, "Quests")));
        a.display_order = 2;
        let mut b = in_category(achievement(2, "B", 1), "Zones", Some((96, "Quests")));
        b.display_order = 1;
        let c = in_category(achievement(3, "C", 5), FEATS_CATEGORY, None);
        let all = vec![a, b, c];
        let calc = ProgressCalculator::default();
        let completed = done(&[1]);

        let listed = calc.achievements_in_category(&all, &completed, "quests", AchievementFilter::All, true);
        assert_eq!(ids(&listed), vec![2, 1]);

        let listed = calc.achievements_in_category(&all, &completed, "quests", AchievementFilter::Uncollected, true);
        assert_eq!(ids(&listed), vec![2]);

        let listed = calc.achievements_in_category(&all, &completed, "feats", AchievementFilter::All, true);
        assert_eq!(ids(&listed), vec![3]);
    }

    #[test]
    fn test_category_listing_can_skip_chain_steps() {
        let mut first = in_category(achievement(1, "First", 1), "Zones", Some((96, "Quests")));
        first.next_achievement_id = Some(2);
        let last = in_category(achievement(2, "Last", 1), "Zones", Some((96, "Quests")));
        let all = vec![first, last];
        let calc = ProgressCalculator::default();
        let completed = done(&[]);

        let listed = calc.achievements_in_category(&all, &completed, "quests", AchievementFilter::All, true);
        assert_eq!(ids(&listed), vec![1, 2]);

        let listed = calc.achievements_in_category(&all, &completed, "quests", AchievementFilter::All, false);
        assert_eq!(ids(&listed), vec![2]);
    }

    #[test]
    fn test_category_slug() {
        assert_eq!(category_slug("Dungeons & Raids"), "dungeons-raids");
        assert_eq!(category_slug("  Feats of Strength "), "feats-of-strength");
        assert_eq!(category_slug("Pet Battles!"), "pet-battles");
        assert_eq!(category_slug("Île de Quel'Danas"), "île-de-quel-danas");
        assert_ne!(category_slug("Île"), category_slug("Le"));
    }

    #[test]
    fn test_filter_from_str() {
        assert_eq!("Collected".parse::<AchievementFilter>(), Ok(AchievementFilter::Collected));
        assert!("done".parse::<AchievementFilter>().is_err());
    }
}
