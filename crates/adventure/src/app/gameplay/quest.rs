use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, info};

/// Initial value of one objective in a quest template.
///
/// `false`/`true` is a one-step objective; a counter names its own target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ObjectiveSpec {
    Flag(bool),
    Counter { current: u32, target: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Rewards {
    #[serde(default)]
    pub(crate) gold: u32,
    #[serde(default)]
    pub(crate) experience: u32,
    #[serde(default)]
    pub(crate) items: Vec<String>,
}

impl Rewards {
    pub(crate) fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.gold > 0 {
            parts.push(format!("+{} gold", self.gold));
        }
        if self.experience > 0 {
            parts.push(format!("+{} xp", self.experience));
        }
        for item in &self.items {
            parts.push(format!("+{item}"));
        }
        parts.join("  ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct QuestTemplate {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) objectives: BTreeMap<String, ObjectiveSpec>,
    #[serde(default)]
    pub(crate) rewards: Rewards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Objective {
    pub(crate) current: u32,
    pub(crate) target: u32,
    pub(crate) completed: bool,
}

impl Objective {
    fn from_spec(spec: ObjectiveSpec) -> Self {
        let (current, target) = match spec {
            ObjectiveSpec::Flag(done) => (u32::from(done), 1),
            ObjectiveSpec::Counter { current, target } => (current.min(target), target),
        };
        Self {
            current,
            target,
            completed: current >= target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressOutcome {
    Advanced { current: u32, completed: bool },
    Unchanged,
    UnknownObjective,
    QuestClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompletionOutcome {
    Rewarded(Rewards),
    AlreadyCompleted,
    ObjectivesOutstanding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Quest {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) objectives: BTreeMap<String, Objective>,
    pub(crate) rewards: Rewards,
    completed: bool,
}

pub(crate) fn grant_quest(template: &QuestTemplate) -> Quest {
    Quest {
        id: template.id.clone(),
        title: template.title.clone(),
        objectives: template
            .objectives
            .iter()
            .map(|(key, spec)| (key.clone(), Objective::from_spec(*spec)))
            .collect(),
        rewards: template.rewards.clone(),
        completed: false,
    }
}

impl Quest {
    pub(crate) fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn needs(&self, objective_key: &str) -> bool {
        !self.completed
            && self
                .objectives
                .get(objective_key)
                .is_some_and(|objective| !objective.completed)
    }

    /// Moves an objective counter by `delta`, clamped to `[0, target]`. An
    /// objective stays completed once it has reached its target.
    pub(crate) fn record_progress(&mut self, objective_key: &str, delta: i64) -> ProgressOutcome {
        if self.completed {
            debug!(quest = %self.id, objective = objective_key, "progress_on_closed_quest");
            return ProgressOutcome::QuestClosed;
        }
        let Some(objective) = self.objectives.get_mut(objective_key) else {
            debug!(quest = %self.id, objective = objective_key, "progress_unknown_objective");
            return ProgressOutcome::UnknownObjective;
        };
        let next = (i64::from(objective.current) + delta).clamp(0, i64::from(objective.target));
        let next = u32::try_from(next).unwrap_or(objective.target);
        if next == objective.current {
            return ProgressOutcome::Unchanged;
        }
        objective.current = next;
        if objective.current >= objective.target {
            objective.completed = true;
        }
        info!(
            quest = %self.id,
            objective = objective_key,
            current = objective.current,
            target = objective.target,
            "quest_progress"
        );
        ProgressOutcome::Advanced {
            current: objective.current,
            completed: objective.completed,
        }
    }

    pub(crate) fn is_fully_complete(&self) -> bool {
        self.objectives.values().all(|objective| objective.completed)
    }

    /// Flips `completed` and then applies the rewards, both inside this call.
    /// A second call is a no-op.
    pub(crate) fn complete_and_reward(&mut self, stats: &mut PlayerStats) -> CompletionOutcome {
        if self.completed {
            debug!(quest = %self.id, "quest_already_completed");
            return CompletionOutcome::AlreadyCompleted;
        }
        if !self.is_fully_complete() {
            return CompletionOutcome::ObjectivesOutstanding;
        }
        self.completed = true;
        stats.apply(&self.rewards);
        info!(
            quest = %self.id,
            title = %self.title,
            gold = self.rewards.gold,
            experience = self.rewards.experience,
            "quest_completed"
        );
        CompletionOutcome::Rewarded(self.rewards.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlayerStats {
    pub(crate) gold: u32,
    pub(crate) experience: u32,
    pub(crate) items: Vec<String>,
}

impl PlayerStats {
    fn apply(&mut self, rewards: &Rewards) {
        self.gold = self.gold.saturating_add(rewards.gold);
        self.experience = self.experience.saturating_add(rewards.experience);
        self.items.extend(rewards.items.iter().cloned());
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct QuestLog {
    quests: Vec<Quest>,
}

impl QuestLog {
    pub(crate) fn grant(&mut self, template: &QuestTemplate) -> bool {
        if self.get(&template.id).is_some() {
            debug!(quest = %template.id, "quest_already_granted");
            return false;
        }
        info!(quest = %template.id, title = %template.title, "quest_granted");
        self.quests.push(grant_quest(template));
        true
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Quest> {
        self.quests.iter().find(|quest| quest.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Quest> {
        self.quests.iter_mut().find(|quest| quest.id == id)
    }

    pub(crate) fn is_needed(&self, objective_key: &str) -> bool {
        self.quests.iter().any(|quest| quest.needs(objective_key))
    }

    pub(crate) fn record_everywhere(&mut self, objective_key: &str, delta: i64) -> usize {
        self.quests
            .iter_mut()
            .filter(|quest| !quest.is_completed() && quest.objectives.contains_key(objective_key))
            .map(|quest| quest.record_progress(objective_key, delta))
            .filter(|outcome| matches!(outcome, ProgressOutcome::Advanced { .. }))
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.quests.len()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Progress {
    pub(crate) stats: PlayerStats,
    pub(crate) quests: QuestLog,
    pub(crate) collected_items: BTreeSet<String>,
}

impl Progress {
    /// Grants (if needed), completes and rewards a single-objective quest in
    /// one step. Used by minigames whose completion is the objective.
    pub(crate) fn settle(&mut self, template: &QuestTemplate) -> CompletionOutcome {
        self.quests.grant(template);
        let Some(quest) = self.quests.get_mut(&template.id) else {
            return CompletionOutcome::ObjectivesOutstanding;
        };
        let keys: Vec<String> = quest.objectives.keys().cloned().collect();
        for key in keys {
            quest.record_progress(&key, i64::from(u32::MAX));
        }
        quest.complete_and_reward(&mut self.stats)
    }
}

pub(crate) type SharedProgress = Rc<RefCell<Progress>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetch_template() -> QuestTemplate {
        serde_json::from_value(json!({
            "id": "fetch_tools",
            "title": "Fetch the tools",
            "objectives": { "hammer": false, "nails": { "current": 0, "target": 3 } },
            "rewards": { "gold": 50, "experience": 10, "items": ["town_key"] }
        }))
        .expect("template")
    }

    #[test]
    fn granted_quest_starts_from_template_values() {
        let quest = grant_quest(&fetch_template());
        assert!(!quest.is_completed());
        assert_eq!(
            quest.objectives["hammer"],
            Objective {
                current: 0,
                target: 1,
                completed: false
            }
        );
        assert_eq!(quest.objectives["nails"].target, 3);
        assert!(!quest.is_fully_complete());
    }

    #[test]
    fn progress_is_clamped_to_target_range() {
        let mut quest = grant_quest(&fetch_template());
        assert_eq!(
            quest.record_progress("nails", -4),
            ProgressOutcome::Unchanged
        );
        assert_eq!(
            quest.record_progress("nails", 10),
            ProgressOutcome::Advanced {
                current: 3,
                completed: true
            }
        );
        assert_eq!(
            quest.record_progress("nails", -1),
            ProgressOutcome::Advanced {
                current: 2,
                completed: true
            }
        );
        assert_eq!(
            quest.record_progress("saw", 1),
            ProgressOutcome::UnknownObjective
        );
    }

    #[test]
    fn completion_requires_every_objective() {
        let mut quest = grant_quest(&fetch_template());
        let mut stats = PlayerStats::default();
        quest.record_progress("hammer", 1);
        assert_eq!(
            quest.complete_and_reward(&mut stats),
            CompletionOutcome::ObjectivesOutstanding
        );
        assert_eq!(stats, PlayerStats::default());

        quest.record_progress("nails", 3);
        assert!(quest.is_fully_complete());
        assert!(matches!(
            quest.complete_and_reward(&mut stats),
            CompletionOutcome::Rewarded(_)
        ));
        assert_eq!(stats.gold, 50);
        assert_eq!(stats.experience, 10);
        assert_eq!(stats.items, vec!["town_key".to_string()]);
    }

    #[test]
    fn reward_is_applied_exactly_once() {
        let mut quest = grant_quest(&fetch_template());
        quest.record_progress("hammer", 1);
        quest.record_progress("nails", 3);

        let mut once = PlayerStats::default();
        let mut twice = PlayerStats::default();
        let mut quest_again = quest.clone();
        quest.complete_and_reward(&mut once);
        quest_again.complete_and_reward(&mut twice);
        assert_eq!(
            quest_again.complete_and_reward(&mut twice),
            CompletionOutcome::AlreadyCompleted
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn completed_quest_is_immutable() {
        let mut quest = grant_quest(&fetch_template());
        let mut stats = PlayerStats::default();
        quest.record_progress("hammer", 1);
        quest.record_progress("nails", 3);
        quest.complete_and_reward(&mut stats);
        assert_eq!(
            quest.record_progress("nails", -3),
            ProgressOutcome::QuestClosed
        );
        assert!(quest.is_completed());
        assert!(!quest.needs("nails"));
    }

    #[test]
    fn log_grants_each_quest_once_and_records_on_open_quests() {
        let mut log = QuestLog::default();
        assert!(log.grant(&fetch_template()));
        assert!(!log.grant(&fetch_template()));
        assert_eq!(log.len(), 1);
        assert!(log.is_needed("hammer"));
        assert_eq!(log.record_everywhere("hammer", 1), 1);
        assert!(!log.is_needed("hammer"));
        assert_eq!(log.record_everywhere("saw", 1), 0);
    }

    #[test]
    fn settle_rewards_minigame_quest_once() {
        let template: QuestTemplate = serde_json::from_value(json!({
            "id": "dance_off",
            "title": "Dance-off",
            "objectives": { "danced": false },
            "rewards": { "gold": 20 }
        }))
        .expect("template");
        let mut progress = Progress::default();
        assert!(matches!(
            progress.settle(&template),
            CompletionOutcome::Rewarded(_)
        ));
        assert_eq!(
            progress.settle(&template),
            CompletionOutcome::AlreadyCompleted
        );
        assert_eq!(progress.stats.gold, 20);
    }

    #[test]
    fn reward_summary_lists_every_gain() {
        let rewards = fetch_template().rewards;
        assert_eq!(rewards.summary(), "+50 gold  +10 xp  +town_key");
    }
}
