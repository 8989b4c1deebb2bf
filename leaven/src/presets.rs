//! Built-in bread catalog plus user-authored presets.

use crate::engine::StageSequence;
use chrono::Local;
use leaven_ipc::{Preset, PresetSummary, Stage, MAX_STAGE_MINUTES};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Mixing,
    Autolyse,
    FirstRise,
    Stretch,
    Punch,
    Rest,
    Shaping,
    SecondRise,
    Retard,
    Baking,
}

impl StageKind {
    pub const ALL: [StageKind; 10] = [
        StageKind::Mixing,
        StageKind::Autolyse,
        StageKind::FirstRise,
        StageKind::Stretch,
        StageKind::Punch,
        StageKind::Rest,
        StageKind::Shaping,
        StageKind::SecondRise,
        StageKind::Retard,
        StageKind::Baking,
    ];

    pub fn from_id(id: &str) -> Option<StageKind> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            StageKind::Mixing => "mixing",
            StageKind::Autolyse => "autolyse",
            StageKind::FirstRise => "first_rise",
            StageKind::Stretch => "stretch",
            StageKind::Punch => "punch",
            StageKind::Rest => "rest",
            StageKind::Shaping => "shaping",
            StageKind::SecondRise => "second_rise",
            StageKind::Retard => "retard",
            StageKind::Baking => "baking",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StageKind::Mixing => "Mixing",
            StageKind::Autolyse => "Autolyse",
            StageKind::FirstRise => "First rise",
            StageKind::Stretch => "Stretch & fold",
            StageKind::Punch => "Punch down",
            StageKind::Rest => "Rest",
            StageKind::Shaping => "Shaping",
            StageKind::SecondRise => "Second rise",
            StageKind::Retard => "Cold retard",
            StageKind::Baking => "Baking",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            StageKind::Mixing => "🥣",
            StageKind::Autolyse => "💧",
            StageKind::FirstRise => "🌡️",
            StageKind::Stretch => "🤲",
            StageKind::Punch => "👊",
            StageKind::Rest => "😴",
            StageKind::Shaping => "✋",
            StageKind::SecondRise => "🍞",
            StageKind::Retard => "❄️",
            StageKind::Baking => "🔥",
        }
    }

    /// Stage of this kind with a recipe-specific name and note.
    fn stage(self, name: &str, description: &str, minutes: u64) -> Stage {
        Stage {
            id: self.id().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            duration_secs: minutes * 60,
            emoji: self.emoji().to_string(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PresetError {
    #[error("preset id must not be empty")]
    EmptyId,
    #[error("preset {0:?} has no name")]
    EmptyName(String),
    #[error("preset {0:?} has no stages")]
    NoStages(String),
    #[error("stage {index} of preset {preset:?} must last longer than zero minutes")]
    ZeroDuration { preset: String, index: usize },
    #[error("stage {index} of preset {preset:?} is longer than {MAX_STAGE_MINUTES} minutes")]
    TooLong { preset: String, index: usize },
    #[error("a preset with id {0:?} already exists")]
    Duplicate(String),
    #[error("preset {0:?} is built in and cannot be changed")]
    BuiltIn(String),
    #[error("no preset with id {0:?}")]
    NotFound(String),
}

pub fn total_minutes(stages: &[Stage]) -> u64 {
    stages.iter().map(|s| s.duration_secs).sum::<u64>() / 60
}

pub fn custom_preset(name: &str, stages: Vec<Stage>) -> Preset {
    Preset {
        id: format!("custom-{}", Local::now().timestamp_millis()),
        name: name.to_string(),
        description: "My own fermentation recipe".to_string(),
        emoji: "⭐".to_string(),
        stages,
        is_custom: true,
    }
}

pub fn to_sequence(preset: &Preset) -> StageSequence {
    StageSequence::new(preset.name.clone(), preset.stages.clone())
}

/// Fill blank stage names and emoji from the stage kind, where known.
fn fill_stage_defaults(stages: &mut [Stage]) {
    for stage in stages {
        let Some(kind) = StageKind::from_id(&stage.id) else {
            continue;
        };
        if stage.name.trim().is_empty() {
            stage.name = kind.label().to_string();
        }
        if stage.emoji.is_empty() {
            stage.emoji = kind.emoji().to_string();
        }
    }
}

fn validate(preset: &Preset) -> Result<(), PresetError> {
    if preset.id.trim().is_empty() {
        return Err(PresetError::EmptyId);
    }
    if preset.name.trim().is_empty() {
        return Err(PresetError::EmptyName(preset.id.clone()));
    }
    if preset.stages.is_empty() {
        return Err(PresetError::NoStages(preset.id.clone()));
    }
    if let Some(index) = preset.stages.iter().position(|s| s.duration_secs == 0) {
        return Err(PresetError::ZeroDuration {
            preset: preset.id.clone(),
            index,
        });
    }
    if let Some(index) = preset
        .stages
        .iter()
        .position(|s| s.duration_secs > MAX_STAGE_MINUTES * 60)
    {
        return Err(PresetError::TooLong {
            preset: preset.id.clone(),
            index,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PresetStore {
    builtin: Vec<Preset>,
    custom: Vec<Preset>,
}

impl PresetStore {
    pub fn new(custom: Vec<Preset>) -> Self {
        let mut store = Self {
            builtin: builtin_presets(),
            custom: Vec::new(),
        };
        for preset in custom {
            if let Err(e) = store.save(preset) {
                tracing::warn!("Skipping stored preset: {}", e);
            }
        }
        store
    }

    pub fn all(&self) -> impl Iterator<Item = &Preset> {
        self.builtin.iter().chain(self.custom.iter())
    }

    pub fn custom(&self) -> &[Preset] {
        &self.custom
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.all().find(|p| p.id == id)
    }

    pub fn first(&self) -> Option<&Preset> {
        self.builtin.first()
    }

    pub fn len(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    /// Insert a new custom preset, or replace an existing custom one.
    pub fn save(&mut self, mut preset: Preset) -> Result<(), PresetError> {
        fill_stage_defaults(&mut preset.stages);
        validate(&preset)?;
        if self.builtin.iter().any(|p| p.id == preset.id) {
            return Err(PresetError::BuiltIn(preset.id));
        }
        preset.is_custom = true;
        match self.custom.iter_mut().find(|p| p.id == preset.id) {
            Some(existing) => *existing = preset,
            None => self.custom.push(preset),
        }
        Ok(())
    }

    /// Insert only; an id clash is an error rather than an update.
    pub fn add(&mut self, preset: Preset) -> Result<(), PresetError> {
        if self.get(&preset.id).is_some() {
            return Err(PresetError::Duplicate(preset.id));
        }
        self.save(preset)
    }

    pub fn delete(&mut self, id: &str) -> Result<Preset, PresetError> {
        if self.builtin.iter().any(|p| p.id == id) {
            return Err(PresetError::BuiltIn(id.to_string()));
        }
        let pos = self
            .custom
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;
        Ok(self.custom.remove(pos))
    }

    pub fn summaries(&self, selected: &str) -> Vec<PresetSummary> {
        self.all()
            .map(|p| PresetSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                emoji: p.emoji.clone(),
                stage_count: p.stages.len(),
                total_minutes: total_minutes(&p.stages),
                is_custom: p.is_custom,
                selected: p.id == selected,
            })
            .collect()
    }
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn preset(id: &str, name: &str, description: &str, emoji: &str, stages: Vec<Stage>) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        emoji: emoji.to_string(),
        stages,
        is_custom: false,
    }
}

pub fn builtin_presets() -> Vec<Preset> {
    use StageKind::*;
    vec![
        // Everyday loaves
        preset(
            "white-bread",
            "White sandwich bread",
            "Soft, fluffy everyday loaf",
            "🍞",
            vec![
                FirstRise.stage("First rise", "Somewhere warm until doubled", 60),
                Punch.stage("Degas", "Knock back and re-round", 2),
                Rest.stage("Bench rest", "Let the dough relax", 15),
                SecondRise.stage("Second rise", "In the tin until doubled", 45),
            ],
        ),
        preset(
            "milk-bread",
            "Milk bread",
            "Moist loaf enriched with milk",
            "🥛",
            vec![
                FirstRise.stage("First rise", "Proof somewhere warm", 70),
                Punch.stage("Degas", "Knock the gas out", 2),
                Rest.stage("Bench rest", "Rest the dough", 20),
                SecondRise.stage("Second rise", "Proof in the tin", 50),
            ],
        ),
        // French breads
        preset(
            "baguette",
            "Baguette",
            "Crisp-crusted French stick",
            "🥖",
            vec![
                Autolyse.stage("Autolyse", "Flour and water only", 30),
                FirstRise.stage("First rise", "Bulk ferment at room temperature", 90),
                Rest.stage("Bench rest", "Rest after dividing", 20),
                Shaping.stage("Shaping", "Roll into baguettes", 5),
                SecondRise.stage("Second rise", "Final proof before scoring", 45),
            ],
        ),
        preset(
            "pain-de-campagne",
            "Pain de campagne",
            "French country loaf with whole wheat",
            "🫓",
            vec![
                Autolyse.stage("Autolyse", "Hydrate the flour", 45),
                FirstRise.stage("First rise", "Bulk ferment with folds", 180),
                Shaping.stage("Shaping", "Shape into a boule", 10),
                SecondRise.stage("Second rise", "Proof in the banneton", 60),
            ],
        ),
        // Naturally leavened
        preset(
            "sourdough",
            "Sourdough",
            "Wholesome loaf raised by a starter",
            "🫓",
            vec![
                Autolyse.stage("Autolyse", "Flour and water only", 60),
                FirstRise.stage("Bulk ferment", "Includes stretch & folds", 240),
                Shaping.stage("Pre-shape and shape", "Shape in two passes", 30),
                Retard.stage("Cold retard", "Overnight in the fridge", 480),
            ],
        ),
        preset(
            "sourdough-short",
            "Same-day sourdough",
            "Sourdough finished in one day",
            "⏰",
            vec![
                FirstRise.stage("Bulk ferment", "At room temperature", 300),
                Shaping.stage("Shaping", "Pre-shape, then shape", 20),
                SecondRise.stage("Second rise", "Final proof at room temperature", 90),
            ],
        ),
        // Laminated pastry
        preset(
            "croissant",
            "Croissant",
            "Buttery laminated pastry",
            "🥐",
            vec![
                FirstRise.stage("Détrempe rise", "First rise of the base dough", 60),
                Retard.stage("Chill", "Cold rest before the butter", 30),
                Rest.stage("Rest between folds", "Let the gluten relax", 30),
                Shaping.stage("Shaping", "Cut triangles and roll", 20),
                SecondRise.stage("Final proof", "Somewhere warm", 120),
            ],
        ),
        preset(
            "danish",
            "Danish",
            "Sweet Danish pastry",
            "🥮",
            vec![
                FirstRise.stage("First rise", "Proof the dough", 60),
                Retard.stage("Chill", "Ready for the butter", 60),
                Shaping.stage("Shaping", "Shape as you like", 15),
                SecondRise.stage("Final proof", "Proof before topping", 90),
            ],
        ),
        // Italian breads
        preset(
            "focaccia",
            "Focaccia",
            "Italian flatbread with olive oil",
            "🫒",
            vec![
                FirstRise.stage("First rise", "Proof in the bowl", 90),
                Rest.stage("Pan rest", "Spread in the pan and rest", 30),
                SecondRise.stage("Second rise", "Dimple and proof", 45),
            ],
        ),
        preset(
            "ciabatta",
            "Ciabatta",
            "Open-crumbed Italian loaf",
            "🥖",
            vec![
                Autolyse.stage("Autolyse", "High-hydration soak", 30),
                FirstRise.stage("Bulk ferment", "Ferment with folds", 180),
                Rest.stage("Divide and rest", "Rest after dividing", 30),
                SecondRise.stage("Second rise", "Final proof", 45),
            ],
        ),
        // Enriched breads
        preset(
            "brioche",
            "Brioche",
            "Sweet, tender French bread",
            "🧁",
            vec![
                FirstRise.stage("First rise", "Proof at room temperature", 90),
                Retard.stage("Chill", "Firm up in the fridge", 60),
                Shaping.stage("Shaping", "Shape the brioche", 10),
                SecondRise.stage("Final proof", "Proof in the mould", 60),
            ],
        ),
        preset(
            "challah",
            "Challah",
            "Traditional braided loaf",
            "🪢",
            vec![
                FirstRise.stage("First rise", "Until doubled", 90),
                Rest.stage("Divide and rest", "Rest after dividing", 15),
                Shaping.stage("Braiding", "Roll ropes and braid", 15),
                SecondRise.stage("Second rise", "Proof before the egg wash", 45),
            ],
        ),
        // Specialty
        preset(
            "pizza-dough",
            "Pizza dough",
            "Thin, crisp pizza base",
            "🍕",
            vec![
                FirstRise.stage("First rise", "Room temperature", 60),
                Rest.stage("Ball and rest", "Divide, round and rest", 30),
            ],
        ),
        preset(
            "bagel",
            "Bagel",
            "Chewy New York bagel",
            "🥯",
            vec![
                FirstRise.stage("First rise", "Proof at room temperature", 60),
                Shaping.stage("Shaping", "Form the rings", 10),
                Retard.stage("Cold retard", "Overnight in the fridge", 480),
            ],
        ),
        preset(
            "pretzel",
            "Pretzel",
            "German twisted bread",
            "🥨",
            vec![
                FirstRise.stage("First rise", "Proof at room temperature", 60),
                Rest.stage("Divide and rest", "Rest after dividing", 10),
                Shaping.stage("Shaping", "Twist into pretzels", 15),
                SecondRise.stage("Second rise", "Proof before the lye bath", 30),
            ],
        ),
    ]
}
