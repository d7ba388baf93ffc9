//! Core data model types for simulado.
//!
//! These are the fundamental types the entire system uses to describe an
//! exam: its configuration, its questions, and the essay and cutoff data
//! attached to a finished session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Exam session variants.
///
/// A closed enum, matched exhaustively in the batch planner and scorer so
/// adding a mode is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExamMode {
    /// Day 1: languages (with the foreign-language micro-section),
    /// humanities, and the essay.
    FullDayA,
    /// Day 2: natural sciences and mathematics.
    FullDayB,
    /// Focused training over the configured knowledge areas.
    AreaTraining,
    /// Essay only, no objective questions.
    EssayOnly,
    /// Follow-up mini exam filtered by weak topics.
    Remediation,
}

impl ExamMode {
    /// Whether sessions in this mode include an essay section.
    pub fn has_essay(&self) -> bool {
        matches!(self, ExamMode::FullDayA | ExamMode::EssayOnly)
    }

    /// Whether sessions in this mode require objective question slots.
    pub fn requires_slots(&self) -> bool {
        !matches!(self, ExamMode::EssayOnly)
    }
}

impl fmt::Display for ExamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamMode::FullDayA => write!(f, "full-day-a"),
            ExamMode::FullDayB => write!(f, "full-day-b"),
            ExamMode::AreaTraining => write!(f, "area-training"),
            ExamMode::EssayOnly => write!(f, "essay-only"),
            ExamMode::Remediation => write!(f, "remediation"),
        }
    }
}

impl FromStr for ExamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full-day-a" | "day1" => Ok(ExamMode::FullDayA),
            "full-day-b" | "day2" => Ok(ExamMode::FullDayB),
            "area-training" | "training" => Ok(ExamMode::AreaTraining),
            "essay-only" | "essay" => Ok(ExamMode::EssayOnly),
            "remediation" | "review" => Ok(ExamMode::Remediation),
            other => Err(format!("unknown exam mode: {other}")),
        }
    }
}

/// ENEM knowledge areas. `General` is the collapsed bucket used by
/// remediation sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Area {
    Languages,
    Humanities,
    NaturalSciences,
    Mathematics,
    General,
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Area::Languages => write!(f, "languages"),
            Area::Humanities => write!(f, "humanities"),
            Area::NaturalSciences => write!(f, "natural-sciences"),
            Area::Mathematics => write!(f, "mathematics"),
            Area::General => write!(f, "general"),
        }
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "languages" => Ok(Area::Languages),
            "humanities" => Ok(Area::Humanities),
            "natural-sciences" | "sciences" => Ok(Area::NaturalSciences),
            "mathematics" | "math" => Ok(Area::Mathematics),
            "general" => Ok(Area::General),
            other => Err(format!("unknown knowledge area: {other}")),
        }
    }
}

/// Foreign language chosen for the day-1 micro-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignLanguage {
    English,
    Spanish,
}

impl fmt::Display for ForeignLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignLanguage::English => write!(f, "english"),
            ForeignLanguage::Spanish => write!(f, "spanish"),
        }
    }
}

impl FromStr for ForeignLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "english" | "en" => Ok(ForeignLanguage::English),
            "spanish" | "es" => Ok(ForeignLanguage::Spanish),
            other => Err(format!("unknown foreign language: {other}")),
        }
    }
}

/// Exam configuration. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamConfig {
    pub mode: ExamMode,
    /// Course names compared against cutoff estimates at finalize, in
    /// caller order.
    #[serde(default)]
    pub target_courses: Vec<String>,
    /// Knowledge areas, in presentation order.
    #[serde(default)]
    pub areas: Vec<Area>,
    /// Hard time limit in seconds.
    pub duration_secs: u64,
    /// Fixed size of the question slot array.
    pub total_slots: usize,
    /// Foreign language for the opening micro-section of the first area.
    #[serde(default)]
    pub language: Option<ForeignLanguage>,
    /// Topic filter applied to every remediation batch. Always a
    /// normalized list, never a bare string.
    #[serde(default)]
    pub focus_topics: Vec<String>,
}

impl ExamConfig {
    /// Day-1 configuration: languages + humanities, essay included.
    pub fn full_day_a(
        total_slots: usize,
        duration_secs: u64,
        language: Option<ForeignLanguage>,
    ) -> Self {
        Self {
            mode: ExamMode::FullDayA,
            target_courses: Vec::new(),
            areas: vec![Area::Languages, Area::Humanities],
            duration_secs,
            total_slots,
            language,
            focus_topics: Vec::new(),
        }
    }

    /// Day-2 configuration: natural sciences + mathematics.
    pub fn full_day_b(total_slots: usize, duration_secs: u64) -> Self {
        Self {
            mode: ExamMode::FullDayB,
            target_courses: Vec::new(),
            areas: vec![Area::NaturalSciences, Area::Mathematics],
            duration_secs,
            total_slots,
            language: None,
            focus_topics: Vec::new(),
        }
    }

    /// Remediation configuration over a weak-topic list.
    pub fn remediation(focus_topics: Vec<String>, total_slots: usize, duration_secs: u64) -> Self {
        Self {
            mode: ExamMode::Remediation,
            target_courses: Vec::new(),
            areas: vec![Area::General],
            duration_secs,
            total_slots,
            language: None,
            focus_topics,
        }
    }

    /// Check the fatal configuration errors. A config that fails here
    /// never produces a session.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.duration_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "duration must be greater than zero".into(),
            ));
        }
        if self.mode.requires_slots() && self.total_slots == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "mode {} requires at least one question slot",
                self.mode
            )));
        }
        if self.mode == ExamMode::EssayOnly && self.total_slots != 0 {
            return Err(EngineError::InvalidConfig(
                "essay-only sessions have no question slots".into(),
            ));
        }
        if self.mode.requires_slots()
            && self.mode != ExamMode::Remediation
            && self.areas.is_empty()
        {
            return Err(EngineError::InvalidConfig(
                "at least one knowledge area is required".into(),
            ));
        }
        if self.mode == ExamMode::Remediation && self.focus_topics.is_empty() {
            return Err(EngineError::InvalidConfig(
                "remediation requires a non-empty topic filter".into(),
            ));
        }
        Ok(())
    }
}

/// A single objective question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Knowledge area this question belongs to.
    pub area: Area,
    /// Subject within the area (e.g. "chemistry").
    #[serde(default)]
    pub subject: String,
    /// Prompt text shown to the user.
    pub prompt: String,
    /// Option texts, in display order.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    /// Fine-grained topic tag used for remediation targeting.
    pub topic: String,
    /// Provenance label (e.g. "ai-generated").
    #[serde(default)]
    pub source: String,
}

/// One position in the fixed slot array: either still waiting on the
/// content generator or holding a loaded question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum QuestionSlot {
    Pending,
    Loaded { question: Question },
}

impl QuestionSlot {
    pub fn is_loaded(&self) -> bool {
        matches!(self, QuestionSlot::Loaded { .. })
    }

    pub fn question(&self) -> Option<&Question> {
        match self {
            QuestionSlot::Pending => None,
            QuestionSlot::Loaded { question } => Some(question),
        }
    }
}

/// Essay prompt delivered by the content generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayPrompt {
    /// The essay theme.
    pub theme: String,
    /// Supporting text shown alongside the theme.
    #[serde(default)]
    pub supporting_text: String,
}

/// Essay grading result on the ENEM 0–1000 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssayResult {
    /// Total score, 0–1000.
    pub total: u32,
    /// Per-competency scores, 0–200 each.
    #[serde(default)]
    pub competencies: Vec<u32>,
    /// Grader feedback text.
    #[serde(default)]
    pub feedback: String,
}

/// Historical cutoff estimate for one course, as returned by the
/// estimation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffEstimate {
    pub course: String,
    /// Estimated minimum admission score.
    pub cutoff: f64,
}

/// A cutoff estimate compared against the achieved aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffComparison {
    pub course: String,
    pub cutoff: f64,
    pub achieved: f64,
    pub admitted: bool,
}
