//! Keyword-based topic classification.
//!
//! Each topic owns a list of lowercase trigger phrases. A message is
//! lowercased once and checked against the rules in priority order; the
//! first rule with any matching phrase wins, and `general` is returned when
//! nothing matches.

use somnia_core::types::TopicLabel;

/// A topic and the phrases that trigger it.
#[derive(Debug, Clone)]
pub struct TopicRule {
    pub label: TopicLabel,
    pub phrases: &'static [&'static str],
}

/// Ordered topic rules. Earlier rules take priority over later ones.
const RULES: &[TopicRule] = &[
    TopicRule {
        label: TopicLabel::SleepApnea,
        phrases: &[
            "apnea",
            "apnoea",
            "snore",
            "snoring",
            "cpap",
            "stop breathing",
            "stopped breathing",
            "gasping",
        ],
    },
    TopicRule {
        label: TopicLabel::Insomnia,
        phrases: &[
            "insomnia",
            "can't sleep",
            "cant sleep",
            "cannot sleep",
            "can't fall asleep",
            "trouble sleeping",
            "trouble falling asleep",
            "difficulty sleeping",
            "staying asleep",
            "lie awake",
            "lying awake",
            "sleepless",
        ],
    },
    TopicRule {
        label: TopicLabel::CircadianRhythms,
        phrases: &[
            "circadian",
            "body clock",
            "internal clock",
            "jet lag",
            "jetlag",
            "shift work",
            "night shift",
            "melatonin",
            "chronotype",
            "night owl",
            "early bird",
            "daylight",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepDisorders,
        phrases: &[
            "disorder",
            "narcolepsy",
            "restless leg",
            "sleepwalking",
            "sleep walking",
            "parasomnia",
            "night terror",
            "sleep paralysis",
            "bruxism",
            "teeth grinding",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepMedicine,
        phrases: &[
            "sleeping pill",
            "sleep aid",
            "medication",
            "prescription",
            "zolpidem",
            "benzodiazepine",
            "antihistamine",
            "cbt-i",
            "sleep specialist",
            "sleep study",
            "polysomnography",
            "doctor",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepCycles,
        phrases: &[
            "sleep cycle",
            "rem sleep",
            "non-rem",
            "deep sleep",
            "light sleep",
            "sleep stage",
            "slow-wave",
            "slow wave",
            "dream",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepDuration,
        phrases: &[
            "how many hours",
            "how much sleep",
            "hours of sleep",
            "enough sleep",
            "sleep duration",
            "oversleep",
            "sleep debt",
            "sleep deprivation",
            "sleep deprived",
            "sleep-deprived",
            "napping",
            "a nap",
            "naps",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepEnvironment,
        phrases: &[
            "bedroom",
            "mattress",
            "pillow",
            "room temperature",
            "noise",
            "blackout",
            "dark room",
            "bed partner",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepHygiene,
        phrases: &[
            "sleep hygiene",
            "bedtime routine",
            "routine",
            "caffeine",
            "coffee",
            "alcohol",
            "screen time",
            "blue light",
            "exercise",
            "wind down",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepResearch,
        phrases: &[
            "research",
            "studies",
            "scientist",
            "clinical trial",
            "evidence",
            "journal",
            "paper",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepQuality,
        phrases: &[
            "sleep quality",
            "quality of sleep",
            "poor sleep",
            "restful",
            "restless",
            "wake up tired",
            "waking up tired",
            "groggy",
            "refreshed",
            "tossing and turning",
        ],
    },
    TopicRule {
        label: TopicLabel::SleepAndHealth,
        phrases: &[
            "health",
            "weight",
            "immune",
            "heart",
            "diabetes",
            "memory",
            "mood",
            "anxiety",
            "depression",
            "stress",
            "brain",
        ],
    },
];

/// Pure text → topic classifier.
#[derive(Debug, Clone)]
pub struct TopicClassifier {
    rules: &'static [TopicRule],
}

impl Default for TopicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicClassifier {
    pub fn new() -> Self {
        Self { rules: RULES }
    }

    /// Classify a message. Total and deterministic.
    pub fn classify(&self, text: &str) -> TopicLabel {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.phrases.iter().any(|p| lowered.contains(p)))
            .map(|rule| rule.label)
            .unwrap_or(TopicLabel::General)
    }

    /// Topics the classifier can assign, in priority order, excluding the
    /// `general` fallback.
    pub fn topics(&self) -> Vec<TopicLabel> {
        self.rules.iter().map(|rule| rule.label).collect()
    }
}
