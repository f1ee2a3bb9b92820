//! Rule table turning a finished quiz into soothing suggestions.
//!
//! Every rule matches answer labels exactly; a label that differs by a single
//! character does not trigger its rule.

use serde::{Deserialize, Serialize};

use crate::quiz::{
    DAWN, DISCOMFORT_SIGNS, NIGHT, NO, NO_CHANGE, OVER_30_MINUTES, QuizAnswers, YES,
};

pub const DEFAULT_METHODS: [&str; 2] = ["Cantar ou fazer sons suaves", "Balançar gentilmente"];
pub const DEFAULT_ENVIRONMENT: [&str; 1] = ["Manter ambiente calmo e acolhedor"];
pub const DEFAULT_HEALTH: [&str; 1] =
    ["Continue monitorando. Se o choro persistir, consulte um pediatra."];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub methods: Vec<String>,
    pub environment: Vec<String>,
    pub health: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Methods,
    Environment,
    Health,
}

struct Rule {
    applies: fn(&QuizAnswers) -> bool,
    advice: &'static [(Bucket, &'static str)],
}

fn is(value: &Option<String>, expected: &str) -> bool {
    value.as_deref() == Some(expected)
}

// Evaluated in question order; within a rule, advice is appended in listed order.
static RULES: [Rule; 9] = [
    Rule {
        applies: |a| is(&a.time_of_day, NIGHT) || is(&a.time_of_day, DAWN),
        advice: &[
            (Bucket::Methods, "Balançar suavemente em ambiente com pouca luz"),
            (Bucket::Environment, "Reduzir iluminação e criar ambiente tranquilo"),
        ],
    },
    Rule {
        applies: |a| is(&a.duration, OVER_30_MINUTES),
        advice: &[(
            Bucket::Health,
            "Choro prolongado pode indicar desconforto. Considere consultar pediatra.",
        )],
    },
    Rule {
        applies: |a| is(&a.fed_recently, NO),
        advice: &[(Bucket::Methods, "Oferecer mamadeira ou amamentação")],
    },
    Rule {
        applies: |a| is(&a.diaper_changed, NO),
        advice: &[(Bucket::Methods, "Verificar e trocar a fralda")],
    },
    Rule {
        applies: |a| is(&a.environment_comfortable, NO),
        advice: &[
            (Bucket::Environment, "Ajustar temperatura do ambiente"),
            (Bucket::Environment, "Reduzir ruídos e iluminação excessiva"),
        ],
    },
    Rule {
        applies: |a| !is(&a.recent_change, NO_CHANGE),
        advice: &[
            (
                Bucket::Methods,
                "Oferecer mais contato físico e carinho para adaptação",
            ),
            (
                Bucket::Environment,
                "Manter rotina consistente durante período de adaptação",
            ),
        ],
    },
    Rule {
        applies: |a| is(&a.physical_discomfort, DISCOMFORT_SIGNS),
        advice: &[
            (
                Bucket::Health,
                "Sinais de desconforto físico detectados. Consulte um pediatra.",
            ),
            (Bucket::Methods, "Massagem suave na barriga para aliviar cólicas"),
        ],
    },
    Rule {
        applies: |a| is(&a.sleep_habits, NO),
        advice: &[
            (Bucket::Environment, "Estabelecer rotina de sono regular"),
            (
                Bucket::Methods,
                "Criar ritual de sono (banho, música suave, ambiente escuro)",
            ),
        ],
    },
    Rule {
        applies: |a| is(&a.stranger_contact, YES),
        advice: &[(
            Bucket::Methods,
            "Oferecer colo e segurança após exposição a novidades",
        )],
    },
];

impl Suggestions {
    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<String> {
        match bucket {
            Bucket::Methods => &mut self.methods,
            Bucket::Environment => &mut self.environment,
            Bucket::Health => &mut self.health,
        }
    }

    fn fill_empty_buckets(&mut self) {
        for (bucket, defaults) in [
            (Bucket::Methods, &DEFAULT_METHODS[..]),
            (Bucket::Environment, &DEFAULT_ENVIRONMENT[..]),
            (Bucket::Health, &DEFAULT_HEALTH[..]),
        ] {
            let entries = self.bucket_mut(bucket);
            if entries.is_empty() {
                entries.extend(defaults.iter().map(|s| s.to_string()));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.methods.len() + self.environment.len() + self.health.len()
    }
}

/// Evaluate the rule table against a completed quiz.
///
/// Only meaningful for fully answered quizzes; missing answers count as not
/// matching any label.
pub fn generate(answers: &QuizAnswers) -> Suggestions {
    let mut suggestions = Suggestions::default();

    for rule in RULES.iter().filter(|rule| (rule.applies)(answers)) {
        for (bucket, text) in rule.advice {
            suggestions.bucket_mut(*bucket).push(text.to_string());
        }
    }

    suggestions.fill_empty_buckets();
    suggestions
}
