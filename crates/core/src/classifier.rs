//! Keyword classification of extracted text.
//!
//! A category scores one point per keyword that occurs anywhere in the
//! lowercased text; repeats of the same keyword do not add more. Russian is
//! tried first and English only when no Russian keyword matched.

use crate::models::{Classification, OTHER_CATEGORY, UNKNOWN_CATEGORY};

/// Category labels with their trigger keywords, in tie-break order.
pub type Taxonomy = &'static [(&'static str, &'static [&'static str])];

pub const RU_TAXONOMY: Taxonomy = &[
    (
        "наука",
        &[
            "теория",
            "гипотеза",
            "эксперимент",
            "исследование",
            "научный",
            "анализ",
            "физика",
            "химия",
            "биология",
        ],
    ),
    (
        "техника",
        &[
            "гост",
            "стандарт",
            "параметр",
            "технический",
            "спецификация",
            "протокол",
            "инженерный",
            "чертеж",
            "схема",
        ],
    ),
    (
        "юриспруденция",
        &[
            "закон",
            "статья",
            "правовой",
            "договор",
            "регулирование",
            "пункт",
            "суд",
            "судья",
            "законодательство",
        ],
    ),
    (
        "бизнес",
        &[
            "отчет",
            "финансовый",
            "рынок",
            "анализ",
            "стратегия",
            "план",
            "бизнес",
            "компания",
            "прибыль",
        ],
    ),
    (
        "медицина",
        &[
            "пациент",
            "лечение",
            "диагноз",
            "медицинский",
            "здоровье",
            "больница",
            "болезнь",
            "терапия",
        ],
    ),
    (
        "образование",
        &[
            "образование",
            "школа",
            "университет",
            "студент",
            "преподаватель",
            "курс",
            "обучение",
        ],
    ),
    (
        "технологии",
        &[
            "программное",
            "аппаратное",
            "компьютер",
            "программирование",
            "алгоритм",
            "данные",
            "цифровой",
            "интернет",
        ],
    ),
];

pub const EN_TAXONOMY: Taxonomy = &[
    (
        "science",
        &[
            "theory",
            "hypothesis",
            "experiment",
            "research",
            "study",
            "scientific",
            "physics",
            "chemistry",
            "biology",
        ],
    ),
    (
        "technical",
        &[
            "gost",
            "standard",
            "parameter",
            "technical",
            "specification",
            "protocol",
            "engineering",
            "design",
            "scheme",
        ],
    ),
    (
        "legal",
        &[
            "law",
            "article",
            "legal",
            "contract",
            "regulation",
            "clause",
            "court",
            "judge",
            "legislation",
        ],
    ),
    (
        "business",
        &[
            "report",
            "financial",
            "market",
            "analysis",
            "strategy",
            "business",
            "company",
            "profit",
            "investment",
        ],
    ),
    (
        "medical",
        &[
            "patient",
            "treatment",
            "diagnosis",
            "medical",
            "health",
            "hospital",
            "disease",
            "therapy",
            "medicine",
        ],
    ),
    (
        "education",
        &[
            "education",
            "school",
            "university",
            "student",
            "teacher",
            "course",
            "learning",
            "training",
        ],
    ),
    (
        "technology",
        &[
            "software",
            "hardware",
            "computer",
            "programming",
            "algorithm",
            "data",
            "digital",
            "internet",
        ],
    ),
];

#[derive(Debug, Clone, Copy)]
pub struct KeywordClassifier {
    primary: Taxonomy,
    fallback: Taxonomy,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(RU_TAXONOMY, EN_TAXONOMY)
    }
}

impl KeywordClassifier {
    pub fn new(primary: Taxonomy, fallback: Taxonomy) -> Self {
        Self { primary, fallback }
    }

    pub fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return Classification {
                category: UNKNOWN_CATEGORY,
                confidence: 0.0,
            };
        }

        let lowered = text.to_lowercase();
        let best = best_category(self.primary, &lowered)
            .or_else(|| best_category(self.fallback, &lowered));

        match best {
            Some((category, score)) => {
                let words = lowered.split_whitespace().count().max(1);
                let confidence = (score as f64 / words as f64 * 1000.0).clamp(0.0, 100.0);
                Classification {
                    category,
                    confidence,
                }
            }
            None => Classification {
                category: OTHER_CATEGORY,
                confidence: 0.0,
            },
        }
    }
}

pub fn classify(text: &str) -> Classification {
    KeywordClassifier::default().classify(text)
}

fn keyword_score(keywords: &[&str], lowered: &str) -> usize {
    keywords
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .count()
}

/// Highest scoring category, earliest declared wins a tie. `None` if nothing matched.
fn best_category(taxonomy: Taxonomy, lowered: &str) -> Option<(&'static str, usize)> {
    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in taxonomy {
        let score = keyword_score(keywords, lowered);
        if score == 0 {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((*category, score));
        }
    }
    best
}
