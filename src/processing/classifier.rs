use crate::config::constants::GENERAL_SAFETY;
use regex::Regex;
use std::sync::LazyLock;

/// 各領域關鍵字；順序即同分時的排序依據
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Passive Safety",
        &[
            "passive safety", "crash", "collision", "impact", "airbag", "seatbelt",
            "restraint", "dummy", "chest deflection", "tibia", "intrusion", "frontal",
            "side impact", "pole test", "pedestrian", "post-crash", "r94", "r137",
            "fmvss 208", "ncap", "euro ncap", "offset barrier", "deformable barrier",
            "rigid barrier", "mpdb", "worldsid", "hybrid-iii", "thor", "hic",
            "injury criteria", "occupant protection",
        ],
    ),
    (
        "Functional Safety",
        &[
            "functional safety", "iso 26262", "asil", "hara", "safety goal",
            "safety requirement", "safety concept", "safety lifecycle", "fusa",
            "safety integrity", "random failure", "systematic failure",
        ],
    ),
    (
        "Cybersecurity",
        &[
            "cybersecurity", "r155", "cyber security", "threat", "vulnerability", "attack",
            "security", "unauthorized access", "data protection",
        ],
    ),
    (
        "ADAS",
        &[
            "adas", "advanced driver assistance", "autonomous", "self-driving",
            "lane keeping", "adaptive cruise", "collision avoidance", "aeb",
        ],
    ),
    (
        "Driver Monitoring",
        &[
            "driver monitoring", "dms", "driver attention", "fatigue", "driver state",
            "driver distraction", "eye tracking",
        ],
    ),
    (
        "Software Update",
        &[
            "software update", "r156", "ota", "over the air", "firmware update",
            "software version", "update management",
        ],
    ),
    (
        "Validation",
        &[
            "validation", "testing", "test case", "verification", "test scenario",
            "test procedure", "test coverage",
        ],
    ),
];

const SYNTHESIS_KEYWORDS: &[&str] = &[
    "compare", "difference", "conflict", "synthesize", "across", "multiple", "both",
    "versus", "vs", "between", "all", "together", "combine", "integrate", "unified",
    "table", "tabular", "data", "values", "threshold",
];

const SCENARIO_KEYWORDS: &[&str] = &[
    "what if", "scenario", "situation", "case", "example", "how would", "what happens",
    "what should", "recommend", "analyze", "evaluate", "assess", "determine", "decide",
    "apply", "implement", "design", "plan", "strategy", "when", "if", "suppose",
    "imagine", "consider",
];

static CONDITIONAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"if\s+\w+\s+(happens|occurs|fails|works)",
        r"what\s+(should|would|could|might)",
        r"how\s+(should|would|could|might)",
        r"in\s+(case|situation|scenario|event)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

pub struct DomainClassifier;

impl DomainClassifier {
    /// 依關鍵字命中數排序（高到低）
    pub fn classify_domain(question: &str) -> Vec<&'static str> {
        let question = question.to_lowercase();
        let mut scored: Vec<(&'static str, usize)> = DOMAIN_KEYWORDS
            .iter()
            .filter_map(|(domain, keywords)| {
                let score = keywords.iter().filter(|k| question.contains(*k)).count();
                (score > 0).then_some((*domain, score))
            })
            .collect();

        // sort_by 為穩定排序，同分維持表格順序
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(domain, _)| domain).collect()
    }

    pub fn primary_domain(question: &str) -> &'static str {
        Self::classify_domain(question)
            .first()
            .copied()
            .unwrap_or(GENERAL_SAFETY)
    }

    pub fn needs_synthesis(question: &str) -> bool {
        let question = question.to_lowercase();
        SYNTHESIS_KEYWORDS.iter().any(|k| question.contains(k))
    }

    pub fn needs_scenario_reasoning(question: &str) -> bool {
        let question = question.to_lowercase();
        if SCENARIO_KEYWORDS.iter().any(|k| question.contains(k)) {
            return true;
        }
        CONDITIONAL_PATTERNS.iter().any(|re| re.is_match(&question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::DOMAINS;

    #[test]
    fn test_classify_ranks_by_keyword_hits() {
        let domains = DomainClassifier::classify_domain(
            "What HIC limit applies to the Hybrid-III dummy in a frontal crash, and is there an ASIL?",
        );

        assert_eq!(domains[0], "Passive Safety");
        assert!(domains.contains(&"Functional Safety"));
    }

    #[test]
    fn test_keyword_tables_cover_known_domains() {
        for (domain, _) in DOMAIN_KEYWORDS {
            assert!(DOMAINS.contains(domain), "{} is not a known domain", domain);
        }
    }

    #[test]
    fn test_primary_domain_defaults_to_general() {
        assert_eq!(DomainClassifier::primary_domain("Hello there"), "General Safety");
        assert_eq!(
            DomainClassifier::primary_domain("Explain UNECE R155 threat analysis"),
            "Cybersecurity"
        );
    }

    #[test]
    fn test_needs_synthesis() {
        assert!(DomainClassifier::needs_synthesis(
            "Compare R94 and Euro NCAP thresholds"
        ));
        assert!(!DomainClassifier::needs_synthesis("What is ASIL D?"));
    }

    #[test]
    fn test_needs_scenario_reasoning() {
        assert!(DomainClassifier::needs_scenario_reasoning(
            "What happens when the camera fails?"
        ));
        assert!(DomainClassifier::needs_scenario_reasoning(
            "How should an OEM plan OTA rollouts?"
        ));
        assert!(!DomainClassifier::needs_scenario_reasoning("Define HARA."));
    }
}
