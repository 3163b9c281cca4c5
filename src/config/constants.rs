//! Fixed vocabularies shared by ingestion, classification and answering.

pub const DOMAINS: [&str; 8] = [
    "Functional Safety",
    "Cybersecurity",
    "ADAS",
    "Driver Monitoring",
    "Software Update",
    "Validation",
    "Passive Safety",
    "General Safety",
];

pub const GENERAL_SAFETY: &str = "General Safety";

// Passive safety tags
pub const TEST_TYPES: [&str; 5] = ["Frontal", "Side", "Pole", "Pedestrian", "Post-Crash"];
pub const METRICS: [&str; 4] = ["HIC", "Chest_Deflection", "Tibia_Index", "Intrusion"];
pub const DUMMY_TYPES: [&str; 3] = ["Hybrid-III", "WorldSID", "THOR-M"];

pub const CONFIDENCE_HIGH: f32 = 0.8;
pub const CONFIDENCE_MEDIUM: f32 = 0.6;
pub const CONFIDENCE_LOW: f32 = 0.4;

/// Questions containing any of these are answered with a refusal.
pub const REFUSE_KEYWORDS: [&str; 9] = [
    "legal interpretation",
    "legal advice",
    "approve",
    "approval",
    "certify",
    "certification",
    "guarantee",
    "warranty",
    "liability",
];

/// Regulation corpus folders created under the data directory.
pub const DATA_SUBDIRECTORIES: [&str; 7] = [
    "unece_regulations",
    "nhtsa_guidelines",
    "functional_safety_concepts",
    "validation_testing",
    "passive_safety/regulations",
    "passive_safety/ncap_protocols",
    "passive_safety/fundamentals_training",
];

pub const SUPPORTED_EMBEDDING_MODELS: [&str; 1] = ["feature-hash-v1"];
