use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde wire form.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ValidationError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(SectionType {
    CoverageCriteria => "COVERAGE_CRITERIA",
    Exclusions => "EXCLUSIONS",
    Requirements => "REQUIREMENTS",
    Definitions => "DEFINITIONS",
    PriorAuthorization => "PRIOR_AUTHORIZATION",
    Limitations => "LIMITATIONS",
    AppealsProcess => "APPEALS_PROCESS",
    Other => "OTHER",
});

impl SectionType {
    pub const ALL: [SectionType; 8] = [
        SectionType::CoverageCriteria,
        SectionType::Exclusions,
        SectionType::Requirements,
        SectionType::Definitions,
        SectionType::PriorAuthorization,
        SectionType::Limitations,
        SectionType::AppealsProcess,
        SectionType::Other,
    ];
}

str_enum!(DocumentType {
    Medical => "MEDICAL",
    Pharmacy => "PHARMACY",
    Dental => "DENTAL",
    Vision => "VISION",
    Other => "OTHER",
});

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Medical,
        DocumentType::Pharmacy,
        DocumentType::Dental,
        DocumentType::Vision,
        DocumentType::Other,
    ];

    /// Lenient mapping for model output ("medical policy", "Rx", ...).
    pub fn classify(raw: &str) -> DocumentType {
        match raw.trim().to_lowercase().as_str() {
            "medical" | "medical policy" | "clinical" => DocumentType::Medical,
            "pharmacy" | "pharmacy policy" | "drug" | "rx" => DocumentType::Pharmacy,
            "dental" | "dental policy" => DocumentType::Dental,
            "vision" | "vision policy" => DocumentType::Vision,
            _ => DocumentType::Other,
        }
    }
}

str_enum!(ProcessingStatus {
    Queued => "QUEUED",
    ExtractingText => "EXTRACTING_TEXT",
    StructuringData => "STRUCTURING_DATA",
    PendingReview => "PENDING_REVIEW",
    Complete => "COMPLETE",
    Failed => "FAILED",
});
