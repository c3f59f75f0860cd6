use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Provisioning,
    Wordlist,
    Enumeration,
    Parsing,
    InjectionScan,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Wordlist => "wordlist",
            Self::Enumeration => "enumeration",
            Self::Parsing => "parsing",
            Self::InjectionScan => "injection-scan",
        }
    }

    pub fn display_name(&self) -> &'static str {
        STAGES
            .iter()
            .find(|s| s.name == *self)
            .map(|s| s.display_name)
            .unwrap_or("Unknown")
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct StageDefinition {
    pub name: Stage,
    pub display_name: &'static str,
    pub description: &'static str,
}

pub static STAGES: &[StageDefinition] = &[
    StageDefinition {
        name: Stage::Provisioning,
        display_name: "Tool Provisioning",
        description: "Probe, download and install the external tools",
    },
    StageDefinition {
        name: Stage::Wordlist,
        display_name: "Wordlist Generation",
        description: "Spider the target and derive candidate words from its content",
    },
    StageDefinition {
        name: Stage::Enumeration,
        display_name: "Directory Enumeration",
        description: "Brute-force hidden paths with the wordlist",
    },
    StageDefinition {
        name: Stage::Parsing,
        display_name: "Result Extraction",
        description: "Collect discovered URLs from the enumeration report",
    },
    StageDefinition {
        name: Stage::InjectionScan,
        display_name: "Injection Scan",
        description: "Open a SQL injection scan task per discovered URL",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stage_has_a_definition() {
        for stage in [
            Stage::Provisioning,
            Stage::Wordlist,
            Stage::Enumeration,
            Stage::Parsing,
            Stage::InjectionScan,
        ] {
            assert_ne!(stage.display_name(), "Unknown");
        }
    }

    #[test]
    fn test_stage_serializes_kebab_case() {
        let json = serde_json::to_string(&Stage::InjectionScan).unwrap();
        assert_eq!(json, "\"injection-scan\"");
    }
}
