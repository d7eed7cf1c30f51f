//! The DNA structure: a nested, versioned behavioral profile (spec §3).
//!
//! Each top-level field is a "gene" — the unit the [`crate::dna::mutator`]
//! operates on. Every sub-record derives `Default` and uses
//! `#[serde(default)]` on its container so that older or partial JSON blobs
//! read back from the store still deserialize (spec §9's "dynamic
//! JSON-shaped DNA" note).

use serde::{Deserialize, Serialize};

/// Browser/device identity signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityGene {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub timezone: String,
    pub language: String,
    pub platform: String,
    pub color_depth: u32,
    pub device_memory_gb: u32,
    pub hardware_concurrency: u32,
}

impl Default for IdentityGene {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            timezone: "America/New_York".to_string(),
            language: "en-US".to_string(),
            platform: "Win32".to_string(),
            color_depth: 24,
            device_memory_gb: 8,
            hardware_concurrency: 8,
        }
    }
}

/// Minimum and maximum bound, used for delay ranges and session durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: Copy> Range<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

/// Reading/typing/interaction timing signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingGene {
    pub reading_speed: String,
    pub typing_speed: String,
    pub click_pattern: String,
    pub scroll_pattern: String,
    /// Inter-request delay bounds, in milliseconds.
    pub delay_range_ms: Range<u64>,
}

impl Default for TimingGene {
    fn default() -> Self {
        Self {
            reading_speed: "average".to_string(),
            typing_speed: "average".to_string(),
            click_pattern: "natural".to_string(),
            scroll_pattern: "smooth".to_string(),
            delay_range_ms: Range::new(1_500, 4_000),
        }
    }
}

/// Wire-level network shape: headers, ordering, TLS and transport hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkGene {
    /// Ordered name -> value pairs. Order matches `header_order`.
    pub headers: Vec<(String, String)>,
    /// The wire order header names must be emitted in.
    pub header_order: Vec<String>,
    pub tls_fingerprint: String,
    pub http_version: String,
    pub accept_encoding: String,
    pub ja3_hash: Option<String>,
}

impl Default for NetworkGene {
    fn default() -> Self {
        let header_order = vec![
            "Accept".to_string(),
            "Accept-Language".to_string(),
            "Accept-Encoding".to_string(),
            "User-Agent".to_string(),
        ];
        let headers = vec![
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()),
        ];
        Self {
            headers,
            header_order,
            tls_fingerprint: "chrome-124".to_string(),
            http_version: "h2".to_string(),
            accept_encoding: "gzip, deflate, br".to_string(),
            ja3_hash: None,
        }
    }
}

/// Simulated-interaction signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionGene {
    pub mouse_movement_model: String,
    pub scroll_speed: String,
    pub click_precision: String,
    pub reading_time_strategy: String,
    pub tab_switching: bool,
}

impl Default for InteractionGene {
    fn default() -> Self {
        Self {
            mouse_movement_model: "bezier".to_string(),
            scroll_speed: "variable".to_string(),
            click_precision: "human".to_string(),
            reading_time_strategy: "content-proportional".to_string(),
            tab_switching: false,
        }
    }
}

/// Declared client capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesGene {
    pub javascript: bool,
    pub cookies: bool,
    pub local_storage: bool,
    pub captcha_solver: bool,
    pub altcha_solver: bool,
}

impl Default for CapabilitiesGene {
    fn default() -> Self {
        Self {
            javascript: true,
            cookies: true,
            local_storage: true,
            captcha_solver: false,
            altcha_solver: false,
        }
    }
}

/// Policy for when a session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalGene {
    pub session_duration_range_secs: Range<u64>,
    pub time_of_day_policy: String,
    pub day_of_week_policy: String,
}

impl Default for TemporalGene {
    fn default() -> Self {
        Self {
            session_duration_range_secs: Range::new(300, 1_800),
            time_of_day_policy: "any".to_string(),
            day_of_week_policy: "any".to_string(),
        }
    }
}

/// The full behavioral profile used to shape outbound requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Dna {
    pub identity: IdentityGene,
    pub timing: TimingGene,
    pub network: NetworkGene,
    pub interaction: InteractionGene,
    pub capabilities: CapabilitiesGene,
    pub temporal: TemporalGene,
}

/// The gene a mutation proposal targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gene {
    Identity,
    Timing,
    Network,
    Interaction,
    Capabilities,
}

impl Gene {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Timing => "timing",
            Self::Network => "network",
            Self::Interaction => "interaction",
            Self::Capabilities => "capabilities",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identity" => Some(Self::Identity),
            "timing" => Some(Self::Timing),
            "network" => Some(Self::Network),
            "interaction" => Some(Self::Interaction),
            "capabilities" => Some(Self::Capabilities),
            _ => None,
        }
    }
}

/// A semver-shaped version with only the operations the mutator needs
/// ("increment patch"). A full `semver` crate is unneeded machinery for a
/// single always-patch-bump operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl DnaVersion {
    pub const INITIAL: Self = Self {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn bump_patch(self) -> Self {
        Self {
            patch: self.patch + 1,
            ..self
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

impl std::fmt::Display for DnaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn version_round_trips() {
        let v = DnaVersion::INITIAL.bump_patch().bump_patch();
        let s = v.to_string();
        assert_eq!(DnaVersion::parse(&s), Some(v));
        assert_eq!(s, "1.0.2");
    }

    #[test]
    fn dna_round_trips_through_json() {
        let dna = Dna::default();
        let json = serde_json::to_string(&dna).unwrap();
        let back: Dna = serde_json::from_str(&json).unwrap();
        assert_eq!(dna, back);
    }

    #[test]
    fn partial_json_deserializes_with_defaults() {
        let back: Dna = serde_json::from_str("{}").unwrap();
        assert_eq!(back, Dna::default());
    }

    #[test]
    fn gene_label_round_trips() {
        for g in [
            Gene::Identity,
            Gene::Timing,
            Gene::Network,
            Gene::Interaction,
            Gene::Capabilities,
        ] {
            assert_eq!(Gene::parse(g.as_str()), Some(g));
        }
        assert_eq!(Gene::parse("temporal"), None);
    }

    proptest::proptest! {
        #[test]
        fn dna_with_arbitrary_identity_round_trips(
            user_agent in "[a-zA-Z0-9/.; ()]{0,64}",
            viewport_width in 1u32..4096,
            viewport_height in 1u32..4096,
        ) {
            let mut dna = Dna::default();
            dna.identity.user_agent = user_agent;
            dna.identity.viewport_width = viewport_width;
            dna.identity.viewport_height = viewport_height;
            let json = serde_json::to_string(&dna).unwrap();
            let back: Dna = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(dna, back);
        }

        #[test]
        fn dna_version_parse_display_round_trips(major in 0u32..1000, minor in 0u32..1000, patch in 0u32..1000) {
            let v = DnaVersion { major, minor, patch };
            prop_assert_eq!(DnaVersion::parse(&v.to_string()), Some(v));
        }
    }
}
