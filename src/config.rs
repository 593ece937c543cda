// World Configuration
//
// Defines the TOML configuration for a simulation run: collaborator
// endpoints, memory bounds, consolidation cadences, loop pacing and the
// initial cast of characters.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main world configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    pub consolidation: ConsolidationConfig,
    pub world: LoopConfig,
    pub server: ServerConfig,
    pub characters: Vec<CharacterSeed>,
}

/// Sampling parameters for one kind of generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: usize,
    pub stop_sequences: Vec<String>,
}

impl GenerationParams {
    pub fn new(temperature: f32, max_tokens: usize) -> Self {
        Self {
            temperature,
            max_tokens,
            stop_sequences: Vec::new(),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::new(0.8, 400)
    }
}

/// Text-generation backend (KoboldAI-compatible `/api/v1/generate`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub decision: GenerationParams,
    pub fact_extraction: GenerationParams,
    pub reflection: GenerationParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5001/api/v1/generate".to_string(),
            timeout_secs: 180,
            decision: GenerationParams::new(0.82, 450),
            fact_extraction: GenerationParams::new(0.2, 200),
            reflection: GenerationParams::new(0.7, 350),
        }
    }
}

/// Which embedding backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// fastembed model run in-process
    Local,
    /// Deterministic token hashing; no model download
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
    /// Only used by the hash provider
    pub hash_dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            show_download_progress: false,
            hash_dimensions: 384,
        }
    }
}

impl EmbeddingConfig {
    /// Output width of the configured fastembed model
    pub fn dimensions(&self) -> usize {
        match self.model.as_str() {
            "bge-base-en-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
            _ => 384,
        }
    }
}

/// Bounds on the per-character decision context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size of the shared recency window
    pub recent_events: usize,
    /// Facts retrieved per character per turn
    pub top_k: usize,
    /// Importance stamped on extracted facts
    pub fact_importance: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_events: 20,
            top_k: 10,
            fact_importance: 7.0,
        }
    }
}

/// Cadences and acceptance thresholds for memory consolidation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Fact extraction runs when `turn % fact_interval == 0`
    pub fact_interval: u64,
    /// Reflection rewrite runs when `turn % reflection_interval == 0`
    pub reflection_interval: u64,
    /// Extracted lines with fewer characters are discarded
    pub min_fact_chars: usize,
    /// Rewritten reflections must be strictly longer than this
    pub min_reflection_chars: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            fact_interval: 15,
            reflection_interval: 150,
            min_fact_chars: 15,
            min_reflection_chars: 60,
        }
    }
}

/// Turn loop pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub turn_delay_secs: u64,
    /// Stop after this many turns have been played in this process
    pub max_turns: Option<u64>,
    /// Directory with prompt template overrides
    pub prompts_dir: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            turn_delay_secs: 6,
            max_turns: None,
            prompts_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 5000).into(),
        }
    }
}

/// A character created at bootstrap if it does not exist yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSeed {
    pub name: String,
    pub personality: String,
}

impl CharacterSeed {
    pub fn new(name: impl Into<String>, personality: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            personality: personality.into(),
        }
    }

    /// Reflection a freshly created character starts with
    pub fn initial_reflection(&self) -> String {
        format!(
            "{} is a new inhabitant of the village. {}",
            self.name, self.personality
        )
    }
}

/// The village's founding residents
pub fn default_characters() -> Vec<CharacterSeed> {
    vec![
        CharacterSeed::new(
            "Alice",
            "She is a curious 24-year-old adventurer who loves exploring.",
        ),
        CharacterSeed::new(
            "Bob",
            "He is a 35-year-old grumpy but kind-hearted blacksmith.",
        ),
        CharacterSeed::new(
            "Lira",
            "She is a mysterious elven merchant who arrived recently.",
        ),
    ]
}

impl WorldConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: WorldConfig = toml::from_str(toml_str)?;
        if config.characters.is_empty() {
            config.characters = default_characters();
        }
        config.validate()?;
        Ok(config)
    }

    /// Defaults with the founding cast filled in
    pub fn with_default_characters() -> Self {
        Self {
            characters: default_characters(),
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.world.max_turns == Some(0) {
            return Err(ConfigError::ValidationError(
                "world.max_turns must be greater than 0 when set".to_string(),
            ));
        }

        if self.memory.recent_events == 0 {
            return Err(ConfigError::ValidationError(
                "memory.recent_events must be greater than 0".to_string(),
            ));
        }

        if self.memory.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "memory.top_k must be greater than 0".to_string(),
            ));
        }

        if self.consolidation.fact_interval == 0 || self.consolidation.reflection_interval == 0 {
            return Err(ConfigError::ValidationError(
                "consolidation intervals must be greater than 0".to_string(),
            ));
        }

        if self.embedding.provider == EmbeddingProvider::Hash && self.embedding.hash_dimensions == 0
        {
            return Err(ConfigError::ValidationError(
                "embedding.hash_dimensions must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for seed in &self.characters {
            if seed.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "character names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(seed.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate character name: {}",
                    seed.name
                )));
            }
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
