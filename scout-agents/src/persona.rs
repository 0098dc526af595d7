//! Prompt persona management
//!
//! The agent loop and the forced-synthesis call each take their system
//! prompt from a TOML persona file. The defaults are embedded; a directory
//! of overrides can be loaded on top.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Persona id of the ReAct loop prompt
pub const AGENT_PERSONA: &str = "agent";
/// Persona id of the forced-synthesis prompt
pub const SYNTHESIS_PERSONA: &str = "synthesis";

/// A persona definition loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    pub persona: PersonaMetadata,
    pub prompt: PromptConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonaMetadata {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub system: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_format() -> String {
    "markdown".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

const EMBEDDED: &[(&str, &str)] = &[
    ("agent.toml", include_str!("../prompts/agent.toml")),
    ("synthesis.toml", include_str!("../prompts/synthesis.toml")),
];

/// Registry of loaded personas
#[derive(Debug, Default)]
pub struct PersonaRegistry {
    personas: HashMap<String, Persona>,
}

impl PersonaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the embedded personas
    pub fn load_embedded() -> Self {
        let mut registry = Self::new();
        for (name, toml_str) in EMBEDDED {
            registry.register_str(name, toml_str);
        }
        registry
    }

    /// Load embedded personas, then override them from a directory
    pub fn load_with_overrides<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let mut registry = Self::load_embedded();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)?;
                registry.register_str(&path.display().to_string(), &content);
            }
        }

        Ok(registry)
    }

    fn register_str(&mut self, source: &str, toml_str: &str) {
        match toml::from_str::<Persona>(toml_str) {
            Ok(persona) if persona.persona.enabled => self.register(persona),
            Ok(_) => {}
            Err(e) => warn!("Skipping persona {}: {}", source, e),
        }
    }

    /// Register a persona, replacing any with the same id
    pub fn register(&mut self, persona: Persona) {
        self.personas.insert(persona.persona.id.clone(), persona);
    }

    /// Get a persona by ID
    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// System prompt of a persona, empty when it isn't loaded
    pub fn system_prompt(&self, id: &str) -> &str {
        self.get(id).map(Persona::system_prompt).unwrap_or_default()
    }

    /// Count of loaded personas
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Persona {
    /// Get the system prompt
    pub fn system_prompt(&self) -> &str {
        &self.prompt.system
    }
}
