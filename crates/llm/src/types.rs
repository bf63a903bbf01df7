//! Provider identification.

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Ollama,
    Mock,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "ollama" => Some(Self::Ollama),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("openai"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("OpenAI"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("mock"), Some(ProviderType::Mock));
        assert_eq!(ProviderType::parse("claude"), None);
    }

    #[test]
    fn test_round_trip_name() {
        for provider in [ProviderType::OpenAI, ProviderType::Ollama, ProviderType::Mock] {
            assert_eq!(ProviderType::parse(provider.as_str()), Some(provider));
        }
    }
}
