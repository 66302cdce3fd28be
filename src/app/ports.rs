use crate::domain::KnownMappings;
use crate::error::Result;

/// Answers yes/no questions that the engine cannot settle on its own
/// (fuzzy name matches, irreconcilable field values).
pub trait DecisionPort {
    fn decide(&mut self, prompt: &str) -> Result<bool>;
}

/// Persistence for confirmed and rejected name equivalences
pub trait MappingRepository {
    fn load(&self) -> Result<KnownMappings>;
    fn save(&self, mappings: &KnownMappings) -> Result<()>;
}

