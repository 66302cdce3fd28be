// Infrastructure adapters implementing the application ports

pub mod decision;
pub mod mapping_store;

pub use decision::{PromptDecisionPort, RefusingDecisionPort, ScriptedDecisions, StdinDecisionPort};
pub use mapping_store::{InMemoryMappingRepository, JsonFileMappingRepository};
