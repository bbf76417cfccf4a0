//! Core of the personal-website chatbot: persona grounding, the
//! tool-augmented completion loop, and the Pushover notification channel.

pub mod completion;
pub mod history;
pub mod persona;
pub mod pushover;

pub use completion::{CompletionConfig, CompletionError, Responder};
pub use completion::tools::{RegistryError, ToolDescriptor, ToolExecutor, verify_registry};
pub use history::{HistoryError, Role, Turn, validate_history};
pub use persona::{Documents, Persona, PersonaConfig, PersonaError};
pub use pushover::{PushoverConfig, PushoverError, PushoverNotifier};
