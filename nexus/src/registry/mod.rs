//! Static lookup tables: platform templates and persona voices.

pub mod personas;
pub mod templates;

pub use personas::PersonaRegistry;
pub use templates::TemplateRegistry;
