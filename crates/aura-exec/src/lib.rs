pub mod contracts;
pub mod gemini;
pub mod prompt;
pub mod router;
pub mod simulated;

pub use contracts::*;
pub use gemini::*;
pub use router::*;
pub use simulated::*;
