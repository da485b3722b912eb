pub mod accompaniment;
pub mod analyzer;
pub mod key;
pub mod types;

pub use accompaniment::{generate_accompaniment, AccompanimentParams};
pub use analyzer::{HeuristicAnalyzer, MusicAnalyzer};
pub use key::{detect_key, KeyParams};
pub use types::{AccompanimentFlags, KeyMode, KeySignature};
