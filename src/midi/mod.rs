mod mapping;
mod parser;
mod tempo;

pub use mapping::{KeyMapping, LinearMapping, ReversedMapping, SteppedMapping};
pub use parser::{Metadata, ParseError, ParseResult, parse, parse_bytes};
pub use tempo::{DEFAULT_TEMPO_US, TempoMap};
