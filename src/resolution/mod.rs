//! From an utterance to ids: fast-path parsing, selector-backed intents, and
//! name matching against catalogs.

pub mod intent;
pub mod names;
pub mod parser;

pub use intent::{parse_selector_reply, Intent, IntentResolver, IntentSource};
pub use names::{MatchPolicy, NameResolver, Resolution, MAX_CANDIDATES};
pub use parser::{DetailQuery, ParseStrategy, QueryParser};
