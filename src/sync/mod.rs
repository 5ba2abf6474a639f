// ============================================================================
// Module : sync
// ============================================================================
// Coeur de synchronisation temps réel : polling des flux prix / chandelle /
// trades d'une cible, fusion dans un état observable, cooldown sur 429.
// ============================================================================

pub mod session; // SyncCore, SessionHandle, PollConfig
pub mod feed;   // Flux et machine à états par flux
mod poll;       // Timers et cycles de fetch
pub mod state;  // État fusionné d'une session

pub use session::{PollConfig, SessionHandle, SyncCore};
pub use feed::{Feed, FeedPhase, FeedPhases};
pub use state::SessionState;
