// Use cases layer: the lockstep session workflow and the match it drives.

pub mod error;
pub mod game_loop;
pub mod lockstep;
pub mod match_session;

pub use error::LockstepError;
pub use game_loop::{LoopResult, NetworkGameLoop};
pub use lockstep::{CoordinatorPhase, LockstepCoordinator, LockstepSettings, Role};
pub use match_session::{ActionQueue, MatchSession, MatchStage};
