// The seam between the lockstep coordinator and whatever it is simulating.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopResult {
    LoopAgain,
    StopLooping,
}

impl LoopResult {
    pub fn should_stop(self) -> bool {
        self == LoopResult::StopLooping
    }
}

/// A simulation driven one tick at a time by the coordinator. All calls come
/// from the simulation thread; none of them may block on the network.
pub trait NetworkGameLoop: Send {
    /// Called once before setup starts.
    fn initial_preframe_update(&mut self) {}

    /// Called repeatedly while setup is in progress. Returning `StopLooping`
    /// abandons setup cleanly.
    fn preframe_update(&mut self, _elapsed_ms: u64) -> LoopResult {
        LoopResult::LoopAgain
    }

    /// The roster is final: `me` is the local name, `others` every peer name
    /// in sorted order.
    fn setup_participants(&mut self, me: &str, others: &[String]);

    fn initial_frame_update(&mut self) -> LoopResult {
        LoopResult::LoopAgain
    }

    /// Fills `message` with this participant's bytes for the tick. Leaving it
    /// empty sends an empty frame.
    fn get_frame_message(&mut self, message: &mut Vec<u8>);

    /// Every participant's message for the tick, keyed and ordered by name.
    fn end_frame(&mut self, messages: &BTreeMap<String, Vec<u8>>, tick_ms: u64);

    /// Called at the top of each tick and while waiting for peers.
    fn frame_update(&mut self, elapsed_ms: u64) -> LoopResult;

    fn final_frame_update(&mut self, _elapsed_ms: u64) {}
}
