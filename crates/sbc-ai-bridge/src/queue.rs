//! Bounded outbound send queue, per spec.md §4.10: control frames (dtmf,
//! call_state) ride a priority lane that never drops; audio frames are
//! best-effort and the oldest is dropped on overflow.

use crate::frame::OutboundFrame;
use std::collections::VecDeque;

pub struct SendQueue {
    capacity: usize,
    control: VecDeque<OutboundFrame>,
    audio: VecDeque<OutboundFrame>,
    dropped_audio_count: u64,
}

impl SendQueue {
    pub fn new(capacity: usize) -> Self {
        SendQueue { capacity, control: VecDeque::new(), audio: VecDeque::new(), dropped_audio_count: 0 }
    }

    pub fn push(&mut self, frame: OutboundFrame) {
        if frame.is_control() {
            self.control.push_back(frame);
            return;
        }
        if self.audio.len() >= self.capacity {
            self.audio.pop_front();
            self.dropped_audio_count += 1;
        }
        self.audio.push_back(frame);
    }

    /// Drains the queue in priority order: every pending control frame
    /// before any audio frame.
    pub fn pop(&mut self) -> Option<OutboundFrame> {
        self.control.pop_front().or_else(|| self.audio.pop_front())
    }

    pub fn dropped_audio_count(&self) -> u64 {
        self.dropped_audio_count
    }

    pub fn len(&self) -> usize {
        self.control.len() + self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
