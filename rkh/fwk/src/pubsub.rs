//! Publish/subscribe channels.
//!
//! A channel is a set of subscriber priorities. Publishing posts one
//! reference of the event to every subscriber, most urgent first, and then
//! releases the publisher's own handle.

use rkh_core::{require, Event, Priority, ReadyGroup};
use rkh_trc::TraceRecord;

use crate::framework::Framework;

impl Framework {
    pub fn subscribe(&self, channel: u8, ao: Priority) {
        self.with_channel(channel, |subs| subs.set_ready(ao));
        self.tracer().emit(TraceRecord::Subscribe {
            ao: ao.raw(),
            channel,
        });
        log::debug!("priority {} subscribed to channel {}", ao, channel);
    }

    pub fn unsubscribe(&self, channel: u8, ao: Priority) {
        self.with_channel(channel, |subs| subs.set_unready(ao));
        self.tracer().emit(TraceRecord::Unsubscribe {
            ao: ao.raw(),
            channel,
        });
        log::debug!("priority {} unsubscribed from channel {}", ao, channel);
    }

    /// Removes `ao` from every channel.
    pub fn unsubscribe_all(&self, ao: Priority) {
        self.shared.lock(|s| {
            for subs in s.channels.iter_mut() {
                subs.set_unready(ao);
            }
        });
    }

    /// Current subscribers of `channel`.
    pub fn subscribers(&self, channel: u8) -> ReadyGroup {
        self.with_channel(channel, |subs| *subs)
    }

    /// Delivers `event` to every subscriber of `channel` and returns how
    /// many received it.
    pub fn publish(&self, channel: u8, event: Event) -> usize {
        let subscribers = self.subscribers(channel);
        for prio in &subscribers {
            self.post_fifo(prio, self.reference(&event));
        }

        let count = subscribers.len();
        self.tracer().emit(TraceRecord::Publish {
            channel,
            signal: event.signal(),
            subscribers: count as u8,
        });
        self.gc(event);
        count
    }

    fn with_channel<R>(&self, channel: u8, f: impl FnOnce(&mut ReadyGroup) -> R) -> R {
        self.shared.lock(|s| {
            require!(
                (channel as usize) < s.channels.len(),
                "channel out of range"
            );
            f(&mut s.channels[channel as usize])
        })
    }
}
