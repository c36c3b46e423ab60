//! Character-by-character reveal of a doctor reply.
//!
//! [`Reveal`] is the state machine: each [`Reveal::tick`] exposes one more
//! character of the text being revealed, and the tick that reaches the last
//! character commits the whole text to the message list and clears the
//! in-progress state. [`play`] drives it from a tokio interval.

use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick<'a> {
    /// Nothing is being revealed.
    Idle,
    /// The prefix shown so far.
    Partial(&'a str),
    /// The full text, now committed.
    Committed(&'a str),
}

struct Pending {
    text: String,
    cursor: usize,
}

#[derive(Default)]
pub struct Reveal {
    pending: Option<Pending>,
    messages: Vec<String>,
}

impl Reveal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start revealing `text`. A reveal still in flight is committed first
    /// so no reply is lost.
    pub fn begin(&mut self, text: impl Into<String>) {
        self.finish();
        self.pending = Some(Pending {
            text: text.into(),
            cursor: 0,
        });
    }

    pub fn is_revealing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn in_progress(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|pending| &pending.text[..pending.cursor])
    }

    /// Committed texts, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn tick(&mut self) -> Tick<'_> {
        let done = match self.pending.as_mut() {
            None => return Tick::Idle,
            Some(pending) => {
                if let Some(ch) = pending.text[pending.cursor..].chars().next() {
                    pending.cursor += ch.len_utf8();
                }
                pending.cursor >= pending.text.len()
            }
        };

        if done {
            return match self.finish() {
                Some(text) => Tick::Committed(text),
                None => Tick::Idle,
            };
        }

        match &self.pending {
            Some(pending) => Tick::Partial(&pending.text[..pending.cursor]),
            None => Tick::Idle,
        }
    }

    /// Skip the rest of the animation and commit immediately.
    pub fn finish(&mut self) -> Option<&str> {
        let pending = self.pending.take()?;
        self.messages.push(pending.text);
        self.messages.last().map(String::as_str)
    }
}

/// What [`play`] hands to its sink on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Partial { shown: &'a str, added: &'a str },
    Committed { text: &'a str, added: &'a str },
}

/// Reveal `text` one character per `every`, feeding each frame to `sink`.
/// Finishes after at most `chars + 1` ticks and returns the committed text.
pub async fn play<F>(text: &str, every: Duration, mut sink: F) -> String
where
    F: FnMut(Frame<'_>),
{
    if every.is_zero() {
        sink(Frame::Committed { text, added: text });
        return text.to_string();
    }

    let mut reveal = Reveal::new();
    reveal.begin(text);

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shown = 0;

    loop {
        ticker.tick().await;
        match reveal.tick() {
            Tick::Partial(prefix) => {
                sink(Frame::Partial {
                    shown: prefix,
                    added: &prefix[shown..],
                });
                shown = prefix.len();
            }
            Tick::Committed(full) => {
                sink(Frame::Committed {
                    text: full,
                    added: &full[shown..],
                });
                return full.to_string();
            }
            Tick::Idle => return String::new(),
        }
    }
}
