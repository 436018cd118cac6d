//! Cross-task signalling between the HTTP server task and the main loop.
//!
//! The global [`EventQueue`] has exactly one producer, the HTTP server
//! task, and one consumer, the main loop. Link and clock changes use the
//! same [`Event`] type but are detected by the main loop itself and
//! handled inline, never pushed.
//!
//! Commands with a payload travel in a separate [`CommandQueue`]; an
//! [`Event::CommandReceived`] tells the loop to drain it.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ HTTP task   │────▶│  Event Queue │────▶│  Main Loop   │
//! │             │     │  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//!        │                                    ▲      ▲
//!        └────────── CommandQueue (SPSC) ─────┘      │
//!                          WiFi poll / SNTP status ──┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

use crate::app::commands::AppCommand;

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 16;

/// Pending commands. One slot is kept free by the ring buffer.
pub const COMMAND_QUEUE_CAP: usize = 8;

/// System event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Commands ──────────────────────────────────────────
    /// A command was pushed into the command queue.
    CommandReceived = 0,

    // ── Connectivity ──────────────────────────────────────
    /// Station got an IP address.
    NetworkUp = 10,
    /// Station lost its connection.
    NetworkDown = 11,
    /// SNTP completed; wall-clock keys are now valid.
    ClockSynced = 12,
}

impl Event {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::CommandReceived),
            10 => Some(Self::NetworkUp),
            11 => Some(Self::NetworkDown),
            12 => Some(Self::ClockSynced),
            _ => None,
        }
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// One producer task writes, the main loop reads. Head and tail are
// atomics; slots are atomics too so no `static mut` is needed.

/// Fixed-capacity single-producer/single-consumer event ring.
pub struct EventQueue {
    head: AtomicU8,
    tail: AtomicU8,
    buffer: [AtomicU8; EVENT_QUEUE_CAP],
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            buffer: [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP],
        }
    }

    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

        if next_head == tail {
            return false; // Queue full, drop event.
        }

        self.buffer[head as usize].store(event as u8, Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<Event> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let raw = self.buffer[tail as usize].load(Ordering::Relaxed);
            self.tail
                .store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

            // Unknown discriminants are skipped.
            if let Some(event) = Event::from_u8(raw) {
                return Some(event);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
    }
}

static EVENTS: EventQueue = EventQueue::new();

/// Push an event into the global queue. Lock-free.
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    EVENTS.push(event)
}

/// Pop the next event from the global queue.
pub fn pop_event() -> Option<Event> {
    EVENTS.pop()
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

// ── Command queue ─────────────────────────────────────────────

/// Lock-free command channel from the HTTP task to the main loop.
pub type CommandQueue = Queue<AppCommand, COMMAND_QUEUE_CAP>;
pub type CommandSender = Producer<'static, AppCommand, COMMAND_QUEUE_CAP>;
pub type CommandReceiver = Consumer<'static, AppCommand, COMMAND_QUEUE_CAP>;

/// Create the command channel. Call once at startup; the queue lives for
/// the rest of the program.
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let queue: &'static mut CommandQueue = Box::leak(Box::new(Queue::new()));
    queue.split()
}

/// Queue a command and wake the main loop.
/// Hands the command back if the queue is full.
pub fn send_command(tx: &mut CommandSender, cmd: AppCommand) -> Result<(), AppCommand> {
    tx.enqueue(cmd)?;
    push_event(Event::CommandReceived);
    Ok(())
}
