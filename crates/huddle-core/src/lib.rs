//! Huddle core library: streaming question/answer sessions against the
//! research agent (wire client, event decoding, session state, fallback).

pub mod ask;
pub mod citation;
pub mod client;
pub mod config;
pub mod events;
pub mod fallback;
pub mod interrupt;
pub mod logging;
pub mod session;
pub mod stream;

pub use ask::{AskError, Asker, Question};
pub use citation::Citation;
pub use config::{Config, Transport};
pub use events::{SessionUpdate, UpdateSender};
pub use session::{Session, SessionState};
