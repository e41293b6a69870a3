//! # Flowmodal Core Library
//!
//! Core logic for guided multi-step modal flows: an ordered sequence of
//! steps that appear one at a time, can be hidden behind a small badge with
//! a hint and a countdown, and remember their progress across reloads.
//!
//! The library is headless. A renderer (or the `flowmodal` CLI) mounts a
//! flow from an element tree, drives it by calling [`Flow::tick`] and the
//! public operations, and draws from [`Flow::render`].
//!
//! ## Architecture
//!
//! - **Flow runtime**: a coordinator, its steps and their badges exchanging
//!   typed signals through the [`Flow`]
//! - **Signal bus**: every delivered signal is observable per node
//! - **Timers**: wall-clock deadlines fired by `tick()`
//! - **Storage**: namespaced, expiring key/value state over a cascade of
//!   SQLite and in-memory tiers, plus TOML configuration
//! - **Markup**: TOML element trees mapped onto flow configuration
//!
//! ## Key Components
//!
//! - [`Flow`]: the runtime for one mounted flow
//! - [`CascadeStorage`]: persisted flow state
//! - [`Element`]: declarative flow description
//! - [`Config`]: application configuration management

pub mod bus;
pub mod clock;
pub mod convert;
pub mod error;
pub mod events;
pub mod flow;
pub mod markup;
pub mod storage;
pub mod timer;

pub use bus::{ListenerId, SignalBus, JOURNAL_CAPACITY};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use convert::{parse_duration, CountdownFormat};
pub use error::{FlowError, Result, StorageError};
pub use events::{ClickArea, Envelope, Node, Signal, SignalKind};
pub use flow::{
    BadgeConfig, BadgeView, Flow, FlowBuilder, FlowView, HintView, ModalConfig, PersistedState,
    StepConfig, StepView,
};
pub use markup::Element;
pub use storage::{
    CascadeStorage, Config, Database, FlowStorage, MemoryBackend, StorageTier,
};
pub use timer::TIMER_INTERVAL_MS;
