//! # objtrace - Object Lifecycle Tracer
//!
//! objtrace follows individual objects through a managed runtime: every
//! tracked allocation gets a bounded call stack, a gap-free identity and a
//! classification, and a compact line describing its creation (and later its
//! destruction) is streamed to a remote collector.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Managed Runtime (host)                      │
//! │  instrumented allocation sites · runtime allocations · GC       │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ HostEventSource notifications
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Tracer Core (this crate)                    │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Dispatcher  │──▶│   Identity   │──▶│    Event     │         │
//! │  │ (lifecycle)  │   │   Registry   │   │   Encoder    │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │         │                                     │                 │
//! │         ▼                                     ▼                 │
//! │  ┌──────────────┐                     ┌──────────────┐          │
//! │  │Classification│                     │  Transport   │          │
//! │  │ Symbolization│                     │ (one socket) │          │
//! │  └──────────────┘                     └──────┬───────┘          │
//! └──────────────────────────────────────────────┼──────────────────┘
//!                                                │ c_/d_ lines over TCP
//!                                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Collector (`objtrace` binary)                  │
//! │   connection tasks ──► queue ──► processor (stdout/json/...)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Tracer Core
//!
//! - [`dispatch`]: host notification entry points and the lifecycle phases
//! - [`registry`]: the monotonic identity counter
//! - [`trace`]: frames, traces, trace records, per-flavor empty traces
//! - [`classification`]: hook and phase to [`Flavor`](objtrace_common::Flavor)
//! - [`symbolization`]: host symbol lookups and frame rendering
//! - [`export`]: creation and deletion line encoding
//! - [`transport`]: the best-effort collector connection
//! - [`state`]: the process-wide context shared by all of the above
//! - [`host`]: the runtime boundary traits and a scripted fake host
//! - [`config`]: agent option string parsing
//!
//! ### Collector
//!
//! - [`collector`]: TCP line server and event processors
//! - [`analysis`]: live object accounting for the summary processor
//! - [`cli`]: command-line arguments of the collector binary
//!
//! - [`domain`]: newtypes and error enums shared by everything
//!
//! ## Wire Protocol
//!
//! ```text
//! c_<id>_<flavor>_<epochMillis>_<frame>,<frame>,...\n
//! d_<id>_<epochMillis>\n
//! ```
//!
//! A frame renders as `<type>.<method>@<offset>[<file>:<line>]`; a trace with
//! no renderable frames carries `<empty>`. Flavor codes are `U`, `BVS`, `BVI`,
//! `V` and `X`.
//!
//! ## Embedding
//!
//! ```no_run
//! use std::sync::Arc;
//! use objtrace::config::{AgentOptions, ParsedOptions};
//! use objtrace::dispatch::Dispatcher;
//! use objtrace::host::{HostEventSource, ScriptedHost};
//! use objtrace::state::TracerState;
//!
//! let ParsedOptions::Run(options) = AgentOptions::parse(Some("port=9000")).unwrap() else {
//!     return;
//! };
//! let host = Arc::new(ScriptedHost::new());
//! let dispatcher = Dispatcher::new(Arc::new(TracerState::start(options)), host);
//! dispatcher.on_lifecycle_start();
//! ```

pub mod analysis;
pub mod classification;
pub mod cli;
pub mod collector;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod export;
pub mod host;
pub mod registry;
pub mod state;
pub mod symbolization;
pub mod trace;
pub mod transport;
