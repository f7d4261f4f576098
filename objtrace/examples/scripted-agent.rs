//! Scripted agent for trying the collector without a managed runtime
//!
//! Plays a short application lifetime through the tracer core and streams the
//! resulting events to a collector.
//!
//! ## Usage
//!
//! ```bash
//! # In one terminal: start the collector
//! cargo run --release -- --processor summary
//!
//! # In another terminal: run the scripted agent (agent option string optional)
//! cargo run --release --example scripted-agent -- "server=127.0.0.1,port=9000"
//! ```

use std::sync::Arc;

use anyhow::Result;
use objtrace::config::{AgentOptions, ParsedOptions, USAGE};
use objtrace::dispatch::Dispatcher;
use objtrace::domain::{MethodId, ObjectRef, ThreadRef, TypeRef};
use objtrace::host::{HostEventSource, HostStep, MethodDef, ScriptedHost};
use objtrace::state::TracerState;
use objtrace::trace::Frame;

const MAIN: ThreadRef = ThreadRef(1);
const WORKER: ThreadRef = ThreadRef(2);

fn main() -> Result<()> {
    let raw = std::env::args().nth(1);
    let options = match AgentOptions::parse(raw.as_deref())? {
        ParsedOptions::Run(options) => options,
        ParsedOptions::Help => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    let host = Arc::new(ScriptedHost::new());
    host.define_method(MethodId(1), MethodDef::new("LHeapTracker;", "newobj", "HeapTracker.java", 40));
    host.define_method(MethodId(2), MethodDef::new("Lshop/Cart;", "addItem", "Cart.java", 57));
    host.define_method(MethodId(3), MethodDef::new("Lshop/Checkout;", "run", "Checkout.java", 112));
    host.define_method(MethodId(4), MethodDef::new("Lshop/Main;", "main", "Main.java", 9));
    host.define_method(MethodId(5), MethodDef::unresolved());
    host.set_stack(
        MAIN,
        vec![Frame::new(MethodId(1), 2), Frame::new(MethodId(2), 14), Frame::new(MethodId(4), 30)],
    );
    host.set_stack(
        WORKER,
        vec![
            Frame::new(MethodId(1), 2),
            Frame::new(MethodId(5), 8),
            Frame::new(MethodId(3), 61),
            Frame::new(MethodId(4), 44),
        ],
    );

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(TracerState::start(options)), Arc::clone(&host)));
    let listener: Arc<dyn HostEventSource> = dispatcher.clone();
    host.attach(&listener);

    let mut script = vec![
        HostStep::Create { thread: None, object: ObjectRef(1) },
        HostStep::Start,
        HostStep::Init,
    ];
    for i in 0..50usize {
        let thread = if i % 3 == 0 { WORKER } else { MAIN };
        script.push(HostStep::Create { thread: Some(thread), object: ObjectRef(0x1000 + i) });
        script.push(HostStep::RuntimeAllocate {
            thread: Some(thread),
            object: ObjectRef(0x9000 + i),
            type_ref: TypeRef(0x42),
            size_bytes: 32,
        });
        if i % 2 == 0 {
            script.push(HostStep::Unreachable(ObjectRef(0x1000 + i)));
        }
        if i % 10 == 9 {
            script.push(HostStep::Collect);
        }
    }
    script.push(HostStep::Shutdown);

    host.replay(&script, dispatcher.as_ref());

    let stats = dispatcher.stats().snapshot();
    println!(
        "scripted agent done: {} tagged, {} creations sent, {} deletions sent",
        stats.creations_tagged, stats.creations_sent, stats.deletions_sent
    );
    Ok(())
}
