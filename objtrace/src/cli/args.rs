//! CLI argument definitions

use clap::Parser;

use crate::collector::ProcessorKind;
use crate::config::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(
    name = "objtrace",
    about = "Collect object lifecycle events streamed by objtrace agents",
    after_help = "\
EXAMPLES:
    objtrace                                  Listen on 0.0.0.0:9000, echo events
    objtrace --processor summary --duration 60
                                              Report live objects after one minute
    objtrace --port 9100 --processor json     JSON lines on stdout"
)]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// What to do with received events
    #[arg(long, value_enum, default_value = "stdout")]
    pub processor: ProcessorKind,

    /// Lines buffered between connections and the processor
    #[arg(long, default_value = "10000")]
    pub queue: usize,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
