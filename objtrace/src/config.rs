//! Agent option parsing
//!
//! The host hands the tracer a single option string at load time, e.g.
//! `server=10.0.0.5,port=9000,maxFrames=8`. Options are comma separated;
//! each is either `key=value` or a bare flag.

use std::time::Duration;

use objtrace_common::DEFAULT_MAX_FRAMES;

use crate::domain::ConfigError;

/// Default collector host.
pub const DEFAULT_SERVER: &str = "127.0.0.1";

/// Default collector port.
pub const DEFAULT_PORT: u16 = 9000;

/// Signature of the instrumentation class injected into allocation sites.
/// Frames declared by this class are never rendered.
pub const DEFAULT_TRACKER_CLASS: &str = "LHeapTracker;";

/// Largest accepted `maxFrames`. Bounds the per-allocation stack walk.
pub const MAX_FRAMES_LIMIT: usize = 1024;

/// Usage text returned for the `help` option.
pub const USAGE: &str = "\
objtrace agent options (comma separated):
    help                  Print this help
    server=<host>         Collector host or IP (default 127.0.0.1)
    port=<n>              Collector port (default 9000)
    maxFrames=<n>         Application frames captured per allocation (1-1024, default 5)
    trackerClass=<sig>    Signature of the instrumentation class (default LHeapTracker;)
    sendTimeoutMs=<n>     Abort a blocked event write after n milliseconds (default: never)";

/// Runtime configuration of the tracer core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    /// Collector host name or address
    pub server: String,
    /// Collector TCP port
    pub port: u16,
    /// Maximum application frames per trace
    pub max_frames: usize,
    /// Type signature whose frames are skipped during rendering
    pub tracker_class: String,
    /// Write timeout on the collector socket; `None` blocks indefinitely
    pub send_timeout: Option<Duration>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            max_frames: DEFAULT_MAX_FRAMES,
            tracker_class: DEFAULT_TRACKER_CLASS.to_string(),
            send_timeout: None,
        }
    }
}

/// Outcome of parsing an option string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOptions {
    /// Start the tracer with these options
    Run(AgentOptions),
    /// `help` was requested; the host should print [`USAGE`] and exit
    Help,
}

impl AgentOptions {
    /// Parse an agent option string. `None` or an empty string yields defaults.
    ///
    /// # Errors
    /// Returns an error for unknown keys, keys missing their value, and
    /// values that do not parse.
    pub fn parse(options: Option<&str>) -> Result<ParsedOptions, ConfigError> {
        let mut parsed = AgentOptions::default();

        let Some(options) = options else {
            return Ok(ParsedOptions::Run(parsed));
        };

        for token in options.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (token, None),
            };

            match key {
                "help" => return Ok(ParsedOptions::Help),
                "server" => {
                    parsed.server = require(key, value)?.to_string();
                }
                "port" => {
                    parsed.port = parse_value(key, require(key, value)?)?;
                }
                "maxFrames" => {
                    let frames: usize = parse_value(key, require(key, value)?)?;
                    if frames == 0 || frames > MAX_FRAMES_LIMIT {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: frames.to_string(),
                            reason: format!("must be between 1 and {MAX_FRAMES_LIMIT}"),
                        });
                    }
                    parsed.max_frames = frames;
                }
                "trackerClass" => {
                    parsed.tracker_class = require(key, value)?.to_string();
                }
                "sendTimeoutMs" => {
                    let millis: u64 = parse_value(key, require(key, value)?)?;
                    parsed.send_timeout = (millis > 0).then(|| Duration::from_millis(millis));
                }
                // Accepted for compatibility with older launch scripts
                "maxDump" => {
                    let _: u64 = parse_value(key, require(key, value)?)?;
                }
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
        }

        Ok(ParsedOptions::Run(parsed))
    }

    /// `host:port` of the collector.
    #[must_use]
    pub fn collector_addr(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

fn require<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingValue(key.to_string()))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(options: &str) -> AgentOptions {
        match AgentOptions::parse(Some(options)).expect("options should parse") {
            ParsedOptions::Run(opts) => opts,
            ParsedOptions::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_defaults_without_options() {
        let parsed = AgentOptions::parse(None).unwrap();
        assert_eq!(parsed, ParsedOptions::Run(AgentOptions::default()));
        assert_eq!(AgentOptions::default().collector_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_parses_all_keys() {
        let opts = run("server=10.1.2.3,port=9100,maxFrames=8,trackerClass=LTracker;,sendTimeoutMs=250");
        assert_eq!(opts.server, "10.1.2.3");
        assert_eq!(opts.port, 9100);
        assert_eq!(opts.max_frames, 8);
        assert_eq!(opts.tracker_class, "LTracker;");
        assert_eq!(opts.send_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_timeout_means_blocking() {
        assert_eq!(run("sendTimeoutMs=0").send_timeout, None);
    }

    #[test]
    fn test_help_short_circuits() {
        assert_eq!(AgentOptions::parse(Some("port=1,help,bogus")).unwrap(), ParsedOptions::Help);
    }

    #[test]
    fn test_legacy_max_dump_is_ignored() {
        assert_eq!(run("maxDump=20"), AgentOptions::default());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            AgentOptions::parse(Some("verbose=1")),
            Err(ConfigError::UnknownOption("verbose".to_string()))
        );
        assert_eq!(
            AgentOptions::parse(Some("port")),
            Err(ConfigError::MissingValue("port".to_string()))
        );
        assert!(matches!(
            AgentOptions::parse(Some("port=99999")),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AgentOptions::parse(Some("maxFrames=0")),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_max_frames_is_bounded() {
        assert_eq!(run("maxFrames=1024").max_frames, MAX_FRAMES_LIMIT);
        assert!(matches!(
            AgentOptions::parse(Some("maxFrames=1025")),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "maxFrames"
        ));
        assert!(matches!(
            AgentOptions::parse(Some("maxFrames=18446744073709551615")),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
