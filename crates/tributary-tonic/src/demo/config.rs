use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use tributary_tonic::tributary::PublisherConfig;

/// Upper bound on `--interval-ms`; slower streams are not worth demoing.
const MAX_INTERVAL_MS: u64 = 60_000;

/// How the demo stream produces its values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// An async generator built with `futures::stream::unfold`.
    Generator,
    /// A timer stream mapped item by item.
    Pipeline,
    /// A publisher fed from a separate task.
    Publisher,
}

/// Command-line and environment options for the `tributary-demo` binary.
///
/// Every option falls back to an environment variable, which may also come
/// from a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tributary-demo",
    version,
    about = "Streams ticks through a tributary server stream and a tonic response"
)]
pub struct CliArgs {
    /// Which producer adapter backs the stream.
    ///
    /// Environment variable: `STREAM_MODE`
    #[arg(long, env = "STREAM_MODE", value_enum, default_value_t = Mode::Generator)]
    pub mode: Mode,

    /// Number of ticks to produce before ending the stream.
    ///
    /// Environment variable: `ITEMS`
    #[arg(long, env = "ITEMS", default_value_t = 10)]
    pub items: u64,

    /// Fail the stream after this many ticks instead of completing it.
    ///
    /// Environment variable: `FAIL_AFTER`
    #[arg(long, env = "FAIL_AFTER")]
    pub fail_after: Option<u64>,

    /// Delay between ticks, in milliseconds.
    ///
    /// Environment variable: `INTERVAL_MS`
    #[arg(long, env = "INTERVAL_MS", default_value_t = 100)]
    pub interval_ms: u64,

    /// Pending-tick bound for publisher mode. `0` disables the bound.
    ///
    /// Environment variable: `PUBLISHER_CAPACITY`
    #[arg(long, env = "PUBLISHER_CAPACITY", default_value_t = 128)]
    pub publisher_capacity: usize,

    /// Capacity of the response channel between the stream and the client.
    ///
    /// Environment variable: `RESPONSE_BUFFER`
    #[arg(long, env = "RESPONSE_BUFFER", default_value_t = 8)]
    pub response_buffer: usize,

    /// Initial flow-control credits. The demo client grants one more per
    /// tick it receives. Unlimited when unset.
    ///
    /// Environment variable: `CREDITS`
    #[arg(long, env = "CREDITS")]
    pub credits: Option<u32>,

    /// Text sent as a unary response ahead of the stream.
    ///
    /// Environment variable: `UNARY_RESPONSE`
    #[arg(long, env = "UNARY_RESPONSE")]
    pub unary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub mode: Mode,
    pub items: u64,
    pub fail_after: Option<u64>,
    pub interval: Duration,
    pub publisher: PublisherConfig,
    pub response_buffer: usize,
    pub credits: Option<u32>,
    pub unary: Option<String>,
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.items == 0 {
            bail!("ITEMS must be greater than 0");
        }

        if let Some(fail_after) = args.fail_after {
            if fail_after > args.items {
                bail!(
                    "FAIL_AFTER ({}) exceeds the number of ITEMS ({})",
                    fail_after,
                    args.items
                );
            }
        }

        if args.interval_ms > MAX_INTERVAL_MS {
            bail!(
                "INTERVAL_MS ({}) exceeds the maximum of {}",
                args.interval_ms,
                MAX_INTERVAL_MS
            );
        }

        if args.response_buffer == 0 {
            bail!("RESPONSE_BUFFER must be greater than 0");
        }

        if args.credits == Some(0) {
            bail!("CREDITS must be greater than 0; the stream would never deliver");
        }

        let publisher = match args.publisher_capacity {
            0 => PublisherConfig::unbounded(),
            n => PublisherConfig::bounded(n),
        };

        Ok(Self {
            mode: args.mode,
            items: args.items,
            fail_after: args.fail_after,
            interval: Duration::from_millis(args.interval_ms),
            publisher,
            response_buffer: args.response_buffer,
            credits: args.credits,
            unary: args.unary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<DemoConfig> {
        let args = CliArgs::try_parse_from(
            ["tributary-demo", "--items", "10", "--interval-ms", "5"]
                .iter()
                .chain(extra)
                .copied(),
        )?;
        DemoConfig::try_from(args)
    }

    #[test]
    fn publisher_capacity_zero_is_unbounded() {
        let config = parse(&["--mode", "publisher", "--publisher-capacity", "0"]).unwrap();
        assert_eq!(config.mode, Mode::Publisher);
        assert_eq!(config.publisher, PublisherConfig::unbounded());
        assert_eq!(config.interval, Duration::from_millis(5));
    }

    #[test]
    fn rejects_fail_after_beyond_items() {
        let err = parse(&["--fail-after", "11"]).unwrap_err();
        assert!(err.to_string().contains("FAIL_AFTER"));
    }

    #[test]
    fn rejects_zero_credits() {
        assert!(parse(&["--credits", "0"]).is_err());
        assert_eq!(parse(&["--credits", "3"]).unwrap().credits, Some(3));
    }

    #[test]
    fn rejects_zero_response_buffer() {
        assert!(parse(&["--response-buffer", "0"]).is_err());
    }
}
