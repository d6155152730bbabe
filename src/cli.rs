use clap::{ArgEnum, Parser, Subcommand};
use thiserror::Error;

use pixy2_lib::port::{TransportSpec, DEFAULT_BAUDRATE};
use pixy2_lib::protocol::blocks::SIGMAP_ALL;

#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("invalid switch '{0}', use on/off")]
    BadSwitch(String),
}

fn parse_switch(input: &str) -> Result<bool, SwitchError> {
    match input.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => Err(SwitchError::BadSwitch(input.to_string())),
    }
}

fn parse_with_radix<T>(input: &str) -> Result<T, T::FromStrRadixErr>
where
    T: num_traits::Num,
    <T as num_traits::Num>::FromStrRadixErr: std::error::Error + Send + Sync,
{
    if input.starts_with("0x") {
        T::from_str_radix(input.trim_start_matches("0x"), 16)
    } else if input.starts_with("0b") {
        T::from_str_radix(input.trim_start_matches("0b"), 2)
    } else {
        T::from_str_radix(input, 10)
    }
}

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollTarget {
    Blocks,
    Lines,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Skip sanity checks
    #[clap(long, short)]
    pub force: bool,

    /// enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// UART device, 'auto' or 'i2c:<bus>[:<address>]'
    #[clap(long, short, default_value = "auto")]
    pub port: TransportSpec,

    /// UART baud rate
    #[clap(long, short, default_value_t = DEFAULT_BAUDRATE)]
    pub baudrate: u32,

    /// Register address used for transport reads and writes
    #[clap(long, short = 'R', default_value_t = 0, parse(try_from_str=parse_with_radix))]
    pub register: u8,

    /// Verify payload checksums
    #[clap(long, short)]
    pub checksum: bool,

    /// Use json-formatted output
    #[clap(long, short)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read hardware and firmware version
    Version,

    /// Read frame resolution
    Resolution,

    /// Switch upper and lower lamps on or off
    Lamp {
        #[clap(parse(try_from_str=parse_switch))]
        upper: bool,
        #[clap(parse(try_from_str=parse_switch))]
        lower: bool,
    },

    /// Set line tracking mode flags
    Mode {
        #[clap(parse(try_from_str=parse_with_radix))]
        flags: u8,
    },

    /// Read detected color blocks
    Blocks {
        /// Signature bitmap
        #[clap(long, short, default_value_t = SIGMAP_ALL, parse(try_from_str=parse_with_radix))]
        sigmap: u8,
        /// Maximum number of blocks to return
        #[clap(long, short, default_value_t = 10, parse(try_from_str=parse_with_radix))]
        max_blocks: u8,
    },

    /// Read line tracking features
    #[clap(visible_alias = "features")]
    Lines,

    /// Set turn angle for the next intersection
    NextTurn {
        #[clap(allow_hyphen_values = true, parse(try_from_str=parse_with_radix))]
        angle: i16,
    },

    /// Set default turn angle for intersections
    DefaultTurn {
        #[clap(allow_hyphen_values = true, parse(try_from_str=parse_with_radix))]
        angle: i16,
    },

    /// Select vector to follow in manual vector mode
    Vector {
        #[clap(parse(try_from_str=parse_with_radix))]
        index: u8,
    },

    /// Poll blocks or line features until the camera disconnects
    Poll {
        #[clap(arg_enum)]
        target: PollTarget,
        /// Number of polls, 0 to poll forever
        #[clap(long, short = 'n', default_value_t = 0)]
        count: usize,
        /// Delay between polls
        #[clap(long, short, default_value_t = 100)]
        interval_ms: u64,
        /// Signature bitmap for block polling
        #[clap(long, short, default_value_t = SIGMAP_ALL, parse(try_from_str=parse_with_radix))]
        sigmap: u8,
        /// Maximum number of blocks per poll
        #[clap(long, short, default_value_t = 10, parse(try_from_str=parse_with_radix))]
        max_blocks: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix() {
        assert_eq!(parse_with_radix::<u8>("0x54").unwrap(), 0x54);
        assert_eq!(parse_with_radix::<u8>("0b101").unwrap(), 5);
        assert_eq!(parse_with_radix::<i16>("-90").unwrap(), -90);
        assert!(parse_with_radix::<u8>("256").is_err());
    }

    #[test]
    fn switches() {
        assert!(parse_switch("ON").unwrap());
        assert!(!parse_switch("0").unwrap());
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn parse_commands() {
        let cli = Cli::try_parse_from(["pixy2-tool", "-p", "i2c:1", "next-turn", "-45"]).unwrap();
        assert_eq!(
            cli.port,
            TransportSpec::I2c {
                bus: 1,
                address: 0x54
            }
        );
        assert!(matches!(cli.command, Commands::NextTurn { angle: -45 }));

        let cli = Cli::try_parse_from(["pixy2-tool", "poll", "lines", "-n", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Poll {
                target: PollTarget::Lines,
                count: 5,
                ..
            }
        ));
    }
}
