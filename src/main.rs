mod cli;

use std::{io, process, thread, time::Duration};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use itertools::Itertools;
use json::JsonValue;
use log::{error, info, warn};

use pixy2_lib::port;
use pixy2_lib::protocol::{
    Barcode, Block, Feature, Intersection, LineFeatures, LineMode, Pixy2, Pixy2Config, Vector,
};

use cli::{Cli, Commands, PollTarget};

#[derive(Clone, Copy)]
enum OutputFormat {
    Plain,
    Json,
}

fn block_to_json(block: &Block) -> JsonValue {
    let mut obj = JsonValue::new_object();
    obj["sig"] = block.signature.into();
    obj["x"] = block.x_center.into();
    obj["y"] = block.y_center.into();
    obj["width"] = block.width.into();
    obj["height"] = block.height.into();
    obj["angle"] = block.angle.into();
    obj["index"] = block.tracking_index.into();
    obj["age"] = block.age.into();
    obj
}

fn vector_to_json(vector: &Vector) -> JsonValue {
    let mut obj = JsonValue::new_object();
    obj["x0"] = vector.x0.into();
    obj["y0"] = vector.y0.into();
    obj["x1"] = vector.x1.into();
    obj["y1"] = vector.y1.into();
    obj["index"] = vector.index.into();
    obj["flags"] = vector.flags.into();
    obj
}

fn intersection_to_json(intersection: &Intersection) -> JsonValue {
    let branches: Vec<JsonValue> = intersection
        .branches
        .iter()
        .map(|b| {
            let mut obj = JsonValue::new_object();
            obj["index"] = b.index.into();
            obj["angle"] = b.angle().into();
            obj
        })
        .collect();

    let mut obj = JsonValue::new_object();
    obj["x"] = intersection.x.into();
    obj["y"] = intersection.y.into();
    obj["branches"] = branches.into();
    obj
}

fn barcode_to_json(barcode: &Barcode) -> JsonValue {
    let mut obj = JsonValue::new_object();
    obj["x"] = barcode.x.into();
    obj["y"] = barcode.y.into();
    obj["flags"] = barcode.flags.into();
    obj["code"] = barcode.code.into();
    obj
}

fn format_blocks(count: usize, blocks: &[Block], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Plain => {
            if count == 0 {
                "0 blocks detected".to_string()
            } else {
                format!("{} blocks detected:\n{}", count, blocks.iter().join("\n"))
            }
        }
        OutputFormat::Json => json::stringify(blocks.iter().map(block_to_json).collect_vec()),
    }
}

fn format_features(features: &LineFeatures, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Plain => features.to_string(),
        OutputFormat::Json => {
            let list: Vec<JsonValue> = features
                .features()
                .iter()
                .map(|f| {
                    let (kind, mut value) = match f {
                        Feature::Vector(v) => ("vector", vector_to_json(v)),
                        Feature::Intersection(i) => ("intersection", intersection_to_json(i)),
                        Feature::Barcode(b) => ("barcode", barcode_to_json(b)),
                    };
                    value["type"] = kind.into();
                    value
                })
                .collect();

            let mut obj = JsonValue::new_object();
            obj["vectors"] = features.num_vectors().into();
            obj["intersections"] = features.num_intersections().into();
            obj["barcodes"] = features.num_barcodes().into();
            obj["anomalies"] = features.anomalies().len().into();
            obj["features"] = list.into();
            json::stringify(obj)
        }
    }
}

fn cmd_version(pixy: &mut Pixy2, fmt: OutputFormat) -> Result<String> {
    let version = pixy.get_version().context("Failed to read version")?;

    Ok(match fmt {
        OutputFormat::Plain => version.to_string(),
        OutputFormat::Json => {
            let mut obj = JsonValue::new_object();
            obj["hardware"] = version.hardware.into();
            obj["firmware"] = version.firmware().into();
            obj["firmware_type"] = version.firmware_type.as_str().into();
            json::stringify(obj)
        }
    })
}

fn cmd_resolution(pixy: &mut Pixy2, fmt: OutputFormat) -> Result<String> {
    let res = pixy.get_resolution().context("Failed to read resolution")?;

    Ok(match fmt {
        OutputFormat::Plain => res.to_string(),
        OutputFormat::Json => {
            let mut obj = JsonValue::new_object();
            obj["width"] = res.width.into();
            obj["height"] = res.height.into();
            json::stringify(obj)
        }
    })
}

fn cmd_blocks(pixy: &mut Pixy2, sigmap: u8, max_blocks: u8, fmt: OutputFormat) -> Result<String> {
    let (count, blocks) = pixy
        .get_blocks(sigmap, max_blocks)
        .with_context(|| format!("Failed to read blocks for sigmap {:#04x}", sigmap))?;
    Ok(format_blocks(count, &blocks, fmt))
}

fn cmd_lines(pixy: &mut Pixy2, fmt: OutputFormat) -> Result<String> {
    let features = pixy
        .get_line_features()
        .context("Failed to read line features")?;
    Ok(format_features(&features, fmt))
}

fn cmd_poll(
    pixy: &mut Pixy2,
    target: PollTarget,
    count: usize,
    interval: Duration,
    sigmap: u8,
    max_blocks: u8,
    fmt: OutputFormat,
) -> Result<String> {
    let mut polls = 0usize;
    let mut dropped = 0usize;

    while count == 0 || polls < count {
        polls += 1;

        let res = match target {
            PollTarget::Blocks => pixy
                .get_blocks(sigmap, max_blocks)
                .map(|(n, blocks)| format_blocks(n, &blocks, fmt)),
            PollTarget::Lines => pixy
                .get_line_features()
                .map(|features| format_features(&features, fmt)),
        };

        match res {
            Ok(s) => println!("{}", s),
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| format!("Poll {} failed, check connection", polls))
            }
            Err(e) => {
                warn!("dropping poll {}: {}", polls, e);
                dropped += 1;
            }
        }

        thread::sleep(interval);
    }

    info!("{} polls, {} dropped", polls, dropped);
    Ok(String::new())
}

fn do_main() -> Result<String> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(Bash, &mut Cli::command(), "pixy2-tool", &mut io::stdout());

        return Ok(String::default());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let fmt = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    let config = Pixy2Config {
        register: cli.register,
        verify_checksum: cli.checksum,
    };

    let mut transport = port::open_transport(&cli.port, cli.baudrate, cli.force)
        .with_context(|| format!("Can't open port '{}'", cli.port))?;
    let mut pixy = Pixy2::new(transport.as_mut(), config);

    match cli.command {
        Commands::Version => cmd_version(&mut pixy, fmt),
        Commands::Resolution => cmd_resolution(&mut pixy, fmt),
        Commands::Lamp { upper, lower } => pixy
            .set_lamp(upper, lower)
            .map(|_| String::new())
            .context("Failed to set lamps"),
        Commands::Mode { flags } => pixy
            .set_mode(LineMode(flags))
            .map(|_| String::new())
            .with_context(|| format!("Failed to set mode {}", LineMode(flags))),
        Commands::Blocks { sigmap, max_blocks } => cmd_blocks(&mut pixy, sigmap, max_blocks, fmt),
        Commands::Lines => cmd_lines(&mut pixy, fmt),
        Commands::NextTurn { angle } => pixy
            .set_next_turn(angle)
            .map(|_| String::new())
            .with_context(|| format!("Failed to set next turn {}", angle)),
        Commands::DefaultTurn { angle } => pixy
            .set_default_turn(angle)
            .map(|_| String::new())
            .with_context(|| format!("Failed to set default turn {}", angle)),
        Commands::Vector { index } => pixy
            .set_vector(index)
            .map(|_| String::new())
            .with_context(|| format!("Failed to select vector {}", index)),
        Commands::Poll {
            target,
            count,
            interval_ms,
            sigmap,
            max_blocks,
        } => cmd_poll(
            &mut pixy,
            target,
            count,
            Duration::from_millis(interval_ms),
            sigmap,
            max_blocks,
            fmt,
        ),
    }
}

fn main() {
    match do_main() {
        Ok(s) if s.is_empty() => (),
        Ok(s) => println!("{}", s),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}
