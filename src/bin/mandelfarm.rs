extern crate clap;
extern crate env_logger;
extern crate mandelfarm;
extern crate num;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use num::Complex;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mandelfarm::planes::MAX_WIDTH_HEIGHT;
use mandelfarm::{PassOptions, Polling, Protocol, RenderConfig, ViewState};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    parse_pair(s, ',').map(|(re, im)| Complex { re, im })
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const CENTER: &str = "center";
const ZOOM: &str = "zoom";
const ITERATIONS: &str = "iterations";
const WORKERS: &str = "workers";
const HUE: &str = "hue";
const PROTOCOL: &str = "protocol";
const POLLING: &str = "polling";
const TIMEOUT: &str = "timeout";
const SINGLE: &str = "single";

// The default worker count is computed at runtime, so the caller owns
// the string and the matches borrow from it.
fn args<'a>(default_workers: &'a str) -> ArgMatches<'a> {
    let max_workers = num_cpus::get() * 4;

    App::new("mandelfarm")
        .version("0.1.0")
        .about("Mandelbrot renderer with a coordinator and a farm of workers")
        .arg(
            Arg::with_name(OUTPUT)
                .required(false)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .default_value("temp.bmp")
                .help("Output file (.bmp, .ppm, or .png)"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("1024x1024")
                .validator(|s| validate_pair::<usize>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image; larger than 28000 on a side is clamped"),
        )
        .arg(
            Arg::with_name(CENTER)
                .required(false)
                .long(CENTER)
                .short("c")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-1.186340599860225,-0.303652988644423")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse center point"))
                .help("Point on the complex plane at the center of the image"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .required(false)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .default_value("350")
                .validator(|s| {
                    validate_range(
                        &s,
                        std::f64::MIN_POSITIVE,
                        std::f64::MAX,
                        "Could not parse zoom",
                        "Zoom must be positive",
                    )
                })
                .help("Pixels per unit of the complex plane"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("100")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        1_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 1000000",
                    )
                })
                .help("Iterations before a point is considered inside the set"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .required(false)
                .long(WORKERS)
                .short("w")
                .takes_value(true)
                .default_value(default_workers)
                .validator(move |s| {
                    validate_range(
                        &s,
                        0,
                        max_workers,
                        "Could not parse worker count",
                        &format!("Worker count must be between 0 and {}", max_workers),
                    )
                })
                .help("Number of workers besides the coordinator"),
        )
        .arg(
            Arg::with_name(HUE)
                .required(false)
                .long(HUE)
                .takes_value(true)
                .default_value("5")
                .validator(|s| {
                    validate_range(
                        &s,
                        0.0_f32,
                        360.0_f32,
                        "Could not parse hue step",
                        "Hue step must be between 0 and 360",
                    )
                })
                .help("Degrees of hue per iteration"),
        )
        .arg(
            Arg::with_name(PROTOCOL)
                .required(false)
                .long(PROTOCOL)
                .takes_value(true)
                .possible_values(&["token", "bands"])
                .default_value("token")
                .help("token: workers echo a token and the coordinator renders; bands: workers render rows"),
        )
        .arg(
            Arg::with_name(POLLING)
                .required(false)
                .long(POLLING)
                .takes_value(true)
                .possible_values(&["spin", "blocking"])
                .default_value("spin")
                .help("How the coordinator waits for workers"),
        )
        .arg(
            Arg::with_name(TIMEOUT)
                .required(false)
                .long(TIMEOUT)
                .short("t")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        0.001,
                        86_400.0,
                        "Could not parse timeout",
                        "Timeout must be between 0.001 and 86400 seconds",
                    )
                })
                .help("Seconds to wait for workers before giving up; waits forever if unset"),
        )
        .arg(
            Arg::with_name(SINGLE)
                .long(SINGLE)
                .help("Render on one thread without starting any workers"),
        )
        .get_matches()
}

fn config(matches: &ArgMatches) -> Result<RenderConfig, String> {
    let size: (usize, usize) = parse_pair(matches.value_of(SIZE).unwrap_or(""), 'x')
        .ok_or_else(|| "Error parsing image dimensions".to_string())?;
    let center = parse_complex(matches.value_of(CENTER).unwrap_or(""))
        .ok_or_else(|| "Error parsing center point".to_string())?;
    let zoom = f64::from_str(matches.value_of(ZOOM).unwrap_or(""))
        .map_err(|_| "Error parsing zoom".to_string())?;
    let iterations = u32::from_str(matches.value_of(ITERATIONS).unwrap_or(""))
        .map_err(|_| "Error parsing iteration count".to_string())?;
    let workers = usize::from_str(matches.value_of(WORKERS).unwrap_or(""))
        .map_err(|_| "Error parsing worker count".to_string())?;
    let hue_step = f32::from_str(matches.value_of(HUE).unwrap_or(""))
        .map_err(|_| "Error parsing hue step".to_string())?;
    let timeout = match matches.value_of(TIMEOUT) {
        None => None,
        Some(t) => Some(Duration::from_secs_f64(
            f64::from_str(t).map_err(|_| "Error parsing timeout".to_string())?,
        )),
    };
    let protocol = match matches.value_of(PROTOCOL) {
        Some("bands") => Protocol::Bands,
        _ => Protocol::Token,
    };
    let polling = match matches.value_of(POLLING) {
        Some("blocking") => Polling::Blocking,
        _ => Polling::Spin,
    };
    if size.0 > MAX_WIDTH_HEIGHT || size.1 > MAX_WIDTH_HEIGHT {
        eprintln!(
            "Warning: {}x{} will be clamped to at most {} on a side",
            size.0, size.1, MAX_WIDTH_HEIGHT
        );
    }

    let view = ViewState::new(center, zoom, iterations, size.0, size.1)
        .map_err(|e| e.to_string())?;
    Ok(RenderConfig {
        view,
        hue_step,
        output: PathBuf::from(matches.value_of(OUTPUT).unwrap_or("temp.bmp")),
        workers,
        pass: PassOptions {
            protocol,
            polling,
            timeout,
        },
        single: matches.is_present(SINGLE),
    })
}

fn main() {
    env_logger::init();
    let default_workers = num_cpus::get().to_string();
    let matches = args(&default_workers);
    let config = match config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.run() {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
