use std::fs;
use std::io::{self, prelude::*};
use std::process;

use clap::ArgEnum;
use env_logger;
use log;

use cascade_sort::{CascadeMergeEngine, CascadeMergeEngineBuilder, Run, TapeSet};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let memory_size: usize = arg_parser.value_of_t_or_exit("memory_size");
    let num_tapes: usize = arg_parser.value_of_t_or_exit("tapes");
    let print_phases = arg_parser.is_present("phases");

    let input = arg_parser.value_of("input").expect("value is required");
    let records = match read_records(input) {
        Ok(records) => records,
        Err(err) => {
            log::error!("input file reading error: {}", err);
            process::exit(1);
        }
    };

    log::info!(
        "sorting {} records on {} tapes (memory: {} records)",
        records.len(),
        num_tapes,
        memory_size
    );

    let mut engine_builder = CascadeMergeEngineBuilder::new(memory_size, num_tapes);
    if print_phases {
        engine_builder = engine_builder.with_observer(print_phase);
    }

    let mut engine: CascadeMergeEngine<i64> = match engine_builder.build(records) {
        Ok(engine) => engine,
        Err(err) => {
            log::error!("engine initialization error: {}", err);
            process::exit(1);
        }
    };

    let sorted = match engine.run_to_completion() {
        Ok(sorted) => sorted,
        Err(err) => {
            log::error!("sorting error: {}", err);
            process::exit(1);
        }
    };

    if print_phases {
        for phase in 0..engine.metrics().num_phases() {
            println!("beta {} {:.2}", phase, engine.beta(phase));
        }
    }
    println!("final {:.2}", engine.alpha());

    if let Err(err) = write_records(arg_parser.value_of("output"), &sorted) {
        log::error!("data saving error: {}", err);
        process::exit(1);
    }
}

/// Prints one line per non-empty tape in the phase notation
/// `fase <k>` / `<tape>: {run}{run}...`, dummies rendered as `{*}`.
fn print_phase(phase: usize, tapes: &TapeSet<i64>) {
    println!("fase {}", phase);
    for index in 0..tapes.num_tapes() {
        if tapes.run_count(index) == 0 {
            continue;
        }

        let mut line = format!("{}: ", index + 1);
        for run in tapes.runs_on(index) {
            match run {
                Run::Real(records) => {
                    let rendered: Vec<String> = records.iter().map(|record| record.to_string()).collect();
                    line.push_str(&format!("{{{}}}", rendered.join(" ")));
                }
                Run::Dummy => line.push_str("{*}"),
            }
        }
        println!("{}", line);
    }
}

fn read_records(path: &str) -> io::Result<Vec<i64>> {
    let content = fs::read_to_string(path)?;

    content
        .split_whitespace()
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("bad record {:?}: {}", token, err)))
        })
        .collect()
}

fn write_records(path: Option<&str>, records: &[i64]) -> io::Result<()> {
    let mut output_stream: Box<dyn Write> = match path {
        Some(path) => Box::new(io::BufWriter::new(fs::File::create(path)?)),
        None => Box::new(io::BufWriter::new(io::stdout())),
    };

    for record in records {
        output_stream.write_all(format!("{}\n", record).as_bytes())?;
    }

    output_stream.flush()
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("cascade-sort")
        .about("tape-based cascade merge sort simulator")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file holding whitespace-separated integer records")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file, stdout if omitted")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("memory_size")
                .short('m')
                .long("memory-size")
                .help("number of records the selection heap may hold")
                .takes_value(true)
                .default_value("3")
                .validator(|v| match v.parse::<usize>() {
                    Ok(size) if size >= 1 => Ok(()),
                    Ok(_) => Err("memory size must be at least 1".to_string()),
                    Err(err) => Err(format!("memory size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("tapes")
                .short('t')
                .long("tapes")
                .help("number of tapes, including the output tape")
                .takes_value(true)
                .default_value("5")
                .validator(|v| match v.parse::<usize>() {
                    Ok(tapes) if tapes >= 3 => Ok(()),
                    Ok(_) => Err("cascade merge needs at least 3 tapes".to_string()),
                    Err(err) => Err(format!("tape count format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("phases")
                .short('p')
                .long("phases")
                .help("print the tape state after every merge phase")
                .takes_value(false),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
