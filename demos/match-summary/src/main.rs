//! Summarise an identification file as CSV

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use clap::Parser;
use mzmatch::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// The command line interface arguments
#[derive(Debug, Parser)]
struct Cli {
    /// The identification file
    #[arg(short, long)]
    in_path: PathBuf,
    /// The path for the resulting csv file
    #[arg(short, long)]
    out_path: PathBuf,
    /// A JSON file with the search configuration (fixed modifications, mass tolerance)
    #[arg(long)]
    search: Option<PathBuf>,
    /// The spectrum file, if it cannot be derived from the name of the input file
    #[arg(long)]
    spectrum_file: Option<String>,
    /// Expand ambiguous residues into all concrete sequences
    #[arg(long)]
    expand_ambiguous: bool,
}

/// Logs every tenth of the file
#[derive(Debug, Default)]
struct LogProgress {
    maximum: u64,
    last: u64,
}

impl ProgressHandler for LogProgress {
    fn set_maximum(&mut self, maximum: u64) {
        self.maximum = maximum;
    }

    fn set_progress(&mut self, progress: u64) {
        if self.maximum > 0 && progress >= self.last + self.maximum / 10 {
            self.last = progress;
            info!("{progress}/{} read", self.maximum);
        }
    }
}

fn configure_log() {
    let subscriber = tracing_subscriber::registry().with(
        fmt::layer().compact().with_writer(io::stderr).with_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        ),
    );

    subscriber.init();
}

fn main() {
    configure_log();
    let args = Cli::parse();

    let search = args.search.as_ref().map_or_else(SearchConfiguration::default, |path| {
        SearchConfiguration::from_json_file(path).expect("Could not read the search configuration")
    });
    let mut settings = ReaderSettings::default();
    if let Some(spectrum_file) = &args.spectrum_file {
        settings = settings.with_spectrum_file(spectrum_file);
    }

    let mut reader = match open_identification_file(&args.in_path, settings) {
        Ok(reader) => reader,
        Err(err) => {
            error!("Could not open {}", args.in_path.display());
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    let matches = match reader.parse(
        &mut LogProgress::default(),
        &search,
        None,
        args.expand_ambiguous,
    ) {
        Ok(matches) => matches,
        Err(err) => {
            error!("Could not parse {}", args.in_path.display());
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let mut out_file =
        BufWriter::new(File::create(&args.out_path).expect("Could not create out CSV file"));
    writeln!(
        &mut out_file,
        "spectrum,spectrum_number,advocate,rank,primary,sequence,z,e_value,raw_score,modifications"
    )
    .unwrap();
    let mut hits = 0;
    for spectrum_match in &matches {
        for (advocate, hit) in spectrum_match.all_hits() {
            let assumption = &hit.assumption;
            let modifications = assumption
                .modifications()
                .iter()
                .map(|m| {
                    format!(
                        "{}{}:{}",
                        if m.is_fixed() { "fixed " } else { "" },
                        m.site(),
                        m.tag()
                    )
                })
                .collect::<Vec<_>>()
                .join(";");
            writeln!(
                &mut out_file,
                "\"{}\",{},\"{advocate}\",{},{},\"{}\",{},{},{},\"{modifications}\"",
                spectrum_match.key(),
                spectrum_match
                    .spectrum_number()
                    .map_or(String::new(), |n| n.to_string()),
                assumption.rank(),
                hit.primary,
                assumption.sequence(),
                assumption.charge().value(),
                assumption.e_value(),
                assumption
                    .raw_score()
                    .map_or(String::new(), |s| s.to_string()),
            )
            .unwrap();
            hits += 1;
        }
    }
    out_file.flush().unwrap();

    info!(
        spectrum_matches = matches.len(),
        hits, "wrote {}",
        args.out_path.display()
    );
    for (software, versions) in reader.software_versions() {
        println!("{software}: {}", versions.join(", "));
    }
}
