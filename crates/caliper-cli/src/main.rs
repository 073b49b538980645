use caliper_cli::input::Input;
use caliper_cli::runner::Runner;
use clap::{Arg, Command, ValueHint};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CALIPER_LOG", "error,caliper=info"))
        .init();

    let matches = Command::new("caliper")
        .version(clap::crate_version!())
        .about("Estimate q-values for serialized peptide-spectrum matches")
        .arg(
            Arg::new("parameters")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to configuration parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("psm_directory")
                .long("psm-dir")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Directory holding the `.csm` files of one search. Overrides the \
                     directory specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("fasta")
                .short('f')
                .long("fasta")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path to the FASTA database the search was run against. Overrides \
                     the FASTA file specified in the configuration file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path where results will be written. Overrides the directory \
                     specified in the configuration file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("sqt")
                .long("sqt")
                .action(clap::ArgAction::SetTrue)
                .help("Also write results in SQT format"),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let input = Input::from_arguments(matches)?;

    let runner = input.build().and_then(Runner::new)?;
    runner.run()?;

    Ok(())
}
