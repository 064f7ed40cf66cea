use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use quill_engine::stream::FormReader;
use quill_engine::{Encoding, Interp, InterpOptions};
use quill_syn::FormatTree;
use tracing_subscriber::EnvFilter;

/// Directories listed in this variable are searched by `load`.
const PATH_VAR: &str = "QUILL_PATH";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::parse();

    if opt.parse_only {
        return parse_only(&opt);
    }

    let interp = Interp::new(opt.options());
    let res = if let Some(source) = &opt.eval {
        interp.eval_str(source).map(drop)
    } else if let Some(file) = &opt.file {
        interp.load(file).map_err(|e| {
            interp.report(&e);
            e
        })
    } else {
        let mut reader = FormReader::new(interp.streams().input.clone(), "<stdin>");
        interp.repl(&mut reader).map(drop)
    };
    if res.is_err() {
        return ExitCode::FAILURE;
    }

    if opt.main {
        if let Err(e) = interp.eval_str("(main)") {
            tracing::debug!(error = %e, "main aborted");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

/// Print the syntax tree of every form of the input.
fn parse_only(opt: &Opt) -> ExitCode {
    let mut reader = match (&opt.eval, &opt.file) {
        (Some(source), _) => FormReader::from_string(source, "<string>"),
        (None, Some(file)) => match std::fs::read_to_string(file) {
            Ok(source) => FormReader::from_string(&source, file.as_str()),
            Err(e) => {
                eprintln!("cannot read `{}`: {}", file, e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) => FormReader::new(
            std::sync::Arc::new(quill_engine::stream::Input::stdin()),
            "<stdin>",
        ),
    };

    let mut status = ExitCode::SUCCESS;
    loop {
        match reader.next_form() {
            Ok(Some(syntax)) => print!("{}", FormatTree(&syntax)),
            Ok(None) => return status,
            Err(e) => {
                eprintln!("{}", e.or_file(reader.name()));
                status = ExitCode::FAILURE;
            }
        }
    }
}

#[derive(clap::Parser)]
#[clap(about, version, author)]
struct Opt {
    /// Only parse the input. Outputs the syntax tree of every form.
    #[clap(long)]
    parse_only: bool,

    /// Evaluate the given string as a Quill program.
    #[clap(short, long)]
    eval: Option<String>,

    /// Call `main` after the program has been evaluated.
    #[clap(long)]
    main: bool,

    /// Add a directory to the load path.
    #[clap(short, long = "include", value_name = "DIR", parse(from_os_str))]
    include: Vec<PathBuf>,

    /// Ignore directories listed in QUILL_PATH.
    #[clap(long)]
    no_path: bool,

    /// Output encoding: utf-8 or byte.
    #[clap(long, default_value = "utf-8")]
    encoding: Encoding,

    /// Enable `assert` forms.
    #[clap(long)]
    assert: bool,

    /// Seed for the random engine.
    #[clap(long)]
    seed: Option<u64>,

    /// Use a fixed seed so that runs are reproducible. Overrides `--seed`.
    #[clap(long)]
    no_seed: bool,

    /// Program to load. Reads from standard input if absent.
    file: Option<String>,

    /// Arguments passed to the program.
    args: Vec<String>,
}

impl Opt {
    fn options(&self) -> InterpOptions {
        let mut paths = self.include.clone();
        if !self.no_path {
            if let Some(var) = std::env::var_os(PATH_VAR) {
                paths.extend(std::env::split_paths(&var));
            }
        }
        let seed = if self.no_seed { Some(0) } else { self.seed };

        InterpOptions {
            argv: self.file.iter().chain(&self.args).cloned().collect(),
            paths,
            assert: self.assert,
            seed,
            encoding: self.encoding,
            ..InterpOptions::default()
        }
    }
}
