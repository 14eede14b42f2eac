use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use generator::{FileTemplate, GeneratedTemplate, generate};
use tsl::Error;

const SUBCOMMANDS: &[&str] = &["run", "check", "help"];

#[derive(Parser)]
#[command(name = "tsl", version, about = "Test sequence template generator")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log generation progress (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate test sequences from a template file
    Run(RunArgs),

    /// Parse and generate a template without printing the result
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Template file (TOML)
    file: PathBuf,

    /// Random seed; overrides the template and --config
    #[arg(short, long)]
    seed: Option<u64>,

    /// Settings file layered over the template's [settings]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the composition tree of every phase
    #[arg(long)]
    tree: bool,

    /// Write the listing to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress the listing (just check for errors)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Template file (TOML)
    file: PathBuf,
}

fn main() {
    // `tsl file.toml` works like `tsl run file.toml`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')) {
        if !SUBCOMMANDS.contains(&args[pos + 1].as_str()) {
            args.insert(pos + 1, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let code = match cli.command {
        Command::Run(run_args) => do_run(run_args, color_choice),
        Command::Check(check_args) => do_check(check_args, color_choice),
    };
    process::exit(code);
}

struct Session {
    files: SimpleFiles<String, String>,
    color_choice: ColorChoice,
}

impl Session {
    fn new(color_choice: ColorChoice) -> Self {
        Session {
            files: SimpleFiles::new(),
            color_choice,
        }
    }

    fn load(&mut self, path: &PathBuf) -> Result<FileTemplate, Error> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("cannot read '{}': {}", path.display(), e)))?;
        let file_id = self.files.add(path.display().to_string(), source.clone());
        FileTemplate::parse(&source, file_id)
    }

    fn report(&self, error: &Error) -> i32 {
        let writer = StandardStream::stderr(self.color_choice);
        let config = term::Config::default();
        let diagnostic = error.to_diagnostic();
        if term::emit_to_write_style(&mut writer.lock(), &config, &self.files, &diagnostic).is_err() {
            eprintln!("error: {}", error);
        }
        1
    }
}

fn do_run(args: RunArgs, color_choice: ColorChoice) -> i32 {
    let mut session = Session::new(color_choice);
    let result = session.load(&args.file).and_then(|mut template| {
        let mut settings = template.settings();
        if let Some(path) = &args.config {
            settings = settings.overlay_file(path)?;
        }
        if let Some(seed) = args.seed {
            settings = settings.with_seed(seed);
        }
        generate(&mut template, settings)
    });

    let generated = match result {
        Ok(generated) => generated,
        Err(error) => return session.report(&error),
    };

    if args.quiet {
        return 0;
    }
    let listing = render(&generated, args.tree);
    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, listing) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                return 1;
            }
            log::info!("listing written to {}", path.display());
        }
        None => print!("{}", listing),
    }
    0
}

fn do_check(args: CheckArgs, color_choice: ColorChoice) -> i32 {
    let mut session = Session::new(color_choice);
    let result = session.load(&args.file).and_then(|mut template| {
        let settings = template.settings();
        generate(&mut template, settings)
    });
    match result {
        Ok(generated) => {
            let count: usize = generated
                .phases()
                .iter()
                .flat_map(|phase| phase.sequences.iter())
                .map(Vec::len)
                .sum();
            eprintln!("ok: {} generates {} instruction(s)", args.file.display(), count);
            0
        }
        Err(error) => session.report(&error),
    }
}

fn render(generated: &GeneratedTemplate, tree: bool) -> String {
    let mut out = String::new();
    if tree {
        for phase in generated.phases() {
            out.push_str(&format!("// {} tree\n", phase.kind));
            out.push_str(&generator::output::render_tree(&phase.block));
        }
    }
    out.push_str(&generated.to_string());
    out
}
