use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// A front end for Cap'n Proto style schema files
#[derive(Parser)]
#[clap(author, version, about)]
enum Cli {
    /// Parse and resolve a schema, along with everything it imports
    #[clap(after_help = CHECK_COMMAND_AFTER_HELP)]
    Check {
        /// Path to the schema to check
        #[clap(name = "FILE")]
        file: PathOrStdin,
        /// Directory to search for imports, after the directory of the schema
        #[clap(short = 'I', long = "import-path", name = "DIR")]
        import_paths: Vec<PathBuf>,
        /// Treat names that cannot be found as errors
        #[clap(long = "deny-unresolved")]
        deny_unresolved: bool,
    },
    /// Parse a schema and print it back out
    Print {
        /// Path to the schema to print
        #[clap(name = "FILE")]
        file: PathOrStdin,
    },
}

const CHECK_COMMAND_AFTER_HELP: &str = "\
Examples:

  $ capnp-schema check addressbook.capnp
  $ capnp-schema check -I /usr/include --deny-unresolved service.capnp

Log output can be enabled with the CAPNP_SCHEMA_LOG environment variable:

  $ CAPNP_SCHEMA_LOG=debug capnp-schema check service.capnp
";

#[derive(Clone, Debug)]
enum PathOrStdin {
    StdIn,
    Path(PathBuf),
}

impl std::str::FromStr for PathOrStdin {
    type Err = std::convert::Infallible;

    fn from_str(src: &str) -> Result<PathOrStdin, std::convert::Infallible> {
        match src {
            "-" => Ok(PathOrStdin::StdIn),
            _ => Ok(PathOrStdin::Path(PathBuf::from(src))),
        }
    }
}

fn unwrap_or_exit<T>(option: Option<T>) -> T {
    option.unwrap_or_else(|| std::process::exit(capnp_schema::Status::Error.exit_code()))
}

fn load_file_or_exit(
    driver: &mut capnp_schema::Driver,
    file: &PathOrStdin,
) -> capnp_schema::driver::FileId {
    unwrap_or_exit(match file {
        PathOrStdin::StdIn => driver.load_source("<stdin>".to_owned(), std::io::stdin()),
        PathOrStdin::Path(path) => driver.load_source_path(path),
    })
}

const MAX_PRETTY_WIDTH: usize = 80;

fn get_pretty_width() -> usize {
    let term_width = termsize::get().map_or(usize::MAX, |size| usize::from(size.cols));
    std::cmp::min(term_width, MAX_PRETTY_WIDTH)
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CAPNP_SCHEMA_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ! {
    init_logging();

    match Cli::parse() {
        Cli::Check {
            file,
            import_paths,
            deny_unresolved,
        } => {
            let mut driver = capnp_schema::Driver::new();
            driver.install_panic_hook();
            driver.set_deny_unresolved(deny_unresolved);
            for dir in import_paths {
                driver.add_include_dir(dir);
            }

            let file_id = load_file_or_exit(&mut driver, &file);
            // Imports of a schema read from stdin are relative to the current directory.
            let base_dir = match &file {
                PathOrStdin::StdIn => Some(std::path::Path::new(".")),
                PathOrStdin::Path(path) => path.parent(),
            };
            let status = driver.check_module(file_id, base_dir);

            std::process::exit(status.exit_code());
        }
        Cli::Print { file } => {
            let mut driver = capnp_schema::Driver::new();
            driver.install_panic_hook();
            driver.set_emit_width(get_pretty_width());

            let file_id = load_file_or_exit(&mut driver, &file);
            let status = driver.print_module(file_id);

            std::process::exit(status.exit_code());
        }
    }
}
