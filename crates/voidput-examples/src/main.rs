use facet::Facet;
use figue as args;
use tracing_subscriber::EnvFilter;

mod scenarios;

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Print final agent stats as JSON instead of text.
    #[facet(args::named, default)]
    json: bool,
    /// Reporter threads per scenario.
    #[facet(args::named, default)]
    threads: Option<u32>,
    #[facet(args::subcommand)]
    command: CommandKind,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum CommandKind {
    ConcurrentReporters,
    FailingHost,
    InstrumentedStore,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> AnyResult<()> {
    let cli = parse_cli()?;
    let options = scenarios::Options {
        json: cli.json,
        threads: cli.threads.unwrap_or(8).max(1) as usize,
    };

    match cli.command {
        CommandKind::ConcurrentReporters => scenarios::concurrent_reporters::run(&options),
        CommandKind::FailingHost => scenarios::failing_host::run(&options),
        CommandKind::InstrumentedStore => scenarios::instrumented_store::run(&options),
    }
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("voidput-examples")
                .description("Run voidput agent scenarios as subcommands")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}
