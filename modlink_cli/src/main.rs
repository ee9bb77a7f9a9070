// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
mod fmt;

use std::{env, fs, path::Path, process::ExitCode};

use clap::{Parser as ClapParser, Subcommand};
use modlink::{
    AnalysisError, Endowments, Error, EvaluateOptions, FileRetriever, Functor, Importer,
    ImporterHooks, ImporterOptions, Locate, ModuleAnalyzer, ModuleLocation, ProtocolRetriever,
    Retrieve, RootedResolver, SuffixLocator, Value,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, prelude::*};
use url::Url;

/// Inspects module graphs without running them
#[derive(Debug, ClapParser)]
#[command(name = "modlink")]
#[command(about = "Inspects module graphs without running them", long_about = None)]
struct Cli {
    /// Directory or URL that bare specifiers resolve against. Defaults to
    /// the current directory.
    #[arg(long, global = true)]
    root: Option<String>,

    /// Suffix appended to module locations before retrieval
    #[arg(long, global = true, default_value = "")]
    suffix: String,

    /// Parse sources as TypeScript
    #[arg(long, global = true)]
    typescript: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the imports and exports of a module file
    Analyze {
        /// The path of the file to analyze
        path: String,
    },

    /// Loads and links a module graph, then prints it in load order
    Graph {
        /// Specifier of the entry module, resolved against the root
        specifier: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("modlink=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(tracing_fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn root_url(root: Option<&str>) -> Result<Url, String> {
    match root {
        Some(root) => match Url::parse(root) {
            Ok(url) => Ok(url),
            Err(_) => directory_url(Path::new(root)),
        },
        None => {
            let current = env::current_dir().map_err(|error| error.to_string())?;
            directory_url(&current)
        }
    }
}

fn directory_url(path: &Path) -> Result<Url, String> {
    let path = std::path::absolute(path).map_err(|error| error.to_string())?;
    Url::from_directory_path(&path).map_err(|()| format!("{} is not a directory", path.display()))
}

/// Renders analysis diagnostics against the source they were found in.
fn report_analysis_error(error: &AnalysisError, path: &str, source: &str) {
    let named_source = miette::NamedSource::new(path, source.to_owned());
    for diagnostic in error.diagnostics.iter() {
        let report = diagnostic.clone().with_source_code(named_source.clone());
        eprint!("{report:?}");
    }
    eprintln!();
}

fn analyze(path: &str, typescript: bool) -> Result<(), String> {
    let source = fs::read_to_string(path).map_err(|error| format!("{path}: {error}"))?;
    let location = match std::path::absolute(path)
        .ok()
        .and_then(|path| Url::from_file_path(path).ok())
    {
        Some(url) => ModuleLocation::from(String::from(url)),
        None => ModuleLocation::from(path),
    };
    let analyzer = ModuleAnalyzer::new().typescript(typescript);
    match analyzer.analyze_text(&source, &location) {
        Ok(record) => {
            let mut out = String::new();
            fmt::write_record(&mut out, &record).map_err(|error| error.to_string())?;
            print!("{out}");
            Ok(())
        }
        Err(error) => {
            report_analysis_error(&error, path, &source);
            Err(format!("{path}: analysis failed"))
        }
    }
}

fn graph(cli: &Cli, specifier: &str) -> Result<(), String> {
    let root = root_url(cli.root.as_deref())?;
    let out = render_graph(root, &cli.suffix, cli.typescript, specifier)?;
    print!("{out}");
    Ok(())
}

/// Links the graph of `specifier` under `root` and renders it in load order,
/// followed by the exports of the entry module.
fn render_graph(
    root: Url,
    suffix: &str,
    typescript: bool,
    specifier: &str,
) -> Result<String, String> {
    let resolver = RootedResolver::new(root);
    let referrer = resolver.root_location();
    debug!(root = %referrer, specifier, "linking graph");
    let hooks = ImporterHooks::new(
        resolver,
        SuffixLocator::new(suffix),
        ProtocolRetriever::new().with("file", FileRetriever),
        ModuleAnalyzer::new().typescript(typescript),
    );
    // Graphs are only linked, never evaluated.
    let importer = Importer::new(
        hooks,
        |_: &str, _: &Endowments, _: &EvaluateOptions<'_>| -> Result<Functor, Value> {
            Err(Value::from("modlink does not evaluate modules"))
        },
        ImporterOptions::default(),
    );
    let module = importer
        .link(specifier, &referrer, &Endowments::default())
        .map_err(|error| {
            if let Error::Analysis(analysis) = &error {
                report_linked_analysis_error(analysis, &SuffixLocator::new(suffix));
            }
            error.to_string()
        })?;
    let modules = importer.modules();
    let mut out = String::new();
    for id in modules.post_order(module) {
        fmt::write_module(&mut out, &modules.get(id)).map_err(|error| error.to_string())?;
    }
    let namespace = modules.namespace(module);
    out.push_str(&format!(
        "exports: {}\n",
        namespace.keys().collect::<Vec<_>>().join(", ")
    ));
    Ok(out)
}

/// Reads the failing module again so its diagnostics render with context.
fn report_linked_analysis_error(error: &AnalysisError, locator: &SuffixLocator) {
    let location = locator.locate(&error.location);
    match FileRetriever.retrieve(&location) {
        Ok(source) => report_analysis_error(error, location.as_str(), &source.text),
        Err(retrieval) => debug!(%retrieval, "source unavailable for diagnostics"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Analyze { path } => analyze(path, cli.typescript),
        Command::Graph { specifier } => graph(&cli, specifier),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
