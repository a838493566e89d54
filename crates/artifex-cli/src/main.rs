mod draft;
mod interchange;
mod kit;
mod response;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context, Result};
use artifex::{Engine, EngineConfig, Rendered, SourceUnit};
use chrono::TimeDelta;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use draft::DraftStore;
use interchange::Document;

#[derive(Parser)]
#[command(name = "artifex")]
#[command(about = "Render generated JSX components in a sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluation steps allowed per load and per render
    #[arg(long, global = true)]
    step_budget: Option<u64>,

    /// Log engine activity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a component file
    Render {
        /// Component source, optionally led by a specification block
        file: PathBuf,
        /// JSON file passed to the component as its argument
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Html)]
        format: Format,
    },
    /// Print the lowered form of a component file
    Transform {
        file: PathBuf,
    },
    /// Transform and load a component file without rendering it
    Check {
        file: PathBuf,
    },
    /// Extract the component from a model response
    Extract {
        /// File holding the raw response text
        response: PathBuf,
        /// Write the component here instead of printing the extraction as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Request text to embed as the file's specification block
        #[arg(long)]
        specification: Option<PathBuf>,
    },
    /// Save, restore or clear the in-progress draft
    Draft {
        #[command(subcommand)]
        action: DraftAction,
        /// Directory holding the draft record
        #[arg(long, global = true, default_value = ".artifex")]
        state_dir: PathBuf,
        /// Seconds after which a draft is too old to restore
        #[arg(long, global = true)]
        max_age: Option<u32>,
    },
    /// List the capabilities components may import
    Capabilities {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DraftAction {
    /// Store the contents of a file as the draft
    Save { file: PathBuf },
    /// Print the draft if it is still fresh
    Restore {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete the draft
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Html,
    Json,
    /// Indented outline of the rendered tree
    Text,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Warn);
    builder.parse_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_module("artifex", log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_module("artifex", log::LevelFilter::Trace);
        }
    }
    builder.init();
}

/// `Ok(false)` when the command ran but the component failed.
fn run(cli: Cli) -> Result<bool> {
    let config = || load_config(cli.config.as_deref(), cli.step_budget);
    match cli.command {
        Commands::Render { file, data, format } => render(&file, data.as_deref(), format, config()?),
        Commands::Transform { file } => transform(&file, config()?),
        Commands::Check { file } => check(&file, config()?),
        Commands::Extract {
            response,
            out,
            specification,
        } => extract(&response, out.as_deref(), specification.as_deref()),
        Commands::Draft {
            action,
            state_dir,
            max_age,
        } => {
            let mut store = DraftStore::new(state_dir);
            if let Some(seconds) = max_age {
                store = store.with_max_age(TimeDelta::seconds(i64::from(seconds)));
            }
            draft(&store, action)
        }
        Commands::Capabilities { json } => capabilities(json),
    }
}

fn load_config(path: Option<&Path>, step_budget: Option<u64>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(step_budget) = step_budget {
        config.step_budget = step_budget;
    }
    config.validate()?;
    Ok(config)
}

fn engine(config: EngineConfig) -> Result<Engine> {
    let registry = kit::registry().context("failed to build the capability kit")?;
    Ok(Engine::new(Rc::new(registry), config)?)
}

/// Reads a component file, dropping any specification block.
fn read_source(file: &Path) -> Result<SourceUnit> {
    let document = Document::read(file)?;
    if let Some(specification) = &document.specification {
        log::debug!(target: "artifex::interchange", "{} carries a {} byte specification", file.display(), specification.len());
    }
    let name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |name| name.to_string_lossy().into_owned());
    Ok(SourceUnit::named(name, document.source))
}

fn render(file: &Path, data: Option<&Path>, format: Format, config: EngineConfig) -> Result<bool> {
    let source = read_source(file)?;
    let data: Option<serde_json::Value> = match data {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read data {}", path.display()))?;
            Some(serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?)
        }
        None => None,
    };

    let mut engine = engine(config)?;
    let rendered = engine.render_unit(&source, data.as_ref());
    let scene = rendered.to_scene();
    match format {
        Format::Html => println!("{}", artifex_scene::to_html(&scene)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&scene)?),
        Format::Text => print!("{}", artifex_scene::outline(&scene)),
    }
    if let Rendered::Failed(error) = &*rendered {
        eprintln!("{}: {}", error.title(), error.message());
        return Ok(false);
    }
    Ok(true)
}

fn transform(file: &Path, config: EngineConfig) -> Result<bool> {
    let source = read_source(file)?;
    match artifex::transform::transform(&source, &config.transform) {
        Ok(unit) => {
            print!("{unit}");
            Ok(true)
        }
        Err(error) => {
            eprintln!("{}", error.report);
            Ok(false)
        }
    }
}

fn check(file: &Path, config: EngineConfig) -> Result<bool> {
    let source = read_source(file)?;
    let mut engine = engine(config)?;
    match engine.load(source.as_str()) {
        Ok(module) => {
            println!(
                "{}: ok, {} steps, exports [{}], imports [{}]",
                source.name(),
                module.steps(),
                module.export_names().join(", "),
                module.requested().join(", ")
            );
            Ok(true)
        }
        Err(error) => {
            eprintln!("{}: {}\n{}", source.name(), error.title(), error.message());
            Ok(false)
        }
    }
}

fn extract(response: &Path, out: Option<&Path>, specification: Option<&Path>) -> Result<bool> {
    let text = fs::read_to_string(response)
        .with_context(|| format!("failed to read response {}", response.display()))?;
    let artifact = response::extract(&text);
    let Some(out) = out else {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(true);
    };

    if artifact.is_empty() {
        log::warn!(target: "artifex::extract", "{} has no artifact, writing an empty source", response.display());
    }
    let specification = specification
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("failed to read specification {}", path.display()))
        })
        .transpose()?;
    let mut source = artifact.content;
    if !source.is_empty() && !source.ends_with('\n') {
        source.push('\n');
    }
    Document::new(specification, source).write(out)?;
    eprintln!(
        "wrote {}{}",
        out.display(),
        artifact
            .title
            .map(|title| format!(" ({title})"))
            .unwrap_or_default()
    );
    Ok(true)
}

fn draft(store: &DraftStore, action: DraftAction) -> Result<bool> {
    match action {
        DraftAction::Save { file } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let saved = store.save(&content)?;
            eprintln!("saved draft at {}", saved.timestamp.to_rfc3339());
        }
        DraftAction::Restore { out } => match store.restore()? {
            Some(draft) => match out {
                Some(out) => fs::write(&out, &draft.content)
                    .with_context(|| format!("failed to write {}", out.display()))?,
                None => print!("{}", draft.content),
            },
            None => eprintln!("no fresh draft in {}", store.path().display()),
        },
        DraftAction::Clear => {
            if !store.clear()? {
                eprintln!("no draft to clear");
            }
        }
    }
    Ok(true)
}

fn capabilities(json: bool) -> Result<bool> {
    let capabilities = kit::describe();
    if json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
        return Ok(true);
    }
    for capability in capabilities {
        println!("{:<26} {}", capability.name, capability.summary);
        if !capability.members.is_empty() {
            println!("{:<26} {}", "", capability.members.join(", "));
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn render_flags_parse() {
        let cli = Cli::try_parse_from(["artifex", "render", "clock.jsx", "--format", "json", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Render { format: Format::Json, .. }));
    }

    #[test]
    fn config_files_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifex.toml");
        fs::write(&path, "step-budget = 500\n[transform]\njsx-runtime = \"react\"\n").unwrap();
        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.step_budget, 500);
        let config = load_config(Some(&path), Some(9)).unwrap();
        assert_eq!(config.step_budget, 9);
        assert!(load_config(None, Some(0)).is_err());
        assert!(load_config(Some(&dir.path().join("missing.toml")), None).is_err());
    }

    #[test]
    fn render_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jsx");
        fs::write(
            &good,
            "/* <artifact-specification>\nA greeting\n</artifact-specification> */\n\n\
             export default ({ name }) => <h1>Hi {name}</h1>;\n",
        )
        .unwrap();
        let data = dir.path().join("data.json");
        fs::write(&data, "{\"name\": \"Ada\"}").unwrap();
        assert!(render(&good, Some(&data), Format::Text, EngineConfig::default()).unwrap());

        let bad = dir.path().join("bad.jsx");
        fs::write(&bad, "export default () => <div>").unwrap();
        assert!(!render(&bad, None, Format::Html, EngineConfig::default()).unwrap());
        assert!(!check(&bad, EngineConfig::default()).unwrap());
        assert!(!transform(&bad, EngineConfig::default()).unwrap());
    }

    #[test]
    fn extract_writes_interchange_files() {
        let dir = tempfile::tempdir().unwrap();
        let response = dir.path().join("response.txt");
        fs::write(
            &response,
            "<artifact identifier=\"hello\" title=\"Hello\">\nexport default () => <p>hi</p>;\n</artifact>",
        )
        .unwrap();
        let request = dir.path().join("request.txt");
        fs::write(&request, "Say hi").unwrap();
        let out = dir.path().join("hello.jsx");
        assert!(extract(&response, Some(&out), Some(&request)).unwrap());

        let document = Document::read(&out).unwrap();
        assert_eq!(document.specification.as_deref(), Some("Say hi"));
        assert_eq!(document.source, "export default () => <p>hi</p>;\n");
        assert!(check(&out, EngineConfig::default()).unwrap());
    }
}
