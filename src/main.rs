use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use classmatch::mapping::JsonMappings;
use classmatch::matches_io::{read_matches, save_matches};
use classmatch::model::{NameType, Side};
use classmatch::progress::ProgressSink;
use classmatch::render::{SkeletonRenderer, SourceRenderer};
use classmatch::{ClassifierSet, Matcher, MatcherConfig, ProjectConfig};

const PROGRESS_STEPS: u64 = 1000;

/// CLI arguments for classmatch execution.
#[derive(Parser, Debug)]
#[command(
    name = "classmatch",
    about = "Match classes, methods and fields between two obfuscated JVM builds.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(long, global = true)]
    quiet: bool,
    #[arg(long, global = true)]
    timing: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print matched and total entity counts as JSON.
    Status(ProjectArgs),
    /// Run automatic matching and write the resulting matches.
    Automatch {
        #[command(flatten)]
        project: ProjectArgs,
        /// Where to write the matches file; stdout when omitted or `-`.
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Export side A's names after matching.
        #[arg(long, value_name = "PATH")]
        export_mappings: Option<PathBuf>,
        /// Spread mapped names through method hierarchies before exporting.
        #[arg(long)]
        propagate: bool,
    },
    /// Print one class as a declaration skeleton.
    Show {
        #[command(flatten)]
        project: ProjectArgs,
        /// Internal class name, e.g. `net/example/Main`.
        #[arg(long, value_name = "NAME")]
        class: String,
        #[arg(long, value_enum, default_value = "a")]
        side: SideArg,
        #[arg(long, value_enum, default_value = "mapped-plain")]
        names: NamesArg,
    },
}

/// Inputs shared by every subcommand.
#[derive(Args, Debug)]
struct ProjectArgs {
    /// Project file; the flags below are appended to it.
    #[arg(long, value_name = "PATH")]
    project: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    input_a: Vec<PathBuf>,
    #[arg(long, value_name = "PATH")]
    input_b: Vec<PathBuf>,
    #[arg(long, value_name = "PATH")]
    classpath_a: Vec<PathBuf>,
    #[arg(long, value_name = "PATH")]
    classpath_b: Vec<PathBuf>,
    #[arg(long, value_name = "PATH")]
    classpath: Vec<PathBuf>,
    /// Matcher thresholds as JSON.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    mappings_a: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    mappings_b: Option<PathBuf>,
    /// Matches file applied before running the command.
    #[arg(long, value_name = "PATH")]
    matches: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    A,
    B,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::A => Side::A,
            SideArg::B => Side::B,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NamesArg {
    Plain,
    Mapped,
    MappedPlain,
}

impl From<NamesArg> for NameType {
    fn from(names: NamesArg) -> Self {
        match names {
            NamesArg::Plain => NameType::Plain,
            NamesArg::Mapped => NameType::Mapped,
            NamesArg::MappedPlain => NameType::MappedPlain,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    run(cli)
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let started_at = Instant::now();
    let bar = progress_bar(cli.quiet);
    let progress = |fraction: f64| bar.set_position((fraction * PROGRESS_STEPS as f64) as u64);

    let (project, classes) = match &cli.command {
        Command::Status(project) => {
            let matcher = open(project, &progress)?;
            bar.finish_and_clear();
            let mut writer = output_writer(None)?;
            serde_json::to_writer_pretty(&mut writer, &matcher.status())
                .context("failed to serialize status")?;
            writer.write_all(b"\n").context("failed to write status")?;
            (project, matcher.env().class_count())
        }
        Command::Automatch {
            project,
            output,
            export_mappings,
            propagate,
        } => {
            let mut matcher = open(project, &progress)?;
            bar.set_message("matching");
            let summary = matcher.auto_match_all(&progress);
            bar.finish_and_clear();
            if *propagate {
                matcher.propagate_names();
            }

            let mut writer = output_writer(output.as_deref())?;
            serde_json::to_writer_pretty(&mut writer, &save_matches(matcher.env()))
                .context("failed to serialize matches")?;
            writer.write_all(b"\n").context("failed to write matches")?;

            if let Some(path) = export_mappings {
                let mut mappings = JsonMappings::default();
                matcher.save_mappings(Side::A, &mut mappings)?;
                mappings.save(path)?;
                info!(path = %path.display(), classes = mappings.classes.len(), "exported mappings");
            }
            info!(
                matched_classes = summary.status.matched_classes,
                total_classes = summary.status.total_classes,
                matched_methods = summary.status.matched_methods,
                total_methods = summary.status.total_methods,
                matched_fields = summary.status.matched_fields,
                total_fields = summary.status.total_fields,
                "automatch complete"
            );
            (project, matcher.env().class_count())
        }
        Command::Show {
            project,
            class,
            side,
            names,
        } => {
            let matcher = open(project, &progress)?;
            bar.finish_and_clear();
            let side = Side::from(*side);
            let id = matcher
                .env()
                .get_class(side, class)
                .with_context(|| format!("class {class} not found on side {}", side.tag()))?;
            let text = SkeletonRenderer.render(matcher.env(), id, NameType::from(*names))?;
            let mut writer = output_writer(None)?;
            writer
                .write_all(text.as_bytes())
                .context("failed to write class")?;
            (project, matcher.env().class_count())
        }
    };

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} classes={} inputs={}",
            started_at.elapsed().as_millis(),
            classes,
            project.input_a.len() + project.input_b.len()
        );
    }

    Ok(())
}

/// Load the project, then apply mappings and preloaded matches.
fn open(args: &ProjectArgs, progress: &dyn ProgressSink) -> Result<Matcher> {
    let project = project_config(args)?;
    let config = match &args.config {
        Some(path) => MatcherConfig::load(path)?,
        None => MatcherConfig::default(),
    };

    let mut matcher = Matcher::new(ClassifierSet::standard(), config);
    matcher.init(&project, progress)?;

    for (side, path) in [(Side::A, &args.mappings_a), (Side::B, &args.mappings_b)] {
        if let Some(path) = path {
            let mappings = JsonMappings::load(path)?;
            matcher
                .read_mappings(side, &mappings)
                .with_context(|| format!("failed to apply {}", path.display()))?;
        }
    }
    if let Some(path) = &args.matches {
        read_matches(matcher.env_mut(), path)?;
    }
    Ok(matcher)
}

fn project_config(args: &ProjectArgs) -> Result<ProjectConfig> {
    let mut project = match &args.project {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    };
    project.inputs_a.extend(args.input_a.iter().cloned());
    project.inputs_b.extend(args.input_b.iter().cloned());
    project.classpath_a.extend(args.classpath_a.iter().cloned());
    project.classpath_b.extend(args.classpath_b.iter().cloned());
    project.shared_classpath.extend(args.classpath.iter().cloned());
    Ok(project)
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(PROGRESS_STEPS);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
    {
        bar.set_style(style);
    }
    bar.set_message("loading");
    bar
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_extend_the_project_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("project.json");
        std::fs::write(&path, r#"{"inputs_a": ["a.jar"], "inputs_b": ["b.jar"]}"#)
            .expect("write project");

        let cli = Cli::try_parse_from([
            "classmatch",
            "status",
            "--project",
            path.to_str().expect("utf-8 path"),
            "--input-b",
            "extra.jar",
            "--classpath",
            "rt.jar",
        ])
        .expect("parse");
        let Command::Status(args) = cli.command else {
            panic!("expected status");
        };

        let project = project_config(&args).expect("project");

        assert_eq!(vec![dir.path().join("a.jar")], project.inputs_a);
        assert_eq!(
            vec![dir.path().join("b.jar"), PathBuf::from("extra.jar")],
            project.inputs_b
        );
        assert_eq!(vec![PathBuf::from("rt.jar")], project.shared_classpath);
    }

    #[test]
    fn show_defaults_to_side_a_with_mapped_names() {
        let cli = Cli::try_parse_from(["classmatch", "show", "--class", "a/B", "--input-a", "x"])
            .expect("parse");
        let Command::Show { side, names, .. } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(Side::A, Side::from(side));
        assert_eq!(NameType::MappedPlain, NameType::from(names));
    }
}
