use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use schemdiff::diff::{self, ApplyMode};
use schemdiff::keywords;
use schemdiff::netlist::{NetFormat, Netlister};
use schemdiff::project::{self, LoadedProject, TriageState, WorkingTree};
use schemdiff::sexp::{parse, print_file};
use schemdiff::vars::Variables;

/// Structural diff, three-way merge, and netlisting for s-expression
/// schematic projects.
///
/// Files round-trip byte-exactly, diffs are structural (reordering is not a
/// change), and merges isolate true conflicts into pairs a reviewer can
/// resolve one side at a time.
#[derive(Parser)]
#[command(name = "schemdiff", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NetFormatArg {
    /// `NAME: R1.1 U2.3`
    Compact,
    /// `NAME: R1.1(VDD) U2.3(VOUT)`
    Names,
    /// Telesis-style named blocks.
    Telesis,
}

impl From<NetFormatArg> for NetFormat {
    fn from(arg: NetFormatArg) -> Self {
        match arg {
            NetFormatArg::Compact => Self::Compact,
            NetFormatArg::Names => Self::WithPinNames,
            NetFormatArg::Telesis => Self::NamedBlock,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Parse a file and verify the printer reproduces it byte-exactly.
    Roundtrip {
        /// Schematic, symbol, or worksheet file.
        file: PathBuf,
    },
    /// Show the structural differences between two files.
    Diff {
        base: PathBuf,
        other: PathBuf,
    },
    /// Three-way merge: apply safe changes, report conflicts.
    Merge {
        base: PathBuf,
        ours: PathBuf,
        theirs: PathBuf,
        /// Write the merged result here (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Classify only; do not write anything.
        #[arg(long)]
        check: bool,
    },
    /// Resolve and print a project's netlist.
    Netlist {
        /// Project descriptor (.kicad_pro).
        project: PathBuf,
        #[arg(long, value_enum, default_value = "compact")]
        format: NetFormatArg,
    },
    /// Print a project's page tree.
    Toc {
        /// Project descriptor (.kicad_pro).
        project: PathBuf,
    },
    /// Report grammar-dictionary atoms no code consumes.
    Keywords {
        /// Dictionary files (one atom per line).
        files: Vec<PathBuf>,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_tree(path: &PathBuf) -> Result<schemdiff::sexp::Tree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_named_project(path: &PathBuf) -> Result<LoadedProject> {
    let dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), PathBuf::from);
    let file = path
        .file_name()
        .and_then(|f| f.to_str())
        .context("project path has no file name")?;
    let store = WorkingTree::new(dir);
    project::load_project(&store, file, None, false)
        .with_context(|| format!("loading project {}", path.display()))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Roundtrip { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tree = parse(&text).with_context(|| format!("parsing {}", file.display()))?;
            let printed = print_file(&tree, tree.root());
            if printed == text {
                println!("{}: byte-exact", file.display());
            } else {
                println!("{}: differs after round-trip", file.display());
                std::process::exit(1);
            }
        }
        Command::Diff { base, other } => {
            let base_tree = read_tree(&base)?;
            let other_tree = read_tree(&other)?;
            let Some((set, roots)) = diff::diff_trees(&base_tree, &other_tree) else {
                bail!("files are disparate; no structural diff is producible");
            };
            for leaf in set.flatten_roots(&roots, ApplyMode::ALL) {
                println!("{}", set.describe(leaf, &base_tree));
            }
        }
        Command::Merge {
            base,
            ours,
            theirs,
            output,
            check,
        } => {
            let mut base_tree = read_tree(&base)?;
            let ours_tree = read_tree(&ours)?;
            let theirs_tree = read_tree(&theirs)?;
            if check {
                let state = project::classify_three_way(&mut base_tree, &ours_tree, &theirs_tree)?;
                println!(
                    "{}",
                    match state {
                        TriageState::OutOfDate => "out-of-date: any side works",
                        TriageState::Ours => "ours: only this side changed",
                        TriageState::Theirs => "theirs: only that side changed",
                        TriageState::Both => "both: merged automatically",
                        TriageState::Conflict => "conflict: manual resolution required",
                    }
                );
                if state == TriageState::Conflict {
                    std::process::exit(1);
                }
                return Ok(());
            }
            let out = diff::threeway(&mut base_tree, &ours_tree, &theirs_tree, false)?;
            if !out.conflicts.is_empty() {
                eprintln!("{}", diff::conflict_report(&base_tree, &out));
                std::process::exit(1);
            }
            let mut vars = Variables::new();
            project::record_write_time(&mut vars);
            let merged = print_file(&base_tree, base_tree.root());
            match output {
                Some(path) => std::fs::write(&path, merged)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{merged}"),
            }
        }
        Command::Netlist { project, format } => {
            let mut loaded = load_named_project(&project)?;
            let mut vars = Variables::new();
            loaded.fill_vars(&mut vars);
            let mut netlister = Netlister::new();
            loaded.fill_netlist(&mut netlister);
            netlister.fill_net_vars(&mut vars);
            println!("{}", netlister.generate(format.into()));
        }
        Command::Toc { project } => {
            let loaded = load_named_project(&project)?;
            fn print_entries(entries: &[project::TocEntry], indent: usize) {
                for e in entries {
                    println!("{:3}: {}{} ({})", e.page, "  ".repeat(indent), e.name, e.file);
                    print_entries(&e.children, indent + 1);
                }
            }
            print_entries(&loaded.toc(), 0);
        }
        Command::Keywords { files } => {
            let mut failed = false;
            for file in files {
                let scope = keywords::scope_for_file(&file);
                let missing = keywords::check_dictionary_file(&file, scope)
                    .with_context(|| format!("reading {}", file.display()))?;
                println!("{}:", file.display());
                for atom in &missing {
                    println!("  {atom}");
                    failed = true;
                }
            }
            if failed {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
