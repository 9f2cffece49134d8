use std::{collections::HashSet, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use polycubes::{cache, Enumerator, Symmetry};

mod enumerate;
use enumerate::{enumerate, print};

fn finish_bar(bar: &ProgressBar, duration: Duration, shapes: usize, n: usize) {
    let time = duration.as_micros();
    let secs = time / 1_000_000;
    let micros = time % 1_000_000;

    if let Some(len) = bar.length() {
        let pos_width = format!("{}", len).len();

        let template = format!(
            "[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos:>{pos_width}}}/{{len}} {{msg}}"
        );

        bar.set_style(
            ProgressStyle::with_template(&template)
                .unwrap()
                .progress_chars("#>-"),
        );
    }

    bar.finish_with_message(format!(
        "Done! Found {shapes} shapes (N = {n}) in {secs}.{micros:06} s"
    ));
}

fn spinner_bar() -> ProgressBar {
    let template = "[{elapsed_precise}] [{spinner:10.cyan/blue}] {pos} {msg}";

    let style = ProgressStyle::with_template(template)
        .unwrap()
        .tick_strings(&[
            ">---------",
            "=>--------",
            "<=>-------",
            "-<=>------",
            "--<=>-----",
            "---<=>----",
            "----<=>---",
            "-----<=>--",
            "------<=>-",
            "-------<=>",
            "--------<=",
            "---------<",
            "--------<=",
            "-------<=>",
            "------<=>-",
            "-----<=>--",
            "---<=>----",
            "--<=>-----",
            "-<=>------",
            "<=>-------",
            "=>--------",
        ]);

    let bar = ProgressBar::new(100).with_style(style);

    bar.enable_steady_tick(Duration::from_millis(66));

    bar
}

pub fn make_bar(len: u64) -> indicatif::ProgressBar {
    let bar = ProgressBar::new(len);

    let pos_width = format!("{len}").len();

    let template =
        format!("[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos:>{pos_width}}}/{{len}} {{msg}} remaining: [{{eta_precise}}]");

    bar.set_style(
        ProgressStyle::with_template(&template)
            .unwrap()
            .progress_chars("#>-"),
    );
    bar
}

#[derive(Clone, Parser)]
pub enum Opts {
    /// Enumerate all shapes with a specific amount of cubes present
    Enumerate(EnumerateOpts),
    /// Print the coordinates of all shapes with a specific amount of cubes
    Print(PrintOpts),
    /// Perform operations on cache files
    #[clap(subcommand)]
    Cache(CacheCommands),
}

#[derive(Clone, Args)]
pub struct EnumerateOpts {
    /// The N value for which to calculate all unique shapes.
    pub n: usize,

    /// Disable parallelism.
    #[clap(long, short = 'p')]
    pub no_parallelism: bool,

    /// The amount of worker threads. Defaults to the amount of CPUs.
    #[clap(long, short = 't')]
    pub threads: Option<usize>,

    /// Which shapes are considered to be the same.
    #[clap(long, short = 'm', value_enum, default_value = "translation")]
    pub mode: Mode,

    /// Don't use the cache
    #[clap(long, short = 'c')]
    pub no_cache: bool,

    /// The directory that cache files are read from and written to
    #[clap(long, short = 'd', default_value = ".")]
    pub cache_dir: PathBuf,

    /// Compress written cache files
    #[clap(long, short = 'z', value_enum, default_value = "gzip")]
    pub compression: Compression,

    /// Report the amount of shapes for every N up to and including `n`.
    ///
    /// Implies `--no-cache`.
    #[clap(long, short = 'a')]
    pub all: bool,
}

impl EnumerateOpts {
    pub fn enumerator(&self) -> Enumerator {
        let workers = match (self.no_parallelism, self.threads) {
            (true, _) => 1,
            (false, Some(threads)) => threads,
            (false, None) => num_cpus::get(),
        };

        Enumerator::new()
            .with_symmetry(self.mode.into())
            .with_workers(workers)
    }
}

#[derive(Clone, Args)]
pub struct PrintOpts {
    /// The amount of cubes in each shape.
    pub n: usize,

    /// Which shapes are considered to be the same.
    #[clap(long, short = 'm', value_enum, default_value = "translation")]
    pub mode: Mode,

    /// Print the shapes of every size from 1 up to and including `n`.
    #[clap(long, short = 'a')]
    pub all: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    Translation,
    Rotation,
    RotationReflection,
}

impl From<Mode> for Symmetry {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Translation => Symmetry::Translation,
            Mode::Rotation => Symmetry::Rotation,
            Mode::RotationReflection => Symmetry::RotationReflection,
        }
    }
}

#[derive(Clone, Subcommand)]
pub enum CacheCommands {
    Validate(ValidateArgs),
    Info {
        #[clap(required = true)]
        path: Vec<String>,
    },
}

#[derive(Clone, Args)]
pub struct ValidateArgs {
    /// The path of the cache file to check
    pub path: String,

    /// Validate that all shapes in the file have exactly N
    /// cubes present
    #[clap(long, short)]
    pub n: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Compression {
    None,
    Gzip,
}

impl From<Compression> for cache::Compression {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => cache::Compression::None,
            Compression::Gzip => cache::Compression::Gzip,
        }
    }
}

pub fn validate(opts: &ValidateArgs) {
    let path = &opts.path;

    let file = match cache::load(path) {
        Ok(f) => f,
        Err(e) => {
            println!("Error: Reading {path} failed. Error: {e}.");
            std::process::exit(1);
        }
    };

    let n = opts.n.unwrap_or(file.n);
    let symmetry = file.symmetry;

    let bar = make_bar(file.shapes.len() as u64);
    bar.set_message("shapes validated");
    bar.println(format!("Validating {path}"));
    bar.println(format!(
        "Verifying that all entries are N = {n} and unique under {symmetry}"
    ));

    let exit = |msg: &str| {
        bar.abandon();
        println!("{msg}");
        std::process::exit(1);
    };

    if n != file.n {
        exit(&format!("Error: File header says N = {}, expected {n}", file.n));
    }

    let mut seen = HashSet::with_capacity(file.shapes.len());

    for shape in &file.shapes {
        bar.inc(1);

        if shape.len() != n {
            exit(&format!(
                "Error: Found a shape with N != {n}. Value: {}",
                shape.len()
            ));
        }

        if !shape.is_face_connected() {
            exit(&format!("Error: Found a shape that is not face-connected:\n{shape}"));
        }

        if !shape.is_normalized() {
            exit("Error: Found a shape that is not normalized.");
        }

        if !seen.insert(shape.canonical_key_with(symmetry)) {
            exit("Found non-unique shapes.");
        }
    }

    bar.finish();

    println!(
        "Success: {path}, containing {} shapes, is valid",
        file.shapes.len()
    );
}

fn info(path: &str) {
    let file = match cache::load(path) {
        Ok(f) => f,
        Err(e) => {
            println!("Failed to open file. {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("Info for {path}");
    println!("Shape size (N): {}", file.n);
    println!("Amount of shapes: {}", file.shapes.len());
    println!("Symmetry: {}", file.symmetry);
    println!("Compression method: {:?}", file.compression);
}

fn main() {
    let opts = Opts::parse();

    match opts {
        Opts::Enumerate(r) => enumerate(&r),
        Opts::Print(p) => print(&p),
        Opts::Cache(CacheCommands::Validate(a)) => validate(&a),
        Opts::Cache(CacheCommands::Info { path }) => path.iter().map(String::as_str).for_each(info),
    }
}
