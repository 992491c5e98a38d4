use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use kvdoc::{FloatFormat, Indent, Kv, ReadOptions, WriteOptions};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kvdoc", version, about = "KV document checker, differ and formatter")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a document and report the first error.
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print a document merged with its base chain as JSON.
    Json {
        #[command(flatten)]
        input: InputArgs,

        /// Base document. Each later base is the base of the one before it.
        #[arg(short, long = "base", value_name = "file")]
        bases: Vec<String>,

        /// JSON indentation size; 0 prints on one line (default: 2).
        #[arg(long, value_name = "number", default_value_t = 2)]
        indent: usize,
    },
    /// Print only the fields of a document that differ from its base chain.
    Diff {
        #[command(flatten)]
        input: InputArgs,

        /// Base document. Each later base is the base of the one before it.
        #[arg(short, long = "base", value_name = "file", required = true)]
        bases: Vec<String>,

        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Re-emit a document in canonical layout.
    Format {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct InputArgs {
    /// Input file path. Use '-' to read from stdin.
    input: String,

    /// Output file path (prints to stdout if omitted).
    #[arg(short, long, value_name = "file")]
    output: Option<String>,

    /// Reject bare (unquoted) string values.
    #[arg(long)]
    strict: bool,

    /// Maximum object and array nesting depth.
    #[arg(long = "max-depth", value_name = "number")]
    max_depth: Option<usize>,
}

impl InputArgs {
    fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::new().with_bare_strings(!self.strict);
        if let Some(depth) = self.max_depth {
            options = options.with_max_depth(depth);
        }
        options
    }
}

#[derive(ClapArgs, Debug)]
struct LayoutArgs {
    /// Indent with this many spaces instead of tabs.
    #[arg(long, value_name = "number")]
    spaces: Option<usize>,

    /// Float layout: fixed (six decimals) or shortest.
    #[arg(long, value_enum, value_name = "mode", default_value_t = FloatArg::Fixed)]
    floats: FloatArg,
}

impl LayoutArgs {
    fn write_options(&self) -> WriteOptions {
        let indent = self.spaces.map_or(Indent::Tabs, Indent::spaces);
        WriteOptions::new()
            .with_indent(indent)
            .with_float_format(self.floats.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FloatArg {
    Fixed,
    Shortest,
}

impl From<FloatArg> for FloatFormat {
    fn from(value: FloatArg) -> Self {
        match value {
            FloatArg::Fixed => FloatFormat::Fixed,
            FloatArg::Shortest => FloatFormat::Shortest,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("ERROR  {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KVDOC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    match &args.command {
        Command::Check { input } => run_check(input),
        Command::Json {
            input,
            bases,
            indent,
        } => run_json(input, bases, *indent),
        Command::Diff {
            input,
            bases,
            layout,
        } => run_diff(input, bases, layout),
        Command::Format { input, layout } => run_format(input, layout),
    }
}

fn run_check(args: &InputArgs) -> Result<(), Box<dyn Error>> {
    let text = read_input(&args.input)?;
    let kv = Kv::read_with_options(&text, &args.read_options())
        .map_err(|err| format!("{}: {err}", display_label(&args.input)))?;
    let objects = kv.document().map_or(0, |doc| doc.objects.len());
    debug!(objects, "check passed");
    let message = format!("✔ {} is valid\n", display_label(&args.input));
    write_output(OutputTarget::from_arg(args.output.as_deref()).path(), message.as_bytes())
}

fn run_json(args: &InputArgs, bases: &[String], indent: usize) -> Result<(), Box<dyn Error>> {
    let options = args.read_options();
    let text = read_input(&args.input)?;
    let base_texts = read_bases(bases)?;
    let value = kvdoc::with_base_chain(&base_texts, &options, |base| {
        let mut kv = Kv::read_with_options(&text, &options)?;
        if let Some(base) = base {
            kv.set_base(base)?;
        }
        kvdoc::to_json(&kv)
    })?;

    let output_target = OutputTarget::from_arg(args.output.as_deref());
    with_output_writer(output_target.path(), |writer| {
        write_json(writer, &value, indent)
    })
}

fn run_diff(args: &InputArgs, bases: &[String], layout: &LayoutArgs) -> Result<(), Box<dyn Error>> {
    let options = args.read_options();
    let text = read_input(&args.input)?;
    let base_texts = read_bases(bases)?;
    let patch = kvdoc::with_base_chain(&base_texts, &options, |base| {
        let base = base.ok_or_else(|| kvdoc::Error::misuse("diff needs at least one base"))?;
        let kv = Kv::read_with_options(&text, &options)?;
        kvdoc::diff(&kv, base, &layout.write_options())
    })?;
    write_output(OutputTarget::from_arg(args.output.as_deref()).path(), patch.as_bytes())
}

fn run_format(args: &InputArgs, layout: &LayoutArgs) -> Result<(), Box<dyn Error>> {
    let text = read_input(&args.input)?;
    let kv = Kv::read_with_options(&text, &args.read_options())?;
    let formatted = kvdoc::format(&kv, &layout.write_options())?;
    write_output(
        OutputTarget::from_arg(args.output.as_deref()).path(),
        formatted.as_bytes(),
    )
}

fn read_input(input: &str) -> kvdoc::Result<String> {
    match input {
        "-" => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        path => read_file(path),
    }
}

fn read_file(path: &str) -> kvdoc::Result<String> {
    fs::read_to_string(path).map_err(|err| kvdoc::Error::io(format!("cannot read {path}: {err}")))
}

fn read_bases(paths: &[String]) -> kvdoc::Result<Vec<String>> {
    paths.iter().map(|path| read_file(path)).collect()
}

#[derive(Clone, Debug)]
enum OutputTarget {
    Stdout,
    File(String),
}

impl OutputTarget {
    fn from_arg(output: Option<&str>) -> Self {
        match output {
            Some(path) if path != "-" => OutputTarget::File(path.to_string()),
            _ => OutputTarget::Stdout,
        }
    }

    fn path(&self) -> Option<&str> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::File(path) => Some(path.as_str()),
        }
    }
}

fn with_output_writer<F>(path: Option<&str>, f: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce(&mut dyn Write) -> Result<(), Box<dyn Error>>,
{
    match path {
        Some(path) => {
            let mut file = fs::File::create(path)
                .map_err(|err| kvdoc::Error::io(format!("cannot create {path}: {err}")))?;
            f(&mut file)
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            f(&mut handle)
        }
    }
}

fn write_output(path: Option<&str>, data: &[u8]) -> Result<(), Box<dyn Error>> {
    with_output_writer(path, |writer| {
        writer.write_all(data)?;
        Ok(())
    })
}

fn write_json(writer: &mut dyn Write, value: &Value, indent: usize) -> Result<(), Box<dyn Error>> {
    if indent == 0 {
        serde_json::to_writer(&mut *writer, value)?;
    } else {
        let indent_bytes = vec![b' '; indent];
        let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent_bytes);
        let mut serializer = serde_json::Serializer::with_formatter(&mut *writer, formatter);
        value.serialize(&mut serializer)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn display_label(input: &str) -> String {
    if input == "-" {
        return "stdin".to_string();
    }
    Path::new(input)
        .file_name()
        .map_or_else(|| input.to_string(), |name| name.to_string_lossy().into_owned())
}
