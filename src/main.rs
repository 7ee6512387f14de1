use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use poplines::{pop, Globals, LineTemplate, PrintWriter, Table, TemplateWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The tab-delimited (.tbl, .tsv, .txt, .tab) or JSON (.json) file of records to populate
    input: PathBuf,

    /// The path to the template text file
    #[arg(short, long)]
    template: PathBuf,

    /// Write output here instead of to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for the random choices made by `sample(...)` and `$choices`
    #[arg(long)]
    seed: Option<u64>,

    /// A file whose columns provide choice lists
    #[arg(long, requires = "choice_fields")]
    choices: Option<PathBuf>,

    /// The columns of the choice file to load, each becoming a choice list of the same name
    #[arg(long, value_delimiter = ',')]
    choice_fields: Vec<String>,

    /// A global template run before the main one, as INPUT:TEMPLATE:KEY. Its output is
    /// available to `include(INPUT-FILE-NAME, column)` keyed by the KEY column. Can be
    /// given more than once.
    #[arg(long = "global", value_parser = parse_global)]
    globals: Vec<GlobalSpec>,
}

#[derive(Clone, Debug)]
struct GlobalSpec {
    input: PathBuf,
    template: PathBuf,
    key: String,
}

fn parse_global(arg: &str) -> Result<GlobalSpec, String> {
    match arg.rsplitn(3, ':').collect::<Vec<_>>().as_slice() {
        [key, template, input] if !key.is_empty() => Ok(GlobalSpec {
            input: input.into(),
            template: template.into(),
            key: key.to_string(),
        }),
        _ => Err(format!("expected INPUT:TEMPLATE:KEY, found `{arg}`")),
    }
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading template `{}`", path.display()))?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("poplines=info".parse()?))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut globals = Globals::new();
    if let Some(path) = &cli.choices {
        let table = Table::open(path)?;
        globals.read_choice_lists(&table, &cli.choice_fields)?;
    }

    for spec in &cli.globals {
        let table = Table::open(&spec.input)?;
        let text = read_template(&spec.template)?;
        let mut staged = Globals::new();
        {
            let mut template = LineTemplate::compile(&text, &table.schema, &globals)
                .with_context(|| format!("compiling `{}`", spec.template.display()))?;
            if let Some(seed) = cli.seed {
                template.reseed(seed);
            }
            pop(&mut template, &table, Some(&spec.key), &mut staged)?;
        }
        globals.merge(staged);
        info!("Global template {} applied to {} records.", spec.template.display(), table.len());
    }

    let table = Table::open(&cli.input)?;
    let text = read_template(&cli.template)?;
    let mut template = LineTemplate::compile(&text, &table.schema, &globals)
        .with_context(|| format!("compiling `{}`", cli.template.display()))?;
    if let Some(seed) = cli.seed {
        template.reseed(seed);
    }

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating `{}`", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut writer = PrintWriter::new(out);
    let count = pop(&mut template, &table, None, &mut writer)?;
    writer.finish()?;

    info!("{} records processed, {} words written.", count, writer.word_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global() {
        let spec = parse_global("genomes.tbl:genome.txt:genome_id").unwrap();
        assert_eq!(spec.input, PathBuf::from("genomes.tbl"));
        assert_eq!(spec.template, PathBuf::from("genome.txt"));
        assert_eq!(spec.key, "genome_id");

        let spec = parse_global(r"C:\data\genomes.tbl:genome.txt:genome_id").unwrap();
        assert_eq!(spec.input, PathBuf::from(r"C:\data\genomes.tbl"));
        assert_eq!(spec.template, PathBuf::from("genome.txt"));

        assert!(parse_global("genomes.tbl:genome.txt").is_err());
        assert!(parse_global("genomes.tbl:genome.txt:").is_err());
    }
}
