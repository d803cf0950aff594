use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use atty::Stream;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tischendorf_viewer::corpus::book_label;
use tischendorf_viewer::osis::{self, StrongsDictionary};
use tischendorf_viewer::{
    HttpSource, JsonFileSource, LoadError, Loader, OsisSource, RenderedBook, Viewer,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tischendorf-viewer",
    about = "Browse the Tischendorf Greek New Testament",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the books offered by the selector.
    Books {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Render the chapters of one book.
    Render {
        #[command(flatten)]
        source: SourceArgs,
        /// Raw book key, e.g. `Matt_1`.
        book: String,
        /// Output format for the rendered chapters.
        #[arg(short, long, value_enum, default_value_t = RenderFormat::Markdown)]
        format: RenderFormat,
    },
    /// Build the corpus JSON from the OSIS text and Strong's dictionary.
    Export {
        /// Path to `tischendorfmorph.xml`.
        #[arg(long)]
        text: PathBuf,
        /// Path to `strongsgreek.xml`.
        #[arg(long)]
        strongs: Option<PathBuf>,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the viewer over HTTP.
    #[cfg(feature = "web")]
    Serve {
        #[command(flatten)]
        source: SourceArgs,
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used for canonical links.
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Base URL of a server exposing `/load_content`.
    #[arg(long)]
    url: Option<String>,
    /// Corpus JSON file.
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Directory holding `tischendorfmorph.xml` and optionally `strongsgreek.xml`.
    #[arg(long)]
    osis_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RenderFormat {
    Html,
    Markdown,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Command::Books { source } => {
            let viewer = runtime.block_on(load_viewer(&source));
            handle_books(&viewer, cli.json)
        }
        Command::Render {
            source,
            book,
            format,
        } => {
            let viewer = runtime.block_on(try_load_viewer(&source))?;
            handle_render(&viewer, &book, format, cli.json)
        }
        Command::Export {
            text,
            strongs,
            output,
        } => handle_export(&text, strongs.as_deref(), output.as_deref()),
        #[cfg(feature = "web")]
        Command::Serve {
            source,
            addr,
            base_url,
        } => {
            let viewer = runtime.block_on(try_load_viewer(&source))?;
            let config = tischendorf_viewer::web::WebConfig {
                addr,
                base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
            };
            runtime.block_on(tischendorf_viewer::web::serve(config, viewer))?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn try_load_viewer(source: &SourceArgs) -> Result<Viewer, LoadError> {
    if let Some(url) = source.url.as_deref() {
        Loader::new(HttpSource::new(url)).try_load().await
    } else if let Some(path) = source.corpus.as_ref() {
        Loader::new(JsonFileSource::new(path)).try_load().await
    } else if let Some(dir) = source.osis_dir.as_ref() {
        Loader::new(OsisSource::new(dir)).try_load().await
    } else {
        Ok(Viewer::default())
    }
}

async fn load_viewer(source: &SourceArgs) -> Viewer {
    if let Some(url) = source.url.as_deref() {
        Loader::new(HttpSource::new(url)).load().await
    } else if let Some(path) = source.corpus.as_ref() {
        Loader::new(JsonFileSource::new(path)).load().await
    } else if let Some(dir) = source.osis_dir.as_ref() {
        Loader::new(OsisSource::new(dir)).load().await
    } else {
        Viewer::default()
    }
}

fn handle_books(viewer: &Viewer, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(viewer.options())?);
        return Ok(());
    }
    let options = viewer.options();
    if options.is_empty() {
        println!("No books available.");
        return Ok(());
    }
    let width = options
        .iter()
        .map(|option| option.label.len())
        .max()
        .unwrap_or(4)
        .max("BOOK".len());
    println!("{:<width$}  {}", "BOOK", "KEY", width = width);
    println!("{:-<width$}  {}", "", "---", width = width);
    for option in options {
        println!("{:<width$}  {}", option.label, option.value, width = width);
    }
    Ok(())
}

fn handle_render(
    viewer: &Viewer,
    book: &str,
    format: RenderFormat,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let rendered = viewer.select(book);
    if rendered.is_empty() && viewer.corpus().book(book).is_none() {
        return Err(format!("No book found for key {book:?}").into());
    }
    if as_json {
        println!("{}", serde_json::to_string_pretty(&rendered_to_json(&rendered))?);
        return Ok(());
    }
    match format {
        RenderFormat::Html => println!("{}", rendered.to_html()?),
        RenderFormat::Markdown => print_markdown(&rendered_to_markdown(book, &rendered)),
    }
    Ok(())
}

fn handle_export(
    text: &Path,
    strongs: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let dictionary = match strongs {
        Some(path) => StrongsDictionary::open(path)?,
        None => StrongsDictionary::default(),
    };
    let corpus = osis::load_files(text, &dictionary)?;
    let encoded = corpus.to_json_vec()?;
    match output {
        Some(path) => {
            fs::write(path, &encoded)?;
            eprintln!("Wrote {} books to {}", corpus.len(), path.display());
        }
        None => println!("{}", String::from_utf8(encoded)?),
    }
    Ok(())
}

fn rendered_to_json(rendered: &RenderedBook<'_>) -> serde_json::Value {
    let chapters = rendered
        .chapters()
        .iter()
        .map(|chapter| {
            let verses = chapter
                .verses
                .iter()
                .map(|verse| {
                    let words = verse
                        .words
                        .iter()
                        .map(|word| {
                            json!({
                                "text": word.text,
                                "lemma": word.lemma,
                                "morph": word.morph,
                                "strong": word.strong,
                                "definition": word.definition,
                            })
                        })
                        .collect::<Vec<_>>();
                    json!({ "verse_id": verse.verse_id, "words": words })
                })
                .collect::<Vec<_>>();
            json!({
                "key": chapter.key,
                "title": chapter.title(),
                "verses": verses,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "book": rendered.book_key(),
        "chapters": chapters,
    })
}

fn rendered_to_markdown(book: &str, rendered: &RenderedBook<'_>) -> String {
    let mut out = format!("# {}\n", book_label(book));
    for chapter in rendered.chapters() {
        out.push_str(&format!("\n## {}\n\n", chapter.title()));
        for verse in &chapter.verses {
            out.push_str(&format!("* {}\n", verse.plain_text()));
        }
    }
    out
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn print_markdown(body: &str) {
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, body, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{body}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tischendorf_viewer::Corpus;

    fn viewer() -> Viewer {
        let corpus = Corpus::from_json_slice(
            r#"{"Gen_1": {"ch_2": [], "ch_1": [{"verse_id":"1:1","words_info":[{"text":"In","lemma":"ἐν"}]}]}}"#.as_bytes(),
        )
        .unwrap();
        Viewer::new(Arc::new(corpus))
    }

    #[test]
    fn source_flags_are_mutually_exclusive() {
        let parsed = Cli::try_parse_from([
            "tischendorf-viewer",
            "books",
            "--corpus",
            "a.json",
            "--osis-dir",
            "xml_files",
        ]);
        assert!(parsed.is_err());
        assert!(Cli::try_parse_from(["tischendorf-viewer", "books"]).is_err());
        assert!(Cli::try_parse_from(["tischendorf-viewer", "books", "--corpus", "a.json"]).is_ok());
    }

    #[test]
    fn markdown_lists_chapters_in_numeric_order() {
        let viewer = viewer();
        let markdown = rendered_to_markdown("Gen_1", &viewer.select("Gen_1"));
        assert_eq!(
            markdown,
            "# Gen.1\n\n## Chapter 1\n\n* 1:1: In\n\n## Chapter 2\n\n"
        );
    }

    #[test]
    fn json_output_uses_placeholders() {
        let viewer = viewer();
        let value = rendered_to_json(&viewer.select("Gen_1"));
        assert_eq!(value["book"], "Gen_1");
        let word = &value["chapters"][0]["verses"][0]["words"][0];
        assert_eq!(word["lemma"], "ἐν");
        assert_eq!(word["definition"], "N/A");
    }

    #[test]
    fn rendering_an_unknown_book_is_an_error() {
        assert!(handle_render(&viewer(), "Rev_22", RenderFormat::Html, false).is_err());
    }
}
