//! Builds a [`Corpus`] from the Tischendorf morphological OSIS text and the
//! Strong's Greek dictionary.

use crate::corpus::{Book, Corpus, Verse, Word, sanitize_key};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

pub const TEXT_FILE: &str = "tischendorfmorph.xml";
pub const STRONGS_FILE: &str = "strongsgreek.xml";

const NO_DEFINITION: &str = "No definition available";
const NO_TEXT: &str = "[No text available]";
const LEMMA_MARKER: &str = "lemma:";
const MORPH_SCHEME: &str = "robinson:";
const MAX_STRONG_DIGITS: usize = 5;

#[derive(Debug)]
pub enum OsisError {
    Io(std::io::Error),
    Xml(quick_xml::Error),
}

impl fmt::Display for OsisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsisError::Io(err) => write!(f, "io error: {err}"),
            OsisError::Xml(err) => write!(f, "xml error: {err}"),
        }
    }
}

impl std::error::Error for OsisError {}

impl From<std::io::Error> for OsisError {
    fn from(value: std::io::Error) -> Self {
        OsisError::Io(value)
    }
}

impl From<quick_xml::Error> for OsisError {
    fn from(value: quick_xml::Error) -> Self {
        OsisError::Xml(value)
    }
}

impl From<quick_xml::events::attributes::AttrError> for OsisError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        OsisError::Xml(value.into())
    }
}

/// Strong's number (without leading zeros) → definition text.
#[derive(Debug, Clone, Default)]
pub struct StrongsDictionary {
    definitions: HashMap<String, String>,
}

impl StrongsDictionary {
    pub fn open(path: &Path) -> Result<Self, OsisError> {
        let reader = Reader::from_reader(BufReader::new(File::open(path)?));
        Self::from_reader(reader)
    }

    pub fn from_reader<R: BufRead>(mut reader: Reader<R>) -> Result<Self, OsisError> {
        let mut definitions = HashMap::new();
        let mut buf = Vec::new();
        let mut current: Option<String> = None;
        let mut definition: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"entry" => {
                        current = attribute(e, b"strongs")?
                            .map(|id| id.trim_start_matches('0').to_string());
                    }
                    b"strongs_def" if current.is_some() => definition = Some(String::new()),
                    _ => {}
                },
                Event::Text(e) => {
                    if let Some(text) = definition.as_mut() {
                        text.push_str(&e.unescape()?);
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"strongs_def" => {
                        if let (Some(id), Some(text)) = (current.as_ref(), definition.take()) {
                            definitions.insert(id.clone(), collapse_whitespace(&text));
                        }
                    }
                    b"entry" => current = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(Self { definitions })
    }

    /// Looks up a Strong's number with or without leading zeros.
    pub fn get(&self, strong: &str) -> Option<&str> {
        self.definitions
            .get(strong.trim_start_matches('0'))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Loads `tischendorfmorph.xml` and, when present, `strongsgreek.xml` from `dir`.
pub fn load_dir(dir: &Path) -> Result<Corpus, OsisError> {
    let strongs_path = dir.join(STRONGS_FILE);
    let dictionary = if strongs_path.exists() {
        StrongsDictionary::open(&strongs_path)?
    } else {
        StrongsDictionary::default()
    };
    load_files(&dir.join(TEXT_FILE), &dictionary)
}

pub fn load_files(text_path: &Path, dictionary: &StrongsDictionary) -> Result<Corpus, OsisError> {
    let reader = Reader::from_reader(BufReader::new(File::open(text_path)?));
    let corpus = build_corpus(reader, dictionary)?;
    info!(
        path = %text_path.display(),
        books = corpus.len(),
        definitions = dictionary.len(),
        "Built corpus from OSIS text"
    );
    Ok(corpus)
}

/// Walks the OSIS document once, collecting books, chapters and milestone-delimited verses.
pub fn build_corpus<R: BufRead>(
    mut reader: Reader<R>,
    dictionary: &StrongsDictionary,
) -> Result<Corpus, OsisError> {
    let mut corpus = Corpus::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut book: Option<BookState> = None;
    let mut chapter: Option<ChapterState> = None;
    let mut in_book_title = false;
    let mut word: Option<WordState> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"div" if attribute(e, b"type")?.as_deref() == Some("book") => {
                        book = Some(BookState {
                            depth,
                            osis_id: attribute(e, b"osisID")?,
                            title: None,
                            book: Book::new(),
                        });
                    }
                    b"title" => {
                        in_book_title = book
                            .as_ref()
                            .is_some_and(|b| b.title.is_none() && depth == b.depth + 1);
                        if in_book_title {
                            if let Some(b) = book.as_mut() {
                                b.title = Some(String::new());
                            }
                        }
                    }
                    b"chapter" if book.is_some() => {
                        chapter = Some(ChapterState::new(depth, attribute(e, b"osisID")?));
                    }
                    b"verse" => {
                        if let Some(ch) = chapter.as_mut() {
                            ch.verse_marker(e)?;
                        }
                    }
                    b"w" if chapter.as_ref().is_some_and(ChapterState::in_verse) => {
                        word = Some(WordState::new(e)?);
                    }
                    _ => {}
                }
            }
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"verse" => {
                    if let Some(ch) = chapter.as_mut() {
                        ch.verse_marker(e)?;
                    }
                }
                b"chapter" if book.is_some() => {
                    let state = ChapterState::new(depth + 1, attribute(e, b"osisID")?);
                    if let Some(b) = book.as_mut() {
                        state.finish(&mut b.book);
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                let text = e.unescape()?;
                if let Some(w) = word.as_mut() {
                    w.text.push_str(&text);
                } else if in_book_title {
                    if let Some(title) = book.as_mut().and_then(|b| b.title.as_mut()) {
                        title.push_str(&text);
                    }
                }
            }
            Event::End(ref e) => {
                match e.local_name().as_ref() {
                    b"w" => {
                        if let (Some(w), Some(ch)) = (word.take(), chapter.as_mut()) {
                            ch.push_word(w, dictionary);
                        }
                    }
                    b"title" => in_book_title = false,
                    b"chapter" if chapter.as_ref().is_some_and(|c| c.depth == depth) => {
                        if let (Some(state), Some(b)) = (chapter.take(), book.as_mut()) {
                            state.finish(&mut b.book);
                        }
                    }
                    b"div" if book.as_ref().is_some_and(|b| b.depth == depth) => {
                        if let Some(state) = book.take() {
                            state.finish(&mut corpus);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(corpus)
}

struct BookState {
    depth: usize,
    osis_id: Option<String>,
    title: Option<String>,
    book: Book,
}

impl BookState {
    fn finish(self, corpus: &mut Corpus) {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or(self.osis_id);
        if let Some(title) = title {
            corpus.insert_book(sanitize_key(&title), self.book);
        }
    }
}

struct ChapterState {
    depth: usize,
    key: String,
    verses: Vec<Verse>,
    current: Option<OpenVerse>,
}

struct OpenVerse {
    id: String,
    words: Vec<Word>,
}

impl ChapterState {
    fn new(depth: usize, osis_id: Option<String>) -> Self {
        Self {
            depth,
            key: sanitize_key(&osis_id.unwrap_or_default()),
            verses: Vec::new(),
            current: None,
        }
    }

    fn in_verse(&self) -> bool {
        self.current.is_some()
    }

    fn verse_marker(&mut self, e: &BytesStart<'_>) -> Result<(), OsisError> {
        if attribute(e, b"sID")?.is_some() {
            self.close_verse();
            self.current = attribute(e, b"osisID")?.map(|id| OpenVerse {
                id,
                words: Vec::new(),
            });
        } else if let Some(end) = attribute(e, b"eID")? {
            if self.current.as_ref().is_some_and(|v| v.id == end) {
                self.close_verse();
            }
        }
        Ok(())
    }

    fn push_word(&mut self, state: WordState, dictionary: &StrongsDictionary) {
        if let Some(verse) = self.current.as_mut() {
            if let Some(word) = state.into_word(dictionary) {
                verse.words.push(word);
            }
        }
    }

    fn close_verse(&mut self) {
        if let Some(open) = self.current.take() {
            let verse_text = if open.words.is_empty() {
                NO_TEXT.to_string()
            } else {
                open.words
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            self.verses.push(Verse {
                verse_id: open.id,
                verse_text: Some(verse_text),
                words_info: open.words,
            });
        }
    }

    fn finish(mut self, book: &mut Book) {
        self.close_verse();
        book.insert_chapter(self.key, self.verses);
    }
}

struct WordState {
    lemma_attr: String,
    morph_attr: String,
    text: String,
}

impl WordState {
    fn new(e: &BytesStart<'_>) -> Result<Self, OsisError> {
        Ok(Self {
            lemma_attr: attribute(e, b"lemma")?.unwrap_or_default(),
            morph_attr: attribute(e, b"morph")?.unwrap_or_default(),
            text: String::new(),
        })
    }

    fn into_word(self, dictionary: &StrongsDictionary) -> Option<Word> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        let strong = strong_number(&self.lemma_attr).unwrap_or_default();
        let lemma = self
            .lemma_attr
            .split_once(LEMMA_MARKER)
            .map(|(_, rest)| rest.trim().to_string())
            .unwrap_or_default();
        let definition = dictionary
            .get(&strong)
            .unwrap_or(NO_DEFINITION)
            .to_string();
        Some(Word {
            text: text.to_string(),
            lemma: Some(lemma),
            morph: Some(self.morph_attr.replace(MORPH_SCHEME, "")),
            strong: Some(strong),
            definition: Some(definition),
        })
    }
}

/// First `G` followed by digits in a lemma attribute, at most five digits kept.
fn strong_number(lemma_attr: &str) -> Option<String> {
    lemma_attr.match_indices('G').find_map(|(idx, _)| {
        let digits: String = lemma_attr[idx + 1..]
            .chars()
            .take_while(char::is_ascii_digit)
            .take(MAX_STRONG_DIGITS)
            .collect();
        (!digits.is_empty()).then_some(digits)
    })
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, OsisError> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
