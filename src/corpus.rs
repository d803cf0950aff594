//! In-memory corpus model: books → chapters → verses → words.
//!
//! Both levels of keyed data (books in a corpus, chapters in a book) keep the
//! order in which they were received, because the selector lists books in
//! server order and chapter ordering is decided later by [`ChapterKey`].

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Placeholder shown for any annotation field that is absent or empty.
pub const MISSING_FIELD: &str = "N/A";

/// Separator between the book part and the chapter number of a chapter key.
pub const KEY_SEPARATOR: char = '_';

/// Separator restored in book labels for display.
pub const DISPLAY_SEPARATOR: char = '.';

/// A string-keyed map that preserves insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap {
                    entries: Vec::with_capacity(access.size_hint().unwrap_or(0)),
                };
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// The full corpus, keyed by book identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    books: OrderedMap<Book>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn insert_book(&mut self, key: impl Into<String>, book: Book) {
        self.books.insert(key, book);
    }

    pub fn book(&self, key: &str) -> Option<&Book> {
        self.books.get(key)
    }

    /// Book keys in received order.
    pub fn book_keys(&self) -> impl Iterator<Item = &str> {
        self.books.keys()
    }

    pub fn books(&self) -> impl Iterator<Item = (&str, &Book)> {
        self.books.iter()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// One book, keyed by chapter identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Book {
    chapters: OrderedMap<Vec<Verse>>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chapter(&mut self, key: impl Into<String>, verses: Vec<Verse>) {
        self.chapters.insert(key, verses);
    }

    pub fn chapter(&self, key: &str) -> Option<&[Verse]> {
        self.chapters.get(key).map(Vec::as_slice)
    }

    pub fn chapter_keys(&self) -> impl Iterator<Item = &str> {
        self.chapters.keys()
    }

    pub fn chapters(&self) -> impl Iterator<Item = (&str, &[Verse])> {
        self.chapters
            .iter()
            .map(|(key, verses)| (key, verses.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub verse_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse_text: Option<String>,
    pub words_info: Vec<Word>,
}

impl Verse {
    pub fn new(verse_id: impl Into<String>, words_info: Vec<Word>) -> Self {
        Self {
            verse_id: verse_id.into(),
            verse_text: None,
            words_info,
        }
    }
}

/// A surface word with its optional annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strong: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn lemma_or_missing(&self) -> &str {
        annotation(&self.lemma)
    }

    pub fn morph_or_missing(&self) -> &str {
        annotation(&self.morph)
    }

    pub fn strong_or_missing(&self) -> &str {
        annotation(&self.strong)
    }

    pub fn definition_or_missing(&self) -> &str {
        annotation(&self.definition)
    }
}

fn annotation(value: &Option<String>) -> &str {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .unwrap_or(MISSING_FIELD)
}

/// Display label for a book key: underscores become periods.
pub fn book_label(key: &str) -> String {
    key.replace(KEY_SEPARATOR, &DISPLAY_SEPARATOR.to_string())
}

/// Inverse of [`book_label`] for identifiers coming from the source text.
pub fn sanitize_key(identifier: &str) -> String {
    identifier.replace(DISPLAY_SEPARATOR, &KEY_SEPARATOR.to_string())
}

/// A chapter key following the `"<book>_<chapterNumber>"` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterKey<'a> {
    raw: &'a str,
    prefix: &'a str,
    number: u32,
}

impl<'a> ChapterKey<'a> {
    pub fn parse(raw: &'a str) -> Result<Self, ChapterKeyError> {
        let (prefix, suffix) = raw
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| ChapterKeyError::MissingSeparator(raw.to_string()))?;
        if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ChapterKeyError::InvalidNumber(raw.to_string()));
        }
        let number = suffix
            .parse()
            .map_err(|_| ChapterKeyError::InvalidNumber(raw.to_string()))?;
        Ok(Self {
            raw,
            prefix,
            number,
        })
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// Everything before the last separator, usually the book part.
    pub fn prefix(&self) -> &'a str {
        self.prefix
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

/// Text after the last separator, or the whole key when there is none.
pub fn chapter_suffix(raw: &str) -> &str {
    raw.rsplit_once(KEY_SEPARATOR)
        .map(|(_, suffix)| suffix)
        .unwrap_or(raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterKeyError {
    MissingSeparator(String),
    InvalidNumber(String),
}

impl fmt::Display for ChapterKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterKeyError::MissingSeparator(key) => {
                write!(f, "chapter key {key:?} has no `{KEY_SEPARATOR}` separator")
            }
            ChapterKeyError::InvalidNumber(key) => {
                write!(f, "chapter key {key:?} does not end in a chapter number")
            }
        }
    }
}

impl std::error::Error for ChapterKeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_preserves_received_book_order() {
        let json = br#"{"Matt": {}, "Acts": {}, "Mark": {}, "John": {}}"#;
        let corpus = Corpus::from_json_slice(json).unwrap();
        let keys: Vec<_> = corpus.book_keys().collect();
        assert_eq!(keys, ["Matt", "Acts", "Mark", "John"]);

        let encoded = String::from_utf8(corpus.to_json_vec().unwrap()).unwrap();
        assert_eq!(encoded, r#"{"Matt":{},"Acts":{},"Mark":{},"John":{}}"#);
    }

    #[test]
    fn duplicate_key_keeps_first_position_and_last_value() {
        let json = br#"{"a_1": [], "b_2": [], "a_1": [{"verse_id": "x", "words_info": []}]}"#;
        let book: Book = serde_json::from_slice(json).unwrap();
        let keys: Vec<_> = book.chapter_keys().collect();
        assert_eq!(keys, ["a_1", "b_2"]);
        assert_eq!(book.chapter("a_1").unwrap().len(), 1);
    }

    #[test]
    fn word_annotations_fall_back_to_placeholder() {
        let json = r#"{"text": "In", "lemma": "ἐν", "morph": "", "strong": null}"#.as_bytes();
        let word: Word = serde_json::from_slice(json).unwrap();
        assert_eq!(word.lemma_or_missing(), "ἐν");
        assert_eq!(word.morph_or_missing(), MISSING_FIELD);
        assert_eq!(word.strong_or_missing(), MISSING_FIELD);
        assert_eq!(word.definition_or_missing(), MISSING_FIELD);
    }

    #[test]
    fn verse_without_words_info_fails_to_decode() {
        let json = br#"{"Gen_1": {"ch_1": [{"verse_id": "1:1"}]}}"#;
        assert!(Corpus::from_json_slice(json).is_err());
    }

    #[test]
    fn book_label_replaces_every_underscore() {
        assert_eq!(book_label("Genesis_1"), "Genesis.1");
        assert_eq!(book_label("I_Cor_1"), "I.Cor.1");
        assert_eq!(sanitize_key("Matt.1"), "Matt_1");
    }

    #[test]
    fn chapter_key_parses_last_numeric_suffix() {
        let key = ChapterKey::parse("I_Cor_12").unwrap();
        assert_eq!(key.prefix(), "I_Cor");
        assert_eq!(key.number(), 12);
        assert_eq!(key.raw(), "I_Cor_12");
    }

    #[test]
    fn chapter_key_rejects_keys_outside_the_contract() {
        assert_eq!(
            ChapterKey::parse("prologue"),
            Err(ChapterKeyError::MissingSeparator("prologue".into()))
        );
        assert_eq!(
            ChapterKey::parse("ch_x"),
            Err(ChapterKeyError::InvalidNumber("ch_x".into()))
        );
        assert_eq!(
            ChapterKey::parse("ch_"),
            Err(ChapterKeyError::InvalidNumber("ch_".into()))
        );
        assert_eq!(chapter_suffix("prologue"), "prologue");
        assert_eq!(chapter_suffix("ch_x"), "x");
    }
}
