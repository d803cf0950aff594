//! Book rendering: sorted chapter panels, verse lines and tooltip-bearing word units.

use crate::corpus::{ChapterKey, Corpus, Verse, Word, chapter_suffix};
use askama::Html as HtmlEscaper;
use askama::{MarkupDisplay, Template};
use tracing::{debug, warn};

/// Id of the element that receives the rendered chapter panels.
pub const CHAPTER_CONTAINER_ID: &str = "chapterContainer";

/// Id of the book selector element.
pub const BOOK_SELECTOR_ID: &str = "bookDropdown";

/// Renders the chapters of `book_key` from `corpus`.
///
/// An empty key, or one that names no book, yields an empty [`RenderedBook`].
pub fn render_book<'a>(corpus: &'a Corpus, book_key: &str) -> RenderedBook<'a> {
    if book_key.is_empty() {
        return RenderedBook::empty();
    }
    let Some((key, book)) = corpus.books().find(|(key, _)| *key == book_key) else {
        debug!(book = book_key, "selection does not name a book in the corpus");
        return RenderedBook::empty();
    };

    let mut ordered: Vec<(Option<u32>, &'a str, &'a [Verse])> = book
        .chapters()
        .map(|(chapter_key, verses)| {
            let number = match ChapterKey::parse(chapter_key) {
                Ok(parsed) => Some(parsed.number()),
                Err(err) => {
                    warn!(book = key, %err, "chapter sorted after numbered chapters");
                    None
                }
            };
            (number, chapter_key, verses)
        })
        .collect();
    ordered.sort_by_key(|(number, _, _)| (number.is_none(), number.unwrap_or(0)));

    RenderedBook {
        book_key: Some(key),
        chapters: ordered
            .into_iter()
            .enumerate()
            .map(|(position, (_, chapter_key, verses))| {
                ChapterPanel::new(position, chapter_key, verses)
            })
            .collect(),
    }
}

/// Formats the words of a verse as tooltip units separated by single spaces.
pub fn format_words(words: &[Word]) -> String {
    words
        .iter()
        .map(|word| WordUnit::new(word).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct RenderedBook<'a> {
    book_key: Option<&'a str>,
    chapters: Vec<ChapterPanel<'a>>,
}

impl<'a> RenderedBook<'a> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn book_key(&self) -> Option<&'a str> {
        self.book_key
    }

    pub fn chapters(&self) -> &[ChapterPanel<'a>] {
        &self.chapters
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Accordion markup for the chapter container. Empty when nothing was selected.
    pub fn to_html(&self) -> Result<String, askama::Error> {
        ChapterListTemplate {
            chapters: &self.chapters,
        }
        .render()
    }
}

#[derive(Debug, Clone)]
pub struct ChapterPanel<'a> {
    pub key: &'a str,
    pub label: String,
    pub heading_id: String,
    pub collapse_id: String,
    pub verses: Vec<VerseLine<'a>>,
}

impl<'a> ChapterPanel<'a> {
    /// `position` is the panel's index in the rendered book and keeps DOM ids
    /// unique when two keys share a slug. The label is the raw key suffix, so
    /// `ch_01` reads `Chapter 01`.
    fn new(position: usize, key: &'a str, verses: &'a [Verse]) -> Self {
        let slug = dom_slug(key);
        Self {
            key,
            label: chapter_suffix(key).to_string(),
            heading_id: format!("heading-{position}-{slug}"),
            collapse_id: format!("collapse-{position}-{slug}"),
            verses: verses.iter().map(VerseLine::new).collect(),
        }
    }

    /// Header text of the panel.
    pub fn title(&self) -> String {
        format!("Chapter {}", self.label)
    }
}

#[derive(Debug, Clone)]
pub struct VerseLine<'a> {
    pub verse_id: &'a str,
    pub words: Vec<WordUnit<'a>>,
}

impl<'a> VerseLine<'a> {
    fn new(verse: &'a Verse) -> Self {
        Self {
            verse_id: &verse.verse_id,
            words: verse.words_info.iter().map(WordUnit::new).collect(),
        }
    }

    pub fn formatted_words(&self) -> String {
        self.words
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Plain `<verse_id>: <words>` form of the line.
    pub fn plain_text(&self) -> String {
        let words = self
            .words
            .iter()
            .map(|word| word.text)
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}: {}", self.verse_id, words)
    }
}

/// One interactive word. Field values are escaped when rendered; click data
/// travels in `data-*` attributes read by the page script.
#[derive(Debug, Clone, Template)]
#[template(
    source = r#"<span class="word" data-bs-toggle="tooltip" data-bs-html="true" title="{{ tooltip }}" data-word-text="{{ text }}" data-lemma="{{ lemma }}" data-morph="{{ morph }}" data-strong="{{ strong }}" data-definition="{{ definition }}">{{ text }}</span>"#,
    ext = "html"
)]
pub struct WordUnit<'a> {
    pub text: &'a str,
    pub lemma: &'a str,
    pub morph: &'a str,
    pub strong: &'a str,
    pub definition: &'a str,
    tooltip: String,
}

impl<'a> WordUnit<'a> {
    pub fn new(word: &'a Word) -> Self {
        let mut unit = Self {
            text: &word.text,
            lemma: word.lemma_or_missing(),
            morph: word.morph_or_missing(),
            strong: word.strong_or_missing(),
            definition: word.definition_or_missing(),
            tooltip: String::new(),
        };
        unit.tooltip = unit
            .tooltip_lines()
            .iter()
            .map(|line| escape_html(line))
            .collect::<Vec<_>>()
            .join("<br>");
        unit
    }

    /// The four labelled tooltip lines, unescaped.
    pub fn tooltip_lines(&self) -> [String; 4] {
        [
            format!("Lemma: {}", self.lemma),
            format!("Morphology: {}", self.morph),
            format!("Strong's Number: {}", self.strong),
            format!("Definition: {}", self.definition),
        ]
    }

    /// Tooltip HTML content before it is placed in the `title` attribute.
    pub fn tooltip_markup(&self) -> &str {
        &self.tooltip
    }
}

#[derive(Template)]
#[template(
    source = r##"{% for chapter in chapters %}<div class="accordion-item">
  <h2 class="accordion-header" id="{{ chapter.heading_id }}">
    <button class="accordion-button collapsed" type="button" data-bs-toggle="collapse" data-bs-target="#{{ chapter.collapse_id }}" aria-expanded="false" aria-controls="{{ chapter.collapse_id }}">{{ chapter.title() }}</button>
  </h2>
  <div id="{{ chapter.collapse_id }}" class="accordion-collapse collapse" aria-labelledby="{{ chapter.heading_id }}" data-bs-parent="#chapterContainer">
    <div class="accordion-body">{% for verse in chapter.verses %}<p class="verse"><strong>{{ verse.verse_id }}</strong>: {{ verse.formatted_words()|safe }}</p>{% endfor %}</div>
  </div>
</div>
{% endfor %}"##,
    ext = "html"
)]
struct ChapterListTemplate<'a> {
    chapters: &'a [ChapterPanel<'a>],
}

pub(crate) fn escape_html(value: &str) -> String {
    MarkupDisplay::new_unsafe(value, HtmlEscaper).to_string()
}

fn dom_slug(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &[u8] = r#"{"Gen_1": {"ch_1": [{"verse_id":"1:1","words_info":[{"text":"In","lemma":"ἐν"}]}]}}"#.as_bytes();

    fn corpus(json: &str) -> Corpus {
        Corpus::from_json_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn chapters_sort_numerically_by_suffix() {
        let corpus = corpus(r#"{"B": {"ch_10": [], "ch_2": [], "ch_1": []}}"#);
        let rendered = render_book(&corpus, "B");
        let keys: Vec<_> = rendered.chapters().iter().map(|c| c.key).collect();
        assert_eq!(keys, ["ch_1", "ch_2", "ch_10"]);
        let titles: Vec<_> = rendered.chapters().iter().map(|c| c.title()).collect();
        assert_eq!(titles, ["Chapter 1", "Chapter 2", "Chapter 10"]);
    }

    #[test]
    fn renders_exactly_the_chapters_of_the_selected_book() {
        let corpus = corpus(
            r#"{"A": {"A_1": [], "A_2": []}, "B": {"B_1": [], "B_2": [], "B_3": []}}"#,
        );
        let rendered = render_book(&corpus, "A");
        assert_eq!(rendered.book_key(), Some("A"));
        let keys: Vec<_> = rendered.chapters().iter().map(|c| c.key).collect();
        assert_eq!(keys, ["A_1", "A_2"]);
    }

    #[test]
    fn keys_outside_the_contract_sort_last_in_source_order() {
        let corpus = corpus(r#"{"B": {"intro": [], "ch_3": [], "ch_x": [], "ch_1": []}}"#);
        let rendered = render_book(&corpus, "B");
        let keys: Vec<_> = rendered.chapters().iter().map(|c| c.key).collect();
        assert_eq!(keys, ["ch_1", "ch_3", "intro", "ch_x"]);
        assert_eq!(rendered.chapters()[2].title(), "Chapter intro");
        assert_eq!(rendered.chapters()[3].title(), "Chapter x");
    }

    #[test]
    fn verses_keep_source_order() {
        let corpus = corpus(
            r#"{"B": {"B_1": [
                {"verse_id": "1:3", "words_info": []},
                {"verse_id": "1:1", "words_info": []},
                {"verse_id": "1:2", "words_info": []}
            ]}}"#,
        );
        let rendered = render_book(&corpus, "B");
        let ids: Vec<_> = rendered.chapters()[0]
            .verses
            .iter()
            .map(|v| v.verse_id)
            .collect();
        assert_eq!(ids, ["1:3", "1:1", "1:2"]);
    }

    #[test]
    fn empty_or_unknown_selection_renders_nothing() {
        let corpus = Corpus::from_json_slice(GENESIS).unwrap();
        for key in ["", "Exod_1"] {
            let rendered = render_book(&corpus, key);
            assert!(rendered.is_empty());
            assert_eq!(rendered.book_key(), None);
            assert_eq!(rendered.to_html().unwrap(), "");
        }
    }

    #[test]
    fn missing_definition_reads_placeholder() {
        let word = Word {
            text: "λόγος".into(),
            lemma: Some("λόγος".into()),
            morph: Some("N-NSM".into()),
            strong: Some("3056".into()),
            definition: None,
        };
        let unit = WordUnit::new(&word);
        let lines = unit.tooltip_lines();
        assert_eq!(lines[0], "Lemma: λόγος");
        assert_eq!(lines[1], "Morphology: N-NSM");
        assert_eq!(lines[2], "Strong's Number: 3056");
        assert_eq!(lines[3], "Definition: N/A");
    }

    #[test]
    fn end_to_end_genesis_scenario() {
        let corpus = Corpus::from_json_slice(GENESIS).unwrap();
        let rendered = render_book(&corpus, "Gen_1");
        assert_eq!(rendered.chapters().len(), 1);
        let chapter = &rendered.chapters()[0];
        assert_eq!(chapter.title(), "Chapter 1");
        assert_eq!(chapter.verses.len(), 1);
        let verse = &chapter.verses[0];
        assert_eq!(verse.plain_text(), "1:1: In");
        let unit = &verse.words[0];
        assert_eq!(unit.text, "In");
        assert_eq!(
            unit.tooltip_lines(),
            [
                "Lemma: ἐν".to_string(),
                "Morphology: N/A".to_string(),
                "Strong's Number: N/A".to_string(),
                "Definition: N/A".to_string(),
            ]
        );

        let html = rendered.to_html().unwrap();
        assert_eq!(html.matches("accordion-item").count(), 1);
        assert!(html.contains(">Chapter 1</button>"));
        assert!(html.contains("<strong>1:1</strong>: <span class=\"word\""));
        assert!(html.contains("data-bs-toggle=\"tooltip\" data-bs-html=\"true\""));
        assert!(html.contains("data-lemma=\"ἐν\""));
        assert!(html.contains(">In</span></p>"));
    }

    #[test]
    fn empty_chapter_renders_empty_body() {
        let corpus = corpus(r#"{"B": {"B_1": []}}"#);
        let html = render_book(&corpus, "B").to_html().unwrap();
        assert!(html.contains(r#"<div class="accordion-body"></div>"#));
    }

    #[test]
    fn verse_without_words_has_empty_formatted_words() {
        let corpus = corpus(r#"{"B": {"B_1": [{"verse_id": "1:1", "words_info": []}]}}"#);
        let rendered = render_book(&corpus, "B");
        assert_eq!(rendered.chapters()[0].verses[0].formatted_words(), "");
        let html = rendered.to_html().unwrap();
        assert!(html.contains("<strong>1:1</strong>: </p>"));
    }

    #[test]
    fn words_are_joined_by_single_spaces() {
        let words = vec![Word::new("Ἐν"), Word::new("ἀρχῇ"), Word::new("ἦν")];
        let html = format_words(&words);
        assert_eq!(html.matches("<span class=\"word\"").count(), 3);
        assert_eq!(html.matches("</span> <span").count(), 2);
        assert!(format_words(&[]).is_empty());
    }

    #[test]
    fn field_values_are_escaped_in_markup_and_attributes() {
        let word = Word {
            text: "<b>x</b>".into(),
            lemma: Some("a\"b".into()),
            morph: Some("it's".into()),
            strong: None,
            definition: Some("<script>alert(1)</script>".into()),
        };
        let unit = WordUnit::new(&word);
        assert!(unit.tooltip_markup().contains("Definition: &lt;script&gt;"));
        assert!(unit.tooltip_markup().contains("<br>Morphology:"));

        let html = unit.to_string();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(!html.contains("a\"b"));
        assert!(html.contains(">&lt;b&gt;x&lt;"));
        assert!(html.contains("&amp;lt;script&amp;gt;"));
        assert!(html.contains("&lt;br&gt;"));
        assert_eq!(html.matches('"').count(), 18);
    }

    #[test]
    fn rendering_is_idempotent() {
        let corpus = Corpus::from_json_slice(GENESIS).unwrap();
        let first = render_book(&corpus, "Gen_1").to_html().unwrap();
        let second = render_book(&corpus, "Gen_1").to_html().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.matches("accordion-item").count(), 1);
    }

    #[test]
    fn dom_ids_are_derived_from_chapter_keys() {
        let corpus = corpus(r#"{"B": {"Matt_1": [], "odd key_2": []}}"#);
        let rendered = render_book(&corpus, "B");
        assert_eq!(rendered.chapters()[0].collapse_id, "collapse-0-Matt_1");
        assert_eq!(rendered.chapters()[1].heading_id, "heading-1-odd-key_2");
    }

    #[test]
    fn dom_ids_stay_unique_when_slugs_collide() {
        let corpus = corpus(r#"{"B": {"a.b_1": [], "a b_1": [], "a-b_1": []}}"#);
        let rendered = render_book(&corpus, "B");
        let mut ids: Vec<_> = rendered
            .chapters()
            .iter()
            .flat_map(|c| [c.heading_id.as_str(), c.collapse_id.as_str()])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);

        let html = rendered.to_html().unwrap();
        for chapter in rendered.chapters() {
            let target = format!("data-bs-target=\"#{}\"", chapter.collapse_id);
            assert_eq!(html.matches(&target).count(), 1);
        }
    }

    #[test]
    fn header_shows_raw_key_suffix() {
        let corpus = corpus(r#"{"B": {"ch_10": [], "ch_01": []}}"#);
        let rendered = render_book(&corpus, "B");
        let titles: Vec<_> = rendered.chapters().iter().map(|c| c.title()).collect();
        assert_eq!(titles, ["Chapter 01", "Chapter 10"]);
    }
}
