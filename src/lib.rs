pub mod corpus;
pub mod loader;
pub mod osis;
pub mod render;
#[cfg(feature = "web")]
pub mod web;

pub use corpus::{Book, ChapterKey, ChapterKeyError, Corpus, MISSING_FIELD, Verse, Word};
#[cfg(feature = "client")]
pub use loader::HttpSource;
pub use loader::{
    BookOption, CONTENT_PATH, CorpusSource, JsonFileSource, LoadError, Loader, OsisSource, Viewer,
    selector_options,
};
pub use osis::{OsisError, StrongsDictionary};
pub use render::{RenderedBook, WordUnit, format_words, render_book};
