use tantivy::schema::{Field, IndexRecordOption, TextFieldIndexing, TextOptions};
use tantivy::tokenizer::{LowerCaser, RawTokenizer, TextAnalyzer};
use tantivy::{Index, Term};

/// Tokenizer name of the lowercase keyword analysis strategy.
pub const LOWERCASE_KEYWORD: &str = "lowercase_keyword";

/// The whole field value as a single token, lowercased.
///
/// Suits identifiers and codes that must match exactly but without regard to case.
pub fn lowercase_keyword_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build()
}

/// Make [`LOWERCASE_KEYWORD`] available to fields of `index`.
pub fn register_lowercase_keyword(index: &Index) {
    index
        .tokenizers()
        .register(LOWERCASE_KEYWORD, lowercase_keyword_analyzer());
}

/// Field options for a text field analyzed with [`LOWERCASE_KEYWORD`].
pub fn lowercase_keyword_text_options() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(LOWERCASE_KEYWORD)
            .set_index_option(IndexRecordOption::Basic),
    )
}

/// Term matching `value` in a [`LOWERCASE_KEYWORD`] field.
pub fn lowercase_keyword_term(field: Field, value: &str) -> Term {
    Term::from_field_text(field, &value.to_lowercase())
}
