use crate::{c_lang, HighlightIndex, TagName};
use std::path::{Path, PathBuf};

pub const TEST_STYLES: &[&str] = &[
    c_lang::STYLE_TYPE,
    c_lang::STYLE_FUNCTION_NAME,
    c_lang::STYLE_ENUM_NAME,
    c_lang::STYLE_MACRO_NAME,
];

pub fn mk_filestem(file_name_stem: &str) -> PathBuf {
    let mut path = PathBuf::new();

    path.push("test-tmp");
    path.push("end_to_end_serialization");
    path.push(file_name_stem);

    path
}

/// Produces `count` distinct identifier-like words. The sequence is the same
/// on every call.
pub fn generate_words(count: usize) -> Vec<String> {
    // xorshift, so that words do not come out sorted.
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;

    (0..count)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            let prefix = match state % 4 {
                0 => "g_",
                1 => "Gtk",
                2 => "IDE_",
                _ => "",
            };
            format!("{}{:x}_{}", prefix, state % 0xffff, i)
        })
        .collect()
}

/// The style `generate_words()[i]` is inserted with.
pub fn style_for(i: usize) -> &'static str {
    TEST_STYLES[i % TEST_STYLES.len()]
}

pub fn build_index(words: &[String], chunk_size: usize) -> HighlightIndex<&'static str> {
    let mut index = HighlightIndex::with_chunk_size(chunk_size);

    for (i, word) in words.iter().enumerate() {
        index.insert(word, style_for(i));
    }

    index
}

pub fn assert_same_lookups(
    words: &[String],
    expected: &HighlightIndex<&'static str>,
    actual: &HighlightIndex<TagName>,
) {
    assert_eq!(expected.len(), actual.len());

    for word in words {
        let expected = expected.lookup(word).copied();
        let actual = actual.lookup(word).map(|tag| &**tag);
        assert_eq!(expected, actual, "word `{}`", word);
    }

    assert_eq!(actual.lookup("not-a-generated-word"), None);
}

// Build an index the way a highlighter worker would, persist it, and load it
// back on the "other side".
pub fn run_end_to_end_serialization_test(file_name_stem: &str) {
    let filestem = mk_filestem(file_name_stem);
    let path = filestem.with_extension(crate::file_header::FILE_EXTENSION);

    let words = generate_words(10_000);
    let index = build_index(&words, 256);
    assert!(index.arena_chunks() > 1);

    index.save(&path).unwrap();

    let loaded = HighlightIndex::load(Path::new(&path)).unwrap();
    assert_same_lookups(&words, &index, &loaded);

    // Saving the loaded index again yields an equivalent file.
    let resaved = filestem.with_extension("resaved.hlix");
    loaded.save(&resaved).unwrap();
    let reloaded = HighlightIndex::load(&resaved).unwrap();
    assert_same_lookups(&words, &index, &reloaded);
}
