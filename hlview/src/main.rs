#[macro_use]
extern crate prettytable;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use clap::Parser;
use hlindex::{HighlightIndex, IndexFile, TagName, Variant};
use prettytable::Table;

#[derive(Parser, Debug)]
struct FileOpt {
    /// A highlight index file (`.hlix`) or a JSON payload (`.json`)
    file: PathBuf,
}

#[derive(Parser, Debug)]
struct LookupOpt {
    file: PathBuf,

    /// Words to look up
    #[arg(required = true)]
    words: Vec<String>,
}

#[derive(Parser, Debug)]
struct ConvertOpt {
    input: PathBuf,

    /// Output file; a `.json` extension writes JSON, anything else an index file
    output: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Inspect and convert highlight index files")]
enum Opt {
    /// Print every tag with its words
    #[command(name = "show")]
    Show(FileOpt),

    /// Print the tag of each given word
    #[command(name = "lookup")]
    Lookup(LookupOpt),

    /// Print metadata and a table of word counts per tag
    #[command(name = "summary")]
    Summary(FileOpt),

    /// Convert between index files and JSON payloads
    #[command(name = "convert")]
    Convert(ConvertOpt),
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "json")
}

fn read_file(path: &Path) -> Result<IndexFile, Box<dyn Error + Send + Sync>> {
    if !is_json(path) {
        return IndexFile::read(path);
    }

    let contents = fs::read(path)?;
    let json: serde_json::Value = serde_json::from_slice(&contents)?;

    match Variant::from_json(&json) {
        Some(payload @ Variant::Dict(_)) => Ok(IndexFile::new(payload)),
        _ => Err(format!("`{}` does not contain a JSON object", path.display()).into()),
    }
}

fn load_index(path: &Path) -> Result<HighlightIndex<TagName>, Box<dyn Error + Send + Sync>> {
    Ok(read_file(path)?.into_index())
}

/// Tags and their words, both sorted.
fn sorted_groups(index: &HighlightIndex<TagName>) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = match index.to_variant() {
        Variant::Dict(entries) => entries
            .into_iter()
            .filter_map(|(tag, words)| match words {
                Variant::StrArray(mut words) => {
                    words.sort();
                    Some((tag, words))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    groups.sort();
    groups
}

fn show(opt: &FileOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let index = load_index(&opt.file)?;

    for (tag, words) in sorted_groups(&index) {
        println!("{}:", tag);
        for word in words {
            println!("    {}", word);
        }
    }

    Ok(())
}

fn lookup(opt: &LookupOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let index = load_index(&opt.file)?;

    for word in &opt.words {
        match index.lookup(word) {
            Some(tag) => println!("{}\t{}", word, tag),
            None => println!("{}\t-", word),
        }
    }

    Ok(())
}

fn summary(opt: &FileOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let file = read_file(&opt.file)?;
    let metadata = file.metadata.clone();
    let index = file.into_index();

    let created_at = metadata
        .created_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    println!("Generator: {}", metadata.generator);
    println!("Created at: {} (seconds since the epoch)", created_at);
    println!(
        "Entries: {} (recorded {}), arena bytes: {} (recorded {})",
        index.len(),
        metadata.entries,
        index.arena_bytes(),
        metadata.arena_bytes
    );

    let mut groups = sorted_groups(&index);

    // order the groups by descending word count
    groups.sort_by(|l, r| r.1.len().cmp(&l.1.len()).then_with(|| l.0.cmp(&r.0)));

    let mut table = Table::new();

    table.add_row(row!["Tag", "Words", "% of words"]);

    let total = index.len().max(1) as f64;

    for (tag, words) in groups {
        table.add_row(row![
            tag,
            format!("{}", words.len()),
            format!("{:.2}", (words.len() as f64 / total) * 100.0),
        ]);
    }

    table.printstd();

    Ok(())
}

fn convert(opt: &ConvertOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let file = read_file(&opt.input)?;

    if is_json(&opt.output) {
        let json = serde_json::to_string_pretty(&file.payload.to_json())?;
        fs::write(&opt.output, json)?;
    } else {
        // Normalize through an index so that duplicate and empty words are
        // dropped the same way a reader would drop them.
        file.into_index().save(&opt.output)?;
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opt = Opt::parse();

    match opt {
        Opt::Show(opt) => show(&opt),
        Opt::Lookup(opt) => lookup(&opt),
        Opt::Summary(opt) => summary(&opt),
        Opt::Convert(opt) => convert(&opt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_sorted() {
        let mut index = HighlightIndex::new();
        index.insert("b", TagName::from("y"));
        index.insert("a", TagName::from("y"));
        index.insert("c", TagName::from("x"));

        assert_eq!(
            sorted_groups(&index),
            vec![
                ("x".to_string(), vec!["c".to_string()]),
                ("y".to_string(), vec!["a".to_string(), "b".to_string()]),
            ]
        );
    }

    #[test]
    fn json_detection() {
        assert!(is_json(Path::new("index.json")));
        assert!(!is_json(Path::new("index.hlix")));
        assert!(!is_json(Path::new("json")));
    }

    #[test]
    fn convert_json_to_index_and_back() {
        let dir = Path::new("test-tmp").join("hlview");
        fs::create_dir_all(&dir).unwrap();

        let json_in = dir.join("in.json");
        let index_file = dir.join("converted.hlix");
        let json_out = dir.join("out.json");

        fs::write(&json_in, r#"{ "c:type": ["GList", "GList", ""], "bad": [1] }"#).unwrap();

        convert(&ConvertOpt {
            input: json_in,
            output: index_file.clone(),
        })
        .unwrap();

        let index = HighlightIndex::load(&index_file).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("GList").map(|t| &**t), Some("c:type"));

        convert(&ConvertOpt {
            input: index_file,
            output: json_out.clone(),
        })
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&json_out).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "c:type": ["GList"] }));
    }
}
