//! String compressor properties over random corpora.

use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use jiten::compress::StringCompressor;
use jiten::error::Result;
use jiten::storage::{MemoryStorage, Storage, StructReader, StructWriter};

fn random_corpus(rng: &mut StdRng, alphabet: &[char], count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let len = rng.random_range(0..20);
            (0..len)
                .map(|_| {
                    // Skewed choice so code lengths differ.
                    let skew = rng.random_range(0..alphabet.len() * alphabet.len());
                    alphabet[skew.isqrt()]
                })
                .collect()
        })
        .collect()
}

fn build(corpus: &[String]) -> Result<StringCompressor> {
    let mut compressor = StringCompressor::new();
    for text in corpus {
        compressor.add_string(Some(text))?;
    }
    compressor.finished_adding()?;
    Ok(compressor)
}

#[test]
fn test_every_string_round_trips() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let alphabet: Vec<char> = "aeiouねこ猫背 'é𝄞".chars().collect();
    let corpus = random_corpus(&mut rng, &alphabet, 500);
    let compressor = build(&corpus)?;

    // All strings back to back in one stream.
    let mut stream = Vec::new();
    for text in &corpus {
        compressor.write_string(&mut stream, Some(text))?;
    }
    let mut reader = Cursor::new(stream);
    for text in &corpus {
        let decoded = compressor.read_string(&mut reader)?.unwrap_or_default();
        assert_eq!(&decoded, text);
    }
    assert_eq!(reader.position() as usize, reader.get_ref().len());
    Ok(())
}

#[test]
fn test_empty_and_missing_strings() -> Result<()> {
    let compressor = build(&["abc".to_string()])?;
    for text in [None, Some("")] {
        let bytes = compressor.encode(text)?;
        assert_eq!(compressor.read_string(&mut Cursor::new(bytes))?, None);
    }
    Ok(())
}

#[test]
fn test_frequent_symbols_get_shorter_codes() -> Result<()> {
    let mut corpus = vec!["e".repeat(200)];
    corpus.push("xyz".to_string());
    let compressor = build(&corpus)?;
    let frequent = compressor.encode(Some(&"e".repeat(64)))?.len();
    let rare = compressor.encode(Some(&"x".repeat(64)))?.len();
    assert!(frequent < rare, "{frequent} >= {rare}");
    Ok(())
}

#[test]
fn test_saved_tree_decodes_identically() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(12);
    let alphabet: Vec<char> = "かきくけこカキクケコ".chars().collect();
    let corpus = random_corpus(&mut rng, &alphabet, 200);
    let compressor = build(&corpus)?;

    let storage = MemoryStorage::new_default();
    let mut writer = StructWriter::new(storage.create_output("tree")?);
    compressor.save(&mut writer)?;
    writer.close()?;

    let mut loaded = StringCompressor::new();
    loaded.load(&mut StructReader::new(storage.open_input("tree")?)?)?;
    assert_eq!(loaded.alphabet_size(), compressor.alphabet_size());

    for text in &corpus {
        let bytes = compressor.encode(Some(text))?;
        assert_eq!(loaded.encode(Some(text))?, bytes);
        let decoded = loaded.read_string(&mut Cursor::new(bytes))?.unwrap_or_default();
        assert_eq!(&decoded, text);
    }
    Ok(())
}

#[test]
fn test_unknown_character_is_rejected() -> Result<()> {
    let compressor = build(&["abc".to_string()])?;
    assert!(compressor.encode(Some("abd")).is_err());
    Ok(())
}
