//! Command implementations for the jiten CLI.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::{debug, info};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::dictionary::header::read_any_header;
use crate::dictionary::{
    Dictionary, DictionaryBuilder, DictionaryConfig, Entry, FileKind, leftover_temp_files,
};
use crate::error::{JitenError, Result};
use crate::storage::{FileStorage, Storage, StorageConfig, StructReader, verify_checksum};

/// Execute a CLI command.
pub fn execute_command(args: JitenArgs) -> Result<()> {
    match &args.command {
        Command::Build(build_args) => build_dictionary(build_args.clone(), &args),
        Command::Search(search_args) => search_dictionary(search_args.clone(), &args),
        Command::Inspect(inspect_args) => inspect_dictionary(inspect_args.clone(), &args),
    }
}

/// Build a dictionary from a JSON entries file.
fn build_dictionary(args: BuildArgs, cli_args: &JitenArgs) -> Result<()> {
    let start_time = Instant::now();
    let config = load_config(args.config.as_deref())?;

    let entries = load_entries(&args.entries_file)?;
    info!(
        "loaded {} entries from {}",
        entries.len(),
        args.entries_file.display()
    );

    let mut builder = DictionaryBuilder::new(config);
    for (position, entry) in entries.into_iter().enumerate() {
        builder.add_entry(entry).map_err(|e| {
            JitenError::invalid_argument(format!("entry {position}: {e}"))
        })?;
    }

    let storage = FileStorage::new(&args.directory, StorageConfig::default())?;
    let summary = builder.build(&storage, &args.name)?;

    output_result(
        "Dictionary built successfully",
        &BuildResult {
            directory: args.directory.to_string_lossy().to_string(),
            name: args.name,
            duration_ms: start_time.elapsed().as_millis() as u64,
            summary,
        },
        cli_args,
    )
}

/// Search a dictionary.
fn search_dictionary(args: SearchArgs, cli_args: &JitenArgs) -> Result<()> {
    let start_time = Instant::now();
    let mut config = load_config(args.config.as_deref())?;
    if args.verify {
        config.verify_checksum_on_open = true;
    }

    let storage = open_storage(&args.directory)?;
    let dictionary = open_dictionary(storage, &args.name, &args.directory, &config)?;

    let flags = args.flags();
    debug!("searching {:?} with {flags:?}", args.query);
    let hits = dictionary
        .search_entries(&args.query, flags, args.limit)?
        .into_iter()
        .map(|(id, entry)| SearchHit { id, entry })
        .collect();

    output_result(
        "Search results",
        &SearchResults {
            query: args.query,
            hits,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Report headers, checksums and index shapes of a dictionary.
fn inspect_dictionary(args: InspectArgs, cli_args: &JitenArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let storage = open_storage(&args.directory)?;

    let mut files = Vec::new();
    for kind in [FileKind::WordData, FileKind::WordIndex] {
        let file = kind.file_name(&args.name);
        let input = storage
            .open_input(&file)
            .with_context(|| format!("failed to open {file} in {}", args.directory.display()))?;
        let mut reader = StructReader::new(input)?;
        let (found, version) = read_any_header(&mut reader)?;
        files.push(FileReport {
            magic: String::from_utf8_lossy(found.magic()).to_string(),
            version,
            size_bytes: storage.file_size(&file)?,
            checksum_ok: verify_checksum(storage.as_ref(), &file)?,
            file,
        });
    }

    let dictionary =
        open_dictionary(Arc::clone(&storage), &args.name, &args.directory, &config)?;
    let info = dictionary.info(storage.as_ref())?;

    output_result(
        "Dictionary information",
        &InspectResult {
            name: info.name,
            files,
            leftover_files: leftover_temp_files(storage.as_ref(), &args.name)?,
            alphabet_size: info.alphabet_size,
            indexes: info.indexes,
        },
        cli_args,
    )
}

fn open_storage(directory: &Path) -> Result<Arc<dyn Storage>> {
    if !directory.is_dir() {
        return Err(JitenError::storage(format!(
            "dictionary directory {} does not exist",
            directory.display()
        )));
    }
    Ok(Arc::new(FileStorage::new(directory, StorageConfig::default())?))
}

fn open_dictionary(
    storage: Arc<dyn Storage>,
    name: &str,
    directory: &Path,
    config: &DictionaryConfig,
) -> Result<Dictionary> {
    let dictionary = Dictionary::open(storage, name, config)
        .with_context(|| format!("failed to open dictionary {name} in {}", directory.display()))?;
    Ok(dictionary)
}

fn load_config(path: Option<&Path>) -> Result<DictionaryConfig> {
    match path {
        Some(path) => {
            debug!("loading config from {}", path.display());
            DictionaryConfig::from_file(path)
        }
        None => Ok(DictionaryConfig::default()),
    }
}

/// Read a JSON array of entries.
fn load_entries(path: &Path) -> Result<Vec<Entry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read entries file {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}
