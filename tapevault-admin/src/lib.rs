//! tapevault-admin library - command line administration
//!
//! Every subcommand maps onto one library operation and yields its result
//! as JSON. Payloads for track replaces and composition writes are read
//! as JSON from a file, or from stdin when the path is `-`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

use tapevault_common::config::TomlConfig;
use tapevault_common::db::SqliteStore;
use tapevault_common::ids::{CompositionId, SourceId, TrackId};
use tapevault_common::model::{CompositionDraft, NewSource, SourceFile, TrackDraft};
use tapevault_common::scrobble::{LastFmClient, ScrobbleService};
use tapevault_common::services::{CompositionService, SourceService, TrackService};
use tapevault_common::timestamp::parse_timestamp;

#[derive(Parser, Debug)]
#[command(name = "tapevault-admin")]
#[command(about = "Administration tool for the tapevault library")]
#[command(version)]
pub struct Cli {
    /// Root folder holding the library database
    #[arg(short, long, global = true)]
    pub root_folder: Option<PathBuf>,

    /// Config file to use instead of the platform default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Imported sources and their hierarchy
    #[command(subcommand)]
    Source(SourceCommand),
    /// Tracks of sources
    #[command(subcommand)]
    Track(TrackCommand),
    /// Tapes, playlists and albums
    #[command(subcommand)]
    Composition(CompositionCommand),
    /// Scrobbling account link
    #[command(subcommand)]
    Scrobble(ScrobbleCommand),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub url: String,
    #[arg(long, default_value = "")]
    pub title: String,
    #[arg(long, default_value = "")]
    pub uploader: String,
    #[arg(long, default_value = "")]
    pub album_artist: String,
    #[arg(long, default_value = "")]
    pub album_title: String,
    #[arg(long, default_value_t = 0)]
    pub album_index: i64,
    /// Length as HH:MM:SS[.mmm]
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<i64>,
    /// Ordered child source ids
    #[arg(long = "child")]
    pub children: Vec<SourceId>,
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Import or refresh a source by URL
    Import(ImportArgs),
    Get { id: SourceId },
    List,
    /// Flat hierarchy listing, or the nested tree with --tree
    Hierarchy {
        id: SourceId,
        #[arg(long)]
        tree: bool,
    },
    /// Replace the ordered child list of a source
    SetChildren { parent: SourceId, children: Vec<SourceId> },
    Delete { id: SourceId },
    /// Record the extracted media file of a source
    AttachFile {
        id: SourceId,
        #[arg(long)]
        codec: String,
        #[arg(long)]
        format: String,
        #[arg(long)]
        path: String,
        /// File length as HH:MM:SS[.mmm]
        #[arg(long, value_parser = parse_duration)]
        duration: Option<i64>,
    },
    File { id: SourceId },
    DeleteFile { id: SourceId },
    /// Thumbnails referenced by the given sources
    Thumbnails { ids: Vec<SourceId> },
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    List {
        source: SourceId,
        #[arg(long)]
        recursive: bool,
    },
    /// Replace all tracks of a source with a JSON array of tracks
    Replace { source: SourceId, payload: PathBuf },
    /// Store detected tracks unless the source already has some
    Initialize { source: SourceId, payload: PathBuf },
    Search { query: String },
}

#[derive(Subcommand, Debug)]
pub enum CompositionCommand {
    Create { payload: PathBuf },
    Update {
        id: CompositionId,
        payload: PathBuf,
        /// Also report how the reference list changed
        #[arg(long)]
        changes: bool,
    },
    Delete { id: CompositionId },
    List,
    Get { id: CompositionId },
    Related { id: CompositionId },
    /// Propose metadata for a set of tracks without saving anything
    Guess { track_ids: Vec<TrackId> },
}

#[derive(Subcommand, Debug)]
pub enum ScrobbleCommand {
    Session,
    AuthLink,
    /// Exchange an approved token for a session
    Link { token: String },
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read payload from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload {}", path.display()))?
    };
    serde_json::from_str(&content).context("Malformed JSON payload")
}

/// Durations on the command line are committed values: a malformed one is
/// an error, never zero
fn parse_duration(value: &str) -> std::result::Result<i64, String> {
    match parse_timestamp(value) {
        Some(ms) if ms >= 0 => Ok(ms),
        Some(_) => Err(format!("duration must not be negative: {value}")),
        None => Err(format!("expected HH:MM:SS[.mmm], got {value:?}")),
    }
}

/// Execute one command against an open library
pub async fn run(command: Command, store: SqliteStore, config: &TomlConfig) -> Result<Value> {
    match command {
        Command::Source(command) => run_source(command, SourceService::new(store)).await,
        Command::Track(command) => run_track(command, TrackService::new(store)).await,
        Command::Composition(command) => {
            run_composition(command, CompositionService::new(store)).await
        }
        Command::Scrobble(command) => {
            let client = config
                .lastfm
                .credentials()
                .map(|(key, secret)| LastFmClient::new(key, secret));
            run_scrobble(command, ScrobbleService::new(client, store)).await
        }
    }
}

async fn run_source(command: SourceCommand, service: SourceService<SqliteStore>) -> Result<Value> {
    match command {
        SourceCommand::Import(args) => {
            let source = NewSource {
                album_artist: args.album_artist,
                album_title: args.album_title,
                album_index: args.album_index,
                duration_ms: args.duration.unwrap_or(0),
                ..NewSource::new(args.url, args.title, args.uploader)
            };
            to_json(&service.import(source, &args.children).await?)
        }
        SourceCommand::Get { id } => to_json(&service.get(id).await?),
        SourceCommand::List => to_json(&service.list().await?),
        SourceCommand::Hierarchy { id, tree: true } => to_json(&service.hierarchy_tree(id).await?),
        SourceCommand::Hierarchy { id, tree: false } => to_json(&service.resolve_hierarchy(id).await?),
        SourceCommand::SetChildren { parent, children } => {
            service.set_children(parent, &children).await?;
            to_json(&service.resolve_hierarchy(parent).await?)
        }
        SourceCommand::Delete { id } => {
            service.delete(id).await?;
            Ok(Value::Null)
        }
        SourceCommand::AttachFile { id, codec, format, path, duration } => {
            let file = SourceFile {
                codec,
                format,
                media_path: path,
                duration_ms: duration,
            };
            service.attach_file(id, file).await?;
            to_json(&service.get_file(id).await?)
        }
        SourceCommand::File { id } => to_json(&service.get_file(id).await?),
        SourceCommand::DeleteFile { id } => {
            service.delete_file(id).await?;
            Ok(Value::Null)
        }
        SourceCommand::Thumbnails { ids } => to_json(&service.search_thumbnails(&ids).await?),
    }
}

async fn run_track(command: TrackCommand, service: TrackService<SqliteStore>) -> Result<Value> {
    match command {
        TrackCommand::List { source, recursive } => {
            to_json(&service.list_tracks(source, recursive).await?)
        }
        TrackCommand::Replace { source, payload } => {
            let drafts: Vec<TrackDraft> = read_payload(&payload)?;
            to_json(&service.replace_tracks(source, &drafts).await?)
        }
        TrackCommand::Initialize { source, payload } => {
            let drafts: Vec<TrackDraft> = read_payload(&payload)?;
            to_json(&service.initialize_tracks(source, &drafts).await?)
        }
        TrackCommand::Search { query } => to_json(&service.search_tracks(&query).await?),
    }
}

async fn run_composition(
    command: CompositionCommand,
    service: CompositionService<SqliteStore>,
) -> Result<Value> {
    match command {
        CompositionCommand::Create { payload } => {
            let draft: CompositionDraft = read_payload(&payload)?;
            to_json(&service.create(&draft).await?)
        }
        CompositionCommand::Update { id, payload, changes } => {
            let draft: CompositionDraft = read_payload(&payload)?;
            if changes {
                let (composition, changes) = service.update_with_changes(id, &draft).await?;
                Ok(serde_json::json!({
                    "composition": to_json(&composition)?,
                    "changes": to_json(&changes)?,
                }))
            } else {
                to_json(&service.update(id, &draft).await?)
            }
        }
        CompositionCommand::Delete { id } => {
            service.delete(id).await?;
            Ok(Value::Null)
        }
        CompositionCommand::List => to_json(&service.list().await?),
        CompositionCommand::Get { id } => to_json(&service.get(id).await?),
        CompositionCommand::Related { id } => to_json(&service.list_related(id).await?),
        CompositionCommand::Guess { track_ids } => to_json(&service.guess_metadata(&track_ids).await?),
    }
}

async fn run_scrobble(
    command: ScrobbleCommand,
    service: ScrobbleService<LastFmClient, SqliteStore>,
) -> Result<Value> {
    match command {
        ScrobbleCommand::Session => to_json(&service.current_session().await?),
        ScrobbleCommand::AuthLink => to_json(&service.create_auth_link().await?),
        ScrobbleCommand::Link { token } => to_json(&service.create_session(&token).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteStore {
        SqliteStore::open(&dir.path().join("tapevault.db")).await.unwrap()
    }

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("tapevault-admin").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tapevault-admin",
            "source",
            "list",
            "--root-folder",
            "/tmp/lib",
        ])
        .unwrap();
        assert_eq!(cli.root_folder, Some(PathBuf::from("/tmp/lib")));
    }

    #[test]
    fn test_rejects_malformed_ids() {
        let result = Cli::try_parse_from(["tapevault-admin", "source", "get", "not-a-uuid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_duration_is_rejected() {
        let id = "5f0c2a8e-9d3b-4c1e-8a7f-2b6d4e9c1a03";
        for bad in ["3:00", "three minutes", "-00:01:00"] {
            let result = Cli::try_parse_from([
                "tapevault-admin", "source", "attach-file", id, "--codec", "opus", "--format",
                "webm", "--path", "v.webm", "--duration", bad,
            ]);
            assert!(result.is_err(), "accepted duration {:?}", bad);
        }

        let result = Cli::try_parse_from(["tapevault-admin", "source", "import", "https://example.com/v", "--duration", "3:00"]);
        assert!(result.is_err());

        match parse(&["source", "import", "https://example.com/v", "--duration", "00:00:00"]) {
            Command::Source(SourceCommand::Import(args)) => assert_eq!(args.duration, Some(0)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_import_attach_and_replace() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let config = TomlConfig::default();

        let imported = run(
            parse(&["source", "import", "https://example.com/v", "--title", "Video"]),
            store.clone(),
            &config,
        )
        .await
        .unwrap();
        let id = imported["id"].as_str().unwrap().to_string();

        let file = run(
            parse(&[
                "source", "attach-file", &id, "--codec", "opus", "--format", "webm", "--path",
                "v.webm", "--duration", "00:03:00",
            ]),
            store.clone(),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(file["duration_ms"], 180_000);

        let payload = dir.path().join("tracks.json");
        std::fs::write(
            &payload,
            r#"[{"artist": "A", "title": "One", "start_offset_ms": 0, "end_offset_ms": 90000},
                {"artist": "A", "title": "Two", "start_offset_ms": 90000, "end_offset_ms": 180000}]"#,
        )
        .unwrap();
        let payload = payload.to_string_lossy().to_string();

        let tracks = run(parse(&["track", "replace", &id, &payload]), store.clone(), &config)
            .await
            .unwrap();
        assert_eq!(tracks.as_array().unwrap().len(), 2);

        let found = run(parse(&["track", "search", "two"]), store, &config).await.unwrap();
        assert_eq!(found[0]["title"], "Two");
    }

    #[tokio::test]
    async fn test_scrobble_without_credentials() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let config = TomlConfig::default();

        let session = run(parse(&["scrobble", "session"]), store.clone(), &config).await.unwrap();
        assert_eq!(session, Value::Null);

        let err = run(parse(&["scrobble", "auth-link"]), store, &config).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
