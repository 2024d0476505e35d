use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use colored::Colorize;
use darc_codec::encode_object;
use darc_store::{BlobStore, FsBlobStore, FsStoreConfig};
use darc_tree::{decode_records, TreeRecord};
use darc_types::{ObjectId, ObjectKind};
use darc_vfs::{DarcFileSystem, FileObject, FileType, VfsConfig};
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::cli::*;
use crate::config::CliConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?.merge(cli.store, cli.session);
    let ctx = Context::new(&config.store_dir(), config.fs, config.session, cli.format)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::HashObject(args) => {
            let id = cmd_hash_object(&ctx, &args)?;
            ctx.print_hash("hash", &id);
        }
        Command::CatObject(args) => cmd_cat_object(&ctx, &args, &mut stdout)?,
        Command::Ls(args) => {
            let listing = cmd_ls(&ctx, &args)?;
            ctx.print_listing(&listing)?;
        }
        Command::Cat(args) => cmd_cat(&ctx, &args, &mut stdout)?,
        Command::Put(args) => ctx.print_hash("root", &cmd_put(&ctx, &args)?),
        Command::Mkdir(args) => ctx.print_hash("root", &cmd_mkdir(&ctx, &args)?),
        Command::Rm(args) => ctx.print_hash("root", &cmd_rm(&ctx, &args)?),
        Command::Import(args) => {
            let summary = cmd_import(&ctx, &args)?;
            ctx.print_import(&summary)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

/// Resolved store and session for one invocation.
pub struct Context {
    store: Arc<FsBlobStore>,
    session: Option<String>,
    format: OutputFormat,
}

impl Context {
    pub fn new(
        store_dir: &Path,
        fs: FsStoreConfig,
        session: Option<String>,
        format: OutputFormat,
    ) -> anyhow::Result<Self> {
        let store = FsBlobStore::with_config(store_dir, fs)
            .with_context(|| format!("cannot open store at {}", store_dir.display()))?;
        Ok(Self {
            store: Arc::new(store),
            session,
            format,
        })
    }

    fn read_only(&self, root: &str) -> anyhow::Result<DarcFileSystem> {
        let root = parse_hash(root)?;
        Ok(DarcFileSystem::mount(self.store.clone(), VfsConfig::read_only(root)))
    }

    fn writable(&self, root: Option<&str>) -> anyhow::Result<DarcFileSystem> {
        let session = self.session.clone().ok_or_else(|| {
            anyhow!("this command modifies a tree: pass --session or set `session` in darc.toml")
        })?;
        let mut config = VfsConfig::session(session);
        if let Some(root) = root {
            config = config.with_root(parse_hash(root)?);
        }
        let fs = DarcFileSystem::mount(self.store.clone(), config);
        if !fs.is_writable() {
            bail!("session name must not be empty");
        }
        Ok(fs)
    }

    fn print_hash(&self, label: &str, id: &ObjectId) {
        match self.format {
            OutputFormat::Text => {
                println!("{} {}", format!("{label}:").green().bold(), id.to_hex().yellow())
            }
            OutputFormat::Json => println!("{}", serde_json::json!({ label: id })),
        }
    }

    fn print_listing(&self, listing: &[Listing]) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(listing)?),
            OutputFormat::Text => {
                for item in listing {
                    match item.file_type {
                        FileType::Folder => {
                            println!("{:>12}  {}/", "-".dimmed(), item.name.blue().bold())
                        }
                        FileType::File => println!(
                            "{:>12}  {}  {}",
                            item.size.unwrap_or_default(),
                            item.name,
                            item.hash.map(|h| h.short_hex()).unwrap_or_default().dimmed()
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    fn print_import(&self, summary: &ImportSummary) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
            OutputFormat::Text => {
                println!(
                    "{} Imported {} files ({} bytes) in {} folders",
                    "✓".green().bold(),
                    summary.files.to_string().bold(),
                    summary.bytes,
                    summary.folders
                );
                self.print_hash("root", &summary.root);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub size: Option<u64>,
    pub hash: Option<ObjectId>,
}

impl Listing {
    fn from_object(obj: &FileObject) -> Self {
        Self {
            name: obj.name().to_string(),
            file_type: obj.file_type(),
            size: obj.size(),
            hash: obj.hash(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub files: usize,
    pub folders: usize,
    pub bytes: u64,
    pub root: ObjectId,
}

fn cmd_hash_object(ctx: &Context, args: &HashObjectArgs) -> anyhow::Result<ObjectId> {
    let (file, len) = open_local(&args.file)?;
    let mut reader = BufReader::new(file);
    let id = if args.write {
        ctx.store.write_stream(ObjectKind::Blob, len, &mut reader)?
    } else {
        encode_object(ObjectKind::Blob, len, &mut reader, io::sink())?
    };
    Ok(id)
}

fn cmd_cat_object(ctx: &Context, args: &CatObjectArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let id = parse_hash(&args.hash)?;
    if args.tree {
        let payload = ctx.store.read_object(ObjectKind::Tree, &id)?;
        for record in decode_records(&payload).with_context(|| format!("tree {id}"))? {
            match record {
                TreeRecord::Directory { name, hash } => {
                    writeln!(out, "D {hash} {:>12} {name}", "-")?
                }
                TreeRecord::File { name, size, hash } => {
                    writeln!(out, "F {hash} {size:>12} {name}")?
                }
            }
        }
    } else {
        let mut reader = ctx.store.open_verified(ObjectKind::Blob, &id)?;
        io::copy(&mut reader, out)?;
    }
    Ok(())
}

fn cmd_ls(ctx: &Context, args: &LsArgs) -> anyhow::Result<Vec<Listing>> {
    let mut fs = ctx.read_only(&args.root)?;
    let obj = fs
        .resolve(&args.path)?
        .ok_or_else(|| anyhow!("no such file or folder: {}", args.path))?;
    if obj.is_file() {
        return Ok(vec![Listing::from_object(&obj)]);
    }

    let mut listing = Vec::new();
    for name in fs.children(&obj)? {
        let child_path = format!("{}/{}", obj.path().trim_end_matches('/'), name);
        if let Some(child) = fs.resolve(&child_path)? {
            listing.push(Listing::from_object(&child));
        }
    }
    Ok(listing)
}

fn cmd_cat(ctx: &Context, args: &CatArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut fs = ctx.read_only(&args.root)?;
    let obj = fs
        .resolve(&args.path)?
        .ok_or_else(|| anyhow!("no such file: {}", args.path))?;
    let mut reader = fs.open(&obj)?;
    io::copy(&mut reader, out)?;
    Ok(())
}

fn cmd_put(ctx: &Context, args: &PutArgs) -> anyhow::Result<ObjectId> {
    let mut fs = ctx.writable(args.root.as_deref())?;
    let (file, len) = open_local(&args.local)?;
    fs.write_file(&args.path, &mut BufReader::new(file), len)?;
    Ok(fs.commit()?)
}

fn cmd_mkdir(ctx: &Context, args: &MkdirArgs) -> anyhow::Result<ObjectId> {
    let mut fs = ctx.writable(args.root.as_deref())?;
    fs.create_folder(&args.path)?;
    Ok(fs.commit()?)
}

fn cmd_rm(ctx: &Context, args: &RmArgs) -> anyhow::Result<ObjectId> {
    let mut fs = ctx.writable(Some(&args.root))?;
    fs.delete(&args.path)?;
    Ok(fs.commit()?)
}

fn cmd_import(ctx: &Context, args: &ImportArgs) -> anyhow::Result<ImportSummary> {
    let mut fs = ctx.writable(args.root.as_deref())?;
    if !args.dir.is_dir() {
        bail!("{} is not a directory", args.dir.display());
    }
    if !args.prefix.trim_matches('/').is_empty() {
        fs.create_folder(&args.prefix)?;
    }

    let (mut files, mut folders, mut bytes) = (0, 0, 0);
    for entry in WalkDir::new(&args.dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(&args.dir)?;
        let target = tree_path(&args.prefix, relative)?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs.create_folder(&target)?;
            folders += 1;
        } else if file_type.is_file() {
            let (file, len) = open_local(entry.path())?;
            fs.write_file(&target, &mut BufReader::new(file), len)?;
            files += 1;
            bytes += len;
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular file");
        }
    }
    Ok(ImportSummary {
        files,
        folders,
        bytes,
        root: fs.commit()?,
    })
}

fn open_local(path: &Path) -> anyhow::Result<(File, u64)> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn parse_hash(text: &str) -> anyhow::Result<ObjectId> {
    text.parse::<ObjectId>()
        .with_context(|| format!("invalid object hash {text:?}"))
}

/// Map a path relative to an import directory into the tree under `prefix`.
fn tree_path(prefix: &str, relative: &Path) -> anyhow::Result<String> {
    let mut path = prefix.trim_end_matches('/').to_string();
    for component in relative.components() {
        let name = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| anyhow!("file name is not valid UTF-8: {}", relative.display()))?;
        path.push('/');
        path.push_str(name);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use darc_codec::hash_object;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(session: Option<&str>) -> (TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(
            &dir.path().join("store"),
            FsStoreConfig::default(),
            session.map(String::from),
            OutputFormat::Text,
        )
        .unwrap();
        (dir, ctx)
    }

    fn local_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    fn names(listing: &[Listing]) -> Vec<&str> {
        listing.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn hash_object_matches_codec() {
        let (dir, ctx) = context(None);
        let file = local_file(&dir, "a.txt", b"hello world");
        let args = HashObjectArgs { file, write: false };
        let id = cmd_hash_object(&ctx, &args).unwrap();
        assert_eq!(id, hash_object(ObjectKind::Blob, b"hello world"));
        assert!(!ctx.store.exists(&id).unwrap());

        let args = HashObjectArgs { write: true, ..args };
        cmd_hash_object(&ctx, &args).unwrap();
        assert!(ctx.store.exists(&id).unwrap());
    }

    #[test]
    fn put_ls_cat() {
        let (dir, ctx) = context(Some("s"));
        let local = local_file(&dir, "notes.md", b"# notes");
        let root = cmd_put(
            &ctx,
            &PutArgs {
                local,
                path: "/docs/notes.md".into(),
                root: None,
            },
        )
        .unwrap();

        let listing = cmd_ls(
            &ctx,
            &LsArgs {
                root: root.to_hex(),
                path: "/docs".into(),
            },
        )
        .unwrap();
        assert_eq!(names(&listing), vec!["notes.md"]);
        assert_eq!(listing[0].size, Some(7));

        let mut out = Vec::new();
        cmd_cat(
            &ctx,
            &CatArgs {
                root: root.to_hex(),
                path: "/docs/notes.md".into(),
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(out, b"# notes");
    }

    #[test]
    fn mutation_needs_session() {
        let (_dir, ctx) = context(None);
        let err = cmd_mkdir(
            &ctx,
            &MkdirArgs {
                path: "/d".into(),
                root: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("--session"));
    }

    #[test]
    fn mkdir_then_rm() {
        let (_dir, ctx) = context(Some("s"));
        let with_dir = cmd_mkdir(
            &ctx,
            &MkdirArgs {
                path: "/a/b".into(),
                root: None,
            },
        )
        .unwrap();
        let without = cmd_rm(
            &ctx,
            &RmArgs {
                path: "/a".into(),
                root: with_dir.to_hex(),
            },
        )
        .unwrap();
        assert_ne!(with_dir, without);
        assert_eq!(without, hash_object(ObjectKind::Tree, b""));
    }

    #[test]
    fn import_is_deterministic() {
        let (dir, ctx) = context(Some("s"));
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested/deeper")).unwrap();
        std::fs::write(src.join("top.txt"), b"top").unwrap();
        std::fs::write(src.join("nested/mid.txt"), b"middle").unwrap();
        std::fs::write(src.join("nested/deeper/low.txt"), b"bottom").unwrap();

        let args = ImportArgs {
            dir: src.clone(),
            root: None,
            prefix: "/".into(),
        };
        let first = cmd_import(&ctx, &args).unwrap();
        assert_eq!(first.files, 3);
        assert_eq!(first.folders, 2);
        assert_eq!(first.bytes, 15);
        let second = cmd_import(&ctx, &args).unwrap();
        assert_eq!(first.root, second.root);

        let listing = cmd_ls(
            &ctx,
            &LsArgs {
                root: first.root.to_hex(),
                path: "/nested".into(),
            },
        )
        .unwrap();
        assert_eq!(names(&listing), vec!["deeper", "mid.txt"]);
        assert_eq!(listing[0].file_type, FileType::Folder);
    }

    #[test]
    fn import_under_prefix() {
        let (dir, ctx) = context(Some("s"));
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("f"), b"x").unwrap();

        let summary = cmd_import(
            &ctx,
            &ImportArgs {
                dir: src,
                root: None,
                prefix: "/vendor/lib/".into(),
            },
        )
        .unwrap();
        let listing = cmd_ls(
            &ctx,
            &LsArgs {
                root: summary.root.to_hex(),
                path: "/vendor/lib".into(),
            },
        )
        .unwrap();
        assert_eq!(names(&listing), vec!["f"]);
    }

    #[test]
    fn cat_object_tree_lists_records() {
        let (_dir, ctx) = context(Some("s"));
        let root = cmd_mkdir(
            &ctx,
            &MkdirArgs {
                path: "/only".into(),
                root: None,
            },
        )
        .unwrap();
        let mut out = Vec::new();
        cmd_cat_object(
            &ctx,
            &CatObjectArgs {
                hash: root.to_hex(),
                tree: true,
            },
            &mut out,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("D "));
        assert!(text.trim_end().ends_with(" only"));
    }

    #[test]
    fn bad_root_hash_rejected() {
        let (_dir, ctx) = context(None);
        let err = cmd_ls(
            &ctx,
            &LsArgs {
                root: "not-a-hash".into(),
                path: "/".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid object hash"));
    }

    #[test]
    fn tree_path_mapping() {
        assert_eq!(tree_path("/", Path::new("a/b")).unwrap(), "/a/b");
        assert_eq!(tree_path("/pre/", Path::new("x")).unwrap(), "/pre/x");
        assert_eq!(tree_path("", Path::new("x")).unwrap(), "/x");
    }
}
