use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "darc",
    about = "Digest archive: content-addressed, hash-verified file trees",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Blob store directory (overrides the config file)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Configuration file; defaults to ./darc.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Change session name; required by commands that modify a tree
    #[arg(long, global = true)]
    pub session: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute the blob hash of a local file
    HashObject(HashObjectArgs),
    /// Print a stored object's payload
    CatObject(CatObjectArgs),
    /// List a folder of a tree
    Ls(LsArgs),
    /// Print a file of a tree
    Cat(CatArgs),
    /// Store a local file at a path in a tree
    Put(PutArgs),
    /// Create a folder in a tree
    Mkdir(MkdirArgs),
    /// Delete a file or folder from a tree
    Rm(RmArgs),
    /// Import a local directory recursively
    Import(ImportArgs),
}

#[derive(Args)]
pub struct HashObjectArgs {
    pub file: PathBuf,
    /// Also write the object into the store
    #[arg(short, long)]
    pub write: bool,
}

#[derive(Args)]
pub struct CatObjectArgs {
    pub hash: String,
    /// Decode the object as a directory listing
    #[arg(long)]
    pub tree: bool,
}

#[derive(Args)]
pub struct LsArgs {
    pub root: String,
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Args)]
pub struct CatArgs {
    pub root: String,
    pub path: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub local: PathBuf,
    pub path: String,
    /// Tree to modify; a new tree when omitted
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub path: String,
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    #[arg(long)]
    pub root: String,
}

#[derive(Args)]
pub struct ImportArgs {
    pub dir: PathBuf,
    #[arg(long)]
    pub root: Option<String>,
    /// Folder in the tree to import into
    #[arg(long, default_value = "/")]
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hash_object() {
        let cli = Cli::try_parse_from(["darc", "hash-object", "-w", "a.txt"]).unwrap();
        if let Command::HashObject(args) = cli.command {
            assert!(args.write);
            assert_eq!(args.file, PathBuf::from("a.txt"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_cat_object_tree() {
        let cli = Cli::try_parse_from(["darc", "cat-object", "--tree", "abcd"]).unwrap();
        if let Command::CatObject(args) = cli.command {
            assert!(args.tree);
            assert_eq!(args.hash, "abcd");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["darc", "ls", "abcd"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.path, "/");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_put_with_session() {
        let cli = Cli::try_parse_from([
            "darc", "put", "local.bin", "/dst/file", "--root", "abcd", "--session", "s1",
        ])
        .unwrap();
        assert_eq!(cli.session, Some("s1".into()));
        if let Command::Put(args) = cli.command {
            assert_eq!(args.path, "/dst/file");
            assert_eq!(args.root, Some("abcd".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn rm_requires_root() {
        assert!(Cli::try_parse_from(["darc", "rm", "/x"]).is_err());
        let cli = Cli::try_parse_from(["darc", "rm", "/x", "--root", "abcd"]).unwrap();
        assert!(matches!(cli.command, Command::Rm(_)));
    }

    #[test]
    fn parse_import_prefix() {
        let cli = Cli::try_parse_from(["darc", "import", "src", "--prefix", "/code"]).unwrap();
        if let Command::Import(args) = cli.command {
            assert_eq!(args.prefix, "/code");
            assert_eq!(args.root, None);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "darc", "--store", "/tmp/s", "--verbose", "--format", "json", "ls", "abcd",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s")));
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
