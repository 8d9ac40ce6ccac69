use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "imprint", version, about = "Imprint CLI")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options every command requires.
#[derive(Args, Debug, Clone)]
pub struct SiteArgs {
    /// Site root directory.
    #[arg(short = 's', long)]
    pub site: String,

    /// Runtime environment: development|production.
    #[arg(short = 'e', long, default_value = "development")]
    pub environment: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Boot the site: load schema, select the identity map strategy,
    /// validate, and report status.
    Start {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Promote pending changes into a new published revision.
    Publish {
        #[command(flatten)]
        site: SiteArgs,

        /// Comma-separated change ids for a selective publish. Omit to
        /// publish everything.
        #[arg(long, value_delimiter = ',')]
        changes: Option<Vec<u64>>,

        /// Append publish progress to this file.
        #[arg(long)]
        logfile: Option<String>,
    },

    /// Show the published/pending revision pointers.
    Revision {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Run site and environment checks.
    Console {
        #[command(flatten)]
        site: SiteArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_parses_change_list() {
        let cli = Cli::parse_from([
            "imprint", "publish", "-s", "/srv/site", "-e", "production", "--changes", "3,5,8",
        ]);
        match cli.command {
            Command::Publish { site, changes, logfile } => {
                assert_eq!(site.site, "/srv/site");
                assert_eq!(site.environment, "production");
                assert_eq!(changes, Some(vec![3, 5, 8]));
                assert_eq!(logfile, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn environment_defaults_to_development() {
        let cli = Cli::parse_from(["imprint", "revision", "--site", "."]);
        match cli.command {
            Command::Revision { site } => assert_eq!(site.environment, "development"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn site_is_required() {
        assert!(Cli::try_parse_from(["imprint", "start"]).is_err());
    }
}
